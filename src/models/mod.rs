mod app;
mod channel;
mod event_delivery;
mod event_type;
mod user;
mod webhook;

pub use app::*;
pub use channel::*;
pub use event_delivery::*;
pub use event_type::*;
pub use user::*;
pub use webhook::*;
