mod stored;
mod tokenization;

pub use stored::*;
pub use tokenization::*;
