use serde::{Deserialize, Serialize};

use crate::id::to_global_id;

/// External application registered with the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub id: i64,
    /// Stable, app-chosen identifier (e.g., "vendor.payments").
    /// Used to route payment method ids back to the app.
    pub identifier: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: i64,
}

impl App {
    pub fn global_id(&self) -> String {
        to_global_id("App", self.id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateApp {
    pub identifier: String,
    pub name: String,
}
