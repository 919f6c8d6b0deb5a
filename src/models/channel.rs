use serde::{Deserialize, Serialize};

use crate::id::to_global_id;

/// Sales channel reference owned by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    pub slug: String,
    pub name: String,
    /// ISO 4217, uppercase (e.g., "USD")
    pub currency_code: String,
}

impl Channel {
    pub fn global_id(&self) -> String {
        to_global_id("Channel", self.id)
    }
}
