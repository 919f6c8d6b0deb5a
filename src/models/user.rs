use serde::{Deserialize, Serialize};

use crate::id::to_global_id;

/// Customer reference owned by the platform. Only what webhook payloads need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
}

impl User {
    pub fn global_id(&self) -> String {
        to_global_id("User", self.id)
    }
}
