use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::{Entity, EntityId};

/// The signed-in user's profile, as returned by `/api/v1/profile/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: EntityId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Profile {
    pub fn new(id: EntityId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            email: None,
            extra: Map::new(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

impl Entity for Profile {
    fn id(&self) -> EntityId {
        self.id
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Username: {}", self.username)?;
        writeln!(f, "Email: {}", self.email.as_deref().unwrap_or("-"))
    }
}
