use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Entity, EntityId};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    pub id: EntityId,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Note {
    pub fn new(id: EntityId, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            name: None,
            category: None,
            extra: Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name when present, otherwise the first line of the content.
    pub fn summary(&self) -> &str {
        match &self.name {
            Some(name) => name,
            None => self.content.lines().next().unwrap_or(""),
        }
    }
}

impl Entity for Note {
    fn id(&self) -> EntityId {
        self.id
    }
}
