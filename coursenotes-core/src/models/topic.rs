use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Entity, EntityId, Note};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Topic {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Topic {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            notes: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_notes(mut self, notes: Vec<Note>) -> Self {
        self.notes = notes;
        self
    }
}

impl Entity for Topic {
    fn id(&self) -> EntityId {
        self.id
    }
}
