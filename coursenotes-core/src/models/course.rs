use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::{Entity, EntityId, Topic};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Course {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub topics: Vec<Topic>,
    /// Fields the client does not interpret (e.g. `creator_id`), kept so they
    /// survive a local merge.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Course {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            topics: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_topics(mut self, topics: Vec<Topic>) -> Self {
        self.topics = topics;
        self
    }

    pub fn topic(&self, id: EntityId) -> Option<&Topic> {
        self.topics.iter().find(|t| t.id == id)
    }
}

impl Entity for Course {
    fn id(&self) -> EntityId {
        self.id
    }
}

impl fmt::Display for Course {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}] {}", self.id, self.name)?;
        for topic in &self.topics {
            writeln!(f, "  [{}] {}", topic.id, topic.name)?;
            for note in &topic.notes {
                writeln!(f, "    [{}] {}", note.id, note.summary())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Note;

    #[test]
    fn test_course_deserialize_without_topics() {
        let course: Course = serde_json::from_str(r#"{"id": 1, "name": "Algebra"}"#).unwrap();
        assert_eq!(course.id, 1);
        assert!(course.topics.is_empty());
        assert!(course.extra.is_empty());
    }

    #[test]
    fn test_course_keeps_unknown_fields() {
        let course: Course =
            serde_json::from_str(r#"{"id": 1, "name": "Algebra", "creator_id": 7}"#).unwrap();
        assert_eq!(course.extra.get("creator_id"), Some(&Value::from(7)));

        let value = serde_json::to_value(&course).unwrap();
        assert_eq!(value["creator_id"], 7);
    }

    #[test]
    fn test_course_display_lists_tree() {
        let course = Course::new(1, "Algebra").with_topics(vec![
            Topic::new(5, "Groups").with_notes(vec![Note::new(9, "closure")])
        ]);

        let output = format!("{}", course);
        assert!(output.contains("[1] Algebra"));
        assert!(output.contains("  [5] Groups"));
        assert!(output.contains("    [9] closure"));
    }
}
