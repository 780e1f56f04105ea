mod course;
mod note;
mod profile;
mod topic;

pub use course::Course;
pub use note::Note;
pub use profile::Profile;
pub use topic::Topic;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Server-assigned identifier shared by every entity kind.
pub type EntityId = i64;

/// An entity that lives in a sequence and is addressed by its id.
pub trait Entity: Serialize + DeserializeOwned {
    fn id(&self) -> EntityId;
}
