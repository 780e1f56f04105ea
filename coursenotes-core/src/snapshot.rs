//! The in-memory page data and address resolution over it.

use serde::de::Error as _;
use serde::Serialize;
use serde_json::Value;

use crate::address::{PageKey, ResourceAddress};
use crate::models::{Course, Entity, EntityId, Note, Profile, Topic};
use crate::patch::{merge_into, Patch};

/// Data of the currently loaded page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Snapshot {
    #[default]
    Empty,
    Profile(Profile),
    Courses(Vec<Course>),
}

impl Snapshot {
    /// Decodes a page-load response body.
    ///
    /// Courses arrive as `{"courses": [...]}`; a bare array is accepted too.
    pub fn from_page(page: &PageKey, body: Value) -> Result<Self, serde_json::Error> {
        match page {
            PageKey::Profile(_) => serde_json::from_value(body).map(Snapshot::Profile),
            PageKey::Courses => {
                let list = match body {
                    Value::Object(mut fields) => fields.remove("courses").ok_or_else(|| {
                        serde_json::Error::custom("missing field `courses` in page body")
                    })?,
                    list @ Value::Array(_) => list,
                    other => {
                        return Err(serde_json::Error::custom(format!(
                            "unexpected courses page body: {}",
                            other
                        )))
                    }
                };
                serde_json::from_value(list).map(Snapshot::Courses)
            }
        }
    }

    /// Page this snapshot holds, if any.
    pub fn page(&self) -> Option<PageKey> {
        match self {
            Snapshot::Empty => None,
            Snapshot::Profile(profile) => Some(PageKey::Profile(profile.id)),
            Snapshot::Courses(_) => Some(PageKey::Courses),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Snapshot::Empty)
    }

    pub fn profile(&self) -> Option<&Profile> {
        match self {
            Snapshot::Profile(profile) => Some(profile),
            _ => None,
        }
    }

    pub fn courses(&self) -> Option<&[Course]> {
        match self {
            Snapshot::Courses(courses) => Some(courses),
            _ => None,
        }
    }

    /// Returns true if `address` resolves to an entity.
    pub fn contains(&mut self, address: &ResourceAddress) -> bool {
        self.resolve_mut(address).is_some()
    }

    /// Walks the id chain of `address` down to the entity it names.
    pub fn resolve_mut(&mut self, address: &ResourceAddress) -> Option<EntityMut<'_>> {
        match (self, address) {
            (Snapshot::Profile(profile), ResourceAddress::Flat) => {
                Some(EntityMut::Profile(profile))
            }
            (Snapshot::Courses(courses), ResourceAddress::Course(c)) => {
                find_course(courses, *c).map(EntityMut::Course)
            }
            (Snapshot::Courses(courses), ResourceAddress::Topic(c, t)) => {
                find_topic(courses, *c, *t).map(EntityMut::Topic)
            }
            (Snapshot::Courses(courses), ResourceAddress::Note(c, t, n)) => {
                find_note(courses, *c, *t, *n).map(EntityMut::Note)
            }
            _ => None,
        }
    }

    /// The sequence that children of `parent` are created into.
    pub fn children_mut(&mut self, parent: &ResourceAddress) -> Option<Children<'_>> {
        match (self, parent) {
            (Snapshot::Courses(courses), ResourceAddress::Flat) => Some(Children::Courses(courses)),
            (Snapshot::Courses(courses), ResourceAddress::Course(c)) => {
                find_course(courses, *c).map(|course| Children::Topics(&mut course.topics))
            }
            (Snapshot::Courses(courses), ResourceAddress::Topic(c, t)) => {
                find_topic(courses, *c, *t).map(|topic| Children::Notes(&mut topic.notes))
            }
            _ => None,
        }
    }

    /// Filters the entity at `address` out of its containing sequence.
    ///
    /// `Flat` clears the whole snapshot. Returns false if nothing was removed.
    pub fn remove(&mut self, address: &ResourceAddress) -> bool {
        match address {
            ResourceAddress::Flat => !std::mem::take(self).is_empty(),
            ResourceAddress::Course(c) => match self {
                Snapshot::Courses(courses) => remove_by_id(courses, *c),
                _ => false,
            },
            ResourceAddress::Topic(c, t) => match self {
                Snapshot::Courses(courses) => find_course(courses, *c)
                    .is_some_and(|course| remove_by_id(&mut course.topics, *t)),
                _ => false,
            },
            ResourceAddress::Note(c, t, n) => match self {
                Snapshot::Courses(courses) => find_topic(courses, *c, *t)
                    .is_some_and(|topic| remove_by_id(&mut topic.notes, *n)),
                _ => false,
            },
        }
    }
}

/// Mutable handle on a resolved entity.
#[derive(Debug)]
pub enum EntityMut<'a> {
    Profile(&'a mut Profile),
    Course(&'a mut Course),
    Topic(&'a mut Topic),
    Note(&'a mut Note),
}

impl EntityMut<'_> {
    /// Shallow-merges `patch` into the entity.
    pub fn apply(self, patch: &Patch) -> Result<(), serde_json::Error> {
        match self {
            EntityMut::Profile(profile) => merge_into(profile, patch),
            EntityMut::Course(course) => merge_into(course, patch),
            EntityMut::Topic(topic) => merge_into(topic, patch),
            EntityMut::Note(note) => merge_into(note, patch),
        }
    }
}

/// Mutable handle on a container sequence.
#[derive(Debug)]
pub enum Children<'a> {
    Courses(&'a mut Vec<Course>),
    Topics(&'a mut Vec<Topic>),
    Notes(&'a mut Vec<Note>),
}

impl Children<'_> {
    /// Inserts a server entity, merging it over an existing entry with the same id.
    pub fn upsert(self, entity: Value) -> Result<EntityId, serde_json::Error> {
        match self {
            Children::Courses(list) => upsert(list, entity),
            Children::Topics(list) => upsert(list, entity),
            Children::Notes(list) => upsert(list, entity),
        }
    }
}

fn find_course(courses: &mut [Course], course_id: EntityId) -> Option<&mut Course> {
    courses.iter_mut().find(|course| course.id == course_id)
}

fn find_topic(
    courses: &mut [Course],
    course_id: EntityId,
    topic_id: EntityId,
) -> Option<&mut Topic> {
    find_course(courses, course_id)?
        .topics
        .iter_mut()
        .find(|topic| topic.id == topic_id)
}

fn find_note(
    courses: &mut [Course],
    course_id: EntityId,
    topic_id: EntityId,
    note_id: EntityId,
) -> Option<&mut Note> {
    find_topic(courses, course_id, topic_id)?
        .notes
        .iter_mut()
        .find(|note| note.id == note_id)
}

fn upsert<T: Entity>(list: &mut Vec<T>, entity: Value) -> Result<EntityId, serde_json::Error> {
    let incoming: T = serde_json::from_value(entity.clone())?;
    let id = incoming.id();

    match (list.iter().position(|existing| existing.id() == id), entity) {
        (Some(index), Value::Object(fields)) => merge_into(&mut list[index], &fields)?,
        (Some(index), _) => list[index] = incoming,
        (None, _) => list.push(incoming),
    }
    Ok(id)
}

fn remove_by_id<T: Entity>(list: &mut Vec<T>, id: EntityId) -> bool {
    let before = list.len();
    list.retain(|entity| entity.id() != id);
    list.len() != before
}
