//! Typed addressing for pages and entities.
//!
//! A [`PageKey`] names a whole page of data (`profile/{id}` or `courses`).
//! A [`ResourceAddress`] names one entity inside the loaded page, and every
//! URL the client sends is derived from one of the two.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::EntityId;

/// Prefix shared by every API path.
pub const API_PREFIX: &str = "/api/v1";

/// Top-level page whose data the controller holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PageKey {
    /// The profile of the given user.
    Profile(EntityId),
    /// All courses the user is enrolled in.
    Courses,
}

impl PageKey {
    /// Page segment as used in URLs, without the API prefix.
    pub fn segment(&self) -> String {
        match self {
            PageKey::Profile(id) => format!("profile/{}", id),
            PageKey::Courses => "courses".to_string(),
        }
    }

    /// `GET` path for the whole page.
    pub fn path(&self) -> String {
        format!("{}/{}", API_PREFIX, self.segment())
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segment())
    }
}

impl FromStr for PageKey {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_matches('/');
        if s == "courses" {
            return Ok(PageKey::Courses);
        }
        match s.split_once('/') {
            Some(("profile", id)) => id
                .parse()
                .map(PageKey::Profile)
                .map_err(|_| AddressParseError(s.to_string())),
            _ => Err(AddressParseError(s.to_string())),
        }
    }
}

/// Location of an entity inside the snapshot and on the server.
///
/// When used as the target of `create`, the address names the *parent*
/// container: `Flat` is the top-level list, `Course(c)` the topics of `c`,
/// and `Topic(c, t)` the notes of `t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceAddress {
    /// The page resource itself (e.g. the signed-in profile).
    Flat,
    Course(EntityId),
    Topic(EntityId, EntityId),
    Note(EntityId, EntityId, EntityId),
}

impl ResourceAddress {
    /// Path of the entity for `PATCH`/`DELETE`.
    pub fn entity_path(&self, page: &PageKey) -> String {
        match self {
            ResourceAddress::Flat => page.path(),
            ResourceAddress::Course(c) => format!("{}/courses/{}", API_PREFIX, c),
            ResourceAddress::Topic(c, t) => format!("{}/courses/{}/topics/{}", API_PREFIX, c, t),
            ResourceAddress::Note(c, t, n) => {
                format!("{}/courses/{}/topics/{}/notes/{}", API_PREFIX, c, t, n)
            }
        }
    }

    /// `POST` path for creating a child of this address, if it can have children.
    pub fn collection_path(&self, page: &PageKey) -> Option<String> {
        match self {
            ResourceAddress::Flat => Some(format!("{}/new", page.path())),
            ResourceAddress::Course(c) => Some(format!("{}/courses/{}/topics", API_PREFIX, c)),
            ResourceAddress::Topic(c, t) => {
                Some(format!("{}/courses/{}/topics/{}/notes", API_PREFIX, c, t))
            }
            ResourceAddress::Note(..) => None,
        }
    }

    /// Key the server uses to wrap an entity created under this parent.
    pub fn child_envelope(&self) -> Option<&'static str> {
        match self {
            ResourceAddress::Flat => Some("course"),
            ResourceAddress::Course(_) => Some("topic"),
            ResourceAddress::Topic(..) => Some("note"),
            ResourceAddress::Note(..) => None,
        }
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceAddress::Flat => f.write_str("self"),
            ResourceAddress::Course(c) => write!(f, "{}", c),
            ResourceAddress::Topic(c, t) => write!(f, "{}/{}", c, t),
            ResourceAddress::Note(c, t, n) => write!(f, "{}/{}/{}", c, t, n),
        }
    }
}

/// Parses `self`, `c`, `c/t` or `c/t/n`.
impl FromStr for ResourceAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == "self" {
            return Ok(ResourceAddress::Flat);
        }

        let ids = s
            .split('/')
            .map(|part| part.trim().parse::<EntityId>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| AddressParseError(s.to_string()))?;

        match ids.as_slice() {
            [c] => Ok(ResourceAddress::Course(*c)),
            [c, t] => Ok(ResourceAddress::Topic(*c, *t)),
            [c, t, n] => Ok(ResourceAddress::Note(*c, *t, *n)),
            _ => Err(AddressParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid address '{0}': expected COURSE[/TOPIC[/NOTE]]")]
pub struct AddressParseError(pub String);
