//! In-memory data for the development server.
//!
//! Every user owns the courses they create; topics and notes live inside
//! their course. Ids come from one counter shared by all entity kinds.
//!
//! Session and CSRF tokens are sequential and predictable. This server is
//! for local development and tests only.

use coursenotes_core::patch::{local_fields, merge_into, Patch};
use coursenotes_core::{Course, EntityId, Note, Profile, Topic};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// Seed account from the server config file.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
}

/// Tokens handed out on login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: EntityId,
    pub access_token: String,
    pub csrf_token: String,
}

/// Errors from store operations, mapped to HTTP responses by the routes.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Missing or wrong credentials.
    Unauthorized(&'static str),
    /// Authenticated, but not allowed to touch this resource.
    Forbidden,
    NotFound(&'static str),
    /// Field -> messages, sent back as a 422 body.
    Invalid(Vec<(String, String)>),
    BadRequest(&'static str),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unauthorized(message) => write!(f, "{}", message),
            StoreError::Forbidden => write!(f, "Forbidden"),
            StoreError::NotFound(what) => write!(f, "{} not found", what),
            StoreError::Invalid(fields) => write!(f, "{} invalid field(s)", fields.len()),
            StoreError::BadRequest(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for StoreError {}

#[derive(Debug)]
struct Account {
    profile: Profile,
    password: String,
}

#[derive(Debug)]
struct OwnedCourse {
    owner: EntityId,
    course: Course,
}

/// Users, sessions and course trees.
#[derive(Debug, Default)]
pub struct Store {
    accounts: Vec<Account>,
    courses: Vec<OwnedCourse>,
    sessions: HashMap<String, Session>,
    next_id: EntityId,
    next_token: u64,
}

const NAME_MIN: usize = 2;
const NAME_MAX: usize = 100;
const USERNAME_MAX: usize = 50;
const PASSWORD_MIN: usize = 8;

impl Store {
    pub fn seeded(users: &[SeedUser]) -> Self {
        let mut store = Self::default();
        for user in users {
            store.add_user(&user.username, user.email.as_deref(), &user.password);
        }
        store
    }

    pub fn add_user(&mut self, username: &str, email: Option<&str>, password: &str) -> EntityId {
        let id = self.allocate_id();
        let mut profile = Profile::new(id, username);
        profile.email = email.map(str::to_string);
        self.accounts.push(Account {
            profile,
            password: password.to_string(),
        });
        id
    }

    pub fn user_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn login(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<(Profile, Session), StoreError> {
        let profile = self
            .accounts
            .iter()
            .find(|account| account.profile.username == username && account.password == password)
            .map(|account| account.profile.clone())
            .ok_or(StoreError::Unauthorized("Invalid credentials"))?;

        self.next_token += 1;
        let session = Session {
            user_id: profile.id,
            access_token: format!("access-{}-{}", profile.id, self.next_token),
            csrf_token: format!("csrf-{}-{}", profile.id, self.next_token),
        };
        self.sessions
            .insert(session.access_token.clone(), session.clone());
        Ok((profile, session))
    }

    pub fn session(&self, access_token: &str) -> Option<&Session> {
        self.sessions.get(access_token)
    }

    pub fn profile(&self, user: EntityId, id: EntityId) -> Result<Profile, StoreError> {
        self.own_account(user, id).map(|account| account.profile.clone())
    }

    /// Updates username/email, and the password when `new_password` is set.
    /// `current_password` must always match.
    pub fn update_profile(
        &mut self,
        user: EntityId,
        id: EntityId,
        patch: &Patch,
    ) -> Result<Profile, StoreError> {
        let mut errors = Vec::new();
        let current = patch.get("current_password").and_then(Value::as_str);
        let new_password = patch
            .get("new_password")
            .or_else(|| patch.get("password"))
            .and_then(Value::as_str);

        if let Some(username) = patch.get("username") {
            check_length(&mut errors, "username", username, NAME_MIN, USERNAME_MAX);
        }
        if let Some(password) = new_password {
            if password.chars().count() < PASSWORD_MIN {
                errors.push(("new_password".to_string(), "too short".to_string()));
            }
        }

        let account = self.own_account_mut(user, id)?;
        match current {
            None => errors.push(("current_password".to_string(), "required".to_string())),
            Some(password) if password != account.password => {
                errors.push(("current_password".to_string(), "incorrect".to_string()))
            }
            Some(_) => {}
        }
        if !errors.is_empty() {
            return Err(StoreError::Invalid(errors));
        }

        merge_into(&mut account.profile, &local_fields(patch))
            .map_err(|_| StoreError::BadRequest("Invalid data"))?;
        if let Some(password) = new_password {
            account.password = password.to_string();
        }
        Ok(account.profile.clone())
    }

    /// Removes the account with everything it owns and ends its sessions.
    pub fn delete_profile(&mut self, user: EntityId, id: EntityId) -> Result<(), StoreError> {
        self.own_account(user, id)?;
        self.accounts.retain(|account| account.profile.id != id);
        self.courses.retain(|owned| owned.owner != id);
        self.sessions.retain(|_, session| session.user_id != id);
        Ok(())
    }

    pub fn courses(&self, user: EntityId) -> Vec<Course> {
        self.courses
            .iter()
            .filter(|owned| owned.owner == user)
            .map(|owned| owned.course.clone())
            .collect()
    }

    pub fn create_course(&mut self, user: EntityId, payload: &Patch) -> Result<Course, StoreError> {
        let name = required_name(payload)?;
        let mut course = Course::new(self.allocate_id(), name);
        course
            .extra
            .insert("creator_id".to_string(), Value::from(user));
        self.courses.push(OwnedCourse {
            owner: user,
            course: course.clone(),
        });
        Ok(course)
    }

    pub fn update_course(
        &mut self,
        user: EntityId,
        course_id: EntityId,
        patch: &Patch,
    ) -> Result<Course, StoreError> {
        validate_name(patch)?;
        let course = self.course_mut(user, course_id)?;
        merge_into(course, &editable(patch, &["topics"]))
            .map_err(|_| StoreError::BadRequest("Invalid data"))?;
        Ok(course.clone())
    }

    pub fn delete_course(&mut self, user: EntityId, course_id: EntityId) -> Result<(), StoreError> {
        self.course_mut(user, course_id)?;
        self.courses.retain(|owned| owned.course.id != course_id);
        Ok(())
    }

    pub fn create_topic(
        &mut self,
        user: EntityId,
        course_id: EntityId,
        payload: &Patch,
    ) -> Result<Topic, StoreError> {
        let name = required_name(payload)?;
        let id = self.allocate_id();
        let course = self.course_mut(user, course_id)?;
        let mut topic = Topic::new(id, name);
        topic
            .extra
            .insert("creator_id".to_string(), Value::from(user));
        course.topics.push(topic.clone());
        Ok(topic)
    }

    pub fn update_topic(
        &mut self,
        user: EntityId,
        course_id: EntityId,
        topic_id: EntityId,
        patch: &Patch,
    ) -> Result<Topic, StoreError> {
        validate_name(patch)?;
        let topic = self.topic_mut(user, course_id, topic_id)?;
        merge_into(topic, &editable(patch, &["notes"]))
            .map_err(|_| StoreError::BadRequest("Invalid data"))?;
        Ok(topic.clone())
    }

    pub fn delete_topic(
        &mut self,
        user: EntityId,
        course_id: EntityId,
        topic_id: EntityId,
    ) -> Result<(), StoreError> {
        self.topic_mut(user, course_id, topic_id)?;
        let course = self.course_mut(user, course_id)?;
        course.topics.retain(|topic| topic.id != topic_id);
        Ok(())
    }

    pub fn create_note(
        &mut self,
        user: EntityId,
        course_id: EntityId,
        topic_id: EntityId,
        payload: &Patch,
    ) -> Result<Note, StoreError> {
        validate_note(payload)?;
        let id = self.allocate_id();
        let topic = self
            .topic_mut(user, course_id, topic_id)
            .map_err(|_| StoreError::BadRequest("Topic not associated with this course"))?;

        let mut fields = editable(payload, &[]);
        fields.insert("id".to_string(), Value::from(id));
        fields
            .entry("content".to_string())
            .or_insert_with(|| Value::from(""));
        let note: Note = serde_json::from_value(Value::Object(fields))
            .map_err(|_| StoreError::BadRequest("Invalid data"))?;
        topic.notes.push(note.clone());
        Ok(note)
    }

    pub fn update_note(
        &mut self,
        user: EntityId,
        address: (EntityId, EntityId, EntityId),
        patch: &Patch,
    ) -> Result<Note, StoreError> {
        validate_note(patch)?;
        let note = self.note_mut(user, address)?;
        merge_into(note, &editable(patch, &[]))
            .map_err(|_| StoreError::BadRequest("Invalid data"))?;
        Ok(note.clone())
    }

    pub fn delete_note(
        &mut self,
        user: EntityId,
        (course_id, topic_id, note_id): (EntityId, EntityId, EntityId),
    ) -> Result<(), StoreError> {
        let topic = self.topic_mut(user, course_id, topic_id)?;
        let before = topic.notes.len();
        topic.notes.retain(|note| note.id != note_id);
        if topic.notes.len() == before {
            return Err(StoreError::NotFound("Note"));
        }
        Ok(())
    }

    fn allocate_id(&mut self) -> EntityId {
        self.next_id += 1;
        self.next_id
    }

    fn own_account(&self, user: EntityId, id: EntityId) -> Result<&Account, StoreError> {
        if user != id {
            return Err(StoreError::Forbidden);
        }
        self.accounts
            .iter()
            .find(|account| account.profile.id == id)
            .ok_or(StoreError::NotFound("User"))
    }

    fn own_account_mut(
        &mut self,
        user: EntityId,
        id: EntityId,
    ) -> Result<&mut Account, StoreError> {
        if user != id {
            return Err(StoreError::Forbidden);
        }
        self.accounts
            .iter_mut()
            .find(|account| account.profile.id == id)
            .ok_or(StoreError::NotFound("User"))
    }

    fn course_mut(
        &mut self,
        user: EntityId,
        course_id: EntityId,
    ) -> Result<&mut Course, StoreError> {
        let owned = self
            .courses
            .iter_mut()
            .find(|owned| owned.course.id == course_id)
            .ok_or(StoreError::NotFound("Course"))?;
        if owned.owner != user {
            return Err(StoreError::Unauthorized("Unauthorized"));
        }
        Ok(&mut owned.course)
    }

    fn topic_mut(
        &mut self,
        user: EntityId,
        course_id: EntityId,
        topic_id: EntityId,
    ) -> Result<&mut Topic, StoreError> {
        self.course_mut(user, course_id)?
            .topics
            .iter_mut()
            .find(|topic| topic.id == topic_id)
            .ok_or(StoreError::NotFound("Topic"))
    }

    fn note_mut(
        &mut self,
        user: EntityId,
        (course_id, topic_id, note_id): (EntityId, EntityId, EntityId),
    ) -> Result<&mut Note, StoreError> {
        self.topic_mut(user, course_id, topic_id)?
            .notes
            .iter_mut()
            .find(|note| note.id == note_id)
            .ok_or(StoreError::NotFound("Note"))
    }
}

/// Patch without the fields clients may not set directly.
fn editable(patch: &Patch, children: &[&str]) -> Patch {
    let mut fields = local_fields(patch);
    for key in children {
        fields.remove(*key);
    }
    fields
}

fn check_length(
    errors: &mut Vec<(String, String)>,
    field: &str,
    value: &Value,
    min: usize,
    max: usize,
) {
    let message = match value.as_str().map(|s| s.trim().chars().count()) {
        None => "must be a string",
        Some(len) if len < min => "too short",
        Some(len) if len > max => "too long",
        Some(_) => return,
    };
    errors.push((field.to_string(), message.to_string()));
}

fn validate_name(patch: &Patch) -> Result<(), StoreError> {
    let mut errors = Vec::new();
    if let Some(name) = patch.get("name") {
        check_length(&mut errors, "name", name, NAME_MIN, NAME_MAX);
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(StoreError::Invalid(errors))
    }
}

fn required_name(payload: &Patch) -> Result<String, StoreError> {
    match payload.get("name") {
        None => Err(StoreError::Invalid(vec![(
            "name".to_string(),
            "required".to_string(),
        )])),
        Some(name) => {
            validate_name(payload)?;
            Ok(name.as_str().unwrap_or_default().trim().to_string())
        }
    }
}

fn validate_note(patch: &Patch) -> Result<(), StoreError> {
    validate_name(patch)?;
    match patch.get("content") {
        Some(content) if !content.is_string() => Err(StoreError::Invalid(vec![(
            "content".to_string(),
            "must be a string".to_string(),
        )])),
        _ => Ok(()),
    }
}
