//! Shallow-merge patches applied to entities.
//!
//! A [`Patch`] is a JSON object whose top-level keys replace the matching
//! fields of an entity. Nested values are replaced wholesale, never merged.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Field set sent with create/update requests.
pub type Patch = Map<String, Value>;

/// Fields that are sent to the server but must never reach local state.
pub const SENSITIVE_FIELDS: &[&str] = &["current_password", "new_password", "password"];

/// Returns a copy of `patch` without [`SENSITIVE_FIELDS`].
pub fn without_sensitive(patch: &Patch) -> Patch {
    patch
        .iter()
        .filter(|(key, _)| !SENSITIVE_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// The part of `patch` that may be merged into a local entity: no
/// [`SENSITIVE_FIELDS`] and no `id`, which the server never changes.
pub fn local_fields(patch: &Patch) -> Patch {
    let mut fields = without_sensitive(patch);
    fields.remove("id");
    fields
}

/// Shallow-merges `patch` into `entity`.
///
/// The entity is only replaced once the merged value deserializes, so a
/// failed merge leaves it untouched.
pub fn merge_into<T>(entity: &mut T, patch: &Patch) -> Result<(), serde_json::Error>
where
    T: Serialize + DeserializeOwned,
{
    let mut value = serde_json::to_value(&*entity)?;
    if let Value::Object(fields) = &mut value {
        for (key, new_value) in patch {
            fields.insert(key.clone(), new_value.clone());
        }
    }
    *entity = serde_json::from_value(value)?;
    Ok(())
}

/// Builds a patch from `key = value` pairs.
pub fn patch_from<I, K>(pairs: I) -> Patch
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
