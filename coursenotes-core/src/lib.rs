//! Course Notes Core Library
//!
//! Client-side state for the course notes app: typed addressing, the page
//! snapshot, the HTTP transport and the optimistic sync controller.

pub mod address;
pub mod api;
pub mod models;
pub mod patch;
pub mod snapshot;
pub mod sync;

pub use address::{AddressParseError, PageKey, ResourceAddress, API_PREFIX};
pub use api::{ApiError, ApiRequest, HttpTransport, Method, Transport, FETCH_FAILED};
pub use models::{Course, Entity, EntityId, Note, Profile, Topic};
pub use patch::{local_fields, patch_from, without_sensitive, Patch, SENSITIVE_FIELDS};
pub use snapshot::Snapshot;
pub use sync::{
    AuthProvider, Capabilities, CurrentUser, FlatDeletePolicy, Navigator, NoticeKind, Notifier,
    OpState, SyncController, SyncError,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
