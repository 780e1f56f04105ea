//! Optimistic synchronisation of page data with the backend.
//!
//! [`SyncController`] owns the [`Snapshot`](crate::snapshot::Snapshot) of the
//! current page. Updates are applied locally first and rolled back when the
//! server rejects them; creates and nested deletes only touch local state
//! after the server confirms.
//!
//! Collaborators (current user, notifications, navigation) are passed in as
//! [`Capabilities`] rather than looked up globally.

mod capabilities;
mod controller;
mod error;
mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use capabilities::{AuthProvider, Capabilities, CurrentUser, Navigator, NoticeKind, Notifier};
pub use controller::{FlatDeletePolicy, SyncController};
pub use error::SyncError;
pub use state::OpState;
