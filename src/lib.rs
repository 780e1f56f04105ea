//! Course notes development server, shared by the `notes-server` binary and
//! the end-to-end tests.

pub mod server;
