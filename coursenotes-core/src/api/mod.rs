//! HTTP access to the REST backend.
//!
//! The controller only sees the [`Transport`] trait. [`HttpTransport`] is
//! the `reqwest` implementation: it keeps a cookie jar for the session and
//! copies the CSRF cookie into a header on every mutating request.

mod error;
mod http;
mod transport;

pub use error::{ApiError, FieldError, FETCH_FAILED};
pub use http::{HttpTransport, CSRF_HEADER, DEFAULT_CSRF_COOKIE};
pub use transport::{ApiRequest, Method, Transport};
