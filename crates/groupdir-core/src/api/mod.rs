//! Directory API module.
//!
//! This module provides the `DirectoryClient` for the group provisioning
//! feeds, the `Transport` seam every HTTP exchange goes through, and the
//! classifier that turns a status code plus response body into one `Outcome`.
//!
//! Requests authenticate with the token held by the session manager in
//! [`crate::auth`], sent as `Authorization: GoogleLogin Auth=<token>`.

pub mod classify;
pub mod client;
pub mod error;
pub mod transport;

pub use classify::{classify, EmbeddedError, Outcome, ENTITY_NOT_VALID};
pub use client::DirectoryClient;
pub use error::{ApiError, ClassifiedError, LoginFailure, ParseFailure, SessionError, TransportError};
pub use transport::{
    HttpRequest, HttpResponse, HttpTransport, Transport, ATOM_CONTENT_TYPE,
    DEFAULT_REQUEST_TIMEOUT_SECS, FORM_CONTENT_TYPE,
};

#[cfg(test)]
pub(crate) use transport::mock;
