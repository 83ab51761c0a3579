//! FOLIO catalog access over the Okapi gateway.
//!
//! [`FolioClient`] logs in with a username and password, keeps the session
//! token and sends it with every request. An expired session (`401`) is
//! renewed once per request before the request is replayed.

mod client;

pub use client::{FolioClient, LOGIN_PATH, TENANT_HEADER, TOKEN_HEADER};
