//! Supabase Management API client
//!
//! `Client` issues JSON requests through a `Transport`; endpoint groups hang
//! off it the way the API paths nest:
//!
//! ```text
//! client.projects().get(project_ref)
//! client.projects().settings(project_ref).auth()
//! ```

pub mod client;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod projects;
pub mod transport;

pub use client::{Client, ClientConfig, DEFAULT_ENDPOINT};
pub use error::ApiError;
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport, TransportError};
