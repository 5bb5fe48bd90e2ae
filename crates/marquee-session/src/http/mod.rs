/*
[INPUT]:  Client configuration, token manager, API endpoints
[OUTPUT]: Authenticated JSON calls with refresh-and-retry, typed auth API, errors
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding new endpoints or changing interceptor behavior
*/

pub mod auth;
pub mod client;
pub mod error;

pub use client::{ApiClient, ClientConfig};
pub use error::{
    RefreshError, Result, SessionError, is_transient_status, normalize_error_message,
};
