//! Session client used by the frontend to talk to the auth API.

pub mod api;
pub mod error;
pub mod session;
pub mod store;

pub use api::{AuthApi, HttpAuthApi};
pub use error::ClientError;
pub use session::{Session, SessionState, ERROR_TTL};
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
