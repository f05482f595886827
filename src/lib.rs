#![doc = include_str!("../README.md")]

pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod resource;
pub mod store;
pub mod types;

// Re-exports for convenient access
pub use api::{AuthApi, LoginUrlResponse, TokenResponse, UserInfo};
pub use config::{AfterLogin, SessionConfig, StatePolicy};
pub use controller::{Landing, SessionController};
pub use error::AuthError;
pub use resource::{ProtectedResource, ResourceReport};
#[cfg(feature = "file-store")]
pub use store::FileStore;
pub use store::{KeyValueStore, MemoryStore, StoreError, WriteBatch};
pub use types::{
    AccessToken, AuthMethod, Navigation, OAuthState, PendingRedirect, RedirectProvider, Session,
    SessionState,
};
