//! crates/social_feed_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the client's core logic.
//! The REST backend, the persistent key-value store and the image codec sit
//! behind these traits so the core never touches the network, the disk or a
//! pixel buffer directly.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::{
    Credential, ImageDimensions, NewPost, Post, Registration, Session, UserProfile,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// Rejected locally before any request was sent.
    #[error("Validation failed: {0}")]
    Validation(String),
    /// The backend answered with a non-success status.
    #[error("Server responded with {status}")]
    Server { status: u16, message: Option<String> },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Image error: {0}")]
    Image(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    /// The message to show a user: the server-supplied one when present,
    /// a validation reason as-is, otherwise `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            PortError::Server {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            PortError::Validation(reason) => reason.clone(),
            _ => fallback.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PortError::NotFound(_) | PortError::Server { status: 404, .. }
        )
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// User-facing Outcome
//=========================================================================================

/// A failed user action, carrying only the message meant for display.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct Failure {
    pub message: String,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Tagged result of a session or view operation. Never carries a fault
/// the caller did not ask for: every error is already a display message.
pub type Outcome<T> = Result<T, Failure>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Persistent, per-profile string key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> PortResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> PortResult<()>;
    fn remove(&self, key: &str) -> PortResult<()>;
    fn clear(&self) -> PortResult<()>;
}

/// The REST backend. Authenticated calls receive the credential explicitly.
#[async_trait]
pub trait FeedBackend: Send + Sync {
    // --- Users ---
    /// `POST /users/login`
    async fn login(&self, email: &str, password: &str) -> PortResult<Session>;

    /// `POST /users`; returns the raw `data` payload of the response.
    async fn register(&self, registration: &Registration) -> PortResult<serde_json::Value>;

    /// `PUT /users/bio`; returns the bio as stored by the server.
    async fn update_bio(&self, credential: Option<&Credential>, bio: &str) -> PortResult<String>;

    // --- Posts ---
    /// `GET /posts`
    async fn list_posts(&self, credential: Option<&Credential>) -> PortResult<Vec<Post>>;

    /// `GET /posts?userId=`
    async fn list_posts_for_user(
        &self,
        credential: Option<&Credential>,
        user_id: &str,
    ) -> PortResult<Vec<Post>>;

    /// `GET /posts/user/{username}`
    async fn user_profile(
        &self,
        credential: Option<&Credential>,
        username: &str,
    ) -> PortResult<UserProfile>;

    /// `POST /posts` as multipart form data.
    async fn create_post(&self, credential: Option<&Credential>, post: &NewPost) -> PortResult<Post>;

    /// `DELETE /posts/{id}`
    async fn delete_post(&self, credential: Option<&Credential>, post_id: &str) -> PortResult<()>;
}

/// Decodes and re-encodes raster images.
#[async_trait]
pub trait ImageCodec: Send + Sync {
    /// Reads the natural dimensions of an encoded image.
    async fn probe(&self, data: Bytes) -> PortResult<ImageDimensions>;

    /// Scales to exactly `width` x `height` and re-encodes as JPEG.
    /// `quality` is in `0.0..=1.0`, 1.0 being least lossy.
    async fn resize(&self, data: Bytes, width: u32, height: u32, quality: f32) -> PortResult<Bytes>;
}
