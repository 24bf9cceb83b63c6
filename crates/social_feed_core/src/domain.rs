//! crates/social_feed_core/src/domain.rs
//!
//! Defines the core data structures for the social feed client.
//! Wire formats live in the adapters; only the persisted user record
//! carries serde derives here because the session layer stores it.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The bearer token proving an authenticated session.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// A user account as the client knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

/// The authenticated identity held by the session manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: User,
    pub credential: Credential,
}

/// Data submitted when creating an account. Registration never signs in.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

/// The public slice of a user embedded in every post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostAuthor {
    pub id: String,
    pub name: String,
    pub username: String,
}

/// A single post. Identity is assigned by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub content: String,
    pub image_url: Option<String>,
    pub author: PostAuthor,
    pub created_at: DateTime<Utc>,
}

/// A user together with the posts they authored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub user: User,
    pub posts: Vec<Post>,
}

/// A file-like blob: a name, a MIME type, and its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Natural pixel dimensions of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
    /// width / height
    pub aspect_ratio: f64,
}

impl ImageDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        let aspect_ratio = if height == 0 {
            1.0
        } else {
            width as f64 / height as f64
        };
        Self {
            width,
            height,
            aspect_ratio,
        }
    }
}

/// Requested output size of a resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDimensions {
    pub width: u32,
    pub height: u32,
}

/// Content and image ready to be sent to `POST /posts`.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub content: String,
    pub image: ImageFile,
}
