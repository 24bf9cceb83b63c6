//! services/client/src/adapters/http.rs
//!
//! This module contains the REST backend adapter, which implements the
//! `FeedBackend` port over HTTP with `reqwest`.
//!
//! Successful responses are wrapped as `{ "data": ... }`, failures carry
//! `{ "message": ... }`. The bearer credential is attached per request from
//! the argument it is given; the client holds no default auth header.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{multipart, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use social_feed_core::domain::{
    Credential, NewPost, Post, PostAuthor, Registration, Session, User, UserProfile,
};
use social_feed_core::ports::{FeedBackend, PortError, PortResult};
use std::time::Duration;
use tracing::{debug, error};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// REST client for the social feed backend.
#[derive(Clone)]
pub struct HttpBackend {
    http_client: reqwest::Client,
    api_url: Url,
}

impl HttpBackend {
    /// Creates a new `HttpBackend` rooted at `api_url` (e.g. `http://host/api`).
    pub fn new(api_url: &str, timeout: Duration) -> PortResult<Self> {
        let api_url = Url::parse(api_url).map_err(|e| PortError::Unexpected(e.to_string()))?;
        if api_url.cannot_be_a_base() {
            return Err(PortError::Unexpected(format!(
                "'{}' cannot be used as a base URL",
                api_url
            )));
        }
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(Self {
            http_client,
            api_url,
        })
    }

    /// Appends percent-encoded path segments to the API root.
    fn endpoint(&self, segments: &[&str]) -> PortResult<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| PortError::Unexpected("API URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        segments: &[&str],
        credential: Option<&Credential>,
    ) -> PortResult<RequestBuilder> {
        let url = self.endpoint(segments)?;
        debug!(%method, %url, authenticated = credential.is_some(), "Sending request");
        let builder = self
            .http_client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        Ok(match credential {
            Some(credential) => builder.header(reqwest::header::AUTHORIZATION, credential.bearer()),
            None => builder,
        })
    }

    /// Sends the request and decodes the JSON body, mapping failures onto
    /// `PortError` with any server-supplied message.
    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> PortResult<T> {
        let response = builder
            .send()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message);
            error!(status = %status, message = ?message, "Request failed");
            return Err(PortError::Server {
                status: status.as_u16(),
                message,
            });
        }

        // Some endpoints answer 204 with nothing to decode.
        if status == StatusCode::NO_CONTENT {
            return serde_json::from_str("null").map_err(|e| PortError::Unexpected(e.to_string()));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Malformed response body: {}", e)))
    }

    async fn send_data<T: DeserializeOwned>(&self, builder: RequestBuilder) -> PortResult<T> {
        let envelope: Envelope<T> = self.send_json(builder).await?;
        envelope
            .data
            .ok_or_else(|| PortError::Unexpected("Response is missing `data`".to_string()))
    }
}

//=========================================================================================
// Wire Records
//=========================================================================================

#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Ids arrive as strings or numbers depending on the backend's store.
fn flexible_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRecord {
    access_token: String,
    user: UserRecord,
}

#[derive(Deserialize)]
struct UserRecord {
    #[serde(alias = "_id", deserialize_with = "flexible_id")]
    id: String,
    name: String,
    username: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    bio: Option<String>,
}

impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            name: self.name,
            username: self.username,
            email: self.email.unwrap_or_default(),
            bio: self.bio,
        }
    }
}

#[derive(Deserialize)]
struct AuthorRecord {
    #[serde(alias = "_id", deserialize_with = "flexible_id")]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    username: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostRecord {
    #[serde(alias = "_id", deserialize_with = "flexible_id")]
    id: String,
    content: String,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    author: Option<AuthorRecord>,
    created_at: DateTime<Utc>,
}

impl PostRecord {
    fn to_domain(self) -> Post {
        let author = self.author.map_or_else(
            || PostAuthor {
                id: String::new(),
                name: String::new(),
                username: String::new(),
            },
            |a| PostAuthor {
                id: a.id,
                name: a.name,
                username: a.username,
            },
        );
        Post {
            id: self.id,
            content: self.content,
            image_url: self.image_url,
            author,
            created_at: self.created_at,
        }
    }
}

fn posts_to_domain(records: Option<Vec<PostRecord>>) -> Vec<Post> {
    records
        .unwrap_or_default()
        .into_iter()
        .map(PostRecord::to_domain)
        .collect()
}

#[derive(Deserialize)]
struct ProfileRecord {
    user: UserRecord,
    #[serde(default)]
    posts: Vec<PostRecord>,
}

#[derive(Deserialize)]
struct BioRecord {
    bio: String,
}

//=========================================================================================
// `FeedBackend` Trait Implementation
//=========================================================================================

#[async_trait]
impl FeedBackend for HttpBackend {
    async fn login(&self, email: &str, password: &str) -> PortResult<Session> {
        let builder = self
            .request(Method::POST, &["users", "login"], None)?
            .json(&serde_json::json!({ "email": email, "password": password }));
        let record: LoginRecord = self.send_data(builder).await?;
        Ok(Session {
            user: record.user.to_domain(),
            credential: Credential::new(record.access_token),
        })
    }

    async fn register(&self, registration: &Registration) -> PortResult<serde_json::Value> {
        let builder = self
            .request(Method::POST, &["users"], None)?
            .json(registration);
        self.send_json(builder).await
    }

    async fn update_bio(&self, credential: Option<&Credential>, bio: &str) -> PortResult<String> {
        let builder = self
            .request(Method::PUT, &["users", "bio"], credential)?
            .json(&serde_json::json!({ "bio": bio }));
        let record: BioRecord = self.send_data(builder).await?;
        Ok(record.bio)
    }

    async fn list_posts(&self, credential: Option<&Credential>) -> PortResult<Vec<Post>> {
        let builder = self.request(Method::GET, &["posts"], credential)?;
        let envelope: Envelope<Vec<PostRecord>> = self.send_json(builder).await?;
        Ok(posts_to_domain(envelope.data))
    }

    async fn list_posts_for_user(
        &self,
        credential: Option<&Credential>,
        user_id: &str,
    ) -> PortResult<Vec<Post>> {
        let builder = self
            .request(Method::GET, &["posts"], credential)?
            .query(&[("userId", user_id)]);
        let envelope: Envelope<Vec<PostRecord>> = self.send_json(builder).await?;
        Ok(posts_to_domain(envelope.data))
    }

    async fn user_profile(
        &self,
        credential: Option<&Credential>,
        username: &str,
    ) -> PortResult<UserProfile> {
        let builder = self.request(Method::GET, &["posts", "user", username], credential)?;
        let record: ProfileRecord = self.send_data(builder).await?;
        Ok(UserProfile {
            user: record.user.to_domain(),
            posts: record.posts.into_iter().map(PostRecord::to_domain).collect(),
        })
    }

    async fn create_post(&self, credential: Option<&Credential>, post: &NewPost) -> PortResult<Post> {
        let image = multipart::Part::bytes(post.image.data.to_vec())
            .file_name(post.image.name.clone())
            .mime_str(&post.image.mime_type)
            .map_err(|e| PortError::Validation(e.to_string()))?;
        let form = multipart::Form::new()
            .text("content", post.content.clone())
            .part("image", image);

        let builder = self
            .request(Method::POST, &["posts"], credential)?
            .multipart(form);
        let record: PostRecord = self.send_data(builder).await?;
        Ok(record.to_domain())
    }

    async fn delete_post(&self, credential: Option<&Credential>, post_id: &str) -> PortResult<()> {
        let builder = self.request(Method::DELETE, &["posts", post_id], credential)?;
        let _: serde_json::Value = self.send_json(builder).await?;
        Ok(())
    }
}
