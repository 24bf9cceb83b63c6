//! crates/social_feed_core/src/feed.rs
//!
//! Home feed and profile views: local post lists, draft and bio validation,
//! and the backend calls behind them. Lists are a best-effort cache that is
//! mutated optimistically; nothing here reconciles ordering with the server.

use chrono::{DateTime, TimeZone};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::domain::{ImageFile, NewPost, Post, User};
use crate::ports::{Failure, FeedBackend, Outcome};
use crate::session::SessionManager;

pub const MAX_POST_LENGTH: usize = 500;
pub const MAX_BIO_LENGTH: usize = 500;

/// Shown before a post is deleted.
pub const DELETE_PROMPT: &str = "Are you sure you want to delete this post?";

/// `Mon D, YYYY, HH:MM AM/PM` in the zone of `at`.
pub fn format_post_date<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.format("%b %-d, %Y, %I:%M %p").to_string()
}

/// Only the author may delete a post.
pub fn can_delete(post: &Post, current_user: Option<&User>) -> bool {
    current_user.is_some_and(|user| user.id == post.author.id)
}

//=========================================================================================
// Drafts and validation
//=========================================================================================

/// A post being composed. Validation happens before any request is sent.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    content: String,
    image: Option<ImageFile>,
}

impl PostDraft {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            image: None,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    pub fn image(&self) -> Option<&ImageFile> {
        self.image.as_ref()
    }

    pub fn attach_image(&mut self, image: ImageFile) {
        self.image = Some(image);
    }

    pub fn clear_image(&mut self) {
        self.image = None;
    }

    /// Characters left before the limit. Negative when over it.
    pub fn remaining(&self) -> i64 {
        MAX_POST_LENGTH as i64 - self.content.chars().count() as i64
    }

    pub fn validate(&self) -> Outcome<NewPost> {
        if self.content.trim().is_empty() {
            return Err(Failure::new("Please enter some content"));
        }
        let Some(image) = &self.image else {
            return Err(Failure::new("Please select an image"));
        };
        if self.content.chars().count() > MAX_POST_LENGTH {
            return Err(Failure::new(format!(
                "Post content must be {} characters or less",
                MAX_POST_LENGTH
            )));
        }
        Ok(NewPost {
            content: self.content.clone(),
            image: image.clone(),
        })
    }

    /// Empties the draft after a successful submit.
    pub fn reset(&mut self) {
        self.content.clear();
        self.image = None;
    }
}

/// Returns the trimmed bio, or the reason it was rejected.
pub fn validate_bio(bio: &str) -> Outcome<String> {
    let trimmed = bio.trim();
    if trimmed.is_empty() {
        return Err(Failure::new("Bio cannot be empty"));
    }
    if bio.chars().count() > MAX_BIO_LENGTH {
        return Err(Failure::new("Bio must be less than 500 characters"));
    }
    Ok(trimmed.to_string())
}

//=========================================================================================
// Local lists
//=========================================================================================

/// The fetched posts, newest first, mutated locally on create/delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostList {
    posts: Vec<Post>,
}

impl PostList {
    pub fn new(posts: Vec<Post>) -> Self {
        Self { posts }
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn get(&self, post_id: &str) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == post_id)
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn prepend(&mut self, post: Post) {
        self.posts.insert(0, post);
    }

    /// Returns whether a post was removed.
    pub fn remove(&mut self, post_id: &str) -> bool {
        let before = self.posts.len();
        self.posts.retain(|p| p.id != post_id);
        self.posts.len() != before
    }
}

/// A profile page: the user, their posts, and whether it is the viewer's own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileView {
    pub user: User,
    pub posts: PostList,
    pub is_own: bool,
}

//=========================================================================================
// Feed Service
//=========================================================================================

/// Issues the feed and profile requests with the session's credential.
#[derive(Clone)]
pub struct FeedService {
    backend: Arc<dyn FeedBackend>,
    session: Arc<SessionManager>,
}

impl FeedService {
    pub fn new(backend: Arc<dyn FeedBackend>, session: Arc<SessionManager>) -> Self {
        Self { backend, session }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// `GET /posts`
    pub async fn home(&self) -> Outcome<PostList> {
        let credential = self.session.credential();
        match self.backend.list_posts(credential.as_ref()).await {
            Ok(posts) => Ok(PostList::new(posts)),
            Err(e) => {
                error!("Error fetching posts: {}", e);
                Err(Failure::new("Failed to fetch posts"))
            }
        }
    }

    /// Validates the draft, submits it, and prepends the created post.
    pub async fn create_post(&self, list: &mut PostList, draft: &PostDraft) -> Outcome<Post> {
        let new_post = draft.validate()?;
        let credential = self.session.credential();
        match self.backend.create_post(credential.as_ref(), &new_post).await {
            Ok(post) => {
                info!(post_id = %post.id, "Post created");
                list.prepend(post.clone());
                Ok(post)
            }
            Err(e) => {
                warn!("Failed to create post: {}", e);
                Err(Failure::new(e.user_message("Failed to create post")))
            }
        }
    }

    /// Deletes one of the viewer's own posts after `confirm` accepts
    /// [`DELETE_PROMPT`]. Returns `Ok(false)` when the prompt is declined.
    pub async fn delete_post(
        &self,
        list: &mut PostList,
        post_id: &str,
        confirm: impl FnOnce(&str) -> bool,
    ) -> Outcome<bool> {
        let Some(post) = list.get(post_id) else {
            return Err(Failure::new("Post not found"));
        };
        let current_user = self.session.current_user();
        if !can_delete(post, current_user.as_ref()) {
            return Err(Failure::new("You can only delete your own posts"));
        }
        if !confirm(DELETE_PROMPT) {
            return Ok(false);
        }

        let credential = self.session.credential();
        match self.backend.delete_post(credential.as_ref(), post_id).await {
            Ok(()) => {
                info!(post_id, "Post deleted");
                list.remove(post_id);
                Ok(true)
            }
            Err(e) => {
                error!("Error deleting post: {}", e);
                Err(Failure::new("Failed to delete post. Please try again."))
            }
        }
    }

    /// Profile by user id. Only the viewer's own profile can be shown this way.
    pub async fn profile_by_id(&self, user_id: &str) -> Outcome<ProfileView> {
        if user_id.is_empty() {
            return Err(Failure::new("No user ID provided"));
        }
        let Some(current_user) = self.session.current_user() else {
            return Err(Failure::new("User not authenticated"));
        };
        if current_user.id != user_id {
            return Err(Failure::new("Profile not found"));
        }

        let credential = self.session.credential();
        match self
            .backend
            .list_posts_for_user(credential.as_ref(), user_id)
            .await
        {
            Ok(posts) => Ok(ProfileView {
                user: current_user,
                posts: PostList::new(posts),
                is_own: true,
            }),
            Err(e) => {
                error!("Error fetching profile: {}", e);
                Err(Failure::new("Failed to load profile"))
            }
        }
    }

    /// `GET /posts/user/{username}`
    pub async fn profile_by_username(&self, username: &str) -> Outcome<ProfileView> {
        let credential = self.session.credential();
        match self
            .backend
            .user_profile(credential.as_ref(), username)
            .await
        {
            Ok(profile) => {
                let is_own = self
                    .session
                    .current_user()
                    .is_some_and(|user| user.username == username);
                Ok(ProfileView {
                    user: profile.user,
                    posts: PostList::new(profile.posts),
                    is_own,
                })
            }
            Err(e) if e.is_not_found() => Err(Failure::new("User not found")),
            Err(e) => {
                error!("Error fetching user profile: {}", e);
                Err(Failure::new("Failed to load user profile"))
            }
        }
    }

    /// Validates and saves the viewer's bio, then mirrors the stored value
    /// into the session and, when given, the open profile.
    pub async fn update_bio(&self, bio: &str, profile: Option<&mut ProfileView>) -> Outcome<String> {
        let bio = validate_bio(bio)?;
        let credential = self.session.credential();
        let saved = self
            .backend
            .update_bio(credential.as_ref(), &bio)
            .await
            .map_err(|e| {
                warn!("Failed to update bio: {}", e);
                Failure::new(e.user_message("Failed to update bio"))
            })?;

        self.session.update_user_bio(&saved);
        if let Some(profile) = profile {
            if profile.is_own {
                profile.user.bio = Some(saved.clone());
            }
        }
        Ok(saved)
    }
}
