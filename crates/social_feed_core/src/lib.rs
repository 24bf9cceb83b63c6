pub mod domain;
pub mod feed;
pub mod image;
pub mod ports;
pub mod session;
pub mod storage;

pub use domain::{
    Credential, ImageDimensions, ImageFile, NewPost, Post, PostAuthor, Registration, Session,
    TargetDimensions, User, UserProfile,
};
pub use feed::{FeedService, PostDraft, PostList, ProfileView};
pub use image::{ImageJob, ImageResizer, Preset, ResizeOutcome};
pub use ports::{
    Failure, FeedBackend, ImageCodec, KeyValueStore, Outcome, PortError, PortResult,
};
pub use session::{AuthState, SessionManager};
pub use storage::{MemoryStore, StorageGuard};
