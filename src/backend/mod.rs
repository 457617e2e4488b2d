//! Data-access seams. Controllers only ever see these traits.

mod credentials;
pub mod memory;
pub mod orm;

pub use credentials::{hash_password, validate_credentials, verify_password};

use crate::comment::{Comment, CommentChanges, NewComment};
use crate::error::BlogError;
use crate::pagination::RowRange;
use crate::post::{NewPost, Post, PostChanges};
use crate::session::{AuthEvents, Identity};
use crate::upload::SelectedFile;
use std::sync::Arc;

/// Identity issuance and session lookup.
#[async_trait::async_trait]
pub trait AuthBackend: Send + Sync {
    /// Registers a new user. Does not sign them in.
    async fn sign_up(&self, name: &str, password: &str) -> Result<Identity, BlogError>;
    /// Verifies credentials and returns a fresh session token.
    async fn sign_in(&self, name: &str, password: &str) -> Result<String, BlogError>;
    /// Resolves a token. Unknown or expired tokens resolve to `None`.
    async fn get_session(&self, token: &str) -> Result<Option<Identity>, BlogError>;
    async fn sign_out(&self, token: &str) -> Result<(), BlogError>;
    /// Notification hub for sign-in and sign-out of any token.
    fn events(&self) -> Arc<AuthEvents>;
}

/// Relational storage of posts and comments.
#[async_trait::async_trait]
pub trait BlogStore: Send + Sync {
    /// Posts in `range`, newest first, with the exact number of posts stored.
    async fn select_posts(&self, range: RowRange) -> Result<(Vec<Post>, u64), BlogError>;
    async fn find_post(&self, id: i32) -> Result<Option<Post>, BlogError>;
    async fn insert_post(&self, post: NewPost) -> Result<Post, BlogError>;
    async fn update_post(&self, id: i32, changes: PostChanges) -> Result<Post, BlogError>;
    async fn delete_post(&self, id: i32) -> Result<(), BlogError>;

    /// Comments of a post, oldest first.
    async fn select_comments(&self, post_id: i32) -> Result<Vec<Comment>, BlogError>;
    async fn find_comment(&self, id: i32) -> Result<Option<Comment>, BlogError>;
    async fn insert_comment(&self, comment: NewComment) -> Result<Comment, BlogError>;
    async fn update_comment(&self, id: i32, changes: CommentChanges)
        -> Result<Comment, BlogError>;
    async fn delete_comment(&self, id: i32) -> Result<(), BlogError>;
}

/// A single bucket of publicly readable objects.
#[async_trait::async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `file` under `key`. Without `upsert`, an existing key is an error.
    async fn upload(&self, key: &str, file: &SelectedFile, upsert: bool)
        -> Result<(), BlogError>;
    fn public_url(&self, key: &str) -> String;
}

/// Everything a controller may talk to, shared as app data.
#[derive(Clone)]
pub struct Backend {
    pub auth: Arc<dyn AuthBackend>,
    pub store: Arc<dyn BlogStore>,
    pub storage: Arc<dyn ObjectStorage>,
}

impl Backend {
    pub fn new(
        auth: Arc<dyn AuthBackend>,
        store: Arc<dyn BlogStore>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self {
            auth,
            store,
            storage,
        }
    }

    /// Fully in-process backend. Nothing survives a restart.
    pub fn in_memory(public_url: &str) -> Self {
        let data = Arc::new(memory::MemoryBackend::default());
        Self {
            auth: data.clone(),
            store: data,
            storage: Arc::new(memory::MemoryStorage::new(public_url)),
        }
    }
}
