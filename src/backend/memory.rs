//! In-process backends. Used by the test suite and for running without infrastructure.

use super::{hash_password, validate_credentials, verify_password};
use super::{AuthBackend, BlogStore, ObjectStorage};
use crate::comment::{Comment, CommentChanges, NewComment};
use crate::error::BlogError;
use crate::pagination::RowRange;
use crate::post::{NewPost, Post, PostChanges};
use crate::session::{AuthEvent, AuthEvents, Identity};
use crate::upload::SelectedFile;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct UserRecord {
    identity: Identity,
    password: String,
}

/// Users, sessions, posts and comments held in concurrent maps.
#[derive(Debug)]
pub struct MemoryBackend {
    events: Arc<AuthEvents>,
    /// Keyed by user name.
    users: DashMap<String, UserRecord>,
    /// Keyed by session token.
    sessions: DashMap<String, Identity>,
    posts: DashMap<i32, Post>,
    comments: DashMap<i32, Comment>,
    next_post_id: AtomicI32,
    next_comment_id: AtomicI32,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self {
            events: AuthEvents::new(),
            users: DashMap::new(),
            sessions: DashMap::new(),
            posts: DashMap::new(),
            comments: DashMap::new(),
            next_post_id: AtomicI32::new(1),
            next_comment_id: AtomicI32::new(1),
        }
    }
}

impl MemoryBackend {
    pub fn post_count(&self) -> usize {
        self.posts.len()
    }

    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }
}

#[async_trait::async_trait]
impl AuthBackend for MemoryBackend {
    async fn sign_up(&self, name: &str, password: &str) -> Result<Identity, BlogError> {
        let name = validate_credentials(name, password)?;
        let password = hash_password(password)?;

        match self.users.entry(name.to_owned()) {
            Entry::Occupied(_) => Err(BlogError::validation("User already registered")),
            Entry::Vacant(entry) => {
                let identity = Identity {
                    id: uuid::Uuid::new_v4().to_string(),
                    name,
                };
                entry.insert(UserRecord {
                    identity: identity.clone(),
                    password,
                });
                Ok(identity)
            }
        }
    }

    async fn sign_in(&self, name: &str, password: &str) -> Result<String, BlogError> {
        let identity = match self.users.get(name.trim()) {
            Some(user) if verify_password(password, &user.password) => user.identity.clone(),
            _ => return Err(BlogError::validation("Invalid login credentials")),
        };

        let token = uuid::Uuid::new_v4().to_string();
        self.sessions.insert(token.to_owned(), identity.clone());
        self.events.publish(AuthEvent::SignedIn {
            token: token.to_owned(),
            identity,
        });
        Ok(token)
    }

    async fn get_session(&self, token: &str) -> Result<Option<Identity>, BlogError> {
        Ok(self.sessions.get(token).map(|s| s.value().clone()))
    }

    async fn sign_out(&self, token: &str) -> Result<(), BlogError> {
        if self.sessions.remove(token).is_some() {
            self.events.publish(AuthEvent::SignedOut {
                token: token.to_owned(),
            });
        }
        Ok(())
    }

    fn events(&self) -> Arc<AuthEvents> {
        self.events.clone()
    }
}

#[async_trait::async_trait]
impl BlogStore for MemoryBackend {
    async fn select_posts(&self, range: RowRange) -> Result<(Vec<Post>, u64), BlogError> {
        let mut posts: Vec<Post> = self.posts.iter().map(|p| p.value().clone()).collect();
        posts.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let total = posts.len() as u64;
        let page = posts
            .into_iter()
            .skip(usize::try_from(range.from).unwrap_or(usize::MAX))
            .take(usize::try_from(range.limit()).unwrap_or(usize::MAX))
            .collect();
        Ok((page, total))
    }

    async fn find_post(&self, id: i32) -> Result<Option<Post>, BlogError> {
        Ok(self.posts.get(&id).map(|p| p.value().clone()))
    }

    async fn insert_post(&self, post: NewPost) -> Result<Post, BlogError> {
        let post = Post {
            id: self.next_post_id.fetch_add(1, Ordering::SeqCst),
            title: post.title,
            content: post.content,
            author_id: post.author_id,
            image_url: post.image_url,
            created_at: Utc::now().naive_utc(),
        };
        self.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn update_post(&self, id: i32, changes: PostChanges) -> Result<Post, BlogError> {
        let mut post = self
            .posts
            .get_mut(&id)
            .ok_or_else(|| BlogError::not_found("Post not found."))?;
        post.title = changes.title;
        post.content = changes.content;
        post.image_url = changes.image_url;
        Ok(post.value().clone())
    }

    async fn delete_post(&self, id: i32) -> Result<(), BlogError> {
        self.posts.remove(&id);
        Ok(())
    }

    async fn select_comments(&self, post_id: i32) -> Result<Vec<Comment>, BlogError> {
        let mut comments: Vec<Comment> = self
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .map(|c| c.value().clone())
            .collect();
        comments.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(comments)
    }

    async fn find_comment(&self, id: i32) -> Result<Option<Comment>, BlogError> {
        Ok(self.comments.get(&id).map(|c| c.value().clone()))
    }

    async fn insert_comment(&self, comment: NewComment) -> Result<Comment, BlogError> {
        let comment = Comment {
            id: self.next_comment_id.fetch_add(1, Ordering::SeqCst),
            post_id: comment.post_id,
            author_id: comment.author_id,
            content: comment.content,
            image_url: comment.image_url,
            created_at: Utc::now().naive_utc(),
        };
        self.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn update_comment(
        &self,
        id: i32,
        changes: CommentChanges,
    ) -> Result<Comment, BlogError> {
        let mut comment = self
            .comments
            .get_mut(&id)
            .ok_or_else(|| BlogError::not_found("Comment not found."))?;
        comment.content = changes.content;
        comment.image_url = changes.image_url;
        Ok(comment.value().clone())
    }

    async fn delete_comment(&self, id: i32) -> Result<(), BlogError> {
        self.comments.remove(&id);
        Ok(())
    }
}

#[derive(Debug)]
struct StoredObject {
    content_type: String,
    data: Vec<u8>,
}

/// Object storage that keeps uploads in memory and hands out URLs under `public_url`.
#[derive(Debug)]
pub struct MemoryStorage {
    public_url: String,
    objects: DashMap<String, StoredObject>,
}

impl MemoryStorage {
    pub fn new(public_url: &str) -> Self {
        Self {
            public_url: public_url.trim_end_matches('/').to_owned(),
            objects: DashMap::new(),
        }
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Returns the content type and bytes stored under `key`.
    pub fn get(&self, key: &str) -> Option<(String, Vec<u8>)> {
        self.objects
            .get(key)
            .map(|o| (o.content_type.to_owned(), o.data.to_owned()))
    }
}

#[async_trait::async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(&self, key: &str, file: &SelectedFile, upsert: bool) -> Result<(), BlogError> {
        let object = StoredObject {
            content_type: file.content_type.to_string(),
            data: file.data.to_owned(),
        };

        match self.objects.entry(key.to_owned()) {
            Entry::Occupied(_) if !upsert => {
                Err(BlogError::remote("The resource already exists"))
            }
            Entry::Occupied(mut entry) => {
                entry.insert(object);
                Ok(())
            }
            Entry::Vacant(entry) => {
                entry.insert(object);
                Ok(())
            }
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[actix_rt::test]
    async fn test_sign_up_rejects_duplicates() {
        let auth = MemoryBackend::default();
        let alice = auth.sign_up(" alice ", "hunter22").await.unwrap();
        assert_eq!(alice.name, "alice");
        assert!(!alice.id.is_empty());

        let err = auth.sign_up("alice", "other-pass").await.unwrap_err();
        assert!(err.is(ErrorKind::Validation));
    }

    #[actix_rt::test]
    async fn test_sign_in_and_out() {
        let auth = MemoryBackend::default();
        let alice = auth.sign_up("alice", "hunter22").await.unwrap();

        assert!(auth.sign_in("alice", "wrong-pass").await.is_err());
        assert!(auth.sign_in("nobody", "hunter22").await.is_err());

        let token = auth.sign_in("alice", "hunter22").await.unwrap();
        assert_eq!(auth.get_session(&token).await.unwrap(), Some(alice));

        auth.sign_out(&token).await.unwrap();
        assert_eq!(auth.get_session(&token).await.unwrap(), None);
    }

    #[actix_rt::test]
    async fn test_select_posts_counts_everything() {
        let store = MemoryBackend::default();
        for i in 0..12 {
            store
                .insert_post(NewPost {
                    title: format!("t{}", i),
                    content: "c".to_owned(),
                    author_id: "U1".to_owned(),
                    image_url: None,
                })
                .await
                .unwrap();
        }

        let (rows, total) = store
            .select_posts(RowRange { from: 10, to: 14 })
            .await
            .unwrap();
        assert_eq!(total, 12);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].title, "t0");
    }

    #[actix_rt::test]
    async fn test_storage_upsert() {
        let storage = MemoryStorage::new("http://localhost/storage/");
        let file = SelectedFile {
            name: "a.png".to_owned(),
            content_type: mime::IMAGE_PNG,
            data: vec![1, 2, 3],
        };

        storage.upload("k.png", &file, false).await.unwrap();
        assert!(storage.upload("k.png", &file, false).await.is_err());
        storage.upload("k.png", &file, true).await.unwrap();

        assert_eq!(storage.public_url("k.png"), "http://localhost/storage/k.png");
        assert_eq!(
            storage.get("k.png"),
            Some(("image/png".to_owned(), vec![1, 2, 3]))
        );
    }
}
