use crate::backend::BlogStore;
use crate::error::BlogError;
use crate::session::Identity;
use crate::ugc::{clean_text, require_identity, require_owner, Authored, ImageChange};
use chrono::NaiveDateTime;

const COMMENT_REQUIRED: &str = "Comment cannot be empty.";
const COMMENT_NOT_FOUND: &str = "Comment not found.";

/// A reply attached to exactly one post.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Comment {
    pub id: i32,
    pub post_id: i32,
    pub author_id: String,
    pub content: String,
    pub image_url: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Comment {
    pub fn created_at_string(&self) -> String {
        self.created_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

impl Authored for Comment {
    fn author_id(&self) -> &str {
        &self.author_id
    }
}

#[derive(Clone, Debug)]
pub struct NewComment {
    pub post_id: i32,
    pub author_id: String,
    pub content: String,
    pub image_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CommentChanges {
    pub content: String,
    pub image_url: Option<String>,
}

/// Unvalidated comment form input.
#[derive(Clone, Debug, Default)]
pub struct CommentDraft {
    pub content: String,
    pub image: ImageChange,
}

/// Comments of one post. Every mutation is followed by a fresh read of the thread.
pub struct CommentThread<'a> {
    store: &'a dyn BlogStore,
    viewer: Option<&'a Identity>,
}

impl CommentDraft {
    /// Trimmed content, which is required.
    pub fn clean(&self) -> Result<String, BlogError> {
        clean_text(&self.content, COMMENT_REQUIRED)
    }
}

impl<'a> CommentThread<'a> {
    pub fn new(store: &'a dyn BlogStore, viewer: Option<&'a Identity>) -> Self {
        Self { store, viewer }
    }

    /// Comments of `post_id`, oldest first.
    pub async fn load(&self, post_id: i32) -> Result<Vec<Comment>, BlogError> {
        self.store.select_comments(post_id).await
    }

    /// Adds a comment and returns the reloaded thread.
    pub async fn add(&self, post_id: i32, draft: CommentDraft) -> Result<Vec<Comment>, BlogError> {
        let author = require_identity(self.viewer, "Please login to comment.")?;
        let content = draft.clean()?;
        self.require_post(post_id).await?;

        self.store
            .insert_comment(NewComment {
                post_id,
                author_id: author.id.to_owned(),
                content,
                image_url: draft.image.into_new(),
            })
            .await?;
        self.load(post_id).await
    }

    /// Fails with NotFound unless `post_id` exists.
    pub async fn require_post(&self, post_id: i32) -> Result<(), BlogError> {
        match self.store.find_post(post_id).await? {
            Some(_) => Ok(()),
            None => Err(BlogError::not_found("Post not found.")),
        }
    }

    /// Returns the comment if the viewer may change it.
    pub async fn load_owned(&self, id: i32) -> Result<Comment, BlogError> {
        let comment = self
            .store
            .find_comment(id)
            .await?
            .ok_or_else(|| BlogError::not_found(COMMENT_NOT_FOUND))?;
        require_owner(
            self.viewer,
            &comment,
            "You do not have permission to change this comment.",
        )?;
        Ok(comment)
    }

    /// Edits a comment and returns the reloaded thread of its post.
    pub async fn edit(&self, id: i32, draft: CommentDraft) -> Result<Vec<Comment>, BlogError> {
        let comment = self.load_owned(id).await?;
        let content = draft.clean()?;

        self.store
            .update_comment(
                comment.id,
                CommentChanges {
                    content,
                    image_url: draft.image.apply(comment.image_url),
                },
            )
            .await?;
        self.load(comment.post_id).await
    }

    /// Deletes a comment. Returns it with the reloaded thread of its post.
    pub async fn delete(&self, id: i32) -> Result<(Comment, Vec<Comment>), BlogError> {
        let comment = self.load_owned(id).await?;
        self.store.delete_comment(comment.id).await?;
        let remaining = self.load(comment.post_id).await?;
        Ok((comment, remaining))
    }
}
