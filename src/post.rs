use crate::backend::BlogStore;
use crate::comment::Comment;
use crate::error::BlogError;
use crate::pagination::{page_count, RowRange, POSTS_PER_PAGE};
use crate::session::Identity;
use crate::ugc::{clean_text, require_identity, require_owner, Authored, ImageChange};
use chrono::NaiveDateTime;

const FIELDS_REQUIRED: &str = "Please fill in Title and Content.";
/// Characters of content shown for a post in the feed.
pub const EXCERPT_CHARS: usize = 280;
const POST_NOT_FOUND: &str = "Post not found.";

/// A blog entry as stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Post {
    pub id: i32,
    pub title: String,
    pub content: String,
    pub author_id: String,
    pub image_url: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Post {
    pub fn created_at_string(&self) -> String {
        self.created_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    pub fn url(&self) -> String {
        format!("/posts/{}", self.id)
    }

    /// Content cut to `EXCERPT_CHARS` characters, with an ellipsis when shortened.
    pub fn excerpt(&self) -> String {
        match self.content.char_indices().nth(EXCERPT_CHARS) {
            Some((end, _)) => format!("{}…", self.content[..end].trim_end()),
            None => self.content.to_owned(),
        }
    }
}

impl Authored for Post {
    fn author_id(&self) -> &str {
        &self.author_id
    }
}

/// Row to insert. `author_id` is taken from the session, never from input.
#[derive(Clone, Debug)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub author_id: String,
    pub image_url: Option<String>,
}

/// Full replacement of the mutable columns of a post.
#[derive(Clone, Debug)]
pub struct PostChanges {
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
}

/// Unvalidated form input for creating or editing a post.
#[derive(Clone, Debug, Default)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub image: ImageChange,
}

impl PostDraft {
    /// Trimmed title and content, both required.
    pub fn clean(&self) -> Result<(String, String), BlogError> {
        let title = clean_text(&self.title, FIELDS_REQUIRED)?;
        let content = clean_text(&self.content, FIELDS_REQUIRED)?;
        Ok((title, content))
    }
}

/// One page of the feed.
#[derive(Debug)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub page: u64,
    pub total: u64,
    pub total_pages: u64,
}

/// Newest-first feed.
pub struct PostList<'a> {
    store: &'a dyn BlogStore,
}

impl<'a> PostList<'a> {
    pub fn new(store: &'a dyn BlogStore) -> Self {
        Self { store }
    }

    pub async fn load(&self, page: u64) -> Result<PostPage, BlogError> {
        if page < 1 {
            return Err(BlogError::validation("Page numbers start at 1."));
        }

        let range = RowRange::for_page(page, POSTS_PER_PAGE);
        let (posts, total) = self.store.select_posts(range).await?;

        Ok(PostPage {
            posts,
            page,
            total,
            total_pages: page_count(total, POSTS_PER_PAGE),
        })
    }
}

/// A post with its comment thread.
#[derive(Debug)]
pub struct PostThread {
    pub post: Post,
    pub comments: Vec<Comment>,
}

/// Reading and deleting a single post.
pub struct PostDetail<'a> {
    store: &'a dyn BlogStore,
    viewer: Option<&'a Identity>,
}

impl<'a> PostDetail<'a> {
    pub fn new(store: &'a dyn BlogStore, viewer: Option<&'a Identity>) -> Self {
        Self { store, viewer }
    }

    pub async fn load(&self, id: i32) -> Result<PostThread, BlogError> {
        let post = find_post(self.store, id).await?;
        let comments = self.store.select_comments(post.id).await?;
        Ok(PostThread { post, comments })
    }

    /// Returns the post if the viewer may delete it.
    pub async fn confirm_delete(&self, id: i32) -> Result<Post, BlogError> {
        let post = find_post(self.store, id).await?;
        require_owner(
            self.viewer,
            &post,
            "You do not have permission to delete this post.",
        )?;
        Ok(post)
    }

    pub async fn delete(&self, id: i32) -> Result<(), BlogError> {
        let post = self.confirm_delete(id).await?;
        self.store.delete_post(post.id).await?;
        log::info!("Post {} deleted by its author.", post.id);
        Ok(())
    }
}

/// Create and edit paths for posts.
pub struct PostEditor<'a> {
    store: &'a dyn BlogStore,
    viewer: Option<&'a Identity>,
}

impl<'a> PostEditor<'a> {
    pub fn new(store: &'a dyn BlogStore, viewer: Option<&'a Identity>) -> Self {
        Self { store, viewer }
    }

    pub async fn create(&self, draft: PostDraft) -> Result<Post, BlogError> {
        let (title, content) = draft.clean()?;
        let author = require_identity(self.viewer, "Please login first.")?;

        let post = self
            .store
            .insert_post(NewPost {
                title,
                content,
                author_id: author.id.to_owned(),
                image_url: draft.image.into_new(),
            })
            .await?;
        log::info!("Post {} created by {}.", post.id, author.id);
        Ok(post)
    }

    /// Loads a post for editing. Only its author gets it back.
    pub async fn load(&self, id: i32) -> Result<Post, BlogError> {
        let post = find_post(self.store, id).await?;
        require_owner(
            self.viewer,
            &post,
            "You do not have permission to update this post.",
        )?;
        Ok(post)
    }

    pub async fn update(&self, id: i32, draft: PostDraft) -> Result<Post, BlogError> {
        let post = self.load(id).await?;
        let (title, content) = draft.clean()?;

        self.store
            .update_post(
                post.id,
                PostChanges {
                    title,
                    content,
                    image_url: draft.image.apply(post.image_url),
                },
            )
            .await
    }
}

async fn find_post(store: &dyn BlogStore, id: i32) -> Result<Post, BlogError> {
    store
        .find_post(id)
        .await?
        .ok_or_else(|| BlogError::not_found(POST_NOT_FOUND))
}
