//! Postgres backend through SeaORM.

use super::{hash_password, validate_credentials, verify_password};
use super::{AuthBackend, BlogStore};
use crate::comment::{Comment, CommentChanges, NewComment};
use crate::error::BlogError;
use crate::orm::{comments, posts, sessions, users};
use crate::pagination::RowRange;
use crate::post::{NewPost, Post, PostChanges};
use crate::session::{AuthEvent, AuthEvents, Identity};
use chrono::Utc;
use sea_orm::{entity::*, query::*, DatabaseConnection, DbErr, PaginatorTrait};
use std::sync::Arc;

const USER_EXISTS: &str = "User already registered";

/// True when `e` reports a unique constraint rejecting a row.
fn is_unique_violation(e: &DbErr) -> bool {
    match e {
        DbErr::Exec(msg) | DbErr::Query(msg) => {
            msg.contains("duplicate key value violates unique constraint")
                || msg.contains("UNIQUE constraint failed")
        }
        _ => false,
    }
}

pub struct DbBackend {
    db: DatabaseConnection,
    events: Arc<AuthEvents>,
    session_time: chrono::Duration,
}

impl DbBackend {
    pub fn new(db: DatabaseConnection, session_time: chrono::Duration) -> Self {
        Self {
            db,
            events: AuthEvents::new(),
            session_time,
        }
    }

    /// Removes sessions past their expiry. Returns how many were removed.
    pub async fn expire_sessions(&self) -> Result<u64, BlogError> {
        let res = sessions::Entity::delete_many()
            .filter(sessions::Column::ExpiresAt.lt(Utc::now().naive_utc()))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected)
    }
}

#[async_trait::async_trait]
impl AuthBackend for DbBackend {
    async fn sign_up(&self, name: &str, password: &str) -> Result<Identity, BlogError> {
        let name = validate_credentials(name, password)?;

        let existing = users::Entity::find()
            .filter(users::Column::Name.eq(name.to_owned()))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(BlogError::validation(USER_EXISTS));
        }

        let user = users::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            name: Set(name),
            password: Set(hash_password(password)?),
            created_at: Set(Utc::now().naive_utc()),
        }
        .insert(&self.db)
        .await
        // A concurrent sign-up may claim the name after the lookup above.
        .map_err(|e| {
            if is_unique_violation(&e) {
                log::info!("sign_up: name taken concurrently: {}", e);
                BlogError::validation(USER_EXISTS)
            } else {
                e.into()
            }
        })?;

        log::info!("New user registered: {}", user.id);
        Ok(user.into())
    }

    async fn sign_in(&self, name: &str, password: &str) -> Result<String, BlogError> {
        let user = users::Entity::find()
            .filter(users::Column::Name.eq(name.trim().to_owned()))
            .one(&self.db)
            .await?;

        let user = match user {
            Some(user) if verify_password(password, &user.password) => user,
            _ => return Err(BlogError::validation("Invalid login credentials")),
        };

        let token = uuid::Uuid::new_v4().to_string();
        sessions::Entity::insert(sessions::ActiveModel {
            id: Set(token.to_owned()),
            user_id: Set(user.id.to_owned()),
            expires_at: Set(Utc::now().naive_utc() + self.session_time),
        })
        .exec(&self.db)
        .await?;

        self.events.publish(AuthEvent::SignedIn {
            token: token.to_owned(),
            identity: user.into(),
        });
        Ok(token)
    }

    async fn get_session(&self, token: &str) -> Result<Option<Identity>, BlogError> {
        let found = sessions::Entity::find_by_id(token.to_owned())
            .find_also_related(users::Entity)
            .one(&self.db)
            .await?;

        Ok(match found {
            Some((session, Some(user))) if session.expires_at > Utc::now().naive_utc() => {
                Some(user.into())
            }
            _ => None,
        })
    }

    async fn sign_out(&self, token: &str) -> Result<(), BlogError> {
        let res = sessions::Entity::delete_many()
            .filter(sessions::Column::Id.eq(token.to_owned()))
            .exec(&self.db)
            .await?;

        if res.rows_affected > 0 {
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
impl BlogStore for DbBackend {
    async fn select_posts(&self, range: RowRange) -> Result<(Vec<Post>, u64), BlogError> {
        let total = posts::Entity::find().count(&self.db).await? as u64;
        // Postgres OFFSET is a signed bigint; pages past the end never reach it.
        if range.from >= total {
            return Ok((Vec::new(), total));
        }

        let rows = posts::Entity::find()
            .order_by_desc(posts::Column::CreatedAt)
            .order_by_desc(posts::Column::Id)
            .offset(range.from)
            .limit(range.limit())
            .all(&self.db)
            .await?;

        Ok((rows.into_iter().map(Post::from).collect(), total))
    }

    async fn find_post(&self, id: i32) -> Result<Option<Post>, BlogError> {
        Ok(posts::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(Post::from))
    }

    async fn insert_post(&self, post: NewPost) -> Result<Post, BlogError> {
        let post = posts::ActiveModel {
            title: Set(post.title),
            content: Set(post.content),
            author_id: Set(post.author_id),
            image_url: Set(post.image_url),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        Ok(post.into())
    }

    async fn update_post(&self, id: i32, changes: PostChanges) -> Result<Post, BlogError> {
        let post = posts::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| BlogError::not_found("Post not found."))?;

        let mut post: posts::ActiveModel = post.into();
        post.title = Set(changes.title);
        post.content = Set(changes.content);
        post.image_url = Set(changes.image_url);
        Ok(post.update(&self.db).await?.into())
    }

    async fn delete_post(&self, id: i32) -> Result<(), BlogError> {
        posts::Entity::delete_many()
            .filter(posts::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn select_comments(&self, post_id: i32) -> Result<Vec<Comment>, BlogError> {
        Ok(comments::Entity::find()
            .filter(comments::Column::PostId.eq(post_id))
            .order_by_asc(comments::Column::CreatedAt)
            .order_by_asc(comments::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(Comment::from)
            .collect())
    }

    async fn find_comment(&self, id: i32) -> Result<Option<Comment>, BlogError> {
        Ok(comments::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(Comment::from))
    }

    async fn insert_comment(&self, comment: NewComment) -> Result<Comment, BlogError> {
        let comment = comments::ActiveModel {
            post_id: Set(comment.post_id),
            author_id: Set(comment.author_id),
            content: Set(comment.content),
            image_url: Set(comment.image_url),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        Ok(comment.into())
    }

    async fn update_comment(
        &self,
        id: i32,
        changes: CommentChanges,
    ) -> Result<Comment, BlogError> {
        let comment = comments::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| BlogError::not_found("Comment not found."))?;

        let mut comment: comments::ActiveModel = comment.into();
        comment.content = Set(changes.content);
        comment.image_url = Set(changes.image_url);
        Ok(comment.update(&self.db).await?.into())
    }

    async fn delete_comment(&self, id: i32) -> Result<(), BlogError> {
        comments::Entity::delete_many()
            .filter(comments::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
