use super::form::{read_ugc_form, UgcForm};
use super::post::{is_inline, render_post_view};
use super::redirect;
use crate::backend::Backend;
use crate::comment::{Comment, CommentDraft, CommentThread};
use crate::error::BlogError;
use crate::middleware::ClientCtx;
use crate::session::Identity;
use crate::ugc::ImageChange;
use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::{get, post, web, Error, Responder, ResponseError};
use askama_actix::{Template, TemplateToResponse};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(create_comment)
        .service(edit_comment)
        .service(update_comment)
        .service(delete_comment)
        .service(destroy_comment);
}

/// A comment as shown under its post.
pub struct CommentRow {
    pub comment: Comment,
    pub can_modify: bool,
    /// Present while the comment is being edited inline.
    pub edit: Option<CommentFormState>,
}

/// Input of a comment form, kept when a submission is rejected.
#[derive(Debug, Default)]
pub struct CommentFormState {
    pub content: String,
    pub uploaded_image: String,
    pub error: Option<String>,
}

impl CommentFormState {
    fn rejected(form: &UgcForm, error: &BlogError) -> Self {
        Self {
            content: form.text("content"),
            uploaded_image: form.text("uploaded_image"),
            error: Some(error.message.to_owned()),
        }
    }
}

#[derive(Template)]
#[template(path = "comment_delete.html")]
pub struct CommentDeleteTemplate {
    pub client: ClientCtx,
    pub comment: Comment,
}

fn thread_url(post_id: i32) -> String {
    format!("/posts/{}#comments", post_id)
}

#[post("/posts/{post_id}/comments")]
pub async fn create_comment(
    client: ClientCtx,
    backend: web::Data<Backend>,
    path: web::Path<i32>,
    multipart: Multipart,
) -> Result<impl Responder, Error> {
    let post_id = path.into_inner();
    let viewer = client
        .identity()
        .ok_or_else(|| BlogError::unauthenticated("Please login to comment."))?;

    let mut form = read_ugc_form(multipart).await?;
    match save_new_comment(&backend, &viewer, post_id, &mut form).await {
        Ok(_) => Ok(redirect(thread_url(post_id))),
        Err(e) if is_inline(&e) => {
            let status = e.status_code();
            render_post_view(
                client,
                &backend,
                post_id,
                CommentFormState::rejected(&form, &e),
                None,
                status,
            )
            .await
        }
        Err(e) => Err(e.into()),
    }
}

/// Checks the draft and its post before anything is uploaded.
async fn save_new_comment(
    backend: &Backend,
    viewer: &Identity,
    post_id: i32,
    form: &mut UgcForm,
) -> Result<Vec<Comment>, BlogError> {
    let thread = CommentThread::new(backend.store.as_ref(), Some(viewer));
    let mut draft = CommentDraft {
        content: form.text("content"),
        image: ImageChange::Keep,
    };
    draft.clean()?;
    thread.require_post(post_id).await?;

    draft.image = form
        .image_change(backend.storage.as_ref(), Some(viewer))
        .await?;
    thread.add(post_id, draft).await
}

/// Renders the post page with this comment in edit mode.
#[get("/comments/{comment_id}/edit")]
pub async fn edit_comment(
    client: ClientCtx,
    backend: web::Data<Backend>,
    path: web::Path<i32>,
) -> Result<impl Responder, Error> {
    let viewer = client.identity();
    let comment = CommentThread::new(backend.store.as_ref(), viewer.as_ref())
        .load_owned(path.into_inner())
        .await?;

    let editing = CommentFormState {
        content: comment.content,
        ..Default::default()
    };
    render_post_view(
        client,
        &backend,
        comment.post_id,
        CommentFormState::default(),
        Some((comment.id, editing)),
        StatusCode::OK,
    )
    .await
}

#[post("/comments/{comment_id}/edit")]
pub async fn update_comment(
    client: ClientCtx,
    backend: web::Data<Backend>,
    path: web::Path<i32>,
    multipart: Multipart,
) -> Result<impl Responder, Error> {
    let viewer = client.identity();
    let thread = CommentThread::new(backend.store.as_ref(), viewer.as_ref());
    let comment = thread.load_owned(path.into_inner()).await?;

    let mut form = read_ugc_form(multipart).await?;
    let mut draft = CommentDraft {
        content: form.text("content"),
        image: ImageChange::Keep,
    };
    let result = match draft.clean() {
        Ok(_) => match form
            .image_change(backend.storage.as_ref(), viewer.as_ref())
            .await
        {
            Ok(image) => {
                draft.image = image;
                thread.edit(comment.id, draft).await
            }
            Err(e) => Err(e),
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(_) => Ok(redirect(format!(
            "/posts/{}#comment-{}",
            comment.post_id, comment.id
        ))),
        Err(e) if is_inline(&e) => {
            let status = e.status_code();
            render_post_view(
                client,
                &backend,
                comment.post_id,
                CommentFormState::default(),
                Some((comment.id, CommentFormState::rejected(&form, &e))),
                status,
            )
            .await
        }
        Err(e) => Err(e.into()),
    }
}

#[get("/comments/{comment_id}/delete")]
pub async fn delete_comment(
    client: ClientCtx,
    backend: web::Data<Backend>,
    path: web::Path<i32>,
) -> Result<impl Responder, Error> {
    let viewer = client.identity();
    let comment = CommentThread::new(backend.store.as_ref(), viewer.as_ref())
        .load_owned(path.into_inner())
        .await?;

    Ok(CommentDeleteTemplate { client, comment }.to_response())
}

#[post("/comments/{comment_id}/delete")]
pub async fn destroy_comment(
    client: ClientCtx,
    backend: web::Data<Backend>,
    path: web::Path<i32>,
) -> Result<impl Responder, Error> {
    let viewer = client.identity();
    let (comment, _) = CommentThread::new(backend.store.as_ref(), viewer.as_ref())
        .delete(path.into_inner())
        .await?;

    Ok(redirect(thread_url(comment.post_id)))
}
