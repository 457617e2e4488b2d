use super::comment::{CommentFormState, CommentRow};
use super::form::{read_ugc_form, UgcForm};
use super::{redirect, render_with_status};
use crate::backend::Backend;
use crate::error::{BlogError, ErrorKind};
use crate::middleware::ClientCtx;
use crate::post::{Post, PostDetail, PostDraft, PostEditor};
use crate::session::Identity;
use crate::ugc::ImageChange;
use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::{get, post, web, Error, HttpResponse, Responder, ResponseError};
use askama_actix::{Template, TemplateToResponse};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    // /posts/create must be registered before /posts/{post_id}.
    conf.service(create_post_form)
        .service(create_post)
        .service(delete_post)
        .service(destroy_post)
        .service(edit_post)
        .service(update_post)
        .service(view_post);
}

#[derive(Template)]
#[template(path = "post_delete.html")]
pub struct PostDeleteTemplate {
    pub client: ClientCtx,
    pub post: Post,
}

/// Shared by the create and edit pages.
#[derive(Template)]
#[template(path = "post_form.html")]
pub struct PostFormTemplate {
    pub client: ClientCtx,
    pub heading: &'static str,
    pub action: String,
    pub submit_label: &'static str,
    pub title: String,
    pub content: String,
    /// Image currently attached, shown as a preview.
    pub image_url: Option<String>,
    /// Image uploaded by a rejected submission, resubmitted as a hidden field.
    pub uploaded_image: String,
    pub error: Option<String>,
}

impl PostFormTemplate {
    fn for_create(client: ClientCtx) -> Self {
        Self {
            client,
            heading: "Create Blog",
            action: "/posts/create".to_owned(),
            submit_label: "Publish",
            title: String::new(),
            content: String::new(),
            image_url: None,
            uploaded_image: String::new(),
            error: None,
        }
    }

    fn for_edit(client: ClientCtx, post: Post) -> Self {
        Self {
            client,
            heading: "Edit Blog",
            action: format!("{}/edit", post.url()),
            submit_label: "Save",
            title: post.title,
            content: post.content,
            image_url: post.image_url,
            uploaded_image: String::new(),
            error: None,
        }
    }

    /// Puts the rejected input back into the form.
    fn with_rejected(mut self, form: &UgcForm, error: &BlogError) -> Self {
        self.title = form.text("title");
        self.content = form.text("content");
        self.uploaded_image = form.text("uploaded_image");
        if !self.uploaded_image.is_empty() {
            self.image_url = Some(self.uploaded_image.to_owned());
        }
        self.error = Some(error.message.to_owned());
        self
    }
}

#[derive(Template)]
#[template(path = "post_view.html")]
pub struct PostViewTemplate {
    pub client: ClientCtx,
    pub post: Post,
    pub can_modify: bool,
    pub comments: Vec<CommentRow>,
    pub comment_form: CommentFormState,
}

/// Errors a form can show inline instead of leaving the page.
pub(super) fn is_inline(e: &BlogError) -> bool {
    e.is(ErrorKind::Validation) || e.is(ErrorKind::Remote)
}

/// Renders a post with its comment thread.
/// `editing` puts one comment into inline edit mode with the given form state.
pub(super) async fn render_post_view(
    client: ClientCtx,
    backend: &Backend,
    post_id: i32,
    comment_form: CommentFormState,
    editing: Option<(i32, CommentFormState)>,
    status: StatusCode,
) -> Result<HttpResponse, Error> {
    let viewer = client.identity();
    let thread = PostDetail::new(backend.store.as_ref(), viewer.as_ref())
        .load(post_id)
        .await?;

    let mut editing = editing;
    let comments = thread
        .comments
        .into_iter()
        .map(|comment| {
            let edit = if editing.as_ref().map(|(id, _)| *id) == Some(comment.id) {
                editing.take().map(|(_, state)| state)
            } else {
                None
            };
            CommentRow {
                can_modify: client.can_modify(&comment),
                comment,
                edit,
            }
        })
        .collect();

    render_with_status(
        &PostViewTemplate {
            can_modify: client.can_modify(&thread.post),
            client,
            post: thread.post,
            comments,
            comment_form,
        },
        status,
    )
}

#[get("/posts/create")]
pub async fn create_post_form(client: ClientCtx) -> Result<impl Responder, Error> {
    if !client.is_user() {
        return Err(BlogError::unauthenticated("Please login first.").into());
    }

    Ok(PostFormTemplate::for_create(client).to_response())
}

#[post("/posts/create")]
pub async fn create_post(
    client: ClientCtx,
    backend: web::Data<Backend>,
    multipart: Multipart,
) -> Result<impl Responder, Error> {
    // Guests are turned away before anything is uploaded.
    let viewer = client
        .identity()
        .ok_or_else(|| BlogError::unauthenticated("Please login first."))?;

    let mut form = read_ugc_form(multipart).await?;
    match save_new_post(&backend, &viewer, &mut form).await {
        Ok(post) => Ok(redirect(post.url())),
        Err(e) if is_inline(&e) => render_with_status(
            &PostFormTemplate::for_create(client).with_rejected(&form, &e),
            e.status_code(),
        ),
        Err(e) => Err(e.into()),
    }
}

/// Reads the post fields and rejects a blank draft before its image is uploaded.
async fn checked_draft(
    backend: &Backend,
    viewer: Option<&Identity>,
    form: &mut UgcForm,
) -> Result<PostDraft, BlogError> {
    let mut draft = PostDraft {
        title: form.text("title"),
        content: form.text("content"),
        image: ImageChange::Keep,
    };
    draft.clean()?;
    draft.image = form.image_change(backend.storage.as_ref(), viewer).await?;
    Ok(draft)
}

async fn save_new_post(
    backend: &Backend,
    viewer: &Identity,
    form: &mut UgcForm,
) -> Result<Post, BlogError> {
    let draft = checked_draft(backend, Some(viewer), form).await?;
    PostEditor::new(backend.store.as_ref(), Some(viewer))
        .create(draft)
        .await
}

#[get("/posts/{post_id}")]
pub async fn view_post(
    client: ClientCtx,
    backend: web::Data<Backend>,
    path: web::Path<i32>,
) -> Result<impl Responder, Error> {
    render_post_view(
        client,
        &backend,
        path.into_inner(),
        CommentFormState::default(),
        None,
        StatusCode::OK,
    )
    .await
}

#[get("/posts/{post_id}/edit")]
pub async fn edit_post(
    client: ClientCtx,
    backend: web::Data<Backend>,
    path: web::Path<i32>,
) -> Result<impl Responder, Error> {
    let viewer = client.identity();
    let post = PostEditor::new(backend.store.as_ref(), viewer.as_ref())
        .load(path.into_inner())
        .await?;

    Ok(PostFormTemplate::for_edit(client, post).to_response())
}

#[post("/posts/{post_id}/edit")]
pub async fn update_post(
    client: ClientCtx,
    backend: web::Data<Backend>,
    path: web::Path<i32>,
    multipart: Multipart,
) -> Result<impl Responder, Error> {
    let viewer = client.identity();
    let editor = PostEditor::new(backend.store.as_ref(), viewer.as_ref());

    // Ownership is settled before the image is uploaded or anything is written.
    let post = editor.load(path.into_inner()).await?;

    let mut form = read_ugc_form(multipart).await?;
    let result = match checked_draft(&backend, viewer.as_ref(), &mut form).await {
        Ok(draft) => editor.update(post.id, draft).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(post) => Ok(redirect(post.url())),
        Err(e) if is_inline(&e) => render_with_status(
            &PostFormTemplate::for_edit(client, post).with_rejected(&form, &e),
            e.status_code(),
        ),
        Err(e) => Err(e.into()),
    }
}

#[get("/posts/{post_id}/delete")]
pub async fn delete_post(
    client: ClientCtx,
    backend: web::Data<Backend>,
    path: web::Path<i32>,
) -> Result<impl Responder, Error> {
    let viewer = client.identity();
    let post = PostDetail::new(backend.store.as_ref(), viewer.as_ref())
        .confirm_delete(path.into_inner())
        .await?;

    Ok(PostDeleteTemplate { client, post }.to_response())
}

#[post("/posts/{post_id}/delete")]
pub async fn destroy_post(
    client: ClientCtx,
    backend: web::Data<Backend>,
    path: web::Path<i32>,
) -> Result<impl Responder, Error> {
    let viewer = client.identity();
    PostDetail::new(backend.store.as_ref(), viewer.as_ref())
        .delete(path.into_inner())
        .await?;

    Ok(redirect("/"))
}
