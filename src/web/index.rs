use crate::backend::Backend;
use crate::error::ErrorKind;
use crate::middleware::ClientCtx;
use crate::pagination::Paginator;
use crate::post::{Post, PostList};
use actix_web::{get, web, Error, HttpResponse, Responder};
use askama_actix::{Template, TemplateToResponse};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_index).service(view_index_page);
}

#[derive(Template)]
#[template(path = "post_list.html")]
pub struct PostListTemplate {
    pub client: ClientCtx,
    pub posts: Vec<Post>,
    pub paginator: Paginator,
    pub notice: Option<String>,
}

#[get("/")]
async fn view_index(client: ClientCtx, backend: web::Data<Backend>) -> Result<impl Responder, Error> {
    render_post_list(client, &backend, 1).await
}

#[get("/page-{page}")]
async fn view_index_page(
    client: ClientCtx,
    backend: web::Data<Backend>,
    path: web::Path<u64>,
) -> Result<impl Responder, Error> {
    render_post_list(client, &backend, path.into_inner()).await
}

async fn render_post_list(
    client: ClientCtx,
    backend: &Backend,
    page: u64,
) -> Result<HttpResponse, Error> {
    let (posts, page_count, notice) = match PostList::new(backend.store.as_ref()).load(page).await {
        Ok(list) => (list.posts, list.total_pages, None),
        Err(e) if e.is(ErrorKind::Validation) => return Err(e.into()),
        // The feed still renders; the reader sees why it is empty.
        Err(e) => {
            log::error!("render_post_list: {}", e);
            (Vec::new(), 1, Some(format!("Could not load posts: {}", e.message)))
        }
    };

    Ok(PostListTemplate {
        client,
        posts,
        paginator: Paginator {
            base_url: "/".to_owned(),
            this_page: page,
            page_count,
        },
        notice,
    }
    .to_response())
}
