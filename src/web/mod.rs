pub mod account;
pub mod comment;
pub mod error;
pub mod form;
pub mod index;
pub mod post;

use actix_web::http::StatusCode;
use actix_web::{error as web_error, Error, HttpResponse};
use askama_actix::Template;

/// Configures the web app
///
/// @see https://docs.rs/actix-web/4.0.1/actix_web/struct.App.html#method.configure
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    // Route resolution will stop at the first match.
    index::configure(conf);
    account::configure(conf);
    post::configure(conf);
    comment::configure(conf);
}

/// Renders a template with a status other than 200, such as a rejected form.
pub(crate) fn render_with_status<T: Template>(
    tmpl: &T,
    status: StatusCode,
) -> Result<HttpResponse, Error> {
    let body = tmpl.render().map_err(|e| {
        log::error!("render_with_status: {}", e);
        web_error::ErrorInternalServerError("Could not render page.")
    })?;

    Ok(HttpResponse::build(status)
        .content_type("text/html; charset=utf-8")
        .body(body))
}

/// 302 to `location`.
pub(crate) fn redirect(location: impl AsRef<str>) -> HttpResponse {
    HttpResponse::Found()
        .append_header(("Location", location.as_ref()))
        .finish()
}
