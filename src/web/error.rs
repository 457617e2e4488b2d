use crate::middleware::ClientCtx;
use actix_web::body::{BoxBody, EitherBody};
use actix_web::dev::ServiceResponse;
use actix_web::http::{header, header::HeaderValue, StatusCode};
use actix_web::middleware::{ErrorHandlerResponse, ErrorHandlers};
use actix_web::Result;
use askama_actix::Template;

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate {
    client: ClientCtx,
    status: u16,
    reason: &'static str,
    message: Option<String>,
}

/// Error pages for every status a route may fail with.
pub fn error_handlers<B: 'static>() -> ErrorHandlers<B> {
    ErrorHandlers::new()
        .handler(StatusCode::BAD_REQUEST, error_document)
        .handler(StatusCode::FORBIDDEN, error_document)
        .handler(StatusCode::NOT_FOUND, error_document)
        .handler(StatusCode::PAYLOAD_TOO_LARGE, error_document)
        .handler(StatusCode::UNPROCESSABLE_ENTITY, error_document)
        .handler(StatusCode::INTERNAL_SERVER_ERROR, error_document)
        .handler(StatusCode::BAD_GATEWAY, error_document)
}

pub fn error_document<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    // Pages rendered on purpose with an error status (rejected forms) pass through untouched.
    let message = match res.response().error() {
        Some(e) => Some(e.to_string()).filter(|m| !m.is_empty()),
        None if res.status() == StatusCode::NOT_FOUND => None,
        None => return Ok(ErrorHandlerResponse::Response(res.map_into_left_body())),
    };

    let body = BoxBody::new(
        ErrorTemplate {
            client: ClientCtx::from_http_request(res.request()),
            status: res.status().as_u16(),
            reason: res.status().canonical_reason().unwrap_or("Error"),
            message,
        }
        .to_string(),
    );
    let mut res: ServiceResponse<EitherBody<B>> =
        res.map_body(|_, _| EitherBody::<B, BoxBody>::right(body));

    // Headers must be manually set because Actix-Web renders no content by default.
    let headers = res.response_mut().headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    // Proxies love to cache error pages permanently. Explicitly say not to do that.
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    Ok(ErrorHandlerResponse::Response(res))
}
