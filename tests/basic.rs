use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::ServiceResponse;
use actix_web::http::{header, StatusCode};
use actix_web::web::Data;
use actix_web::{test, App};
use std::sync::Arc;
use inkpost::backend::memory::{MemoryBackend, MemoryStorage};
use inkpost::backend::Backend;
use inkpost::middleware::ClientCtx;
use inkpost::web::{configure, error::error_handlers};

const BOUNDARY: &str = "inkpost-test-boundary";

macro_rules! blog_app {
    ($backend:expr) => {
        test::init_service(
            App::new()
                .app_data(Data::new($backend))
                .wrap(error_handlers())
                .wrap(ClientCtx::default())
                .wrap(SessionMiddleware::new(
                    CookieSessionStore::default(),
                    Key::generate(),
                ))
                .configure(configure),
        )
        .await
    };
}

fn session_cookie<B>(resp: &ServiceResponse<B>) -> Cookie<'static> {
    resp.response()
        .cookies()
        .find(|c| c.name() == "id")
        .expect("session cookie")
        .into_owned()
}

fn location<B>(resp: &ServiceResponse<B>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .expect("location header")
        .to_str()
        .unwrap()
        .to_owned()
}

/// Builds a multipart/form-data body with text fields and an optional image.
fn multipart(fields: &[(&str, &str)], image: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((filename, content_type, data)) = image {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, filename, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn multipart_post(uri: &str, cookie: &Cookie<'static>, body: Vec<u8>) -> test::TestRequest {
    test::TestRequest::post()
        .uri(uri)
        .cookie(cookie.clone())
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(body)
}

fn register(name: &str) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/register")
        .set_form(&[("name", name), ("password", "hunter22")])
}

async fn body_text<B: actix_web::body::MessageBody>(resp: ServiceResponse<B>) -> String {
    String::from_utf8(test::read_body(resp).await.to_vec()).unwrap()
}

#[actix_rt::test]
async fn test_index_get() {
    let app = blog_app!(Backend::in_memory("https://cdn.example.com/images"));

    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body_text(resp).await;
    assert!(body.contains("No posts yet."));
    assert!(body.contains("Page 1 of 1"));
    assert!(body.contains(">Register</a>"));
}

#[actix_rt::test]
async fn test_page_zero_is_rejected() {
    let app = blog_app!(Backend::in_memory("https://cdn.example.com/images"));

    let req = test::TestRequest::get().uri("/page-0").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_rt::test]
async fn test_last_addressable_page_is_empty() {
    let app = blog_app!(Backend::in_memory("https://cdn.example.com/images"));

    let req = test::TestRequest::get()
        .uri(&format!("/page-{}", u64::MAX))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body_text(resp).await;
    assert!(body.contains("No posts yet."));
    assert!(body.contains(&format!("Page {} of 1", u64::MAX)));
}

#[actix_rt::test]
async fn test_guests_are_sent_to_login() {
    let app = blog_app!(Backend::in_memory("https://cdn.example.com/images"));

    let req = test::TestRequest::get().uri("/posts/create").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/login");
}

#[actix_rt::test]
async fn test_missing_post_is_not_found() {
    let app = blog_app!(Backend::in_memory("https://cdn.example.com/images"));

    let req = test::TestRequest::get().uri("/posts/42").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(body_text(resp).await.contains("Post not found."));
}

#[actix_rt::test]
async fn test_post_lifecycle() {
    let app = blog_app!(Backend::in_memory("https://cdn.example.com/images"));

    let resp = test::call_service(&app, register("alice").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    let alice = session_cookie(&resp);

    // Create with an image.
    let body = multipart(
        &[("title", "  Hello  "), ("content", "First post")],
        Some(("cat.PNG", "image/png", &[0x89, 0x50, 0x4E, 0x47])),
    );
    let resp = test::call_service(&app, multipart_post("/posts/create", &alice, body).to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/posts/1");

    // The feed shows the content with the title.
    let req = test::TestRequest::get().uri("/").to_request();
    let body = body_text(test::call_service(&app, req).await).await;
    assert!(body.contains(">Hello</a>"));
    assert!(body.contains("First post"));

    let req = test::TestRequest::get()
        .uri("/posts/1")
        .cookie(alice.clone())
        .to_request();
    let body = body_text(test::call_service(&app, req).await).await;
    assert!(body.contains("<h1>Hello</h1>"));
    assert!(body.contains("class=\"attachment\""));
    assert!(body.contains(".PNG"));
    assert!(body.contains(">Edit</a>"));

    // Another user sees no owner controls and cannot edit or delete.
    let resp = test::call_service(&app, register("bob").to_request()).await;
    let bob = session_cookie(&resp);

    let req = test::TestRequest::get()
        .uri("/posts/1")
        .cookie(bob.clone())
        .to_request();
    let body = body_text(test::call_service(&app, req).await).await;
    assert!(!body.contains(">Edit</a>"));

    let req = test::TestRequest::get()
        .uri("/posts/1/edit")
        .cookie(bob.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri("/posts/1/delete")
        .cookie(bob.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // Edit: new title, image removed.
    let body = multipart(
        &[
            ("title", "Hello again"),
            ("content", "Edited"),
            ("remove_image", "on"),
        ],
        None,
    );
    let resp = test::call_service(&app, multipart_post("/posts/1/edit", &alice, body).to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let req = test::TestRequest::get().uri("/").to_request();
    let body = body_text(test::call_service(&app, req).await).await;
    assert!(body.contains("Hello again"));
    assert!(!body.contains("class=\"attachment\""));

    // Delete after confirmation.
    let req = test::TestRequest::get()
        .uri("/posts/1/delete")
        .cookie(alice.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::post()
        .uri("/posts/1/delete")
        .cookie(alice.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/");

    let req = test::TestRequest::get().uri("/posts/1").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_rejected_post_keeps_input() {
    let app = blog_app!(Backend::in_memory("https://cdn.example.com/images"));

    let resp = test::call_service(&app, register("alice").to_request()).await;
    let alice = session_cookie(&resp);

    let body = multipart(&[("title", "   "), ("content", "Draft body")], None);
    let resp = test::call_service(&app, multipart_post("/posts/create", &alice, body).to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_text(resp).await;
    assert!(body.contains("Please fill in Title and Content."));
    assert!(body.contains("Draft body"));
}

#[actix_rt::test]
async fn test_rejected_drafts_upload_nothing() {
    let data = Arc::new(MemoryBackend::default());
    let storage = Arc::new(MemoryStorage::new("https://cdn.example.com/images"));
    let app = blog_app!(Backend::new(data.clone(), data.clone(), storage.clone()));
    let cat: &[u8] = &[0x89, 0x50, 0x4E, 0x47];

    let resp = test::call_service(&app, register("alice").to_request()).await;
    let alice = session_cookie(&resp);

    let body = multipart(&[("title", " "), ("content", "Body")], Some(("cat.png", "image/png", cat)));
    let resp = test::call_service(&app, multipart_post("/posts/create", &alice, body).to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(storage.object_count(), 0);
    assert_eq!(data.post_count(), 0);

    let body = multipart(&[("title", "Post"), ("content", "Body")], None);
    test::call_service(&app, multipart_post("/posts/create", &alice, body).to_request()).await;

    let body = multipart(&[("title", "Post"), ("content", "")], Some(("cat.png", "image/png", cat)));
    let resp = test::call_service(&app, multipart_post("/posts/1/edit", &alice, body).to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(storage.object_count(), 0);

    let body = multipart(&[("content", "Hi")], Some(("cat.png", "image/png", cat)));
    let resp = test::call_service(&app, multipart_post("/posts/999/comments", &alice, body).to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(storage.object_count(), 0);

    let body = multipart(&[("content", "\t")], Some(("cat.png", "image/png", cat)));
    let resp = test::call_service(&app, multipart_post("/posts/1/comments", &alice, body).to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(storage.object_count(), 0);
    assert_eq!(data.comment_count(), 0);

    let body = multipart(&[("content", "Hi")], Some(("cat.png", "image/png", cat)));
    let resp = test::call_service(&app, multipart_post("/posts/1/comments", &alice, body).to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(storage.object_count(), 1);
    assert_eq!(data.comment_count(), 1);

    let body = multipart(&[("content", " ")], Some(("cat.png", "image/png", cat)));
    let resp = test::call_service(&app, multipart_post("/comments/1/edit", &alice, body).to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(storage.object_count(), 1);
}

#[actix_rt::test]
async fn test_comments() {
    let app = blog_app!(Backend::in_memory("https://cdn.example.com/images"));

    let resp = test::call_service(&app, register("alice").to_request()).await;
    let alice = session_cookie(&resp);
    let resp = test::call_service(&app, register("bob").to_request()).await;
    let bob = session_cookie(&resp);

    let body = multipart(&[("title", "Post"), ("content", "Body")], None);
    test::call_service(&app, multipart_post("/posts/create", &alice, body).to_request()).await;

    // Empty comments are refused inline.
    let body = multipart(&[("content", "   ")], None);
    let resp = test::call_service(&app, multipart_post("/posts/1/comments", &bob, body).to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_text(resp).await.contains("Comment cannot be empty."));

    let body = multipart(&[("content", "Nice post")], None);
    let resp = test::call_service(&app, multipart_post("/posts/1/comments", &bob, body).to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/posts/1#comments");

    // The post author cannot touch someone else's comment.
    let req = test::TestRequest::get()
        .uri("/comments/1/edit")
        .cookie(alice.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // Inline edit form for the comment author.
    let req = test::TestRequest::get()
        .uri("/comments/1/edit")
        .cookie(bob.clone())
        .to_request();
    let body = body_text(test::call_service(&app, req).await).await;
    assert!(body.contains(">Save</button>"));
    assert!(body.contains("Nice post</textarea>"));

    let body = multipart(&[("content", "Nicer post")], None);
    let resp = test::call_service(&app, multipart_post("/comments/1/edit", &bob, body).to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let req = test::TestRequest::get().uri("/posts/1").to_request();
    let body = body_text(test::call_service(&app, req).await).await;
    assert!(body.contains("Nicer post"));

    let req = test::TestRequest::post()
        .uri("/comments/1/delete")
        .cookie(bob.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp), "/posts/1#comments");

    let req = test::TestRequest::get().uri("/posts/1").to_request();
    let body = body_text(test::call_service(&app, req).await).await;
    assert!(body.contains("No comments yet."));
}

#[actix_rt::test]
async fn test_logout_ends_session() {
    let app = blog_app!(Backend::in_memory("https://cdn.example.com/images"));

    let resp = test::call_service(&app, register("alice").to_request()).await;
    let alice = session_cookie(&resp);

    let req = test::TestRequest::get()
        .uri("/posts/create")
        .cookie(alice.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/logout")
        .cookie(alice.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_text(resp).await;
    assert!(body.contains("You have been logged out."));
    assert!(!body.contains("alice"));

    // The old cookie no longer resolves to a session.
    let req = test::TestRequest::get()
        .uri("/posts/create")
        .cookie(alice)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
}

#[actix_rt::test]
async fn test_bad_login_is_shown_inline() {
    let app = blog_app!(Backend::in_memory("https://cdn.example.com/images"));

    let req = test::TestRequest::post()
        .uri("/login")
        .set_form(&[("name", "nobody"), ("password", "whatever")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_text(resp).await.contains("Invalid login credentials"));
}
