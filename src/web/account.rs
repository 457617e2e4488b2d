use super::{redirect, render_with_status};
use crate::backend::Backend;
use crate::error::{BlogError, ErrorKind};
use crate::middleware::{ClientCtx, TOKEN_KEY};
use actix_session::Session;
use actix_web::{error, get, post, web, Error, HttpResponse, Responder, ResponseError};
use askama_actix::{Template, TemplateToResponse};
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_login)
        .service(post_login)
        .service(view_register)
        .service(post_register)
        .service(view_logout);
}

#[derive(Deserialize)]
pub struct CredentialsFormData {
    pub name: String,
    pub password: String,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub client: ClientCtx,
    pub name: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate {
    pub client: ClientCtx,
    pub name: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "logout.html")]
pub struct LogoutTemplate {
    pub client: ClientCtx,
}

/// Signs in and stores the token in the cookie session.
async fn start_session(
    backend: &Backend,
    cookies: &Session,
    form: &CredentialsFormData,
) -> Result<(), BlogError> {
    let token = backend.auth.sign_in(&form.name, &form.password).await?;
    cookies.renew();
    cookies.insert(TOKEN_KEY, token).map_err(|e| {
        log::error!("start_session: cookies.insert(): {}", e);
        BlogError::remote("Could not store the session.")
    })
}

#[get("/login")]
pub async fn view_login(client: ClientCtx) -> impl Responder {
    if client.is_user() {
        return redirect("/");
    }

    LoginTemplate {
        client,
        name: String::new(),
        error: None,
    }
    .to_response()
}

#[post("/login")]
pub async fn post_login(
    client: ClientCtx,
    backend: web::Data<Backend>,
    cookies: Session,
    form: web::Form<CredentialsFormData>,
) -> Result<HttpResponse, Error> {
    match start_session(&backend, &cookies, &form).await {
        Ok(()) => Ok(redirect("/")),
        Err(e) if e.is(ErrorKind::Validation) => render_with_status(
            &LoginTemplate {
                client,
                name: form.name.to_owned(),
                error: Some(e.message.to_owned()),
            },
            e.status_code(),
        ),
        Err(e) => Err(e.into()),
    }
}

#[get("/register")]
pub async fn view_register(client: ClientCtx) -> impl Responder {
    if client.is_user() {
        return redirect("/");
    }

    RegisterTemplate {
        client,
        name: String::new(),
        error: None,
    }
    .to_response()
}

/// Registers and signs the new user straight in.
#[post("/register")]
pub async fn post_register(
    client: ClientCtx,
    backend: web::Data<Backend>,
    cookies: Session,
    form: web::Form<CredentialsFormData>,
) -> Result<HttpResponse, Error> {
    let result = match backend.auth.sign_up(&form.name, &form.password).await {
        Ok(identity) => {
            log::info!("post_register: registered {}", identity.id);
            start_session(&backend, &cookies, &form).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => Ok(redirect("/")),
        Err(e) if e.is(ErrorKind::Validation) => render_with_status(
            &RegisterTemplate {
                client,
                name: form.name.to_owned(),
                error: Some(e.message.to_owned()),
            },
            e.status_code(),
        ),
        Err(e) => Err(e.into()),
    }
}

#[get("/logout")]
pub async fn view_logout(
    client: ClientCtx,
    backend: web::Data<Backend>,
    cookies: Session,
) -> Result<impl Responder, Error> {
    if let Some(token) = client.get_token() {
        backend.auth.sign_out(&token).await.map_err(|e| {
            log::error!("view_logout: sign_out(): {}", e);
            error::ErrorBadGateway(e.message)
        })?;
    }

    // The sign-out event reaches this request's tracker, so the page renders as a guest.
    client.sync_session();
    cookies.purge();

    Ok(LogoutTemplate { client }.to_response())
}
