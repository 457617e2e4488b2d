use crate::backend::Backend;
use crate::session::{Identity, SessionTracker};
use crate::ugc::{is_owner, Authored};
use actix_session::SessionExt;
use actix_utils::future::{ok, Ready};
use actix_web::dev::{
    forward_ready, Extensions, Payload, Service, ServiceRequest, ServiceResponse, Transform,
};
use actix_web::{web::Data, Error, FromRequest, HttpMessage, HttpRequest};
use futures_util::future::{FutureExt as _, LocalBoxFuture};
use std::time::{Duration, Instant};
use std::{cell::RefCell, rc::Rc};

/// Cookie session key holding the auth token.
pub const TOKEN_KEY: &str = "token";

/// Client data stored for a single request cycle.
#[derive(Debug)]
pub struct ClientCtxInner {
    pub session: SessionTracker,
    pub request_start: Instant,
}

impl ClientCtxInner {
    fn new() -> Self {
        Self {
            session: SessionTracker::new(None),
            request_start: Instant::now(),
        }
    }
}

/// Client context passed to routes.
/// Wraps ClientCtxInner, which is set at the beginning of the request.
#[derive(Clone, Debug)]
pub struct ClientCtx(Rc<RefCell<ClientCtxInner>>);

impl Default for ClientCtx {
    fn default() -> Self {
        Self(Rc::new(RefCell::new(ClientCtxInner::new())))
    }
}

impl ClientCtx {
    fn get_client_ctx(extensions: &mut Extensions) -> Self {
        match extensions.get::<Rc<RefCell<ClientCtxInner>>>() {
            // Existing record in extensions; pull it.
            Some(s_impl) => Self(Rc::clone(s_impl)),
            // No existing record; create and insert it.
            None => {
                let inner = Rc::new(RefCell::new(ClientCtxInner::new()));
                extensions.insert(inner.clone());
                Self(inner)
            }
        }
    }

    /// Returns the context of a request that already passed through the middleware.
    pub fn from_http_request(req: &HttpRequest) -> Self {
        Self::get_client_ctx(&mut req.extensions_mut())
    }

    /// Returns a copy of the signed-in identity, if any.
    pub fn identity(&self) -> Option<Identity> {
        self.0.borrow().session.identity().cloned()
    }

    /// Returns either the user's name or the word for guest.
    pub fn get_name(&self) -> String {
        match self.0.borrow().session.identity() {
            Some(identity) => identity.name.to_owned(),
            None => "Guest".to_owned(),
        }
    }

    pub fn get_token(&self) -> Option<String> {
        self.0.borrow().session.token().map(str::to_owned)
    }

    pub fn is_user(&self) -> bool {
        self.0.borrow().session.identity().is_some()
    }

    pub fn can_modify<T: Authored>(&self, item: &T) -> bool {
        is_owner(self.0.borrow().session.identity(), item)
    }

    /// Applies auth changes made during this request, such as a sign-out.
    pub fn sync_session(&self) {
        self.0.borrow_mut().session.sync();
    }

    /// Returns Duration representing request time.
    pub fn request_time(&self) -> Duration {
        Instant::now() - self.0.borrow().request_start
    }

    /// Returns human readable representing request time.
    pub fn request_time_as_string(&self) -> String {
        let us = self.request_time().as_micros();
        if us > 5000 {
            format!("{}ms", us / 1000)
        } else {
            format!("{}μs", us)
        }
    }
}

/// This implementation is what actually provides the `client: ClientCtx` in the parameters of route functions.
impl FromRequest for ClientCtx {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ok(ClientCtx::get_client_ctx(&mut req.extensions_mut()))
    }
}

impl<S, B> Transform<S, ServiceRequest> for ClientCtx
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = ClientCtxMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ClientCtxMiddleware {
            service: Rc::new(service),
        })
    }
}

/// Client context middleware. Mounts a session tracker for every request.
pub struct ClientCtxMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for ClientCtxMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        async move {
            let token = match req.get_session().get::<String>(TOKEN_KEY) {
                Ok(token) => token,
                Err(e) => {
                    log::error!("ClientCtxMiddleware: session.get(): {}", e);
                    None
                }
            };

            let mut tracker = SessionTracker::new(token);
            match req.app_data::<Data<Backend>>().cloned() {
                Some(backend) => tracker.mount(backend.auth.as_ref()).await,
                None => log::warn!("ClientCtxMiddleware: no Backend in app data."),
            }

            let ctx = ClientCtx::get_client_ctx(&mut req.extensions_mut());
            ctx.0.borrow_mut().session = tracker;

            service.call(req).await
        }
        .boxed_local()
    }
}
