use crate::web::error::ApiError;
use crate::wordpress::{Backend, WpError, WpUser};
use actix_web::dev::{self, Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header;
use actix_web::{web::Data, Error, FromRequest, HttpMessage, HttpRequest};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;

/// Cookie holding the JWT for browser sessions.
pub const AUTH_COOKIE: &str = "authToken";
/// Cookie holding a JSON summary of the signed-in user for the frontend.
pub const USER_COOKIE: &str = "userData";

/// Client data resolved once per request.
#[derive(Clone, Debug, Default)]
pub struct ClientCtxInner {
    /// User data. None is a guest or a caller with a bad token.
    pub client: Option<WpUser>,
    /// The token the caller presented, if any.
    pub token: Option<String>,
    /// Set when the token could not be checked because WordPress failed.
    pub auth_error: Option<WpError>,
}

impl ClientCtxInner {
    pub async fn from_request(req: &HttpRequest, backend: &Backend) -> Self {
        let token = match extract_token(req) {
            Some(token) => token,
            None => return Self::default(),
        };

        match backend.validate_token(&token).await {
            Ok(user) => Self {
                client: Some(user),
                token: Some(token),
                auth_error: None,
            },
            Err(WpError::Unauthorized) | Err(WpError::NotFound(_)) => {
                log::debug!("Rejected token presented by {:?}", req.peer_addr());
                Self {
                    token: Some(token),
                    ..Default::default()
                }
            }
            Err(err) => {
                log::warn!("Token validation failed upstream: {}", err);
                Self {
                    token: Some(token),
                    auth_error: Some(err),
                    ..Default::default()
                }
            }
        }
    }
}

/// Read the token from `Authorization: Bearer`, falling back to the auth cookie.
pub fn extract_token(req: &HttpRequest) -> Option<String> {
    let from_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            let (scheme, token) = value.trim().split_once(' ')?;
            scheme
                .eq_ignore_ascii_case("bearer")
                .then(|| token.trim().to_owned())
        })
        .filter(|token| !token.is_empty());

    from_header.or_else(|| {
        req.cookie(AUTH_COOKIE)
            .map(|cookie| cookie.value().to_owned())
            .filter(|token| !token.is_empty())
    })
}

/// Client context passed to routes.
/// Wraps ClientCtxInner, which is set at the beginning of the request.
#[derive(Clone, Debug)]
pub struct ClientCtx(Data<ClientCtxInner>);

impl Default for ClientCtx {
    fn default() -> Self {
        Self(Data::new(ClientCtxInner::default()))
    }
}

impl ClientCtx {
    /// Returns either the user's id or None.
    pub fn get_id(&self) -> Option<u64> {
        self.0.client.as_ref().map(|u| u.id)
    }

    pub fn get_user(&self) -> Option<&WpUser> {
        self.0.client.as_ref()
    }

    /// Require a signed-in user.
    ///
    /// A missing or rejected token is 401. If WordPress could not be reached
    /// while checking the token, that failure is reported instead.
    pub fn require_login(&self) -> Result<&WpUser, ApiError> {
        if let Some(user) = self.0.client.as_ref() {
            return Ok(user);
        }
        match (&self.0.auth_error, &self.0.token) {
            (Some(err), _) => Err(ApiError::from(err.clone())),
            (None, Some(_)) => Err(ApiError::Unauthorized(
                "Invalid or expired token".to_owned(),
            )),
            (None, None) => Err(ApiError::unauthorized()),
        }
    }
}

/// This implementation is what actually provides the `client: ClientCtx` in the parameters of route functions.
impl FromRequest for ClientCtx {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let ctx = match req.extensions().get::<Data<ClientCtxInner>>() {
            Some(inner) => Self(inner.clone()),
            // Middleware not mounted; everyone is a guest.
            None => Self::default(),
        };
        ready(Ok(ctx))
    }
}

impl<S: 'static, B> Transform<S, ServiceRequest> for ClientCtx
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = ClientCtxMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ClientCtxMiddleware {
            service: Rc::new(service),
        }))
    }
}

/// Resolves the caller's token against WordPress before the route runs.
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

    dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();

        Box::pin(async move {
            if let Some(backend) = req.app_data::<Data<Backend>>() {
                let backend = backend.get_ref().clone();
                let inner = ClientCtxInner::from_request(req.request(), &backend).await;
                req.extensions_mut().insert(Data::new(inner));
            } else {
                log::error!("WordPress backend is not registered as app data");
            }

            svc.call(req).await
        })
    }
}
