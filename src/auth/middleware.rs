use std::rc::Rc;

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{header, Method},
    web, Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};

use crate::auth::service::AuthService;
use crate::auth::token::parse_bearer;
use crate::db::Store;
use crate::error::AppError;
use crate::models::PublicUser;

/// Routes reachable without a bearer token.
///
/// `GET /todos/{id}` is public; every other method on that path is not.
pub fn is_public_route(method: &Method, path: &str) -> bool {
    match path {
        "/" | "/health" | "/register" | "/login" | "/logout" => true,
        _ => *method == Method::GET && is_todo_item_path(path),
    }
}

fn is_todo_item_path(path: &str) -> bool {
    path.strip_prefix("/todos/")
        .map(|rest| rest.trim_end_matches('/'))
        .map_or(false, |id| !id.is_empty() && !id.contains('/'))
}

/// Resolves the bearer token to a live user and stores it as a [`PublicUser`] in the
/// request extensions. Rejections are answered here with a JSON 401 and never reach the
/// handler.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if is_public_route(req.method(), req.path()) {
            let fut = self.service.call(req);
            return Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) });
        }

        let service = Rc::clone(&self.service);

        Box::pin(async move {
            match resolve_user(&req).await {
                Ok(user) => {
                    req.extensions_mut().insert(user);
                    service
                        .call(req)
                        .await
                        .map(ServiceResponse::map_into_left_body)
                }
                Err(err) => {
                    log::debug!("{} {} rejected: {}", req.method(), req.path(), err);
                    Ok(req.error_response(err).map_into_right_body())
                }
            }
        })
    }
}

async fn resolve_user(req: &ServiceRequest) -> Result<PublicUser, AppError> {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Authorization header required".into()))?;

    let token = header
        .to_str()
        .ok()
        .and_then(parse_bearer)
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization header format".into()))?;

    let auth = req
        .app_data::<web::Data<AuthService>>()
        .ok_or_else(|| AppError::InternalServerError("AuthService is not registered".into()))?;
    let store = req
        .app_data::<web::Data<dyn Store>>()
        .cloned()
        .ok_or_else(|| AppError::InternalServerError("Store is not registered".into()))?;

    let claims = auth
        .authenticate(token)
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".into()))?;

    store
        .find_user_by_id(claims.user_id)
        .await?
        .map(PublicUser::from)
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))
}
