use actix_web::{
    body::BoxBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage, HttpResponse, ResponseError,
};
use futures_util::future::{ok, Ready, LocalBoxFuture};
use std::{rc::Rc, task::{Context, Poll}};

use crate::{entities::token::Claims, errors::AuthError, AppState};

/// How a route treats the `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Never looks at credentials.
    Public,
    /// Attaches claims for a valid token of an active account, otherwise serves anonymously.
    Optional,
    /// Rejects the request without a valid token for an active account.
    Required,
}

pub struct AuthMiddleware;

impl<S> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error> + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddlewareService {
            service: Rc::new(service),
        })
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
}

impl<S> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error> + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, ctx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let access = access_for(req.path(), req.method().as_str());

            match access {
                Access::Public => service.call(req).await,
                Access::Optional => {
                    match authorize(&req).await {
                        Ok(claims) => {
                            req.extensions_mut().insert(claims);
                        }
                        Err(AuthError::MissingCredentials) => {}
                        Err(e) => tracing::debug!("Serving optional route anonymously: {}", e),
                    }
                    service.call(req).await
                }
                Access::Required => {
                    let claims = match authorize(&req).await {
                        Ok(claims) => claims,
                        Err(e) => {
                            tracing::warn!(path = %req.path(), "Rejected request: {}", e);
                            return Ok(custom_error_response(req, e.error_response()));
                        }
                    };

                    req.extensions_mut().insert(claims);
                    service.call(req).await
                }
            }
        })
    }
}

pub fn access_for(path: &str, method: &str) -> Access {
    if method == "OPTIONS" || path == "/health" || path == "/api/random" || path.starts_with("/api/random/") {
        return Access::Public;
    }
    if path.starts_with("/i/") || path.starts_with("/api/i/") {
        return Access::Optional;
    }
    Access::Required
}

fn extract_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|header| {
            let parts: Vec<&str> = header.split_whitespace().collect();
            if parts.len() == 2 && parts[0].eq_ignore_ascii_case("bearer") {
                Some(parts[1].to_string())
            } else {
                None
            }
        })
}

fn decode_claims(req: &ServiceRequest) -> Result<Claims, AuthError> {
    let state = req.app_data::<web::Data<AppState>>()
        .ok_or(AuthError::MissingJwtService)?;

    let token = extract_token(req).ok_or(AuthError::MissingCredentials)?;
    let decoded = state.token_service.decode_jwt(&token)?;
    Ok(decoded.claims)
}

/// Valid token for a known, active account. The role is taken from the
/// account record so demotions apply immediately.
async fn authorize(req: &ServiceRequest) -> Result<Claims, AuthError> {
    let state = req.app_data::<web::Data<AppState>>()
        .ok_or_else(|| {
            tracing::error!("AppState missing in middleware");
            AuthError::MissingJwtService
        })?;

    let mut claims = decode_claims(req)?;
    let requester = claims.requester()?;

    let owner = state
        .repo
        .get_owner(&requester.owner_id)
        .await
        .map_err(|e| {
            tracing::error!(owner_id = %requester.owner_id, "Owner lookup failed: {}", e);
            AuthError::InvalidUserId
        })?
        .ok_or(AuthError::InvalidUserId)?;

    if !owner.is_active() {
        return Err(AuthError::AccountDisabled);
    }

    claims.role = owner.role;
    Ok(claims)
}

fn custom_error_response(req: ServiceRequest, res: HttpResponse) -> ServiceResponse<BoxBody> {
    req.into_response(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_are_classified_by_path() {
        assert_eq!(access_for("/health", "GET"), Access::Public);
        assert_eq!(access_for("/api/random", "GET"), Access::Public);
        assert_eq!(access_for("/api/random/redirect", "GET"), Access::Public);
        assert_eq!(access_for("/api/images", "OPTIONS"), Access::Public);

        assert_eq!(access_for("/i/6f1c", "GET"), Access::Optional);
        assert_eq!(access_for("/api/i/6f1c", "GET"), Access::Optional);

        assert_eq!(access_for("/api/images", "GET"), Access::Required);
        assert_eq!(access_for("/api/randomness", "GET"), Access::Required);
        assert_eq!(access_for("/api/user/quota", "GET"), Access::Required);
    }
}
