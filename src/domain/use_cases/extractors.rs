use actix_web::{FromRequest, HttpRequest, HttpMessage};
use futures_util::future::{ready, Ready};
use crate::{entities::{owner::Requester, token::Claims}, errors::AuthError};

/// Extractor for the authenticated caller.
/// Returns 401 if the request carries no valid token.
/// Usage: Add `user: AuthUser` as a parameter to your handler function.
#[derive(Debug)]
pub struct AuthUser(pub Requester);

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        match requester_from(req) {
            Some(Ok(requester)) => ready(Ok(AuthUser(requester))),
            Some(Err(e)) => ready(Err(e.into())),
            None => ready(Err(AuthError::MissingCredentials.into())),
        }
    }
}

/// Extractor for routes that also serve anonymous callers.
#[derive(Debug)]
pub struct OptionalUser(pub Option<Requester>);

impl OptionalUser {
    pub fn as_ref(&self) -> Option<&Requester> {
        self.0.as_ref()
    }
}

impl FromRequest for OptionalUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        let requester = requester_from(req).and_then(Result::ok);
        ready(Ok(OptionalUser(requester)))
    }
}

fn requester_from(req: &HttpRequest) -> Option<Result<Requester, AuthError>> {
    req.extensions().get::<Claims>().map(Claims::requester)
}
