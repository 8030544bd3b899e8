use actix_web::{web, HttpResponse, Responder};
use tracing::instrument;

use crate::{errors::AppError, use_cases::extractors::AuthUser, AppState};

#[instrument(skip(user, state), fields(owner_id = %user.0.owner_id))]
pub async fn quota(
    user: AuthUser,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let status = state.asset_handler.quota(&user.0).await?;
    Ok(HttpResponse::Ok().json(status))
}

#[instrument(skip(user, state), fields(owner_id = %user.0.owner_id))]
pub async fn stats(
    user: AuthUser,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let stats = state.asset_handler.stats(&user.0).await?;
    Ok(HttpResponse::Ok().json(stats))
}
