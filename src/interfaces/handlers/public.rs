use actix_web::{
    http::header::{self, CacheControl, CacheDirective},
    web, HttpRequest, HttpResponse, Responder,
};
use tracing::instrument;

use crate::{
    entities::{
        asset::{Asset, RandomFilter},
        links::LinksResponse,
        owner::Owner,
    },
    errors::AppError,
    handlers::images::request_base,
    use_cases::{
        extractors::OptionalUser,
        links::{link_base, LinkFormatter},
        resolver::ServedFile,
    },
    utils::valid_uuid::valid_uuid,
    AppState,
};

const PUBLIC_MAX_AGE: u32 = 3600;

#[instrument(skip(user, state, req))]
pub async fn resolve_image(
    user: OptionalUser,
    state: web::Data<AppState>,
    image_uuid: web::Path<String>,
    req: HttpRequest,
) -> Result<impl Responder, AppError> {
    let uuid = valid_uuid(&image_uuid)?;
    let view = state.resolver.resolve_by_uuid(&uuid, user.as_ref()).await?;
    let base = base_for(&state, &view.asset, &req).await?;
    let links = LinkFormatter::format(&view.asset, &base)?;

    Ok(HttpResponse::Ok().json(LinksResponse { image: view, links }))
}

#[instrument(skip(user, state))]
pub async fn serve_image(
    user: OptionalUser,
    state: web::Data<AppState>,
    image_uuid: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let uuid = valid_uuid(&image_uuid)?;
    let file = state.resolver.serve_bytes(&uuid, user.as_ref()).await?;
    Ok(file_response(file))
}

#[instrument(skip(state, req, filter))]
pub async fn random_image(
    state: web::Data<AppState>,
    filter: web::Query<RandomFilter>,
    req: HttpRequest,
) -> Result<impl Responder, AppError> {
    let view = state.resolver.random(&filter).await?;
    let base = base_for(&state, &view.asset, &req).await?;
    let links = LinkFormatter::format(&view.asset, &base)?;

    Ok(HttpResponse::Ok().json(LinksResponse { image: view, links }))
}

#[instrument(skip(state, filter))]
pub async fn random_image_file(
    state: web::Data<AppState>,
    filter: web::Query<RandomFilter>,
) -> Result<impl Responder, AppError> {
    let file = state.resolver.random_file(&filter).await?;
    Ok(file_response(file))
}

#[instrument(skip(state, req, filter))]
pub async fn random_image_redirect(
    state: web::Data<AppState>,
    filter: web::Query<RandomFilter>,
    req: HttpRequest,
) -> Result<impl Responder, AppError> {
    let view = state.resolver.random(&filter).await?;
    let base = base_for(&state, &view.asset, &req).await?;
    let links = LinkFormatter::format(&view.asset, &base)?;

    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, links.url))
        .finish())
}

async fn base_for(state: &AppState, asset: &Asset, req: &HttpRequest) -> Result<String, AppError> {
    let owner = state.asset_handler.owner(&asset.user_id).await?;
    Ok(link_base(owner.as_ref().and_then(Owner::link_domain), &request_base(req)))
}

fn file_response(file: ServedFile) -> HttpResponse {
    let cache = if file.asset.is_public {
        CacheControl(vec![CacheDirective::Public, CacheDirective::MaxAge(PUBLIC_MAX_AGE)])
    } else {
        CacheControl(vec![CacheDirective::Private, CacheDirective::NoStore])
    };

    let disposition = format!(
        "inline; filename*=UTF-8''{}",
        urlencoding::encode(file.file_name())
    );

    HttpResponse::Ok()
        .content_type(file.mime_type().to_string())
        .insert_header(cache)
        .insert_header((header::CONTENT_DISPOSITION, disposition))
        .insert_header(("X-Image-UUID", file.asset.uuid.to_string()))
        .insert_header(("X-Image-ID", file.asset.id.to_string()))
        .body(file.data)
}
