use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use futures_util::{StreamExt, TryStreamExt};
use tracing::instrument;

use crate::{
    entities::{
        asset::{AssetPatch, BatchDeleteRequest, ListAssetsQuery},
        upload::{UploadItem, UploadReport},
    },
    errors::AppError,
    use_cases::{extractors::AuthUser, upload::sanitize_file_name},
    AppState,
};

/// Multipart form field carrying the files of a batch.
pub const FILES_FIELD: &str = "files";

#[instrument(skip(user, state, payload), fields(owner_id = %user.0.owner_id))]
pub async fn upload_images(
    user: AuthUser,
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<impl Responder, AppError> {
    let pipeline = &state.pipeline;
    let owner = pipeline.owner_for(&user.0).await?;

    let mut report = UploadReport::default();
    let mut received = 0usize;

    while let Some(field) = payload.try_next().await? {
        if field.name() != Some(FILES_FIELD) {
            tracing::debug!(field = ?field.name(), "Skipping unexpected multipart field");
            continue;
        }
        received += 1;

        let file_name = sanitize_file_name(
            field
                .content_disposition()
                .and_then(|cd| cd.get_filename())
                .unwrap_or_default(),
        );
        let mime_type = field.content_type().map(|m| m.essence_str().to_string());
        let content = field
            .map_err(|e| std::io::Error::other(e.to_string()))
            .boxed_local();

        let item = UploadItem::from_stream(file_name.clone(), mime_type, None, content);
        let outcome = pipeline.ingest(&owner, item).await;
        report.record(&file_name, outcome);
    }

    if received == 0 {
        return Err(AppError::invalid(FILES_FIELD, "No files uploaded"));
    }

    let report = report.finish();
    tracing::info!(
        created = report.created.len(),
        deduped = report.deduped.len(),
        failed = report.errors.len(),
        "Upload batch processed"
    );
    Ok(HttpResponse::Ok().json(report))
}

#[instrument(skip(user, state, query))]
pub async fn list_images(
    user: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<ListAssetsQuery>,
) -> Result<impl Responder, AppError> {
    let page = state.asset_handler.list(&user.0, &query).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[instrument(skip(user, state))]
pub async fn get_image(
    user: AuthUser,
    state: web::Data<AppState>,
    image_id: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let view = state.asset_handler.get(image_id.into_inner(), &user.0).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[instrument(skip(user, state, data))]
pub async fn update_image(
    user: AuthUser,
    state: web::Data<AppState>,
    image_id: web::Path<i64>,
    data: web::Json<AssetPatch>,
) -> Result<impl Responder, AppError> {
    let asset = state
        .asset_handler
        .update(image_id.into_inner(), &user.0, data.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(asset))
}

#[instrument(skip(user, state))]
pub async fn delete_image(
    user: AuthUser,
    state: web::Data<AppState>,
    image_id: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    state.asset_handler.delete(image_id.into_inner(), &user.0).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Image deleted" })))
}

#[instrument(skip(user, state, data))]
pub async fn batch_delete_images(
    user: AuthUser,
    state: web::Data<AppState>,
    data: web::Json<BatchDeleteRequest>,
) -> Result<impl Responder, AppError> {
    let response = state.asset_handler.batch_delete(&user.0, data.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[instrument(skip(user, state, req))]
pub async fn image_links(
    user: AuthUser,
    state: web::Data<AppState>,
    image_id: web::Path<i64>,
    req: HttpRequest,
) -> Result<impl Responder, AppError> {
    let response = state
        .asset_handler
        .links(image_id.into_inner(), &user.0, &request_base(&req))
        .await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Scheme and host the client used to reach us.
pub fn request_base(req: &HttpRequest) -> String {
    let info = req.connection_info();
    format!("{}://{}", info.scheme(), info.host())
}
