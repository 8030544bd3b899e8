use actix_web::{
    web,
    error::{JsonPayloadError, PathError, QueryPayloadError},
};

use crate::errors::AppError;

/// Extractor failures are rendered with the same JSON body as handler errors.
pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        json_payload_error(err).into()
    }));
    cfg.app_data(web::QueryConfig::default().error_handler(|err, _req| {
        query_error(err).into()
    }));
    cfg.app_data(web::PathConfig::default().error_handler(|err, _req| {
        path_error(err).into()
    }));
}

fn json_payload_error(err: JsonPayloadError) -> AppError {
    match err {
        JsonPayloadError::OverflowKnownLength { .. } | JsonPayloadError::Overflow { .. } => {
            AppError::PayloadTooLarge("JSON body too large".to_string())
        }
        JsonPayloadError::ContentType => {
            AppError::invalid("body", "Expected a JSON body")
        }
        other => AppError::invalid("body", format!("JSON payload error: {}", other)),
    }
}

fn query_error(err: QueryPayloadError) -> AppError {
    AppError::invalid("query", format!("Invalid query string: {}", err))
}

fn path_error(err: PathError) -> AppError {
    tracing::debug!("Unparseable path parameter: {}", err);
    AppError::NotFound("Resource not found".to_string())
}
