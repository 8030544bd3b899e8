use actix_web::web;

use crate::handlers::public;

/// JSON endpoints mounted under `/api`.
pub fn config_api_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/i/{image_uuid}")
            .route(web::get().to(public::resolve_image))
    );

    cfg.service(
        web::scope("/random")
            .service(
                web::resource("")
                    .route(web::get().to(public::random_image))
            )
            .service(
                web::resource("/image")
                    .route(web::get().to(public::random_image_file))
            )
            .service(
                web::resource("/redirect")
                    .route(web::get().to(public::random_image_redirect))
            )
    );
}

/// Raw image bytes at the root, the target of every generated link.
pub fn config_file_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/i/{image_uuid}")
            .route(web::get().to(public::serve_image))
    );
}
