use actix_web::web;

use crate::handlers::user;

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/user")
            .service(
                web::resource("/quota")
                    .route(web::get().to(user::quota))
            )
            .service(
                web::resource("/stats")
                    .route(web::get().to(user::stats))
            )
    );
}
