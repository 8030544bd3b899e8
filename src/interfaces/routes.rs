use actix_web::web;

use crate::handlers::system::health_check;

mod images;
mod public;
mod user;
mod json_error;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check);

    cfg.service(
        web::scope("/api")
            .configure(images::config_routes)
            .configure(user::config_routes)
            .configure(public::config_api_routes)
    );

    cfg.configure(public::config_file_routes);
    cfg.configure(json_error::config_routes);
}
