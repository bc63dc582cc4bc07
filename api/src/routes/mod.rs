use actix_web::web;

use crate::error::{AppError, AppErrorKind, IntoAppError};

pub mod download;
pub mod info;

/// Registers every endpoint together with the extractor configs that turn
/// malformed request bodies and queries into JSON errors.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .service(info::get_media_info)
        .service(download::download_media)
        .service(download::download_media_by_query);
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let app_err: AppError =
            err.into_app_err("invalid request body", AppErrorKind::InvalidInput, &[]);
        app_err.into()
    })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        let app_err: AppError =
            err.into_app_err("invalid query parameters", AppErrorKind::InvalidInput, &[]);
        app_err.into()
    })
}
