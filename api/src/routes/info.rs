use actix_web::{
    post,
    web::{self, Data},
    HttpResponse,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{error::AppError, media::MediaReference, AppData};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../app/src/api-types/")]
pub struct InfoRequest {
    pub url: String,
}

/// Metadata and available formats of a single video.
///
/// # Example request
///
/// { "url": "https://www.youtube.com/watch?v=SBjQ9tuuTJQ" }
///
#[post("/info")]
pub async fn get_media_info(
    data: Data<AppData>,
    req: web::Json<InfoRequest>,
) -> Result<HttpResponse, AppError> {
    let InfoRequest { url } = req.into_inner();
    log::info!("'info' request received, URL: {url}");

    let reference = MediaReference::parse(&url)?;
    let media = data.resolver().resolve(&reference).await?;

    log::info!(
        "resolved '{title}' with {count} formats using {resolver}",
        title = media.metadata().title,
        count = media.formats().len(),
        resolver = data.resolver().name()
    );

    Ok(HttpResponse::Ok().json(media))
}
