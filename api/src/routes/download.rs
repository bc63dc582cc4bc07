use actix_web::{
    body::SizedStream,
    get,
    http::header::{self, CacheDirective},
    post,
    web::{self, Data},
    HttpResponse,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{
    error::{AppError, AppErrorKind},
    media::{content_type, AttachmentName, FormatVariant, MediaReference, ResolvedMedia},
    relay::RelaySession,
    AppData,
};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../app/src/api-types/")]
pub struct DownloadRequest {
    pub url: String,
    /// Highest available quality when missing
    #[serde(default)]
    pub format_id: Option<String>,
}

/// Streams the selected format of a video as a file download.
///
/// # Example request
///
/// { "url": "https://www.youtube.com/watch?v=SBjQ9tuuTJQ", "format_id": "18" }
///
#[post("/download")]
pub async fn download_media(
    data: Data<AppData>,
    req: web::Json<DownloadRequest>,
) -> Result<HttpResponse, AppError> {
    relay_download(&data, req.into_inner()).await
}

/// Link friendly variant of `POST /download`, e.g.
/// `/api/download?url=https%3A%2F%2Fyoutu.be%2FSBjQ9tuuTJQ`
#[get("/api/download")]
pub async fn download_media_by_query(
    data: Data<AppData>,
    query: web::Query<DownloadRequest>,
) -> Result<HttpResponse, AppError> {
    relay_download(&data, query.into_inner()).await
}

async fn relay_download(data: &AppData, request: DownloadRequest) -> Result<HttpResponse, AppError> {
    let DownloadRequest { url, format_id } = request;
    log::info!(
        "'download' request received, URL: {url}, FORMAT: {format}",
        format = format_id.as_deref().unwrap_or("best")
    );

    let reference = MediaReference::parse(&url)?;
    let media = data.resolver().resolve(&reference).await?;
    let variant = select_variant(&media, format_id.as_deref())?;

    let upstream = data.resolver().open_stream(&reference, variant).await?;

    let name = AttachmentName::new(&media.metadata().title, reference.video_id(), &variant.ext);
    let session = RelaySession::open(
        upstream,
        format!("{name} [{format}]", name = name.name(), format = variant.format_id),
        data.relay_config(),
        data.session_token(),
    )
    .await?
    .expect_length(variant.exact_size());

    let mut response = HttpResponse::Ok();
    response
        .insert_header(name.content_disposition())
        .insert_header(header::CacheControl(vec![CacheDirective::NoStore]))
        .content_type(content_type(&variant.ext, variant.kind));

    // only an exact size may be promised, a wrong Content-Length would make
    // a complete transfer look truncated
    Ok(match variant.exact_size() {
        Some(size) => response.body(SizedStream::new(size, session)),
        None => response.streaming(session),
    })
}

/// Unknown format ids are rejected rather than replaced with a default.
fn select_variant<'a>(
    media: &'a ResolvedMedia,
    format_id: Option<&str>,
) -> Result<&'a FormatVariant, AppError> {
    match format_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => media.variant(id).ok_or_else(|| {
            AppError::new(
                AppErrorKind::InvalidInput,
                format!("format '{id}' is not available for this video"),
                &[&format!("VIDEO: {video}", video = media.metadata().id)],
            )
        }),
        None => media.best_variant().ok_or_else(|| {
            AppError::new(
                AppErrorKind::Resolution,
                "no downloadable format found for this video",
                &[&format!("VIDEO: {video}", video = media.metadata().id)],
            )
        }),
    }
}
