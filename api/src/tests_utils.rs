use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use actix_web::web::Data;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::{
    media::{FormatVariant, MediaMetadata, MediaReference, ResolvedMedia, VariantKind},
    relay::{MediaStream, RelayConfig, TransferError},
    resolver::{MediaResolver, ResolveError},
    AppData,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedChunk {
    Data(&'static str),
    Fail,
}

/// Resolver serving canned metadata and a scripted upstream stream.
pub struct FakeResolver {
    media: Result<ResolvedMedia, ResolveError>,
    script: Vec<ScriptedChunk>,
    resolve_calls: AtomicUsize,
    opened: Mutex<Vec<String>>,
}

impl FakeResolver {
    pub fn new(media: Result<ResolvedMedia, ResolveError>, script: Vec<ScriptedChunk>) -> Self {
        Self {
            media,
            script,
            resolve_calls: AtomicUsize::new(0),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn serving(script: Vec<ScriptedChunk>) -> Self {
        Self::new(Ok(sample_media()), script)
    }

    pub fn failing(err: ResolveError) -> Self {
        Self::new(Err(err), vec![])
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn opened_formats(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaResolver for FakeResolver {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn resolve(&self, _reference: &MediaReference) -> Result<ResolvedMedia, ResolveError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.media.clone()
    }

    async fn open_stream(
        &self,
        _reference: &MediaReference,
        variant: &FormatVariant,
    ) -> Result<MediaStream, ResolveError> {
        self.opened.lock().unwrap().push(variant.format_id.clone());

        let items: Vec<Result<Bytes, TransferError>> = self
            .script
            .iter()
            .map(|chunk| match chunk {
                ScriptedChunk::Data(data) => Ok(Bytes::from_static(data.as_bytes())),
                ScriptedChunk::Fail => Err(TransferError::UpstreamExited {
                    code: Some(1),
                    stderr: "Connection reset by peer".to_owned(),
                }),
            })
            .collect();

        Ok(stream::iter(items).boxed())
    }
}

pub fn sample_media() -> ResolvedMedia {
    let variant = |format_id: &str,
                   ext: &str,
                   kind: VariantKind,
                   resolution: Option<&str>,
                   size: Option<u64>| FormatVariant {
        format_id: format_id.to_owned(),
        ext: ext.to_owned(),
        resolution: resolution.map(|res| res.to_owned()),
        filesize: size,
        filesize_exact: size.is_some(),
        format_note: None,
        kind,
    };

    ResolvedMedia::new(
        MediaMetadata {
            id: "HYd9B6YvIHM".to_owned(),
            title: "My Video: Pt.1?".to_owned(),
            thumbnail: "https://i.ytimg.com/vi/HYd9B6YvIHM/maxresdefault.jpg".to_owned(),
            duration: 212,
            uploader: Some("someone".to_owned()),
            description: None,
        },
        vec![
            variant("18", "mp4", VariantKind::Muxed, Some("640x360"), None),
            variant("22", "mp4", VariantKind::Muxed, Some("1280x720"), None),
            variant("140", "m4a", VariantKind::AudioOnly, None, Some(11)),
        ],
    )
}

pub fn app_data(resolver: Arc<FakeResolver>) -> Data<AppData> {
    Data::new(AppData::new(
        resolver,
        RelayConfig {
            probe_timeout: Duration::from_millis(500),
            idle_timeout: Duration::from_millis(500),
        },
        CancellationToken::new(),
    ))
}
