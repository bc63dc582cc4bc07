use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../app/src/api-types/")]
pub struct MediaMetadata {
    pub id: String,
    pub title: String,
    pub thumbnail: String,
    /// Length in whole seconds.
    #[ts(type = "number")]
    pub duration: u64,
    pub uploader: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export, export_to = "../app/src/api-types/")]
pub enum VariantKind {
    Muxed,
    VideoOnly,
    AudioOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../app/src/api-types/")]
pub struct FormatVariant {
    pub format_id: String,
    pub ext: String,
    /// `None` for audio-only variants.
    pub resolution: Option<String>,
    /// Exact or estimated size in bytes, see `filesize_exact`.
    #[ts(type = "number | null")]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub filesize_exact: bool,
    pub format_note: Option<String>,
    pub kind: VariantKind,
}

impl FormatVariant {
    /// Size that can be promised to a client as `Content-Length`.
    pub fn exact_size(&self) -> Option<u64> {
        self.filesize.filter(|_| self.filesize_exact)
    }

    /// Vertical resolution, read from labels like `1920x1080` or `720p`.
    pub fn height(&self) -> Option<u32> {
        let resolution = self.resolution.as_deref()?;

        match resolution.split_once('x') {
            Some((_, height)) => height.parse().ok(),
            None => resolution.trim_end_matches('p').parse().ok(),
        }
    }
}

/// Metadata plus the variants available for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../app/src/api-types/")]
pub struct ResolvedMedia {
    #[serde(flatten)]
    metadata: MediaMetadata,
    formats: Vec<FormatVariant>,
}

impl ResolvedMedia {
    /// Variants sharing a `format_id` with an earlier one are dropped.
    pub fn new(metadata: MediaMetadata, formats: impl IntoIterator<Item = FormatVariant>) -> Self {
        let mut seen = HashSet::new();
        let formats = formats
            .into_iter()
            .filter(|format| seen.insert(format.format_id.clone()))
            .collect();

        Self { metadata, formats }
    }

    pub fn metadata(&self) -> &MediaMetadata {
        &self.metadata
    }

    pub fn formats(&self) -> &[FormatVariant] {
        &self.formats
    }

    pub fn variant(&self, format_id: &str) -> Option<&FormatVariant> {
        self.formats
            .iter()
            .find(|format| format.format_id == format_id)
    }

    /// The "highest available quality" default.
    ///
    /// Variants carrying both audio and video always win over split ones,
    /// then taller pictures, then larger files.
    pub fn best_variant(&self) -> Option<&FormatVariant> {
        self.formats.iter().max_by_key(|format| {
            (
                format.kind == VariantKind::Muxed,
                format.height().unwrap_or(0),
                format.filesize.unwrap_or(0),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn variant(format_id: &str, kind: VariantKind, resolution: Option<&str>) -> FormatVariant {
        FormatVariant {
            format_id: format_id.to_owned(),
            ext: "mp4".to_owned(),
            resolution: resolution.map(|res| res.to_owned()),
            filesize: None,
            filesize_exact: false,
            format_note: None,
            kind,
        }
    }

    fn metadata() -> MediaMetadata {
        MediaMetadata {
            id: "HYd9B6YvIHM".to_owned(),
            title: "title".to_owned(),
            thumbnail: "https://i.ytimg.com/vi/HYd9B6YvIHM/maxresdefault.jpg".to_owned(),
            duration: 212,
            uploader: None,
            description: None,
        }
    }

    #[test]
    fn test_duplicate_format_ids_are_dropped() {
        let media = ResolvedMedia::new(
            metadata(),
            vec![
                variant("18", VariantKind::Muxed, Some("640x360")),
                variant("140", VariantKind::AudioOnly, None),
                variant("18", VariantKind::Muxed, Some("1280x720")),
            ],
        );

        let ids: Vec<&str> = media
            .formats()
            .iter()
            .map(|format| format.format_id.as_str())
            .collect();
        assert_eq!(ids, vec!["18", "140"]);
        assert_eq!(media.variant("18").unwrap().resolution.as_deref(), Some("640x360"));
        assert_eq!(media.variant("22"), None);
    }

    #[test]
    fn test_best_variant_prefers_muxed() {
        let media = ResolvedMedia::new(
            metadata(),
            vec![
                variant("137", VariantKind::VideoOnly, Some("1920x1080")),
                variant("18", VariantKind::Muxed, Some("640x360")),
                variant("22", VariantKind::Muxed, Some("1280x720")),
                variant("140", VariantKind::AudioOnly, None),
            ],
        );

        assert_eq!(media.best_variant().unwrap().format_id, "22");
    }

    #[test]
    fn test_best_variant_falls_back_to_split_variants() {
        let media = ResolvedMedia::new(
            metadata(),
            vec![
                variant("140", VariantKind::AudioOnly, None),
                variant("137", VariantKind::VideoOnly, Some("1080p")),
            ],
        );

        assert_eq!(media.best_variant().unwrap().format_id, "137");
        assert_eq!(ResolvedMedia::new(metadata(), vec![]).best_variant(), None);
    }

    #[test]
    fn test_serialized_shape() {
        let media = ResolvedMedia::new(
            metadata(),
            vec![variant("140", VariantKind::AudioOnly, None)],
        );

        let value = serde_json::to_value(&media).unwrap();
        assert_eq!(value["title"], "title");
        assert_eq!(value["duration"], 212);
        assert_eq!(value["formats"][0]["format_id"], "140");
        assert_eq!(value["formats"][0]["kind"], "audio-only");
        assert_eq!(value["formats"][0]["resolution"], serde_json::Value::Null);
    }
}
