use std::{fmt::Display, sync::Arc};

use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

use crate::error::{AppError, AppErrorKind};

lazy_static! {
    static ref VIDEO_ID: Regex = Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap();
}

const WATCH_HOSTS: [&str; 5] = [
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "gaming.youtube.com",
];

const SHORT_HOSTS: [&str; 2] = ["youtu.be", "www.youtu.be"];

const PATH_PREFIXES: [&str; 4] = ["shorts", "embed", "live", "v"];

/// A source link that passed validation.
///
/// The resolver only ever sees the canonical watch URL, so tracking
/// parameters and playlist context of the original link never reach it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaReference {
    original: Arc<str>,
    video_id: Arc<str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    Missing,
    Malformed,
    UnsupportedHost(String),
    MissingVideoId,
}

impl Display for ReferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "missing url"),
            Self::Malformed => write!(f, "invalid url"),
            Self::UnsupportedHost(host) => write!(f, "unsupported source: {host}"),
            Self::MissingVideoId => write!(f, "url does not point to a video"),
        }
    }
}

impl std::error::Error for ReferenceError {}

impl From<ReferenceError> for AppError {
    fn from(err: ReferenceError) -> Self {
        AppError::new(
            AppErrorKind::InvalidInput,
            format!("Invalid or missing url: {err}"),
            &[],
        )
    }
}

impl MediaReference {
    pub fn parse(value: impl AsRef<str>) -> Result<Self, ReferenceError> {
        let value = value.as_ref().trim();
        if value.is_empty() {
            return Err(ReferenceError::Missing);
        }

        let url = Url::parse(value).map_err(|_| ReferenceError::Malformed)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ReferenceError::Malformed);
        }

        let Some(host) = url.host_str().map(|host| host.to_ascii_lowercase()) else {
            return Err(ReferenceError::Malformed);
        };

        let candidate = if SHORT_HOSTS.contains(&host.as_str()) {
            url.path_segments()
                .and_then(|mut segments| segments.next())
                .map(|id| id.to_owned())
        } else if WATCH_HOSTS.contains(&host.as_str()) {
            watch_id(&url)
        } else {
            return Err(ReferenceError::UnsupportedHost(host));
        };

        match candidate {
            Some(id) if VIDEO_ID.is_match(&id) => Ok(Self {
                original: value.into(),
                video_id: id.into(),
            }),
            _ => Err(ReferenceError::MissingVideoId),
        }
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn canonical_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={id}", id = self.video_id)
    }
}

fn watch_id(url: &Url) -> Option<String> {
    let mut segments = url.path_segments()?;

    match segments.next()? {
        "watch" => url
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned()),
        prefix if PATH_PREFIXES.contains(&prefix) => segments.next().map(|id| id.to_owned()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_accepts_supported_links() {
        let links = [
            "https://www.youtube.com/watch?v=HYd9B6YvIHM",
            "https://www.youtube.com/watch?v=HYd9B6YvIHM&list=PLGK-2zLAFymBMRyVJCmS2jg8x-P2I4Y-J&index=2",
            "http://youtube.com/watch?feature=share&v=HYd9B6YvIHM",
            "https://m.youtube.com/watch?v=HYd9B6YvIHM",
            "https://music.youtube.com/watch?v=HYd9B6YvIHM",
            "https://gaming.youtube.com/watch?v=HYd9B6YvIHM",
            "https://youtu.be/HYd9B6YvIHM",
            "https://youtu.be/HYd9B6YvIHM?t=42",
            "https://www.youtube.com/shorts/HYd9B6YvIHM",
            "https://www.youtube.com/embed/HYd9B6YvIHM",
            "  https://www.youtube.com/live/HYd9B6YvIHM  ",
        ];

        for link in links {
            let reference = MediaReference::parse(link).unwrap();
            assert_eq!(reference.video_id(), "HYd9B6YvIHM", "{link}");
            assert_eq!(
                reference.canonical_url(),
                "https://www.youtube.com/watch?v=HYd9B6YvIHM"
            );
        }
    }

    #[test]
    fn test_rejects_invalid_links() {
        assert_eq!(MediaReference::parse("   "), Err(ReferenceError::Missing));
        assert_eq!(
            MediaReference::parse("not a url"),
            Err(ReferenceError::Malformed)
        );
        assert_eq!(
            MediaReference::parse("ftp://www.youtube.com/watch?v=HYd9B6YvIHM"),
            Err(ReferenceError::Malformed)
        );
        assert_eq!(
            MediaReference::parse("https://www.yt.com/watch?v=HYd9B6YvIHM"),
            Err(ReferenceError::UnsupportedHost("www.yt.com".to_owned()))
        );
        assert_eq!(
            MediaReference::parse("https://www.youtube.com/playlist?list=PLGK-2zLAFymBMRyVJCmS2jg8x-P2I4Y-J"),
            Err(ReferenceError::MissingVideoId)
        );
        assert_eq!(
            MediaReference::parse("https://www.youtube.com/watch?v=short"),
            Err(ReferenceError::MissingVideoId)
        );
        assert_eq!(
            MediaReference::parse("https://youtu.be/"),
            Err(ReferenceError::MissingVideoId)
        );
    }
}
