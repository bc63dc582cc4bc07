use std::fmt::Display;

use async_trait::async_trait;

use crate::{
    media::{FormatVariant, MediaReference, ResolvedMedia},
    relay::MediaStream,
};

pub mod ytdlp;

pub use ytdlp::YtDlpResolver;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Deleted, private, region locked or otherwise not watchable
    Unavailable(String),
    Unsupported(String),
    RateLimited,
    Timeout,
    ToolMissing(String),
    Parse(String),
    Failed(String),
}

impl Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "media is not available: {msg}"),
            Self::Unsupported(msg) => write!(f, "unsupported media link: {msg}"),
            Self::RateLimited => write!(
                f,
                "the media platform is throttling requests, try again later"
            ),
            Self::Timeout => write!(f, "the media platform did not respond in time"),
            Self::ToolMissing(tool) => write!(f, "media resolver not found: {tool}"),
            Self::Parse(msg) => write!(f, "unexpected resolver output: {msg}"),
            Self::Failed(msg) => write!(f, "failed to resolve media: {msg}"),
        }
    }
}

impl std::error::Error for ResolveError {}

impl ResolveError {
    /// Classifies the diagnostic text a resolver printed on failure.
    pub fn from_diagnostics(stderr: &str) -> Self {
        let message = last_error_line(stderr);
        let lower = stderr.to_lowercase();

        if lower.contains("http error 429") || lower.contains("too many requests") {
            return Self::RateLimited;
        }

        if lower.contains("timed out") || lower.contains("timeout") {
            return Self::Timeout;
        }

        if lower.contains("unsupported url") {
            return Self::Unsupported(message);
        }

        let unavailable = [
            "video unavailable",
            "private video",
            "has been removed",
            "not available in your country",
            "blocked it in your country",
            "members-only",
            "sign in to confirm your age",
            "does not exist",
        ];
        if unavailable.iter().any(|needle| lower.contains(needle)) {
            return Self::Unavailable(message);
        }

        Self::Failed(message)
    }
}

fn last_error_line(stderr: &str) -> String {
    let line = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.starts_with("ERROR:"))
        .or_else(|| stderr.lines().rev().map(str::trim).find(|line| !line.is_empty()))
        .unwrap_or("no details given");

    // yt-dlp prefixes errors with "ERROR: [youtube] <id>: "
    let line = line.trim_start_matches("ERROR:").trim();
    match line.strip_prefix('[').and_then(|rest| rest.split_once("] ")) {
        Some((_, rest)) => match rest.split_once(": ") {
            Some((_, message)) => message.to_owned(),
            None => rest.to_owned(),
        },
        None => line.to_owned(),
    }
}

/// Turns a reference into metadata and per-variant byte streams.
///
/// Extraction lives entirely behind this trait so the platform-specific
/// part can be swapped without touching the relay or the endpoints.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Name of the resolver (for logging)
    fn name(&self) -> &'static str;

    async fn resolve(&self, reference: &MediaReference) -> Result<ResolvedMedia, ResolveError>;

    async fn open_stream(
        &self,
        reference: &MediaReference,
        variant: &FormatVariant,
    ) -> Result<MediaStream, ResolveError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_classify_diagnostics() {
        assert_eq!(
            ResolveError::from_diagnostics(
                "WARNING: something\nERROR: [youtube] HYd9B6YvIHM: Video unavailable. This video has been removed by the uploader\n"
            ),
            ResolveError::Unavailable(
                "Video unavailable. This video has been removed by the uploader".to_owned()
            )
        );

        assert_eq!(
            ResolveError::from_diagnostics("ERROR: [youtube] HYd9B6YvIHM: Private video. Sign in if you've been granted access"),
            ResolveError::Unavailable("Private video. Sign in if you've been granted access".to_owned())
        );

        assert_eq!(
            ResolveError::from_diagnostics("ERROR: unable to download webpage: HTTP Error 429: Too Many Requests"),
            ResolveError::RateLimited
        );

        assert_eq!(
            ResolveError::from_diagnostics("ERROR: Unsupported URL: https://example.com"),
            ResolveError::Unsupported("Unsupported URL: https://example.com".to_owned())
        );

        assert_eq!(
            ResolveError::from_diagnostics("ERROR: [youtube] abc: Read timed out."),
            ResolveError::Timeout
        );

        assert_eq!(
            ResolveError::from_diagnostics(""),
            ResolveError::Failed("no details given".to_owned())
        );
    }
}
