use anyhow::{anyhow, bail};
use media_relay_api::media::{FormatVariant, ResolvedMedia};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadHistoryEntry {
    pub title: String,
    pub format_id: String,
    pub url: String,
}

/// State of an interactive session. A new info request replaces the
/// current video and selection, the history lives as long as the session.
#[derive(Debug, Default)]
pub struct ClientSession {
    current: Option<CurrentMedia>,
    history: Vec<DownloadHistoryEntry>,
}

#[derive(Debug)]
struct CurrentMedia {
    url: String,
    media: ResolvedMedia,
    selected: Option<String>,
}

impl ClientSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, url: impl Into<String>, media: ResolvedMedia) {
        let selected = media
            .formats()
            .first()
            .map(|format| format.format_id.clone());

        self.current = Some(CurrentMedia {
            url: url.into(),
            media,
            selected,
        });
    }

    pub fn media(&self) -> Option<&ResolvedMedia> {
        self.current.as_ref().map(|current| &current.media)
    }

    pub fn selected(&self) -> Option<&FormatVariant> {
        let current = self.current.as_ref()?;
        current.media.variant(current.selected.as_deref()?)
    }

    pub fn select(&mut self, format_id: &str) -> anyhow::Result<&FormatVariant> {
        let Some(current) = self.current.as_mut() else {
            bail!("no video loaded, use 'url <link>' first");
        };

        let variant = current
            .media
            .variant(format_id)
            .ok_or_else(|| anyhow!("format '{format_id}' is not available for this video"))?;
        current.selected = Some(variant.format_id.clone());

        Ok(variant)
    }

    /// Records the pending download and returns what to request.
    pub fn begin_download(&mut self) -> anyhow::Result<DownloadHistoryEntry> {
        let Some(current) = self.current.as_ref() else {
            bail!("no video loaded, use 'url <link>' first");
        };
        let Some(format_id) = current.selected.clone() else {
            bail!("this video has no downloadable format");
        };

        let entry = DownloadHistoryEntry {
            title: current.media.metadata().title.clone(),
            format_id,
            url: current.url.clone(),
        };
        self.history.push(entry.clone());

        Ok(entry)
    }

    pub fn history(&self) -> &[DownloadHistoryEntry] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use media_relay_api::media::{MediaMetadata, VariantKind};

    use super::*;
    use pretty_assertions::assert_eq;

    fn media(id: &str, title: &str, format_ids: &[&str]) -> ResolvedMedia {
        ResolvedMedia::new(
            MediaMetadata {
                id: id.to_owned(),
                title: title.to_owned(),
                thumbnail: String::new(),
                duration: 60,
                uploader: None,
                description: None,
            },
            format_ids.iter().map(|format_id| FormatVariant {
                format_id: format_id.to_string(),
                ext: "mp4".to_owned(),
                resolution: None,
                filesize: None,
                filesize_exact: false,
                format_note: None,
                kind: VariantKind::Muxed,
            }),
        )
    }

    #[test]
    fn test_first_variant_selected_by_default() {
        let mut session = ClientSession::new();
        session.replace("https://youtu.be/aaaaaaaaaaa", media("a", "A", &["18", "22"]));

        assert_eq!(session.selected().unwrap().format_id, "18");
    }

    #[test]
    fn test_select_unknown_format() {
        let mut session = ClientSession::new();
        assert!(session.select("18").is_err());

        session.replace("https://youtu.be/aaaaaaaaaaa", media("a", "A", &["18", "22"]));
        assert!(session.select("137").is_err());
        assert_eq!(session.selected().unwrap().format_id, "18");

        session.select("22").unwrap();
        assert_eq!(session.selected().unwrap().format_id, "22");
    }

    #[test]
    fn test_new_request_replaces_state_and_keeps_history() {
        let mut session = ClientSession::new();
        session.replace("https://youtu.be/aaaaaaaaaaa", media("a", "A", &["18", "22"]));
        session.select("22").unwrap();
        session.begin_download().unwrap();

        session.replace("https://youtu.be/bbbbbbbbbbb", media("b", "B", &["140"]));
        assert_eq!(session.media().unwrap().metadata().title, "B");
        assert_eq!(session.selected().unwrap().format_id, "140");

        session.begin_download().unwrap();
        assert_eq!(
            session.history(),
            &[
                DownloadHistoryEntry {
                    title: "A".to_owned(),
                    format_id: "22".to_owned(),
                    url: "https://youtu.be/aaaaaaaaaaa".to_owned(),
                },
                DownloadHistoryEntry {
                    title: "B".to_owned(),
                    format_id: "140".to_owned(),
                    url: "https://youtu.be/bbbbbbbbbbb".to_owned(),
                },
            ]
        );
    }

    #[test]
    fn test_download_without_media() {
        let mut session = ClientSession::new();
        assert!(session.begin_download().is_err());

        session.replace("https://youtu.be/aaaaaaaaaaa", media("a", "A", &[]));
        assert!(session.begin_download().is_err());
        assert!(session.history().is_empty());
    }
}
