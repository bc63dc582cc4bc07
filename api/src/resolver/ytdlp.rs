use std::{process::Stdio, time::Duration};

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use serde::Deserialize;
use tokio::{
    io::AsyncReadExt,
    process::{Child, ChildStderr, ChildStdout, Command},
    task::JoinHandle,
};
use tokio_util::io::ReaderStream;

use crate::{
    media::{FormatVariant, MediaMetadata, MediaReference, ResolvedMedia, VariantKind},
    relay::{MediaStream, TransferError},
};

use super::{last_error_line, MediaResolver, ResolveError};

const READ_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YtDlpConfig {
    /// Binary to run, either a path or a name looked up in `PATH`
    pub path: String,
    pub proxy: Option<String>,
    pub resolve_timeout: Duration,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            path: "yt-dlp".to_owned(),
            proxy: None,
            resolve_timeout: Duration::from_secs(60),
        }
    }
}

/// Resolves references by running the `yt-dlp` binary.
///
/// Metadata comes from `--dump-single-json`, media bytes from `-o -`
/// (the selected variant written to stdout).
pub struct YtDlpResolver {
    config: YtDlpConfig,
}

#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: String,
    title: String,
    thumbnail: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    description: Option<String>,
    #[serde(default)]
    formats: Vec<YtDlpFormat>,
}

#[derive(Debug, Deserialize)]
struct YtDlpFormat {
    format_id: Option<String>,
    ext: Option<String>,
    resolution: Option<String>,
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
    format_note: Option<String>,
    vcodec: Option<String>,
    acodec: Option<String>,
}

impl YtDlpFormat {
    fn kind(&self) -> Option<VariantKind> {
        let has = |codec: &Option<String>| codec.as_deref().map_or(true, |codec| codec != "none");

        match (has(&self.vcodec), has(&self.acodec)) {
            (true, true) => Some(VariantKind::Muxed),
            (true, false) => Some(VariantKind::VideoOnly),
            (false, true) => Some(VariantKind::AudioOnly),
            // storyboards and other non-media entries
            (false, false) => None,
        }
    }

    fn into_variant(self) -> Option<FormatVariant> {
        let kind = self.kind()?;
        let format_id = self.format_id.filter(|id| !id.is_empty())?;

        let (filesize, filesize_exact) = match (self.filesize, self.filesize_approx) {
            (Some(size), _) if size >= 0.0 => (Some(size as u64), true),
            (_, Some(size)) if size >= 0.0 => (Some(size as u64), false),
            _ => (None, false),
        };

        let resolution = match kind {
            VariantKind::AudioOnly => None,
            _ => self.resolution,
        };

        Some(FormatVariant {
            format_id,
            ext: self.ext.unwrap_or_else(|| "bin".to_owned()),
            resolution,
            filesize,
            filesize_exact,
            format_note: self.format_note,
            kind,
        })
    }
}

impl From<YtDlpInfo> for ResolvedMedia {
    fn from(info: YtDlpInfo) -> Self {
        let metadata = MediaMetadata {
            id: info.id,
            title: info.title,
            thumbnail: info.thumbnail.unwrap_or_default(),
            duration: info
                .duration
                .filter(|duration| *duration > 0.0)
                .map_or(0, |duration| duration.round() as u64),
            uploader: info.uploader,
            description: info.description,
        };

        ResolvedMedia::new(
            metadata,
            info.formats
                .into_iter()
                .filter_map(YtDlpFormat::into_variant),
        )
    }
}

/// Output side of a running `yt-dlp -o -` process.
struct ChildOutput {
    child: Child,
    stdout: ReaderStream<ChildStdout>,
    diagnostics: JoinHandle<String>,
    done: bool,
}

impl ChildOutput {
    /// A clean end of stdout only counts as success if the process agrees.
    async fn finish(&mut self) -> Option<TransferError> {
        match self.child.wait().await {
            Ok(status) if status.success() => None,
            Ok(status) => {
                let stderr = (&mut self.diagnostics).await.unwrap_or_default();
                Some(TransferError::UpstreamExited {
                    code: status.code(),
                    stderr: last_error_line(&stderr),
                })
            }
            Err(err) => Some(TransferError::Upstream(err)),
        }
    }
}

impl YtDlpResolver {
    pub fn new(config: YtDlpConfig) -> Self {
        Self { config }
    }

    /// Version string reported by the binary, `None` if it cannot be run.
    pub async fn version(&self) -> Option<String> {
        let output = Command::new(&self.config.path)
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }

        Some(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }

    fn command(&self, args: &[&str], reference: &MediaReference) -> Command {
        let mut command = Command::new(&self.config.path);
        command
            .args(["--no-playlist", "--no-warnings", "--no-progress"])
            .args(args);

        if let Some(proxy) = &self.config.proxy {
            command.arg("--proxy").arg(proxy);
        }

        command
            .arg(reference.canonical_url())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        command
    }

    fn spawn_error(&self, err: std::io::Error) -> ResolveError {
        match err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                ResolveError::ToolMissing(self.config.path.clone())
            }
            _ => ResolveError::Failed(err.to_string()),
        }
    }
}

fn parse_info(stdout: &[u8]) -> Result<ResolvedMedia, ResolveError> {
    let info: YtDlpInfo =
        serde_json::from_slice(stdout).map_err(|err| ResolveError::Parse(err.to_string()))?;

    Ok(info.into())
}

fn drain_diagnostics(stderr: ChildStderr) -> JoinHandle<String> {
    actix_rt::spawn(async move {
        let mut stderr = stderr;
        let mut buf = Vec::new();
        if let Err(err) = stderr.read_to_end(&mut buf).await {
            log::warn!("failed to read resolver diagnostics, ERROR: {err}");
        }

        String::from_utf8_lossy(&buf).into_owned()
    })
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn resolve(&self, reference: &MediaReference) -> Result<ResolvedMedia, ResolveError> {
        let mut command = self.command(&["--dump-single-json", "--skip-download"], reference);

        let output = match tokio::time::timeout(self.config.resolve_timeout, command.output()).await
        {
            Err(_) => return Err(ResolveError::Timeout),
            Ok(Err(err)) => return Err(self.spawn_error(err)),
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            return Err(ResolveError::from_diagnostics(&String::from_utf8_lossy(
                &output.stderr,
            )));
        }

        parse_info(&output.stdout)
    }

    async fn open_stream(
        &self,
        reference: &MediaReference,
        variant: &FormatVariant,
    ) -> Result<MediaStream, ResolveError> {
        let mut command = self.command(
            &["--quiet", "--no-part", "-f", variant.format_id.as_str(), "-o", "-"],
            reference,
        );

        let mut child = command.spawn().map_err(|err| self.spawn_error(err))?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(ResolveError::Failed(
                "resolver process has no output pipes".to_owned(),
            ));
        };

        let output = ChildOutput {
            child,
            stdout: ReaderStream::with_capacity(stdout, READ_CHUNK_SIZE),
            diagnostics: drain_diagnostics(stderr),
            done: false,
        };

        let media = stream::unfold(output, |mut output| async move {
            if output.done {
                return None;
            }

            match output.stdout.next().await {
                Some(Ok(chunk)) => Some((Ok(chunk), output)),
                Some(Err(err)) => {
                    output.done = true;
                    Some((Err(TransferError::Upstream(err)), output))
                }
                None => {
                    output.done = true;
                    let failure = output.finish().await;
                    failure.map(|err| (Err(err), output))
                }
            }
        });

        Ok(media.boxed())
    }
}
