use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context};
use futures_util::StreamExt;
use media_relay_api::{
    media::ResolvedMedia,
    routes::{download::DownloadRequest, info::InfoRequest},
    ErrorResponse,
};
use reqwest::{header::CONTENT_DISPOSITION, Client, Response};
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
};

use crate::progress::TransferProgress;

const FALLBACK_FILE_NAME: &str = "download.bin";
const MAX_NAME_ATTEMPTS: u32 = 1000;

pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(addr: &str, port: u16) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url(addr, port),
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{base}{path}", base = self.base_url)
    }

    pub async fn info(&self, url: &str) -> anyhow::Result<ResolvedMedia> {
        let res = self
            .http
            .post(self.endpoint("/info"))
            .json(&InfoRequest {
                url: url.to_owned(),
            })
            .send()
            .await
            .context("failed to reach the server")?;

        let res = check_status(res).await?;
        res.json().await.context("server sent an unreadable info response")
    }

    /// Streams a download into a new file in `output_dir`. Existing files are
    /// never overwritten, and the new file is removed when the transfer fails
    /// or ends short of the announced length.
    pub async fn download(
        &self,
        request: &DownloadRequest,
        output_dir: &Path,
        mut on_progress: impl FnMut(&TransferProgress),
    ) -> anyhow::Result<PathBuf> {
        let res = self
            .http
            .post(self.endpoint("/download"))
            .json(request)
            .send()
            .await
            .context("failed to reach the server")?;
        let res = check_status(res).await?;

        let file_name = res
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(attachment_file_name)
            .unwrap_or_else(|| FALLBACK_FILE_NAME.to_owned());

        let mut progress = TransferProgress::new(res.content_length());
        let (mut file, path) = create_unique(output_dir, &file_name).await?;

        let result = write_body(res, &mut file, &mut progress, &mut on_progress).await;

        if let Err(err) = result {
            drop(file);
            if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                eprintln!("failed to remove partial file {path:?}: {remove_err}");
            }
            return Err(err);
        }

        Ok(path)
    }
}

/// Opens a new file named `file_name` in `dir`, adding a ` (n)` suffix to
/// the stem when that name is taken.
async fn create_unique(dir: &Path, file_name: &str) -> anyhow::Result<(File, PathBuf)> {
    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name);
    let ext = name.extension().and_then(|ext| ext.to_str());

    for n in 0..MAX_NAME_ATTEMPTS {
        let candidate = match (n, ext) {
            (0, _) => file_name.to_owned(),
            (n, Some(ext)) => format!("{stem} ({n}).{ext}"),
            (n, None) => format!("{stem} ({n})"),
        };

        let path = dir.join(candidate);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((file, path)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err).with_context(|| format!("failed to create {path:?}")),
        }
    }

    bail!("no free file name for '{file_name}' in {dir:?}")
}

async fn write_body(
    res: Response,
    file: &mut File,
    progress: &mut TransferProgress,
    on_progress: &mut impl FnMut(&TransferProgress),
) -> anyhow::Result<()> {
    let mut body = res.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.context("transfer interrupted")?;
        file.write_all(&chunk).await?;
        progress.advance(chunk.len());
        on_progress(progress);
    }

    file.flush().await?;
    progress.verify()
}

pub fn base_url(addr: &str, port: u16) -> String {
    format!("http://{addr}:{port}")
}

async fn check_status(res: Response) -> anyhow::Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let text = res.text().await.unwrap_or_default();
    Err(match serde_json::from_str::<ErrorResponse>(&text) {
        Ok(ErrorResponse { error, kind }) => anyhow!("{error} ({kind}, {status})"),
        Err(_) => anyhow!("server responded with {status}"),
    })
}

/// File name announced in a `Content-Disposition` header, reduced to its last
/// path component so it can't escape the output directory.
pub fn attachment_file_name(header: &str) -> Option<String> {
    let name = header.split(';').map(str::trim).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("filename")
            .then(|| value.trim().trim_matches('"').to_owned())
    })?;

    Path::new(&name)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .map(|name| name.to_owned())
}
