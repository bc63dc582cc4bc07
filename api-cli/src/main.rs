use std::{
    io::Write,
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};
use itertools::Itertools;
use media_relay_api::{
    media::ResolvedMedia,
    routes::{download::DownloadRequest, info::InfoRequest},
};
use tokio::io::{AsyncBufReadExt, BufReader};

use client::ApiClient;
use progress::{human_size, TransferProgress};
use session::ClientSession;

mod client;
mod progress;
mod session;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub action: Action,
    #[arg(short, long, default_value_t = String::from("127.0.0.1"))]
    /// IP address of the relay server
    pub addr: String,
    #[arg(short, long, default_value_t = 8000)]
    /// Port of the relay server
    pub port: u16,
    #[arg(short, long)]
    /// Only print URL and body instead of performing network actions
    pub dry_run: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Action {
    #[command(about = "Show the title and available formats of a video")]
    Info {
        #[arg(short, long)]
        url: String,
    },
    #[command(about = "Download a video in the given format")]
    Download {
        #[arg(short, long)]
        url: String,
        #[arg(short, long)]
        /// Best available quality when missing
        format_id: Option<String>,
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
    #[command(about = "Look up videos and download them one after another")]
    Interactive {
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let client = ApiClient::new(&args.addr, args.port);

    if args.dry_run {
        print_dry_run(&client, &args.action)?;
        return Ok(());
    }

    match args.action {
        Action::Info { url } => {
            let media = client.info(&url).await?;
            print_media(&media);
        }
        Action::Download {
            url,
            format_id,
            output_dir,
        } => {
            let request = DownloadRequest { url, format_id };
            download(&client, &request, &output_dir).await?;
        }
        Action::Interactive { output_dir } => interactive(&client, &output_dir).await?,
    }

    Ok(())
}

fn print_dry_run(client: &ApiClient, action: &Action) -> anyhow::Result<()> {
    let (endpoint, body) = match action {
        Action::Info { url } => (
            "/info",
            serde_json::to_string(&InfoRequest { url: url.clone() })?,
        ),
        Action::Download { url, format_id, .. } => (
            "/download",
            serde_json::to_string(&DownloadRequest {
                url: url.clone(),
                format_id: format_id.clone(),
            })?,
        ),
        Action::Interactive { .. } => (
            "/info",
            String::from("requests are sent as commands are entered"),
        ),
    };

    println!("{}", client.endpoint(endpoint));
    println!("{body}");
    Ok(())
}

fn print_media(media: &ResolvedMedia) {
    let metadata = media.metadata();
    println!("{title}", title = metadata.title);
    if let Some(uploader) = &metadata.uploader {
        println!("by {uploader}");
    }
    println!(
        "duration: {}:{:02}, thumbnail: {}",
        metadata.duration / 60,
        metadata.duration % 60,
        metadata.thumbnail
    );
    println!();

    let rows = media.formats().iter().map(|format| {
        let size = match (format.filesize, format.filesize_exact) {
            (Some(size), true) => human_size(size),
            (Some(size), false) => format!("~{}", human_size(size)),
            (None, _) => String::from("?"),
        };

        format!(
            "{id:>8}  {ext:<5} {resolution:<10} {size:>11}  {kind}",
            id = format.format_id,
            ext = format.ext,
            resolution = format.resolution.as_deref().unwrap_or("audio"),
            kind = [
                serde_json::to_string(&format.kind)
                    .unwrap_or_default()
                    .replace('"', ""),
                format.format_note.clone().unwrap_or_default(),
            ]
            .iter()
            .filter(|part| !part.is_empty())
            .join(", ")
        )
    });

    println!("{}", rows.collect_vec().join("\n"));
}

async fn download(
    client: &ApiClient,
    request: &DownloadRequest,
    output_dir: &Path,
) -> anyhow::Result<()> {
    let result = client
        .download(request, output_dir, |progress: &TransferProgress| {
            eprint!("\r{progress}");
            let _ = std::io::stderr().flush();
        })
        .await;
    eprintln!();

    let path = result?;
    println!("saved to {path:?}");
    Ok(())
}

async fn interactive(client: &ApiClient, output_dir: &Path) -> anyhow::Result<()> {
    let mut session = ClientSession::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("commands: url <link>, format <id>, download, history, quit");
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let (command, arg) = line
            .trim()
            .split_once(' ')
            .map(|(command, arg)| (command, arg.trim()))
            .unwrap_or((line.trim(), ""));

        match command {
            "" => {}
            "url" if arg.is_empty() => eprintln!("usage: url <link>"),
            "url" => match client.info(arg).await {
                Ok(media) => {
                    print_media(&media);
                    session.replace(arg, media);
                    if let Some(format) = session.selected() {
                        println!("selected format {}", format.format_id);
                    }
                }
                Err(err) => eprintln!("{err:#}"),
            },
            "format" => match session.select(arg) {
                Ok(format) => println!("selected format {}", format.format_id),
                Err(err) => eprintln!("{err:#}"),
            },
            "download" => {
                let entry = match session.begin_download() {
                    Ok(entry) => entry,
                    Err(err) => {
                        eprintln!("{err:#}");
                        continue;
                    }
                };

                let request = DownloadRequest {
                    url: entry.url,
                    format_id: Some(entry.format_id),
                };
                if let Err(err) = download(client, &request, output_dir).await {
                    eprintln!("{err:#}");
                }
            }
            "history" => {
                let history = session
                    .history()
                    .iter()
                    .enumerate()
                    .map(|(i, entry)| {
                        format!(
                            "{i:>3}. {title} [{format}] {url}",
                            title = entry.title,
                            format = entry.format_id,
                            url = entry.url
                        )
                    })
                    .join("\n");

                if history.is_empty() {
                    println!("nothing downloaded yet");
                } else {
                    println!("{history}");
                }
            }
            "quit" | "exit" => break,
            other => eprintln!("unknown command '{other}'"),
        }
    }

    Ok(())
}
