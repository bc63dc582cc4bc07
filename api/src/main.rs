use std::sync::Arc;

use actix_cors::Cors;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use clap::Parser;
use log::LevelFilter;
use media_relay_api::config::{ServerArgs, ServerConfig};
use media_relay_api::resolver::YtDlpResolver;
use media_relay_api::{routes, AppData};
use tokio_util::sync::CancellationToken;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    let config = match ServerConfig::load(ServerArgs::parse()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration: {err:#}");
            std::process::exit(2);
        }
    };

    init_logging(&config);

    let resolver = YtDlpResolver::new(config.ytdlp.clone());
    match resolver.version().await {
        Some(version) => log::info!("using yt-dlp {version} at '{}'", config.ytdlp.path),
        None => log::warn!(
            "yt-dlp at '{}' can't be run, every request will fail until it is installed",
            config.ytdlp.path
        ),
    }

    let shutdown = CancellationToken::new();
    let data = Data::new(AppData::new(
        Arc::new(resolver),
        config.relay,
        shutdown.clone(),
    ));

    // abort running transfers so graceful shutdown does not wait on them
    let signal_token = shutdown.clone();
    actix_rt::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("shutdown requested, cancelling running transfers");
            signal_token.cancel();
        }
    });

    log::info!("listening on {}:{}", config.addr, config.port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .expose_headers(["content-disposition", "content-length"]);

        App::new()
            .app_data(data.clone())
            .wrap(cors)
            .configure(routes::configure)
    })
    .bind((config.addr.as_str(), config.port))?
    .run()
    .await?;

    shutdown.cancel();
    Ok(())
}

fn init_logging(config: &ServerConfig) {
    let log_file = match &config.log_file {
        Some(path) => Some(path.clone()),
        None if cfg!(not(debug_assertions)) => Some("info.log".into()),
        None => None,
    };

    match log_file {
        Some(path) => {
            if let Err(err) = simple_logging::log_to_file(&path, LevelFilter::Info) {
                simple_logging::log_to_stderr(LevelFilter::Info);
                log::error!("failed to log to {path:?}, falling back to stderr, ERROR: {err}");
            }
        }
        None => simple_logging::log_to_stderr(LevelFilter::Info),
    }
}
