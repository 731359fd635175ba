#![forbid(unsafe_code)]

use std::path::Path;

use clap::Parser;
use tokio::{
    signal::unix::{signal, SignalKind},
    sync::watch::channel,
};
use tracing::{error, info, metadata::LevelFilter};
use tracing_subscriber::{
    prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

mod cli;

fn enable_tracing() {
    let level = if let Ok(level) = std::env::var("LOG_LEVEL") {
        match level.to_ascii_lowercase().as_str() {
            "warn" => LevelFilter::WARN,
            "info" => LevelFilter::INFO,
            "trace" => LevelFilter::TRACE,
            _ => LevelFilter::ERROR,
        }
    } else if cfg!(debug_assertions) {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };

    tracing_subscriber::Registry::default()
        .with(
            (if cfg!(debug_assertions) {
                tracing_subscriber::fmt::layer()
            } else {
                tracing_subscriber::fmt::layer()
                    .with_file(false)
                    .with_line_number(false)
            })
            .compact()
            .with_ansi(true)
            .with_filter(EnvFilter::builder().with_default_directive(level.into()).from_env_lossy()),
        )
        .init();
}

#[tokio::main]
async fn main() {
    enable_tracing();

    let cli = cli::Cli::parse();

    if let Err(err) = regsnap::config::Config::load(Path::new(&cli.config)).await {
        error!("failed to load config from {}: {err}", cli.config);
        return;
    }

    let (shutdown, shutdown_signal) = channel(false);

    let regsnap_handle = match regsnap::spawn(shutdown_signal).await {
        Ok(handle) => handle,
        Err(err) => {
            error!("{err}");
            return;
        }
    };

    let signals_handle = tokio::spawn(async move {
        let mut sigterm = signal(SignalKind::terminate()).expect("Could not set signal handler");
        let mut sigquit = signal(SignalKind::quit()).expect("Could not set signal handler");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigquit.recv() => {}
            _ = tokio::signal::ctrl_c() => {}
        }
    });

    tokio::select! {
        _ = regsnap_handle => {}
        _ = signals_handle => {}
    };

    info!("Shutting down");
    shutdown.send(true).expect("There was an issue shutting down");
    shutdown.closed().await;
}
