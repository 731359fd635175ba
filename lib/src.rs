#![forbid(unsafe_code)]

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use tokio::{sync::watch::Receiver, task::JoinHandle};
use tonic::transport::Server as TonicServer;
use tracing::{error, info};

use crate::{config::Config, rpc::proto::registry_server::RegistryServer, snapshot::Snapshot};

pub mod config;
pub mod index;
pub mod merge;
pub mod metrics;
pub mod model;
pub mod normalize;
pub mod poll;
pub mod query;
pub mod rpc;
pub mod snapshot;
pub mod store;

///
/// Spawn the poller and the RPC server, sharing one snapshot, and
/// initialise the metrics registry.
///
/// # Errors
/// If the RPC listener cannot be bound.
///
pub async fn spawn(mut shutdown_signal: Receiver<bool>) -> Result<JoinHandle<()>, std::io::Error> {
    metrics::init().map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))?;

    let snapshot = Arc::new(Snapshot::new());

    let cache_dir = PathBuf::from(Config::get(|config| config.cache_dir.clone()).await);
    let rpc_port = Config::get(|config| config.rpc_port).await;

    let poller = tokio::spawn({
        let snapshot = snapshot.clone();
        async move {
            poll::Poller::new(snapshot, cache_dir).run().await;
        }
    });

    let rpc_server = tokio::spawn({
        let snapshot = snapshot.clone();
        async move {
            let addr = SocketAddr::from(([0, 0, 0, 0], rpc_port));
            info!("Running RPC server on {addr}");

            if let Err(err) = TonicServer::builder()
                .add_service(RegistryServer::new(rpc::server::Server::new(snapshot)))
                .serve(addr)
                .await
            {
                error!("RPC server failed: {err}");
            }
        }
    });

    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = poller => {}
            _ = rpc_server => {}
            _ = shutdown_signal.changed() => {}
        }

        Config::save().await.expect("Failed to save config");
        drop(shutdown_signal);
    }))
}
