use std::{
    fmt::Debug,
    path::Path,
    sync::{Arc, LazyLock},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::instrument;

pub static CONFIG: LazyLock<Arc<RwLock<Config>>> = LazyLock::new(Arc::default);
static CONFIG_FILE: LazyLock<Arc<RwLock<String>>> = LazyLock::new(Arc::default);

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_cache_dir() -> String {
    "/var/cache/regsnap".into()
}

fn default_rpc_port() -> u16 {
    50051
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    pub upstream: Upstream,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Upstream {
    pub url: String,
    pub key: String,
}

#[async_trait]
pub trait Load {
    ///
    /// Load a configuration profile, which could be something like
    /// a path (e.g. a configuration file), or CLI arguments
    ///
    /// # Errors
    /// This may error in several cases, which should be documented
    /// in the implementation.
    ///
    async fn load(self, config: &mut Config) -> std::io::Result<()>;
}

#[async_trait]
impl Load for &Path {
    ///
    /// Load a file (e.g. Configuration file)
    ///
    /// # Errors
    /// Should the file not exist in readable form, this will fail. If the file also
    /// isn't valid toml this will fail.
    ///
    #[instrument(level = "info", ret, err, skip(self, config), fields(file = self.to_str()))]
    async fn load(self, config: &mut Config) -> std::io::Result<()> {
        *CONFIG_FILE.write().await = self.to_string_lossy().to_string();

        let conf = std::fs::read_to_string(self)?;
        let conf: Config = toml::from_str(&conf)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;

        *config = conf;

        Ok(())
    }
}

impl Config {
    ///
    /// Load a configuration profile
    ///
    /// # Errors
    /// This can fail if the configuration profile fails to load,
    /// see [`Load`]
    ///
    pub async fn load<C: Load + Debug>(loader: C) -> std::io::Result<()> {
        let mut config = CONFIG.write().await;
        loader.load(&mut config).await?;

        Ok(())
    }

    ///
    /// Save the config to disk
    ///
    /// # Errors
    /// While this should be unlikely, it is possible for this to
    /// result in an error if:
    ///  - There is no disk space left
    ///  - The config file is not writable
    ///
    pub async fn save() -> std::io::Result<()> {
        let file = CONFIG_FILE.read().await;
        if file.is_empty() {
            return Ok(());
        }

        std::fs::write(
            Path::new(&*file),
            toml::to_string(&*CONFIG.read().await).unwrap_or_default(),
        )
    }

    ///
    /// Retrieve a config variable from the global Configuration
    ///
    pub async fn get<F, T>(func: F) -> T
    where
        F: Fn(&Config) -> T,
    {
        func(&*CONFIG.read().await)
    }
}
