use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Server settings read from the environment
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Directory backing the default disk
    pub upload_root: PathBuf,
    /// Name of the default disk
    pub disk: String,
    /// How often stale chunk sessions are swept
    pub sweep_every: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3030,
            upload_root: PathBuf::from("./storage"),
            disk: "public".to_string(),
            sweep_every: Duration::from_secs(600),
        }
    }
}

impl ServerSettings {
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();

        if let Ok(host) = std::env::var("HTTP_HOST") {
            settings.host = host;
        }
        if let Ok(port) = std::env::var("HTTP_PORT") {
            settings.port = port
                .parse()
                .with_context(|| format!("HTTP_PORT is not a port number: '{port}'"))?;
        }
        if let Ok(root) = std::env::var("UPLOAD_ROOT") {
            settings.upload_root = PathBuf::from(root);
        }
        if let Ok(disk) = std::env::var("UPLOAD_DISK") {
            settings.disk = disk;
        }
        if let Ok(secs) = std::env::var("UPLOAD_SWEEP_SECS") {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("UPLOAD_SWEEP_SECS is not a number: '{secs}'"))?;
            settings.sweep_every = Duration::from_secs(secs.max(1));
        }

        Ok(settings)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
