use clap::Parser;
use std::path::PathBuf;

use crate::config::{BenchConfig, CredentialPaths, CLIENT_CERT_PATH, CLIENT_KEY_PATH, DEFAULT_ITERATIONS};

#[derive(Parser, Debug)]
#[command(name = "wfbench", about = "Eager workflow start latency benchmark")]
pub struct Args {
    /// Request eager start for every workflow
    #[arg(long)]
    pub eager: bool,

    /// Use a local service over plain HTTP instead of the remote one over TLS
    #[arg(long)]
    pub local: bool,

    /// Number of workflows measured after warm-up
    #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
    pub iter: usize,

    /// Client certificate (PEM) for TLS mode
    #[arg(long, default_value = CLIENT_CERT_PATH)]
    pub cert: PathBuf,

    /// Client private key (PEM) for TLS mode
    #[arg(long, default_value = CLIENT_KEY_PATH)]
    pub key: PathBuf,

    /// Service `host:port` speaking the wfbench HTTP protocol; required without --local
    #[arg(long, required_unless_present = "local")]
    pub host: Option<String>,

    /// Service namespace; defaults depend on --local
    #[arg(long)]
    pub namespace: Option<String>,
}

impl Args {
    pub fn into_config(self) -> BenchConfig {
        let mut config = BenchConfig::new(self.eager, self.local, self.iter);
        config.credentials = CredentialPaths { cert: self.cert, key: self.key };
        if let Some(host) = self.host {
            config.endpoint.host = host;
        }
        if let Some(namespace) = self.namespace {
            config.endpoint.namespace = namespace;
        }
        config
    }
}
