use std::path::PathBuf;
use wfbench_common::{Endpoint, TASK_QUEUE};

/// Measured trials when `--iter` is not given.
pub const DEFAULT_ITERATIONS: usize = 100;

/// Discarded trials run before measuring.
pub const WARMUP_TRIALS: usize = 50;

pub const CLIENT_CERT_PATH: &str = "./client.pem";
pub const CLIENT_KEY_PATH: &str = "./client.key";

/// Managed deployment reached over gRPC; the `wfbench` CLI needs `--host` in TLS mode.
pub const REMOTE_HOST: &str = "eager-wf-start.a2dd6.tmprl.cloud:7233";
pub const REMOTE_NAMESPACE: &str = "eager-wf-start.a2dd6";

pub const LOCAL_HOST: &str = "127.0.0.1:7233";
pub const LOCAL_NAMESPACE: &str = "default";

/// Client certificate and private key used in TLS mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl Default for CredentialPaths {
    fn default() -> Self {
        Self { cert: PathBuf::from(CLIENT_CERT_PATH), key: PathBuf::from(CLIENT_KEY_PATH) }
    }
}

/// Everything a benchmark run needs to know up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchConfig {
    pub eager: bool,
    /// Plain connection to a local service instead of TLS to the remote one.
    pub local: bool,
    pub iterations: usize,
    pub warmup_trials: usize,
    pub task_queue: String,
    pub credentials: CredentialPaths,
    pub endpoint: Endpoint,
}

impl BenchConfig {
    /// Defaults for the given mode: the built-in endpoint for `local`, the
    /// default credential paths, 50 warm-up trials.
    pub fn new(eager: bool, local: bool, iterations: usize) -> Self {
        Self {
            eager,
            local,
            iterations,
            warmup_trials: WARMUP_TRIALS,
            task_queue: TASK_QUEUE.to_string(),
            credentials: CredentialPaths::default(),
            endpoint: default_endpoint(local),
        }
    }
}

pub fn default_endpoint(local: bool) -> Endpoint {
    let (host, namespace) = if local {
        (LOCAL_HOST, LOCAL_NAMESPACE)
    } else {
        (REMOTE_HOST, REMOTE_NAMESPACE)
    };
    Endpoint { host: host.to_string(), namespace: namespace.to_string() }
}
