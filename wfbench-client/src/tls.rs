use std::path::Path;
use wfbench_common::{Result, WfBenchError};

/// Load a client identity from a PEM certificate and a PEM private key.
/// Missing or unparseable material is a `CredentialError`.
pub fn load_identity(cert_path: &Path, key_path: &Path) -> Result<reqwest::Identity> {
    let mut pem = read_pem(cert_path)?;
    pem.push(b'\n');
    pem.extend_from_slice(&read_pem(key_path)?);

    reqwest::Identity::from_pem(&pem).map_err(|e| {
        WfBenchError::CredentialError(format!(
            "unable to load cert and key pair ({}, {}): {e}",
            cert_path.display(),
            key_path.display()
        ))
    })
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| WfBenchError::CredentialError(format!("{}: {e}", path.display())))
}
