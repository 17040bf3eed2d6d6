//! TLS connector construction.

use std::io::BufReader;
use std::path::Path;

use rustls::pki_types::CertificateDer;
use rustls::{ClientConfig, RootCertStore};
use tokio_postgres_rustls::MakeRustlsConnect;

use crate::config::{ProbeConfig, SslMode};
use crate::error::{ProbeError, Result};

/// Connector for `config`, or `None` when the session runs in plaintext.
///
/// `prefer` without a root certificate falls back to plaintext; `require`
/// without one is rejected by `ProbeConfig::validate`.
pub(crate) fn connector(config: &ProbeConfig) -> Result<Option<MakeRustlsConnect>> {
    let path = match (config.ssl_mode, &config.ssl_root_cert) {
        (SslMode::Disable, _) | (SslMode::Prefer, None) => return Ok(None),
        (SslMode::Require, None) => {
            return Err(ProbeError::Tls(
                "ssl_mode=require needs ssl_root_cert".to_string(),
            ))
        }
        (_, Some(path)) => path,
    };

    let roots = load_roots(path)?;
    let client = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Some(MakeRustlsConnect::new(client)))
}

fn load_roots(path: &Path) -> Result<RootCertStore> {
    let pem = std::fs::read(path)?;
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut BufReader::new(&pem[..]))
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| ProbeError::Tls(format!("{}: {}", path.display(), e)))?;

    if certs.is_empty() {
        return Err(ProbeError::Tls(format!(
            "No certificates found in {}",
            path.display()
        )));
    }

    let mut roots = RootCertStore::empty();
    for cert in certs {
        roots
            .add(cert)
            .map_err(|e| ProbeError::Tls(format!("{}: {}", path.display(), e)))?;
    }
    Ok(roots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Self-signed P-256 CA, `CN=sqlprobe-test-ca`.
    const TEST_CA: &str = "\
-----BEGIN CERTIFICATE-----
MIIBjDCCATOgAwIBAgIUOICqBy1hx50tAjseIIkuQ9xHCb8wCgYIKoZIzj0EAwIw
GzEZMBcGA1UEAwwQc3FscHJvYmUtdGVzdC1jYTAgFw0yNjEwMTgxNjA5MzZaGA8y
MTI2MDkyNDE2MDkzNlowGzEZMBcGA1UEAwwQc3FscHJvYmUtdGVzdC1jYTBZMBMG
ByqGSM49AgEGCCqGSM49AwEHA0IABGbfyapTgnQzh3/fWPr/VKR9SZRia6P4It9/
u4zLGByxHH10jnnc/W4+IFOkqTHgcxHrrAEbE/ybxItvgmp5eymjUzBRMB0GA1Ud
DgQWBBT4nLK5jhZtJdk9W1x26R7HPwgobTAfBgNVHSMEGDAWgBT4nLK5jhZtJdk9
W1x26R7HPwgobTAPBgNVHRMBAf8EBTADAQH/MAoGCCqGSM49BAMCA0cAMEQCIETb
RAcmQ61917xal73ByAuorsR22PfjbicrEcRt4CkUAiACR/efLcWG1YMyZrkokzzQ
0cF4CIsu+yWOJLrOr8+7WQ==
-----END CERTIFICATE-----
";

    fn ca_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(TEST_CA.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_roots() {
        let file = ca_file();
        let roots = load_roots(file.path()).unwrap();
        assert_eq!(roots.len(), 1);
    }

    #[test]
    fn test_connector_with_root_cert() {
        let file = ca_file();
        for ssl_mode in [SslMode::Prefer, SslMode::Require] {
            let config = ProbeConfig {
                ssl_mode,
                ssl_root_cert: Some(file.path().to_path_buf()),
                ..Default::default()
            };
            assert!(connector(&config).unwrap().is_some(), "{}", ssl_mode);
        }
    }

    #[test]
    fn test_plaintext_modes() {
        let config = ProbeConfig::default();
        assert!(connector(&config).unwrap().is_none());

        let config = ProbeConfig {
            ssl_mode: SslMode::Prefer,
            ..Default::default()
        };
        assert!(connector(&config).unwrap().is_none());
    }

    #[test]
    fn test_require_without_cert() {
        let config = ProbeConfig {
            ssl_mode: SslMode::Require,
            ..Default::default()
        };
        assert!(matches!(connector(&config), Err(ProbeError::Tls(_))));
    }

    #[test]
    fn test_file_without_certificates() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not a certificate").unwrap();
        let config = ProbeConfig {
            ssl_mode: SslMode::Require,
            ssl_root_cert: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert!(matches!(connector(&config), Err(ProbeError::Tls(_))));
    }

    #[test]
    fn test_missing_cert_file() {
        let config = ProbeConfig {
            ssl_mode: SslMode::Prefer,
            ssl_root_cert: Some("/nonexistent/ca.pem".into()),
            ..Default::default()
        };
        assert!(matches!(connector(&config), Err(ProbeError::Io(_))));
    }
}
