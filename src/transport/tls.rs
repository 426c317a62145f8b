use super::{TransportError, read_file};
use crate::domain::TlsConfig;
use reqwest::{Certificate, ClientBuilder, Identity};
use std::path::Path;
use tracing::warn;

/// Applies a route's TLS settings to a client builder.
pub fn configure(
    mut builder: ClientBuilder,
    tls_config: &TlsConfig,
) -> Result<ClientBuilder, TransportError> {
    if let (Some(cert_file), Some(key_file)) = (&tls_config.cert_file, &tls_config.key_file) {
        builder = builder.identity(load_identity(cert_file, key_file)?);
    }

    match &tls_config.ca_file {
        Some(ca_file) => {
            for certificate in load_ca_bundle(ca_file)? {
                builder = builder.add_root_certificate(certificate);
            }
            if tls_config.insecure_skip_verify {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }
        None if tls_config.insecure_skip_verify => {
            warn!("tlsConfig.insecureSkipVerify only applies together with tlsConfig.caFile");
        }
        None => {}
    }

    Ok(builder)
}

/// Loads a PEM client certificate and private key as one identity.
pub fn load_identity(cert_file: &Path, key_file: &Path) -> Result<Identity, TransportError> {
    let mut pem = read_file("certificate", cert_file)?;
    let key = read_file("private key", key_file)?;
    pem.push(b'\n');
    pem.extend_from_slice(&key);
    Identity::from_pem(&pem).map_err(TransportError::InvalidKeyPair)
}

/// Loads every certificate of a PEM CA bundle; a bundle without any is an error.
pub fn load_ca_bundle(ca_file: &Path) -> Result<Vec<Certificate>, TransportError> {
    let pem = read_file("CA bundle", ca_file)?;
    if pem.iter().all(u8::is_ascii_whitespace) {
        return Err(TransportError::EmptyCaBundle(ca_file.to_path_buf()));
    }

    let certificates =
        Certificate::from_pem_bundle(&pem).map_err(|source| TransportError::InvalidCaBundle {
            path: ca_file.to_path_buf(),
            source,
        })?;
    if certificates.is_empty() {
        return Err(TransportError::NoCertificates(ca_file.to_path_buf()));
    }
    Ok(certificates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{CertifiedKey, generate_simple_self_signed};
    use tempfile::TempDir;

    fn self_signed() -> CertifiedKey {
        generate_simple_self_signed(vec!["localhost".to_string()]).unwrap()
    }

    #[test]
    fn loads_generated_ca_bundle() {
        let dir = TempDir::new().unwrap();
        let first = self_signed();
        let second = self_signed();
        let path = dir.path().join("ca.pem");
        std::fs::write(&path, format!("{}{}", first.cert.pem(), second.cert.pem())).unwrap();

        assert_eq!(load_ca_bundle(&path).unwrap().len(), 2);
    }

    #[test]
    fn empty_ca_bundle_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ca.pem");
        std::fs::write(&path, "\n  \n").unwrap();

        assert!(matches!(
            load_ca_bundle(&path),
            Err(TransportError::EmptyCaBundle(_))
        ));
    }

    #[test]
    fn ca_bundle_without_certificates_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ca.pem");
        std::fs::write(&path, "this is not a certificate\n").unwrap();

        assert!(matches!(
            load_ca_bundle(&path),
            Err(TransportError::NoCertificates(_) | TransportError::InvalidCaBundle { .. })
        ));
    }

    #[test]
    fn missing_files_are_read_errors() {
        let missing = Path::new("/does/not/exist.pem");
        assert!(matches!(
            load_ca_bundle(missing),
            Err(TransportError::ReadFile {
                kind: "CA bundle",
                ..
            })
        ));
        assert!(matches!(
            load_identity(missing, missing),
            Err(TransportError::ReadFile {
                kind: "certificate",
                ..
            })
        ));
    }

    #[test]
    fn loads_generated_identity() {
        let dir = TempDir::new().unwrap();
        let generated = self_signed();
        let cert_path = dir.path().join("client.pem");
        let key_path = dir.path().join("client-key.pem");
        std::fs::write(&cert_path, generated.cert.pem()).unwrap();
        std::fs::write(&key_path, generated.key_pair.serialize_pem()).unwrap();

        assert!(load_identity(&cert_path, &key_path).is_ok());
    }
}
