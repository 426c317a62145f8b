use exporter_gateway::app::Config;
use exporter_gateway::domain::{RouteError, TlsConfig};
use exporter_gateway::transfer::{Transfer, TransferError};
use exporter_gateway::transport::{TransportError, TransportFactory};
use rcgen::generate_simple_self_signed;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct TlsFiles {
    _dir: TempDir,
    ca: PathBuf,
    cert: PathBuf,
    key: PathBuf,
}

fn tls_files() -> TlsFiles {
    let dir = TempDir::new().unwrap();
    let ca = generate_simple_self_signed(vec!["pushgateway".to_string()]).unwrap();
    let client = generate_simple_self_signed(vec!["gateway-client".to_string()]).unwrap();

    let ca_path = dir.path().join("ca.pem");
    let cert_path = dir.path().join("client.pem");
    let key_path = dir.path().join("client-key.pem");
    std::fs::write(&ca_path, ca.cert.pem()).unwrap();
    std::fs::write(&cert_path, client.cert.pem()).unwrap();
    std::fs::write(&key_path, client.key_pair.serialize_pem()).unwrap();

    TlsFiles {
        _dir: dir,
        ca: ca_path,
        cert: cert_path,
        key: key_path,
    }
}

fn sink_flag(name: &str, tls: &[(&str, &Path)]) -> String {
    let mut flag = format!("{name}.url=https://pushgateway:9091");
    for (key, path) in tls {
        flag.push_str(&format!(",{name}.tlsConfig.{key}={}", path.display()));
    }
    flag
}

fn transfer(sink: String) -> Result<Transfer, TransferError> {
    let config = Config::from_args([
        "exporter-gateway".to_string(),
        "--from".to_string(),
        "node.url=http://127.0.0.1:9100/metrics".to_string(),
        "--to".to_string(),
        sink,
    ])
    .unwrap();
    Transfer::new(config.transfer_config().unwrap())
}

#[test]
fn test_route_with_ca_and_client_identity_builds() {
    let files = tls_files();
    let flag = sink_flag(
        "secure",
        &[
            ("caFile", &files.ca),
            ("certFile", &files.cert),
            ("keyFile", &files.key),
        ],
    );

    let transfer = transfer(flag).unwrap();
    assert_eq!(transfer.sinks()[0].name(), "secure");
}

#[test]
fn test_unreadable_key_fails_endpoint_construction() {
    let files = tls_files();
    let missing = files.key.with_file_name("missing-key.pem");
    let flag = sink_flag(
        "secure",
        &[("certFile", &files.cert), ("keyFile", &missing)],
    );

    match transfer(flag) {
        Err(TransferError::Endpoint { role, name, source }) => {
            assert_eq!(role, "pushgateway");
            assert_eq!(name, "secure");
            assert!(matches!(
                source,
                TransportError::ReadFile {
                    kind: "private key",
                    ..
                }
            ));
        }
        other => panic!("Expected Endpoint error, got {other:?}"),
    }
}

#[test]
fn test_certificate_without_key_is_rejected() {
    let files = tls_files();
    let mut route = exporter_gateway::domain::Route::new(
        "secure",
        url::Url::parse("https://pushgateway:9091").unwrap(),
    );
    route.tls_config = Some(TlsConfig {
        cert_file: Some(files.cert.clone()),
        ..TlsConfig::default()
    });

    assert!(matches!(
        route.validate(),
        Err(RouteError::IncompleteKeyPair { .. })
    ));
}

#[test]
fn test_insecure_skip_verify_builds_with_or_without_ca() {
    let files = tls_files();
    let factory = TransportFactory::default();

    let mut route = exporter_gateway::domain::Route::new(
        "lab",
        url::Url::parse("https://pushgateway:9091").unwrap(),
    );
    route.tls_config = Some(TlsConfig {
        insecure_skip_verify: true,
        ..TlsConfig::default()
    });
    assert!(factory.build(&route).is_ok());

    route.tls_config = Some(TlsConfig {
        ca_file: Some(files.ca.clone()),
        insecure_skip_verify: true,
        ..TlsConfig::default()
    });
    assert!(factory.build(&route).is_ok());
}

#[test]
fn test_garbage_ca_bundle_is_rejected() {
    let files = tls_files();
    std::fs::write(&files.ca, "-----BEGIN CERTIFICATE-----\nnot base64\n-----END CERTIFICATE-----\n")
        .unwrap();
    let flag = sink_flag("secure", &[("caFile", &files.ca)]);

    assert!(matches!(
        transfer(flag),
        Err(TransferError::Endpoint { .. })
    ));
}
