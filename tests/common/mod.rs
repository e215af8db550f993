//! Shared helpers for integration tests: self-signed keystores, free ports
//! and an HTTPS client that reports the served certificate.

#![allow(dead_code)]

use std::net::{SocketAddr, TcpListener};
use std::path::{Path, PathBuf};
use std::time::Duration;

use hotcert::{WebServer, WebServerBuilder};
use rcgen::{generate_simple_self_signed, CertifiedKey};

/// A generated certificate and its PEM keystore contents.
pub struct TestKeystore {
    pub pem: String,
    pub der: Vec<u8>,
}

impl TestKeystore {
    pub fn generate() -> Self {
        let CertifiedKey { cert, key_pair } =
            generate_simple_self_signed(vec!["localhost".to_string(), "127.0.0.1".to_string()])
                .expect("generate certificate");
        Self {
            pem: format!("{}{}", cert.pem(), key_pair.serialize_pem()),
            der: cert.der().as_ref().to_vec(),
        }
    }

    /// Same shape, with the key as a PBES2-encrypted PKCS#8 block.
    pub fn generate_encrypted(password: &str) -> Self {
        let CertifiedKey { cert, key_pair } =
            generate_simple_self_signed(vec!["localhost".to_string(), "127.0.0.1".to_string()])
                .expect("generate certificate");
        let params =
            pkcs8::pkcs5::pbes2::Parameters::pbkdf2_sha256_aes256cbc(2048, b"fixture", &[3; 16])
                .expect("encryption parameters");
        let key_der = key_pair.serialize_der();
        let key = pkcs8::PrivateKeyInfo::try_from(key_der.as_slice())
            .expect("parse generated key")
            .encrypt_with_params(params, password)
            .expect("encrypt key")
            .to_pem("ENCRYPTED PRIVATE KEY", pkcs8::LineEnding::LF)
            .expect("encode key");
        Self {
            pem: format!("{}{}", cert.pem(), key.as_str()),
            der: cert.der().as_ref().to_vec(),
        }
    }
}

/// Replace `path` atomically so the watcher never hashes a partial write.
pub fn replace_file(path: &Path, contents: &str) {
    let staging = path.with_extension("staging");
    std::fs::write(&staging, contents).expect("write staging file");
    std::fs::rename(&staging, path).expect("rename staging file");
}

/// A directory holding `keystore.pem` for one test.
pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub keystore: PathBuf,
}

impl Fixture {
    pub fn new(keystore: &TestKeystore) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("keystore.pem");
        std::fs::write(&path, &keystore.pem).expect("write keystore");
        Self {
            dir,
            keystore: path,
        }
    }

    /// Builder bound to loopback on a free port with short intervals.
    pub fn builder(&self) -> WebServerBuilder {
        WebServerBuilder::new()
            .keystore(&self.keystore, "")
            .host("127.0.0.1")
            .port(free_port())
            .shutdown_grace(Duration::from_millis(200))
            .poll_interval(Duration::from_millis(200))
    }
}

/// A port that was free a moment ago.
pub fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .expect("find free port")
}

/// Client that accepts self-signed certificates, never reuses connections
/// and never follows redirects.
pub fn client() -> reqwest::Client {
    client_builder().build().expect("build client")
}

pub fn client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .use_rustls_tls()
        .danger_accept_invalid_certs(true)
        .tls_info(true)
        .pool_max_idle_per_host(0)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(5))
}

pub fn https_url(addr: SocketAddr, path: &str) -> String {
    format!("https://127.0.0.1:{}{}", addr.port(), path)
}

/// DER of the certificate the server presented.
pub fn peer_certificate(response: &reqwest::Response) -> Option<Vec<u8>> {
    response
        .extensions()
        .get::<reqwest::tls::TlsInfo>()
        .and_then(|info| info.peer_certificate())
        .map(<[u8]>::to_vec)
}

/// Poll until the server presents `expected`, or give up after `timeout`.
pub async fn wait_for_certificate(server: &WebServer, expected: &[u8], timeout: Duration) -> bool {
    let client = client();
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if let Some(addr) = server.local_addr().await {
            if let Ok(response) = client.get(https_url(addr, "/")).send().await {
                if peer_certificate(&response).as_deref() == Some(expected) {
                    return true;
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}
