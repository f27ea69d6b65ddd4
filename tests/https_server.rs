//! End-to-end tests for the HTTPS static server.
//!
//! Each test serves a temporary directory on an ephemeral loopback port. The
//! certificate comes from an rcgen-backed issuer so no `openssl` binary is
//! needed.
//!
//! Run with: cargo test --test https_server

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;

use tlsserve::cert::{CertificateIssuer, CertificateRequest, ProvisionError};
use tlsserve::{start_server, OpensslIssuer, ServerConfig, ServerError, ShutdownHandle};

const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Issuer that writes an rcgen certificate and remembers its DER encoding.
#[derive(Default)]
struct RcgenIssuer {
    issued: Mutex<Vec<Vec<u8>>>,
}

#[async_trait]
impl CertificateIssuer for RcgenIssuer {
    async fn issue(&self, request: &CertificateRequest) -> Result<(), ProvisionError> {
        let certified = rcgen::generate_simple_self_signed(request.hostnames()).unwrap();
        std::fs::write(&request.cert_path, certified.cert.pem()).unwrap();
        std::fs::write(&request.key_path, certified.key_pair.serialize_pem()).unwrap();
        self.issued
            .lock()
            .unwrap()
            .push(certified.cert.der().to_vec());
        Ok(())
    }
}

impl RcgenIssuer {
    fn issued(&self) -> Vec<Vec<u8>> {
        self.issued.lock().unwrap().clone()
    }
}

/// A running server plus the handles needed to stop it.
struct TestServer {
    addr: SocketAddr,
    shutdown: ShutdownHandle,
    task: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    async fn start(dir: &TempDir, issuer: Arc<dyn CertificateIssuer>) -> Self {
        let mut config = ServerConfig::for_root(dir.path(), 0);
        config.bind_ip = IpAddr::V4(Ipv4Addr::LOCALHOST);

        let shutdown = ShutdownHandle::new();
        let task = tokio::spawn(start_server(config, issuer, shutdown.clone()));

        let addr = tokio::time::timeout(STARTUP_TIMEOUT, shutdown.listening())
            .await
            .expect("server did not start in time")
            .expect("server stopped before listening");

        Self {
            addr,
            shutdown,
            task,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("https://127.0.0.1:{}{}", self.addr.port(), path)
    }

    async fn stop(self) -> SocketAddr {
        self.shutdown.shutdown();
        tokio::time::timeout(STARTUP_TIMEOUT, self.task)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked")
            .expect("server returned an error");
        self.addr
    }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .tls_info(true)
        .build()
        .unwrap()
}

fn site() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>camera test</h1>").unwrap();
    std::fs::write(dir.path().join("style.css"), "body { margin: 0 }").unwrap();
    std::fs::create_dir(dir.path().join("assets")).unwrap();
    std::fs::write(dir.path().join("assets").join("logo.svg"), "<svg/>").unwrap();
    dir
}

#[tokio::test]
async fn serves_index_over_tls_with_generated_certificate() {
    let dir = site();
    let issuer = Arc::new(RcgenIssuer::default());
    let server = TestServer::start(&dir, issuer.clone()).await;

    assert!(dir.path().join("server.crt").exists());
    assert!(dir.path().join("server.key").exists());

    let client = client();
    let response = client.get(server.url("/")).send().await.unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["cache-control"], "no-cache");
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/html"));

    let peer = response
        .extensions()
        .get::<reqwest::tls::TlsInfo>()
        .and_then(|info| info.peer_certificate())
        .map(<[u8]>::to_vec)
        .unwrap();
    assert_eq!(issuer.issued(), vec![peer]);

    assert_eq!(response.text().await.unwrap(), "<h1>camera test</h1>");

    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn content_type_from_extension() {
    let dir = site();
    let server = TestServer::start(&dir, Arc::new(RcgenIssuer::default())).await;

    let response = client().get(server.url("/style.css")).send().await.unwrap();

    assert_eq!(response.status(), 200);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/css"));

    server.stop().await;
}

#[tokio::test]
async fn missing_path_is_404() {
    let dir = site();
    let server = TestServer::start(&dir, Arc::new(RcgenIssuer::default())).await;
    let client = client();

    let response = client.get(server.url("/nope.html")).send().await.unwrap();
    assert_eq!(response.status(), 404);

    let response = client.get(server.url("/missing/dir/")).send().await.unwrap();
    assert_eq!(response.status(), 404);

    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn certificate_material_is_not_served() {
    let dir = site();
    let server = TestServer::start(&dir, Arc::new(RcgenIssuer::default())).await;
    let client = client();

    for path in [
        "/server.key",
        "/server.crt",
        "//server.key",
        "/server%2Ekey",
        "/Server.KEY",
    ] {
        let response = client.get(server.url(path)).send().await.unwrap();
        assert_eq!(response.status(), 404, "{path} should be hidden");
    }

    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn directory_without_index_is_listed() {
    let dir = site();
    let server = TestServer::start(&dir, Arc::new(RcgenIssuer::default())).await;
    let client = client();

    let response = client.get(server.url("/assets/")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("Directory listing for /assets/"));
    assert!(body.contains("href=\"logo.svg\""));

    // Without the trailing slash the client is redirected to the directory
    let response = client.get(server.url("/assets")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.url().path().ends_with("/assets/"));

    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn failed_handshake_does_not_affect_other_clients() {
    let dir = site();
    let server = TestServer::start(&dir, Arc::new(RcgenIssuer::default())).await;

    let mut raw = tokio::net::TcpStream::connect(server.addr).await.unwrap();
    raw.write_all(b"GET / HTTP/1.1\r\nHost: plain\r\n\r\n")
        .await
        .unwrap();
    drop(raw);

    let response = client().get(server.url("/")).send().await.unwrap();
    assert_eq!(response.status(), 200);

    server.stop().await;
}

#[tokio::test]
async fn shutdown_releases_port() {
    let dir = site();
    let server = TestServer::start(&dir, Arc::new(RcgenIssuer::default())).await;

    let response = client().get(server.url("/")).send().await.unwrap();
    assert_eq!(response.status(), 200);

    let addr = server.stop().await;

    std::net::TcpListener::bind(addr).expect("port still held after shutdown");
}

#[tokio::test]
async fn existing_certificate_is_reused_across_runs() {
    let dir = site();
    let issuer = Arc::new(RcgenIssuer::default());

    let first = TestServer::start(&dir, issuer.clone()).await;
    first.stop().await;
    let cert = std::fs::read(dir.path().join("server.crt")).unwrap();

    let second = TestServer::start(&dir, issuer.clone()).await;
    let response = client().get(second.url("/")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    second.stop().await;

    assert_eq!(issuer.issued().len(), 1);
    assert_eq!(std::fs::read(dir.path().join("server.crt")).unwrap(), cert);
}

#[tokio::test]
async fn missing_certificate_tool_is_fatal() {
    let dir = site();
    let mut config = ServerConfig::for_root(dir.path(), 0);
    config.bind_ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
    let issuer = Arc::new(OpensslIssuer::new(dir.path().join("no-such-openssl")));

    let err = start_server(config, issuer, ShutdownHandle::new())
        .await
        .unwrap_err();

    match err {
        ServerError::Provision(ProvisionError::ToolNotFound { program }) => {
            assert_eq!(program, dir.path().join("no-such-openssl"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!dir.path().join("server.crt").exists());
}
