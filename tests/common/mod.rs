//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, UnixListener};

use edge_gateway::cache::ContentCache;
use edge_gateway::config::GatewayConfig;
use edge_gateway::http::{Dispatcher, HttpServer};
use edge_gateway::lifecycle::Shutdown;
use edge_gateway::registrar::envelope::{self, IncomingQuery};
use edge_gateway::registrar::Registrar;

/// A gateway running on an ephemeral loopback port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub cache: ContentCache,
    pub registrar: Registrar,
    pub dir: TempDir,
}

impl TestGateway {
    pub fn url(&self, target: &str) -> String {
        format!("http://{}{}", self.addr, target)
    }

    pub fn socket_path(&self) -> std::path::PathBuf {
        self.dir.path().join("registrar.sock")
    }

    /// Wait until the registrar task holds a live socket.
    pub async fn wait_connected(&self) {
        wait_until(Duration::from_secs(5), || self.registrar.is_connected()).await;
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Temporary directory with `public/` populated from `files`.
pub fn public_dir(files: &[(&str, &[u8])]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let public = dir.path().join("public");
    std::fs::create_dir_all(&public).unwrap();
    for (name, data) in files {
        let path = public.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, data).unwrap();
    }
    dir
}

/// Config pointing at `dir/public` and `dir/registrar.sock`.
pub fn config_for(dir: &Path) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.content.public_dir = dir.join("public").display().to_string();
    config.registrar.socket_path = dir.join("registrar.sock").display().to_string();
    config.registrar.reconnect_base_ms = 10;
    config.registrar.reconnect_max_ms = 50;
    config
}

/// Start the gateway over plaintext on 127.0.0.1.
pub async fn start_gateway(dir: TempDir, config: GatewayConfig) -> TestGateway {
    let shutdown = Shutdown::new();
    let cache = ContentCache::default();
    let registrar = Registrar::spawn(&config.registrar, shutdown.subscribe());
    let dispatcher = Dispatcher::new(&config, cache.clone(), registrar.clone());
    let server = HttpServer::new(config, dispatcher);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestGateway { addr, shutdown, cache, registrar, dir }
}

/// Start a backend on `socket` answering each query with the raw JSON `f` returns.
pub async fn start_mock_registrar<F, Fut>(socket: &Path, f: F)
where
    F: Fn(IncomingQuery) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = String> + Send + 'static,
{
    let listener = UnixListener::bind(socket).unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let (read, write) = stream.into_split();
                let write = Arc::new(tokio::sync::Mutex::new(write));
                let mut lines = BufReader::new(read).lines();

                while let Ok(Some(line)) = lines.next_line().await {
                    let Ok(query) = envelope::decode_query(&line) else {
                        continue;
                    };
                    let (f, write) = (f.clone(), write.clone());
                    tokio::spawn(async move {
                        let id = query.id;
                        let body = f(query).await;
                        let reply = format!("{{\"id\":{},\"body\":{}}}\n", id, body);
                        let _ = write.lock().await.write_all(reply.as_bytes()).await;
                    });
                }
            });
        }
    });
}

/// Backend that echoes the payload back after `delay`.
pub async fn start_echo_registrar(socket: &Path, delay: Duration) {
    start_mock_registrar(socket, move |query| async move {
        tokio::time::sleep(delay).await;
        serde_json::json!({ "status": "ok", "payload": query.payload }).to_string()
    })
    .await;
}

pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + limit;
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in {limit:?}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Client that never follows redirects.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

pub fn gunzip(data: &[u8]) -> Vec<u8> {
    use std::io::Read;
    let mut out = Vec::new();
    flate2::read::GzDecoder::new(data).read_to_end(&mut out).unwrap();
    out
}
