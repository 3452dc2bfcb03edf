#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use lantern::config::{Config, LimitConfig, TimeoutConfig};
use lantern::http::connection::Connection;
use lantern::lookup::Upstream;
use lantern::server::ServerState;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::mpsc;

/// Fresh, empty directory unique to one test.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("lantern-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Stand-in for the lookup service. Each received query is reported on
/// the returned channel and answered with the lines `reply` produces,
/// followed by a blank line.
pub fn fake_lookup_service<F>(reply: F) -> (DuplexStream, mpsc::UnboundedReceiver<String>)
where
    F: Fn(&str) -> Vec<String> + Send + 'static,
{
    fake_lookup_service_raw(move |query| {
        let mut bytes = Vec::new();
        for line in reply(query) {
            bytes.extend_from_slice(line.as_bytes());
            bytes.push(b'\n');
        }
        bytes.push(b'\n');
        bytes
    })
}

/// Like `fake_lookup_service`, but `reply` supplies the exact bytes sent
/// back, terminator included.
pub fn fake_lookup_service_raw<F>(reply: F) -> (DuplexStream, mpsc::UnboundedReceiver<String>)
where
    F: Fn(&str) -> Vec<u8> + Send + 'static,
{
    let (ours, theirs) = tokio::io::duplex(4096);
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (read, mut write) = tokio::io::split(theirs);
        let mut lines = BufReader::new(read).lines();
        while let Ok(Some(query)) = lines.next_line().await {
            let _ = seen_tx.send(query.clone());
            for line in reply(&query).split_inclusive(|b| *b == b'\n') {
                if write.write_all(line).await.is_err() {
                    return;
                }
                tokio::task::yield_now().await;
            }
        }
    });

    (ours, seen_rx)
}

/// Two records per query, both naming the query itself.
pub fn echo_reply(query: &str) -> Vec<String> {
    (1..=2)
        .map(|i| format!("{i:4}: {{{query}}} said {{message {i} for {query}}}"))
        .collect()
}

pub fn test_config(web_root: &Path) -> Config {
    Config {
        listen_addr: "127.0.0.1:0".to_string(),
        web_root: web_root.to_path_buf(),
        lookup_addr: "127.0.0.1:0".to_string(),
        timeouts: TimeoutConfig {
            client_secs: 5,
            upstream_secs: 5,
        },
        limits: LimitConfig::default(),
    }
}

pub fn test_state(web_root: &Path, upstream: DuplexStream) -> Arc<ServerState> {
    ServerState::new(test_config(web_root), Upstream::new(upstream, Duration::from_secs(5)))
}

/// Sends `request` through a fresh connection handler and returns
/// everything written back before the connection closed.
pub async fn roundtrip(state: Arc<ServerState>, request: &str) -> String {
    let (mut client, server) = tokio::io::duplex(64 * 1024);
    let handler = tokio::spawn(Connection::new(server, "127.0.0.1", state).run());

    client.write_all(request.as_bytes()).await.unwrap();
    client.shutdown().await.unwrap();
    let mut out = Vec::new();
    client.read_to_end(&mut out).await.unwrap();

    handler.await.unwrap().unwrap();
    String::from_utf8_lossy(&out).into_owned()
}
