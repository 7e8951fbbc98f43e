//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use seqlog::config::BatchConfig;
use seqlog::log::{decorate, ChainConfig, LogCore, LogFactory, MemoryLog};
use seqlog::network::{LogClient, Server, ServerHandle};
use seqlog::Config;

/// Start a server on an ephemeral port serving decorated in-memory logs
pub fn spawn_server(batch: BatchConfig) -> ServerHandle {
    let config = Config::builder().listen_addr("127.0.0.1:0").batch(batch).build();
    let chain = ChainConfig::from_config(&config);

    let factory = move |_path: &str, _args: &[String]| -> seqlog::Result<Arc<dyn LogCore>> {
        Ok(decorate(MemoryLog::new(), &chain))
    };
    let factory: Arc<dyn LogFactory> = Arc::new(factory);

    Server::bind(config, factory).unwrap().spawn().unwrap()
}

/// Client config with a short request deadline
pub fn client_config(request_timeout_ms: u64) -> Config {
    Config::builder()
        .connect_timeout_ms(1000)
        .request_timeout_ms(request_timeout_ms)
        .build()
}

/// Client for `path` on the server at `addr`
pub fn client(addr: impl ToString, path: &str) -> LogClient {
    LogClient::new(addr.to_string(), path, Vec::new(), client_config(5000))
}

/// Poll `cond` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
