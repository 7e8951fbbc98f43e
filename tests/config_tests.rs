//! Tests for configuration

use seqlog::config::{parse_peers, BatchConfig, MIN_PEERS};
use seqlog::{Config, LogError};

#[test]
fn test_defaults() {
    let config = Config::default();

    assert_eq!(config.listen_addr, "127.0.0.1:7070");
    assert_eq!(config.read_timeout_ms, 0);
    assert!(!config.batch.enabled);
    assert!(config.peers.is_empty());
}

#[test]
fn test_builder_overrides() {
    let config = Config::builder()
        .listen_addr("0.0.0.0:9000")
        .request_timeout_ms(250)
        .max_pending_requests(8)
        .batch(BatchConfig::enabled(5, 0))
        .build();

    assert_eq!(config.listen_addr, "0.0.0.0:9000");
    assert_eq!(config.request_timeout().as_millis(), 250);
    assert_eq!(config.max_pending_requests, 8);
    assert!(config.batch.enabled);
    // A zero size trigger would flush before buffering anything
    assert_eq!(config.batch.max_records, 1);
}

#[test]
fn test_parse_peers() {
    let peers = parse_peers(" a:1, b:2 ,,c:3 ").unwrap();
    assert_eq!(peers, vec!["a:1", "b:2", "c:3"]);
}

#[test]
fn test_too_few_peers() {
    match parse_peers("a:1,b:2") {
        Err(LogError::Config(msg)) => assert!(msg.contains(&MIN_PEERS.to_string())),
        other => panic!("Expected config error, got {:?}", other),
    }
    assert!(parse_peers("").is_err());
}
