//! Tests for the server-side log registry
//!
//! These tests verify:
//! - Logs are created once per path and shared by sessions
//! - Access requires membership in the log's reference set
//! - Eviction happens when the last referencing session is released
//! - Deletion and re-creation do not inherit old registrations

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use seqlog::log::{LogCore, LogFactory, MemoryLog};
use seqlog::network::LogRegistry;
use seqlog::LogError;

// =============================================================================
// Helper Functions
// =============================================================================

fn registry() -> (LogRegistry, Arc<AtomicUsize>) {
    let opened = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&opened);
    let factory = move |_path: &str, _args: &[String]| -> seqlog::Result<Arc<dyn LogCore>> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryLog::new()))
    };
    let factory: Arc<dyn LogFactory> = Arc::new(factory);
    (LogRegistry::new(factory), opened)
}

fn paths(list: &[&str]) -> Vec<String> {
    list.iter().map(|p| p.to_string()).collect()
}

// =============================================================================
// Registration Tests
// =============================================================================

#[test]
fn test_register_shares_one_log() {
    let (registry, opened) = registry();

    registry.register("p", &[], 1).unwrap();
    registry.register("p", &[], 2).unwrap();
    registry.register("p", &[], 2).unwrap();

    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert_eq!(registry.references("p"), 2);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_get_for_requires_membership() {
    let (registry, _) = registry();
    registry.register("p", &[], 1).unwrap();

    assert!(registry.get_for("p", 1).is_some());
    assert!(registry.get_for("p", 2).is_none());
    assert!(registry.get_for("q", 1).is_none());
}

// =============================================================================
// Eviction Tests
// =============================================================================

#[test]
fn test_release_evicts_after_last_session() {
    let (registry, _) = registry();
    registry.register("p", &[], 1).unwrap();
    registry.register("p", &[], 2).unwrap();

    assert!(registry.release(1, &paths(&["p"])).is_empty());
    assert!(registry.contains("p"));

    assert_eq!(registry.release(2, &paths(&["p"])), vec!["p".to_string()]);
    assert!(registry.is_empty());
}

#[test]
fn test_recreated_log_ignores_old_registrations() {
    let (registry, opened) = registry();
    registry.register("p", &[], 1).unwrap();
    registry.register("p", &[], 2).unwrap();

    registry.delete("p", 1).unwrap();
    registry.register("p", &[], 1).unwrap();
    assert_eq!(opened.load(Ordering::SeqCst), 2);

    // Session 2 registered the deleted instance only
    assert!(registry.get_for("p", 2).is_none());
    assert!(matches!(
        registry.delete("p", 2),
        Err(LogError::LogUnavailable(_))
    ));

    // Releasing session 2 must not count against the new instance
    assert!(registry.release(2, &paths(&["p"])).is_empty());
    assert_eq!(registry.references("p"), 1);

    assert_eq!(registry.release(1, &paths(&["p"])), vec!["p".to_string()]);
}

#[test]
fn test_delete_requires_membership() {
    let (registry, _) = registry();
    registry.register("p", &[], 1).unwrap();

    assert!(matches!(
        registry.delete("p", 9),
        Err(LogError::LogUnavailable(_))
    ));
    assert!(registry.contains("p"));

    registry.delete("p", 1).unwrap();
    assert!(!registry.contains("p"));
}
