//! Decision engine integration tests
//!
//! Exercise the full decision pipeline: cache lookup → role mask → topic
//! reconciliation → role check, with the eviction and deferral rules.

use std::sync::Arc;
use std::time::Duration;

use topicgate_authz::{
    Access, AuthzEngine, CredentialRecord, Decision, EngineConfig, RoleAccessTable, StaticGateway,
    VerifiedClaims,
};

fn role_table(entries: &[(&str, i64)]) -> RoleAccessTable {
    let pairs = entries
        .iter()
        .map(|(role, mask)| (role.to_string(), *mask))
        .collect();
    RoleAccessTable::build(pairs, None).unwrap()
}

fn engine_with(entries: &[(&str, i64)]) -> (AuthzEngine, Arc<StaticGateway>) {
    let gateway = Arc::new(StaticGateway::new());
    let engine = AuthzEngine::new(EngineConfig::default(), role_table(entries), gateway.clone());
    (engine, gateway)
}

fn seed(engine: &AuthzEngine, username: &str, topic: &str, role: &str) {
    engine.cache().upsert(CredentialRecord {
        username: username.to_string(),
        allowed_topic: topic.to_string(),
        role: role.to_string(),
        expires_at: None,
    });
}

// ============================================================================
// DEFERRAL RULES
// ============================================================================

#[tokio::test]
async fn test_unknown_user_always_defers() {
    let (engine, _) = engine_with(&[("admin", 4)]);

    for access in [
        Access::Read,
        Access::Write,
        Access::ReadWrite,
        Access::Superuser,
        Access::Other(9),
    ] {
        assert_eq!(
            engine.authorize("stranger", Some("any/topic"), access).await,
            Decision::Defer
        );
        assert_eq!(
            engine.authorize("stranger", None, access).await,
            Decision::Defer
        );
    }
}

#[tokio::test]
async fn test_missing_topic_with_concrete_pattern_defers_without_eviction() {
    let (engine, _) = engine_with(&[("viewer", 1)]);
    seed(&engine, "bob", "home/kitchen", "viewer");

    assert_eq!(
        engine.check_without_topic("bob", Access::Read).await,
        Decision::Defer
    );

    // A deferral is pending, not a failure; the record must survive it.
    assert!(engine.cache().lookup("bob").is_some());
}

#[tokio::test]
async fn test_expired_record_defers() {
    let (engine, _) = engine_with(&[("viewer", 1)]);

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    engine.cache().upsert(CredentialRecord {
        username: "bob".to_string(),
        allowed_topic: "#".to_string(),
        role: "viewer".to_string(),
        expires_at: Some(now - 60),
    });

    assert_eq!(
        engine.authorize("bob", Some("home/kitchen"), Access::Read).await,
        Decision::Defer
    );
}

// ============================================================================
// TOPIC RECONCILIATION
// ============================================================================

#[tokio::test]
async fn test_any_topic_pattern_is_role_based_only() {
    let (engine, _) = engine_with(&[("viewer", 1)]);
    seed(&engine, "alice", "#", "viewer");

    assert_eq!(
        engine.authorize("alice", Some("any/topic/at/all"), Access::Read).await,
        Decision::Allow
    );
    // No topic needed either; the pattern makes the topic irrelevant.
    assert_eq!(
        engine.check_without_topic("alice", Access::Read).await,
        Decision::Allow
    );
}

#[tokio::test]
async fn test_prefix_topic_semantics() {
    let (engine, _) = engine_with(&[("viewer", 1)]);

    seed(&engine, "alice", "sensors/", "viewer");
    let exact = engine.authorize("alice", Some("sensors/"), Access::Read).await;

    seed(&engine, "alice", "sensors/", "viewer");
    let extended = engine
        .authorize("alice", Some("sensors/room1"), Access::Read)
        .await;

    assert_eq!(exact, extended);
    assert_eq!(extended, Decision::Allow);
}

#[tokio::test]
async fn test_foreign_topic_denied_and_evicted() {
    let (engine, _) = engine_with(&[("viewer", 1)]);
    seed(&engine, "alice", "sensors/", "viewer");

    assert_eq!(
        engine.authorize("alice", Some("other/area"), Access::Read).await,
        Decision::Deny
    );
    assert!(
        engine.cache().lookup("alice").is_none(),
        "denial must invalidate the cached record"
    );
}

// ============================================================================
// ROLE MASK RULES
// ============================================================================

#[tokio::test]
async fn test_superuser_op_overrides_topic_and_mask() {
    let (engine, _) = engine_with(&[("admin", 4), ("viewer", 1)]);
    seed(&engine, "alice", "#", "admin");

    // The unconditional rule is keyed by the requested op code 4, never by
    // the role name.
    assert_eq!(
        engine.authorize("alice", Some("any/topic"), Access::Superuser).await,
        Decision::Allow
    );

    // Mask 4 carries no write bit, so a plain write is denied even for the
    // admin role.
    seed(&engine, "alice", "#", "admin");
    assert_eq!(
        engine.authorize("alice", Some("any/topic"), Access::Write).await,
        Decision::Deny
    );

    // Same op against a low-privilege role: still allowed, op code wins.
    seed(&engine, "vera", "#", "viewer");
    assert_eq!(
        engine.authorize("vera", Some("any/topic"), Access::Superuser).await,
        Decision::Allow
    );
}

#[tokio::test]
async fn test_viewer_scenario() {
    let (engine, _) = engine_with(&[("viewer", 1)]);
    seed(&engine, "bob", "home/kitchen", "viewer");

    assert_eq!(
        engine.authorize("bob", Some("home/kitchen/temp"), Access::Read).await,
        Decision::Allow
    );

    assert_eq!(
        engine.authorize("bob", Some("home/livingroom"), Access::Read).await,
        Decision::Deny
    );
    assert!(engine.cache().lookup("bob").is_none());
}

#[tokio::test]
async fn test_unknown_role_denied_and_evicted() {
    let (engine, _) = engine_with(&[("admin", 4)]);
    seed(&engine, "casper", "#", "ghost");

    assert_eq!(
        engine.authorize("casper", Some("any/topic"), Access::Read).await,
        Decision::Deny
    );
    assert!(engine.cache().lookup("casper").is_none());
}

#[tokio::test]
async fn test_nonpositive_mask_denied_and_evicted() {
    let (engine, _) = engine_with(&[("disabled", 0), ("banned", -5)]);

    seed(&engine, "dave", "#", "disabled");
    assert_eq!(
        engine.authorize("dave", Some("any"), Access::Superuser).await,
        Decision::Deny,
        "a non-positive mask denies before the op code is consulted"
    );
    assert!(engine.cache().lookup("dave").is_none());

    seed(&engine, "eve", "#", "banned");
    assert_eq!(
        engine.authorize("eve", Some("any"), Access::Read).await,
        Decision::Deny
    );
}

#[tokio::test]
async fn test_unknown_access_code_denied_and_evicted() {
    let (engine, _) = engine_with(&[("viewer", 1)]);
    seed(&engine, "alice", "#", "viewer");

    assert_eq!(
        engine.authorize("alice", Some("sensors/room1"), Access::from(9)).await,
        Decision::Deny
    );
    assert!(engine.cache().lookup("alice").is_none());
}

// ============================================================================
// AUTHENTICATION AND VERIFICATION FLOW
// ============================================================================

#[tokio::test]
async fn test_authenticate_defers_then_populates_cache() {
    let (engine, gateway) = engine_with(&[("viewer", 1)]);
    gateway.grant(
        "carol",
        VerifiedClaims {
            allowed_topic: "sensors/".to_string(),
            role: "viewer".to_string(),
            expires_at: None,
        },
    );

    assert_eq!(
        engine.authenticate("carol", "secret").await,
        Decision::Defer
    );

    // Verification runs out of band; the next check observes its result.
    let mut populated = false;
    for _ in 0..100 {
        if engine.cache().lookup("carol").is_some() {
            populated = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(populated, "verification should populate the cache");

    assert_eq!(
        engine.authorize("carol", Some("sensors/room1"), Access::Read).await,
        Decision::Allow
    );
}

#[tokio::test]
async fn test_failed_verification_keeps_deferring() {
    let (engine, _gateway) = engine_with(&[("viewer", 1)]);

    // No grant registered: verification fails, the cache stays empty.
    assert_eq!(
        engine.authenticate("mallory", "guess").await,
        Decision::Defer
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(engine.cache().is_empty());
    assert_eq!(
        engine.authorize("mallory", Some("sensors/room1"), Access::Read).await,
        Decision::Defer
    );
}

#[tokio::test]
async fn test_superuser_check_is_unsupported() {
    let (engine, _) = engine_with(&[("admin", 4)]);
    seed(&engine, "alice", "#", "admin");

    assert_eq!(engine.check_superuser("alice").await, Decision::Deny);

    // Unlike an ACL denial, the unsupported check does not touch the cache.
    assert!(engine.cache().lookup("alice").is_some());
}

// ============================================================================
// METRICS AND TEARDOWN
// ============================================================================

#[tokio::test]
async fn test_metrics_count_outcomes() {
    let (engine, _) = engine_with(&[("viewer", 1)]);
    seed(&engine, "alice", "sensors/", "viewer");

    engine.authorize("alice", Some("sensors/a"), Access::Read).await; // allow
    engine.authorize("alice", Some("other/a"), Access::Read).await; // deny + evict
    engine.authorize("alice", Some("sensors/a"), Access::Read).await; // defer

    let metrics = engine.metrics().await.unwrap();
    assert_eq!(metrics.total_requests, 3);
    assert_eq!(metrics.allowed_decisions, 1);
    assert_eq!(metrics.denied_decisions, 1);
    assert_eq!(metrics.deferred_decisions, 1);
}

#[tokio::test]
async fn test_metrics_can_be_disabled() {
    let gateway = Arc::new(StaticGateway::new());
    let config = EngineConfig {
        enable_metrics: false,
        ..Default::default()
    };
    let engine = AuthzEngine::new(config, role_table(&[("viewer", 1)]), gateway);

    engine.authorize("nobody", None, Access::Read).await;
    assert!(engine.metrics().await.is_none());
    assert!(engine.export_prometheus().await.is_none());
}

#[tokio::test]
async fn test_shutdown_clears_cache() {
    let (engine, _) = engine_with(&[("viewer", 1)]);
    seed(&engine, "alice", "#", "viewer");
    seed(&engine, "bob", "#", "viewer");

    engine.shutdown();
    assert!(engine.cache().is_empty());
}
