//! Integration tests for the helper stack over the in-memory connection.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use redis_helper::{
    DataType, HelperError, KeyValueHelper, MemoryConnection, Reply, ValidatingKeyValueHelper,
    PERPETUAL,
};

// ============================================================================
// Test Types
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct User {
    id: u64,
    name: String,
    email: String,
}

fn alice() -> User {
    User {
        id: 1,
        name: "Alice".into(),
        email: "alice@example.com".into(),
    }
}

fn bob() -> User {
    User {
        id: 2,
        name: "Bob".into(),
        email: "bob@example.com".into(),
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn user_helper() -> (Arc<MemoryConnection>, KeyValueHelper<User, MemoryConnection>) {
    let conn = Arc::new(MemoryConnection::new());
    let helper = KeyValueHelper::new(Arc::clone(&conn));
    (conn, helper)
}

// ============================================================================
// Value Round Trips
// ============================================================================

#[tokio::test]
async fn test_set_then_get_returns_equal_value() {
    let (_conn, helper) = user_helper();

    helper.set("user:1", &alice()).await.unwrap();
    assert_eq!(helper.get("user:1").await.unwrap(), Some(alice()));
}

#[tokio::test]
async fn test_get_missing_key_is_none() {
    let (_conn, helper) = user_helper();

    assert_eq!(helper.get("user:404").await.unwrap(), None);
}

#[tokio::test]
async fn test_set_overwrites_existing_value() {
    let (_conn, helper) = user_helper();

    helper.set("user:1", &alice()).await.unwrap();
    helper.set("user:1", &bob()).await.unwrap();
    assert_eq!(helper.get("user:1").await.unwrap(), Some(bob()));
}

// ============================================================================
// Expiration
// ============================================================================

#[tokio::test]
async fn test_future_deadline_writes_with_ttl() {
    let (_conn, helper) = user_helper();
    let deadline = SystemTime::now() + Duration::from_secs(120);

    let written = helper
        .set_with_expiration_at("user:1", &alice(), deadline)
        .await
        .unwrap();
    assert!(written);

    assert_eq!(helper.get("user:1").await.unwrap(), Some(alice()));
    match helper.get_expire("user:1").await.unwrap() {
        Reply::Present(secs) => assert!((1..=120).contains(&secs)),
        other => panic!("expected a ttl, got {:?}", other),
    }
}

#[tokio::test]
async fn test_past_deadline_is_rejected_without_write() {
    let (conn, helper) = user_helper();
    let deadline = SystemTime::now() - Duration::from_secs(1);

    let written = helper
        .set_with_expiration_at("user:1", &alice(), deadline)
        .await
        .unwrap();

    assert!(!written);
    assert_eq!(helper.get("user:1").await.unwrap(), None);
    assert_eq!(conn.commands_issued(), 1); // only the GET above
}

#[tokio::test]
async fn test_non_positive_relative_ttl_is_rejected() {
    let (_conn, helper) = user_helper();

    assert!(!helper
        .set_with_expiration("user:1", &alice(), Duration::ZERO)
        .await
        .unwrap());
    assert!(!helper
        .set_with_expiration_minutes("user:1", &alice(), 0)
        .await
        .unwrap());
    assert!(!helper
        .set_with_expiration_minutes("user:1", &alice(), -10)
        .await
        .unwrap());
    assert_eq!(helper.get("user:1").await.unwrap(), None);
}

#[tokio::test]
async fn test_perpetual_key_reports_sentinel_ttl() {
    let (_conn, helper) = user_helper();

    helper.set("user:1", &alice()).await.unwrap();
    assert_eq!(
        helper.get_expire("user:1").await.unwrap(),
        Reply::Present(PERPETUAL)
    );
}

#[tokio::test]
async fn test_ttl_of_missing_key_is_absent() {
    let (_conn, helper) = user_helper();

    assert_eq!(helper.get_expire("user:404").await.unwrap(), Reply::Absent);
}

#[tokio::test]
async fn test_expire_on_existing_and_missing_keys() {
    let (_conn, helper) = user_helper();

    helper.set("user:1", &alice()).await.unwrap();
    assert_eq!(
        helper
            .expire("user:1", Duration::from_secs(300))
            .await
            .unwrap(),
        Reply::Present(true)
    );
    assert_eq!(
        helper
            .expire("user:404", Duration::from_secs(300))
            .await
            .unwrap(),
        Reply::Present(false)
    );
}

#[tokio::test]
async fn test_expire_at_on_existing_and_missing_keys() {
    let (_conn, helper) = user_helper();
    let deadline = SystemTime::now() + Duration::from_secs(90);

    helper.set("user:1", &alice()).await.unwrap();
    assert_eq!(
        helper.expire_at("user:1", deadline).await.unwrap(),
        Reply::Present(true)
    );
    match helper.get_expire("user:1").await.unwrap() {
        Reply::Present(secs) => assert!((1..=90).contains(&secs)),
        other => panic!("expected a ttl, got {:?}", other),
    }

    assert_eq!(
        helper.expire_at("user:404", deadline).await.unwrap(),
        Reply::Present(false)
    );
}

#[tokio::test]
async fn test_expire_at_past_deadline_removes_the_key() {
    let (_conn, helper) = user_helper();
    let past = SystemTime::now() - Duration::from_secs(5);

    helper.set("user:1", &alice()).await.unwrap();
    assert_eq!(
        helper.expire_at("user:1", past).await.unwrap(),
        Reply::Present(true)
    );
    assert!(!helper.has_key("user:1").await.unwrap());
}

// ============================================================================
// Hash Fields
// ============================================================================

#[tokio::test]
async fn test_typed_field_read_matches_written_type() {
    let (_conn, helper) = user_helper();

    helper.put("profile:1", "age", &30u32).await.unwrap();
    let age: Option<u32> = helper.get_field_as("profile:1", "age").await.unwrap();
    assert_eq!(age, Some(30));
}

#[tokio::test]
async fn test_untyped_field_read() {
    let (_conn, helper) = user_helper();

    helper.put("profile:1", "age", &30u32).await.unwrap();

    let raw = helper.get_field("profile:1", "age").await.unwrap();
    assert_eq!(raw, Some(serde_json::json!(30)));
    assert_eq!(helper.get_field("profile:1", "missing").await.unwrap(), None);
}

#[tokio::test]
async fn test_typed_field_read_fails_fast_on_mismatch() {
    let (_conn, helper) = user_helper();

    helper
        .put("profile:1", "name", &"Alice".to_string())
        .await
        .unwrap();

    let err = helper
        .get_field_as::<u64>("profile:1", "name")
        .await
        .unwrap_err();
    assert!(matches!(err, HelperError::TypeMismatch { .. }));
}

#[tokio::test]
async fn test_absent_field_reads_as_none_not_mismatch() {
    let (_conn, helper) = user_helper();

    helper.put("profile:1", "name", &"Alice".to_string()).await.unwrap();
    let missing: Option<u64> = helper.get_field_as("profile:1", "missing").await.unwrap();
    assert_eq!(missing, None);
}

#[tokio::test]
async fn test_put_all_and_entries() {
    let (_conn, helper) = user_helper();

    let mut map = HashMap::new();
    map.insert("name".to_string(), "Alice".to_string());
    map.insert("city".to_string(), "Palermo".to_string());
    helper.put_all("profile:1", &map).await.unwrap();

    let entries = helper.entries("profile:1").await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries["name"], serde_json::json!("Alice"));

    let fields = helper.fields("profile:1").await.unwrap();
    match fields {
        Reply::Present(names) => {
            assert!(names.contains("name"));
            assert!(names.contains("city"));
        }
        other => panic!("expected field names, got {:?}", other),
    }
}

#[tokio::test]
async fn test_put_if_absent_only_writes_once() {
    let (_conn, helper) = user_helper();

    assert!(helper
        .put_if_absent("profile:1", "name", &"Alice".to_string())
        .await
        .unwrap());
    assert!(!helper
        .put_if_absent("profile:1", "name", &"Mallory".to_string())
        .await
        .unwrap());

    let name: Option<String> = helper.get_field_as("profile:1", "name").await.unwrap();
    assert_eq!(name.as_deref(), Some("Alice"));
}

// ============================================================================
// Deletion
// ============================================================================

#[tokio::test]
async fn test_delete_normalizes_to_bool() {
    let (_conn, helper) = user_helper();

    helper.set("user:1", &alice()).await.unwrap();
    assert!(helper.delete("user:1").await.unwrap());
    assert!(!helper.delete("user:1").await.unwrap());
}

#[tokio::test]
async fn test_delete_all_empty_input_skips_the_store() {
    let (conn, helper) = user_helper();

    let before = conn.commands_issued();
    assert_eq!(helper.delete_all(&[]).await.unwrap(), Reply::Present(0));
    assert_eq!(conn.commands_issued(), before);
}

#[tokio::test]
async fn test_delete_all_counts_only_existing_keys() {
    let (_conn, helper) = user_helper();

    helper.set("user:1", &alice()).await.unwrap();
    helper.set("user:2", &bob()).await.unwrap();

    assert_eq!(
        helper
            .delete_all(&["user:1", "user:2", "user:404"])
            .await
            .unwrap(),
        Reply::Present(2)
    );
}

#[tokio::test]
async fn test_delete_fields_empty_input_skips_the_store() {
    let (conn, helper) = user_helper();

    let before = conn.commands_issued();
    assert_eq!(
        helper.delete_fields("profile:1", &[]).await.unwrap(),
        Reply::Present(0)
    );
    assert_eq!(conn.commands_issued(), before);
}

#[tokio::test]
async fn test_delete_fields_counts_only_existing_fields() {
    let (_conn, helper) = user_helper();

    let mut map = HashMap::new();
    map.insert("name".to_string(), "Alice".to_string());
    map.insert("city".to_string(), "Palermo".to_string());
    helper.put_all("profile:1", &map).await.unwrap();

    assert_eq!(
        helper
            .delete_fields("profile:1", &["name", "city", "missing"])
            .await
            .unwrap(),
        Reply::Present(2)
    );
    assert!(!helper.has_field("profile:1", "name").await.unwrap());
}

#[tokio::test]
async fn test_delete_field_reports_prior_existence() {
    let (_conn, helper) = user_helper();

    helper
        .put("profile:1", "name", &"Alice".to_string())
        .await
        .unwrap();
    assert_eq!(
        helper.delete_field("profile:1", "name").await.unwrap(),
        Reply::Present(true)
    );
    assert_eq!(
        helper.delete_field("profile:1", "name").await.unwrap(),
        Reply::Present(false)
    );
}

// ============================================================================
// Increments
// ============================================================================

#[tokio::test]
async fn test_increment_counts_from_zero() {
    let (_conn, helper) = user_helper();

    assert_eq!(
        helper.increment("counter", 5).await.unwrap(),
        Reply::Present(5)
    );
    assert_eq!(
        helper.increment("counter", -3).await.unwrap(),
        Reply::Present(2)
    );
}

#[tokio::test]
async fn test_increment_field_counts_from_zero() {
    let (_conn, helper) = user_helper();

    assert_eq!(
        helper.increment_field("stats", "hits", 7).await.unwrap(),
        Reply::Present(7)
    );
    assert_eq!(
        helper.increment_field("stats", "hits", 3).await.unwrap(),
        Reply::Present(10)
    );
}

#[tokio::test]
async fn test_float_increments() {
    let (_conn, helper) = user_helper();

    let v = helper
        .increment_float("gauge", 1.5)
        .await
        .unwrap()
        .present_or(0.0);
    assert!((v - 1.5).abs() < 1e-9);

    let v = helper
        .increment_field_float("stats", "load", 0.25)
        .await
        .unwrap()
        .present_or(0.0);
    assert!((v - 0.25).abs() < 1e-9);
}

// ============================================================================
// Existence and Types
// ============================================================================

#[tokio::test]
async fn test_has_key_flips_with_lifecycle() {
    let (_conn, helper) = user_helper();

    assert!(!helper.has_key("user:1").await.unwrap());
    helper.set("user:1", &alice()).await.unwrap();
    assert!(helper.has_key("user:1").await.unwrap());
    helper.delete("user:1").await.unwrap();
    assert!(!helper.has_key("user:1").await.unwrap());
}

#[tokio::test]
async fn test_has_field() {
    let (_conn, helper) = user_helper();

    helper
        .put("profile:1", "name", &"Alice".to_string())
        .await
        .unwrap();
    assert!(helper.has_field("profile:1", "name").await.unwrap());
    assert!(!helper.has_field("profile:1", "email").await.unwrap());
}

#[tokio::test]
async fn test_data_type_reflects_structure() {
    let (_conn, helper) = user_helper();

    helper.set("v", &alice()).await.unwrap();
    helper.put("h", "f", &1u8).await.unwrap();

    assert_eq!(helper.data_type("v").await.unwrap(), DataType::String);
    assert_eq!(helper.data_type("h").await.unwrap(), DataType::Hash);
    assert_eq!(helper.data_type("missing").await.unwrap(), DataType::None);
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_validating_helper_blocks_writes_before_the_store() {
    let conn = Arc::new(MemoryConnection::new());
    let helper: ValidatingKeyValueHelper<User, _> =
        ValidatingKeyValueHelper::new(Arc::clone(&conn));

    let err = helper.set("", &alice()).await.unwrap_err();
    assert!(matches!(err, HelperError::InvalidKey { .. }));
    assert_eq!(conn.commands_issued(), 0);
}

#[tokio::test]
async fn test_validating_helper_with_permissive_predicate() {
    let conn = Arc::new(MemoryConnection::new());
    // A validator that accepts anything, including the empty key.
    let helper: ValidatingKeyValueHelper<User, _> =
        ValidatingKeyValueHelper::with_validator(Arc::clone(&conn), Arc::new(|_key| true));

    helper.set("", &alice()).await.unwrap();
    assert_eq!(helper.get("").await.unwrap(), Some(alice()));
}

#[tokio::test]
async fn test_validating_helper_passes_valid_writes_through() {
    let conn = Arc::new(MemoryConnection::new());
    let helper: ValidatingKeyValueHelper<User, _> =
        ValidatingKeyValueHelper::new(Arc::clone(&conn));

    helper
        .set("user:1", &alice())
        .await
        .unwrap()
        .set("user:2", &bob())
        .await
        .unwrap();

    assert_eq!(helper.get("user:1").await.unwrap(), Some(alice()));
    assert_eq!(helper.get("user:2").await.unwrap(), Some(bob()));
}
