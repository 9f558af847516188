//! Tests for KvService against the in-memory store

use std::sync::Arc;
use std::time::Duration;

use rstest::{fixture, rstest};

use natskv::application::services::KvService;
use natskv::application::ApplicationError;
use natskv::domain::{BucketConfig, DomainError, Operation};
use natskv::infrastructure::memory::MemoryStore;
use natskv::util::testing;

#[fixture]
fn service() -> KvService {
    testing::init_test_setup();
    let svc = KvService::new(Arc::new(MemoryStore::new()));
    svc.add_bucket(&BucketConfig::new("T")).unwrap();
    svc
}

fn bucket_with_history(history: i64) -> KvService {
    testing::init_test_setup();
    let svc = KvService::new(Arc::new(MemoryStore::new()));
    let mut cfg = BucketConfig::new("T");
    cfg.history = history;
    svc.add_bucket(&cfg).unwrap();
    svc
}

// ============================================================
// get / put
// ============================================================

#[rstest]
fn given_put_value_when_getting_then_returns_value_and_revision(service: KvService) {
    // Arrange
    let revision = service.put("T", "X", b"VAL").unwrap();

    // Act
    let entry = service.get("T", "X").unwrap();

    // Assert
    assert_eq!(entry.value, b"VAL");
    assert_eq!(entry.revision, revision);
    assert_eq!(entry.operation, Operation::Put);
}

#[rstest]
fn given_empty_value_when_put_then_get_returns_empty(service: KvService) {
    service.put("T", "X", b"").unwrap();

    let entry = service.get("T", "X").unwrap();

    assert!(entry.value.is_empty());
}

#[rstest]
fn given_binary_value_when_put_then_get_returns_same_bytes(service: KvService) {
    let value = [0u8, 159, 146, 150, 255];
    service.put("T", "bin", &value).unwrap();

    assert_eq!(service.get("T", "bin").unwrap().value, value);
}

#[rstest]
fn given_successive_puts_when_writing_then_revisions_increase(service: KvService) {
    let first = service.put("T", "X", b"1").unwrap();
    let second = service.put("T", "X", b"2").unwrap();

    assert!(second > first);
    assert_eq!(service.get("T", "X").unwrap().value, b"2");
}

#[rstest]
fn given_missing_key_when_getting_then_key_not_found(service: KvService) {
    let result = service.get("T", "missing");

    assert!(matches!(result, Err(ApplicationError::KeyNotFound { .. })));
}

#[rstest]
fn given_missing_bucket_when_getting_then_bucket_not_found(service: KvService) {
    let result = service.get("NOPE", "X");

    assert!(matches!(result, Err(ApplicationError::BucketNotFound(b)) if b == "NOPE"));
}

#[rstest]
#[case("T", ".X")]
#[case("T", "X.")]
#[case("T", "a b")]
#[case("T", "")]
#[case("bad.bucket", "X")]
#[case("", "X")]
fn given_invalid_names_when_putting_then_validation_error(
    service: KvService,
    #[case] bucket: &str,
    #[case] key: &str,
) {
    let result = service.put(bucket, key, b"v");

    assert!(matches!(result, Err(ApplicationError::Domain(_))));
}

// ============================================================
// create / update
// ============================================================

#[rstest]
fn given_existing_key_when_creating_then_key_exists(service: KvService) {
    service.put("T", "X", b"1").unwrap();

    let result = service.create("T", "X", b"2");

    assert!(matches!(result, Err(ApplicationError::KeyExists { .. })));
    assert_eq!(service.get("T", "X").unwrap().value, b"1");
}

#[rstest]
fn given_new_key_when_creating_then_value_is_stored(service: KvService) {
    let revision = service.create("T", "X", b"VAL").unwrap();

    let entry = service.get("T", "X").unwrap();
    assert_eq!(entry.revision, revision);
    assert_eq!(entry.value, b"VAL");
}

#[rstest]
fn given_deleted_key_when_creating_then_succeeds(service: KvService) {
    // Arrange
    service.put("T", "X", b"old").unwrap();
    service.delete("T", "X").unwrap();

    // Act
    let result = service.create("T", "X", b"new");

    // Assert
    assert!(result.is_ok());
    assert_eq!(service.get("T", "X").unwrap().value, b"new");
}

#[rstest]
fn given_current_revision_when_updating_then_revision_advances(service: KvService) {
    let rev = service.put("T", "X", b"1").unwrap();

    let new_rev = service.update("T", "X", b"2", rev).unwrap();

    assert!(new_rev > rev);
    let entry = service.get("T", "X").unwrap();
    assert_eq!(entry.value, b"2");
    assert_eq!(entry.revision, new_rev);
}

#[rstest]
fn given_stale_revision_when_updating_then_revision_mismatch(service: KvService) {
    // Arrange
    let rev = service.put("T", "X", b"1").unwrap();
    service.update("T", "X", b"2", rev).unwrap();

    // Act
    let result = service.update("T", "X", b"3", rev);

    // Assert
    match result {
        Err(ApplicationError::RevisionMismatch {
            expected, current, ..
        }) => {
            assert_eq!(expected, rev);
            assert!(current.is_some_and(|c| c > rev));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(service.get("T", "X").unwrap().value, b"2");
}

// ============================================================
// del / purge / history
// ============================================================

#[rstest]
fn given_put_then_delete_when_getting_then_not_found() {
    let service = bucket_with_history(5);
    service.put("T", "X", b"VAL").unwrap();

    service.delete("T", "X").unwrap();

    assert!(matches!(
        service.get("T", "X"),
        Err(ApplicationError::KeyNotFound { .. })
    ));
    let history = service.history("T", "X").unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].operation, Operation::Delete);
}

#[rstest]
fn given_never_written_key_when_deleting_then_key_not_found(service: KvService) {
    let result = service.delete("T", "ghost");

    assert!(matches!(result, Err(ApplicationError::KeyNotFound { .. })));
}

#[rstest]
fn given_deleted_key_when_deleting_again_then_succeeds(service: KvService) {
    service.put("T", "X", b"v").unwrap();
    service.delete("T", "X").unwrap();

    assert!(service.delete("T", "X").is_ok());
}

#[rstest]
fn given_two_keys_when_purging_one_then_other_remains() {
    // Arrange
    let service = bucket_with_history(5);
    service.put("T", "X", b"x1").unwrap();
    service.put("T", "X", b"x2").unwrap();
    service.put("T", "Y", b"y").unwrap();

    // Act
    service.purge("T", "X").unwrap();

    // Assert
    assert!(matches!(
        service.get("T", "X"),
        Err(ApplicationError::KeyNotFound { .. })
    ));
    assert_eq!(service.get("T", "Y").unwrap().value, b"y");
    let history = service.history("T", "X").unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].operation, Operation::Purge);
}

#[rstest]
fn given_history_depth_when_writing_past_it_then_only_latest_retained() {
    let service = bucket_with_history(3);
    for i in 1..=5 {
        service.put("T", "X", format!("v{i}").as_bytes()).unwrap();
    }

    let history = service.history("T", "X").unwrap();

    let values: Vec<&[u8]> = history.iter().map(|e| e.value.as_slice()).collect();
    assert_eq!(values, vec![&b"v3"[..], &b"v4"[..], &b"v5"[..]]);
    assert!(history.windows(2).all(|w| w[0].revision < w[1].revision));
}

#[rstest]
fn given_never_written_key_when_reading_history_then_key_not_found(service: KvService) {
    assert!(matches!(
        service.history("T", "ghost"),
        Err(ApplicationError::KeyNotFound { .. })
    ));
}

#[rstest]
fn given_live_and_deleted_keys_when_listing_keys_then_only_live_sorted(service: KvService) {
    service.put("T", "b", b"1").unwrap();
    service.put("T", "a", b"1").unwrap();
    service.put("T", "gone", b"1").unwrap();
    service.delete("T", "gone").unwrap();

    assert_eq!(service.keys("T").unwrap(), vec!["a", "b"]);
}

// ============================================================
// bucket lifecycle
// ============================================================

#[rstest]
fn given_history_and_ttl_when_adding_bucket_then_status_reports_them() {
    // Arrange
    testing::init_test_setup();
    let service = KvService::new(Arc::new(MemoryStore::new()));
    let mut cfg = BucketConfig::new("CFG");
    cfg.history = 5;
    cfg.max_age = Duration::from_secs(120);

    // Act
    service.add_bucket(&cfg).unwrap();

    // Assert
    let status = service.status("CFG").unwrap();
    assert_eq!(status.history, 5);
    assert_eq!(status.max_age, Duration::from_secs(120));
}

#[rstest]
#[case(0)]
#[case(65)]
fn given_out_of_range_history_when_adding_bucket_then_validation_error(#[case] history: i64) {
    let service = KvService::new(Arc::new(MemoryStore::new()));
    let mut cfg = BucketConfig::new("H");
    cfg.history = history;

    let result = service.add_bucket(&cfg);

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::InvalidHistory { .. }))
    ));
    assert!(service.list_buckets().unwrap().is_empty());
}

#[rstest]
fn given_existing_bucket_with_other_config_when_adding_then_bucket_exists(service: KvService) {
    let mut cfg = BucketConfig::new("T");
    cfg.history = 10;

    assert!(matches!(
        service.add_bucket(&cfg),
        Err(ApplicationError::BucketExists(_))
    ));
}

#[rstest]
fn given_bucket_when_removing_then_status_and_list_forget_it(service: KvService) {
    service.put("T", "X", b"v").unwrap();

    service.remove_bucket("T").unwrap();

    assert!(matches!(
        service.status("T"),
        Err(ApplicationError::BucketNotFound(_))
    ));
    assert!(!service.list_buckets().unwrap().contains(&"T".to_string()));
}

#[rstest]
fn given_missing_bucket_when_removing_then_bucket_not_found(service: KvService) {
    assert!(matches!(
        service.remove_bucket("NOPE"),
        Err(ApplicationError::BucketNotFound(_))
    ));
}

#[rstest]
fn given_several_buckets_when_listing_then_sorted(service: KvService) {
    service.add_bucket(&BucketConfig::new("B")).unwrap();
    service.add_bucket(&BucketConfig::new("A")).unwrap();

    assert_eq!(service.list_buckets().unwrap(), vec!["A", "B", "T"]);
}
