//! Integration tests replaying recorded test vectors.

use std::path::PathBuf;

use maglev_core::{MaglevError, TableSizes};
use maglev_testvec::{replay, Report, TestVecError, TestVector};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

#[test]
fn recorded_flows_land_on_recorded_buckets() {
    init_tracing();
    let tv = TestVector::from_path(fixture("four_buckets.tv")).unwrap();
    assert_eq!(tv.entries.len(), 4);

    let report = replay(&tv, &TableSizes::default()).unwrap();
    assert_eq!(
        report,
        Report {
            total: 4,
            mismatched_buckets: 0,
            mismatched_hashes: 0,
        }
    );
    assert!(report.is_clean());
}

#[test]
fn small_weighted_group() {
    init_tracing();
    // 11 slots shared by three buckets of weight 2.
    let text = "\
maglev_hash_table_size_index 0
maglev_id 7
num_buckets 3
bucket_weight 2
172.20.88.194 52794 172.20.234.26 80 6 5271e49c 3
10.0.0.1 40000 10.0.0.2 443 6 35b5c2 3
192.168.1.10 5353 192.168.1.20 53 17 40283c72 2
10.1.2.3 1234 10.3.2.1 8080 6 a6c47a38 1
";
    let tv: TestVector = text.parse().unwrap();
    let report = replay(&tv, &TableSizes::default()).unwrap();
    assert!(report.is_clean(), "{report:?}");
}

#[test]
fn wrong_recordings_are_counted() {
    init_tracing();
    let text = "\
maglev_hash_table_size_index 5
num_buckets 4
bucket_weight 1
172.20.88.194 52794 172.20.234.26 80 6 5271e49c 2
10.0.0.1 40000 10.0.0.2 443 6 deadbeef 1
";
    let tv: TestVector = text.parse().unwrap();
    let report = replay(&tv, &TableSizes::default()).unwrap();
    assert_eq!(report.total, 2);
    assert_eq!(report.mismatched_buckets, 1);
    assert_eq!(report.mismatched_hashes, 1);
    assert!(!report.is_clean());
}

#[test]
fn unusable_header_is_a_maglev_error() {
    init_tracing();
    let bad_size = TestVector {
        table_size_index: 42,
        num_buckets: 2,
        ..TestVector::default()
    };
    let err = replay(&bad_size, &TableSizes::default()).unwrap_err();
    assert!(matches!(
        err,
        TestVecError::Maglev(MaglevError::InvalidTableSize { index: 42, .. })
    ));

    let no_buckets = TestVector::default();
    let err = replay(&no_buckets, &TableSizes::default()).unwrap_err();
    assert!(matches!(err, TestVecError::Maglev(MaglevError::EmptyDestinationSet)));
}
