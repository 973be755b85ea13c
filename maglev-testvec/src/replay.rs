//! Replay recorded flows against a freshly built group.

use maglev_core::{Bucket, DestinationId, Group, GroupId, GroupProps, TableSizes};
use maglev_hash::FlowKey;
use tracing::{info, warn};

use crate::error::Result;
use crate::vector::TestVector;

/// Outcome of a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Report {
    /// Flows replayed.
    pub total: usize,
    /// Flows resolved to a different bucket than recorded.
    pub mismatched_buckets: usize,
    /// Flows whose computed hash differs from the recorded one.
    pub mismatched_hashes: usize,
}

impl Report {
    /// Whether every flow matched its recording.
    pub fn is_clean(&self) -> bool {
        self.mismatched_buckets == 0 && self.mismatched_hashes == 0
    }
}

/// Build the group described by `tv` and resolve every recorded flow.
pub fn replay(tv: &TestVector, sizes: &TableSizes) -> Result<Report> {
    info!(
        group = tv.maglev_id,
        size_index = tv.table_size_index,
        buckets = tv.num_buckets,
        weight = tv.bucket_weight,
        flows = tv.entries.len(),
        "Verifying Maglev test vector"
    );

    let buckets = (1..=tv.num_buckets).map(|id| Bucket::new(id, tv.bucket_weight));
    let mut group = Group::new(
        GroupId(tv.maglev_id),
        GroupProps::with_size_index(tv.table_size_index),
        sizes,
        buckets,
    )?;
    group.rebuild()?;

    let mut report = Report::default();
    for (idx, entry) in tv.entries.iter().enumerate() {
        report.total += 1;

        let hash =
            FlowKey::from_ipv4(entry.src, entry.sport, entry.dst, entry.dport, entry.protocol)
                .hash();
        if hash != entry.hash {
            report.mismatched_hashes += 1;
            warn!(idx, computed = hash, recorded = entry.hash, "Flow hash mismatch");
        }

        let bucket = group.lookup_hash(hash).map(|d| d.id);
        if bucket != Some(DestinationId(entry.bucket_id)) {
            report.mismatched_buckets += 1;
            warn!(
                idx,
                selected = ?bucket,
                recorded = entry.bucket_id,
                hash,
                "Bucket mismatch"
            );
        }
    }

    info!(
        total = report.total,
        mismatched_buckets = report.mismatched_buckets,
        mismatched_hashes = report.mismatched_hashes,
        "Verification finished"
    );
    Ok(report)
}
