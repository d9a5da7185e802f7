//! Batch committer.

use crate::transformations::DerivedRow;

use super::error::SyncError;
use super::store::DerivedStore;

/// Split block-ordered rows into batches of at most `batch_size` rows.
///
/// A block's rows never straddle two batches. A single block larger than
/// `batch_size` becomes its own batch.
pub fn split_batches(rows: Vec<DerivedRow>, batch_size: usize) -> Vec<Vec<DerivedRow>> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::new();
    let mut current: Vec<DerivedRow> = Vec::new();
    let mut rows = rows.into_iter().peekable();

    while let Some(first) = rows.next() {
        let block_id = first.block_id();
        let mut block_rows = vec![first];
        while let Some(row) = rows.next_if(|r| r.block_id() == block_id) {
            block_rows.push(row);
        }

        if !current.is_empty() && current.len() + block_rows.len() > batch_size {
            batches.push(std::mem::take(&mut current));
        }
        current.extend(block_rows);
    }

    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Commit rows batch by batch, in block order. Returns rows inserted;
/// replayed rows are skipped by the store and not counted.
pub async fn commit_rows(
    store: &dyn DerivedStore,
    rows: Vec<DerivedRow>,
    batch_size: usize,
) -> Result<u64, SyncError> {
    let mut inserted = 0;
    for batch in split_batches(rows, batch_size) {
        let first = batch.first().map(DerivedRow::block_id).unwrap_or_default();
        let last = batch.last().map(DerivedRow::block_id).unwrap_or_default();

        let n = store.insert_batch(&batch).await?;
        tracing::debug!(
            "Committed batch of {} rows for blocks {}-{} ({} new)",
            batch.len(),
            first,
            last,
            n
        );
        inserted += n;
    }
    Ok(inserted)
}
