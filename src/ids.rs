//! Count-based chunking of id lists for delete requests.

use crate::api::Transport;
use crate::config::Thresholds;
use crate::error::Result;
use crate::limits::LimitsCache;
use crate::wire::DeleteFailure;
use log::debug;

/// Split `ids` into ordered chunks of at most `max_per_request` ids.
pub fn partition_ids(ids: &[String], max_per_request: usize) -> Vec<Vec<String>> {
    ids.chunks(max_per_request.max(1))
        .map(<[String]>::to_vec)
        .collect()
}

/// Ids per request. Small lists use the configured default; larger ones ask
/// the server and keep one form field free for the API key.
pub fn chunk_size<T: Transport + ?Sized>(
    count: usize,
    thresholds: &Thresholds,
    limits: &LimitsCache,
    transport: &T,
) -> Result<usize> {
    if count <= thresholds.ids_before_limits {
        return Ok(thresholds.ids_before_limits.max(1));
    }
    let limits = limits.fetch(transport)?;
    Ok(limits.max_input_fields.saturating_sub(1).max(1))
}

/// Delete `ids` chunk by chunk. Returns the per-id failures the server
/// reported; request-level failures abort the remaining chunks.
pub fn delete_ids<T: Transport + ?Sized>(
    transport: &T,
    limits: &LimitsCache,
    thresholds: &Thresholds,
    ids: &[String],
) -> Result<Vec<DeleteFailure>> {
    let size = chunk_size(ids.len(), thresholds, limits, transport)?;
    let mut failures = Vec::new();

    for (n, chunk) in partition_ids(ids, size).iter().enumerate() {
        debug!("deleting chunk {} ({} ids)", n + 1, chunk.len());
        let outcome = transport.delete_ids(chunk)?;
        debug!(
            "chunk {}: {} deleted, {} failed",
            n + 1,
            outcome.deleted.len(),
            outcome.errors.len()
        );
        failures.extend(outcome.errors.into_values());
    }
    Ok(failures)
}
