//! Upload orchestration: limits, batching, one request per batch, progress.

use crate::api::Transport;
use crate::batch::{self, UploadItem};
use crate::config::Thresholds;
use crate::error::{FbError, Result};
use crate::limits::{LimitsCache, ServerLimits};
use crate::progress::{format_bytes, ProgressAggregator};
use log::debug;
use std::path::Path;

/// Drives the upload of a list of items through a [`Transport`].
///
/// Batches are sent strictly one after another. The first failing batch
/// aborts the upload; items of batches that already succeeded keep their
/// ids and urls.
pub struct Uploader<'a, T: Transport + ?Sized> {
    transport: &'a T,
    limits: &'a LimitsCache,
    thresholds: Thresholds,
    progress: ProgressAggregator,
}

impl<'a, T: Transport + ?Sized> Uploader<'a, T> {
    pub fn new(
        transport: &'a T,
        limits: &'a LimitsCache,
        thresholds: Thresholds,
        progress: ProgressAggregator,
    ) -> Self {
        Self {
            transport,
            limits,
            thresholds,
            progress,
        }
    }

    pub fn progress(&self) -> &ProgressAggregator {
        &self.progress
    }

    /// Upload every item without an id and assign the returned ids/urls.
    pub fn upload(&mut self, items: &mut [UploadItem]) -> Result<()> {
        let result = self.upload_batches(items);
        self.progress.reset();
        result
    }

    fn needs_limits(&self, items: &[UploadItem]) -> bool {
        items.len() > self.thresholds.files_before_limits
            || items
                .iter()
                .any(|item| item.needs_upload() && item.size() > self.thresholds.warn_size)
    }

    fn upload_batches(&mut self, items: &mut [UploadItem]) -> Result<()> {
        let limits: Option<ServerLimits> = if self.needs_limits(items) {
            Some(*self.limits.fetch(self.transport)?)
        } else {
            self.limits.get().copied()
        };

        let total: u64 = items
            .iter()
            .filter(|item| item.needs_upload())
            .map(UploadItem::size)
            .sum();
        self.progress.set_total(total);

        let batches = batch::partition(items, limits.as_ref())?;
        debug!(
            "uploading {} in {} request(s)",
            format_bytes(total as f64),
            batches.len()
        );

        for (n, batch) in batches.iter().enumerate() {
            debug!(
                "batch {}/{}: {} file(s), {}",
                n + 1,
                batches.len(),
                batch.len(),
                format_bytes(batch.bytes as f64)
            );

            let paths: Vec<&Path> = batch
                .indices
                .iter()
                .filter_map(|&i| items[i].path())
                .collect();
            let progress = &mut self.progress;
            let uploaded = self
                .transport
                .upload_files(&paths, &mut |raw| {
                    progress.on_raw_sample(raw);
                })?;

            if uploaded.ids.len() != batch.len() || uploaded.urls.len() != batch.len() {
                return Err(FbError::protocol(format!(
                    "server returned {} ids and {} urls for {} files",
                    uploaded.ids.len(),
                    uploaded.urls.len(),
                    batch.len()
                )));
            }

            for ((&i, id), url) in batch.indices.iter().zip(uploaded.ids).zip(uploaded.urls) {
                items[i].assign(id, url);
            }
        }
        Ok(())
    }
}
