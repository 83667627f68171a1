#![allow(dead_code)]

use fb_client::api::Transport;
use fb_client::error::{FbError, Result};
use fb_client::limits::ServerLimits;
use fb_client::wire::{DeleteFailure, DeleteOutcome, UploadedFiles};
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};

pub const MIB: u64 = 1024 * 1024;

/// Transport that records every request instead of talking to a server.
#[derive(Default)]
pub struct FakeTransport {
    pub limits: Option<ServerLimits>,
    pub limits_calls: Cell<usize>,
    pub uploads: RefCell<Vec<Vec<PathBuf>>>,
    pub deletes: RefCell<Vec<Vec<String>>>,
    /// Batch number whose response is missing one id
    pub short_response_on: Option<usize>,
    /// Batch number during which the user interrupts the upload
    pub interrupt_on: Option<usize>,
    /// Ids the server refuses to delete
    pub undeletable: Vec<String>,
    pub progress_seen: RefCell<Vec<u64>>,
    next_id: Cell<usize>,
}

impl FakeTransport {
    pub fn with_limits(limits: ServerLimits) -> Self {
        Self {
            limits: Some(limits),
            ..Self::default()
        }
    }

    pub fn upload_sizes(&self) -> Vec<usize> {
        self.uploads.borrow().iter().map(Vec::len).collect()
    }

    pub fn delete_sizes(&self) -> Vec<usize> {
        self.deletes.borrow().iter().map(Vec::len).collect()
    }
}

impl Transport for FakeTransport {
    fn fetch_limits(&self) -> Result<ServerLimits> {
        self.limits_calls.set(self.limits_calls.get() + 1);
        self.limits
            .ok_or_else(|| FbError::api("config unavailable", "file/config-unavailable"))
    }

    fn upload_files(
        &self,
        paths: &[&Path],
        on_progress: &mut dyn FnMut(u64),
    ) -> Result<UploadedFiles> {
        let batch = self.uploads.borrow().len();
        self.uploads
            .borrow_mut()
            .push(paths.iter().map(|p| p.to_path_buf()).collect());

        for raw in [0, 512, 1024] {
            self.progress_seen.borrow_mut().push(raw);
            on_progress(raw);
        }
        if self.interrupt_on == Some(batch) {
            return Err(FbError::Interrupted);
        }

        let mut count = paths.len();
        if self.short_response_on == Some(batch) {
            count -= 1;
        }
        let ids: Vec<String> = (0..count)
            .map(|_| {
                let n = self.next_id.get();
                self.next_id.set(n + 1);
                format!("id{}", n)
            })
            .collect();
        let urls = ids
            .iter()
            .map(|id| format!("https://paste.test/{}/", id))
            .collect();
        Ok(UploadedFiles { ids, urls })
    }

    fn delete_ids(&self, ids: &[String]) -> Result<DeleteOutcome> {
        self.deletes.borrow_mut().push(ids.to_vec());
        let mut outcome = DeleteOutcome::default();
        for id in ids.iter().filter(|id| !self.undeletable.contains(id)) {
            outcome.deleted.insert(id.clone(), serde_json::json!({ "id": id }));
        }
        for id in ids.iter().filter(|id| self.undeletable.contains(id)) {
            outcome.errors.insert(
                id.clone(),
                DeleteFailure {
                    id: id.clone(),
                    reason: "wrong owner".to_string(),
                },
            );
        }
        Ok(outcome)
    }
}

pub fn limits(max_file: u64, max_request: u64, max_files: usize, max_fields: usize) -> ServerLimits {
    ServerLimits {
        max_single_file_size: max_file,
        max_request_total_size: max_request,
        max_files_per_request: max_files,
        max_input_fields: max_fields,
    }
}
