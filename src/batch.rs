//! Splitting an upload into request-sized batches.

use crate::error::{FbError, Result};
use crate::limits::ServerLimits;
use std::fs;
use std::path::{Path, PathBuf};

/// One argument of an upload: either a local file waiting to be sent or a
/// reference to content the server already hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadItem {
    path: Option<PathBuf>,
    size: u64,
    id: Option<String>,
    url: Option<String>,
}

impl UploadItem {
    /// Local file; the size is read from disk once, here.
    pub fn local<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let size = fs::metadata(&path)?.len();
        Ok(Self::with_size(path, size))
    }

    pub fn with_size<P: Into<PathBuf>>(path: P, size: u64) -> Self {
        Self {
            path: Some(path.into()),
            size,
            id: None,
            url: None,
        }
    }

    /// Already hosted content, referenced by id.
    pub fn hosted(id: impl Into<String>) -> Self {
        Self {
            path: None,
            size: 0,
            id: Some(id.into()),
            url: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn needs_upload(&self) -> bool {
        self.id.is_none() && self.path.is_some()
    }

    pub(crate) fn assign(&mut self, id: String, url: String) {
        self.id = Some(id);
        self.url = Some(url);
    }
}

/// Positions (into the partitioned slice) of the items sent in one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    pub indices: Vec<usize>,
    pub bytes: u64,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    fn push(&mut self, index: usize, size: u64) {
        self.indices.push(index);
        self.bytes += size;
    }
}

/// Partition the items that still need uploading into ordered batches.
///
/// Without limits everything goes into a single batch. With limits a batch
/// is closed as soon as the next item would exceed the request byte cap or
/// the per-request file count. An empty batch always admits its first item,
/// so a file larger than the request cap (but within the per-file cap) is
/// sent on its own. Any file above the per-file cap fails the whole call.
pub fn partition(items: &[UploadItem], limits: Option<&ServerLimits>) -> Result<Vec<Batch>> {
    let mut batches = Vec::new();
    let mut current = Batch::default();

    for (index, item) in items.iter().enumerate() {
        if !item.needs_upload() {
            continue;
        }
        let size = item.size();

        if let Some(limits) = limits {
            if size > limits.max_single_file_size {
                return Err(FbError::FileTooBig {
                    path: item.path().map(Path::to_path_buf).unwrap_or_default(),
                    size,
                    max: limits.max_single_file_size,
                });
            }

            let over_bytes = current.bytes.saturating_add(size) > limits.max_request_total_size;
            let over_count = current.len() >= limits.max_files_per_request;
            if !current.is_empty() && (over_bytes || over_count) {
                batches.push(std::mem::take(&mut current));
            }
        }

        current.push(index, size);
    }

    if !current.is_empty() {
        batches.push(current);
    }
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    fn limits(max_file: u64, max_request: u64, max_files: usize) -> ServerLimits {
        ServerLimits {
            max_single_file_size: max_file,
            max_request_total_size: max_request,
            max_files_per_request: max_files,
            max_input_fields: 1000,
        }
    }

    fn items(sizes: &[u64]) -> Vec<UploadItem> {
        sizes
            .iter()
            .enumerate()
            .map(|(n, &size)| UploadItem::with_size(format!("file{}", n), size))
            .collect()
    }

    fn batch_sizes(batches: &[Batch]) -> Vec<usize> {
        batches.iter().map(Batch::len).collect()
    }

    #[test]
    fn test_count_limit_splits_batches() {
        let items = items(&[MIB; 12]);
        let batches = partition(&items, Some(&limits(40 * MIB, 100 * MIB, 5))).unwrap();
        assert_eq!(batch_sizes(&batches), vec![5, 5, 2]);
        assert_eq!(batches[2].indices, vec![10, 11]);
        assert_eq!(batches[0].bytes, 5 * MIB);
    }

    #[test]
    fn test_byte_limit_splits_batches() {
        let items = items(&[4, 4, 4, 1, 9]);
        let batches = partition(&items, Some(&limits(100, 8, 10))).unwrap();
        let groups: Vec<Vec<usize>> = batches.iter().map(|b| b.indices.clone()).collect();
        assert_eq!(groups, vec![vec![0, 1], vec![2, 3], vec![4]]);
    }

    #[test]
    fn test_without_limits_everything_is_one_batch() {
        let items = items(&[MIB; 4]);
        let batches = partition(&items, None).unwrap();
        assert_eq!(batch_sizes(&batches), vec![4]);
    }

    #[test]
    fn test_oversized_items_get_their_own_batch() {
        // 30 > request cap 20, but below the per-file cap 40
        let items = items(&[5, 30, 30, 5, 5]);
        let batches = partition(&items, Some(&limits(40, 20, 10))).unwrap();
        let groups: Vec<Vec<usize>> = batches.iter().map(|b| b.indices.clone()).collect();
        assert_eq!(groups, vec![vec![0], vec![1], vec![2], vec![3, 4]]);
    }

    #[test]
    fn test_file_above_per_file_cap_fails() {
        let items = items(&[MIB, 50 * MIB]);
        let err = partition(&items, Some(&limits(40 * MIB, 100 * MIB, 5))).unwrap_err();
        match err {
            FbError::FileTooBig { path, size, max } => {
                assert_eq!(path, PathBuf::from("file1"));
                assert_eq!(size, 50 * MIB);
                assert_eq!(max, 40 * MIB);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_hosted_items_are_skipped() {
        let mut items = items(&[1, 2]);
        items.insert(1, UploadItem::hosted("abc"));
        let batches = partition(&items, Some(&limits(10, 10, 10))).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].indices, vec![0, 2]);
        assert_eq!(batches[0].bytes, 3);
    }

    #[test]
    fn test_partition_preserves_order_and_limits() {
        let sizes: Vec<u64> = (0..200u64).map(|n| (n * 7919) % 37 + 1).collect();
        let items = items(&sizes);
        let limits = limits(37, 60, 4);

        let first = partition(&items, Some(&limits)).unwrap();
        let second = partition(&items, Some(&limits)).unwrap();
        assert_eq!(first, second);

        let flattened: Vec<usize> = first.iter().flat_map(|b| b.indices.clone()).collect();
        assert_eq!(flattened, (0..items.len()).collect::<Vec<_>>());

        for batch in &first {
            assert!(!batch.is_empty());
            assert!(batch.len() <= limits.max_files_per_request);
            assert!(batch.bytes <= limits.max_request_total_size || batch.len() == 1);
        }
    }
}
