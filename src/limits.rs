//! Server-advertised upload constraints.
//!
//! The limits come from `/file/get_config` and are only requested when an
//! upload or delete is big enough to need them. Once fetched they are kept
//! for the rest of the process.

use crate::api::Transport;
use crate::error::Result;
use crate::wire::lenient_u64;
use log::debug;
use once_cell::unsync::OnceCell;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ServerLimits {
    /// Largest single file the server accepts
    #[serde(rename = "upload_max_size", deserialize_with = "lenient_u64")]
    pub max_single_file_size: u64,
    /// Largest request body the server accepts
    #[serde(rename = "request_max_size", deserialize_with = "lenient_u64")]
    pub max_request_total_size: u64,
    #[serde(rename = "max_files_per_request", deserialize_with = "lenient_usize")]
    pub max_files_per_request: usize,
    /// Maximum number of form fields in one request, API key included
    #[serde(rename = "max_input_vars", deserialize_with = "lenient_usize")]
    pub max_input_fields: usize,
}

fn lenient_usize<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value = lenient_u64(deserializer)?;
    usize::try_from(value).map_err(D::Error::custom)
}

/// Fetch-on-first-use holder for [`ServerLimits`].
///
/// A failed fetch is not cached; the error goes straight back to the caller
/// and aborts whatever needed the limits.
#[derive(Debug, Default)]
pub struct LimitsCache {
    cell: OnceCell<ServerLimits>,
}

impl LimitsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache pre-seeded with known limits.
    pub fn with_limits(limits: ServerLimits) -> Self {
        Self {
            cell: OnceCell::from(limits),
        }
    }

    /// Return the cached limits, fetching them through `transport` the first time.
    pub fn fetch<T: Transport + ?Sized>(&self, transport: &T) -> Result<&ServerLimits> {
        self.cell.get_or_try_init(|| {
            debug!("fetching server config");
            let limits = transport.fetch_limits()?;
            debug!("server limits: {:?}", limits);
            Ok(limits)
        })
    }

    /// Limits if they have already been fetched.
    pub fn get(&self) -> Option<&ServerLimits> {
        self.cell.get()
    }
}
