// Library root
// -----------
// The `fb` binary (`main.rs`) is a thin wrapper around these modules.
//
// Module responsibilities:
// - `api`: blocking HTTP client for the paste service and the `Transport`
//   seam used by the batching code.
// - `batch`, `ids`: splitting uploads and id lists into requests that fit
//   the server limits (`limits`).
// - `progress`: one progress line across all upload requests.
// - `upload`: drives limits, batching, requests and progress for an upload.
// - `config`, `cli`, `inputs`: turning the command line and config file
//   into upload items and settings.
// - `history`, `ui`: what gets printed for each mode.
pub mod api;
pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod ids;
pub mod inputs;
pub mod limits;
pub mod progress;
pub mod ui;
pub mod upload;
pub mod wire;

pub use error::{FbError, Result};
