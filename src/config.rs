//! Client configuration.
//!
//! The config file is a list of `key=value` lines, values optionally wrapped
//! in double quotes. Unknown keys are kept but ignored; lines that do not
//! look like an assignment are skipped.

use crate::error::{FbError, Result};
use log::debug;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const DEFAULT_PASTEBIN: &str = "https://paste.xinu.at";
const API_PATH: &str = "/api/v2.0.0";

/// Counts and sizes below which the client does not bother asking the
/// server for its limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Files above this size trigger a limits fetch
    pub warn_size: u64,
    /// More upload items than this trigger a limits fetch
    pub files_before_limits: usize,
    /// More ids than this trigger a limits fetch; also the default chunk size
    pub ids_before_limits: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warn_size: 10 * 1024 * 1024,
            files_before_limits: 5,
            ids_before_limits: 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub pastebin: String,
    pub api_url: String,
    pub clipboard_cmd: String,
    pub apikey_file: PathBuf,
    pub apikey: Option<String>,
    pub thresholds: Thresholds,
    pub useragent: String,
}

impl Config {
    /// `$XDG_CONFIG_HOME/fb-client/config` or the platform equivalent.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("fb-client").join("config"))
    }

    /// Load the config from `explicit`, or from the default location if it
    /// exists. The API key is not read here, see [`Config::load_apikey`].
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let entries = match explicit {
            Some(path) => parse_entries(&fs::read_to_string(path)?),
            None => match Self::default_path() {
                Some(path) => read_optional(&path)?,
                None => HashMap::new(),
            },
        };
        Self::from_entries(&entries)
    }

    pub fn from_entries(entries: &HashMap<String, String>) -> Result<Self> {
        let pastebin = entries
            .get("pastebin")
            .cloned()
            .unwrap_or_else(|| DEFAULT_PASTEBIN.to_string());
        let pastebin = pastebin.trim_end_matches('/').to_string();

        let clipboard_cmd = entries
            .get("clipboard_cmd")
            .cloned()
            .unwrap_or_else(default_clipboard_cmd);

        let apikey_file = match entries.get("apikey_file") {
            Some(raw) => PathBuf::from(expand_vars(raw)),
            None => dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("fb-client")
                .join("apikey"),
        };

        let defaults = Thresholds::default();
        let thresholds = Thresholds {
            warn_size: numeric(entries, "warnsize", defaults.warn_size)?,
            files_before_limits: numeric(
                entries,
                "min_files_per_request_default",
                defaults.files_before_limits,
            )?,
            ids_before_limits: numeric(
                entries,
                "min_variables_per_request_default",
                defaults.ids_before_limits,
            )?,
        };

        Ok(Config {
            api_url: format!("{}{}", pastebin, API_PATH),
            pastebin,
            clipboard_cmd,
            apikey_file,
            apikey: None,
            thresholds,
            useragent: format!("fb-client/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    /// Read the API key from `apikey_file`.
    pub fn load_apikey(&mut self) -> Result<()> {
        match fs::read_to_string(&self.apikey_file) {
            Ok(key) => {
                self.apikey = Some(key.trim().to_string());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(FbError::ApikeyNotFound {
                path: self.apikey_file.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Strip the pastebin prefix and any trailing path from a URL or id.
    pub fn extract_id<'a>(&self, arg: &'a str) -> &'a str {
        let rest = arg.strip_prefix(self.pastebin.as_str()).unwrap_or(arg);
        let rest = rest.trim_matches('/');
        rest.split('/').next().unwrap_or(rest)
    }
}

fn default_clipboard_cmd() -> String {
    if cfg!(target_os = "macos") {
        "pbcopy".to_string()
    } else {
        "xclip".to_string()
    }
}

fn read_optional(path: &Path) -> Result<HashMap<String, String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(parse_entries(&text)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("no config file at {}", path.display());
            Ok(HashMap::new())
        }
        Err(e) => Err(e.into()),
    }
}

fn numeric<T: std::str::FromStr>(
    entries: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T> {
    match entries.get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| FbError::config(format!("{} must be a number, got \"{}\"", key, raw))),
        None => Ok(default),
    }
}

/// Parse `key=value` lines. A value wrapped in double quotes is unwrapped.
pub fn parse_entries(text: &str) -> HashMap<String, String> {
    let mut entries = HashMap::new();
    for line in text.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if key.is_empty() || value.is_empty() {
            continue;
        }
        let value = match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
            Some(inner) if !inner.is_empty() => inner,
            _ => value,
        };
        entries.insert(key.to_string(), value.to_string());
    }
    entries
}

/// Expand `$VAR` and `${VAR}`. Unknown variables are left as written.
fn expand_vars(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        match std::env::var(name) {
            Ok(value) if !name.is_empty() => out.push_str(&value),
            _ => out.push_str(&rest[pos..pos + 1 + consumed]),
        }
        rest = &after[consumed..];
    }
    out.push_str(rest);
    out
}
