// API client module: a blocking HTTP client that talks to the paste
// service. Every exchange runs on a detached worker thread while the
// calling thread waits for it, reports upload progress and gives up as
// soon as the operation is cancelled.

use crate::config::Config;
use crate::error::{FbError, Result};
use crate::history::History;
use crate::limits::ServerLimits;
use crate::wire::{parse_envelope, DeleteOutcome, Multipaste, NewApikey, UploadedFiles};
use log::debug;
use reqwest::blocking::{multipart, Client, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const PROGRESS_POLL: Duration = Duration::from_millis(50);

/// The requests the batching code needs. `ApiClient` is the real
/// implementation; tests substitute their own.
pub trait Transport {
    /// `GET /file/get_config`
    fn fetch_limits(&self) -> Result<ServerLimits>;

    /// Upload `paths` in one request. `on_progress` receives the number of
    /// file bytes sent so far in this request, on the calling thread.
    fn upload_files(&self, paths: &[&Path], on_progress: &mut dyn FnMut(u64))
        -> Result<UploadedFiles>;

    /// Delete `ids` in one request.
    fn delete_ids(&self, ids: &[String]) -> Result<DeleteOutcome>;
}

/// Shared flag used to abort a running operation, e.g. from a Ctrl-C handler.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Run `job` on a detached thread and wait for its result, calling `on_tick`
/// every poll interval. Returns `Interrupted` as soon as `cancel` is set; the
/// worker is left to finish on its own.
pub fn run_cancellable<T, F>(
    cancel: &CancelFlag,
    job: F,
    on_tick: &mut dyn FnMut(),
) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    if cancel.is_cancelled() {
        return Err(FbError::Interrupted);
    }
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        // the receiver is gone after a cancel
        let _ = tx.send(job());
    });

    loop {
        match rx.recv_timeout(PROGRESS_POLL) {
            Ok(Err(_)) if cancel.is_cancelled() => return Err(FbError::Interrupted),
            Ok(result) => return result,
            Err(RecvTimeoutError::Timeout) if cancel.is_cancelled() => {
                debug!("cancelled, leaving worker behind");
                return Err(FbError::Interrupted);
            }
            Err(RecvTimeoutError::Timeout) => on_tick(),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(FbError::protocol("request worker exited without a result"))
            }
        }
    }
}

/// Request body reader that counts the bytes it hands out and stops once
/// the operation is cancelled.
struct CountingReader<R> {
    inner: R,
    sent: Arc<AtomicU64>,
    cancel: CancelFlag,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(io::Error::new(io::ErrorKind::Other, "upload interrupted"));
        }
        let n = self.inner.read(buf)?;
        self.sent.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// Blocking client holding the reqwest client, the API base URL and the
/// API key used for authenticated calls.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    api_url: String,
    pastebin: String,
    apikey: Option<String>,
    cancel: CancelFlag,
}

impl ApiClient {
    pub fn new(config: &Config, cancel: CancelFlag) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .user_agent(config.useragent.clone())
            .default_headers(headers)
            .timeout(None::<Duration>)
            .build()?;
        Ok(ApiClient {
            client,
            api_url: config.api_url.clone(),
            pastebin: config.pastebin.clone(),
            apikey: config.apikey.clone(),
            cancel,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    fn apikey(&self) -> Result<String> {
        self.apikey
            .clone()
            .ok_or_else(|| FbError::config("an API key is required for this request"))
    }

    fn id_fields(ids: &[String]) -> multipart::Form {
        ids.iter().fold(multipart::Form::new(), |form, id| {
            form.text(format!("ids[{}]", id), id.clone())
        })
    }

    /// Send a request and return (status, body). Transport failures after a
    /// cancel are reported as `Interrupted`.
    fn exchange(
        &self,
        request: RequestBuilder,
        on_tick: &mut dyn FnMut(),
    ) -> Result<(u16, String)> {
        let (status, body) = run_cancellable(
            &self.cancel,
            move || {
                let res = request.send()?;
                let status = res.status().as_u16();
                Ok((status, res.text()?))
            },
            on_tick,
        )?;
        debug!("response ({}): {}", status, body);
        Ok((status, body))
    }

    fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let (status, body) = self.exchange(request, &mut || {})?;
        parse_envelope(status, &body)
    }

    fn post_form<T: DeserializeOwned>(&self, path: &str, form: multipart::Form) -> Result<T> {
        let url = self.endpoint(path);
        debug!("POST {}", url);
        let form = form.text("apikey", self.apikey()?);
        self.call(self.client.post(&url).multipart(form))
    }

    /// Create a multipaste out of already uploaded ids.
    pub fn create_multipaste(&self, ids: &[String]) -> Result<Multipaste> {
        self.post_form("/file/create_multipaste", Self::id_fields(ids))
    }

    /// Uploads and multipastes owned by the API key's user.
    pub fn history(&self) -> Result<History> {
        self.post_form("/file/history", multipart::Form::new())
    }

    /// Create a new API key with username and password. This is the only
    /// call that does not send an API key.
    pub fn create_apikey(&self, username: &str, password: &str, comment: &str) -> Result<NewApikey> {
        let url = self.endpoint("/user/create_apikey");
        debug!("POST {}", url);
        let form = multipart::Form::new()
            .text("username", username.to_string())
            .text("password", password.to_string())
            .text("comment", comment.to_string())
            .text("access_level", "apikey");
        self.call(self.client.post(&url).multipart(form))
    }

    /// Fetch a paste's raw content and write it to `out`.
    pub fn get_raw<W: Write + Send + 'static>(&self, id: &str, out: W) -> Result<W> {
        let url = format!("{}/{}", self.pastebin, id);
        self.download(&url, out)
    }

    /// Download an arbitrary URL into `out` and hand the writer back.
    pub fn download<W: Write + Send + 'static>(&self, url: &str, mut out: W) -> Result<W> {
        debug!("GET {}", url);
        let request = self.client.get(url);
        let url = url.to_string();
        run_cancellable(
            &self.cancel,
            move || {
                let mut res = request.send()?;
                if !res.status().is_success() {
                    return Err(FbError::protocol(format!(
                        "Invalid HTTP response code: {} for {}",
                        res.status().as_u16(),
                        url
                    )));
                }
                res.copy_to(&mut out)?;
                Ok(out)
            },
            &mut || {},
        )
    }
}

impl Transport for ApiClient {
    fn fetch_limits(&self) -> Result<ServerLimits> {
        let url = self.endpoint("/file/get_config");
        debug!("GET {}", url);
        self.call(self.client.get(&url))
    }

    fn upload_files(
        &self,
        paths: &[&Path],
        on_progress: &mut dyn FnMut(u64),
    ) -> Result<UploadedFiles> {
        if self.cancel.is_cancelled() {
            return Err(FbError::Interrupted);
        }

        let sent = Arc::new(AtomicU64::new(0));
        let mut form = multipart::Form::new();
        for (n, path) in paths.iter().enumerate() {
            let file = File::open(path)?;
            let length = file.metadata()?.len();
            let file_name = path
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "stdin".to_string());
            let reader = CountingReader {
                inner: file,
                sent: Arc::clone(&sent),
                cancel: self.cancel.clone(),
            };
            let part = multipart::Part::reader_with_length(reader, length).file_name(file_name);
            form = form.part(format!("file[{}]", n + 1), part);
        }
        let form = form.text("apikey", self.apikey()?);

        let url = self.endpoint("/file/upload");
        debug!("POST {} ({} files)", url, paths.len());
        let request = self.client.post(&url).multipart(form);

        // marks the start of a new exchange for the aggregator
        on_progress(0);
        let (status, body) =
            self.exchange(request, &mut || on_progress(sent.load(Ordering::Relaxed)))?;
        on_progress(sent.load(Ordering::Relaxed));

        parse_envelope(status, &body)
    }

    fn delete_ids(&self, ids: &[String]) -> Result<DeleteOutcome> {
        self.post_form("/file/delete", Self::id_fields(ids))
    }
}
