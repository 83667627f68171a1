//! Turning command line arguments into upload items.
//!
//! Everything that has to be rewritten before upload (stdin, remote URLs,
//! directories, compressed copies) is written into a private temporary
//! directory that lives as long as the [`Staging`] value.

use crate::api::{run_cancellable, ApiClient, CancelFlag};
use crate::batch::UploadItem;
use crate::config::Config;
use crate::error::{FbError, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use log::debug;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use xz2::write::XzEncoder;

const XZ_PRESET: u32 = 6;

/// What a single argument refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Content the server already hosts (`id://ID` or a pastebin URL)
    Hosted(String),
    /// Some other http(s) URL, downloaded before upload
    Remote(String),
    Local(PathBuf),
}

pub fn classify(arg: &str, config: &Config) -> Input {
    if let Some(id) = arg.strip_prefix("id://") {
        return Input::Hosted(id.to_string());
    }
    if arg.starts_with(config.pastebin.as_str()) {
        return Input::Hosted(config.extract_id(arg).to_string());
    }
    if is_url(arg) {
        return Input::Remote(arg.to_string());
    }
    Input::Local(PathBuf::from(arg))
}

pub fn is_url(arg: &str) -> bool {
    arg.starts_with("http://") || arg.starts_with("https://")
}

/// Compression applied to local files and directory tarballs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compressor {
    None,
    Gzip,
    Xz,
}

impl Compressor {
    /// Map the number of `-c` flags to a compressor.
    pub fn from_count(count: u8) -> Result<Self> {
        match count {
            0 => Ok(Compressor::None),
            1 => Ok(Compressor::Gzip),
            2 => Ok(Compressor::Xz),
            n => Err(FbError::config(format!(
                "-c can be given at most twice (gzip, xz), got {}",
                n
            ))),
        }
    }

    /// File name suffix, without the leading dot.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            Compressor::None => None,
            Compressor::Gzip => Some("gz"),
            Compressor::Xz => Some("xz"),
        }
    }

    /// Wrap `out` in the matching encoder. `finish_stream` on the returned
    /// writer completes the compressed stream.
    fn encoder<W: io::Write + 'static>(self, out: W) -> Box<dyn FinishWrite> {
        match self {
            Compressor::None => Box::new(Plain(out)),
            Compressor::Gzip => Box::new(GzEncoder::new(out, Compression::default())),
            Compressor::Xz => Box::new(XzEncoder::new(out, XZ_PRESET)),
        }
    }
}

/// A writer that has to be finished explicitly.
trait FinishWrite: io::Write {
    fn finish_stream(self: Box<Self>) -> io::Result<()>;
}

struct Plain<W>(W);

impl<W: io::Write> io::Write for Plain<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<W: io::Write> FinishWrite for Plain<W> {
    fn finish_stream(mut self: Box<Self>) -> io::Result<()> {
        self.0.flush()
    }
}

impl<W: io::Write> FinishWrite for GzEncoder<W> {
    fn finish_stream(self: Box<Self>) -> io::Result<()> {
        (*self).finish().map(drop)
    }
}

impl<W: io::Write> FinishWrite for XzEncoder<W> {
    fn finish_stream(self: Box<Self>) -> io::Result<()> {
        (*self).finish().map(drop)
    }
}

/// Temporary directory plus the per-run rewrite options.
pub struct Staging {
    dir: TempDir,
    name: String,
    compressor: Compressor,
}

impl Staging {
    /// `compress` is the number of `-c` flags.
    pub fn new(name: &str, compress: u8) -> Result<Self> {
        Ok(Self {
            dir: tempfile::Builder::new().prefix("fb-client").tempdir()?,
            name: name.to_string(),
            compressor: Compressor::from_count(compress)?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Store everything readable from `input` as `<tempdir>/<name>`. The
    /// read stops with `Interrupted` once `cancel` is set.
    pub fn stdin<R: Read + Send + 'static>(
        &self,
        mut input: R,
        cancel: &CancelFlag,
    ) -> Result<PathBuf> {
        let file_name = Path::new(&self.name)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("stdin"));
        let dest = self.path().join(file_name);
        let mut out = File::create(&dest)?;
        run_cancellable(
            cancel,
            move || {
                io::copy(&mut input, &mut out)?;
                Ok(())
            },
            &mut || {},
        )?;
        Ok(dest)
    }

    /// Pack all `args` into a single `upload.tar`.
    pub fn tar_all(&self, args: &[String]) -> Result<PathBuf> {
        if let Some(url) = args.iter().find(|arg| is_url(arg)) {
            return Err(FbError::config(format!(
                "--tar does not support URLs as arguments: {}",
                url
            )));
        }
        let dest = self.path().join("upload.tar");
        let mut builder = tar::Builder::new(File::create(&dest)?);
        for arg in args {
            append_path(&mut builder, Path::new(arg))?;
        }
        builder.into_inner()?;
        Ok(dest)
    }

    /// Download a remote URL into the staging directory.
    pub fn download(&self, client: &ApiClient, url: &str) -> Result<PathBuf> {
        let base = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("download");
        let dest = self.path().join(base);
        client.download(url, File::create(&dest)?)?;
        Ok(dest)
    }

    /// Rewrite a local path into what actually gets uploaded.
    pub fn prepare_local(&self, path: &Path) -> Result<PathBuf> {
        let meta = fs::metadata(path).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("File \"{}\" is not readable/not found", path.display()),
            )
        })?;

        if meta.is_dir() {
            return self.tarball(path);
        }

        let path = if meta.len() == 0 {
            // pipes and process substitution report zero length
            self.copy(path)?
        } else {
            path.to_path_buf()
        };

        match self.compressor.extension() {
            Some(extension) => self.compress(&path, extension),
            None => Ok(path),
        }
    }

    /// Location inside the staging directory mirroring `path`.
    fn staged_path(&self, path: &Path, suffix: &str) -> Result<PathBuf> {
        let mut dest = self.path().join(relative(path));
        if !suffix.is_empty() {
            let mut name = dest.file_name().unwrap_or_default().to_os_string();
            name.push(suffix);
            dest.set_file_name(name);
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(dest)
    }

    fn copy(&self, path: &Path) -> Result<PathBuf> {
        let dest = self.staged_path(path, "")?;
        if dest == path {
            return Ok(dest);
        }
        let mut input = File::open(path)?;
        let mut out = File::create(&dest)?;
        io::copy(&mut input, &mut out)?;
        Ok(dest)
    }

    fn compress(&self, path: &Path, extension: &str) -> Result<PathBuf> {
        let dest = self.staged_path(path, &format!(".{}", extension))?;
        debug!("compressing {} to {}", path.display(), dest.display());
        let mut input = File::open(path)?;
        let mut encoder = self.compressor.encoder(File::create(&dest)?);
        io::copy(&mut input, &mut encoder)?;
        encoder.finish_stream()?;
        Ok(dest)
    }

    fn tarball(&self, dir: &Path) -> Result<PathBuf> {
        let stem = dir
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone());
        let extension = match self.compressor.extension() {
            Some(ext) => format!("tar.{}", ext),
            None => "tar".to_string(),
        };
        let dest = self.path().join(format!("{}.{}", stem, extension));
        debug!("packing {} into {}", dir.display(), dest.display());

        let mut builder = tar::Builder::new(self.compressor.encoder(File::create(&dest)?));
        append_path(&mut builder, dir)?;
        builder.into_inner()?.finish_stream()?;
        Ok(dest)
    }
}

/// Normalize upload arguments into items. Remote URLs are downloaded and
/// local files rewritten as needed; hosted references are passed through.
pub fn collect_items(
    args: &[String],
    config: &Config,
    staging: &Staging,
    client: &ApiClient,
) -> Result<Vec<UploadItem>> {
    let mut items = Vec::with_capacity(args.len());
    for arg in args {
        let item = match classify(arg, config) {
            Input::Hosted(id) => UploadItem::hosted(id),
            Input::Remote(url) => {
                let path = staging.download(client, &url)?;
                UploadItem::local(staging.prepare_local(&path)?)?
            }
            Input::Local(path) => UploadItem::local(staging.prepare_local(&path)?)?,
        };
        items.push(item);
    }
    Ok(items)
}

fn append_path<W: io::Write>(builder: &mut tar::Builder<W>, path: &Path) -> Result<()> {
    let name = relative(path);
    let name = if name.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        name
    };
    if path.is_dir() {
        builder.append_dir_all(&name, path)?;
    } else {
        builder.append_path_with_name(path, &name)?;
    }
    Ok(())
}

/// `path` without root, prefix and `..` components.
fn relative(path: &Path) -> PathBuf {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}
