// UI layer: one handler per `Mode`. Handlers print results to stdout and
// leave error reporting to the caller; interactive prompts use `dialoguer`.

use crate::api::{ApiClient, CancelFlag};
use crate::batch::UploadItem;
use crate::cli::{Cli, Mode};
use crate::config::Config;
use crate::error::{FbError, Result};
use crate::ids::delete_ids;
use crate::inputs::{collect_items, Staging};
use crate::limits::LimitsCache;
use crate::progress::ProgressAggregator;
use crate::upload::Uploader;
use dialoguer::{Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use std::fs;
use std::io::{self, ErrorKind, IsTerminal, Write};
use std::process::{Command, Stdio};
use std::time::Duration;

/// Load configuration, make sure an API key exists and run the selected mode.
pub fn run(cli: &Cli, cancel: CancelFlag) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    let mode = cli.mode();

    ensure_apikey(&mut config, mode, &cancel)?;
    let client = ApiClient::new(&config, cancel.clone())?;
    let limits = LimitsCache::new();

    match mode {
        Mode::Upload => handle_upload(cli, &config, &client, &limits, &cancel),
        Mode::Delete => handle_delete(cli, &config, &client, &limits),
        Mode::Get => handle_get(cli, &config, &client),
        Mode::CreateApikey => create_apikey(&config, &client),
        Mode::DisplayVersion => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Mode::DisplayHistory => handle_history(&client),
    }
}

/// Read the API key, creating one interactively when it is missing and
/// stdin is a terminal.
fn ensure_apikey(config: &mut Config, mode: Mode, cancel: &CancelFlag) -> Result<()> {
    match config.load_apikey() {
        Err(FbError::ApikeyNotFound { .. })
            if matches!(mode, Mode::CreateApikey | Mode::DisplayVersion) =>
        {
            Ok(())
        }
        Err(FbError::ApikeyNotFound { .. }) if io::stdin().is_terminal() => {
            eprintln!("No API key found, creating a new one");
            let client = ApiClient::new(config, cancel.clone())?;
            create_apikey(config, &client)?;
            config.load_apikey()
        }
        other => other,
    }
}

fn handle_upload(
    cli: &Cli,
    config: &Config,
    client: &ApiClient,
    limits: &LimitsCache,
    cancel: &CancelFlag,
) -> Result<()> {
    let staging = Staging::new(&cli.name, cli.compress)?;

    let mut items = if cli.tar {
        vec![UploadItem::local(staging.tar_all(&cli.args)?)?]
    } else if cli.args.is_empty() {
        if io::stdin().is_terminal() {
            println!("^C to exit, ^D to send");
        }
        let path = staging.stdin(io::stdin(), cancel)?;
        vec![UploadItem::local(path)?]
    } else {
        collect_items(&cli.args, config, &staging, client)?
    };

    let mut uploader = Uploader::new(
        client,
        limits,
        config.thresholds,
        ProgressAggregator::stderr(),
    );
    uploader.upload(&mut items)?;

    let urls = if cli.multipaste || items.len() > 1 {
        let ids: Vec<String> = items
            .iter()
            .filter_map(|item| item.id().map(String::from))
            .collect();
        vec![client.create_multipaste(&ids)?.url]
    } else {
        items
            .iter()
            .filter_map(|item| match (item.url(), item.id()) {
                (Some(url), _) => Some(url.to_string()),
                (None, Some(id)) => Some(format!("{}/{}/", config.pastebin, id)),
                (None, None) => None,
            })
            .collect()
    };

    for url in &urls {
        println!("{}", url);
    }
    set_clipboard(&config.clipboard_cmd, &urls.join(" "))
}

fn handle_delete(
    cli: &Cli,
    config: &Config,
    client: &ApiClient,
    limits: &LimitsCache,
) -> Result<()> {
    let ids: Vec<String> = cli
        .args
        .iter()
        .map(|arg| config.extract_id(arg).to_string())
        .collect();

    for failure in delete_ids(client, limits, &config.thresholds, &ids)? {
        println!("Failed to delete \"{}\": {}", failure.id, failure.reason);
    }
    Ok(())
}

fn handle_get(cli: &Cli, config: &Config, client: &ApiClient) -> Result<()> {
    for arg in &cli.args {
        client.get_raw(config.extract_id(arg), io::stdout())?.flush()?;
    }
    Ok(())
}

fn handle_history(client: &ApiClient) -> Result<()> {
    let spinner = spinner("Fetching history...");
    let history = client.history();
    spinner.finish_and_clear();
    print!("{}", history?.render());
    Ok(())
}

/// Prompt for credentials until the server accepts them, then store the
/// new key in `config.apikey_file`.
fn create_apikey(config: &Config, client: &ApiClient) -> Result<()> {
    let comment = format!("fb-client {}@{}", whoami::username(), hostname());

    let key = loop {
        let username: String = Input::new().with_prompt("Username").interact_text()?;
        // `Password` hides input in terminal for passwords.
        let password: String = Password::new().with_prompt("Password").interact()?;

        let spinner = spinner("Creating API key...");
        let result = client.create_apikey(&username, &password, &comment);
        spinner.finish_and_clear();

        match result {
            Ok(created) => break created.new_key,
            Err(e) if e.kind() == "user/login-failed" => {
                eprintln!("{}", e);
                eprintln!("\nPlease try again:");
            }
            Err(e) => return Err(e),
        }
    };

    if let Some(dir) = config.apikey_file.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(&config.apikey_file, key)?;
    debug!("stored API key in {}", config.apikey_file.display());
    Ok(())
}

/// Pipe `content` into the clipboard command. A missing command is ignored.
fn set_clipboard(cmd: &str, content: &str) -> Result<()> {
    let child = Command::new(cmd)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    let mut child = match child {
        Ok(child) => child,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("clipboard command {} not found", cmd);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(content.as_bytes())?;
    }
    child.wait()?;
    Ok(())
}

fn spinner(message: &str) -> ProgressBar {
    if !io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

fn hostname() -> String {
    whoami::fallible::hostname().unwrap_or_else(|e| {
        debug!("cannot read hostname: {}", e);
        "localhost".to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_clipboard_command_is_ignored() {
        assert!(set_clipboard("fb-client-no-such-clipboard-tool", "https://x/").is_ok());
    }

    #[test]
    fn test_hostname_is_never_empty() {
        assert!(!hostname().is_empty());
    }

    #[test]
    fn test_version_mode_needs_no_apikey() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::from_entries(&Default::default()).unwrap();
        config.apikey_file = dir.path().join("apikey");
        assert!(ensure_apikey(&mut config, Mode::DisplayVersion, &CancelFlag::new()).is_ok());
        assert!(config.apikey.is_none());
    }

    #[test]
    fn test_existing_apikey_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::from_entries(&Default::default()).unwrap();
        config.apikey_file = dir.path().join("apikey");
        fs::write(&config.apikey_file, "k3y\n").unwrap();
        ensure_apikey(&mut config, Mode::Upload, &CancelFlag::new()).unwrap();
        assert_eq!(config.apikey.as_deref(), Some("k3y"));
    }
}
