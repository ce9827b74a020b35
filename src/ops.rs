// Operation handlers behind the menu entries. Each one is a short sequence
// of device tool calls made through the `Session`, plus the local file work
// around them. Batch handlers never stop at the first failing item.

use std::fs;
use std::path::{Path, PathBuf};

use crossterm::style::Stylize;
use tracing::warn;

use crate::ampy::{DeviceCommand, DeviceTool, ToolOutcome};
use crate::error::{Error, Result};
use crate::ports::PortId;
use crate::prompt::Prompt;
use crate::spinner::with_spinner;

/// Everything an operation needs to know about the current session.
pub struct Session<'a> {
    pub port: PortId,
    pub tool: &'a dyn DeviceTool,
    /// Remote directory used by directory uploads.
    pub remote_root: String,
}

impl<'a> Session<'a> {
    pub fn new(port: PortId, tool: &'a dyn DeviceTool, remote_root: impl Into<String>) -> Self {
        Self {
            port,
            tool,
            remote_root: remote_root.into(),
        }
    }

    /// Run one device command with the spinner up. A failed invocation has
    /// its full command line printed here; the captured error text travels
    /// on in the handler's `Error` and is printed by the caller.
    pub fn run(&self, command: &DeviceCommand) -> ToolOutcome {
        let outcome = with_spinner(command.to_string(), || self.tool.run(&self.port, command));
        if !outcome.succeeded {
            let line = self.tool.command_line(&self.port, command);
            warn!(command = %line, stderr = %outcome.error.trim(), "device tool failed");
            println!("{}", format!("Command failed: {line}").red());
        }
        outcome
    }

    /// Remote path for a file uploaded into the remote root.
    pub fn remote_path_for(&self, file_name: &str) -> String {
        if self.remote_root.ends_with('/') {
            format!("{}{}", self.remote_root, file_name)
        } else {
            format!("{}/{}", self.remote_root, file_name)
        }
    }
}

/// Count of finished items in a multi-item command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchTally {
    pub attempted: usize,
    pub succeeded: usize,
    /// Failed items and why.
    pub failures: Vec<(String, String)>,
}

impl BatchTally {
    pub fn record(&mut self, item: &str, result: Result<()>) {
        self.attempted += 1;
        match result {
            Ok(()) => self.succeeded += 1,
            Err(err) => self.failures.push((item.to_string(), err.to_string())),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn summary(&self) -> String {
        format!("{} of {} succeeded", self.succeeded, self.attempted)
    }
}

/// Result of reading a remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Text(String),
    Empty,
}

/// Result of a confirmed batch deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The operator declined.
    Cancelled,
    /// The device listing had no entries.
    DeviceEmpty,
    /// Entries exist but none matched.
    NoMatches,
    Removed(BatchTally),
}

/// `print` in the device tool terminates output with one line ending.
fn strip_print_newline(text: &str) -> &str {
    text.strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(text)
}

/// Base name of a remote path: `/lib/util.py` -> `util.py`.
pub fn remote_base_name(remote: &str) -> Option<&str> {
    remote
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let path = path.trim();
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Read a remote file.
///
/// Stdout is the content. When stdout is empty, non-empty stderr means the
/// read failed (typically a missing file); stderr next to real content is
/// only logged.
pub fn read_remote(session: &Session, remote: &str) -> Result<FileContent> {
    let command = DeviceCommand::Get {
        remote: remote.to_string(),
    };
    let outcome = session.run(&command);
    if !outcome.succeeded {
        return Err(Error::Tool {
            command: command.to_string(),
            detail: outcome.failure_detail(),
        });
    }

    let text = strip_print_newline(&outcome.output);
    let stderr = outcome.error.trim();
    if text.is_empty() {
        if !stderr.is_empty() {
            return Err(Error::SoftFailure {
                path: remote.to_string(),
                detail: stderr.to_string(),
            });
        }
        return Ok(FileContent::Empty);
    }

    if !stderr.is_empty() {
        warn!(path = remote, stderr, "device tool wrote to stderr during read");
    }
    Ok(FileContent::Text(text.to_string()))
}

/// List entries in the device's root directory.
pub fn list_remote(session: &Session) -> Result<Vec<String>> {
    let command = DeviceCommand::List;
    let outcome = session.run(&command);
    if !outcome.succeeded {
        return Err(Error::Tool {
            command: command.to_string(),
            detail: outcome.failure_detail(),
        });
    }
    Ok(outcome
        .output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

fn remove_remote(session: &Session, remote: &str) -> Result<()> {
    let command = DeviceCommand::Remove {
        remote: remote.to_string(),
    };
    let outcome = session.run(&command);
    if outcome.succeeded {
        Ok(())
    } else {
        Err(Error::Tool {
            command: command.to_string(),
            detail: outcome.failure_detail(),
        })
    }
}

/// Show the device's file listing (menu header).
pub fn display_listing(session: &Session) -> Result<Vec<String>> {
    let entries = list_remote(session)?;
    println!("Storage on device:");
    if entries.is_empty() {
        println!("  (empty)");
    }
    for entry in &entries {
        println!("  {entry}");
    }
    Ok(entries)
}

/// Menu 1: print a remote file.
pub fn display_file(session: &Session, remote: &str) -> Result<FileContent> {
    let content = read_remote(session, remote)?;
    let separator = "-".repeat(30);
    println!("{separator}");
    match &content {
        FileContent::Text(text) => println!("{text}"),
        FileContent::Empty => println!("{}", "(empty file)".dim()),
    }
    println!("{separator}");
    Ok(content)
}

/// Menu 2: upload one file. The local path is not checked here; the
/// device tool's own failure is the signal.
pub fn upload_file(session: &Session, local: &Path, remote: &str) -> Result<()> {
    let command = DeviceCommand::Put {
        local: local.to_path_buf(),
        remote: remote.to_string(),
    };
    let outcome = session.run(&command);
    if outcome.succeeded {
        Ok(())
    } else {
        Err(Error::Tool {
            command: command.to_string(),
            detail: outcome.failure_detail(),
        })
    }
}

/// Plain files directly inside `dir`, sorted by name.
fn plain_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    if !dir.is_dir() {
        return Err(Error::MissingDirectory(dir.to_path_buf()));
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::local_io(dir, e))? {
        let entry = entry.map_err(|e| Error::local_io(dir, e))?;
        let path = entry.path();
        if path.is_file() {
            files.push((entry.file_name().to_string_lossy().into_owned(), path));
        }
    }
    files.sort();
    Ok(files)
}

/// Menu 3: upload every plain file of a local directory (not recursive)
/// into the remote root.
pub fn upload_dir(session: &Session, dir: &Path) -> Result<BatchTally> {
    let files = plain_files(dir)?;
    let mut tally = BatchTally::default();
    for (name, path) in files {
        println!("uploading: {name}");
        let remote = session.remote_path_for(&name);
        let result = upload_file(session, &path, &remote);
        if result.is_ok() {
            println!("DONE");
        }
        tally.record(&name, result);
    }
    Ok(tally)
}

/// Menu 4: copy a remote file to `local`.
///
/// The tool writes the bytes into a staging directory next to `local`, which
/// are then moved into place, so the file is never altered by console
/// encoding and a failed move is a local error, not a device one. The local
/// file is created even when the remote file is empty.
pub fn download_file(session: &Session, remote: &str, local: &Path) -> Result<()> {
    let name = local
        .file_name()
        .ok_or_else(|| Error::InvalidInput(format!("'{}' is not a file path", local.display())))?;
    let parent = match local.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let staging = tempfile::Builder::new()
        .prefix(".ampy-get-")
        .tempdir_in(parent)
        .map_err(|e| Error::local_io(parent, e))?;
    let fetched = staging.path().join(name);

    let command = DeviceCommand::Fetch {
        remote: remote.to_string(),
        local: fetched.clone(),
    };
    let outcome = session.run(&command);
    if !outcome.succeeded {
        return Err(Error::Tool {
            command: command.to_string(),
            detail: outcome.failure_detail(),
        });
    }

    let fetched_len = fs::metadata(&fetched).ok().map(|meta| meta.len());
    let stderr = outcome.error.trim();
    if !stderr.is_empty() {
        if fetched_len.unwrap_or(0) == 0 {
            return Err(Error::SoftFailure {
                path: remote.to_string(),
                detail: stderr.to_string(),
            });
        }
        warn!(path = remote, stderr, "device tool wrote to stderr during download");
    }

    match fetched_len {
        Some(_) => fs::rename(&fetched, local),
        None => fs::write(local, b""),
    }
    .map_err(|e| Error::local_io(local, e))
}

/// Menu 4 with a target directory: creates it and keeps the remote base name.
pub fn download_into(session: &Session, remote: &str, local_dir: &Path) -> Result<PathBuf> {
    let name = remote_base_name(remote)
        .ok_or_else(|| Error::InvalidInput(format!("'{remote}' does not name a file")))?;
    fs::create_dir_all(local_dir).map_err(|e| Error::local_io(local_dir, e))?;
    let local = local_dir.join(name);
    download_file(session, remote, &local)?;
    Ok(local)
}

/// Split a comma separated list of remote paths.
pub fn split_remote_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

/// Menu 5: download several remote files into one local directory.
pub fn download_many(session: &Session, remote_list: &str, local_dir: &Path) -> Result<BatchTally> {
    let remotes = split_remote_list(remote_list);
    if remotes.is_empty() {
        return Err(Error::InvalidInput("no remote files given".into()));
    }
    fs::create_dir_all(local_dir).map_err(|e| Error::local_io(local_dir, e))?;

    let mut tally = BatchTally::default();
    for remote in remotes {
        let result = match remote_base_name(&remote) {
            Some(name) => {
                let local = local_dir.join(name);
                println!("downloading: '{}' as '{}'", remote, local.display());
                download_file(session, &remote, &local)
            }
            None => Err(Error::InvalidInput(format!("'{remote}' does not name a file"))),
        };
        if result.is_ok() {
            println!("DONE");
        }
        tally.record(&remote, result);
    }
    Ok(tally)
}

/// Menu 6: delete one remote file after confirmation. `Ok(false)` means the
/// operator declined.
pub fn delete_file(session: &Session, prompt: &mut dyn Prompt, remote: &str) -> Result<bool> {
    let question = format!("Are you sure you want to delete '{remote}' from the device?");
    if !prompt.confirm(&question)? {
        return Ok(false);
    }
    remove_remote(session, remote)?;
    Ok(true)
}

/// Normalise the operator's extension: `txt`, `.txt` and ` .txt ` all give
/// the suffix `.txt`. Matching is case-sensitive, so `TXT` gives `.TXT`.
pub fn extension_suffix(extension: &str) -> Result<String> {
    let extension = extension.trim().trim_start_matches('.');
    if extension.is_empty() {
        return Err(Error::InvalidInput("no extension given".into()));
    }
    Ok(format!(".{extension}"))
}

fn remove_each(session: &Session, entries: &[String]) -> BatchTally {
    let mut tally = BatchTally::default();
    for entry in entries {
        println!("deleting: {entry}");
        let result = remove_remote(session, entry);
        if result.is_ok() {
            println!("DONE");
        }
        tally.record(entry, result);
    }
    tally
}

/// Menu 7: delete every listed entry ending in `.<extension>`.
pub fn delete_by_extension(
    session: &Session,
    prompt: &mut dyn Prompt,
    extension: &str,
) -> Result<DeleteOutcome> {
    let suffix = extension_suffix(extension)?;
    let question = format!("Are you sure you want to delete all '{suffix}' files from the device?");
    if !prompt.confirm(&question)? {
        return Ok(DeleteOutcome::Cancelled);
    }

    let entries = list_remote(session)?;
    if entries.is_empty() {
        return Ok(DeleteOutcome::DeviceEmpty);
    }
    let matching: Vec<String> = entries
        .into_iter()
        .filter(|entry| entry.ends_with(&suffix))
        .collect();
    if matching.is_empty() {
        return Ok(DeleteOutcome::NoMatches);
    }
    Ok(DeleteOutcome::Removed(remove_each(session, &matching)))
}

/// Menu 8: delete every listed entry, after two confirmations.
pub fn delete_everything(session: &Session, prompt: &mut dyn Prompt) -> Result<DeleteOutcome> {
    if !prompt.confirm("Do you want to delete all files from the device?")? {
        return Ok(DeleteOutcome::Cancelled);
    }
    let double_check = "Are you sure you want to delete ALL files from the device? (double-check)"
        .red()
        .to_string();
    if !prompt.confirm(&double_check)? {
        return Ok(DeleteOutcome::Cancelled);
    }

    let entries = list_remote(session)?;
    if entries.is_empty() {
        return Ok(DeleteOutcome::DeviceEmpty);
    }
    Ok(DeleteOutcome::Removed(remove_each(session, &entries)))
}
