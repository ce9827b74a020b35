// Test doubles for the device tool, the operator and the port scanner.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};

use crate::ampy::{DeviceCommand, DeviceTool, ToolOutcome};
use crate::error::Result;
use crate::ports::{PortId, PortLister};
use crate::prompt::Prompt;

/// Records every command and answers from canned outcomes. Anything not
/// scripted succeeds with empty output.
#[derive(Default)]
pub struct MockTool {
    calls: RefCell<Vec<DeviceCommand>>,
    list: Option<ToolOutcome>,
    gets: HashMap<String, ToolOutcome>,
    puts: HashMap<String, ToolOutcome>,
    removes: HashMap<String, ToolOutcome>,
}

impl MockTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listing(self, entries: &[&str]) -> Self {
        let mut listing = entries.join("\n");
        listing.push('\n');
        self.on_list(ToolOutcome::success(listing))
    }

    pub fn on_list(mut self, outcome: ToolOutcome) -> Self {
        self.list = Some(outcome);
        self
    }

    pub fn on_get(mut self, remote: &str, outcome: ToolOutcome) -> Self {
        self.gets.insert(remote.to_string(), outcome);
        self
    }

    pub fn on_put(mut self, remote: &str, outcome: ToolOutcome) -> Self {
        self.puts.insert(remote.to_string(), outcome);
        self
    }

    pub fn on_remove(mut self, remote: &str, outcome: ToolOutcome) -> Self {
        self.removes.insert(remote.to_string(), outcome);
        self
    }

    pub fn calls(&self) -> Vec<DeviceCommand> {
        self.calls.borrow().clone()
    }

    pub fn puts(&self) -> Vec<(PathBuf, String)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::Put { local, remote } => Some((local.clone(), remote.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn removes(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::Remove { remote } => Some(remote.clone()),
                _ => None,
            })
            .collect()
    }
}

impl MockTool {
    /// Like `ampy get remote local`: the scripted output becomes the local
    /// file unless the read only produced stderr.
    fn fetch(&self, remote: &str, local: &Path) -> ToolOutcome {
        let scripted = self
            .gets
            .get(remote)
            .cloned()
            .unwrap_or_else(|| ToolOutcome::success(""));
        let writes = scripted.succeeded && (scripted.error.is_empty() || !scripted.output.is_empty());
        if writes {
            if let Err(err) = std::fs::write(local, &scripted.output) {
                return ToolOutcome::failure(err.to_string());
            }
        }
        ToolOutcome {
            output: String::new(),
            ..scripted
        }
    }
}

impl DeviceTool for MockTool {
    fn run(&self, _port: &PortId, command: &DeviceCommand) -> ToolOutcome {
        self.calls.borrow_mut().push(command.clone());
        if let DeviceCommand::Fetch { remote, local } = command {
            return self.fetch(remote, local);
        }
        let scripted = match command {
            DeviceCommand::List => self.list.clone(),
            DeviceCommand::Get { remote } | DeviceCommand::Fetch { remote, .. } => {
                self.gets.get(remote).cloned()
            }
            DeviceCommand::Put { remote, .. } => self.puts.get(remote).cloned(),
            DeviceCommand::Remove { remote } => self.removes.get(remote).cloned(),
        };
        scripted.unwrap_or_else(|| ToolOutcome::success(""))
    }
}

/// Replays answers in order; running out is an EOF error.
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
    asked: usize,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: 0,
        }
    }

    pub fn asked(&self) -> usize {
        self.asked
    }

    fn next(&mut self, prompt: &str) -> io::Result<String> {
        self.asked += 1;
        self.answers.pop_front().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("no scripted answer for '{prompt}'"),
            )
        })
    }
}

impl Prompt for ScriptedPrompt {
    fn text(&mut self, prompt: &str) -> io::Result<String> {
        self.next(prompt)
    }

    fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
        let answer = self.next(prompt)?;
        Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
    }

    fn pause(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Returns one scripted scan per call, repeating the last one forever.
pub struct ScriptedPorts {
    scans: Vec<Vec<String>>,
    count: Cell<usize>,
}

impl ScriptedPorts {
    pub fn new(scans: Vec<Vec<&str>>) -> Self {
        Self {
            scans: scans
                .into_iter()
                .map(|scan| scan.into_iter().map(String::from).collect())
                .collect(),
            count: Cell::new(0),
        }
    }

    pub fn scans(&self) -> usize {
        self.count.get()
    }
}

impl PortLister for ScriptedPorts {
    fn list_ports(&self) -> Result<Vec<PortId>> {
        let n = self.count.get();
        self.count.set(n + 1);
        let scan = self
            .scans
            .get(n)
            .or_else(|| self.scans.last())
            .cloned()
            .unwrap_or_default();
        Ok(scan.into_iter().map(PortId::new).collect())
    }
}
