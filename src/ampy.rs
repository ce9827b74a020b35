// Device tool wrapper: builds `ampy` argument lists, runs the tool as a
// child process and hands back what it printed. All device I/O in this
// crate goes through `DeviceTool`.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::Command;

use tracing::debug;

use crate::ports::PortId;

/// One invocation of the device tool, minus the port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    /// List the device's root directory.
    List,
    /// Print a remote file on stdout.
    Get { remote: String },
    /// Copy a remote file byte for byte into a local file.
    Fetch { remote: String, local: PathBuf },
    /// Copy a local file to the device.
    Put { local: PathBuf, remote: String },
    /// Remove a remote file.
    Remove { remote: String },
}

impl DeviceCommand {
    pub fn subcommand(&self) -> &'static str {
        match self {
            DeviceCommand::List => "ls",
            DeviceCommand::Get { .. } | DeviceCommand::Fetch { .. } => "get",
            DeviceCommand::Put { .. } => "put",
            DeviceCommand::Remove { .. } => "rm",
        }
    }

    /// Arguments following `-p <port>`.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![self.subcommand().to_string()];
        match self {
            DeviceCommand::List => {}
            DeviceCommand::Get { remote } | DeviceCommand::Remove { remote } => {
                args.push(remote.clone());
            }
            DeviceCommand::Put { local, remote } => {
                args.push(local.to_string_lossy().into_owned());
                args.push(remote.clone());
            }
            DeviceCommand::Fetch { remote, local } => {
                args.push(remote.clone());
                args.push(local.to_string_lossy().into_owned());
            }
        }
        args
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.args().join(" "))
    }
}

/// What one tool invocation produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutcome {
    /// Process started and exited with status zero.
    pub succeeded: bool,
    /// Captured stdout.
    pub output: String,
    /// Captured stderr, or the reason the process could not start.
    pub error: String,
}

impl ToolOutcome {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            output: output.into(),
            error: String::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            output: String::new(),
            error: error.into(),
        }
    }

    /// Short reason for a failed invocation.
    pub fn failure_detail(&self) -> String {
        let error = self.error.trim();
        if !error.is_empty() {
            return error.to_string();
        }
        let output = self.output.trim();
        if !output.is_empty() {
            return output.to_string();
        }
        "no error output".to_string()
    }
}

/// Something that can carry out device commands on a port.
pub trait DeviceTool {
    /// Run `command` against `port`. Never fails: problems are reported
    /// through `ToolOutcome::succeeded` and `ToolOutcome::error`.
    fn run(&self, port: &PortId, command: &DeviceCommand) -> ToolOutcome;

    /// Human-readable command line, used when reporting failures.
    fn command_line(&self, port: &PortId, command: &DeviceCommand) -> String {
        format!("-p {} {}", port.device_path(), command)
    }
}

/// The real `ampy` executable, looked up on PATH unless `program` is a path.
#[derive(Debug, Clone)]
pub struct Ampy {
    program: String,
}

impl Ampy {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn launch_failure(&self, err: &io::Error) -> ToolOutcome {
        if err.kind() == io::ErrorKind::NotFound {
            ToolOutcome::failure(format!(
                "'{}' was not found. Is it installed and on PATH? (pip install adafruit-ampy)",
                self.program
            ))
        } else {
            ToolOutcome::failure(format!("could not start '{}': {}", self.program, err))
        }
    }
}

impl Default for Ampy {
    fn default() -> Self {
        Self::new("ampy")
    }
}

impl DeviceTool for Ampy {
    fn run(&self, port: &PortId, command: &DeviceCommand) -> ToolOutcome {
        debug!(command = %self.command_line(port, command), "running device tool");

        let output = Command::new(&self.program)
            .arg("-p")
            .arg(port.device_path())
            .args(command.args())
            // keep listings and printed files UTF-8 whatever the console code page
            .env("PYTHONIOENCODING", "utf-8")
            .output();

        match output {
            Ok(output) => {
                let outcome = ToolOutcome {
                    succeeded: output.status.success(),
                    output: String::from_utf8_lossy(&output.stdout).into_owned(),
                    error: String::from_utf8_lossy(&output.stderr).into_owned(),
                };
                debug!(
                    status = ?output.status.code(),
                    stdout_len = outcome.output.len(),
                    stderr_len = outcome.error.len(),
                    "device tool finished"
                );
                outcome
            }
            Err(err) => self.launch_failure(&err),
        }
    }

    fn command_line(&self, port: &PortId, command: &DeviceCommand) -> String {
        format!("{} -p {} {}", self.program, port.device_path(), command)
    }
}
