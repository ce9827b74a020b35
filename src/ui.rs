// UI layer: the numbered menu. Each entry collects its arguments with the
// `Prompt`, calls the matching handler in `ops` and prints the result.

use std::fmt;
use std::io::stdout;
use std::str::FromStr;

use anyhow::{Context, Result};
use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};
use tracing::{debug, info};

use crate::ampy::{Ampy, DeviceTool};
use crate::config::Settings;
use crate::error::Error;
use crate::ops::{self, DeleteOutcome, Session};
use crate::ports::{discover_port, PortId, PortLister, ScanPolicy, SystemPorts};
use crate::prompt::{Prompt, Terminal, INPUT_SIGN};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const SEPARATOR: &str = "------------------------------";

const HELP: &str = "\
--- ABOUT ---

ampy-manager manages the files of a MicroPython board (ESP8266, ESP32,
Raspberry Pi Pico, ...) through the 'ampy' command line tool, which must be
installed and on PATH.

--- OPTIONS ---

 1  Display file content      print a file stored on the device
 2  Upload single file        local path, then destination path on the device
 3  Upload multiple files     every file of a local directory (not recursive)
                              is uploaded to the device root
 4  Download single file      device path, then a local target directory
 5  Download multiple files   comma separated device paths, then a local
                              target directory (created when missing)
 6  Delete single file        asks for confirmation
 7  Delete by extension       e.g. 'txt' or 'py'; asks for confirmation
 8  Delete everything         asks twice
 9  Rescan serial ports       pick another port
10  Exit

Type 'help' at the option prompt to show this text.

--- ENVIRONMENT ---

AMPY_MANAGER_TOOL            device tool to run (default: ampy)
AMPY_MANAGER_REMOTE_ROOT     destination of directory uploads (default: /)
AMPY_MANAGER_SCAN_DELAY_MS   pause between port scans (default: 1000)
AMPY_MANAGER_RESERVED_PORT   port never offered ('' offers every port)
AMPY_MANAGER_NO_CLEAR        keep the screen between menus
RUST_LOG                     log filter, e.g. ampy_manager=debug
";

/// A menu entry chosen by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    DisplayFile,
    UploadFile,
    UploadDir,
    DownloadFile,
    DownloadMany,
    DeleteFile,
    DeleteByExtension,
    DeleteEverything,
    Rescan,
    Exit,
    Help,
}

impl MenuChoice {
    pub const NUMBERED: [MenuChoice; 10] = [
        MenuChoice::DisplayFile,
        MenuChoice::UploadFile,
        MenuChoice::UploadDir,
        MenuChoice::DownloadFile,
        MenuChoice::DownloadMany,
        MenuChoice::DeleteFile,
        MenuChoice::DeleteByExtension,
        MenuChoice::DeleteEverything,
        MenuChoice::Rescan,
        MenuChoice::Exit,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MenuChoice::DisplayFile => "Display file content",
            MenuChoice::UploadFile => "Upload single file",
            MenuChoice::UploadDir => "Upload multiple files",
            MenuChoice::DownloadFile => "Download single file",
            MenuChoice::DownloadMany => "Download multiple files",
            MenuChoice::DeleteFile => "Delete single file",
            MenuChoice::DeleteByExtension => "Delete by extension",
            MenuChoice::DeleteEverything => "Delete everything",
            MenuChoice::Rescan => "Rescan serial ports",
            MenuChoice::Exit => "Exit",
            MenuChoice::Help => "Help",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidChoice(pub String);

impl fmt::Display for InvalidChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid choice '{}'. Choose an option from 1 to 10 or type 'help'.",
            self.0
        )
    }
}

impl std::error::Error for InvalidChoice {}

impl FromStr for MenuChoice {
    type Err = InvalidChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("help") {
            return Ok(MenuChoice::Help);
        }
        s.parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| MenuChoice::NUMBERED.get(i).copied())
            .ok_or_else(|| InvalidChoice(s.to_string()))
    }
}

/// What the loop does after an entry ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

/// Entry point used by the binary: discover a port and run the menu on the
/// terminal until the operator exits.
pub fn main_menu(settings: Settings) -> Result<()> {
    let tool = Ampy::new(settings.tool.clone());
    let lister = SystemPorts::new(settings.reserved_port.clone());
    let mut prompt = Terminal;
    run_menu(&settings, &tool, &lister, &mut prompt)
}

/// The menu loop over any tool, port source and operator.
pub fn run_menu(
    settings: &Settings,
    tool: &dyn DeviceTool,
    lister: &dyn PortLister,
    prompt: &mut dyn Prompt,
) -> Result<()> {
    let policy = ScanPolicy::patient(settings.scan_delay);

    clear_screen(settings);
    let Some(port) = select_port(lister, prompt, &policy)? else {
        println!("No port selected.");
        return Ok(());
    };
    let mut session = Session::new(port, tool, settings.remote_root.clone());

    loop {
        clear_screen(settings);
        print_header(&session);

        let answer = prompt.text(&format!("Choose an option {INPUT_SIGN}"))?;
        let flow = match answer.parse::<MenuChoice>() {
            Ok(MenuChoice::Rescan) => {
                clear_screen(settings);
                match select_port(lister, prompt, &policy)? {
                    Some(port) => {
                        info!(port = %port, "switched port");
                        session.port = port;
                    }
                    None => println!("Keeping port {}.", session.port),
                }
                Flow::Continue
            }
            Ok(choice) => {
                debug!(?choice, "menu choice");
                run_choice(choice, &session, prompt)?
            }
            Err(err) => {
                println!("{}", err.to_string().red());
                Flow::Continue
            }
        };

        if flow == Flow::Exit {
            println!("Script terminated.");
            return Ok(());
        }
        prompt.pause()?;
    }
}

fn select_port(
    lister: &dyn PortLister,
    prompt: &mut dyn Prompt,
    policy: &ScanPolicy,
) -> Result<Option<PortId>> {
    discover_port(lister, prompt, policy).context("Serial port discovery failed")
}

fn clear_screen(settings: &Settings) {
    if settings.clear_screen {
        // Cosmetic only; a terminal that cannot clear just scrolls.
        let _ = execute!(stdout(), Clear(ClearType::All), MoveTo(0, 0));
    }
}

fn print_header(session: &Session) {
    println!(
        "Ampy Manager {}\nselected port: {}",
        format!("v{VERSION}").cyan().bold(),
        session.port.to_string().red().bold()
    );
    println!("{SEPARATOR}");
    if let Err(err) = ops::display_listing(session) {
        println!("{}", format!("Could not list the device: {err}").red());
    }
    println!("{SEPARATOR}");
    println!("Options:");
    for (i, choice) in MenuChoice::NUMBERED.iter().enumerate() {
        println!("{:<2} {}", i + 1, choice.label());
    }
    println!("{SEPARATOR}");
}

/// Errors that end the session (the operator's terminal went away). Every
/// other error is printed and the menu carries on.
fn report(result: crate::error::Result<()>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(Error::Prompt(err)) => Err(err).context("Failed to read operator input"),
        Err(err) => {
            println!("{}", err.to_string().red());
            Ok(())
        }
    }
}

fn print_tally(action: &str, tally: &ops::BatchTally) {
    let line = format!("{action}: {}", tally.summary());
    if tally.is_complete() {
        println!("{}", line.green());
    } else {
        println!("{}", line.yellow());
        for (item, reason) in &tally.failures {
            println!("{}", format!("  failed: {item}: {reason}").red());
        }
    }
}

fn print_delete_outcome(outcome: &DeleteOutcome, what: &str) {
    match outcome {
        DeleteOutcome::Cancelled => println!("Delete {what} operation canceled."),
        DeleteOutcome::DeviceEmpty => println!("No files found on the device."),
        DeleteOutcome::NoMatches => println!("No {what} files found on the device."),
        DeleteOutcome::Removed(tally) => print_tally(&format!("Deleted {what} files"), tally),
    }
}

fn run_choice(choice: MenuChoice, session: &Session, prompt: &mut dyn Prompt) -> Result<Flow> {
    match choice {
        MenuChoice::DisplayFile => {
            let remote = prompt.text("Enter destination path of the file on the device")?;
            report(ops::display_file(session, &remote).map(|_| ()))?;
        }
        MenuChoice::UploadFile => {
            let local = prompt.text("Enter the source path for the local file")?;
            let remote = prompt.text("Enter destination path of the file on the device")?;
            report(ops::upload_file(session, &ops::expand_home(&local), &remote).map(|()| {
                println!("File uploaded to the device.");
            }))?;
        }
        MenuChoice::UploadDir => {
            let dir = prompt.text("Enter the source directory path for the files")?;
            report(ops::upload_dir(session, &ops::expand_home(&dir)).map(|tally| {
                if tally.attempted == 0 {
                    println!("No files found in the source directory.");
                } else {
                    print_tally("Uploaded", &tally);
                }
            }))?;
        }
        MenuChoice::DownloadFile => {
            let remote = prompt.text("Enter the path of the file on the device")?;
            let dir = prompt.text("Enter the target directory for the downloaded file")?;
            report(
                ops::download_into(session, &remote, &ops::expand_home(&dir)).map(|path| {
                    println!("File {} downloaded to {}.", remote, path.display());
                }),
            )?;
        }
        MenuChoice::DownloadMany => {
            let remotes =
                prompt.text("Enter the remote file paths to download (separated by comma)")?;
            let dir = prompt.text("Enter the local directory to save downloaded files")?;
            report(
                ops::download_many(session, &remotes, &ops::expand_home(&dir))
                    .map(|tally| print_tally("Downloaded", &tally)),
            )?;
        }
        MenuChoice::DeleteFile => {
            let remote = prompt.text("Enter the file name to delete from the device")?;
            report(ops::delete_file(session, prompt, &remote).map(|deleted| {
                if deleted {
                    println!("File '{remote}' deleted from the device.");
                } else {
                    println!("Deletion of '{remote}' canceled.");
                }
            }))?;
        }
        MenuChoice::DeleteByExtension => {
            let extension = prompt.text("Enter the file extension to delete (e.g., txt, py)")?;
            report(
                ops::delete_by_extension(session, prompt, &extension).map(|outcome| {
                    print_delete_outcome(&outcome, &format!("'{}'", extension.trim()))
                }),
            )?;
        }
        MenuChoice::DeleteEverything => {
            report(
                ops::delete_everything(session, prompt)
                    .map(|outcome| print_delete_outcome(&outcome, "all")),
            )?;
        }
        MenuChoice::Help => println!("{HELP}"),
        MenuChoice::Exit => return Ok(Flow::Exit),
        // handled by the loop, which owns the session
        MenuChoice::Rescan => {}
    }
    Ok(Flow::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ampy::{DeviceCommand, ToolOutcome};
    use crate::test_utils::{MockTool, ScriptedPorts, ScriptedPrompt};
    use std::time::Duration;

    fn quiet_settings() -> Settings {
        Settings {
            scan_delay: Duration::ZERO,
            clear_screen: false,
            ..Settings::default()
        }
    }

    #[test]
    fn test_parse_menu_choice() {
        assert_eq!("1".parse::<MenuChoice>(), Ok(MenuChoice::DisplayFile));
        assert_eq!(" 7 ".parse::<MenuChoice>(), Ok(MenuChoice::DeleteByExtension));
        assert_eq!("10".parse::<MenuChoice>(), Ok(MenuChoice::Exit));
        assert_eq!("HELP".parse::<MenuChoice>(), Ok(MenuChoice::Help));
        assert!("0".parse::<MenuChoice>().is_err());
        assert!("11".parse::<MenuChoice>().is_err());
        assert!("e".parse::<MenuChoice>().is_err());
        assert!("".parse::<MenuChoice>().is_err());
    }

    #[test]
    fn test_invalid_choice_message() {
        let err = "x".parse::<MenuChoice>().unwrap_err();
        assert!(err.to_string().contains("1 to 10"));
    }

    #[test]
    fn test_menu_exits_on_ten() {
        let tool = MockTool::new().with_listing(&["main.py"]);
        let ports = ScriptedPorts::new(vec![vec!["ttyUSB0"]]);
        let mut prompt = ScriptedPrompt::new(["10"]);

        run_menu(&quiet_settings(), &tool, &ports, &mut prompt).unwrap();

        // only the header listing ran
        assert_eq!(tool.calls(), vec![DeviceCommand::List]);
    }

    #[test]
    fn test_menu_survives_invalid_input_and_failures() {
        let tool = MockTool::new()
            .with_listing(&["a.txt", "b.py", "c.txt"])
            .on_get("/missing.py", ToolOutcome::failure("No such file"));
        let ports = ScriptedPorts::new(vec![vec!["ttyUSB0"]]);
        let mut prompt = ScriptedPrompt::new([
            "abc",
            "1",
            "/missing.py",
            "7",
            "txt",
            "y",
            "help",
            "10",
        ]);

        run_menu(&quiet_settings(), &tool, &ports, &mut prompt).unwrap();

        assert_eq!(tool.removes(), vec!["a.txt", "c.txt"]);
    }

    #[test]
    fn test_menu_rescan_switches_port() {
        let tool = MockTool::new();
        let ports = ScriptedPorts::new(vec![vec!["ttyUSB0"], vec!["ttyUSB0", "ttyUSB1"]]);
        let mut prompt = ScriptedPrompt::new(["9", "ttyUSB1", "10"]);

        run_menu(&quiet_settings(), &tool, &ports, &mut prompt).unwrap();
        assert_eq!(ports.scans(), 2);
    }

    #[test]
    fn test_menu_ends_when_input_closes() {
        let tool = MockTool::new();
        let ports = ScriptedPorts::new(vec![vec!["ttyUSB0"]]);
        let mut prompt = ScriptedPrompt::new(["6", "/main.py"]);

        assert!(run_menu(&quiet_settings(), &tool, &ports, &mut prompt).is_err());
        assert!(tool.removes().is_empty());
    }
}
