// Serial port discovery: list the host's serial ports, drop the reserved
// port and let the operator pick when more than one device is attached.
// Windows scrapes `mode`; other hosts ask the serialport crate.

use std::fmt;
#[cfg(windows)]
use std::process::Command;
use std::thread;
use std::time::Duration;

use crossterm::style::Stylize;
use serialport::{SerialPortInfo, SerialPortType};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::prompt::Prompt;
use crate::spinner::Spinner;

/// Platform token for a serial port: `3` for `COM3`, `ttyUSB0` for
/// `/dev/ttyUSB0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortId(String);

impl PortId {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The value passed to the device tool's `-p` option.
    pub fn device_path(&self) -> String {
        if cfg!(windows) {
            format!("COM{}", self.0)
        } else {
            format!("/dev/{}", self.0)
        }
    }

    fn matches(&self, answer: &str) -> bool {
        let answer = answer.trim_end_matches(':');
        answer == self.0 || answer.eq_ignore_ascii_case(&self.device_path())
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.device_path())
    }
}

/// Source of candidate ports.
pub trait PortLister {
    fn list_ports(&self) -> Result<Vec<PortId>>;
}

/// Lists the ports currently known to the host.
#[derive(Debug, Clone, Default)]
pub struct SystemPorts {
    reserved: Option<String>,
}

impl SystemPorts {
    pub fn new(reserved: Option<String>) -> Self {
        Self { reserved }
    }

    #[cfg(windows)]
    fn enumerate(&self) -> Result<Vec<PortId>> {
        let listing = run_listing("cmd", &["/C", "mode"])?;
        Ok(parse_mode_listing(&listing, self.reserved.as_deref()))
    }

    #[cfg(not(windows))]
    fn enumerate(&self) -> Result<Vec<PortId>> {
        let infos = serialport::available_ports().map_err(Error::SerialPorts)?;
        Ok(usb_ports(infos, self.reserved.as_deref()))
    }
}

impl PortLister for SystemPorts {
    fn list_ports(&self) -> Result<Vec<PortId>> {
        let ports = self.enumerate()?;
        debug!(count = ports.len(), "scanned serial ports");
        Ok(ports)
    }
}

#[cfg(windows)]
fn run_listing(program: &str, args: &[&str]) -> Result<String> {
    let command = format!("{} {}", program, args.join(" "));
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| Error::PortScan { command, source })?;
    // `mode` exits non-zero on some hosts while still printing the devices
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn push_unique(ports: &mut Vec<PortId>, token: &str, reserved: Option<&str>) {
    if token.is_empty() || Some(token) == reserved {
        return;
    }
    if !ports.iter().any(|p| p.as_str() == token) {
        ports.push(PortId::new(token));
    }
}

/// Parse the output of Windows' `mode` command, e.g.
/// `Status for device COM3:`.
pub fn parse_mode_listing(listing: &str, reserved: Option<&str>) -> Vec<PortId> {
    let mut ports = Vec::new();
    for line in listing.lines() {
        let Some(pos) = line.find("COM") else {
            continue;
        };
        let rest = &line[pos + 3..];
        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        push_unique(&mut ports, &rest[..end], reserved);
    }
    ports
}

/// Keep the USB serial adapters from serialport's listing. Tokens are the
/// names under `/dev`.
pub fn usb_ports(infos: Vec<SerialPortInfo>, reserved: Option<&str>) -> Vec<PortId> {
    let mut ports = Vec::new();
    for info in infos {
        if matches!(info.port_type, SerialPortType::UsbPort(_)) {
            let name = info.port_name.trim_start_matches("/dev/");
            push_unique(&mut ports, name, reserved);
        }
    }
    ports
}

/// Discovery pacing.
#[derive(Debug, Clone)]
pub struct ScanPolicy {
    pub retry_delay: Duration,
    /// Stop after this many empty scans; `None` keeps waiting.
    pub max_attempts: Option<u32>,
}

impl ScanPolicy {
    pub fn patient(retry_delay: Duration) -> Self {
        Self {
            retry_delay,
            max_attempts: None,
        }
    }
}

/// Operator's answer to the port selection prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortChoice {
    Port(PortId),
    Rescan,
    Cancel,
}

/// Interpret an answer against the listed ports.
///
/// A bare number is always a 1-based position in the printed list, never a
/// COM number. Ports can also be named (`COM3`, `/dev/ttyUSB0`, `ttyUSB0`).
pub fn parse_port_choice(answer: &str, ports: &[PortId]) -> Result<PortChoice> {
    let answer = answer.trim();
    match answer.to_ascii_lowercase().as_str() {
        "r" | "refresh" | "rescan" => return Ok(PortChoice::Rescan),
        "q" | "quit" => return Ok(PortChoice::Cancel),
        "" => return Err(Error::InvalidInput("no port given".into())),
        _ => {}
    }

    let chosen = if answer.bytes().all(|b| b.is_ascii_digit()) {
        answer
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| ports.get(i))
    } else {
        ports.iter().find(|p| p.matches(answer))
    };

    chosen
        .map(|port| PortChoice::Port(port.clone()))
        .ok_or_else(|| Error::InvalidInput(format!("'{answer}' is not an available port")))
}

/// Scan until at least one port shows up.
fn wait_for_ports(lister: &dyn PortLister, policy: &ScanPolicy) -> Result<Vec<PortId>> {
    let spinner = Spinner::start("Waiting for serial port...");
    let mut attempts = 0u32;
    loop {
        let ports = lister.list_ports()?;
        if !ports.is_empty() {
            return Ok(ports);
        }

        attempts += 1;
        if policy.max_attempts.is_some_and(|max| attempts >= max) {
            return Err(Error::NoPorts { attempts });
        }
        spinner.set_message(format!("Waiting for serial port... (scan {attempts})"));
        thread::sleep(policy.retry_delay);
    }
}

/// Find the port to work with.
///
/// A single candidate is taken without asking. Returns `Ok(None)` when the
/// operator cancels at the selection prompt.
pub fn discover_port(
    lister: &dyn PortLister,
    prompt: &mut dyn Prompt,
    policy: &ScanPolicy,
) -> Result<Option<PortId>> {
    loop {
        let mut ports = wait_for_ports(lister, policy)?;

        if ports.len() == 1 {
            let port = ports.remove(0);
            info!(port = %port, "selected the only available port");
            return Ok(Some(port));
        }

        loop {
            let listed: Vec<String> = ports
                .iter()
                .enumerate()
                .map(|(i, p)| format!("{}) {}", i + 1, p))
                .collect();
            println!("Available serial ports:\n{}", listed.join(", "));

            let answer = prompt.text("Type the list number or port name, 'r' to rescan or 'q' to quit")?;
            match parse_port_choice(&answer, &ports) {
                Ok(PortChoice::Port(port)) => {
                    println!("Selected port: {}", port.to_string().bold());
                    return Ok(Some(port));
                }
                Ok(PortChoice::Rescan) => break,
                Ok(PortChoice::Cancel) => return Ok(None),
                Err(err) => println!("{}", format!("{err}. Please try again.").red()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ScriptedPorts, ScriptedPrompt};

    const MODE_OUTPUT: &str = "\
Status for device COM1:
-----------------------
    Baud:            1200

Status for device COM3:
-----------------------
    Baud:            115200

Status for device COM12:
------------------------
Status for device CON:
----------------------
    Lines:          9001
";

    fn fast() -> ScanPolicy {
        ScanPolicy {
            retry_delay: Duration::ZERO,
            max_attempts: Some(3),
        }
    }

    fn ids(tokens: &[&str]) -> Vec<PortId> {
        tokens.iter().map(|t| PortId::new(*t)).collect()
    }

    #[test]
    fn test_mode_listing_excludes_reserved_port() {
        let ports = parse_mode_listing(MODE_OUTPUT, Some("1"));
        assert_eq!(ports, ids(&["3", "12"]));
    }

    #[test]
    fn test_mode_listing_without_reservation() {
        let ports = parse_mode_listing(MODE_OUTPUT, None);
        assert_eq!(ports, ids(&["1", "3", "12"]));
    }

    fn info(name: &str, port_type: SerialPortType) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            port_type,
        }
    }

    fn usb() -> SerialPortType {
        SerialPortType::UsbPort(serialport::UsbPortInfo {
            vid: 0x10c4,
            pid: 0xea60,
            serial_number: None,
            manufacturer: None,
            product: None,
        })
    }

    #[test]
    fn test_usb_ports_filters_and_excludes_reserved() {
        let infos = vec![
            info("/dev/ttyS0", SerialPortType::Unknown),
            info("/dev/ttyUSB0", usb()),
            info("/dev/ttyACM0", usb()),
            info("/dev/ttyUSB0", usb()),
            info("/dev/cu.usbserial-0001", usb()),
            info("/dev/ttyAMA0", SerialPortType::PciPort),
        ];
        let ports = usb_ports(infos, Some("ttyACM0"));
        assert_eq!(ports, ids(&["ttyUSB0", "cu.usbserial-0001"]));
    }

    #[test]
    fn test_parse_port_choice() {
        let ports = ids(&["3", "7"]);
        assert_eq!(
            parse_port_choice("2", &ports).unwrap(),
            PortChoice::Port(PortId::new("7"))
        );
        assert_eq!(
            parse_port_choice("1", &ports).unwrap(),
            PortChoice::Port(PortId::new("3"))
        );
        assert_eq!(parse_port_choice("r", &ports).unwrap(), PortChoice::Rescan);
        assert_eq!(parse_port_choice("Refresh", &ports).unwrap(), PortChoice::Rescan);
        assert_eq!(parse_port_choice("q", &ports).unwrap(), PortChoice::Cancel);
        assert!(parse_port_choice("9", &ports).is_err());
        assert!(parse_port_choice("0", &ports).is_err());
        assert!(parse_port_choice("", &ports).is_err());
        assert!(parse_port_choice("abc", &ports).is_err());
    }

    #[test]
    fn test_numbers_are_list_positions_not_port_numbers() {
        // shown as "1) COM2, 2) COM5"
        let ports = ids(&["2", "5"]);
        assert_eq!(
            parse_port_choice("2", &ports).unwrap(),
            PortChoice::Port(PortId::new("5"))
        );
        assert!(parse_port_choice("5", &ports).is_err());

        let named = ports[0].device_path();
        assert_eq!(
            parse_port_choice(&named, &ports).unwrap(),
            PortChoice::Port(PortId::new("2"))
        );
    }

    #[test]
    fn test_parse_port_choice_accepts_device_name() {
        let ports = ids(&["ttyUSB0", "ttyUSB1"]);
        let device = ports[1].device_path();
        assert_eq!(
            parse_port_choice(&device, &ports).unwrap(),
            PortChoice::Port(PortId::new("ttyUSB1"))
        );
    }

    #[test]
    fn test_single_port_selected_without_prompt() {
        let lister = ScriptedPorts::new(vec![vec!["5"]]);
        let mut prompt = ScriptedPrompt::new(Vec::<&str>::new());
        let port = discover_port(&lister, &mut prompt, &fast()).unwrap();
        assert_eq!(port, Some(PortId::new("5")));
        assert_eq!(prompt.asked(), 0);
    }

    #[test]
    fn test_waits_for_a_port_to_appear() {
        let lister = ScriptedPorts::new(vec![vec![], vec![], vec!["4"]]);
        let mut prompt = ScriptedPrompt::new(Vec::<&str>::new());
        let port = discover_port(&lister, &mut prompt, &fast()).unwrap();
        assert_eq!(port, Some(PortId::new("4")));
        assert_eq!(lister.scans(), 3);
    }

    #[test]
    fn test_gives_up_after_attempt_limit() {
        let lister = ScriptedPorts::new(vec![vec![]]);
        let mut prompt = ScriptedPrompt::new(Vec::<&str>::new());
        let err = discover_port(&lister, &mut prompt, &fast()).unwrap_err();
        assert!(matches!(err, Error::NoPorts { attempts: 3 }));
    }

    #[test]
    fn test_invalid_choice_reprompts_then_rescan() {
        let lister = ScriptedPorts::new(vec![vec!["3", "4"], vec!["3", "4", "6"]]);
        let mut prompt = ScriptedPrompt::new(["9", "r", "3"]);
        let port = discover_port(&lister, &mut prompt, &fast()).unwrap();
        assert_eq!(port, Some(PortId::new("6")));
        assert_eq!(lister.scans(), 2);
        assert_eq!(prompt.asked(), 3);
    }

    #[test]
    fn test_cancel_returns_none() {
        let lister = ScriptedPorts::new(vec![vec!["3", "4"]]);
        let mut prompt = ScriptedPrompt::new(["q"]);
        assert_eq!(discover_port(&lister, &mut prompt, &fast()).unwrap(), None);
    }
}
