use std::io::{BufRead, Write};

use serialport::{SerialPortInfo, SerialPortType, UsbPortInfo};
use tracing::{debug, info, warn};

/// Substrings that identify Arduino boards and the USB-serial bridges
/// commonly found on clones. Matched case-insensitively against the
/// combined port descriptor.
pub const ARDUINO_IDENTIFIERS: &[&str] = &["Arduino", "CH340", "CP210", "FT232", "2341:"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortDescriptor {
    pub device: String,
    pub description: String,
    pub hwid: String,
}

impl PortDescriptor {
    pub fn new(device: &str, description: &str, hwid: &str) -> PortDescriptor {
        PortDescriptor {
            device: device.to_string(),
            description: description.to_string(),
            hwid: hwid.to_string(),
        }
    }

    /// Device path, description and hardware ID joined into one upper-case
    /// string, which is what identifiers are matched against.
    pub fn search_text(&self) -> String {
        format!("{} {} {}", self.device, self.description, self.hwid).to_uppercase()
    }

    pub fn matches_any<S: AsRef<str>>(&self, identifiers: &[S]) -> bool {
        let text = self.search_text();
        identifiers
            .iter()
            .any(|identifier| text.contains(&identifier.as_ref().to_uppercase()))
    }
}

impl From<SerialPortInfo> for PortDescriptor {
    fn from(info: SerialPortInfo) -> PortDescriptor {
        let (description, hwid) = match info.port_type {
            SerialPortType::UsbPort(UsbPortInfo {
                vid,
                pid,
                serial_number,
                manufacturer,
                product,
                ..
            }) => {
                let description = product
                    .or(manufacturer)
                    .unwrap_or_else(|| "n/a".to_string());
                let mut hwid = format!("USB VID:PID={vid:04X}:{pid:04X}");
                if let Some(serial_number) = serial_number {
                    hwid.push_str(&format!(" SER={serial_number}"));
                }
                (description, hwid)
            }
            SerialPortType::PciPort => ("PCI".to_string(), "PCI".to_string()),
            SerialPortType::BluetoothPort => ("Bluetooth".to_string(), "BLUETOOTH".to_string()),
            SerialPortType::Unknown => ("n/a".to_string(), "n/a".to_string()),
        };
        PortDescriptor {
            device: info.port_name,
            description,
            hwid,
        }
    }
}

/// Lists the serial ports currently exposed by the OS.
pub fn available_ports() -> serialport::Result<Vec<PortDescriptor>> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(PortDescriptor::from)
        .collect())
}

/// Fallback used when no port could be recognised automatically.
pub trait PortSelector {
    /// Returns the index of the chosen port, or None if no valid choice was
    /// made.
    fn select(&mut self, ports: &[PortDescriptor]) -> Option<usize>;
}

/// Parses an operator's answer to the port prompt. Anything other than an
/// in-range index yields None.
pub fn parse_selection(input: &str, port_count: usize) -> Option<usize> {
    match input.trim().parse::<usize>() {
        Ok(index) if index < port_count => Some(index),
        _ => None,
    }
}

/// Lists ports on `output` and reads a single index from `input`. One bad
/// answer aborts the selection, there is no retry.
pub struct ConsoleSelector<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ConsoleSelector<R, W> {
    pub fn new(input: R, output: W) -> ConsoleSelector<R, W> {
        ConsoleSelector { input, output }
    }

    fn prompt(&mut self, ports: &[PortDescriptor]) -> std::io::Result<String> {
        writeln!(self.output, "Available ports:")?;
        for (i, port) in ports.iter().enumerate() {
            writeln!(self.output, "  {i}: {} - {}", port.device, port.description)?;
        }
        write!(self.output, "Enter port number: ")?;
        self.output.flush()?;

        let mut answer = String::new();
        self.input.read_line(&mut answer)?;
        Ok(answer)
    }
}

impl ConsoleSelector<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        ConsoleSelector::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> PortSelector for ConsoleSelector<R, W> {
    fn select(&mut self, ports: &[PortDescriptor]) -> Option<usize> {
        match self.prompt(ports) {
            Ok(answer) => parse_selection(&answer, ports.len()),
            Err(e) => {
                debug!("port prompt failed: {e}");
                None
            }
        }
    }
}

/// Selector that never chooses anything, for callers that cannot prompt.
pub struct NoSelection;

impl PortSelector for NoSelection {
    fn select(&mut self, _ports: &[PortDescriptor]) -> Option<usize> {
        None
    }
}

#[derive(Clone, Debug)]
pub struct PortFinder {
    identifiers: Vec<String>,
}

impl Default for PortFinder {
    fn default() -> Self {
        PortFinder {
            identifiers: ARDUINO_IDENTIFIERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl PortFinder {
    /// Adds an identifier on top of the built-in ones.
    pub fn with_identifier(mut self, identifier: &str) -> Self {
        self.identifiers.push(identifier.to_string());
        self
    }

    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    /// First port (in enumeration order) matching any identifier.
    pub fn auto_detect<'a>(&self, ports: &'a [PortDescriptor]) -> Option<&'a PortDescriptor> {
        ports.iter().find(|port| port.matches_any(&self.identifiers))
    }

    /// Picks a port from `ports`, falling back to `selector` when nothing is
    /// recognised. `selector` is not consulted when `ports` is empty.
    pub fn find(
        &self,
        ports: &[PortDescriptor],
        selector: &mut impl PortSelector,
    ) -> Option<String> {
        if ports.is_empty() {
            warn!("No serial ports found");
            return None;
        }

        if let Some(port) = self.auto_detect(ports) {
            info!("Found Arduino on {}", port.device);
            return Some(port.device.clone());
        }

        let index = selector.select(ports)?;
        ports.get(index).map(|port| port.device.clone())
    }

    /// Enumerates the system's ports and runs `find` over them.
    pub fn discover(&self, selector: &mut impl PortSelector) -> Option<String> {
        info!("Scanning for Arduino...");
        let ports = match available_ports() {
            Ok(ports) => ports,
            Err(e) => {
                warn!("Unable to enumerate serial ports: {e}");
                Vec::new()
            }
        };
        self.find(&ports, selector)
    }
}
