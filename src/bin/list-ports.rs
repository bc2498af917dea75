use std::process::ExitCode;

use gantry_logger::discovery::available_ports;
use gantry_logger::PortFinder;

fn main() -> ExitCode {
    eprintln!(
        "Gantry scan logger port lister (v{}). Ports marked * would be picked automatically.",
        env!("CARGO_PKG_VERSION")
    );

    let ports = match available_ports() {
        Ok(ports) => ports,
        Err(e) => {
            eprintln!("Unable to enumerate serial ports: {e}");
            return ExitCode::FAILURE;
        }
    };
    if ports.is_empty() {
        eprintln!("No serial ports found.");
        return ExitCode::SUCCESS;
    }

    let finder = PortFinder::default();
    let selected = finder.auto_detect(&ports);
    for (i, port) in ports.iter().enumerate() {
        let marker = if selected == Some(port) { '*' } else { ' ' };
        println!(
            "{marker} {i}: {} - {} [{}]",
            port.device, port.description, port.hwid
        );
    }
    ExitCode::SUCCESS
}
