extern crate libc;
extern crate serialport;

pub mod config;
pub mod discovery;
pub mod error;
mod ffi;
pub mod logger;
pub mod logging;
pub mod session;

pub use config::{Cli, LoggerConfig};
pub use discovery::{ConsoleSelector, PortDescriptor, PortFinder, PortSelector};
pub use error::{Error, Result};
pub use logger::{DataLogger, SerialConnector, SessionReport, StopReason};
