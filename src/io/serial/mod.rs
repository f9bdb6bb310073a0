// src/io/serial/mod.rs
//
// Serial port driver.
// The worker owns the physical port handle on a dedicated blocking thread;
// everything else talks to it through queued commands and PortEvents.

pub mod utils;
pub mod worker;

pub use utils::{list_serial_ports, FlowControl, Parity, SerialPortInfo};
pub use worker::{PortWriter, SerialSettings, SerialWorker};
