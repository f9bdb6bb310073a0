// src/io/mod.rs
//
// IO layer for the serial pipeline.
// Defines the asynchronous notification surface between the connection
// worker and the consumer/configuration layers, and hosts the serial driver.

pub mod serial;

pub use serial::worker::{PortWriter, SerialSettings, SerialWorker};
pub use serial::utils::{list_serial_ports, FlowControl, Parity, SerialPortInfo};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

// ============================================================================
// Events
// ============================================================================

/// Asynchronous notification emitted by the connection worker.
///
/// All failures surface here; nothing is thrown across the execution
/// boundary and the worker never terminates its own thread on error.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "payload")]
pub enum PortEvent {
    /// A drained slice of buffered bytes, ready for the consumer to decode.
    /// Chunk boundaries are arbitrary — never message boundaries.
    Chunk(Vec<u8>),
    /// Recoverable error (open failure, write failure, overflow, ...).
    Error(String),
    /// Unrecoverable ingestion failure for one burst (buffer saturated).
    /// The connection itself stays open.
    Fatal(String),
    /// The port was opened successfully.
    Opened,
    /// The port was closed (explicit disconnect or terminal failure).
    Closed,
    /// Diagnostic, non-error notification (e.g. write skipped while closed).
    Info(String),
}

/// Sender half for worker notifications.
pub type EventSender = mpsc::UnboundedSender<PortEvent>;

/// Receiver half handed to the consumer layer.
pub type EventReceiver = mpsc::UnboundedReceiver<PortEvent>;

/// Create the notification channel connecting a worker to its consumer.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Emit an event, ignoring a closed channel (the consumer has gone away;
/// the worker keeps running until it is stopped explicitly).
pub(crate) fn emit(events: &EventSender, event: PortEvent) {
    let _ = events.send(event);
}
