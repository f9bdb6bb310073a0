// src/lib.rs
//
// serialpipe: serial terminal core.
//
// Three cooperating pieces form the receive/transmit pipeline:
//   - a connection worker that owns the physical port on a blocking thread
//     and reports everything as PortEvents (io::serial::worker),
//   - a bounded ring buffer decoupling device-paced ingestion from
//     consumer-paced draining (ring_buffer),
//   - a transmit queue serializing outbound writes into one FIFO (transmit).
//
// The consumer side stays protocol-agnostic: drained chunks are raw bytes
// with arbitrary boundaries. Checksum helpers for protocol-aware decoders
// live in `checksums`.

mod logging;

pub mod checksums;
pub mod io;
pub mod ring_buffer;
pub mod transmit;

pub use io::{
    event_channel, list_serial_ports, EventReceiver, EventSender, FlowControl, Parity, PortEvent,
    PortWriter, SerialPortInfo, SerialSettings, SerialWorker,
};
pub use logging::{init_file_logging, stop_file_logging};
pub use ring_buffer::RingBuffer;
pub use transmit::TransmitQueue;
