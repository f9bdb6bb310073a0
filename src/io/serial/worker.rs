// src/io/serial/worker.rs
//
// Serial connection worker.
// Sole owner of the physical port handle. Runs a blocking loop on the
// tokio blocking pool so slow or stalled I/O never touches the caller's
// thread; commands arrive over a bounded channel and every outcome is
// reported back as a PortEvent.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serialport::SerialPort;

use super::utils::{self, FlowControl, Parity};
use crate::io::{emit, EventSender, PortEvent};
use crate::logging::tlog;
use crate::ring_buffer::RingBuffer;

// ============================================================================
// Constants
// ============================================================================

/// RX ring buffer capacity.
pub const RX_BUFFER_CAPACITY: usize = 1024 * 1024;

/// Drain schedule: how often buffered bytes are re-emitted as chunks.
const PROCESS_INTERVAL: Duration = Duration::from_millis(10);
/// Largest chunk handed to the consumer in one notification.
const MAX_CHUNK_SIZE: usize = 4096;
/// Per-tick drain budget so a fast producer cannot starve the worker loop.
const MAX_DRAIN_PER_TICK: usize = 256 * 1024;

const WATCHDOG_INTERVAL: Duration = Duration::from_millis(500);
const WATCHDOG_SILENT: Duration = Duration::from_secs(5);

/// Delay before reconnecting after a transient device error.
const RECONNECT_DELAY: Duration = Duration::from_millis(500);

/// Short read timeout for byte-level timing resolution.
const READ_TIMEOUT: Duration = Duration::from_millis(1);
/// Pause after a reported (non-timeout) read error so a persistently
/// failing handle does not spin the loop.
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(50);
/// Command poll interval while no port is open.
const IDLE_POLL: Duration = Duration::from_millis(10);

const COMMAND_QUEUE_DEPTH: usize = 64;

// ============================================================================
// Types
// ============================================================================

/// Connection parameters supplied by the configuration layer.
/// Immutable once passed to `connect`; the worker retains the last-used
/// settings for error-driven restarts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default)]
    pub parity: Parity,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default)]
    pub flow_control: FlowControl,
    /// Initial DTR line state, applied right after open when set.
    #[serde(default)]
    pub dtr: Option<bool>,
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

/// Request queued onto the worker's execution context.
pub(crate) enum Command {
    Connect(SerialSettings),
    Disconnect,
    Write(Vec<u8>),
    SetDtr(bool),
}

/// Cloneable write-only handle to the worker, used by the transmit queue.
#[derive(Clone)]
pub struct PortWriter {
    command_tx: std_mpsc::SyncSender<Command>,
}

impl PortWriter {
    pub(crate) fn new(command_tx: std_mpsc::SyncSender<Command>) -> Self {
        Self { command_tx }
    }

    /// Queue one outbound write. Never blocks; fails when the command
    /// queue is full or the worker is gone.
    pub fn send(&self, data: Vec<u8>) -> Result<(), String> {
        self.command_tx
            .try_send(Command::Write(data))
            .map_err(|e| format!("Failed to queue write: {}", e))
    }
}

// ============================================================================
// Worker Handle
// ============================================================================

/// Caller-facing handle to the serial connection worker.
///
/// All methods queue an asynchronous request; results and data come back
/// on the `PortEvent` channel passed to [`SerialWorker::spawn`]. Must be
/// created inside a tokio runtime (the loop runs on the blocking pool).
pub struct SerialWorker {
    command_tx: std_mpsc::SyncSender<Command>,
    cancel_flag: Arc<AtomicBool>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl SerialWorker {
    /// Start the worker loop. The returned handle is the only way to reach
    /// the port; dropping every handle (and writer) also ends the loop.
    pub fn spawn(events: EventSender) -> Self {
        let (command_tx, command_rx) = std_mpsc::sync_channel::<Command>(COMMAND_QUEUE_DEPTH);
        let cancel_flag = Arc::new(AtomicBool::new(false));

        let flag = cancel_flag.clone();
        let task_handle = tokio::task::spawn_blocking(move || {
            run_worker(command_rx, events, flag);
        });

        Self {
            command_tx,
            cancel_flag,
            task_handle: Some(task_handle),
        }
    }

    /// Request a connection with the given settings. Reported back as
    /// `Opened`, or `Error` with the state remaining closed.
    pub fn connect(&self, settings: SerialSettings) -> Result<(), String> {
        self.queue(Command::Connect(settings))
    }

    /// Request a disconnect. Idempotent; safe to call when already closed.
    pub fn disconnect(&self) -> Result<(), String> {
        self.queue(Command::Disconnect)
    }

    /// Queue one outbound write. Dropped with an `Info` notification when
    /// the port is closed; queueing is the caller's responsibility (see
    /// `TransmitQueue`).
    pub fn send(&self, data: Vec<u8>) -> Result<(), String> {
        self.queue(Command::Write(data))
    }

    /// Change the DTR line state on the open port.
    pub fn set_dtr(&self, enabled: bool) -> Result<(), String> {
        self.queue(Command::SetDtr(enabled))
    }

    /// Write-only handle for the transmit queue.
    pub fn writer(&self) -> PortWriter {
        PortWriter::new(self.command_tx.clone())
    }

    /// Stop the worker loop and wait for it to finish. Closes the port and
    /// emits `Closed` if it was open.
    pub async fn stop(mut self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.task_handle.take() {
            let _ = handle.await;
        }
    }

    fn queue(&self, command: Command) -> Result<(), String> {
        self.command_tx
            .try_send(command)
            .map_err(|e| format!("Failed to queue command: {}", e))
    }
}

// ============================================================================
// Worker Loop
// ============================================================================

struct PendingReconnect {
    due: Instant,
    settings: SerialSettings,
    /// Generation at scheduling time; a manual connect/disconnect bumps the
    /// worker's generation and the stale reconnect is discarded when due.
    generation: u64,
}

struct WorkerState {
    port: Option<Box<dyn SerialPort>>,
    buffer: Arc<RingBuffer>,
    events: EventSender,
    last_settings: Option<SerialSettings>,
    pending_reconnect: Option<PendingReconnect>,
    generation: u64,
    last_active: Instant,
    seen_activity: bool,
    silence_logged: bool,
}

impl WorkerState {
    fn new(events: EventSender) -> Self {
        Self {
            port: None,
            buffer: Arc::new(RingBuffer::new(RX_BUFFER_CAPACITY)),
            events,
            last_settings: None,
            pending_reconnect: None,
            generation: 0,
            last_active: Instant::now(),
            seen_activity: false,
            silence_logged: false,
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect(settings) => {
                // A manual connect supersedes any scheduled reconnect.
                self.generation = self.generation.wrapping_add(1);
                self.pending_reconnect = None;
                self.start_port(settings);
            }
            Command::Disconnect => {
                self.generation = self.generation.wrapping_add(1);
                self.stop_port();
            }
            Command::Write(data) => self.write_to_port(&data),
            Command::SetDtr(enabled) => self.set_dtr(enabled),
        }
    }

    fn start_port(&mut self, settings: SerialSettings) {
        // Close any stale handle before reconfiguring.
        self.port = None;

        let opened = serialport::new(&settings.port, settings.baud_rate)
            .data_bits(utils::to_serialport_data_bits(settings.data_bits))
            .stop_bits(utils::to_serialport_stop_bits(settings.stop_bits))
            .parity(utils::to_serialport_parity(settings.parity))
            .flow_control(utils::to_serialport_flow_control(settings.flow_control))
            .timeout(READ_TIMEOUT)
            .open();

        let mut port = match opened {
            Ok(p) => p,
            Err(e) => {
                emit(
                    &self.events,
                    PortEvent::Error(format!("Failed to open {}: {}", settings.port, e)),
                );
                return;
            }
        };

        if let Some(dtr) = settings.dtr {
            if let Err(e) = port.write_data_terminal_ready(dtr) {
                emit(
                    &self.events,
                    PortEvent::Error(format!("Failed to set DTR on {}: {}", settings.port, e)),
                );
            }
        }

        tlog!(
            "[serial] Opened {} at {} baud ({}-{:?}-{})",
            settings.port,
            settings.baud_rate,
            settings.data_bits,
            settings.parity,
            settings.stop_bits
        );

        self.buffer.clear();
        self.last_settings = Some(settings);
        self.last_active = Instant::now();
        self.seen_activity = false;
        self.silence_logged = false;
        self.port = Some(port);
        emit(&self.events, PortEvent::Opened);
    }

    fn stop_port(&mut self) {
        self.pending_reconnect = None;
        self.buffer.clear();
        if self.port.take().is_some() {
            tlog!("[serial] Port closed");
        }
        emit(&self.events, PortEvent::Closed);
    }

    /// Close the port after a transient device error and schedule a delayed
    /// reconnect with the last good settings.
    fn schedule_restart(&mut self, reason: &str) {
        emit(&self.events, PortEvent::Error(reason.to_string()));

        let settings = match self.last_settings.clone() {
            Some(s) => s,
            None => {
                emit(
                    &self.events,
                    PortEvent::Error("No saved serial settings for restart".to_string()),
                );
                self.stop_port();
                return;
            }
        };

        self.stop_port();
        tlog!(
            "[serial] Scheduling reconnect to {} in {} ms",
            settings.port,
            RECONNECT_DELAY.as_millis()
        );
        self.pending_reconnect = Some(PendingReconnect {
            due: Instant::now() + RECONNECT_DELAY,
            settings,
            generation: self.generation,
        });
    }

    fn poll_reconnect(&mut self) {
        let pending = match self.pending_reconnect.take() {
            Some(p) if Instant::now() >= p.due => p,
            not_due => {
                self.pending_reconnect = not_due;
                return;
            }
        };
        if pending.generation != self.generation {
            tlog!(
                "[serial] Discarding stale reconnect to {}",
                pending.settings.port
            );
            return;
        }
        tlog!("[serial] Reconnecting to {}", pending.settings.port);
        self.start_port(pending.settings);
    }

    fn write_to_port(&mut self, data: &[u8]) {
        let port = match self.port.as_mut() {
            Some(p) => p,
            None => {
                emit(
                    &self.events,
                    PortEvent::Info("write skipped: serial port not open".to_string()),
                );
                return;
            }
        };

        match port.write_all(data).and_then(|_| port.flush()) {
            Ok(()) => self.mark_activity(),
            Err(e) => {
                // Report but keep the connection; state only changes on
                // device-level errors observed by the read path.
                tlog!(
                    "[serial] Write of {} bytes failed ({}…): {}",
                    data.len(),
                    hex::encode(&data[..data.len().min(8)]),
                    e
                );
                emit(
                    &self.events,
                    PortEvent::Error(format!("Failed to write data: {}", e)),
                );
            }
        }
    }

    fn set_dtr(&mut self, enabled: bool) {
        let port = match self.port.as_mut() {
            Some(p) => p,
            None => {
                emit(
                    &self.events,
                    PortEvent::Info("set_dtr skipped: serial port not open".to_string()),
                );
                return;
            }
        };
        if let Err(e) = port.write_data_terminal_ready(enabled) {
            emit(
                &self.events,
                PortEvent::Error(format!("Failed to set DTR: {}", e)),
            );
        }
    }

    /// One read pass: pull everything currently available into a single
    /// accumulation (arrival notifications coalesce), then one buffer write.
    fn read_incoming(&mut self, scratch: &mut [u8]) {
        enum Outcome {
            Idle,
            Data(Vec<u8>),
            Restart(String),
            Report(String),
        }

        let outcome = {
            let port = match self.port.as_mut() {
                Some(p) => p,
                None => return,
            };

            match port.read(scratch) {
                Ok(0) => Outcome::Restart("Serial device disconnected".to_string()),
                Ok(n) => {
                    let mut data = scratch[..n].to_vec();
                    while let Ok(available) = port.bytes_to_read() {
                        if available == 0 {
                            break;
                        }
                        let take = (available as usize).min(scratch.len());
                        match port.read(&mut scratch[..take]) {
                            Ok(0) => break,
                            Ok(m) => data.extend_from_slice(&scratch[..m]),
                            Err(_) => break,
                        }
                    }
                    Outcome::Data(data)
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => Outcome::Idle,
                Err(e) if is_disconnect_error(&e) => {
                    Outcome::Restart(format!("Serial resource error: {}", e))
                }
                Err(e) => Outcome::Report(format!("Serial port error: {}", e)),
            }
        };

        match outcome {
            Outcome::Idle => {}
            Outcome::Data(data) => {
                self.mark_activity();
                ingest(&self.buffer, &self.events, &data);
            }
            Outcome::Restart(reason) => self.schedule_restart(&reason),
            Outcome::Report(message) => {
                emit(&self.events, PortEvent::Error(message));
                std::thread::sleep(READ_ERROR_BACKOFF);
            }
        }
    }

    fn mark_activity(&mut self) {
        self.last_active = Instant::now();
        self.seen_activity = true;
        self.silence_logged = false;
    }

    /// Liveness check. Observational only: recovery stays on the
    /// error-driven restart path; silence alone never forces a reconnect.
    fn watchdog_tick(&mut self) {
        if self.port.is_none() {
            return;
        }
        if !self.seen_activity {
            // No traffic since open; stay idle instead of aggressive restart.
            return;
        }
        let silent = self.last_active.elapsed();
        if silent > WATCHDOG_SILENT && !self.silence_logged {
            tlog!("[serial] Link silent for {:.1}s", silent.as_secs_f64());
            self.silence_logged = true;
        }
    }
}

/// Push one accumulated burst into the ring buffer.
///
/// Overflow policy: discard the oldest `min(incoming, buffered)` bytes and
/// retry once; if the burst still does not fit it is dropped with a fatal
/// notification, but the connection stays open (lossy but alive).
pub(crate) fn ingest(buffer: &RingBuffer, events: &EventSender, data: &[u8]) {
    if buffer.write(data) {
        return;
    }

    let drop_len = data.len().min(buffer.len());
    if drop_len > 0 {
        buffer.skip(drop_len);
        emit(
            events,
            PortEvent::Error(format!("RX buffer overflow, dropped {} bytes", drop_len)),
        );
    }

    if !buffer.write(data) {
        tlog!(
            "[serial] RX buffer saturated, dropping {} incoming bytes ({}…)",
            data.len(),
            hex::encode(&data[..data.len().min(8)])
        );
        emit(
            events,
            PortEvent::Fatal("RX buffer saturated, incoming data lost".to_string()),
        );
    }
}

/// Drain buffered bytes as chunk notifications, stopping when the buffer is
/// empty or the per-tick budget is spent. Chunk boundaries are arbitrary.
pub(crate) fn drain_chunks(
    buffer: &RingBuffer,
    events: &EventSender,
    max_chunk: usize,
    budget: usize,
) -> usize {
    let mut drained = 0;
    loop {
        let available = buffer.len();
        if available == 0 {
            break;
        }
        let take = max_chunk.min(available);
        let chunk = match buffer.read(take) {
            Some(c) => c,
            None => break,
        };
        drained += chunk.len();
        emit(events, PortEvent::Chunk(chunk));
        if drained >= budget {
            break;
        }
    }
    drained
}

fn is_disconnect_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::NotConnected
            | std::io::ErrorKind::UnexpectedEof
    )
}

fn run_worker(
    command_rx: std_mpsc::Receiver<Command>,
    events: EventSender,
    cancel_flag: Arc<AtomicBool>,
) {
    let mut state = WorkerState::new(events);
    let mut scratch = [0u8; 4096];
    let mut next_drain = Instant::now() + PROCESS_INTERVAL;
    let mut next_watchdog = Instant::now() + WATCHDOG_INTERVAL;

    tlog!(
        "[serial] Worker started ({} KiB rx buffer)",
        RX_BUFFER_CAPACITY / 1024
    );

    'main: while !cancel_flag.load(Ordering::Relaxed) {
        while let Ok(command) = command_rx.try_recv() {
            state.handle_command(command);
        }

        state.poll_reconnect();

        if state.port.is_some() {
            // The 1 ms read timeout doubles as the loop's pacing while open.
            state.read_incoming(&mut scratch);
        } else {
            // Nothing to poll; wait for the next command instead of spinning.
            match command_rx.recv_timeout(IDLE_POLL) {
                Ok(command) => state.handle_command(command),
                Err(std_mpsc::RecvTimeoutError::Timeout) => {}
                Err(std_mpsc::RecvTimeoutError::Disconnected) => break 'main,
            }
        }

        let now = Instant::now();
        if now >= next_drain {
            drain_chunks(
                &state.buffer,
                &state.events,
                MAX_CHUNK_SIZE,
                MAX_DRAIN_PER_TICK,
            );
            next_drain = now + PROCESS_INTERVAL;
        }
        if now >= next_watchdog {
            state.watchdog_tick();
            next_watchdog = now + WATCHDOG_INTERVAL;
        }
    }

    if state.port.is_some() {
        state.stop_port();
    }
    tlog!("[serial] Worker stopped");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{event_channel, EventReceiver};

    fn collect_events(rx: &mut EventReceiver) -> Vec<PortEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn settings_for(port: &str) -> SerialSettings {
        SerialSettings {
            port: port.to_string(),
            baud_rate: 115_200,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            flow_control: FlowControl::None,
            dtr: None,
        }
    }

    #[test]
    fn test_ingest_overflow_drops_oldest_and_reports_count() {
        let (tx, mut rx) = event_channel();
        let buffer = RingBuffer::new(16);
        assert!(buffer.write(b"0123456789"));

        // 8 incoming bytes into 5 free: drop min(8, 10) = 8 oldest, retry.
        ingest(&buffer, &tx, b"ABCDEFGH");

        let events = collect_events(&mut rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            PortEvent::Error(msg) => assert!(msg.contains("dropped 8 bytes"), "{}", msg),
            other => panic!("expected overflow error, got {:?}", other),
        }
        assert_eq!(buffer.read(10).unwrap(), b"89ABCDEFGH");
    }

    #[test]
    fn test_ingest_saturation_is_fatal_but_connection_survives() {
        let (tx, mut rx) = event_channel();
        let buffer = RingBuffer::new(16);

        // Burst larger than total capacity: nothing buffered to discard,
        // exactly one fatal, zero chunks.
        ingest(&buffer, &tx, &[0xEE; 20]);

        let events = collect_events(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], PortEvent::Fatal(_)));
        assert!(buffer.is_empty());

        // The pipeline keeps working for the next, smaller burst.
        ingest(&buffer, &tx, b"ok");
        drain_chunks(&buffer, &tx, 4096, 256 * 1024);
        let events = collect_events(&mut rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            PortEvent::Chunk(chunk) => assert_eq!(chunk.as_slice(), b"ok"),
            other => panic!("expected chunk, got {:?}", other),
        }
    }

    #[test]
    fn test_drain_respects_chunk_size_and_budget() {
        let (tx, mut rx) = event_channel();
        let buffer = RingBuffer::new(4096);
        assert!(buffer.write(&[0x42; 1000]));

        let drained = drain_chunks(&buffer, &tx, 256, 512);
        assert_eq!(drained, 512);
        assert_eq!(buffer.len(), 488);

        let events = collect_events(&mut rx);
        assert_eq!(events.len(), 2);
        for event in &events {
            match event {
                PortEvent::Chunk(chunk) => assert_eq!(chunk.len(), 256),
                other => panic!("expected chunk, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_drain_preserves_byte_order() {
        let (tx, mut rx) = event_channel();
        let buffer = RingBuffer::new(64);
        let payload: Vec<u8> = (0u8..40).collect();
        assert!(buffer.write(&payload));

        drain_chunks(&buffer, &tx, 16, 256 * 1024);

        let mut replayed = Vec::new();
        for event in collect_events(&mut rx) {
            match event {
                PortEvent::Chunk(chunk) => replayed.extend_from_slice(&chunk),
                other => panic!("expected chunk, got {:?}", other),
            }
        }
        assert_eq!(replayed, payload);
    }

    #[test]
    fn test_stale_reconnect_is_discarded() {
        let (tx, mut rx) = event_channel();
        let mut state = WorkerState::new(tx);
        state.last_settings = Some(settings_for("/dev/serialpipe-test-none"));

        state.schedule_restart("Serial resource error: simulated");
        assert!(state.pending_reconnect.is_some());
        let events = collect_events(&mut rx);
        assert!(matches!(events[0], PortEvent::Error(_)));
        assert!(matches!(events[1], PortEvent::Closed));

        // A manual disconnect during the delay window cancels the reconnect.
        state.handle_command(Command::Disconnect);
        assert!(state.pending_reconnect.is_none());
        collect_events(&mut rx);

        // Even a pending entry with a stale generation is discarded when due.
        state.pending_reconnect = Some(PendingReconnect {
            due: Instant::now(),
            settings: settings_for("/dev/serialpipe-test-none"),
            generation: state.generation.wrapping_sub(1),
        });
        state.poll_reconnect();
        assert!(state.pending_reconnect.is_none());
        assert!(collect_events(&mut rx).is_empty());
    }

    #[test]
    fn test_pending_reconnect_waits_for_its_deadline() {
        let (tx, mut rx) = event_channel();
        let mut state = WorkerState::new(tx);
        state.pending_reconnect = Some(PendingReconnect {
            due: Instant::now() + Duration::from_secs(60),
            settings: settings_for("/dev/serialpipe-test-none"),
            generation: state.generation,
        });

        state.poll_reconnect();

        // Not due yet: the entry stays armed and nothing is attempted.
        assert!(state.pending_reconnect.is_some());
        assert!(collect_events(&mut rx).is_empty());
    }

    #[test]
    fn test_due_reconnect_attempts_open() {
        let (tx, mut rx) = event_channel();
        let mut state = WorkerState::new(tx);
        state.pending_reconnect = Some(PendingReconnect {
            due: Instant::now(),
            settings: settings_for("/dev/serialpipe-test-none"),
            generation: state.generation,
        });

        state.poll_reconnect();

        // The port does not exist, so the attempt surfaces as an error and
        // the state stays closed.
        let events = collect_events(&mut rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            PortEvent::Error(msg) => assert!(msg.contains("Failed to open"), "{}", msg),
            other => panic!("expected open failure, got {:?}", other),
        }
        assert!(state.port.is_none());
    }

    #[tokio::test]
    async fn test_connect_invalid_port_reports_error_and_stays_closed() {
        let (tx, mut rx) = event_channel();
        let worker = SerialWorker::spawn(tx);

        worker
            .connect(settings_for("/dev/serialpipe-does-not-exist"))
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no event within timeout")
            .expect("event channel closed");
        match event {
            PortEvent::Error(msg) => assert!(msg.contains("Failed to open"), "{}", msg),
            other => panic!("expected open failure, got {:?}", other),
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        for event in collect_events(&mut rx) {
            assert!(!matches!(event, PortEvent::Opened));
        }

        worker.stop().await;
    }

    #[tokio::test]
    async fn test_send_while_closed_is_informational() {
        let (tx, mut rx) = event_channel();
        let worker = SerialWorker::spawn(tx);

        worker.send(b"ping".to_vec()).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no event within timeout")
            .expect("event channel closed");
        match event {
            PortEvent::Info(msg) => assert!(msg.contains("skipped"), "{}", msg),
            other => panic!("expected info, got {:?}", other),
        }

        worker.stop().await;
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (tx, mut rx) = event_channel();
        let worker = SerialWorker::spawn(tx);

        worker.disconnect().unwrap();
        worker.disconnect().unwrap();

        for _ in 0..2 {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("no event within timeout")
                .expect("event channel closed");
            assert!(matches!(event, PortEvent::Closed));
        }

        worker.stop().await;
    }
}
