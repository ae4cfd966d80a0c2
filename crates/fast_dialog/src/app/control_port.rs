use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

use tracing::{debug, info, warn};

const CONTROL_ENV_VAR: &str = "FAST_DIALOG_CONTROL";
const CONTROL_PORT_ENV_VAR: &str = "FAST_DIALOG_CONTROL_PORT";
pub(crate) const CONTROL_DEFAULT_PORT: u16 = 46011;
const MAX_PENDING_REPLY_BYTES_PER_CLIENT: usize = 256 * 1024;
const MAX_PENDING_EVENT_BYTES_PER_CLIENT: usize = 256 * 1024;
const REPLY_PREFIX: &str = "C ";
const EVENT_PREFIX: &str = "T ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ControlPortConfig {
    pub(crate) enabled: bool,
    pub(crate) port: u16,
}

impl ControlPortConfig {
    pub(crate) fn from_env() -> Self {
        Self::from_values(
            std::env::var(CONTROL_ENV_VAR).ok().as_deref(),
            std::env::var(CONTROL_PORT_ENV_VAR).ok().as_deref(),
        )
    }

    fn from_values(enabled: Option<&str>, port: Option<&str>) -> Self {
        let port = match port {
            Some(value) => match value.parse::<u16>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    warn!(
                        value,
                        fallback_port = CONTROL_DEFAULT_PORT,
                        "control_invalid_port_using_default"
                    );
                    CONTROL_DEFAULT_PORT
                }
            },
            None => CONTROL_DEFAULT_PORT,
        };
        Self {
            enabled: matches!(enabled, Some("1")),
            port,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutboundClass {
    Reply,
    Event,
}

#[derive(Debug)]
struct OutboundChunk {
    class: OutboundClass,
    bytes: Vec<u8>,
}

/// Per-client write queue. Replies and events each have their own byte cap;
/// pressure in one class evicts only that class, oldest first.
#[derive(Debug, Default)]
struct OutboundQueue {
    chunks: VecDeque<OutboundChunk>,
    /// Bytes of the front chunk already written.
    written: usize,
    reply_bytes: usize,
    event_bytes: usize,
}

impl OutboundQueue {
    fn push_reply(&mut self, line: &str) {
        self.push_reply_with_cap(line, MAX_PENDING_REPLY_BYTES_PER_CLIENT);
    }

    fn push_reply_with_cap(&mut self, line: &str, reply_cap: usize) {
        self.push(OutboundClass::Reply, line, reply_cap);
    }

    fn push_event(&mut self, line: &str, event_cap: usize) {
        self.push(OutboundClass::Event, line, event_cap);
    }

    fn push(&mut self, class: OutboundClass, line: &str, cap: usize) {
        let prefix = match class {
            OutboundClass::Reply => REPLY_PREFIX,
            OutboundClass::Event => EVENT_PREFIX,
        };
        let bytes = encode_tagged_line(prefix, line);
        if bytes.len() > cap {
            debug!(chunk_bytes = bytes.len(), cap, "control_drop_chunk_over_cap");
            return;
        }
        while *self.queued_bytes_mut(class) + bytes.len() > cap {
            if !self.evict_oldest(class) {
                debug!(
                    chunk_bytes = bytes.len(),
                    cap,
                    queue_len = self.chunks.len(),
                    "control_drop_chunk_no_evictable_entry"
                );
                return;
            }
        }
        *self.queued_bytes_mut(class) += bytes.len();
        self.chunks.push_back(OutboundChunk { class, bytes });
    }

    fn queued_bytes_mut(&mut self, class: OutboundClass) -> &mut usize {
        match class {
            OutboundClass::Reply => &mut self.reply_bytes,
            OutboundClass::Event => &mut self.event_bytes,
        }
    }

    fn evict_oldest(&mut self, class: OutboundClass) -> bool {
        // A partially written front chunk has to finish.
        let first_evictable = usize::from(self.written > 0);
        let Some(offset) = self
            .chunks
            .iter()
            .skip(first_evictable)
            .position(|chunk| chunk.class == class)
        else {
            return false;
        };
        if let Some(chunk) = self.chunks.remove(first_evictable + offset) {
            let queued = self.queued_bytes_mut(class);
            *queued = queued.saturating_sub(chunk.bytes.len());
        }
        true
    }

    fn flush<F>(&mut self, mut write_payload: F) -> io::Result<()>
    where
        F: FnMut(&[u8]) -> io::Result<usize>,
    {
        while let Some(front) = self.chunks.front() {
            match write_payload(&front.bytes[self.written..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "control_write_zero",
                    ));
                }
                Ok(bytes_written) => {
                    self.written += bytes_written;
                    if self.written >= front.bytes.len() {
                        let (class, len) = (front.class, front.bytes.len());
                        let queued = self.queued_bytes_mut(class);
                        *queued = queued.saturating_sub(len);
                        self.chunks.pop_front();
                        self.written = 0;
                    }
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
struct ClientConn {
    stream: TcpStream,
    read_buf: Vec<u8>,
    outbound: OutboundQueue,
}

#[derive(Debug)]
struct TcpControlTransport {
    listener: TcpListener,
    bound_port: u16,
    clients: Vec<ClientConn>,
}

impl TcpControlTransport {
    fn bind_localhost(port: u16) -> io::Result<Self> {
        let listener = TcpListener::bind(localhost_bind_addr(port))?;
        listener.set_nonblocking(true)?;
        let bound_port = listener.local_addr()?.port();
        Ok(Self {
            listener,
            bound_port,
            clients: Vec::new(),
        })
    }

    fn poll_lines(&mut self, out: &mut Vec<String>) {
        self.accept_pending_clients();
        self.read_client_lines(out);
        self.flush_all();
    }

    fn accept_pending_clients(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    if let Err(error) = stream.set_nonblocking(true) {
                        warn!(error = %error, "control_client_nonblocking_failed");
                        continue;
                    }
                    if let Err(error) = stream.set_nodelay(true) {
                        warn!(error = %error, "control_client_nodelay_failed");
                    }
                    let mut client = ClientConn {
                        stream,
                        read_buf: Vec::new(),
                        outbound: OutboundQueue::default(),
                    };
                    client.outbound.push_reply(&ready_line_text(self.bound_port));
                    info!(peer = %addr, "control_client_connected");
                    self.clients.push(client);
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => break,
                Err(error) => {
                    warn!(error = %error, "control_accept_failed");
                    break;
                }
            }
        }
    }

    fn read_client_lines(&mut self, out: &mut Vec<String>) {
        self.clients.retain_mut(|client| {
            let mut chunk = [0u8; 1024];
            loop {
                match client.stream.read(&mut chunk) {
                    Ok(0) => {
                        info!("control_client_disconnected");
                        return false;
                    }
                    Ok(bytes_read) => {
                        client.read_buf.extend_from_slice(&chunk[..bytes_read]);
                        drain_complete_lines(&mut client.read_buf, out);
                    }
                    Err(error) if error.kind() == io::ErrorKind::WouldBlock => return true,
                    Err(error) => {
                        warn!(error = %error, "control_client_read_failed");
                        return false;
                    }
                }
            }
        });
    }

    fn send_replies(&mut self, lines: &[String]) {
        for client in &mut self.clients {
            for line in lines {
                client.outbound.push_reply(line);
            }
        }
        self.flush_all();
    }

    fn send_event(&mut self, line: &str) {
        for client in &mut self.clients {
            client
                .outbound
                .push_event(line, MAX_PENDING_EVENT_BYTES_PER_CLIENT);
        }
        self.flush_all();
    }

    fn flush_all(&mut self) {
        self.clients.retain_mut(|client| {
            let stream = &mut client.stream;
            match client.outbound.flush(|payload| stream.write(payload)) {
                Ok(()) => true,
                Err(error) => {
                    warn!(error = %error, "control_client_write_failed");
                    false
                }
            }
        });
    }
}

#[derive(Debug)]
enum ControlPortMode {
    Disabled,
    Enabled(TcpControlTransport),
}

/// Localhost line protocol for driving the decision loop from outside.
#[derive(Debug)]
pub(crate) struct ControlPort {
    mode: ControlPortMode,
}

impl ControlPort {
    pub(crate) fn initialize(config: ControlPortConfig) -> Self {
        let mode = if config.enabled {
            match TcpControlTransport::bind_localhost(config.port) {
                Ok(transport) => {
                    info!(
                        line = %ready_line_text(transport.bound_port),
                        "control_ready_bound"
                    );
                    ControlPortMode::Enabled(transport)
                }
                Err(error) => {
                    warn!(error = %error, port = config.port, "control_bind_failed_disabled");
                    ControlPortMode::Disabled
                }
            }
        } else {
            ControlPortMode::Disabled
        };
        Self { mode }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        matches!(self.mode, ControlPortMode::Enabled(_))
    }

    pub(crate) fn poll_lines(&mut self, out: &mut Vec<String>) {
        if let ControlPortMode::Enabled(transport) = &mut self.mode {
            transport.poll_lines(out);
        }
    }

    pub(crate) fn send_replies(&mut self, lines: &[String]) {
        if let ControlPortMode::Enabled(transport) = &mut self.mode {
            transport.send_replies(lines);
        }
    }

    pub(crate) fn send_event(&mut self, line: &str) {
        if let ControlPortMode::Enabled(transport) = &mut self.mode {
            transport.send_event(line);
        }
    }
}

fn localhost_bind_addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

fn drain_complete_lines(buffer: &mut Vec<u8>, out: &mut Vec<String>) {
    while let Some(newline_index) = buffer.iter().position(|byte| *byte == b'\n') {
        let mut line_bytes = buffer.drain(..=newline_index).collect::<Vec<u8>>();
        line_bytes.pop();
        if line_bytes.last() == Some(&b'\r') {
            line_bytes.pop();
        }
        match String::from_utf8(line_bytes) {
            Ok(line) => out.push(line),
            Err(error) => warn!(error = %error, "control_invalid_utf8_line_dropped"),
        }
    }
}

fn encode_tagged_line(prefix: &str, line: &str) -> Vec<u8> {
    let mut payload = Vec::with_capacity(prefix.len() + line.len() + 1);
    payload.extend_from_slice(prefix.as_bytes());
    payload.extend_from_slice(line.as_bytes());
    payload.push(b'\n');
    payload
}

fn ready_line_text(port: u16) -> String {
    format!("fast_dialog.ready v1 port:{port}")
}
