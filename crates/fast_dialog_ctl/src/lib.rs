use std::fmt;
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_PORT: u16 = 46011;
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_RETRY_MS: u64 = 100;
pub const DEFAULT_QUIET_MS: u64 = 250;
const MAX_RETRY_BACKOFF_MS: u64 = 1_000;
const READY_PREFIX: &str = "fast_dialog.ready v1 port:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Reply,
    Event,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireLine {
    pub channel: Channel,
    pub payload: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    pub port: u16,
    pub timeout_ms: u64,
    pub retry_ms: u64,
    pub show_events: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry_ms: DEFAULT_RETRY_MS,
            show_events: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    WaitReady,
    Send { command: String },
    Script { path: String },
}

#[derive(Debug)]
pub enum CtlError {
    NotReady { port: u16 },
    Disconnected,
    ReadScript { path: String, source: io::Error },
    Socket { action: &'static str, source: io::Error },
}

impl fmt::Display for CtlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CtlError::NotReady { port } => {
                write!(f, "timed out waiting for fast_dialog on 127.0.0.1:{port}")
            }
            CtlError::Disconnected => f.write_str("fast_dialog closed the connection"),
            CtlError::ReadScript { path, source } => {
                write!(f, "failed to read script file '{path}': {source}")
            }
            CtlError::Socket { action, source } => write!(f, "failed to {action}: {source}"),
        }
    }
}

impl std::error::Error for CtlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CtlError::ReadScript { source, .. } | CtlError::Socket { source, .. } => Some(source),
            CtlError::NotReady { .. } | CtlError::Disconnected => None,
        }
    }
}

pub fn parse_wire_line(raw: &str) -> WireLine {
    let trimmed = raw.trim_end_matches(['\r', '\n']);
    let (channel, payload) = if let Some(payload) = trimmed.strip_prefix("C ") {
        (Channel::Reply, payload)
    } else if let Some(payload) = trimmed.strip_prefix("T ") {
        (Channel::Event, payload)
    } else {
        (Channel::Unknown, trimmed)
    };
    WireLine {
        channel,
        payload: payload.to_string(),
    }
}

pub fn is_ready_payload(payload: &str) -> bool {
    payload.starts_with(READY_PREFIX)
}

/// Non-empty lines that are not `#` comments.
pub fn parse_script_commands(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToString::to_string)
        .collect()
}

fn wants_line(line: &WireLine, show_events: bool) -> bool {
    match line.channel {
        Channel::Reply => true,
        Channel::Event => show_events,
        Channel::Unknown => false,
    }
}

pub fn run<W: Write>(
    request: Request,
    options: ClientOptions,
    out: &mut W,
) -> Result<(), CtlError> {
    let timeout = Duration::from_millis(options.timeout_ms);
    let quiet = Duration::from_millis(DEFAULT_QUIET_MS);
    let mut print = |line: &WireLine| {
        if wants_line(line, options.show_events) {
            let _ = writeln!(out, "{}", line.payload);
        }
    };
    let mut connection = Connection::open(options, &mut print)?;

    let commands = match request {
        Request::WaitReady => return Ok(()),
        Request::Send { command } => vec![command],
        Request::Script { path } => {
            let content = fs::read_to_string(&path)
                .map_err(|source| CtlError::ReadScript { path, source })?;
            parse_script_commands(&content)
        }
    };
    for command in commands {
        connection.send(&command)?;
        connection.read_until_quiet(timeout, quiet, &mut print)?;
    }
    Ok(())
}

enum Read {
    Line(String),
    Idle,
    Closed,
    Expired,
}

struct Connection {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
}

impl Connection {
    /// Connects with backoff until the ready line arrives or time runs out.
    fn open<F>(options: ClientOptions, on_line: &mut F) -> Result<Self, CtlError>
    where
        F: FnMut(&WireLine),
    {
        let deadline = Instant::now() + Duration::from_millis(options.timeout_ms);
        let retry_base_ms = options.retry_ms.max(1);
        let mut attempt = 0u32;

        while Instant::now() < deadline {
            if let Ok(writer) = TcpStream::connect(("127.0.0.1", options.port)) {
                let mut connection = Self::wrap(writer)?;
                if connection.wait_for_ready(deadline, &mut *on_line)? {
                    return Ok(connection);
                }
                if Instant::now() >= deadline {
                    break;
                }
            }

            let backoff_ms = retry_base_ms
                .saturating_mul(1u64 << attempt.min(8))
                .min(MAX_RETRY_BACKOFF_MS);
            let sleep_for = Duration::from_millis(backoff_ms);
            if Instant::now() + sleep_for >= deadline {
                break;
            }
            thread::sleep(sleep_for);
            attempt = attempt.saturating_add(1);
        }

        Err(CtlError::NotReady { port: options.port })
    }

    fn wrap(writer: TcpStream) -> Result<Self, CtlError> {
        writer
            .set_read_timeout(Some(Duration::from_millis(100)))
            .map_err(|source| CtlError::Socket {
                action: "set socket read timeout",
                source,
            })?;
        let reader = writer.try_clone().map_err(|source| CtlError::Socket {
            action: "clone socket stream",
            source,
        })?;
        Ok(Self {
            writer,
            reader: BufReader::new(reader),
        })
    }

    /// `false` if the server hung up or the deadline passed first.
    fn wait_for_ready<F>(&mut self, deadline: Instant, on_line: &mut F) -> Result<bool, CtlError>
    where
        F: FnMut(&WireLine),
    {
        loop {
            match self.read_line(deadline)? {
                Read::Line(raw) => {
                    let line = parse_wire_line(&raw);
                    on_line(&line);
                    if line.channel == Channel::Reply && is_ready_payload(&line.payload) {
                        return Ok(true);
                    }
                }
                Read::Idle => {}
                Read::Closed | Read::Expired => return Ok(false),
            }
        }
    }

    fn send(&mut self, command: &str) -> Result<(), CtlError> {
        let mut payload = Vec::with_capacity(command.len() + 1);
        payload.extend_from_slice(command.as_bytes());
        payload.push(b'\n');
        self.writer
            .write_all(&payload)
            .and_then(|()| self.writer.flush())
            .map_err(|source| CtlError::Socket {
                action: "send command",
                source,
            })
    }

    /// Collects replies until nothing arrives for `quiet`.
    fn read_until_quiet<F>(
        &mut self,
        timeout: Duration,
        quiet: Duration,
        on_line: &mut F,
    ) -> Result<(), CtlError>
    where
        F: FnMut(&WireLine),
    {
        let deadline = Instant::now() + timeout;
        let mut last_line_at: Option<Instant> = None;
        loop {
            match self.read_line(deadline)? {
                Read::Line(raw) => {
                    on_line(&parse_wire_line(&raw));
                    last_line_at = Some(Instant::now());
                }
                Read::Idle => {
                    let now = Instant::now();
                    let settled = match last_line_at {
                        Some(at) => now.saturating_duration_since(at) >= quiet,
                        None => now + quiet >= deadline,
                    };
                    if settled {
                        return Ok(());
                    }
                }
                Read::Closed => return Err(CtlError::Disconnected),
                Read::Expired => return Ok(()),
            }
        }
    }

    fn read_line(&mut self, deadline: Instant) -> Result<Read, CtlError> {
        if Instant::now() >= deadline {
            return Ok(Read::Expired);
        }
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => Ok(Read::Closed),
            Ok(_) => Ok(Read::Line(line)),
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                Ok(Read::Idle)
            }
            Err(source) => Err(CtlError::Socket {
                action: "read reply",
                source,
            }),
        }
    }
}
