//! Async IRC client.
//!
//! This is the main entry point for SDK consumers. It manages the TCP
//! connection, IRC registration and keepalive, and emits events.
//!
//! ## Reconnection
//!
//! The client task ends when the connection drops. Consumers implement their
//! own reconnect loop; [`ReconnectConfig::next_delay`] provides the
//! exponential backoff schedule.

use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::event::Event;
use crate::irc::Message;

/// Configuration for connecting to an IRC server.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Server address (host:port).
    pub server_addr: String,
    /// Desired nickname.
    pub nick: String,
    /// Username (ident).
    pub user: String,
    /// Real name.
    pub realname: String,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:6667".to_string(),
            nick: "infobot".to_string(),
            user: "infobot".to_string(),
            realname: "infobot".to_string(),
        }
    }
}

/// Commands the consumer can send to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join(String),
    Privmsg { target: String, text: String },
    Nick(String),
    Quit(Option<String>),
}

/// A handle to a running IRC client connection.
#[derive(Clone)]
pub struct ClientHandle {
    cmd_tx: mpsc::Sender<Command>,
}

impl ClientHandle {
    /// A handle that is not attached to any connection.
    ///
    /// Commands sent through it arrive on the returned receiver, which lets
    /// callers drive a bot without a server.
    pub fn detached(buffer: usize) -> (Self, mpsc::Receiver<Command>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(buffer);
        (Self { cmd_tx }, cmd_rx)
    }

    pub async fn join(&self, channel: &str) -> Result<()> {
        self.cmd_tx.send(Command::Join(channel.to_string())).await?;
        Ok(())
    }

    pub async fn privmsg(&self, target: &str, text: &str) -> Result<()> {
        self.cmd_tx
            .send(Command::Privmsg {
                target: target.to_string(),
                text: text.to_string(),
            })
            .await?;
        Ok(())
    }

    /// Request a nick change.
    pub async fn nick(&self, nick: &str) -> Result<()> {
        self.cmd_tx.send(Command::Nick(nick.to_string())).await?;
        Ok(())
    }

    pub async fn quit(&self, message: Option<&str>) -> Result<()> {
        self.cmd_tx
            .send(Command::Quit(message.map(|s| s.to_string())))
            .await?;
        Ok(())
    }
}

/// Open the TCP connection to the server.
///
/// Done before the event loop starts so that connection errors surface to
/// the caller directly.
pub async fn establish_connection(config: &ConnectConfig) -> Result<TcpStream> {
    tracing::debug!("Resolving {}...", config.server_addr);
    let tcp = TcpStream::connect(&config.server_addr)
        .await
        .map_err(|e| anyhow::anyhow!("TCP connect to {} failed: {e}", config.server_addr))?;
    tracing::debug!("TCP connected to {}", config.server_addr);
    Ok(tcp)
}

/// Connect using an already-established connection.
///
/// Returns a handle for sending commands and a receiver for events.
/// The IRC protocol runs in a spawned task.
pub fn connect_with_stream(
    conn: TcpStream,
    config: ConnectConfig,
) -> (ClientHandle, mpsc::Receiver<Event>) {
    let (reader, writer) = tokio::io::split(conn);
    spawn_session(BufReader::new(reader), writer, config)
}

/// Run the protocol over any byte stream pair.
pub fn spawn_session<R, W>(
    reader: R,
    writer: W,
    config: ConnectConfig,
) -> (ClientHandle, mpsc::Receiver<Event>)
where
    R: tokio::io::AsyncBufRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let (event_tx, event_rx) = mpsc::channel(4096);
    let (cmd_tx, cmd_rx) = mpsc::channel(256);

    let handle = ClientHandle { cmd_tx };

    tokio::spawn(async move {
        let _ = event_tx.send(Event::Connected).await;
        if let Err(e) = run_irc(reader, writer, &config, event_tx.clone(), cmd_rx).await {
            let _ = event_tx
                .send(Event::Disconnected {
                    reason: e.to_string(),
                })
                .await;
        }
    });

    (handle, event_rx)
}

async fn run_irc<R, W>(
    mut reader: R,
    mut writer: W,
    config: &ConnectConfig,
    event_tx: mpsc::Sender<Event>,
    mut cmd_rx: mpsc::Receiver<Command>,
) -> Result<()>
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    writer
        .write_all(format!("NICK {}\r\n", config.nick).as_bytes())
        .await?;
    writer
        .write_all(format!("USER {} 0 * :{}\r\n", config.user, config.realname).as_bytes())
        .await?;

    let mut registered = false;
    let mut pending_commands: Vec<Command> = Vec::new();
    let mut line_buf = String::new();
    let ping_interval = Duration::from_secs(60);
    let ping_timeout = Duration::from_secs(120);
    let mut last_activity = Instant::now();
    let mut next_ping = last_activity + ping_interval;

    loop {
        tokio::select! {
            result = reader.read_line(&mut line_buf) => {
                let n = result?;
                if n == 0 {
                    let _ = event_tx.send(Event::Disconnected { reason: "EOF".to_string() }).await;
                    break;
                }

                last_activity = Instant::now();
                next_ping = last_activity + ping_interval;
                tracing::trace!(line = %line_buf.trim_end(), "<-");

                if let Some(msg) = Message::parse(&line_buf) {
                    match msg.command.as_str() {
                        // RPL_WELCOME
                        "001" => {
                            registered = true;
                            let nick = msg.params.first().cloned().unwrap_or_else(|| config.nick.clone());
                            let welcome = msg.params.get(1).cloned().unwrap_or_default();
                            let _ = event_tx.send(Event::Registered { nick, welcome }).await;
                            for cmd in pending_commands.drain(..) {
                                execute_command(&mut writer, cmd).await?;
                            }
                        }
                        // ERR_NICKNAMEINUSE
                        "433" => {
                            let nick = msg.params.get(1).cloned().unwrap_or_else(|| config.nick.clone());
                            let _ = event_tx.send(Event::NickInUse { nick }).await;
                        }
                        "PING" => {
                            let token = msg.params.first().map(|s| s.as_str()).unwrap_or("");
                            writer.write_all(format!("PONG :{token}\r\n").as_bytes()).await?;
                        }
                        "JOIN" => {
                            if let (Some(nick), Some(channel)) = (msg.source_nick(), msg.params.first()) {
                                let _ = event_tx.send(Event::Joined {
                                    channel: channel.clone(),
                                    nick: nick.to_string(),
                                }).await;
                            }
                        }
                        "NICK" => {
                            if let (Some(old), Some(new)) = (msg.source_nick(), msg.params.first()) {
                                let _ = event_tx.send(Event::NickChanged {
                                    old_nick: old.to_string(),
                                    new_nick: new.clone(),
                                }).await;
                            }
                        }
                        "KICK" => {
                            if msg.params.len() >= 2 {
                                let by = msg.source_nick().unwrap_or("server").to_string();
                                let reason = msg.params.get(2).cloned().unwrap_or_default();
                                let _ = event_tx.send(Event::Kicked {
                                    channel: msg.params[0].clone(),
                                    nick: msg.params[1].clone(),
                                    by,
                                    reason,
                                }).await;
                            }
                        }
                        "PRIVMSG" | "NOTICE" => {
                            if msg.params.len() >= 2 {
                                let from = msg.source_nick().unwrap_or("").to_string();
                                let target = msg.params[0].clone();
                                let text = msg.params[1].clone();
                                let event = if msg.command == "PRIVMSG" {
                                    Event::Message { from, target, text }
                                } else if msg.from_user() {
                                    Event::Notice { from, target, text }
                                } else {
                                    Event::ServerNotice { text }
                                };
                                let _ = event_tx.send(event).await;
                            }
                        }
                        "ERROR" => {
                            let reason = msg.params.join(" ");
                            let _ = event_tx.send(Event::Disconnected { reason }).await;
                            break;
                        }
                        _ => {
                            // Error numerics become notices so the consumer can log them.
                            if let Ok(num) = msg.command.parse::<u16>() {
                                if (400..600).contains(&num) {
                                    let text = if msg.params.len() > 1 {
                                        msg.params[1..].join(" ")
                                    } else {
                                        msg.params.join(" ")
                                    };
                                    let _ = event_tx.send(Event::ServerNotice { text }).await;
                                }
                            }
                        }
                    }
                }

                line_buf.clear();
            }
            Some(cmd) = cmd_rx.recv() => {
                let early = pending_commands.is_empty()
                    && matches!(cmd, Command::Nick(_) | Command::Quit(_));
                if registered || early {
                    let quitting = matches!(cmd, Command::Quit(_));
                    execute_command(&mut writer, cmd).await?;
                    if quitting {
                        let _ = event_tx.send(Event::Disconnected { reason: "Quit".to_string() }).await;
                        break;
                    }
                } else {
                    // Queue until registered, preserving order.
                    pending_commands.push(cmd);
                }
            }
            _ = tokio::time::sleep_until(next_ping) => {
                if last_activity.elapsed() >= ping_timeout {
                    let _ = event_tx.send(Event::Disconnected { reason: "Ping timeout".to_string() }).await;
                    break;
                }
                writer.write_all(b"PING :keepalive\r\n").await?;
                next_ping = Instant::now() + ping_interval;
            }
        }
    }

    writer.flush().await?;
    Ok(())
}

/// Execute a single IRC command on the wire.
async fn execute_command<W: AsyncWrite + Unpin>(writer: &mut W, cmd: Command) -> Result<()> {
    let line = match cmd {
        Command::Join(channel) => Message::new("JOIN", vec![channel]),
        Command::Privmsg { target, text } => Message::new("PRIVMSG", vec![target, text]),
        Command::Nick(nick) => Message::new("NICK", vec![nick]),
        Command::Quit(Some(m)) => Message::new("QUIT", vec![m]),
        Command::Quit(None) => Message::new("QUIT", Vec::new()),
    };
    tracing::trace!(line = %line, "->");
    writer.write_all(format!("{line}\r\n").as_bytes()).await?;
    Ok(())
}

/// Reconnect schedule used after the connection drops.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Initial delay before first reconnect attempt.
    pub initial_delay: Duration,
    /// Maximum delay between reconnect attempts.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_factor: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Delay to wait after `current`, capped at `max_delay`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        let next = current.as_millis() as f64 * self.backoff_factor;
        Duration::from_millis(next as u64).min(self.max_delay)
    }
}
