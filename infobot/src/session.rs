//! Chat identity lifecycle and command dispatch.
//!
//! One [`SessionController`] lives for one server connection. It reacts to
//! transport events: identifies to services and joins channels on welcome,
//! ghosts a stale session holding our nick, rejoins after kicks, and
//! answers factoid commands in channels.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use infobot_sdk::client::ClientHandle;
use infobot_sdk::event::Event;
use rand::Rng;

use crate::command::{self, Command};
use crate::render;
use crate::store::FactoidStore;

/// Reply when a key has no values.
pub const NO_IDEA: &str = "Huh? No idea.";
/// Reply when a random lookup finds nothing.
pub const NO_RANDOM_INFO: &str = "Couldn't fetch info from database. Sorry.";
/// Quit message sent on shutdown.
pub const FAREWELL: &str = "I'll be back!";
/// Services nick that handles identify and ghost requests.
pub const NICK_SERVICE: &str = "nickserv";
/// Pause between successive lines of a multi-line reply.
pub const LINE_PACING: Duration = Duration::from_millis(250);

/// Identity and channels for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Desired nick.
    pub nick: String,
    /// Services password used for identify and ghost.
    pub password: String,
    /// Channels joined after welcome.
    pub channels: Vec<String>,
}

/// Where the session stands with the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    /// Connection is up, registration in flight.
    Connecting,
    /// Welcome received, identify not yet sent. Persists only when the
    /// identify request could not be handed to the transport.
    Unauthenticated,
    /// Identify sent. Confirmation is not awaited.
    Authenticated,
}

pub struct SessionController {
    handle: ClientHandle,
    store: Arc<FactoidStore>,
    config: SessionConfig,
    state: SessionState,
    current_nick: String,
    ghost_attempted: bool,
}

impl SessionController {
    pub fn new(handle: ClientHandle, store: Arc<FactoidStore>, config: SessionConfig) -> Self {
        let current_nick = config.nick.clone();
        Self {
            handle,
            store,
            config,
            state: SessionState::Disconnected,
            current_nick,
            ghost_attempted: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The nick the server currently knows us by.
    pub fn current_nick(&self) -> &str {
        &self.current_nick
    }

    /// React to one transport event.
    ///
    /// Store failures are returned as [`crate::store::StoreError`] inside
    /// the `anyhow::Error`; callers treat those as fatal.
    pub async fn handle_event(&mut self, event: &Event) -> Result<()> {
        match event {
            Event::Connected => {
                self.state = SessionState::Connecting;
            }
            Event::Registered { nick, welcome } => {
                self.on_welcome(nick, welcome).await?;
            }
            Event::NickInUse { nick } => {
                self.on_nick_in_use(nick).await?;
            }
            Event::NickChanged { old_nick, new_nick } => {
                if old_nick.eq_ignore_ascii_case(&self.current_nick) {
                    tracing::info!(nick = %new_nick, "Now known as {new_nick}");
                    self.current_nick = new_nick.clone();
                }
            }
            Event::Kicked {
                channel,
                nick,
                by,
                reason,
            } => {
                if nick.eq_ignore_ascii_case(&self.current_nick) {
                    tracing::info!(%channel, %by, "Kicked from {channel}, reason: {reason} Rejoining...");
                    self.handle.join(channel).await?;
                }
            }
            Event::Message { from, target, text } => {
                if from.eq_ignore_ascii_case(&self.current_nick) || !is_channel(target) {
                    return Ok(());
                }
                self.on_channel_message(from, target, text).await?;
            }
            Event::Notice { from, target, .. } => {
                // Notices never get replies, commands included.
                tracing::debug!(%from, %target, "Ignoring notice");
            }
            Event::Joined { channel, nick } => {
                if nick.eq_ignore_ascii_case(&self.current_nick) {
                    tracing::info!(%channel, "Joined {channel}");
                }
            }
            Event::ServerNotice { text } => {
                tracing::debug!(%text, "Server notice");
            }
            Event::Disconnected { reason } => {
                tracing::warn!(%reason, "Disconnected");
                self.state = SessionState::Disconnected;
            }
        }
        Ok(())
    }

    async fn on_welcome(&mut self, nick: &str, welcome: &str) -> Result<()> {
        tracing::info!("The server welcome string is: {}", welcome.trim());
        self.state = SessionState::Unauthenticated;
        self.current_nick = nick.to_string();

        self.identify().await?;

        for channel in &self.config.channels {
            tracing::info!(%channel, "Joining {channel}");
            self.handle.join(channel).await?;
        }
        Ok(())
    }

    async fn on_nick_in_use(&mut self, nick: &str) -> Result<()> {
        if !nick.eq_ignore_ascii_case(&self.config.nick) {
            // Our temporary nick collided; pick another and keep going.
            let temp = self.temporary_nick();
            tracing::info!(%nick, %temp, "Temporary nick {nick} is taken, trying {temp}");
            return self.handle.nick(&temp).await;
        }
        if self.ghost_attempted {
            tracing::warn!(%nick, "Nick {nick} is still in use after ghosting, keeping temporary nick");
            return Ok(());
        }
        self.ghost_attempted = true;

        tracing::info!(%nick, "Nick {nick} is already in use. Ghosting...");
        let temp = self.temporary_nick();
        self.handle.nick(&temp).await?;
        self.handle
            .privmsg(
                NICK_SERVICE,
                &format!("ghost {} {}", self.config.nick, self.config.password),
            )
            .await?;

        tracing::info!("Changing nick to {}", self.config.nick);
        self.handle.nick(&self.config.nick).await?;

        self.identify().await
    }

    async fn identify(&mut self) -> Result<()> {
        tracing::info!("Authenticating to services");
        self.handle
            .privmsg(NICK_SERVICE, &format!("identify {}", self.config.password))
            .await?;
        self.state = SessionState::Authenticated;
        Ok(())
    }

    fn temporary_nick(&self) -> String {
        let suffix: u16 = rand::thread_rng().gen_range(100..=999);
        format!("{}{suffix}", self.config.nick)
    }

    async fn on_channel_message(&self, user: &str, channel: &str, text: &str) -> Result<()> {
        match command::parse(text) {
            Ok(cmd) => self.dispatch(user, channel, cmd).await,
            Err(usage) => self.handle.privmsg(channel, &usage.to_string()).await,
        }
    }

    async fn dispatch(&self, user: &str, channel: &str, cmd: Command) -> Result<()> {
        match cmd {
            Command::InfoRandom => {
                tracing::info!(%user, %channel, "{user} requested a random info string");
                let reply = match self.store.lookup_random()? {
                    Some(factoid) => render::random_line(&factoid),
                    None => {
                        tracing::info!("Database returned no factoid");
                        NO_RANDOM_INFO.to_string()
                    }
                };
                self.handle.privmsg(channel, &reply).await
            }
            Command::InfoByKey(key) => {
                tracing::info!(%user, %channel, %key, "{user} requested all info strings for {key}");
                let factoids = self.store.lookup_by_key(&key)?;
                if factoids.is_empty() {
                    return self.handle.privmsg(channel, NO_IDEA).await;
                }
                for (i, line) in render::key_lines(&factoids).iter().enumerate() {
                    if i > 0 {
                        tokio::time::sleep(LINE_PACING).await;
                    }
                    self.handle.privmsg(channel, line).await?;
                }
                Ok(())
            }
            Command::Learn { key, text } => {
                tracing::info!(%user, %channel, "{user} wants to learn {key} = {text}");
                self.store.insert(&key, &text, user, channel)?;
                self.handle
                    .privmsg(channel, &format!("Okay, learned {key} = {text}"))
                    .await
            }
            Command::Forget { key, text } => {
                tracing::info!(%user, %channel, "{user} wants to forget {key} = {text}");
                let removed = self.store.delete_exact(&key, &text)?;
                tracing::debug!(removed, "Forgot {removed} rows");
                self.handle
                    .privmsg(channel, &format!("forgot {key} = {text}"))
                    .await
            }
            Command::ForgetAll(key) => {
                tracing::info!(%user, %channel, "{user} wants to forget everything we know about {key}");
                let removed = self.store.delete_all_for_key(&key)?;
                tracing::debug!(removed, "Forgot {removed} rows");
                self.handle
                    .privmsg(channel, &format!("forgot everything i knew about {key}"))
                    .await
            }
            Command::Unrecognized => Ok(()),
        }
    }
}

fn is_channel(target: &str) -> bool {
    target.starts_with('#') || target.starts_with('&')
}
