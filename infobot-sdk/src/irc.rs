//! Minimal IRC line parsing and serialization.
//!
//! Only what the bot needs: an optional prefix, the command (or numeric)
//! and its parameters. IRCv3 message tags are skipped on input.

use std::fmt;

/// A single parsed IRC protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Source of the message (`nick!user@host` or a server name).
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl Message {
    /// Parse a raw line. Trailing CR/LF is ignored.
    ///
    /// Returns `None` for empty lines and lines without a command.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        if let Some(tagged) = rest.strip_prefix('@') {
            let (_, after) = tagged.split_once(' ')?;
            rest = after.trim_start();
        }

        let prefix = match rest.strip_prefix(':') {
            Some(p) => {
                let (prefix, after) = p.split_once(' ')?;
                rest = after.trim_start();
                Some(prefix.to_string())
            }
            None => None,
        };

        let (command, mut rest) = match rest.split_once(' ') {
            Some((c, r)) => (c, r),
            None => (rest, ""),
        };
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            match rest.split_once(' ') {
                Some((param, after)) => {
                    params.push(param.to_string());
                    rest = after;
                }
                None => {
                    params.push(rest.to_string());
                    break;
                }
            }
        }

        Some(Self {
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    /// An outbound message without a prefix.
    pub fn new(command: &str, params: Vec<String>) -> Self {
        Self {
            prefix: None,
            command: command.to_string(),
            params,
        }
    }

    /// Nick portion of the prefix (`nick` from `nick!user@host`).
    pub fn source_nick(&self) -> Option<&str> {
        self.prefix.as_deref().and_then(|p| p.split('!').next())
    }

    /// Whether the prefix names a user rather than a server.
    pub fn from_user(&self) -> bool {
        self.prefix.as_deref().is_some_and(|p| p.contains('!'))
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref prefix) = self.prefix {
            write!(f, ":{prefix} ")?;
        }
        f.write_str(&self.command)?;
        let Some((last, init)) = self.params.split_last() else {
            return Ok(());
        };
        for param in init {
            write!(f, " {param}")?;
        }
        if last.is_empty() || last.contains(' ') || last.starts_with(':') {
            write!(f, " :{last}")
        } else {
            write!(f, " {last}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_privmsg_with_prefix() {
        let msg = Message::parse(":alice!a@host PRIVMSG #chan :!info foo bar\r\n").unwrap();
        assert_eq!(msg.prefix.as_deref(), Some("alice!a@host"));
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, vec!["#chan", "!info foo bar"]);
        assert_eq!(msg.source_nick(), Some("alice"));
        assert!(msg.from_user());
    }

    #[test]
    fn parses_numeric_and_skips_tags() {
        let msg = Message::parse("@time=2024-01-01T00:00:00Z :irc.example 433 * bot :Nickname is already in use").unwrap();
        assert_eq!(msg.command, "433");
        assert_eq!(msg.params, vec!["*", "bot", "Nickname is already in use"]);
        assert!(!msg.from_user());
    }

    #[test]
    fn parses_command_without_params() {
        let msg = Message::parse("PING").unwrap();
        assert_eq!(msg.command, "PING");
        assert!(msg.params.is_empty());
        assert!(Message::parse("").is_none());
        assert!(Message::parse(":prefix.only").is_none());
    }

    #[test]
    fn kick_params() {
        let msg = Message::parse(":op!o@h KICK #chan bot :go away").unwrap();
        assert_eq!(msg.params, vec!["#chan", "bot", "go away"]);
    }

    #[test]
    fn display_uses_trailing_when_needed() {
        let msg = Message {
            prefix: None,
            command: "PRIVMSG".to_string(),
            params: vec!["#chan".to_string(), "hello world".to_string()],
        };
        assert_eq!(msg.to_string(), "PRIVMSG #chan :hello world");

        let msg = Message {
            prefix: None,
            command: "JOIN".to_string(),
            params: vec!["#chan".to_string()],
        };
        assert_eq!(msg.to_string(), "JOIN #chan");
    }
}
