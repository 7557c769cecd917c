//! Channel command parsing.
//!
//! The first whitespace-delimited token is the verb (case-insensitive),
//! the remainder is its argument. `!learn` and `!forget` split their
//! argument on the first `=` only, so values may contain `=` themselves.

/// A recognized channel command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `!info`
    InfoRandom,
    /// `!info <key>`
    InfoByKey(String),
    /// `!learn <key> = <text>`
    Learn { key: String, text: String },
    /// `!forget <key> = <text>`
    Forget { key: String, text: String },
    /// `!forget <key>`
    ForgetAll(String),
    /// Anything else. Never answered.
    Unrecognized,
}

/// Malformed `!learn` / `!forget`. The message is the usage hint sent back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    #[error(r#"try: "!learn foo = bar""#)]
    Learn,
    #[error(r#"try: "!forget foo = bar" or "!forget foo""#)]
    Forget,
}

/// Parse a raw channel line.
pub fn parse(line: &str) -> Result<Command, UsageError> {
    let line = line.trim();
    let (verb, arg) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, Some(rest.trim()).filter(|r| !r.is_empty())),
        None => (line, None),
    };

    match verb.to_lowercase().as_str() {
        "!info" => Ok(match arg {
            Some(key) => Command::InfoByKey(key.to_string()),
            None => Command::InfoRandom,
        }),
        "!learn" => {
            let (key, text) = arg.and_then(split_pair).ok_or(UsageError::Learn)?;
            Ok(Command::Learn { key, text })
        }
        "!forget" => {
            let arg = arg.ok_or(UsageError::Forget)?;
            if arg.contains('=') {
                let (key, text) = split_pair(arg).ok_or(UsageError::Forget)?;
                Ok(Command::Forget { key, text })
            } else {
                Ok(Command::ForgetAll(arg.to_string()))
            }
        }
        _ => Ok(Command::Unrecognized),
    }
}

/// `key = text` with both sides trimmed and non-empty.
fn split_pair(arg: &str) -> Option<(String, String)> {
    let (key, text) = arg.split_once('=')?;
    let (key, text) = (key.trim(), text.trim());
    if key.is_empty() || text.is_empty() {
        return None;
    }
    Some((key.to_string(), text.to_string()))
}
