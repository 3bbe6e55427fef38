use std::fmt::Write as _;

/// One line typed into the console, routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Anything that is not a slash command goes out as a chat message.
    Send(String),
    React { message_id: u64, emoji: String },
    Reply(u64),
    Select(u64),
    Dismiss,
    Reconnect,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    #[error("Usage: /react <message_id> <emoji>")]
    React,
    #[error("Usage: /reply <message_id>")]
    Reply,
    #[error("Usage: /select <message_id>")]
    Select,
    #[error("Unknown command {0} (try /react, /reply, /select, /dismiss, /reconnect, /quit)")]
    Unknown(String),
}

/// Route a console line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, UsageError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if !trimmed.starts_with('/') {
        return Ok(Some(Command::Send(line.trim_end().to_string())));
    }

    let mut parts = trimmed.splitn(3, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());
    let rest = parts.next().map(str::trim).filter(|r| !r.is_empty());

    let cmd = match name {
        "/react" => match (arg.and_then(|a| a.parse().ok()), rest) {
            (Some(message_id), Some(emoji)) => Command::React {
                message_id,
                emoji: emoji.to_string(),
            },
            _ => return Err(UsageError::React),
        },
        "/reply" => Command::Reply(message_id(arg, UsageError::Reply)?),
        "/select" => Command::Select(message_id(arg, UsageError::Select)?),
        "/dismiss" => Command::Dismiss,
        "/reconnect" => Command::Reconnect,
        "/quit" | "/exit" => Command::Quit,
        other => return Err(UsageError::Unknown(other.to_string())),
    };
    Ok(Some(cmd))
}

fn message_id(arg: Option<&str>, usage: UsageError) -> Result<u64, UsageError> {
    arg.and_then(|a| a.parse().ok()).ok_or(usage)
}

/// Text waiting to be prefixed to the next outgoing message.
#[derive(Debug, Default)]
pub struct ComposeBuffer {
    pending: String,
}

impl ComposeBuffer {
    /// Quote `body` as a reply to `author`. Purely local until the next send.
    pub fn insert_reply(&mut self, author: &str, body: &str) {
        let _ = writeln!(self.pending, "> {} wrote:", author);
        for line in body.lines() {
            self.pending.push_str("> ");
            self.pending.push_str(line);
            self.pending.push('\n');
        }
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Full outgoing text for `line`, draining whatever was quoted.
    pub fn take(&mut self, line: &str) -> String {
        let mut text = std::mem::take(&mut self.pending);
        text.push_str(line);
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_sent() {
        assert_eq!(
            parse_command("hello world  ").unwrap(),
            Some(Command::Send("hello world".into()))
        );
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[test]
    fn parses_react() {
        assert_eq!(
            parse_command("/react 12 👍").unwrap(),
            Some(Command::React {
                message_id: 12,
                emoji: "👍".into()
            })
        );
        assert_eq!(parse_command("/react 12"), Err(UsageError::React));
        assert_eq!(parse_command("/react twelve 👍"), Err(UsageError::React));
    }

    #[test]
    fn parses_menu_commands() {
        assert_eq!(parse_command("/reply 3").unwrap(), Some(Command::Reply(3)));
        assert_eq!(parse_command("/select 4").unwrap(), Some(Command::Select(4)));
        assert_eq!(parse_command("/dismiss").unwrap(), Some(Command::Dismiss));
        assert_eq!(parse_command("/reconnect").unwrap(), Some(Command::Reconnect));
        assert_eq!(parse_command("/quit").unwrap(), Some(Command::Quit));
        assert_eq!(parse_command("/reply"), Err(UsageError::Reply));
        assert_eq!(parse_command("/select -1"), Err(UsageError::Select));
        assert!(matches!(parse_command("/shrug"), Err(UsageError::Unknown(_))));
    }

    #[test]
    fn reply_quotes_into_next_send() {
        let mut buffer = ComposeBuffer::default();
        buffer.insert_reply("bob", "first\nsecond");
        assert_eq!(buffer.pending(), "> bob wrote:\n> first\n> second\n");

        assert_eq!(buffer.take("agreed"), "> bob wrote:\n> first\n> second\nagreed");
        assert!(buffer.is_empty());
        assert_eq!(buffer.take("next"), "next");
    }
}
