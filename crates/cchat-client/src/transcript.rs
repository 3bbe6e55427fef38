//! Plain-text projection of the mirror, for the console front end.

use std::fmt::Write as _;

use chrono::{DateTime, NaiveDateTime};

use cchat_crypto::CipherBundle;
use cchat_types::models::{Message, Reaction, TIMESTAMP_FORMAT};

use crate::mirror::Mirror;
use crate::view::ViewState;

pub const DECRYPT_PLACEHOLDER: &str = "*** Unable to decrypt: check your password ***";

const DISPLAY_FORMAT: &str = "%-d %b %Y, %I:%M%p";

pub fn decrypt_body(cipher: &CipherBundle, ciphertext: &str) -> String {
    cipher
        .decrypt_text(ciphertext)
        .unwrap_or_else(|_| DECRYPT_PLACEHOLDER.to_string())
}

/// `2024-05-01T09:03:00+0200` -> `1 May 2024, 09:03AM`. Anything unparseable is
/// shown as received.
pub fn format_timestamp(timestamp: &str) -> String {
    if let Ok(parsed) = DateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT) {
        return parsed.format(DISPLAY_FORMAT).to_string();
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(timestamp) {
        return parsed.format(DISPLAY_FORMAT).to_string();
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f") {
        return parsed.format(DISPLAY_FORMAT).to_string();
    }
    timestamp.to_string()
}

/// `Reactions: 👍 x2 (alice, bob), 🎉 x1 (carol)`, grouped in first-seen order.
/// `None` when there is nothing to show.
pub fn format_reactions(reactions: &[Reaction]) -> Option<String> {
    if reactions.is_empty() {
        return None;
    }
    let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
    for reaction in reactions {
        match groups.iter_mut().find(|(emoji, _)| *emoji == reaction.emoji) {
            Some((_, users)) => users.push(reaction.user.as_str()),
            None => groups.push((reaction.emoji.as_str(), vec![reaction.user.as_str()])),
        }
    }
    let parts: Vec<String> = groups
        .iter()
        .map(|(emoji, users)| format!("{} x{} ({})", emoji, users.len(), users.join(", ")))
        .collect();
    Some(format!("Reactions: {}", parts.join(", ")))
}

pub fn render_message(message: &Message, cipher: &CipherBundle, selected: bool) -> String {
    let mut out = format!(
        "[{}] {} @ {}",
        message.id,
        message.author,
        format_timestamp(&message.timestamp)
    );
    if selected {
        out.push_str("  <selected>");
    }
    out.push('\n');
    out.push_str(&decrypt_body(cipher, &message.ciphertext));
    if let Some(summary) = format_reactions(&message.reactions) {
        out.push_str("\n  ");
        out.push_str(&summary);
    }
    out
}

/// The whole transcript, with the unread marker ahead of the first pending message.
pub fn render(mirror: &Mirror, view: &ViewState, cipher: &CipherBundle) -> String {
    let mut out = String::new();
    for (index, message) in mirror.messages().iter().enumerate() {
        if view.pending_unread_start_index == Some(index) {
            let _ = writeln!(out, "--- {} new ---", view.pending_unread_count);
        }
        let selected = view.selected_message_id == Some(message.id);
        out.push_str(&render_message(message, cipher, selected));
        out.push_str("\n\n");
    }
    out
}

pub fn status_line(user: &str, view: &ViewState, connected_clients: usize) -> String {
    let mut status = if view.connection_ok {
        format!("{} | {} online", user, connected_clients)
    } else {
        format!("{} | disconnected, /reconnect to retry", user)
    };
    if view.pending_unread_count > 0 {
        let _ = write!(status, " | {} new", view.pending_unread_count);
    }
    status
}
