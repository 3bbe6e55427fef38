//! Line-oriented console front end: prints the transcript as it grows and
//! routes typed lines through the compose commands.

use std::time::Instant;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, info};

use cchat_crypto::CipherBundle;
use cchat_types::events::{ReactionAction, ServerEvent};

use crate::compose::{Command, ComposeBuffer, parse_command};
use crate::config::ClientConfig;
use crate::session::{Applied, ClientSession};
use crate::supervisor::ReconnectSupervisor;
use crate::transcript::{self, decrypt_body, render_message, status_line};
use crate::transport::{self, Connection, Inbound};
use crate::view::{ViewEvent, ViewState};

pub type Console = Lines<BufReader<Stdin>>;

pub fn console() -> Console {
    BufReader::new(tokio::io::stdin()).lines()
}

/// Ask for one line on the console. `None` on end of input.
pub async fn prompt(console: &mut Console, question: &str) -> Result<Option<String>> {
    print!("{}", question);
    std::io::Write::flush(&mut std::io::stdout())?;
    Ok(console.next_line().await?)
}

/// Who we are for the lifetime of the process. Survives reconnects.
pub struct Identity {
    pub user: String,
    pub cipher: CipherBundle,
}

enum Exit {
    Quit,
    Reconnect,
}

/// Drive sessions until the user quits. `console` is any line source; the
/// binary passes stdin.
pub async fn run<R>(config: ClientConfig, identity: Identity, mut console: Lines<R>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut first = true;

    loop {
        let exit = match transport::connect(&config).await {
            Ok(conn) => run_session(&config, &identity, conn, &mut console).await?,
            Err(e) if first => return Err(e),
            Err(e) => {
                println!("! {:#}", e);
                wait_offline(&mut console).await?
            }
        };
        first = false;

        match exit {
            Exit::Quit => return Ok(()),
            Exit::Reconnect => {
                info!("Restarting session against {}", config.server);
                println!("* reconnecting to {} ...", config.server);
            }
        }
    }
}

/// One connection from history replay until it is lost and abandoned, or the user quits.
async fn run_session<R>(
    config: &ClientConfig,
    identity: &Identity,
    mut conn: Connection,
    console: &mut Lines<R>,
) -> Result<Exit>
where
    R: AsyncBufRead + Unpin,
{
    let mut session = ClientSession::new(identity.user.clone(), identity.cipher.clone(), conn.outbound());
    let mut view = ViewState::new(config.idle_threshold, Instant::now());
    let mut supervisor = ReconnectSupervisor::new();
    let mut compose = ComposeBuffer::default();

    let exit = loop {
        tokio::select! {
            inbound = conn.recv(), if view.connection_ok => match inbound {
                Some(Inbound::Event(event)) => on_event(&mut session, &mut view, event),
                Some(Inbound::Closed(reason)) => on_lost(&mut view, &mut supervisor, reason),
                None => on_lost(&mut view, &mut supervisor, None),
            },
            line = console.next_line() => {
                let Some(line) = line? else {
                    break Exit::Quit;
                };
                view.apply(ViewEvent::Activity {
                    at: Instant::now(),
                    at_bottom: true,
                });
                if let Some(exit) = on_line(&line, &session, &mut view, &mut supervisor, &mut compose) {
                    break exit;
                }
            }
        }
    };

    conn.shutdown().await;
    Ok(exit)
}

/// Offline after a failed reconnect: only /reconnect and /quit do anything.
async fn wait_offline<R>(console: &mut Lines<R>) -> Result<Exit>
where
    R: AsyncBufRead + Unpin,
{
    let mut supervisor = ReconnectSupervisor::new();
    supervisor.on_disconnect();

    while let Some(line) = console.next_line().await? {
        match parse_command(&line) {
            Ok(Some(Command::Quit)) => return Ok(Exit::Quit),
            Ok(Some(Command::Reconnect)) if supervisor.request(false) => return Ok(Exit::Reconnect),
            Ok(_) => println!("! not connected, /reconnect or /quit"),
            Err(usage) => println!("! {}", usage),
        }
    }
    Ok(Exit::Quit)
}

fn on_event(session: &mut ClientSession, view: &mut ViewState, event: ServerEvent) {
    match session.apply(event) {
        Applied::Hello { message_count } => debug!("Server holds {} messages", message_count),
        Applied::History { len } => {
            view.apply(ViewEvent::HistoryLoaded);
            debug!("Replayed {} messages", len);
            print!("{}", transcript::render(session.mirror(), view, session.cipher()));
            println!("* {}", status_line(session.user(), view, session.connected_clients()));
        }
        Applied::Message { index, from_self } => {
            let had_marker = view.pending_unread_start_index.is_some();
            view.apply(ViewEvent::MessageArrived {
                at: Instant::now(),
                index,
                from_self,
            });
            if !had_marker && view.pending_unread_start_index.is_some() {
                println!("--- new ---");
            }
            if let Some(message) = session.mirror().messages().get(index) {
                let selected = view.selected_message_id == Some(message.id);
                println!("{}\n", render_message(message, session.cipher(), selected));
            }
        }
        Applied::Duplicate { .. } => {}
        Applied::Reaction {
            message_id,
            reaction,
            action,
            changed,
        } => {
            if changed {
                view.apply(ViewEvent::ReactionChanged);
                let verb = match action {
                    ReactionAction::Add => "reacted",
                    ReactionAction::Remove => "withdrew",
                };
                println!("* {} {} {} on [{}]", reaction.user, verb, reaction.emoji, message_id);
            }
        }
        Applied::Presence { .. } => {
            println!("* {}", status_line(session.user(), view, session.connected_clients()));
        }
    }
}

fn on_lost(view: &mut ViewState, supervisor: &mut ReconnectSupervisor, reason: Option<String>) {
    info!("Connection lost: {}", reason.as_deref().unwrap_or("closed"));
    view.apply(ViewEvent::ConnectionLost);
    supervisor.on_disconnect();
    match reason {
        Some(reason) => println!("! connection lost ({}), /reconnect to retry", reason),
        None => println!("! connection lost, /reconnect to retry"),
    }
}

fn on_line(
    line: &str,
    session: &ClientSession,
    view: &mut ViewState,
    supervisor: &mut ReconnectSupervisor,
    compose: &mut ComposeBuffer,
) -> Option<Exit> {
    let cmd = match parse_command(line) {
        Ok(Some(cmd)) => cmd,
        Ok(None) => return None,
        Err(usage) => {
            println!("! {}", usage);
            return None;
        }
    };

    let needs_connection = matches!(cmd, Command::Send(_) | Command::React { .. } | Command::Reply(_));
    if needs_connection && !view.compose_enabled() {
        println!("! not connected, /reconnect or /quit");
        return None;
    }

    match cmd {
        Command::Send(text) => {
            if let Err(e) = session.send_message(&compose.take(&text)) {
                println!("! {}", e);
            }
        }
        Command::React { message_id, emoji } => {
            if session.mirror().get(message_id).is_none() {
                println!("! no message [{}]", message_id);
            } else if let Err(e) = session.send_reaction(message_id, &emoji) {
                println!("! {}", e);
            }
        }
        Command::Reply(message_id) => match session.mirror().get(message_id) {
            Some(message) => {
                let body = decrypt_body(session.cipher(), &message.ciphertext);
                compose.insert_reply(&message.author, &body);
                print!("{}", compose.pending());
                println!("* replying to [{}], your next line is sent with the quote", message_id);
            }
            None => println!("! no message [{}]", message_id),
        },
        Command::Select(message_id) if session.mirror().get(message_id).is_none() => {
            println!("! no message [{}]", message_id);
        }
        Command::Select(message_id) => {
            view.apply(ViewEvent::Select {
                at: Instant::now(),
                message_id,
            });
            match view
                .selected_message_id
                .and_then(|id| session.mirror().get(id))
            {
                Some(message) => println!("{}\n", render_message(message, session.cipher(), true)),
                None => println!("* selection cleared"),
            }
        }
        Command::Dismiss => {
            view.apply(ViewEvent::Dismiss { at: Instant::now() });
            if !compose.is_empty() {
                compose.clear();
                println!("* reply discarded");
            }
        }
        Command::Reconnect => {
            if supervisor.request(view.connection_ok) {
                return Some(Exit::Reconnect);
            }
            if supervisor.attempted() {
                println!("! reconnect already attempted");
            } else {
                println!("* still connected");
            }
        }
        Command::Quit => return Some(Exit::Quit),
    }
    None
}
