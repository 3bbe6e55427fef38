//! Client view state as a pure reducer: `(state, event) -> state`.
//!
//! Nothing here knows about terminals or widgets. The rendering layer feeds in
//! user-interaction and mirror-change events and projects the result.

use std::time::{Duration, Instant};

/// Inactivity after which new messages from others count as possibly missed.
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    /// The user scrolled away from the newest content.
    pub scrolled_up: bool,
    pub pending_unread_count: usize,
    /// Mirror index of the first message counted in `pending_unread_count`.
    pub pending_unread_start_index: Option<usize>,
    /// Message with an open action menu / in-progress reaction choice.
    pub selected_message_id: Option<u64>,
    pub connection_ok: bool,
    pub last_activity_time: Instant,
    pub idle_threshold: Duration,
    /// Whether the transition that produced this state should bring the newest
    /// content into view.
    pub autoscroll: bool,
}

/// Inputs to the reducer. Every user-interaction event carries its time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    /// Keystroke or pointer interaction; `at_bottom` is where the viewport is.
    Activity { at: Instant, at_bottom: bool },
    /// Manual scroll that ended `at_bottom` or not.
    Scrolled { at: Instant, at_bottom: bool },
    /// The mirror was replaced by a history replay.
    HistoryLoaded,
    /// A live message was appended to the mirror at `index`.
    MessageArrived {
        at: Instant,
        index: usize,
        from_self: bool,
    },
    /// A reaction changed an already rendered message.
    ReactionChanged,
    Select { at: Instant, message_id: u64 },
    Dismiss { at: Instant },
    ConnectionLost,
}

impl ViewState {
    pub fn new(idle_threshold: Duration, now: Instant) -> Self {
        Self {
            scrolled_up: false,
            pending_unread_count: 0,
            pending_unread_start_index: None,
            selected_message_id: None,
            connection_ok: true,
            last_activity_time: now,
            idle_threshold,
            autoscroll: true,
        }
    }

    pub fn is_idle(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_activity_time) >= self.idle_threshold
    }

    /// Autoscroll eligibility ignoring the idle rule, which only applies to new messages.
    pub fn follows_tail(&self) -> bool {
        !self.scrolled_up && self.selected_message_id.is_none()
    }

    /// Outgoing composition is disabled while disconnected (except reconnect).
    pub fn compose_enabled(&self) -> bool {
        self.connection_ok
    }

    pub fn apply(&mut self, event: ViewEvent) {
        *self = reduce(self, &event);
    }

    fn clear_unread(&mut self) {
        self.pending_unread_count = 0;
        self.pending_unread_start_index = None;
    }

    fn touch(&mut self, at: Instant, at_bottom: bool) {
        self.last_activity_time = at;
        if at_bottom {
            // back at the bottom with fresh input: nothing is pending any more
            self.scrolled_up = false;
            self.clear_unread();
        }
    }
}

pub fn reduce(state: &ViewState, event: &ViewEvent) -> ViewState {
    let mut next = state.clone();
    next.autoscroll = false;

    match *event {
        ViewEvent::Activity { at, at_bottom } => next.touch(at, at_bottom),

        ViewEvent::Scrolled { at, at_bottom } => {
            next.touch(at, at_bottom);
            next.scrolled_up = !at_bottom;
        }

        ViewEvent::HistoryLoaded => {
            next.clear_unread();
            next.selected_message_id = None;
            next.autoscroll = next.follows_tail();
        }

        ViewEvent::MessageArrived {
            at,
            index,
            from_self,
        } => {
            let idle = state.is_idle(at);
            if !from_self && (state.scrolled_up || idle) {
                next.pending_unread_count += 1;
                next.pending_unread_start_index.get_or_insert(index);
            }
            next.autoscroll = next.follows_tail() && (from_self || !idle);
        }

        ViewEvent::ReactionChanged => next.autoscroll = next.follows_tail(),

        ViewEvent::Select { at, message_id } => {
            next.last_activity_time = at;
            next.selected_message_id = match state.selected_message_id {
                // picking another message closes the open menu
                Some(current) if current != message_id => None,
                _ => Some(message_id),
            };
            next.autoscroll = next.follows_tail();
        }

        ViewEvent::Dismiss { at } => {
            next.last_activity_time = at;
            next.selected_message_id = None;
            next.autoscroll = next.follows_tail();
        }

        ViewEvent::ConnectionLost => next.connection_ok = false,
    }

    next
}
