/// Gate for reconnect attempts: at most one per disconnection episode.
///
/// An episode starts when the connection is observed lost and ends when the
/// client restarts into a fresh session, which builds a new supervisor.
#[derive(Debug, Default)]
pub struct ReconnectSupervisor {
    disconnected: bool,
    attempted: bool,
}

impl ReconnectSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_disconnect(&mut self) {
        self.disconnected = true;
    }

    /// Returns true if the caller should restart now. Requests while still
    /// connected, or after this episode already fired, are ignored.
    pub fn request(&mut self, connection_ok: bool) -> bool {
        if connection_ok || !self.disconnected || self.attempted {
            return false;
        }
        self.attempted = true;
        true
    }

    pub fn attempted(&self) -> bool {
        self.attempted
    }
}
