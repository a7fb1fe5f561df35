//! Application-level collaborators the command layer talks to.

/// The view the user is looking at.
pub trait Ui: Send + Sync {
    /// Schedule a redraw. Calling it repeatedly has no extra effect.
    fn refresh(&self);
}

/// Process lifecycle control.
pub trait Application: Send + Sync {
    /// Begin orderly shutdown.
    fn request_shutdown(&self);

    /// The server session is gone: forget stored credentials and shut down.
    fn end_session(&self) {
        self.request_shutdown();
    }
}
