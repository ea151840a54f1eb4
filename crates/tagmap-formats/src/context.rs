//! Per-decode options, observer and warning collection

use crate::error::DecodeWarning;
use crate::observer::DecodeObserver;
use crate::options::DecodeOptions;
use tracing::Level;

/// Shared state threaded through every decode stage
pub struct DecodeContext<'a> {
    options: &'a DecodeOptions,
    observer: &'a dyn DecodeObserver,
    warnings: Vec<DecodeWarning>,
    holding: bool,
    held: Vec<(String, String)>,
}

impl<'a> DecodeContext<'a> {
    /// Create a context for one decode
    pub fn new(options: &'a DecodeOptions, observer: &'a dyn DecodeObserver) -> Self {
        Self {
            options,
            observer,
            warnings: Vec::new(),
            holding: false,
            held: Vec::new(),
        }
    }

    /// Options in effect
    pub const fn options(&self) -> &DecodeOptions {
        self.options
    }

    /// Record a recoverable condition and forward it to the observer
    ///
    /// While warnings are held the observer sees the event at debug level;
    /// the warning level event follows on [`release_warnings`](Self::release_warnings).
    pub fn warn(&mut self, source: &str, warning: DecodeWarning) {
        let message = warning.to_string();
        if self.holding {
            self.observer
                .record(Level::DEBUG, &format!("pending: {message}"), Some(source));
            self.held.push((source.to_string(), message));
        } else {
            self.observer.record(Level::WARN, &message, Some(source));
        }
        self.warnings.push(warning);
    }

    /// Hold back warning level events for a pass that may be abandoned
    pub fn hold_warnings(&mut self) {
        self.holding = true;
    }

    /// Forward held warnings at warning level and stop holding
    pub fn release_warnings(&mut self) {
        self.holding = false;
        for (source, message) in self.held.drain(..) {
            self.observer.record(Level::WARN, &message, Some(&source));
        }
    }

    /// Forward a debug-level event
    pub fn debug(&self, source: &str, message: &str) {
        self.observer.record(Level::DEBUG, message, Some(source));
    }

    /// Forward an info-level event
    pub fn info(&self, source: &str, message: &str) {
        self.observer.record(Level::INFO, message, Some(source));
    }

    /// Warnings collected so far
    pub fn warnings(&self) -> &[DecodeWarning] {
        &self.warnings
    }

    /// Drop warnings collected by an abandoned pass
    ///
    /// Held warnings never reach the observer at warning level.
    pub fn discard_warnings(&mut self) {
        self.warnings.clear();
        self.held.clear();
        self.holding = false;
    }

    /// Take the collected warnings
    pub fn take_warnings(&mut self) -> Vec<DecodeWarning> {
        std::mem::take(&mut self.warnings)
    }
}

impl std::fmt::Debug for DecodeContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeContext")
            .field("options", &self.options)
            .field("warnings", &self.warnings)
            .field("holding", &self.holding)
            .finish_non_exhaustive()
    }
}
