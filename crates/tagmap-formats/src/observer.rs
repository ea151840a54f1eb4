//! Injected logging sink for decode events
//!
//! The decoders never write to a process-wide log. Callers pass a
//! [`DecodeObserver`]; the default forwards to `tracing`.

use tracing::Level;

/// Receives leveled decode events with an optional source tag
pub trait DecodeObserver {
    /// Record one event
    fn record(&self, level: Level, message: &str, source: Option<&str>);
}

/// Forwards events to the `tracing` dispatcher
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl DecodeObserver for TracingObserver {
    fn record(&self, level: Level, message: &str, source: Option<&str>) {
        let source = source.unwrap_or("");
        match level {
            Level::ERROR => tracing::error!(source, "{message}"),
            Level::WARN => tracing::warn!(source, "{message}"),
            Level::INFO => tracing::info!(source, "{message}"),
            Level::DEBUG => tracing::debug!(source, "{message}"),
            Level::TRACE => tracing::trace!(source, "{message}"),
        }
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl DecodeObserver for NullObserver {
    fn record(&self, _level: Level, _message: &str, _source: Option<&str>) {}
}

impl<T: DecodeObserver + ?Sized> DecodeObserver for &T {
    fn record(&self, level: Level, message: &str, source: Option<&str>) {
        (**self).record(level, message, source);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Observer that keeps every event for assertions
    #[derive(Debug, Default)]
    pub(crate) struct RecordingObserver {
        pub(crate) events: RefCell<Vec<(Level, String, Option<String>)>>,
    }

    impl RecordingObserver {
        pub(crate) fn count(&self, level: Level) -> usize {
            self.events.borrow().iter().filter(|(l, ..)| *l == level).count()
        }
    }

    impl DecodeObserver for RecordingObserver {
        fn record(&self, level: Level, message: &str, source: Option<&str>) {
            self.events
                .borrow_mut()
                .push((level, message.to_string(), source.map(str::to_string)));
        }
    }

    #[test]
    fn test_reference_forwards() {
        let observer = RecordingObserver::default();
        let by_ref = &observer;
        by_ref.record(Level::WARN, "lightmap missing", Some("bsp"));
        assert_eq!(observer.count(Level::WARN), 1);
        assert_eq!(observer.events.borrow()[0].2.as_deref(), Some("bsp"));
    }

    #[test]
    fn test_null_and_tracing_accept_events() {
        NullObserver.record(Level::ERROR, "ignored", None);
        TracingObserver.record(Level::DEBUG, "no subscriber installed", Some("header"));
    }
}
