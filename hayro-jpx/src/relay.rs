//! Routing of engine messages to the host.

use crate::engine::MessageHandler;
use crate::host::Diagnostics;
use core::cell::RefCell;
use log::trace;

/// Forwards engine warnings and errors to the host and drops informational chatter.
///
/// Messages are passed on verbatim and immediately; nothing is buffered or deduplicated.
pub(crate) struct Relay<'a, D: Diagnostics> {
    diagnostics: RefCell<&'a mut D>,
}

impl<'a, D: Diagnostics> Relay<'a, D> {
    pub(crate) fn new(diagnostics: &'a mut D) -> Self {
        Self {
            diagnostics: RefCell::new(diagnostics),
        }
    }
}

impl<D: Diagnostics> MessageHandler for Relay<'_, D> {
    fn on_info(&self, message: &str) {
        trace!("dropping engine info: {}", message.trim_end());
    }

    fn on_warning(&self, message: &str) {
        self.diagnostics.borrow_mut().warning(message);
    }

    fn on_error(&self, message: &str) {
        self.diagnostics.borrow_mut().store_error(message);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Records everything the host would see.
    #[derive(Debug, Default)]
    pub(crate) struct Recorder {
        pub(crate) warnings: Vec<String>,
        pub(crate) errors: Vec<String>,
    }

    impl Recorder {
        pub(crate) fn last_error(&self) -> Option<&str> {
            self.errors.last().map(String::as_str)
        }
    }

    impl Diagnostics for Recorder {
        fn warning(&mut self, message: &str) {
            self.warnings.push(message.to_string());
        }

        fn store_error(&mut self, message: &str) {
            self.errors.push(message.to_string());
        }
    }

    #[test]
    fn routes_by_severity() {
        let mut recorder = Recorder::default();

        {
            let relay = Relay::new(&mut recorder);
            let handler: &dyn MessageHandler = &relay;
            handler.on_info("Main header has been correctly decoded.\n");
            handler.on_warning("Unknown marker\n");
            handler.on_error("Stream too short\n");
            handler.on_error("Failed to decode tile 1/1\n");
        }

        assert_eq!(recorder.warnings, vec!["Unknown marker\n"]);
        assert_eq!(recorder.errors.len(), 2);
        assert_eq!(recorder.last_error(), Some("Failed to decode tile 1/1\n"));
    }
}
