//! Reporting sink for status and progress text.
//!
//! The decoder and mapper never print directly; they talk to a [`Ui`] supplied by the
//! caller. [`NoopUi`] is used when nobody is listening.

/// Status/progress reporting capability.
pub trait Ui {
    /// Announce a step that is about to happen (e.g. the command being run).
    fn say(&self, text: &str);

    /// Report an informational result.
    fn message(&self, text: &str);

    /// Report a failure.
    fn error(&self, text: &str);

    /// Ask a question. `None` when no answer can be obtained.
    fn ask(&self, query: &str) -> Option<String>;
}

/// A sink that discards everything and cannot answer questions.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUi;

impl Ui for NoopUi {
    fn say(&self, _text: &str) {}

    fn message(&self, _text: &str) {}

    fn error(&self, _text: &str) {}

    fn ask(&self, _query: &str) -> Option<String> {
        None
    }
}

/// Forwards everything to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogUi;

impl Ui for LogUi {
    fn say(&self, text: &str) {
        log::info!("{}", text);
    }

    fn message(&self, text: &str) {
        log::info!("{}", text);
    }

    fn error(&self, text: &str) {
        log::error!("{}", text);
    }

    fn ask(&self, query: &str) -> Option<String> {
        log::warn!("no interactive ui available to answer: {}", query);
        None
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_ui_cannot_answer() {
        let ui = NoopUi;
        ui.say("ignored");
        ui.message("ignored");
        ui.error("ignored");
        assert_eq!(ui.ask("continue?"), None);
    }
}
