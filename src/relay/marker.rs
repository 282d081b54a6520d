//! Terminal-synchronization markers.
//!
//! A terminal multiplexer driving this process types
//! `echo '<ID>_START'`, then a command, then `echo '<ID>_END'` into stdin.
//! Because the relay owns stdin those echo lines never run, so the relay
//! reproduces them on stderr: `<ID>_START` when seen, `<ID>_END` once the
//! next command has produced its result.

const ECHO_PREFIX: &str = "echo '";
const START_SUFFIX: &str = "_START";
const END_SUFFIX: &str = "_END";

/// What a stdin line turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    /// Not a marker; process the line as a command.
    NotMarker,
    /// A start marker; echo this text to the diagnostic channel now.
    Started(String),
    /// An end marker, consumed without output.
    Ended,
}

/// Tracks the marker awaiting completion of the next command.
#[derive(Debug, Default)]
pub struct MarkerTracker {
    pending: Option<String>,
}

impl MarkerTracker {
    pub fn observe(&mut self, line: &str) -> Observed {
        let Some(content) = line
            .strip_prefix(ECHO_PREFIX)
            .and_then(|rest| rest.strip_suffix('\''))
        else {
            return Observed::NotMarker;
        };

        if let Some(id) = content.strip_suffix(START_SUFFIX).filter(|id| !id.is_empty()) {
            self.pending = Some(id.to_string());
            return Observed::Started(content.to_string());
        }

        if let Some(id) = content.strip_suffix(END_SUFFIX).filter(|id| !id.is_empty()) {
            // A matching end is emitted after the command completes; a stale one
            // (left over from before startup) is dropped.
            if self.pending.as_deref() != Some(id) {
                tracing::debug!(marker = %id, "Ignoring unmatched end marker");
            }
            return Observed::Ended;
        }

        Observed::NotMarker
    }

    /// Take the pending marker's end line, if any.
    pub fn complete(&mut self) -> Option<String> {
        self.pending.take().map(|id| format!("{id}{END_SUFFIX}"))
    }

    #[cfg(test)]
    fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_then_complete() {
        let mut tracker = MarkerTracker::default();
        assert_eq!(
            tracker.observe("echo '__CMD_1770870023391___START'"),
            Observed::Started("__CMD_1770870023391___START".to_string())
        );
        assert_eq!(tracker.pending(), Some("__CMD_1770870023391__"));
        assert_eq!(
            tracker.complete(),
            Some("__CMD_1770870023391___END".to_string())
        );
        assert_eq!(tracker.complete(), None);
    }

    #[test]
    fn end_lines_are_consumed() {
        let mut tracker = MarkerTracker::default();
        tracker.observe("echo 'A_START'");
        assert_eq!(tracker.observe("echo 'A_END'"), Observed::Ended);
        assert_eq!(tracker.pending(), Some("A"));

        assert_eq!(tracker.observe("echo 'B_END'"), Observed::Ended);
        assert_eq!(tracker.pending(), Some("A"));
    }

    #[test]
    fn other_lines_pass_through() {
        let mut tracker = MarkerTracker::default();
        assert_eq!(tracker.observe(r#"{"action":"status"}"#), Observed::NotMarker);
        assert_eq!(tracker.observe("echo 'hello'"), Observed::NotMarker);
        assert_eq!(tracker.observe("echo '_START'"), Observed::NotMarker);
        assert_eq!(tracker.observe("echo _START"), Observed::NotMarker);
        assert_eq!(tracker.pending(), None);
    }
}
