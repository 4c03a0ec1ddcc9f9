use std::time::{Duration, Instant};

use time::OffsetDateTime;

use crate::config::AutoSaveConfig;

use super::Draft;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoSaveStatus {
    Disabled,
    Idle {
        last_saved_at: Option<OffsetDateTime>,
    },
    Pending {
        since: OffsetDateTime,
    },
    Saving,
    Error {
        message: String,
        occurred_at: OffsetDateTime,
    },
}

/// Debounce state for one editor: a single deadline re-armed on every edit,
/// the last snapshot known to be persisted, and whether a save is in flight.
#[derive(Debug)]
pub struct AutoSaveTimer {
    enabled: bool,
    debounce: Duration,
    deadline: Option<Instant>,
    dirty_since: Option<OffsetDateTime>,
    in_flight: bool,
    last_saved: Draft,
    last_saved_at: Option<OffsetDateTime>,
    last_error: Option<AutoSaveFailure>,
}

#[derive(Debug, Clone)]
struct AutoSaveFailure {
    message: String,
    occurred_at: OffsetDateTime,
}

impl AutoSaveTimer {
    pub fn new(config: &AutoSaveConfig, saved: Draft) -> Self {
        Self {
            enabled: config.enabled,
            debounce: config.debounce_duration(),
            deadline: None,
            dirty_since: None,
            in_flight: false,
            last_saved: saved,
            last_saved_at: None,
            last_error: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Restarts the quiet period from `now`.
    pub fn arm(&mut self, now: Instant) {
        if !self.enabled {
            return;
        }
        self.deadline = Some(now + self.debounce);
        if self.dirty_since.is_none() {
            self.dirty_since = Some(OffsetDateTime::now_utc());
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The deadline has passed and nothing is in flight. A due timer held back
    /// by an in-flight save fires on a later poll.
    pub fn is_due(&self, now: Instant) -> bool {
        !self.in_flight && self.deadline.is_some_and(|deadline| now >= deadline)
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn differs_from_saved(&self, draft: &Draft) -> bool {
        &self.last_saved != draft
    }

    pub(crate) fn begin(&mut self) {
        self.deadline = None;
        self.in_flight = true;
    }

    pub(crate) fn release(&mut self) {
        self.in_flight = false;
    }

    pub(crate) fn mark_saved(&mut self, snapshot: Draft, current: &Draft) {
        self.in_flight = false;
        self.last_saved = snapshot;
        self.last_saved_at = Some(OffsetDateTime::now_utc());
        self.last_error = None;
        if !self.differs_from_saved(current) {
            self.dirty_since = None;
        }
    }

    pub(crate) fn mark_failed(&mut self, message: String) {
        self.in_flight = false;
        self.last_error = Some(AutoSaveFailure {
            message,
            occurred_at: OffsetDateTime::now_utc(),
        });
    }

    pub fn status(&self, current: &Draft) -> AutoSaveStatus {
        if !self.enabled {
            return AutoSaveStatus::Disabled;
        }
        if self.in_flight {
            return AutoSaveStatus::Saving;
        }
        if let Some(failure) = &self.last_error {
            return AutoSaveStatus::Error {
                message: failure.message.clone(),
                occurred_at: failure.occurred_at,
            };
        }
        if self.differs_from_saved(current) {
            return AutoSaveStatus::Pending {
                since: self.dirty_since.unwrap_or_else(OffsetDateTime::now_utc),
            };
        }
        AutoSaveStatus::Idle {
            last_saved_at: self.last_saved_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn config(enabled: bool) -> AutoSaveConfig {
        AutoSaveConfig {
            enabled,
            debounce_ms: 2000,
            on_new_notes: false,
        }
    }

    #[test]
    fn rearming_pushes_the_deadline_back() {
        let mut timer = AutoSaveTimer::new(&config(true), Draft::default());
        let start = Instant::now();
        timer.arm(start);
        timer.arm(start + Duration::from_millis(1500));

        assert!(!timer.is_due(start + Duration::from_millis(2000)));
        assert!(timer.is_due(start + Duration::from_millis(3500)));
    }

    #[test]
    fn disabled_timer_never_arms() {
        let mut timer = AutoSaveTimer::new(&config(false), Draft::default());
        let start = Instant::now();
        timer.arm(start);
        assert_eq!(timer.deadline(), None);
        assert_matches!(timer.status(&Draft::default()), AutoSaveStatus::Disabled);
    }

    #[test]
    fn in_flight_save_holds_back_the_next_one() {
        let mut timer = AutoSaveTimer::new(&config(true), Draft::default());
        let start = Instant::now();
        timer.begin();
        timer.arm(start);
        let later = start + Duration::from_secs(5);
        assert!(!timer.is_due(later));
        assert_matches!(timer.status(&Draft::default()), AutoSaveStatus::Saving);

        timer.release();
        assert!(timer.is_due(later));
    }

    #[test]
    fn failure_is_reported_until_next_success() {
        let draft = Draft::new("t", "c");
        let mut timer = AutoSaveTimer::new(&config(true), Draft::default());
        timer.begin();
        timer.mark_failed("offline".into());
        assert_matches!(
            timer.status(&draft),
            AutoSaveStatus::Error { message, .. } if message == "offline"
        );

        timer.begin();
        timer.mark_saved(draft.clone(), &draft);
        assert_matches!(
            timer.status(&draft),
            AutoSaveStatus::Idle { last_saved_at: Some(_) }
        );
    }
}
