//! Debounced autosave state machine.
//!
//! The machine is pure: the host feeds it edits and clock readings, and it
//! answers with save tickets. Network I/O happens elsewhere and reports back
//! through [`AutosaveMachine::complete`].
//!
//! ```text
//! Idle --edit--> Dirty --deadline, changed--> Saving --ok/err--> Idle
//!                  |                            |
//!                  +--deadline, unchanged--> Idle +--edited while saving--> Dirty
//! ```

use std::time::Duration;

use tracing::debug;
use web_time::Instant;

use crate::types::Snapshot;

/// Quiet period after the last edit before an autosave goes out.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutosaveState {
    /// Nothing to do.
    Idle,
    /// Edited since the last save; fires at `deadline` unless edited again.
    Dirty { deadline: Instant },
    /// A request is in flight. `next_deadline` is set when the document was
    /// edited after the request was sent.
    Saving { next_deadline: Option<Instant> },
}

/// Handed out when an autosave should be sent. Return it to
/// [`AutosaveMachine::complete`] with the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTicket {
    /// Edit generation the snapshot was taken at.
    pub generation: u64,
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone)]
pub struct AutosaveMachine {
    state: AutosaveState,
    debounce: Duration,
    generation: u64,
    saved: Snapshot,
    last_saved_at: Option<Instant>,
}

impl AutosaveMachine {
    /// Start idle, with `saved` as the last state the server acknowledged.
    pub fn new(saved: Snapshot) -> Self {
        Self::with_debounce(saved, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(saved: Snapshot, debounce: Duration) -> Self {
        Self {
            state: AutosaveState::Idle,
            debounce,
            generation: 0,
            saved,
            last_saved_at: None,
        }
    }

    pub fn state(&self) -> AutosaveState {
        self.state
    }

    pub fn is_saving(&self) -> bool {
        matches!(self.state, AutosaveState::Saving { .. })
    }

    /// Number of edits seen so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn saved_snapshot(&self) -> &Snapshot {
        &self.saved
    }

    pub fn last_saved_at(&self) -> Option<Instant> {
        self.last_saved_at
    }

    /// When the pending autosave is due, if one is pending.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            AutosaveState::Dirty { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Record an edit to title, body or slug. Restarts the debounce window.
    pub fn on_edit(&mut self, now: Instant) {
        self.generation += 1;
        let deadline = now + self.debounce;
        self.state = match self.state {
            AutosaveState::Idle | AutosaveState::Dirty { .. } => AutosaveState::Dirty { deadline },
            AutosaveState::Saving { .. } => AutosaveState::Saving {
                next_deadline: Some(deadline),
            },
        };
    }

    /// Check whether an autosave is due.
    ///
    /// Returns a ticket when the debounce has elapsed and `current` differs
    /// from the last acknowledged snapshot. Published posts are never
    /// autosaved.
    pub fn poll(&mut self, now: Instant, current: &Snapshot, published: bool) -> Option<SaveTicket> {
        let AutosaveState::Dirty { deadline } = self.state else {
            return None;
        };

        if published {
            debug!("autosave skipped: post is published");
            self.state = AutosaveState::Idle;
            return None;
        }

        if now < deadline {
            return None;
        }

        if *current == self.saved {
            debug!("autosave skipped: no changes since last save");
            self.state = AutosaveState::Idle;
            return None;
        }

        debug!(generation = self.generation, "autosave due");
        self.state = AutosaveState::Saving {
            next_deadline: None,
        };
        Some(SaveTicket {
            generation: self.generation,
            snapshot: current.clone(),
        })
    }

    /// Report how the request for `ticket` went.
    ///
    /// Success makes the ticket's snapshot the acknowledged one, even if a
    /// later save already landed. Failure leaves it alone; the next edit's
    /// debounce is the retry.
    pub fn complete(&mut self, ticket: SaveTicket, ok: bool, now: Instant) {
        if ok {
            self.saved = ticket.snapshot;
            self.last_saved_at = Some(now);
        }

        let edited_since = self.generation > ticket.generation;
        self.state = match self.state {
            AutosaveState::Saving { next_deadline } if edited_since => AutosaveState::Dirty {
                deadline: next_deadline.unwrap_or(now),
            },
            AutosaveState::Saving { .. } => AutosaveState::Idle,
            other => other,
        };
        debug!(ok, edited_since, state = ?self.state, "autosave completed");
    }

    /// An explicit save or publish succeeded outside the debounce timer.
    pub fn record_explicit_save(&mut self, snapshot: Snapshot, now: Instant) {
        self.saved = snapshot;
        self.last_saved_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(body: &str) -> Snapshot {
        Snapshot::new("title", body, "slug")
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_debounce_restarts_on_every_edit() {
        let t0 = Instant::now();
        let mut machine = AutosaveMachine::new(snap("a"));

        machine.on_edit(t0);
        machine.on_edit(t0 + ms(800));
        assert_eq!(machine.poll(t0 + ms(1000), &snap("ab"), false), None);
        assert_eq!(machine.deadline(), Some(t0 + ms(1800)));

        let ticket = machine.poll(t0 + ms(1800), &snap("ab"), false).unwrap();
        assert_eq!(ticket.generation, 2);
        assert_eq!(ticket.snapshot, snap("ab"));
        assert!(machine.is_saving());
    }

    #[test]
    fn test_unchanged_snapshot_issues_no_request() {
        let t0 = Instant::now();
        let mut machine = AutosaveMachine::new(snap("same"));

        // Typed then undid by hand: content matches what was saved.
        machine.on_edit(t0);
        assert_eq!(machine.poll(t0 + ms(1500), &snap("same"), false), None);
        assert_eq!(machine.state(), AutosaveState::Idle);
        assert_eq!(machine.last_saved_at(), None);
    }

    #[test]
    fn test_idle_never_fires() {
        let t0 = Instant::now();
        let mut machine = AutosaveMachine::new(snap("a"));
        assert_eq!(machine.poll(t0 + ms(5000), &snap("changed"), false), None);
    }

    #[test]
    fn test_success_updates_snapshot() {
        let t0 = Instant::now();
        let mut machine = AutosaveMachine::new(snap("a"));
        machine.on_edit(t0);
        let ticket = machine.poll(t0 + ms(1000), &snap("b"), false).unwrap();

        // Not optimistic: nothing changes until the server answers.
        assert_eq!(machine.saved_snapshot(), &snap("a"));

        machine.complete(ticket, true, t0 + ms(1200));
        assert_eq!(machine.saved_snapshot(), &snap("b"));
        assert_eq!(machine.last_saved_at(), Some(t0 + ms(1200)));
        assert_eq!(machine.state(), AutosaveState::Idle);
    }

    #[test]
    fn test_failure_keeps_snapshot_and_waits_for_next_edit() {
        let t0 = Instant::now();
        let mut machine = AutosaveMachine::new(snap("a"));
        machine.on_edit(t0);
        let ticket = machine.poll(t0 + ms(1000), &snap("b"), false).unwrap();

        machine.complete(ticket, false, t0 + ms(1100));
        assert_eq!(machine.saved_snapshot(), &snap("a"));
        assert_eq!(machine.last_saved_at(), None);
        assert_eq!(machine.state(), AutosaveState::Idle);

        machine.on_edit(t0 + ms(2000));
        assert!(machine.poll(t0 + ms(3000), &snap("bc"), false).is_some());
    }

    #[test]
    fn test_edit_during_save_goes_back_to_dirty() {
        let t0 = Instant::now();
        let mut machine = AutosaveMachine::new(snap("a"));
        machine.on_edit(t0);
        let ticket = machine.poll(t0 + ms(1000), &snap("b"), false).unwrap();

        machine.on_edit(t0 + ms(1050));
        assert_eq!(
            machine.state(),
            AutosaveState::Saving {
                next_deadline: Some(t0 + ms(2050))
            }
        );

        machine.complete(ticket, true, t0 + ms(1100));
        assert_eq!(machine.saved_snapshot(), &snap("b"));
        assert_eq!(
            machine.state(),
            AutosaveState::Dirty {
                deadline: t0 + ms(2050)
            }
        );

        let next = machine.poll(t0 + ms(2050), &snap("bc"), false).unwrap();
        assert_eq!(next.generation, 2);
    }

    #[test]
    fn test_published_posts_are_not_autosaved() {
        let t0 = Instant::now();
        let mut machine = AutosaveMachine::new(snap("a"));
        machine.on_edit(t0);
        assert_eq!(machine.poll(t0 + ms(1000), &snap("b"), true), None);
        assert_eq!(machine.state(), AutosaveState::Idle);
    }

    #[test]
    fn test_explicit_save_counts_as_acknowledged() {
        let t0 = Instant::now();
        let mut machine = AutosaveMachine::new(snap("a"));
        machine.on_edit(t0);
        machine.record_explicit_save(snap("b"), t0 + ms(100));

        assert_eq!(machine.poll(t0 + ms(1000), &snap("b"), false), None);
        assert_eq!(machine.last_saved_at(), Some(t0 + ms(100)));
    }
}
