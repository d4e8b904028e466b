use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use beacon_types::protocol::{Session, SessionAttributes, SessionStatus};
use beacon_types::random_uuid;

use crate::clientoptions::ClientOptions;
use crate::error::SdkError;

/// The slot a scope stores its active session in.
///
/// The slot is shared between a scope and the trackers handed out for it, so
/// session bookkeeping during event capture mutates the live session even
/// though the rest of the scope was snapshotted.
pub type SessionSlot = Arc<Mutex<Option<Session>>>;

/// The result of starting a session.
///
/// When a session was already running it is ended first and returned as
/// `previous`, so the caller can emit its final update.
#[derive(Debug, Clone)]
pub struct StartedSessions {
    /// The previously running session, ended with status `Exited`.
    pub previous: Option<Session>,
    /// A snapshot of the newly started session, with the `init` flag set.
    pub current: Session,
}

/// A change to apply to the active session in one atomic step.
#[derive(Debug, Default, Clone)]
pub struct SessionChange {
    /// The status to transition to, if any.
    ///
    /// Terminal statuses are never downgraded; a no-op transition does not
    /// count as a change.
    pub status: Option<SessionStatus>,
    /// Whether to increment the error counter.
    pub increment_errors: bool,
    /// A user agent to record on the session attributes.
    pub user_agent: Option<String>,
    /// The mechanism that moved the session into the `Abnormal` status.
    pub abnormal_mechanism: Option<String>,
}

impl SessionChange {
    /// A change recording one errored event, crashing the session if fatal.
    pub fn errored(fatal: bool) -> SessionChange {
        SessionChange {
            status: fatal.then_some(SessionStatus::Crashed),
            increment_errors: true,
            ..Default::default()
        }
    }
}

/// Manages the lifecycle of the session stored in one scope slot.
///
/// All transitions run under the slot's own lock, in a single critical
/// section per operation, so concurrent error counting and status changes
/// never interleave partially.
#[derive(Clone)]
pub struct SessionTracker {
    slot: SessionSlot,
    options: Arc<ClientOptions>,
}

impl SessionTracker {
    /// Creates a tracker operating on the given slot.
    pub fn new(slot: SessionSlot, options: Arc<ClientOptions>) -> SessionTracker {
        SessionTracker { slot, options }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the slot currently holds a session.
    pub fn has_active_session(&self) -> bool {
        self.lock().is_some()
    }

    /// Starts a new session, ending any session already running.
    ///
    /// Requires a configured release; without one this fails with
    /// [`SdkError::SessionWithoutRelease`] and the slot stays untouched.
    pub fn start_session(
        &self,
        distinct_id: Option<String>,
    ) -> Result<StartedSessions, SdkError> {
        let release = match &self.options.release {
            Some(release) => release.to_string(),
            None => return Err(SdkError::SessionWithoutRelease),
        };

        let now = self.options.time_provider.now();
        let mut guard = self.lock();
        let previous = guard.take().map(|mut session| {
            self.end_in_place(&mut session, now);
            session
        });
        let session = Session {
            session_id: random_uuid(),
            distinct_id,
            sequence: None,
            timestamp: None,
            started: now,
            init: true,
            duration: None,
            status: SessionStatus::Ok,
            errors: 0,
            abnormal_mechanism: None,
            attributes: SessionAttributes {
                release,
                environment: self.options.environment.as_ref().map(|e| e.to_string()),
                ..Default::default()
            },
        };
        *guard = Some(session.clone());
        Ok(StartedSessions {
            previous,
            current: session,
        })
    }

    /// Applies a change to the active session.
    ///
    /// Returns a snapshot only if the session actually changed; the snapshot
    /// still carries the `init` flag of the session before this update, while
    /// the stored session has it cleared from here on.
    pub fn update(&self, change: SessionChange) -> Option<Session> {
        let mut guard = self.lock();
        let session = guard.as_mut()?;

        let mut changed = false;
        if let Some(status) = change.status {
            if !session.is_terminated() && session.status != status {
                session.status = status;
                changed = true;
            }
        }
        if change.increment_errors {
            session.errors += 1;
            changed = true;
        }
        if let Some(user_agent) = change.user_agent {
            if session.attributes.user_agent.as_deref() != Some(user_agent.as_str()) {
                session.attributes.user_agent = Some(user_agent);
                changed = true;
            }
        }
        if let Some(mechanism) = change.abnormal_mechanism {
            if session.abnormal_mechanism.as_deref() != Some(mechanism.as_str()) {
                session.abnormal_mechanism = Some(mechanism);
                changed = true;
            }
        }

        if !changed {
            return None;
        }
        self.stamp(session);
        let snapshot = session.clone();
        session.init = false;
        Some(snapshot)
    }

    /// Ends the active session, emptying the slot.
    ///
    /// A session still in status `Ok` exits normally; `Crashed` and
    /// `Abnormal` are kept as they are. The final snapshot carries the
    /// session duration in seconds.
    pub fn end(&self, timestamp: Option<SystemTime>) -> Option<Session> {
        let at = timestamp.unwrap_or_else(|| self.options.time_provider.now());
        let mut session = self.lock().take()?;
        self.end_in_place(&mut session, at);
        Some(session)
    }

    fn end_in_place(&self, session: &mut Session, at: SystemTime) {
        if session.status == SessionStatus::Ok {
            session.status = SessionStatus::Exited;
        }
        session.duration = at
            .duration_since(session.started)
            .map(|d| d.as_secs_f64())
            .ok();
        let millis = self.options.time_provider.now_millis();
        session.timestamp = Some(at);
        session.sequence = Some(millis.unsigned_abs());
    }

    fn stamp(&self, session: &mut Session) {
        let millis = self.options.time_provider.now_millis();
        session.timestamp = Some(self.options.time_provider.now());
        session.sequence = Some(millis.unsigned_abs());
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::util::FixedClock;

    use super::*;

    fn tracker_with_release() -> SessionTracker {
        let options = ClientOptions {
            release: Some("app@1.0.0".into()),
            environment: Some("production".into()),
            time_provider: Arc::new(FixedClock::new(1_000_000)),
            ..Default::default()
        };
        SessionTracker::new(Default::default(), Arc::new(options))
    }

    #[test]
    fn start_requires_release() {
        let tracker = SessionTracker::new(Default::default(), Arc::new(ClientOptions::default()));
        assert!(matches!(
            tracker.start_session(None),
            Err(SdkError::SessionWithoutRelease)
        ));
        assert!(!tracker.has_active_session());
    }

    #[test]
    fn start_populates_identity_and_init() {
        let tracker = tracker_with_release();
        let started = tracker.start_session(Some("user-1".into())).unwrap();
        assert!(started.previous.is_none());
        let session = started.current;
        assert!(!session.session_id.is_nil());
        assert_eq!(session.distinct_id.as_deref(), Some("user-1"));
        assert!(session.init);
        assert_eq!(session.status, SessionStatus::Ok);
        assert_eq!(session.attributes.release, "app@1.0.0");
        assert_eq!(session.attributes.environment.as_deref(), Some("production"));
        assert!(tracker.has_active_session());
    }

    #[test]
    fn restart_ends_previous_as_exited() {
        let tracker = tracker_with_release();
        let first = tracker.start_session(None).unwrap();
        let second = tracker.start_session(None).unwrap();
        let previous = second.previous.unwrap();
        assert_eq!(previous.session_id, first.current.session_id);
        assert_eq!(previous.status, SessionStatus::Exited);
        assert!(previous.duration.is_some());
        assert_ne!(second.current.session_id, previous.session_id);
    }

    #[test]
    fn update_counts_errors_and_clears_init() {
        let tracker = tracker_with_release();
        tracker.start_session(None).unwrap();

        let first = tracker.update(SessionChange::errored(false)).unwrap();
        assert_eq!(first.errors, 1);
        assert!(first.init);

        let second = tracker.update(SessionChange::errored(false)).unwrap();
        assert_eq!(second.errors, 2);
        assert!(!second.init);
    }

    #[test]
    fn update_without_change_returns_none() {
        let tracker = tracker_with_release();
        tracker.start_session(None).unwrap();
        assert!(tracker.update(SessionChange::default()).is_none());
        // Transitioning to the current status is not a change either.
        let noop = SessionChange {
            status: Some(SessionStatus::Ok),
            ..Default::default()
        };
        assert!(tracker.update(noop).is_none());
    }

    #[test]
    fn terminal_status_is_never_downgraded() {
        let tracker = tracker_with_release();
        tracker.start_session(None).unwrap();
        tracker.update(SessionChange::errored(true)).unwrap();

        let downgrade = SessionChange {
            status: Some(SessionStatus::Ok),
            ..Default::default()
        };
        assert!(tracker.update(downgrade).is_none());

        let ended = tracker.end(None).unwrap();
        assert_eq!(ended.status, SessionStatus::Crashed);
    }

    #[test]
    fn end_stamps_duration_from_clock() {
        let clock = Arc::new(FixedClock::new(1_000_000));
        let options = ClientOptions {
            release: Some("app@1.0.0".into()),
            time_provider: clock.clone(),
            ..Default::default()
        };
        let tracker = SessionTracker::new(Default::default(), Arc::new(options));
        tracker.start_session(None).unwrap();
        clock.advance(Duration::from_secs(90));

        let ended = tracker.end(None).unwrap();
        assert_eq!(ended.status, SessionStatus::Exited);
        assert_eq!(ended.duration, Some(90.0));
        assert!(!tracker.has_active_session());
        assert!(tracker.end(None).is_none());
    }
}
