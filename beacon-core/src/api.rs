use std::cell::RefCell;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use beacon_types::protocol::{Breadcrumb, Event, Level, SessionStatus};
use beacon_types::Uuid;

use crate::client::Client;
use crate::clientoptions::ClientOptions;
use crate::composer::{ScopeComposer, ScopeSelector};
use crate::hint::Hint;
use crate::scope::Scope;
use crate::session::SessionChange;

static PROCESS_COMPOSER: LazyLock<Arc<ScopeComposer>> =
    LazyLock::new(|| Arc::new(ScopeComposer::new(Arc::new(ClientOptions::default()))));

thread_local! {
    static CURRENT_COMPOSER: RefCell<Option<Arc<ScopeComposer>>> = const { RefCell::new(None) };
}

/// The composer of the current thread.
///
/// The first access on a thread forks the process composer, so the thread
/// starts out with the global tier shared and its own inner tiers.
pub fn current_composer() -> Arc<ScopeComposer> {
    CURRENT_COMPOSER.with(|cell| {
        let mut slot = cell.borrow_mut();
        slot.get_or_insert_with(|| Arc::new(PROCESS_COMPOSER.fork()))
            .clone()
    })
}

/// Runs a closure with the current thread's composer.
pub fn with_composer<R>(f: impl FnOnce(&ScopeComposer) -> R) -> R {
    f(&current_composer())
}

/// Makes the given composer current for the duration of the closure.
///
/// The previously current composer is restored afterwards, also when the
/// closure panics.
pub fn run_with<R>(composer: Arc<ScopeComposer>, f: impl FnOnce() -> R) -> R {
    let _guard = SwitchGuard::new(composer);
    f()
}

struct SwitchGuard {
    previous: Option<Arc<ScopeComposer>>,
}

impl SwitchGuard {
    fn new(composer: Arc<ScopeComposer>) -> SwitchGuard {
        let previous =
            CURRENT_COMPOSER.with(|cell| cell.borrow_mut().replace(composer));
        SwitchGuard { previous }
    }
}

impl Drop for SwitchGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        let _ = CURRENT_COMPOSER.try_with(|cell| {
            *cell.borrow_mut() = previous;
        });
    }
}

/// A guard that shuts the SDK down when dropped.
#[must_use = "dropping the guard immediately shuts the SDK down again"]
pub struct InitGuard(Arc<Client>);

impl InitGuard {
    /// Whether the initialized client can send anything.
    pub fn is_enabled(&self) -> bool {
        self.0.is_enabled()
    }
}

impl Drop for InitGuard {
    fn drop(&mut self) {
        if self.0.options().auto_session_tracking {
            end_session();
        }
        self.0.close(None);
    }
}

/// Initializes the SDK for the whole process.
///
/// All three tiers of the process composer are rebuilt from the given
/// options and the client is bound to the global tier, so every composer
/// forked afterwards resolves it.
pub fn init(options: ClientOptions) -> InitGuard {
    let options = Arc::new(options);
    let client = Arc::new(Client::with_shared_options(options.clone()));

    for selector in [
        ScopeSelector::Global,
        ScopeSelector::Isolation,
        ScopeSelector::Current,
    ] {
        PROCESS_COMPOSER.configure_scope(Some(selector), |scope| {
            *scope = Scope::new(options.clone());
        });
    }
    PROCESS_COMPOSER.bind_client(Some(client.clone()), Some(ScopeSelector::Global));
    sdk_debug!("initialized client (enabled: {})", client.is_enabled());

    if options.auto_session_tracking {
        start_session();
    }
    InitGuard(client)
}

/// Captures an error event on the current composer.
pub fn capture_event(event: Event) -> Uuid {
    with_composer(|composer| composer.capture_event(event, &Hint::new()))
}

/// Captures a message as an event of the given level.
pub fn capture_message(message: &str, level: Level) -> Uuid {
    with_composer(|composer| composer.capture_message(message, level))
}

/// Records a breadcrumb on the current composer's default write tier.
pub fn add_breadcrumb(breadcrumb: Breadcrumb) {
    with_composer(|composer| composer.add_breadcrumb(breadcrumb, None));
}

/// Mutates the current composer's default write tier.
pub fn configure_scope<R>(f: impl FnOnce(&mut Scope) -> R) -> R {
    with_composer(|composer| composer.configure_scope(None, f))
}

/// Blocks until queued envelopes are delivered or the timeout elapses.
pub fn flush(timeout: Option<Duration>) -> bool {
    with_composer(|composer| match composer.get_client() {
        Some(client) => client.flush(timeout),
        None => true,
    })
}

/// Starts a session, emitting the final update of any session it replaces.
///
/// The initial update of the new session goes out with the first errored
/// event, or with the final update if no error ever happens.
pub fn start_session() {
    with_composer(|composer| {
        let Some(client) = composer.get_client() else {
            sdk_debug!("no enabled client bound, not starting a session");
            return;
        };
        if let Some(started) = composer.start_session() {
            if let Some(previous) = started.previous {
                client.capture_session(previous, &Hint::new());
            }
        }
    });
}

/// Ends the active session and emits its final update.
pub fn end_session() {
    with_composer(|composer| {
        if let Some(session) = composer.end_session() {
            if let Some(client) = composer.get_client() {
                client.capture_session(session, &Hint::new());
            }
        }
    });
}

/// Ends the active session with an explicit status.
///
/// Terminal statuses already reached are kept; `mechanism` tags an
/// `Abnormal` exit with what caused it.
pub fn end_session_with_status(status: SessionStatus, mechanism: Option<&str>) {
    with_composer(|composer| {
        composer.update_session(SessionChange {
            status: Some(status),
            abnormal_mechanism: mechanism.map(str::to_owned),
            ..Default::default()
        });
        if let Some(session) = composer.end_session() {
            if let Some(client) = composer.get_client() {
                client.capture_session(session, &Hint::new());
            }
        }
    });
}
