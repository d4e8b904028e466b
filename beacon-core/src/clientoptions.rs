use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use beacon_types::protocol::{Breadcrumb, Event, Transaction};

use crate::hint::Hint;
use crate::observer::ScopeObserver;
use crate::processor::EventProcessor;
use crate::serializer::{JsonSerializer, Serializer};
use crate::transport::TransportFactory;
use crate::util::{RandomSource, SystemClock, ThreadLocalRandom, TimeProvider};

/// A boxed callback that can modify or drop an item before it is sent.
pub type BeforeCallback<T> = Arc<dyn Fn(T, &Hint) -> Option<T> + Send + Sync>;

/// Configuration settings for the client.
///
/// These are fixed once a client is constructed from them; scopes created
/// afterwards hold on to the same shared handle.
///
/// # Examples
///
/// ```
/// let options = beacon_core::ClientOptions {
///     release: Some("my-app@1.0.0".into()),
///     environment: Some("production".into()),
///     ..Default::default()
/// };
/// ```
#[derive(Clone)]
pub struct ClientOptions {
    /// The release identity to attach to outgoing items and sessions.
    pub release: Option<Cow<'static, str>>,
    /// The environment to attach to outgoing items and sessions.
    pub environment: Option<Cow<'static, str>>,
    /// The server or device name to attach to events.
    pub server_name: Option<Cow<'static, str>>,
    /// The sample rate for error events.
    ///
    /// `None` disables sampling entirely; otherwise an event is kept when
    /// the rate is at least the drawn random value.
    pub sample_rate: Option<f64>,
    /// Maximum number of breadcrumbs a newly created scope will retain.
    pub max_breadcrumbs: usize,
    /// Exception type names that are silently discarded before sending.
    pub ignored_exceptions: Vec<String>,
    /// Callback that is executed before an error event is sent.
    pub before_send: Option<BeforeCallback<Event>>,
    /// Callback that is executed before a transaction is sent.
    pub before_send_transaction: Option<BeforeCallback<Transaction>>,
    /// Callback that is executed for each breadcrumb being recorded.
    pub before_breadcrumb: Option<BeforeCallback<Breadcrumb>>,
    /// Globally configured event processors, run after the scope's own.
    pub event_processors: Vec<Arc<dyn EventProcessor>>,
    /// Observers mirroring scope mutations to an external store.
    pub scope_observers: Vec<Arc<dyn ScopeObserver>>,
    /// Whether scope mutations are forwarded to the observers.
    pub enable_scope_sync: bool,
    /// Whether `init` starts a session right away.
    pub auto_session_tracking: bool,
    /// The factory for the transport that delivers envelopes.
    ///
    /// Without a transport the client is permanently disabled.
    pub transport: Option<Arc<dyn TransportFactory>>,
    /// The serializer used to turn items into envelope payloads.
    pub serializer: Arc<dyn Serializer>,
    /// The randomness source consulted for sampling decisions.
    pub random_source: Arc<dyn RandomSource>,
    /// The clock used for session bookkeeping.
    pub time_provider: Arc<dyn TimeProvider>,
    /// How long to wait for the transport when the client shuts down.
    pub shutdown_timeout: Duration,
}

impl ClientOptions {
    /// Creates new options with the defaults.
    pub fn new() -> ClientOptions {
        Default::default()
    }

    /// Creates new options, letting a closure adjust them.
    pub fn configure<F: FnOnce(&mut Self)>(f: F) -> ClientOptions {
        let mut options = Self::new();
        f(&mut options);
        options
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[derive(Debug)]
        struct BeforeCallbackSet;
        #[derive(Debug)]
        struct TransportFactorySet;

        f.debug_struct("ClientOptions")
            .field("release", &self.release)
            .field("environment", &self.environment)
            .field("server_name", &self.server_name)
            .field("sample_rate", &self.sample_rate)
            .field("max_breadcrumbs", &self.max_breadcrumbs)
            .field("ignored_exceptions", &self.ignored_exceptions)
            .field("before_send", &self.before_send.as_ref().map(|_| BeforeCallbackSet))
            .field(
                "before_send_transaction",
                &self.before_send_transaction.as_ref().map(|_| BeforeCallbackSet),
            )
            .field(
                "before_breadcrumb",
                &self.before_breadcrumb.as_ref().map(|_| BeforeCallbackSet),
            )
            .field("event_processors", &self.event_processors.len())
            .field("scope_observers", &self.scope_observers.len())
            .field("enable_scope_sync", &self.enable_scope_sync)
            .field("auto_session_tracking", &self.auto_session_tracking)
            .field("transport", &self.transport.as_ref().map(|_| TransportFactorySet))
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish()
    }
}

impl Default for ClientOptions {
    fn default() -> ClientOptions {
        ClientOptions {
            release: None,
            environment: None,
            server_name: None,
            sample_rate: None,
            max_breadcrumbs: 100,
            ignored_exceptions: vec![],
            before_send: None,
            before_send_transaction: None,
            before_breadcrumb: None,
            event_processors: vec![],
            scope_observers: vec![],
            enable_scope_sync: false,
            auto_session_tracking: false,
            transport: None,
            serializer: Arc::new(JsonSerializer),
            random_source: Arc::new(ThreadLocalRandom),
            time_provider: Arc::new(SystemClock),
            shutdown_timeout: Duration::from_secs(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ClientOptions::default();
        assert_eq!(options.max_breadcrumbs, 100);
        assert_eq!(options.sample_rate, None);
        assert!(!options.auto_session_tracking);
        assert!(options.transport.is_none());
    }

    #[test]
    fn test_debug_masks_callbacks() {
        let options = ClientOptions::configure(|o| {
            o.before_send = Some(Arc::new(|event, _| Some(event)));
        });
        let debugged = format!("{options:?}");
        assert!(debugged.contains("before_send: Some(BeforeCallbackSet)"));
        assert!(debugged.contains("before_breadcrumb: None"));
    }
}
