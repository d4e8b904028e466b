use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use beacon_types::protocol::{
    Attachment, Breadcrumb, Context, Event, Level, Map, PropagationContext, Request, Session,
    SpanRef, Transaction, User, Value,
};

use crate::client::Client;
use crate::clientoptions::ClientOptions;
use crate::error::run_guarded;
use crate::hint::Hint;
use crate::observer::ScopeObserver;
use crate::processor::EventProcessor;
use crate::session::{SessionSlot, SessionTracker};

/// A bounded breadcrumb trail with drop-oldest overflow behavior.
#[derive(Debug, Clone)]
pub struct BreadcrumbQueue {
    items: VecDeque<Breadcrumb>,
    capacity: usize,
}

impl BreadcrumbQueue {
    /// Creates an empty queue with the given capacity.
    pub fn new(capacity: usize) -> BreadcrumbQueue {
        BreadcrumbQueue {
            items: VecDeque::with_capacity(capacity.min(128)),
            capacity,
        }
    }

    /// Appends a breadcrumb, evicting the oldest ones beyond capacity.
    ///
    /// With a capacity of zero nothing is ever recorded.
    pub fn push(&mut self, breadcrumb: Breadcrumb) {
        if self.capacity == 0 {
            return;
        }
        self.items.push_back(breadcrumb);
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    /// The configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of breadcrumbs currently retained.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the trail is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Breadcrumb> {
        self.items.iter()
    }

    fn clear(&mut self) {
        self.items.clear();
    }
}

/// Read access to composed scope data, as the capture pipeline sees it.
///
/// Both a single [`Scope`] and the merged three-tier view implement this, so
/// the client never cares which composition produced its input. All getters
/// return owned snapshots.
pub trait ScopeLike: Send + Sync {
    /// The level override, if any.
    fn level(&self) -> Option<Level>;
    /// The transaction name, if any.
    fn transaction_name(&self) -> Option<String>;
    /// The user, if any.
    fn user(&self) -> Option<Arc<User>>;
    /// The request data, if any.
    fn request(&self) -> Option<Arc<Request>>;
    /// The fingerprint override, empty when unset.
    fn fingerprint(&self) -> Vec<String>;
    /// The effective tags.
    fn tags(&self) -> Map<String, String>;
    /// The effective extra values.
    fn extras(&self) -> Map<String, Value>;
    /// The effective contexts.
    fn contexts(&self) -> Map<String, Context>;
    /// The breadcrumb trail, oldest first.
    fn breadcrumbs(&self) -> Vec<Breadcrumb>;
    /// The attachments to include in envelopes.
    fn attachments(&self) -> Vec<Attachment>;
    /// The scope-registered event processors, in run order.
    fn event_processors(&self) -> Vec<Arc<dyn EventProcessor>>;
    /// The active span, if any.
    fn span(&self) -> Option<SpanRef>;
    /// The propagation context used when no span is active.
    fn propagation_context(&self) -> PropagationContext;
    /// A tracker operating on the live session slot behind this view.
    fn session_tracker(&self) -> SessionTracker;

    /// Looks up a single tag.
    fn tag(&self, key: &str) -> Option<String> {
        self.tags().get(key).cloned()
    }

    /// The value for an outgoing trace propagation header.
    fn trace_header_value(&self) -> String {
        match self.span() {
            Some(span) => PropagationContext {
                trace_id: span.trace_id,
                span_id: span.span_id,
                sampled: None,
            }
            .to_header_value(),
            None => self.propagation_context().to_header_value(),
        }
    }

    /// Applies this scope to an error event.
    ///
    /// Data the event already carries wins over scope data, with one
    /// exception: a scope level override replaces the event level.
    fn apply_to_event(&self, event: &mut Event) {
        if let Some(level) = self.level() {
            event.level = level;
        }
        if event.user.is_none() {
            event.user = self.user().map(|user| (*user).clone());
        }
        if event.request.is_none() {
            event.request = self.request().map(|request| (*request).clone());
        }
        if event.transaction.is_none() {
            event.transaction = self.transaction_name();
        }
        if event.has_default_fingerprint() {
            let fingerprint = self.fingerprint();
            if !fingerprint.is_empty() {
                event.fingerprint = fingerprint;
            }
        }
        for (key, value) in self.tags() {
            event.tags.entry(key).or_insert(value);
        }
        for (key, value) in self.extras() {
            event.extra.entry(key).or_insert(value);
        }
        for (key, value) in self.contexts() {
            event.contexts.entry(key).or_insert(value);
        }
        let trail = self.breadcrumbs();
        if !trail.is_empty() {
            event.breadcrumbs.extend(trail);
            event.breadcrumbs.sort_by_key(|breadcrumb| breadcrumb.timestamp);
        }
        if !event.contexts.contains_key("trace") {
            let context = match self.span() {
                Some(span) => span.trace_context(),
                None => self.propagation_context().trace_context(),
            };
            event.contexts.insert("trace".into(), context.into());
        }
    }

    /// Applies this scope to a transaction.
    fn apply_to_transaction(&self, transaction: &mut Transaction) {
        if transaction.name.is_none() {
            transaction.name = self.transaction_name();
        }
        if transaction.user.is_none() {
            transaction.user = self.user().map(|user| (*user).clone());
        }
        for (key, value) in self.tags() {
            transaction.tags.entry(key).or_insert(value);
        }
        for (key, value) in self.extras() {
            transaction.extra.entry(key).or_insert(value);
        }
        for (key, value) in self.contexts() {
            transaction.contexts.entry(key).or_insert(value);
        }
        if !transaction.contexts.contains_key("trace") {
            let context = match self.span() {
                Some(span) => span.trace_context(),
                None => self.propagation_context().trace_context(),
            };
            transaction.contexts.insert("trace".into(), context.into());
        }
    }
}

/// Holds contextual data for a unit of work.
///
/// The regular data fields are copy-on-write behind `Arc`s, so cloning a
/// scope is cheap until one side mutates. The session and the active
/// transaction live behind their own locks; cloning snapshots them into
/// fresh slots, making the clone fully independent of the original.
pub struct Scope {
    pub(crate) options: Arc<ClientOptions>,
    pub(crate) client: Option<Arc<Client>>,
    pub(crate) level: Option<Level>,
    pub(crate) fingerprint: Option<Arc<Vec<String>>>,
    pub(crate) transaction_name: Option<Arc<str>>,
    pub(crate) user: Option<Arc<User>>,
    pub(crate) request: Option<Arc<Request>>,
    pub(crate) tags: Arc<Map<String, String>>,
    pub(crate) extra: Arc<Map<String, Value>>,
    pub(crate) contexts: Arc<Map<String, Context>>,
    pub(crate) breadcrumbs: Arc<BreadcrumbQueue>,
    pub(crate) event_processors: Arc<Vec<Arc<dyn EventProcessor>>>,
    pub(crate) attachments: Arc<Vec<Attachment>>,
    pub(crate) span: Option<SpanRef>,
    pub(crate) propagation_context: PropagationContext,
    pub(crate) session: SessionSlot,
    pub(crate) transaction: Arc<Mutex<Option<Transaction>>>,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("level", &self.level)
            .field("transaction_name", &self.transaction_name)
            .field("user", &self.user)
            .field("tags", &self.tags.len())
            .field("extra", &self.extra.len())
            .field("contexts", &self.contexts.len())
            .field("breadcrumbs", &self.breadcrumbs.len())
            .field("event_processors", &self.event_processors.len())
            .field("attachments", &self.attachments.len())
            .field("span", &self.span)
            .field("has_session", &self.session_tracker().has_active_session())
            .finish()
    }
}

impl Clone for Scope {
    fn clone(&self) -> Scope {
        // Snapshot the locked slots into fresh ones; the clone must not
        // share session or transaction state with the original.
        let session = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let transaction = self
            .transaction
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Scope {
            options: self.options.clone(),
            client: self.client.clone(),
            level: self.level,
            fingerprint: self.fingerprint.clone(),
            transaction_name: self.transaction_name.clone(),
            user: self.user.clone(),
            request: self.request.clone(),
            tags: self.tags.clone(),
            extra: self.extra.clone(),
            contexts: self.contexts.clone(),
            breadcrumbs: self.breadcrumbs.clone(),
            event_processors: self.event_processors.clone(),
            attachments: self.attachments.clone(),
            span: self.span.clone(),
            propagation_context: self.propagation_context,
            session: Arc::new(Mutex::new(session)),
            transaction: Arc::new(Mutex::new(transaction)),
        }
    }
}

impl Scope {
    /// Creates an empty scope for the given configuration.
    pub fn new(options: Arc<ClientOptions>) -> Scope {
        let capacity = options.max_breadcrumbs;
        Scope {
            options,
            client: None,
            level: None,
            fingerprint: None,
            transaction_name: None,
            user: None,
            request: None,
            tags: Default::default(),
            extra: Default::default(),
            contexts: Default::default(),
            breadcrumbs: Arc::new(BreadcrumbQueue::new(capacity)),
            event_processors: Default::default(),
            attachments: Default::default(),
            span: None,
            propagation_context: PropagationContext::default(),
            session: Default::default(),
            transaction: Arc::new(Mutex::new(None)),
        }
    }

    /// The client bound to this scope, if any.
    pub fn client(&self) -> Option<Arc<Client>> {
        self.client.clone()
    }

    /// Binds a client to this scope.
    pub fn bind_client(&mut self, client: Option<Arc<Client>>) {
        self.client = client;
    }

    /// Clears the contextual data while keeping configuration, client,
    /// session and active transaction.
    pub fn clear(&mut self) {
        let options = self.options.clone();
        let client = self.client.take();
        let session = self.session.clone();
        let transaction = self.transaction.clone();
        *self = Scope::new(options);
        self.client = client;
        self.session = session;
        self.transaction = transaction;
    }

    /// Deletes the breadcrumb trail.
    pub fn clear_breadcrumbs(&mut self) {
        Arc::make_mut(&mut self.breadcrumbs).clear();
    }

    /// Sets the level override applied to captured events.
    pub fn set_level(&mut self, level: Option<Level>) {
        self.level = level;
    }

    /// Sets the grouping fingerprint override.
    pub fn set_fingerprint(&mut self, fingerprint: Option<Vec<String>>) {
        self.fingerprint = fingerprint.map(Arc::new);
    }

    /// Sets the transaction name, renaming the active transaction as well.
    pub fn set_transaction_name(&mut self, name: Option<&str>) {
        self.transaction_name = name.map(Into::into);
        let mut transaction = self
            .transaction
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(transaction) = transaction.as_mut() {
            transaction.name = name.map(str::to_owned);
        }
    }

    /// Sets or clears the user.
    pub fn set_user(&mut self, user: Option<User>) {
        self.user = user.map(Arc::new);
        let user = self.user.clone();
        self.notify_observers(|observer| observer.set_user(user.as_deref()));
    }

    /// Sets or clears the request data.
    pub fn set_request(&mut self, request: Option<Request>) {
        self.request = request.map(Arc::new);
    }

    /// Sets a tag.
    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        Arc::make_mut(&mut self.tags).insert(key.clone(), value.clone());
        self.notify_observers(|observer| observer.set_tag(&key, &value));
    }

    /// Removes a tag.
    pub fn remove_tag(&mut self, key: &str) {
        Arc::make_mut(&mut self.tags).remove(key);
        self.notify_observers(|observer| observer.remove_tag(key));
    }

    /// Sets an extra value.
    pub fn set_extra(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        Arc::make_mut(&mut self.extra).insert(key.clone(), value.clone());
        self.notify_observers(|observer| observer.set_extra(&key, &value));
    }

    /// Removes an extra value.
    pub fn remove_extra(&mut self, key: &str) {
        Arc::make_mut(&mut self.extra).remove(key);
        self.notify_observers(|observer| observer.remove_extra(key));
    }

    /// Sets a context under the given key.
    pub fn set_context(&mut self, key: impl Into<String>, context: impl Into<Context>) {
        Arc::make_mut(&mut self.contexts).insert(key.into(), context.into());
    }

    /// Removes a context.
    pub fn remove_context(&mut self, key: &str) {
        Arc::make_mut(&mut self.contexts).remove(key);
    }

    /// Records a breadcrumb on this scope.
    ///
    /// The before-breadcrumb callback runs first and may replace or veto the
    /// breadcrumb. A panicking callback keeps the original breadcrumb, with
    /// the failure noted in its data.
    pub fn add_breadcrumb(&mut self, breadcrumb: Breadcrumb) {
        self.add_breadcrumb_with_hint(breadcrumb, &Hint::new());
    }

    /// Records a breadcrumb, passing the given hint to the callback.
    pub fn add_breadcrumb_with_hint(&mut self, breadcrumb: Breadcrumb, hint: &Hint) {
        let breadcrumb = match &self.options.before_breadcrumb {
            Some(callback) => {
                let input = breadcrumb.clone();
                match run_guarded(|| callback(input, hint)) {
                    Ok(Some(breadcrumb)) => breadcrumb,
                    Ok(None) => {
                        sdk_debug!("breadcrumb dropped by before_breadcrumb");
                        return;
                    }
                    Err(err) => {
                        sdk_error!("before_breadcrumb failed: {err}");
                        let mut breadcrumb = breadcrumb;
                        breadcrumb
                            .data
                            .insert("before_breadcrumb.error".into(), err.to_string().into());
                        breadcrumb
                    }
                }
            }
            None => breadcrumb,
        };
        Arc::make_mut(&mut self.breadcrumbs).push(breadcrumb.clone());
        self.notify_observers(|observer| observer.add_breadcrumb(&breadcrumb));
    }

    /// Registers an event processor on this scope.
    pub fn add_event_processor<P: EventProcessor + 'static>(&mut self, processor: P) {
        Arc::make_mut(&mut self.event_processors).push(Arc::new(processor));
    }

    /// Adds an attachment to include with future envelopes.
    pub fn add_attachment(&mut self, attachment: Attachment) {
        Arc::make_mut(&mut self.attachments).push(attachment);
    }

    /// Removes all attachments.
    pub fn clear_attachments(&mut self) {
        Arc::make_mut(&mut self.attachments).clear();
    }

    /// Sets or clears the active span.
    pub fn set_span(&mut self, span: Option<SpanRef>) {
        self.span = span;
    }

    /// Replaces the propagation context.
    pub fn set_propagation_context(&mut self, context: PropagationContext) {
        self.propagation_context = context;
    }

    /// Stores a transaction as the active one.
    pub fn set_active_transaction(&mut self, transaction: Option<Transaction>) {
        if let Some(transaction) = &transaction {
            self.transaction_name = transaction.name.as_deref().map(Into::into);
        }
        *self
            .transaction
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = transaction;
    }

    /// Takes the active transaction out of the scope.
    pub fn take_active_transaction(&mut self) -> Option<Transaction> {
        self.transaction
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Runs a closure under the transaction lock, returning a snapshot of
    /// the active transaction afterwards.
    ///
    /// This is the only sanctioned way to read-modify-write the active
    /// transaction atomically.
    pub fn with_transaction(
        &self,
        f: impl FnOnce(Option<&mut Transaction>),
    ) -> Option<Transaction> {
        let mut guard = self
            .transaction
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(guard.as_mut());
        guard.clone()
    }

    /// Runs a closure under the session lock, returning a snapshot of the
    /// active session afterwards.
    ///
    /// For the common lifecycle transitions prefer the
    /// [`SessionTracker`] returned by [`ScopeLike::session_tracker`].
    pub fn with_session(&self, f: impl FnOnce(Option<&mut Session>)) -> Option<Session> {
        let mut guard = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        f(guard.as_mut());
        guard.clone()
    }

    fn notify_observers(&self, f: impl Fn(&dyn ScopeObserver)) {
        if !self.options.enable_scope_sync {
            return;
        }
        for observer in &self.options.scope_observers {
            if let Err(err) = run_guarded(|| f(observer.as_ref())) {
                sdk_warn!("scope observer failed: {err}");
            }
        }
    }
}

impl ScopeLike for Scope {
    fn level(&self) -> Option<Level> {
        self.level
    }

    fn transaction_name(&self) -> Option<String> {
        self.transaction_name.as_deref().map(str::to_owned)
    }

    fn user(&self) -> Option<Arc<User>> {
        self.user.clone()
    }

    fn request(&self) -> Option<Arc<Request>> {
        self.request.clone()
    }

    fn fingerprint(&self) -> Vec<String> {
        self.fingerprint
            .as_deref()
            .cloned()
            .unwrap_or_default()
    }

    fn tags(&self) -> Map<String, String> {
        (*self.tags).clone()
    }

    fn extras(&self) -> Map<String, Value> {
        (*self.extra).clone()
    }

    fn contexts(&self) -> Map<String, Context> {
        (*self.contexts).clone()
    }

    fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        self.breadcrumbs.iter().cloned().collect()
    }

    fn attachments(&self) -> Vec<Attachment> {
        (*self.attachments).clone()
    }

    fn event_processors(&self) -> Vec<Arc<dyn EventProcessor>> {
        (*self.event_processors).clone()
    }

    fn span(&self) -> Option<SpanRef> {
        self.span.clone()
    }

    fn propagation_context(&self) -> PropagationContext {
        self.propagation_context
    }

    fn session_tracker(&self) -> SessionTracker {
        SessionTracker::new(self.session.clone(), self.options.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        Scope::new(Arc::new(ClientOptions::default()))
    }

    fn crumb(message: &str) -> Breadcrumb {
        Breadcrumb {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    #[test]
    fn queue_evicts_oldest_beyond_capacity() {
        let mut queue = BreadcrumbQueue::new(3);
        for i in 0..5 {
            queue.push(crumb(&format!("crumb {i}")));
        }
        assert_eq!(queue.len(), 3);
        let messages: Vec<_> = queue
            .iter()
            .map(|b| b.message.clone().unwrap())
            .collect();
        assert_eq!(messages, vec!["crumb 2", "crumb 3", "crumb 4"]);
    }

    #[test]
    fn queue_with_zero_capacity_stays_empty() {
        let mut queue = BreadcrumbQueue::new(0);
        queue.push(crumb("dropped"));
        assert!(queue.is_empty());
    }

    #[test]
    fn clone_is_independent_for_tags() {
        let mut original = scope();
        original.set_tag("shared", "yes");
        let mut forked = original.clone();
        forked.set_tag("fork-only", "yes");
        original.set_tag("original-only", "yes");

        assert!(original.tag("fork-only").is_none());
        assert!(forked.tag("original-only").is_none());
        assert_eq!(forked.tag("shared").as_deref(), Some("yes"));
    }

    #[test]
    fn clone_snapshots_session_slot() {
        let options = Arc::new(ClientOptions {
            release: Some("app@1.0.0".into()),
            ..Default::default()
        });
        let original = Scope::new(options);
        original.session_tracker().start_session(None).unwrap();

        let forked = original.clone();
        original.session_tracker().end(None).unwrap();

        // The fork kept its own copy of the session.
        assert!(forked.session_tracker().has_active_session());
        assert!(!original.session_tracker().has_active_session());
    }

    #[test]
    fn apply_does_not_overwrite_event_data() {
        let mut scope = scope();
        scope.set_tag("env", "scope");
        scope.set_tag("region", "eu");
        scope.set_extra("build", "123".into());

        let mut event = Event::new();
        event.tags.insert("env".into(), "event".into());
        scope.apply_to_event(&mut event);

        assert_eq!(event.tags["env"], "event");
        assert_eq!(event.tags["region"], "eu");
        assert_eq!(event.extra["build"], "123");
    }

    #[test]
    fn apply_overrides_level_and_fills_trace_context() {
        let mut scope = scope();
        scope.set_level(Some(Level::Warning));

        let mut event = Event::new();
        scope.apply_to_event(&mut event);

        assert_eq!(event.level, Level::Warning);
        assert!(matches!(
            event.contexts.get("trace"),
            Some(Context::Trace(_))
        ));
    }

    #[test]
    fn breadcrumbs_merge_in_timestamp_order() {
        use std::time::{Duration, SystemTime};

        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let mut scope = scope();
        let mut early = crumb("scope early");
        early.timestamp = base;
        let mut late = crumb("scope late");
        late.timestamp = base + Duration::from_secs(20);
        scope.add_breadcrumb(early);
        scope.add_breadcrumb(late);

        let mut event = Event::new();
        let mut own = crumb("event middle");
        own.timestamp = base + Duration::from_secs(10);
        event.breadcrumbs.push(own);
        scope.apply_to_event(&mut event);

        let messages: Vec<_> = event
            .breadcrumbs
            .iter()
            .map(|b| b.message.clone().unwrap())
            .collect();
        assert_eq!(messages, vec!["scope early", "event middle", "scope late"]);
    }

    #[test]
    fn before_breadcrumb_can_replace_and_veto() {
        let options = ClientOptions {
            before_breadcrumb: Some(Arc::new(|breadcrumb: Breadcrumb, _: &Hint| {
                match breadcrumb.message.as_deref() {
                    Some("secret") => None,
                    _ => Some(Breadcrumb {
                        category: Some("checked".into()),
                        ..breadcrumb
                    }),
                }
            })),
            ..Default::default()
        };
        let mut scope = Scope::new(Arc::new(options));
        scope.add_breadcrumb(crumb("secret"));
        scope.add_breadcrumb(crumb("fine"));

        let trail = ScopeLike::breadcrumbs(&scope);
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].category.as_deref(), Some("checked"));
    }

    #[test]
    fn panicking_before_breadcrumb_keeps_original() {
        let options = ClientOptions {
            before_breadcrumb: Some(Arc::new(|_: Breadcrumb, _: &Hint| -> Option<Breadcrumb> {
                panic!("callback exploded")
            })),
            ..Default::default()
        };
        let mut scope = Scope::new(Arc::new(options));
        scope.add_breadcrumb(crumb("kept"));

        let trail = ScopeLike::breadcrumbs(&scope);
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].message.as_deref(), Some("kept"));
        assert!(trail[0].data.contains_key("before_breadcrumb.error"));
    }

    #[test]
    fn observers_see_mutations_when_sync_enabled() {
        use std::sync::Mutex as StdMutex;

        #[derive(Default)]
        struct Recorder(StdMutex<Vec<String>>);
        impl ScopeObserver for Recorder {
            fn set_tag(&self, key: &str, value: &str) {
                self.0.lock().unwrap().push(format!("tag {key}={value}"));
            }
            fn remove_tag(&self, key: &str) {
                self.0.lock().unwrap().push(format!("del {key}"));
            }
        }

        let recorder = Arc::new(Recorder::default());
        let options = ClientOptions {
            enable_scope_sync: true,
            scope_observers: vec![recorder.clone()],
            ..Default::default()
        };
        let mut scope = Scope::new(Arc::new(options));
        scope.set_tag("env", "prod");
        scope.remove_tag("env");

        let seen = recorder.0.lock().unwrap().clone();
        assert_eq!(seen, vec!["tag env=prod", "del env"]);
    }

    #[test]
    fn with_transaction_mutates_under_lock_and_snapshots() {
        let mut scope = scope();
        scope.set_active_transaction(Some(Transaction::new()));
        let snapshot = scope.with_transaction(|transaction| {
            transaction.unwrap().name = Some("nightly-import".into());
        });
        assert_eq!(snapshot.unwrap().name.as_deref(), Some("nightly-import"));
        assert!(scope.with_session(|session| assert!(session.is_none())).is_none());
    }

    #[test]
    fn clear_keeps_session_and_client_slots() {
        let options = Arc::new(ClientOptions {
            release: Some("app@1.0.0".into()),
            ..Default::default()
        });
        let mut scope = Scope::new(options);
        scope.set_tag("env", "prod");
        scope.session_tracker().start_session(None).unwrap();

        scope.clear();
        assert!(scope.tag("env").is_none());
        assert!(scope.session_tracker().has_active_session());
    }
}
