use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use beacon_types::protocol::{
    Attachment, Breadcrumb, Context, Event, Level, Map, PropagationContext, Request, Session,
    SpanRef, Transaction, User, Value,
};
use beacon_types::Uuid;

use crate::client::Client;
use crate::clientoptions::ClientOptions;
use crate::hint::Hint;
use crate::processor::EventProcessor;
use crate::scope::{Scope, ScopeLike};
use crate::session::{SessionChange, SessionTracker, StartedSessions};

/// Names one of the three scope tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeSelector {
    /// The innermost tier, forked per unit of work.
    #[default]
    Current,
    /// The middle tier, typically spanning a request or job.
    Isolation,
    /// The process-wide tier, shared by all composers forked from one root.
    Global,
}

/// Composes the three scope tiers into the views the pipeline consumes.
///
/// Forking a composer copies the current and isolation tiers and shares the
/// global tier, so concurrent units of work stay independent where they
/// should and converge where they must.
pub struct ScopeComposer {
    global: Arc<RwLock<Scope>>,
    isolation: Arc<RwLock<Scope>>,
    current: Arc<RwLock<Scope>>,
    default_write: ScopeSelector,
}

impl fmt::Debug for ScopeComposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeComposer")
            .field("default_write", &self.default_write)
            .finish()
    }
}

impl ScopeComposer {
    /// Creates a composer with three fresh tiers.
    pub fn new(options: Arc<ClientOptions>) -> ScopeComposer {
        ScopeComposer {
            global: Arc::new(RwLock::new(Scope::new(options.clone()))),
            isolation: Arc::new(RwLock::new(Scope::new(options.clone()))),
            current: Arc::new(RwLock::new(Scope::new(options))),
            default_write: ScopeSelector::default(),
        }
    }

    /// Creates a composer from prepared tiers.
    pub fn from_tiers(
        global: Arc<RwLock<Scope>>,
        isolation: Scope,
        current: Scope,
        default_write: ScopeSelector,
    ) -> ScopeComposer {
        ScopeComposer {
            global,
            isolation: Arc::new(RwLock::new(isolation)),
            current: Arc::new(RwLock::new(current)),
            default_write,
        }
    }

    /// Forks this composer for a new unit of work.
    pub fn fork(&self) -> ScopeComposer {
        ScopeComposer {
            global: self.global.clone(),
            isolation: Arc::new(RwLock::new(self.read(ScopeSelector::Isolation).clone())),
            current: Arc::new(RwLock::new(self.read(ScopeSelector::Current).clone())),
            default_write: self.default_write,
        }
    }

    /// The tier mutations go to when no selector is given.
    pub fn default_write_scope(&self) -> ScopeSelector {
        self.default_write
    }

    /// Changes the tier mutations go to when no selector is given.
    pub fn set_default_write_scope(&mut self, selector: ScopeSelector) {
        self.default_write = selector;
    }

    fn tier(&self, selector: ScopeSelector) -> &Arc<RwLock<Scope>> {
        match selector {
            ScopeSelector::Current => &self.current,
            ScopeSelector::Isolation => &self.isolation,
            ScopeSelector::Global => &self.global,
        }
    }

    fn read(&self, selector: ScopeSelector) -> RwLockReadGuard<'_, Scope> {
        self.tier(selector)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, selector: ScopeSelector) -> RwLockWriteGuard<'_, Scope> {
        self.tier(selector)
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs a closure with mutable access to one tier.
    ///
    /// Without a selector the composer's default write tier is used.
    pub fn configure_scope<R>(
        &self,
        selector: Option<ScopeSelector>,
        f: impl FnOnce(&mut Scope) -> R,
    ) -> R {
        let selector = selector.unwrap_or(self.default_write);
        f(&mut self.write(selector))
    }

    /// Runs a closure with read access to one tier.
    pub fn with_scope<R>(&self, selector: ScopeSelector, f: impl FnOnce(&Scope) -> R) -> R {
        f(&self.read(selector))
    }

    /// Binds a client, by default to the global tier.
    pub fn bind_client(&self, client: Option<Arc<Client>>, selector: Option<ScopeSelector>) {
        let selector = selector.unwrap_or(ScopeSelector::Global);
        let client = Some(client.unwrap_or_else(|| Arc::new(Client::disabled())));
        self.write(selector).bind_client(client);
    }

    /// Resolves the effective client, innermost tier first.
    ///
    /// A disabled binding counts as absent, so a real client bound at an
    /// outer tier is still discovered.
    pub fn get_client(&self) -> Option<Arc<Client>> {
        for selector in [
            ScopeSelector::Current,
            ScopeSelector::Isolation,
            ScopeSelector::Global,
        ] {
            if let Some(client) = self.read(selector).client() {
                if client.is_enabled() {
                    return Some(client);
                }
            }
        }
        None
    }

    /// Sets the level override on a tier.
    pub fn set_level(&self, level: Option<Level>, selector: Option<ScopeSelector>) {
        self.configure_scope(selector, |scope| scope.set_level(level));
    }

    /// Sets or clears the user on a tier.
    pub fn set_user(&self, user: Option<User>, selector: Option<ScopeSelector>) {
        self.configure_scope(selector, |scope| scope.set_user(user));
    }

    /// Sets a tag on a tier.
    pub fn set_tag(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
        selector: Option<ScopeSelector>,
    ) {
        self.configure_scope(selector, |scope| scope.set_tag(key, value));
    }

    /// Removes a tag from a tier.
    pub fn remove_tag(&self, key: &str, selector: Option<ScopeSelector>) {
        self.configure_scope(selector, |scope| scope.remove_tag(key));
    }

    /// Sets an extra value on a tier.
    pub fn set_extra(&self, key: impl Into<String>, value: Value, selector: Option<ScopeSelector>) {
        self.configure_scope(selector, |scope| scope.set_extra(key, value));
    }

    /// Records a breadcrumb on a tier.
    pub fn add_breadcrumb(&self, breadcrumb: Breadcrumb, selector: Option<ScopeSelector>) {
        self.configure_scope(selector, |scope| scope.add_breadcrumb(breadcrumb));
    }

    /// Adds an attachment on a tier.
    pub fn add_attachment(&self, attachment: Attachment, selector: Option<ScopeSelector>) {
        self.configure_scope(selector, |scope| scope.add_attachment(attachment));
    }

    /// The effective level override, innermost tier first.
    pub fn get_level(&self) -> Option<Level> {
        self.first(|scope| scope.level)
    }

    /// The effective user, innermost tier first.
    pub fn get_user(&self) -> Option<Arc<User>> {
        self.first(|scope| scope.user.clone())
    }

    /// The effective value for one tag, innermost tier first.
    pub fn get_tag(&self, key: &str) -> Option<String> {
        self.first(|scope| scope.tags.get(key).cloned())
    }

    fn first<T>(&self, f: impl Fn(&Scope) -> Option<T>) -> Option<T> {
        for selector in [
            ScopeSelector::Current,
            ScopeSelector::Isolation,
            ScopeSelector::Global,
        ] {
            if let Some(value) = f(&self.read(selector)) {
                return Some(value);
            }
        }
        None
    }

    /// Builds the merged read view the capture pipeline consumes.
    ///
    /// The view is a snapshot of all three tiers, except that session
    /// bookkeeping still reaches the live slot of the owning tier.
    pub fn merged(&self) -> MergedScope {
        let trackers = [
            self.read(ScopeSelector::Current).session_tracker(),
            self.read(ScopeSelector::Isolation).session_tracker(),
            self.read(ScopeSelector::Global).session_tracker(),
        ];
        MergedScope {
            global: self.read(ScopeSelector::Global).clone(),
            isolation: self.read(ScopeSelector::Isolation).clone(),
            current: self.read(ScopeSelector::Current).clone(),
            trackers,
        }
    }

    /// Captures an error event through the effective client.
    pub fn capture_event(&self, event: Event, hint: &Hint) -> Uuid {
        let Some(client) = self.get_client() else {
            sdk_debug!("no enabled client bound, dropping event");
            return Uuid::nil();
        };
        let merged = self.merged();
        client.capture_event(event, Some(&merged), hint)
    }

    /// Captures a message as an event of the given level.
    pub fn capture_message(&self, message: &str, level: Level) -> Uuid {
        let event = Event {
            message: Some(message.to_string()),
            level,
            ..Event::new()
        };
        self.capture_event(event, &Hint::new())
    }

    /// Captures a finished transaction through the effective client.
    pub fn capture_transaction(&self, transaction: Transaction, hint: &Hint) -> Uuid {
        let Some(client) = self.get_client() else {
            sdk_debug!("no enabled client bound, dropping transaction");
            return Uuid::nil();
        };
        let merged = self.merged();
        client.capture_transaction(transaction, Some(&merged), hint)
    }

    /// Starts a session on the isolation tier.
    ///
    /// A missing release is a configuration error: it is logged and no
    /// session is started.
    pub fn start_session(&self) -> Option<StartedSessions> {
        let distinct_id = self.get_user().and_then(|user| {
            user.id
                .clone()
                .or_else(|| user.email.clone())
                .or_else(|| user.username.clone())
        });
        let tracker = self.read(ScopeSelector::Isolation).session_tracker();
        match tracker.start_session(distinct_id) {
            Ok(started) => Some(started),
            Err(err) => {
                sdk_error!("failed to start session: {err}");
                None
            }
        }
    }

    /// Applies a change to the first active session, innermost tier first.
    pub fn update_session(&self, change: SessionChange) -> Option<Session> {
        self.active_session_tracker()?.update(change)
    }

    /// Ends the first active session, innermost tier first.
    pub fn end_session(&self) -> Option<Session> {
        self.active_session_tracker()?.end(None)
    }

    fn active_session_tracker(&self) -> Option<SessionTracker> {
        for selector in [
            ScopeSelector::Current,
            ScopeSelector::Isolation,
            ScopeSelector::Global,
        ] {
            let tracker = self.read(selector).session_tracker();
            if tracker.has_active_session() {
                return Some(tracker);
            }
        }
        None
    }
}

impl Clone for ScopeComposer {
    fn clone(&self) -> ScopeComposer {
        self.fork()
    }
}

/// The composed read view over the three tiers.
///
/// Single-valued fields resolve innermost first; map-valued fields merge
/// with inner tiers winning on key conflicts.
pub struct MergedScope {
    global: Scope,
    isolation: Scope,
    current: Scope,
    trackers: [SessionTracker; 3],
}

impl fmt::Debug for MergedScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergedScope")
            .field("global", &self.global)
            .field("isolation", &self.isolation)
            .field("current", &self.current)
            .finish()
    }
}

impl MergedScope {
    fn innermost_first(&self) -> [&Scope; 3] {
        [&self.current, &self.isolation, &self.global]
    }

    fn outermost_first(&self) -> [&Scope; 3] {
        [&self.global, &self.isolation, &self.current]
    }

    fn first<T>(&self, f: impl Fn(&Scope) -> Option<T>) -> Option<T> {
        self.innermost_first().into_iter().find_map(f)
    }
}

impl ScopeLike for MergedScope {
    fn level(&self) -> Option<Level> {
        self.first(|scope| scope.level)
    }

    fn transaction_name(&self) -> Option<String> {
        self.first(|scope| scope.transaction_name.as_deref().map(str::to_owned))
    }

    fn user(&self) -> Option<Arc<User>> {
        self.first(|scope| scope.user.clone())
    }

    fn request(&self) -> Option<Arc<Request>> {
        self.first(|scope| scope.request.clone())
    }

    fn fingerprint(&self) -> Vec<String> {
        self.first(|scope| scope.fingerprint.as_deref().cloned())
            .unwrap_or_default()
    }

    fn tags(&self) -> Map<String, String> {
        let mut merged = Map::new();
        for scope in self.outermost_first() {
            merged.extend(scope.tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        merged
    }

    fn extras(&self) -> Map<String, Value> {
        let mut merged = Map::new();
        for scope in self.outermost_first() {
            merged.extend(scope.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        merged
    }

    fn contexts(&self) -> Map<String, Context> {
        let mut merged = Map::new();
        for scope in self.outermost_first() {
            merged.extend(scope.contexts.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        merged
    }

    fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        let mut trail: Vec<Breadcrumb> = self
            .outermost_first()
            .into_iter()
            .flat_map(|scope| scope.breadcrumbs.iter().cloned())
            .collect();
        trail.sort_by_key(|breadcrumb| breadcrumb.timestamp);
        let capacity = self.current.breadcrumbs.capacity();
        if trail.len() > capacity {
            let excess = trail.len() - capacity;
            trail.drain(..excess);
        }
        trail
    }

    fn attachments(&self) -> Vec<Attachment> {
        self.outermost_first()
            .into_iter()
            .flat_map(|scope| scope.attachments.iter().cloned())
            .collect()
    }

    fn event_processors(&self) -> Vec<Arc<dyn EventProcessor>> {
        let mut processors: Vec<Arc<dyn EventProcessor>> = self
            .outermost_first()
            .into_iter()
            .flat_map(|scope| scope.event_processors.iter().cloned())
            .collect();
        processors.sort_by_key(|processor| processor.order());
        processors
    }

    fn span(&self) -> Option<SpanRef> {
        self.first(|scope| scope.span.clone())
    }

    fn propagation_context(&self) -> PropagationContext {
        self.current.propagation_context
    }

    fn session_tracker(&self) -> SessionTracker {
        for tracker in &self.trackers {
            if tracker.has_active_session() {
                return tracker.clone();
            }
        }
        // No tier holds a session; any tracker gives the right no-op.
        self.trackers[1].clone()
    }
}

#[cfg(test)]
mod tests {
    use beacon_types::protocol::SessionStatus;

    use crate::transport::TestTransport;

    use super::*;

    fn composer() -> ScopeComposer {
        ScopeComposer::new(Arc::new(ClientOptions::default()))
    }

    #[test]
    fn tag_precedence_inner_wins() {
        let composer = composer();
        composer.set_tag("env", "global", Some(ScopeSelector::Global));
        composer.set_tag("env", "isolation", Some(ScopeSelector::Isolation));
        composer.set_tag("region", "eu", Some(ScopeSelector::Global));
        assert_eq!(composer.get_tag("env").as_deref(), Some("isolation"));

        composer.set_tag("env", "current", Some(ScopeSelector::Current));
        assert_eq!(composer.get_tag("env").as_deref(), Some("current"));
        assert_eq!(composer.get_tag("region").as_deref(), Some("eu"));

        let merged = composer.merged();
        assert_eq!(merged.tags()["env"], "current");
        assert_eq!(merged.tags()["region"], "eu");
    }

    #[test]
    fn default_write_tier_receives_untargeted_mutations() {
        let mut composer = composer();
        composer.set_default_write_scope(ScopeSelector::Isolation);
        composer.set_tag("job", "worker-1", None);
        assert_eq!(
            composer.with_scope(ScopeSelector::Isolation, |scope| scope
                .tags
                .get("job")
                .cloned()),
            Some("worker-1".into())
        );
        assert!(composer.with_scope(ScopeSelector::Current, |scope| scope.tags.is_empty()));
    }

    #[test]
    fn fork_isolates_inner_tiers_and_shares_global() {
        let original = composer();
        original.set_tag("shared", "yes", Some(ScopeSelector::Global));

        let fork = original.fork();
        fork.set_tag("fork", "yes", Some(ScopeSelector::Current));
        original.set_tag("original", "yes", Some(ScopeSelector::Current));
        fork.set_tag("late-global", "yes", Some(ScopeSelector::Global));

        assert!(fork.get_tag("original").is_none());
        assert!(original.get_tag("fork").is_none());
        assert_eq!(original.get_tag("shared").as_deref(), Some("yes"));
        // Global writes are visible through every fork.
        assert_eq!(original.get_tag("late-global").as_deref(), Some("yes"));
    }

    #[test]
    fn disabled_inner_binding_does_not_shadow_outer_client() {
        let composer = composer();
        let enabled = Arc::new(Client::with_options(ClientOptions {
            transport: Some(Arc::new(TestTransport::new())),
            ..Default::default()
        }));
        composer.bind_client(Some(enabled.clone()), Some(ScopeSelector::Global));
        assert!(composer.get_client().is_some());

        // A disabled binding on an inner tier counts as absent; resolution
        // continues outward and still finds the enabled global client.
        composer.bind_client(None, Some(ScopeSelector::Current));
        let resolved = composer.get_client().unwrap();
        assert!(resolved.is_enabled());
        assert!(Arc::ptr_eq(&resolved, &enabled));
    }

    #[test]
    fn resolution_fails_when_only_disabled_clients_are_bound() {
        let composer = composer();
        composer.bind_client(None, Some(ScopeSelector::Global));
        composer.bind_client(None, Some(ScopeSelector::Isolation));
        assert!(composer.get_client().is_none());
    }

    #[test]
    fn merged_breadcrumbs_cap_keeps_most_recent() {
        use std::time::{Duration, SystemTime};

        let options = Arc::new(ClientOptions {
            max_breadcrumbs: 3,
            ..Default::default()
        });
        let composer = ScopeComposer::new(options);
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        for i in 0..5u64 {
            let crumb = Breadcrumb {
                timestamp: base + Duration::from_secs(i),
                message: Some(format!("crumb {i}")),
                ..Default::default()
            };
            let selector = if i % 2 == 0 {
                ScopeSelector::Isolation
            } else {
                ScopeSelector::Current
            };
            composer.add_breadcrumb(crumb, Some(selector));
        }

        let trail = composer.merged().breadcrumbs();
        let messages: Vec<_> = trail.iter().map(|b| b.message.clone().unwrap()).collect();
        assert_eq!(messages, vec!["crumb 2", "crumb 3", "crumb 4"]);
    }

    #[test]
    fn session_bookkeeping_reaches_live_slot_through_merged_view() {
        let options = Arc::new(ClientOptions {
            release: Some("app@1.0.0".into()),
            ..Default::default()
        });
        let composer = ScopeComposer::new(options);
        composer.start_session().unwrap();

        let merged = composer.merged();
        merged
            .session_tracker()
            .update(SessionChange::errored(false))
            .unwrap();

        let ended = composer.end_session().unwrap();
        assert_eq!(ended.errors, 1);
        assert_eq!(ended.status, SessionStatus::Exited);
    }

    #[test]
    fn restarting_session_returns_exited_previous() {
        let options = Arc::new(ClientOptions {
            release: Some("app@1.0.0".into()),
            ..Default::default()
        });
        let composer = ScopeComposer::new(options);
        let first = composer.start_session().unwrap();
        assert!(first.previous.is_none());

        let second = composer.start_session().unwrap();
        let previous = second.previous.unwrap();
        assert_eq!(previous.session_id, first.current.session_id);
        assert_eq!(previous.status, SessionStatus::Exited);
    }

    #[test]
    fn start_session_without_release_is_logged_noop() {
        let composer = composer();
        assert!(composer.start_session().is_none());
        assert!(composer.end_session().is_none());
    }
}
