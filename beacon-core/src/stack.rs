use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use beacon_types::protocol::{Breadcrumb, Event, Transaction};
use beacon_types::Uuid;

use crate::client::Client;
use crate::composer::{ScopeComposer, ScopeSelector};
use crate::error::run_guarded;
use crate::hint::Hint;
use crate::scope::Scope;

static DISABLED_CLIENT: LazyLock<Arc<Client>> = LazyLock::new(|| Arc::new(Client::disabled()));

/// One layer of a [`ScopeStack`]: a scope paired with the client that was
/// bound when the layer was pushed.
#[derive(Debug, Clone)]
pub struct StackEntry {
    /// The client active for this layer.
    pub client: Arc<Client>,
    /// The scope data of this layer.
    pub scope: Scope,
}

/// The push/pop scope model.
///
/// The stack always contains at least its root layer; popping the root is a
/// logged no-op. Pushing clones the top layer, so mutations made inside a
/// pushed section vanish when it is popped.
pub struct ScopeStack {
    layers: RwLock<Vec<StackEntry>>,
}

impl std::fmt::Debug for ScopeStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeStack")
            .field("depth", &self.depth())
            .finish()
    }
}

impl ScopeStack {
    /// Creates a stack with the given root layer.
    pub fn new(client: Option<Arc<Client>>, scope: Scope) -> ScopeStack {
        let client = client.unwrap_or_else(|| DISABLED_CLIENT.clone());
        ScopeStack {
            layers: RwLock::new(vec![StackEntry { client, scope }]),
        }
    }

    /// The number of layers, including the root.
    pub fn depth(&self) -> usize {
        self.layers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Pushes a new layer cloned from the current top.
    pub fn push_scope(&self) {
        let mut layers = self.layers.write().unwrap_or_else(PoisonError::into_inner);
        let top = layers.last().expect("stack owns at least the root layer");
        let next = top.clone();
        layers.push(next);
    }

    /// Pops the top layer, unless it is the root.
    pub fn pop_scope(&self) {
        let mut layers = self.layers.write().unwrap_or_else(PoisonError::into_inner);
        if layers.len() <= 1 {
            sdk_warn!("attempted to pop the root scope layer, ignoring");
            return;
        }
        layers.pop();
    }

    /// Binds a client to the top layer.
    ///
    /// `None` binds the shared disabled client, which deactivates capturing
    /// for this layer without special-casing the absence of a client.
    pub fn bind_client(&self, client: Option<Arc<Client>>) {
        let client = client.unwrap_or_else(|| DISABLED_CLIENT.clone());
        let mut layers = self.layers.write().unwrap_or_else(PoisonError::into_inner);
        let top = layers.last_mut().expect("stack owns at least the root layer");
        top.client = client;
    }

    /// The client of the top layer.
    pub fn client(&self) -> Arc<Client> {
        self.with_top(|top| top.client.clone())
    }

    /// Runs a closure with read access to the top layer.
    pub fn with_top<R>(&self, f: impl FnOnce(&StackEntry) -> R) -> R {
        let layers = self.layers.read().unwrap_or_else(PoisonError::into_inner);
        f(layers.last().expect("stack owns at least the root layer"))
    }

    /// Runs a closure with mutable access to the top layer's scope.
    pub fn configure_top<R>(&self, f: impl FnOnce(&mut Scope) -> R) -> R {
        let mut layers = self.layers.write().unwrap_or_else(PoisonError::into_inner);
        let top = layers.last_mut().expect("stack owns at least the root layer");
        f(&mut top.scope)
    }

    /// Pushes a layer, configures it, runs the callback and pops again.
    ///
    /// The layer is popped no matter how the callback exits; a panic inside
    /// it is logged and the default value returned.
    pub fn with_scope<R: Default>(
        &self,
        config: impl FnOnce(&mut Scope),
        callback: impl FnOnce() -> R,
    ) -> R {
        self.push_scope();
        self.configure_top(config);
        let result = run_guarded(callback);
        self.pop_scope();
        match result {
            Ok(value) => value,
            Err(err) => {
                sdk_error!("with_scope callback failed: {err}");
                Default::default()
            }
        }
    }

    /// Records a breadcrumb on the top layer.
    pub fn add_breadcrumb(&self, breadcrumb: Breadcrumb) {
        self.configure_top(|scope| scope.add_breadcrumb(breadcrumb));
    }

    /// Captures an event against the top layer.
    pub fn capture_event(&self, event: Event, hint: &Hint) -> Uuid {
        self.with_top(|top| top.client.capture_event(event, Some(&top.scope), hint))
    }

    /// Captures a transaction against the top layer.
    pub fn capture_transaction(&self, transaction: Transaction, hint: &Hint) -> Uuid {
        self.with_top(|top| {
            top.client
                .capture_transaction(transaction, Some(&top.scope), hint)
        })
    }

    /// Projects the stack onto the three-tier model.
    ///
    /// The root layer becomes the isolation tier and the top layer the
    /// current tier; the given global tier is shared as-is. The projected
    /// tiers carry their layer's client so resolution behaves the same in
    /// both models.
    pub fn to_composer(&self, global: Arc<std::sync::RwLock<Scope>>) -> ScopeComposer {
        let layers = self.layers.read().unwrap_or_else(PoisonError::into_inner);
        let root = layers.first().expect("stack owns at least the root layer");
        let top = layers.last().expect("stack owns at least the root layer");

        let mut isolation = root.scope.clone();
        isolation.bind_client(Some(root.client.clone()));
        let mut current = top.scope.clone();
        current.bind_client(Some(top.client.clone()));

        ScopeComposer::from_tiers(global, isolation, current, ScopeSelector::Current)
    }
}
