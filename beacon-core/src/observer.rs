use beacon_types::protocol::{Breadcrumb, User, Value};

/// Mirrors scope mutations to an external store.
///
/// Observers exist so a native layer or crash handler can keep its own copy
/// of the scope in sync. Every method has a no-op default; implementors
/// override only the mutations they care about. Observer failures are
/// contained by the scope and never affect the mutation itself.
#[allow(unused_variables)]
pub trait ScopeObserver: Send + Sync {
    /// A tag was set.
    fn set_tag(&self, key: &str, value: &str) {}

    /// A tag was removed.
    fn remove_tag(&self, key: &str) {}

    /// An extra value was set.
    fn set_extra(&self, key: &str, value: &Value) {}

    /// An extra value was removed.
    fn remove_extra(&self, key: &str) {}

    /// The user was set or cleared.
    fn set_user(&self, user: Option<&User>) {}

    /// A breadcrumb was recorded, after the before-breadcrumb callback ran.
    fn add_breadcrumb(&self, breadcrumb: &Breadcrumb) {}
}
