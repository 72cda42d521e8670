use std::sync::Arc;

use crate::cache::{KeyedRecoverableCache, KeyedResourceFactory, Recoverable};
use crate::error::SharedError;
use crate::events::Bus;
use crate::policies::RetryPolicy;
use crate::resources::context::ResourceContext;

const TERMINATED: &str = "Session cache is terminated.";

/// Sessions of one connection, recovered independently by name.
///
/// The owning connection calls [`SessionCache::set_owner_disposed`] before it
/// tears down, so sessions that terminate during shutdown are not recreated.
pub struct SessionCache<S: Recoverable + Clone> {
    context: ResourceContext,
    sessions: KeyedRecoverableCache<String, S>,
}

impl<S: Recoverable + Clone> SessionCache<S> {
    /// Creates an empty session cache. `context` describes the owning connection.
    pub fn new(
        context: ResourceContext,
        factory: impl KeyedResourceFactory<String, S>,
        policy: Arc<dyn RetryPolicy>,
        bus: Option<Bus>,
    ) -> Self {
        let slot_context = context.child("session");
        let sessions = KeyedRecoverableCache::new("session", factory, policy, bus, TERMINATED)
            .with_slot_names(move |name: &String| slot_context.clone().with_name(name).to_string());
        Self { context, sessions }
    }

    /// Returns the active session `name`, creating it if necessary.
    ///
    /// # Errors
    /// The non-retriable error of the session's population cycle, or the
    /// terminated error after [`SessionCache::dispose`].
    pub async fn get(&self, name: &str) -> Result<S, SharedError> {
        self.sessions.get(&name.to_string()).await
    }

    /// Closes session `name`; the next `get(name)` creates a new one.
    pub fn evict(&self, name: &str) -> bool {
        self.sessions.evict(&name.to_string())
    }

    /// Keeps terminated sessions cached while the owning connection shuts down.
    pub fn set_owner_disposed(&self) {
        self.sessions.set_owner_disposed();
    }

    /// Closes every session and stops recovering them. Idempotent.
    pub fn dispose(&self) -> bool {
        self.sessions.dispose()
    }

    /// Whether the cache was disposed.
    pub fn is_disposed(&self) -> bool {
        self.sessions.is_disposed()
    }

    /// Names of the sessions currently tracked (evicted idle names are dropped).
    pub fn names(&self) -> Vec<String> {
        self.sessions.keys()
    }

    /// Identity of the owning connection.
    pub fn context(&self) -> &ResourceContext {
        &self.context
    }
}
