//! # KeyedRecoverableCache: one recoverable resource per key.
//!
//! Each key owns an independent [`RecoverableCache`] slot, so a session named
//! `"cbs"` recovers without touching the session named `"mgmt"`.
//!
//! ```text
//! get(key) ──► lock slots ──► slot for key (created on first use)
//!                              ├─► join or start the slot's cycle
//!                              └─► await it     (outside the lock)
//! ```
//!
//! ## Rules
//! - `evict(key)` forgets the slot once it is idle (nothing cached, no cycle
//!   running). A slot with a running cycle stays, so a key never has two
//!   population cycles at once.
//! - Owner-disposed and disposed states apply to existing and future slots.
//! - All slots share the keyed cache's terminated error.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::builder::CacheBuilder;
use crate::cache::factory::{KeyBound, KeyedResourceFactory, Recoverable};
use crate::cache::recoverable::RecoverableCache;
use crate::error::{AmqpError, SharedError};
use crate::events::Bus;
use crate::policies::RetryPolicy;

struct Slots<K, T: Recoverable + Clone> {
    by_key: BTreeMap<K, RecoverableCache<T>>,
    disposed: bool,
    owner_disposed: bool,
}

type SlotName<K> = Box<dyn Fn(&K) -> String + Send + Sync>;

/// A family of recoverable resources addressed by key.
pub struct KeyedRecoverableCache<K, T: Recoverable + Clone> {
    resource: Arc<str>,
    slot_name: Option<SlotName<K>>,
    factory: Arc<dyn KeyedResourceFactory<K, T>>,
    policy: Arc<dyn RetryPolicy>,
    bus: Option<Bus>,
    terminated: SharedError,
    slots: Mutex<Slots<K, T>>,
}

impl<K, T> KeyedRecoverableCache<K, T>
where
    K: Ord + Clone + Display + Send + Sync + 'static,
    T: Recoverable + Clone,
{
    /// Creates an empty keyed cache.
    ///
    /// `resource` names the family (e.g. `"session"`); slots are named
    /// `"{resource} '{key}'"`. `terminated_message` is the message of the error
    /// every slot returns after disposal.
    pub fn new(
        resource: impl Into<Arc<str>>,
        factory: impl KeyedResourceFactory<K, T>,
        policy: Arc<dyn RetryPolicy>,
        bus: Option<Bus>,
        terminated_message: impl Into<String>,
    ) -> Self {
        Self {
            resource: resource.into(),
            slot_name: None,
            factory: Arc::new(factory),
            policy,
            bus,
            terminated: Arc::new(AmqpError::Terminated {
                message: terminated_message.into(),
            }),
            slots: Mutex::new(Slots {
                by_key: BTreeMap::new(),
                disposed: false,
                owner_disposed: false,
            }),
        }
    }

    /// Overrides how slots are named in events and error messages.
    pub fn with_slot_names(mut self, name: impl Fn(&K) -> String + Send + Sync + 'static) -> Self {
        self.slot_name = Some(Box::new(name));
        self
    }

    /// Returns the active resource for `key`, creating it if necessary.
    ///
    /// # Errors
    /// Same as [`RecoverableCache::get`].
    pub async fn get(&self, key: &K) -> Result<T, SharedError> {
        let (slot, begin) = {
            let mut slots = self.slots.lock();
            if slots.disposed {
                return Err(Arc::clone(&self.terminated));
            }
            let slot = match slots.by_key.get(key) {
                Some(slot) => slot.clone(),
                None => {
                    let slot = self.slot(key.clone(), slots.owner_disposed);
                    slots.by_key.insert(key.clone(), slot.clone());
                    slot
                }
            };
            // joined under the lock so `evict` never forgets a slot about to run
            let begin = slot.begin();
            (slot, begin)
        };
        slot.finish(begin).await
    }

    fn slot(&self, key: K, owner_disposed: bool) -> RecoverableCache<T> {
        let name = match &self.slot_name {
            Some(name) => name(&key),
            None => format!("{} '{}'", self.resource, key),
        };
        let factory = KeyBound::new(key, Arc::clone(&self.factory));
        let slot = CacheBuilder::new(name, factory, Arc::clone(&self.policy))
            .with_bus_opt(self.bus.clone())
            .with_terminated_error(Arc::clone(&self.terminated))
            .build();
        if owner_disposed {
            slot.set_owner_disposed();
        }
        slot
    }

    /// Closes and forgets the current resource for `key`. Returns whether one was cached.
    ///
    /// The key itself is forgotten too unless a population cycle is running for it.
    pub fn evict(&self, key: &K) -> bool {
        let mut slots = self.slots.lock();
        let Some(slot) = slots.by_key.get(key).cloned() else {
            return false;
        };
        let evicted = slot.evict();
        if slot.is_idle() {
            slots.by_key.remove(key);
        }
        evicted
    }

    /// Returns the cached resource for `key` without populating.
    pub fn peek(&self, key: &K) -> Option<T> {
        let slot = self.slots.lock().by_key.get(key).cloned();
        slot.and_then(|slot| slot.peek())
    }

    /// Marks the owner as disposing; terminated entries stay cached from now on.
    pub fn set_owner_disposed(&self) {
        let slots: Vec<_> = {
            let mut slots = self.slots.lock();
            slots.owner_disposed = true;
            slots.by_key.values().cloned().collect()
        };
        for slot in slots {
            slot.set_owner_disposed();
        }
    }

    /// Disposes every slot. Idempotent; returns `true` for the disposing call only.
    pub fn dispose(&self) -> bool {
        let slots: Vec<_> = {
            let mut slots = self.slots.lock();
            if slots.disposed {
                return false;
            }
            slots.disposed = true;
            slots.by_key.values().cloned().collect()
        };
        for slot in slots {
            slot.dispose();
        }
        true
    }

    /// Whether [`KeyedRecoverableCache::dispose`] was called.
    pub fn is_disposed(&self) -> bool {
        self.slots.lock().disposed
    }

    /// Keys currently tracked, in order.
    pub fn keys(&self) -> Vec<K> {
        self.slots.lock().by_key.keys().cloned().collect()
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.slots.lock().by_key.len()
    }

    /// `true` if no key is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::factory::FactoryFn;
    use crate::cache::testing::{FakeLink, Scripted, Step, fast_policy, settle};
    use crate::error::ErrorCondition;

    type Sessions = KeyedRecoverableCache<String, Arc<FakeLink>>;

    fn sessions(factory: &Arc<Scripted>) -> Sessions {
        let factory = Arc::clone(factory);
        KeyedRecoverableCache::new(
            "session",
            FactoryFn::new(move |_name: &String| factory.make()),
            fast_policy(),
            None,
            "Session cache is terminated.",
        )
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let factory = Scripted::always(Step::Activate);
        let cache = sessions(&factory);

        let cbs = cache.get(&"cbs".to_string()).await.unwrap();
        let mgmt = cache.get(&"mgmt".to_string()).await.unwrap();
        assert_ne!(cbs.id, mgmt.id);

        cbs.fail(ErrorCondition::LinkDetachForced);
        settle().await;

        let mgmt_again = cache.get(&"mgmt".to_string()).await.unwrap();
        assert!(Arc::ptr_eq(&mgmt, &mgmt_again));
        let cbs_again = cache.get(&"cbs".to_string()).await.unwrap();
        assert!(!Arc::ptr_eq(&cbs, &cbs_again));
        assert_eq!(factory.calls(), 3);
        assert_eq!(cache.keys(), vec!["cbs".to_string(), "mgmt".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn factory_sees_the_key() {
        let cache: KeyedRecoverableCache<String, Arc<FakeLink>> = KeyedRecoverableCache::new(
            "session",
            FactoryFn::new(|name: &String| {
                if name == "forbidden" {
                    Err(AmqpError::Factory {
                        what: format!("session '{name}'"),
                        reason: "not allowed".into(),
                    })
                } else {
                    let link = FakeLink::new(0);
                    link.handle().activate();
                    Ok(link)
                }
            }),
            fast_policy(),
            None,
            "Session cache is terminated.",
        );

        assert!(cache.get(&"ok".to_string()).await.is_ok());
        let err = cache.get(&"forbidden".to_string()).await.unwrap_err();
        assert!(err.to_string().contains("session 'forbidden'"));
    }

    #[tokio::test(start_paused = true)]
    async fn evict_closes_only_that_key() {
        let factory = Scripted::always(Step::Activate);
        let cache = sessions(&factory);
        let a = cache.get(&"a".to_string()).await.unwrap();
        let b = cache.get(&"b".to_string()).await.unwrap();

        assert!(cache.evict(&"a".to_string()));
        assert!(!cache.evict(&"missing".to_string()));
        assert!(a.is_closed());
        assert!(!b.is_closed());
        assert!(cache.peek(&"a".to_string()).is_none());
        assert_eq!(cache.keys(), vec!["b".to_string()]);

        let a_again = cache.get(&"a".to_string()).await.unwrap();
        assert!(!Arc::ptr_eq(&a, &a_again));
        assert_eq!(factory.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn evict_keeps_a_key_whose_cycle_is_running() {
        let factory = Scripted::new([Step::Hang], Step::Activate);
        let cache = Arc::new(sessions(&factory));

        let first = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.get(&"slow".to_string()).await }
        });
        settle().await;

        assert!(!cache.evict(&"slow".to_string()));
        assert_eq!(cache.keys(), vec!["slow".to_string()]);

        let second = cache.get(&"slow".to_string()).await.unwrap();
        let first = first.await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_terminates_all_slots_with_shared_error() {
        let factory = Scripted::always(Step::Activate);
        let cache = sessions(&factory);
        let a = cache.get(&"a".to_string()).await.unwrap();

        assert!(cache.dispose());
        assert!(!cache.dispose());
        assert!(a.is_closed());

        let e1 = cache.get(&"a".to_string()).await.unwrap_err();
        let e2 = cache.get(&"never-seen".to_string()).await.unwrap_err();
        assert!(Arc::ptr_eq(&e1, &e2));
        assert_eq!(e1.to_string(), "Session cache is terminated.");
        assert_eq!(factory.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn owner_disposed_applies_to_new_slots() {
        let factory = Scripted::always(Step::Activate);
        let cache = sessions(&factory);
        cache.set_owner_disposed();

        let late = cache.get(&"late".to_string()).await.unwrap();
        late.fail(ErrorCondition::ConnectionForced);
        settle().await;

        let again = cache.get(&"late".to_string()).await.unwrap();
        assert!(Arc::ptr_eq(&late, &again));
        assert_eq!(factory.calls(), 1);
    }
}
