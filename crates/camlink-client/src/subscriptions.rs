use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use camlink_frame::MessageKind;
use camlink_registry::{Domain, ParsedEnvelope, Value};
use tracing::warn;

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(0);

/// A registered push callback.
///
/// Identity is the handle, not the closure: cloning a `Subscriber` keeps the
/// same identity (registering a clone twice is idempotent), while wrapping
/// the same closure in two `Subscriber::new` calls makes two distinct
/// registrations.
#[derive(Clone)]
pub struct Subscriber {
    id: u64,
    callback: Arc<dyn Fn(u8, Value) + Send + Sync>,
}

impl Subscriber {
    pub fn new(callback: impl Fn(u8, Value) + Send + Sync + 'static) -> Self {
        Self {
            id: NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed),
            callback: Arc::new(callback),
        }
    }

    fn invoke(&self, identifier: u8, value: Value) {
        let result = catch_unwind(AssertUnwindSafe(|| (self.callback)(identifier, value)));
        if result.is_err() {
            warn!(
                subscriber = self.id,
                identifier, "subscriber callback panicked; continuing dispatch"
            );
        }
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish()
    }
}

#[derive(Default)]
struct DomainTable {
    exact: HashMap<u8, Vec<Subscriber>>,
    wildcard: Vec<Subscriber>,
}

impl DomainTable {
    fn add(&mut self, identifier: Option<u8>, subscriber: &Subscriber) {
        let set = match identifier {
            Some(id) => self.exact.entry(id).or_default(),
            None => &mut self.wildcard,
        };
        if !set.iter().any(|s| s.id == subscriber.id) {
            set.push(subscriber.clone());
        }
    }

    fn remove(&mut self, identifier: Option<u8>, subscriber: Option<&Subscriber>) {
        match (identifier, subscriber) {
            (Some(id), Some(subscriber)) => {
                if let Some(set) = self.exact.get_mut(&id) {
                    set.retain(|s| s.id != subscriber.id);
                    if set.is_empty() {
                        self.exact.remove(&id);
                    }
                }
            }
            (Some(id), None) => {
                self.exact.remove(&id);
            }
            (None, Some(subscriber)) => {
                self.exact.retain(|_, set| {
                    set.retain(|s| s.id != subscriber.id);
                    !set.is_empty()
                });
                self.wildcard.retain(|s| s.id != subscriber.id);
            }
            (None, None) => {
                self.exact.clear();
                self.wildcard.clear();
            }
        }
    }

    /// Subscribers for one identifier: exact matches plus wildcards, each at
    /// most once even if registered both ways.
    fn targets(&self, identifier: u8) -> Vec<Subscriber> {
        let mut targets: Vec<Subscriber> = Vec::new();
        let exact = self.exact.get(&identifier).into_iter().flatten();
        for subscriber in exact.chain(self.wildcard.iter()) {
            if !targets.iter().any(|s| s.id == subscriber.id) {
                targets.push(subscriber.clone());
            }
        }
        targets
    }
}

/// Per-identifier callback sets for both asynchronous domains, plus a
/// wildcard set per domain.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    settings: DomainTable,
    statuses: DomainTable,
}

impl Tables {
    fn table(&mut self, domain: Domain) -> &mut DomainTable {
        match domain {
            Domain::Setting => &mut self.settings,
            Domain::Status => &mut self.statuses,
        }
    }
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register for one identifier, or for the whole domain (`None`).
    /// Idempotent per subscriber handle.
    pub(crate) fn register(
        &self,
        domain: Domain,
        identifier: Option<u8>,
        subscriber: &Subscriber,
    ) {
        self.inner
            .lock()
            .unwrap()
            .table(domain)
            .add(identifier, subscriber);
    }

    /// Unregister. `identifier: None` removes the subscriber from every
    /// identifier in the domain including the wildcard set; `subscriber:
    /// None` clears all callbacks for the identifier. Removing something not
    /// present is a no-op.
    pub(crate) fn unregister(
        &self,
        domain: Domain,
        identifier: Option<u8>,
        subscriber: Option<&Subscriber>,
    ) {
        self.inner
            .lock()
            .unwrap()
            .table(domain)
            .remove(identifier, subscriber);
    }

    /// Fan a push envelope out to its subscribers.
    ///
    /// Every `(param_id, value)` pair is delivered to the callbacks
    /// registered for that exact identifier plus the domain's wildcards.
    /// Callbacks run outside the registry lock and panics are isolated per
    /// callback, so one faulty subscriber cannot block the others.
    pub(crate) fn dispatch(&self, envelope: &ParsedEnvelope) {
        let domain = match envelope.kind {
            MessageKind::SettingPush => Domain::Setting,
            MessageKind::StatusPush => Domain::Status,
            _ => return,
        };

        for (param_id, value) in &envelope.values {
            let targets = {
                let mut inner = self.inner.lock().unwrap();
                inner.table(domain).targets(*param_id)
            };
            for subscriber in targets {
                subscriber.invoke(*param_id, value.clone());
            }
        }
    }
}
