use crate::backend::AuthBackend;
use dashmap::DashMap;
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The signed-in user as the rest of the application sees them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// Opaque identifier issued by the auth backend.
    pub id: String,
    pub name: String,
}

/// Change notification published by an auth backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn { token: String, identity: Identity },
    SignedOut { token: String },
}

impl AuthEvent {
    pub fn token(&self) -> &str {
        match self {
            AuthEvent::SignedIn { token, .. } => token,
            AuthEvent::SignedOut { token } => token,
        }
    }
}

/// Fan-out of auth events to every live subscription.
#[derive(Debug, Default)]
pub struct AuthEvents {
    next_id: AtomicU64,
    subscribers: DashMap<u64, UnboundedSender<AuthEvent>>,
}

impl AuthEvents {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = unbounded();
        self.subscribers.insert(id, tx);
        Subscription {
            id,
            events: Arc::clone(self),
            receiver: rx,
        }
    }

    pub fn publish(&self, event: AuthEvent) {
        // Receivers of subscriptions that were leaked rather than dropped are pruned here.
        self.subscribers
            .retain(|_, tx| tx.unbounded_send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Live registration with `AuthEvents`. Unregisters on drop.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    events: Arc<AuthEvents>,
    receiver: UnboundedReceiver<AuthEvent>,
}

impl Subscription {
    /// Returns the next queued event without waiting.
    pub fn try_next(&mut self) -> Option<AuthEvent> {
        match self.receiver.try_next() {
            Ok(Some(event)) => Some(event),
            _ => None,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.events.subscribers.remove(&self.id);
    }
}

/// Tracks the identity behind one session token for as long as it lives.
#[derive(Debug)]
pub struct SessionTracker {
    token: Option<String>,
    identity: Option<Identity>,
    resolving: bool,
    subscription: Option<Subscription>,
}

impl SessionTracker {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token,
            identity: None,
            resolving: true,
            subscription: None,
        }
    }

    /// Subscribes to auth changes, then resolves the token.
    /// A failed lookup resolves to no identity.
    pub async fn mount(&mut self, auth: &dyn AuthBackend) {
        self.subscription = Some(auth.events().subscribe());

        self.identity = match &self.token {
            Some(token) => match auth.get_session(token).await {
                Ok(identity) => identity,
                Err(e) => {
                    log::warn!("SessionTracker: get_session failed: {}", e);
                    None
                }
            },
            None => None,
        };
        self.resolving = false;
    }

    /// Applies any auth events published since the last call.
    pub fn sync(&mut self) {
        let subscription = match self.subscription.as_mut() {
            Some(subscription) => subscription,
            None => return,
        };

        while let Some(event) = subscription.try_next() {
            if self.token.as_deref() != Some(event.token()) {
                continue;
            }
            match event {
                AuthEvent::SignedIn { identity, .. } => self.identity = Some(identity),
                AuthEvent::SignedOut { .. } => self.identity = None,
            }
        }
    }

    /// Drops the subscription. Also happens when the tracker is dropped.
    pub fn unmount(&mut self) {
        self.subscription = None;
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_resolving(&self) -> bool {
        self.resolving
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }
}
