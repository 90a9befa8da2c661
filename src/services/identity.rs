//! Anonymous identity issuing.

use futures::future::BoxFuture;
use tokio::sync::broadcast;
use tracing::debug;

use crate::{error::ServiceError, state::player::PlayerId};

const IDENTITY_CHANNEL_CAPACITY: usize = 64;

/// Issues the opaque identities players are keyed by.
pub trait IdentityProvider: Send + Sync {
    /// Issue a fresh identity.
    fn sign_in(&self) -> BoxFuture<'static, Result<PlayerId, ServiceError>>;

    /// Observe every identity issued from now on.
    fn subscribe(&self) -> broadcast::Receiver<PlayerId>;
}

/// Provider handing out random identities without credentials.
pub struct AnonymousIdentityProvider {
    issued: broadcast::Sender<PlayerId>,
}

impl AnonymousIdentityProvider {
    /// Create a provider with no subscribers.
    pub fn new() -> Self {
        let (issued, _rx) = broadcast::channel(IDENTITY_CHANNEL_CAPACITY);
        Self { issued }
    }
}

impl Default for AnonymousIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for AnonymousIdentityProvider {
    fn sign_in(&self) -> BoxFuture<'static, Result<PlayerId, ServiceError>> {
        let player = PlayerId::generate();
        // Nobody listening is fine.
        if self.issued.send(player.clone()).is_err() {
            debug!(player_id = %player, "identity issued without subscribers");
        }
        Box::pin(async move { Ok(player) })
    }

    fn subscribe(&self) -> broadcast::Receiver<PlayerId> {
        self.issued.subscribe()
    }
}
