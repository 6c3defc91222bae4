//! In-memory purchase sessions.
//!
//! One session per Discord user, dropped after a period of inactivity.
//! Sessions live only in this process; a restart sends users back to
//! `/shop`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use moka::ops::compute::Op;

use shopbot_core::DiscordId;

use crate::flow::{Action, FlowError, Step};

/// Upper bound on concurrent sessions.
const MAX_SESSIONS: u64 = 10_000;

/// A user's progress through the purchase flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseSession {
    pub guild_id: DiscordId,
    pub step: Step,
    pub created_at: DateTime<Utc>,
}

/// Sessions keyed by Discord user ID with an idle TTL.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Cache<DiscordId, PurchaseSession>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("entries", &self.sessions.entry_count())
            .finish()
    }
}

impl SessionStore {
    /// Create a store whose sessions expire after `idle_ttl` without use.
    #[must_use]
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            sessions: Cache::builder()
                .max_capacity(MAX_SESSIONS)
                .time_to_idle(idle_ttl)
                .build(),
        }
    }

    /// Start (or restart) a session at `step`.
    pub async fn start(&self, user: DiscordId, guild_id: DiscordId, step: Step) -> PurchaseSession {
        let session = PurchaseSession {
            guild_id,
            step,
            created_at: Utc::now(),
        };
        self.sessions.insert(user, session.clone()).await;
        session
    }

    /// Current session of `user`.
    pub async fn get(&self, user: &DiscordId) -> Option<PurchaseSession> {
        self.sessions.get(user).await
    }

    /// Apply `action` to the user's session and store the result.
    ///
    /// Read and write happen under the cache's per-key lock, so concurrent
    /// clicks of one user are applied one after the other and each sees the
    /// step the previous one left behind.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::NoSession` when the user has no live session and
    /// the transition errors of [`Step::advance`] otherwise. A rejected
    /// transition leaves the session unchanged.
    pub async fn advance(
        &self,
        user: &DiscordId,
        action: Action,
    ) -> Result<PurchaseSession, FlowError> {
        let mut outcome = Err(FlowError::NoSession);
        self.sessions
            .entry_by_ref(user)
            .and_compute_with(|entry| {
                let op = match entry.map(moka::Entry::into_value) {
                    None => Op::Nop,
                    Some(mut session) => match session.step.advance(action) {
                        Ok(step) => {
                            session.step = step;
                            outcome = Ok(session.clone());
                            Op::Put(session)
                        }
                        Err(e) => {
                            outcome = Err(e);
                            Op::Nop
                        }
                    },
                };
                std::future::ready(op)
            })
            .await;
        outcome
    }

    /// Drop the user's session.
    pub async fn end(&self, user: &DiscordId) -> Option<PurchaseSession> {
        self.sessions.remove(user).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use shopbot_core::{CategoryId, ProductId};

    fn ids() -> (DiscordId, DiscordId) {
        (
            DiscordId::parse("80351110224678912").unwrap(),
            DiscordId::parse("81384788765712384").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_start_and_advance() {
        let store = SessionStore::new(Duration::from_secs(60));
        let (user, guild) = ids();

        store.start(user.clone(), guild.clone(), Step::Categories).await;
        let session = store
            .advance(&user, Action::SelectCategory(CategoryId::new(2)))
            .await
            .unwrap();
        assert_eq!(session.guild_id, guild);
        assert_eq!(
            session.step,
            Step::Products {
                category: Some(CategoryId::new(2))
            }
        );
        assert_eq!(store.get(&user).await.unwrap().step, session.step);
    }

    #[tokio::test]
    async fn test_rejected_action_keeps_step() {
        let store = SessionStore::new(Duration::from_secs(60));
        let (user, guild) = ids();
        store.start(user.clone(), guild, Step::Categories).await;

        let err = store
            .advance(&user, Action::Buy(ProductId::new(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::UnexpectedAction { .. }));
        assert_eq!(store.get(&user).await.unwrap().step, Step::Categories);
    }

    #[tokio::test]
    async fn test_concurrent_confirms_place_one_order() {
        let store = SessionStore::new(Duration::from_secs(60));
        let (user, guild) = ids();
        let product = ProductId::new(7);
        store
            .start(
                user.clone(),
                guild,
                Step::Confirm {
                    category: None,
                    product,
                },
            )
            .await;

        let clicks = (0..8).map(|_| {
            let store = store.clone();
            let user = user.clone();
            tokio::spawn(async move { store.advance(&user, Action::PlaceOrder(product)).await })
        });
        let mut placed = 0;
        for click in clicks.collect::<Vec<_>>() {
            if click.await.unwrap().is_ok() {
                placed += 1;
            }
        }
        assert_eq!(placed, 1);
        assert_eq!(
            store.get(&user).await.unwrap().step,
            Step::Placing {
                category: None,
                product
            }
        );
    }

    #[tokio::test]
    async fn test_missing_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        let (user, _) = ids();
        assert_eq!(
            store.advance(&user, Action::Back).await,
            Err(FlowError::NoSession)
        );
    }

    #[tokio::test]
    async fn test_end_removes_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        let (user, guild) = ids();
        store.start(user.clone(), guild, Step::Categories).await;
        assert!(store.end(&user).await.is_some());
        assert!(store.get(&user).await.is_none());
    }

    #[tokio::test]
    async fn test_idle_sessions_expire() {
        let store = SessionStore::new(Duration::from_millis(50));
        let (user, guild) = ids();
        store.start(user.clone(), guild, Step::Categories).await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(store.get(&user).await.is_none());
    }
}
