use super::catalog::Catalog;
use super::clock::{Clock, Timestamp};
use super::entitlement::Grant;
use super::error::QuotaError;
use super::gate::{Outcome, PublicationGate, PublishReport};
use super::history::{PostedMessage, Publication};
use super::ledger::DailyCount;
use super::model::{BucketKey, CityName, NetworkName, NetworkScope, PostId};
use super::notify::NotificationSink;
use super::policy::QuotaPolicy;
use super::store::{QuotaState, QuotaStore};
use crate::prelude::*;
use crate::util::retry::retry_transient;
use metrics::increment_counter;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use teloxide::types::UserId;

pub struct QuotaServiceOptions {
    pub catalog: Arc<Catalog>,
    pub policy: QuotaPolicy,
    pub clock: Arc<dyn Clock>,
    pub store: Arc<dyn QuotaStore>,
    pub notifier: Arc<dyn NotificationSink>,
}

/// The single owner of the quota state of the process.
///
/// Mutations are serialized by an operation lock. Each of them is applied
/// to a copy of the state, the copy is persisted, and only then it replaces
/// the in-memory state. If persisting fails, the in-memory state is left
/// as it was.
pub struct QuotaService {
    op_lock: tokio::sync::Mutex<()>,
    state: RwLock<Arc<QuotaState>>,

    /// Whether `state` mirrors the store. Nothing is saved until it does.
    loaded: AtomicBool,

    catalog: Arc<Catalog>,
    policy: QuotaPolicy,
    clock: Arc<dyn Clock>,
    store: Arc<dyn QuotaStore>,
    notifier: Arc<dyn NotificationSink>,
}

/// What a mutation wants to happen to the draft state.
enum Change<T> {
    Commit(T),
    Discard(T),
}

/// Daily usage of a single network/city pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PairUsage {
    pub network: NetworkName,
    pub city: CityName,
    pub count: DailyCount,
    pub remaining: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GrantSummary {
    pub grant: Grant,
    pub active: bool,

    /// Today's usage of every catalog pair the grant covers
    pub usage: Vec<PairUsage>,
}

impl QuotaService {
    /// Loads the state from the store. If the store can't be read the
    /// service still starts, serving an empty state. Changes are refused
    /// until a later attempt to load succeeds.
    pub async fn load(opts: QuotaServiceOptions) -> Self {
        let (state, loaded) = match load_state(&*opts.store).await {
            Ok(state) => (state, true),
            Err(err) => {
                error!(
                    err = tracing_err(&err),
                    "Failed to load the quota state, starting read-only with an empty one"
                );
                (QuotaState::default(), false)
            }
        };

        Self {
            op_lock: Default::default(),
            state: RwLock::new(Arc::new(state)),
            loaded: AtomicBool::new(loaded),
            catalog: opts.catalog,
            policy: opts.policy,
            clock: opts.clock,
            store: opts.store,
            notifier: opts.notifier,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    #[instrument(skip(self))]
    pub async fn grant(
        &self,
        user_id: UserId,
        scope: NetworkScope,
        city: CityName,
        duration: chrono::Duration,
    ) -> Result<Grant, QuotaError> {
        self.ensure_city_exists(&scope, &city)?;

        let grant = self
            .mutate(|state, now| {
                let grant = state
                    .entitlements
                    .grant(user_id, scope, city, duration, now)?;
                Ok(Change::Commit(grant.clone()))
            })
            .await?;

        info!(expiry = ?grant.expiry, "Granted access");

        if let Some(expiry) = grant.expiry.at() {
            self.notifier.notify(
                user_id,
                format!(
                    "You have been granted posting access to {} / {} until {}",
                    grant.scope,
                    grant.city,
                    expiry.to_human_readable(),
                ),
            );
        }

        Ok(grant)
    }

    /// Shifts every grant of the user by `delta`. Returns the number of
    /// grants affected.
    #[instrument(skip(self))]
    pub async fn extend(&self, user_id: UserId, delta: chrono::Duration) -> Result<usize, QuotaError> {
        let shifted = self
            .mutate(|state, _| Ok(Change::Commit(state.entitlements.extend(user_id, delta)?)))
            .await?;

        info!(shifted, "Extended grants");

        self.notifier.notify(
            user_id,
            format!(
                "The expiry of your subscriptions was shifted by {} day(s)",
                delta.num_days()
            ),
        );

        Ok(shifted)
    }

    /// Runs the request through the gate and records a publication for every
    /// network it was approved for. The caller is expected to deliver the ad
    /// and then either [`Self::attach_message`] or [`Self::revoke_publish`].
    #[instrument(skip(self))]
    pub async fn try_publish(
        &self,
        user_id: UserId,
        scope: NetworkScope,
        city: CityName,
    ) -> Result<PublishReport, QuotaError> {
        let catalog = self.catalog.clone();
        let policy = self.policy.clone();

        let report = self
            .mutate(|state, now| {
                let QuotaState {
                    entitlements,
                    ledger,
                    publications,
                } = state;

                let report = PublicationGate {
                    catalog: &catalog,
                    policy: &policy,
                    entitlements: &*entitlements,
                    ledger,
                }
                .try_publish(user_id, &scope, &city, now);

                let mut published = false;
                for (outcome, post_id) in report.published() {
                    published = true;
                    publications.push(Publication {
                        post_id: post_id.clone(),
                        user_id,
                        network: outcome.network.clone(),
                        city: outcome.city.clone().unwrap_or_else(|| city.clone()),
                        published_at: *now,
                        deleted_at: None,
                        message: None,
                    });
                }

                Ok(if published {
                    Change::Commit(report)
                } else {
                    Change::Discard(report)
                })
            })
            .await?;

        for outcome in &report.outcomes {
            let label: &'static str = match &outcome.outcome {
                Outcome::Published(_) => "published",
                Outcome::Skipped(denial) => denial.into(),
            };
            increment_counter!("adpost_publish_outcomes_total", "outcome" => label);
        }

        info!(verdict = ?report.verdict(), summary = %report.summary(), "Publish request processed");

        Ok(report)
    }

    /// Remembers the Telegram message the post was delivered as.
    #[instrument(skip(self))]
    pub async fn attach_message(&self, post_id: &PostId, message: PostedMessage) -> Result<(), QuotaError> {
        self.mutate(|state, _| {
            let publication = state
                .publications
                .find_mut(post_id)
                .ok_or_else(|| QuotaError::PostNotFound {
                    post_id: post_id.clone(),
                })?;
            publication.message = Some(message);
            Ok(Change::Commit(()))
        })
        .await
    }

    /// Undoes an approved publication that could not be delivered, so it
    /// doesn't consume the quota.
    #[instrument(skip(self))]
    pub async fn revoke_publish(&self, post_id: &PostId) -> Result<(), QuotaError> {
        self.mutate(|state, _| {
            let publication = state
                .publications
                .remove(post_id)
                .ok_or_else(|| QuotaError::PostNotFound {
                    post_id: post_id.clone(),
                })?;

            state
                .ledger
                .revoke_publish(&publication.bucket_key(), post_id);

            Ok(Change::Commit(()))
        })
        .await?;

        warn!("Revoked the publication");
        Ok(())
    }

    /// Marks the user's post as deleted. The post keeps consuming today's
    /// quota. Returns the publication so that the caller can remove the
    /// Telegram message.
    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: UserId, post_id: &PostId) -> Result<Publication, QuotaError> {
        self.mutate(|state, now| {
            let not_found = || QuotaError::PostNotFound {
                post_id: post_id.clone(),
            };

            let publication = state
                .publications
                .find_mut(post_id)
                .filter(|publication| publication.user_id == user_id)
                .ok_or_else(not_found)?;

            if publication.is_deleted() {
                return Ok(Change::Discard(publication.clone()));
            }

            publication.deleted_at = Some(*now);
            let publication = publication.clone();

            let counted = state
                .ledger
                .record_delete(&publication.bucket_key(), post_id, now);

            if !counted {
                debug!("The post was made on a previous day, quota is unaffected");
            }

            Ok(Change::Commit(publication))
        })
        .await
    }

    pub fn count_today(&self, key: &BucketKey) -> DailyCount {
        self.state.read().ledger.count_today(key, &self.now())
    }

    pub fn remaining(&self, key: &BucketKey) -> u32 {
        self.state
            .read()
            .ledger
            .remaining(key, self.policy.per_pair_cap, &self.now())
    }

    /// All grants of the user with today's usage of the pairs they cover.
    pub fn entitlement_summary(&self, user_id: UserId) -> Vec<GrantSummary> {
        let now = self.now();
        let state = self.state.read();

        state
            .entitlements
            .grants_of(user_id)
            .map(|grant| {
                let pairs: Vec<_> = match &grant.scope {
                    NetworkScope::All => self.catalog.networks_with_city(&grant.city).collect(),
                    NetworkScope::Network(name) => self
                        .catalog
                        .network(name)
                        .and_then(|network| Some((network, network.city(&grant.city)?)))
                        .into_iter()
                        .collect(),
                };

                let usage = pairs
                    .into_iter()
                    .map(|(network, city)| {
                        let key = BucketKey::new(user_id, network.name.clone(), city.name.clone());
                        PairUsage {
                            network: network.name.clone(),
                            city: city.name.clone(),
                            count: state.ledger.count_today(&key, &now),
                            remaining: state.ledger.remaining(&key, self.policy.per_pair_cap, &now),
                        }
                    })
                    .collect();

                GrantSummary {
                    grant: grant.clone(),
                    active: grant.is_active(&now),
                    usage,
                }
            })
            .collect()
    }

    /// Publications of the user, newest first.
    pub fn history(&self, user_id: UserId, limit: usize) -> Vec<Publication> {
        self.state
            .read()
            .publications
            .of_user(user_id)
            .take(limit)
            .cloned()
            .collect()
    }

    fn ensure_city_exists(&self, scope: &NetworkScope, city: &CityName) -> Result<(), QuotaError> {
        let exists = match scope {
            NetworkScope::All => self.catalog.networks_with_city(city).next().is_some(),
            NetworkScope::Network(name) => self
                .catalog
                .network(name)
                .and_then(|network| network.city(city))
                .is_some(),
        };

        if exists {
            return Ok(());
        }

        Err(QuotaError::UnknownCity {
            scope: scope.clone(),
            city: city.clone(),
        })
    }

    /// Retries the load that failed at startup. Must be called under the
    /// operation lock.
    async fn ensure_loaded(&self) -> Result<(), QuotaError> {
        if self.loaded.load(Ordering::Acquire) {
            return Ok(());
        }

        let state = load_state(&*self.store).await.map_err(|source| {
            increment_counter!("adpost_persist_failures_total");
            error!(
                err = tracing_err(&source),
                "The quota state is still not loaded, the change is refused"
            );
            QuotaError::PersistenceUnavailable { source }
        })?;

        *self.state.write() = Arc::new(state);
        self.loaded.store(true, Ordering::Release);

        Ok(())
    }

    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut QuotaState, &Timestamp) -> Result<Change<T>, QuotaError>,
    ) -> Result<T, QuotaError> {
        let _guard = self.op_lock.lock().await;

        self.ensure_loaded().await?;

        let now = self.clock.now();
        let before = self.state.read().clone();
        let mut draft = QuotaState::clone(&before);

        let value = match f(&mut draft, &now)? {
            Change::Discard(value) => return Ok(value),
            Change::Commit(value) => value,
        };

        retry_transient(|| self.store.save(&before, &draft), crate::Error::is_transient)
            .await
            .map_err(|source| {
                increment_counter!("adpost_persist_failures_total");
                error!(
                    err = tracing_err(&source),
                    "Failed to persist the quota state, the change is discarded"
                );
                QuotaError::PersistenceUnavailable { source }
            })?;

        increment_counter!("adpost_persisted_writes_total");

        *self.state.write() = Arc::new(draft);

        Ok(value)
    }
}

async fn load_state(store: &dyn QuotaStore) -> crate::Result<QuotaState> {
    let state = retry_transient(|| store.load(), crate::Error::is_transient).await?;
    info!(
        grants = state.entitlements.grants().len(),
        publications = state.publications.records().len(),
        "Loaded the quota state"
    );
    Ok(state)
}
