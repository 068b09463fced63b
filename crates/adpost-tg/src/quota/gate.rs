use super::catalog::{Catalog, City, Network};
use super::clock::Timestamp;
use super::entitlement::EntitlementStore;
use super::ledger::QuotaLedger;
use super::model::{BucketKey, CityName, NetworkName, NetworkScope, PostId};
use super::policy::QuotaPolicy;
use crate::prelude::*;
use itertools::Itertools;
use teloxide::types::{ChatId, UserId};

/// Why a network was skipped by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Denial {
    NoEntitlement,
    QuotaExceeded,
    UnknownCity,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Published(PostId),
    Skipped(Denial),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkOutcome {
    pub network: NetworkName,

    /// Canonical name of the city inside of this network, if it has one
    pub city: Option<CityName>,

    pub chat_id: Option<ChatId>,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed { published: usize, requested: usize },
    Denied(Denial),
}

/// Result of a single publish request, with an outcome for each network
/// the request expanded to.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishReport {
    pub user_id: UserId,
    pub scope: NetworkScope,
    pub city: CityName,
    pub outcomes: Vec<NetworkOutcome>,
}

impl PublishReport {
    pub fn verdict(&self) -> Verdict {
        let published = self.published().count();
        if published > 0 {
            return Verdict::Allowed {
                published,
                requested: self.outcomes.len(),
            };
        }

        let denials = self.outcomes.iter().filter_map(|outcome| match outcome.outcome {
            Outcome::Skipped(denial) => Some(denial),
            Outcome::Published(_) => None,
        });

        let denial = if self.outcomes.is_empty() {
            Denial::UnknownCity
        } else if denials.clone().all(|denial| denial == Denial::NoEntitlement) {
            Denial::NoEntitlement
        } else if denials.clone().any(|denial| denial == Denial::QuotaExceeded) {
            Denial::QuotaExceeded
        } else {
            Denial::UnknownCity
        };

        Verdict::Denied(denial)
    }

    pub fn published(&self) -> impl Iterator<Item = (&NetworkOutcome, &PostId)> {
        self.outcomes.iter().filter_map(|outcome| match &outcome.outcome {
            Outcome::Published(post_id) => Some((outcome, post_id)),
            Outcome::Skipped(_) => None,
        })
    }

    /// One-line description of the outcomes for logs and replies.
    pub fn summary(&self) -> String {
        self.outcomes
            .iter()
            .map(|outcome| match &outcome.outcome {
                Outcome::Published(post_id) => format!("{}: published {post_id}", outcome.network),
                Outcome::Skipped(denial) => format!("{}: {denial}", outcome.network),
            })
            .join(", ")
    }
}

/// Decides whether a post is allowed and records it in the ledger if so.
pub struct PublicationGate<'a> {
    pub catalog: &'a Catalog,
    pub policy: &'a QuotaPolicy,
    pub entitlements: &'a EntitlementStore,
    pub ledger: &'a mut QuotaLedger,
}

impl<'a> PublicationGate<'a> {
    pub fn try_publish(
        &mut self,
        user_id: UserId,
        scope: &NetworkScope,
        city: &CityName,
        now: &Timestamp,
    ) -> PublishReport {
        let catalog = self.catalog;
        let outcomes = expand(catalog, scope, city)
            .into_iter()
            .map(|(network, target)| {
                let Some(target) = target else {
                    info!(%user_id, %network, %city, "Network has no such city");
                    return NetworkOutcome {
                        network,
                        city: None,
                        chat_id: None,
                        outcome: Outcome::Skipped(Denial::UnknownCity),
                    };
                };

                let outcome = self.publish_into(user_id, &network, target, now);

                if let Outcome::Skipped(denial) = &outcome {
                    info!(%user_id, %network, city = %target.name, %denial, "Post skipped");
                }

                NetworkOutcome {
                    network,
                    city: Some(target.name.clone()),
                    chat_id: Some(target.chat_id),
                    outcome,
                }
            })
            .collect();

        PublishReport {
            user_id,
            scope: scope.clone(),
            city: city.clone(),
            outcomes,
        }
    }

    fn publish_into(
        &mut self,
        user_id: UserId,
        network: &NetworkName,
        city: &City,
        now: &Timestamp,
    ) -> Outcome {
        if !self.entitlements.is_entitled(user_id, network, city, now) {
            return Outcome::Skipped(Denial::NoEntitlement);
        }

        let per_pair_cap = self.policy.per_pair_cap;
        let key = BucketKey::new(user_id, network.clone(), city.name.clone());

        if self.ledger.remaining(&key, per_pair_cap, now) == 0 {
            return Outcome::Skipped(Denial::QuotaExceeded);
        }

        if let Some(wildcard_city) = self.entitlements.wildcard_city(user_id, city, now) {
            let pool: Vec<_> = self
                .catalog
                .networks_with_city(wildcard_city)
                .map(|(network, city)| BucketKey::new(user_id, network.name.clone(), city.name.clone()))
                .collect();

            let cap_total = self.policy.aggregate_cap_for(pool.len());
            let remaining = self
                .ledger
                .aggregate_remaining(&pool, per_pair_cap, cap_total, now);

            if remaining == 0 {
                return Outcome::Skipped(Denial::QuotaExceeded);
            }
        }

        Outcome::Published(self.ledger.record_publish(&key, now))
    }
}

/// Networks the request expands to, paired with the city inside of each of
/// them. `None` means the network doesn't exist or doesn't have such a city.
fn expand<'c>(
    catalog: &'c Catalog,
    scope: &NetworkScope,
    city: &'c CityName,
) -> Vec<(NetworkName, Option<&'c City>)> {
    match scope {
        NetworkScope::All => catalog
            .networks_with_city(city)
            .map(|(network, city)| (network.name.clone(), Some(city)))
            .collect(),
        NetworkScope::Network(name) => {
            let city = catalog.network(name).and_then(|network: &Network| network.city(city));
            vec![(name.clone(), city)]
        }
    }
}
