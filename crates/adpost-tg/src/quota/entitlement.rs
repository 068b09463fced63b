use super::catalog::City;
use super::clock::Timestamp;
use super::error::QuotaError;
use super::model::{CityName, NetworkName, NetworkScope};
use teloxide::types::UserId;

#[derive(Debug, Clone, PartialEq)]
pub enum Expiry {
    At(Timestamp),

    /// The value read from storage that could not be parsed. Such a grant
    /// is never active, but it is kept so that admins can see it.
    Malformed(String),
}

impl Expiry {
    pub fn at(&self) -> Option<&Timestamp> {
        match self {
            Self::At(at) => Some(at),
            Self::Malformed(_) => None,
        }
    }
}

/// A time-bounded permission to post into `scope` for `city`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grant {
    pub user_id: UserId,
    pub scope: NetworkScope,
    pub city: CityName,
    pub expiry: Expiry,
}

impl Grant {
    pub fn is_active(&self, now: &Timestamp) -> bool {
        self.expiry.at().is_some_and(|expiry| now < expiry)
    }

    /// Whether this grant refers to `city` of `network`, regardless of expiry.
    pub fn covers(&self, network: &NetworkName, city: &City) -> bool {
        self.scope.covers(network) && city.answers_to(&self.city)
    }
}

/// All grants ever issued. Expired grants stay here, they just stop matching.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntitlementStore {
    grants: Vec<Grant>,
}

impl EntitlementStore {
    pub fn from_grants(grants: Vec<Grant>) -> Self {
        Self { grants }
    }

    pub fn grants(&self) -> &[Grant] {
        &self.grants
    }

    pub fn grant(
        &mut self,
        user_id: UserId,
        scope: NetworkScope,
        city: CityName,
        duration: chrono::Duration,
        now: &Timestamp,
    ) -> Result<&Grant, QuotaError> {
        if duration <= chrono::Duration::zero() {
            return Err(QuotaError::InvalidGrant {
                reason: format!("the grant duration must be positive, but got {duration}"),
            });
        }

        let expiry = now
            .checked_add_signed(duration)
            .ok_or_else(|| QuotaError::InvalidGrant {
                reason: format!("the grant duration {duration} is out of range"),
            })?;

        self.grants.push(Grant {
            user_id,
            scope,
            city,
            expiry: Expiry::At(expiry),
        });

        Ok(&self.grants[self.grants.len() - 1])
    }

    /// Shifts the expiry of every grant of the user by `delta`, which may be
    /// negative. Returns the number of grants affected.
    pub fn extend(&mut self, user_id: UserId, delta: chrono::Duration) -> Result<usize, QuotaError> {
        let mut shifted = 0;
        let mut found = false;

        for grant in self.grants.iter_mut().filter(|grant| grant.user_id == user_id) {
            found = true;
            let Expiry::At(expiry) = &mut grant.expiry else {
                continue;
            };
            *expiry = expiry
                .checked_add_signed(delta)
                .ok_or_else(|| QuotaError::InvalidGrant {
                    reason: format!("shifting the expiry by {delta} is out of range"),
                })?;
            shifted += 1;
        }

        if !found {
            return Err(QuotaError::InvalidGrant {
                reason: format!("user {user_id} has no grants to extend"),
            });
        }

        Ok(shifted)
    }

    pub fn is_entitled(
        &self,
        user_id: UserId,
        network: &NetworkName,
        city: &City,
        now: &Timestamp,
    ) -> bool {
        self.active_matching(user_id, network, city, now)
            .next()
            .is_some()
    }

    /// The latest expiry among the active grants matching `(network, city)`.
    pub fn expiry(
        &self,
        user_id: UserId,
        network: &NetworkName,
        city: &City,
        now: &Timestamp,
    ) -> Option<Timestamp> {
        self.active_matching(user_id, network, city, now)
            .filter_map(|grant| grant.expiry.at().copied())
            .max()
    }

    /// The city name of an active wildcard grant that covers `city`, if any.
    /// The aggregate daily cap applies across every network carrying it.
    pub fn wildcard_city(&self, user_id: UserId, city: &City, now: &Timestamp) -> Option<&CityName> {
        self.grants_of(user_id)
            .filter(|grant| grant.scope.is_all() && grant.is_active(now))
            .find(|grant| city.answers_to(&grant.city))
            .map(|grant| &grant.city)
    }

    pub fn grants_of(&self, user_id: UserId) -> impl Iterator<Item = &Grant> {
        self.grants
            .iter()
            .filter(move |grant| grant.user_id == user_id)
    }

    fn active_matching<'a>(
        &'a self,
        user_id: UserId,
        network: &'a NetworkName,
        city: &'a City,
        now: &'a Timestamp,
    ) -> impl Iterator<Item = &'a Grant> + 'a {
        self.grants_of(user_id)
            .filter(move |grant| grant.is_active(now) && grant.covers(network, city))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::catalog::tests::catalog;
    use crate::quota::catalog::Catalog;
    use crate::quota::clock::tests::at;
    use assert_matches::assert_matches;
    use chrono::Duration;

    fn city<'c>(catalog: &'c Catalog, network: &str, city: &str) -> &'c City {
        catalog
            .network(&network.into())
            .unwrap()
            .city(&city.into())
            .unwrap()
    }

    fn entitled(store: &EntitlementStore, user: u64, network: &str, city_name: &str, now: &Timestamp) -> bool {
        let catalog = catalog();
        let city = city(&catalog, network, city_name);
        store.is_entitled(UserId(user), &network.into(), city, now)
    }

    #[test]
    fn nobody_is_entitled_without_grants() {
        let store = EntitlementStore::default();
        let now = at(2024, 5, 1, 12, 0, 0);

        assert!(!entitled(&store, 1, "NetA", "Metro", &now));
        assert_eq!(store.grants_of(UserId(1)).count(), 0);
    }

    #[test]
    fn exact_grant_covers_only_its_pair() {
        let mut store = EntitlementStore::default();
        let now = at(2024, 5, 1, 12, 0, 0);

        store
            .grant(UserId(2), NetworkScope::network("NetA"), "Town".into(), Duration::days(1), &now)
            .unwrap();

        assert!(entitled(&store, 2, "NetA", "Town", &now));
        assert!(!entitled(&store, 2, "NetB", "Town", &now));
        assert!(!entitled(&store, 2, "NetA", "Metro", &now));
        assert!(!entitled(&store, 3, "NetA", "Town", &now));
    }

    #[test]
    fn wildcard_grant_covers_every_network_with_the_city() {
        let mut store = EntitlementStore::default();
        let now = at(2024, 5, 1, 12, 0, 0);

        store
            .grant(UserId(1), NetworkScope::All, "Metro".into(), Duration::days(7), &now)
            .unwrap();

        assert!(entitled(&store, 1, "NetA", "Metro", &now));
        assert!(entitled(&store, 1, "NetB", "Metro", &now));

        // Reached through the alias
        assert!(entitled(&store, 1, "NS", "Metropolis", &now));

        assert!(!entitled(&store, 1, "NetA", "Town", &now));

        let catalog = catalog();
        let metropolis = city(&catalog, "NS", "Metropolis");
        assert_eq!(
            store.wildcard_city(UserId(1), metropolis, &now),
            Some(&CityName::from("Metro"))
        );
    }

    #[test]
    fn expired_grants_are_inert_but_kept() {
        let mut store = EntitlementStore::default();
        let granted_at = at(2024, 5, 1, 12, 0, 0);

        store
            .grant(UserId(1), NetworkScope::network("NetA"), "Metro".into(), Duration::days(1), &granted_at)
            .unwrap();

        assert!(entitled(&store, 1, "NetA", "Metro", &at(2024, 5, 2, 11, 59, 59)));
        assert!(!entitled(&store, 1, "NetA", "Metro", &at(2024, 5, 2, 12, 0, 0)));
        assert_eq!(store.grants_of(UserId(1)).count(), 1);
    }

    #[test]
    fn expiry_is_the_latest_among_matching_grants() {
        let mut store = EntitlementStore::default();
        let now = at(2024, 5, 1, 12, 0, 0);

        store
            .grant(UserId(1), NetworkScope::network("NetA"), "Metro".into(), Duration::days(1), &now)
            .unwrap();
        store
            .grant(UserId(1), NetworkScope::All, "Metro".into(), Duration::days(5), &now)
            .unwrap();
        store
            .grant(UserId(1), NetworkScope::network("NetB"), "Metro".into(), Duration::days(30), &now)
            .unwrap();

        let catalog = catalog();
        let metro = city(&catalog, "NetA", "Metro");

        assert_eq!(
            store.expiry(UserId(1), &"NetA".into(), metro, &now),
            Some(at(2024, 5, 6, 12, 0, 0))
        );
    }

    #[test]
    fn extend_shifts_every_grant_of_the_user() {
        let mut store = EntitlementStore::default();
        let now = at(2024, 5, 1, 12, 0, 0);

        store
            .grant(UserId(1), NetworkScope::network("NetA"), "Metro".into(), Duration::days(1), &now)
            .unwrap();
        store
            .grant(UserId(1), NetworkScope::All, "Town".into(), Duration::days(2), &now)
            .unwrap();
        store
            .grant(UserId(2), NetworkScope::All, "Town".into(), Duration::days(2), &now)
            .unwrap();

        assert_eq!(store.extend(UserId(1), Duration::days(3)).unwrap(), 2);

        let expiries: Vec<_> = store
            .grants_of(UserId(1))
            .map(|grant| grant.expiry.clone())
            .collect();
        assert_eq!(
            expiries,
            [
                Expiry::At(at(2024, 5, 5, 12, 0, 0)),
                Expiry::At(at(2024, 5, 6, 12, 0, 0)),
            ]
        );

        // Negative deltas revoke early
        store.extend(UserId(1), Duration::days(-10)).unwrap();
        assert!(!entitled(&store, 1, "NetA", "Metro", &now));

        // Other users are untouched
        assert_eq!(
            store.grants_of(UserId(2)).next().unwrap().expiry,
            Expiry::At(at(2024, 5, 3, 12, 0, 0))
        );
    }

    #[test]
    fn invalid_grants() {
        let mut store = EntitlementStore::default();
        let now = at(2024, 5, 1, 12, 0, 0);

        let err = store
            .grant(UserId(1), NetworkScope::All, "Metro".into(), Duration::zero(), &now)
            .unwrap_err();
        assert_matches!(err, QuotaError::InvalidGrant { .. });

        let err = store.extend(UserId(1), Duration::days(1)).unwrap_err();
        assert_matches!(err, QuotaError::InvalidGrant { .. });

        assert!(store.grants().is_empty());
    }

    #[test]
    fn malformed_expiry_is_never_active() {
        let store = EntitlementStore::from_grants(vec![Grant {
            user_id: UserId(1),
            scope: NetworkScope::All,
            city: "Metro".into(),
            expiry: Expiry::Malformed("next tuesday".to_owned()),
        }]);
        let now = at(2024, 5, 1, 12, 0, 0);

        assert!(!entitled(&store, 1, "NetA", "Metro", &now));

        let mut store = store;
        assert_eq!(store.extend(UserId(1), Duration::days(1)).unwrap(), 0);
    }
}
