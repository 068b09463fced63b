use super::model::{CityName, NetworkName, ALL_NETWORKS};
use crate::prelude::*;
use itertools::Itertools;
use serde::Deserialize;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use teloxide::types::ChatId;

/// Networks and their city chats the bot is allowed to post into.
#[derive(Debug, Deserialize)]
pub struct Catalog {
    networks: Vec<Network>,
}

#[derive(Debug, Deserialize)]
pub struct Network {
    pub name: NetworkName,
    pub cities: Vec<City>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct City {
    pub name: CityName,

    /// The chat the ads for this city are posted into
    pub chat_id: ChatId,

    /// Name under which grants refer to this city when it differs from the
    /// name used inside of this network.
    #[serde(default)]
    pub alias: Option<CityName>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read the catalog file at {path:?}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse the catalog YAML")]
    Parse { source: serde_yaml::Error },

    #[error("Invalid catalog: {message}")]
    Invalid { message: String },
}

impl City {
    /// Whether the city is known as `name` either directly or via its alias.
    pub fn answers_to(&self, name: &CityName) -> bool {
        self.name == *name || self.alias.as_ref() == Some(name)
    }
}

impl Network {
    pub fn city(&self, name: &CityName) -> Option<&City> {
        self.cities.iter().find(|city| city.answers_to(name))
    }
}

impl Catalog {
    #[instrument]
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let yaml = fs_err::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_owned(),
            source,
        })?;

        let catalog = Self::from_yaml(&yaml)?;

        info!(
            networks = %catalog.networks.iter().map(|network| &network.name).join(", "),
            "Loaded the catalog"
        );

        Ok(catalog)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, CatalogError> {
        let catalog: Self =
            serde_yaml::from_str(yaml).map_err(|source| CatalogError::Parse { source })?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        let invalid = |message: String| Err(CatalogError::Invalid { message });

        if self.networks.is_empty() {
            return invalid("there must be at least one network".to_owned());
        }

        let mut network_names = HashSet::new();

        for network in &self.networks {
            let name = network.name.as_str();
            if name.trim().is_empty() {
                return invalid("network name must not be empty".to_owned());
            }
            if name.eq_ignore_ascii_case(ALL_NETWORKS) {
                return invalid(format!("`{name}` is reserved for the wildcard scope"));
            }
            if !network_names.insert(name) {
                return invalid(format!("network `{name}` is defined twice"));
            }

            let mut city_names = HashSet::new();

            for city in &network.cities {
                let names = std::iter::once(&city.name).chain(&city.alias);
                for city_name in names {
                    if city_name.as_str().trim().is_empty() {
                        return invalid(format!("network `{name}` has a city with an empty name"));
                    }
                    if !city_names.insert(city_name) {
                        return invalid(format!(
                            "city `{city_name}` is defined twice in network `{name}`"
                        ));
                    }
                }
            }
        }

        Ok(())
    }

    pub fn networks(&self) -> &[Network] {
        &self.networks
    }

    pub fn network(&self, name: &NetworkName) -> Option<&Network> {
        self.networks.iter().find(|network| network.name == *name)
    }

    /// All networks that have a city known as `city`, in catalog order.
    pub fn networks_with_city<'a>(
        &'a self,
        city: &'a CityName,
    ) -> impl Iterator<Item = (&'a Network, &'a City)> + 'a {
        self.networks
            .iter()
            .filter_map(move |network| Some((network, network.city(city)?)))
    }

    /// Names that a wildcard request may use: every city name and every alias.
    pub fn city_names(&self) -> BTreeSet<&CityName> {
        self.networks
            .iter()
            .flat_map(|network| &network.cities)
            .flat_map(|city| std::iter::once(&city.name).chain(&city.alias))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use expect_test::expect;

    pub(crate) const CATALOG: &str = r#"
networks:
  - name: NetA
    cities:
      - { name: Metro, chat_id: -1001 }
      - { name: Town, chat_id: -1002 }
      - { name: CityX, chat_id: -1003 }
  - name: NetB
    cities:
      - { name: Metro, chat_id: -2001 }
      - { name: Town, chat_id: -2002 }
  - name: NS
    cities:
      - { name: Metropolis, alias: Metro, chat_id: -3001 }
"#;

    pub(crate) fn catalog() -> Catalog {
        Catalog::from_yaml(CATALOG).unwrap()
    }

    fn networks_with_city(catalog: &Catalog, city: &str) -> String {
        let city = CityName::from(city);
        let networks = catalog
            .networks_with_city(&city)
            .map(|(network, city)| format!("{}:{}", network.name, city.chat_id))
            .join(" ");
        networks
    }

    #[test]
    fn city_lookup_through_alias() {
        let catalog = catalog();

        expect!["NetA:-1001 NetB:-2001 NS:-3001"]
            .assert_eq(&networks_with_city(&catalog, "Metro"));
        expect!["NS:-3001"].assert_eq(&networks_with_city(&catalog, "Metropolis"));
        expect!["NetA:-1002 NetB:-2002"].assert_eq(&networks_with_city(&catalog, "Town"));
        expect![""].assert_eq(&networks_with_city(&catalog, "Nowhere"));
    }

    #[test]
    fn distinct_city_names() {
        let names = catalog().city_names().into_iter().join(", ");
        expect!["CityX, Metro, Metropolis, Town"].assert_eq(&names);
    }

    #[track_caller]
    fn assert_invalid(yaml: &str, expected: expect_test::Expect) {
        let err = Catalog::from_yaml(yaml).unwrap_err();
        expected.assert_eq(&err.to_string());
    }

    #[test]
    fn validation() {
        assert_invalid(
            "networks: []",
            expect!["Invalid catalog: there must be at least one network"],
        );
        assert_invalid(
            "networks: [{ name: all, cities: [] }]",
            expect!["Invalid catalog: `all` is reserved for the wildcard scope"],
        );
        assert_invalid(
            "networks: [{ name: A, cities: [] }, { name: A, cities: [] }]",
            expect!["Invalid catalog: network `A` is defined twice"],
        );
        assert_invalid(
            "networks: [{ name: A, cities: [{ name: X, chat_id: 1 }, { name: Y, alias: X, chat_id: 2 }] }]",
            expect!["Invalid catalog: city `X` is defined twice in network `A`"],
        );
        assert_invalid(
            "networks: {}",
            expect!["Failed to parse the catalog YAML"],
        );
    }

    #[test]
    fn load_from_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), CATALOG).unwrap();

        let catalog = Catalog::load(file.path()).unwrap();
        assert_eq!(catalog.networks().len(), 3);

        let err = Catalog::load(Path::new("/definitely/missing/catalog.yaml")).unwrap_err();
        assert!(matches!(err, CatalogError::Read { .. }), "{err:?}");
    }
}
