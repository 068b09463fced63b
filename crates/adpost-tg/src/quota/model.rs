use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use teloxide::types::UserId;

/// The value of [`NetworkScope`] that stands for "all networks".
pub const ALL_NETWORKS: &str = "ALL";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkName(String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CityName(String);

macro_rules! impl_name {
    ($($name:ident),*) => {$(
        impl $name {
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                Self::new(name)
            }
        }

        impl From<String> for $name {
            fn from(name: String) -> Self {
                Self(name)
            }
        }
    )*};
}

impl_name!(NetworkName, CityName);

/// Networks covered by a grant or targeted by a publish request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub enum NetworkScope {
    /// Every network of the catalog that has the requested city
    All,
    Network(NetworkName),
}

impl NetworkScope {
    pub fn network(name: impl Into<String>) -> Self {
        Self::Network(NetworkName::new(name))
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    pub fn covers(&self, network: &NetworkName) -> bool {
        match self {
            Self::All => true,
            Self::Network(name) => name == network,
        }
    }
}

impl fmt::Display for NetworkScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(ALL_NETWORKS),
            Self::Network(name) => fmt::Display::fmt(name, f),
        }
    }
}

impl FromStr for NetworkScope {
    type Err = Infallible;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        if input.eq_ignore_ascii_case(ALL_NETWORKS) {
            return Ok(Self::All);
        }
        Ok(Self::network(input))
    }
}

/// Identity of a single publication of an ad into one network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    pub(crate) fn generate() -> Self {
        Self(nanoid::nanoid!(8))
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Key of the daily post bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
#[display(fmt = "{}/{}/{}", user_id, network, city)]
pub struct BucketKey {
    pub user_id: UserId,
    pub network: NetworkName,
    pub city: CityName,
}

impl BucketKey {
    pub fn new(user_id: UserId, network: NetworkName, city: CityName) -> Self {
        Self {
            user_id,
            network,
            city,
        }
    }
}
