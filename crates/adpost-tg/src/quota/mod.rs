//! Daily quota and entitlement bookkeeping.
//!
//! The [`gate`] decides whether a post is allowed by consulting the
//! [`entitlement`] store and the [`ledger`] of today's posts. The
//! [`service`] owns the state and persists every change to a [`store`].

pub mod catalog;
pub mod clock;
pub mod entitlement;
pub mod gate;
pub mod history;
pub mod ledger;
pub mod model;
pub mod notify;
pub mod policy;
pub mod rollover;
pub mod service;
pub mod store;

mod error;

pub use catalog::{Catalog, CatalogError};
pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use error::QuotaError;
pub use gate::{Denial, Outcome, PublishReport, Verdict};
pub use model::{BucketKey, CityName, NetworkName, NetworkScope, PostId};
pub use policy::{AggregateMode, QuotaPolicy};
pub use service::{QuotaService, QuotaServiceOptions};
pub use store::{MemoryStore, QuotaState, QuotaStore};

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub(crate) struct Config {
    /// Path to the YAML file with the networks and cities
    pub(crate) catalog_path: PathBuf,

    /// The timezone that defines where one day ends and the next begins
    #[serde(default = "default_timezone")]
    pub(crate) timezone: chrono_tz::Tz,
}

fn default_timezone() -> chrono_tz::Tz {
    chrono_tz::Europe::Moscow
}
