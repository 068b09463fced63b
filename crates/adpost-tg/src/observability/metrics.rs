use super::GLOBAL_LABELS;
use crate::prelude::*;
use metrics::{describe_counter, Unit};

pub fn init_metrics() -> crate::Result {
    let mut builder = metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], 2000));

    for (key, value) in GLOBAL_LABELS {
        builder = builder.add_global_label(*key, *value);
    }

    builder
        .install()
        .fatal_ctx(|| "Failed to initialize the metrics listener")?;

    describe_counter!(
        "adpost_publish_outcomes_total",
        Unit::Count,
        "Outcomes of publish requests per network, labeled by `outcome`"
    );
    describe_counter!(
        "adpost_persisted_writes_total",
        Unit::Count,
        "Quota state changes written to the store"
    );
    describe_counter!(
        "adpost_persist_failures_total",
        Unit::Count,
        "Quota state changes discarded because the store was unavailable"
    );
    describe_counter!(
        "adpost_tg_updates_total",
        Unit::Count,
        "Telegram updates received, labeled by `kind`"
    );

    Ok(())
}
