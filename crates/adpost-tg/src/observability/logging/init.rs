use crate::config::from_env_or_panic;
use crate::observability::GLOBAL_LABELS;
use crate::prelude::*;
use serde::Deserialize;
use serde_with::serde_as;
use std::collections::HashMap;
use std::ops::Deref;
use std::time::Instant;
use tracing_subscriber::prelude::*;

/// Handle to the background task that ships the logs to Loki.
pub struct LoggingTask {
    loki: Option<LokiTask>,
}

struct LokiTask {
    task: tokio::task::JoinHandle<()>,
    controller: tracing_loki::BackgroundTaskController,
}

impl LoggingTask {
    pub async fn shutdown(self) {
        let Some(LokiTask { task, controller }) = self.loki else {
            return;
        };

        info!("Waiting for the logging task to finish nicely...");

        let start = Instant::now();
        controller.shutdown().await;

        eprintln!(
            "Stopped logging task in {:.2?}: {:?}",
            start.elapsed(),
            task.await
        );
    }
}

pub fn init_logging() -> crate::Result<LoggingTask> {
    LoggingConfig::load_or_panic().init_logging()
}

#[serde_as]
#[derive(Deserialize)]
struct LoggingConfig {
    /// Logs are only written to stderr if this is not set
    #[serde(default)]
    loki_url: Option<url::Url>,

    #[serde_as(as = "Option<serde_with::json::JsonString>")]
    #[serde(default)]
    tg_bot_log_labels: Option<HashMap<String, String>>,
}

impl LoggingConfig {
    fn load_or_panic() -> LoggingConfig {
        from_env_or_panic("")
    }

    fn init_logging(self) -> crate::Result<LoggingTask> {
        let env_filter = tracing_subscriber::EnvFilter::from_env("TG_BOT_LOG");

        let fmt = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_ansi(std::env::var("COLORS").as_deref() != Ok("0"))
            .pretty();

        let (loki_layer, loki_task) = match self.loki_url {
            Some(loki_url) => {
                let additional_labels = GLOBAL_LABELS.iter().chain(&[("source", "adpost-tg")]);

                let mut labels = self.tg_bot_log_labels.unwrap_or_default();
                labels.extend(additional_labels.map(|(k, v)| ((*k).to_owned(), (*v).to_owned())));

                let builder = labels.into_iter().try_fold(
                    tracing_loki::builder(),
                    |builder, (key, value)| builder.label(key, value),
                );

                let (layer, controller, task) = builder
                    .and_then(|builder| builder.build_controller_url(loki_url))
                    .fatal_ctx(|| "Failed to set up the Loki logging layer")?;

                let task = tokio::spawn(task);
                (Some(layer), Some(LokiTask { task, controller }))
            }
            None => (None, None),
        };

        tracing_subscriber::registry()
            .with(fmt)
            .with(loki_layer)
            .with(env_filter)
            .with(tracing_error::ErrorLayer::default())
            .init();

        init_panic_hook();

        Ok(LoggingTask { loki: loki_task })
    }
}

fn init_panic_hook() {
    let current_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        // It's super-important to call the default panic hook, otherwise
        // we may not see it in the logs at all, because the panic may
        // happen inside of `tracing` logging system itself.
        current_hook(panic_info);

        let backtrace = std::backtrace::Backtrace::capture();
        let location = panic_info.location().map(|location| {
            format!(
                "{}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            )
        });

        // If the panic message was formatted using interpolated values,
        // it will be a `String`. Otherwise, it will be a `&str`.
        let payload = panic_info.payload();
        let message = payload
            .downcast_ref::<String>()
            .map(<_>::deref)
            .or_else(|| payload.downcast_ref::<&str>().map(<_>::deref))
            .unwrap_or("<unknown>");

        let span_trace = tracing_error::SpanTrace::capture();

        error!(
            target: "panic",
            thread = std::thread::current().name(),
            location,
            span_trace = %span_trace,
            backtrace = format_args!("\n{backtrace}"),
            "{message}"
        );
    }));
}
