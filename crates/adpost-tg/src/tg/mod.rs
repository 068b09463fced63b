//! Telegram front-end root module

mod cmd;
mod config;
mod notify;
mod posting;

use crate::prelude::*;
use crate::quota::{Catalog, QuotaPolicy, QuotaService, QuotaServiceOptions, QuotaStore, SystemClock};
use crate::Result;
use metrics::increment_counter;
use std::sync::Arc;
use teloxide::adaptors::{CacheMe, DefaultParseMode, Throttle, Trace};
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::{HandlerExt, UpdateFilterExt};
use teloxide::dptree::di::DependencyMap;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::command::BotCommands;

pub(crate) use cmd::CommandError;
pub(crate) use config::*;
use notify::TgNotifier;
use posting::PostingState;

pub(crate) type Bot = Trace<CacheMe<DefaultParseMode<Throttle<teloxide::Bot>>>>;

pub(crate) struct Ctx {
    bot: Bot,
    quota: Arc<QuotaService>,
    cfg: Arc<Config>,
}

pub(crate) struct RunBotOptions {
    pub(crate) tg_cfg: Config,
    pub(crate) quota_cfg: crate::quota::Config,
    pub(crate) policy: QuotaPolicy,
    pub(crate) catalog: Catalog,
    pub(crate) store: Arc<dyn QuotaStore>,
}

pub(crate) async fn run_bot(opts: RunBotOptions) -> Result {
    let mut di = DependencyMap::new();

    let bot: Bot = teloxide::Bot::new(opts.tg_cfg.token.clone())
        .throttle(Default::default())
        .parse_mode(ParseMode::MarkdownV2)
        .cache_me()
        .trace(teloxide::adaptors::trace::Settings::all());

    let quota = QuotaService::load(QuotaServiceOptions {
        catalog: Arc::new(opts.catalog),
        policy: opts.policy,
        clock: Arc::new(SystemClock::new(opts.quota_cfg.timezone)),
        store: opts.store,
        notifier: Arc::new(TgNotifier::new(bot.clone())),
    })
    .await;

    di.insert(Arc::new(Ctx {
        bot: bot.clone(),
        quota: Arc::new(quota),
        cfg: Arc::new(opts.tg_cfg),
    }));
    di.insert(InMemStorage::<PostingState>::new());

    info!("Starting bot...");

    bot.set_my_commands(cmd::regular::Cmd::bot_commands())
        .await?;

    let handler = dptree::entry()
        .inspect(|update: Update| {
            increment_counter!("adpost_tg_updates_total", "kind" => update.kind.discriminator());
        })
        .branch(
            Update::filter_message()
                .enter_dialogue::<Message, InMemStorage<PostingState>, PostingState>()
                .branch(
                    dptree::entry()
                        .filter_command::<cmd::regular::Cmd>()
                        .endpoint(cmd::handle::<cmd::regular::Cmd>()),
                )
                .branch(
                    dptree::entry()
                        .filter_command::<cmd::admin::Cmd>()
                        .chain(dptree::filter(cmd::admin::filter))
                        .endpoint(cmd::handle::<cmd::admin::Cmd>()),
                )
                .branch(
                    dptree::case![PostingState::AwaitingText]
                        .endpoint(posting::handle_text),
                ),
        )
        .branch(
            Update::filter_callback_query()
                .enter_dialogue::<CallbackQuery, InMemStorage<PostingState>, PostingState>()
                .endpoint(posting::handle_callback_query),
        );

    Dispatcher::builder(bot, handler)
        .dependencies(di)
        // We don't handle all possible messages that users send,
        // so to suppress the warning that we don't do this we have
        // a noop default handler here
        .default_handler(|_| std::future::ready(()))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Bot stopped");

    Ok(())
}
