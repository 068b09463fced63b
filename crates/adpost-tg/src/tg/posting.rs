//! Conversation that collects an ad and publishes it.
//!
//! `/post` ➜ text ➜ network ➜ city ➜ confirmation. Choices are made with
//! inline keyboards, the state of every chat lives in [`InMemStorage`].

use super::cmd::report_error;
use crate::prelude::*;
use crate::quota::history::PostedMessage;
use crate::quota::{Catalog, CityName, Denial, NetworkScope, Outcome, PostId, PublishReport, QuotaService};
use crate::util::DynResult;
use crate::{tg, Result};
use itertools::Itertools;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId};
use teloxide::utils::markdown;

pub(crate) type PostingDialogue = Dialogue<PostingState, InMemStorage<PostingState>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) enum PostingState {
    #[default]
    Idle,
    AwaitingText,
    AwaitingNetwork {
        text: String,
    },
    AwaitingCity {
        text: String,
        scope: NetworkScope,
    },
    AwaitingConfirmation {
        text: String,
        scope: NetworkScope,
        city: CityName,
    },
}

/// Payload of the inline keyboard buttons. Telegram limits it to 64 bytes,
/// so networks and cities are referred to by their index rather than name.
#[derive(Debug, Clone, Copy, PartialEq)]
enum CallbackAction {
    /// Index in [`Catalog::networks`], `None` stands for all networks
    Network(Option<usize>),

    /// Index in the list returned by [`offered_cities`]
    City(usize),

    Confirm,
    Cancel,
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(None) => f.write_str("net:all"),
            Self::Network(Some(index)) => write!(f, "net:{index}"),
            Self::City(index) => write!(f, "city:{index}"),
            Self::Confirm => f.write_str("confirm"),
            Self::Cancel => f.write_str("cancel"),
        }
    }
}

impl FromStr for CallbackAction {
    type Err = ();

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        if let Some(network) = data.strip_prefix("net:") {
            if network == "all" {
                return Ok(Self::Network(None));
            }
            return network.parse().map(|index| Self::Network(Some(index))).map_err(drop);
        }
        if let Some(city) = data.strip_prefix("city:") {
            return city.parse().map(Self::City).map_err(drop);
        }
        match data {
            "confirm" => Ok(Self::Confirm),
            "cancel" => Ok(Self::Cancel),
            _ => Err(()),
        }
    }
}

/// Cities to choose from once the network scope is known. The catalog is
/// fixed for the lifetime of the process, so the order is stable.
fn offered_cities(catalog: &Catalog, scope: &NetworkScope) -> Vec<CityName> {
    match scope {
        NetworkScope::All => catalog.city_names().into_iter().cloned().collect(),
        NetworkScope::Network(name) => catalog
            .network(name)
            .map(|network| network.cities.iter().map(|city| city.name.clone()).collect())
            .unwrap_or_default(),
    }
}

fn button(text: impl Into<String>, action: CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, action.to_string())
}

fn keyboard(buttons: impl IntoIterator<Item = InlineKeyboardButton>) -> InlineKeyboardMarkup {
    let rows = buttons
        .into_iter()
        .map(|button| vec![button])
        .chain([vec![button("Cancel", CallbackAction::Cancel)]]);

    InlineKeyboardMarkup::new(rows)
}

pub(crate) async fn start(ctx: &tg::Ctx, chat_id: ChatId, dialogue: &PostingDialogue) -> Result {
    dialogue.update(PostingState::AwaitingText).await?;
    ctx.bot
        .send_message(
            chat_id,
            markdown::escape("Send me the text of your ad, or /cancel to stop"),
        )
        .await?;
    Ok(())
}

pub(crate) async fn handle_text(
    ctx: Arc<tg::Ctx>,
    msg: Message,
    dialogue: PostingDialogue,
) -> DynResult {
    let result = async {
        let Some(text) = msg.text() else {
            ctx.bot
                .send_message(msg.chat.id, markdown::escape("The ad must be a text message"))
                .await?;
            return Ok(());
        };

        dialogue
            .update(PostingState::AwaitingNetwork {
                text: text.to_owned(),
            })
            .await?;

        let networks = ctx
            .quota
            .catalog()
            .networks()
            .iter()
            .enumerate()
            .map(|(index, network)| button(network.name.as_str(), CallbackAction::Network(Some(index))))
            .chain([button("All networks", CallbackAction::Network(None))]);

        ctx.bot
            .send_message(msg.chat.id, markdown::escape("Where should the ad go?"))
            .reply_markup(keyboard(networks))
            .await?;

        Ok::<_, crate::Error>(())
    }
    .await;

    if let Err(err) = &result {
        report_error(&ctx, msg.chat.id, err).await;
    }

    result.map_err(Into::into)
}

pub(crate) async fn handle_callback_query(
    ctx: Arc<tg::Ctx>,
    query: CallbackQuery,
    dialogue: PostingDialogue,
    state: PostingState,
) -> DynResult {
    let span = info_span!(
        "handle_callback_query",
        sender = %query.from.debug_id(),
        data = query.data.as_deref(),
        state = ?state,
    );

    async {
        let chat_id = dialogue.chat_id();
        let result = handle_callback_query_imp(&ctx, &query, &dialogue, state).await;

        if let Err(err) = ctx.bot.answer_callback_query(query.id.clone()).await {
            warn!(err = tracing_err(&err), "Failed to answer the callback query");
        }

        if let Err(err) = &result {
            report_error(&ctx, chat_id, err).await;
        }

        result.map_err(Into::into)
    }
    .instrument(span)
    .await
}

async fn handle_callback_query_imp(
    ctx: &tg::Ctx,
    query: &CallbackQuery,
    dialogue: &PostingDialogue,
    state: PostingState,
) -> Result {
    let chat_id = dialogue.chat_id();
    let action = query.data.as_deref().and_then(|data| data.parse().ok());

    let Some(action) = action else {
        warn!("Received unknown callback data");
        return Ok(());
    };

    match (state, action) {
        (_, CallbackAction::Cancel) => {
            dialogue.exit().await?;
            ctx.bot
                .send_message(chat_id, markdown::escape("Cancelled"))
                .await?;
        }
        (PostingState::AwaitingNetwork { text }, CallbackAction::Network(index)) => {
            let catalog = ctx.quota.catalog();
            let scope = match index {
                None => NetworkScope::All,
                Some(index) => {
                    let Some(network) = catalog.networks().get(index) else {
                        return reply_expired(ctx, chat_id).await;
                    };
                    NetworkScope::Network(network.name.clone())
                }
            };

            let cities = offered_cities(catalog, &scope);

            if cities.is_empty() {
                ctx.bot
                    .send_message(chat_id, markdown::escape("There are no cities in this network"))
                    .await?;
                return Ok(());
            }

            let buttons = cities
                .iter()
                .enumerate()
                .map(|(index, city)| button(city.as_str(), CallbackAction::City(index)));

            dialogue
                .update(PostingState::AwaitingCity { text, scope })
                .await?;

            ctx.bot
                .send_message(chat_id, markdown::escape("Which city?"))
                .reply_markup(keyboard(buttons))
                .await?;
        }
        (PostingState::AwaitingCity { text, scope }, CallbackAction::City(index)) => {
            let Some(city) = offered_cities(ctx.quota.catalog(), &scope).into_iter().nth(index) else {
                return reply_expired(ctx, chat_id).await;
            };

            let preview = format!(
                "{}\n\n{}",
                markdown::escape(&format!("The ad will be published to {scope} / {city}:")),
                markdown::escape(&text),
            );

            dialogue
                .update(PostingState::AwaitingConfirmation { text, scope, city })
                .await?;

            ctx.bot
                .send_message(chat_id, preview)
                .reply_markup(keyboard([button("Publish", CallbackAction::Confirm)]))
                .await?;
        }
        (PostingState::AwaitingConfirmation { text, scope, city }, CallbackAction::Confirm) => {
            dialogue.exit().await?;

            let user_id = query.from.id;
            let summary = publish(ctx, user_id, &text, scope, city).await?;

            ctx.bot
                .send_message(chat_id, markdown::escape(&summary))
                .await?;
        }
        (state, action) => {
            debug!(?state, ?action, "Stale keyboard button pressed");
            reply_expired(ctx, chat_id).await?;
        }
    }

    Ok(())
}

async fn reply_expired(ctx: &tg::Ctx, chat_id: ChatId) -> Result {
    ctx.bot
        .send_message(
            chat_id,
            markdown::escape("This button has expired, use /post to start over"),
        )
        .await?;
    Ok(())
}

/// Publishes the ad into every network the gate approves, returns a
/// human-readable summary of what happened.
#[instrument(skip(ctx, text))]
async fn publish(
    ctx: &tg::Ctx,
    user_id: UserId,
    text: &str,
    scope: NetworkScope,
    city: CityName,
) -> Result<String> {
    let report = ctx.quota.try_publish(user_id, scope, city).await?;
    report.ensure_allowed()?;

    let text = markdown::escape(text);
    let send = |chat_id: ChatId| {
        let text = text.clone();
        async move { Ok::<_, crate::Error>(ctx.bot.send_message(chat_id, text).await?.id) }
    };

    Ok(deliver(&ctx.quota, &report, send).await.into_iter().join("\n"))
}

/// Sends the ad to every network it was approved for and records the
/// result in the quota. A failure with one network never stops the delivery
/// to the rest. Returns a line of the summary per network.
async fn deliver<Fut>(
    quota: &QuotaService,
    report: &PublishReport,
    send: impl Fn(ChatId) -> Fut,
) -> Vec<String>
where
    Fut: Future<Output = Result<MessageId>>,
{
    let mut lines = vec![];

    for outcome in &report.outcomes {
        let network = &outcome.network;
        let post_id = match &outcome.outcome {
            Outcome::Published(post_id) => post_id,
            Outcome::Skipped(denial) => {
                lines.push(format!("{network}: skipped, {}", describe_denial(*denial)));
                continue;
            }
        };

        let Some(chat_id) = outcome.chat_id else {
            warn!(%network, %post_id, "No chat to deliver the ad to");
            let line = if revoke(quota, post_id).await {
                "no channel to post into, the quota was not used"
            } else {
                "no channel to post into"
            };
            lines.push(format!("{network}: {line}"));
            continue;
        };

        let message_id = match send(chat_id).await {
            Ok(message_id) => message_id,
            Err(err) => {
                warn!(
                    err = tracing_err(&err),
                    %network,
                    %chat_id,
                    "Failed to deliver the ad, revoking the publication"
                );
                let line = if revoke(quota, post_id).await {
                    "failed to deliver, the quota was not used"
                } else {
                    "failed to deliver"
                };
                lines.push(format!("{network}: {line}"));
                continue;
            }
        };

        let message = PostedMessage { chat_id, message_id };

        let line = match quota.attach_message(post_id, message).await {
            Ok(()) => format!("{network}: published, post id {post_id}"),
            Err(err) => {
                error!(
                    err = tracing_err(&err),
                    %network,
                    %post_id,
                    "The ad was delivered, but its message wasn't recorded"
                );
                format!("{network}: published, post id {post_id}, but /delete can't remove it")
            }
        };
        lines.push(line);
    }

    lines
}

/// Returns whether the publication was revoked and stopped consuming quota.
async fn revoke(quota: &QuotaService, post_id: &PostId) -> bool {
    match quota.revoke_publish(post_id).await {
        Ok(()) => true,
        Err(err) => {
            error!(
                err = tracing_err(&err),
                %post_id,
                "Failed to revoke the undelivered publication"
            );
            false
        }
    }
}

pub(crate) fn describe_denial(denial: Denial) -> &'static str {
    match denial {
        Denial::NoEntitlement => "no active subscription",
        Denial::QuotaExceeded => "daily limit reached",
        Denial::UnknownCity => "no such city",
    }
}
