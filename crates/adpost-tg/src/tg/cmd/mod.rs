pub(crate) mod admin;
pub(crate) mod regular;

mod render;

use crate::prelude::*;
use crate::tg::posting::PostingDialogue;
use crate::util::DynResult;
use crate::{tg, Error, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::User;
use teloxide::utils::markdown;

#[async_trait]
pub(crate) trait Command: fmt::Debug + Send + Sync + 'static {
    async fn handle(self, ctx: &tg::Ctx, msg: &Message, dialogue: PostingDialogue) -> Result;
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Invalid arguments: {message}\nUsage: {usage}")]
    InvalidArguments {
        message: String,
        usage: &'static str,
    },

    #[error("This command is only available in a private chat with the bot")]
    PrivateChatOnly,

    #[error("The message has no sender")]
    NoSender,
}

pub(crate) fn handle<'a, C: Command>(
) -> impl Fn(Arc<tg::Ctx>, Message, C, PostingDialogue) -> BoxFuture<'a, DynResult> {
    move |ctx, msg, cmd, dialogue| {
        let info = info_span!(
            "handle_message",
            sender = msg.from().map(User::debug_id).as_deref(),
            msg_text = msg.text(),
            chat = %msg.chat.id,
            cmd = format_args!("{cmd:#?}")
        );

        let fut = async move {
            debug!("Processing command");

            let result = cmd.handle(&ctx, &msg, dialogue).await;
            if let Err(err) = &result {
                report_error(&ctx, msg.chat.id, err).await;
            }
            result.map_err(Into::into)
        };

        Box::pin(fut.instrument(info))
    }
}

/// Logs the error and tells the user about it.
pub(crate) async fn report_error(ctx: &tg::Ctx, chat_id: ChatId, err: &Error) {
    let span = warn_span!("err", err = tracing_err(err), id = err.id());
    async {
        let reply = if err.is_user_error() {
            markdown::escape(&err.kind().display_chain().to_string())
        } else {
            warn!("Handler returned an error");
            let text = format!(
                "Something went wrong, please try again later (error id: {})",
                err.id()
            );
            markdown::escape(&text)
        };

        if let Err(err) = ctx.bot.send_message(chat_id, reply).await {
            warn!(
                err = tracing_err(&err),
                "Failed to reply with the error message to the user"
            );
        }
    }
    .instrument(span)
    .await;
}

pub(crate) fn sender(msg: &Message) -> Result<&User> {
    msg.from().ok_or_else(|| err!(CommandError::NoSender))
}

/// Splits the command argument into whitespace-separated words.
fn words(args: &str) -> Vec<&str> {
    args.split_whitespace().collect()
}

fn invalid_args(usage: &'static str, message: impl Into<String>) -> CommandError {
    CommandError::InvalidArguments {
        message: message.into(),
        usage,
    }
}

fn parse_user_id(usage: &'static str, input: &str) -> Result<UserId, CommandError> {
    input
        .parse()
        .map(UserId)
        .map_err(|_| invalid_args(usage, format!("`{input}` is not a user ID")))
}

/// Upper bound on the number of days in a single admin command (100 years).
const MAX_DAYS: i64 = 36_500;

fn parse_days(usage: &'static str, input: &str) -> Result<i64, CommandError> {
    let days: i64 = input
        .trim_start_matches('+')
        .parse()
        .map_err(|_| invalid_args(usage, format!("`{input}` is not a number of days")))?;

    if !(-MAX_DAYS..=MAX_DAYS).contains(&days) {
        return Err(invalid_args(
            usage,
            format!("`{input}` days is out of range, at most {MAX_DAYS} days are allowed"),
        ));
    }

    Ok(days)
}
