use super::{render, sender, CommandError};
use crate::prelude::*;
use crate::quota::PostId;
use crate::tg::posting::{self, PostingDialogue};
use crate::{err, tg, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use teloxide::utils::markdown;

/// How many recent posts `/status` lists
const STATUS_HISTORY_LIMIT: usize = 5;

#[derive(BotCommands, Clone, Debug)]
#[command(
    rename_rule = "snake_case",
    description = "These commands are supported:"
)]
pub(crate) enum Cmd {
    #[command(description = "display this text")]
    Help,

    #[command(description = "show the greeting")]
    Start,

    #[command(description = "publish an ad")]
    Post,

    #[command(description = "show your subscriptions, today's limits and recent posts")]
    Status,

    #[command(description = "delete your post by its id, e.g. /delete AbC123xy")]
    Delete(String),

    #[command(description = "cancel the current action")]
    Cancel,
}

#[async_trait]
impl tg::cmd::Command for Cmd {
    async fn handle(self, ctx: &tg::Ctx, msg: &Message, dialogue: PostingDialogue) -> Result {
        match self {
            Cmd::Help => {
                ctx.bot.reply_help_md_escaped::<Cmd>(msg).await?;
            }
            Cmd::Start => {
                let greeting = "Hi! I publish classified ads into city chats. \
                    Posting requires a subscription, ask an administrator for one. \
                    Use /post to publish an ad and /status to see your limits.";
                ctx.bot.reply_to(msg, markdown::escape(greeting)).await?;
            }
            Cmd::Post => {
                if !msg.chat.is_private() {
                    return Err(err!(CommandError::PrivateChatOnly));
                }
                posting::start(ctx, msg.chat.id, &dialogue).await?;
            }
            Cmd::Status => {
                let user_id = sender(msg)?.id;
                let grants = render::grants(&ctx.quota.entitlement_summary(user_id));
                let history =
                    render::history(&ctx.quota.history(user_id, STATUS_HISTORY_LIMIT));

                let status = format!("{grants}\n\nRecent posts:\n{history}");
                ctx.bot.reply_to(msg, markdown::escape(&status)).await?;
            }
            Cmd::Delete(post_id) => {
                let post_id = post_id.trim();
                if post_id.is_empty() {
                    return Err(err!(CommandError::InvalidArguments {
                        message: "the post id is missing",
                        usage: "/delete <post_id>",
                    }));
                }

                let user_id = sender(msg)?.id;
                let publication = ctx.quota.delete(user_id, &PostId::new(post_id)).await?;

                if let Some(message) = publication.message {
                    let result = ctx
                        .bot
                        .delete_message(message.chat_id, message.message_id)
                        .await;

                    if let Err(err) = result {
                        warn!(
                            err = tracing_err(&err),
                            %post_id,
                            "Failed to delete the message of the post"
                        );
                    }
                }

                let reply = format!(
                    "Post {post_id} was deleted. It still counts toward today's limit."
                );
                ctx.bot.reply_to(msg, markdown::escape(&reply)).await?;
            }
            Cmd::Cancel => {
                dialogue.exit().await?;
                ctx.bot
                    .reply_to(msg, markdown::escape("Cancelled"))
                    .await?;
            }
        }

        Ok(())
    }
}
