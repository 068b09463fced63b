use crate::prelude::*;
use crate::quota::notify::NotificationSink;
use crate::tg::Bot;
use teloxide::prelude::*;
use teloxide::utils::markdown;

/// Sends notifications as private messages from the bot.
pub(crate) struct TgNotifier {
    bot: Bot,
}

impl TgNotifier {
    pub(crate) fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

impl NotificationSink for TgNotifier {
    fn notify(&self, user_id: UserId, message: String) {
        let bot = self.bot.clone();
        let span = info_span!("notify", %user_id);

        let fut = async move {
            let result = bot
                .send_message(ChatId::from(user_id), markdown::escape(&message))
                .await;

            if let Err(err) = result {
                warn!(err = tracing_err(&err), "Failed to notify the user");
            }
        };

        tokio::spawn(fut.instrument(span));
    }
}
