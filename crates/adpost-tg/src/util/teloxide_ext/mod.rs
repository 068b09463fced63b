mod requester;

use easy_ext::ext;
use teloxide::types::{UpdateKind, User};

pub(crate) mod prelude {
    pub(crate) use super::{requester::UtilRequesterExt as _, UpdateKindExt as _, UserExt as _};
}

#[ext(UserExt)]
pub(crate) impl User {
    fn username(&self) -> String {
        self.username.clone().unwrap_or_else(|| self.full_name())
    }

    fn debug_id(&self) -> String {
        format!("{} ({})", self.username(), self.id)
    }
}

#[ext(UpdateKindExt)]
pub(crate) impl UpdateKind {
    fn discriminator(&self) -> &'static str {
        macro_rules! stringify_enum {
            ($val:expr, $($variant:ident)*) => {
                match $val {$( UpdateKind::$variant(_) => stringify!($variant), )*}
            }
        }
        stringify_enum! {
            self,
            Message
            EditedMessage
            ChannelPost
            EditedChannelPost
            InlineQuery
            ChosenInlineResult
            CallbackQuery
            ShippingQuery
            PreCheckoutQuery
            Poll
            PollAnswer
            MyChatMember
            ChatMember
            ChatJoinRequest
            Error
        }
    }
}
