use super::{invalid_args, parse_days, parse_user_id, render, words, CommandError};
use crate::prelude::*;
use crate::quota::{CityName, NetworkScope};
use crate::tg::posting::PostingDialogue;
use crate::{tg, Result};
use async_trait::async_trait;
use itertools::Itertools;
use std::str::FromStr;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use teloxide::utils::markdown;

/// How many publications `/history` lists
const HISTORY_LIMIT: usize = 30;

#[derive(BotCommands, Clone, Debug)]
#[command(
    rename_rule = "snake_case",
    description = "Commands for administrators only:"
)]
pub(crate) enum Cmd {
    #[command(description = "display this text")]
    AdminHelp,

    #[command(description = "grant a subscription: /grant <user_id> <network|ALL> <days> <city>")]
    Grant(String),

    #[command(description = "shift the expiry of all subscriptions of the user: /extend <user_id> <±days>")]
    Extend(String),

    #[command(description = "show recent publications of the user: /history <user_id>")]
    History(String),

    #[command(description = "show the subscriptions of the user: /grants <user_id>")]
    Grants(String),

    #[command(description = "display version info")]
    Version,
}

pub(crate) fn filter(ctx: Arc<tg::Ctx>, msg: Message) -> bool {
    matches!(msg.from(), Some(sender) if ctx.cfg.admins.contains(&sender.id))
}

#[derive(Debug, PartialEq)]
struct GrantArgs {
    user_id: UserId,
    scope: NetworkScope,
    days: i64,
    city: CityName,
}

impl FromStr for GrantArgs {
    type Err = CommandError;

    fn from_str(args: &str) -> Result<Self, Self::Err> {
        const USAGE: &str = "/grant <user_id> <network|ALL> <days> <city>";

        let words = words(args);
        // The city is the tail of the arguments, it may consist of several words
        let [user_id, scope, days, city_head, city_tail @ ..] = words.as_slice() else {
            return Err(invalid_args(USAGE, "expected at least 4 arguments"));
        };

        let days = parse_days(USAGE, days)?;
        if days <= 0 {
            return Err(invalid_args(USAGE, "the number of days must be positive"));
        }

        Ok(Self {
            user_id: parse_user_id(USAGE, user_id)?,
            scope: scope.parse().unwrap_or_else(|never| match never {}),
            days,
            city: CityName::new(std::iter::once(city_head).chain(city_tail).join(" ")),
        })
    }
}

#[derive(Debug, PartialEq)]
struct ExtendArgs {
    user_id: UserId,
    days: i64,
}

impl FromStr for ExtendArgs {
    type Err = CommandError;

    fn from_str(args: &str) -> Result<Self, Self::Err> {
        const USAGE: &str = "/extend <user_id> <±days>";

        let [user_id, days] = words(args)[..] else {
            return Err(invalid_args(USAGE, "expected exactly 2 arguments"));
        };

        Ok(Self {
            user_id: parse_user_id(USAGE, user_id)?,
            days: parse_days(USAGE, days)?,
        })
    }
}

fn parse_single_user_id(usage: &'static str, args: &str) -> Result<UserId, CommandError> {
    let [user_id] = words(args)[..] else {
        return Err(invalid_args(usage, "expected a single user ID"));
    };
    parse_user_id(usage, user_id)
}

#[async_trait]
impl tg::cmd::Command for Cmd {
    async fn handle(self, ctx: &tg::Ctx, msg: &Message, _: PostingDialogue) -> Result {
        let reply = match self {
            Cmd::AdminHelp => {
                ctx.bot.reply_help_md_escaped::<Cmd>(msg).await?;
                return Ok(());
            }
            Cmd::Grant(args) => {
                let args: GrantArgs = args.parse()?;
                let grant = ctx
                    .quota
                    .grant(
                        args.user_id,
                        args.scope,
                        args.city,
                        chrono::Duration::days(args.days),
                    )
                    .await?;

                let expiry = grant
                    .expiry
                    .at()
                    .map(|at| at.to_human_readable())
                    .unwrap_or_default();

                format!(
                    "Granted {} / {} to user {} until {expiry}",
                    grant.scope, grant.city, grant.user_id
                )
            }
            Cmd::Extend(args) => {
                let args: ExtendArgs = args.parse()?;
                let shifted = ctx
                    .quota
                    .extend(args.user_id, chrono::Duration::days(args.days))
                    .await?;

                format!(
                    "Shifted {shifted} subscription(s) of user {} by {} day(s)",
                    args.user_id, args.days
                )
            }
            Cmd::History(args) => {
                let user_id = parse_single_user_id("/history <user_id>", &args)?;
                render::history(&ctx.quota.history(user_id, HISTORY_LIMIT))
            }
            Cmd::Grants(args) => {
                let user_id = parse_single_user_id("/grants <user_id>", &args)?;
                render::grants(&ctx.quota.entitlement_summary(user_id))
            }
            Cmd::Version => {
                ctx.bot.reply_to(msg, version()).await?;
                return Ok(());
            }
        };

        ctx.bot.reply_to(msg, markdown::escape(&reply)).await?;

        Ok(())
    }
}

fn version() -> String {
    /// Generate the key-value pairs with vergen metadata
    macro_rules! vergen_meta {
        ( $($meta_name:literal),* $(,)? ) => {
            [$( ($meta_name, env!(concat!("VERGEN_", $meta_name))) ),*]
        }
    }

    let meta = vergen_meta![
        "BUILD_TIMESTAMP",
        "RUSTC_CHANNEL",
        "RUSTC_COMMIT_HASH",
        "RUSTC_HOST_TRIPLE",
        "RUSTC_SEMVER",
        "CARGO_TARGET_TRIPLE",
        "CARGO_DEBUG",
        "CARGO_OPT_LEVEL",
    ];

    let meta = [("VERSION", env!("CARGO_PKG_VERSION"))]
        .into_iter()
        .chain(meta);

    let max_name_len = meta.clone().map(|(name, _)| name.len()).max().unwrap_or(0);

    let metadata = meta.format_with("\n", |(name, val), f| {
        let name = name.to_lowercase();
        f(&format_args!("{name:<max_name_len$} = {val}"))
    });

    markdown::code_block(&metadata.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;

    #[test]
    fn grant_args() {
        test_bat::debug::assert_result_eq(
            &"123 ALL 7 Saint Petersburg".parse::<GrantArgs>(),
            &expect![[r#"
                GrantArgs {
                    user_id: UserId(
                        123,
                    ),
                    scope: All,
                    days: 7,
                    city: CityName(
                        "Saint Petersburg",
                    ),
                }"#]],
        );

        assert_eq!(
            "5  NetA +1  Town".parse::<GrantArgs>().unwrap(),
            GrantArgs {
                user_id: UserId(5),
                scope: NetworkScope::network("NetA"),
                days: 1,
                city: "Town".into(),
            }
        );

        test_bat::debug::assert_result_eq(
            &"123 ALL 7".parse::<GrantArgs>(),
            &expect![[r#"
                Err: Invalid arguments: expected at least 4 arguments
                Usage: /grant <user_id> <network|ALL> <days> <city>"#]],
        );
        test_bat::debug::assert_result_eq(
            &"bob ALL 7 Metro".parse::<GrantArgs>(),
            &expect![[r#"
                Err: Invalid arguments: `bob` is not a user ID
                Usage: /grant <user_id> <network|ALL> <days> <city>"#]],
        );
        test_bat::debug::assert_result_eq(
            &"1 ALL 0 Metro".parse::<GrantArgs>(),
            &expect![[r#"
                Err: Invalid arguments: the number of days must be positive
                Usage: /grant <user_id> <network|ALL> <days> <city>"#]],
        );
        test_bat::debug::assert_result_eq(
            &"1 ALL 200000000000 Metro".parse::<GrantArgs>(),
            &expect![[r#"
                Err: Invalid arguments: `200000000000` days is out of range, at most 36500 days are allowed
                Usage: /grant <user_id> <network|ALL> <days> <city>"#]],
        );

        // The longest allowed subscription still makes a valid duration
        let args: GrantArgs = "1 ALL 36500 Metro".parse().unwrap();
        assert_eq!(chrono::Duration::days(args.days).num_days(), 36_500);
    }

    #[test]
    fn extend_args() {
        assert_eq!(
            "42 -3".parse::<ExtendArgs>().unwrap(),
            ExtendArgs {
                user_id: UserId(42),
                days: -3,
            }
        );
        assert_eq!("42 +3".parse::<ExtendArgs>().unwrap().days, 3);

        test_bat::debug::assert_result_eq(
            &"42".parse::<ExtendArgs>(),
            &expect![[r#"
                Err: Invalid arguments: expected exactly 2 arguments
                Usage: /extend <user_id> <±days>"#]],
        );
        test_bat::debug::assert_result_eq(
            &"1 -200000000000".parse::<ExtendArgs>(),
            &expect![[r#"
                Err: Invalid arguments: `-200000000000` days is out of range, at most 36500 days are allowed
                Usage: /extend <user_id> <±days>"#]],
        );
        test_bat::debug::assert_result_eq(
            &"1 -9223372036854775808".parse::<ExtendArgs>(),
            &expect![[r#"
                Err: Invalid arguments: `-9223372036854775808` days is out of range, at most 36500 days are allowed
                Usage: /extend <user_id> <±days>"#]],
        );
    }

    #[test]
    fn version_lists_build_metadata() {
        let version = version();
        assert!(version.contains(env!("CARGO_PKG_VERSION")));
        assert!(version.contains("rustc_semver"));
    }
}
