//! Plain-text views of the quota state. The output is not escaped.

use crate::prelude::*;
use crate::quota::entitlement::Expiry;
use crate::quota::history::Publication;
use crate::quota::service::GrantSummary;
use itertools::Itertools;
use std::fmt::Write;

pub(crate) fn grants(summaries: &[GrantSummary]) -> String {
    if summaries.is_empty() {
        return "No subscriptions".to_owned();
    }

    let mut out = String::new();

    for summary in summaries {
        let grant = &summary.grant;
        let status = match &grant.expiry {
            Expiry::At(at) if summary.active => format!("active until {}", at.to_human_readable()),
            Expiry::At(at) => format!("expired at {}", at.to_human_readable()),
            Expiry::Malformed(raw) => format!("invalid expiry {raw:?}"),
        };

        // Writing to a `String` never fails
        let _ = writeln!(out, "{} / {}: {status}", grant.scope, grant.city);

        if !summary.active {
            continue;
        }

        for usage in &summary.usage {
            let _ = writeln!(
                out,
                "  {} / {}: {} published, {} deleted, {} left today",
                usage.network, usage.city, usage.count.active, usage.count.deleted, usage.remaining
            );
        }
    }

    out.trim_end().to_owned()
}

pub(crate) fn history(publications: &[Publication]) -> String {
    if publications.is_empty() {
        return "No publications".to_owned();
    }

    publications
        .iter()
        .map(|publication| {
            let deleted = publication
                .deleted_at
                .map(|at| format!(", deleted at {}", at.to_human_readable()))
                .unwrap_or_default();

            format!(
                "{} {} / {} at {}{deleted}",
                publication.post_id,
                publication.network,
                publication.city,
                publication.published_at.to_human_readable(),
            )
        })
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::clock::tests::at;
    use crate::quota::entitlement::Grant;
    use crate::quota::ledger::DailyCount;
    use crate::quota::service::PairUsage;
    use crate::quota::{NetworkScope, PostId};
    use expect_test::expect;
    use teloxide::types::UserId;

    #[test]
    fn grants_view() {
        let summaries = [
            GrantSummary {
                grant: Grant {
                    user_id: UserId(1),
                    scope: NetworkScope::All,
                    city: "Metro".into(),
                    expiry: Expiry::At(at(2024, 5, 8, 12, 0, 0)),
                },
                active: true,
                usage: vec![PairUsage {
                    network: "NetA".into(),
                    city: "Metro".into(),
                    count: DailyCount {
                        active: 1,
                        deleted: 1,
                    },
                    remaining: 1,
                }],
            },
            GrantSummary {
                grant: Grant {
                    user_id: UserId(1),
                    scope: NetworkScope::network("NetB"),
                    city: "Town".into(),
                    expiry: Expiry::Malformed("soon".to_owned()),
                },
                active: false,
                usage: vec![],
            },
        ];

        expect![[r#"
            ALL / Metro: active until 2024-05-08 12:00 (GMT+03:00)
              NetA / Metro: 1 published, 1 deleted, 1 left today
            NetB / Town: invalid expiry "soon""#]]
        .assert_eq(&grants(&summaries));

        expect!["No subscriptions"].assert_eq(&grants(&[]));
    }

    #[test]
    fn history_view() {
        let publications = [Publication {
            post_id: PostId::new("AbC123xy"),
            user_id: UserId(1),
            network: "NetA".into(),
            city: "Metro".into(),
            published_at: at(2024, 5, 1, 9, 30, 0),
            deleted_at: Some(at(2024, 5, 1, 10, 0, 0)),
            message: None,
        }];

        expect!["AbC123xy NetA / Metro at 2024-05-01 09:30 (GMT+03:00), deleted at 2024-05-01 10:00 (GMT+03:00)"]
            .assert_eq(&history(&publications));
    }
}
