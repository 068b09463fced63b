use chrono::prelude::*;
use easy_ext::ext;

#[ext(DateTimeExt)]
pub(crate) impl<Tz: chrono::TimeZone> DateTime<Tz> {
    /// Formats the timestamp in its own timezone, which for the quota engine
    /// is the reference timezone of the process.
    fn to_human_readable(&self) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        self.format("%Y-%m-%d %H:%M (GMT%:z)").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Moscow;

    #[test]
    fn human_readable_uses_own_timezone() {
        let at = Moscow.with_ymd_and_hms(2024, 5, 1, 23, 30, 0).unwrap();
        expect_test::expect!["2024-05-01 23:30 (GMT+03:00)"].assert_eq(&at.to_human_readable());
    }
}
