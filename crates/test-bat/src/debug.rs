use super::{SnapshotFormat, Style};
use expect_test::Expect;
use std::fmt;

struct Imp;

impl<T: fmt::Debug + ?Sized> SnapshotFormat<T> for Imp {
    fn make_snapshot_imp(style: Style, actual: &T) -> String {
        match style {
            Style::Terse => format!("{actual:?}"),
            Style::Verbose => format!("{actual:#?}"),
        }
    }
}

/// Asserts that the [`fmt::Debug`] representation of `actual` is equal to the
/// given expected snapshot. Uses [`make_snapshot`] to make the
/// snapshot fit into a common width of a single screen.
#[track_caller]
pub fn assert_eq<T: fmt::Debug>(actual: T, expected: &Expect) {
    <Imp as SnapshotFormat<T>>::assert_eq(&actual, expected)
}

/// Same as [`assert_eq`], but specialized for [`Result`].
/// If the result is an [`Err`], then the snapshot will be prefixed
/// with `Err:` and the error chain will be displayed.
#[track_caller]
pub fn assert_result_eq<T, E>(actual: &Result<T, E>, expected: &Expect)
where
    T: fmt::Debug,
    E: std::error::Error,
{
    <Imp as SnapshotFormat<T>>::assert_result_eq(actual, expected)
}

/// Formats `actual` to string using [`fmt::Debug`] implementation of `actual`.
/// If its string length exceeds approximately a single-screen amount of characters,
/// it will be pretty-formatted with the `#` formatting specifier to fit its width
/// into a single screen.
pub fn make_snapshot<T: fmt::Debug>(actual: T) -> String {
    <Imp as SnapshotFormat<T>>::make_snapshot(&actual)
}

#[cfg(test)]
mod tests {
    use expect_test::expect;

    #[test]
    fn short_values_stay_on_one_line() {
        super::assert_eq((1, "two"), &expect![[r#"(1, "two")"#]]);
    }

    #[test]
    fn long_values_are_pretty_printed() {
        let actual = ["a rather long string value", "and another one that needs wrapping"];
        super::assert_eq(
            actual,
            &expect![[r#"
                [
                    "a rather long string value",
                    "and another one that needs wrapping",
                ]"#]],
        );
    }
}
