use super::{SnapshotFormat, Style};
use expect_test::Expect;
use serde::Serialize;

struct Imp;

impl<T: Serialize + ?Sized> SnapshotFormat<T> for Imp {
    fn make_snapshot_imp(style: Style, actual: &T) -> String {
        match style {
            Style::Terse => serde_json::to_string(actual).unwrap(),
            Style::Verbose => serde_json::to_string_pretty(actual).unwrap(),
        }
    }
}

/// Asserts that the JSON [`Serialize`] representation of `actual` is equal to the
/// given expected snapshot. Uses [`make_snapshot`] to make the
/// snapshot fit into a common width of a single screen.
#[track_caller]
pub fn assert_eq<T: Serialize>(actual: T, expected: &Expect) {
    <Imp as SnapshotFormat<T>>::assert_eq(&actual, expected)
}

/// Same as [`self::assert_eq`], but specialized for [`Result`].
/// If the result is an [`Err`], then the snapshot will be prefixed
/// with `Err:` and the error chain will be displayed.
#[track_caller]
pub fn assert_result_eq<T, E>(actual: &Result<T, E>, expected: &Expect)
where
    T: Serialize,
    E: std::error::Error,
{
    <Imp as SnapshotFormat<T>>::assert_result_eq(actual, expected)
}

/// Formats `actual` to string using JSON [`Serialize`] implementation of `actual`.
/// If its string length exceeds approximately a single-screen amount of characters,
/// it will be pretty-printed to fit its width into a single screen.
pub fn make_snapshot<T: Serialize>(actual: T) -> String {
    <Imp as SnapshotFormat<T>>::make_snapshot(&actual)
}
