//! Missing batteries for writing snapshot tests with [`expect_test`].

pub mod debug;
pub mod json;

use expect_test::Expect;

/// Approximate number of characters that can fit on a single screen
const COMMON_SCREEN_CHARS_WIDTH: usize = 60;

#[derive(Clone, Copy)]
enum Style {
    Terse,
    Verbose,
}

trait SnapshotFormat<T: ?Sized> {
    fn make_snapshot_imp(style: Style, actual: &T) -> String;

    fn make_snapshot(actual: &T) -> String {
        let terse = Self::make_snapshot_imp(Style::Terse, actual);

        let Some(width) = terse.lines().map(str::len).max() else {
            return terse;
        };

        if width >= COMMON_SCREEN_CHARS_WIDTH {
            return Self::make_snapshot_imp(Style::Verbose, actual);
        }

        terse
    }

    #[track_caller]
    fn assert_eq(actual: &T, expected: &Expect) {
        expected.assert_eq(&Self::make_snapshot(actual));
    }

    #[track_caller]
    fn assert_result_eq<O, E>(actual: &Result<O, E>, expected: &Expect)
    where
        Self: SnapshotFormat<O>,
        E: std::error::Error,
    {
        let actual = match actual {
            Ok(actual) => <Self as SnapshotFormat<O>>::make_snapshot(actual),
            Err(err) => format!("Err: {}", display_chain(err)),
        };
        expected.assert_eq(&actual);
    }
}

fn display_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(err) = source {
        out.push_str(&format!("\nCaused by: {err}"));
        source = err.source();
    }
    out
}
