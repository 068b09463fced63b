/// Builds a crate [`Error`](crate::Error) from an [`ErrorKind`](crate::ErrorKind)
/// variant or any other type convertible into it, e.g.
/// `err!(DbError::InvalidColumn { column, value })`.
///
/// Every field goes through [`Into::into`], so `&str` fills a `String` field.
/// A field without a value takes the variable of the same name.
macro_rules! err {
    (@field $name:ident $value:expr) => ($value);
    (@field $name:ident) => ($name);
    ($variant:path $({
        $( $field:ident $(: $value:expr)? ),*
        $(,)?
    })?) => {{
        use $variant as Variant;

        $crate::error::Error::from(
            Variant $({$(
                $field: ::std::convert::Into::into(
                    $crate::error::err!(@field $field $($value)?)
                )
            ),*})?
        )
    }};
}

/// `map_err` closure that puts the error into the `source` field of the
/// variant, e.g. `.map_err(err_ctx!(DbError::Connect))`.
macro_rules! err_ctx {
    ($variant:path $({ $($fields:tt)* })?) => {
        |source| $crate::error::err!($variant { source, $($($fields)*)? })
    };
}

/// [`ErrorKind::Fatal`](crate::ErrorKind::Fatal) with a formatted message
/// and no source.
macro_rules! fatal {
    ($($fmt:tt)*) => {
        $crate::error::err!($crate::ErrorKind::Fatal {
            message: format!($($fmt)*),
            source: None,
        })
    };
}

pub(crate) use err;
pub(crate) use err_ctx;
pub(crate) use fatal;
