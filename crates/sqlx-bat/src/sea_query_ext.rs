use crate::{SqliteQuery, SqliteQueryAs, SqliteQueryScalar};
use easy_ext::ext;
use sea_query_binder::SqlxValues;
use sqlx::sqlite::SqliteRow;

#[macro_export]
macro_rules! simple_expr_vec {
    ($($value:expr),* $(,)?) => {
        vec![
            $($crate::imp::sea_query::SimpleExpr::from($value),)*
        ]
    };
}

/// Unfortunately, [`sqlx`] query types are limited to borrowing the SQL string,
/// so we must have this intermediate wrapper, that is also borrowed by a unique
/// reference during the method call chain to let us keep it in scope while the
/// [`sqlx`] query is being used.
pub struct SqlxQuery {
    sql: String,
    values: Option<SqlxValues>,
}

#[ext(SqlxBinderExt)]
pub impl<T: sea_query_binder::SqlxBinder> T {
    fn into_sqlx(&self) -> SqlxQuery {
        let (sql, values) = self.build_sqlx(sea_query::SqliteQueryBuilder);
        SqlxQuery {
            sql,
            values: Some(values),
        }
    }
}

impl SqlxQuery {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Convert this to [`SqliteQuery`].
    ///
    /// # Panics
    ///
    /// This method should be a consuming one, but due to the limitations of [`sqlx`],
    /// the check for the double call is done at runtime, so you must make sure
    /// not to use the [`SqlxQuery`] after calling this method.
    pub fn query(&mut self) -> SqliteQuery<'_> {
        let values = self.unwrap_values();
        sqlx::query_with(&self.sql, values)
    }

    /// Convert this to [`SqliteQueryAs`].
    ///
    /// # Panics
    ///
    /// Same as [`SqlxQuery::query`].
    pub fn query_as<O>(&mut self) -> SqliteQueryAs<'_, O>
    where
        O: for<'r> sqlx::FromRow<'r, SqliteRow>,
    {
        let values = self.unwrap_values();
        sqlx::query_as_with(&self.sql, values)
    }

    /// Convert this to [`SqliteQueryScalar`].
    ///
    /// # Panics
    ///
    /// Same as [`SqlxQuery::query`].
    pub fn query_scalar<O>(&mut self) -> SqliteQueryScalar<'_, O>
    where
        (O,): for<'r> sqlx::FromRow<'r, SqliteRow>,
    {
        let values = self.unwrap_values();
        sqlx::query_scalar_with(&self.sql, values)
    }

    fn unwrap_values(&mut self) -> SqlxValues {
        self.values
            .take()
            .expect("BUG: it is allowed to build sqlx query only once")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_query::{Expr, Iden, Query};

    #[derive(Iden)]
    enum Grants {
        Table,
        UserId,
        City,
    }

    #[test]
    fn builds_sqlite_dialect() {
        let query = Query::select()
            .columns([Grants::UserId, Grants::City])
            .from(Grants::Table)
            .and_where(Expr::col(Grants::UserId).eq(42))
            .to_owned()
            .into_sqlx();

        assert_eq!(
            query.sql(),
            r#"SELECT "user_id", "city" FROM "grants" WHERE "user_id" = ?"#
        );
    }

    #[tokio::test]
    async fn runs_against_in_memory_db() {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();

        let answer: i64 = Query::select()
            .expr(Expr::val(42))
            .to_owned()
            .into_sqlx()
            .query_scalar()
            .fetch_one(&pool)
            .await
            .unwrap();

        assert_eq!(answer, 42);
    }
}
