use easy_ext::ext;

#[ext(ErrorExt)]
pub impl sqlx::Error {
    /// SQLite reports a busy or locked database file as a regular database
    /// error (`SQLITE_BUSY = 5`, `SQLITE_LOCKED = 6`). These are transient.
    fn is_sqlite_busy(&self) -> bool {
        self.as_database_error()
            .and_then(|err| err.code())
            .and_then(|code| code.parse::<i32>().ok())
            // Extended result codes carry the primary one in the lowest byte
            .map(|code| matches!(code & 0xff, 5 | 6))
            .unwrap_or(false)
    }

    fn is_transient(&self) -> bool {
        self.is_sqlite_busy()
            || matches!(
                self,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::WorkerCrashed
            )
    }
}
