use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// A forward-only migration with a matching rollback batch. Batches go
/// through `execute_batch`, which understands statement boundaries, so
/// semicolons inside string literals are safe.
struct Migration {
    version: i64,
    name: &'static str,
    up: &'static str,
    down: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "core",
        up: "
            CREATE TABLE users (
                id                       TEXT PRIMARY KEY,
                email                    TEXT NOT NULL UNIQUE,
                password                 TEXT NOT NULL,
                reset_token              TEXT,
                reset_token_expires_at   TEXT,
                created_at               TEXT NOT NULL,
                updated_at               TEXT NOT NULL
            );

            CREATE TABLE tweets (
                id                TEXT PRIMARY KEY,
                user_id           TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                content           TEXT NOT NULL,
                status            TEXT NOT NULL DEFAULT 'draft',
                scheduled_for     TEXT,
                twitter_tweet_id  TEXT,
                sent_at           TEXT,
                error_message     TEXT,
                created_at        TEXT NOT NULL,
                updated_at        TEXT NOT NULL
            );

            CREATE INDEX idx_tweets_user
                ON tweets(user_id, updated_at);

            CREATE INDEX idx_tweets_due
                ON tweets(status, scheduled_for);
        ",
        down: "
            DROP INDEX idx_tweets_due;
            DROP INDEX idx_tweets_user;
            DROP TABLE tweets;
            DROP TABLE users;
        ",
    },
    Migration {
        version: 2,
        name: "ai_responses",
        up: "
            CREATE TABLE ai_responses (
                id            TEXT PRIMARY KEY,
                tweet_id      TEXT REFERENCES tweets(id) ON DELETE SET NULL,
                kind          TEXT NOT NULL,
                request_hash  TEXT NOT NULL UNIQUE,
                response      TEXT NOT NULL,
                created_at    TEXT NOT NULL
            );

            CREATE INDEX idx_ai_responses_age
                ON ai_responses(created_at);
        ",
        down: "
            DROP INDEX idx_ai_responses_age;
            DROP TABLE ai_responses;
        ",
    },
    Migration {
        version: 3,
        name: "twitter",
        up: "
            CREATE TABLE twitter_tokens (
                id                TEXT PRIMARY KEY,
                user_id           TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
                access_token      TEXT NOT NULL,
                refresh_token     TEXT,
                twitter_user_id   TEXT NOT NULL,
                twitter_username  TEXT NOT NULL,
                twitter_name      TEXT NOT NULL,
                expires_at        TEXT,
                created_at        TEXT NOT NULL,
                updated_at        TEXT NOT NULL
            );

            CREATE TABLE oauth_states (
                state          TEXT PRIMARY KEY,
                user_id        TEXT NOT NULL,
                code_verifier  TEXT NOT NULL,
                created_at     TEXT NOT NULL
            );

            ALTER TABLE users ADD COLUMN twitter_user_id TEXT;
            ALTER TABLE users ADD COLUMN twitter_username TEXT;
            ALTER TABLE users ADD COLUMN twitter_name TEXT;
        ",
        down: "
            ALTER TABLE users DROP COLUMN twitter_name;
            ALTER TABLE users DROP COLUMN twitter_username;
            ALTER TABLE users DROP COLUMN twitter_user_id;
            DROP TABLE oauth_states;
            DROP TABLE twitter_tokens;
        ",
    },
];

pub fn run(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY,
            name        TEXT NOT NULL,
            applied_at  TEXT NOT NULL
        )",
    )?;

    let current = applied_version(conn)?;

    for m in MIGRATIONS.iter().filter(|m| m.version > current) {
        let tx = conn.transaction()?;
        tx.execute_batch(m.up)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![m.version, m.name, crate::now_timestamp()],
        )?;
        tx.commit()?;
        info!("Applied migration {} ({})", m.version, m.name);
    }

    Ok(())
}

/// Roll back to `target` (exclusive), newest first. Only used by
/// operational tooling; the server itself never rolls back.
pub fn rollback(conn: &mut Connection, target: i64) -> Result<()> {
    let current = applied_version(conn)?;

    for m in MIGRATIONS
        .iter()
        .rev()
        .filter(|m| m.version <= current && m.version > target)
    {
        let tx = conn.transaction()?;
        tx.execute_batch(m.down)?;
        tx.execute(
            "DELETE FROM schema_migrations WHERE version = ?1",
            [m.version],
        )?;
        tx.commit()?;
        info!("Rolled back migration {} ({})", m.version, m.name);
    }

    Ok(())
}

fn applied_version(conn: &Connection) -> Result<i64> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered_and_unique() {
        let mut versions: Vec<i64> = MIGRATIONS.iter().map(|m| m.version).collect();
        let sorted = versions.clone();
        versions.dedup();
        assert_eq!(versions, sorted);
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn run_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();
        run(&mut conn).unwrap();
        assert_eq!(applied_version(&conn).unwrap(), 3);
    }

    #[test]
    fn rollback_unwinds_to_target() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();

        rollback(&mut conn, 1).unwrap();
        assert_eq!(applied_version(&conn).unwrap(), 1);

        // twitter + ai tables gone, core still present
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('twitter_tokens', 'oauth_states', 'ai_responses')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 0);
        let tweets: i64 = conn
            .query_row("SELECT COUNT(*) FROM tweets", [], |row| row.get(0))
            .unwrap();
        assert_eq!(tweets, 0);

        // re-applying brings the schema back
        run(&mut conn).unwrap();
        assert_eq!(applied_version(&conn).unwrap(), 3);
    }
}
