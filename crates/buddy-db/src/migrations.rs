use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id               TEXT PRIMARY KEY,
                username         TEXT NOT NULL UNIQUE,
                password         TEXT,
                role             TEXT NOT NULL CHECK (role IN ('student', 'parent', 'educator')),
                avatar_url       TEXT,
                connection_code  TEXT UNIQUE,
                created_at       TEXT NOT NULL,
                last_login       TEXT
            );

            CREATE TABLE user_sessions (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL,
                expires_at  TEXT NOT NULL
            );

            CREATE INDEX idx_sessions_user ON user_sessions(user_id);

            CREATE TABLE connections (
                id                  TEXT PRIMARY KEY,
                parent_educator_id  TEXT NOT NULL REFERENCES users(id),
                student_id          TEXT NOT NULL REFERENCES users(id),
                created_at          TEXT NOT NULL,
                UNIQUE(parent_educator_id, student_id)
            );

            CREATE INDEX idx_connections_student ON connections(student_id);

            CREATE TABLE mood_logs (
                id          TEXT PRIMARY KEY,
                student_id  TEXT NOT NULL REFERENCES users(id),
                mood        TEXT NOT NULL CHECK (mood IN ('happy', 'sad', 'calm', 'excited', 'focused')),
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_mood_logs_student ON mood_logs(student_id, created_at);

            CREATE TABLE help_requests (
                id           TEXT PRIMARY KEY,
                student_id   TEXT NOT NULL REFERENCES users(id),
                is_active    INTEGER NOT NULL DEFAULT 1,
                created_at   TEXT NOT NULL,
                resolved_at  TEXT
            );

            CREATE INDEX idx_help_requests_student ON help_requests(student_id, created_at);

            -- At most one active request per student
            CREATE UNIQUE INDEX idx_help_requests_one_active
                ON help_requests(student_id) WHERE is_active = 1;

            CREATE TABLE push_subscriptions (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id),
                endpoint    TEXT NOT NULL UNIQUE,
                p256dh      TEXT NOT NULL,
                auth        TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_push_subscriptions_user ON push_subscriptions(user_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
