use crate::Database;
use crate::models::{
    ConnectionRow, HelpRequestRow, MoodLogRow, PushSubscriptionRow, SessionRow, UserRow, now,
};
use anyhow::{Result, bail};
use rand::Rng;
use rusqlite::{Connection, Row, ToSql};

/// Connection codes avoid 0/O and 1/I so they can be read aloud.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 6;
const CODE_ATTEMPTS: usize = 16;

const USER_COLUMNS: &str =
    "id, username, password, role, avatar_url, connection_code, created_at, last_login";

pub struct NewUser<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub password_hash: &'a str,
    pub role: &'a str,
    pub avatar_url: Option<&'a str>,
    pub connection_code: Option<&'a str>,
}

impl Database {
    // -- Users --

    /// Insert a user. Returns `false` when the username is already taken.
    pub fn create_user(&self, user: &NewUser<'_>) -> Result<bool> {
        self.with_conn(|conn| {
            let result = conn.execute(
                "INSERT INTO users (id, username, password, role, avatar_url, connection_code, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    user.id,
                    user.username,
                    user.password_hash,
                    user.role,
                    user.avatar_url,
                    user.connection_code,
                    now(),
                ],
            );

            match result {
                Ok(_) => Ok(true),
                Err(e) if unique_violation_on(&e, "users.username") => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn get_user_by_connection_code(&self, code: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "connection_code", code))
    }

    pub fn touch_last_login(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("UPDATE users SET last_login = ?2 WHERE id = ?1", (id, now()))?;
            Ok(())
        })
    }

    /// Returns `false` when no such user exists.
    pub fn update_avatar(&self, id: &str, avatar_url: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET avatar_url = ?2 WHERE id = ?1",
                (id, avatar_url),
            )?;
            Ok(changed == 1)
        })
    }

    /// Draw a connection code that no user holds yet.
    pub fn generate_connection_code(&self) -> Result<String> {
        let mut rng = rand::rng();

        for _ in 0..CODE_ATTEMPTS {
            let code: String = (0..CODE_LENGTH)
                .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
                .collect();

            let taken = self.with_conn(|conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM users WHERE connection_code = ?1",
                    [&code],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })?;

            if !taken {
                return Ok(code);
            }
        }

        bail!("Could not find a free connection code after {} attempts", CODE_ATTEMPTS)
    }

    // -- Sessions --

    pub fn create_session(&self, id: &str, user_id: &str, expires_at: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_sessions (id, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
                (id, user_id, now(), expires_at),
            )?;
            Ok(())
        })
    }

    /// Fetch a session that has not expired yet.
    pub fn get_live_session(&self, id: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, created_at, expires_at FROM user_sessions
                 WHERE id = ?1 AND expires_at > ?2",
                (id, now()),
                |row| {
                    Ok(SessionRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        created_at: row.get(2)?,
                        expires_at: row.get(3)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn delete_session(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM user_sessions WHERE id = ?1", [id])?;
            Ok(changed == 1)
        })
    }

    /// Remove expired sessions. Returns how many were pruned.
    pub fn purge_expired_sessions(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM user_sessions WHERE expires_at <= ?1", [now()])?;
            Ok(removed)
        })
    }

    // -- Connections --

    /// Insert a guardian -> student edge. Returns `None` if the pair is
    /// already connected.
    pub fn insert_connection(
        &self,
        id: &str,
        parent_educator_id: &str,
        student_id: &str,
    ) -> Result<Option<ConnectionRow>> {
        self.with_conn(|conn| {
            let result = conn.execute(
                "INSERT INTO connections (id, parent_educator_id, student_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                (id, parent_educator_id, student_id, now()),
            );

            match result {
                Ok(_) => query_connection(conn, id),
                Err(e) if unique_violation_on(&e, "connections.") => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Connections the user takes part in, on either side.
    pub fn connections_for_user(&self, user_id: &str) -> Result<Vec<ConnectionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.parent_educator_id, c.student_id, c.created_at,
                        s.username, s.connection_code, s.avatar_url
                 FROM connections c
                 JOIN users s ON s.id = c.student_id
                 WHERE c.parent_educator_id = ?1 OR c.student_id = ?1
                 ORDER BY c.created_at DESC, c.rowid DESC",
            )?;

            let rows = stmt
                .query_map([user_id], map_connection)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn connected_student_ids(&self, parent_educator_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT student_id FROM connections WHERE parent_educator_id = ?1")?;
            let ids = stmt
                .query_map([parent_educator_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(ids)
        })
    }

    /// Parents/educators connected to a student.
    pub fn guardian_ids(&self, student_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT parent_educator_id FROM connections WHERE student_id = ?1")?;
            let ids = stmt
                .query_map([student_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(ids)
        })
    }

    pub fn is_connected(&self, parent_educator_id: &str, student_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM connections WHERE parent_educator_id = ?1 AND student_id = ?2",
                (parent_educator_id, student_id),
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    /// Delete a connection the user is a party to. Returns `false` when no
    /// such connection is visible to them.
    pub fn delete_connection(&self, id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM connections WHERE id = ?1 AND (parent_educator_id = ?2 OR student_id = ?2)",
                (id, user_id),
            )?;
            Ok(changed == 1)
        })
    }

    // -- Mood logs --

    pub fn insert_mood_log(&self, id: &str, student_id: &str, mood: &str) -> Result<MoodLogRow> {
        self.with_conn(|conn| {
            let created_at = now();
            conn.execute(
                "INSERT INTO mood_logs (id, student_id, mood, created_at) VALUES (?1, ?2, ?3, ?4)",
                (id, student_id, mood, &created_at),
            )?;

            Ok(MoodLogRow {
                id: id.to_string(),
                student_id: student_id.to_string(),
                mood: mood.to_string(),
                created_at,
            })
        })
    }

    /// Most recent mood logs of the given students, newest first.
    pub fn mood_logs_for_students(&self, student_ids: &[String], limit: u32) -> Result<Vec<MoodLogRow>> {
        if student_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id, student_id, mood, created_at FROM mood_logs
                 WHERE student_id IN ({})
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?{}",
                placeholders(student_ids.len()),
                student_ids.len() + 1
            );

            let mut params = id_params(student_ids);
            params.push(&limit);

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(MoodLogRow {
                        id: row.get(0)?,
                        student_id: row.get(1)?,
                        mood: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Help requests --

    /// Insert an active help request unless the student already has one.
    /// The check and the insert are a single statement, backed by a partial
    /// unique index, so concurrent callers cannot both succeed.
    pub fn insert_active_help_request(&self, id: &str, student_id: &str) -> Result<Option<HelpRequestRow>> {
        self.with_conn(|conn| {
            let result = conn.execute(
                "INSERT INTO help_requests (id, student_id, is_active, created_at)
                 SELECT ?1, ?2, 1, ?3
                 WHERE NOT EXISTS (
                     SELECT 1 FROM help_requests WHERE student_id = ?2 AND is_active = 1
                 )",
                (id, student_id, now()),
            );

            match result {
                Ok(0) => Ok(None),
                Ok(_) => query_help_request(conn, id),
                Err(e) if unique_violation_on(&e, "help_requests.") => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn active_help_request(&self, student_id: &str) -> Result<Option<HelpRequestRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, student_id, is_active, created_at, resolved_at FROM help_requests
                 WHERE student_id = ?1 AND is_active = 1",
                [student_id],
                map_help_request,
            )
            .optional()
        })
    }

    pub fn get_help_request(&self, id: &str) -> Result<Option<HelpRequestRow>> {
        self.with_conn(|conn| query_help_request(conn, id))
    }

    /// Help requests of the given students, newest first.
    pub fn help_requests_for_students(
        &self,
        student_ids: &[String],
        active_only: bool,
    ) -> Result<Vec<HelpRequestRow>> {
        if student_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id, student_id, is_active, created_at, resolved_at FROM help_requests
                 WHERE student_id IN ({}) {}
                 ORDER BY created_at DESC, rowid DESC",
                placeholders(student_ids.len()),
                if active_only { "AND is_active = 1" } else { "" }
            );

            let params = id_params(student_ids);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), map_help_request)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Flip an active request to resolved. Returns `None` if the request does
    /// not exist or was already resolved.
    pub fn resolve_help_request(&self, id: &str) -> Result<Option<HelpRequestRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE help_requests SET is_active = 0, resolved_at = ?2
                 WHERE id = ?1 AND is_active = 1",
                (id, now()),
            )?;

            if changed == 0 {
                return Ok(None);
            }
            query_help_request(conn, id)
        })
    }

    // -- Push subscriptions --

    /// Insert or refresh a subscription, keyed by its endpoint.
    pub fn upsert_push_subscription(
        &self,
        id: &str,
        user_id: &str,
        endpoint: &str,
        p256dh: &str,
        auth: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO push_subscriptions (id, user_id, endpoint, p256dh, auth, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(endpoint) DO UPDATE SET
                     user_id = excluded.user_id,
                     p256dh = excluded.p256dh,
                     auth = excluded.auth",
                rusqlite::params![id, user_id, endpoint, p256dh, auth, now()],
            )?;
            Ok(())
        })
    }

    pub fn delete_push_subscription(&self, user_id: &str, endpoint: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM push_subscriptions WHERE user_id = ?1 AND endpoint = ?2",
                (user_id, endpoint),
            )?;
            Ok(changed == 1)
        })
    }

    pub fn push_subscriptions_for(&self, user_id: &str) -> Result<Vec<PushSubscriptionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, endpoint, p256dh, auth, created_at FROM push_subscriptions
                 WHERE user_id = ?1",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(PushSubscriptionRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        endpoint: row.get(2)?,
                        p256dh: row.get(3)?,
                        auth: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column);
    let mut stmt = conn.prepare(&sql)?;

    stmt.query_row([value], |row| {
        Ok(UserRow {
            id: row.get(0)?,
            username: row.get(1)?,
            password: row.get(2)?,
            role: row.get(3)?,
            avatar_url: row.get(4)?,
            connection_code: row.get(5)?,
            created_at: row.get(6)?,
            last_login: row.get(7)?,
        })
    })
    .optional()
}

fn query_connection(conn: &Connection, id: &str) -> Result<Option<ConnectionRow>> {
    conn.query_row(
        "SELECT c.id, c.parent_educator_id, c.student_id, c.created_at,
                s.username, s.connection_code, s.avatar_url
         FROM connections c
         JOIN users s ON s.id = c.student_id
         WHERE c.id = ?1",
        [id],
        map_connection,
    )
    .optional()
}

fn query_help_request(conn: &Connection, id: &str) -> Result<Option<HelpRequestRow>> {
    conn.query_row(
        "SELECT id, student_id, is_active, created_at, resolved_at FROM help_requests WHERE id = ?1",
        [id],
        map_help_request,
    )
    .optional()
}

fn map_connection(row: &Row<'_>) -> rusqlite::Result<ConnectionRow> {
    Ok(ConnectionRow {
        id: row.get(0)?,
        parent_educator_id: row.get(1)?,
        student_id: row.get(2)?,
        created_at: row.get(3)?,
        student_username: row.get(4)?,
        student_connection_code: row.get(5)?,
        student_avatar_url: row.get(6)?,
    })
}

fn map_help_request(row: &Row<'_>) -> rusqlite::Result<HelpRequestRow> {
    Ok(HelpRequestRow {
        id: row.get(0)?,
        student_id: row.get(1)?,
        is_active: row.get(2)?,
        created_at: row.get(3)?,
        resolved_at: row.get(4)?,
    })
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn id_params(ids: &[String]) -> Vec<&dyn ToSql> {
    ids.iter().map(|id| id as &dyn ToSql).collect()
}

/// True when `err` is a UNIQUE/PRIMARY KEY failure whose message names
/// `target` (a `table.column` or `table.` prefix).
fn unique_violation_on(err: &rusqlite::Error, target: &str) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, message) => {
            let unique = e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY;
            unique && message.as_deref().is_some_and(|m| m.contains(target))
        }
        _ => false,
    }
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
