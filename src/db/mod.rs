use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Result};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::config::Config;

/// One row in the guilds table.
#[derive(Clone, Debug, PartialEq)]
pub struct GuildRow {
    pub id: i64,
    pub name: String,
    pub roles_message_id: Option<i64>,
}

/// One row in the members table, keyed by (id, guild_id).
#[derive(Clone, Debug, PartialEq)]
pub struct MemberRow {
    pub id: i64,
    pub guild_id: i64,
    pub name: String,
    pub role: Option<String>,
    pub messages_count: i64,
    pub profile_color: Option<String>,
    pub high_school: Option<i64>,
    pub engineering_school: Option<i64>,
    pub generation: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct SanctionRow {
    pub id: i64,
    pub by_id: i64,
    pub to_id: i64,
    pub guild_id: i64,
    pub date: String,
    pub kind: String,
    pub reason: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SuggestionRow {
    pub id: i64,
    pub author_id: i64,
    pub guild_id: i64,
    pub date: String,
    pub description: String,
    pub message_id: i64,
    pub state: String,
}

#[derive(Clone, Debug)]
pub struct SchoolRow {
    pub id: i64,
    pub kind: String,
    pub name: String,
}

pub const SCHOOL_CPGE: &str = "cpge";
pub const SCHOOL_ENGINEERING: &str = "engineering";

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

fn now() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

impl Database {
    pub fn new(config: &Config) -> Result<Self> {
        let conn = Connection::open(&config.database_url)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn execute_init(&self) -> anyhow::Result<()> {
        info!("Database: Initializing schema...");
        let sql = "
            CREATE TABLE IF NOT EXISTS guilds (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                roles_message_id INTEGER
            );

            CREATE TABLE IF NOT EXISTS schools (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                type TEXT NOT NULL,
                name TEXT NOT NULL,
                UNIQUE (type, name)
            );

            CREATE TABLE IF NOT EXISTS members (
                id INTEGER NOT NULL,
                guild_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                role TEXT,
                messages_count INTEGER NOT NULL DEFAULT 0,
                profile_color TEXT,
                high_school INTEGER REFERENCES schools (id) ON DELETE SET NULL,
                engineering_school INTEGER REFERENCES schools (id) ON DELETE SET NULL,
                generation INTEGER,
                PRIMARY KEY (id, guild_id),
                FOREIGN KEY (guild_id) REFERENCES guilds (id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                author_id INTEGER NOT NULL,
                guild_id INTEGER NOT NULL,
                channel TEXT NOT NULL,
                date DATETIME NOT NULL,
                content TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_messages_author ON messages (author_id, guild_id);

            CREATE TABLE IF NOT EXISTS sanctions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                by_id INTEGER NOT NULL,
                to_id INTEGER NOT NULL,
                guild_id INTEGER NOT NULL,
                date DATETIME NOT NULL,
                type TEXT NOT NULL,
                reason TEXT,
                FOREIGN KEY (guild_id) REFERENCES guilds (id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS suggestions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                author_id INTEGER NOT NULL,
                guild_id INTEGER NOT NULL,
                date DATETIME NOT NULL,
                description TEXT NOT NULL,
                message_id INTEGER NOT NULL UNIQUE,
                state TEXT NOT NULL DEFAULT 'open',
                FOREIGN KEY (guild_id) REFERENCES guilds (id) ON DELETE CASCADE
            );
        ";
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(sql)?;
        debug!("Database: Schema initialized successfully");
        Ok(())
    }

    // --- Guilds ---

    pub fn insert_guild(&self, id: i64, name: &str) -> anyhow::Result<()> {
        debug!("Database: Registering guild {} ({})", id, name);
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO guilds (id, name) VALUES (?1, ?2)",
            (id, name),
        )?;
        Ok(())
    }

    pub fn get_guild(&self, id: i64) -> anyhow::Result<Option<GuildRow>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, name, roles_message_id FROM guilds WHERE id = ?1",
                [id],
                |row| {
                    Ok(GuildRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        roles_message_id: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn set_roles_message_id(&self, id: i64, message_id: Option<i64>) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE guilds SET roles_message_id = ?1 WHERE id = ?2",
            (message_id, id),
        )?;
        Ok(())
    }

    /// Guild removal cascades to members, sanctions and suggestions.
    pub fn delete_guild(&self, id: i64) -> anyhow::Result<()> {
        info!("Database: Deleting guild {} and all its rows", id);
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM guilds WHERE id = ?1", [id])?;
        Ok(())
    }

    // --- Members ---

    pub fn insert_member(
        &self,
        id: i64,
        guild_id: i64,
        name: &str,
        role: Option<&str>,
    ) -> anyhow::Result<()> {
        debug!("Database: Registering member {} in guild {}", id, guild_id);
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO members (id, guild_id, name, role) VALUES (?1, ?2, ?3, ?4)",
            (id, guild_id, name, role),
        )?;
        Ok(())
    }

    pub fn get_member(&self, id: i64, guild_id: i64) -> anyhow::Result<Option<MemberRow>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, guild_id, name, role, messages_count, profile_color,
                        high_school, engineering_school, generation
                 FROM members WHERE id = ?1 AND guild_id = ?2",
                (id, guild_id),
                |row| {
                    Ok(MemberRow {
                        id: row.get(0)?,
                        guild_id: row.get(1)?,
                        name: row.get(2)?,
                        role: row.get(3)?,
                        messages_count: row.get(4)?,
                        profile_color: row.get(5)?,
                        high_school: row.get(6)?,
                        engineering_school: row.get(7)?,
                        generation: row.get(8)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn set_member_role(
        &self,
        id: i64,
        guild_id: i64,
        role: Option<&str>,
    ) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE members SET role = ?1 WHERE id = ?2 AND guild_id = ?3",
            (role, id, guild_id),
        )?;
        Ok(())
    }

    pub fn increment_messages_count(&self, id: i64, guild_id: i64) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE members SET messages_count = messages_count + 1
             WHERE id = ?1 AND guild_id = ?2",
            (id, guild_id),
        )?;
        Ok(())
    }

    pub fn set_member_generation(
        &self,
        id: i64,
        guild_id: i64,
        generation: Option<i64>,
    ) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE members SET generation = ?1 WHERE id = ?2 AND guild_id = ?3",
            (generation, id, guild_id),
        )?;
        Ok(())
    }

    pub fn set_member_high_school(
        &self,
        id: i64,
        guild_id: i64,
        school: Option<i64>,
    ) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE members SET high_school = ?1 WHERE id = ?2 AND guild_id = ?3",
            (school, id, guild_id),
        )?;
        Ok(())
    }

    pub fn set_member_engineering_school(
        &self,
        id: i64,
        guild_id: i64,
        school: Option<i64>,
    ) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE members SET engineering_school = ?1 WHERE id = ?2 AND guild_id = ?3",
            (school, id, guild_id),
        )?;
        Ok(())
    }

    pub fn set_member_profile_color(
        &self,
        id: i64,
        guild_id: i64,
        color: Option<&str>,
    ) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE members SET profile_color = ?1 WHERE id = ?2 AND guild_id = ?3",
            (color, id, guild_id),
        )?;
        Ok(())
    }

    /// Members of a guild associated with the given school (either column).
    pub fn members_by_school(&self, guild_id: i64, school_id: i64) -> anyhow::Result<Vec<MemberRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, guild_id, name, role, messages_count, profile_color,
                    high_school, engineering_school, generation
             FROM members
             WHERE guild_id = ?1 AND (high_school = ?2 OR engineering_school = ?2)",
        )?;
        let rows = stmt.query_map((guild_id, school_id), |row| {
            Ok(MemberRow {
                id: row.get(0)?,
                guild_id: row.get(1)?,
                name: row.get(2)?,
                role: row.get(3)?,
                messages_count: row.get(4)?,
                profile_color: row.get(5)?,
                high_school: row.get(6)?,
                engineering_school: row.get(7)?,
                generation: row.get(8)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    // --- Message log ---

    pub fn log_message(
        &self,
        author_id: i64,
        guild_id: i64,
        channel: &str,
        content: &str,
    ) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO messages (author_id, guild_id, channel, date, content)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            (author_id, guild_id, channel, now(), content),
        )?;
        Ok(())
    }

    // --- Sanctions ---

    pub fn insert_sanction(
        &self,
        by_id: i64,
        to_id: i64,
        guild_id: i64,
        kind: &str,
        reason: Option<&str>,
    ) -> anyhow::Result<i64> {
        debug!(
            "Database: Recording {} against {} in guild {}",
            kind, to_id, guild_id
        );
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sanctions (by_id, to_id, guild_id, date, type, reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            (by_id, to_id, guild_id, now(), kind, reason),
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn delete_sanction(&self, id: i64, guild_id: i64) -> anyhow::Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "DELETE FROM sanctions WHERE id = ?1 AND guild_id = ?2",
            (id, guild_id),
        )?;
        Ok(count)
    }

    pub fn list_sanctions(
        &self,
        guild_id: i64,
        to_id: Option<i64>,
    ) -> anyhow::Result<Vec<SanctionRow>> {
        let conn = self.conn.lock().unwrap();
        let map = |row: &rusqlite::Row| -> Result<SanctionRow> {
            Ok(SanctionRow {
                id: row.get(0)?,
                by_id: row.get(1)?,
                to_id: row.get(2)?,
                guild_id: row.get(3)?,
                date: row.get(4)?,
                kind: row.get(5)?,
                reason: row.get(6)?,
            })
        };

        let mut results = Vec::new();
        if let Some(to_id) = to_id {
            let mut stmt = conn.prepare(
                "SELECT id, by_id, to_id, guild_id, date, type, reason
                 FROM sanctions WHERE guild_id = ?1 AND to_id = ?2 ORDER BY date",
            )?;
            let rows = stmt.query_map((guild_id, to_id), map)?;
            for row in rows {
                results.push(row?);
            }
        } else {
            let mut stmt = conn.prepare(
                "SELECT id, by_id, to_id, guild_id, date, type, reason
                 FROM sanctions WHERE guild_id = ?1 ORDER BY date",
            )?;
            let rows = stmt.query_map([guild_id], map)?;
            for row in rows {
                results.push(row?);
            }
        }
        Ok(results)
    }

    // --- Suggestions ---

    /// None when the message is already recorded (the insert is ignored and
    /// `last_insert_rowid` would belong to an unrelated row).
    pub fn insert_suggestion(
        &self,
        author_id: i64,
        guild_id: i64,
        description: &str,
        message_id: i64,
    ) -> anyhow::Result<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO suggestions (author_id, guild_id, date, description, message_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            (author_id, guild_id, now(), description, message_id),
        )?;
        if conn.changes() == 0 {
            return Ok(None);
        }
        Ok(Some(conn.last_insert_rowid()))
    }

    /// Moves an open suggestion to a terminal state. Returns the updated row,
    /// or None when no open suggestion matches the message.
    pub fn close_suggestion(
        &self,
        message_id: i64,
        state: &str,
    ) -> anyhow::Result<Option<SuggestionRow>> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "UPDATE suggestions SET state = ?1 WHERE message_id = ?2 AND state = 'open'",
            (state, message_id),
        )?;
        if count == 0 {
            return Ok(None);
        }
        let row = conn
            .query_row(
                "SELECT id, author_id, guild_id, date, description, message_id, state
                 FROM suggestions WHERE message_id = ?1",
                [message_id],
                |row| {
                    Ok(SuggestionRow {
                        id: row.get(0)?,
                        author_id: row.get(1)?,
                        guild_id: row.get(2)?,
                        date: row.get(3)?,
                        description: row.get(4)?,
                        message_id: row.get(5)?,
                        state: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn list_suggestions(
        &self,
        guild_id: i64,
        state: Option<&str>,
    ) -> anyhow::Result<Vec<SuggestionRow>> {
        let conn = self.conn.lock().unwrap();
        let map = |row: &rusqlite::Row| -> Result<SuggestionRow> {
            Ok(SuggestionRow {
                id: row.get(0)?,
                author_id: row.get(1)?,
                guild_id: row.get(2)?,
                date: row.get(3)?,
                description: row.get(4)?,
                message_id: row.get(5)?,
                state: row.get(6)?,
            })
        };

        let mut results = Vec::new();
        if let Some(state) = state {
            let mut stmt = conn.prepare(
                "SELECT id, author_id, guild_id, date, description, message_id, state
                 FROM suggestions WHERE guild_id = ?1 AND state = ?2 ORDER BY date",
            )?;
            let rows = stmt.query_map((guild_id, state), map)?;
            for row in rows {
                results.push(row?);
            }
        } else {
            let mut stmt = conn.prepare(
                "SELECT id, author_id, guild_id, date, description, message_id, state
                 FROM suggestions WHERE guild_id = ?1 ORDER BY date",
            )?;
            let rows = stmt.query_map([guild_id], map)?;
            for row in rows {
                results.push(row?);
            }
        }
        Ok(results)
    }

    // --- Schools ---

    /// Returns the id of the (type, name) row, inserting it when missing.
    /// `last_insert_rowid` would be stale when the insert is ignored.
    pub fn insert_school(&self, kind: &str, name: &str) -> anyhow::Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO schools (type, name) VALUES (?1, ?2)",
            (kind, name),
        )?;
        let id = conn.query_row(
            "SELECT id FROM schools WHERE type = ?1 AND name = ?2",
            (kind, name),
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn rename_school(&self, kind: &str, old: &str, new: &str) -> anyhow::Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "UPDATE schools SET name = ?1 WHERE type = ?2 AND name = ?3",
            (new, kind, old),
        )?;
        Ok(count)
    }

    /// Deletes a school; member references are cleared through the
    /// ON DELETE SET NULL foreign keys.
    pub fn delete_school(&self, kind: &str, name: &str) -> anyhow::Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "DELETE FROM schools WHERE type = ?1 AND name = ?2",
            (kind, name),
        )?;
        Ok(count)
    }

    pub fn school_by_name(&self, kind: &str, name: &str) -> anyhow::Result<Option<SchoolRow>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, type, name FROM schools WHERE type = ?1 AND name = ?2",
                (kind, name),
                |row| {
                    Ok(SchoolRow {
                        id: row.get(0)?,
                        kind: row.get(1)?,
                        name: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn school_name(&self, id: i64) -> anyhow::Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let name = conn
            .query_row("SELECT name FROM schools WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(name)
    }

    pub fn schools(&self, kind: &str) -> anyhow::Result<Vec<SchoolRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT id, type, name FROM schools WHERE type = ?1 ORDER BY name")?;
        let rows = stmt.query_map([kind], |row| {
            Ok(SchoolRow {
                id: row.get(0)?,
                kind: row.get(1)?,
                name: row.get(2)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::in_memory().unwrap();
        db.execute_init().unwrap();
        db
    }

    #[test]
    fn test_guild_round_trip() {
        let db = test_db();

        assert!(db.get_guild(1).unwrap().is_none());
        db.insert_guild(1, "MP2I").unwrap();

        let guild = db.get_guild(1).unwrap().unwrap();
        assert_eq!(guild.name, "MP2I");
        assert_eq!(guild.roles_message_id, None);

        db.set_roles_message_id(1, Some(42)).unwrap();
        assert_eq!(db.get_guild(1).unwrap().unwrap().roles_message_id, Some(42));

        // Registering twice is ignored, not an error
        db.insert_guild(1, "renamed").unwrap();
        assert_eq!(db.get_guild(1).unwrap().unwrap().name, "MP2I");
    }

    #[test]
    fn test_member_is_tracked_per_guild() {
        let db = test_db();
        db.insert_guild(1, "a").unwrap();
        db.insert_guild(2, "b").unwrap();

        db.insert_member(7, 1, "alice", Some("MP2I")).unwrap();
        db.insert_member(7, 2, "alice", None).unwrap();

        db.increment_messages_count(7, 1).unwrap();
        db.increment_messages_count(7, 1).unwrap();

        let in_a = db.get_member(7, 1).unwrap().unwrap();
        let in_b = db.get_member(7, 2).unwrap().unwrap();
        assert_eq!(in_a.messages_count, 2);
        assert_eq!(in_b.messages_count, 0);
        assert_eq!(in_a.role.as_deref(), Some("MP2I"));
        assert_eq!(in_b.role, None);
    }

    #[test]
    fn test_member_role_last_writer_wins() {
        let db = test_db();
        db.insert_guild(1, "g").unwrap();
        db.insert_member(7, 1, "alice", None).unwrap();

        db.set_member_role(7, 1, Some("MP2I")).unwrap();
        db.set_member_role(7, 1, Some("MPI")).unwrap();
        assert_eq!(
            db.get_member(7, 1).unwrap().unwrap().role.as_deref(),
            Some("MPI")
        );

        db.set_member_role(7, 1, None).unwrap();
        assert_eq!(db.get_member(7, 1).unwrap().unwrap().role, None);
    }

    #[test]
    fn test_guild_delete_cascades() {
        let db = test_db();
        db.insert_guild(1, "g").unwrap();
        db.insert_member(7, 1, "alice", None).unwrap();
        db.insert_sanction(2, 7, 1, "warn", Some("spam")).unwrap();
        db.insert_suggestion(7, 1, "more emotes", 99).unwrap();

        db.delete_guild(1).unwrap();
        assert!(db.get_member(7, 1).unwrap().is_none());
        assert!(db.list_sanctions(1, None).unwrap().is_empty());
        assert!(db.list_suggestions(1, None).unwrap().is_empty());
    }

    #[test]
    fn test_sanctions_log() {
        let db = test_db();
        db.insert_guild(1, "g").unwrap();

        let id = db.insert_sanction(2, 7, 1, "warn", Some("spam")).unwrap();
        db.insert_sanction(2, 8, 1, "ban", None).unwrap();

        let all = db.list_sanctions(1, None).unwrap();
        assert_eq!(all.len(), 2);
        let for_seven = db.list_sanctions(1, Some(7)).unwrap();
        assert_eq!(for_seven.len(), 1);
        assert_eq!(for_seven[0].kind, "warn");
        assert_eq!(for_seven[0].reason.as_deref(), Some("spam"));

        // unwarn removes exactly the targeted row
        assert_eq!(db.delete_sanction(id, 1).unwrap(), 1);
        assert_eq!(db.delete_sanction(id, 1).unwrap(), 0);
        assert_eq!(db.list_sanctions(1, None).unwrap().len(), 1);
    }

    #[test]
    fn test_suggestion_state_transitions() {
        let db = test_db();
        db.insert_guild(1, "g").unwrap();

        db.insert_suggestion(7, 1, "more emotes", 99).unwrap();
        let open = db.list_suggestions(1, Some("open")).unwrap();
        assert_eq!(open.len(), 1);

        let accepted = db.close_suggestion(99, "accepted").unwrap().unwrap();
        assert_eq!(accepted.state, "accepted");
        assert_eq!(accepted.description, "more emotes");

        // Terminal states cannot be reopened or re-closed
        assert!(db.close_suggestion(99, "declined").unwrap().is_none());
        assert!(db.close_suggestion(1234, "accepted").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_suggestion_message_reports_no_id() {
        let db = test_db();
        db.insert_guild(1, "g").unwrap();

        let first = db.insert_suggestion(7, 1, "more emotes", 99).unwrap();
        assert!(first.is_some());

        // The same message id is ignored and must not echo another row's id
        assert_eq!(db.insert_suggestion(7, 1, "more emotes", 99).unwrap(), None);
        assert_eq!(db.list_suggestions(1, None).unwrap().len(), 1);
    }

    #[test]
    fn test_reinserting_school_returns_existing_id() {
        let db = test_db();

        let id = db.insert_school(SCHOOL_CPGE, "Hoche").unwrap();
        db.insert_school(SCHOOL_ENGINEERING, "ENSIMAG").unwrap();

        assert_eq!(db.insert_school(SCHOOL_CPGE, "Hoche").unwrap(), id);
        assert_eq!(db.schools(SCHOOL_CPGE).unwrap().len(), 1);
    }

    #[test]
    fn test_school_crud_clears_member_references() {
        let db = test_db();
        db.insert_guild(1, "g").unwrap();
        db.insert_member(7, 1, "alice", None).unwrap();

        let school_id = db.insert_school(SCHOOL_CPGE, "Lycée Kléber").unwrap();
        db.set_member_high_school(7, 1, Some(school_id)).unwrap();
        assert_eq!(
            db.get_member(7, 1).unwrap().unwrap().high_school,
            Some(school_id)
        );
        assert_eq!(db.members_by_school(1, school_id).unwrap().len(), 1);

        db.rename_school(SCHOOL_CPGE, "Lycée Kléber", "Lycée Hoche")
            .unwrap();
        assert!(db
            .school_by_name(SCHOOL_CPGE, "Lycée Hoche")
            .unwrap()
            .is_some());

        assert_eq!(db.delete_school(SCHOOL_CPGE, "Lycée Hoche").unwrap(), 1);
        assert_eq!(db.get_member(7, 1).unwrap().unwrap().high_school, None);
    }

    #[test]
    fn test_schools_are_kind_scoped() {
        let db = test_db();
        db.insert_school(SCHOOL_CPGE, "Hoche").unwrap();
        db.insert_school(SCHOOL_ENGINEERING, "ENSIMAG").unwrap();

        assert_eq!(db.schools(SCHOOL_CPGE).unwrap().len(), 1);
        assert!(db.school_by_name(SCHOOL_ENGINEERING, "Hoche").unwrap().is_none());
    }
}
