use serenity::model::id::{GuildId, UserId};
use tracing::warn;

use crate::db::{Database, MemberRow};

/// Fallback when a member never picked a profile color.
pub const DEFAULT_PROFILE_COLOR: &str = "3498DB";

/// Binds a live member to its database row, keyed by (user id, guild id).
///
/// Setters go straight to the database and the next read re-fetches the
/// row, so the wrapper never holds stale state. There is no optimistic
/// concurrency check: two updates racing on the same member leave the
/// last writer's value.
pub struct MemberWrapper<'a> {
    db: &'a Database,
    pub user_id: UserId,
    pub guild_id: GuildId,
    pub name: String,
}

impl<'a> MemberWrapper<'a> {
    pub fn new(db: &'a Database, user_id: UserId, guild_id: GuildId, name: impl Into<String>) -> Self {
        Self {
            db,
            user_id,
            guild_id,
            name: name.into(),
        }
    }

    fn key(&self) -> (i64, i64) {
        (self.user_id.get() as i64, self.guild_id.get() as i64)
    }

    pub fn exists(&self) -> anyhow::Result<bool> {
        Ok(self.row()?.is_some())
    }

    pub fn row(&self) -> anyhow::Result<Option<MemberRow>> {
        let (id, guild_id) = self.key();
        self.db.get_member(id, guild_id)
    }

    pub fn register(&self, qualifier: Option<&str>) -> anyhow::Result<()> {
        let (id, guild_id) = self.key();
        self.db.insert_member(id, guild_id, &self.name, qualifier)
    }

    /// The intended invariant is that every member who joined or spoke is
    /// registered; when a row is missing here the join-time path was
    /// skipped, so register on the spot and warn about the desync.
    pub fn ensure_registered(&self) -> anyhow::Result<()> {
        if !self.exists()? {
            warn!(
                "Member {} ({}) was not registered in guild {}, registering now",
                self.name, self.user_id, self.guild_id
            );
            self.register(None)?;
        }
        Ok(())
    }

    pub fn role_qualifier(&self) -> anyhow::Result<Option<String>> {
        Ok(self.row()?.and_then(|r| r.role))
    }

    pub fn set_role(&self, qualifier: Option<&str>) -> anyhow::Result<()> {
        let (id, guild_id) = self.key();
        self.db.set_member_role(id, guild_id, qualifier)
    }

    pub fn messages_count(&self) -> anyhow::Result<i64> {
        Ok(self.row()?.map(|r| r.messages_count).unwrap_or(0))
    }

    pub fn increment_messages_count(&self) -> anyhow::Result<()> {
        let (id, guild_id) = self.key();
        self.db.increment_messages_count(id, guild_id)
    }

    pub fn generation(&self) -> anyhow::Result<Option<i64>> {
        Ok(self.row()?.and_then(|r| r.generation))
    }

    pub fn set_generation(&self, generation: Option<i64>) -> anyhow::Result<()> {
        let (id, guild_id) = self.key();
        self.db.set_member_generation(id, guild_id, generation)
    }

    pub fn high_school(&self) -> anyhow::Result<Option<i64>> {
        Ok(self.row()?.and_then(|r| r.high_school))
    }

    pub fn set_high_school(&self, school: Option<i64>) -> anyhow::Result<()> {
        let (id, guild_id) = self.key();
        self.db.set_member_high_school(id, guild_id, school)
    }

    pub fn engineering_school(&self) -> anyhow::Result<Option<i64>> {
        Ok(self.row()?.and_then(|r| r.engineering_school))
    }

    pub fn set_engineering_school(&self, school: Option<i64>) -> anyhow::Result<()> {
        let (id, guild_id) = self.key();
        self.db.set_member_engineering_school(id, guild_id, school)
    }

    pub fn profile_color(&self) -> anyhow::Result<String> {
        Ok(self
            .row()?
            .and_then(|r| r.profile_color)
            .unwrap_or_else(|| DEFAULT_PROFILE_COLOR.to_string()))
    }

    pub fn set_profile_color(&self, color: Option<&str>) -> anyhow::Result<()> {
        let (id, guild_id) = self.key();
        self.db.set_member_profile_color(id, guild_id, color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn test_db() -> Database {
        let db = Database::in_memory().unwrap();
        db.execute_init().unwrap();
        db.insert_guild(1, "mp2i").unwrap();
        db
    }

    #[test]
    fn test_lazy_registration_inserts_exactly_one_row() {
        let db = test_db();
        let member = MemberWrapper::new(&db, UserId::new(7), GuildId::new(1), "alice");

        assert!(!member.exists().unwrap());
        member.ensure_registered().unwrap();
        assert!(member.exists().unwrap());

        // Registering again is a no-op, and the zeroed counters survive
        member.increment_messages_count().unwrap();
        member.ensure_registered().unwrap();
        assert_eq!(member.messages_count().unwrap(), 1);
    }

    #[test]
    fn test_setters_are_read_after_write() {
        let db = test_db();
        let member = MemberWrapper::new(&db, UserId::new(7), GuildId::new(1), "alice");
        member.register(Some("MP2I")).unwrap();

        assert_eq!(member.role_qualifier().unwrap().as_deref(), Some("MP2I"));
        member.set_role(Some("MPI")).unwrap();
        assert_eq!(member.role_qualifier().unwrap().as_deref(), Some("MPI"));

        member.set_generation(Some(2023)).unwrap();
        assert_eq!(member.generation().unwrap(), Some(2023));
    }

    #[test]
    fn test_profile_color_fallback() {
        let db = test_db();
        let member = MemberWrapper::new(&db, UserId::new(7), GuildId::new(1), "alice");
        member.register(None).unwrap();

        assert_eq!(member.profile_color().unwrap(), DEFAULT_PROFILE_COLOR);
        member.set_profile_color(Some("FF22FF")).unwrap();
        assert_eq!(member.profile_color().unwrap(), "FF22FF");
    }
}
