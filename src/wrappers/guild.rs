use serenity::model::id::{ChannelId, GuildId, MessageId, RoleId};
use tracing::warn;

use crate::config::{GuildConfig, RoleConfig};
use crate::db::{Database, GuildRow};

/// Binds a live guild to its static configuration and its database row.
///
/// All configuration lookups return None (with a warning) when the guild
/// is not configured; callers are expected to null-check, never to unwrap.
pub struct GuildWrapper<'a> {
    db: &'a Database,
    config: Option<&'a GuildConfig>,
    pub id: GuildId,
    pub name: String,
}

impl<'a> GuildWrapper<'a> {
    pub fn new(
        db: &'a Database,
        config: Option<&'a GuildConfig>,
        id: GuildId,
        name: impl Into<String>,
    ) -> Self {
        if config.is_none() {
            warn!("Guild {} has no entry in the guild config file", id);
        }
        Self {
            db,
            config,
            id,
            name: name.into(),
        }
    }

    pub fn exists(&self) -> anyhow::Result<bool> {
        Ok(self.row()?.is_some())
    }

    pub fn register(&self) -> anyhow::Result<()> {
        self.db.insert_guild(self.id.get() as i64, &self.name)
    }

    pub fn row(&self) -> anyhow::Result<Option<GuildRow>> {
        self.db.get_guild(self.id.get() as i64)
    }

    /// The persisted pointer to the single role-selection message.
    pub fn roles_message_id(&self) -> anyhow::Result<Option<MessageId>> {
        let row = self.row()?;
        Ok(row
            .and_then(|r| r.roles_message_id)
            .map(|id| MessageId::new(id as u64)))
    }

    pub fn set_roles_message_id(&self, message_id: Option<MessageId>) -> anyhow::Result<()> {
        self.db.set_roles_message_id(
            self.id.get() as i64,
            message_id.map(|id| id.get() as i64),
        )
    }

    pub fn config(&self) -> Option<&'a GuildConfig> {
        self.config
    }

    /// Resolves a named qualifier to its configured role id.
    pub fn role_id(&self, qualifier: &str) -> Option<RoleId> {
        let role = self.config.and_then(|c| c.role_id(qualifier));
        if role.is_none() {
            warn!("No role configured for qualifier {:?} in guild {}", qualifier, self.id);
        }
        role
    }

    pub fn choiceable_roles(&self) -> impl Iterator<Item = &'a RoleConfig> {
        self.config.into_iter().flat_map(|c| c.choiceable_roles())
    }

    pub fn qualifier_for_emoji(&self, emoji_name: &str) -> Option<&'a RoleConfig> {
        self.config.and_then(|c| c.qualifier_for_emoji(emoji_name))
    }

    pub fn log_channel(&self) -> Option<ChannelId> {
        self.config.and_then(|c| c.log_channel())
    }

    pub fn suggestion_channel(&self) -> Option<ChannelId> {
        self.config.and_then(|c| c.suggestion_channel())
    }

    pub fn sanctions_log_channel(&self) -> Option<ChannelId> {
        self.config.and_then(|c| c.sanctions_log_channel())
    }
}
