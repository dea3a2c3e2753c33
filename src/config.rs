use dotenvy::dotenv;
use serde::Deserialize;
use serenity::model::id::{ChannelId, GuildId, RoleId};
use std::env;
use std::fs;

/// Process-level configuration, read once from the environment.
#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    pub database_url: String,
    pub guilds_file: String,
    pub youtube_api_key: Option<String>,
    pub smtp_server: Option<String>,
    pub email_user: Option<String>,
    pub email_password: Option<String>,
    pub status_interval_secs: u64,
    pub verification_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> anyhow::Result<Self> {
        Ok(Config {
            discord_token: env::var("DISCORD_TOKEN")
                .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN must be set"))?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "data/mp2i.db".to_string()),
            guilds_file: env::var("GUILDS_FILE").unwrap_or_else(|_| "guilds.toml".to_string()),
            youtube_api_key: env::var("YOUTUBE_API_KEY").ok(),
            smtp_server: env::var("SMTP_SERVER").ok(),
            email_user: env::var("EMAIL_USER").ok(),
            email_password: env::var("EMAIL_PASSWORD").ok(),
            status_interval_secs: env::var("STATUS_INTERVAL_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            verification_timeout_secs: env::var("VERIFICATION_TIMEOUT_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),
        })
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"[REDACTED]")
            .field("database_url", &self.database_url)
            .field("guilds_file", &self.guilds_file)
            .field(
                "youtube_api_key",
                &self.youtube_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("smtp_server", &self.smtp_server)
            .field("email_user", &self.email_user)
            .field(
                "email_password",
                &self.email_password.as_ref().map(|_| "[REDACTED]"),
            )
            .field("status_interval_secs", &self.status_interval_secs)
            .field(
                "verification_timeout_secs",
                &self.verification_timeout_secs,
            )
            .finish()
    }
}

/// Per-guild static configuration, loaded once from `guilds.toml` and
/// treated as immutable afterwards.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub guilds: Vec<GuildConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GuildConfig {
    pub id: u64,
    #[serde(default)]
    pub roles: Vec<RoleConfig>,
    #[serde(default)]
    pub channels: ChannelsConfig,
}

/// Maps a named qualifier ("MP2I", "Administrateur", ...) to a live role.
/// `emoji` is either a unicode emoji or the name of a custom guild emoji.
#[derive(Clone, Debug, Deserialize)]
pub struct RoleConfig {
    pub qualifier: String,
    pub role_id: u64,
    pub emoji: Option<String>,
    #[serde(default)]
    pub choiceable: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChannelsConfig {
    pub log: Option<u64>,
    pub suggestions: Option<u64>,
    pub sanctions_log: Option<u64>,
}

impl BotConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read guild config {}: {}", path, e))?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn guild(&self, guild_id: GuildId) -> Option<&GuildConfig> {
        self.guilds.iter().find(|g| g.id == guild_id.get())
    }
}

impl GuildConfig {
    pub fn role(&self, qualifier: &str) -> Option<&RoleConfig> {
        self.roles.iter().find(|r| r.qualifier == qualifier)
    }

    pub fn role_id(&self, qualifier: &str) -> Option<RoleId> {
        self.role(qualifier).map(|r| RoleId::new(r.role_id))
    }

    pub fn choiceable_roles(&self) -> impl Iterator<Item = &RoleConfig> {
        self.roles.iter().filter(|r| r.choiceable)
    }

    /// Resolves a reaction emoji (unicode string or custom emoji name) to
    /// the choiceable qualifier it selects, if any.
    pub fn qualifier_for_emoji(&self, emoji_name: &str) -> Option<&RoleConfig> {
        self.choiceable_roles()
            .find(|r| r.emoji.as_deref() == Some(emoji_name))
    }

    pub fn log_channel(&self) -> Option<ChannelId> {
        self.channels.log.map(ChannelId::new)
    }

    pub fn suggestion_channel(&self) -> Option<ChannelId> {
        self.channels.suggestions.map(ChannelId::new)
    }

    pub fn sanctions_log_channel(&self) -> Option<ChannelId> {
        self.channels.sanctions_log.map(ChannelId::new)
    }
}

/// Discord message limit is 2000 characters
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [[guilds]]
        id = 123

        [guilds.channels]
        log = 1
        suggestions = 2
        sanctions_log = 3

        [[guilds.roles]]
        qualifier = "MP2I"
        role_id = 10
        emoji = "🔵"
        choiceable = true

        [[guilds.roles]]
        qualifier = "MPI"
        role_id = 11
        emoji = "🟢"
        choiceable = true

        [[guilds.roles]]
        qualifier = "Administrateur"
        role_id = 12
    "#;

    #[test]
    fn test_guild_config_parsing() {
        let config: BotConfig = toml::from_str(SAMPLE).unwrap();
        let guild = config.guild(GuildId::new(123)).unwrap();
        assert_eq!(guild.roles.len(), 3);
        assert_eq!(guild.role_id("MPI"), Some(RoleId::new(11)));
        assert_eq!(guild.log_channel(), Some(ChannelId::new(1)));
        assert!(config.guild(GuildId::new(999)).is_none());

        // Only choiceable roles are selectable by emoji
        assert_eq!(guild.choiceable_roles().count(), 2);
        let selected = guild.qualifier_for_emoji("🔵").unwrap();
        assert_eq!(selected.qualifier, "MP2I");
        assert!(guild.qualifier_for_emoji("🤖").is_none());
    }

    #[test]
    fn test_config_logic() {
        std::env::remove_var("DISCORD_TOKEN");
        let result = Config::build();
        assert!(result.is_err(), "Should fail when the token is missing");

        std::env::set_var("DISCORD_TOKEN", "test_token");
        std::env::set_var("EMAIL_PASSWORD", "secret_password");
        let config = Config::build().unwrap();
        assert_eq!(config.status_interval_secs, 30);
        assert_eq!(config.verification_timeout_secs, 300);

        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("test_token"));
        assert!(!debug_output.contains("secret_password"));
        assert!(debug_output.contains("[REDACTED]"));

        std::env::remove_var("DISCORD_TOKEN");
        std::env::remove_var("EMAIL_PASSWORD");
    }
}
