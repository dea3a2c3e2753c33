pub mod commands;
pub mod config;
pub mod db;
pub mod email;
pub mod events;
pub mod roles;
pub mod status;
pub mod wrappers;
pub mod youtube;

/// Custom data passed to all commands and event handlers
pub struct Data {
    pub config: config::Config,
    pub guilds: config::BotConfig,
    pub db: db::Database,
    pub http_client: reqwest::Client,
    pub mailer: Option<email::Mailer>,
    pub status: status::StatusRotation,
    pub verifications: email::PendingVerifications,
    pub ban_names: events::BanNameCache,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
