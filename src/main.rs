use mp2i_bot::commands::{admin, music, professor, profile, sanctions, school, suggestions};
use mp2i_bot::config::{BotConfig, Config};
use mp2i_bot::{events, roles, Data};
use poise::serenity_prelude as serenity;
use songbird::serenity::SerenityInit;
use tracing::{error, info};

async fn on_error(error: poise::FrameworkError<'_, Data, mp2i_bot::Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            panic!("Failed to start bot: {:?}", error)
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!(
                command = %ctx.command().qualified_name,
                "Command returned an error: {:?}", error
            );
            let _ = ctx
                .send(
                    poise::CreateReply::default()
                        .content(
                            "Une erreur interne est survenue, veuillez contacter un Administrateur.",
                        )
                        .ephemeral(true),
                )
                .await;
        }
        poise::FrameworkError::MissingUserPermissions { ctx, .. }
        | poise::FrameworkError::NotAnOwner { ctx, .. } => {
            let _ = ctx
                .send(
                    poise::CreateReply::default()
                        .content("Vous n'avez pas les droits suffisants pour cette commande.")
                        .ephemeral(true),
                )
                .await;
        }
        poise::FrameworkError::GuildOnly { ctx, .. } => {
            let _ = ctx
                .send(
                    poise::CreateReply::default()
                        .content("Cette commande ne peut être utilisée que sur un serveur.")
                        .ephemeral(true),
                )
                .await;
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    let guilds = BotConfig::load(&config.guilds_file)?;
    let discord_token = config.discord_token.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                roles::roles_selection(),
                profile::profile(),
                profile::profile_color(),
                school::school(),
                school::generation(),
                school::members(),
                school::referents(),
                school::add_school(),
                school::update_school(),
                school::del_school(),
                sanctions::warn(),
                sanctions::unwarn(),
                sanctions::sanctions_list(),
                sanctions::ban(),
                sanctions::timeout(),
                suggestions::suggestions_rules(),
                suggestions::suggestions_list(),
                professor::professor(),
                admin::clear(),
                admin::say(),
                admin::status(),
                music::join(),
                music::play(),
                music::skip(),
                music::pause(),
                music::resume(),
                music::leave(),
                music::queue(),
            ],
            event_handler: |ctx, event, _framework, data| {
                Box::pin(async move { events::dispatch(ctx, event, data).await })
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                info!("Bot is ready!");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                let db = mp2i_bot::db::Database::new(&config)?;
                db.execute_init()?;
                let mailer = mp2i_bot::email::Mailer::from_config(&config);

                Ok(Data {
                    config,
                    guilds,
                    db,
                    http_client: reqwest::Client::new(),
                    mailer,
                    status: mp2i_bot::status::StatusRotation::default(),
                    verifications: mp2i_bot::email::PendingVerifications::default(),
                    ban_names: events::BanNameCache::default(),
                })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_MESSAGE_REACTIONS
        | serenity::GatewayIntents::GUILD_VOICE_STATES
        | serenity::GatewayIntents::GUILD_MODERATION;

    // Deleted and edited message logging needs the original content cached
    let mut cache_settings = serenity::Settings::default();
    cache_settings.max_messages = 1000;

    let mut client = serenity::ClientBuilder::new(&discord_token, intents)
        .framework(framework)
        .cache_settings(cache_settings)
        .register_songbird()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    info!("Starting bot...");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}
