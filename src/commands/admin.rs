use poise::serenity_prelude as serenity;
use serenity::{ActivityData, GetMessages};
use tracing::info;

use crate::{youtube, Context, Error};

/// Supprime les derniers messages du salon
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn clear(
    ctx: Context<'_>,
    #[description = "Le nombre de messages à supprimer"]
    #[min = 1]
    #[max = 100]
    number: u8,
) -> Result<(), Error> {
    let channel_id = ctx.channel_id();
    let messages = channel_id
        .messages(ctx.http(), GetMessages::new().limit(number))
        .await?;
    let count = messages.len();
    channel_id.delete_messages(ctx.http(), messages).await?;

    info!(
        "{} cleared {} messages in channel {}",
        ctx.author().name,
        count,
        channel_id
    );
    ctx.send(
        poise::CreateReply::default()
            .content(format!("{} messages supprimés.", count))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Fait parler le bot
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn say(
    ctx: Context<'_>,
    #[description = "Le message à envoyer"] message: String,
) -> Result<(), Error> {
    ctx.channel_id().say(ctx.http(), message).await?;
    ctx.send(
        poise::CreateReply::default()
            .content("Message envoyé.")
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Remplace la rotation de statuts par des vidéos YouTube
#[poise::command(slash_command, owners_only)]
pub async fn status(
    ctx: Context<'_>,
    #[description = "La recherche YouTube alimentant les statuts"] query: String,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let data = ctx.data();

    let Some(api_key) = data.config.youtube_api_key.as_deref() else {
        ctx.say("La recherche YouTube n'est pas configurée.").await?;
        return Ok(());
    };

    let activities: Vec<ActivityData> = youtube::search(&data.http_client, api_key, &query, 50)
        .await?
        .into_iter()
        .filter_map(|video| ActivityData::streaming(video.name, video.url).ok())
        .collect();

    if activities.is_empty() {
        ctx.say("Aucune vidéo n'a été trouvée.").await?;
        return Ok(());
    }

    let count = activities.len();
    data.status.replace(activities);
    ctx.say(format!("La rotation contient maintenant {} statuts.", count))
        .await?;
    Ok(())
}
