use poise::serenity_prelude::CreateEmbed;
use songbird::input::YoutubeDl;

use crate::{youtube, Context, Error};

/// Rejoint votre salon vocal
#[poise::command(
    slash_command,
    guild_only,
    required_bot_permissions = "CONNECT | SPEAK"
)]
pub async fn join(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;

    let channel_id = {
        let guild = ctx.guild().ok_or("Could not access guild")?;
        guild
            .voice_states
            .get(&ctx.author().id)
            .and_then(|vs| vs.channel_id)
            .ok_or("You must be in a voice channel to use this command")?
    };

    let manager = songbird::get(ctx.serenity_context())
        .await
        .ok_or("Songbird Voice client not initialized")?
        .clone();

    match manager.join(guild_id, channel_id).await {
        Ok(_) => {
            ctx.say(format!("🔊 Connecté à <#{}>", channel_id)).await?;
        }
        Err(e) => {
            ctx.say(format!("❌ Impossible de rejoindre le salon vocal : {}", e))
                .await?;
        }
    }

    Ok(())
}

/// Joue une musique depuis YouTube
#[poise::command(
    slash_command,
    guild_only,
    required_bot_permissions = "CONNECT | SPEAK"
)]
pub async fn play(
    ctx: Context<'_>,
    #[description = "Une URL YouTube ou des mots-clés à rechercher"] query: String,
) -> Result<(), Error> {
    ctx.defer().await?;

    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let data = ctx.data();
    let manager = songbird::get(ctx.serenity_context())
        .await
        .ok_or("Songbird Voice client not initialized")?
        .clone();

    // Plain keywords go through the search API so the queue announcement
    // can carry a title instead of raw user input.
    let (title, url) = if query.starts_with("http://") || query.starts_with("https://") {
        (query.clone(), query)
    } else {
        let Some(api_key) = data.config.youtube_api_key.as_deref() else {
            ctx.say("❌ La recherche YouTube n'est pas configurée, utilisez une URL.")
                .await?;
            return Ok(());
        };
        match youtube::search(&data.http_client, api_key, &query, 1)
            .await?
            .into_iter()
            .next()
        {
            Some(video) => (video.name, video.url),
            None => {
                ctx.say("Aucune musique n'a été trouvée.").await?;
                return Ok(());
            }
        }
    };

    if let Some(handler_lock) = manager.get(guild_id) {
        let mut handler = handler_lock.lock().await;

        let source = YoutubeDl::new(data.http_client.clone(), url.clone());
        handler.enqueue_input(source.into()).await;

        let embed = CreateEmbed::new()
            .title("🎵 Ajouté à la file d'attente")
            .description(format!("[{}]({})", title, url))
            .color(0x57F287);

        ctx.send(poise::CreateReply::default().embed(embed)).await?;
    } else {
        ctx.say("❌ Je ne suis pas dans un salon vocal. Utilisez `/join` d'abord.")
            .await?;
    }

    Ok(())
}

/// Passe la musique en cours
#[poise::command(slash_command, guild_only)]
pub async fn skip(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let manager = songbird::get(ctx.serenity_context())
        .await
        .ok_or("Songbird Voice client not initialized")?;

    if let Some(handler_lock) = manager.get(guild_id) {
        let handler = handler_lock.lock().await;
        let queue = handler.queue();

        if queue.is_empty() {
            ctx.say("📭 La file d'attente est vide").await?;
        } else {
            queue.skip()?;
            ctx.say("⏭️ Musique passée").await?;
        }
    } else {
        ctx.say("❌ Je ne suis pas dans un salon vocal").await?;
    }

    Ok(())
}

/// Met la musique en pause
#[poise::command(slash_command, guild_only)]
pub async fn pause(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let manager = songbird::get(ctx.serenity_context())
        .await
        .ok_or("Songbird Voice client not initialized")?;

    if let Some(handler_lock) = manager.get(guild_id) {
        let handler = handler_lock.lock().await;
        let queue = handler.queue();

        if queue.is_empty() {
            ctx.say("📭 La file d'attente est vide").await?;
        } else {
            queue.pause()?;
            ctx.say("⏸️ Musique mise en pause").await?;
        }
    } else {
        ctx.say("❌ Je ne suis pas dans un salon vocal").await?;
    }

    Ok(())
}

/// Reprend la musique en pause
#[poise::command(slash_command, guild_only)]
pub async fn resume(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let manager = songbird::get(ctx.serenity_context())
        .await
        .ok_or("Songbird Voice client not initialized")?;

    if let Some(handler_lock) = manager.get(guild_id) {
        let handler = handler_lock.lock().await;
        let queue = handler.queue();

        if queue.is_empty() {
            ctx.say("📭 La file d'attente est vide").await?;
        } else {
            queue.resume()?;
            ctx.say("▶️ Musique reprise").await?;
        }
    } else {
        ctx.say("❌ Je ne suis pas dans un salon vocal").await?;
    }

    Ok(())
}

/// Arrête la musique et quitte le salon vocal
#[poise::command(slash_command, guild_only)]
pub async fn leave(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let manager = songbird::get(ctx.serenity_context())
        .await
        .ok_or("Songbird Voice client not initialized")?;

    if manager.get(guild_id).is_some() {
        manager.remove(guild_id).await?;
        ctx.say("👋 Salon vocal quitté").await?;
    } else {
        ctx.say("❌ Je ne suis pas dans un salon vocal").await?;
    }

    Ok(())
}

/// Affiche la file d'attente
#[poise::command(slash_command, guild_only)]
pub async fn queue(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let manager = songbird::get(ctx.serenity_context())
        .await
        .ok_or("Songbird Voice client not initialized")?;

    if let Some(handler_lock) = manager.get(guild_id) {
        let handler = handler_lock.lock().await;
        let queue = handler.queue();

        if queue.is_empty() {
            ctx.say("📭 La file d'attente est vide").await?;
        } else {
            let count = queue.len();
            let embed = CreateEmbed::new()
                .title("🎶 File d'attente")
                .description(format!("{} musique(s) en attente", count))
                .color(0x5865F2);

            ctx.send(poise::CreateReply::default().embed(embed)).await?;
        }
    } else {
        ctx.say("❌ Je ne suis pas dans un salon vocal").await?;
    }

    Ok(())
}
