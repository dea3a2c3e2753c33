use poise::serenity_prelude as serenity;
use serenity::{Context as SerenityContext, CreateMessage, Message};
use std::time::Duration;
use tracing::{info, warn};

use crate::email::{generate_verification_code, is_academic_email};
use crate::wrappers::GuildWrapper;
use crate::{Context, Error};

pub const PROFESSOR_QUALIFIER: &str = "Professeur";

/// Obtenir le rôle Professeur via une adresse mail académique
#[poise::command(slash_command, guild_only)]
pub async fn professor(
    ctx: Context<'_>,
    #[description = "Votre adresse mail académique"] email: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let data = ctx.data();

    let Some(mailer) = data.mailer.clone() else {
        ctx.send(
            poise::CreateReply::default()
                .content("La vérification par mail n'est pas activée sur ce serveur.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    };

    if !is_academic_email(&email) {
        ctx.send(
            poise::CreateReply::default()
                .content("Cette adresse n'est pas une adresse académique reconnue.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    let code = generate_verification_code();
    let user_id = ctx.author().id;
    data.verifications.insert(user_id, code.clone(), guild_id);

    let body = format!(
        "Bonjour,\n\nVotre code de vérification pour le serveur Discord est : {}\n\n\
         Envoyez ce code en message privé au bot pour obtenir le rôle Professeur.\n\
         Ce code expire dans 5 minutes.",
        code
    );
    let recipient = email.clone();
    tokio::task::spawn_blocking(move || {
        if let Err(e) = mailer.send(&recipient, "Code de vérification", body) {
            warn!(error = %e, "Could not send the verification email");
        }
    });

    ctx.send(
        poise::CreateReply::default()
            .content(format!(
                "Un code de vérification a été envoyé à {}.\n\
                 Envoyez-le en message privé au bot dans les 5 minutes.",
                email
            ))
            .ephemeral(true),
    )
    .await?;

    // The pending entry only lives for the verification window. The DM
    // handler consumes it on success, so expire() is a no-op then.
    let verifications = data.verifications.clone();
    let http = ctx.serenity_context().http.clone();
    let timeout = data.config.verification_timeout_secs;
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(timeout)).await;
        if verifications.expire(user_id) {
            let message = CreateMessage::new()
                .content("Votre code de vérification a expiré, relancez la commande /professor.");
            if let Err(e) = user_id.direct_message(&http, message).await {
                warn!(error = %e, "Could not DM the verification timeout notice");
            }
        }
    });
    Ok(())
}

/// A DM matching the pending code grants the configured professor role.
pub async fn handle_dm(
    ctx: &SerenityContext,
    data: &crate::Data,
    msg: &Message,
) -> anyhow::Result<()> {
    let user_id = msg.author.id;
    if !data.verifications.contains(user_id) {
        return Ok(());
    }

    let Some(guild_id) = data.verifications.take_if_match(user_id, msg.content.trim()) else {
        msg.reply(&ctx.http, "Code invalide.").await?;
        return Ok(());
    };

    let guild = GuildWrapper::new(
        &data.db,
        data.guilds.guild(guild_id),
        guild_id,
        String::new(),
    );
    let Some(role_id) = guild.role_id(PROFESSOR_QUALIFIER) else {
        msg.reply(
            &ctx.http,
            "Le rôle Professeur n'est pas configuré sur ce serveur, contactez un Administrateur.",
        )
        .await?;
        return Ok(());
    };

    ctx.http
        .add_member_role(
            guild_id,
            user_id,
            role_id,
            Some("Vérification par mail académique"),
        )
        .await?;
    info!(user_id = user_id.get(), "Granted the professor role after email verification");
    msg.reply(&ctx.http, "Vérification réussie, le rôle Professeur vous a été attribué !")
        .await?;
    Ok(())
}
