use poise::serenity_prelude as serenity;
use serenity::{CreateEmbed, CreateMessage, EditMember, Mentionable, Timestamp};
use std::fmt::Write as _;
use tracing::warn;

use crate::wrappers::{GuildWrapper, MemberWrapper};
use crate::{Context, Error};

/// Timeouts longer than 28 days are rejected by the API.
const MAX_TIMEOUT_MINUTES: u64 = 28 * 24 * 60;

fn sanction_embed(kind: &str, user: &serenity::User, by: &serenity::User, reason: &str) -> CreateEmbed {
    CreateEmbed::new()
        .title(format!("Sanction : {}", kind))
        .description(format!(
            "**Membre** : {} (`{}`)\n**Modérateur** : {}\n**Raison** : {}",
            user.mention(),
            user.name,
            by.mention(),
            reason
        ))
        .color(0xFF6B6B)
        .timestamp(Timestamp::now())
}

async fn log_sanction(ctx: &Context<'_>, embed: CreateEmbed) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else { return Ok(()) };
    let data = ctx.data();
    let guild = GuildWrapper::new(
        &data.db,
        data.guilds.guild(guild_id),
        guild_id,
        String::new(),
    );
    match guild.sanctions_log_channel() {
        Some(channel) => {
            channel
                .send_message(ctx.http(), CreateMessage::new().embed(embed))
                .await?;
        }
        None => warn!(guild_id = guild_id.get(), "No sanctions log channel configured"),
    }
    Ok(())
}

/// Avertit un membre du serveur
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn warn(
    ctx: Context<'_>,
    #[description = "Le membre à avertir"] user: serenity::User,
    #[description = "La raison de l'avertissement"] reason: Option<String>,
    #[description = "Envoyer l'avertissement en message privé"] dm: Option<bool>,
    #[description = "Afficher l'avertissement dans le salon"] visible: Option<bool>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let data = ctx.data();
    let reason = reason.unwrap_or_else(|| "Aucune raison donnée".to_string());

    let member = MemberWrapper::new(&data.db, user.id, guild_id, user.name.clone());
    member.ensure_registered()?;
    let id = data.db.insert_sanction(
        ctx.author().id.get() as i64,
        user.id.get() as i64,
        guild_id.get() as i64,
        "warn",
        Some(&reason),
    )?;

    if dm.unwrap_or(true) {
        let message = CreateMessage::new().content(format!(
            "Vous avez reçu un avertissement : {}",
            reason
        ));
        if let Err(e) = user.direct_message(ctx.http(), message).await {
            warn!(error = %e, user_id = user.id.get(), "Could not DM the warned member");
        }
    }

    let embed = sanction_embed("avertissement", &user, ctx.author(), &reason);
    if visible.unwrap_or(false) {
        ctx.send(poise::CreateReply::default().embed(embed.clone())).await?;
    } else {
        ctx.send(
            poise::CreateReply::default()
                .content(format!("Avertissement n°{} enregistré pour {}.", id, user.name))
                .ephemeral(true),
        )
        .await?;
    }
    log_sanction(&ctx, embed).await?;
    Ok(())
}

/// Retire un avertissement
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn unwarn(
    ctx: Context<'_>,
    #[description = "Le numéro de l'avertissement à retirer"] id: i64,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let data = ctx.data();
    let deleted = data.db.delete_sanction(id, guild_id.get() as i64)?;
    let response = if deleted == 0 {
        format!("L'avertissement n°{} n'existe pas.", id)
    } else {
        format!("L'avertissement n°{} a bien été retiré.", id)
    };
    ctx.send(poise::CreateReply::default().content(response).ephemeral(true))
        .await?;
    Ok(())
}

/// Liste les sanctions d'un membre
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn sanctions_list(
    ctx: Context<'_>,
    #[description = "Le membre dont il faut lister les sanctions"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let data = ctx.data();
    let sanctions = data
        .db
        .list_sanctions(guild_id.get() as i64, Some(user.id.get() as i64))?;

    if sanctions.is_empty() {
        ctx.send(
            poise::CreateReply::default()
                .content(format!("{} n'a aucune sanction.", user.name))
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    let mut content = String::new();
    for sanction in &sanctions {
        let _ = writeln!(
            content,
            "- n°{} **{}** par <@{}> : {}",
            sanction.id,
            sanction.kind,
            sanction.by_id,
            sanction.reason.as_deref().unwrap_or("Aucune raison donnée")
        );
    }
    let embed = CreateEmbed::new()
        .title(format!("Sanctions de {}", user.name))
        .description(content)
        .color(0xFF6B6B)
        .timestamp(Timestamp::now());
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Bannit un membre du serveur
#[poise::command(slash_command, guild_only, required_permissions = "BAN_MEMBERS")]
pub async fn ban(
    ctx: Context<'_>,
    #[description = "Le membre à bannir"] user: serenity::User,
    #[description = "La raison du bannissement"] reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let data = ctx.data();
    let reason = reason.unwrap_or_else(|| "Aucune raison donnée".to_string());

    data.db.insert_sanction(
        ctx.author().id.get() as i64,
        user.id.get() as i64,
        guild_id.get() as i64,
        "ban",
        Some(&reason),
    )?;
    guild_id
        .ban_with_reason(ctx.http(), user.id, 0, &reason)
        .await?;

    ctx.send(
        poise::CreateReply::default()
            .content(format!("{} a été banni : {}", user.name, reason))
            .ephemeral(true),
    )
    .await?;
    log_sanction(&ctx, sanction_embed("bannissement", &user, ctx.author(), &reason)).await?;
    Ok(())
}

/// Exclut temporairement un membre du serveur
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn timeout(
    ctx: Context<'_>,
    #[description = "Le membre à exclure"] user: serenity::User,
    #[description = "La durée de l'exclusion en minutes"]
    #[min = 1]
    minutes: u64,
    #[description = "La raison de l'exclusion"] reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    if minutes > MAX_TIMEOUT_MINUTES {
        ctx.send(
            poise::CreateReply::default()
                .content(format!(
                    "La durée ne peut pas dépasser {} minutes (28 jours).",
                    MAX_TIMEOUT_MINUTES
                ))
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    let data = ctx.data();
    let reason = reason.unwrap_or_else(|| "Aucune raison donnée".to_string());
    data.db.insert_sanction(
        ctx.author().id.get() as i64,
        user.id.get() as i64,
        guild_id.get() as i64,
        "timeout",
        Some(&reason),
    )?;

    let until = Timestamp::from_unix_timestamp(Timestamp::now().unix_timestamp() + (minutes * 60) as i64)?;
    guild_id
        .edit_member(
            ctx.http(),
            user.id,
            EditMember::new().disable_communication_until_datetime(until),
        )
        .await?;

    ctx.send(
        poise::CreateReply::default()
            .content(format!(
                "{} est exclu pour {} minutes : {}",
                user.name, minutes, reason
            ))
            .ephemeral(true),
    )
    .await?;
    log_sanction(
        &ctx,
        sanction_embed("exclusion temporaire", &user, ctx.author(), &reason),
    )
    .await?;
    Ok(())
}
