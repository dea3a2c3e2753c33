use poise::serenity_prelude as serenity;
use serenity::{CreateEmbed, Mentionable};

use crate::wrappers::MemberWrapper;
use crate::{Context, Error};

// u32::from_str_radix would also accept a sign, which is not a color
fn is_hex_color(color: &str) -> bool {
    color.len() == 6 && color.chars().all(|c| c.is_ascii_hexdigit())
}

/// Consulter le profil d'un membre
#[poise::command(slash_command, guild_only)]
pub async fn profile(
    ctx: Context<'_>,
    #[description = "Le membre à consulter (soi-même par défaut)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let data = ctx.data();
    let user = user.as_ref().unwrap_or_else(|| ctx.author());

    let member = MemberWrapper::new(&data.db, user.id, guild_id, user.name.clone());
    member.ensure_registered()?;
    let row = member.row()?.ok_or("Member registration failed")?;

    let color = u32::from_str_radix(&member.profile_color()?, 16).unwrap_or(0xFFA325);
    let mut embed = CreateEmbed::new()
        .title("Profil")
        .color(color)
        .thumbnail(user.face())
        .field("Nom", user.mention().to_string(), true)
        .field("Messages envoyés", row.messages_count.to_string(), true);

    if let Ok(guild_member) = guild_id.member(ctx, user.id).await {
        if let Some(joined_at) = guild_member.joined_at {
            embed = embed.field(
                "Membre depuis...",
                format!("<t:{}:D>", joined_at.unix_timestamp()),
                true,
            );
        }
    }
    if let Some(role) = &row.role {
        embed = embed.field("Rôle", role.clone(), true);
    }
    if let Some(generation) = row.generation {
        embed = embed.field("Génération", generation.to_string(), true);
    }
    if let Some(school) = row.high_school.and_then(|id| data.db.school_name(id).ok().flatten()) {
        embed = embed.field("Lycée", school, true);
    }
    if let Some(school) = row
        .engineering_school
        .and_then(|id| data.db.school_name(id).ok().flatten())
    {
        embed = embed.field("École d'ingénieur", school, true);
    }

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Choisir la couleur de son profil
#[poise::command(slash_command, guild_only, rename = "profile_color")]
pub async fn profile_color(
    ctx: Context<'_>,
    #[description = "Couleur au format hexadécimal, par exemple FF22FF"] color: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let color = color.trim_start_matches('#').to_uppercase();
    if !is_hex_color(&color) {
        ctx.send(
            poise::CreateReply::default()
                .content("La couleur doit être composée de 6 chiffres hexadécimaux.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    let data = ctx.data();
    let author = ctx.author();
    let member = MemberWrapper::new(&data.db, author.id, guild_id, author.name.clone());
    member.ensure_registered()?;
    member.set_profile_color(Some(&color))?;

    ctx.send(
        poise::CreateReply::default()
            .content(format!("Votre couleur de profil est maintenant #{}.", color))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_color_validation() {
        assert!(is_hex_color("FF22FF"));
        assert!(is_hex_color("3498db".to_uppercase().as_str()));

        assert!(!is_hex_color("FF22F"));
        assert!(!is_hex_color("FF22FF0"));
        assert!(!is_hex_color("GG22FF"));
        // A sign is six characters long and parses as a number, but is
        // not a color
        assert!(!is_hex_color("+1234F"));
        assert!(!is_hex_color("-1234F"));
    }
}
