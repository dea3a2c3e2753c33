use poise::serenity_prelude as serenity;
use serenity::{
    Context as SerenityContext, CreateEmbed, CreateMessage, Mentionable, Message, Reaction,
    ReactionType, Timestamp, UserId,
};
use std::fmt::Write as _;
use tracing::{debug, warn};

use crate::config::DISCORD_MESSAGE_LIMIT;
use crate::wrappers::GuildWrapper;
use crate::{Context, Data, Error};

const ACCEPT_EMOJI: &str = "✅";
const DECLINE_EMOJI: &str = "❌";

/// The terminal state a closing reaction maps to. The bot seeds both vote
/// emojis on every suggestion, so its own reaction events must never close
/// the row they just created.
fn close_state(
    current_user: UserId,
    reactor: Option<UserId>,
    emoji: &ReactionType,
) -> Option<&'static str> {
    if reactor.is_none() || reactor == Some(current_user) {
        return None;
    }
    match emoji {
        ReactionType::Unicode(e) if e == ACCEPT_EMOJI => Some("accepted"),
        ReactionType::Unicode(e) if e == DECLINE_EMOJI => Some("declined"),
        _ => None,
    }
}

// Serenity surfaces a deleted message as an HTTP 10008 Unknown Message.
fn is_unknown_message(err: &serenity::Error) -> bool {
    matches!(
        err,
        serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(response))
            if response.status_code == serenity::StatusCode::NOT_FOUND
    )
}

/// Poste le règlement du salon des suggestions
#[poise::command(slash_command, guild_only, owners_only)]
pub async fn suggestions_rules(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let data = ctx.data();
    let guild = GuildWrapper::new(
        &data.db,
        data.guilds.guild(guild_id),
        guild_id,
        String::new(),
    );
    let Some(channel) = guild.suggestion_channel() else {
        ctx.send(
            poise::CreateReply::default()
                .content("Aucun salon de suggestions n'est configuré sur ce serveur.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    };
    if ctx.channel_id() != channel {
        ctx.send(
            poise::CreateReply::default()
                .content(format!(
                    "Cette commande ne peut être utilisée que dans {}.",
                    channel.mention()
                ))
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    let embed = CreateEmbed::new()
        .title("Règles des suggestions")
        .description(
            "- Chaque message posté ici est une suggestion.\n\
             - Les membres votent avec les réactions ✅ et ❌.\n\
             - Un modérateur clôt la suggestion en réagissant ✅ (acceptée) ou ❌ (refusée).\n\
             - Le message d'origine est supprimé à la clôture et le résultat est publié ici.",
        )
        .color(0x3498DB)
        .timestamp(Timestamp::now());
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Liste les suggestions du serveur
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn suggestions_list(
    ctx: Context<'_>,
    #[description = "Filtrer par état (open, accepted, declined)"] state: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let data = ctx.data();
    let suggestions = data
        .db
        .list_suggestions(guild_id.get() as i64, state.as_deref())?;

    if suggestions.is_empty() {
        ctx.send(
            poise::CreateReply::default()
                .content("Aucune suggestion trouvée.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    let mut content = String::new();
    for suggestion in &suggestions {
        let mut description = suggestion.description.clone();
        if description.chars().count() > 80 {
            description = description.chars().take(80).collect::<String>() + "…";
        }
        let line = format!(
            "- n°{} [{}] <@{}> : {}\n",
            suggestion.id, suggestion.state, suggestion.author_id, description
        );
        if content.len() + line.len() > DISCORD_MESSAGE_LIMIT {
            let _ = write!(content, "…");
            break;
        }
        content.push_str(&line);
    }
    let embed = CreateEmbed::new()
        .title("Suggestions")
        .description(content)
        .color(0x3498DB)
        .timestamp(Timestamp::now());
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Every message in the suggestion channel becomes a suggestion: seed the
/// vote reactions and persist an open row.
pub async fn handle_message(
    ctx: &SerenityContext,
    data: &Data,
    msg: &Message,
) -> anyhow::Result<()> {
    let Some(guild_id) = msg.guild_id else { return Ok(()) };
    let guild = GuildWrapper::new(
        &data.db,
        data.guilds.guild(guild_id),
        guild_id,
        String::new(),
    );
    if guild.suggestion_channel() != Some(msg.channel_id) {
        return Ok(());
    }

    for emoji in [ACCEPT_EMOJI, DECLINE_EMOJI] {
        if let Err(e) = msg
            .react(&ctx.http, ReactionType::Unicode(emoji.to_string()))
            .await
        {
            // The author may delete their message before both reactions land.
            if is_unknown_message(&e) {
                debug!(message_id = msg.id.get(), "Suggestion deleted before seeding reactions");
                return Ok(());
            }
            return Err(e.into());
        }
    }

    let inserted = data.db.insert_suggestion(
        msg.author.id.get() as i64,
        guild_id.get() as i64,
        &msg.content,
        msg.id.get() as i64,
    )?;
    if inserted.is_none() {
        debug!(message_id = msg.id.get(), "Suggestion already recorded");
    }
    Ok(())
}

/// A moderator reaction with ✅ or ❌ closes the suggestion: the row moves to
/// its terminal state, the result is announced and the original message is
/// deleted.
pub async fn handle_close(
    ctx: &SerenityContext,
    data: &Data,
    reaction: &Reaction,
) -> anyhow::Result<()> {
    let Some(guild_id) = reaction.guild_id else { return Ok(()) };
    let current_user = ctx.cache.current_user().id;
    let Some(state) = close_state(current_user, reaction.user_id, &reaction.emoji) else {
        return Ok(());
    };

    let guild = GuildWrapper::new(
        &data.db,
        data.guilds.guild(guild_id),
        guild_id,
        String::new(),
    );
    if guild.suggestion_channel() != Some(reaction.channel_id) {
        return Ok(());
    }

    let Some(user_id) = reaction.user_id else { return Ok(()) };
    let can_close = {
        let Some(cached) = ctx.cache.guild(guild_id) else { return Ok(()) };
        cached
            .members
            .get(&user_id)
            .map(|member| cached.member_permissions(member).manage_guild())
            .unwrap_or(false)
    };
    if !can_close {
        return Ok(());
    }

    let Some(suggestion) = data
        .db
        .close_suggestion(reaction.message_id.get() as i64, state)?
    else {
        return Ok(());
    };

    let (title, color) = match state {
        "accepted" => ("Suggestion acceptée", 0x2ECC71),
        _ => ("Suggestion refusée", 0xE74C3C),
    };
    let embed = CreateEmbed::new()
        .title(title)
        .description(format!(
            "Suggestion de <@{}> :\n>>> {}",
            suggestion.author_id, suggestion.description
        ))
        .color(color)
        .timestamp(Timestamp::now());
    reaction
        .channel_id
        .send_message(&ctx.http, CreateMessage::new().embed(embed))
        .await?;

    if let Err(e) = reaction
        .channel_id
        .delete_message(&ctx.http, reaction.message_id)
        .await
    {
        if is_unknown_message(&e) {
            warn!(message_id = reaction.message_id.get(), "Suggestion message already deleted");
        } else {
            return Err(e.into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOT: UserId = UserId::new(1);
    const MODERATOR: UserId = UserId::new(2);

    fn unicode(emoji: &str) -> ReactionType {
        ReactionType::Unicode(emoji.to_string())
    }

    #[test]
    fn test_vote_emojis_map_to_terminal_states() {
        assert_eq!(
            close_state(BOT, Some(MODERATOR), &unicode(ACCEPT_EMOJI)),
            Some("accepted")
        );
        assert_eq!(
            close_state(BOT, Some(MODERATOR), &unicode(DECLINE_EMOJI)),
            Some("declined")
        );
        assert_eq!(close_state(BOT, Some(MODERATOR), &unicode("👍")), None);
    }

    #[test]
    fn test_own_seeded_reactions_never_close() {
        // Seeding a fresh suggestion fires ReactionAdd with the bot as the
        // reactor; that event must not move the row to a terminal state.
        assert_eq!(close_state(BOT, Some(BOT), &unicode(ACCEPT_EMOJI)), None);
        assert_eq!(close_state(BOT, Some(BOT), &unicode(DECLINE_EMOJI)), None);
        assert_eq!(close_state(BOT, None, &unicode(ACCEPT_EMOJI)), None);
    }
}
