use poise::serenity_prelude as serenity;
use serenity::{CreateEmbed, CreateMessage};
use std::fmt::Write as _;
use tracing::{debug, error, warn};

use crate::wrappers::{GuildWrapper, MemberWrapper};
use crate::{Context, Data, Error};

/// The name a reaction emoji goes by in the guild configuration: the
/// unicode sequence itself, or the custom emoji's name.
pub fn emoji_name(emoji: &serenity::ReactionType) -> Option<&str> {
    match emoji {
        serenity::ReactionType::Unicode(s) => Some(s.as_str()),
        serenity::ReactionType::Custom { name: Some(n), .. } => Some(n.as_str()),
        _ => None,
    }
}

/// Builds the ReactionType for a configured emoji string, resolving custom
/// guild emojis by name and falling back to unicode.
pub fn reaction_type_for(configured: &str, guild_emojis: &[serenity::Emoji]) -> serenity::ReactionType {
    match guild_emojis.iter().find(|e| e.name == configured) {
        Some(emoji) => serenity::ReactionType::Custom {
            animated: emoji.animated,
            id: emoji.id,
            name: Some(emoji.name.clone()),
        },
        None => serenity::ReactionType::Unicode(configured.to_string()),
    }
}

fn display_emoji(configured: &str, guild_emojis: &[serenity::Emoji]) -> String {
    match guild_emojis.iter().find(|e| e.name == configured) {
        Some(emoji) => format!("<:{}:{}>", emoji.name, emoji.id),
        None => configured.to_string(),
    }
}

/// First half of the selection transition: lazily register the member and
/// return the currently stored qualifier, so the caller can revoke its
/// platform role before persisting the new one.
pub fn begin_selection(member: &MemberWrapper<'_>) -> anyhow::Result<Option<String>> {
    member.ensure_registered()?;
    member.role_qualifier()
}

/// Publie le message de sélection des rôles
#[poise::command(slash_command, guild_only, owners_only)]
pub async fn roles_selection(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let data = ctx.data();

    let (guild_name, guild_emojis) = {
        let guild = ctx.guild().ok_or("Could not access guild")?;
        (
            guild.name.clone(),
            guild.emojis.values().cloned().collect::<Vec<_>>(),
        )
    };
    let guild = GuildWrapper::new(&data.db, data.guilds.guild(guild_id), guild_id, guild_name);

    let mut description =
        String::from("Bienvenue ! Choisissez votre rôle en réagissant à ce message :\n\n");
    for role in guild.choiceable_roles() {
        if let Some(emoji) = role.emoji.as_deref() {
            let _ = writeln!(
                description,
                "{} — **{}**",
                display_emoji(emoji, &guild_emojis),
                role.qualifier
            );
        }
    }

    let embed = CreateEmbed::new()
        .title("Bienvenue !")
        .description(description)
        .color(0xFF22FF);
    let message = ctx
        .channel_id()
        .send_message(ctx.http(), CreateMessage::new().embed(embed))
        .await?;

    for role in guild.choiceable_roles() {
        if let Some(emoji) = role.emoji.as_deref() {
            message
                .react(ctx.http(), reaction_type_for(emoji, &guild_emojis))
                .await?;
        }
    }

    guild.set_roles_message_id(Some(message.id))?;
    ctx.send(
        poise::CreateReply::default()
            .content("Message de sélection des rôles publié.")
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Reaction-add handler for the selection message.
///
/// A member holds at most one choiceable qualifier: selecting a new one
/// revokes the previous platform role, clears the member's other reaction
/// marks and persists the new qualifier. Permission failures on the
/// grant/revoke calls are logged and deliberately not rolled back; the
/// stored qualifier and the live role may diverge until the next reaction.
pub async fn handle_selection(
    ctx: &serenity::Context,
    data: &Data,
    reaction: &serenity::Reaction,
) -> Result<(), Error> {
    let Some(guild_id) = reaction.guild_id else {
        return Ok(()); // guild only
    };
    let Some(user_id) = reaction.user_id else {
        return Ok(());
    };
    if user_id == ctx.cache.current_user().id {
        return Ok(());
    }

    let guild_name = ctx
        .cache
        .guild(guild_id)
        .map(|g| g.name.clone())
        .unwrap_or_default();
    let guild = GuildWrapper::new(&data.db, data.guilds.guild(guild_id), guild_id, guild_name);

    if guild.roles_message_id()? != Some(reaction.message_id) {
        return Ok(());
    }

    let user = user_id.to_user(ctx).await?;
    let selected = emoji_name(&reaction.emoji).and_then(|name| guild.qualifier_for_emoji(name));
    let Some(selected) = selected else {
        // Not an error: an unmapped emoji is a no-op, the reactor just
        // gets told privately.
        debug!("Invalid selection reaction {:?} by {}", reaction.emoji, user.name);
        if let Err(e) = user
            .direct_message(ctx, CreateMessage::new().content("Cette réaction est invalide."))
            .await
        {
            warn!("Cannot notify {} about an invalid reaction: {}", user.name, e);
        }
        return Ok(());
    };

    let member = MemberWrapper::new(&data.db, user_id, guild_id, user.name.clone());
    let previous = begin_selection(&member)?;

    if let Some(previous) = previous.as_deref() {
        if previous != selected.qualifier {
            if let Some(role_id) = guild.role_id(previous) {
                if let Err(e) = ctx
                    .http
                    .remove_member_role(guild_id, user_id, role_id, Some("Changement de rôle"))
                    .await
                {
                    error!(
                        "Cannot revoke role {:?} from {} in guild {}: {}",
                        previous, user.name, guild_id, e
                    );
                }
            }
        }
    }

    // The selection message is the sole UI: clear the member's other marks
    // so it shows a single current choice.
    let guild_emojis = guild_id.emojis(&ctx.http).await.unwrap_or_default();
    for other in guild.choiceable_roles() {
        if other.qualifier == selected.qualifier {
            continue;
        }
        let Some(other_emoji) = other.emoji.as_deref() else {
            continue;
        };
        if let Err(e) = reaction
            .channel_id
            .delete_reaction(
                &ctx.http,
                reaction.message_id,
                Some(user_id),
                reaction_type_for(other_emoji, &guild_emojis),
            )
            .await
        {
            debug!("No {} reaction to clear for {}: {}", other.qualifier, user.name, e);
        }
    }

    member.set_role(Some(&selected.qualifier))?;

    if let Some(role_id) = guild.role_id(&selected.qualifier) {
        if let Err(e) = ctx
            .http
            .add_member_role(guild_id, user_id, role_id, Some("Sélection de rôle"))
            .await
        {
            error!(
                "Cannot grant role {:?} to {} in guild {}: {}",
                selected.qualifier, user.name, guild_id, e
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BotConfig;
    use crate::db::Database;
    use poise::serenity_prelude::{GuildId, UserId};

    fn test_guild_config() -> BotConfig {
        toml::from_str(
            r#"
            [[guilds]]
            id = 1

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
        "#,
        )
        .unwrap()
    }

    fn test_db() -> Database {
        let db = Database::in_memory().unwrap();
        db.execute_init().unwrap();
        db.insert_guild(1, "mp2i").unwrap();
        db
    }

    #[test]
    fn test_emoji_name_resolution() {
        let unicode = serenity::ReactionType::Unicode("🔵".to_string());
        assert_eq!(emoji_name(&unicode), Some("🔵"));

        let custom = serenity::ReactionType::Custom {
            animated: false,
            id: serenity::EmojiId::new(5),
            name: Some("mp2i_logo".to_string()),
        };
        assert_eq!(emoji_name(&custom), Some("mp2i_logo"));

        let nameless = serenity::ReactionType::Custom {
            animated: false,
            id: serenity::EmojiId::new(5),
            name: None,
        };
        assert_eq!(emoji_name(&nameless), None);
    }

    #[test]
    fn test_unmapped_emoji_is_a_no_op() {
        let config = test_guild_config();
        let guild = config.guild(GuildId::new(1)).unwrap();
        assert!(guild.qualifier_for_emoji("🤖").is_none());

        // No qualifier resolved means the handler never touches storage
        let db = test_db();
        let member = MemberWrapper::new(&db, UserId::new(7), GuildId::new(1), "alice");
        assert!(!member.exists().unwrap());
    }

    #[test]
    fn test_selection_scenario_mp2i_then_mpi() {
        let config = test_guild_config();
        let guild = config.guild(GuildId::new(1)).unwrap();
        let db = test_db();
        let member = MemberWrapper::new(&db, UserId::new(7), GuildId::new(1), "alice");

        // Unregistered member reacts 🔵: registration then assignment
        let selected = guild.qualifier_for_emoji("🔵").unwrap();
        let previous = begin_selection(&member).unwrap();
        assert_eq!(previous, None);
        member.set_role(Some(&selected.qualifier)).unwrap();
        assert_eq!(member.role_qualifier().unwrap().as_deref(), Some("MP2I"));

        // Reacting 🟢 afterwards swaps the stored qualifier and reports
        // the previous one for revocation
        let selected = guild.qualifier_for_emoji("🟢").unwrap();
        let previous = begin_selection(&member).unwrap();
        assert_eq!(previous.as_deref(), Some("MP2I"));
        member.set_role(Some(&selected.qualifier)).unwrap();
        assert_eq!(member.role_qualifier().unwrap().as_deref(), Some("MPI"));
    }

    #[test]
    fn test_reselecting_same_qualifier_is_idempotent() {
        let config = test_guild_config();
        let guild = config.guild(GuildId::new(1)).unwrap();
        let db = test_db();
        let member = MemberWrapper::new(&db, UserId::new(7), GuildId::new(1), "alice");

        let selected = guild.qualifier_for_emoji("🔵").unwrap();
        begin_selection(&member).unwrap();
        member.set_role(Some(&selected.qualifier)).unwrap();

        let previous = begin_selection(&member).unwrap();
        member.set_role(Some(&selected.qualifier)).unwrap();

        assert_eq!(previous.as_deref(), Some("MP2I"));
        assert_eq!(member.role_qualifier().unwrap().as_deref(), Some("MP2I"));
    }
}
