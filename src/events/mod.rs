use lru::LruCache;
use poise::serenity_prelude as serenity;
use serenity::{CreateEmbed, CreateMessage, FullEvent, Mentionable};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use crate::commands::{professor, suggestions};
use crate::wrappers::{GuildWrapper, MemberWrapper};
use crate::{roles, status, Data, Error};

/// Usernames observed at ban time, so the unban embed can still name the
/// user even when the tag changed or left the cache in between.
#[derive(Clone)]
pub struct BanNameCache {
    inner: Arc<Mutex<LruCache<(u64, u64), String>>>,
}

impl Default for BanNameCache {
    fn default() -> Self {
        Self::new(500)
    }
}

impl BanNameCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(100).unwrap());
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(cap))),
        }
    }

    pub fn insert(&self, guild_id: serenity::GuildId, user_id: serenity::UserId, name: String) {
        let mut cache = self.inner.lock().unwrap();
        cache.put((guild_id.get(), user_id.get()), name);
    }

    pub fn take(&self, guild_id: serenity::GuildId, user_id: serenity::UserId) -> Option<String> {
        let mut cache = self.inner.lock().unwrap();
        cache.pop(&(guild_id.get(), user_id.get()))
    }
}

/// Central gateway-event dispatcher, called from the poise event handler.
pub async fn dispatch(ctx: &serenity::Context, event: &FullEvent, data: &Data) -> Result<(), Error> {
    match event {
        FullEvent::Ready { data_about_bot } => {
            info!("{} is connected", data_about_bot.user.name);
            static STATUS_STARTED: AtomicBool = AtomicBool::new(false);
            if !STATUS_STARTED.swap(true, Ordering::SeqCst) {
                tokio::spawn(status::run(
                    ctx.clone(),
                    data.status.clone(),
                    data.config.status_interval_secs,
                ));
            }
        }
        FullEvent::Message { new_message } => {
            on_message(ctx, data, new_message).await?;
        }
        FullEvent::ReactionAdd { add_reaction } => {
            roles::handle_selection(ctx, data, add_reaction).await?;
            suggestions::handle_close(ctx, data, add_reaction).await?;
        }
        FullEvent::GuildCreate { guild, .. } => {
            on_guild_create(data, guild)?;
        }
        FullEvent::GuildDelete { incomplete, .. } => {
            // An unavailable guild is an outage, not a removal
            if !incomplete.unavailable {
                data.db.delete_guild(incomplete.id.get() as i64)?;
            }
        }
        FullEvent::GuildMemberAddition { new_member } => {
            on_member_join(ctx, data, new_member).await?;
        }
        FullEvent::GuildMemberUpdate { event, .. } => {
            on_member_update(data, event)?;
        }
        FullEvent::MessageDelete {
            channel_id,
            deleted_message_id,
            guild_id,
        } => {
            on_message_delete(ctx, data, *channel_id, *deleted_message_id, *guild_id).await?;
        }
        FullEvent::MessageUpdate {
            old_if_available,
            new,
            ..
        } => {
            if let Some(message) = new {
                on_message_edit(ctx, data, old_if_available.as_ref(), message).await?;
            }
        }
        FullEvent::GuildBanAddition {
            guild_id,
            banned_user,
        } => {
            data.ban_names
                .insert(*guild_id, banned_user.id, banned_user.name.clone());
            on_ban_change(ctx, data, *guild_id, &banned_user.name, true).await?;
        }
        FullEvent::GuildBanRemoval {
            guild_id,
            unbanned_user,
        } => {
            let name = data
                .ban_names
                .take(*guild_id, unbanned_user.id)
                .unwrap_or_else(|| unbanned_user.name.clone());
            on_ban_change(ctx, data, *guild_id, &name, false).await?;
        }
        _ => {}
    }
    Ok(())
}

async fn on_message(
    ctx: &serenity::Context,
    data: &Data,
    message: &serenity::Message,
) -> Result<(), Error> {
    if message.author.bot {
        return Ok(());
    }

    let Some(guild_id) = message.guild_id else {
        // Direct messages only matter for pending verification codes
        professor::handle_dm(ctx, data, message).await?;
        return Ok(());
    };

    let member = MemberWrapper::new(&data.db, message.author.id, guild_id, message.author.name.clone());
    member.ensure_registered()?;
    member.increment_messages_count()?;

    let channel = channel_name(ctx, guild_id, message.channel_id);
    data.db.log_message(
        message.author.id.get() as i64,
        guild_id.get() as i64,
        &channel,
        &message.content,
    )?;

    suggestions::handle_message(ctx, data, message).await?;
    Ok(())
}

fn on_guild_create(data: &Data, guild: &serenity::Guild) -> Result<(), Error> {
    let wrapper = GuildWrapper::new(
        &data.db,
        data.guilds.guild(guild.id),
        guild.id,
        guild.name.clone(),
    );
    if !wrapper.exists()? {
        info!("Registering guild {} ({})", guild.name, guild.id);
        wrapper.register()?;
    }

    for member in guild.members.values() {
        if member.user.bot {
            continue;
        }
        let member = MemberWrapper::new(&data.db, member.user.id, guild.id, member.user.name.clone());
        if !member.exists()? {
            member.register(None)?;
        }
    }
    Ok(())
}

async fn on_member_join(
    ctx: &serenity::Context,
    data: &Data,
    member: &serenity::Member,
) -> Result<(), Error> {
    let wrapper = MemberWrapper::new(
        &data.db,
        member.user.id,
        member.guild_id,
        member.user.name.clone(),
    );
    if !wrapper.exists()? {
        wrapper.register(None)?;
    }

    let (guild_name, system_channel) = {
        match ctx.cache.guild(member.guild_id) {
            Some(guild) => (guild.name.clone(), guild.system_channel_id),
            None => return Ok(()),
        }
    };
    let Some(system_channel) = system_channel else {
        warn!("System channel is not set in guild {}", member.guild_id);
        return Ok(());
    };

    let embed = CreateEmbed::new()
        .title("Arrivée d'un membre !")
        .description(format!(
            "{} a rejoint le serveur {} !",
            member.mention(),
            guild_name
        ))
        .color(0xFF22FF)
        .thumbnail(member.user.face())
        .timestamp(serenity::Timestamp::now());
    system_channel
        .send_message(&ctx.http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

/// Mirrors a choiceable role granted outside the selection message (by an
/// administrator, or restored on rejoin) into the stored qualifier.
fn on_member_update(data: &Data, event: &serenity::GuildMemberUpdateEvent) -> Result<(), Error> {
    let Some(config) = data.guilds.guild(event.guild_id) else {
        return Ok(());
    };
    let member = MemberWrapper::new(
        &data.db,
        event.user.id,
        event.guild_id,
        event.user.name.clone(),
    );
    if !member.exists()? {
        return Ok(());
    }

    for role in config.choiceable_roles() {
        if event.roles.contains(&serenity::RoleId::new(role.role_id)) {
            member.set_role(Some(&role.qualifier))?;
            return Ok(());
        }
    }
    Ok(())
}

async fn on_message_delete(
    ctx: &serenity::Context,
    data: &Data,
    channel_id: serenity::ChannelId,
    message_id: serenity::MessageId,
    guild_id: Option<serenity::GuildId>,
) -> Result<(), Error> {
    let Some(guild_id) = guild_id else {
        return Ok(());
    };
    let Some(log_channel) = data.guilds.guild(guild_id).and_then(|c| c.log_channel()) else {
        return Ok(());
    };

    // The original content is only known while the message is cached
    let cached = ctx
        .cache
        .message(channel_id, message_id)
        .map(|m| (m.author.clone(), m.content.clone()));
    if let Some((author, _)) = &cached {
        if author.bot {
            return Ok(());
        }
    }

    let mut embed = CreateEmbed::new()
        .title("Message supprimé")
        .color(0xED0010)
        .timestamp(serenity::Timestamp::now())
        .field("Salon", format!("<#{}>", channel_id), true);
    if let Some((author, content)) = cached {
        embed = embed
            .field("Auteur", author.mention().to_string(), true)
            .field("Message original", format!(">>> {}", content), false);
    }
    log_channel
        .send_message(&ctx.http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

async fn on_message_edit(
    ctx: &serenity::Context,
    data: &Data,
    old: Option<&serenity::Message>,
    new: &serenity::Message,
) -> Result<(), Error> {
    if new.author.bot {
        return Ok(());
    }
    let Some(guild_id) = new.guild_id else {
        return Ok(());
    };
    let Some(log_channel) = data.guilds.guild(guild_id).and_then(|c| c.log_channel()) else {
        return Ok(());
    };

    let mut embed = CreateEmbed::new()
        .title("Message modifié")
        .color(0x6DD7FF)
        .timestamp(serenity::Timestamp::now())
        .field("Auteur", new.author.mention().to_string(), true)
        .field("Lien du nouveau message", new.link(), true);
    if let Some(old) = old {
        embed = embed.field("Message original", format!(">>> {}", old.content), false);
    }
    log_channel
        .send_message(&ctx.http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

async fn on_ban_change(
    ctx: &serenity::Context,
    data: &Data,
    guild_id: serenity::GuildId,
    name: &str,
    banned: bool,
) -> Result<(), Error> {
    let Some(channel) = data
        .guilds
        .guild(guild_id)
        .and_then(|c| c.sanctions_log_channel())
    else {
        return Ok(());
    };

    let (title, color) = if banned {
        ("Membre banni", 0xED0010)
    } else {
        ("Membre débanni", 0x57F287)
    };
    let embed = CreateEmbed::new()
        .title(title)
        .description(format!("`{}`", name))
        .color(color)
        .timestamp(serenity::Timestamp::now());
    if let Err(e) = channel
        .send_message(&ctx.http, CreateMessage::new().embed(embed))
        .await
    {
        error!("Cannot write to the sanctions log of guild {}: {}", guild_id, e);
    }
    Ok(())
}

fn channel_name(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    channel_id: serenity::ChannelId,
) -> String {
    ctx.cache
        .guild(guild_id)
        .and_then(|guild| guild.channels.get(&channel_id).map(|c| c.name.clone()))
        .unwrap_or_else(|| channel_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ban_name_cache_is_transient() {
        let cache = BanNameCache::new(2);
        let guild = serenity::GuildId::new(1);

        cache.insert(guild, serenity::UserId::new(7), "alice".to_string());
        assert_eq!(
            cache.take(guild, serenity::UserId::new(7)),
            Some("alice".to_string())
        );
        // Entries are consumed by the unban path
        assert_eq!(cache.take(guild, serenity::UserId::new(7)), None);
    }

    #[test]
    fn test_ban_name_cache_evicts_oldest() {
        let cache = BanNameCache::new(2);
        let guild = serenity::GuildId::new(1);

        cache.insert(guild, serenity::UserId::new(1), "a".to_string());
        cache.insert(guild, serenity::UserId::new(2), "b".to_string());
        cache.insert(guild, serenity::UserId::new(3), "c".to_string());

        assert_eq!(cache.take(guild, serenity::UserId::new(1)), None);
        assert_eq!(cache.take(guild, serenity::UserId::new(3)), Some("c".to_string()));
    }
}
