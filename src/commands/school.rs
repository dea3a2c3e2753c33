use chrono::{Datelike, Utc};
use poise::futures_util as futures_stream;
use poise::serenity_prelude as serenity;
use regex::Regex;
use serenity::{CreateEmbed, Mentionable};
use std::fmt::Write as _;
use std::sync::OnceLock;
use tracing::warn;

use crate::commands::author_has_manage_roles;
use crate::db::{SCHOOL_CPGE, SCHOOL_ENGINEERING};
use crate::wrappers::{GuildWrapper, MemberWrapper};
use crate::{Context, Error};

/// Referent nicknames follow "name | school"; the school part is the
/// fallback when the member never registered one.
fn nickname_school_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^.+[|@] *(?P<prepa>.*)$").unwrap())
}

#[derive(Debug, Clone, Copy, PartialEq, poise::ChoiceParameter)]
pub enum SchoolKind {
    #[name = "CPGE"]
    Cpge,
    #[name = "École d'ingénieur"]
    Engineering,
}

impl SchoolKind {
    fn as_db(self) -> &'static str {
        match self {
            SchoolKind::Cpge => SCHOOL_CPGE,
            SchoolKind::Engineering => SCHOOL_ENGINEERING,
        }
    }

    fn label(self) -> &'static str {
        match self {
            SchoolKind::Cpge => "le lycée",
            SchoolKind::Engineering => "l'école d'ingénieur",
        }
    }
}

async fn autocomplete_school(
    ctx: Context<'_>,
    partial: &str,
) -> impl futures_stream::Stream<Item = String> {
    let db = &ctx.data().db;
    let partial = partial.to_lowercase();
    let mut names = vec!["Aucun".to_string()];
    for kind in [SCHOOL_CPGE, SCHOOL_ENGINEERING] {
        if let Ok(schools) = db.schools(kind) {
            names.extend(schools.into_iter().map(|s| s.name));
        }
    }
    names.retain(|name| name.to_lowercase().contains(&partial));
    names.truncate(20);
    futures_stream::stream::iter(names)
}

/// Associe une CPGE ou une école à un membre (Aucun pour supprimer l'association)
#[poise::command(slash_command, guild_only)]
pub async fn school(
    ctx: Context<'_>,
    #[description = "CPGE ou école d'ingénieur"] kind: SchoolKind,
    #[description = "Le nom de l'école à associer"]
    #[autocomplete = "autocomplete_school"]
    school: String,
    #[description = "Réservé aux modérateurs : le membre à qui associer l'école"]
    user: Option<serenity::User>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let data = ctx.data();

    let target = match &user {
        None => ctx.author(),
        Some(user) if user.id == ctx.author().id => ctx.author(),
        Some(user) => {
            if !author_has_manage_roles(&ctx).await {
                ctx.send(
                    poise::CreateReply::default()
                        .content("Vous n'avez pas les droits suffisants.")
                        .ephemeral(true),
                )
                .await?;
                return Ok(());
            }
            user
        }
    };

    let member = MemberWrapper::new(&data.db, target.id, guild_id, target.name.clone());
    member.ensure_registered()?;

    let response = if school == "Aucun" {
        match kind {
            SchoolKind::Cpge => member.set_high_school(None)?,
            SchoolKind::Engineering => member.set_engineering_school(None)?,
        }
        format!("{} ne fait plus partie d'aucune école.", target.name)
    } else {
        match data.db.school_by_name(kind.as_db(), &school)? {
            Some(row) => {
                match kind {
                    SchoolKind::Cpge => member.set_high_school(Some(row.id))?,
                    SchoolKind::Engineering => member.set_engineering_school(Some(row.id))?,
                }
                format!(
                    "{} fait maintenant partie de {} {}.",
                    target.name,
                    kind.label(),
                    school
                )
            }
            None => format!("{} {} n'existe pas.", kind.label(), school),
        }
    };

    ctx.send(poise::CreateReply::default().content(response).ephemeral(true))
        .await?;
    Ok(())
}

/// Définit l'année d'arrivée en sup
#[poise::command(slash_command, guild_only)]
pub async fn generation(
    ctx: Context<'_>,
    #[description = "L'année d'arrivée en sup"]
    #[min = 2021]
    year: u32,
    #[description = "Réservé aux modérateurs : le membre à qui associer l'année"]
    user: Option<serenity::User>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let current_year = Utc::now().year() as u32;
    if year > current_year {
        ctx.send(
            poise::CreateReply::default()
                .content(format!("L'année doit être comprise entre 2021 et {}.", current_year))
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    let target = match &user {
        None => ctx.author(),
        Some(user) if user.id == ctx.author().id => ctx.author(),
        Some(user) => {
            if !author_has_manage_roles(&ctx).await {
                ctx.send(
                    poise::CreateReply::default()
                        .content("Vous n'avez pas les droits suffisants.")
                        .ephemeral(true),
                )
                .await?;
                return Ok(());
            }
            user
        }
    };

    let data = ctx.data();
    let member = MemberWrapper::new(&data.db, target.id, guild_id, target.name.clone());
    member.ensure_registered()?;
    member.set_generation(Some(year as i64))?;

    let response = if target.id == ctx.author().id {
        format!("Vous faites maintenant partie de la génération {} !", year)
    } else {
        format!("{} fait maintenant partie de la génération {} !", target.mention(), year)
    };
    ctx.send(poise::CreateReply::default().content(response).ephemeral(true))
        .await?;
    Ok(())
}

/// Affiche les étudiants d'une école donnée
#[poise::command(slash_command, guild_only)]
pub async fn members(
    ctx: Context<'_>,
    #[description = "CPGE ou école d'ingénieur"] kind: SchoolKind,
    #[description = "Le nom de l'école"]
    #[autocomplete = "autocomplete_school"]
    school: String,
) -> Result<(), Error> {
    ctx.defer().await?;
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let data = ctx.data();

    let Some(row) = data.db.school_by_name(kind.as_db(), &school)? else {
        ctx.say(format!("{} {} n'existe pas.", kind.label(), school)).await?;
        return Ok(());
    };

    let students: Vec<_> = data
        .db
        .members_by_school(guild_id.get() as i64, row.id)?
        .into_iter()
        .filter(|m| match kind {
            SchoolKind::Cpge => m.high_school == Some(row.id),
            SchoolKind::Engineering => m.engineering_school == Some(row.id),
        })
        .collect();

    if students.is_empty() {
        ctx.say(format!("{} n'a aucun étudiant sur ce serveur.", school)).await?;
        return Ok(());
    }

    let mut content = format!("Nombre d'étudiants : {}\n", students.len());
    for student in &students {
        let _ = writeln!(content, "- `{}`・<@{}>", student.name, student.id);
    }

    let embed = CreateEmbed::new()
        .title(format!("Liste des étudiants à {}", school))
        .description(content)
        .color(0xFF66FF)
        .timestamp(serenity::Timestamp::now());
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Liste les étudiants référents du serveur
#[poise::command(slash_command, guild_only)]
pub async fn referents(
    ctx: Context<'_>,
    #[description = "CPGE ou école d'ingénieur"] kind: Option<SchoolKind>,
) -> Result<(), Error> {
    ctx.defer().await?;
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let data = ctx.data();
    let kind = kind.unwrap_or(SchoolKind::Cpge);

    let qualifier = match kind {
        SchoolKind::Cpge => "Référent CPGE",
        SchoolKind::Engineering => "Référent École",
    };

    let (guild_name, members) = {
        let guild = ctx.guild().ok_or("Could not access guild")?;
        (guild.name.clone(), guild.members.values().cloned().collect::<Vec<_>>())
    };
    let guild = GuildWrapper::new(&data.db, data.guilds.guild(guild_id), guild_id, guild_name);
    let Some(referent_role) = guild.role_id(qualifier) else {
        warn!("No {:?} role in the guild config file", qualifier);
        ctx.say("Le rôle des référents n'est pas configuré sur ce serveur.").await?;
        return Ok(());
    };

    let mut referents = Vec::new();
    for member in &members {
        if !member.roles.contains(&referent_role) {
            continue;
        }
        let wrapper = MemberWrapper::new(&data.db, member.user.id, guild_id, member.user.name.clone());
        let school_id = match kind {
            SchoolKind::Cpge => wrapper.high_school()?,
            SchoolKind::Engineering => wrapper.engineering_school()?,
        };
        if let Some(name) = school_id.and_then(|id| data.db.school_name(id).ok().flatten()) {
            referents.push((member, name));
        } else if let Some(school) = member
            .nick
            .as_deref()
            .and_then(|nick| nickname_school_pattern().captures(nick))
            .map(|captures| captures["prepa"].to_string())
        {
            referents.push((member, school));
        }
    }
    referents.sort_by(|a, b| a.1.cmp(&b.1));

    let mut content = String::new();
    for (member, school) in &referents {
        let _ = writeln!(content, "- **{}** : `{}`・{}", school, member.user.name, member.mention());
    }

    let embed = CreateEmbed::new()
        .title(format!("Liste des {} du serveur {}", qualifier, guild.name))
        .description(content)
        .color(0xFF66FF)
        .timestamp(serenity::Timestamp::now());
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Ajoute une école dans la base de données
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn add_school(
    ctx: Context<'_>,
    #[description = "CPGE ou école d'ingénieur"] kind: SchoolKind,
    #[description = "L'école à ajouter"] school: String,
) -> Result<(), Error> {
    let data = ctx.data();
    if data.db.school_by_name(kind.as_db(), &school)?.is_some() {
        ctx.send(
            poise::CreateReply::default()
                .content(format!("{} {} existe déjà.", kind.label(), school))
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    data.db.insert_school(kind.as_db(), &school)?;
    ctx.say(format!("{} a bien été ajouté dans {}.", school, kind.label())).await?;
    Ok(())
}

/// Renomme une école dans la base de données
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn update_school(
    ctx: Context<'_>,
    #[description = "CPGE ou école d'ingénieur"] kind: SchoolKind,
    #[description = "L'école à renommer"]
    #[autocomplete = "autocomplete_school"]
    old_school: String,
    #[description = "Le nouveau nom"] new_school: String,
) -> Result<(), Error> {
    let data = ctx.data();
    if data.db.school_by_name(kind.as_db(), &new_school)?.is_some() {
        ctx.send(
            poise::CreateReply::default()
                .content(format!("{} {} existe déjà.", kind.label(), new_school))
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    let renamed = data.db.rename_school(kind.as_db(), &old_school, &new_school)?;
    if renamed == 0 {
        ctx.send(
            poise::CreateReply::default()
                .content(format!("{} {} n'existe pas.", kind.label(), old_school))
                .ephemeral(true),
        )
        .await?;
    } else {
        ctx.say(format!("{} a bien été remplacé par {}.", old_school, new_school)).await?;
    }
    Ok(())
}

/// Supprime une école de la base de données
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn del_school(
    ctx: Context<'_>,
    #[description = "CPGE ou école d'ingénieur"] kind: SchoolKind,
    #[description = "L'école à supprimer"]
    #[autocomplete = "autocomplete_school"]
    school: String,
) -> Result<(), Error> {
    let data = ctx.data();
    // Member references are cleared by the schema's ON DELETE SET NULL
    let deleted = data.db.delete_school(kind.as_db(), &school)?;
    if deleted == 0 {
        ctx.send(
            poise::CreateReply::default()
                .content(format!("{} {} n'existe pas.", kind.label(), school))
                .ephemeral(true),
        )
        .await?;
    } else {
        ctx.say(format!("{} a bien été supprimé de {}.", school, kind.label())).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nickname_school_fallback() {
        let captures = nickname_school_pattern()
            .captures("Alice | Lycée Hoche")
            .unwrap();
        assert_eq!(&captures["prepa"], "Lycée Hoche");

        let captures = nickname_school_pattern().captures("Bob@ Kléber").unwrap();
        assert_eq!(&captures["prepa"], "Kléber");

        assert!(nickname_school_pattern().captures("no separator").is_none());
    }
}
