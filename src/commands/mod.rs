pub mod admin;
pub mod music;
pub mod professor;
pub mod profile;
pub mod sanctions;
pub mod school;
pub mod suggestions;

use crate::Context;

/// Moderator check used by the "act on another member" command branches.
pub(crate) async fn author_has_manage_roles(ctx: &Context<'_>) -> bool {
    let Some(member) = ctx.author_member().await else {
        return false;
    };
    let Some(guild) = ctx.guild() else {
        return false;
    };
    guild.member_permissions(&member).manage_roles()
}
