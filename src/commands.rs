use std::fmt::Write as _;
use std::sync::Arc;

use chrono::Utc;
use poise::{command, serenity_prelude as serenity};

use crate::duty::{
    DutyError, DutyService, PlayerRef, ResetTarget, format_duration,
};
use crate::host::RoleHost;
use crate::{Context, Error};

/// Basic ping command
/// This command is used to check if the bot is responsive.
#[command(prefix_command, slash_command, guild_only)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say("Pong!").await?;
    Ok(())
}

/// Build a duty service wired to this command's guild
fn service(ctx: &Context<'_>) -> DutyService {
    let serenity_ctx = ctx.serenity_context();
    let host = Arc::new(RoleHost::new(
        serenity_ctx.http.clone(),
        serenity_ctx.cache.clone(),
    ));
    DutyService::new(ctx.data().clone(), host)
}

fn player_ref(ctx: &Context<'_>) -> Option<PlayerRef> {
    let guild_id = ctx.guild_id()?.get();
    let author = ctx.author();
    Some(PlayerRef {
        id: author.id.get(),
        guild_id,
        name: author.display_name().to_string(),
    })
}

/// Whether the invoking member holds Manage Server in this guild
async fn author_can_manage_guild(ctx: &Context<'_>) -> bool {
    ctx.author_member()
        .await
        .and_then(|member| member.permissions)
        .is_some_and(|permissions| permissions.manage_guild())
}

/// Toggle your duty state, or reload the duty config
///
/// With a duty name: go on duty. Without arguments: go off duty and bank the
/// session's time. `reload` re-reads the config (requires Manage Server).
#[command(prefix_command, slash_command, guild_only)]
pub async fn duty(
    ctx: Context<'_>,
    #[description = "Duty type to go on duty for, or \"reload\""] duty_name: Option<String>,
) -> Result<(), Error> {
    let Some(player) = player_ref(&ctx) else {
        ctx.say("Only guild members can use this command!").await?;
        return Ok(());
    };
    let service = service(&ctx);

    match duty_name.as_deref() {
        None => match service.go_off_duty(&player, Utc::now()).await {
            Ok(closed) => {
                ctx.say(format!(
                    "You have gone off duty for **{}**! Duration: {}",
                    closed.duty_name,
                    format_duration(closed.elapsed_ms)
                ))
                .await?;
            }
            Err(DutyError::NotOnDuty) => {
                ctx.say("You are not currently on duty!").await?;
            }
            Err(err) => return Err(err.into()),
        },
        Some("reload") => {
            if !author_can_manage_guild(&ctx).await {
                ctx.say("You don't have permission to reload the duty config!")
                    .await?;
                return Ok(());
            }
            match service.reload().await {
                Ok(count) => {
                    ctx.say(format!("Duty config reloaded! Loaded {count} duty types."))
                        .await?;
                }
                Err(err) => {
                    ctx.say(format!("Reload failed: {err}")).await?;
                }
            }
        }
        Some(name) => match service.go_on_duty(&player, name, Utc::now()).await {
            Ok(()) => {
                ctx.say(format!("You are now on duty for **{name}**!")).await?;
            }
            Err(DutyError::UnknownDuty(_)) => {
                ctx.say(format!(
                    "Unknown duty type: {name}\nAvailable duties: {}",
                    service.duty_names().join(", ")
                ))
                .await?;
            }
            Err(DutyError::PermissionDenied { permission, .. }) => {
                ctx.say(format!(
                    "You don't have permission to go on duty for {name}!\nRequired role: {permission}"
                ))
                .await?;
            }
            Err(DutyError::AlreadyOnDuty(current)) => {
                ctx.say(format!(
                    "You are already on duty for **{current}**! Use /duty to go off duty first."
                ))
                .await?;
            }
            Err(err) => return Err(err.into()),
        },
    }
    Ok(())
}

/// Check accrued duty time, including any in-progress session
#[command(prefix_command, slash_command, guild_only)]
pub async fn checktime(
    ctx: Context<'_>,
    #[description = "Duty type"] duty_name: String,
    #[description = "Player to check (requires Manage Server)"] player: Option<serenity::User>,
) -> Result<(), Error> {
    let service = service(&ctx);
    let now = Utc::now();

    match player {
        Some(target) if target.id != ctx.author().id => {
            if !author_can_manage_guild(&ctx).await {
                ctx.say("You don't have permission to check other players' times!")
                    .await?;
                return Ok(());
            }
            let total = service.check_time(target.id.get(), &duty_name, now);
            ctx.say(format!(
                "{}'s total time for **{duty_name}**: {}",
                target.display_name(),
                format_duration(total)
            ))
            .await?;
        }
        _ => {
            let total = service.check_time(ctx.author().id.get(), &duty_name, now);
            ctx.say(format!(
                "Your total time for **{duty_name}**: {}",
                format_duration(total)
            ))
            .await?;
        }
    }
    Ok(())
}

/// Show the accrued-time leaderboard for a duty type
#[command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "MANAGE_GUILD"
)]
pub async fn dutytimes(
    ctx: Context<'_>,
    #[description = "Duty type"] duty_name: String,
    #[description = "Page number"] page: Option<u32>,
) -> Result<(), Error> {
    let service = service(&ctx);

    match service.list_times(&duty_name, page.unwrap_or(1) as usize) {
        Ok(board) if board.entries.is_empty() => {
            ctx.say(format!("No recorded times for **{duty_name}**"))
                .await?;
        }
        Ok(board) => {
            let mut reply = format!(
                "**Duty times for {}** (page {}/{})\n",
                board.duty_name, board.page, board.total_pages
            );
            for (offset, entry) in board.entries.iter().enumerate() {
                writeln!(
                    reply,
                    "#{}. {} - {}",
                    board.start_rank + offset,
                    entry.name,
                    format_duration(entry.total_ms)
                )?;
            }
            if board.page < board.total_pages {
                write!(
                    reply,
                    "Use /dutytimes {} {} for the next page",
                    board.duty_name,
                    board.page + 1
                )?;
            }
            ctx.say(reply).await?;
        }
        Err(DutyError::InvalidPage) => {
            ctx.say("Invalid page number!").await?;
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

/// Reset your own accrued duty time
#[command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "MANAGE_GUILD"
)]
pub async fn resettime(
    ctx: Context<'_>,
    #[description = "Duty type to reset, or ALL"] target: String,
) -> Result<(), Error> {
    let service = service(&ctx);
    let player = ctx.author().id.get();

    if target.eq_ignore_ascii_case("all") {
        service.reset_time(player, &ResetTarget::All).await;
        ctx.say("All duty times have been reset!").await?;
    } else {
        service
            .reset_time(player, &ResetTarget::One(target.clone()))
            .await;
        ctx.say(format!("Duty time for **{target}** has been reset!"))
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use poise::serenity_prelude::Permissions;

    // Test that the duty commands are properly defined
    #[test]
    fn test_command_definitions() {
        let cmd = duty();
        assert_eq!(cmd.name, "duty");
        assert!(cmd.guild_only);

        let cmd = checktime();
        assert_eq!(cmd.name, "checktime");
        assert!(cmd.guild_only);

        let cmd = ping();
        assert_eq!(cmd.name, "ping");
    }

    #[test]
    fn test_admin_commands_require_manage_guild() {
        let cmd = dutytimes();
        assert!(cmd.required_permissions.contains(Permissions::MANAGE_GUILD));

        let cmd = resettime();
        assert!(cmd.required_permissions.contains(Permissions::MANAGE_GUILD));

        // Going on and off duty is gated per duty type, not by guild perms
        let cmd = duty();
        assert!(cmd.required_permissions.is_empty());
    }

    #[test]
    fn test_commands_register_as_slash_commands() {
        for cmd in [ping(), duty(), checktime(), dutytimes(), resettime()] {
            assert!(cmd.create_as_slash_command().is_some(), "{}", cmd.name);
        }
    }
}
