//! Chat command interpreter.
//!
//! Commands are described by a dispatch table of [`CommandSpec`] records.
//! The hub checks the minimum role and argument count before calling the
//! handler; any `Err` becomes a private error frame for the actor.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::event::{EventKind, ServerFrame};
use super::hub::ChatHub;
use super::recorder::{RecordError, StopOutcome};
use super::role::Role;
use super::session::{NickError, Session};
use crate::datetime::format_full;
use crate::process::{format_memory, format_uptime};

/// Errors produced while interpreting a command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The actor's role is below the command's threshold.
    #[error("Permission denied")]
    PermissionDenied,
    /// Too few arguments.
    #[error("Usage: {0}")]
    Usage(&'static str),
    /// No command with this name.
    #[error("Unknown command: {0}. Type /help for the list of commands.")]
    UnknownCommand(String),
    /// No session matches the target nickname.
    #[error("User not found")]
    TargetNotFound,
    /// The target is the admin.
    #[error("{0}")]
    ProtectedTarget(&'static str),
    /// Recorder lifecycle violation.
    #[error(transparent)]
    Record(#[from] RecordError),
    /// Rename rejected.
    #[error(transparent)]
    Nick(#[from] NickError),
    /// Unexpected failure; the detail is logged, not shown.
    #[error("An error occurred while executing the command")]
    Internal(String),
}

/// A parsed command line bound to its actor.
#[derive(Debug)]
pub struct Invocation<'a> {
    /// Snapshot of the acting session.
    pub actor: Session,
    /// Lowercased command name without the slash.
    pub name: String,
    /// Whitespace-separated arguments.
    pub args: Vec<&'a str>,
    /// Time of the invocation.
    pub now: DateTime<Utc>,
}

impl Invocation<'_> {
    /// Arguments from `from` onwards joined by single spaces.
    pub fn rest(&self, from: usize) -> String {
        self.args.get(from..).map(|a| a.join(" ")).unwrap_or_default()
    }
}

/// Command handler.
pub type Handler = fn(&mut ChatHub, &Invocation<'_>) -> Result<(), CommandError>;

/// Dispatch table entry.
pub struct CommandSpec {
    /// Primary name without the slash.
    pub name: &'static str,
    /// Alternative names.
    pub aliases: &'static [&'static str],
    /// Minimum role allowed to run the command.
    pub min_role: Role,
    /// Minimum number of arguments.
    pub min_args: usize,
    /// Usage line.
    pub usage: &'static str,
    /// Help text.
    pub description: &'static str,
    /// Handler.
    pub handler: Handler,
}

impl CommandSpec {
    fn matches(&self, name: &str) -> bool {
        self.name == name || self.aliases.contains(&name)
    }
}

/// Every command the hub understands, in help order.
pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "help",
        aliases: &["list"],
        min_role: Role::Guest,
        min_args: 0,
        usage: "/help or /list",
        description: "Show this list",
        handler: cmd_help,
    },
    CommandSpec {
        name: "nick",
        aliases: &[],
        min_role: Role::Guest,
        min_args: 1,
        usage: "/nick <new_nick>",
        description: "Change your nickname",
        handler: cmd_nick,
    },
    CommandSpec {
        name: "me",
        aliases: &[],
        min_role: Role::Guest,
        min_args: 1,
        usage: "/me <action>",
        description: "Send an action",
        handler: cmd_me,
    },
    CommandSpec {
        name: "msg",
        aliases: &[],
        min_role: Role::Guest,
        min_args: 2,
        usage: "/msg <nick> <message>",
        description: "Send a private message",
        handler: cmd_msg,
    },
    CommandSpec {
        name: "who",
        aliases: &[],
        min_role: Role::Guest,
        min_args: 0,
        usage: "/who",
        description: "List connected users",
        handler: cmd_who,
    },
    CommandSpec {
        name: "time",
        aliases: &[],
        min_role: Role::Guest,
        min_args: 0,
        usage: "/time",
        description: "Show the server time",
        handler: cmd_time,
    },
    CommandSpec {
        name: "quit",
        aliases: &[],
        min_role: Role::Guest,
        min_args: 0,
        usage: "/quit [reason]",
        description: "Leave the chat",
        handler: cmd_quit,
    },
    CommandSpec {
        name: "kick",
        aliases: &[],
        min_role: Role::Mod,
        min_args: 1,
        usage: "/kick <nick> [reason]",
        description: "Kick a user",
        handler: cmd_kick,
    },
    CommandSpec {
        name: "ban",
        aliases: &[],
        min_role: Role::Mod,
        min_args: 1,
        usage: "/ban <nick> [reason]",
        description: "Ban a user",
        handler: cmd_ban,
    },
    CommandSpec {
        name: "unban",
        aliases: &[],
        min_role: Role::Mod,
        min_args: 1,
        usage: "/unban <nick>",
        description: "Lift a ban",
        handler: cmd_unban,
    },
    CommandSpec {
        name: "op",
        aliases: &[],
        min_role: Role::Admin,
        min_args: 1,
        usage: "/op <nick>",
        description: "Grant operator rights",
        handler: cmd_role,
    },
    CommandSpec {
        name: "deop",
        aliases: &[],
        min_role: Role::Admin,
        min_args: 1,
        usage: "/deop <nick>",
        description: "Revoke operator rights",
        handler: cmd_role,
    },
    CommandSpec {
        name: "mod",
        aliases: &[],
        min_role: Role::Admin,
        min_args: 1,
        usage: "/mod <nick>",
        description: "Make a moderator",
        handler: cmd_role,
    },
    CommandSpec {
        name: "demod",
        aliases: &[],
        min_role: Role::Admin,
        min_args: 1,
        usage: "/demod <nick>",
        description: "Revoke moderator rights",
        handler: cmd_role,
    },
    CommandSpec {
        name: "user",
        aliases: &[],
        min_role: Role::Admin,
        min_args: 1,
        usage: "/user <nick>",
        description: "Make a regular user",
        handler: cmd_role,
    },
    CommandSpec {
        name: "startrecord",
        aliases: &[],
        min_role: Role::Admin,
        min_args: 0,
        usage: "/startrecord",
        description: "Start recording",
        handler: cmd_start_record,
    },
    CommandSpec {
        name: "stoprecord",
        aliases: &[],
        min_role: Role::Admin,
        min_args: 0,
        usage: "/stoprecord",
        description: "Stop recording",
        handler: cmd_stop_record,
    },
    CommandSpec {
        name: "stats",
        aliases: &[],
        min_role: Role::Admin,
        min_args: 0,
        usage: "/stats",
        description: "Server statistics",
        handler: cmd_stats,
    },
];

/// Look up a command by lowercased name (without the slash).
pub fn find_command(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.matches(name))
}

/// Split a command line into its lowercased name and arguments.
///
/// Returns `None` if the line does not start with `/`.
pub fn parse_command_line(line: &str) -> Option<(String, Vec<&str>)> {
    let without_slash = line.trim_start().strip_prefix('/')?;
    let mut tokens = without_slash.split_whitespace();
    // "/ foo" has an empty command name
    let name = if without_slash.starts_with(char::is_whitespace) {
        String::new()
    } else {
        tokens.next().unwrap_or_default().to_lowercase()
    };
    Some((name, tokens.collect()))
}

/// Help text listing the commands available to `role`.
pub fn format_help(role: Role) -> String {
    let mut lines = vec!["Available commands:".to_string()];
    for spec in COMMANDS.iter().filter(|spec| role.at_least(spec.min_role)) {
        lines.push(format!("{} - {}", spec.usage, spec.description));
    }
    lines.join("\n")
}

/// Roster line for `/who`.
pub fn format_who(sessions: &[Session]) -> String {
    let list = sessions
        .iter()
        .map(|s| format!("{} ({})", s.nick, s.role))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Connected users ({}): {}", sessions.len(), list)
}

fn or_default_reason(reason: String) -> String {
    if reason.is_empty() {
        "No reason given".to_string()
    } else {
        reason
    }
}

fn cmd_help(hub: &mut ChatHub, inv: &Invocation<'_>) -> Result<(), CommandError> {
    hub.notify(&inv.actor.identity, format_help(inv.actor.role), inv.now);
    Ok(())
}

fn cmd_nick(hub: &mut ChatHub, inv: &Invocation<'_>) -> Result<(), CommandError> {
    let change = hub.rename(&inv.actor.identity, inv.args[0])?;
    tracing::info!(old = %change.old_nick, new = %change.new_nick, "Nickname changed");
    hub.announce(
        EventKind::Nick {
            old_nick: change.old_nick,
            new_nick: change.new_nick,
        },
        inv.now,
    );
    hub.broadcast_user_list();
    Ok(())
}

fn cmd_me(hub: &mut ChatHub, inv: &Invocation<'_>) -> Result<(), CommandError> {
    hub.announce(
        EventKind::Action {
            nick: inv.actor.nick.clone(),
            role: inv.actor.role,
            text: inv.rest(0),
        },
        inv.now,
    );
    Ok(())
}

fn cmd_msg(hub: &mut ChatHub, inv: &Invocation<'_>) -> Result<(), CommandError> {
    let target = hub.find(inv.args[0]).ok_or(CommandError::TargetNotFound)?;
    let text = inv.rest(1);
    let private = |sent| EventKind::Private {
        from: inv.actor.nick.clone(),
        to: target.nick.clone(),
        text: text.clone(),
        sent,
    };
    hub.send_event(&inv.actor.identity, private(true), inv.now);
    hub.send_event(&target.identity, private(false), inv.now);
    Ok(())
}

fn cmd_who(hub: &mut ChatHub, inv: &Invocation<'_>) -> Result<(), CommandError> {
    let text = format_who(&hub.sessions().snapshot());
    hub.notify(&inv.actor.identity, text, inv.now);
    Ok(())
}

fn cmd_time(hub: &mut ChatHub, inv: &Invocation<'_>) -> Result<(), CommandError> {
    let text = format!(
        "Server time: {}",
        format_full(&inv.now, &hub.settings().timezone)
    );
    hub.notify(&inv.actor.identity, text, inv.now);
    Ok(())
}

fn cmd_quit(hub: &mut ChatHub, inv: &Invocation<'_>) -> Result<(), CommandError> {
    let reason = inv.rest(0);
    let reason = if reason.is_empty() {
        "Leaving".to_string()
    } else {
        reason
    };
    hub.send_event(
        &inv.actor.identity,
        EventKind::Quit {
            nick: inv.actor.nick.clone(),
            reason: reason.clone(),
        },
        inv.now,
    );
    hub.send(&inv.actor.identity, ServerFrame::Quit);
    hub.end_session(&inv.actor.identity, &reason, inv.now);
    Ok(())
}

fn cmd_kick(hub: &mut ChatHub, inv: &Invocation<'_>) -> Result<(), CommandError> {
    let target = hub.find(inv.args[0]).ok_or(CommandError::TargetNotFound)?;
    if target.is_admin() {
        return Err(CommandError::ProtectedTarget("Cannot kick the admin"));
    }
    let reason = or_default_reason(inv.rest(1));

    tracing::info!(target = %target.nick, by = %inv.actor.nick, %reason, "User kicked");
    hub.announce(
        EventKind::Kick {
            nick: target.nick.clone(),
            by: inv.actor.nick.clone(),
            reason: reason.clone(),
        },
        inv.now,
    );
    hub.send(&target.identity, ServerFrame::Kicked(reason.clone()));
    hub.end_session(&target.identity, &format!("Kicked: {reason}"), inv.now);
    Ok(())
}

fn cmd_ban(hub: &mut ChatHub, inv: &Invocation<'_>) -> Result<(), CommandError> {
    let nick = inv.args[0];
    let target = hub.find(nick);
    if hub.sessions().is_admin_nick(nick) || target.as_ref().is_some_and(Session::is_admin) {
        return Err(CommandError::ProtectedTarget("Cannot ban the admin"));
    }
    let reason = or_default_reason(inv.rest(1));

    hub.bans_mut().ban(nick);
    tracing::info!(target = %nick, by = %inv.actor.nick, %reason, "Nickname banned");
    hub.announce(
        EventKind::Ban {
            nick: nick.to_string(),
            by: inv.actor.nick.clone(),
            reason: reason.clone(),
        },
        inv.now,
    );

    if let Some(target) = target {
        hub.send(&target.identity, ServerFrame::Banned(reason.clone()));
        hub.end_session(&target.identity, &format!("Banned: {reason}"), inv.now);
    }
    Ok(())
}

fn cmd_unban(hub: &mut ChatHub, inv: &Invocation<'_>) -> Result<(), CommandError> {
    let nick = inv.args[0];
    hub.bans_mut().unban(nick);
    tracing::info!(target = %nick, by = %inv.actor.nick, "Nickname unbanned");
    hub.announce(
        EventKind::System {
            text: format!("{nick} was unbanned by {}", inv.actor.nick),
        },
        inv.now,
    );
    Ok(())
}

/// Role implied by a role command, given the target's current role.
///
/// `deop`/`demod` only downgrade a target holding exactly `op`/`mod`.
pub fn role_for_command(command: &str, current: Role) -> Option<Role> {
    match command {
        "op" => Some(Role::Op),
        "deop" => Some(if current == Role::Op { Role::User } else { current }),
        "mod" => Some(Role::Mod),
        "demod" => Some(if current == Role::Mod { Role::User } else { current }),
        "user" => Some(Role::User),
        _ => None,
    }
}

fn cmd_role(hub: &mut ChatHub, inv: &Invocation<'_>) -> Result<(), CommandError> {
    let target = hub.find(inv.args[0]).ok_or(CommandError::TargetNotFound)?;
    if target.is_admin() {
        return Err(CommandError::ProtectedTarget("Cannot change the admin's role"));
    }
    let new_role = role_for_command(&inv.name, target.role)
        .ok_or_else(|| CommandError::Internal(format!("no role for /{}", inv.name)))?;

    let old_role = hub
        .set_role(&target.identity, new_role)
        .ok_or_else(|| CommandError::Internal("role target vanished".to_string()))?;
    tracing::info!(target = %target.nick, %old_role, %new_role, by = %inv.actor.nick, "Role changed");
    // Emitted even when the role is unchanged.
    hub.announce(
        EventKind::Role {
            nick: target.nick.clone(),
            old_role,
            new_role,
            by: inv.actor.nick.clone(),
        },
        inv.now,
    );
    hub.broadcast_user_list();
    Ok(())
}

fn cmd_start_record(hub: &mut ChatHub, inv: &Invocation<'_>) -> Result<(), CommandError> {
    hub.recorder_mut().start(inv.now)?;
    tracing::info!(by = %inv.actor.nick, "Recording started");
    hub.announce(
        EventKind::System {
            text: format!("Recording started by {}", inv.actor.nick),
        },
        inv.now,
    );
    Ok(())
}

fn cmd_stop_record(hub: &mut ChatHub, inv: &Invocation<'_>) -> Result<(), CommandError> {
    let outcome = hub.stop_recording()?;
    let text = match &outcome {
        StopOutcome::Saved(name) => {
            tracing::info!(file = %name, "Recording saved");
            format!("Recording stopped. Saved to: {name}")
        }
        StopOutcome::Empty => {
            tracing::info!("Recording stopped with nothing recorded");
            "Recording stopped (no file produced)".to_string()
        }
        StopOutcome::Failed(error) => {
            tracing::warn!(%error, "Failed to persist recording");
            "Recording stopped (no file produced)".to_string()
        }
    };
    hub.announce(EventKind::System { text }, inv.now);
    Ok(())
}

fn cmd_stats(hub: &mut ChatHub, inv: &Invocation<'_>) -> Result<(), CommandError> {
    let stats = hub.stats();
    let lines = [
        format!("Connected users: {}", stats.users),
        format!(
            "Recording: {}",
            if stats.recording { "active" } else { "inactive" }
        ),
        format!("Uptime: {}", format_uptime(stats.uptime)),
        format!("Memory: {}", format_memory(stats.memory_bytes)),
        format!("Banned users: {}", stats.banned),
    ];
    hub.notify(
        &inv.actor.identity,
        format!("Server statistics:\n{}", lines.join("\n")),
        inv.now,
    );
    Ok(())
}
