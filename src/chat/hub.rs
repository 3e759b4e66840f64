//! The chat hub.
//!
//! [`ChatHub`] owns the session registry, the ban registry and the recorder.
//! Each `handle_*` method processes one inbound event to completion; the
//! driver guarantees they are never called concurrently.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::ban::BanRegistry;
use super::command::{find_command, parse_command_line, CommandError, Invocation};
use super::event::{ChatEvent, EventKind, JoinedPayload, ServerFrame};
use super::fanout::Fanout;
use super::nick::sanitize_message;
use super::recorder::{LogSink, RecordError, Recorder, StopOutcome};
use super::role::Role;
use super::session::{Identity, NickChange, NickError, Session, SessionRegistry};
use crate::config::Config;
use crate::process::ProcessInfo;

/// Hub parameters derived from configuration.
#[derive(Debug, Clone)]
pub struct HubSettings {
    pub channel: String,
    pub admin_nick: String,
    pub motd: String,
    pub timezone: String,
    pub max_message_length: usize,
    pub inactivity_timeout: chrono::Duration,
}

impl HubSettings {
    /// Extract the hub settings from the full configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            channel: config.chat.channel_name.clone(),
            admin_nick: config.chat.admin_nick.clone(),
            motd: config.chat.motd.clone(),
            timezone: config.server.timezone.clone(),
            max_message_length: config.chat.max_message_length,
            inactivity_timeout: chrono::Duration::seconds(
                config.chat.inactivity_timeout_secs.min(u32::MAX as u64) as i64,
            ),
        }
    }
}

impl Default for HubSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Snapshot reported by `/stats` and `/api/stats`.
#[derive(Debug, Clone, PartialEq)]
pub struct HubStats {
    pub users: usize,
    pub recording: bool,
    pub uptime: Duration,
    pub memory_bytes: Option<u64>,
    pub banned: usize,
    pub channel: String,
}

/// Single-room chat state machine.
pub struct ChatHub {
    settings: HubSettings,
    sessions: SessionRegistry,
    bans: BanRegistry,
    recorder: Recorder,
    fanout: Fanout,
    sink: Arc<dyn LogSink>,
    process: Arc<dyn ProcessInfo>,
}

impl ChatHub {
    pub fn new(
        settings: HubSettings,
        fanout: Fanout,
        sink: Arc<dyn LogSink>,
        process: Arc<dyn ProcessInfo>,
    ) -> Self {
        Self {
            sessions: SessionRegistry::new(&settings.admin_nick),
            settings,
            bans: BanRegistry::new(),
            recorder: Recorder::new(),
            fanout,
            sink,
            process,
        }
    }

    pub fn settings(&self) -> &HubSettings {
        &self.settings
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn bans(&self) -> &BanRegistry {
        &self.bans
    }

    pub fn bans_mut(&mut self) -> &mut BanRegistry {
        &mut self.bans
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn recorder_mut(&mut self) -> &mut Recorder {
        &mut self.recorder
    }

    /// Handle a `join` request.
    pub fn handle_join(&mut self, identity: Identity, raw_nick: &str, now: DateTime<Utc>) {
        let session = match self.sessions.join(identity.clone(), raw_nick, &self.bans, now) {
            Ok(session) => session,
            Err(e) => {
                tracing::debug!(%identity, nick = %raw_nick, error = %e, "Join rejected");
                self.fanout.to_one(&identity, ServerFrame::error(e.to_string()));
                return;
            }
        };
        tracing::info!(%identity, nick = %session.nick, role = %session.role, "User joined");

        self.fanout.to_one(
            &identity,
            ServerFrame::Joined(JoinedPayload {
                channel: self.settings.channel.clone(),
                session: session.clone(),
                sessions: self.sessions.snapshot(),
                motd: self.settings.motd.clone(),
            }),
        );
        self.announce_except(
            &identity,
            EventKind::Join {
                nick: session.nick,
                role: session.role,
            },
            now,
        );
        self.broadcast_user_list();
    }

    /// Handle a chat line: either a command or a broadcast message.
    ///
    /// Lines from connections that have not joined are ignored.
    pub fn handle_message(&mut self, identity: &Identity, text: &str, now: DateTime<Utc>) {
        let Some(actor) = self.sessions.get(identity).cloned() else {
            return;
        };
        let text = sanitize_message(text, self.settings.max_message_length);
        if text.is_empty() {
            return;
        }
        self.sessions.touch(identity, now);

        if text.starts_with('/') {
            self.run_command(actor, &text, now);
        } else {
            self.announce(
                EventKind::Message {
                    nick: actor.nick,
                    role: actor.role,
                    text,
                },
                now,
            );
        }
    }

    /// Answer a keep-alive.
    pub fn handle_ping(&mut self, identity: &Identity, now: DateTime<Utc>) {
        self.fanout.to_one(identity, ServerFrame::Pong);
        self.sessions.touch(identity, now);
    }

    /// Clean up after the transport closed a connection.
    pub fn handle_disconnect(&mut self, identity: &Identity, now: DateTime<Utc>) {
        self.remove_session(identity, "Disconnected", now);
    }

    /// Disconnect every session idle longer than the inactivity timeout.
    ///
    /// Returns the number of sessions reaped.
    pub fn sweep_inactive(&mut self, now: DateTime<Utc>) -> usize {
        let idle = self
            .sessions
            .idle_sessions(now, self.settings.inactivity_timeout);
        tracing::debug!(sessions = self.sessions.len(), idle = idle.len(), "Inactivity sweep");

        for identity in &idle {
            if let Some(session) = self.sessions.get(identity) {
                tracing::info!(%identity, nick = %session.nick, "Disconnecting idle session");
            }
            self.notify(identity, "Disconnected for inactivity".to_string(), now);
            self.end_session(identity, "Inactivity", now);
        }
        idle.len()
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            users: self.sessions.len(),
            recording: self.recorder.is_active(),
            uptime: self.process.uptime(),
            memory_bytes: self.process.memory_bytes(),
            banned: self.bans.len(),
            channel: self.settings.channel.clone(),
        }
    }

    fn run_command(&mut self, actor: Session, line: &str, now: DateTime<Utc>) {
        let Some((name, args)) = parse_command_line(line) else {
            return;
        };
        let identity = actor.identity.clone();
        tracing::debug!(%identity, nick = %actor.nick, command = %name, "Command");

        let result = match find_command(&name) {
            None => Err(CommandError::UnknownCommand(format!("/{name}"))),
            Some(spec) if !actor.role.at_least(spec.min_role) => {
                Err(CommandError::PermissionDenied)
            }
            Some(spec) if args.len() < spec.min_args => Err(CommandError::Usage(spec.usage)),
            Some(spec) => {
                let invocation = Invocation {
                    actor,
                    name,
                    args,
                    now,
                };
                (spec.handler)(self, &invocation)
            }
        };

        if let Err(e) = result {
            if let CommandError::Internal(detail) = &e {
                tracing::error!(%identity, error = %detail, "Command failed");
            }
            self.reply_error(&identity, &e);
        }
    }

    /// Find a session by nickname.
    pub fn find(&self, nick: &str) -> Option<Session> {
        self.sessions.lookup_by_nick(nick).cloned()
    }

    pub fn rename(&mut self, identity: &Identity, new_nick: &str) -> Result<NickChange, NickError> {
        self.sessions.change_nick(identity, new_nick, &self.bans)
    }

    pub fn set_role(&mut self, identity: &Identity, role: Role) -> Option<Role> {
        self.sessions.set_role(identity, role)
    }

    pub fn stop_recording(&mut self) -> Result<StopOutcome, RecordError> {
        self.recorder.stop(self.sink.as_ref())
    }

    fn stamp(&self, kind: EventKind, now: DateTime<Utc>) -> ChatEvent {
        ChatEvent::format(kind, &now, &self.settings.timezone)
    }

    fn record(&mut self, event: &ChatEvent, now: DateTime<Utc>) {
        if event.kind.is_recordable() {
            self.recorder.record(event, now);
        }
    }

    /// Broadcast an event to every session and record it.
    pub fn announce(&mut self, kind: EventKind, now: DateTime<Utc>) {
        let event = self.stamp(kind, now);
        self.fanout
            .to_all(&self.sessions, &ServerFrame::Message(event.clone()));
        self.record(&event, now);
    }

    /// Broadcast an event to every session but one and record it.
    pub fn announce_except(&mut self, sender: &Identity, kind: EventKind, now: DateTime<Utc>) {
        let event = self.stamp(kind, now);
        self.fanout
            .to_all_except(&self.sessions, sender, &ServerFrame::Message(event.clone()));
        self.record(&event, now);
    }

    /// Deliver an event to one connection without recording it.
    pub fn send_event(&self, identity: &Identity, kind: EventKind, now: DateTime<Utc>) {
        self.fanout
            .to_one(identity, ServerFrame::Message(self.stamp(kind, now)));
    }

    /// Private system notice.
    pub fn notify(&self, identity: &Identity, text: String, now: DateTime<Utc>) {
        self.send_event(identity, EventKind::System { text }, now);
    }

    pub fn send(&self, identity: &Identity, frame: ServerFrame) {
        self.fanout.to_one(identity, frame);
    }

    fn reply_error(&self, identity: &Identity, error: &CommandError) {
        self.fanout
            .to_one(identity, ServerFrame::error(error.to_string()));
    }

    pub fn broadcast_user_list(&self) {
        self.fanout
            .to_all(&self.sessions, &ServerFrame::UserList(self.sessions.snapshot()));
    }

    /// Force-close a session and run the common departure cleanup.
    pub fn end_session(&mut self, identity: &Identity, reason: &str, now: DateTime<Utc>) {
        self.fanout.disconnect(identity);
        self.remove_session(identity, reason, now);
    }

    /// Remove a session, tell the others and refresh the roster.
    fn remove_session(&mut self, identity: &Identity, reason: &str, now: DateTime<Utc>) {
        let Some(session) = self.sessions.remove(identity) else {
            return;
        };
        tracing::info!(%identity, nick = %session.nick, %reason, "User left");
        self.announce(
            EventKind::Quit {
                nick: session.nick,
                reason: reason.to_string(),
            },
            now,
        );
        self.broadcast_user_list();
    }
}
