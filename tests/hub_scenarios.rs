//! Hub scenario tests.
//!
//! These tests drive the hub through complete user flows and check what
//! every connection receives.

mod common;

use common::{id, TestHub, ADMIN};
use parlor::chat::recorder::RecordEntry;
use parlor::chat::{Delivery, EventKind, Role, ServerFrame};

// ============================================================================
// Joining
// ============================================================================

#[test]
fn test_scenario_join_and_say_hello() {
    let mut t = TestHub::new();
    t.join("c1", "alice");

    match &t.frames("c1")[0] {
        ServerFrame::Joined(payload) => {
            assert_eq!(payload.channel, "Test Channel");
            assert_eq!(payload.motd, "Welcome!");
            assert_eq!(payload.session.nick, "alice");
            assert_eq!(payload.session.role, Role::Guest);
            assert_eq!(payload.sessions.len(), 1);
        }
        other => panic!("Expected joined frame, got {other:?}"),
    }

    t.join("c2", "bob");
    t.clear();
    t.say("c1", "hello");

    let expected = EventKind::Message {
        nick: "alice".to_string(),
        role: Role::Guest,
        text: "hello".to_string(),
    };
    assert_eq!(t.events("c1"), vec![expected.clone()]);
    assert_eq!(t.events("c2"), vec![expected]);
}

#[test]
fn test_join_announced_to_others_only() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", "alice")]);
    t.join("c2", "bob");

    assert_eq!(
        t.events("c1"),
        vec![EventKind::Join {
            nick: "bob".to_string(),
            role: Role::Guest
        }]
    );
    assert!(t.events("c2").is_empty());

    let rosters: Vec<usize> = t
        .frames("c1")
        .into_iter()
        .filter_map(|f| match f {
            ServerFrame::UserList(sessions) => Some(sessions.len()),
            _ => None,
        })
        .collect();
    assert_eq!(rosters, vec![2]);
}

#[test]
fn test_nicknames_unique_case_insensitively() {
    let mut t = TestHub::new();
    t.join("c1", "alice");
    t.join("c2", "ALICE");
    t.join("c3", "Alice");

    assert_eq!(t.hub.sessions().len(), 1);
    assert_eq!(t.errors("c2"), vec!["This nickname is already in use"]);
    assert_eq!(t.errors("c3"), vec!["This nickname is already in use"]);
}

#[test]
fn test_invalid_nickname_rejected() {
    let mut t = TestHub::new();
    t.join("c1", "has space");
    t.join("c2", "waytoolongnickname_over20");
    assert!(t.hub.sessions().is_empty());
    assert_eq!(t.errors("c1").len(), 1);
    assert_eq!(t.errors("c2").len(), 1);
}

#[test]
fn test_admin_nick_gets_admin_role() {
    let mut t = TestHub::new();
    t.join("c1", "ROOT");
    assert_eq!(t.hub.sessions().get(&id("c1")).unwrap().role, Role::Admin);
}

#[test]
fn test_second_join_on_same_connection_rejected() {
    let mut t = TestHub::new();
    t.join("c1", "alice");
    t.join("c1", "alicia");
    assert_eq!(t.errors("c1"), vec!["You have already joined"]);
    assert_eq!(t.hub.sessions().get(&id("c1")).unwrap().nick, "alice");
}

#[test]
fn test_message_is_sanitized() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", "alice")]);
    t.say("c1", "  <b>hi</b>  ");
    t.say("c1", &"x".repeat(600));

    let texts: Vec<String> = t
        .events("c1")
        .into_iter()
        .filter_map(|k| match k {
            EventKind::Message { text, .. } => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(texts[0], "bhi/b");
    assert_eq!(texts[1].chars().count(), 500);
}

// ============================================================================
// Nickname changes
// ============================================================================

#[test]
fn test_scenario_nick_change() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", "alice"), ("c2", "carol")]);
    t.say("c1", "/nick bob");

    let expected = EventKind::Nick {
        old_nick: "alice".to_string(),
        new_nick: "bob".to_string(),
    };
    assert_eq!(t.events("c1"), vec![expected.clone()]);
    assert_eq!(t.events("c2"), vec![expected]);
    assert!(t
        .frames("c2")
        .iter()
        .any(|f| matches!(f, ServerFrame::UserList(s) if s.iter().any(|s| s.nick == "bob"))));
    assert!(t.hub.find("bob").is_some());
}

#[test]
fn test_scenario_nick_taken() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", "alice"), ("c2", "bob")]);
    t.say("c1", "/nick BOB");

    assert_eq!(t.errors("c1"), vec!["This nickname is already taken"]);
    assert!(t.events("c1").is_empty());
    assert!(t.frames("c2").is_empty());
    assert_eq!(t.hub.sessions().get(&id("c1")).unwrap().nick, "alice");
}

#[test]
fn test_nick_admin_reserved() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", "alice")]);
    t.say("c1", "/nick Root");
    assert_eq!(t.errors("c1"), vec!["This nickname is reserved"]);
}

#[test]
fn test_nick_usage() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", "alice")]);
    t.say("c1", "/nick");
    assert_eq!(t.errors("c1"), vec!["Usage: /nick <new_nick>"]);
}

// ============================================================================
// Informational commands
// ============================================================================

#[test]
fn test_help_filtered_by_role() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", "alice"), ("c2", ADMIN)]);
    t.say("c1", "/help");
    t.say("c2", "/LIST");

    let guest = t.notices("c1").join("\n");
    assert!(guest.contains("/msg <nick> <message>"));
    assert!(!guest.contains("/kick"));

    let admin = t.notices("c2").join("\n");
    assert!(admin.contains("/kick"));
    assert!(admin.contains("/startrecord"));
}

#[test]
fn test_who_lists_sessions() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", "alice"), ("c2", ADMIN)]);
    t.say("c1", "/who");
    assert_eq!(
        t.notices("c1"),
        vec!["Connected users (2): alice (guest), root (admin)"]
    );
}

#[test]
fn test_time_notice() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", "alice")]);
    t.say("c1", "/time");
    assert_eq!(t.notices("c1"), vec!["Server time: 15/01/2024 10:30:00"]);
}

#[test]
fn test_stats_admin_only() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", "alice"), ("c2", ADMIN)]);
    t.say("c1", "/stats");
    assert_eq!(t.errors("c1"), vec!["Permission denied"]);

    t.say("c2", "/stats");
    let text = t.notices("c2").join("\n");
    assert!(text.contains("Connected users: 2"));
    assert!(text.contains("Recording: inactive"));
    assert!(text.contains("Uptime: 2h 5m"));
    assert!(text.contains("Memory: 12MB"));
    assert!(text.contains("Banned users: 0"));
}

#[test]
fn test_unknown_command_names_token() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", "alice")]);
    t.say("c1", "/Dance");
    assert_eq!(
        t.errors("c1"),
        vec!["Unknown command: /dance. Type /help for the list of commands."]
    );
}

// ============================================================================
// Messaging
// ============================================================================

#[test]
fn test_me_action() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", "alice"), ("c2", "bob")]);
    t.say("c1", "/me waves hello");
    assert_eq!(
        t.events("c2"),
        vec![EventKind::Action {
            nick: "alice".to_string(),
            role: Role::Guest,
            text: "waves hello".to_string(),
        }]
    );
}

#[test]
fn test_private_message() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", "alice"), ("c2", "bob"), ("c3", "carol")]);
    t.say("c1", "/msg BOB hi there");

    let private = |sent| EventKind::Private {
        from: "alice".to_string(),
        to: "bob".to_string(),
        text: "hi there".to_string(),
        sent,
    };
    assert_eq!(t.events("c1"), vec![private(true)]);
    assert_eq!(t.events("c2"), vec![private(false)]);
    assert!(t.frames("c3").is_empty());
}

#[test]
fn test_private_message_target_not_found() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", "alice")]);
    t.say("c1", "/msg nobody hello");
    assert_eq!(t.errors("c1"), vec!["User not found"]);
}

// ============================================================================
// Moderation
// ============================================================================

#[test]
fn test_scenario_admin_bans_connected_user() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", ADMIN), ("c2", "troll"), ("c3", "alice")]);
    t.say("c1", "/ban troll reason");

    assert!(t.hub.bans().is_banned("TROLL"));
    let ban = EventKind::Ban {
        nick: "troll".to_string(),
        by: ADMIN.to_string(),
        reason: "reason".to_string(),
    };
    assert_eq!(
        t.events("c3"),
        vec![
            ban.clone(),
            EventKind::Quit {
                nick: "troll".to_string(),
                reason: "Banned: reason".to_string()
            }
        ]
    );

    let troll: Vec<Delivery> = t
        .deliveries()
        .into_iter()
        .filter(|d| match d {
            Delivery::Frame(to, _) | Delivery::Disconnect(to) => to == &id("c2"),
        })
        .collect();
    assert_eq!(troll.len(), 3);
    assert!(matches!(&troll[0], Delivery::Frame(_, ServerFrame::Message(e)) if e.kind == ban));
    assert_eq!(
        troll[1],
        Delivery::Frame(id("c2"), ServerFrame::Banned("reason".to_string()))
    );
    assert_eq!(troll[2], Delivery::Disconnect(id("c2")));
    assert!(t.hub.sessions().get(&id("c2")).is_none());

    t.join("c4", "Troll");
    assert_eq!(t.errors("c4"), vec!["You are banned from this chat"]);
}

#[test]
fn test_ban_offline_nick_and_unban() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", ADMIN)]);
    t.say("c1", "/ban ghost");
    assert!(t
        .events("c1")
        .iter()
        .any(|k| matches!(k, EventKind::Ban { reason, .. } if reason == "No reason given")));

    t.join("c2", "GHOST");
    assert_eq!(t.errors("c2"), vec!["You are banned from this chat"]);

    t.say("c1", "/unban Ghost");
    assert!(t
        .notices("c1")
        .contains(&"Ghost was unbanned by root".to_string()));
    t.join("c3", "ghost");
    assert!(t.hub.sessions().get(&id("c3")).is_some());
}

#[test]
fn test_kick() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", ADMIN), ("c2", "alice"), ("c3", "bob")]);
    t.say("c1", "/mod alice");
    t.clear();

    t.say("c2", "/kick bob flooding the room");
    let kick = EventKind::Kick {
        nick: "bob".to_string(),
        by: "alice".to_string(),
        reason: "flooding the room".to_string(),
    };
    assert_eq!(
        t.events("c1"),
        vec![
            kick.clone(),
            EventKind::Quit {
                nick: "bob".to_string(),
                reason: "Kicked: flooding the room".to_string()
            }
        ]
    );
    assert!(t
        .frames("c3")
        .contains(&ServerFrame::Kicked("flooding the room".to_string())));
    assert!(t.was_disconnected("c3"));
    assert!(!t.hub.sessions().contains(&id("c3")));
}

#[test]
fn test_kick_and_ban_require_mod() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", "alice"), ("c2", "bob")]);
    t.say("c1", "/kick bob");
    t.say("c1", "/ban bob");
    t.say("c1", "/unban bob");
    assert_eq!(t.errors("c1"), vec!["Permission denied"; 3]);
    assert!(t.hub.sessions().contains(&id("c2")));
}

#[test]
fn test_admin_cannot_be_kicked_or_banned() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", ADMIN), ("c2", "alice")]);
    t.say("c1", "/op alice");
    t.clear();

    t.say("c2", "/kick root");
    t.say("c2", "/ban ROOT");
    // Even the admin cannot target itself.
    t.say("c1", "/kick root");
    t.say("c1", "/ban root");

    assert_eq!(
        t.errors("c2"),
        vec!["Cannot kick the admin", "Cannot ban the admin"]
    );
    assert_eq!(
        t.errors("c1"),
        vec!["Cannot kick the admin", "Cannot ban the admin"]
    );
    assert!(!t.hub.bans().is_banned(ADMIN));
    assert!(t.hub.sessions().contains(&id("c1")));
}

#[test]
fn test_admin_protected_after_rename() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", ADMIN), ("c2", "alice")]);
    t.say("c1", "/mod alice");
    t.say("c1", "/nick boss");
    t.clear();

    t.say("c2", "/kick boss");
    t.say("c2", "/ban boss");
    assert_eq!(
        t.errors("c2"),
        vec!["Cannot kick the admin", "Cannot ban the admin"]
    );
}

#[test]
fn test_admin_nick_cannot_be_banned_while_offline() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", "alice")]);
    t.hub.set_role(&id("c1"), Role::Mod);
    t.say("c1", "/ban root");
    assert_eq!(t.errors("c1"), vec!["Cannot ban the admin"]);
    assert!(t.hub.bans().is_empty());
}

// ============================================================================
// Roles
// ============================================================================

#[test]
fn test_role_commands() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", ADMIN), ("c2", "alice")]);

    for (command, expected) in [
        ("/op alice", Role::Op),
        ("/deop alice", Role::User),
        ("/mod alice", Role::Mod),
        ("/demod alice", Role::User),
        ("/user alice", Role::User),
    ] {
        t.say("c1", command);
        assert_eq!(
            t.hub.sessions().get(&id("c2")).unwrap().role,
            expected,
            "after {command}"
        );
    }
}

#[test]
fn test_deop_on_non_op_still_broadcasts() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", ADMIN), ("c2", "alice")]);
    t.say("c1", "/mod alice");
    t.clear();

    t.say("c1", "/deop alice");
    assert_eq!(
        t.events("c2"),
        vec![EventKind::Role {
            nick: "alice".to_string(),
            old_role: Role::Mod,
            new_role: Role::Mod,
            by: ADMIN.to_string(),
        }]
    );
    assert_eq!(t.hub.sessions().get(&id("c2")).unwrap().role, Role::Mod);
}

#[test]
fn test_role_commands_admin_only() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", ADMIN), ("c2", "alice"), ("c3", "bob")]);
    t.say("c1", "/op alice");
    t.clear();

    t.say("c2", "/op bob");
    assert_eq!(t.errors("c2"), vec!["Permission denied"]);
    assert_eq!(t.hub.sessions().get(&id("c3")).unwrap().role, Role::Guest);
}

#[test]
fn test_admin_role_cannot_be_changed() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", ADMIN)]);
    t.say("c1", "/user root");
    assert_eq!(t.errors("c1"), vec!["Cannot change the admin's role"]);
    assert_eq!(t.hub.sessions().get(&id("c1")).unwrap().role, Role::Admin);
}

#[test]
fn test_role_target_not_found() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", ADMIN)]);
    t.say("c1", "/op nobody");
    assert_eq!(t.errors("c1"), vec!["User not found"]);
}

// ============================================================================
// Leaving
// ============================================================================

#[test]
fn test_quit_emits_single_quit_event() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", "alice"), ("c2", "bob")]);
    t.say("c1", "/quit see you");

    let quit = EventKind::Quit {
        nick: "alice".to_string(),
        reason: "see you".to_string(),
    };
    assert_eq!(t.events("c1"), vec![quit.clone()]);
    assert!(t.frames("c1").contains(&ServerFrame::Quit));
    assert!(t.was_disconnected("c1"));
    assert_eq!(t.events("c2"), vec![quit]);
    assert!(t.hub.sessions().get(&id("c1")).is_none());
}

#[test]
fn test_transport_disconnect_cleans_up() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", "alice"), ("c2", "bob")]);
    t.hub.handle_disconnect(&id("c1"), t.now);

    assert_eq!(
        t.events("c2"),
        vec![EventKind::Quit {
            nick: "alice".to_string(),
            reason: "Disconnected".to_string()
        }]
    );
    assert!(t
        .frames("c2")
        .contains(&ServerFrame::UserList(t.hub.sessions().snapshot())));
    assert!(!t.was_disconnected("c1"));

    // The nickname is free again.
    t.join("c3", "alice");
    assert!(t.hub.sessions().contains(&id("c3")));
}

// ============================================================================
// Inactivity
// ============================================================================

#[test]
fn test_sweep_reaps_only_idle_sessions() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", "alice"), ("c2", "bob")]);
    t.advance(chrono::Duration::minutes(20));
    t.hub.handle_ping(&id("c2"), t.now);
    t.advance(chrono::Duration::minutes(10));

    // Exactly at the timeout: nobody is reaped.
    assert_eq!(t.hub.sweep_inactive(t.now), 0);

    t.advance(chrono::Duration::seconds(1));
    assert_eq!(t.hub.sweep_inactive(t.now), 1);
    assert_eq!(t.notices("c1"), vec!["Disconnected for inactivity"]);
    assert!(t.was_disconnected("c1"));
    assert!(!t.was_disconnected("c2"));
    assert!(t.events("c2").contains(&EventKind::Quit {
        nick: "alice".to_string(),
        reason: "Inactivity".to_string()
    }));
}

// ============================================================================
// Recording
// ============================================================================

fn saved_entries(t: &TestHub) -> Vec<RecordEntry> {
    let files = t.sink.entries();
    assert_eq!(files.len(), 1);
    serde_json::from_slice(&files[0].1).unwrap()
}

#[test]
fn test_recording_captures_recordable_events_in_order() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", ADMIN), ("c2", "alice"), ("c3", "bob")]);
    t.say("c1", "/startrecord");
    t.say("c2", "hello");
    t.say("c2", "/me waves");
    t.say("c2", "/msg bob secret");
    t.say("c2", "/who");
    t.join("c4", "carol");
    t.say("c2", "/nick alicia");
    t.say("c1", "/stoprecord");

    let kinds: Vec<&str> = saved_entries(&t)
        .iter()
        .map(|e| e.message.kind.as_str())
        .collect();
    assert_eq!(kinds, vec!["message", "action", "join", "nick"]);

    assert_eq!(t.sink.entries()[0].0, "chat-log-2024-01-15T10-30-00.json");
    assert!(t
        .notices("c3")
        .contains(&"Recording stopped. Saved to: chat-log-2024-01-15T10-30-00.json".to_string()));
    assert!(!t.hub.recorder().is_active());
}

#[test]
fn test_recording_includes_moderation() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", ADMIN), ("c2", "alice")]);
    t.say("c1", "/startrecord");
    t.say("c1", "/op alice");
    t.say("c1", "/kick alice bye");
    t.say("c1", "/stoprecord");

    let kinds: Vec<&str> = saved_entries(&t)
        .iter()
        .map(|e| e.message.kind.as_str())
        .collect();
    assert_eq!(kinds, vec!["role", "kick", "quit"]);
}

#[test]
fn test_empty_recording_produces_no_file() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", ADMIN)]);
    t.say("c1", "/startrecord");
    t.say("c1", "/stoprecord");

    assert!(t.sink.entries().is_empty());
    assert_eq!(
        t.notices("c1"),
        vec![
            "Recording started by root",
            "Recording stopped (no file produced)"
        ]
    );
}

#[test]
fn test_recording_persist_failure_still_stops() {
    let mut t = TestHub::with_sink(parlor::chat::MemoryLogSink::failing());
    t.join_all(&[("c1", ADMIN)]);
    t.say("c1", "/startrecord");
    t.say("c1", "hello");
    t.say("c1", "/stoprecord");

    assert!(!t.hub.recorder().is_active());
    assert!(t
        .notices("c1")
        .contains(&"Recording stopped (no file produced)".to_string()));
}

#[test]
fn test_recording_lifecycle_errors() {
    let mut t = TestHub::new();
    t.join_all(&[("c1", ADMIN), ("c2", "alice")]);
    t.say("c1", "/stoprecord");
    t.say("c1", "/startrecord");
    t.say("c1", "/startrecord");
    t.say("c2", "/startrecord");

    assert_eq!(
        t.errors("c1"),
        vec!["No recording in progress", "Recording already in progress"]
    );
    assert_eq!(t.errors("c2"), vec!["Permission denied"]);
}
