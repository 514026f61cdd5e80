// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::sync::Arc;
use std::thread;

use chainsmith::history::{SessionHistoryStore, Turn, TurnRole};

#[test]
fn test_first_message_in_fresh_store() {
    let store = SessionHistoryStore::new();

    let history = store.get_or_create("default_session");
    assert!(history.is_empty());

    history.append(Turn::user("hi"));
    history.append(Turn::assistant("hello"));

    let turns = store.snapshot("default_session");
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role(), TurnRole::User);
    assert_eq!(turns[0].text(), "hi");
    assert_eq!(turns[1].role(), TurnRole::Assistant);
    assert_eq!(turns[1].text(), "hello");
}

#[test]
fn test_continuation_sees_prior_turns() {
    let store = SessionHistoryStore::new();
    store.append("default_session", Turn::user("hi"));
    store.append("default_session", Turn::assistant("hello"));

    let before = store.snapshot("default_session");
    assert_eq!(before.len(), 2);

    store.append("default_session", Turn::user("and you?"));
    store.append("default_session", Turn::assistant("fine"));

    let texts: Vec<String> = store
        .snapshot("default_session")
        .iter()
        .map(|t| t.text().to_string())
        .collect();
    assert_eq!(texts, vec!["hi", "hello", "and you?", "fine"]);
}

#[test]
fn test_second_session_is_isolated() {
    let store = SessionHistoryStore::new();
    store.append("default_session", Turn::user("hi"));
    store.append("default_session", Turn::assistant("hello"));

    let other = store.get_or_create("other");
    assert!(other.is_empty());
    other.append(Turn::user("x"));

    assert_eq!(store.snapshot("default_session").len(), 2);
    assert_eq!(store.snapshot("other").len(), 1);
    assert_eq!(store.session_ids(), vec!["default_session", "other"]);
}

#[test]
fn test_snapshot_survives_later_appends() {
    let store = SessionHistoryStore::new();
    store.append("default_session", Turn::user("hi"));
    store.append("default_session", Turn::assistant("hello"));

    let snapshot = store.snapshot("default_session");
    store.append("default_session", Turn::user("more"));

    assert_eq!(snapshot.len(), 2);
    assert_eq!(store.snapshot("default_session").len(), 3);
}

#[test]
fn test_repeated_lookup_returns_same_history() {
    let store = SessionHistoryStore::new();
    let a = store.get_or_create("s");
    let b = store.get_or_create("s");

    assert!(a.ptr_eq(&b));
    a.append(Turn::user("seen by both"));
    assert_eq!(b.len(), 1);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_concurrent_sessions_keep_their_own_order() {
    let store = Arc::new(SessionHistoryStore::new());

    let handles: Vec<_> = (0..4)
        .map(|n| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let id = format!("session-{}", n);
                for i in 0..50 {
                    store.append(&id, Turn::user(format!("{}", i)));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.len(), 4);
    for n in 0..4 {
        let turns = store.snapshot(&format!("session-{}", n));
        let texts: Vec<String> = turns.iter().map(|t| t.text().to_string()).collect();
        let expected: Vec<String> = (0..50).map(|i| i.to_string()).collect();
        assert_eq!(texts, expected);
    }
}
