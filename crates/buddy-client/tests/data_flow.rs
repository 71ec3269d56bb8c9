mod common;

use std::time::Duration;

use buddy_client::HelpBuddyData;
use buddy_client::dashboard::{Notice, NoticeLevel, ParentView, StudentView};
use buddy_types::events::ChangeOp;
use buddy_types::messages;
use buddy_types::models::{Mood, Role};
use common::{family, signed_in, spawn_server};

/// Every operation, against a server with or without the named procedures.
async fn full_workflow(with_rpc: bool) {
    let server = spawn_server(with_rpc).await;
    let (student, parent) = family(&server).await;
    let student_id = student.client().current_user().unwrap().id;

    student.log_mood(Mood::Happy).await.unwrap();
    let logged = student.log_mood(Mood::Sad).await;
    assert_eq!(Notice::for_mood(&logged).title, "Humor registrado: 😢 Triste");

    let moods = student.snapshot().await.mood_logs;
    assert_eq!(moods.len(), 2);
    assert_eq!(moods[0].mood, Mood::Sad);
    assert_eq!(moods[1].mood, Mood::Happy);

    let request = student.create_help_request().await.unwrap();
    assert!(!StudentView::build(student_id, &student.snapshot().await).help_button_enabled);

    parent.refresh_all().await;
    let state = parent.snapshot().await;
    assert_eq!(state.connections.len(), 1);
    assert_eq!(state.mood_logs.len(), 2);
    let view = ParentView::build(&state);
    assert_eq!(view.alerts.len(), 1);
    assert_eq!(view.alerts[0].username, "aluno");

    let resolved = parent.resolve_help_request(&request.id.to_string()).await.unwrap();
    assert!(!resolved.is_active);
    assert!(ParentView::build(&parent.snapshot().await).alerts.is_empty());

    let again = parent.resolve_help_request(&request.id.to_string()).await;
    assert_eq!(again.unwrap_err().to_string(), messages::HELP_NOT_FOUND);
}

#[tokio::test]
async fn workflow_through_procedures() {
    full_workflow(true).await;
}

#[tokio::test]
async fn workflow_falls_back_to_tables_without_procedures() {
    full_workflow(false).await;
}

#[tokio::test]
async fn reconnecting_is_rejected_and_list_is_unchanged() {
    for with_rpc in [true, false] {
        let server = spawn_server(with_rpc).await;
        let (student, parent) = family(&server).await;
        let code = student.client().current_user().unwrap().connection_code.unwrap();

        let result = parent.connect_to_student(&code).await;
        let notice = Notice::for_connect(&result);
        assert_eq!(notice.title, messages::ALREADY_CONNECTED);
        assert_eq!(parent.snapshot().await.connections.len(), 1);
    }
}

#[tokio::test]
async fn connect_rejects_wrong_roles_and_codes() {
    let server = spawn_server(true).await;
    let first = signed_in(&server, "aluno1", Role::Student).await;
    let second = signed_in(&server, "aluno2", Role::Student).await;
    let parent = signed_in(&server, "pai", Role::Parent).await;

    let code = first.client().current_user().unwrap().connection_code.unwrap();
    let err = second.connect_to_student(&code).await.unwrap_err();
    assert_eq!(err.to_string(), messages::GUARDIANS_ONLY);

    let result = parent.connect_to_student("NOPE00").await;
    assert_eq!(Notice::for_connect(&result).title, messages::INVALID_CODE);
}

#[tokio::test]
async fn second_help_request_is_rejected() {
    for with_rpc in [true, false] {
        let server = spawn_server(with_rpc).await;
        let student = signed_in(&server, "aluno", Role::Student).await;

        student.create_help_request().await.unwrap();
        let second = student.create_help_request().await;
        assert_eq!(Notice::for_help_request(&second).level, NoticeLevel::Info);
        assert_eq!(student.snapshot().await.help_requests.len(), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_help_requests_create_one_row() {
    let server = spawn_server(true).await;
    let student = signed_in(&server, "aluno", Role::Student).await;

    let mut handles = Vec::new();
    for _ in 0..6 {
        let student = student.clone();
        handles.push(tokio::spawn(async move { student.create_help_request().await.is_ok() }));
    }

    let mut created = 0;
    for handle in handles {
        if handle.await.unwrap() {
            created += 1;
        }
    }
    assert_eq!(created, 1);

    student.fetch_help_requests().await.unwrap();
    let active: Vec<_> = student
        .snapshot()
        .await
        .help_requests
        .into_iter()
        .filter(|request| request.is_active)
        .collect();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn malformed_ids_never_reach_the_server() {
    let server = spawn_server(true).await;
    let (_, parent) = family(&server).await;

    let err = parent.resolve_help_request("123").await.unwrap_err();
    assert_eq!(err.to_string(), messages::INVALID_HELP_ID);
}

#[tokio::test]
async fn removing_a_connection_refreshes_the_list() {
    let server = spawn_server(true).await;
    let (_, parent) = family(&server).await;

    let id = parent.snapshot().await.connections[0].id;
    let result = parent.remove_connection(id).await;
    assert_eq!(Notice::for_remove_connection(&result).title, "Conexão removida");
    assert!(parent.snapshot().await.connections.is_empty());
}

#[tokio::test]
async fn watcher_refetches_on_feed_events() {
    let server = spawn_server(true).await;
    let (student, parent) = family(&server).await;

    let mut watch = parent.watch_help_requests().await.unwrap();
    student.create_help_request().await.unwrap();

    let op = tokio::time::timeout(Duration::from_secs(5), watch.next_change())
        .await
        .unwrap();
    assert_eq!(op, Some(ChangeOp::Insert));

    let state = parent.snapshot().await;
    assert_eq!(state.help_requests.len(), 1);
    assert!(state.help_requests[0].is_active);
}

#[tokio::test]
async fn watcher_works_before_any_refresh() {
    let server = spawn_server(true).await;
    let (student, parent) = family(&server).await;

    // Same session, empty cache: as after an app restart.
    let restarted = HelpBuddyData::new(parent.client().clone());
    assert!(restarted.snapshot().await.connections.is_empty());

    let mut watch = restarted.watch_help_requests().await.unwrap();
    student.create_help_request().await.unwrap();

    let op = tokio::time::timeout(Duration::from_secs(5), watch.next_change())
        .await
        .unwrap();
    assert_eq!(op, Some(ChangeOp::Insert));

    let state = restarted.snapshot().await;
    assert_eq!(state.connections.len(), 1);
    assert_eq!(state.help_requests.len(), 1);
    assert_eq!(ParentView::build(&state).alerts[0].username, "aluno");
    watch.stop();
}

#[tokio::test]
async fn watcher_needs_a_live_session() {
    let server = spawn_server(true).await;
    let student = signed_in(&server, "aluno", Role::Student).await;
    student.client().logout().await;

    assert!(student.watch_help_requests().await.is_err());
}
