mod common;

use std::sync::Arc;
use std::time::Duration;
use bus_attendance::models::label::FeeStatus;
use bus_attendance::pipeline::session::SessionError;
use common::{create_test_app_state, frame_of, registration, setup_test_db, wait_for_condition, MockNotifier};

#[tokio::test]
async fn test_start_without_faces_fails() {
    let (tmp, db_path, conn) = setup_test_db();
    let state = create_test_app_state(&tmp, db_path, conn, Arc::new(MockNotifier::default()));

    let err = state.session.start_recognition(None).unwrap_err();
    assert!(matches!(err, SessionError::NoRegisteredFaces));
    assert!(!state.session.is_running());
}

#[tokio::test]
async fn test_start_is_idempotent_and_stop_reports() {
    let (tmp, db_path, conn) = setup_test_db();
    let state = create_test_app_state(&tmp, db_path, conn, Arc::new(MockNotifier::default()));
    state.session.register(registration("Ravi", FeeStatus::Paid, "r@example.com", 0.6)).unwrap();

    let first = state.session.start_recognition(Some(Duration::from_millis(750))).unwrap();
    assert!(first.started);
    assert_eq!(first.interval_ms, 750);

    let second = state.session.start_recognition(Some(Duration::from_millis(100))).unwrap();
    assert!(!second.started);
    assert_eq!(second.interval_ms, 750);
    assert_eq!(state.session.status().interval_ms, Some(750));

    assert!(state.session.stop_recognition());
    assert!(!state.session.stop_recognition());
    assert!(!state.session.status().running);

    let texts: Vec<String> = state.session.activity_log().into_iter().map(|e| e.text).collect();
    assert_eq!(texts, vec!["Recognition stopped".to_string(), "Recognition started".to_string()]);
}

#[tokio::test]
async fn test_zero_interval_uses_default() {
    let (tmp, db_path, conn) = setup_test_db();
    let state = create_test_app_state(&tmp, db_path, conn, Arc::new(MockNotifier::default()));
    state.session.register(registration("Ravi", FeeStatus::Paid, "r@example.com", 0.6)).unwrap();

    let outcome = state.session.start_recognition(Some(Duration::ZERO)).unwrap();
    assert_eq!(outcome.interval_ms, 2000);
    state.session.stop_recognition();
}

#[tokio::test]
async fn test_timer_scans_submitted_frame() {
    let (tmp, db_path, conn) = setup_test_db();
    let notifier = Arc::new(MockNotifier::default());
    let state = create_test_app_state(&tmp, db_path, conn, notifier.clone());
    state.session.register(registration("Asha", FeeStatus::Unpaid, "a@example.com", 0.2)).unwrap();

    state.session.start_recognition(Some(Duration::from_millis(40))).unwrap();
    state.session.submit_frame(frame_of(&[0.2]));
    assert!(state.session.status().frame_pending);

    let n = notifier.clone();
    assert!(wait_for_condition(|| n.sent_count() == 1, 50, 20).await);
    assert!(!state.session.status().frame_pending);

    // The frame was consumed; later ticks have nothing to scan.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(notifier.attempts(), 1);
    assert!(state.stats.snapshot().ticks >= 2);

    state.session.stop_recognition();
}

#[tokio::test]
async fn test_clear_all_keeps_timer_idle() {
    let (tmp, db_path, conn) = setup_test_db();
    let notifier = Arc::new(MockNotifier::default());
    let state = create_test_app_state(&tmp, db_path, conn, notifier.clone());
    state.session.register(registration("Asha", FeeStatus::Unpaid, "a@example.com", 0.2)).unwrap();

    state.session.start_recognition(Some(Duration::from_millis(30))).unwrap();
    state.session.clear_all().unwrap();
    state.session.submit_frame(frame_of(&[0.2]));
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(notifier.attempts(), 0);
    assert!(state.session.is_running());
    state.session.stop_recognition();
}

#[tokio::test]
async fn test_alerts_are_broadcast() {
    let (tmp, db_path, conn) = setup_test_db();
    let state = create_test_app_state(&tmp, db_path, conn, Arc::new(MockNotifier::default()));
    state.session.register(registration("Ravi", FeeStatus::Paid, "r@example.com", 0.6)).unwrap();

    let mut rx = state.session.subscribe_alerts();
    state.session.process_frame(&frame_of(&[0.0]), chrono::Utc::now()).await.unwrap();
    let alert = rx.recv().await.unwrap();
    assert_eq!(alert.message, "Unrecognized person detected");
}

#[tokio::test]
async fn test_stop_lets_in_flight_notice_finish() {
    let (tmp, db_path, conn) = setup_test_db();
    let notifier = Arc::new(MockNotifier::slow(300));
    let state = create_test_app_state(&tmp, db_path, conn, notifier.clone());
    state.session.register(registration("Asha", FeeStatus::Unpaid, "a@example.com", 0.2)).unwrap();

    state.session.start_recognition(Some(Duration::from_millis(20))).unwrap();
    state.session.submit_frame(frame_of(&[0.2]));
    let n = notifier.clone();
    assert!(wait_for_condition(|| n.attempts() == 1, 50, 10).await);
    assert_eq!(notifier.sent_count(), 0);

    assert!(state.session.stop_recognition());
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(notifier.sent_count(), 1);
    assert!(state.session.last_sent("a@example.com").is_some());
    let texts: Vec<String> = state.session.activity_log().into_iter().map(|e| e.text).collect();
    assert_eq!(texts[0], "Email sent to a@example.com for Asha");

    // Restarting inside the cooldown does not send a second notice.
    state.session.start_recognition(Some(Duration::from_millis(20))).unwrap();
    state.session.submit_frame(frame_of(&[0.2]));
    let s = state.session.clone();
    assert!(wait_for_condition(|| !s.status().frame_pending, 50, 10).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(notifier.attempts(), 1);
    state.session.stop_recognition();
}

#[tokio::test]
async fn test_ticks_continue_while_notice_pending() {
    let (tmp, db_path, conn) = setup_test_db();
    let notifier = Arc::new(MockNotifier::slow(400));
    let state = create_test_app_state(&tmp, db_path, conn, notifier.clone());
    state.session.register(registration("Asha", FeeStatus::Unpaid, "a@example.com", 0.2)).unwrap();

    state.session.start_recognition(Some(Duration::from_millis(20))).unwrap();
    state.session.submit_frame(frame_of(&[0.2]));
    let n = notifier.clone();
    assert!(wait_for_condition(|| n.attempts() == 1, 50, 10).await);

    let before = state.stats.snapshot().ticks;
    tokio::time::sleep(Duration::from_millis(200)).await;
    let after = state.stats.snapshot().ticks;
    assert!(after >= before + 3, "ticks stalled: {} -> {}", before, after);

    // A second sighting while the first notice is in flight is throttled.
    state.session.submit_frame(frame_of(&[0.2]));
    let s = state.session.clone();
    assert!(wait_for_condition(|| !s.status().frame_pending, 50, 10).await);
    assert_eq!(notifier.attempts(), 1);
    assert_eq!(notifier.sent_count(), 0);

    state.session.stop_recognition();
}
