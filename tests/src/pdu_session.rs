//! PDU session integration tests
//!
//! Session management over UL/DL NAS Transport after registration.

use std::net::Ipv4Addr;

use dusim_ue::{PduSessionState, UeError};
use integration_tests::{
    init_test_logging, start_registered, wait_until, MockCuConfig, MockCuEvent, TestConfig,
    DEFAULT_TEST_TIMEOUT,
};

async fn wait_for_default_session(cu: &integration_tests::MockCu) {
    cu.wait_for_event(
        |e| matches!(e, MockCuEvent::PduSessionEstablished { psi: 1, .. }),
        DEFAULT_TEST_TIMEOUT,
    )
    .await
    .expect("default session");
}

/// Registration completion opens the default session
#[tokio::test]
async fn test_default_session_after_registration() {
    init_test_logging();

    let (du, cu) = start_registered(TestConfig::new().build(), MockCuConfig::default())
        .await
        .expect("registration");
    wait_for_default_session(&cu).await;

    let ue = du.ue().expect("UE attached");
    wait_until(|| {
        ue.get_pdu_session(1)
            .is_some_and(|s| s.state == PduSessionState::Active)
    })
    .await
    .expect("session active");

    let session = ue.get_pdu_session(1).expect("session 1");
    assert_eq!(session.dnn.map(|d| d.0).as_deref(), Some("internet"));
    assert_eq!(session.ipv4_address, Some(Ipv4Addr::new(10, 45, 0, 2)));
    assert_eq!(session.ssc_mode, Some(1));
    assert!(session.session_ambr.is_some());
    assert_eq!(cu.sessions(), vec![1]);
}

/// A rejected establishment frees the session id
#[tokio::test]
async fn test_rejected_session_is_removed() {
    init_test_logging();

    let cu_config = MockCuConfig {
        rejected_dnns: vec!["ims".to_string()],
        ..MockCuConfig::default()
    };
    let (du, cu) = start_registered(TestConfig::new().build(), cu_config)
        .await
        .expect("registration");
    wait_for_default_session(&cu).await;

    let ue = du.ue().expect("UE attached");
    ue.trigger_custom_session("ims").await.expect("trigger");

    let event = cu
        .wait_for_event(
            |e| matches!(e, MockCuEvent::PduSessionRejected { .. }),
            DEFAULT_TEST_TIMEOUT,
        )
        .await
        .expect("reject");
    assert_eq!(event, MockCuEvent::PduSessionRejected { psi: 2, cause: 27 });

    wait_until(|| ue.get_pdu_session(2).is_none())
        .await
        .expect("session 2 removed");
    assert!(ue.get_pdu_session(1).is_some());
    assert_eq!(ue.pdu_session_count(), 1);
}

/// UE-requested release ends with Release Complete and a free id
#[tokio::test]
async fn test_release_session() {
    init_test_logging();

    let (du, cu) = start_registered(TestConfig::new().build(), MockCuConfig::default())
        .await
        .expect("registration");
    wait_for_default_session(&cu).await;

    let ue = du.ue().expect("UE attached");
    wait_until(|| ue.get_pdu_session(1).is_some_and(|s| s.is_active()))
        .await
        .expect("session active");
    ue.trigger_release_session(1).await.expect("release");

    cu.wait_for_event(
        |e| *e == MockCuEvent::PduSessionReleased { psi: 1 },
        DEFAULT_TEST_TIMEOUT,
    )
    .await
    .expect("released");
    wait_until(|| ue.pdu_session_count() == 0)
        .await
        .expect("session freed");
    assert!(cu.sessions().is_empty());

    // Nothing left to release
    assert!(matches!(
        ue.trigger_release_session(1).await,
        Err(UeError::SessionNotFound(1))
    ));
}

/// UE-requested modification is answered by a Modification Command
#[tokio::test]
async fn test_modify_session() {
    init_test_logging();

    let (du, cu) = start_registered(TestConfig::new().build(), MockCuConfig::default())
        .await
        .expect("registration");
    wait_for_default_session(&cu).await;

    let ue = du.ue().expect("UE attached");
    wait_until(|| ue.get_pdu_session(1).is_some_and(|s| s.is_active()))
        .await
        .expect("session active");
    ue.trigger_modify_session(1).await.expect("modify");

    cu.wait_for_event(
        |e| *e == MockCuEvent::PduSessionModified { psi: 1 },
        DEFAULT_TEST_TIMEOUT,
    )
    .await
    .expect("modified");
    let session = ue.get_pdu_session(1).expect("session 1");
    assert_eq!(session.state, PduSessionState::Active);
}

/// Fifteen sessions fill the table; the sixteenth request fails locally
#[tokio::test]
async fn test_session_table_limit() {
    init_test_logging();

    let (du, cu) = start_registered(TestConfig::new().build(), MockCuConfig::default())
        .await
        .expect("registration");
    wait_for_default_session(&cu).await;

    let ue = du.ue().expect("UE attached");
    for _ in 2..=15 {
        ue.trigger_custom_session("internet").await.expect("trigger");
    }
    assert_eq!(ue.pdu_session_count(), 15);
    assert!(matches!(
        ue.trigger_custom_session("internet").await,
        Err(UeError::NoFreePduSessionId)
    ));

    wait_until(|| cu.sessions().len() == 15)
        .await
        .expect("all sessions established");
    wait_until(|| {
        (1..=15).all(|psi| ue.get_pdu_session(psi).is_some_and(|s| s.is_active()))
    })
    .await
    .expect("all sessions active");
}

/// Concurrent requests share out the free identities; the one that comes
/// up short fails locally
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sessions_get_distinct_ids() {
    init_test_logging();

    let (du, cu) = start_registered(TestConfig::new().build(), MockCuConfig::default())
        .await
        .expect("registration");
    wait_for_default_session(&cu).await;

    let ue = du.ue().expect("UE attached");
    let handles: Vec<_> = (0..15)
        .map(|_| {
            let ue = ue.clone();
            tokio::spawn(async move { ue.trigger_custom_session("internet").await })
        })
        .collect();

    let mut accepted = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.expect("join") {
            Ok(()) => accepted += 1,
            Err(UeError::NoFreePduSessionId) => refused += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(accepted, 14);
    assert_eq!(refused, 1);
    assert_eq!(ue.pdu_session_count(), 15);

    wait_until(|| cu.sessions().len() == 15)
        .await
        .expect("all sessions established");
    let mut psis = cu.sessions();
    psis.sort_unstable();
    assert_eq!(psis, (1..=15).collect::<Vec<u8>>());
}
