//! DU lifecycle integration tests
//!
//! F1 Setup outcomes, loss of the F1 link, UE context procedures that are
//! not part of a handover, and stop.

use dusim_du::{DuState, HandoverRole, HandoverState};
use dusim_ue::RrcState;
use integration_tests::{
    init_test_logging, start_du, start_registered, wait_until, HandoverResponse, MockCuConfig,
    MockCuEvent, TestConfig, DEFAULT_TEST_TIMEOUT, SOURCE_PCI,
};

/// F1 Setup Response activates the cell and brings the UE up
#[tokio::test]
async fn test_f1_setup_activates_du() {
    init_test_logging();

    let (du, cu) = start_du(TestConfig::new().build(), MockCuConfig::default())
        .await
        .expect("start DU");

    let event = cu
        .wait_for_event(
            |e| matches!(e, MockCuEvent::F1SetupReceived { .. }),
            DEFAULT_TEST_TIMEOUT,
        )
        .await
        .expect("F1 Setup Request");
    assert_eq!(
        event,
        MockCuEvent::F1SetupReceived {
            gnb_du_id: 1,
            nr_pci: SOURCE_PCI
        }
    );

    wait_until(|| du.ue().is_some()).await.expect("UE attached");
    assert_eq!(du.state(), DuState::Active);
    assert_eq!(du.ue().expect("UE").rrc_context().state, RrcState::Connected);
}

/// F1 Setup Failure leaves the DU inactive without a UE
#[tokio::test]
async fn test_f1_setup_failure() {
    init_test_logging();

    let cu_config = MockCuConfig {
        accept_f1_setup: false,
        ..MockCuConfig::default()
    };
    let (du, cu) = start_du(TestConfig::new().build(), cu_config)
        .await
        .expect("start DU");

    cu.wait_for_event(
        |e| matches!(e, MockCuEvent::F1SetupReceived { .. }),
        DEFAULT_TEST_TIMEOUT,
    )
    .await
    .expect("F1 Setup Request");
    wait_until(|| du.state() == DuState::Inactive)
        .await
        .expect("DU inactive");

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(du.ue().is_none());
    assert!(!cu
        .events()
        .iter()
        .any(|e| matches!(e, MockCuEvent::InitialUlRrcMessage { .. })));
}

/// The DU notices the CU going away
#[tokio::test]
async fn test_link_loss() {
    init_test_logging();

    let (du, cu) = start_registered(TestConfig::new().build(), MockCuConfig::default())
        .await
        .expect("registration");
    drop(cu);

    wait_until(|| du.state() == DuState::Lost)
        .await
        .expect("link lost");
    // A lost DU has to be stopped before it can start again
    assert!(du.start().await.is_err());
    du.stop().await;
    assert_eq!(du.state(), DuState::Inactive);
    assert!(du.ue().is_none());
}

/// UE Context Release with RRC Release ends the connection
#[tokio::test]
async fn test_ue_context_release() {
    init_test_logging();

    let (du, cu) = start_registered(TestConfig::new().build(), MockCuConfig::default())
        .await
        .expect("registration");
    let ue = du.ue().expect("UE attached");

    cu.send_ue_context_release(true).await.expect("release");
    cu.wait_for_event(
        |e| *e == MockCuEvent::UeContextReleaseComplete,
        DEFAULT_TEST_TIMEOUT,
    )
    .await
    .expect("Release Complete");
    wait_until(|| ue.rrc_context().state == RrcState::Idle)
        .await
        .expect("RRC idle");
    assert!(du.handover().is_idle());
}

/// A release during handover preparation resets the context
#[tokio::test]
async fn test_release_aborts_handover() {
    init_test_logging();

    let cu_config = MockCuConfig {
        handover: HandoverResponse::Ignore,
        ..MockCuConfig::default()
    };
    let (du, cu) = start_registered(TestConfig::new().build(), cu_config)
        .await
        .expect("registration");

    du.ue()
        .expect("UE attached")
        .trigger_measurement()
        .await
        .expect("measurement");
    wait_until(|| du.handover().state == HandoverState::Preparation)
        .await
        .expect("preparation");

    cu.send_ue_context_release(false).await.expect("release");
    cu.wait_for_event(
        |e| *e == MockCuEvent::UeContextReleaseComplete,
        DEFAULT_TEST_TIMEOUT,
    )
    .await
    .expect("Release Complete");

    let ho = du.handover();
    assert_eq!(ho.role, HandoverRole::None);
    assert_eq!(ho.state, HandoverState::Idle);
    assert!(ho.target_cell_pci.is_none());
}

/// A plain UE Context Setup is answered with the UE's current C-RNTI
#[tokio::test]
async fn test_ue_context_setup_outside_handover() {
    init_test_logging();

    let (du, cu) = start_registered(TestConfig::new().build(), MockCuConfig::default())
        .await
        .expect("registration");

    cu.send_ue_context_setup_request(false)
        .await
        .expect("setup request");
    let event = cu
        .wait_for_event(
            |e| matches!(e, MockCuEvent::UeContextSetupResponse { .. }),
            DEFAULT_TEST_TIMEOUT,
        )
        .await
        .expect("setup response");
    assert_eq!(
        event,
        MockCuEvent::UeContextSetupResponse {
            c_rnti: Some(du.ue_f1ap_ids().c_rnti)
        }
    );
    assert!(du.handover().is_idle());
}

/// Stop tears the UE down
#[tokio::test]
async fn test_stop() {
    init_test_logging();

    let (du, _cu) = start_registered(TestConfig::new().build(), MockCuConfig::default())
        .await
        .expect("registration");
    assert!(du.ue().is_some());

    du.stop().await;
    assert_eq!(du.state(), DuState::Inactive);
    assert!(du.ue().is_none());
    assert!(du.handover().is_idle());
}
