//! Inter-DU handover integration tests
//!
//! Source side: a measurement report crossing the A3 threshold leads to UE
//! Context Modification Required, the CU's handover command and the UE's
//! RRC Reconfiguration Complete. Target side: UE Context Setup for an
//! incoming UE, the RACH exchange and Msg3.

use std::time::Duration;

use dusim_du::{ChannelTransport, Du, HandoverRole, HandoverState, RachState};
use dusim_rrc::{RandomAccessResponse, UlDcchMessage};
use integration_tests::{
    init_test_logging, start_registered, wait_until, HandoverResponse, MockCu, MockCuConfig,
    MockCuEvent, TestConfig, DEFAULT_TEST_TIMEOUT, SOURCE_PCI, TARGET_PCI,
};

/// Source DU: A3 report, CU confirm, UE reconfiguration, COMPLETED
#[tokio::test]
async fn test_source_handover_completes() {
    init_test_logging();

    let cu_config = MockCuConfig {
        handover: HandoverResponse::Confirm { new_c_rnti: 0x4601 },
        ..MockCuConfig::default()
    };
    let (du, cu) = start_registered(TestConfig::new().build(), cu_config)
        .await
        .expect("registration");
    let ue = du.ue().expect("UE attached");

    ue.trigger_measurement().await.expect("measurement");

    let event = cu
        .wait_for_event(
            |e| matches!(e, MockCuEvent::HandoverRequired { .. }),
            DEFAULT_TEST_TIMEOUT,
        )
        .await
        .expect("Modification Required");
    assert_eq!(
        event,
        MockCuEvent::HandoverRequired {
            target_pci: TARGET_PCI
        }
    );
    // The report itself still reaches the CU
    cu.wait_for_event(|e| *e == MockCuEvent::MeasurementReport, DEFAULT_TEST_TIMEOUT)
        .await
        .expect("report forwarded");

    cu.wait_for_event(
        |e| matches!(e, MockCuEvent::RrcReconfigurationComplete { .. }),
        DEFAULT_TEST_TIMEOUT,
    )
    .await
    .expect("reconfiguration complete");
    wait_until(|| du.handover().state == HandoverState::Completed)
        .await
        .expect("handover completed");

    let ho = du.handover();
    assert_eq!(ho.role, HandoverRole::Source);
    assert_eq!(ho.target_cell_pci, Some(TARGET_PCI));

    let rrc = ue.rrc_context();
    assert_eq!(rrc.c_rnti, Some(0x4601));
    assert_eq!(rrc.serving_pci, Some(TARGET_PCI));
}

/// Target DU: setup for an incoming UE, RAR, Msg3
#[tokio::test]
async fn test_target_handover_completes() {
    init_test_logging();

    let config = TestConfig::new().with_du(2, TARGET_PCI).build();
    let (transport, endpoint) = ChannelTransport::pair();
    let cu = MockCu::with_defaults(endpoint);
    let du = Du::with_transport(config, transport).expect("du");
    // The target cell has no UE of its own; the test plays the incoming one
    let mut channels = du.take_ue_channels().expect("channels");
    du.start().await.expect("start");
    cu.wait_for_event(
        |e| matches!(e, MockCuEvent::F1SetupReceived { .. }),
        DEFAULT_TEST_TIMEOUT,
    )
    .await
    .expect("F1 Setup");

    cu.send_ue_context_setup_request(true)
        .await
        .expect("setup request");
    let event = cu
        .wait_for_event(
            |e| matches!(e, MockCuEvent::UeContextSetupResponse { .. }),
            DEFAULT_TEST_TIMEOUT,
        )
        .await
        .expect("setup response");
    let MockCuEvent::UeContextSetupResponse { c_rnti: Some(c_rnti) } = event else {
        panic!("response without C-RNTI: {event:?}");
    };

    let ho = du.handover();
    assert_eq!(ho.role, HandoverRole::Target);
    assert_eq!(ho.state, HandoverState::Execution);
    assert_eq!(ho.new_c_rnti, Some(c_rnti));
    assert_eq!(ho.gnb_cu_ue_f1ap_id, Some(100));

    du.simulate_rach_reception().await.expect("RACH");
    let rar = tokio::time::timeout(Duration::from_secs(1), channels.downlink.recv())
        .await
        .expect("timeout")
        .expect("RAR");
    let rar = RandomAccessResponse::decode(&rar).expect("decode RAR");
    assert_eq!(rar.temporary_c_rnti, c_rnti);
    assert_eq!(du.rach().map(|r| r.state), Some(RachState::RarSent));

    channels
        .uplink
        .send(
            UlDcchMessage::RrcReconfigurationComplete { transaction_id: 1 }
                .encode()
                .expect("encode"),
        )
        .await
        .expect("Msg3");
    wait_until(|| du.handover().state == HandoverState::Completed)
        .await
        .expect("target completed");
    assert!(du.handover().rach_completed);
    assert_eq!(du.rach().map(|r| r.state), Some(RachState::Completed));

    // Msg3 rides UL RRC Message Transfer: the CU set the context up
    cu.wait_for_event(
        |e| *e == MockCuEvent::RrcReconfigurationComplete { transaction_id: 1 },
        DEFAULT_TEST_TIMEOUT,
    )
    .await
    .expect("Msg3 forwarded");
    assert!(!cu
        .events()
        .iter()
        .any(|e| matches!(e, MockCuEvent::InitialUlRrcMessage { .. })));
}

/// No answer from the CU: the supervision window fails the handover
#[tokio::test]
async fn test_handover_window_expires() {
    init_test_logging();

    let config = TestConfig::new().with_handover_timeout_ms(100).build();
    let cu_config = MockCuConfig {
        handover: HandoverResponse::Ignore,
        ..MockCuConfig::default()
    };
    let (du, cu) = start_registered(config, cu_config)
        .await
        .expect("registration");

    du.ue()
        .expect("UE attached")
        .trigger_measurement()
        .await
        .expect("measurement");
    cu.wait_for_event(
        |e| matches!(e, MockCuEvent::HandoverRequired { .. }),
        DEFAULT_TEST_TIMEOUT,
    )
    .await
    .expect("Modification Required");

    wait_until(|| du.handover().state == HandoverState::Failed)
        .await
        .expect("handover failed");
    assert_eq!(du.handover().role, HandoverRole::Source);
}

/// A refused handover fails on the source
#[tokio::test]
async fn test_handover_refused() {
    init_test_logging();

    let cu_config = MockCuConfig {
        handover: HandoverResponse::Refuse,
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
    wait_until(|| du.handover().state == HandoverState::Failed)
        .await
        .expect("handover failed");
    assert!(cu
        .events()
        .iter()
        .any(|e| matches!(e, MockCuEvent::HandoverRequired { .. })));
}

/// A neighbor 5 dB better does not cross a 6 dB offset
#[tokio::test]
async fn test_report_below_offset_keeps_idle() {
    init_test_logging();

    let config = TestConfig::new().with_a3_offset_db(6).build();
    let (du, cu) = start_registered(config, MockCuConfig::default())
        .await
        .expect("registration");

    du.ue()
        .expect("UE attached")
        .trigger_measurement()
        .await
        .expect("measurement");
    cu.wait_for_event(|e| *e == MockCuEvent::MeasurementReport, DEFAULT_TEST_TIMEOUT)
        .await
        .expect("report forwarded");

    assert!(du.handover().is_idle());
    assert!(!cu
        .events()
        .iter()
        .any(|e| matches!(e, MockCuEvent::HandoverRequired { .. })));
    assert_eq!(du.config().du.cell.pci, SOURCE_PCI);
}

