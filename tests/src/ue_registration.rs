//! UE registration integration tests
//!
//! RRC connection setup through the DU, 5G-AKA, NAS security mode control
//! and registration against the mock CU/AMF.

use dusim_nas::NasKeySetIdentifier;
use dusim_ue::{RegistrationState, RrcState};
use integration_tests::{
    init_test_logging, start_du, start_registered, test_subscriber, wait_until, MockCuConfig,
    MockCuEvent, TestConfig, DEFAULT_TEST_TIMEOUT,
};

/// The first RRC message of the UE opens its F1 context
#[tokio::test]
async fn test_initial_access_uses_initial_ul_transfer() {
    init_test_logging();

    let (du, cu) = start_du(TestConfig::new().build(), MockCuConfig::default())
        .await
        .expect("start DU");

    let event = cu
        .wait_for_event(
            |e| matches!(e, MockCuEvent::InitialUlRrcMessage { .. }),
            DEFAULT_TEST_TIMEOUT,
        )
        .await
        .expect("Initial UL RRC Message Transfer");
    assert_eq!(
        event,
        MockCuEvent::InitialUlRrcMessage {
            gnb_du_ue_f1ap_id: 0,
            c_rnti: 1
        }
    );

    // The CU's id is learned from the RRC Setup transfer
    wait_until(|| du.ue_f1ap_ids().gnb_cu_ue_f1ap_id == Some(100))
        .await
        .expect("CU UE F1AP id");

    let initial_count = cu
        .events()
        .iter()
        .filter(|e| matches!(e, MockCuEvent::InitialUlRrcMessage { .. }))
        .count();
    assert_eq!(initial_count, 1);
}

/// Full registration: authentication, security mode and accept
#[tokio::test]
async fn test_full_registration() {
    init_test_logging();

    let (du, cu) = start_registered(TestConfig::new().build(), MockCuConfig::default())
        .await
        .expect("registration");

    let ue = du.ue().expect("UE attached");
    assert_eq!(ue.registration_state(), RegistrationState::Registered);
    assert_eq!(ue.supi(), "imsi-208930000000001");
    assert!(ue.is_security_active());
    assert_eq!(ue.rrc_context().state, RrcState::Connected);
    assert!(cu.is_registered());

    let events = cu.events();
    assert!(events.contains(&MockCuEvent::AuthenticationCompleted));
    // The mock asks for the initial message to be replayed
    assert!(events.contains(&MockCuEvent::SecurityModeCompleted {
        retransmitted_request: true
    }));
    assert!(events.contains(&MockCuEvent::RegistrationCompleted {
        supi: "imsi-208930000000001".to_string()
    }));
}

/// A Security Mode Command with an unknown ngKSI leaves the UE
/// deregistered and unanswered
#[tokio::test]
async fn test_security_mode_command_ksi_mismatch() {
    init_test_logging();

    let cu_config = MockCuConfig {
        smc_ng_ksi: Some(NasKeySetIdentifier::new(false, 2)),
        ..MockCuConfig::default()
    };
    let (du, cu) = start_du(TestConfig::new().build(), cu_config)
        .await
        .expect("start DU");

    cu.wait_for_event(
        |e| matches!(e, MockCuEvent::SecurityModeCommandSent { .. }),
        DEFAULT_TEST_TIMEOUT,
    )
    .await
    .expect("Security Mode Command");
    wait_until(|| {
        du.ue()
            .is_some_and(|ue| ue.registration_state() == RegistrationState::Deregistered)
    })
    .await
    .expect("UE deregistered");

    let ue = du.ue().expect("UE attached");
    assert!(!ue.is_security_active());
    assert!(!cu.is_registered());
    assert!(!cu
        .events()
        .iter()
        .any(|e| matches!(e, MockCuEvent::SecurityModeCompleted { .. })));
}

/// A network that does not share the UE's key fails AUTN verification
#[tokio::test]
async fn test_authentication_mac_failure() {
    init_test_logging();

    let mut subscriber = test_subscriber();
    subscriber.key = "000102030405060708090a0b0c0d0e0f".to_string();
    let cu_config = MockCuConfig {
        subscriber,
        ..MockCuConfig::default()
    };
    let (du, cu) = start_du(TestConfig::new().build(), cu_config)
        .await
        .expect("start DU");

    let event = cu
        .wait_for_event(
            |e| matches!(e, MockCuEvent::AuthenticationFailure { .. }),
            DEFAULT_TEST_TIMEOUT,
        )
        .await
        .expect("Authentication Failure");
    // MAC failure (TS 24.501 Table 9.11.3.2.1)
    assert_eq!(event, MockCuEvent::AuthenticationFailure { cause: 20 });

    wait_until(|| du.ue().is_some()).await.expect("UE attached");
    let ue = du.ue().expect("UE attached");
    assert!(!ue.is_security_active());
    assert!(!cu.is_registered());
}
