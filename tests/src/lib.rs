//! Integration test framework for dusim
//!
//! Runs a [`Du`](dusim_du::Du) and its UE against a mock CU over an
//! in-memory F1 transport.
//!
//! # Components
//!
//! - [`mock_cu`] - Mock gNB-CU with an embedded AMF/SMF
//! - [`test_fixtures`] - Configuration builders and the test subscriber
//! - [`test_utils`] - Logging and polling helpers
//!
//! # Test Categories
//!
//! 1. **UE Registration** - RRC setup, 5G-AKA, NAS security, registration
//! 2. **PDU Sessions** - establishment, rejection, modification, release
//! 3. **Handover** - A3 decision, source and target DU state machines
//! 4. **DU Lifecycle** - F1 setup outcomes, link loss, UE context release

pub mod mock_cu;
pub mod test_fixtures;
pub mod test_utils;

use dusim_common::SimConfig;
use dusim_du::{ChannelTransport, Du};

pub use mock_cu::{HandoverResponse, MockCu, MockCuConfig, MockCuError, MockCuEvent};
pub use test_fixtures::{test_subscriber, TestConfig, SOURCE_PCI, TARGET_PCI};
pub use test_utils::{
    init_test_logging, wait_for_condition, wait_until, TestResult, DEFAULT_POLL_INTERVAL,
    DEFAULT_TEST_TIMEOUT,
};

/// Starts a DU wired to a mock CU. The UE comes up on its own once F1
/// Setup succeeds.
pub async fn start_du(config: SimConfig, cu_config: MockCuConfig) -> TestResult<(Du, MockCu)> {
    let (transport, endpoint) = ChannelTransport::pair();
    let cu = MockCu::start(endpoint, cu_config);
    let du = Du::with_transport(config, transport)?;
    du.start().await?;
    Ok((du, cu))
}

/// [`start_du`], then waits for the UE to finish registration.
pub async fn start_registered(
    config: SimConfig,
    cu_config: MockCuConfig,
) -> TestResult<(Du, MockCu)> {
    let (du, cu) = start_du(config, cu_config).await?;
    cu.wait_for_event(
        |e| matches!(e, MockCuEvent::RegistrationCompleted { .. }),
        DEFAULT_TEST_TIMEOUT,
    )
    .await?;
    wait_until(|| {
        du.ue()
            .is_some_and(|ue| ue.registration_state() == dusim_ue::RegistrationState::Registered)
    })
    .await?;
    Ok((du, cu))
}
