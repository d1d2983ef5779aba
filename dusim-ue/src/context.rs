//! UE context: identities, registration state and security state

use std::fmt;

use dusim_common::{Plmn, UeConfig, UeOpKey};
use dusim_crypto::{kdf, Milenage};
use dusim_nas::{
    CipheringAlgorithm, IntegrityAlgorithm, MobileIdentity, NasSecurityContext, Suci,
    UeSecurityCapability,
};
use tracing::info;

use crate::auth::AuthContext;
use crate::error::Result;

/// 5GMM registration state as seen by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RegistrationState {
    #[default]
    Deregistered,
    Registering,
    Registered,
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationState::Deregistered => write!(f, "DEREGISTERED"),
            RegistrationState::Registering => write!(f, "REGISTERING"),
            RegistrationState::Registered => write!(f, "REGISTERED"),
        }
    }
}

/// Everything the 5GMM layer of one UE owns.
#[derive(Debug)]
pub struct UeContext {
    pub msin: String,
    pub supi: String,
    pub plmn: Plmn,
    pub suci: Suci,
    pub security_capability: UeSecurityCapability,
    pub auth: AuthContext,
    pub security: NasSecurityContext,
    /// Registration Request as sent in RRC Setup Complete, replayed in
    /// Security Mode Complete when the network asks for it.
    pub pending_registration: Option<Vec<u8>>,
    pub guti: Option<MobileIdentity>,
    pub serving_network_name: String,
    registration_state: RegistrationState,
}

impl UeContext {
    pub fn new(config: &UeConfig) -> Result<Self> {
        let plmn = config.plmn()?;
        let supi = config.supi();
        let key = config.key_bytes()?;
        let milenage = match config.op_key()? {
            UeOpKey::Opc(opc) => Milenage::new(&key, &opc),
            UeOpKey::Op(op) => Milenage::new_with_op(&key, &op),
        };
        let serving_network_name = kdf::serving_network_name(plmn.mcc, plmn.mnc);
        let auth = AuthContext::new(
            milenage,
            config.amf_bytes()?,
            supi.clone(),
            serving_network_name.clone(),
        );

        Ok(Self {
            msin: config.msin.clone(),
            supi,
            suci: Suci::null_scheme(plmn, &config.msin)?,
            plmn,
            security_capability: default_security_capability(),
            auth,
            security: NasSecurityContext::new(),
            pending_registration: None,
            guti: None,
            serving_network_name,
            registration_state: RegistrationState::Deregistered,
        })
    }

    pub fn registration_state(&self) -> RegistrationState {
        self.registration_state
    }

    pub fn set_registration_state(&mut self, state: RegistrationState) {
        if self.registration_state != state {
            info!(
                "Registration state transition: {} -> {}",
                self.registration_state, state
            );
            self.registration_state = state;
        }
    }

    /// Drops the NAS security context and the key set it was built on.
    pub fn reset_security(&mut self) {
        self.security.reset();
        self.auth.reset();
    }
}

/// EA0/EA2 and IA0/IA2, the algorithms the UE can run.
pub fn default_security_capability() -> UeSecurityCapability {
    UeSecurityCapability::with_algorithms(
        &[CipheringAlgorithm::Nea0 as u8, CipheringAlgorithm::Nea2 as u8],
        &[IntegrityAlgorithm::Nia0 as u8, IntegrityAlgorithm::Nia2 as u8],
    )
}
