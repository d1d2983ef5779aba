//! 5G-AKA on the UE side (TS 33.501 Section 6.1.3.2)
//!
//! The UE checks the network's AUTN with Milenage, enforces SQN freshness
//! and derives the key chain down to KAMF:
//!
//! ```text
//! RAND ──f2..f5──> RES, CK, IK, AK
//! AUTN = SQN⊕AK || AMF || MAC-A
//! CK||IK ──> KAUSF ──> KSEAF ──> KAMF
//! ```

use dusim_crypto::kdf::{self, KEY_256_SIZE};
use dusim_crypto::milenage::{AK_SIZE, AMF_SIZE, MAC_SIZE, RAND_SIZE, SQN_SIZE};
use dusim_crypto::Milenage;
use dusim_nas::{NasKeySetIdentifier, NasKeys, NasSecurityContext};
use std::fmt;

/// Largest representable sequence number (48 bits)
pub const SQN_MAX: u64 = 0xFFFF_FFFF_FFFF;
/// Width of the IND field in the low bits of SQN
pub const SQN_IND_BITS: u32 = 5;
/// Length of AUTN
pub const AUTN_SIZE: usize = SQN_SIZE + AMF_SIZE + MAC_SIZE;
/// Length of AUTS
pub const AUTS_SIZE: usize = SQN_SIZE + MAC_SIZE;

/// 48-bit authentication sequence number (TS 33.102 Annex C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Sqn(u64);

impl Sqn {
    pub fn new(value: u64) -> Self {
        Self(value & SQN_MAX)
    }

    pub fn from_bytes(bytes: [u8; SQN_SIZE]) -> Self {
        let mut wide = [0u8; 8];
        wide[2..].copy_from_slice(&bytes);
        Self(u64::from_be_bytes(wide))
    }

    pub fn to_bytes(self) -> [u8; SQN_SIZE] {
        let wide = self.0.to_be_bytes();
        let mut bytes = [0u8; SQN_SIZE];
        bytes.copy_from_slice(&wide[2..]);
        bytes
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// Index part (low 5 bits).
    pub fn ind(self) -> u8 {
        (self.0 & ((1 << SQN_IND_BITS) - 1)) as u8
    }

    /// Sequence part (everything above IND).
    pub fn seq(self) -> u64 {
        self.0 >> SQN_IND_BITS
    }
}

impl fmt::Display for Sqn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:012X}", self.0)
    }
}

/// Result of checking an Authentication Request.
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    /// AUTN verified; RES* and a fresh, not yet active security context.
    Success {
        res_star: [u8; 16],
        security_context: NasSecurityContext,
    },
    /// MAC-A in AUTN does not match
    MacFailure,
    /// Network SQN is behind the UE; AUTS lets the network resynchronise.
    SyncFailure { auts: [u8; AUTS_SIZE] },
}

/// Per-UE authentication state.
#[derive(Debug)]
pub struct AuthContext {
    milenage: Milenage,
    amf: [u8; AMF_SIZE],
    sqn: Sqn,
    supi: String,
    serving_network_name: String,
    rand: Option<[u8; RAND_SIZE]>,
    ng_ksi: NasKeySetIdentifier,
    abba: Vec<u8>,
    kamf: Option<[u8; KEY_256_SIZE]>,
}

impl AuthContext {
    pub fn new(
        milenage: Milenage,
        amf: [u8; AMF_SIZE],
        supi: impl Into<String>,
        serving_network_name: impl Into<String>,
    ) -> Self {
        Self {
            milenage,
            amf,
            sqn: Sqn::default(),
            supi: supi.into(),
            serving_network_name: serving_network_name.into(),
            rand: None,
            ng_ksi: NasKeySetIdentifier::no_key(),
            abba: Vec::new(),
            kamf: None,
        }
    }

    pub fn sqn(&self) -> Sqn {
        self.sqn
    }

    /// Overrides the stored SQN (explicit resynchronisation only).
    pub fn set_sqn(&mut self, sqn: Sqn) {
        self.sqn = sqn;
    }

    pub fn amf(&self) -> [u8; AMF_SIZE] {
        self.amf
    }

    pub fn ng_ksi(&self) -> NasKeySetIdentifier {
        self.ng_ksi
    }

    pub fn set_ng_ksi(&mut self, ng_ksi: NasKeySetIdentifier) {
        self.ng_ksi = ng_ksi;
    }

    pub fn rand(&self) -> Option<[u8; RAND_SIZE]> {
        self.rand
    }

    pub fn abba(&self) -> &[u8] {
        &self.abba
    }

    pub fn kamf(&self) -> Option<[u8; KEY_256_SIZE]> {
        self.kamf
    }

    pub fn serving_network_name(&self) -> &str {
        &self.serving_network_name
    }

    /// SUPI value used as the KAMF input: the digits after `imsi-`.
    fn supi_digits(&self) -> &str {
        self.supi.strip_prefix("imsi-").unwrap_or(&self.supi)
    }

    /// Forgets the key set, keeping SQN.
    pub fn reset(&mut self) {
        self.ng_ksi = NasKeySetIdentifier::no_key();
        self.rand = None;
        self.abba.clear();
        if let Some(kamf) = self.kamf.as_mut() {
            kamf.fill(0);
        }
        self.kamf = None;
    }

    /// Verifies AUTN for `rand` and, on success, derives RES* and KAMF.
    ///
    /// Nothing is mutated on a MAC or sync failure.
    pub fn process_authentication_info(
        &mut self,
        rand: &[u8; RAND_SIZE],
        autn: &[u8; AUTN_SIZE],
        abba: &[u8],
    ) -> AuthOutcome {
        let (res, ak) = self.milenage.f2_f5(rand);
        let ck = self.milenage.f3(rand);
        let ik = self.milenage.f4(rand);

        let mut sqn_xor_ak = [0u8; SQN_SIZE];
        sqn_xor_ak.copy_from_slice(&autn[..SQN_SIZE]);
        let mac = &autn[SQN_SIZE + AMF_SIZE..];

        // MAC-A is checked against the provisioned AMF, not the one in AUTN
        let sqn_net = Sqn::from_bytes(xor_ak(&sqn_xor_ak, &ak));
        let (mac_a, _) = self.milenage.f1(rand, &sqn_net.to_bytes(), &self.amf);
        if mac_a[..] != mac[..] {
            return AuthOutcome::MacFailure;
        }

        if self.sqn > sqn_net {
            return AuthOutcome::SyncFailure {
                auts: self.compute_auts(rand),
            };
        }

        self.sqn = sqn_net;
        self.rand = Some(*rand);
        self.abba = abba.to_vec();

        let snn = kdf::encode_kdf_string(&self.serving_network_name);
        let kausf = kdf::derive_kausf(&ck, &ik, &snn, &sqn_xor_ak);
        let kseaf = kdf::derive_kseaf(&kausf, &snn);
        let kamf = kdf::derive_kamf(&kseaf, self.supi_digits().as_bytes(), abba);
        let res_star = kdf::derive_res_star(&ck, &ik, &snn, rand, &res);
        self.kamf = Some(kamf);

        let keys = NasKeys {
            kausf: Some(kausf),
            kseaf: Some(kseaf),
            kamf: Some(kamf),
            ..NasKeys::default()
        };
        AuthOutcome::Success {
            res_star,
            security_context: NasSecurityContext::from_kamf(self.ng_ksi, keys),
        }
    }

    /// AUTS = (SQN_UE ⊕ f5*(RAND)) || f1*(RAND, SQN_UE, 0x0000)
    fn compute_auts(&self, rand: &[u8; RAND_SIZE]) -> [u8; AUTS_SIZE] {
        let sqn_ue = self.sqn.to_bytes();
        let ak_star = self.milenage.f5_star(rand);
        let (_, mac_s) = self.milenage.f1(rand, &sqn_ue, &[0, 0]);

        let mut auts = [0u8; AUTS_SIZE];
        auts[..SQN_SIZE].copy_from_slice(&xor_ak(&sqn_ue, &ak_star));
        auts[SQN_SIZE..].copy_from_slice(&mac_s);
        auts
    }
}

fn xor_ak(sqn: &[u8; SQN_SIZE], ak: &[u8; AK_SIZE]) -> [u8; SQN_SIZE] {
    let mut out = [0u8; SQN_SIZE];
    for (o, (s, a)) in out.iter_mut().zip(sqn.iter().zip(ak)) {
        *o = s ^ a;
    }
    out
}
