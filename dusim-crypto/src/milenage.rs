//! Milenage algorithm set (3GPP TS 35.206)
//!
//! - f1: network authentication (MAC-A)
//! - f1*: re-synchronisation authentication (MAC-S)
//! - f2: user authentication response (RES)
//! - f3: cipher key (CK)
//! - f4: integrity key (IK)
//! - f5: anonymity key (AK)
//! - f5*: re-synchronisation anonymity key (AK*)

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;

pub const KEY_SIZE: usize = 16;
pub const RAND_SIZE: usize = 16;
pub const SQN_SIZE: usize = 6;
pub const AMF_SIZE: usize = 2;
pub const MAC_SIZE: usize = 8;
pub const RES_SIZE: usize = 8;
pub const AK_SIZE: usize = 6;

const BLOCK_SIZE: usize = 16;

/// Rotation amounts r1..r5 in bits.
const R: [usize; 5] = [64, 0, 32, 64, 96];

/// Constant c_i is all zeros except the last byte.
const C_LAST: [u8; 5] = [0x00, 0x01, 0x02, 0x04, 0x08];

type Block = [u8; BLOCK_SIZE];

fn encrypt(cipher: &Aes128, block: &Block) -> Block {
    let mut b = GenericArray::clone_from_slice(block);
    cipher.encrypt_block(&mut b);
    let mut out = [0u8; BLOCK_SIZE];
    out.copy_from_slice(&b);
    out
}

fn xor(a: &Block, b: &Block) -> Block {
    let mut out = [0u8; BLOCK_SIZE];
    for (o, (x, y)) in out.iter_mut().zip(a.iter().zip(b.iter())) {
        *o = x ^ y;
    }
    out
}

fn rotate_left(block: &Block, bits: usize) -> Block {
    if bits % 128 == 0 {
        return *block;
    }
    let value = u128::from_be_bytes(*block).rotate_left(bits as u32);
    value.to_be_bytes()
}

/// Derives OPc = AES_K(OP) XOR OP.
pub fn compute_opc(k: &[u8; KEY_SIZE], op: &[u8; KEY_SIZE]) -> [u8; KEY_SIZE] {
    let cipher = Aes128::new(GenericArray::from_slice(k));
    xor(&encrypt(&cipher, op), op)
}

/// Milenage instance bound to a subscriber key K and operator key OPc.
#[derive(Clone)]
pub struct Milenage {
    cipher: Aes128,
    opc: Block,
}

impl std::fmt::Debug for Milenage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Milenage").finish_non_exhaustive()
    }
}

impl Milenage {
    pub fn new(k: &[u8; KEY_SIZE], opc: &[u8; KEY_SIZE]) -> Self {
        Self {
            cipher: Aes128::new(GenericArray::from_slice(k)),
            opc: *opc,
        }
    }

    pub fn new_with_op(k: &[u8; KEY_SIZE], op: &[u8; KEY_SIZE]) -> Self {
        Self::new(k, &compute_opc(k, op))
    }

    /// TEMP = E_K(RAND XOR OPc)
    fn temp(&self, rand: &[u8; RAND_SIZE]) -> Block {
        encrypt(&self.cipher, &xor(rand, &self.opc))
    }

    /// OUTi = E_K(rot(input XOR OPc, ri) XOR ci) XOR OPc, for i in 1..=5.
    fn out(&self, i: usize, input: &Block) -> Block {
        let mut block = rotate_left(&xor(input, &self.opc), R[i - 1]);
        block[BLOCK_SIZE - 1] ^= C_LAST[i - 1];
        xor(&encrypt(&self.cipher, &block), &self.opc)
    }

    fn out1(&self, rand: &[u8; RAND_SIZE], sqn: &[u8; SQN_SIZE], amf: &[u8; AMF_SIZE]) -> Block {
        let temp = self.temp(rand);
        let mut in1 = [0u8; BLOCK_SIZE];
        in1[0..6].copy_from_slice(sqn);
        in1[6..8].copy_from_slice(amf);
        in1[8..14].copy_from_slice(sqn);
        in1[14..16].copy_from_slice(amf);

        // OUT1 = E_K(TEMP XOR rot(IN1 XOR OPc, r1) XOR c1) XOR OPc
        let mut block = rotate_left(&xor(&in1, &self.opc), R[0]);
        block = xor(&block, &temp);
        block[BLOCK_SIZE - 1] ^= C_LAST[0];
        xor(&encrypt(&self.cipher, &block), &self.opc)
    }

    /// f1 and f1*: returns (MAC-A, MAC-S).
    pub fn f1(
        &self,
        rand: &[u8; RAND_SIZE],
        sqn: &[u8; SQN_SIZE],
        amf: &[u8; AMF_SIZE],
    ) -> ([u8; MAC_SIZE], [u8; MAC_SIZE]) {
        let out1 = self.out1(rand, sqn, amf);
        let mut mac_a = [0u8; MAC_SIZE];
        let mut mac_s = [0u8; MAC_SIZE];
        mac_a.copy_from_slice(&out1[..8]);
        mac_s.copy_from_slice(&out1[8..]);
        (mac_a, mac_s)
    }

    /// f2 and f5: returns (RES, AK).
    pub fn f2_f5(&self, rand: &[u8; RAND_SIZE]) -> ([u8; RES_SIZE], [u8; AK_SIZE]) {
        let out2 = self.out(2, &self.temp(rand));
        let mut res = [0u8; RES_SIZE];
        let mut ak = [0u8; AK_SIZE];
        res.copy_from_slice(&out2[8..16]);
        ak.copy_from_slice(&out2[0..6]);
        (res, ak)
    }

    /// f3: cipher key CK.
    pub fn f3(&self, rand: &[u8; RAND_SIZE]) -> [u8; KEY_SIZE] {
        self.out(3, &self.temp(rand))
    }

    /// f4: integrity key IK.
    pub fn f4(&self, rand: &[u8; RAND_SIZE]) -> [u8; KEY_SIZE] {
        self.out(4, &self.temp(rand))
    }

    /// f5*: anonymity key used in re-synchronisation.
    pub fn f5_star(&self, rand: &[u8; RAND_SIZE]) -> [u8; AK_SIZE] {
        let out5 = self.out(5, &self.temp(rand));
        let mut ak = [0u8; AK_SIZE];
        ak.copy_from_slice(&out5[0..6]);
        ak
    }
}
