/*!
DES block cipher.

This module provides the 64-bit Feistel cipher used for all chat traffic:
the key schedule, the single-block transform and buffer-level encryption
with whole-block padding. Blocks are processed independently; there is no
chaining and no integrity tag.
*/

use std::fmt;

use rand::Rng;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::core::{
    constants::sizes::{BLOCK_SIZE, KEY_SIZE, ROUNDS, SUBKEY_SIZE},
    error::{CipherError, Error, Result},
};
use crate::cipher_err;

use super::bits::{pack, permute, unpack, xor_in_place};
use super::tables::{E, IP, IP_INV, P, PC1_C, PC1_D, PC2, S, SHIFTS};

/// An 8-byte symmetric key, wiped on drop
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    /// Wrap raw key bytes
    pub fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Build a key from a slice that must be exactly 8 bytes long
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            Error::InvalidKey(format!("expected {} key bytes, got {}", KEY_SIZE, bytes.len()))
        })?;
        Ok(Self(bytes))
    }

    /// Draw a uniformly random key from the thread RNG
    pub fn random() -> Self {
        Self::random_with(&mut rand::rng())
    }

    /// Draw a uniformly random key from `rng`
    pub fn random_with<R: Rng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rng.fill(&mut bytes);
        Self(bytes)
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// DES engine keyed with one [`SymmetricKey`]
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct BlockCipher {
    key: SymmetricKey,
    subkeys: [[u8; SUBKEY_SIZE]; ROUNDS],
}

impl BlockCipher {
    /// Create a cipher and derive its round subkeys
    pub fn new(key: SymmetricKey) -> Self {
        let subkeys = derive_subkeys(&key);
        Self { key, subkeys }
    }

    /// Replace the key and recompute the subkeys
    pub fn set_key(&mut self, key: SymmetricKey) {
        self.subkeys = derive_subkeys(&key);
        self.key = key;
    }

    /// The installed key
    pub fn key(&self) -> &SymmetricKey {
        &self.key
    }

    /// Round subkeys, 48 bits each, in encryption order
    pub fn subkeys(&self) -> &[[u8; SUBKEY_SIZE]; ROUNDS] {
        &self.subkeys
    }

    /// Encrypt a single block
    pub fn encrypt_block(&self, block: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
        self.transform(block, true)
    }

    /// Decrypt a single block
    pub fn decrypt_block(&self, block: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
        self.transform(block, false)
    }

    /// Pad and encrypt a whole buffer.
    ///
    /// The pad is `8 - len % 8` bytes, each holding the pad length, so an
    /// aligned input gains a full block. Output length is
    /// `8 * ceil((len + 1) / 8)`.
    pub fn encrypt_buffer(&self, plaintext: &[u8]) -> Vec<u8> {
        let padding = BLOCK_SIZE - plaintext.len() % BLOCK_SIZE;
        let mut buffer = Vec::with_capacity(plaintext.len() + padding);
        buffer.extend_from_slice(plaintext);
        buffer.resize(plaintext.len() + padding, padding as u8);

        for chunk in buffer.chunks_exact_mut(BLOCK_SIZE) {
            let mut block = [0u8; BLOCK_SIZE];
            block.copy_from_slice(chunk);
            chunk.copy_from_slice(&self.encrypt_block(&block));
        }
        buffer
    }

    /// Decrypt a whole buffer and strip its padding.
    ///
    /// Fails when the length is not a positive multiple of 8 or when the
    /// recovered pad count is outside 1..=8.
    pub fn decrypt_buffer(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
            return cipher_err!(CipherError::InvalidLength(ciphertext.len()));
        }

        let mut buffer = Vec::with_capacity(ciphertext.len());
        for chunk in ciphertext.chunks_exact(BLOCK_SIZE) {
            let mut block = [0u8; BLOCK_SIZE];
            block.copy_from_slice(chunk);
            buffer.extend_from_slice(&self.decrypt_block(&block));
        }

        let padding = buffer[buffer.len() - 1];
        if padding == 0 || usize::from(padding) > BLOCK_SIZE {
            buffer.zeroize();
            return cipher_err!(CipherError::InvalidPadding(padding));
        }
        buffer.truncate(buffer.len() - usize::from(padding));
        Ok(buffer)
    }

    fn transform(&self, block: &[u8; BLOCK_SIZE], encrypt: bool) -> [u8; BLOCK_SIZE] {
        let mut bits = [0u8; 64];
        unpack(block, &mut bits);
        let permuted = permute(&bits, &IP);

        let mut left = [0u8; 32];
        let mut right = [0u8; 32];
        left.copy_from_slice(&permuted[..32]);
        right.copy_from_slice(&permuted[32..]);

        for round in 0..ROUNDS {
            let subkey = if encrypt {
                &self.subkeys[round]
            } else {
                &self.subkeys[ROUNDS - 1 - round]
            };
            let mut next = feistel(&right, subkey);
            xor_in_place(&mut next, &left);
            left = right;
            right = next;
        }

        // The last round's swap is undone: pre-output is R16 || L16.
        let mut preoutput = [0u8; 64];
        preoutput[..32].copy_from_slice(&right);
        preoutput[32..].copy_from_slice(&left);

        let mut out = [0u8; BLOCK_SIZE];
        pack(&permute(&preoutput, &IP_INV), &mut out);
        out
    }
}

impl fmt::Debug for BlockCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockCipher").finish_non_exhaustive()
    }
}

/// Key schedule: PC1 into C and D, rotate per round, PC2 out of C || D.
fn derive_subkeys(key: &SymmetricKey) -> [[u8; SUBKEY_SIZE]; ROUNDS] {
    let mut key_bits = [0u8; 64];
    unpack(key.as_bytes(), &mut key_bits);

    let mut c = permute(&key_bits, &PC1_C);
    let mut d = permute(&key_bits, &PC1_D);
    let mut subkeys = [[0u8; SUBKEY_SIZE]; ROUNDS];
    let mut cd = [0u8; 56];

    for (subkey, &shift) in subkeys.iter_mut().zip(SHIFTS.iter()) {
        c.rotate_left(usize::from(shift));
        d.rotate_left(usize::from(shift));
        cd[..28].copy_from_slice(&c);
        cd[28..].copy_from_slice(&d);
        pack(&permute(&cd, &PC2), subkey);
    }

    key_bits.zeroize();
    c.zeroize();
    d.zeroize();
    cd.zeroize();
    subkeys
}

/// Round function F(R, K) = P(S(E(R) xor K)).
fn feistel(right: &[u8; 32], subkey: &[u8; SUBKEY_SIZE]) -> [u8; 32] {
    let mut expanded = permute(right, &E);
    let mut key_bits = [0u8; 48];
    unpack(subkey, &mut key_bits);
    xor_in_place(&mut expanded, &key_bits);

    let mut substituted = [0u8; 32];
    for (sbox, (group, out)) in S
        .iter()
        .zip(expanded.chunks_exact(6).zip(substituted.chunks_exact_mut(4)))
    {
        let row = usize::from((group[0] << 1) | group[5]);
        let column = usize::from((group[1] << 3) | (group[2] << 2) | (group[3] << 1) | group[4]);
        let value = sbox[row][column];
        for (j, bit) in out.iter_mut().enumerate() {
            *bit = (value >> (3 - j)) & 0x01;
        }
    }

    permute(&substituted, &P)
}
