/*!
RSA key pair engine.

A key pair is two ~32-bit primes, so the modulus fits in a `u64`. The public
half travels to the peer as two native-endian 64-bit integers; the private
exponent never leaves this process and is wiped on drop.
*/

use std::fmt;

use byteorder::{ByteOrder, NativeEndian};
use rand::Rng;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::core::{
    constants::{
        keygen::{MILLER_RABIN_ROUNDS, PRIME_MAX, PRIME_MIN, PUBLIC_EXPONENT_START},
        sizes::{PUBLIC_KEY_RECORD, WIRE_INT_SIZE},
    },
    error::{Error, KeyGenerationFailure, Result},
};
use crate::keygen_err;

use super::arith::{is_probable_prime_with, mod_exp, mod_inverse};

/// Encrypt `plaintext` under the public key `(e, n)`
pub fn encrypt(plaintext: u32, e: u64, n: u64) -> u64 {
    mod_exp(u64::from(plaintext), e, n)
}

/// Public half of a key pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey {
    exponent: u64,
    modulus: u64,
}

impl PublicKey {
    /// Build a public key from a received exponent and modulus.
    ///
    /// The modulus must exceed 255 so that every key byte survives the
    /// round trip.
    pub fn new(exponent: u64, modulus: u64) -> Result<Self> {
        if modulus <= u64::from(u8::MAX) {
            return Err(Error::InvalidKey(format!("modulus {} is too small", modulus)));
        }
        if exponent < 3 || exponent >= modulus {
            return Err(Error::InvalidKey(format!("exponent {} out of range", exponent)));
        }
        Ok(Self { exponent, modulus })
    }

    /// Public exponent `e`
    pub fn exponent(&self) -> u64 {
        self.exponent
    }

    /// Modulus `n`
    pub fn modulus(&self) -> u64 {
        self.modulus
    }

    /// Encrypt one integer under this key
    pub fn encrypt(&self, plaintext: u32) -> u64 {
        encrypt(plaintext, self.exponent, self.modulus)
    }

    /// Wire form: `e` then `n`, native-endian
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_RECORD] {
        let mut record = [0u8; PUBLIC_KEY_RECORD];
        NativeEndian::write_u64(&mut record[..WIRE_INT_SIZE], self.exponent);
        NativeEndian::write_u64(&mut record[WIRE_INT_SIZE..], self.modulus);
        record
    }

    /// Parse the wire form produced by [`PublicKey::to_bytes`]
    pub fn from_bytes(record: &[u8]) -> Result<Self> {
        if record.len() != PUBLIC_KEY_RECORD {
            return Err(Error::InvalidKey(format!(
                "public key record must be {} bytes, got {}",
                PUBLIC_KEY_RECORD,
                record.len()
            )));
        }
        let exponent = NativeEndian::read_u64(&record[..WIRE_INT_SIZE]);
        let modulus = NativeEndian::read_u64(&record[WIRE_INT_SIZE..]);
        Self::new(exponent, modulus)
    }
}

/// RSA key pair owned by the listening side
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    p: u64,
    q: u64,
    n: u64,
    phi: u64,
    e: u64,
    d: u64,
}

impl KeyPair {
    /// Generate a fresh key pair with the thread RNG and 50 Miller-Rabin rounds
    pub fn generate() -> Result<Self> {
        Self::generate_with(&mut rand::rng(), MILLER_RABIN_ROUNDS)
    }

    /// Generate a fresh key pair.
    ///
    /// Draws distinct primes p and q from `[2^29, 2^32)` and searches the
    /// public exponent upward from 65537. Fails with
    /// [`KeyGenerationFailure::ExponentSearchExhausted`] when no exponent
    /// below phi qualifies; callers retry with fresh primes.
    pub fn generate_with<R: Rng>(rng: &mut R, rounds: u32) -> Result<Self> {
        let p = random_prime(rng, rounds);
        let q = loop {
            let candidate = random_prime(rng, rounds);
            if candidate != p {
                break candidate;
            }
        };

        let phi = (p - 1) * (q - 1);
        let e = find_public_exponent(phi, rounds, rng)?;
        let pair = Self::from_parts(p, q, e)?;
        debug!(
            p = pair.p,
            q = pair.q,
            n = pair.n,
            phi = pair.phi,
            e = pair.e,
            "Generated RSA key pair"
        );
        Ok(pair)
    }

    /// Build a key pair from known primes, searching the public exponent
    pub fn from_primes(p: u64, q: u64, rounds: u32) -> Result<Self> {
        let phi = totient(p, q)?;
        let e = find_public_exponent(phi, rounds, &mut rand::rng())?;
        Self::from_parts(p, q, e)
    }

    /// Build a key pair from explicit primes and public exponent.
    ///
    /// Primality of `p` and `q` is the caller's responsibility; coprimality
    /// of `e` and phi is checked through the inverse.
    pub fn from_parts(p: u64, q: u64, e: u64) -> Result<Self> {
        let phi = totient(p, q)?;
        let n = p * q;
        if n <= u64::from(u8::MAX) {
            return keygen_err!(KeyGenerationFailure::InvalidParameters(
                "modulus must exceed one byte"
            ));
        }
        if e < 3 || e >= phi {
            return keygen_err!(KeyGenerationFailure::InvalidParameters(
                "public exponent must lie in [3, phi)"
            ));
        }
        let d = match mod_inverse(e, phi) {
            Some(d) => d,
            None => return keygen_err!(KeyGenerationFailure::NoInverse),
        };
        Ok(Self { p, q, n, phi, e, d })
    }

    /// Public half to hand to the peer
    pub fn public_key(&self) -> PublicKey {
        PublicKey { exponent: self.e, modulus: self.n }
    }

    /// Public exponent `e`
    pub fn public_exponent(&self) -> u64 {
        self.e
    }

    /// Modulus `n`
    pub fn modulus(&self) -> u64 {
        self.n
    }

    /// Euler's totient of the modulus
    pub fn phi(&self) -> u64 {
        self.phi
    }

    /// Private exponent `d`
    pub fn private_exponent(&self) -> u64 {
        self.d
    }

    /// Prime factors `(p, q)`
    pub fn primes(&self) -> (u64, u64) {
        (self.p, self.q)
    }

    /// Encrypt under this pair's public key
    pub fn encrypt(&self, plaintext: u32) -> u64 {
        encrypt(plaintext, self.e, self.n)
    }

    /// Decrypt with the private exponent; the result is truncated to 32 bits
    pub fn decrypt(&self, ciphertext: u64) -> u32 {
        mod_exp(ciphertext, self.d, self.n) as u32
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("n", &self.n)
            .field("e", &self.e)
            .finish_non_exhaustive()
    }
}

fn totient(p: u64, q: u64) -> Result<u64> {
    if p < 2 || q < 2 {
        return keygen_err!(KeyGenerationFailure::InvalidParameters("primes must be at least 2"));
    }
    if p == q {
        return keygen_err!(KeyGenerationFailure::InvalidParameters("primes must be distinct"));
    }
    match p.checked_mul(q) {
        Some(_) => Ok((p - 1) * (q - 1)),
        None => keygen_err!(KeyGenerationFailure::InvalidParameters("modulus overflows 64 bits")),
    }
}

fn random_prime<R: Rng>(rng: &mut R, rounds: u32) -> u64 {
    loop {
        let candidate = rng.random_range(PRIME_MIN..=PRIME_MAX);
        if is_probable_prime_with(candidate, rounds, rng) {
            return candidate;
        }
    }
}

/// First odd `e >= 65537` below phi with `phi mod e != 0` and `e` prime
fn find_public_exponent<R: Rng>(phi: u64, rounds: u32, rng: &mut R) -> Result<u64> {
    let mut e = PUBLIC_EXPONENT_START;
    while e < phi {
        if phi % e != 0 && is_probable_prime_with(e, rounds, rng) {
            return Ok(e);
        }
        e += 2;
    }
    keygen_err!(KeyGenerationFailure::ExponentSearchExhausted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_textbook_pair() -> Result<()> {
        let pair = KeyPair::from_parts(61, 53, 17)?;
        assert_eq!(pair.modulus(), 3233);
        assert_eq!(pair.phi(), 3120);
        assert_eq!(pair.private_exponent(), 2753);
        assert_eq!(pair.encrypt(65), 2790);
        assert_eq!(pair.decrypt(2790), 65);
        Ok(())
    }

    #[test]
    fn test_small_primes_exhaust_exponent_search() {
        // phi = 3120 is below the first candidate exponent.
        match KeyPair::from_primes(61, 53, MILLER_RABIN_ROUNDS) {
            Err(Error::KeyGeneration(KeyGenerationFailure::ExponentSearchExhausted)) => {}
            other => panic!("expected ExponentSearchExhausted, got {:?}", other),
        }
    }

    #[test]
    fn test_non_coprime_exponent() {
        // gcd(3, 3120) = 3
        match KeyPair::from_parts(61, 53, 3) {
            Err(Error::KeyGeneration(KeyGenerationFailure::NoInverse)) => {}
            other => panic!("expected NoInverse, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(KeyPair::from_parts(61, 61, 17).is_err());
        assert!(KeyPair::from_parts(1, 53, 17).is_err());
        assert!(KeyPair::from_parts(5, 7, 5).is_err());
        assert!(KeyPair::from_parts(u64::MAX, 3, 17).is_err());
    }

    #[test]
    fn test_generated_pair_invariants() -> Result<()> {
        let pair = KeyPair::generate()?;
        let (p, q) = pair.primes();
        assert!((PRIME_MIN..=PRIME_MAX).contains(&p));
        assert!((PRIME_MIN..=PRIME_MAX).contains(&q));
        assert_ne!(p, q);
        assert_eq!(pair.modulus(), p * q);
        assert_ne!(pair.phi() % pair.public_exponent(), 0);
        let ed = u128::from(pair.public_exponent()) * u128::from(pair.private_exponent());
        assert_eq!(ed % u128::from(pair.phi()), 1);
        Ok(())
    }

    #[test]
    fn test_public_key_record() -> Result<()> {
        let key = PublicKey::new(65537, 0x1234_5678_9ABC_DEF1)?;
        let record = key.to_bytes();
        assert_eq!(&record[..8], &65537u64.to_ne_bytes());
        assert_eq!(&record[8..], &0x1234_5678_9ABC_DEF1u64.to_ne_bytes());
        assert_eq!(PublicKey::from_bytes(&record)?, key);
        assert!(PublicKey::from_bytes(&record[..15]).is_err());
        Ok(())
    }

    #[test]
    fn test_public_key_rejects_tiny_modulus() {
        assert!(PublicKey::new(17, 255).is_err());
        assert!(PublicKey::new(0, 3233).is_err());
        assert!(PublicKey::new(3233, 3233).is_err());
    }

    #[test]
    fn test_debug_hides_private_exponent() -> Result<()> {
        let pair = KeyPair::from_parts(61, 53, 17)?;
        let shown = format!("{:?}", pair);
        assert!(shown.contains("3233"));
        assert!(!shown.contains("2753"));
        Ok(())
    }
}
