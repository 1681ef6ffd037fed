/*!
Modular arithmetic for the key pair engine.

All operands are `u64`; products are formed in `u128` and the extended
Euclidean algorithm runs over `i128`, so nothing overflows for 64-bit moduli.
*/

use rand::Rng;

use crate::core::constants::keygen::MILLER_RABIN_ROUNDS;

/// `(a * b) mod m` without overflow
#[inline]
pub fn mul_mod(a: u64, b: u64, modulus: u64) -> u64 {
    ((u128::from(a) * u128::from(b)) % u128::from(modulus)) as u64
}

/// `base^exponent mod modulus` by square-and-multiply.
///
/// Exponent bits are scanned from the most significant set bit down.
/// `modulus` must be non-zero.
pub fn mod_exp(base: u64, exponent: u64, modulus: u64) -> u64 {
    debug_assert!(modulus != 0, "modulus must be non-zero");
    if modulus == 1 {
        return 0;
    }
    if exponent == 0 {
        return 1;
    }

    let base = base % modulus;
    let mut result = 1u64;
    let top = 63 - exponent.leading_zeros();
    for bit in (0..=top).rev() {
        result = mul_mod(result, result, modulus);
        if (exponent >> bit) & 1 == 1 {
            result = mul_mod(result, base, modulus);
        }
    }
    result
}

/// Multiplicative inverse of `a` modulo `m`.
///
/// Returns `None` when `gcd(a, m) != 1`. Values of `a` at or above `m` are
/// reduced first.
pub fn mod_inverse(a: u64, m: u64) -> Option<u64> {
    if m < 2 {
        return None;
    }

    let (mut old_r, mut r) = (i128::from(m), i128::from(a % m));
    let (mut old_t, mut t) = (0i128, 1i128);

    while r != 0 {
        let q = old_r / r;
        (old_r, r) = (r, old_r - q * r);
        (old_t, t) = (t, old_t - q * t);
    }

    if old_r != 1 {
        return None;
    }
    Some(old_t.rem_euclid(i128::from(m)) as u64)
}

/// Miller-Rabin with `rounds` random bases drawn from the thread RNG
pub fn is_probable_prime(n: u64, rounds: u32) -> bool {
    is_probable_prime_with(n, rounds, &mut rand::rng())
}

/// Miller-Rabin with the default 50 rounds
pub fn is_prime(n: u64) -> bool {
    is_probable_prime(n, MILLER_RABIN_ROUNDS)
}

/// Miller-Rabin with bases drawn uniformly from `[2, n - 1]` using `rng`.
///
/// Writes `n - 1 = 2^k * m` with `m` odd. A base passes when `a^m` is 1 or
/// `n - 1`, or when one of the next `k - 1` squarings reaches `n - 1`.
pub fn is_probable_prime_with<R: Rng>(n: u64, rounds: u32, rng: &mut R) -> bool {
    if n == 2 || n == 3 {
        return true;
    }
    if n < 2 || n & 1 == 0 {
        return false;
    }

    let k = (n - 1).trailing_zeros();
    let m = (n - 1) >> k;

    'bases: for _ in 0..rounds {
        let a = rng.random_range(2..=n - 1);
        let mut b = mod_exp(a, m, n);
        if b == 1 || b == n - 1 {
            continue;
        }
        for _ in 1..k {
            b = mul_mod(b, b, n);
            if b == n - 1 {
                continue 'bases;
            }
            if b == 1 {
                return false;
            }
        }
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mod_exp_small() {
        assert_eq!(mod_exp(4, 13, 497), 445);
        assert_eq!(mod_exp(2, 10, 1000), 24);
        assert_eq!(mod_exp(65, 17, 3233), 2790);
        assert_eq!(mod_exp(2790, 2753, 3233), 65);
    }

    #[test]
    fn test_mod_exp_edges() {
        assert_eq!(mod_exp(5, 0, 7), 1);
        assert_eq!(mod_exp(5, 0, 1), 0);
        assert_eq!(mod_exp(0, 5, 7), 0);
        assert_eq!(mod_exp(10, 1, 7), 3);
        assert_eq!(mod_exp(u64::MAX, 2, u64::MAX - 1), 1);
    }

    #[test]
    fn test_mod_exp_fermat() {
        // a^(p-1) = 1 mod p for a prime p near 2^64.
        let p = 18_446_744_073_709_551_557u64;
        for a in [2u64, 3, 12345, p - 2] {
            assert_eq!(mod_exp(a, p - 1, p), 1);
        }
    }

    #[test]
    fn test_mod_inverse() {
        assert_eq!(mod_inverse(17, 3120), Some(2753));
        assert_eq!(mod_inverse(3, 11), Some(4));
        assert_eq!(mod_inverse(1, 2), Some(1));
        assert_eq!(mod_inverse(6, 9), None);
        assert_eq!(mod_inverse(0, 9), None);
    }

    #[test]
    fn test_mod_inverse_reduces_operand() {
        assert_eq!(mod_inverse(3120 + 17, 3120), Some(2753));
        assert_eq!(mod_inverse(14, 11), Some(4));
        assert_eq!(mod_inverse(15, 9), None);
    }

    #[test]
    fn test_mod_inverse_large() {
        let m = 0xFFFF_FFFF_FFFF_FFC5u64;
        let a = 65537u64;
        let inv = mod_inverse(a, m).expect("65537 is coprime to m");
        assert_eq!(mul_mod(a, inv, m), 1);
    }

    #[test]
    fn test_small_primes() {
        let primes = [2u64, 3, 5, 7, 11, 13, 61, 53, 65537, 2_147_483_647];
        let composites = [0u64, 1, 4, 9, 15, 561, 1105, 3233, 4_294_967_297];
        for p in primes {
            assert!(is_prime(p), "{} should be prime", p);
        }
        for c in composites {
            assert!(!is_prime(c), "{} should be composite", c);
        }
    }

    #[test]
    fn test_large_prime() {
        assert!(is_prime(18_446_744_073_709_551_557));
        assert!(!is_prime(18_446_744_073_709_551_557 - 2));
    }
}
