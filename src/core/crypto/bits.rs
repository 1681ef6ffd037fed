/*!
Bit-level helpers for the block cipher.

Bits are held one per `u8` (0 or 1), most significant bit of each byte first,
which is the order the permutation tables are written in.
*/

/// Spread `bytes` into `bits`, eight entries per byte.
///
/// `bits` must hold exactly `8 * bytes.len()` entries.
pub fn unpack(bytes: &[u8], bits: &mut [u8]) {
    debug_assert_eq!(bits.len(), bytes.len() * 8);
    for (byte, out) in bytes.iter().zip(bits.chunks_exact_mut(8)) {
        for (j, bit) in out.iter_mut().enumerate() {
            *bit = (byte >> (7 - j)) & 0x01;
        }
    }
}

/// Collect `bits` back into `bytes`, eight entries per byte.
///
/// `bits` must hold exactly `8 * bytes.len()` entries.
pub fn pack(bits: &[u8], bytes: &mut [u8]) {
    debug_assert_eq!(bits.len(), bytes.len() * 8);
    for (byte, chunk) in bytes.iter_mut().zip(bits.chunks_exact(8)) {
        *byte = chunk
            .iter()
            .enumerate()
            .fold(0u8, |acc, (j, bit)| acc | ((bit & 0x01) << (7 - j)));
    }
}

/// Select bits from `input` through a 1-based permutation table.
pub fn permute<const N: usize>(input: &[u8], table: &[u8; N]) -> [u8; N] {
    let mut out = [0u8; N];
    for (slot, &index) in out.iter_mut().zip(table.iter()) {
        *slot = input[usize::from(index) - 1];
    }
    out
}

/// XOR `other` into `target` element-wise.
pub fn xor_in_place(target: &mut [u8], other: &[u8]) {
    for (t, o) in target.iter_mut().zip(other) {
        *t ^= o;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpack_order() {
        let mut bits = [0u8; 8];
        unpack(&[0b1010_0001], &mut bits);
        assert_eq!(bits, [1, 0, 1, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_pack_unpack() {
        let bytes = [0x00, 0xFF, 0x4C, 0x75, 0x01];
        let mut bits = [0u8; 40];
        unpack(&bytes, &mut bits);
        let mut packed = [0u8; 5];
        pack(&bits, &mut packed);
        assert_eq!(packed, bytes);
    }

    #[test]
    fn test_pack_masks_low_bit() {
        let mut packed = [0u8; 1];
        pack(&[3, 0, 0, 0, 0, 0, 0, 2], &mut packed);
        assert_eq!(packed, [0x80]);
    }

    #[test]
    fn test_permute() {
        let input = [1u8, 0, 0, 1];
        assert_eq!(permute(&input, &[4, 3, 2, 1]), [1, 0, 0, 1]);
        assert_eq!(permute(&input, &[1, 1, 2]), [1, 1, 0]);
    }

    #[test]
    fn test_xor_in_place() {
        let mut a = [1u8, 0, 1, 0];
        xor_in_place(&mut a, &[1, 1, 0, 0]);
        assert_eq!(a, [0, 1, 1, 0]);
    }
}
