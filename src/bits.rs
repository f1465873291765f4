//! Bit-level primitives on the 64-bit frame accumulator.
//!
//! Bits are addressed MSB-first: position 0 is bit 63 of the accumulator, which
//! is bit 7 of byte 0 once the accumulator is written out big-endian.

use byteorder::{BigEndian, ByteOrder};

pub const ACCUMULATOR_BITS: u32 = 64;

/// Low `len` bits set. `len` may be 64.
pub fn ones(len: u32) -> u64 {
    if len >= 64 {
        u64::MAX
    } else {
        (1u64 << len) - 1
    }
}

/// Shift that right-aligns the range `[position, position + len)`.
fn start_index(position: u32, len: u32) -> u32 {
    ACCUMULATOR_BITS - position - len
}

/// Write the low `len` bits of `value` into `[position, position + len)` of `acc`,
/// leaving every other bit untouched.
pub fn insert(acc: u64, value: u64, position: u32, len: u32) -> u64 {
    let shift = start_index(position, len);
    let field = ones(len) << shift;
    (acc & !field) | ((value & ones(len)) << shift)
}

/// Read `[position, position + len)` of `acc` as a right-aligned value.
pub fn extract(acc: u64, position: u32, len: u32) -> u64 {
    (acc >> start_index(position, len)) & ones(len)
}

/// Sign-extends the low `bits` of `value` to a full `i64`. No-op at 64 bits.
pub fn sign_extend(value: u64, bits: u32) -> i64 {
    let shift = ACCUMULATOR_BITS - bits;
    ((value << shift) as i64) >> shift
}

/// Width in bits of little-endian byte group `index` of a `bits`-wide field.
fn group_width(bits: u32, index: u32) -> u32 {
    (bits - index * 8).min(8)
}

/// Reorders the byte groups of a `bits`-wide little-endian value so the least
/// significant byte comes first (at the top of the field). For whole-byte
/// fields this is the plain 16/32/64-bit byte reversal; a trailing partial
/// byte keeps its own width at the bottom of the field.
pub fn swap_bytes(value: u64, bits: u32) -> u64 {
    let value = value & ones(bits);
    let groups = bits.div_ceil(8);
    let mut out = 0u64;
    let mut consumed = 0;
    for i in 0..groups {
        let width = group_width(bits, i);
        let group = (value >> (i * 8)) & ones(width);
        consumed += width;
        out |= group << (bits - consumed);
    }
    out
}

/// Inverse of [`swap_bytes`].
pub fn unswap_bytes(pattern: u64, bits: u32) -> u64 {
    let pattern = pattern & ones(bits);
    let groups = bits.div_ceil(8);
    let mut out = 0u64;
    let mut consumed = 0;
    for i in 0..groups {
        let width = group_width(bits, i);
        consumed += width;
        let group = (pattern >> (bits - consumed)) & ones(width);
        out |= group << (i * 8);
    }
    out
}

/// Accumulator -> wire bytes, truncated (or zero padded) to `len` bytes.
pub fn from_bitstring(acc: u64, len: usize) -> Vec<u8> {
    let mut buf = [0u8; 8];
    BigEndian::write_u64(&mut buf, acc);
    let mut out = buf[..len.min(8)].to_vec();
    out.resize(len, 0);
    out
}

/// Wire bytes -> accumulator. Missing trailing bytes read as zero, extra bytes are ignored.
pub fn to_bitstring(data: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let n = data.len().min(8);
    buf[..n].copy_from_slice(&data[..n]);
    BigEndian::read_u64(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ones() {
        assert_eq!(ones(0), 0);
        assert_eq!(ones(4), 0xF);
        assert_eq!(ones(64), u64::MAX);
    }

    #[test]
    fn test_insert_extract_msb_first() {
        let acc = insert(0, 0xAB, 0, 8);
        assert_eq!(acc, 0xAB00_0000_0000_0000);
        assert_eq!(extract(acc, 0, 8), 0xAB);
        assert_eq!(from_bitstring(acc, 1), vec![0xAB]);
    }

    #[test]
    fn test_insert_preserves_neighbours() {
        let acc = u64::MAX;
        let acc = insert(acc, 0, 8, 16);
        assert_eq!(acc, 0xFF00_00FF_FFFF_FFFF);
    }

    #[test]
    fn test_insert_full_width() {
        assert_eq!(insert(0, 0x0123_4567_89AB_CDEF, 0, 64), 0x0123_4567_89AB_CDEF);
        assert_eq!(extract(0x0123_4567_89AB_CDEF, 0, 64), 0x0123_4567_89AB_CDEF);
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0b1000, 4), -8);
        assert_eq!(sign_extend(0b0111, 4), 7);
        assert_eq!(sign_extend(0b11111111, 8), -1);
        assert_eq!(sign_extend(u64::MAX, 64), -1);
        assert_eq!(sign_extend(i64::MIN as u64, 64), i64::MIN);
    }

    #[test]
    fn test_swap_whole_bytes() {
        assert_eq!(swap_bytes(0x1234, 16), 0x3412);
        assert_eq!(swap_bytes(0x1234_5678, 32), 0x7856_3412);
        assert_eq!(swap_bytes(0x0102_0304_0506_0708, 64), 0x0807_0605_0403_0201);
        assert_eq!(swap_bytes(0x12, 8), 0x12);
        assert_eq!(unswap_bytes(0x3412, 16), 0x1234);
    }

    #[test]
    fn test_swap_partial_byte() {
        // 12 bits: low byte 0xBC first, then the 4-bit high nibble 0xA.
        assert_eq!(swap_bytes(0xABC, 12), 0xBCA);
        assert_eq!(unswap_bytes(0xBCA, 12), 0xABC);
        assert_eq!(unswap_bytes(swap_bytes(0x12_3456, 24), 24), 0x12_3456);
    }

    #[test]
    fn test_bitstring_short_input() {
        assert_eq!(to_bitstring(&[0x12, 0x34]), 0x1234_0000_0000_0000);
        assert_eq!(from_bitstring(0x1234_0000_0000_0000, 2), vec![0x12, 0x34]);
    }
}
