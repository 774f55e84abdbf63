//! # Deterministic Byte Generator
//!
//! A seeded, infinite byte stream built on a 32-bit linear congruential
//! generator. The same seed yields the same bytes on every platform and every
//! run, which is what lets a stress-filled tree be rebuilt exactly from its
//! seed.
//!
//! Each output value takes three LCG rounds:
//!
//! ```text
//! next = mul32(next, 1103515245) + 12345        (wrapping, 32-bit)
//! round 1: result  = (next / 65536) % 2048
//! round 2: result  = (result << 10) ^ ((next / 65536) % 1024)
//! round 3: result  = (result << 10) ^ ((next / 65536) % 1024)
//! byte    = result & 0xff
//! ```
//!
//! Division and remainder truncate toward zero on the signed state, and all
//! shifts wrap at 32 bits.

const MULTIPLIER: i32 = 1103515245;
const INCREMENT: i32 = 12345;

/// 32-bit modular multiplication via 16-bit lanes.
///
/// Partial products are folded back into 16-bit lanes so no intermediate ever
/// needs more than 32 bits. The result always equals `a.wrapping_mul(b)`.
pub fn mul32(a: i32, b: i32) -> i32 {
    let (a, b) = (a as u32, b as u32);
    let loa = a & 0xffff;
    let hia = a >> 16;
    let lob = b & 0xffff;
    let hib = b >> 16;

    let mut lor = loa * lob;
    let mut hir = lor >> 16;
    lor &= 0xffff;
    hir = hir.wrapping_add(loa * hib) & 0xffff;
    hir = hir.wrapping_add(hia * lob) & 0xffff;

    ((hir << 16) | lor) as i32
}

/// Seeded pseudorandom byte source. Its only state is the signed 32-bit
/// `next` word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteGenerator {
    next: i32,
}

impl ByteGenerator {
    pub fn new(seed: i32) -> Self {
        Self { next: seed }
    }

    /// Restart the sequence from `seed`.
    pub fn reseed(&mut self, seed: i32) {
        self.next = seed;
    }

    fn round(&mut self) -> i32 {
        self.next = mul32(self.next, MULTIPLIER).wrapping_add(INCREMENT);
        self.next / 65536
    }

    /// Full 32-bit value of one draw, before it is masked to a byte.
    pub fn next_raw(&mut self) -> i32 {
        let mut result = self.round() % 2048;
        result = (result << 10) ^ (self.round() % 1024);
        result = (result << 10) ^ (self.round() % 1024);
        result
    }

    pub fn next_byte(&mut self) -> u8 {
        (self.next_raw() & 0xff) as u8
    }

    /// Fill `buf` with consecutive draws.
    pub fn fill(&mut self, buf: &mut [u8]) {
        for b in buf.iter_mut() {
            *b = self.next_byte();
        }
    }
}

/// Never returns `None`.
impl Iterator for ByteGenerator {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        Some(self.next_byte())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn take(seed: i32, n: usize) -> Vec<u8> {
        ByteGenerator::new(seed).take(n).collect()
    }

    #[test]
    fn test_golden_vectors() {
        assert_eq!(
            take(42, 16),
            vec![166, 70, 97, 18, 181, 12, 154, 177, 119, 149, 47, 244, 20, 142, 239, 138]
        );
        assert_eq!(
            take(0, 16),
            vec![5, 32, 91, 172, 95, 122, 17, 175, 5, 30, 70, 58, 96, 8, 239, 204]
        );
        assert_eq!(
            take(-1, 16),
            vec![134, 67, 97, 122, 221, 51, 202, 23, 130, 179, 162, 249, 31, 188, 165, 59]
        );
        assert_eq!(
            take(123456789, 16),
            vec![201, 40, 139, 225, 108, 42, 133, 13, 133, 66, 31, 117, 16, 48, 234, 158]
        );
        assert_eq!(
            take(i32::MAX, 16),
            vec![135, 66, 96, 121, 222, 50, 201, 22, 131, 180, 163, 248, 30, 189, 166, 58]
        );
    }

    #[test]
    fn test_raw_values_are_signed() {
        let mut gen = ByteGenerator::new(42);
        let raw: Vec<i32> = (0..4).map(|_| gen.next_raw()).collect();
        assert_eq!(raw, vec![-1465526362, -1217955770, 689837665, -940747246]);
    }

    #[test]
    fn test_mul32_known_products() {
        assert_eq!(mul32(1103515245, 1103515245), -1029531031);
        assert_eq!(mul32(-7, 123456), -864192);
        assert_eq!(mul32(i32::MAX, i32::MAX), 1);
        assert_eq!(mul32(0, -1), 0);
    }

    #[test]
    fn test_mul32_matches_wrapping_mul() {
        let mut rng = rand::thread_rng();
        for _ in 0..10_000 {
            let a: i32 = rng.gen();
            let b: i32 = rng.gen();
            assert_eq!(mul32(a, b), a.wrapping_mul(b), "mul32({a}, {b})");
        }
    }

    #[test]
    fn test_determinism_for_random_seeds() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let seed: i32 = rng.gen();
            assert_eq!(take(seed, 512), take(seed, 512));
        }
    }

    #[test]
    fn test_reseed_restarts_sequence() {
        let mut gen = ByteGenerator::new(7);
        let first: Vec<u8> = gen.by_ref().take(32).collect();
        gen.reseed(7);
        let second: Vec<u8> = gen.by_ref().take(32).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_fill_matches_iteration() {
        let mut buf = [0u8; 64];
        ByteGenerator::new(99).fill(&mut buf);
        assert_eq!(buf.to_vec(), take(99, 64));
    }
}
