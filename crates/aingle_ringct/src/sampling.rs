//! Randomness: deterministic SHAKE256 expansion and fresh sampling
//!
//! Everything that must be reproducible (public matrices, challenges, key
//! material derived from a seed, commitment randomness derived from a KEM
//! shared secret) goes through [`Expander`]. Everything that must be fresh
//! (proof masks, simulated ring responses, carry noise) takes a caller RNG.

use rand::distributions::{Distribution, Uniform};
use rand::{CryptoRng, Rng, RngCore};
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::Shake256;

use crate::ring::{NttPoly, Poly, RingContext};

/// 64-byte hash output used for seeds and challenges
pub type Seed = [u8; 64];

/// Domain-separated SHAKE256 stream
pub(crate) struct Expander {
    reader: <Shake256 as ExtendableOutput>::Reader,
    acc: u128,
    avail: u32,
}

impl Expander {
    /// Absorb a domain label followed by length-prefixed inputs
    pub fn new(domain: &[u8], parts: &[&[u8]]) -> Self {
        let mut shake = Shake256::default();
        shake.update(&(domain.len() as u64).to_le_bytes());
        shake.update(domain);
        for part in parts {
            shake.update(&(part.len() as u64).to_le_bytes());
            shake.update(part);
        }
        Self {
            reader: shake.finalize_xof(),
            acc: 0,
            avail: 0,
        }
    }

    /// Fill `out` with raw stream bytes
    pub fn fill(&mut self, out: &mut [u8]) {
        self.reader.read(out);
    }

    /// Next `bits` bits of the stream (`bits <= 64`)
    pub fn next_bits(&mut self, bits: u32) -> u64 {
        while self.avail < bits {
            let mut byte = [0u8; 1];
            self.reader.read(&mut byte);
            self.acc |= (byte[0] as u128) << self.avail;
            self.avail += 8;
        }
        let out = (self.acc & ((1u128 << bits) - 1)) as u64;
        self.acc >>= bits;
        self.avail -= bits;
        out
    }

    /// Uniform residue in `[0, q)`
    pub fn uniform_mod(&mut self, q: u64) -> u64 {
        let bits = 64 - (q - 1).leading_zeros();
        loop {
            let x = self.next_bits(bits);
            if x < q {
                return x;
            }
        }
    }

    /// Uniform integer in `[-bound, bound]`
    pub fn bounded(&mut self, bound: u64) -> i64 {
        let range = 2 * bound + 1;
        let bits = 64 - (range - 1).leading_zeros();
        loop {
            let x = self.next_bits(bits.max(1));
            if x < range {
                return x as i64 - bound as i64;
            }
        }
    }

    /// Uniform ring element, produced directly in NTT form
    pub fn uniform_ntt(&mut self, ring: &RingContext) -> NttPoly {
        let q = ring.modulus();
        NttPoly {
            slots: (0..ring.degree()).map(|_| self.uniform_mod(q)).collect(),
        }
    }

    /// Polynomial with coefficients uniform in `[-bound, bound]`
    pub fn bounded_poly(&mut self, d: usize, bound: u64) -> Poly {
        Poly::from_coeffs((0..d).map(|_| self.bounded(bound)).collect())
    }

    /// Challenge polynomial with exactly `weight` coefficients in `{-1, 1}`
    ///
    /// Positions are chosen with an inside-out Fisher-Yates shuffle so every
    /// support of size `weight` is equally likely.
    pub fn challenge(&mut self, d: usize, weight: usize) -> Poly {
        let index_bits = d.trailing_zeros();
        let mut coeffs = vec![0i64; d];
        for i in (d - weight)..d {
            let j = loop {
                let j = self.next_bits(index_bits) as usize;
                if j <= i {
                    break j;
                }
            };
            coeffs[i] = coeffs[j];
            coeffs[j] = if self.next_bits(1) == 1 { -1 } else { 1 };
        }
        Poly::from_coeffs(coeffs)
    }
}

/// Challenge derived from a transcript seed under a domain label
pub(crate) fn challenge_from_seed(seed: &[u8], label: &[u8], d: usize, weight: usize) -> Poly {
    Expander::new(label, &[seed]).challenge(d, weight)
}

/// Fresh polynomial with coefficients uniform in `[-bound, bound]`
pub(crate) fn sample_bounded<R: RngCore + CryptoRng>(rng: &mut R, d: usize, bound: u64) -> Poly {
    let dist = Uniform::new_inclusive(-(bound as i64), bound as i64);
    Poly::from_coeffs((0..d).map(|_| dist.sample(rng)).collect())
}

/// Fresh vector of `len` bounded polynomials
pub(crate) fn sample_bounded_vec<R: RngCore + CryptoRng>(
    rng: &mut R,
    len: usize,
    d: usize,
    bound: u64,
) -> Vec<Poly> {
    (0..len).map(|_| sample_bounded(rng, d, bound)).collect()
}

/// Fresh uniform polynomial whose lowest `zeros` coefficients vanish
pub(crate) fn sample_uniform_low_zero<R: RngCore + CryptoRng>(
    rng: &mut R,
    ring: &RingContext,
    zeros: usize,
) -> Poly {
    let q = ring.modulus();
    let coeffs = (0..ring.degree())
        .map(|i| {
            if i < zeros {
                0
            } else {
                ring.center(rng.gen_range(0..q))
            }
        })
        .collect();
    Poly::from_coeffs(coeffs)
}

/// Fresh 64-byte seed
pub(crate) fn random_seed<R: RngCore + CryptoRng>(rng: &mut R) -> Seed {
    let mut seed = [0u8; 64];
    rng.fill_bytes(&mut seed);
    seed
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_expander_is_deterministic() {
        let mut a = Expander::new(b"test", &[b"seed"]);
        let mut b = Expander::new(b"test", &[b"seed"]);
        let mut c = Expander::new(b"test", &[b"seed2"]);
        let xs: Vec<u64> = (0..16).map(|_| a.uniform_mod(1_000_003)).collect();
        let ys: Vec<u64> = (0..16).map(|_| b.uniform_mod(1_000_003)).collect();
        let zs: Vec<u64> = (0..16).map(|_| c.uniform_mod(1_000_003)).collect();
        assert_eq!(xs, ys);
        assert_ne!(xs, zs);
    }

    #[test]
    fn test_domain_separation() {
        // "ab" + "c" must not collide with "a" + "bc"
        let mut a = Expander::new(b"d", &[b"ab", b"c"]);
        let mut b = Expander::new(b"d", &[b"a", b"bc"]);
        let mut x = [0u8; 32];
        let mut y = [0u8; 32];
        a.fill(&mut x);
        b.fill(&mut y);
        assert_ne!(x, y);
    }

    #[test]
    fn test_challenge_weight() {
        for seed in 0u8..20 {
            let c = challenge_from_seed(&[seed], b"ch", 128, 60);
            assert_eq!(c.coeffs.iter().filter(|&&x| x != 0).count(), 60);
            assert!(c.infinity_norm() <= 1);
        }
    }

    #[test]
    fn test_bounded_sampling() {
        let mut exp = Expander::new(b"bounded", &[]);
        let p = exp.bounded_poly(256, 2);
        assert!(p.infinity_norm() <= 2);
        assert!(p.coeffs.iter().any(|&c| c == -2));
        assert!(p.coeffs.iter().any(|&c| c == 2));

        let r = sample_bounded(&mut OsRng, 128, 1 << 20);
        assert!(r.infinity_norm() <= 1 << 20);
    }

    #[test]
    fn test_low_zero_sampling() {
        let ring = RingContext::new(9007199254735873, 128).unwrap();
        let g = sample_uniform_low_zero(&mut OsRng, &ring, 4);
        assert!(g.coeffs[..4].iter().all(|&c| c == 0));
        assert!(g.coeffs[4..].iter().any(|&c| c != 0));
    }
}
