//! Polynomial ring arithmetic over `Z_q[X]/(X^d + 1)`
//!
//! Both rings used by the scheme (ring A for address keys and ring C for
//! value commitments) are instances of [`RingContext`]. The modulus is a prime
//! with `q ≡ 1 (mod 2d)`, so `X^d + 1` splits completely and every element has
//! an NTT form in which multiplication is slot-wise.
//!
//! Two representations are used throughout the crate:
//!
//! - [`Poly`]: coefficient form with centered coefficients in `[-(q-1)/2, (q-1)/2]`.
//!   Used for storage, norms and wire encodings.
//! - [`NttPoly`]: evaluation form with slots in `[0, q)`. Used for arithmetic.
//!
//! ## Automorphisms
//!
//! The map `X ↦ X^l` (for odd `l`) permutes the evaluation points
//! `ζ^e`, so in NTT form it is a slot permutation. See
//! [`RingContext::automorphism_permutation`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Result, RingCtError};

/// Polynomial in coefficient form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Poly {
    /// Centered coefficients, lowest degree first
    pub coeffs: Vec<i64>,
}

impl Poly {
    /// The zero polynomial of degree bound `d`
    pub fn zero(d: usize) -> Self {
        Self { coeffs: vec![0; d] }
    }

    /// Wrap a coefficient vector
    pub fn from_coeffs(coeffs: Vec<i64>) -> Self {
        Self { coeffs }
    }

    /// Number of coefficients
    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    /// True if the polynomial has no coefficients
    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// Largest absolute coefficient
    pub fn infinity_norm(&self) -> u64 {
        self.coeffs
            .iter()
            .map(|c| c.unsigned_abs())
            .max()
            .unwrap_or(0)
    }
}

/// Largest absolute coefficient over a vector of polynomials
pub fn vec_infinity_norm(v: &[Poly]) -> u64 {
    v.iter().map(Poly::infinity_norm).max().unwrap_or(0)
}

/// Polynomial in NTT (evaluation) form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NttPoly {
    pub(crate) slots: Vec<u64>,
}

impl NttPoly {
    /// Slot values in `[0, q)`
    pub fn slots(&self) -> &[u64] {
        &self.slots
    }
}

#[inline]
pub(crate) fn mul_mod(a: u64, b: u64, q: u64) -> u64 {
    ((a as u128 * b as u128) % q as u128) as u64
}

#[inline]
pub(crate) fn add_mod(a: u64, b: u64, q: u64) -> u64 {
    let s = a + b;
    if s >= q {
        s - q
    } else {
        s
    }
}

#[inline]
pub(crate) fn sub_mod(a: u64, b: u64, q: u64) -> u64 {
    if a >= b {
        a - b
    } else {
        a + q - b
    }
}

pub(crate) fn pow_mod(mut base: u64, mut exp: u64, q: u64) -> u64 {
    let mut acc = 1 % q;
    base %= q;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = mul_mod(acc, base, q);
        }
        base = mul_mod(base, base, q);
        exp >>= 1;
    }
    acc
}

/// Deterministic Miller-Rabin for 64-bit integers
pub(crate) fn is_prime(n: u64) -> bool {
    const BASES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];
    if n < 2 {
        return false;
    }
    for &p in &BASES {
        if n % p == 0 {
            return n == p;
        }
    }
    let mut d = n - 1;
    let mut s = 0;
    while d % 2 == 0 {
        d /= 2;
        s += 1;
    }
    'witness: for &a in &BASES {
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..s {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

fn bit_reverse(mut k: usize, bits: u32) -> usize {
    let mut r = 0;
    for _ in 0..bits {
        r = (r << 1) | (k & 1);
        k >>= 1;
    }
    r
}

/// Arithmetic context for one ring `Z_q[X]/(X^d + 1)`
#[derive(Debug, Clone)]
pub struct RingContext {
    modulus: u64,
    degree: usize,
    zetas: Vec<u64>,
    degree_inv: u64,
    /// Slot `i` evaluates at `ζ^{slot_exponents[i]}`
    slot_exponents: Vec<usize>,
    /// Inverse of `slot_exponents`, indexed by odd exponent
    exponent_slots: Vec<usize>,
}

impl RingContext {
    /// Build the context for modulus `q` and degree `d`
    ///
    /// `d` must be a power of two and `q` an odd prime with `q ≡ 1 (mod 2d)`.
    pub fn new(modulus: u64, degree: usize) -> Result<Self> {
        if degree < 2 || !degree.is_power_of_two() {
            return Err(RingCtError::InvalidParameters(format!(
                "ring degree {} is not a power of two",
                degree
            )));
        }
        if modulus >= 1 << 62 || !is_prime(modulus) {
            return Err(RingCtError::InvalidParameters(format!(
                "ring modulus {} is not a prime below 2^62",
                modulus
            )));
        }
        let two_d = 2 * degree as u64;
        if (modulus - 1) % two_d != 0 {
            return Err(RingCtError::InvalidParameters(format!(
                "ring modulus {} is not 1 mod {}",
                modulus, two_d
            )));
        }

        let cofactor = (modulus - 1) / two_d;
        let zeta = (2..modulus.min(1 << 16))
            .map(|g| pow_mod(g, cofactor, modulus))
            .find(|&z| pow_mod(z, degree as u64, modulus) == modulus - 1)
            .ok_or_else(|| {
                RingCtError::InvalidParameters(format!(
                    "no primitive {}-th root of unity found mod {}",
                    two_d, modulus
                ))
            })?;

        let log_d = degree.trailing_zeros();
        let zetas = (0..degree)
            .map(|k| pow_mod(zeta, bit_reverse(k, log_d) as u64, modulus))
            .collect();

        let mut ctx = Self {
            modulus,
            degree,
            zetas,
            degree_inv: pow_mod(degree as u64, modulus - 2, modulus),
            slot_exponents: Vec::new(),
            exponent_slots: Vec::new(),
        };

        // Locate each slot's evaluation point by transforming X itself.
        let mut powers = HashMap::with_capacity(degree);
        let step = mul_mod(zeta, zeta, modulus);
        let mut cur = zeta;
        for e in (1..2 * degree).step_by(2) {
            powers.insert(cur, e);
            cur = mul_mod(cur, step, modulus);
        }
        let mut x = Poly::zero(degree);
        x.coeffs[1] = 1;
        let slots = ctx.ntt(&x).slots;
        let mut exponent_slots = vec![usize::MAX; 2 * degree];
        let mut slot_exponents = Vec::with_capacity(degree);
        for (i, s) in slots.iter().enumerate() {
            let e = *powers.get(s).ok_or_else(|| {
                RingCtError::InvalidParameters("NTT slot is not an odd root power".into())
            })?;
            slot_exponents.push(e);
            exponent_slots[e] = i;
        }
        ctx.slot_exponents = slot_exponents;
        ctx.exponent_slots = exponent_slots;
        Ok(ctx)
    }

    /// Ring modulus `q`
    pub fn modulus(&self) -> u64 {
        self.modulus
    }

    /// Ring degree `d`
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Map an integer into `[0, q)`
    #[inline]
    pub fn reduce(&self, x: i64) -> u64 {
        x.rem_euclid(self.modulus as i64) as u64
    }

    /// Map a residue into `[-(q-1)/2, (q-1)/2]`
    #[inline]
    pub fn center(&self, x: u64) -> i64 {
        if x > self.modulus / 2 {
            x as i64 - self.modulus as i64
        } else {
            x as i64
        }
    }

    /// Forward negacyclic transform
    pub fn ntt(&self, p: &Poly) -> NttPoly {
        let q = self.modulus;
        let d = self.degree;
        let mut a: Vec<u64> = p.coeffs.iter().map(|&c| self.reduce(c)).collect();
        a.resize(d, 0);

        let mut k = 0;
        let mut len = d / 2;
        while len >= 1 {
            let mut start = 0;
            while start < d {
                k += 1;
                let z = self.zetas[k];
                for j in start..start + len {
                    let t = mul_mod(z, a[j + len], q);
                    a[j + len] = sub_mod(a[j], t, q);
                    a[j] = add_mod(a[j], t, q);
                }
                start += 2 * len;
            }
            len >>= 1;
        }
        NttPoly { slots: a }
    }

    /// Inverse transform back to centered coefficients
    pub fn intt(&self, p: &NttPoly) -> Poly {
        let q = self.modulus;
        let d = self.degree;
        let mut a = p.slots.clone();

        let mut k = d;
        let mut len = 1;
        while len < d {
            let mut start = 0;
            while start < d {
                k -= 1;
                let z = q - self.zetas[k];
                for j in start..start + len {
                    let t = a[j];
                    a[j] = add_mod(t, a[j + len], q);
                    a[j + len] = mul_mod(sub_mod(t, a[j + len], q), z, q);
                }
                start += 2 * len;
            }
            len <<= 1;
        }
        Poly {
            coeffs: a
                .into_iter()
                .map(|x| self.center(mul_mod(x, self.degree_inv, q)))
                .collect(),
        }
    }

    /// Transform a vector of polynomials
    pub fn ntt_vec(&self, v: &[Poly]) -> Vec<NttPoly> {
        v.iter().map(|p| self.ntt(p)).collect()
    }

    /// Inverse-transform a vector of polynomials
    pub fn intt_vec(&self, v: &[NttPoly]) -> Vec<Poly> {
        v.iter().map(|p| self.intt(p)).collect()
    }

    /// Zero element
    pub fn zero(&self) -> NttPoly {
        NttPoly {
            slots: vec![0; self.degree],
        }
    }

    /// Constant polynomial `c` (every slot equals `c`)
    pub fn constant(&self, c: u64) -> NttPoly {
        NttPoly {
            slots: vec![c % self.modulus; self.degree],
        }
    }

    /// Element with the given slot values
    pub fn from_slots(&self, slots: Vec<u64>) -> NttPoly {
        debug_assert_eq!(slots.len(), self.degree);
        NttPoly {
            slots: slots.into_iter().map(|s| s % self.modulus).collect(),
        }
    }

    /// Slot-wise sum
    pub fn add(&self, a: &NttPoly, b: &NttPoly) -> NttPoly {
        let q = self.modulus;
        NttPoly {
            slots: a
                .slots
                .iter()
                .zip(&b.slots)
                .map(|(&x, &y)| add_mod(x, y, q))
                .collect(),
        }
    }

    /// Slot-wise difference
    pub fn sub(&self, a: &NttPoly, b: &NttPoly) -> NttPoly {
        let q = self.modulus;
        NttPoly {
            slots: a
                .slots
                .iter()
                .zip(&b.slots)
                .map(|(&x, &y)| sub_mod(x, y, q))
                .collect(),
        }
    }

    /// Negation
    pub fn neg(&self, a: &NttPoly) -> NttPoly {
        let q = self.modulus;
        NttPoly {
            slots: a.slots.iter().map(|&x| sub_mod(0, x, q)).collect(),
        }
    }

    /// Ring product
    pub fn mul(&self, a: &NttPoly, b: &NttPoly) -> NttPoly {
        let q = self.modulus;
        NttPoly {
            slots: a
                .slots
                .iter()
                .zip(&b.slots)
                .map(|(&x, &y)| mul_mod(x, y, q))
                .collect(),
        }
    }

    /// Multiply by a scalar in `Z_q`
    pub fn scale(&self, a: &NttPoly, s: u64) -> NttPoly {
        let q = self.modulus;
        NttPoly {
            slots: a.slots.iter().map(|&x| mul_mod(x, s, q)).collect(),
        }
    }

    /// `acc += b`
    pub fn add_assign(&self, acc: &mut NttPoly, b: &NttPoly) {
        let q = self.modulus;
        for (x, &y) in acc.slots.iter_mut().zip(&b.slots) {
            *x = add_mod(*x, y, q);
        }
    }

    /// `acc += a * b`
    pub fn mul_add_assign(&self, acc: &mut NttPoly, a: &NttPoly, b: &NttPoly) {
        let q = self.modulus;
        for ((x, &y), &z) in acc.slots.iter_mut().zip(&a.slots).zip(&b.slots) {
            *x = add_mod(*x, mul_mod(y, z, q), q);
        }
    }

    /// `<a, b>` for equal-length vectors
    pub fn inner_product(&self, a: &[NttPoly], b: &[NttPoly]) -> NttPoly {
        let mut acc = self.zero();
        for (x, y) in a.iter().zip(b) {
            self.mul_add_assign(&mut acc, x, y);
        }
        acc
    }

    /// Matrix-vector product `M·v`
    pub fn mat_vec(&self, m: &[Vec<NttPoly>], v: &[NttPoly]) -> Vec<NttPoly> {
        m.iter().map(|row| self.inner_product(row, v)).collect()
    }

    /// Component-wise vector sum
    pub fn vec_add(&self, a: &[NttPoly], b: &[NttPoly]) -> Vec<NttPoly> {
        a.iter().zip(b).map(|(x, y)| self.add(x, y)).collect()
    }

    /// Component-wise vector difference
    pub fn vec_sub(&self, a: &[NttPoly], b: &[NttPoly]) -> Vec<NttPoly> {
        a.iter().zip(b).map(|(x, y)| self.sub(x, y)).collect()
    }

    /// Multiply every component by the ring element `c`
    pub fn scale_vec(&self, c: &NttPoly, v: &[NttPoly]) -> Vec<NttPoly> {
        v.iter().map(|x| self.mul(c, x)).collect()
    }

    /// Slot permutation realizing `X ↦ X^l`
    ///
    /// For `p` in NTT form, `σ_l(p).slots[i] == p.slots[perm[i]]`.
    pub fn automorphism_permutation(&self, l: usize) -> Result<Vec<usize>> {
        let two_d = 2 * self.degree;
        if l % 2 == 0 {
            return Err(RingCtError::InvalidParameters(format!(
                "automorphism exponent {} must be odd",
                l
            )));
        }
        Ok(self
            .slot_exponents
            .iter()
            .map(|&e| self.exponent_slots[(e * l) % two_d])
            .collect())
    }
}

/// Apply a slot permutation produced by [`RingContext::automorphism_permutation`]
pub fn permute(p: &NttPoly, perm: &[usize]) -> NttPoly {
    NttPoly {
        slots: perm.iter().map(|&j| p.slots[j]).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    const QC: u64 = 9007199254735873;
    const QA: u64 = 4294962689;

    fn random_poly(ring: &RingContext, rng: &mut impl Rng) -> Poly {
        let half = (ring.modulus() / 2) as i64;
        Poly::from_coeffs(
            (0..ring.degree())
                .map(|_| rng.gen_range(-half..=half))
                .collect(),
        )
    }

    fn schoolbook(ring: &RingContext, a: &Poly, b: &Poly) -> Poly {
        let q = ring.modulus();
        let d = ring.degree();
        let mut acc = vec![0u64; d];
        for i in 0..d {
            for j in 0..d {
                let prod = mul_mod(ring.reduce(a.coeffs[i]), ring.reduce(b.coeffs[j]), q);
                let k = i + j;
                if k < d {
                    acc[k] = add_mod(acc[k], prod, q);
                } else {
                    acc[k - d] = sub_mod(acc[k - d], prod, q);
                }
            }
        }
        Poly::from_coeffs(acc.into_iter().map(|x| ring.center(x)).collect())
    }

    fn coefficient_automorphism(p: &Poly, l: usize) -> Poly {
        let d = p.len();
        let mut out = vec![0i64; d];
        for (i, &c) in p.coeffs.iter().enumerate() {
            let k = (i * l) % (2 * d);
            if k < d {
                out[k] += c;
            } else {
                out[k - d] -= c;
            }
        }
        Poly::from_coeffs(out)
    }

    #[test]
    fn test_primality() {
        assert!(is_prime(QC));
        assert!(is_prime(QA));
        assert!(!is_prime(QC + 2));
        assert!(!is_prime(1));
        assert!(is_prime(2));
    }

    #[test]
    fn test_ntt_roundtrip() {
        let mut rng = rand::thread_rng();
        for (q, d) in [(QC, 128), (QA, 256)] {
            let ring = RingContext::new(q, d).unwrap();
            let p = random_poly(&ring, &mut rng);
            assert_eq!(ring.intt(&ring.ntt(&p)), p);
        }
    }

    #[test]
    fn test_ntt_multiplication_is_negacyclic() {
        let mut rng = rand::thread_rng();
        let ring = RingContext::new(QC, 128).unwrap();
        let a = random_poly(&ring, &mut rng);
        let b = random_poly(&ring, &mut rng);
        let product = ring.intt(&ring.mul(&ring.ntt(&a), &ring.ntt(&b)));
        assert_eq!(product, schoolbook(&ring, &a, &b));
    }

    #[test]
    fn test_automorphism_matches_coefficient_action() {
        let mut rng = rand::thread_rng();
        let ring = RingContext::new(QC, 128).unwrap();
        let l = 2 * 128 / 4 + 1;
        let perm = ring.automorphism_permutation(l).unwrap();
        let p = Poly::from_coeffs((0..128).map(|_| rng.gen_range(-1000..1000)).collect());
        let via_slots = ring.intt(&permute(&ring.ntt(&p), &perm));
        assert_eq!(via_slots, coefficient_automorphism(&p, l));
    }

    #[test]
    fn test_automorphism_order_and_trace() {
        let mut rng = rand::thread_rng();
        let ring = RingContext::new(QC, 128).unwrap();
        let k = 4;
        let perm = ring.automorphism_permutation(2 * 128 / k + 1).unwrap();
        let p = Poly::from_coeffs((0..128).map(|_| rng.gen_range(-1000..1000)).collect());
        let p_ntt = ring.ntt(&p);

        let mut cur = p_ntt.clone();
        let mut trace = ring.zero();
        for _ in 0..k {
            ring.add_assign(&mut trace, &cur);
            cur = permute(&cur, &perm);
        }
        assert_eq!(cur, p_ntt);

        let trace = ring.intt(&trace);
        for (i, &c) in trace.coeffs.iter().enumerate() {
            if i % k == 0 {
                assert_eq!(c, k as i64 * p.coeffs[i]);
            } else {
                assert_eq!(c, 0);
            }
        }
    }

    #[test]
    fn test_invalid_ring() {
        assert!(RingContext::new(QC, 100).is_err());
        assert!(RingContext::new(QC + 2, 128).is_err());
        // 17 is prime but 17 - 1 is not a multiple of 2 * 128
        assert!(RingContext::new(17, 128).is_err());
    }

    #[test]
    fn test_norms() {
        let p = Poly::from_coeffs(vec![3, -7, 2]);
        let r = Poly::from_coeffs(vec![-9, 0, 1]);
        assert_eq!(p.infinity_norm(), 7);
        assert_eq!(vec_infinity_norm(&[p, r]), 9);
    }
}
