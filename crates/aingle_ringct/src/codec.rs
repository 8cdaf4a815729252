//! Canonical byte encodings
//!
//! All transaction components serialize through [`Writer`] and parse through
//! [`Reader`]. Every encoding is canonical: a value has exactly one valid
//! byte representation, and [`Encode::encoded_size`] always equals the length
//! [`Encode::to_bytes`] produces.
//!
//! ## Layouts
//!
//! | Item | Layout | Size |
//! |------|--------|------|
//! | ring-A scalar | 4-byte LE magnitude per coefficient, then a sign-bit trailer | `4d + d/8` |
//! | ring-C scalar | 7-byte LE two's complement per coefficient | `7d` |
//! | bounded polynomial | `w`-bit two's complement, LSB first | `ceil(w·d/8)` |
//! | counts and lengths | unsigned LEB128, minimal | 1-10 |
//!
//! For ring-C scalars the top 3 bits of each 7-byte word must all equal
//! the sign bit.

use crate::error::{Result, RingCtError};
use crate::params::SchemeParameters;
use crate::ring::Poly;
use crate::sampling::Seed;

/// Width of a packed address secret coefficient
pub const ADDRESS_SECRET_BITS: u32 = 3;
/// Width of a packed ring-A response coefficient
pub const ADDRESS_RESPONSE_BITS: u32 = 20;
/// Width of a packed ring-C response coefficient
pub const COMMITMENT_RESPONSE_BITS: u32 = 25;

const POLY_C_BYTES: usize = 7;
const POLY_C_MASK: u64 = (1 << 56) - 1;

/// Types with a canonical byte encoding
pub trait Encode {
    /// Exact number of bytes [`Encode::encode`] writes
    fn encoded_size(&self) -> usize;

    /// Append the encoding to `w`
    fn encode(&self, w: &mut Writer);

    /// Encode into a fresh buffer
    fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(self.encoded_size());
        self.encode(&mut w);
        w.into_bytes()
    }
}

/// Types that parse from their canonical encoding
pub trait Decode: Sized {
    /// Parse one value from the front of `r`
    fn decode(params: &SchemeParameters, r: &mut Reader<'_>) -> Result<Self>;

    /// Parse a value that must occupy all of `bytes`
    fn from_bytes(params: &SchemeParameters, bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let value = Self::decode(params, &mut r)?;
        r.finish()?;
        Ok(value)
    }
}

/// Size of a LEB128 varint
pub fn varint_size(mut x: u64) -> usize {
    let mut n = 1;
    while x >= 0x80 {
        x >>= 7;
        n += 1;
    }
    n
}

/// Size of a length-prefixed byte string
pub fn var_bytes_size(len: usize) -> usize {
    varint_size(len as u64) + len
}

/// Total encoded size of `items`, without a count prefix
pub fn items_size<T: Encode>(items: &[T]) -> usize {
    items.iter().map(Encode::encoded_size).sum()
}

/// Size of a count-prefixed sequence
pub fn seq_size<T: Encode>(items: &[T]) -> usize {
    varint_size(items.len() as u64) + items_size(items)
}

/// Size of a ring-A scalar
pub fn poly_a_size(d: usize) -> usize {
    4 * d + d / 8
}

/// Size of a ring-C scalar
pub fn poly_c_size(d: usize) -> usize {
    POLY_C_BYTES * d
}

/// Size of a packed polynomial with `bits` per coefficient
pub fn packed_size(d: usize, bits: u32) -> usize {
    (d * bits as usize).div_ceil(8)
}

/// Output buffer
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty writer with reserved capacity
    pub fn with_capacity(n: usize) -> Self {
        Self {
            buf: Vec::with_capacity(n),
        }
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing has been written
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the writer
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn put_u8(&mut self, x: u8) {
        self.buf.push(x);
    }

    pub fn put_u64(&mut self, x: u64) {
        self.buf.extend_from_slice(&x.to_le_bytes());
    }

    pub fn put_varint(&mut self, mut x: u64) {
        while x >= 0x80 {
            self.buf.push((x as u8 & 0x7f) | 0x80);
            x >>= 7;
        }
        self.buf.push(x as u8);
    }

    pub fn put_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Encodings of `items` back to back
    pub fn put_items<T: Encode>(&mut self, items: &[T]) {
        for item in items {
            item.encode(self);
        }
    }

    /// Count prefix followed by the items
    pub fn put_seq<T: Encode>(&mut self, items: &[T]) {
        self.put_varint(items.len() as u64);
        self.put_items(items);
    }

    /// Varint length followed by the bytes
    pub fn put_var_bytes(&mut self, bytes: &[u8]) {
        self.put_varint(bytes.len() as u64);
        self.put_raw(bytes);
    }

    pub fn put_seed(&mut self, seed: &Seed) {
        self.put_raw(seed);
    }

    /// Ring-A scalar: magnitudes, then sign bits
    pub fn put_poly_a(&mut self, p: &Poly) {
        let mut signs = vec![0u8; p.len().div_ceil(8)];
        for (i, &c) in p.coeffs.iter().enumerate() {
            self.buf
                .extend_from_slice(&(c.unsigned_abs() as u32).to_le_bytes());
            if c < 0 {
                signs[i / 8] |= 1 << (i % 8);
            }
        }
        self.buf.extend_from_slice(&signs);
    }

    /// Ring-C scalar: 7-byte two's complement words
    pub fn put_poly_c(&mut self, p: &Poly) {
        for &c in &p.coeffs {
            let word = (c as u64) & POLY_C_MASK;
            self.buf.extend_from_slice(&word.to_le_bytes()[..POLY_C_BYTES]);
        }
    }

    /// `bits`-wide two's complement, packed LSB first
    pub fn put_packed(&mut self, p: &Poly, bits: u32) {
        let mask = (1u64 << bits) - 1;
        let mut acc: u128 = 0;
        let mut filled = 0u32;
        for &c in &p.coeffs {
            acc |= (((c as u64) & mask) as u128) << filled;
            filled += bits;
            while filled >= 8 {
                self.buf.push(acc as u8);
                acc >>= 8;
                filled -= 8;
            }
        }
        if filled > 0 {
            self.buf.push(acc as u8);
        }
    }

    /// Signed entries in 4-byte LE words
    pub fn put_i32s(&mut self, xs: &[i64]) {
        for &x in xs {
            self.buf.extend_from_slice(&(x as i32).to_le_bytes());
        }
    }
}

/// Input cursor
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Cursor at the start of `buf`
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Fail unless every byte was consumed
    pub fn finish(&self) -> Result<()> {
        if self.remaining() != 0 {
            return Err(RingCtError::serialization(
                "buffer",
                format!("{} trailing bytes", self.remaining()),
            ));
        }
        Ok(())
    }

    pub fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(RingCtError::serialization(
                field,
                format!("need {} bytes, {} left", n, self.remaining()),
            ));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn get_u8(&mut self, field: &'static str) -> Result<u8> {
        Ok(self.take(1, field)?[0])
    }

    pub fn get_u64(&mut self, field: &'static str) -> Result<u64> {
        let mut b = [0u8; 8];
        b.copy_from_slice(self.take(8, field)?);
        Ok(u64::from_le_bytes(b))
    }

    /// Minimal unsigned LEB128
    pub fn get_varint(&mut self, field: &'static str) -> Result<u64> {
        let mut x: u64 = 0;
        for i in 0..10 {
            let byte = self.get_u8(field)?;
            let payload = (byte & 0x7f) as u64;
            if i == 9 && payload > 1 {
                return Err(RingCtError::serialization(field, "varint overflows u64"));
            }
            x |= payload << (7 * i);
            if byte & 0x80 == 0 {
                if i > 0 && byte == 0 {
                    return Err(RingCtError::serialization(field, "non-minimal varint"));
                }
                return Ok(x);
            }
        }
        Err(RingCtError::serialization(field, "varint too long"))
    }

    /// Varint count bounded by `max`
    pub fn get_count(&mut self, field: &'static str, max: usize) -> Result<usize> {
        let n = self.get_varint(field)?;
        if n > max as u64 {
            return Err(RingCtError::serialization(
                field,
                format!("count {} exceeds maximum {}", n, max),
            ));
        }
        Ok(n as usize)
    }

    /// Exactly `n` values of `T`
    pub fn get_items<T: Decode>(&mut self, params: &SchemeParameters, n: usize) -> Result<Vec<T>> {
        (0..n).map(|_| T::decode(params, self)).collect()
    }

    /// Count-prefixed, non-empty sequence of at most `max` values
    pub fn get_seq<T: Decode>(
        &mut self,
        params: &SchemeParameters,
        field: &'static str,
        max: usize,
    ) -> Result<Vec<T>> {
        let n = self.get_count(field, max)?;
        if n == 0 {
            return Err(RingCtError::serialization(field, "empty"));
        }
        self.get_items(params, n)
    }

    /// Length-prefixed bytes bounded by `max`
    pub fn get_var_bytes(&mut self, field: &'static str, max: usize) -> Result<Vec<u8>> {
        let n = self.get_count(field, max)?;
        Ok(self.take(n, field)?.to_vec())
    }

    pub fn get_seed(&mut self, field: &'static str) -> Result<Seed> {
        let mut seed = [0u8; 64];
        seed.copy_from_slice(self.take(64, field)?);
        Ok(seed)
    }

    /// Ring-A scalar with coefficients in `[-(q-1)/2, (q-1)/2]`
    pub fn get_poly_a(&mut self, d: usize, q: u64, field: &'static str) -> Result<Poly> {
        let body = self.take(4 * d, field)?;
        let signs = self.take(d.div_ceil(8), field)?;
        let half = q / 2;
        let mut coeffs = Vec::with_capacity(d);
        for i in 0..d {
            let mut b = [0u8; 4];
            b.copy_from_slice(&body[4 * i..4 * i + 4]);
            let mag = u32::from_le_bytes(b) as u64;
            let negative = signs[i / 8] >> (i % 8) & 1 == 1;
            if mag > half {
                return Err(RingCtError::serialization(field, "coefficient out of range"));
            }
            if negative && mag == 0 {
                return Err(RingCtError::serialization(field, "negative zero"));
            }
            coeffs.push(if negative { -(mag as i64) } else { mag as i64 });
        }
        if d % 8 != 0 && signs[d / 8] >> (d % 8) != 0 {
            return Err(RingCtError::serialization(field, "stray sign bits"));
        }
        Ok(Poly::from_coeffs(coeffs))
    }

    /// Ring-C scalar with coefficients in `[-(q-1)/2, (q-1)/2]`
    pub fn get_poly_c(&mut self, d: usize, q: u64, field: &'static str) -> Result<Poly> {
        let body = self.take(POLY_C_BYTES * d, field)?;
        let half = (q / 2) as i64;
        let mut coeffs = Vec::with_capacity(d);
        for chunk in body.chunks_exact(POLY_C_BYTES) {
            let mut b = [0u8; 8];
            b[..POLY_C_BYTES].copy_from_slice(chunk);
            let raw = u64::from_le_bytes(b);
            let value = match raw >> 53 {
                0 => raw as i64,
                0b111 => (raw | !POLY_C_MASK) as i64,
                _ => {
                    return Err(RingCtError::serialization(field, "bad sign extension"));
                }
            };
            if value.abs() > half {
                return Err(RingCtError::serialization(field, "coefficient out of range"));
            }
            coeffs.push(value);
        }
        Ok(Poly::from_coeffs(coeffs))
    }

    /// Packed polynomial with `|coeff| <= bound`
    pub fn get_packed(
        &mut self,
        d: usize,
        bits: u32,
        bound: u64,
        field: &'static str,
    ) -> Result<Poly> {
        let body = self.take(packed_size(d, bits), field)?;
        let mask = (1u64 << bits) - 1;
        let mut coeffs = Vec::with_capacity(d);
        let mut acc: u128 = 0;
        let mut avail = 0u32;
        let mut bytes = body.iter();
        for _ in 0..d {
            while avail < bits {
                let byte = *bytes
                    .next()
                    .ok_or_else(|| RingCtError::serialization(field, "packed data truncated"))?;
                acc |= (byte as u128) << avail;
                avail += 8;
            }
            let raw = (acc as u64) & mask;
            acc >>= bits;
            avail -= bits;
            let value = if raw >> (bits - 1) & 1 == 1 {
                raw as i64 - (1i64 << bits)
            } else {
                raw as i64
            };
            if value.unsigned_abs() > bound {
                return Err(RingCtError::serialization(field, "coefficient exceeds bound"));
            }
            coeffs.push(value);
        }
        if acc != 0 {
            return Err(RingCtError::serialization(field, "non-zero padding bits"));
        }
        Ok(Poly::from_coeffs(coeffs))
    }

    /// `n` signed 4-byte words with `|x| <= bound`
    pub fn get_i32s(&mut self, n: usize, bound: u64, field: &'static str) -> Result<Vec<i64>> {
        let body = self.take(4 * n, field)?;
        body.chunks_exact(4)
            .map(|chunk| {
                let mut b = [0u8; 4];
                b.copy_from_slice(chunk);
                let x = i32::from_le_bytes(b) as i64;
                if x.unsigned_abs() > bound {
                    return Err(RingCtError::serialization(field, "entry exceeds bound"));
                }
                Ok(x)
            })
            .collect()
    }
}

/// Encode a vector of ring-A scalars
pub(crate) fn put_poly_a_vec(w: &mut Writer, v: &[Poly]) {
    for p in v {
        w.put_poly_a(p);
    }
}

/// Encode a vector of ring-C scalars
pub(crate) fn put_poly_c_vec(w: &mut Writer, v: &[Poly]) {
    for p in v {
        w.put_poly_c(p);
    }
}

/// Encode a vector of packed polynomials
pub(crate) fn put_packed_vec(w: &mut Writer, v: &[Poly], bits: u32) {
    for p in v {
        w.put_packed(p, bits);
    }
}

impl SchemeParameters {
    /// Size of one ring-A scalar
    pub fn poly_a_size(&self) -> usize {
        poly_a_size(self.ring_a().degree())
    }

    /// Size of one ring-C scalar
    pub fn poly_c_size(&self) -> usize {
        poly_c_size(self.ring_c().degree())
    }

    pub(crate) fn read_poly_a(&self, r: &mut Reader<'_>, field: &'static str) -> Result<Poly> {
        r.get_poly_a(self.ring_a().degree(), self.ring_a().modulus(), field)
    }

    pub(crate) fn read_poly_c(&self, r: &mut Reader<'_>, field: &'static str) -> Result<Poly> {
        r.get_poly_c(self.ring_c().degree(), self.ring_c().modulus(), field)
    }

    pub(crate) fn read_poly_a_vec(
        &self,
        r: &mut Reader<'_>,
        n: usize,
        field: &'static str,
    ) -> Result<Vec<Poly>> {
        (0..n).map(|_| self.read_poly_a(r, field)).collect()
    }

    pub(crate) fn read_poly_c_vec(
        &self,
        r: &mut Reader<'_>,
        n: usize,
        field: &'static str,
    ) -> Result<Vec<Poly>> {
        (0..n).map(|_| self.read_poly_c(r, field)).collect()
    }

    /// `l_c` ring-C responses bounded by `η_c - β_c`
    pub(crate) fn read_commitment_response(
        &self,
        r: &mut Reader<'_>,
        field: &'static str,
    ) -> Result<Vec<Poly>> {
        let d = self.ring_c().degree();
        let bits = COMMITMENT_RESPONSE_BITS;
        let bound = self.commitment_response_bound();
        (0..self.l_c())
            .map(|_| r.get_packed(d, bits, bound, field))
            .collect()
    }

    /// `l_a` ring-A responses bounded by `η_a - β_a`
    pub(crate) fn read_address_response(
        &self,
        r: &mut Reader<'_>,
        field: &'static str,
    ) -> Result<Vec<Poly>> {
        let d = self.ring_a().degree();
        let bits = ADDRESS_RESPONSE_BITS;
        let bound = self.address_response_bound();
        (0..self.l_a())
            .map(|_| r.get_packed(d, bits, bound, field))
            .collect()
    }
}

/// Serde adapter writing a 64-byte seed as hex
pub(crate) mod hex_seed {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use crate::sampling::Seed;

    pub fn serialize<S: Serializer>(seed: &Seed, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(seed))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Seed, D::Error> {
        let text = String::deserialize(d)?;
        let bytes = hex::decode(&text).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| D::Error::custom("expected 64 bytes"))
    }
}

/// Serde adapter writing a list of 64-byte seeds as hex
pub(crate) mod hex_seeds {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use crate::sampling::Seed;

    pub fn serialize<S: Serializer>(seeds: &[Seed], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(seeds.iter().map(hex::encode))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Seed>, D::Error> {
        Vec::<String>::deserialize(d)?
            .into_iter()
            .map(|text| {
                let bytes = hex::decode(&text).map_err(D::Error::custom)?;
                bytes
                    .try_into()
                    .map_err(|_| D::Error::custom("expected 64 bytes"))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QC: u64 = 9007199254735873;
    const QA: u64 = 4294962689;

    #[test]
    fn test_varint() {
        for x in [0u64, 1, 127, 128, 300, 1 << 35, u64::MAX] {
            let mut w = Writer::new();
            w.put_varint(x);
            assert_eq!(w.len(), varint_size(x));
            let bytes = w.into_bytes();
            let mut r = Reader::new(&bytes);
            assert_eq!(r.get_varint("x").unwrap(), x);
            r.finish().unwrap();
        }
        // 0x80 0x00 encodes zero non-minimally
        assert!(Reader::new(&[0x80, 0x00]).get_varint("x").is_err());
        assert!(Reader::new(&[0x80]).get_varint("x").is_err());
    }

    #[derive(Debug, PartialEq)]
    struct Tag(u64);

    impl Encode for Tag {
        fn encoded_size(&self) -> usize {
            varint_size(self.0)
        }

        fn encode(&self, w: &mut Writer) {
            w.put_varint(self.0);
        }
    }

    impl Decode for Tag {
        fn decode(_: &SchemeParameters, r: &mut Reader<'_>) -> Result<Self> {
            Ok(Self(r.get_varint("tag")?))
        }
    }

    #[test]
    fn test_sequences() {
        let params = SchemeParameters::standard().unwrap();
        let tags = vec![Tag(1), Tag(300), Tag(1 << 40)];
        let mut w = Writer::new();
        w.put_seq(&tags);
        w.put_items(&tags[..1]);
        assert_eq!(w.len(), seq_size(&tags) + items_size(&tags[..1]));
        let bytes = w.into_bytes();

        let mut r = Reader::new(&bytes);
        assert_eq!(r.get_seq::<Tag>(&params, "tags", 3).unwrap(), tags);
        assert_eq!(r.get_items::<Tag>(&params, 1).unwrap(), vec![Tag(1)]);
        r.finish().unwrap();

        assert!(Reader::new(&bytes).get_seq::<Tag>(&params, "tags", 2).is_err());
        assert!(Reader::new(&[0]).get_seq::<Tag>(&params, "tags", 2).is_err());
    }

    #[test]
    fn test_poly_a_encoding() {
        let half = (QA / 2) as i64;
        let p = Poly::from_coeffs(vec![0, 1, -1, half, -half, 7, -300, 2]);
        let mut w = Writer::new();
        w.put_poly_a(&p);
        assert_eq!(w.len(), poly_a_size(8));
        let bytes = w.into_bytes();
        assert_eq!(Reader::new(&bytes).get_poly_a(8, QA, "p").unwrap(), p);

        // Negative zero is rejected
        let mut bad = bytes.clone();
        bad[32] |= 1;
        assert!(Reader::new(&bad).get_poly_a(8, QA, "p").is_err());
    }

    #[test]
    fn test_poly_c_encoding() {
        let half = (QC / 2) as i64;
        let p = Poly::from_coeffs(vec![0, -1, half, -half, 12345, -99999, 3, -3]);
        let mut w = Writer::new();
        w.put_poly_c(&p);
        assert_eq!(w.len(), poly_c_size(8));
        let bytes = w.into_bytes();
        assert_eq!(Reader::new(&bytes).get_poly_c(8, QC, "p").unwrap(), p);

        // Top bits of the first word disagree
        let mut bad = bytes.clone();
        bad[6] ^= 0x80;
        assert!(Reader::new(&bad).get_poly_c(8, QC, "p").is_err());
    }

    #[test]
    fn test_packed_encoding() {
        let p = Poly::from_coeffs(vec![-2, -1, 0, 1, 2, 2, -2, 0, 1]);
        let mut w = Writer::new();
        w.put_packed(&p, 3);
        assert_eq!(w.len(), packed_size(9, 3));
        let bytes = w.into_bytes();
        assert_eq!(Reader::new(&bytes).get_packed(9, 3, 2, "p").unwrap(), p);
        // A coefficient of 3 fits in 3 bits but violates the bound
        let q = Poly::from_coeffs(vec![3, 0, 0, 0, 0, 0, 0, 0]);
        let mut w = Writer::new();
        w.put_packed(&q, 3);
        assert!(Reader::new(&w.into_bytes()).get_packed(8, 3, 2, "p").is_err());
    }

    #[test]
    fn test_wide_packed_encoding() {
        let bound = (1i64 << 24) - 61;
        let p = Poly::from_coeffs(vec![bound, -bound, 0, 1, -1, 77, -123456]);
        let mut w = Writer::new();
        w.put_packed(&p, 25);
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), packed_size(7, 25));
        assert_eq!(
            Reader::new(&bytes)
                .get_packed(7, 25, bound as u64, "p")
                .unwrap(),
            p
        );
    }

    #[test]
    fn test_truncation_and_trailing_bytes() {
        let mut r = Reader::new(&[1, 2, 3]);
        assert!(r.take(4, "x").is_err());
        assert!(r.finish().is_err());
        assert!(Reader::new(&[5, 1, 2]).get_var_bytes("memo", 10).is_err());
        assert!(Reader::new(&[5, 1, 2, 3, 4, 5]).get_var_bytes("memo", 4).is_err());
    }
}
