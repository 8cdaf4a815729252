//! Fiat-Shamir transcripts over SHA3-512
//!
//! Every absorbed item is framed with its label and length, so two different
//! sequences of items never produce the same hash input.

use sha3::{Digest, Sha3_512};

use crate::ring::NttPoly;
use crate::sampling::Seed;

/// Running SHA3-512 transcript
#[derive(Clone)]
pub(crate) struct Transcript {
    hasher: Sha3_512,
}

impl Transcript {
    /// Start a transcript under a protocol label
    pub fn new(protocol: &'static [u8]) -> Self {
        let mut t = Self {
            hasher: Sha3_512::new(),
        };
        t.append_bytes(b"protocol", protocol);
        t
    }

    fn frame(&mut self, label: &'static [u8], len: usize) {
        self.hasher.update((label.len() as u32).to_le_bytes());
        self.hasher.update(label);
        self.hasher.update((len as u64).to_le_bytes());
    }

    pub fn append_bytes(&mut self, label: &'static [u8], bytes: &[u8]) {
        self.frame(label, bytes.len());
        self.hasher.update(bytes);
    }

    pub fn append_u64(&mut self, label: &'static [u8], x: u64) {
        self.append_bytes(label, &x.to_le_bytes());
    }

    pub fn append_ntt(&mut self, label: &'static [u8], p: &NttPoly) {
        self.frame(label, p.slots.len() * 8);
        for s in &p.slots {
            self.hasher.update(s.to_le_bytes());
        }
    }

    pub fn append_ntt_vec(&mut self, label: &'static [u8], v: &[NttPoly]) {
        self.frame(label, v.len());
        for p in v {
            self.append_ntt(b"elem", p);
        }
    }

    pub fn append_i64s(&mut self, label: &'static [u8], xs: &[i64]) {
        self.frame(label, xs.len() * 8);
        for x in xs {
            self.hasher.update(x.to_le_bytes());
        }
    }

    /// Finish and return the 64-byte digest
    pub fn finish(self) -> Seed {
        let mut out = [0u8; 64];
        out.copy_from_slice(&self.hasher.finalize());
        out
    }
}

/// One-shot SHA3-512
pub(crate) fn sha3_512(bytes: &[u8]) -> Seed {
    let mut out = [0u8; 64];
    out.copy_from_slice(&Sha3_512::digest(bytes));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_binds_labels_and_order() {
        let mut a = Transcript::new(b"test");
        a.append_bytes(b"x", b"1");
        a.append_bytes(b"y", b"2");

        let mut b = Transcript::new(b"test");
        b.append_bytes(b"y", b"2");
        b.append_bytes(b"x", b"1");

        let mut c = Transcript::new(b"test");
        c.append_bytes(b"x", b"1");
        c.append_bytes(b"y", b"2");

        let a = a.finish();
        assert_ne!(a, b.finish());
        assert_eq!(a, c.finish());
    }

    #[test]
    fn test_sha3_512_known_answer() {
        // SHA3-512("abc")
        let digest = sha3_512(b"abc");
        assert_eq!(
            hex::encode(&digest[..8]),
            "b751850b1a57168a"
        );
    }
}
