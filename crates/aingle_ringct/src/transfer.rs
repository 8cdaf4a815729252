//! Transfer transactions
//!
//! A transfer spends `I` ledger outputs, each hidden in a ring of up to
//! `ring_max` outputs, into `J` new outputs plus a public fee.
//!
//! For every input the spender publishes
//!
//! - a serial number `SHA3-512(ma')`, which links double spends,
//! - a fresh proof commitment to the spent amount,
//! - an [`ElrsSignature`] tying the two to one (hidden) ring member.
//!
//! One [`RpulpProof`] then shows `Σ in = Σ out + fee` over the proof
//! commitments and the output commitments, with every amount in range.
//!
//! Verification runs the ring signatures and the aggregate proof
//! concurrently.

use rand::{CryptoRng, RngCore};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::codec::{
    items_size, poly_a_size, poly_c_size, put_poly_c_vec, seq_size, var_bytes_size, Decode,
    Encode, Reader, Writer,
};
use crate::commitment::{commit_fresh, txo_open, CommitmentNtt, LedgerTxo, Txo, ValueCommitment};
use crate::descriptor::{
    check_count, check_memo, check_value, generate_outputs, InputDescriptor, OutputDescriptor,
};
use crate::elrs::{self, ElrsSignature, ElrsSigner, ElrsStatement};
use crate::error::{Result, RingCtError};
use crate::params::SchemeParameters;
use crate::relation::{amount_slots, commit_extended, RelationLayout};
use crate::ring::{NttPoly, Poly};
use crate::rpulp::{self, RpulpProof};
use crate::sampling::Seed;
use crate::serial::{key_image, serial_number, SerialNumber, SERIAL_NUMBER_SIZE};
use crate::transcript::sha3_512;

/// Spent output: the ring that hides it and its serial number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub ring: Vec<LedgerTxo>,
    pub serial_number: SerialNumber,
}

/// Transfer transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTx {
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<Txo>,
    /// Public fee
    pub fee: u64,
    pub memo: Vec<u8>,
    pub witness: Option<TransferWitness>,
}

/// Authorization and balance proof of a transfer
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferWitness {
    /// `ma'` per input
    pub key_images: Vec<Poly>,
    /// Fresh commitment to each spent amount
    pub proof_commitments: Vec<ValueCommitment>,
    /// Ring signature per input
    pub signatures: Vec<ElrsSignature>,
    pub b_hat: Vec<Poly>,
    pub c_hats: Vec<Poly>,
    pub u_p: Vec<i64>,
    pub proof: RpulpProof,
}

impl fmt::Debug for TransferWitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferWitness")
            .field("inputs", &self.key_images.len())
            .field("aggregate_messages", &self.c_hats.len())
            .finish_non_exhaustive()
    }
}

/// Number of aggregate commitments for `inputs → outputs`
fn aggregate_count(inputs: usize, outputs: usize) -> usize {
    if inputs == 1 {
        outputs + 3
    } else {
        inputs + outputs + 4
    }
}

impl TransferTx {
    /// Encoding of everything the witness signs
    pub fn body_bytes(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(self.body_size());
        self.encode_body(&mut w);
        w.into_bytes()
    }

    /// SHA3-512 of [`TransferTx::body_bytes`]
    pub fn body_hash(&self) -> Seed {
        sha3_512(&self.body_bytes())
    }

    /// Serial numbers of the spent outputs
    pub fn serial_numbers(&self) -> impl Iterator<Item = &SerialNumber> {
        self.inputs.iter().map(|input| &input.serial_number)
    }

    fn body_size(&self) -> usize {
        seq_size(&self.inputs) + seq_size(&self.outputs) + 8 + var_bytes_size(self.memo.len())
    }

    fn encode_body(&self, w: &mut Writer) {
        w.put_seq(&self.inputs);
        w.put_seq(&self.outputs);
        w.put_u64(self.fee);
        w.put_var_bytes(&self.memo);
    }
}

impl Encode for TxInput {
    fn encoded_size(&self) -> usize {
        seq_size(&self.ring) + SERIAL_NUMBER_SIZE
    }

    fn encode(&self, w: &mut Writer) {
        w.put_seq(&self.ring);
        w.put_raw(&self.serial_number.0);
    }
}

impl Decode for TxInput {
    fn decode(params: &SchemeParameters, r: &mut Reader<'_>) -> Result<Self> {
        let ring = r.get_seq(params, "ring", params.config().max_ring_size)?;
        let mut sn = [0u8; SERIAL_NUMBER_SIZE];
        sn.copy_from_slice(r.take(SERIAL_NUMBER_SIZE, "serial_number")?);
        Ok(Self {
            ring,
            serial_number: SerialNumber(sn),
        })
    }
}

fn check_ring(params: &SchemeParameters, ring: &[LedgerTxo]) -> Result<()> {
    check_count("ring member", ring.len(), params.config().max_ring_size)?;
    let mut ids = HashSet::with_capacity(ring.len());
    for member in ring {
        if member.id.len() > params.config().max_ledger_id_size {
            return Err(RingCtError::InvalidInput("ledger id too long".into()));
        }
        if !ids.insert(member.id.as_slice()) {
            return Err(RingCtError::InvalidInput(format!(
                "ring contains ledger id {} twice",
                hex::encode(&member.id)
            )));
        }
    }
    Ok(())
}

/// Spend `inputs` into `outputs`, paying `fee`
///
/// Checks every descriptor (ring shape, signer key, the decrypted amount and
/// the balance `Σ in = Σ out + fee`) before producing any proof.
pub fn transfer_tx_gen<R: RngCore + CryptoRng>(
    params: &SchemeParameters,
    rng: &mut R,
    inputs: &[InputDescriptor],
    outputs: &[OutputDescriptor],
    fee: u64,
    memo: &[u8],
) -> Result<TransferTx> {
    let cfg = params.config();
    check_count("input", inputs.len(), cfg.max_inputs)?;
    check_count("output", outputs.len(), cfg.max_outputs)?;
    check_memo(params, memo)?;
    check_value(params, fee)?;

    let mut spent = Vec::with_capacity(inputs.len());
    let mut total_in = 0u64;
    for (i, input) in inputs.iter().enumerate() {
        check_ring(params, &input.ring)?;
        let member = input.ring.get(input.signer_index).ok_or_else(|| {
            RingCtError::InvalidInput(format!(
                "input {}: signer index {} outside a ring of {}",
                i,
                input.signer_index,
                input.ring.len()
            ))
        })?;
        if member.txo.address_public_key != input.address_public_key {
            return Err(RingCtError::InvalidInput(format!(
                "input {}: spent output belongs to another address",
                i
            )));
        }
        let opening = txo_open(params, &member.txo, &input.value_secret_key)?;
        if opening.value != input.value {
            return Err(RingCtError::MismatchError(format!(
                "input {}: output holds {}, descriptor claims {}",
                i, opening.value, input.value
            )));
        }
        total_in = total_in
            .checked_add(input.value)
            .ok_or_else(|| RingCtError::BalanceError("input sum overflows".into()))?;
        spent.push(opening);
    }
    let mut total_out = fee;
    for o in outputs {
        check_value(params, o.value)?;
        total_out = total_out
            .checked_add(o.value)
            .ok_or_else(|| RingCtError::BalanceError("output sum overflows".into()))?;
    }
    if total_in != total_out {
        return Err(RingCtError::BalanceError(format!(
            "inputs hold {}, outputs and fee need {}",
            total_in, total_out
        )));
    }
    check_value(params, total_in)?;

    let (txos, openings) = generate_outputs(params, outputs)?;

    let mut key_images = Vec::with_capacity(inputs.len());
    let mut proof_commitments = Vec::with_capacity(inputs.len());
    let mut proof_openings = Vec::with_capacity(inputs.len());
    let mut tx_inputs = Vec::with_capacity(inputs.len());
    for input in inputs {
        let ma_p = key_image(
            params,
            &input.ring[input.signer_index],
            &input.address_secret_key,
        );
        let (cmt_p, opening_p) = commit_fresh(params, rng, input.value);
        tx_inputs.push(TxInput {
            ring: input.ring.clone(),
            serial_number: serial_number(&ma_p),
        });
        key_images.push(ma_p);
        proof_commitments.push(cmt_p);
        proof_openings.push(opening_p);
    }
    let distinct: HashSet<_> = tx_inputs.iter().map(|i| i.serial_number).collect();
    if distinct.len() != tx_inputs.len() {
        return Err(RingCtError::InvalidInput(
            "the same output is spent twice".into(),
        ));
    }

    let mut tx = TransferTx {
        inputs: tx_inputs,
        outputs: txos,
        fee,
        memo: memo.to_vec(),
        witness: None,
    };
    let message = tx.body_hash();

    let mut signatures = Vec::with_capacity(inputs.len());
    for (i, input) in inputs.iter().enumerate() {
        let st = ElrsStatement {
            ring: &input.ring,
            key_image: &key_images[i],
            proof_commitment: &proof_commitments[i],
            message: &message,
        };
        let signer = ElrsSigner {
            index: input.signer_index,
            address_secret_key: &input.address_secret_key,
            commitment_randomness: &spent[i].randomness,
            proof_randomness: &proof_openings[i].randomness,
        };
        signatures.push(elrs::sign(params, rng, &st, &signer)?);
    }
    log::trace!("transfer: {} ring signatures produced", signatures.len());

    let layout = RelationLayout::transfer(params, inputs.len(), outputs.len(), fee)?;
    let mut messages: Vec<Vec<u64>> = inputs
        .iter()
        .map(|input| input.value)
        .chain(outputs.iter().map(|o| o.value))
        .map(|v| amount_slots(params, v))
        .collect();
    if inputs.len() > 1 {
        messages.push(amount_slots(params, total_in));
    }
    for _ in &layout.relations {
        messages.push(amount_slots(params, 0));
    }
    let carries = layout.carries(params, &messages)?;
    for (rel, f) in layout.relations.iter().zip(carries) {
        messages[rel.carry] = f;
    }
    let agg = commit_extended(params, rng, &layout, &message, &messages, "transfer")?;

    let linked: Vec<CommitmentNtt> = proof_commitments
        .iter()
        .chain(tx.outputs.iter().map(|txo| &txo.value_commitment))
        .map(|cmt| cmt.to_ntt(params))
        .collect();
    let randomness: Vec<Vec<NttPoly>> = proof_openings
        .iter()
        .chain(&openings)
        .map(|o| o.randomness.clone())
        .collect();
    let proof = rpulp::prove(params, rng, &message, &layout, &linked, &randomness, &agg)?;

    let ring = params.ring_c();
    tx.witness = Some(TransferWitness {
        key_images,
        proof_commitments,
        signatures,
        b_hat: ring.intt_vec(&agg.b_hat),
        c_hats: ring.intt_vec(&agg.c_hats),
        u_p: agg.u_p,
        proof,
    });

    match transfer_tx_verify(params, &tx) {
        Ok(true) => Ok(tx),
        Ok(false) => Err(RingCtError::InternalFault(
            "generated transfer does not verify".into(),
        )),
        Err(e) => Err(RingCtError::InternalFault(format!(
            "generated transfer is malformed: {}",
            e
        ))),
    }
}

/// Verify a transfer transaction
///
/// Checks that the serial numbers match the key images and are pairwise
/// distinct, then verifies every ring signature and the aggregate proof in
/// parallel.
pub fn transfer_tx_verify(params: &SchemeParameters, tx: &TransferTx) -> Result<bool> {
    let cfg = params.config();
    let (i, j) = (tx.inputs.len(), tx.outputs.len());
    if i == 0 || i > cfg.max_inputs {
        return Err(RingCtError::structural("inputs", "count outside the allowed range"));
    }
    if j == 0 || j > cfg.max_outputs {
        return Err(RingCtError::structural("outputs", "count outside the allowed range"));
    }
    if tx.memo.len() > cfg.max_memo_size {
        return Err(RingCtError::structural("memo", "too long"));
    }
    for input in &tx.inputs {
        check_ring(params, &input.ring)
            .map_err(|e| RingCtError::structural("inputs.ring", e.to_string()))?;
    }
    for txo in &tx.outputs {
        txo.value_commitment.check_shape(params, "outputs.value_commitment")?;
    }
    let witness = tx
        .witness
        .as_ref()
        .ok_or_else(|| RingCtError::structural("witness", "missing"))?;
    if witness.key_images.len() != i
        || witness.proof_commitments.len() != i
        || witness.signatures.len() != i
    {
        return Err(RingCtError::structural(
            "witness",
            "per-input fields do not match the input count",
        ));
    }
    if tx.fee > params.max_value() {
        log::debug!("transfer: fee {} out of range", tx.fee);
        return Ok(false);
    }

    for (input, ki) in tx.inputs.iter().zip(&witness.key_images) {
        if ki.len() != params.ring_a().degree() {
            return Err(RingCtError::structural("key_images", "wrong degree"));
        }
        if serial_number(ki) != input.serial_number {
            log::debug!("transfer: serial number does not match its key image");
            return Ok(false);
        }
    }
    let distinct: HashSet<_> = tx.serial_numbers().collect();
    if distinct.len() != i {
        log::debug!("transfer: repeated serial number");
        return Ok(false);
    }
    for cmt in &witness.proof_commitments {
        cmt.check_shape(params, "proof_commitments")?;
    }

    let message = tx.body_hash();
    let layout = RelationLayout::transfer(params, i, j, tx.fee)?;
    let linked: Vec<CommitmentNtt> = witness
        .proof_commitments
        .iter()
        .chain(tx.outputs.iter().map(|txo| &txo.value_commitment))
        .map(|cmt| cmt.to_ntt(params))
        .collect();

    let (signatures, aggregate) = rayon::join(
        || {
            (0..i)
                .into_par_iter()
                .map(|n| {
                    let st = ElrsStatement {
                        ring: &tx.inputs[n].ring,
                        key_image: &witness.key_images[n],
                        proof_commitment: &witness.proof_commitments[n],
                        message: &message,
                    };
                    elrs::verify(params, &st, &witness.signatures[n])
                })
                .collect::<Result<Vec<bool>>>()
        },
        || {
            rpulp::verify(
                params,
                &message,
                &layout,
                &linked,
                &witness.b_hat,
                &witness.c_hats,
                &witness.u_p,
                &witness.proof,
            )
        },
    );
    let signatures_ok = signatures?.iter().all(|&ok| ok);
    let aggregate_ok = aggregate?;
    if !signatures_ok {
        log::debug!("transfer: ring signature rejected");
    }
    if !aggregate_ok {
        log::debug!("transfer: aggregate proof rejected");
    }
    Ok(signatures_ok && aggregate_ok)
}

impl Encode for TransferWitness {
    fn encoded_size(&self) -> usize {
        let d_a = self.key_images.first().map_or(0, Poly::len);
        let d_c = self.u_p.len();
        self.key_images.len() * poly_a_size(d_a)
            + items_size(&self.proof_commitments)
            + items_size(&self.signatures)
            + (self.b_hat.len() + self.c_hats.len()) * poly_c_size(d_c)
            + 4 * d_c
            + self.proof.encoded_size()
    }

    fn encode(&self, w: &mut Writer) {
        for ((ki, cmt), sig) in self
            .key_images
            .iter()
            .zip(&self.proof_commitments)
            .zip(&self.signatures)
        {
            w.put_poly_a(ki);
            cmt.encode(w);
            sig.encode(w);
        }
        put_poly_c_vec(w, &self.b_hat);
        put_poly_c_vec(w, &self.c_hats);
        w.put_i32s(&self.u_p);
        self.proof.encode(w);
    }
}

impl TransferWitness {
    /// Parse the witness of a transfer spending `inputs` into `outputs`
    ///
    /// The encoding does not carry the counts; they come from the body the
    /// witness belongs to.
    pub fn decode_with(
        params: &SchemeParameters,
        r: &mut Reader<'_>,
        inputs: usize,
        outputs: usize,
    ) -> Result<Self> {
        let cfg = params.config();
        if inputs == 0 || inputs > cfg.max_inputs || outputs == 0 || outputs > cfg.max_outputs {
            return Err(RingCtError::serialization(
                "witness",
                format!("no witness shape for {} inputs and {} outputs", inputs, outputs),
            ));
        }
        let mut key_images = Vec::with_capacity(inputs);
        let mut proof_commitments = Vec::with_capacity(inputs);
        let mut signatures = Vec::with_capacity(inputs);
        for _ in 0..inputs {
            key_images.push(params.read_poly_a(r, "key_images")?);
            proof_commitments.push(ValueCommitment::decode(params, r)?);
            signatures.push(ElrsSignature::decode(params, r)?);
        }
        let b_hat = params.read_poly_c_vec(r, cfg.commitment_rows, "b_hat")?;
        let c_hats = params.read_poly_c_vec(r, aggregate_count(inputs, outputs), "c_hats")?;
        let u_p = r.get_i32s(params.ring_c().degree(), cfg.carry_noise_bound, "u_p")?;
        let proof = RpulpProof::decode(params, r)?;
        Ok(Self {
            key_images,
            proof_commitments,
            signatures,
            b_hat,
            c_hats,
            u_p,
            proof,
        })
    }

    /// Parse a witness that must occupy all of `bytes`
    pub fn from_bytes_with(
        params: &SchemeParameters,
        bytes: &[u8],
        inputs: usize,
        outputs: usize,
    ) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let witness = Self::decode_with(params, &mut r, inputs, outputs)?;
        r.finish()?;
        Ok(witness)
    }
}

impl Encode for TransferTx {
    fn encoded_size(&self) -> usize {
        self.body_size() + 1 + self.witness.as_ref().map_or(0, Encode::encoded_size)
    }

    fn encode(&self, w: &mut Writer) {
        self.encode_body(w);
        match &self.witness {
            None => w.put_u8(0),
            Some(witness) => {
                w.put_u8(1);
                witness.encode(w);
            }
        }
    }
}

impl Decode for TransferTx {
    fn decode(params: &SchemeParameters, r: &mut Reader<'_>) -> Result<Self> {
        let cfg = params.config();
        let inputs: Vec<TxInput> = r.get_seq(params, "inputs", cfg.max_inputs)?;
        let outputs: Vec<Txo> = r.get_seq(params, "outputs", cfg.max_outputs)?;
        let fee = r.get_u64("fee")?;
        let memo = r.get_var_bytes("memo", cfg.max_memo_size)?;
        let witness = match r.get_u8("witness")? {
            0 => None,
            1 => Some(TransferWitness::decode_with(
                params,
                r,
                inputs.len(),
                outputs.len(),
            )?),
            _ => return Err(RingCtError::serialization("witness", "bad presence flag")),
        };
        Ok(Self {
            inputs,
            outputs,
            fee,
            memo,
            witness,
        })
    }
}
