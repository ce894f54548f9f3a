//! Per-input signature hash.
//!
//! Every piece is hashed under the `TransactionSigningHash` domain key. The
//! hash for input `i` commits to the outpoint, script and amount it spends,
//! to every other input's outpoint, sequence and sig-op count, and to every
//! output, so neither the spent amount nor any output can be swapped after
//! signing.

use tracing::debug;

use super::codec::{write_var_bytes, Encode};
use super::hashing::{Hash, KeyedHasher};
use super::transaction::{Transaction, UtxoEntry};
use crate::config::{SIGNING_DOMAIN, SIG_HASH_ALL};
use crate::{HoosatError, Result};

fn signing_hasher() -> Result<KeyedHasher> {
    KeyedHasher::new(SIGNING_DOMAIN)
}

fn hash_previous_outpoints(tx: &Transaction) -> Result<Hash> {
    let mut hasher = signing_hasher()?;
    for input in &tx.inputs {
        hasher.update(&input.previous_outpoint.encode());
    }
    Ok(hasher.finalize())
}

fn hash_sequences(tx: &Transaction) -> Result<Hash> {
    let mut hasher = signing_hasher()?;
    for input in &tx.inputs {
        hasher.update(&input.sequence.to_le_bytes());
    }
    Ok(hasher.finalize())
}

fn hash_sig_op_counts(tx: &Transaction) -> Result<Hash> {
    let mut hasher = signing_hasher()?;
    for input in &tx.inputs {
        hasher.update(&[input.sig_op_count]);
    }
    Ok(hasher.finalize())
}

fn hash_outputs(tx: &Transaction) -> Result<Hash> {
    let mut hasher = signing_hasher()?;
    for output in &tx.outputs {
        hasher.update(&output.encode());
    }
    Ok(hasher.finalize())
}

fn hash_payload(tx: &Transaction) -> Result<Hash> {
    if tx.payload.is_empty() {
        return Ok(Hash::ZERO);
    }
    let mut buf = Vec::with_capacity(8 + tx.payload.len());
    write_var_bytes(&mut buf, &tx.payload);
    let mut hasher = signing_hasher()?;
    hasher.update(&buf);
    Ok(hasher.finalize())
}

/// Signature hash for `input_index`, given the entries the inputs spend
/// (same order as `tx.inputs`).
pub fn calc_signature_hash(
    tx: &Transaction,
    entries: &[UtxoEntry],
    input_index: usize,
) -> Result<Hash> {
    let input = tx
        .inputs
        .get(input_index)
        .ok_or(HoosatError::InvalidInputIndex(input_index))?;
    if entries.len() != tx.inputs.len() {
        return Err(HoosatError::IncompleteTransaction(format!(
            "{} inputs but {} spent entries",
            tx.inputs.len(),
            entries.len()
        )));
    }
    let entry = &entries[input_index];

    let mut hasher = signing_hasher()?;
    hasher
        .update(&tx.version.to_le_bytes())
        .update(hash_previous_outpoints(tx)?.as_bytes())
        .update(hash_sequences(tx)?.as_bytes())
        .update(hash_sig_op_counts(tx)?.as_bytes())
        .update(&input.previous_outpoint.encode())
        .update(&entry.script_public_key.encode())
        .update(&entry.amount.to_le_bytes())
        .update(&input.sequence.to_le_bytes())
        .update(&[input.sig_op_count])
        .update(hash_outputs(tx)?.as_bytes())
        .update(&tx.lock_time.to_le_bytes())
        .update(tx.subnetwork_id.as_bytes())
        .update(&tx.gas.to_le_bytes())
        .update(hash_payload(tx)?.as_bytes())
        .update(&[SIG_HASH_ALL]);

    let sighash = hasher.finalize();
    debug!(input = input_index, sighash = %sighash, "computed signature hash");
    Ok(sighash)
}
