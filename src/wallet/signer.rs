use secp256k1::{ecdsa, schnorr, Message, PublicKey, Secp256k1, XOnlyPublicKey};
use tracing::debug;

use super::address::AddressVersion;
use super::hashing::hash;
use super::key::KeyPair;
use super::script::{pay_to_address_script, OP_DATA_33, OP_DATA_65};
use super::sighash::calc_signature_hash;
use super::transaction::{Transaction, UtxoEntry};
use crate::config::SIG_HASH_ALL;
use crate::{HoosatError, Result};

const SIGNATURE_SIZE: usize = 64;

/// Refuse to sign unless `keypair` is the key the spent script locks to.
pub fn check_signing_key(entry: &UtxoEntry, keypair: &KeyPair, input_index: usize) -> Result<AddressVersion> {
    let spk = &entry.script_public_key;
    let class = spk
        .class()
        .ok_or(HoosatError::SigningKeyMismatch(input_index))?;
    if pay_to_address_script(&keypair.address(class)) != *spk {
        return Err(HoosatError::SigningKeyMismatch(input_index));
    }
    Ok(class)
}

/// Sign input `input_index` and return its signature script. Schnorr for
/// x-only key scripts, ECDSA otherwise.
pub fn sign_input(
    tx: &Transaction,
    entries: &[UtxoEntry],
    input_index: usize,
    keypair: &KeyPair,
) -> Result<Vec<u8>> {
    let entry = entries
        .get(input_index)
        .ok_or(HoosatError::InvalidInputIndex(input_index))?;
    let class = check_signing_key(entry, keypair, input_index)?;

    let sighash = calc_signature_hash(tx, entries, input_index)?;
    let message = Message::from_slice(sighash.as_bytes())
        .map_err(|e| HoosatError::Signing(e.to_string()))?;

    let secp = Secp256k1::new();
    let signature: [u8; SIGNATURE_SIZE] = match class {
        AddressVersion::PubKey => {
            let schnorr_keypair = secp256k1::KeyPair::from_secret_key(&secp, keypair.secret_key());
            *secp.sign_schnorr_no_aux_rand(&message, &schnorr_keypair).as_ref()
        }
        AddressVersion::PubKeyEcdsa | AddressVersion::PubKeyHash => secp
            .sign_ecdsa(&message, keypair.secret_key())
            .serialize_compact(),
    };

    let mut script = Vec::with_capacity(1 + SIGNATURE_SIZE + 1 + 1 + 33);
    script.push(OP_DATA_65);
    script.extend_from_slice(&signature);
    script.push(SIG_HASH_ALL);
    if class == AddressVersion::PubKeyHash {
        script.push(OP_DATA_33);
        script.extend_from_slice(&keypair.public_key_bytes());
    }

    debug!(
        input = input_index,
        scheme = ?class,
        script_len = script.len(),
        "signed input"
    );
    Ok(script)
}

/// Check the signature script of `input_index` against the script it
/// spends. `Ok(false)` means a well-formed but invalid signature.
pub fn verify_input(tx: &Transaction, entries: &[UtxoEntry], input_index: usize) -> Result<bool> {
    let input = tx
        .inputs
        .get(input_index)
        .ok_or(HoosatError::InvalidInputIndex(input_index))?;
    let entry = entries
        .get(input_index)
        .ok_or(HoosatError::InvalidInputIndex(input_index))?;
    let spk = &entry.script_public_key;
    let class = spk.class().ok_or_else(|| {
        HoosatError::MalformedEncoding(format!("input {} spends a non-standard script", input_index))
    })?;

    let sig_script = &input.signature_script;
    let expected_len = match class {
        AddressVersion::PubKeyHash => 1 + SIGNATURE_SIZE + 1 + 1 + 33,
        _ => 1 + SIGNATURE_SIZE + 1,
    };
    if sig_script.len() != expected_len
        || sig_script[0] != OP_DATA_65
        || sig_script[1 + SIGNATURE_SIZE] != SIG_HASH_ALL
    {
        return Ok(false);
    }
    let signature = &sig_script[1..1 + SIGNATURE_SIZE];

    let sighash = calc_signature_hash(tx, entries, input_index)?;
    let message = Message::from_slice(sighash.as_bytes())
        .map_err(|e| HoosatError::Signing(e.to_string()))?;
    let secp = Secp256k1::verification_only();

    let valid = match class {
        AddressVersion::PubKey => {
            let (Ok(key), Ok(sig)) = (
                XOnlyPublicKey::from_slice(&spk.script[1..33]),
                schnorr::Signature::from_slice(signature),
            ) else {
                return Ok(false);
            };
            secp.verify_schnorr(&sig, &message, &key).is_ok()
        }
        AddressVersion::PubKeyEcdsa => {
            let (Ok(key), Ok(sig)) = (
                PublicKey::from_slice(&spk.script[1..34]),
                ecdsa::Signature::from_compact(signature),
            ) else {
                return Ok(false);
            };
            secp.verify_ecdsa(&message, &sig, &key).is_ok()
        }
        AddressVersion::PubKeyHash => {
            let key_bytes = &sig_script[expected_len - 33..];
            if sig_script[expected_len - 34] != OP_DATA_33
                || hash(key_bytes).as_bytes()[..] != spk.script[3..35]
            {
                return Ok(false);
            }
            let (Ok(key), Ok(sig)) = (
                PublicKey::from_slice(key_bytes),
                ecdsa::Signature::from_compact(signature),
            ) else {
                return Ok(false);
            };
            secp.verify_ecdsa(&message, &sig, &key).is_ok()
        }
    };
    Ok(valid)
}
