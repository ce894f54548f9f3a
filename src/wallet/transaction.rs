use std::fmt;

use serde::{Deserialize, Serialize};

use super::address::Address;
use super::codec::Encode;
use super::hashing::{double_hash, TransactionId};
use super::script::ScriptPublicKey;
use crate::config::{DEFAULT_SEQUENCE, DEFAULT_SIG_OP_COUNT, SUBNETWORK_ID_NATIVE, TX_VERSION};

/// Reference to output `index` of transaction `transaction_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outpoint {
    pub transaction_id: TransactionId,
    pub index: u32,
}

impl Outpoint {
    pub fn new(transaction_id: TransactionId, index: u32) -> Self {
        Self {
            transaction_id,
            index,
        }
    }
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.transaction_id, self.index)
    }
}

/// An observed unspent output. Never mutated; a spend removes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtxoEntry {
    pub amount: u64,
    pub script_public_key: ScriptPublicKey,
    pub block_daa_score: u64,
    pub is_coinbase: bool,
}

impl UtxoEntry {
    pub fn new(
        amount: u64,
        script_public_key: ScriptPublicKey,
        block_daa_score: u64,
        is_coinbase: bool,
    ) -> Self {
        Self {
            amount,
            script_public_key,
            block_daa_score,
            is_coinbase,
        }
    }
}

/// A UTXO together with where it lives, as returned by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtxoEntryReference {
    pub address: Option<Address>,
    pub outpoint: Outpoint,
    pub entry: UtxoEntry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SubnetworkId(pub [u8; 20]);

impl SubnetworkId {
    pub const NATIVE: SubnetworkId = SubnetworkId(SUBNETWORK_ID_NATIVE);

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for SubnetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInput {
    pub previous_outpoint: Outpoint,
    /// Empty until the input is signed.
    pub signature_script: Vec<u8>,
    pub sequence: u64,
    pub sig_op_count: u8,
}

impl TransactionInput {
    pub fn unsigned(previous_outpoint: Outpoint) -> Self {
        Self {
            previous_outpoint,
            signature_script: Vec::new(),
            sequence: DEFAULT_SEQUENCE,
            sig_op_count: DEFAULT_SIG_OP_COUNT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOutput {
    pub amount: u64,
    pub script_public_key: ScriptPublicKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: u16,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub lock_time: u64,
    pub subnetwork_id: SubnetworkId,
    pub gas: u64,
    pub payload: Vec<u8>,
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            version: TX_VERSION,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
            subnetwork_id: SubnetworkId::NATIVE,
            gas: 0,
            payload: Vec::new(),
        }
    }

    /// `double_hash` of the wire encoding, signature scripts included.
    pub fn id(&self) -> TransactionId {
        double_hash(&self.encode())
    }

    /// `None` when the sum does not fit in a `u64`.
    pub fn total_output_amount(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |total, o| total.checked_add(o.amount))
    }

    pub fn is_fully_signed(&self) -> bool {
        !self.inputs.is_empty() && self.inputs.iter().all(|i| !i.signature_script.is_empty())
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::hashing::hash;

    fn sample_tx() -> Transaction {
        let mut tx = Transaction::new();
        tx.inputs.push(TransactionInput::unsigned(Outpoint::new(hash(b"prev"), 0)));
        tx.outputs.push(TransactionOutput {
            amount: 900_000,
            script_public_key: ScriptPublicKey::new(0, vec![0x20; 34]),
        });
        tx
    }

    #[test]
    fn test_transaction_creation() {
        let tx = Transaction::new();
        assert_eq!(tx.version, 0);
        assert!(tx.inputs.is_empty());
        assert!(tx.outputs.is_empty());
        assert_eq!(tx.subnetwork_id, SubnetworkId::NATIVE);
    }

    #[test]
    fn test_id_is_deterministic() {
        let tx = sample_tx();
        assert_eq!(tx.id(), tx.clone().id());
    }

    #[test]
    fn test_signature_script_changes_id() {
        let unsigned = sample_tx();
        let mut signed = unsigned.clone();
        signed.inputs[0].signature_script = vec![0x41; 66];
        assert_ne!(unsigned.id(), signed.id());
        assert!(!unsigned.is_fully_signed());
        assert!(signed.is_fully_signed());
    }

    #[test]
    fn test_outpoint_display() {
        let outpoint = Outpoint::new(hash(b"prev"), 3);
        assert!(outpoint.to_string().ends_with(":3"));
    }
}
