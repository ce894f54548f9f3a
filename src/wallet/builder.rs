//! Accumulate inputs and outputs, then sign everything in one step.
//!
//! The builder never selects UTXOs or computes fees: whatever the inputs
//! carry above the outputs is the fee, and change is just another output.

use std::collections::HashSet;

use tracing::{debug, info};

use super::address::{validate_address, Network};
use super::codec::Encode;
use super::hashing::TransactionId;
use super::key::KeyPair;
use super::script::pay_to_address_script;
use super::signer::{check_signing_key, sign_input};
use super::transaction::{
    Outpoint, SubnetworkId, Transaction, TransactionInput, TransactionOutput, UtxoEntry,
    UtxoEntryReference,
};
use crate::rpc::types::RpcTransaction;
use crate::{HoosatError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    Empty,
    Accumulating,
    Signed,
}

/// A fully signed transaction and its identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub id: TransactionId,
}

impl SignedTransaction {
    pub fn to_bytes(&self) -> Vec<u8> {
        self.transaction.encode()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Shape expected by the node's submit endpoint.
    pub fn to_rpc_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(RpcTransaction::from(&self.transaction))?)
    }
}

struct PendingInput {
    entry: UtxoEntry,
    keypair: KeyPair,
}

/// Single-owner builder; `&mut self` on every mutation keeps it that way.
pub struct TransactionBuilder {
    network: Network,
    transaction: Transaction,
    pending: Vec<PendingInput>,
    outpoints: HashSet<Outpoint>,
    signed: Option<SignedTransaction>,
}

impl TransactionBuilder {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            transaction: Transaction::new(),
            pending: Vec::new(),
            outpoints: HashSet::new(),
            signed: None,
        }
    }

    pub fn state(&self) -> BuilderState {
        if self.signed.is_some() {
            BuilderState::Signed
        } else if self.transaction.inputs.is_empty() && self.transaction.outputs.is_empty() {
            BuilderState::Empty
        } else {
            BuilderState::Accumulating
        }
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.signed.is_some() {
            return Err(HoosatError::AlreadySigned);
        }
        Ok(())
    }

    /// Queue `utxo` for spending with `keypair`. The key is checked against
    /// the spent script here, so a mismatched key fails with
    /// `SigningKeyMismatch` from this call and never reaches `sign`.
    pub fn add_input(&mut self, utxo: UtxoEntryReference, keypair: &KeyPair) -> Result<&mut Self> {
        self.ensure_mutable()?;

        if self.outpoints.contains(&utxo.outpoint) {
            return Err(HoosatError::DuplicateOutpoint(utxo.outpoint.to_string()));
        }
        check_signing_key(&utxo.entry, keypair, self.transaction.inputs.len())?;
        self.total_input_amount()
            .and_then(|total| total.checked_add(utxo.entry.amount))
            .ok_or(HoosatError::AmountOverflow("input"))?;

        debug!(outpoint = %utxo.outpoint, amount = utxo.entry.amount, "adding input");
        self.outpoints.insert(utxo.outpoint);
        self.transaction
            .inputs
            .push(TransactionInput::unsigned(utxo.outpoint));
        self.pending.push(PendingInput {
            entry: utxo.entry,
            keypair: keypair.clone(),
        });
        Ok(self)
    }

    pub fn add_output(&mut self, address: &str, amount: u64) -> Result<&mut Self> {
        self.ensure_mutable()?;

        let address = validate_address(address, self.network)?;
        if amount == 0 {
            return Err(HoosatError::InvalidOutputAmount);
        }
        self.transaction
            .total_output_amount()
            .and_then(|total| total.checked_add(amount))
            .ok_or(HoosatError::AmountOverflow("output"))?;

        debug!(address = %address, amount, "adding output");
        self.transaction.outputs.push(TransactionOutput {
            amount,
            script_public_key: pay_to_address_script(&address),
        });
        Ok(self)
    }

    pub fn set_payload(&mut self, payload: &[u8]) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.transaction.payload = payload.to_vec();
        Ok(self)
    }

    pub fn set_lock_time(&mut self, lock_time: u64) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.transaction.lock_time = lock_time;
        Ok(self)
    }

    pub fn set_gas(&mut self, gas: u64) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.transaction.gas = gas;
        Ok(self)
    }

    pub fn set_subnetwork_id(&mut self, subnetwork_id: SubnetworkId) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.transaction.subnetwork_id = subnetwork_id;
        Ok(self)
    }

    /// `None` when the sum does not fit in a `u64`.
    pub fn total_input_amount(&self) -> Option<u64> {
        self.pending
            .iter()
            .try_fold(0u64, |total, p| total.checked_add(p.entry.amount))
    }

    /// Inputs minus outputs; zero while outputs exceed inputs.
    pub fn fee(&self) -> u64 {
        match (self.total_input_amount(), self.transaction.total_output_amount()) {
            (Some(inputs), Some(outputs)) => inputs.saturating_sub(outputs),
            _ => 0,
        }
    }

    /// The transaction as it currently stands (unsigned until `sign`).
    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    /// Sign every input in insertion order. Nothing is committed unless all
    /// inputs sign.
    pub fn sign(&mut self) -> Result<SignedTransaction> {
        self.ensure_mutable()?;

        if self.transaction.inputs.is_empty() {
            return Err(HoosatError::IncompleteTransaction("no inputs".to_string()));
        }
        if self.transaction.outputs.is_empty() {
            return Err(HoosatError::IncompleteTransaction("no outputs".to_string()));
        }

        let inputs = self
            .total_input_amount()
            .ok_or(HoosatError::AmountOverflow("input"))?;
        let outputs = self
            .transaction
            .total_output_amount()
            .ok_or(HoosatError::AmountOverflow("output"))?;
        if outputs > inputs {
            return Err(HoosatError::InsufficientFunds { inputs, outputs });
        }

        let entries: Vec<UtxoEntry> = self.pending.iter().map(|p| p.entry.clone()).collect();
        let scripts = self
            .pending
            .iter()
            .enumerate()
            .map(|(i, p)| sign_input(&self.transaction, &entries, i, &p.keypair))
            .collect::<Result<Vec<_>>>()?;

        let mut transaction = self.transaction.clone();
        for (input, script) in transaction.inputs.iter_mut().zip(scripts) {
            input.signature_script = script;
        }

        let signed = SignedTransaction {
            id: transaction.id(),
            transaction,
        };
        info!(
            id = %signed.id,
            inputs = signed.transaction.inputs.len(),
            outputs = signed.transaction.outputs.len(),
            fee = inputs - outputs,
            "transaction signed"
        );

        self.transaction = signed.transaction.clone();
        self.signed = Some(signed.clone());
        Ok(signed)
    }

    pub fn signed(&self) -> Option<&SignedTransaction> {
        self.signed.as_ref()
    }
}
