//! JSON shapes exchanged with the node.

use serde::{Deserialize, Serialize};

use crate::wallet::{
    Address, Outpoint, ScriptPublicKey, Transaction, TransactionId, UtxoEntry, UtxoEntryReference,
};
use crate::{HoosatError, Result};

// REST/notification response structures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestUtxoEntry {
    pub address: String,
    pub outpoint: RestOutPoint,
    #[serde(rename = "utxoEntry")]
    pub utxo_entry: RestUtxoEntryData,
    #[serde(rename = "isSpent", default)]
    pub is_spent: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestOutPoint {
    #[serde(rename = "transactionId")]
    pub transaction_id: String,
    pub index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestUtxoEntryData {
    #[serde(deserialize_with = "deserialize_string_or_u64")]
    pub amount: u64,
    #[serde(rename = "scriptPublicKey")]
    pub script_public_key: RestScriptPublicKeyData,
    #[serde(rename = "blockDaaScore", deserialize_with = "deserialize_string_or_u64", default)]
    pub block_daa_score: u64,
    #[serde(rename = "isCoinbase", default)]
    pub is_coinbase: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestScriptPublicKeyData {
    #[serde(default)]
    pub version: u16,
    #[serde(rename = "scriptPublicKey")]
    pub script: String,
}

impl TryFrom<RestUtxoEntry> for UtxoEntryReference {
    type Error = HoosatError;

    fn try_from(e: RestUtxoEntry) -> Result<Self> {
        let address = Address::decode(&e.address)
            .map_err(|_| HoosatError::InvalidAddress(e.address.clone()))?;
        let transaction_id: TransactionId = e.outpoint.transaction_id.parse().map_err(|_| {
            HoosatError::MalformedEncoding(format!(
                "invalid transaction id '{}'",
                e.outpoint.transaction_id
            ))
        })?;
        let script = hex::decode(&e.utxo_entry.script_public_key.script)
            .map_err(|err| HoosatError::MalformedEncoding(format!("script hex: {}", err)))?;

        Ok(UtxoEntryReference {
            address: Some(address),
            outpoint: Outpoint::new(transaction_id, e.outpoint.index),
            entry: UtxoEntry::new(
                e.utxo_entry.amount,
                ScriptPublicKey::new(e.utxo_entry.script_public_key.version, script),
                e.utxo_entry.block_daa_score,
                e.utxo_entry.is_coinbase,
            ),
        })
    }
}

/// Parse a flat array of UTXO entries, as returned by the node's
/// address UTXO query. Spent entries are skipped.
pub fn parse_utxo_entries(json: &str) -> Result<Vec<UtxoEntryReference>> {
    let entries: Vec<RestUtxoEntry> = serde_json::from_str(json)?;
    entries
        .into_iter()
        .filter(|e| !e.is_spent.unwrap_or(false))
        .map(UtxoEntryReference::try_from)
        .collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RestUtxosChangedNotification {
    pub added: Vec<RestUtxoEntry>,
    pub removed: Vec<RestUtxoEntry>,
}

/// A decoded change notification: entries that appeared and entries that
/// were spent, each carrying the address it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxosChangedNotification {
    pub added: Vec<UtxoEntryReference>,
    pub removed: Vec<UtxoEntryReference>,
}

impl UtxosChangedNotification {
    pub fn parse(raw: &str) -> Result<Self> {
        let rest: RestUtxosChangedNotification = serde_json::from_str(raw)?;
        let convert = |entries: Vec<RestUtxoEntry>| {
            entries
                .into_iter()
                .map(UtxoEntryReference::try_from)
                .collect::<Result<Vec<_>>>()
        };
        Ok(Self {
            added: convert(rest.added)?,
            removed: convert(rest.removed)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcOutpoint {
    pub transaction_id: String,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcScriptPublicKey {
    pub version: u16,
    pub script_public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransactionInput {
    pub previous_outpoint: RpcOutpoint,
    pub signature_script: String,
    pub sequence: u64,
    pub sig_op_count: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransactionOutput {
    pub amount: u64,
    pub script_public_key: RpcScriptPublicKey,
}

/// Transaction as the node's submit endpoint expects it: byte fields hex
/// encoded, integers as numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    pub version: u16,
    pub inputs: Vec<RpcTransactionInput>,
    pub outputs: Vec<RpcTransactionOutput>,
    pub lock_time: u64,
    pub subnetwork_id: String,
    pub gas: u64,
    pub payload: String,
}

impl From<&Transaction> for RpcTransaction {
    fn from(tx: &Transaction) -> Self {
        Self {
            version: tx.version,
            inputs: tx
                .inputs
                .iter()
                .map(|input| RpcTransactionInput {
                    previous_outpoint: RpcOutpoint {
                        transaction_id: input.previous_outpoint.transaction_id.to_hex(),
                        index: input.previous_outpoint.index,
                    },
                    signature_script: hex::encode(&input.signature_script),
                    sequence: input.sequence,
                    sig_op_count: input.sig_op_count,
                })
                .collect(),
            outputs: tx
                .outputs
                .iter()
                .map(|output| RpcTransactionOutput {
                    amount: output.amount,
                    script_public_key: RpcScriptPublicKey {
                        version: output.script_public_key.version,
                        script_public_key: hex::encode(&output.script_public_key.script),
                    },
                })
                .collect(),
            lock_time: tx.lock_time,
            subnetwork_id: tx.subnetwork_id.to_string(),
            gas: tx.gas,
            payload: hex::encode(&tx.payload),
        }
    }
}

fn deserialize_string_or_u64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom("expected an unsigned integer")),
        serde_json::Value::String(s) => s
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid integer string '{}'", s))),
        _ => Err(serde::de::Error::custom("expected a number or a string")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::{
        hash, pay_to_address_script, AddressVersion, KeyPair, Network, TransactionInput,
        TransactionOutput,
    };

    fn entry_json(address: &Address, txid: &str, amount: &str) -> String {
        let spk = pay_to_address_script(address);
        format!(
            r#"{{"address":"{}","outpoint":{{"transactionId":"{}","index":1}},"utxoEntry":{{"amount":{},"scriptPublicKey":{{"version":0,"scriptPublicKey":"{}"}},"blockDaaScore":"42","isCoinbase":false}}}}"#,
            address,
            txid,
            amount,
            hex::encode(&spk.script)
        )
    }

    #[test]
    fn test_parse_utxo_entries() {
        let address = KeyPair::generate(Network::Mainnet).address(AddressVersion::PubKeyEcdsa);
        let txid = hash(b"tx").to_hex();
        let json = format!(
            "[{},{}]",
            entry_json(&address, &txid, "100000000"),
            entry_json(&address, &txid, "\"250\"")
        );
        let entries = parse_utxo_entries(&json).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entry.amount, 100_000_000);
        assert_eq!(entries[1].entry.amount, 250);
        assert_eq!(entries[0].entry.block_daa_score, 42);
        assert_eq!(entries[0].address.as_ref(), Some(&address));
        assert_eq!(entries[0].outpoint.index, 1);
        assert_eq!(
            entries[0].entry.script_public_key,
            pay_to_address_script(&address)
        );
    }

    #[test]
    fn test_spent_entries_are_skipped() {
        let address = KeyPair::generate(Network::Mainnet).address(AddressVersion::PubKey);
        let txid = hash(b"tx").to_hex();
        let spent = entry_json(&address, &txid, "5").replacen('{', r#"{"isSpent":true,"#, 1);
        let json = format!("[{},{}]", spent, entry_json(&address, &txid, "6"));
        let entries = parse_utxo_entries(&json).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry.amount, 6);
    }

    #[test]
    fn test_parse_notification() {
        let address = KeyPair::generate(Network::Testnet).address(AddressVersion::PubKeyEcdsa);
        let txid = hash(b"n").to_hex();
        let raw = format!(r#"{{"added":[{}]}}"#, entry_json(&address, &txid, "7"));
        let parsed = UtxosChangedNotification::parse(&raw).unwrap();
        assert_eq!(parsed.added.len(), 1);
        assert!(parsed.removed.is_empty());
    }

    #[test]
    fn test_bad_payloads_are_rejected() {
        let address = KeyPair::generate(Network::Mainnet).address(AddressVersion::PubKey);
        assert!(matches!(
            UtxosChangedNotification::parse("not json"),
            Err(HoosatError::Serialization(_))
        ));
        let bad_txid = format!(r#"{{"added":[{}]}}"#, entry_json(&address, "zz", "1"));
        assert!(matches!(
            UtxosChangedNotification::parse(&bad_txid),
            Err(HoosatError::MalformedEncoding(_))
        ));
        let negative = format!(r#"{{"added":[{}]}}"#, entry_json(&address, &hash(b"x").to_hex(), "-1"));
        assert!(UtxosChangedNotification::parse(&negative).is_err());
    }

    #[test]
    fn test_rpc_transaction_from_transaction() {
        let mut tx = Transaction::new();
        let mut input = TransactionInput::unsigned(Outpoint::new(hash(b"prev"), 3));
        input.signature_script = vec![0x41, 0x01];
        tx.inputs.push(input);
        tx.outputs.push(TransactionOutput {
            amount: 500,
            script_public_key: ScriptPublicKey::new(0, vec![0xab]),
        });
        tx.payload = vec![0xde, 0xad];

        let rpc = RpcTransaction::from(&tx);
        assert_eq!(rpc.inputs[0].previous_outpoint.transaction_id, hash(b"prev").to_hex());
        assert_eq!(rpc.inputs[0].signature_script, "4101");
        assert_eq!(rpc.outputs[0].script_public_key.script_public_key, "ab");
        assert_eq!(rpc.payload, "dead");
        assert_eq!(rpc.subnetwork_id, "0".repeat(40));

        let json = serde_json::to_value(&rpc).unwrap();
        assert_eq!(json["lockTime"], 0);
        assert_eq!(json["outputs"][0]["scriptPublicKey"]["scriptPublicKey"], "ab");
    }
}
