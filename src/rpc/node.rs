//! What the crate needs from a node. Transports implement these traits;
//! the crate itself never opens a connection.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::types::RpcTransaction;
use crate::wallet::{Address, SignedTransaction, TransactionId, UtxoEntryReference};
use crate::Result;

/// One item pushed by a UTXO change subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportMessage {
    /// Raw JSON body of a `utxosChanged` notification.
    Notification(String),
    /// The transport hit an error; the subscription should be re-established.
    Error(String),
}

/// Receiving end of a subscription. A closed channel means the connection
/// is gone.
pub type NotificationReceiver = mpsc::UnboundedReceiver<TransportMessage>;

#[async_trait]
pub trait NodeApi: Send + Sync {
    async fn submit_transaction(&self, transaction: &RpcTransaction) -> Result<TransactionId>;

    async fn get_utxos_by_addresses(&self, addresses: &[Address]) -> Result<Vec<UtxoEntryReference>>;
}

#[async_trait]
pub trait UtxoChangeSource: Send + Sync {
    /// Open a subscription for `addresses`. Resolving `Ok` is the node's
    /// acknowledgement.
    async fn subscribe_utxo_changes(&self, addresses: &[Address]) -> Result<NotificationReceiver>;
}

/// Submit a signed transaction and return the id the node reports.
pub async fn submit_signed<N: NodeApi + ?Sized>(
    node: &N,
    signed: &SignedTransaction,
) -> Result<TransactionId> {
    let rpc = RpcTransaction::from(&signed.transaction);
    let node_id = node.submit_transaction(&rpc).await?;
    if node_id != signed.id {
        warn!(
            local = %signed.id,
            node = %node_id,
            "node reported a different transaction id"
        );
    } else {
        info!(txid = %node_id, "transaction submitted");
    }
    Ok(node_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::{
        hash, pay_to_address_script, AddressVersion, KeyPair, Network, Outpoint,
        TransactionBuilder, UtxoEntry,
    };
    use parking_lot::Mutex;

    struct MockNode {
        submitted: Mutex<Vec<RpcTransaction>>,
        reply: Option<TransactionId>,
    }

    #[async_trait]
    impl NodeApi for MockNode {
        async fn submit_transaction(&self, transaction: &RpcTransaction) -> Result<TransactionId> {
            self.submitted.lock().push(transaction.clone());
            Ok(self.reply.unwrap_or_else(|| hash(b"node")))
        }

        async fn get_utxos_by_addresses(&self, _: &[Address]) -> Result<Vec<UtxoEntryReference>> {
            Ok(Vec::new())
        }
    }

    fn signed() -> SignedTransaction {
        let keypair = KeyPair::generate(Network::Mainnet);
        let address = keypair.address(AddressVersion::PubKeyEcdsa);
        let utxo = UtxoEntryReference {
            outpoint: Outpoint::new(hash(b"funding"), 0),
            entry: UtxoEntry::new(10_000, pay_to_address_script(&address), 1, false),
            address: Some(address.clone()),
        };
        let mut builder = TransactionBuilder::new(Network::Mainnet);
        builder.add_input(utxo, &keypair).unwrap();
        builder.add_output(&address.to_string(), 9_000).unwrap();
        builder.sign().unwrap()
    }

    #[tokio::test]
    async fn test_submit_signed_forwards_transaction() {
        let signed = signed();
        let node = MockNode {
            submitted: Mutex::new(Vec::new()),
            reply: Some(signed.id),
        };
        let id = submit_signed(&node, &signed).await.unwrap();
        assert_eq!(id, signed.id);
        let submitted = node.submitted.lock();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0], RpcTransaction::from(&signed.transaction));
    }

    #[tokio::test]
    async fn test_submit_signed_returns_node_id_on_mismatch() {
        let signed = signed();
        let node = MockNode {
            submitted: Mutex::new(Vec::new()),
            reply: None,
        };
        assert_eq!(submit_signed(&node, &signed).await.unwrap(), hash(b"node"));
    }
}
