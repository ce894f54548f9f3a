mod node;
mod stream;
pub mod types;

pub use node::{submit_signed, NodeApi, NotificationReceiver, TransportMessage, UtxoChangeSource};
pub use stream::{
    AddressChange, StreamEvent, StreamState, StreamStatus, UtxoChangeSet, UtxoStreamManager,
};
pub use types::{RpcTransaction, UtxosChangedNotification};
