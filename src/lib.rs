pub mod config;
pub mod logging;
pub mod payment;
pub mod rpc;
pub mod units;
pub mod wallet;

pub use config::StreamConfig;
pub use payment::{
    build_payment_uri, is_valid_payment_uri, parse_payment_uri, PaymentParams, PaymentRequest,
};
pub use rpc::{
    NodeApi, StreamEvent, StreamState, StreamStatus, TransportMessage, UtxoChangeSource,
    UtxoStreamManager,
};
pub use wallet::{
    Address, AddressType, ExtendedKey, Hash, KeyPair, Network, SignedTransaction, Transaction,
    TransactionBuilder, TransactionId, UtxoEntry, UtxoEntryReference,
};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HoosatError {
    #[error("Malformed encoding: {0}")]
    MalformedEncoding(String),

    #[error("Invalid key length: {0} bytes (max: 32)")]
    InvalidKeyLength(usize),

    #[error("Invalid private key")]
    InvalidPrivateKey,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Signing key does not match the script of input {0}")]
    SigningKeyMismatch(usize),

    #[error("Duplicate outpoint: {0}")]
    DuplicateOutpoint(String),

    #[error("Incomplete transaction: {0}")]
    IncompleteTransaction(String),

    #[error("Transaction is already signed")]
    AlreadySigned,

    #[error("Malformed payment URI: {0}")]
    MalformedUri(String),

    #[error("Invalid payment amount: {0}")]
    InvalidPaymentAmount(String),

    #[error("Subscription limit exceeded: {requested} addresses (max: {limit})")]
    SubscriptionLimitExceeded { requested: usize, limit: usize },

    #[error("Max reconnect attempts reached ({0})")]
    MaxReconnectAttemptsReached(u32),

    #[error("Stream transport error: {0}")]
    StreamTransportError(String),

    #[error("Output amount must be greater than zero")]
    InvalidOutputAmount,

    #[error("Total {0} amount overflows u64")]
    AmountOverflow(&'static str),

    #[error("Insufficient funds: inputs {inputs}, outputs {outputs}")]
    InsufficientFunds { inputs: u64, outputs: u64 },

    #[error("Input index out of bounds: {0}")]
    InvalidInputIndex(usize),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("HD derivation error: {0}")]
    HdDerivation(String),
}

impl From<serde_json::Error> for HoosatError {
    fn from(e: serde_json::Error) -> Self {
        HoosatError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HoosatError>;
