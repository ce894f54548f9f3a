mod address;
mod builder;
mod codec;
mod hashing;
mod hd;
mod key;
mod script;
mod sighash;
mod signer;
mod transaction;

pub use address::{validate_address, Address, AddressType, AddressVersion, Network};
pub use builder::{BuilderState, SignedTransaction, TransactionBuilder};
pub use codec::{Decode, Encode, Reader};
pub use hashing::{double_hash, hash, keyed_hash, Hash, KeyedHasher, TransactionId, HASH_SIZE};
pub use hd::{ExtendedKey, COIN_TYPE};
pub use key::{address_payload, derive_address, KeyPair, PrivateKey, PublicKeyCompressed};
pub use script::{extract_address, pay_to_address_script, ScriptPublicKey};
pub use sighash::calc_signature_hash;
pub use signer::{sign_input, verify_input};
pub use transaction::{
    Outpoint, SubnetworkId, Transaction, TransactionInput, TransactionOutput, UtxoEntry,
    UtxoEntryReference,
};
