use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use secp256k1::{PublicKey, Secp256k1, SecretKey};

use super::address::{Address, AddressType, AddressVersion, Network};
use super::hashing::hash;
use crate::{HoosatError, Result};

pub type PrivateKey = SecretKey;
pub type PublicKeyCompressed = PublicKey;

/// A secp256k1 key pair bound to the network its addresses are derived for.
/// The crate never persists the secret; `Debug` does not print it.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    secret_key: PrivateKey,
    public_key: PublicKeyCompressed,
    network: Network,
}

impl KeyPair {
    /// Draw a fresh key from the OS RNG. Out-of-range scalars (zero or at
    /// least the curve order) are redrawn.
    pub fn generate(network: Network) -> Self {
        let secp = Secp256k1::new();
        let mut rng = OsRng;

        loop {
            let mut secret_bytes = [0u8; 32];
            rng.fill_bytes(&mut secret_bytes);

            if let Ok(secret_key) = PrivateKey::from_slice(&secret_bytes) {
                let public_key = PublicKey::from_secret_key(&secp, &secret_key);
                return Self {
                    secret_key,
                    public_key,
                    network,
                };
            }
        }
    }

    /// Import a hex-encoded 32-byte scalar.
    pub fn import_private_key(hex_key: &str, network: Network) -> Result<Self> {
        let key_bytes = hex::decode(hex_key).map_err(|_| HoosatError::InvalidPrivateKey)?;

        if key_bytes.len() != 32 {
            return Err(HoosatError::InvalidPrivateKey);
        }

        let secret_key =
            PrivateKey::from_slice(&key_bytes).map_err(|_| HoosatError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key, network))
    }

    pub fn from_secret_key(secret_key: PrivateKey, network: Network) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
            network,
        }
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.secret_key.secret_bytes()
    }

    pub fn public_key_bytes(&self) -> [u8; 33] {
        self.public_key.serialize()
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    pub fn x_only_public_key_bytes(&self) -> [u8; 32] {
        self.public_key.x_only_public_key().0.serialize()
    }

    pub fn secret_key(&self) -> &PrivateKey {
        &self.secret_key
    }

    pub fn public_key(&self) -> &PublicKeyCompressed {
        &self.public_key
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Same key material, other network.
    pub fn with_network(&self, network: Network) -> Self {
        Self {
            network,
            ..self.clone()
        }
    }

    pub fn address(&self, address_type: AddressType) -> Address {
        derive_address(&self.public_key, self.network, address_type)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_hex())
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

/// Address payload for a key under the given variant.
pub fn address_payload(public_key: &PublicKeyCompressed, address_type: AddressType) -> Vec<u8> {
    match address_type {
        AddressVersion::PubKey => public_key.x_only_public_key().0.serialize().to_vec(),
        AddressVersion::PubKeyEcdsa => public_key.serialize().to_vec(),
        AddressVersion::PubKeyHash => hash(&public_key.serialize()).as_bytes().to_vec(),
    }
}

pub fn derive_address(
    public_key: &PublicKeyCompressed,
    network: Network,
    address_type: AddressType,
) -> Address {
    Address {
        network,
        version: address_type,
        payload: address_payload(public_key, address_type),
    }
}
