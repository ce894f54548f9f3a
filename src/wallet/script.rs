//! Standard locking scripts and their mapping to addresses.

use serde::{Deserialize, Serialize};

use super::address::{Address, AddressVersion, Network};
use crate::config::SCRIPT_VERSION;

pub const OP_DATA_32: u8 = 0x20;
pub const OP_DATA_33: u8 = 0x21;
pub const OP_DATA_65: u8 = 0x41;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_BLAKE2B: u8 = 0xaa;
pub const OP_CHECKSIGECDSA: u8 = 0xab;
pub const OP_CHECKSIG: u8 = 0xac;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScriptPublicKey {
    pub version: u16,
    #[serde(with = "hex_bytes")]
    pub script: Vec<u8>,
}

impl ScriptPublicKey {
    pub fn new(version: u16, script: Vec<u8>) -> Self {
        Self { version, script }
    }

    pub fn script(&self) -> &[u8] {
        &self.script
    }

    /// Which standard form this script takes, if any.
    pub fn class(&self) -> Option<AddressVersion> {
        if self.version != SCRIPT_VERSION {
            return None;
        }
        let s = &self.script;
        match s.len() {
            34 if s[0] == OP_DATA_32 && s[33] == OP_CHECKSIG => Some(AddressVersion::PubKey),
            35 if s[0] == OP_DATA_33 && s[34] == OP_CHECKSIGECDSA => {
                Some(AddressVersion::PubKeyEcdsa)
            }
            37 if s[0] == OP_DUP
                && s[1] == OP_BLAKE2B
                && s[2] == OP_DATA_32
                && s[35] == OP_EQUALVERIFY
                && s[36] == OP_CHECKSIGECDSA =>
            {
                Some(AddressVersion::PubKeyHash)
            }
            _ => None,
        }
    }
}

pub fn pay_to_address_script(address: &Address) -> ScriptPublicKey {
    let payload = &address.payload;
    let script = match address.version {
        AddressVersion::PubKey => {
            let mut s = Vec::with_capacity(34);
            s.push(OP_DATA_32);
            s.extend_from_slice(payload);
            s.push(OP_CHECKSIG);
            s
        }
        AddressVersion::PubKeyEcdsa => {
            let mut s = Vec::with_capacity(35);
            s.push(OP_DATA_33);
            s.extend_from_slice(payload);
            s.push(OP_CHECKSIGECDSA);
            s
        }
        AddressVersion::PubKeyHash => {
            let mut s = Vec::with_capacity(37);
            s.extend_from_slice(&[OP_DUP, OP_BLAKE2B, OP_DATA_32]);
            s.extend_from_slice(payload);
            s.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIGECDSA]);
            s
        }
    };
    ScriptPublicKey::new(SCRIPT_VERSION, script)
}

/// Inverse of [`pay_to_address_script`]; `None` for non-standard scripts.
pub fn extract_address(spk: &ScriptPublicKey, network: Network) -> Option<Address> {
    let version = spk.class()?;
    let payload = match version {
        AddressVersion::PubKey => &spk.script[1..33],
        AddressVersion::PubKeyEcdsa => &spk.script[1..34],
        AddressVersion::PubKeyHash => &spk.script[3..35],
    };
    Address::new(network, version, payload).ok()
}

pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::KeyPair;

    #[test]
    fn test_script_shapes() {
        let keypair = KeyPair::generate(Network::Mainnet);

        let p2pk = pay_to_address_script(&keypair.address(AddressVersion::PubKey));
        assert_eq!(p2pk.script.len(), 34);
        assert_eq!(p2pk.script[0], OP_DATA_32);
        assert_eq!(p2pk.script[33], OP_CHECKSIG);

        let ecdsa = pay_to_address_script(&keypair.address(AddressVersion::PubKeyEcdsa));
        assert_eq!(ecdsa.script.len(), 35);
        assert_eq!(&ecdsa.script[1..34], &keypair.public_key_bytes()[..]);

        let pkh = pay_to_address_script(&keypair.address(AddressVersion::PubKeyHash));
        assert_eq!(pkh.script.len(), 37);
        assert_eq!(pkh.version, 0);
    }

    #[test]
    fn test_extract_inverts_pay_to_address() {
        let keypair = KeyPair::generate(Network::Testnet);
        for version in [
            AddressVersion::PubKey,
            AddressVersion::PubKeyEcdsa,
            AddressVersion::PubKeyHash,
        ] {
            let address = keypair.address(version);
            let spk = pay_to_address_script(&address);
            assert_eq!(spk.class(), Some(version));
            assert_eq!(extract_address(&spk, Network::Testnet), Some(address));
        }
    }

    #[test]
    fn test_non_standard_scripts() {
        assert_eq!(ScriptPublicKey::new(0, vec![]).class(), None);
        assert_eq!(ScriptPublicKey::new(0, vec![0x6a, 0x01, 0x00]).class(), None);

        let keypair = KeyPair::generate(Network::Mainnet);
        let mut spk = pay_to_address_script(&keypair.address(AddressVersion::PubKey));
        spk.version = 1;
        assert_eq!(spk.class(), None);
        assert_eq!(extract_address(&spk, Network::Mainnet), None);
    }

    #[test]
    fn test_serde_hex_script() {
        let spk = ScriptPublicKey::new(0, vec![0x20, 0xab]);
        let json = serde_json::to_value(&spk).unwrap();
        assert_eq!(json["script"], "20ab");
        let back: ScriptPublicKey = serde_json::from_value(json).unwrap();
        assert_eq!(back, spk);
    }
}
