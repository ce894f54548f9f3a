use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{HoosatError, Result};

const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const CHECKSUM_GROUPS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Simnet,
    Devnet,
}

impl Network {
    pub fn prefix(&self) -> &'static str {
        match self {
            Network::Mainnet => "hoosat",
            Network::Testnet => "hoosattest",
            Network::Simnet => "hoosatsim",
            Network::Devnet => "hoosatdev",
        }
    }

    pub fn from_prefix(prefix: &str) -> Result<Self> {
        match prefix {
            "hoosat" => Ok(Network::Mainnet),
            "hoosattest" => Ok(Network::Testnet),
            "hoosatsim" => Ok(Network::Simnet),
            "hoosatdev" => Ok(Network::Devnet),
            other => Err(HoosatError::InvalidAddress(format!("unknown prefix '{}'", other))),
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "simnet" => Ok(Network::Simnet),
            "devnet" => Ok(Network::Devnet),
            other => Err(HoosatError::InvalidAddress(format!("unknown network '{}'", other))),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Simnet => "simnet",
            Network::Devnet => "devnet",
        };
        f.write_str(name)
    }
}

/// Leading byte of the address payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressVersion {
    /// 32-byte x-only key, Schnorr.
    PubKey = 0,
    /// 33-byte compressed key, ECDSA.
    PubKeyEcdsa = 1,
    /// BLAKE2b-256 of a compressed key, ECDSA.
    PubKeyHash = 8,
}

/// Caller-facing name for the variant an address is derived as.
pub type AddressType = AddressVersion;

impl AddressVersion {
    pub fn from_u8(version: u8) -> Result<Self> {
        match version {
            0 => Ok(AddressVersion::PubKey),
            1 => Ok(AddressVersion::PubKeyEcdsa),
            8 => Ok(AddressVersion::PubKeyHash),
            v => Err(HoosatError::MalformedEncoding(format!("unknown address version {}", v))),
        }
    }

    pub fn payload_len(&self) -> usize {
        match self {
            AddressVersion::PubKey => 32,
            AddressVersion::PubKeyEcdsa => 33,
            AddressVersion::PubKeyHash => 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub network: Network,
    pub version: AddressVersion,
    pub payload: Vec<u8>,
}

impl Address {
    pub fn new(network: Network, version: AddressVersion, payload: &[u8]) -> Result<Self> {
        if payload.len() != version.payload_len() {
            return Err(HoosatError::MalformedEncoding(format!(
                "{:?} payload must be {} bytes, got {}",
                version,
                version.payload_len(),
                payload.len()
            )));
        }
        Ok(Self {
            network,
            version,
            payload: payload.to_vec(),
        })
    }

    pub fn encode(&self) -> String {
        let prefix = self.network.prefix();

        let mut data = Vec::with_capacity(1 + self.payload.len());
        data.push(self.version as u8);
        data.extend_from_slice(&self.payload);

        // Regrouping 8 -> 5 with padding cannot fail.
        let mut groups = bech32::convert_bits(&data, 8, 5, true).unwrap_or_default();
        let checksum = checksum(prefix, &groups);
        for i in (0..CHECKSUM_GROUPS).rev() {
            groups.push(((checksum >> (5 * i)) & 0x1f) as u8);
        }

        let mut out = String::with_capacity(prefix.len() + 1 + groups.len());
        out.push_str(prefix);
        out.push(':');
        out.extend(groups.iter().map(|&g| CHARSET[g as usize] as char));
        out
    }

    /// Parse an address string. Unknown prefixes fail with `InvalidAddress`;
    /// corrupted payloads (bad characters, padding, length, checksum) fail
    /// with `MalformedEncoding`.
    pub fn decode(address: &str) -> Result<Self> {
        let (prefix, body) = address
            .split_once(':')
            .ok_or_else(|| HoosatError::InvalidAddress(format!("missing prefix in '{}'", address)))?;

        let network = Network::from_prefix(prefix)?;

        if body.len() <= CHECKSUM_GROUPS {
            return Err(HoosatError::MalformedEncoding("address too short".to_string()));
        }
        if body.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(HoosatError::MalformedEncoding(
                "address must be lowercase".to_string(),
            ));
        }

        let groups = body
            .bytes()
            .map(|b| {
                CHARSET
                    .iter()
                    .position(|&c| c == b)
                    .map(|p| p as u8)
                    .ok_or_else(|| {
                        HoosatError::MalformedEncoding(format!("invalid character '{}'", b as char))
                    })
            })
            .collect::<Result<Vec<u8>>>()?;

        let (data_groups, checksum_groups) = groups.split_at(groups.len() - CHECKSUM_GROUPS);
        let expected = checksum(prefix, data_groups);
        let actual = checksum_groups
            .iter()
            .fold(0u64, |acc, &g| (acc << 5) | u64::from(g));
        if expected != actual {
            return Err(HoosatError::MalformedEncoding("checksum mismatch".to_string()));
        }

        let data = bech32::convert_bits(data_groups, 5, 8, false)
            .map_err(|e| HoosatError::MalformedEncoding(format!("invalid padding: {}", e)))?;
        let (&version, payload) = data
            .split_first()
            .ok_or_else(|| HoosatError::MalformedEncoding("empty payload".to_string()))?;

        Self::new(network, AddressVersion::from_u8(version)?, payload)
    }

    pub fn is_valid(address: &str) -> bool {
        Self::decode(address).is_ok()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Address {
    type Err = HoosatError;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

impl TryFrom<&str> for Address {
    type Error = HoosatError;

    fn try_from(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::decode(&s).map_err(serde::de::Error::custom)
    }
}

/// Decode and require a specific network. Every failure is reported as
/// `InvalidAddress`.
pub fn validate_address(address: &str, expected_network: Network) -> Result<Address> {
    let decoded = Address::decode(address).map_err(|e| match e {
        HoosatError::InvalidAddress(_) => e,
        other => HoosatError::InvalidAddress(other.to_string()),
    })?;
    if decoded.network != expected_network {
        return Err(HoosatError::InvalidAddress(format!(
            "expected a {} address, got {}",
            expected_network, decoded.network
        )));
    }
    Ok(decoded)
}

fn polymod(values: impl Iterator<Item = u8>) -> u64 {
    let mut c = 1u64;
    for d in values {
        let c0 = c >> 35;
        c = ((c & 0x07_ffff_ffff) << 5) ^ u64::from(d);
        if c0 & 0x01 != 0 {
            c ^= 0x98_f2bc_8e61;
        }
        if c0 & 0x02 != 0 {
            c ^= 0x79_b76d_99e2;
        }
        if c0 & 0x04 != 0 {
            c ^= 0xf3_3e5f_b3c4;
        }
        if c0 & 0x08 != 0 {
            c ^= 0xae_2eab_e2a8;
        }
        if c0 & 0x10 != 0 {
            c ^= 0x1e_4f43_e470;
        }
    }
    c ^ 1
}

fn checksum(prefix: &str, groups: &[u8]) -> u64 {
    polymod(
        prefix
            .bytes()
            .map(|b| b & 0x1f)
            .chain(std::iter::once(0))
            .chain(groups.iter().copied())
            .chain(std::iter::repeat(0).take(CHECKSUM_GROUPS)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(network: Network, version: AddressVersion) -> Address {
        let payload: Vec<u8> = (0..version.payload_len() as u8).collect();
        Address::new(network, version, &payload).unwrap()
    }

    #[test]
    fn test_prefixes() {
        assert!(sample(Network::Mainnet, AddressVersion::PubKey)
            .encode()
            .starts_with("hoosat:"));
        assert!(sample(Network::Testnet, AddressVersion::PubKey)
            .encode()
            .starts_with("hoosattest:"));
    }

    #[test]
    fn test_decode_recovers_every_field() {
        for network in [Network::Mainnet, Network::Testnet, Network::Simnet, Network::Devnet] {
            for version in [
                AddressVersion::PubKey,
                AddressVersion::PubKeyEcdsa,
                AddressVersion::PubKeyHash,
            ] {
                let address = sample(network, version);
                let decoded = Address::decode(&address.encode()).unwrap();
                assert_eq!(decoded, address);
            }
        }
    }

    #[test]
    fn test_encoded_lengths() {
        // 33 bytes -> 53 groups, 34 bytes -> 55 groups, plus 8 checksum groups.
        let pubkey = sample(Network::Mainnet, AddressVersion::PubKey).encode();
        assert_eq!(pubkey.len(), "hoosat:".len() + 61);
        let ecdsa = sample(Network::Mainnet, AddressVersion::PubKeyEcdsa).encode();
        assert_eq!(ecdsa.len(), "hoosat:".len() + 63);
    }

    #[test]
    fn test_checksum_detects_single_character_change() {
        let encoded = sample(Network::Mainnet, AddressVersion::PubKeyEcdsa).encode();
        let prefix_len = "hoosat:".len();
        for i in prefix_len..encoded.len() {
            let mut chars: Vec<char> = encoded.chars().collect();
            chars[i] = if chars[i] == 'q' { 'p' } else { 'q' };
            let tampered: String = chars.into_iter().collect();
            assert!(
                matches!(Address::decode(&tampered), Err(HoosatError::MalformedEncoding(_))),
                "tampered position {} accepted",
                i
            );
        }
    }

    #[test]
    fn test_prefix_is_bound_by_checksum() {
        let encoded = sample(Network::Mainnet, AddressVersion::PubKey).encode();
        let moved = encoded.replacen("hoosat:", "hoosattest:", 1);
        assert!(Address::decode(&moved).is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            Address::decode("hoosat:invalid_address"),
            Err(HoosatError::MalformedEncoding(_))
        ));
        assert!(matches!(
            Address::decode("bitcoin:1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"),
            Err(HoosatError::InvalidAddress(_))
        ));
        assert!(Address::decode("no-prefix").is_err());
        assert!(Address::decode("hoosat:").is_err());
        assert!(Address::decode("").is_err());
    }

    #[test]
    fn test_rejects_uppercase() {
        let encoded = sample(Network::Mainnet, AddressVersion::PubKey).encode();
        let (prefix, body) = encoded.split_once(':').unwrap();
        let upper = format!("{}:{}", prefix, body.to_uppercase());
        assert!(Address::decode(&upper).is_err());
    }

    #[test]
    fn test_wrong_payload_length() {
        assert!(Address::new(Network::Mainnet, AddressVersion::PubKey, &[0u8; 33]).is_err());
        assert!(Address::new(Network::Mainnet, AddressVersion::PubKeyEcdsa, &[0u8; 32]).is_err());
    }

    #[test]
    fn test_validate_address_network() {
        let encoded = sample(Network::Testnet, AddressVersion::PubKey).encode();
        assert!(validate_address(&encoded, Network::Testnet).is_ok());
        assert!(matches!(
            validate_address(&encoded, Network::Mainnet),
            Err(HoosatError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_network_names() {
        assert_eq!(Network::from_name("TESTNET").unwrap(), Network::Testnet);
        assert!(Network::from_name("regtest").is_err());
        assert_eq!(Network::Mainnet.to_string(), "mainnet");
    }

    #[test]
    fn test_serde_as_string() {
        let address = sample(Network::Mainnet, AddressVersion::PubKeyHash);
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, format!("\"{}\"", address));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }
}
