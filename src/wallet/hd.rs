use hmac::{Hmac, Mac};
use ripemd::Ripemd160;
use secp256k1::{PublicKey, Scalar, Secp256k1};
use sha2::{Digest, Sha256, Sha512};

use super::address::Network;
use super::key::{KeyPair, PrivateKey};
use crate::{HoosatError, Result};

type HmacSha512 = Hmac<Sha512>;

const HARDENED_OFFSET: u32 = 0x80000000;
const MASTER_KEY_DOMAIN: &[u8] = b"Bitcoin seed";

/// SLIP-44 coin type used on the account path.
pub const COIN_TYPE: u32 = 111111;

#[derive(Debug, Clone)]
pub struct ExtendedKey {
    keypair: KeyPair,
    chain_code: [u8; 32],
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_index: u32,
}

fn derivation_error(msg: &str) -> HoosatError {
    HoosatError::HdDerivation(msg.to_string())
}

impl ExtendedKey {
    pub fn from_seed(seed: &[u8], network: Network) -> Result<Self> {
        if !(16..=64).contains(&seed.len()) {
            return Err(derivation_error("seed must be 16 to 64 bytes"));
        }

        let mut mac = HmacSha512::new_from_slice(MASTER_KEY_DOMAIN)
            .map_err(|_| derivation_error("hmac init failed"))?;
        mac.update(seed);
        let bytes = mac.finalize().into_bytes();

        let (key_bytes, chain_code) = bytes.split_at(32);
        let secret_key = PrivateKey::from_slice(key_bytes)
            .map_err(|_| derivation_error("seed yields an invalid master key"))?;

        let mut chain_code_arr = [0u8; 32];
        chain_code_arr.copy_from_slice(chain_code);

        Ok(Self {
            keypair: KeyPair::from_secret_key(secret_key, network),
            chain_code: chain_code_arr,
            depth: 0,
            parent_fingerprint: [0u8; 4],
            child_index: 0,
        })
    }

    pub fn derive_child(&self, index: u32) -> Result<Self> {
        let is_hardened = index >= HARDENED_OFFSET;

        let mut mac = HmacSha512::new_from_slice(&self.chain_code)
            .map_err(|_| derivation_error("hmac init failed"))?;
        if is_hardened {
            mac.update(&[0u8]);
            mac.update(&self.keypair.to_bytes());
        } else {
            mac.update(&self.keypair.public_key_bytes());
        }
        mac.update(&index.to_be_bytes());
        let bytes = mac.finalize().into_bytes();

        let (tweak_bytes, chain_code) = bytes.split_at(32);
        let mut tweak_arr = [0u8; 32];
        tweak_arr.copy_from_slice(tweak_bytes);

        // Tweak >= n or a zero child key makes this index unusable.
        let tweak = Scalar::from_be_bytes(tweak_arr)
            .map_err(|_| derivation_error("child index yields an out-of-range tweak"))?;
        let child_secret = self
            .keypair
            .secret_key()
            .add_tweak(&tweak)
            .map_err(|_| derivation_error("child index yields an invalid key"))?;

        let mut chain_code_arr = [0u8; 32];
        chain_code_arr.copy_from_slice(chain_code);

        Ok(Self {
            keypair: KeyPair::from_secret_key(child_secret, self.keypair.network()),
            chain_code: chain_code_arr,
            depth: self
                .depth
                .checked_add(1)
                .ok_or_else(|| derivation_error("maximum depth exceeded"))?,
            parent_fingerprint: self.fingerprint(),
            child_index: index,
        })
    }

    /// Public half of [`derive_child`](Self::derive_child) for normal
    /// indices: the child public key computed without the secret.
    pub fn derive_child_public_key(&self, index: u32) -> Result<PublicKey> {
        if index >= HARDENED_OFFSET {
            return Err(derivation_error("hardened derivation requires the private key"));
        }
        let mut mac = HmacSha512::new_from_slice(&self.chain_code)
            .map_err(|_| derivation_error("hmac init failed"))?;
        mac.update(&self.keypair.public_key_bytes());
        mac.update(&index.to_be_bytes());
        let bytes = mac.finalize().into_bytes();

        let mut tweak_arr = [0u8; 32];
        tweak_arr.copy_from_slice(&bytes[..32]);
        let tweak = Scalar::from_be_bytes(tweak_arr)
            .map_err(|_| derivation_error("child index yields an out-of-range tweak"))?;

        let secp = Secp256k1::verification_only();
        self.keypair
            .public_key()
            .add_exp_tweak(&secp, &tweak)
            .map_err(|_| derivation_error("child index yields an invalid key"))
    }

    /// Parse and walk a path such as `m/44'/111111'/0'/0/5`.
    pub fn derive_path(&self, path: &str) -> Result<Self> {
        let rest = path
            .strip_prefix('m')
            .ok_or_else(|| derivation_error("path must start with 'm'"))?;
        if rest.is_empty() {
            return Ok(self.clone());
        }
        let rest = rest
            .strip_prefix('/')
            .ok_or_else(|| derivation_error("path segments must be separated by '/'"))?;

        let indices = rest
            .split('/')
            .map(|segment| {
                let (number, hardened) = match segment
                    .strip_suffix('\'')
                    .or_else(|| segment.strip_suffix('h'))
                {
                    Some(n) => (n, true),
                    None => (segment, false),
                };
                let index: u32 = number
                    .parse()
                    .map_err(|_| derivation_error(&format!("invalid path segment '{}'", segment)))?;
                if index >= HARDENED_OFFSET {
                    return Err(derivation_error(&format!("index {} out of range", index)));
                }
                Ok(if hardened { index + HARDENED_OFFSET } else { index })
            })
            .collect::<Result<Vec<u32>>>()?;

        indices
            .into_iter()
            .try_fold(self.clone(), |key, index| key.derive_child(index))
    }

    fn account_branch(&self, change: u32) -> Result<Self> {
        self.derive_child(44 + HARDENED_OFFSET)?
            .derive_child(COIN_TYPE + HARDENED_OFFSET)?
            .derive_child(HARDENED_OFFSET)?
            .derive_child(change)
    }

    pub fn derive_receive_key(&self, index: u32) -> Result<Self> {
        self.account_branch(0)?.derive_child(index)
    }

    pub fn derive_change_key(&self, index: u32) -> Result<Self> {
        self.account_branch(1)?.derive_child(index)
    }

    pub fn keypair(&self) -> &KeyPair {
        &self.keypair
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn child_index(&self) -> u32 {
        self.child_index
    }

    pub fn parent_fingerprint(&self) -> [u8; 4] {
        self.parent_fingerprint
    }

    /// First four bytes of RIPEMD160(SHA256(compressed public key)).
    pub fn fingerprint(&self) -> [u8; 4] {
        let sha = Sha256::digest(self.keypair.public_key_bytes());
        let hash160 = Ripemd160::digest(sha);
        let mut fingerprint = [0u8; 4];
        fingerprint.copy_from_slice(&hash160[..4]);
        fingerprint
    }
}
