//! Canonical wire encoding of transactions.
//!
//! Integers are little-endian; counts and byte-string lengths are `u64`.
//! The same bytes feed the transaction identifier, so any change here is a
//! consensus change.

use super::hashing::{Hash, HASH_SIZE};
use super::script::ScriptPublicKey;
use super::transaction::{Outpoint, SubnetworkId, Transaction, TransactionInput, TransactionOutput};
use crate::config::{SUBNETWORK_ID_SIZE, TX_VERSION};
use crate::{HoosatError, Result};

pub trait Encode {
    fn encode_into(&self, buf: &mut Vec<u8>);

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }
}

pub trait Decode: Sized {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self>;

    /// Decode exactly one value; trailing bytes are an error.
    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let value = Self::decode_from(&mut reader)?;
        reader.finish()?;
        Ok(value)
    }
}

pub(crate) fn write_var_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    buf.extend_from_slice(bytes);
}

/// Cursor over an input buffer; every read is bounds-checked.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(HoosatError::MalformedEncoding(format!(
                "truncated input: need {} bytes at offset {}, have {}",
                n,
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    /// A `u64` element count, checked against the bytes left so a hostile
    /// count cannot drive a huge allocation.
    pub fn read_count(&mut self, min_element_size: usize) -> Result<usize> {
        let count = self.read_u64()?;
        let max = (self.remaining() / min_element_size.max(1)) as u64;
        if count > max {
            return Err(HoosatError::MalformedEncoding(format!(
                "count {} exceeds remaining input",
                count
            )));
        }
        Ok(count as usize)
    }

    pub fn read_var_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_count(1)?;
        Ok(self.take(len)?.to_vec())
    }

    pub fn read_hash(&mut self) -> Result<Hash> {
        Ok(Hash::from_bytes(self.array::<HASH_SIZE>()?))
    }

    pub fn finish(&self) -> Result<()> {
        if self.remaining() != 0 {
            return Err(HoosatError::MalformedEncoding(format!(
                "{} trailing bytes",
                self.remaining()
            )));
        }
        Ok(())
    }
}

impl Encode for Outpoint {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.transaction_id.as_bytes());
        buf.extend_from_slice(&self.index.to_le_bytes());
    }
}

impl Decode for Outpoint {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Outpoint {
            transaction_id: reader.read_hash()?,
            index: reader.read_u32()?,
        })
    }
}

impl Encode for ScriptPublicKey {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.version.to_le_bytes());
        write_var_bytes(buf, &self.script);
    }
}

impl Decode for ScriptPublicKey {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self> {
        let version = reader.read_u16()?;
        let script = reader.read_var_bytes()?;
        Ok(ScriptPublicKey { version, script })
    }
}

impl Encode for TransactionInput {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        self.previous_outpoint.encode_into(buf);
        write_var_bytes(buf, &self.signature_script);
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.push(self.sig_op_count);
    }
}

// outpoint + script length + sequence + sig op count
const MIN_INPUT_SIZE: usize = HASH_SIZE + 4 + 8 + 8 + 1;
// amount + script version + script length
const MIN_OUTPUT_SIZE: usize = 8 + 2 + 8;

impl Decode for TransactionInput {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(TransactionInput {
            previous_outpoint: Outpoint::decode_from(reader)?,
            signature_script: reader.read_var_bytes()?,
            sequence: reader.read_u64()?,
            sig_op_count: reader.read_u8()?,
        })
    }
}

impl Encode for TransactionOutput {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.amount.to_le_bytes());
        self.script_public_key.encode_into(buf);
    }
}

impl Decode for TransactionOutput {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(TransactionOutput {
            amount: reader.read_u64()?,
            script_public_key: ScriptPublicKey::decode_from(reader)?,
        })
    }
}

impl Encode for Transaction {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.version.to_le_bytes());

        buf.extend_from_slice(&(self.inputs.len() as u64).to_le_bytes());
        for input in &self.inputs {
            input.encode_into(buf);
        }

        buf.extend_from_slice(&(self.outputs.len() as u64).to_le_bytes());
        for output in &self.outputs {
            output.encode_into(buf);
        }

        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf.extend_from_slice(self.subnetwork_id.as_bytes());
        buf.extend_from_slice(&self.gas.to_le_bytes());
        write_var_bytes(buf, &self.payload);
    }
}

impl Decode for Transaction {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self> {
        let version = reader.read_u16()?;
        if version > TX_VERSION {
            return Err(HoosatError::MalformedEncoding(format!(
                "unsupported transaction version {}",
                version
            )));
        }

        let input_count = reader.read_count(MIN_INPUT_SIZE)?;
        let inputs = (0..input_count)
            .map(|_| TransactionInput::decode_from(reader))
            .collect::<Result<Vec<_>>>()?;

        let output_count = reader.read_count(MIN_OUTPUT_SIZE)?;
        let outputs = (0..output_count)
            .map(|_| TransactionOutput::decode_from(reader))
            .collect::<Result<Vec<_>>>()?;

        let lock_time = reader.read_u64()?;
        let subnetwork_id = SubnetworkId(reader.array::<SUBNETWORK_ID_SIZE>()?);
        let gas = reader.read_u64()?;
        let payload = reader.read_var_bytes()?;

        Ok(Transaction {
            version,
            inputs,
            outputs,
            lock_time,
            subnetwork_id,
            gas,
            payload,
        })
    }
}
