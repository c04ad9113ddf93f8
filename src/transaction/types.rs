/// Transaction types for StakeChain
use crate::crypto::{hash_to_hex, public_key_of, sha256, sign_digest, Hash, PublicKeyBytes};
use crate::error::ChainError;
use secp256k1::SecretKey;
use serde::{Deserialize, Serialize};

/// Maximum transaction size in bytes (100KB) to prevent DoS
pub const MAX_TRANSACTION_SIZE: usize = 100_000;

/// Proof of authorization to spend: a signature over the transaction id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
    pub public_key: PublicKeyBytes,
}

/// Destination and amount of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub public_key: PublicKeyBytes,
}

impl TxOutput {
    pub fn new(value: u64, public_key: PublicKeyBytes) -> Self {
        TxOutput { value, public_key }
    }
}

/// A signed value transfer. Only obtainable through [`Transaction::create`],
/// [`UnsignedTransaction::into_signed`] or the codec, and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub(crate) id: Hash,
    pub(crate) inputs: Vec<TxInput>,
    pub(crate) outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Builds, hashes and signs a one-input, one-output transfer.
    pub fn create(
        sender_key: &SecretKey,
        sender_public_key: &PublicKeyBytes,
        recipient_public_key: &PublicKeyBytes,
        amount: u64,
    ) -> Result<Self, ChainError> {
        let mut unsigned = UnsignedTransaction::new(
            vec![*sender_public_key],
            vec![TxOutput::new(amount, *recipient_public_key)],
        )?;
        unsigned.sign_input(0, sender_key)?;
        let tx = unsigned.into_signed()?;

        tracing::debug!(tx = %tx.id_hex(), amount, "created transfer");
        Ok(tx)
    }

    /// Canonical id preimage: all input keys, then all output keys, then all
    /// output values as big-endian u64. Signatures are never part of it.
    pub fn canonical_preimage<'a>(
        input_keys: impl IntoIterator<Item = &'a PublicKeyBytes>,
        outputs: &[TxOutput],
    ) -> Vec<u8> {
        let mut preimage = Vec::new();
        for key in input_keys {
            preimage.extend_from_slice(key.as_bytes());
        }
        for output in outputs {
            preimage.extend_from_slice(output.public_key.as_bytes());
        }
        for output in outputs {
            preimage.extend_from_slice(&output.value.to_be_bytes());
        }
        preimage
    }

    pub fn compute_id<'a>(
        input_keys: impl IntoIterator<Item = &'a PublicKeyBytes>,
        outputs: &[TxOutput],
    ) -> Hash {
        sha256(&Self::canonical_preimage(input_keys, outputs))
    }

    /// Recomputes the id from this transaction's own fields.
    pub fn recompute_id(&self) -> Hash {
        Self::compute_id(self.inputs.iter().map(|i| &i.public_key), &self.outputs)
    }

    pub fn id(&self) -> &Hash {
        &self.id
    }

    pub fn id_hex(&self) -> String {
        hash_to_hex(&self.id)
    }

    pub fn inputs(&self) -> &[TxInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }

    pub fn sender(&self) -> Option<&PublicKeyBytes> {
        self.inputs.first().map(|i| &i.public_key)
    }

    /// Sum of all output values, `None` on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        checked_total(&self.outputs)
    }
}

fn checked_total(outputs: &[TxOutput]) -> Option<u64> {
    outputs
        .iter()
        .try_fold(0u64, |acc, o| acc.checked_add(o.value))
}

/// A transaction whose id is fixed but whose inputs are still being signed.
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    id: Hash,
    input_keys: Vec<PublicKeyBytes>,
    signatures: Vec<Option<Vec<u8>>>,
    outputs: Vec<TxOutput>,
}

impl UnsignedTransaction {
    pub fn new(input_keys: Vec<PublicKeyBytes>, outputs: Vec<TxOutput>) -> Result<Self, ChainError> {
        if input_keys.is_empty() {
            return Err(ChainError::InvalidTransaction(
                "Transaction must have at least one input".to_string(),
            ));
        }
        if outputs.is_empty() {
            return Err(ChainError::InvalidTransaction(
                "Transaction must have at least one output".to_string(),
            ));
        }
        if checked_total(&outputs).is_none() {
            return Err(ChainError::InvalidTransaction(
                "Total output value overflows u64".to_string(),
            ));
        }

        let id = Transaction::compute_id(&input_keys, &outputs);
        Ok(UnsignedTransaction {
            id,
            signatures: vec![None; input_keys.len()],
            input_keys,
            outputs,
        })
    }

    pub fn id(&self) -> &Hash {
        &self.id
    }

    /// Signs the id for the input at `index`. The key must belong to that input.
    pub fn sign_input(&mut self, index: usize, secret_key: &SecretKey) -> Result<(), ChainError> {
        let expected = self.input_keys.get(index).ok_or_else(|| {
            ChainError::InvalidTransaction(format!(
                "Input index {} out of range ({} inputs)",
                index,
                self.input_keys.len()
            ))
        })?;
        if public_key_of(secret_key) != *expected {
            return Err(ChainError::KeyMismatch(expected.to_hex()));
        }

        self.signatures[index] = Some(sign_digest(secret_key, &self.id).to_vec());
        Ok(())
    }

    pub fn is_fully_signed(&self) -> bool {
        self.signatures.iter().all(Option::is_some)
    }

    /// Fails unless every input carries a signature.
    pub fn into_signed(self) -> Result<Transaction, ChainError> {
        if let Some(missing) = self.signatures.iter().position(Option::is_none) {
            return Err(ChainError::InvalidTransaction(format!(
                "Input {} of transaction {} is not signed",
                missing,
                hash_to_hex(&self.id)
            )));
        }

        let inputs = self
            .input_keys
            .into_iter()
            .zip(self.signatures)
            .map(|(public_key, signature)| TxInput {
                signature: signature.unwrap_or_default(),
                public_key,
            })
            .collect();

        Ok(Transaction {
            id: self.id,
            inputs,
            outputs: self.outputs,
        })
    }
}
