use crate::config::ConsensusConfig;
use crate::crypto::{hash_to_hex, Hash, PublicKeyBytes};
use crate::error::ChainError;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// `prev_block_hash` of the genesis block.
pub const GENESIS_PREV_HASH: Hash = [0u8; 32];

/// An immutable, hash-identified batch of transactions linked to its
/// predecessor. Appending it to a chain is the storage layer's job.
///
/// The hash covers only `prev_block_hash`, the transaction ids and the
/// timestamp. `validator` and `nonce` travel in the encoded form but are not
/// committed to, so a matching hash does not authenticate the proposer;
/// callers must check `validator` against their own selection result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Milliseconds since the Unix epoch.
    pub(crate) timestamp: u64,
    pub(crate) transactions: Vec<Transaction>,
    pub(crate) prev_block_hash: Hash,
    pub(crate) hash: Hash,
    pub(crate) validator: PublicKeyBytes,
    /// Reserved for consensus-specific tie-breaking; always 0 under pure
    /// stake-weighted selection.
    pub(crate) nonce: u64,
}

impl Block {
    /// Builds the next block on top of `prev_block_hash`, stamped with the
    /// current wall-clock time.
    pub fn assemble(
        transactions: Vec<Transaction>,
        prev_block_hash: Hash,
        proposer: PublicKeyBytes,
        config: &ConsensusConfig,
    ) -> Result<Self, ChainError> {
        let timestamp = chrono::Utc::now().timestamp_millis().max(0) as u64;
        Self::assemble_at(transactions, prev_block_hash, proposer, timestamp, config)
    }

    /// Same as [`Block::assemble`] with a caller-supplied timestamp.
    pub fn assemble_at(
        transactions: Vec<Transaction>,
        prev_block_hash: Hash,
        proposer: PublicKeyBytes,
        timestamp: u64,
        config: &ConsensusConfig,
    ) -> Result<Self, ChainError> {
        if transactions.is_empty() && !config.allow_empty_blocks {
            return Err(ChainError::EmptyBlock);
        }

        let block = Self::build(transactions, prev_block_hash, proposer, timestamp);
        tracing::debug!(
            hash = %block.hash_hex(),
            prev = %hash_to_hex(&block.prev_block_hash),
            txs = block.transactions.len(),
            validator = %block.validator,
            "assembled block"
        );
        Ok(block)
    }

    /// The first block of a chain. It may carry no transactions whatever the
    /// empty-block policy says.
    pub fn genesis(
        transactions: Vec<Transaction>,
        validator: PublicKeyBytes,
        timestamp: u64,
    ) -> Self {
        Self::build(transactions, GENESIS_PREV_HASH, validator, timestamp)
    }

    fn build(
        transactions: Vec<Transaction>,
        prev_block_hash: Hash,
        validator: PublicKeyBytes,
        timestamp: u64,
    ) -> Self {
        let hash = Self::calculate_hash(&prev_block_hash, &transactions, timestamp);
        Block {
            timestamp,
            transactions,
            prev_block_hash,
            hash,
            validator,
            nonce: 0,
        }
    }

    /// SHA-256 over `prev_block_hash ∥ tx ids in order ∥ be64(timestamp)`.
    pub fn calculate_hash(prev_block_hash: &Hash, transactions: &[Transaction], timestamp: u64) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(prev_block_hash);
        for tx in transactions {
            hasher.update(tx.id());
        }
        hasher.update(timestamp.to_be_bytes());
        hasher.finalize().into()
    }

    /// Recomputes the hash from the block's fields, ignoring the stored one.
    pub fn compute_hash(&self) -> Hash {
        Self::calculate_hash(&self.prev_block_hash, &self.transactions, self.timestamp)
    }

    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    pub fn hash_hex(&self) -> String {
        hash_to_hex(&self.hash)
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn prev_block_hash(&self) -> &Hash {
        &self.prev_block_hash
    }

    pub fn validator(&self) -> &PublicKeyBytes {
        &self.validator
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn is_genesis(&self) -> bool {
        self.prev_block_hash == GENESIS_PREV_HASH
    }
}
