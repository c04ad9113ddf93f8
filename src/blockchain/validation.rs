use crate::blockchain::block::{Block, GENESIS_PREV_HASH};
use crate::crypto::{hash_to_hex, Hash};
use crate::error::{ChainError, VerificationFailure};
use rayon::prelude::*;
use std::collections::HashSet;

impl Block {
    /// Tamper check: the stored hash must match the one recomputed from fields.
    pub fn verify_hash(&self) -> Result<(), ChainError> {
        let expected = self.compute_hash();
        if expected != self.hash {
            return Err(ChainError::verification(
                VerificationFailure::BlockHashMismatch,
                format!(
                    "stored {} but fields hash to {}",
                    hash_to_hex(&self.hash),
                    hash_to_hex(&expected)
                ),
            ));
        }
        Ok(())
    }

    /// Checks the block is untampered and extends `expected_prev_hash`.
    pub fn verify_linkage(&self, expected_prev_hash: &Hash) -> Result<(), ChainError> {
        self.verify_hash()?;

        if self.prev_block_hash != *expected_prev_hash {
            return Err(ChainError::verification(
                VerificationFailure::BrokenLinkage,
                format!(
                    "block {} points at {} but expected {}",
                    self.hash_hex(),
                    hash_to_hex(&self.prev_block_hash),
                    hash_to_hex(expected_prev_hash)
                ),
            ));
        }
        Ok(())
    }

    pub fn links_to(&self, expected_prev_hash: &Hash) -> bool {
        match self.verify_linkage(expected_prev_hash) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(block = %self.hash_hex(), error = %e, "linkage check failed");
                false
            }
        }
    }

    /// Verifies every included transaction in parallel and rejects duplicate ids.
    pub fn verify_transactions(&self) -> Result<(), ChainError> {
        let mut seen = HashSet::with_capacity(self.transactions.len());
        for tx in &self.transactions {
            if !seen.insert(*tx.id()) {
                return Err(ChainError::verification(
                    VerificationFailure::DuplicateTransaction,
                    format!("{} appears more than once in {}", tx.id_hex(), self.hash_hex()),
                ));
            }
        }

        self.transactions
            .par_iter()
            .try_for_each(|tx| tx.verify())
    }

    /// Full check of an incoming block: hash, linkage and every transaction.
    pub fn verify(&self, expected_prev_hash: &Hash) -> Result<(), ChainError> {
        self.verify_linkage(expected_prev_hash)?;
        self.verify_transactions()
    }
}

/// Verifies a contiguous run of blocks starting at genesis: the first block
/// must carry the genesis sentinel, every block must hash correctly, link to
/// its predecessor and not go back in time, and no transaction id may appear
/// in more than one block.
pub fn verify_chain(blocks: &[Block]) -> Result<(), ChainError> {
    let mut expected_prev = GENESIS_PREV_HASH;
    let mut prev_timestamp = 0u64;
    let mut included: HashSet<Hash> = HashSet::new();

    for (height, block) in blocks.iter().enumerate() {
        block.verify_linkage(&expected_prev).map_err(|e| match e {
            ChainError::VerificationFailed { kind, detail } => ChainError::verification(
                kind,
                format!("at height {}: {}", height, detail),
            ),
            other => other,
        })?;

        if block.timestamp < prev_timestamp {
            return Err(ChainError::verification(
                VerificationFailure::TimestampRegression,
                format!(
                    "at height {}: {} < {}",
                    height, block.timestamp, prev_timestamp
                ),
            ));
        }

        for tx in &block.transactions {
            if !included.insert(*tx.id()) {
                return Err(ChainError::verification(
                    VerificationFailure::DuplicateTransaction,
                    format!("at height {}: {} was already included", height, tx.id_hex()),
                ));
            }
        }

        expected_prev = block.hash;
        prev_timestamp = block.timestamp;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsensusConfig;
    use crate::crypto::{KeyPair, PublicKeyBytes};
    use crate::transaction::Transaction;

    fn pay(amount: u64) -> Transaction {
        let sender = KeyPair::generate();
        Transaction::create(
            &sender.secret_key,
            &sender.public_key_bytes(),
            &KeyPair::generate().public_key_bytes(),
            amount,
        )
        .unwrap()
    }

    fn build_chain(len: usize) -> Vec<Block> {
        let validator: PublicKeyBytes = KeyPair::generate().public_key_bytes();
        let config = ConsensusConfig::default();
        let mut blocks = vec![Block::genesis(vec![], validator, 1_000)];
        for i in 1..len {
            let prev = *blocks[i - 1].hash();
            blocks.push(
                Block::assemble_at(vec![pay(i as u64)], prev, validator, 1_000 + i as u64, &config)
                    .unwrap(),
            );
        }
        blocks
    }

    #[test]
    fn test_adjacent_blocks_link() {
        let chain = build_chain(5);
        for pair in chain.windows(2) {
            assert!(pair[1].verify_linkage(pair[0].hash()).is_ok());
            assert!(pair[1].links_to(pair[0].hash()));
        }
        assert!(verify_chain(&chain).is_ok());
    }

    #[test]
    fn test_tampered_interior_block_breaks_successor() {
        let mut chain = build_chain(4);
        chain[2].transactions[0] = pay(999);

        // The tampered block no longer matches its own hash...
        assert_eq!(
            chain[2].verify_hash().unwrap_err().verification_kind(),
            Some(VerificationFailure::BlockHashMismatch)
        );
        // ...and once its hash is recomputed the successor no longer links to it.
        chain[2].hash = chain[2].compute_hash();
        let err = chain[3].verify_linkage(chain[2].hash()).unwrap_err();
        assert_eq!(err.verification_kind(), Some(VerificationFailure::BrokenLinkage));
        assert!(verify_chain(&chain).is_err());
    }

    #[test]
    fn test_wrong_predecessor_rejected() {
        let chain = build_chain(3);
        assert!(!chain[2].links_to(chain[0].hash()));
    }

    #[test]
    fn test_verify_chain_requires_genesis_sentinel() {
        let chain = build_chain(3);
        let err = verify_chain(&chain[1..]).unwrap_err();
        assert_eq!(err.verification_kind(), Some(VerificationFailure::BrokenLinkage));
        assert!(err.to_string().contains("at height 0"));
    }

    #[test]
    fn test_timestamp_regression_detected() {
        let validator = KeyPair::generate().public_key_bytes();
        let genesis = Block::genesis(vec![], validator, 5_000);
        let next = Block::assemble_at(
            vec![pay(1)],
            *genesis.hash(),
            validator,
            4_000,
            &ConsensusConfig::default(),
        )
        .unwrap();

        let err = verify_chain(&[genesis, next]).unwrap_err();
        assert_eq!(
            err.verification_kind(),
            Some(VerificationFailure::TimestampRegression)
        );
    }

    #[test]
    fn test_verify_transactions_rejects_tampered_tx() {
        let mut chain = build_chain(2);
        assert!(chain[1].verify(chain[0].hash()).is_ok());

        chain[1].transactions[0].outputs[0].value += 1;
        assert_eq!(
            chain[1].verify_transactions().unwrap_err().verification_kind(),
            Some(VerificationFailure::TransactionIdMismatch)
        );
    }

    #[test]
    fn test_transaction_reused_across_blocks_rejected() {
        let validator = KeyPair::generate().public_key_bytes();
        let config = ConsensusConfig::default();
        let reused = pay(7);

        let genesis = Block::genesis(vec![reused.clone()], validator, 1);
        let next = Block::assemble_at(vec![pay(1)], *genesis.hash(), validator, 2, &config).unwrap();
        let replay =
            Block::assemble_at(vec![reused], *next.hash(), validator, 3, &config).unwrap();

        // Each block is fine on its own.
        assert!(replay.verify(next.hash()).is_ok());

        let err = verify_chain(&[genesis, next, replay]).unwrap_err();
        assert_eq!(
            err.verification_kind(),
            Some(VerificationFailure::DuplicateTransaction)
        );
        assert!(err.to_string().contains("at height 2"));
    }

    #[test]
    fn test_duplicate_transaction_rejected() {
        let tx = pay(5);
        let block = Block::genesis(vec![tx.clone(), tx], KeyPair::generate().public_key_bytes(), 0);
        assert_eq!(
            block.verify_transactions().unwrap_err().verification_kind(),
            Some(VerificationFailure::DuplicateTransaction)
        );
    }
}
