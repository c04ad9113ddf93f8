/// Validation logic for transactions separated from type definitions
use crate::crypto::{hash_to_hex, verify_digest};
use crate::error::{ChainError, VerificationFailure};
use crate::transaction::types::{Transaction, MAX_TRANSACTION_SIZE};

impl Transaction {
    /// Stateless integrity check: shape, size and output total, then the id
    /// is recomputed and every input signature verified against it.
    pub fn verify(&self) -> Result<(), ChainError> {
        if self.inputs.is_empty() || self.outputs.is_empty() {
            return Err(ChainError::InvalidTransaction(
                "Transaction must have at least one input and one output".to_string(),
            ));
        }
        self.validate_size()?;
        if self.total_output_value().is_none() {
            return Err(ChainError::InvalidTransaction(format!(
                "Total output value of {} overflows u64",
                self.id_hex()
            )));
        }

        let expected_id = self.recompute_id();
        if expected_id != self.id {
            return Err(ChainError::verification(
                VerificationFailure::TransactionIdMismatch,
                format!(
                    "stored {} but fields hash to {}",
                    hash_to_hex(&self.id),
                    hash_to_hex(&expected_id)
                ),
            ));
        }

        for (index, input) in self.inputs.iter().enumerate() {
            if input.signature.is_empty() {
                return Err(ChainError::verification(
                    VerificationFailure::MissingSignature,
                    format!("input {} of {}", index, hash_to_hex(&expected_id)),
                ));
            }
            verify_digest(&input.public_key, &expected_id, &input.signature).map_err(|e| {
                ChainError::verification(
                    VerificationFailure::SignatureMismatch,
                    format!("input {} of {}: {}", index, hash_to_hex(&expected_id), e),
                )
            })?;
        }

        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        match self.verify() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(tx = %self.id_hex(), error = %e, "rejecting transaction");
                false
            }
        }
    }

    /// Validate transaction size to prevent DoS attacks
    pub fn validate_size(&self) -> Result<(), ChainError> {
        let size = bincode::serialized_size(self)
            .map_err(|e| ChainError::InvalidTransaction(format!("Serialization failed: {}", e)))?;

        if size > MAX_TRANSACTION_SIZE as u64 {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction too large: {} bytes (max: {})",
                size, MAX_TRANSACTION_SIZE
            )));
        }
        Ok(())
    }
}
