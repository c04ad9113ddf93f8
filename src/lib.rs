//! StakeChain - the core of a minimal proof-of-stake ledger
//!
//! # Architecture
//!
//! ## Ledger
//! - [`transaction`] - Signed transfers and their content hash
//! - [`blockchain`] - Block assembly, hash-chaining and linkage checks
//!
//! ## Consensus
//! - [`consensus`] - Validator registry and stake-weighted proposer selection
//!
//! ## Serialization
//! - [`codec`] - Versioned canonical byte form of blocks and transactions
//!
//! ## Cryptography
//! - [`crypto`] - SHA-256 digests and secp256k1 signatures
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//! - [`logging`] - Tracing setup
//!
//! Storage, networking, key management and fork choice are left to the
//! embedding node: blocks and transactions leave this crate as opaque blobs
//! produced by [`codec`], and the validator registry is handed to the
//! selector as an immutable [`consensus::RegistrySnapshot`] each round.

#![forbid(unsafe_code)]

// ============================================================================
// Ledger
// ============================================================================
pub mod blockchain;
pub mod transaction;

// ============================================================================
// Consensus
// ============================================================================
pub mod consensus;

// ============================================================================
// Serialization
// ============================================================================
pub mod codec;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
pub mod logging;

pub use blockchain::{verify_chain, Block, GENESIS_PREV_HASH};
pub use consensus::{select_proposer, RegistrySnapshot, Selector, SharedRegistry, ValidatorRegistry};
pub use crypto::{Hash, KeyPair, PublicKeyBytes};
pub use error::{ChainError, Result, VerificationFailure};
pub use transaction::{Transaction, TxInput, TxOutput, UnsignedTransaction};
