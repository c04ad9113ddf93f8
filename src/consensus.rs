//! Validator registry and stake-weighted proposer selection

use crate::config::EntropyConfig;
use crate::crypto::PublicKeyBytes;
use crate::error::ChainError;
use parking_lot::RwLock;
use rand::rngs::{OsRng, StdRng};
use rand::{CryptoRng, Rng, RngCore, SeedableRng};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorEntry {
    pub public_key: PublicKeyBytes,
    pub stake: u64,
}

/// Mutable stake table owned by the consensus coordinator. Keys are kept
/// sorted so every traversal happens in the same order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatorRegistry {
    stakes: BTreeMap<PublicKeyBytes, u64>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a validator's stake, returning the previous one.
    pub fn set_stake(&mut self, public_key: PublicKeyBytes, stake: u64) -> Option<u64> {
        self.stakes.insert(public_key, stake)
    }

    pub fn add_stake(&mut self, public_key: PublicKeyBytes, amount: u64) -> Result<u64, ChainError> {
        let stake = self.stakes.entry(public_key).or_insert(0);
        *stake = stake
            .checked_add(amount)
            .ok_or_else(|| ChainError::StakeOverflow(public_key.to_hex()))?;
        Ok(*stake)
    }

    pub fn remove(&mut self, public_key: &PublicKeyBytes) -> Option<u64> {
        self.stakes.remove(public_key)
    }

    pub fn stake_of(&self, public_key: &PublicKeyBytes) -> Option<u64> {
        self.stakes.get(public_key).copied()
    }

    pub fn len(&self) -> usize {
        self.stakes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stakes.is_empty()
    }

    /// Sum of all stakes. Widened so it cannot overflow.
    pub fn total_stake(&self) -> u128 {
        self.stakes.values().map(|s| *s as u128).sum()
    }

    /// Immutable copy for one selection round.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let entries: Arc<[ValidatorEntry]> = self
            .stakes
            .iter()
            .map(|(public_key, stake)| ValidatorEntry {
                public_key: *public_key,
                stake: *stake,
            })
            .collect();
        RegistrySnapshot {
            total_stake: self.total_stake(),
            entries,
        }
    }
}

impl FromIterator<(PublicKeyBytes, u64)> for ValidatorRegistry {
    fn from_iter<I: IntoIterator<Item = (PublicKeyBytes, u64)>>(iter: I) -> Self {
        ValidatorRegistry {
            stakes: iter.into_iter().collect(),
        }
    }
}

/// Read-only view of the registry, sorted by public key. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySnapshot {
    entries: Arc<[ValidatorEntry]>,
    total_stake: u128,
}

impl RegistrySnapshot {
    pub fn entries(&self) -> &[ValidatorEntry] {
        &self.entries
    }

    pub fn total_stake(&self) -> u128 {
        self.total_stake
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, public_key: &PublicKeyBytes) -> bool {
        self.entries
            .binary_search_by(|e| e.public_key.cmp(public_key))
            .is_ok()
    }
}

/// Registry behind a read-write lock, for coordinators that mutate stakes
/// while other threads run selection rounds.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<RwLock<ValidatorRegistry>>,
}

impl SharedRegistry {
    pub fn new(registry: ValidatorRegistry) -> Self {
        SharedRegistry {
            inner: Arc::new(RwLock::new(registry)),
        }
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut ValidatorRegistry) -> R) -> R {
        let mut registry = self.inner.write();
        f(&mut *registry)
    }

    /// Copies the registry under the read lock.
    pub fn snapshot(&self) -> RegistrySnapshot {
        self.inner.read().snapshot()
    }
}

/// Draws proposers with a CSPRNG seeded from OS entropy on every round.
#[derive(Debug, Clone, Default)]
pub struct Selector {
    entropy: EntropyConfig,
}

impl Selector {
    pub fn new(entropy: EntropyConfig) -> Self {
        Selector { entropy }
    }

    pub fn select_proposer(&self, snapshot: &RegistrySnapshot) -> Result<PublicKeyBytes, ChainError> {
        let mut rng = seed_rng(&mut OsRng, &self.entropy)?;
        select_proposer_with_rng(snapshot, &mut rng)
    }
}

/// Selects a proposer with default entropy settings.
pub fn select_proposer(snapshot: &RegistrySnapshot) -> Result<PublicKeyBytes, ChainError> {
    Selector::default().select_proposer(snapshot)
}

/// Stake-weighted draw: validator `i` wins with probability `stake_i / total`.
pub fn select_proposer_with_rng<R>(
    snapshot: &RegistrySnapshot,
    rng: &mut R,
) -> Result<PublicKeyBytes, ChainError>
where
    R: RngCore + CryptoRng + ?Sized,
{
    if snapshot.is_empty() {
        return Err(invariant_violation("selection invoked on an empty registry"));
    }
    let total = snapshot.total_stake();
    if total == 0 {
        return Err(invariant_violation("selection invoked with zero total stake"));
    }

    let mut remaining: u128 = rng.gen_range(0..total);
    for entry in snapshot.entries() {
        let stake = entry.stake as u128;
        if remaining < stake {
            tracing::debug!(proposer = %entry.public_key, stake = entry.stake, total = %total, "selected proposer");
            return Ok(entry.public_key);
        }
        remaining -= stake;
    }

    Err(invariant_violation(&format!(
        "selection pass over {} validators (total stake {}) found no winner",
        snapshot.len(),
        total
    )))
}

fn invariant_violation(msg: &str) -> ChainError {
    tracing::error!("{}", msg);
    ChainError::InvariantViolation(msg.to_string())
}

/// Seeds a `StdRng` from `source`, retrying transient entropy failures with
/// bounded exponential backoff.
fn seed_rng<S: RngCore + ?Sized>(source: &mut S, config: &EntropyConfig) -> Result<StdRng, ChainError> {
    let mut seed = <StdRng as SeedableRng>::Seed::default();
    let mut attempt = 0;
    loop {
        match source.try_fill_bytes(&mut seed) {
            Ok(()) => return Ok(StdRng::from_seed(seed)),
            Err(e) if attempt < config.max_retries => {
                let delay = config.backoff(attempt);
                tracing::warn!(attempt, ?delay, error = %e, "entropy source failed, retrying");
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => {
                return Err(ChainError::EntropyUnavailable(format!(
                    "gave up after {} retries: {}",
                    attempt, e
                )))
            }
        }
    }
}
