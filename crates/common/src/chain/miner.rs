use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::block::{meets_difficulty, Block, Candidate};

/// How often (in nonces) the search checks for cancellation and reports progress
const CHECK_INTERVAL: u64 = 1 << 12;

/// Hex digits in a SHA-256 digest, the hardest meaningful difficulty
pub const MAX_DIFFICULTY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MiningError {
    #[error("mining was cancelled")]
    Cancelled,
    #[error("no valid nonce within {0} attempts")]
    BudgetExhausted(u64),
    #[error("mining timed out after {0:?}")]
    TimedOut(Duration),
    #[error("difficulty {0} exceeds the digest length")]
    InvalidDifficulty(usize),
    #[error("mining worker failed: {0}")]
    Worker(String),
}

/// Search nonces from 0 until the candidate's hash meets `difficulty`
///
/// Stops with [`MiningError::Cancelled`] once `cancel` is set and with
///  [`MiningError::BudgetExhausted`] after `budget` attempts, if one is given.
pub fn mine(
    candidate: &Candidate,
    difficulty: usize,
    budget: Option<u64>,
    cancel: &AtomicBool,
) -> Result<(String, u64), MiningError> {
    mine_reporting(candidate, difficulty, budget, cancel, |_| {})
}

fn mine_reporting(
    candidate: &Candidate,
    difficulty: usize,
    budget: Option<u64>,
    cancel: &AtomicBool,
    mut on_progress: impl FnMut(u64),
) -> Result<(String, u64), MiningError> {
    if difficulty > MAX_DIFFICULTY {
        return Err(MiningError::InvalidDifficulty(difficulty));
    }

    let prefix = candidate.hash_prefix();
    let limit = budget.unwrap_or(u64::MAX);
    let mut nonce: u64 = 0;
    while nonce < limit {
        if nonce % CHECK_INTERVAL == 0 {
            if cancel.load(Ordering::Relaxed) {
                return Err(MiningError::Cancelled);
            }
            on_progress(nonce);
        }

        let hash = prefix.hash(nonce);
        if meets_difficulty(&hash, difficulty) {
            on_progress(nonce + 1);
            return Ok((hash, nonce));
        }
        nonce += 1;
    }

    Err(MiningError::BudgetExhausted(limit))
}

/// Proof-of-work parameters for a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiningConfig {
    /// Leading zero hex digits required of every block hash
    pub difficulty: usize,
    /// Give up on a single block after this long
    pub timeout: Option<Duration>,
    /// Give up on a single block after this many nonces
    pub attempt_budget: Option<u64>,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            difficulty: 3,
            timeout: Some(Duration::from_secs(30)),
            attempt_budget: None,
        }
    }
}

/// Runs nonce searches on tokio's blocking pool
#[derive(Debug, Clone, Copy)]
pub struct Miner {
    config: MiningConfig,
}

impl Miner {
    pub fn new(config: MiningConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MiningConfig {
        &self.config
    }

    /// Start mining `candidate` in the background
    pub fn spawn(&self, candidate: Candidate) -> MiningHandle {
        let cancel = Arc::new(AtomicBool::new(false));
        let (progress_tx, progress_rx) = watch::channel(0u64);
        let difficulty = self.config.difficulty;
        let budget = self.config.attempt_budget;
        let flag = cancel.clone();

        let task = tokio::task::spawn_blocking(move || {
            let (hash, nonce) = mine_reporting(&candidate, difficulty, budget, &flag, |tried| {
                progress_tx.send_replace(tried);
            })?;
            Ok(candidate.seal(nonce, hash))
        });

        MiningHandle {
            cancel: CancelOnDrop(cancel),
            progress: progress_rx,
            task,
        }
    }

    /// Mine `candidate` to completion, cancelling the search if the configured
    ///  timeout elapses first
    pub async fn mine_with_timeout(&self, candidate: Candidate) -> Result<Block, MiningError> {
        let mut handle = self.spawn(candidate);
        let Some(limit) = self.config.timeout else {
            return handle.result().await;
        };

        match tokio::time::timeout(limit, &mut handle.task).await {
            Ok(joined) => flatten(joined),
            Err(_) => {
                tracing::warn!(
                    tried = *handle.progress.borrow(),
                    "mining timed out after {:?}, cancelling",
                    limit
                );
                handle.cancel();
                // wait for the worker so it never outlives the timeout
                let _ = (&mut handle.task).await;
                Err(MiningError::TimedOut(limit))
            }
        }
    }
}

/// Sets the search's cancel flag when dropped
#[derive(Debug)]
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// A running nonce search
///
/// Dropping the handle, or a pending [`MiningHandle::result`], cancels the
///  search, so an abandoned caller never leaves a worker hashing.
#[derive(Debug)]
pub struct MiningHandle {
    cancel: CancelOnDrop,
    progress: watch::Receiver<u64>,
    task: JoinHandle<Result<Block, MiningError>>,
}

impl MiningHandle {
    /// Number of nonces tried so far
    pub fn progress(&self) -> watch::Receiver<u64> {
        self.progress.clone()
    }

    /// Ask the search to stop. It observes the request within a few thousand nonces.
    pub fn cancel(&self) {
        self.cancel.0.store(true, Ordering::Relaxed);
    }

    pub async fn result(self) -> Result<Block, MiningError> {
        let MiningHandle { cancel, task, .. } = self;
        let result = flatten(task.await);
        drop(cancel);
        result
    }
}

fn flatten(
    joined: Result<Result<Block, MiningError>, tokio::task::JoinError>,
) -> Result<Block, MiningError> {
    joined.map_err(|e| MiningError::Worker(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(difficulty: usize) -> MiningConfig {
        MiningConfig {
            difficulty,
            timeout: None,
            attempt_budget: None,
        }
    }

    #[test]
    fn test_mine_finds_valid_nonce() {
        let candidate = Candidate::genesis(1_700_000_000_000);
        let cancel = AtomicBool::new(false);
        let (hash, nonce) = mine(&candidate, 2, None, &cancel).unwrap();

        assert!(hash.starts_with("00"));
        assert_eq!(candidate.clone().seal(nonce, hash.clone()).compute_hash(), hash);
    }

    #[test]
    fn test_zero_difficulty_takes_first_nonce() {
        let candidate = Candidate::genesis(0);
        let cancel = AtomicBool::new(false);
        let (_, nonce) = mine(&candidate, 0, None, &cancel).unwrap();
        assert_eq!(nonce, 0);
    }

    #[test]
    fn test_budget_exhausted() {
        let candidate = Candidate::genesis(0);
        let cancel = AtomicBool::new(false);
        let result = mine(&candidate, MAX_DIFFICULTY, Some(100), &cancel);
        assert_eq!(result, Err(MiningError::BudgetExhausted(100)));
    }

    #[test]
    fn test_cancelled_before_start() {
        let candidate = Candidate::genesis(0);
        let cancel = AtomicBool::new(true);
        assert_eq!(mine(&candidate, 1, None, &cancel), Err(MiningError::Cancelled));
    }

    #[test]
    fn test_invalid_difficulty() {
        let candidate = Candidate::genesis(0);
        let cancel = AtomicBool::new(false);
        assert_eq!(
            mine(&candidate, MAX_DIFFICULTY + 1, None, &cancel),
            Err(MiningError::InvalidDifficulty(MAX_DIFFICULTY + 1))
        );
    }

    #[tokio::test]
    async fn test_spawned_mining_seals_block() {
        let miner = Miner::new(config(2));
        let handle = miner.spawn(Candidate::genesis(5));
        let progress = handle.progress();

        let block = handle.result().await.unwrap();
        assert!(block.hash.starts_with("00"));
        assert_eq!(block.compute_hash(), block.hash);
        assert_eq!(*progress.borrow(), block.nonce + 1);
    }

    #[tokio::test]
    async fn test_cancel_stops_unreachable_search() {
        let miner = Miner::new(config(MAX_DIFFICULTY));
        let handle = miner.spawn(Candidate::genesis(5));
        handle.cancel();
        assert_eq!(handle.result().await, Err(MiningError::Cancelled));
    }

    /// Waits until the worker drops its progress sender, i.e. has exited
    async fn worker_exits(mut progress: watch::Receiver<u64>) -> bool {
        let exited = async { while progress.changed().await.is_ok() {} };
        tokio::time::timeout(Duration::from_secs(10), exited).await.is_ok()
    }

    #[tokio::test]
    async fn test_dropped_handle_stops_search() {
        let miner = Miner::new(config(MAX_DIFFICULTY));
        let handle = miner.spawn(Candidate::genesis(5));
        let progress = handle.progress();

        drop(handle);
        assert!(worker_exits(progress).await);
    }

    #[tokio::test]
    async fn test_abandoned_result_stops_search() {
        let miner = Miner::new(config(MAX_DIFFICULTY));
        let handle = miner.spawn(Candidate::genesis(5));
        let progress = handle.progress();

        let abandoned = tokio::time::timeout(Duration::from_millis(20), handle.result()).await;
        assert!(abandoned.is_err());
        assert!(worker_exits(progress).await);
    }

    #[tokio::test]
    async fn test_timeout_cancels_search() {
        let miner = Miner::new(MiningConfig {
            difficulty: MAX_DIFFICULTY,
            timeout: Some(Duration::from_millis(50)),
            attempt_budget: None,
        });
        let result = miner.mine_with_timeout(Candidate::genesis(5)).await;
        assert_eq!(result, Err(MiningError::TimedOut(Duration::from_millis(50))));
    }
}
