//! Progress store: optimistic local commit plus best-effort remote mirror.
//!
//! Every write lands in the local cache first and is never rolled back. A
//! remote push is then spawned if a learner is signed in. Its only possible
//! effect is to overwrite the cached score with the server's value. Remote
//! failures are logged and otherwise ignored.

pub mod gate;
pub mod local;

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::client::{ClientError, ProgressClient};
use crate::labs;
use crate::models::*;

pub use local::LocalCache;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProgressError {
    #[error("unknown lab {0}")]
    UnknownLab(u32),
    #[error("lab {lab} has no step {step}")]
    UnknownStep { lab: u32, step: u32 },
}

/// Result of [`ProgressStore::record_step`].
#[derive(Debug)]
pub struct RecordOutcome {
    pub progress: LabProgress,
    /// True only on the write that completed the lab locally.
    pub lab_completed: bool,
    /// The remote push, if one was started. Dropping it does not cancel it.
    pub sync: Option<JoinHandle<()>>,
}

/// Where [`ProgressStore::reload`] got its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadSource {
    Remote,
    Local,
}

#[derive(Debug, Default)]
struct StoreState {
    snapshot: ProgressSnapshot,
    identity: Option<Identity>,
}

/// Single writer of the local progress cache.
#[derive(Clone)]
pub struct ProgressStore {
    state: Arc<Mutex<StoreState>>,
    cache: LocalCache,
    client: ProgressClient,
}

impl ProgressStore {
    /// Build a store from whatever the local cache holds. Does not touch the
    /// network; call [`reload`](Self::reload) for that.
    pub fn new(cache: LocalCache, client: ProgressClient) -> Self {
        let identity = cache.identity().unwrap_or_else(|e| {
            tracing::warn!("could not read identity from local cache: {}", e);
            None
        });
        let store = Self {
            state: Arc::new(Mutex::new(StoreState {
                snapshot: ProgressSnapshot::default(),
                identity,
            })),
            cache,
            client,
        };
        store.load_local();
        store
    }

    // ============================================================
    // Reads
    // ============================================================

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.lock().snapshot.clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.lock().identity.clone()
    }

    pub fn has_identity(&self) -> bool {
        self.lock().identity.is_some()
    }

    pub fn lab_progress(&self, lab_id: u32) -> LabProgress {
        self.lock()
            .snapshot
            .lab(lab_id)
            .cloned()
            .unwrap_or_else(|| LabProgress::new(lab_id))
    }

    pub fn total_score(&self) -> u32 {
        self.lock().snapshot.total_score
    }

    pub fn is_unlocked(&self, lab_id: u32) -> bool {
        let state = self.lock();
        gate::is_unlocked(lab_id, &state.snapshot, state.identity.is_some())
    }

    // ============================================================
    // Writes
    // ============================================================

    /// Add a completed step. The local commit happens before this returns.
    pub fn record_step(&self, lab_id: u32, step_id: u32) -> Result<RecordOutcome, ProgressError> {
        let meta = labs::meta(lab_id).ok_or(ProgressError::UnknownLab(lab_id))?;
        if step_id == 0 || step_id > meta.total_steps {
            return Err(ProgressError::UnknownStep {
                lab: lab_id,
                step: step_id,
            });
        }

        let (progress, snapshot, lab_completed, identity) = {
            let mut state = self.lock();
            let progress = state.snapshot.lab_mut(lab_id);
            progress.insert(step_id);

            let lab_completed = progress.completed_at.is_none()
                && progress.completed_steps.len() >= meta.total_steps as usize;
            if lab_completed {
                progress.completed_at = Some(Utc::now());
            }
            let progress = progress.clone();

            if lab_completed {
                state.snapshot.mark_lab_complete(lab_id);
                state.snapshot.total_score += meta.points;
            }
            (
                progress,
                state.snapshot.clone(),
                lab_completed,
                state.identity.clone(),
            )
        };

        self.write_lab(&progress);
        self.write_mirror(&snapshot);

        let sync = identity.and_then(|identity| {
            let handle = tokio::runtime::Handle::try_current().ok()?;
            let store = self.clone();
            let input = RecordStepInput { lab_id, step_id };
            Some(handle.spawn(async move { store.push(identity, input).await }))
        });

        Ok(RecordOutcome {
            progress,
            lab_completed,
            sync,
        })
    }

    async fn push(&self, identity: Identity, input: RecordStepInput) {
        let client = self.client.with_token(&identity.token);
        match client.record_step(input).await {
            Ok(response) if response.lab_completed => {
                let snapshot = {
                    let mut state = self.lock();
                    state.snapshot.total_score = response.new_total_score;
                    state.snapshot.mark_lab_complete(input.lab_id);
                    state.snapshot.clone()
                };
                self.write_mirror(&snapshot);
                tracing::info!(
                    lab = input.lab_id,
                    score = response.new_total_score,
                    "server confirmed lab completion"
                );
            }
            Ok(_) => {
                tracing::debug!(lab = input.lab_id, step = input.step_id, "step synced");
            }
            Err(ClientError::Unauthorized(_)) => self.drop_rejected_identity(&identity),
            Err(e) => {
                tracing::warn!(
                    lab = input.lab_id,
                    step = input.step_id,
                    "progress sync failed, keeping local state: {}",
                    e
                );
            }
        }
    }

    /// Erase one lab's local state. The server is not told.
    pub fn reset_lab(&self, lab_id: u32) {
        let snapshot = {
            let mut state = self.lock();
            let was_complete = state.snapshot.is_lab_complete(lab_id);
            state.snapshot.progress.remove(&lab_id);
            state.snapshot.completed_labs.retain(|id| *id != lab_id);
            if was_complete {
                state.snapshot.total_score = state
                    .snapshot
                    .total_score
                    .saturating_sub(labs::points_for(lab_id));
            }
            state.snapshot.clone()
        };

        if let Err(e) = self.cache.remove(&local::lab_key(lab_id)) {
            tracing::warn!(lab = lab_id, "failed to erase local progress: {}", e);
        }
        self.write_mirror(&snapshot);
        tracing::info!(lab = lab_id, "local progress reset");
    }

    /// Replace local state with the server's view when signed in, otherwise
    /// (or if the fetch fails) re-read the local cache.
    pub async fn reload(&self) -> ReloadSource {
        if let Some(identity) = self.identity() {
            match self.client.with_token(&identity.token).fetch_progress().await {
                Ok(remote) => {
                    self.replace_with(remote);
                    return ReloadSource::Remote;
                }
                Err(ClientError::Unauthorized(_)) => self.drop_rejected_identity(&identity),
                Err(e) => {
                    tracing::warn!("could not fetch remote progress, using local cache: {}", e);
                }
            }
        }
        self.load_local();
        ReloadSource::Local
    }

    /// Sign in (`Some`) and reload, or sign out (`None`) and forget all local
    /// progress.
    pub async fn set_identity(&self, identity: Option<Identity>) {
        if let Err(e) = self.cache.set_identity(identity.as_ref()) {
            tracing::warn!("failed to persist identity: {}", e);
        }

        match identity {
            Some(identity) => {
                tracing::info!(username = %identity.username, "signed in");
                self.lock().identity = Some(identity);
                self.reload().await;
            }
            None => {
                if let Err(e) = self.cache.clear_progress() {
                    tracing::warn!("failed to clear local progress: {}", e);
                }
                let mut state = self.lock();
                state.identity = None;
                state.snapshot = ProgressSnapshot::default();
                tracing::info!("signed out");
            }
        }
    }

    /// Forget a token the service refused. Local progress stays; only the
    /// identity goes, and only if it has not been replaced in the meantime.
    fn drop_rejected_identity(&self, rejected: &Identity) {
        {
            let mut state = self.lock();
            if state.identity.as_ref() != Some(rejected) {
                return;
            }
            state.identity = None;
        }
        if let Err(e) = self.cache.set_identity(None) {
            tracing::warn!("failed to clear rejected identity: {}", e);
        }
        tracing::warn!(username = %rejected.username, "saved token was rejected, signed out");
    }

    // ============================================================
    // Local cache plumbing
    // ============================================================

    /// Rebuild the in-memory snapshot from the mirror and per-lab keys.
    fn load_local(&self) {
        let mut snapshot = self.cache.snapshot().ok().flatten().unwrap_or_default();
        for meta in &labs::REGISTRY {
            match self.cache.lab_steps(meta.id) {
                Ok(Some(steps)) => {
                    snapshot.lab_mut(meta.id).completed_steps = steps;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(lab = meta.id, "failed to read local progress: {}", e),
            }
        }
        self.lock().snapshot = sanitize(snapshot);
    }

    fn replace_with(&self, remote: ProgressSnapshot) {
        let snapshot = sanitize(remote);
        if let Err(e) = self.cache.clear_progress() {
            tracing::warn!("failed to clear local progress: {}", e);
        }
        for progress in snapshot.progress.values() {
            self.write_lab(progress);
        }
        self.write_mirror(&snapshot);
        self.lock().snapshot = snapshot;
    }

    fn write_lab(&self, progress: &LabProgress) {
        if let Err(e) = self
            .cache
            .set_lab_steps(progress.lab_id, &progress.completed_steps)
        {
            tracing::warn!(lab = progress.lab_id, "failed to write local progress: {}", e);
        }
    }

    fn write_mirror(&self, snapshot: &ProgressSnapshot) {
        if let Err(e) = self.cache.set_snapshot(snapshot) {
            tracing::warn!("failed to write snapshot mirror: {}", e);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().expect("progress state lock poisoned")
    }
}

/// Drop unknown labs and step ids, and make `completed_at` agree with the
/// step count.
fn sanitize(mut snapshot: ProgressSnapshot) -> ProgressSnapshot {
    snapshot.progress.retain(|lab_id, _| labs::meta(*lab_id).is_some());
    snapshot.completed_labs.clear();

    for (lab_id, progress) in snapshot.progress.iter_mut() {
        let total = labs::meta(*lab_id).map_or(0, |m| m.total_steps);
        progress.lab_id = *lab_id;
        progress.completed_steps.sort_unstable();
        progress.completed_steps.dedup();
        progress.completed_steps.retain(|step| (1..=total).contains(step));

        if progress.completed_steps.len() >= total as usize {
            progress.completed_at.get_or_insert_with(Utc::now);
        } else {
            progress.completed_at = None;
        }
    }

    let done: Vec<u32> = snapshot
        .progress
        .values()
        .filter(|p| p.is_complete())
        .map(|p| p.lab_id)
        .collect();
    for lab_id in done {
        snapshot.mark_lab_complete(lab_id);
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_store() -> ProgressStore {
        ProgressStore::new(
            LocalCache::open_memory().unwrap(),
            ProgressClient::new("http://127.0.0.1:9"),
        )
    }

    #[test]
    fn record_step_rejects_ids_outside_the_lab() {
        let store = offline_store();
        assert_eq!(
            store.record_step(9, 1).unwrap_err(),
            ProgressError::UnknownLab(9)
        );
        assert_eq!(
            store.record_step(1, 10).unwrap_err(),
            ProgressError::UnknownStep { lab: 1, step: 10 }
        );
        assert_eq!(
            store.record_step(1, 0).unwrap_err(),
            ProgressError::UnknownStep { lab: 1, step: 0 }
        );
    }

    #[test]
    fn no_sync_without_identity() {
        let store = offline_store();
        let outcome = store.record_step(1, 1).unwrap();
        assert!(outcome.sync.is_none());
        assert_eq!(outcome.progress.completed_steps, vec![1]);
    }

    #[test]
    fn completing_a_lab_adds_points_once() {
        let store = offline_store();
        let mut completions = 0;
        for step in (1..=9).chain(1..=9) {
            if store.record_step(1, step).unwrap().lab_completed {
                completions += 1;
            }
        }
        assert_eq!(completions, 1);
        assert_eq!(store.total_score(), 100);
        assert_eq!(store.snapshot().completed_labs, vec![1]);
    }

    #[test]
    fn reset_lab_forgets_only_that_lab() {
        let store = offline_store();
        for step in 1..=9 {
            store.record_step(1, step).unwrap();
        }
        store.record_step(2, 1).unwrap();

        store.reset_lab(1);

        assert!(store.lab_progress(1).completed_steps.is_empty());
        assert_eq!(store.lab_progress(2).completed_steps, vec![1]);
        assert_eq!(store.total_score(), 0);
        assert!(store.snapshot().completed_labs.is_empty());
    }

    #[test]
    fn sanitize_enforces_step_invariants() {
        let mut snapshot = ProgressSnapshot::default();
        snapshot.lab_mut(1).completed_steps = vec![3, 3, 42, 1];
        snapshot.lab_mut(1).completed_at = Some(Utc::now());
        snapshot.lab_mut(17).insert(1);
        snapshot.completed_labs = vec![1, 17];

        let clean = sanitize(snapshot);

        assert_eq!(clean.lab(1).unwrap().completed_steps, vec![1, 3]);
        assert!(clean.lab(1).unwrap().completed_at.is_none());
        assert!(clean.lab(17).is_none());
        assert!(clean.completed_labs.is_empty());
    }
}
