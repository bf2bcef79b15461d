//! Cross-lab unlock rule.
//!
//! Lab 1 is always open. Lab N opens once lab N-1 has every step done and a
//! learner is signed in. Derived on every call and never stored.

use crate::labs;
use crate::models::ProgressSnapshot;

pub fn is_unlocked(lab_id: u32, snapshot: &ProgressSnapshot, identity_present: bool) -> bool {
    if labs::meta(lab_id).is_none() {
        return false;
    }
    if lab_id == 1 {
        return true;
    }
    let Some(previous) = labs::meta(lab_id - 1) else {
        return false;
    };
    identity_present && snapshot.completed_count(previous.id) >= previous.total_steps as usize
}
