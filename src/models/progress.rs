use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Completion state of one lab for one learner.
///
/// `completed_steps` is kept ascending and free of repeats. `completed_at`
/// is set once, on the write that fills the set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabProgress {
    pub lab_id: u32,
    #[serde(default)]
    pub completed_steps: Vec<u32>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl LabProgress {
    pub fn new(lab_id: u32) -> Self {
        Self {
            lab_id,
            completed_steps: Vec::new(),
            completed_at: None,
        }
    }

    /// Add a step id. Returns `false` if it was already present.
    pub fn insert(&mut self, step_id: u32) -> bool {
        match self.completed_steps.binary_search(&step_id) {
            Ok(_) => false,
            Err(pos) => {
                self.completed_steps.insert(pos, step_id);
                true
            }
        }
    }

    pub fn contains(&self, step_id: u32) -> bool {
        self.completed_steps.binary_search(&step_id).is_ok()
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Parse the comma-separated column format, e.g. `"1,2,5"`. Junk is skipped.
    pub fn parse_steps(column: &str) -> Vec<u32> {
        let mut steps: Vec<u32> = column
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        steps.sort_unstable();
        steps.dedup();
        steps
    }

    pub fn steps_column(&self) -> String {
        self.completed_steps
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Progress across every lab plus the derived score.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(default)]
    pub progress: BTreeMap<u32, LabProgress>,
    #[serde(default)]
    pub completed_labs: Vec<u32>,
    #[serde(default)]
    pub total_score: u32,
}

impl ProgressSnapshot {
    pub fn lab(&self, lab_id: u32) -> Option<&LabProgress> {
        self.progress.get(&lab_id)
    }

    pub fn lab_mut(&mut self, lab_id: u32) -> &mut LabProgress {
        self.progress
            .entry(lab_id)
            .or_insert_with(|| LabProgress::new(lab_id))
    }

    pub fn completed_count(&self, lab_id: u32) -> usize {
        self.lab(lab_id).map_or(0, |p| p.completed_steps.len())
    }

    pub fn is_lab_complete(&self, lab_id: u32) -> bool {
        self.lab(lab_id).is_some_and(LabProgress::is_complete)
    }

    pub fn mark_lab_complete(&mut self, lab_id: u32) {
        if let Err(pos) = self.completed_labs.binary_search(&lab_id) {
            self.completed_labs.insert(pos, lab_id);
        }
    }
}

/// Body of `POST /api/progress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStepInput {
    pub lab_id: u32,
    pub step_id: u32,
}

/// Reply to `POST /api/progress`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStepResponse {
    pub lab_progress: LabProgress,
    /// True only on the write that completed the lab.
    pub lab_completed: bool,
    pub new_total_score: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_steps_sorted_and_unique() {
        let mut p = LabProgress::new(2);
        assert!(p.insert(3));
        assert!(p.insert(1));
        assert!(!p.insert(3));
        assert_eq!(p.completed_steps, vec![1, 3]);
        assert_eq!(p.steps_column(), "1,3");
    }

    #[test]
    fn steps_column_parses_leniently() {
        assert_eq!(LabProgress::parse_steps("3, 1,x,,1"), vec![1, 3]);
        assert!(LabProgress::parse_steps("").is_empty());
    }

    #[test]
    fn snapshot_json_uses_lab_ids_as_keys() {
        let mut snapshot = ProgressSnapshot::default();
        snapshot.lab_mut(1).insert(4);
        snapshot.total_score = 100;

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["progress"]["1"]["completed_steps"][0], 4);

        let back: ProgressSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }
}
