use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::step::{Step, StepEvent, StepSet};

/// What an event or manual completion did to the mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    StepCompleted { step: u32 },
    /// The step that filled the set. Returned once per reset cycle.
    LabCompleted { step: u32, at: DateTime<Utc> },
}

impl Transition {
    pub fn completed_step(&self) -> Option<u32> {
        match self {
            Self::Unchanged => None,
            Self::StepCompleted { step } | Self::LabCompleted { step, .. } => Some(*step),
        }
    }

    pub fn is_lab_completed(&self) -> bool {
        matches!(self, Self::LabCompleted { .. })
    }
}

/// Completion state of one lab's mission.
///
/// The completed set only grows, and only ever holds ids from the step set.
/// `completed_at` is set exactly when the set becomes full. [`reset`] is the
/// only way back.
///
/// [`reset`]: MissionTracker::reset
#[derive(Debug, Clone)]
pub struct MissionTracker {
    lab_id: u32,
    steps: StepSet,
    completed: BTreeSet<u32>,
    completed_at: Option<DateTime<Utc>>,
}

impl MissionTracker {
    pub fn new(lab_id: u32, steps: StepSet) -> Self {
        Self {
            lab_id,
            steps,
            completed: BTreeSet::new(),
            completed_at: None,
        }
    }

    /// Load persisted state without signalling. Unknown ids are dropped.
    pub fn restore(
        &mut self,
        ids: impl IntoIterator<Item = u32>,
        completed_at: Option<DateTime<Utc>>,
    ) {
        self.completed = ids.into_iter().filter(|id| self.steps.contains(*id)).collect();
        self.completed_at = if self.all_complete() {
            Some(completed_at.unwrap_or_else(Utc::now))
        } else {
            None
        };
    }

    /// Complete the first incomplete step the event satisfies, if any.
    pub fn handle(&mut self, event: &StepEvent) -> Transition {
        let hit = self
            .steps
            .iter()
            .find(|step| !self.completed.contains(&step.id) && step.satisfied_by(event))
            .map(|step| step.id);

        match hit {
            Some(id) => self.complete_step(id),
            None => Transition::Unchanged,
        }
    }

    /// Mark a step done. Repeats and ids outside the lab are no-ops.
    pub fn complete_step(&mut self, id: u32) -> Transition {
        if !self.steps.contains(id) || !self.completed.insert(id) {
            return Transition::Unchanged;
        }
        tracing::debug!(lab = self.lab_id, step = id, "step completed");

        if self.all_complete() && self.completed_at.is_none() {
            let at = Utc::now();
            self.completed_at = Some(at);
            tracing::info!(lab = self.lab_id, "lab completed");
            return Transition::LabCompleted { step: id, at };
        }
        Transition::StepCompleted { step: id }
    }

    pub fn reset(&mut self) {
        self.completed.clear();
        self.completed_at = None;
    }

    pub fn lab_id(&self) -> u32 {
        self.lab_id
    }

    pub fn steps(&self) -> &StepSet {
        &self.steps
    }

    /// Lowest step id not yet completed.
    pub fn current_step_id(&self) -> Option<u32> {
        self.current_step().map(|s| s.id)
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.steps.iter().find(|s| !self.completed.contains(&s.id))
    }

    pub fn all_complete(&self) -> bool {
        self.completed.len() == self.steps.len()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn total(&self) -> usize {
        self.steps.len()
    }

    pub fn completed_steps(&self) -> &BTreeSet<u32> {
        &self.completed
    }

    pub fn is_completed(&self, id: u32) -> bool {
        self.completed.contains(&id)
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}
