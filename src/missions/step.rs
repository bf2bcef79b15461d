use serde::{Deserialize, Serialize};

use crate::console::{Command, Predicate};

/// Something the learner did that a step may be waiting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepEvent {
    /// A console line that produced output.
    Command(String),
    /// A query typed into the simulated search engine.
    Search(String),
    /// An answer typed into a simulated profile page.
    ProfileAnswer(String),
    /// The learner clicked the discovered flag link.
    FlagCaptured,
}

impl StepEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Command(_) => EventKind::Command,
            Self::Search(_) => EventKind::Search,
            Self::ProfileAnswer(_) => EventKind::ProfileAnswer,
            Self::FlagCaptured => EventKind::FlagCaptured,
        }
    }

    fn text(&self) -> Option<&str> {
        match self {
            Self::Command(t) | Self::Search(t) | Self::ProfileAnswer(t) => Some(t),
            Self::FlagCaptured => None,
        }
    }
}

/// Which kind of event a step listens to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Command,
    Search,
    ProfileAnswer,
    FlagCaptured,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Search => "search",
            Self::ProfileAnswer => "profile_answer",
            Self::FlagCaptured => "flag_captured",
        }
    }
}

/// One objective in a lab's mission.
///
/// The predicate is evaluated over the event text tokenized as if it were a
/// console line, so search queries and profile answers can use the same
/// substring predicates as payload-bearing commands.
#[derive(Debug, Clone)]
pub struct Step {
    pub id: u32,
    pub listens_to: EventKind,
    pub title: &'static str,
    pub objective: &'static str,
    pub hint: &'static str,
    /// An input that satisfies this step. Empty for flag captures.
    pub solution: &'static str,
    pub predicate: Predicate,
}

impl Step {
    fn new(id: u32, listens_to: EventKind, predicate: Predicate) -> Self {
        Self {
            id,
            listens_to,
            title: "",
            objective: "",
            hint: "",
            solution: "",
            predicate,
        }
    }

    pub fn on_command(id: u32, predicate: Predicate) -> Self {
        Self::new(id, EventKind::Command, predicate)
    }

    pub fn on_search(id: u32, predicate: Predicate) -> Self {
        Self::new(id, EventKind::Search, predicate)
    }

    pub fn on_profile_answer(id: u32, predicate: Predicate) -> Self {
        Self::new(id, EventKind::ProfileAnswer, predicate)
    }

    pub fn on_flag_captured(id: u32) -> Self {
        Self::new(id, EventKind::FlagCaptured, Predicate::Always)
    }

    pub fn title(mut self, title: &'static str) -> Self {
        self.title = title;
        self
    }

    pub fn objective(mut self, objective: &'static str) -> Self {
        self.objective = objective;
        self
    }

    pub fn hint(mut self, hint: &'static str) -> Self {
        self.hint = hint;
        self
    }

    pub fn solution(mut self, solution: &'static str) -> Self {
        self.solution = solution;
        self
    }

    pub fn satisfied_by(&self, event: &StepEvent) -> bool {
        if event.kind() != self.listens_to {
            return false;
        }
        match event.text() {
            None => matches!(self.predicate, Predicate::Always),
            Some(text) => Command::parse(text).is_some_and(|cmd| self.predicate.matches(&cmd)),
        }
    }

    /// The event that replays [`Step::solution`].
    pub fn solution_event(&self) -> StepEvent {
        let text = self.solution.to_string();
        match self.listens_to {
            EventKind::Command => StepEvent::Command(text),
            EventKind::Search => StepEvent::Search(text),
            EventKind::ProfileAnswer => StepEvent::ProfileAnswer(text),
            EventKind::FlagCaptured => StepEvent::FlagCaptured,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StepSetError {
    #[error("a lab needs at least one step")]
    Empty,
    #[error("step id {0} is used more than once")]
    Duplicate(u32),
    #[error("step id {id} comes after {previous}; ids must ascend")]
    OutOfOrder { previous: u32, id: u32 },
}

/// A lab's steps in id order. Ids are unique and ascending, and never change
/// once loaded.
#[derive(Debug, Clone)]
pub struct StepSet {
    steps: Vec<Step>,
}

impl StepSet {
    pub fn new(steps: Vec<Step>) -> Result<Self, StepSetError> {
        if steps.is_empty() {
            return Err(StepSetError::Empty);
        }
        for pair in steps.windows(2) {
            let (previous, id) = (pair[0].id, pair[1].id);
            if previous == id {
                return Err(StepSetError::Duplicate(id));
            }
            if previous > id {
                return Err(StepSetError::OutOfOrder { previous, id });
            }
        }
        Ok(Self { steps })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&Step> {
        self.steps
            .binary_search_by_key(&id, |s| s.id)
            .ok()
            .map(|i| &self.steps[i])
    }

    pub fn contains(&self, id: u32) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.steps.iter().map(|s| s.id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Step> {
        self.steps.iter()
    }
}

impl<'a> IntoIterator for &'a StepSet {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::rules::predicates::*;

    #[test]
    fn rejects_duplicate_and_unordered_ids() {
        let dup = StepSet::new(vec![
            Step::on_command(1, cmd("a")),
            Step::on_command(1, cmd("b")),
        ]);
        assert_eq!(dup.unwrap_err(), StepSetError::Duplicate(1));

        let unordered = StepSet::new(vec![
            Step::on_command(2, cmd("a")),
            Step::on_command(1, cmd("b")),
        ]);
        assert_eq!(
            unordered.unwrap_err(),
            StepSetError::OutOfOrder { previous: 2, id: 1 }
        );

        assert_eq!(StepSet::new(vec![]).unwrap_err(), StepSetError::Empty);
    }

    #[test]
    fn steps_only_listen_to_their_event_kind() {
        let step = Step::on_search(7, contains("site:evilcorp.com"));
        assert!(step.satisfied_by(&StepEvent::Search("site:EvilCorp.com".into())));
        assert!(!step.satisfied_by(&StepEvent::Command("site:evilcorp.com".into())));
        assert!(!step.satisfied_by(&StepEvent::Search("   ".into())));

        let flag = Step::on_flag_captured(9);
        assert!(flag.satisfied_by(&StepEvent::FlagCaptured));
        assert!(!flag.satisfied_by(&StepEvent::Command("flag".into())));
    }
}
