//! One learner working through one lab.
//!
//! Console lines reach the mission tracker through the interpreter's listener
//! hook. Search queries, profile answers and flag captures come in through
//! their own entry points. Every completed step is committed to the
//! [`ProgressStore`].

use std::sync::mpsc::{self, Receiver};

use tokio::task::JoinHandle;

use crate::console::{Interpreter, Response, Submission};
use crate::labs::{Flag, Lab, LabError, LabMeta, Profile};
use crate::missions::{MissionTracker, Step, StepEvent, Transition};
use crate::progress::ProgressStore;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Lab(#[from] LabError),
    #[error("lab {0} is locked: finish the previous lab while signed in")]
    LabLocked(u32),
}

/// The mission side of an action.
#[derive(Debug)]
pub struct StepUpdate {
    pub transition: Transition,
    /// Remote push for the step, if one was started.
    pub sync: Option<JoinHandle<()>>,
}

impl StepUpdate {
    fn unchanged() -> Self {
        Self {
            transition: Transition::Unchanged,
            sync: None,
        }
    }
}

#[derive(Debug)]
pub struct CommandResult {
    pub submission: Submission,
    pub update: StepUpdate,
}

#[derive(Debug)]
pub struct SearchResult {
    pub response: Response,
    /// Set when this query surfaced the flag link.
    pub flag_revealed: bool,
    pub update: StepUpdate,
}

pub struct LabSession {
    meta: &'static LabMeta,
    interpreter: Interpreter,
    tracker: MissionTracker,
    store: ProgressStore,
    commands: Receiver<String>,
    search: Option<crate::console::RuleTable>,
    profile: Option<Profile>,
    flag: Option<Flag>,
    flag_revealed: bool,
}

impl LabSession {
    /// Open a lab the learner has unlocked, resuming any saved progress.
    pub fn open(lab_id: u32, store: ProgressStore) -> Result<Self, SessionError> {
        let lab = Lab::load(lab_id)?;
        if !store.is_unlocked(lab_id) {
            return Err(SessionError::LabLocked(lab_id));
        }

        let saved = store.lab_progress(lab_id);
        let mut tracker = MissionTracker::new(lab_id, lab.steps);
        tracker.restore(saved.completed_steps, saved.completed_at);

        let (tx, commands) = mpsc::channel();
        let mut interpreter = Interpreter::new(lab.rules, lab.vocabulary);
        interpreter.subscribe(move |line| {
            let _ = tx.send(line.to_string());
        });

        tracing::debug!(
            lab = lab_id,
            completed = tracker.completed_count(),
            "lab session opened"
        );

        Ok(Self {
            meta: lab.meta,
            interpreter,
            tracker,
            store,
            commands,
            search: lab.search,
            profile: lab.profile,
            flag: lab.flag,
            flag_revealed: false,
        })
    }

    // ============================================================
    // Learner actions
    // ============================================================

    pub fn run_command(&mut self, text: &str) -> CommandResult {
        let submission = self.interpreter.submit(text);

        let mut update = StepUpdate::unchanged();
        while let Ok(line) = self.commands.try_recv() {
            let next = self.apply(&StepEvent::Command(line));
            if next.transition != Transition::Unchanged {
                update = next;
            }
        }

        CommandResult { submission, update }
    }

    /// Run a query through the simulated search engine. `None` if this lab has
    /// no search page or the query is blank.
    pub fn search(&mut self, query: &str) -> Option<SearchResult> {
        let engine = self.search.as_ref()?;
        let cmd = crate::console::Command::parse(query)?;
        let hit = engine.matching_rule(&cmd).map(|(_, rule)| rule.label);
        let response = engine.resolve(&cmd);

        let flag_revealed = match (&self.flag, hit) {
            (Some(flag), Some(label)) => label == flag.revealed_by,
            _ => false,
        };
        if flag_revealed {
            self.flag_revealed = true;
        }

        let update = self.apply(&StepEvent::Search(cmd.raw.clone()));
        Some(SearchResult {
            response,
            flag_revealed,
            update,
        })
    }

    pub fn answer_profile(&mut self, answer: &str) -> StepUpdate {
        if self.profile.is_none() {
            return StepUpdate::unchanged();
        }
        self.apply(&StepEvent::ProfileAnswer(answer.trim().to_string()))
    }

    /// Click the flag link. `None` until a search has revealed it.
    pub fn capture_flag(&mut self) -> Option<(&'static str, StepUpdate)> {
        let flag = self.flag.filter(|_| self.flag_revealed)?;
        Some((flag.value, self.apply(&StepEvent::FlagCaptured)))
    }

    /// Mark a step done without an event. Idempotent.
    pub fn complete_step(&mut self, step_id: u32) -> StepUpdate {
        let transition = self.tracker.complete_step(step_id);
        self.commit(transition)
    }

    /// Erase this lab's progress. The console transcript is kept.
    pub fn reset_progress(&mut self) {
        self.tracker.reset();
        self.store.reset_lab(self.meta.id);
        self.flag_revealed = false;
    }

    fn apply(&mut self, event: &StepEvent) -> StepUpdate {
        let transition = self.tracker.handle(event);
        self.commit(transition)
    }

    fn commit(&mut self, transition: Transition) -> StepUpdate {
        let Some(step) = transition.completed_step() else {
            return StepUpdate::unchanged();
        };
        match self.store.record_step(self.meta.id, step) {
            Ok(outcome) => StepUpdate {
                transition,
                sync: outcome.sync,
            },
            Err(e) => {
                tracing::warn!(lab = self.meta.id, step, "step not recorded: {}", e);
                StepUpdate {
                    transition,
                    sync: None,
                }
            }
        }
    }

    // ============================================================
    // Read-only state
    // ============================================================

    pub fn meta(&self) -> &'static LabMeta {
        self.meta
    }

    pub fn prompt(&self) -> String {
        self.meta.prompt()
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.tracker.current_step()
    }

    pub fn current_step_id(&self) -> Option<u32> {
        self.tracker.current_step_id()
    }

    pub fn all_complete(&self) -> bool {
        self.tracker.all_complete()
    }

    pub fn completed_count(&self) -> usize {
        self.tracker.completed_count()
    }

    pub fn tracker(&self) -> &MissionTracker {
        &self.tracker
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    pub fn store(&self) -> &ProgressStore {
        &self.store
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn has_search(&self) -> bool {
        self.search.is_some()
    }

    pub fn flag_revealed(&self) -> bool {
        self.flag_revealed
    }
}
