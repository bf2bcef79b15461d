//! The lab catalogue.
//!
//! Each lab module supplies its console vocabulary as a [`RuleTable`], its
//! mission as a [`StepSet`] and the card metadata shown in listings. The
//! registry order is the unlock order.

mod banners;
mod enumeration;
mod injection;
mod recon;
mod scanning;

use serde::{Deserialize, Serialize};

use crate::console::rules::predicates::cmd;
use crate::console::{Response, Rule, RuleTable};
use crate::missions::{Step, StepSet, StepSetError};

pub const HOSTNAME: &str = "student@cybermasry";

/// Every lab in unlock order.
pub static REGISTRY: [LabMeta; 5] = [
    recon::META,
    scanning::META,
    enumeration::META,
    injection::META,
    banners::META,
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "beginner" => Some(Self::Beginner),
            "intermediate" => Some(Self::Intermediate),
            "advanced" => Some(Self::Advanced),
            _ => None,
        }
    }
}

/// Static card data for one lab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabMeta {
    pub id: u32,
    pub slug: &'static str,
    pub title: &'static str,
    pub subtitle: &'static str,
    pub description: &'static str,
    pub difficulty: Difficulty,
    /// Added to the total score once, when every step is complete.
    pub points: u32,
    pub total_steps: u32,
    /// Working directory shown in the prompt.
    pub cwd: &'static str,
}

impl LabMeta {
    pub fn prompt(&self) -> String {
        format!("{}:{}$", HOSTNAME, self.cwd)
    }
}

pub fn meta(id: u32) -> Option<&'static LabMeta> {
    REGISTRY.iter().find(|m| m.id == id)
}

pub fn by_slug(slug: &str) -> Option<&'static LabMeta> {
    REGISTRY.iter().find(|m| m.slug == slug)
}

pub fn points_for(id: u32) -> u32 {
    meta(id).map_or(0, |m| m.points)
}

pub fn total_points() -> u32 {
    REGISTRY.iter().map(|m| m.points).sum()
}

/// A social profile the learner reads for clues.
#[derive(Debug, Clone, Copy)]
pub struct Profile {
    pub name: &'static str,
    pub headline: &'static str,
    pub posts: &'static [&'static str],
}

/// A flag that becomes clickable once a search result reveals it.
#[derive(Debug, Clone, Copy)]
pub struct Flag {
    pub value: &'static str,
    /// Label of the search rule whose result links to the flag.
    pub revealed_by: &'static str,
}

#[derive(Debug, thiserror::Error)]
pub enum LabError {
    #[error("no lab with id {0}")]
    Unknown(u32),
    #[error("lab {lab} has an invalid step set: {source}")]
    InvalidSteps {
        lab: u32,
        #[source]
        source: StepSetError,
    },
}

/// Everything needed to run one lab.
#[derive(Debug, Clone)]
pub struct Lab {
    pub meta: &'static LabMeta,
    pub rules: RuleTable,
    pub steps: StepSet,
    /// Command names offered by autocomplete, in preference order.
    pub vocabulary: Vec<&'static str>,
    /// Simulated search engine, for labs with search steps.
    pub search: Option<RuleTable>,
    pub profile: Option<Profile>,
    pub flag: Option<Flag>,
}

impl Lab {
    pub fn load(id: u32) -> Result<Self, LabError> {
        match id {
            1 => recon::build(),
            2 => scanning::build(),
            3 => enumeration::build(),
            4 => injection::build(),
            5 => banners::build(),
            _ => Err(LabError::Unknown(id)),
        }
    }

    fn assemble(
        id: u32,
        rules: Vec<Rule>,
        steps: Vec<Step>,
        vocabulary: &[&'static str],
    ) -> Result<Self, LabError> {
        let meta = meta(id).ok_or(LabError::Unknown(id))?;
        let steps = StepSet::new(steps).map_err(|source| LabError::InvalidSteps {
            lab: meta.id,
            source,
        })?;
        Ok(Self {
            meta,
            rules: RuleTable::new(rules),
            steps,
            vocabulary: vocabulary.to_vec(),
            search: None,
            profile: None,
            flag: None,
        })
    }
}

/// The clear-screen rule every console ends with.
fn clear_rule() -> Rule {
    Rule::fixed("clear", cmd("clear"), Response::clear_screen()).example("clear")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_ids_are_contiguous_from_one() {
        for (i, meta) in REGISTRY.iter().enumerate() {
            assert_eq!(meta.id as usize, i + 1);
        }
    }

    #[test]
    fn step_counts_match_loaded_missions() {
        for meta in &REGISTRY {
            let lab = Lab::load(meta.id).unwrap();
            assert_eq!(lab.steps.len(), meta.total_steps as usize, "{}", meta.slug);
        }
    }

    #[test]
    fn unknown_lab_is_rejected() {
        assert!(matches!(Lab::load(0), Err(LabError::Unknown(0))));
        assert!(matches!(Lab::load(6), Err(LabError::Unknown(6))));
    }

    #[test]
    fn catalogue_totals() {
        assert_eq!(total_points(), 875);
        assert_eq!(points_for(3), 175);
        assert_eq!(by_slug("lab05").map(|m| m.id), Some(5));
    }
}
