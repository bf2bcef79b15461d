use serde::{Deserialize, Serialize};

use crate::labs::{Difficulty, LabMeta};

/// Catalogue entry for one lab, as stored by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabInfo {
    pub id: u32,
    pub slug: String,
    pub title: String,
    pub difficulty: Difficulty,
    pub points: u32,
    pub total_steps: u32,
}

impl From<&LabMeta> for LabInfo {
    fn from(meta: &LabMeta) -> Self {
        Self {
            id: meta.id,
            slug: meta.slug.to_string(),
            title: meta.title.to_string(),
            difficulty: meta.difficulty,
            points: meta.points,
            total_steps: meta.total_steps,
        }
    }
}
