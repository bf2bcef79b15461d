//! Guided missions: each lab is an ordered set of steps, and a tracker that
//! turns learner events into monotonic step completion.

mod step;
mod tracker;

pub use step::*;
pub use tracker::*;
