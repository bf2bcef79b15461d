//! Wire and storage models shared by the progress service, its client and
//! the local cache.
//!
//! - [`LabProgress`] / [`ProgressSnapshot`]: per-lab completed steps and the
//!   aggregate score. Both sides of the sync speak these.
//! - [`User`], [`Identity`]: an account on the service and the token the
//!   console holds for it.
//! - [`LabInfo`]: catalogue card served by `/api/labs`.

mod lab;
mod progress;
mod user;

pub use lab::*;
pub use progress::*;
pub use user::*;
