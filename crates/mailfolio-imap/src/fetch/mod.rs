//! Message pre-fetching.
//!
//! A [`PrefetchProfile`] names what a folder loads alongside every message it
//! hands out. A [`FetchPlan`] turns the profile into batched FETCH commands
//! and assembles the answers into [`MessageRecord`]s, recording which
//! attributes the server left out.

mod plan;
mod profile;
mod record;

pub use plan::{FetchPlan, IdKind};
pub use profile::{PrefetchItem, PrefetchProfile};
pub use record::{Field, MessageRecord};
