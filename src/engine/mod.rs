//! Cascade orchestration.
//!
//! ```text
//! ControlEvent ──► validate ──► FilterState' ──► TransformChain (store, &mut)
//!                                                      │
//!                                                      ▼
//!            Snapshot ◄── titles ◄── tables ◄── width ◄── views x2
//! ```
//!
//! One event at a time. A rejected event changes nothing; an accepted one
//! replaces the published [`Snapshot`] wholesale.

pub mod dashboard;
pub mod events;

pub use dashboard::{Dashboard, Phase, Snapshot};
pub use events::ControlEvent;
