//! Pure domain logic for the job orchestration core.
//!
//! Cost computation, generation parameter tables, prompt-safety
//! heuristics, and the training sweep state machine all live here as
//! side-effect-free functions so they can be exercised without a
//! database or network.

pub mod cost;
pub mod error;
pub mod params;
pub mod prompt_safety;
pub mod resource;
pub mod training;
pub mod types;
