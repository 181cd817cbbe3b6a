//! Image-generation request orchestration.
//!
//! Composes the resource resolver, safety pipeline, quota limiter, and
//! ledger into a single submit-and-format flow in front of the remote
//! job service, and reverse-maps raw responses back into the domain
//! request model.

pub mod flags;
pub mod limiter;
pub mod moderation;
pub mod orchestrate;
pub mod request;
pub mod resolver;
pub mod safety;
pub mod stores;
