//! Typed client for the remote job orchestration service.
//!
//! Provides payload types for the `$type`-discriminated wire contract,
//! per-call endpoint routing based on submission timestamp, an HTTP
//! client ([`api::OrchestratorApi`]), and the [`gateway::JobGateway`]
//! trait the rest of the workspace depends on.

pub mod api;
pub mod gateway;
pub mod payload;
pub mod routing;
