//! Guardian Supervisor: policy enforcement for autonomous agent actions.
//!
//! Agents submit action intents; Guardian classifies the payload, matches
//! policy rules, optionally consults an LLM risk scorer and renders one of
//! ALLOW, REWRITE, REQUIRE_APPROVAL or BLOCK. Decisions flow back over a
//! decision stream; REQUIRE_APPROVAL opens a durable work item a human
//! resolves through the approvals API.

pub mod api;
pub mod classifiers;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod policy;
pub mod scorer;
pub mod state;
pub mod streams;
