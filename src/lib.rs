//! chatroute - chat backend with multi-provider model selection and failover
//!
//! Each chat turn is routed across a priority-ordered catalog of hosted
//! models. Auto mode prefers whichever model answered last and fails over
//! on timeouts, rate limits and provider errors; an explicit model choice is
//! tried exactly once.

pub mod catalog;
pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod message;
pub mod metrics;
pub mod middleware;
pub mod providers;
pub mod router;
pub mod telemetry;
