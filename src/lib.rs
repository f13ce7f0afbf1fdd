//! # Agent Fleet Control
//!
//! A control plane for a fleet of autonomous coding agents. Agents register,
//! pick up work, and report their status over HTTP; the control plane tracks
//! agent and task state, detects blocked or idle agents, and turns those
//! events into deduplicated, throttled notifications, while mirroring a
//! subset of a Linear workspace well enough to auto-assign new issues.
//!
//! ## Architecture
//!
//! - **Store**: the system of record for agents, tasks, messages, and the
//!   cached Linear mirror.
//! - **Lifecycle Manager**: agent/task state machines, watchdog timers, and
//!   block-detection policy.
//! - **Alert Engine**: turns lifecycle events into rate-limited, rule-driven
//!   notifications.
//! - **Event Bus / Stream Gateway**: fans lifecycle and message events out
//!   to dashboard clients over Server-Sent Events.
//! - **Webhook Ingest**: mirrors Linear issues/projects and auto-assigns
//!   startable, unassigned issues to an idle agent.
//! - **API**: the thin HTTP surface tying the above together.

/// HTTP API server and endpoints
pub mod api;
/// Authentication and authorization
pub mod auth;
/// System configuration
pub mod config;
/// System-wide constants
pub mod constants;
/// Error types and handling
pub mod error;
/// In-process pub/sub for dashboard events
pub mod event_bus;
/// Core data models
pub mod models;
/// Rate limiting functionality
pub mod rate_limit;
/// Security utilities and API key management
pub mod security;
/// Agent/task storage
pub mod store;
/// Server-Sent Events gateway
pub mod stream_gateway;
/// Cancellable timers and tickers
pub mod timer;
/// Notification rule engine and anti-spam
pub mod alert;
/// Agent/task state machines and watchdog policy
pub mod lifecycle;
/// Linear webhook ingest
pub mod webhook;

pub use error::{FleetError, Result};
