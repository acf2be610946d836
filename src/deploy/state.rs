// ABOUTME: Cutover state marker types for the type state pattern.
// ABOUTME: Zero-sized types make it impossible to route traffic to an unverified candidate.

/// Candidate started in the idle slot; receives no traffic.
/// Available actions: `confirm_health()`, `abort()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Started;

/// Candidate passed the health probe.
/// Available actions: `confirm_smoke()`, `abort()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Healthy;

/// Candidate passed the smoke suite.
/// Available actions: `route()`, `abort()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Verified;

/// Proxy now sends traffic to the candidate.
/// Available actions: `drain()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Routed;

/// Previous instance stopped after its grace period.
/// Available actions: `rebuild_idle()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Drained;
