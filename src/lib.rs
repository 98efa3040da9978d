//! # memreclaim
//!
//! A cross-platform memory reclaim utility: it asks the OS to trim process
//! working sets and purge cached pages, and guards that routine against
//! overlapping or too-frequent runs.
//!
//! ## Overview
//!
//! Callers (a "clean now" button, a hotkey, an auto-clean timer) never talk
//! to the OS directly. They go through a single [`coordinator::ReclaimCoordinator`]:
//!
//! ```text
//! caller ──▶ ReclaimCoordinator ──▶ PlatformReclaimer ──▶ OS
//! ```
//!
//! - **Windows**: empty every accessible working set, flush the modified
//!   page list, purge the standby list.
//! - **Linux**: `sync`, then write `3` to `/proc/sys/vm/drop_caches`.
//! - **macOS and others**: always reports an unsupported platform.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use memreclaim::coordinator::{CoordinatorTimings, ReclaimCoordinator};
//! use memreclaim::models::ReclaimOrigin;
//! use memreclaim::monitor::SystemMonitor;
//! use memreclaim::reclaim::platform_reclaimer;
//! use memreclaim::constants::DEFAULT_SETTLE_DELAY;
//!
//! let monitor = Arc::new(SystemMonitor::new());
//! let reclaimer = platform_reclaimer(monitor, DEFAULT_SETTLE_DELAY);
//! let coordinator = ReclaimCoordinator::with_system_clock(reclaimer, CoordinatorTimings::default());
//!
//! let decision = coordinator.request_reclaim(ReclaimOrigin::Manual);
//! println!("{}", decision.user_message());
//! ```
//!
//! ## Module Organization
//!
//! - [`coordinator`]: busy flag, cooldown and grace period
//! - [`reclaim`]: platform reclaimers and the process whitelist
//! - [`monitor`]: CPU and memory readings
//! - [`scheduler`]: threshold-driven auto-clean
//! - [`config`]: YAML configuration
//! - [`privileges`]: elevation checks and token privileges
//!
//! ## Safety
//!
//! `unsafe` is confined to the Windows reclaimer and privilege code (Win32
//! and ntdll calls) and to `geteuid` on Unix.

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Monotonic clock abstraction
pub mod clock;

/// Configuration loading and defaults
pub mod config;

/// Application constants and tuning values
pub mod constants;

/// Reclaim request serialization and rate limiting
pub mod coordinator;

/// Core data models
pub mod models;

/// System CPU and memory statistics
pub mod monitor;

/// Platform-specific privilege management
pub mod privileges;

/// Platform-specific memory reclaim
pub mod reclaim;

/// Auto-clean scheduler
pub mod scheduler;
