//! Shared constants for end-to-end tests
//!
//! This module contains all constants used across the test suite.
//! When test data changes (member credentials, board names, etc.),
//! update only this file.

// ============================================================================
// Test Member Credentials
// ============================================================================

/// Regular test member name
pub const TEST_MEMBER: &str = "testmember";

/// Regular test member password
pub const TEST_PASS: &str = "testpass123";

/// Moderator test member name
pub const MOD_MEMBER: &str = "moderator";

/// Moderator test member password
pub const MOD_PASS: &str = "modpass123";

/// Admin test member name
pub const ADMIN_MEMBER: &str = "admin";

/// Admin test member password
pub const ADMIN_PASS: &str = "adminpass123";

// ============================================================================
// Seeded Forum Content
// ============================================================================

/// First board name, holds the seeded topic and messages
pub const BOARD_1_NAME: &str = "General Discussion";

/// Second board name, empty on spawn
pub const BOARD_2_NAME: &str = "Announcements";

/// Messages seeded into the first board's topic
pub const SEEDED_MESSAGE_COUNT: usize = 3;

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;

/// Upper bound on continuation round-trips before a test gives up
pub const MAX_CONTINUATIONS: usize = 200;
