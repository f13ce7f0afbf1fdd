//! System-wide configuration values for the lifecycle and alert engines.
//! Each constant corresponds to a concrete number written into spec §4.

// Lifecycle timing (spec §4.6). Fixed thresholds, not tunable guesses.
/// Idle monitor fires this long after the last heartbeat (spec §4.6.7).
pub const IDLE_MONITOR_SECS: i64 = 300;
/// Beyond this much silence, an idle agent with pending work gets an alert (spec §4.6.7).
pub const IDLE_TOO_LONG_SECS: i64 = 1800;
/// Sliding window for error-rate aggregation (spec §4.6.4).
pub const ERROR_WINDOW_SECS: i64 = 600;
/// Error count that trips `detectBlocked`.
pub const ERROR_BLOCK_THRESHOLD: u32 = 3;
/// Error count that additionally triggers sleep.
pub const ERROR_SLEEP_THRESHOLD: u32 = 5;

// Alert engine timing (spec §4.4 default rule table).
pub const DELAY_BLOCKED_MEDIUM_MS: u64 = 600_000;
pub const DELAY_BLOCKED_LOW_MS: u64 = 3_600_000;
pub const DELAY_COMPLETED_BATCH_MS: u64 = 900_000;
pub const DELAY_IDLE_ALL_MS: u64 = 1_800_000;
pub const DELAY_STALE_ALL_MS: u64 = 7_200_000;

// Anti-spam (spec §4.4).
pub const PUSH_GLOBAL_MAX_PER_HOUR: u32 = 10;
pub const PUSH_PER_AGENT_MAX_PER_HOUR: u32 = 3;
pub const IN_APP_DIGEST_THRESHOLD: u32 = 5;
pub const IN_APP_DIGEST_WINDOW_SECS: i64 = 60;

// Cross-agent throttle (spec §4.6.9).
pub const PUSH_THROTTLE_WINDOW_MS: i64 = 3_600_000;
pub const PUSH_THROTTLE_MAX_PER_AGENT: u32 = 3;

// Stream gateway (spec §4.5 / §6).
pub const STREAM_KEEPALIVE_SECS: u64 = 15;
/// Per-subscriber bounded queue capacity (spec §4.3).
pub const EVENT_BUS_QUEUE_CAPACITY: usize = 256;

// Security (spec §6).
pub const ENCRYPTION_KEY_FILE: &str = "message-key.bin";
pub const ENCRYPTION_KEY_LEN: usize = 32;
