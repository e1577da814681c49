//! Shared constants for junction components.

/// Ticks a direction may stay red before it is forced green
pub const STARVATION_THRESHOLD: u32 = 5;

/// Default pause between the end of one tick and the start of the next
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Default pause before the first tick, giving neighbours time to come up
pub const DEFAULT_STARTUP_DELAY_MS: u64 = 1000;

/// Default directory holding every junction's hint record
pub const DEFAULT_HINTS_DIR: &str = "hints";

/// Default world-state Unix socket
pub const DEFAULT_WORLD_STATE_SOCKET: &str = "/tmp/world-state.sock";

/// Prefix of every junction's name, in both the world-state tree and the hint area
pub const JUNCTION_PREFIX: &str = "junction-";

/// World-state key layout
pub mod world_keys {
    /// Separator joining a child segment onto its parent's path
    pub const PATH_SEPARATOR: &str = "::";

    /// Branch field holding the number of queued vehicles
    pub const VEHICLE_COUNT: &str = "vehicle_count";

    /// Branch field holding the light state
    pub const LIGHT: &str = "light";
}

/// World-state wire protocol
pub mod wire {
    /// Leading reply byte marking a missing key
    pub const NOT_FOUND_MARKER: u8 = b'X';

    /// Largest reply read for a single GET
    pub const MAX_REPLY_LEN: usize = 1024;
}

/// Name of the hint record (and world-state root) for a junction.
pub fn junction_name(id: u32) -> String {
    format!("{}{}", JUNCTION_PREFIX, id)
}
