pub const MIB: u64 = 1024 * 1024;

pub const DEFAULT_CHUNK_SIZE: u64 = 16 * MIB;
pub const DEFAULT_OVERLAP: u64 = 1024;
pub const DEFAULT_MIN_LEN: usize = 6;
pub const DEFAULT_PREVIEW_LEN: usize = 200;

pub const DEFAULT_MIN_PREVIEW_LEN: usize = 8;
pub const DEFAULT_TOP_DOMAINS: usize = 25;
pub const DEFAULT_CHAT_SAMPLE: usize = 100;

/// Bounded channel capacity per worker thread.
pub const CHANNEL_CAPACITY_MULTIPLIER: usize = 2;
pub const MIN_CHANNEL_CAPACITY: usize = 4;
/// Windows read but not yet written, per worker thread.
pub const WINDOWS_IN_FLIGHT_PER_WORKER: usize = 4;

/// Individual account, public universe, desktop instance: 0x0110000100000000.
pub const STEAMID64_BASE: u64 = 76_561_197_960_265_728;
pub const STEAMID64_MAX: u64 = STEAMID64_BASE + u32::MAX as u64;
pub const STEAMID64_DIGITS: usize = 17;

pub const UNIX_MS_DIGITS: usize = 13;
/// 2003-09-12T00:00:00Z, the public launch of the service.
pub const UNIX_MS_MIN: u64 = 1_063_324_800_000;
/// 2100-01-01T00:00:00Z (exclusive).
pub const UNIX_MS_MAX: u64 = 4_102_444_800_000;

pub const MIN_MESSAGE_CHARS: usize = 3;
