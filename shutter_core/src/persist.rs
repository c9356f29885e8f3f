//! Persisted controller state on top of a `KeyValueStore`.
//!
//! Values are little-endian `i32`s (arrays for the drift rings). Reads never
//! fail: a missing, unreadable or malformed key falls back to its default
//! and the problem is logged. Write failures are logged and swallowed.

use shutter_traits::KeyValueStore;

use crate::config::WindowOpenLogic;
use crate::drift::{DriftMonitor, History};
use crate::hw_error::map_store_error;

pub const KEY_MAX_COUNT: &str = "max_count";
pub const KEY_CURRENT: &str = "cur_pos";
pub const KEY_DIR_INVERTED: &str = "dir_inv";
pub const KEY_WINDOW_LOGIC: &str = "win_logic";
pub const KEY_DRIFT_TOP: &str = "drift_top";
pub const KEY_DRIFT_TOP_IDX: &str = "drift_top_idx";
pub const KEY_DRIFT_TOP_LEN: &str = "drift_top_len";
pub const KEY_DRIFT_BOTTOM: &str = "drift_bot";
pub const KEY_DRIFT_BOTTOM_IDX: &str = "drift_bot_idx";
pub const KEY_DRIFT_BOTTOM_LEN: &str = "drift_bot_len";
pub const KEY_DRIFT_CYCLES: &str = "drift_cycles";

pub fn encode_i32(v: i32) -> [u8; 4] {
    v.to_le_bytes()
}

pub fn decode_i32(bytes: &[u8]) -> Option<i32> {
    let arr: [u8; 4] = bytes.try_into().ok()?;
    Some(i32::from_le_bytes(arr))
}

pub fn encode_i32_slice(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn decode_i32_slice(bytes: &[u8]) -> Option<Vec<i32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    bytes.chunks_exact(4).map(decode_i32).collect()
}

/// Everything restored at startup.
#[derive(Debug, Clone, Default)]
pub struct PersistedState {
    /// 0 when uncalibrated.
    pub max_count: i32,
    pub current: i32,
    pub direction_inverted: Option<bool>,
    pub window_logic: Option<WindowOpenLogic>,
    pub top: History,
    pub bottom: History,
    pub full_cycles: u32,
}

impl PersistedState {
    pub fn calibrated(&self) -> bool {
        self.max_count > 0
    }
}

fn read_raw<K: KeyValueStore + ?Sized>(store: &K, key: &str) -> Option<Vec<u8>> {
    match store.get(key) {
        Ok(v) => v,
        Err(e) => {
            let err = map_store_error(&*e);
            tracing::warn!(key, error = %err, "state read failed, using default");
            None
        }
    }
}

fn read_i32<K: KeyValueStore + ?Sized>(store: &K, key: &str) -> Option<i32> {
    let raw = read_raw(store, key)?;
    let v = decode_i32(&raw);
    if v.is_none() {
        tracing::warn!(key, len = raw.len(), "malformed state value, using default");
    }
    v
}

fn read_history<K: KeyValueStore + ?Sized>(
    store: &K,
    slots_key: &str,
    idx_key: &str,
    len_key: &str,
) -> History {
    let Some(slots) = read_raw(store, slots_key) else {
        return History::new();
    };
    let cursor = read_i32(store, idx_key).and_then(|v| usize::try_from(v).ok());
    let len = read_i32(store, len_key).and_then(|v| usize::try_from(v).ok());
    let ring = decode_i32_slice(&slots)
        .zip(cursor.zip(len))
        .and_then(|(slots, (cursor, len))| History::from_parts(&slots, cursor, len));
    ring.unwrap_or_else(|| {
        tracing::warn!(key = slots_key, "inconsistent drift history, starting empty");
        History::new()
    })
}

/// Restore the persisted state, defaulting anything missing.
pub fn load<K: KeyValueStore + ?Sized>(store: &K) -> PersistedState {
    let max_count = read_i32(store, KEY_MAX_COUNT).unwrap_or(0).max(0);
    let current = read_i32(store, KEY_CURRENT).unwrap_or(0).max(0);
    let current = if max_count > 0 {
        current.min(max_count)
    } else {
        current
    };
    let direction_inverted = read_i32(store, KEY_DIR_INVERTED).map(|v| v != 0);
    let window_logic = read_i32(store, KEY_WINDOW_LOGIC).and_then(|code| {
        let logic = WindowOpenLogic::from_code(code);
        if logic.is_none() {
            tracing::warn!(code, "unknown window logic code, using configured default");
        }
        logic
    });
    let top = read_history(store, KEY_DRIFT_TOP, KEY_DRIFT_TOP_IDX, KEY_DRIFT_TOP_LEN);
    let bottom = read_history(
        store,
        KEY_DRIFT_BOTTOM,
        KEY_DRIFT_BOTTOM_IDX,
        KEY_DRIFT_BOTTOM_LEN,
    );
    let full_cycles = read_i32(store, KEY_DRIFT_CYCLES)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0);

    PersistedState {
        max_count,
        current,
        direction_inverted,
        window_logic,
        top,
        bottom,
        full_cycles,
    }
}

fn write<K: KeyValueStore + ?Sized>(store: &mut K, key: &str, value: &[u8]) -> bool {
    match store.put(key, value) {
        Ok(()) => true,
        Err(e) => {
            let err = map_store_error(&*e);
            tracing::warn!(key, error = %err, "state write failed");
            false
        }
    }
}

fn clamp_i32(v: impl TryInto<i32>) -> i32 {
    v.try_into().unwrap_or(i32::MAX)
}

/// Persist travel and position. Returns `false` if any write failed.
pub fn save_position<K: KeyValueStore + ?Sized>(
    store: &mut K,
    max_count: i32,
    calibrated: bool,
    current: i32,
) -> bool {
    let max = if calibrated { max_count } else { 0 };
    let a = write(store, KEY_MAX_COUNT, &encode_i32(max));
    let b = write(store, KEY_CURRENT, &encode_i32(current));
    a && b
}

pub fn save_settings<K: KeyValueStore + ?Sized>(
    store: &mut K,
    direction_inverted: bool,
    window_logic: WindowOpenLogic,
) -> bool {
    let a = write(
        store,
        KEY_DIR_INVERTED,
        &encode_i32(i32::from(direction_inverted)),
    );
    let b = write(store, KEY_WINDOW_LOGIC, &encode_i32(window_logic.code()));
    a && b
}

pub fn save_drift<K: KeyValueStore + ?Sized>(store: &mut K, drift: &DriftMonitor) -> bool {
    let rings = [
        (KEY_DRIFT_TOP, KEY_DRIFT_TOP_IDX, KEY_DRIFT_TOP_LEN, drift.top()),
        (
            KEY_DRIFT_BOTTOM,
            KEY_DRIFT_BOTTOM_IDX,
            KEY_DRIFT_BOTTOM_LEN,
            drift.bottom(),
        ),
    ];
    let mut ok = true;
    for (slots_key, idx_key, len_key, ring) in rings {
        ok &= write(store, slots_key, &encode_i32_slice(ring.slots()));
        ok &= write(store, idx_key, &encode_i32(clamp_i32(ring.cursor())));
        ok &= write(store, len_key, &encode_i32(clamp_i32(ring.len())));
    }
    ok &= write(
        store,
        KEY_DRIFT_CYCLES,
        &encode_i32(clamp_i32(drift.full_cycles())),
    );
    ok
}

/// Rate limit for position writes during motion.
#[derive(Debug, Clone)]
pub struct WriteLimiter {
    min_interval_ms: u64,
    min_pulses: u32,
    last_write_ms: u64,
    last_written: i32,
}

impl WriteLimiter {
    pub fn new(min_interval_ms: u64, min_pulses: u32, current: i32) -> Self {
        Self {
            min_interval_ms,
            min_pulses,
            last_write_ms: 0,
            last_written: current,
        }
    }

    pub fn due(&self, now_ms: u64, current: i32) -> bool {
        now_ms.saturating_sub(self.last_write_ms) >= self.min_interval_ms
            && current.abs_diff(self.last_written) >= self.min_pulses
    }

    pub fn differs(&self, current: i32) -> bool {
        current != self.last_written
    }

    pub fn record(&mut self, now_ms: u64, current: i32) {
        self.last_write_ms = now_ms;
        self.last_written = current;
    }
}
