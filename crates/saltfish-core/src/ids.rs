//! Identifier disciplines.
//!
//! Dataset ids are 24 raw random bytes, record ids 8 raw random bytes
//! interpreted as a little-endian u64. Random bytes come from the
//! thread-local generator so concurrent handlers never contend on a lock.
//! `monotonic_tick` is the only piece of process-wide mutable state in the
//! crate: a strictly increasing 64-bit counter anchored to wall-clock
//! microseconds, used to sequence record writes.

use std::sync::atomic::{AtomicI64, Ordering};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;

/// Width of a dataset id in raw bytes.
pub const DATASET_ID_WIDTH: usize = 24;

/// Width of a record id in raw bytes.
pub const RECORD_ID_WIDTH: usize = 8;

const BLOCK_SIZE: usize = std::mem::size_of::<u64>();

/// Returns `width` uniformly random bytes.
///
/// `width` must be a positive multiple of 8: the output is assembled from
/// whole 64-bit draws of the thread-local generator.
///
/// # Panics
///
/// Panics if `width` is zero or not a multiple of 8.
pub fn gen_random_string(width: usize) -> Vec<u8> {
    assert!(
        width > 0 && width % BLOCK_SIZE == 0,
        "width must be a positive multiple of {BLOCK_SIZE} (got {width})"
    );
    let mut rng = rand::thread_rng();
    let mut id = Vec::with_capacity(width);
    for _ in 0..width / BLOCK_SIZE {
        id.extend_from_slice(&rng.gen::<u64>().to_le_bytes());
    }
    id
}

/// One uniform 64-bit draw from the thread-local generator.
pub fn gen_random_u64() -> u64 {
    rand::thread_rng().gen()
}

/// Fresh random dataset id.
pub fn gen_dataset_id() -> Vec<u8> {
    gen_random_string(DATASET_ID_WIDTH)
}

/// Fresh random record id.
pub fn gen_record_id() -> Vec<u8> {
    gen_random_string(RECORD_ID_WIDTH)
}

/// Display form of a raw id: unpadded base64url.
pub fn id_to_str(id: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(id)
}

/// Interprets an 8-byte record id as a little-endian u64. Returns `None` for
/// any other width.
pub fn record_id_to_u64(id: &[u8]) -> Option<u64> {
    let bytes: [u8; RECORD_ID_WIDTH] = id.try_into().ok()?;
    Some(u64::from_le_bytes(bytes))
}

static LAST_TICK: AtomicI64 = AtomicI64::new(0);

/// Returns a 64-bit value strictly greater than every value previously
/// returned, process-wide.
///
/// The counter tracks wall-clock microseconds since the epoch: each call
/// returns `max(now_micros, last + 1)`, advanced with a compare-and-set
/// loop. Under contention a caller retries at most once per concurrent
/// caller, since every failed CAS means another caller made progress.
pub fn monotonic_tick() -> i64 {
    let now = chrono::Utc::now().timestamp_micros();
    let mut last = LAST_TICK.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_TICK.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(observed) => last = observed,
        }
    }
}
