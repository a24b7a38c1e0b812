//! Pools of byte buffers and of encoder/decoder sessions.

use crate::{Decoder, Encoder};
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::sync::OnceLock;
use tracing::debug;

const POOL_NUM: usize = 20;
const MIN_SHIFT: usize = 9;
const MIN_SIZE: usize = 1 << MIN_SHIFT;
const MAX_SIZE: usize = 1 << (MIN_SHIFT + POOL_NUM - 1);
const MAX_IDLE_BUFFERS: usize = 64;
const MAX_IDLE_SESSIONS: usize = 32;

struct BytePool {
    classes: [Mutex<Vec<BytesMut>>; POOL_NUM],
}

fn byte_pool() -> &'static BytePool {
    static POOL: OnceLock<BytePool> = OnceLock::new();
    POOL.get_or_init(|| BytePool {
        classes: std::array::from_fn(|_| Mutex::new(Vec::new())),
    })
}

fn class_of(capacity: usize) -> usize {
    capacity.trailing_zeros() as usize - MIN_SHIFT
}

/// Returns an empty buffer with a capacity of at least `size`.
///
/// The capacity is rounded up to a power of two (512 bytes minimum). Requests above
/// 256 MiB bypass the pool. Returns `None` when `size` is zero.
pub fn acquire_bytes(size: usize) -> Option<BytesMut> {
    if size < 1 {
        return None;
    }
    let capacity = match size.checked_next_power_of_two() {
        Some(capacity) if capacity <= MAX_SIZE => capacity.max(MIN_SIZE),
        _ => return Some(BytesMut::with_capacity(size)),
    };
    let pooled = byte_pool().classes[class_of(capacity)].lock().pop();
    Some(pooled.unwrap_or_else(|| BytesMut::with_capacity(capacity)))
}

/// Returns a buffer to the pool.
///
/// Buffers whose capacity is not one of the pooled size classes are dropped and `false` is
/// returned; callers never need to act on that.
pub fn release_bytes(mut buf: BytesMut) -> bool {
    let capacity = buf.capacity();
    if !(MIN_SIZE..=MAX_SIZE).contains(&capacity) || !capacity.is_power_of_two() {
        return false;
    }
    buf.clear();
    let mut class = byte_pool().classes[class_of(capacity)].lock();
    if class.len() >= MAX_IDLE_BUFFERS {
        debug!(capacity, "byte pool class is full, dropping buffer");
        return false;
    }
    class.push(buf);
    true
}

fn encoders() -> &'static Mutex<Vec<Encoder>> {
    static ENCODERS: OnceLock<Mutex<Vec<Encoder>>> = OnceLock::new();
    ENCODERS.get_or_init(|| Mutex::new(Vec::new()))
}

fn decoders() -> &'static Mutex<Vec<Decoder>> {
    static DECODERS: OnceLock<Mutex<Vec<Decoder>>> = OnceLock::new();
    DECODERS.get_or_init(|| Mutex::new(Vec::new()))
}

/// Takes an encoder from the pool, or creates one.
pub fn acquire_encoder(simple: bool) -> Encoder {
    let pooled = encoders().lock().pop();
    match pooled {
        Some(mut enc) => {
            enc.set_simple(simple);
            enc
        }
        None => Encoder::new(simple),
    }
}

/// Resets the encoder and returns it to the pool.
pub fn release_encoder(mut enc: Encoder) {
    enc.free();
    let mut idle = encoders().lock();
    if idle.len() < MAX_IDLE_SESSIONS {
        idle.push(enc);
    } else {
        debug!("encoder pool is full, dropping encoder");
    }
}

/// Takes a decoder from the pool, or creates one, reading from `data`.
pub fn acquire_decoder(data: Bytes, simple: bool) -> Decoder {
    let pooled = decoders().lock().pop();
    match pooled {
        Some(mut dec) => {
            dec.reset_bytes(data);
            dec.set_simple(simple);
            dec
        }
        None => Decoder::new(data, simple),
    }
}

/// Resets the decoder and returns it to the pool.
pub fn release_decoder(mut dec: Decoder) {
    dec.free();
    let mut idle = decoders().lock();
    if idle.len() < MAX_IDLE_SESSIONS {
        idle.push(dec);
    } else {
        debug!("decoder pool is full, dropping decoder");
    }
}
