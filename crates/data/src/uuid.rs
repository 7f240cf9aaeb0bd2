//! Version 4 UUID generation
//!
//! A 128-bit xorshift128+ stream seeded once from OS randomness; the
//! stream is advanced under a mutex so concurrent generators never share
//! a state transition. Version and variant bits are set per RFC 4122.

use ::uuid::Uuid;
use rand::RngCore;
use rand::rngs::OsRng;
use std::sync::Mutex;

static STATE: Mutex<Option<[u64; 2]>> = Mutex::new(None);

fn xorshift128plus(s: &mut [u64; 2]) -> u64 {
    let mut s1 = s[0];
    let s0 = s[1];
    s[0] = s0;
    s1 ^= s1 << 23;
    s[1] = s1 ^ s0 ^ (s1 >> 18) ^ (s0 >> 5);
    s[1].wrapping_add(s0)
}

/// Generate a v4 UUID.
pub fn generate() -> Uuid {
    let mut guard = STATE.lock().expect("uuid state poisoned");
    let state = guard.get_or_insert_with(|| {
        let mut seed = [0u8; 16];
        OsRng.fill_bytes(&mut seed);
        [
            u64::from_ne_bytes(seed[..8].try_into().unwrap()),
            u64::from_ne_bytes(seed[8..].try_into().unwrap()),
        ]
    });
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&xorshift128plus(state).to_ne_bytes());
    bytes[8..].copy_from_slice(&xorshift128plus(state).to_ne_bytes());
    drop(guard);

    bytes[6] = (bytes[6] & 0x0f) | 0x40; // version 4: randomly generated
    bytes[8] = (bytes[8] & 0x3f) | 0x80; // RFC 4122 variant
    Uuid::from_bytes(bytes)
}
