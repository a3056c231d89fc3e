//! Deterministic noise
//!
//! Every random-looking value in the engine is a pure function of
//! (seed, step, salt). Nothing is carried between calls, so a restored
//! snapshot continues with exactly the values the original run would have
//! produced.

/// Salt channels, combined with a per-car or per-sector index
pub mod channel {
    pub const SPEED: u64 = 1;
    pub const FAULT: u64 = 2;
    pub const FAULT_KIND: u64 = 3;
    pub const RAIN_FRONT: u64 = 16;
    pub const RAIN_SECTOR: u64 = 17;
    pub const AMBIENT: u64 = 18;
    pub const HUMIDITY: u64 = 19;
    pub const WIND_SPEED: u64 = 20;
    pub const WIND_DIRECTION: u64 = 21;
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// Salt for a channel scoped to one subject (car number, sector id)
pub fn salt(channel: u64, subject: u64) -> u64 {
    (subject << 8) | channel
}

pub fn hash(seed: u64, step: u64, salt: u64) -> u64 {
    splitmix64(seed ^ splitmix64(step ^ splitmix64(salt)))
}

/// Uniform value in [0, 1)
pub fn unit(seed: u64, step: u64, salt: u64) -> f64 {
    (hash(seed, step, salt) >> 11) as f64 / (1u64 << 53) as f64
}

/// Value in [-amplitude, amplitude)
pub fn jitter(seed: u64, step: u64, salt: u64, amplitude: f64) -> f64 {
    (unit(seed, step, salt) - 0.5) * 2.0 * amplitude
}

pub fn smoothstep(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
