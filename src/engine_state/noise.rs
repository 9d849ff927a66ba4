//! # Noise Module
//!
//! Deterministic 2D gradient noise used to shape the terrain height field.
//!
//! Every integer lattice point gets a pseudo-random unit gradient derived from
//! `(ix, iy, seed)` through a multiply-xor-rotate hash. A sample is the
//! smoothstep-weighted blend of the four surrounding gradients dotted with the
//! offset to the sample point, so the same `(x, y, seed)` always produces the
//! same bits. The value lies roughly in [-1, 1] and is never clamped.
//!
//! [`GradientNoise`] wraps a seed and implements [`noise::NoiseFn`], which lets the
//! field be fed through the `noise` crate's combinators.

use noise::{NoiseFn, Seedable};

/// Half of the 32-bit hash word, used as the rotation distance.
const HALF_WORD: u32 = u32::BITS / 2;

/// Large odd multipliers of the gradient hash.
const HASH_MULTIPLIERS: [u32; 3] = [3_284_157_443, 1_911_520_717, 2_048_419_325];

/// Maps the full `u32` range onto [0, 2π), with π truncated to eight decimals.
#[allow(clippy::approx_constant)]
const ANGLE_SCALE: f64 = 3.14159265 / (1u64 << 31) as f64;

/// Derives the unit gradient `(sin θ, cos θ)` of the lattice point `(ix, iy)`.
pub fn random_gradient(ix: i32, iy: i32, seed: i32) -> (f32, f32) {
    let mut a = (ix as u32).wrapping_add(seed as u32);
    let mut b = (iy as u32).wrapping_add(seed as u32);

    a = a.wrapping_mul(HASH_MULTIPLIERS[0]);
    b ^= a.rotate_left(HALF_WORD);
    b = b.wrapping_mul(HASH_MULTIPLIERS[1]);
    a ^= b.rotate_left(HALF_WORD);
    a = a.wrapping_mul(HASH_MULTIPLIERS[2]);

    let angle = (a as f64 * ANGLE_SCALE) as f32;
    let angle = f64::from(angle);
    (angle.sin() as f32, angle.cos() as f32)
}

/// Dot product of the gradient at `(ix, iy)` with the offset from that lattice point to `(x, y)`.
fn dot_gradient(ix: i32, iy: i32, x: f32, y: f32, seed: i32) -> f32 {
    let (gx, gy) = random_gradient(ix, iy, seed);
    let dx = x - ix as f32;
    let dy = y - iy as f32;
    dx * gx + dy * gy
}

/// Cubic `3w² - 2w³` blend between `a` and `b`.
fn smooth_step(a: f32, b: f32, w: f32) -> f32 {
    let w = w.clamp(0.0, 1.0);
    (b - a) * (3.0 - w * 2.0) * w * w + a
}

/// Samples the gradient noise field at `(x, y)` for the given seed.
///
/// Integer lattice points always sample to exactly zero.
///
/// # Examples
///
/// ```
/// use voxel_terrain::engine_state::noise::sample;
///
/// assert_eq!(sample(3.25, -7.5, 42).to_bits(), sample(3.25, -7.5, 42).to_bits());
/// assert_eq!(sample(2.0, 5.0, 42), 0.0);
/// ```
pub fn sample(x: f32, y: f32, seed: i32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let x1 = x0.wrapping_add(1);
    let y1 = y0.wrapping_add(1);

    let xf = x - x0 as f32;
    let yf = y - y0 as f32;

    let bottom = smooth_step(
        dot_gradient(x0, y0, x, y, seed),
        dot_gradient(x1, y0, x, y, seed),
        xf,
    );
    let top = smooth_step(
        dot_gradient(x0, y1, x, y, seed),
        dot_gradient(x1, y1, x, y, seed),
        xf,
    );

    smooth_step(bottom, top, yf)
}

/// Sums `octaves` samples of the field at rising frequency and falling amplitude.
///
/// Frequency and amplitude both start at 1 and are multiplied by `lacunarity`
/// and `persistence` after each octave. The weighted sum is returned as is, so
/// for more than one octave the result can leave [-1, 1].
pub fn fractal_noise(
    scale: f32,
    octaves: u32,
    persistence: f32,
    lacunarity: f32,
    x: f32,
    y: f32,
    seed: i32,
) -> f32 {
    let mut value = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;

    for _ in 0..octaves {
        value += sample((x / scale) * frequency, (y / scale) * frequency, seed) * amplitude;
        amplitude *= persistence;
        frequency *= lacunarity;
    }

    value
}

/// A seeded handle on the gradient noise field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradientNoise {
    seed: i32,
}

impl GradientNoise {
    /// Creates a noise field for `seed`.
    pub fn new(seed: i32) -> Self {
        GradientNoise { seed }
    }

    /// Samples the field at `(x, y)`.
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        sample(x, y, self.seed)
    }
}

impl NoiseFn<f64, 2> for GradientNoise {
    fn get(&self, point: [f64; 2]) -> f64 {
        self.sample(point[0] as f32, point[1] as f32) as f64
    }
}

impl Seedable for GradientNoise {
    fn set_seed(self, seed: u32) -> Self {
        GradientNoise { seed: seed as i32 }
    }

    fn seed(&self) -> u32 {
        self.seed as u32
    }
}
