//! Signal generator - noisy three-axis sine samples
//!
//! Each axis runs at its own frequency multiplier so the three values stay
//! decorrelated. Noise perturbs the sine's angle, never its amplitude, so every
//! value stays within [0, 1] for any noise draw.

use std::fmt;
use std::str::FromStr;

use rand::Rng;

use crate::error::ParseCoordinateError;

/// Frequency multiplier per axis (x, y, z)
pub const FREQUENCIES: [f64; 3] = [1.0, 2.0, 3.0];

/// Default bound on the uniform angular noise
pub const DEFAULT_NOISE_AMPLITUDE: f64 = 0.5;

/// One generated sample. Serialized on the wire as `x,y,z`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Coordinate {
    pub fn as_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

impl FromStr for Coordinate {
    type Err = ParseCoordinateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(',').collect();
        if fields.len() != 3 {
            return Err(ParseCoordinateError::Arity(fields.len()));
        }

        let mut values = [0.0; 3];
        for (slot, field) in values.iter_mut().zip(&fields) {
            let field = field.trim();
            *slot = field
                .parse::<f64>()
                .map_err(|source| ParseCoordinateError::Number {
                    value: field.to_string(),
                    source,
                })?;
        }

        Ok(Self {
            x: values[0],
            y: values[1],
            z: values[2],
        })
    }
}

/// Pure sample generator. Advancing time is the caller's job.
#[derive(Debug, Clone, Copy)]
pub struct SignalGenerator {
    noise_amplitude: f64,
}

impl SignalGenerator {
    /// Noise is drawn from `[-|amplitude|, +|amplitude|]`
    pub fn new(noise_amplitude: f64) -> Self {
        Self {
            noise_amplitude: noise_amplitude.abs(),
        }
    }

    pub fn noise_amplitude(&self) -> f64 {
        self.noise_amplitude
    }

    /// Generate a sample for `time`, drawing noise from `rng`
    pub fn sample<R: Rng + ?Sized>(&self, time: f64, rng: &mut R) -> Coordinate {
        let [x, y, z] = FREQUENCIES.map(|frequency| {
            let noise = self.noise(rng);
            0.5 * (1.0 + (frequency * time + noise).sin())
        });
        Coordinate { x, y, z }
    }

    /// Generate a sample for `time` using the thread-local RNG
    pub fn next_sample(&self, time: f64) -> Coordinate {
        self.sample(time, &mut rand::thread_rng())
    }

    fn noise<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.noise_amplitude == 0.0 {
            return 0.0;
        }
        rng.gen_range(-self.noise_amplitude..=self.noise_amplitude)
    }
}

impl Default for SignalGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_NOISE_AMPLITUDE)
    }
}
