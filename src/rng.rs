//! Deterministic random number generation.
//!
//! The propagation model needs two independent uniform draws per frame
//! (RSSI multipath fading and SNR fading, §4.1), and the drop oracle needs
//! one more for the final drop decision (§4.2). When a seed is configured
//! all draws derive from it so a full run is bit-identical across restarts
//! (§8 property 4); unseeded runs draw from OS entropy.
//!
//! Shared across every connection and scheduler task, so the generator
//! lives behind a mutex: each draw site locks, draws, and releases, the
//! critical section is a handful of nanoseconds, never held across an
//! await point.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Mutex;

pub struct BrokerRng {
    inner: Mutex<ChaCha8Rng>,
}

impl BrokerRng {
    pub fn from_seed(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            inner: Mutex::new(rng),
        }
    }

    /// Draw a uniform sample in `[lo, hi]`.
    pub fn uniform(&self, lo: f64, hi: f64) -> f64 {
        let mut rng = self.inner.lock().expect("rng mutex poisoned");
        rng.gen_range(lo..=hi)
    }

    /// Draw a uniform sample in `[0, 1)`, used for the final drop decision.
    pub fn unit(&self) -> f64 {
        let mut rng = self.inner.lock().expect("rng mutex poisoned");
        rng.gen::<f64>()
    }
}
