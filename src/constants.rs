//! Propagation and drop-model constants.
//!
//! These tables are the fixed parameters of the virtual RF medium: per-SF
//! sensitivity and range limits, SNR envelopes, and the per-weather /
//! per-obstacle loss coefficients used by [`crate::propagation`].

/// LoRa bandwidth used throughout the model, Hz.
pub const BANDWIDTH_HZ: f64 = 125_000.0;

/// Minimum distance used in free-space path loss to avoid `log10(0)`.
pub const MIN_DISTANCE_KM: f64 = 1e-6;

/// Maximum number of frames allowed in flight before congestion kicks in.
pub const MAX_INFLIGHT: i64 = 10;

/// Collision guard window: a delivery within this long of the previous one
/// to the same receiver is a hard collision drop.
pub const COLLISION_GUARD_MS: u64 = 5;

/// Write timeout before a delivery is treated as `PEER_GONE`.
pub const WRITE_TIMEOUT_MS: u64 = 2_000;

/// Maximum probability the drop oracle will ever report (a drop is never
/// certain from the probabilistic components alone).
pub const MAX_PROBABILISTIC_DROP: f64 = 0.98;

/// Default `tx_power` (dBm) when a `tx` frame omits `meta.tx_power`.
pub const DEFAULT_TX_POWER_DBM: i32 = 23;

/// Default spreading factor.
pub const DEFAULT_SF: u8 = 7;

/// Default carrier frequency, MHz.
pub const DEFAULT_FREQUENCY_MHZ: f64 = 915.0;

/// Default air-quality index.
pub const DEFAULT_AQI: i32 = 50;

/// Default coding-rate denominator offset (CR4/5 == 1).
pub const DEFAULT_CODING_RATE: u32 = 1;

/// Default preamble length, symbols.
pub const DEFAULT_PREAMBLE: u32 = 8;

/// Valid spreading factor range.
pub const SF_MIN: u8 = 7;
pub const SF_MAX: u8 = 12;

/// Minimum viable RSSI per spreading factor, dBm. Index by `sf - 7`.
pub const SF_SENSITIVITY_DBM: [f64; 6] = [-123.0, -126.0, -129.0, -132.0, -134.5, -137.0];

/// (min, max) SNR envelope per spreading factor, dB. Index by `sf - 7`.
pub const SF_SNR_RANGE_DB: [(f64, f64); 6] = [
    (-7.5, 10.0),
    (-10.0, 9.0),
    (-12.5, 8.0),
    (-15.0, 7.0),
    (-17.5, 6.0),
    (-20.0, 5.0),
];

/// Maximum usable range per spreading factor, km. Index by `sf - 7`.
pub const SF_MAX_RANGE_KM: [f64; 6] = [5.0, 8.0, 12.0, 16.0, 20.0, 25.0];

/// Weather attenuation coefficient, dB/km, and env-delay multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weather {
    Clear,
    Fog,
    LightRain,
    ModerateRain,
    HeavyRain,
}

impl Weather {
    pub fn parse(s: &str) -> Self {
        match s {
            "fog" => Weather::Fog,
            "light-rain" => Weather::LightRain,
            "moderate-rain" => Weather::ModerateRain,
            "heavy-rain" => Weather::HeavyRain,
            _ => Weather::Clear,
        }
    }

    /// Attenuation coefficient, dB per km.
    pub fn alpha_db_per_km(self) -> f64 {
        match self {
            Weather::Clear => 0.0,
            Weather::Fog => 0.02,
            Weather::LightRain => 0.05,
            Weather::ModerateRain => 0.10,
            Weather::HeavyRain => 0.20,
        }
    }
}

/// Obstacle loss table, dB. Unknown keys contribute 0 dB (§4.1).
pub fn obstacle_loss_db(obstacle: &str) -> f64 {
    match obstacle {
        "open" => 0.0,
        "light-foliage" => 3.0,
        "heavy-foliage" => 8.0,
        "single-wall" => 6.0,
        "multi-wall" => 12.0,
        "urban-dense" => 15.0,
        "hill" => 20.0,
        _ => 0.0,
    }
}

/// Index a per-SF table by spreading factor (7..=12). Panics outside that
/// range; callers must validate `sf` first (see [`crate::frame::Meta`]).
pub fn sf_index(sf: u8) -> usize {
    debug_assert!((SF_MIN..=SF_MAX).contains(&sf));
    (sf.clamp(SF_MIN, SF_MAX) - SF_MIN) as usize
}
