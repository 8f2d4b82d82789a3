//! Drop oracle: decides whether a frame that has cleared propagation
//! modeling is actually delivered, and if not, why (§4.2).
//!
//! Hard drops are checked first and return with probability 1. If none
//! apply, five probabilistic components are summed, clamped, and drawn
//! against; on a drop the reported reason is whichever component
//! contributed the most, ties broken in the order they're listed in §4.2.

use crate::constants::MAX_PROBABILISTIC_DROP;
use crate::propagation::{Link, Outcome};
use crate::rng::BrokerRng;
use std::fmt;

/// Why a frame did not reach its recipient. Variant names and their
/// `Display` strings match the reason vocabulary in §7/§8 exactly, since
/// they appear verbatim in logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    LowRssi,
    LowSnr,
    OutOfRange,
    Collision,
    Congestion,
    Streak,
    SnrMargin,
    RssiMargin,
    Interference,
    PeerGone,
    NoRoute,
    Unregistered,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DropReason::LowRssi => "LOW_RSSI",
            DropReason::LowSnr => "LOW_SNR",
            DropReason::OutOfRange => "OUT_OF_RANGE",
            DropReason::Collision => "COLLISION",
            DropReason::Congestion => "CONGESTION",
            DropReason::Streak => "STREAK",
            DropReason::SnrMargin => "SNR_MARGIN",
            DropReason::RssiMargin => "RSSI_MARGIN",
            DropReason::Interference => "INTERFERENCE",
            DropReason::PeerGone => "PEER_GONE",
            DropReason::NoRoute => "NO_ROUTE",
            DropReason::Unregistered => "UNREGISTERED",
        };
        f.write_str(s)
    }
}

/// Broker-state inputs the oracle needs beyond the propagation outcome.
#[derive(Debug, Clone, Copy)]
pub struct OracleContext {
    /// Milliseconds since the last *delivered* frame to this receiver, if
    /// any has ever been delivered (§9: dropped frames don't update this).
    pub ms_since_last_delivery: Option<u64>,
    /// Count of frames currently accepted for delivery broker-wide.
    pub active_transmissions: i64,
    /// Consecutive drops for this (sender, receiver) pair.
    pub loss_streak: u32,
    /// Frames currently in the scheduler window on this SF.
    pub concurrent_on_sf: i64,
}

fn sf_sensitivity_dbm(sf: u8) -> f64 {
    crate::constants::SF_SENSITIVITY_DBM[crate::constants::sf_index(sf)]
}

fn sf_snr_range(sf: u8) -> (f64, f64) {
    crate::constants::SF_SNR_RANGE_DB[crate::constants::sf_index(sf)]
}

fn sf_max_range_km(sf: u8) -> f64 {
    crate::constants::SF_MAX_RANGE_KM[crate::constants::sf_index(sf)]
}

/// Evaluate hard-drop conditions. Returns the first one that applies, in
/// the order listed in §4.2.
fn hard_drop(link: &Link, outcome: &Outcome, ctx: &OracleContext) -> Option<DropReason> {
    if outcome.rssi_dbm < sf_sensitivity_dbm(link.sf) {
        return Some(DropReason::LowRssi);
    }
    let (snr_min, _) = sf_snr_range(link.sf);
    if outcome.snr_db < snr_min {
        return Some(DropReason::LowSnr);
    }
    if link.distance_km > sf_max_range_km(link.sf) {
        return Some(DropReason::OutOfRange);
    }
    if let Some(ms) = ctx.ms_since_last_delivery {
        if ms < crate::constants::COLLISION_GUARD_MS {
            return Some(DropReason::Collision);
        }
    }
    None
}

/// The five probabilistic components, in the tie-break order of §4.2.
fn probabilistic_components(link: &Link, outcome: &Outcome, ctx: &OracleContext) -> [(DropReason, f64); 5] {
    let p_congestion = {
        let max_inflight = crate::constants::MAX_INFLIGHT as f64;
        let over = (ctx.active_transmissions as f64 - max_inflight) / max_inflight;
        over.max(0.0).powi(2)
    };

    let p_streak = (0.05 * ctx.loss_streak as f64).min(0.5);

    let p_snr = {
        let (snr_min, _) = sf_snr_range(link.sf);
        let sf_factor = link.sf as f64 - 5.0;
        (-(outcome.snr_db - snr_min) / sf_factor).exp().clamp(0.0, 0.8)
    };

    let p_rssi = {
        let sensitivity = sf_sensitivity_dbm(link.sf);
        ((sensitivity + 3.0 - outcome.rssi_dbm) / 6.0).clamp(0.0, 0.6).max(0.0)
    };

    let p_interference = (0.1 * (ctx.concurrent_on_sf as f64 - 1.0)).clamp(0.0, 0.7);

    [
        (DropReason::Congestion, p_congestion),
        (DropReason::Streak, p_streak),
        (DropReason::SnrMargin, p_snr),
        (DropReason::RssiMargin, p_rssi),
        (DropReason::Interference, p_interference),
    ]
}

/// Run the oracle: `None` means the frame is delivered.
pub fn evaluate(
    link: &Link,
    outcome: &Outcome,
    ctx: &OracleContext,
    rng: &BrokerRng,
) -> Option<DropReason> {
    if let Some(reason) = hard_drop(link, outcome, ctx) {
        return Some(reason);
    }

    let components = probabilistic_components(link, outcome, ctx);
    let p_drop: f64 = components.iter().map(|(_, p)| p).sum::<f64>().min(MAX_PROBABILISTIC_DROP);

    if rng.unit() < p_drop {
        // Largest contributor wins; `iter().max_by` keeps the first of equal
        // maxima, i.e. the earliest in listed order, matching the spec's
        // tie-break.
        let (reason, _) = components
            .iter()
            .copied()
            .reduce(|a, b| if b.1 > a.1 { b } else { a })
            .expect("components is non-empty");
        Some(reason)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::Weather;

    fn link(distance_km: f64, sf: u8) -> Link {
        Link {
            distance_km,
            frequency_mhz: 915.0,
            sf,
            tx_power_dbm: 23.0,
            aqi: 50,
            weather: Weather::Clear,
            obstacle_loss_db: 0.0,
            coding_rate: 1,
            preamble: 8,
            payload_bytes: 5,
        }
    }

    fn no_state() -> OracleContext {
        OracleContext {
            ms_since_last_delivery: None,
            active_transmissions: 0,
            loss_streak: 0,
            concurrent_on_sf: 1,
        }
    }

    #[test]
    fn out_of_range_is_hard_dropped() {
        let rng = BrokerRng::from_seed(Some(1));
        let l = link(5.1, 7);
        let outcome = crate::propagation::compute(&l, &rng);
        let reason = evaluate(&l, &outcome, &no_state(), &rng);
        assert_eq!(reason, Some(DropReason::OutOfRange));
    }

    #[test]
    fn collision_guard_fires_within_window() {
        let rng = BrokerRng::from_seed(Some(2));
        let l = link(0.5, 7);
        let outcome = crate::propagation::compute(&l, &rng);
        let ctx = OracleContext {
            ms_since_last_delivery: Some(2),
            ..no_state()
        };
        assert_eq!(evaluate(&l, &outcome, &ctx, &rng), Some(DropReason::Collision));
    }

    #[test]
    fn no_collision_outside_guard_window() {
        let rng = BrokerRng::from_seed(Some(2));
        let l = link(0.2, 7);
        let outcome = crate::propagation::compute(&l, &rng);
        let ctx = OracleContext {
            ms_since_last_delivery: Some(500),
            ..no_state()
        };
        // May still be dropped probabilistically, but never for COLLISION.
        assert_ne!(evaluate(&l, &outcome, &ctx, &rng), Some(DropReason::Collision));
    }

    #[test]
    fn congestion_rises_with_active_transmissions() {
        let rng = BrokerRng::from_seed(Some(5));
        let l = link(0.3, 7);
        let outcome = crate::propagation::compute(&l, &rng);
        let busy = OracleContext {
            active_transmissions: 40,
            ..no_state()
        };
        let components = probabilistic_components(&l, &outcome, &busy);
        let congestion = components[0].1;
        assert!(congestion > 0.5, "congestion={congestion}");
    }
}
