//! Broker event logging.
//!
//! One line per event, matching §6 of the spec: timestamp (supplied by
//! `env_logger`'s formatter), event, sender, receiver, sf, rssi, snr,
//! delay_ms, reason. Structured as key=value pairs so the output stays
//! greppable without pulling in a dedicated structured-logging crate.

/// Initializes the logger with the `env_logger` crate, honoring `RUST_LOG`.
pub fn init_logger() {
    let _ = env_logger::try_init();
}

/// A node registered (or re-registered, replacing a prior connection).
pub fn log_register(node_id: u64, x_km: f64, y_km: f64) {
    log::info!("event=REGISTER node_id={node_id} x_km={x_km:.3} y_km={y_km:.3}");
}

/// A node's connection closed and it was removed from the registry.
pub fn log_disconnect(node_id: u64) {
    log::info!("event=DISCONNECT node_id={node_id}");
}

/// A frame was delivered to a receiver.
#[allow(clippy::too_many_arguments)]
pub fn log_delivered(sender: u64, receiver: u64, sf: u8, rssi: f64, snr: f64, delay_ms: f64) {
    log::info!(
        "event=DELIVERED sender={sender} receiver={receiver} sf={sf} rssi={rssi:.2} snr={snr:.2} delay_ms={delay_ms:.2}"
    );
}

/// A frame was dropped before or during delivery.
#[allow(clippy::too_many_arguments)]
pub fn log_dropped(
    sender: u64,
    receiver: Option<u64>,
    sf: u8,
    rssi: Option<f64>,
    snr: Option<f64>,
    reason: &str,
) {
    let receiver = receiver.map(|r| r.to_string()).unwrap_or_else(|| "-".into());
    let rssi = rssi.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".into());
    let snr = snr.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".into());
    log::warn!(
        "event=DROPPED sender={sender} receiver={receiver} sf={sf} rssi={rssi} snr={snr} reason={reason}"
    );
}

/// A malformed or unrecognized frame was discarded.
pub fn log_malformed(raw: &str, detail: &str) {
    let preview: String = raw.chars().take(120).collect();
    log::debug!("event=MALFORMED detail={detail} raw={preview:?}");
}
