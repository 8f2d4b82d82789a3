//! Wire frames: newline-delimited JSON in both directions (§3, §6).
//!
//! Deserializing an unrecognized `type` or malformed JSON both surface as
//! the same `serde_json::Error` from a single `from_str::<ClientFrame>`
//! call, which the pipeline logs and discards (§4.4) without distinguishing
//! the two; both mean "this connection sent us something we don't
//! understand", and neither closes the connection.

use serde::{Deserialize, Serialize};

/// Recognized `meta` options on a `tx` frame (§3's table), with defaults
/// applied via `#[serde(default)]` field-by-field. Unrecognized keys in the
/// incoming JSON object are silently ignored, serde's default behavior for
/// a struct without `deny_unknown_fields` (§9).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Meta {
    pub destination: Option<u64>,
    pub broadcast: bool,
    pub tx_power: i32,
    pub sf: u8,
    pub frequency: f64,
    pub aqi: i32,
    pub weather: String,
    pub obstacle: String,
    pub coding_rate: u32,
    pub preamble: u32,
    pub payload_bytes: Option<u32>,
}

impl Default for Meta {
    fn default() -> Self {
        Self {
            destination: None,
            broadcast: false,
            tx_power: crate::constants::DEFAULT_TX_POWER_DBM,
            sf: crate::constants::DEFAULT_SF,
            frequency: crate::constants::DEFAULT_FREQUENCY_MHZ,
            aqi: crate::constants::DEFAULT_AQI,
            weather: "clear".to_string(),
            obstacle: "open".to_string(),
            coding_rate: crate::constants::DEFAULT_CODING_RATE,
            preamble: crate::constants::DEFAULT_PREAMBLE,
            payload_bytes: None,
        }
    }
}

impl Meta {
    /// `sf` is only meaningful in `7..=12`; out-of-range values are clamped
    /// rather than rejected, so a buggy client degrades gracefully instead
    /// of wedging the connection.
    pub fn sf_clamped(&self) -> u8 {
        self.sf.clamp(crate::constants::SF_MIN, crate::constants::SF_MAX)
    }

    pub fn weather(&self) -> crate::constants::Weather {
        crate::constants::Weather::parse(&self.weather)
    }

    pub fn obstacle_loss_db(&self) -> f64 {
        crate::constants::obstacle_loss_db(&self.obstacle)
    }

    /// `payload_bytes` defaults to the length of the transmitted `data`.
    pub fn payload_bytes_or(&self, data_len: usize) -> u32 {
        self.payload_bytes.unwrap_or(data_len as u32)
    }
}

/// A frame received from a connected node.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Register { node_id: u64, location: (f64, f64) },
    Tx {
        from: u64,
        data: String,
        #[serde(default)]
        meta: Meta,
    },
}

/// An `rx` frame delivered to a receiver: the payload, the computed radio
/// metrics, and the original `meta` merged with `from` (§3, §6).
#[derive(Debug, Clone, Serialize)]
pub struct RxFrame {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: String,
    pub rssi: f64,
    pub snr: f64,
    pub meta: RxMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct RxMeta {
    pub from: u64,
    pub destination: Option<u64>,
    pub broadcast: bool,
    pub tx_power: i32,
    pub sf: u8,
    pub frequency: f64,
    pub aqi: i32,
    pub weather: String,
    pub obstacle: String,
    pub coding_rate: u32,
    pub preamble: u32,
    pub payload_bytes: u32,
}

impl RxFrame {
    pub fn new(from: u64, data: String, rssi: f64, snr: f64, meta: &Meta, payload_bytes: u32) -> Self {
        Self {
            kind: "rx",
            data,
            rssi,
            snr,
            meta: RxMeta {
                from,
                destination: meta.destination,
                broadcast: meta.broadcast,
                tx_power: meta.tx_power,
                sf: meta.sf_clamped(),
                frequency: meta.frequency,
                aqi: meta.aqi,
                weather: meta.weather.clone(),
                obstacle: meta.obstacle.clone(),
                coding_rate: meta.coding_rate,
                preamble: meta.preamble,
                payload_bytes,
            },
        }
    }

    /// Render as a single newline-terminated JSON line ready to write.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut s = serde_json::to_string(self)?;
        s.push('\n');
        Ok(s)
    }
}
