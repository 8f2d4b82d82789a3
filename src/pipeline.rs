//! Per-connection reader pipeline (§4.3, §4.4): parses incoming frames,
//! resolves recipients, runs the propagation model and drop oracle, and
//! hands accepted frames to the scheduler for delayed delivery.

use crate::broker::Broker;
use crate::constants::obstacle_loss_db;
use crate::drop_oracle::{self, DropReason, OracleContext};
use crate::frame::{ClientFrame, Meta};
use crate::logging;
use crate::propagation::{self, Link};
use crate::registry::{NodeRecord, SharedWriter};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::task::AbortHandle;

/// Drive one connection until it closes, reading newline-delimited JSON
/// frames and dispatching each.
///
/// `node_id` is learned from the connection's first `register` frame; until
/// then every `tx` frame is discarded with `UNREGISTERED` (§4.3 "first
/// frame must be register"). `writer`/`reader_abort` are handed to the
/// registry on the first successful `register` so a later reconnect under
/// the same id can close this connection out from under it.
pub async fn run(broker: Arc<Broker>, read_half: OwnedReadHalf, writer: SharedWriter, reader_abort: AbortHandle) {
    let mut lines = BufReader::new(read_half).lines();
    let mut node_id: Option<u64> = None;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                logging::log_malformed("<io error>", &err.to_string());
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let frame: ClientFrame = match serde_json::from_str(&line) {
            Ok(frame) => frame,
            Err(err) => {
                logging::log_malformed(&line, &err.to_string());
                continue;
            }
        };

        match frame {
            ClientFrame::Register { node_id: id, location } => {
                node_id = Some(id);
                broker.handle_register(id, location, writer.clone(), reader_abort.clone()).await;
            }
            ClientFrame::Tx { from, data, meta } => match node_id {
                Some(id) if id == from => {
                    handle_tx(&broker, from, data, meta).await;
                }
                Some(_) | None => {
                    logging::log_dropped(from, None, meta.sf_clamped(), None, None, &DropReason::Unregistered.to_string());
                }
            },
        }
    }

    if let Some(id) = node_id {
        broker.handle_disconnect(id).await;
    }
}

/// Resolve recipients for a `tx` frame: absent destination, or an explicit
/// `broadcast=true`, means every other registered node; otherwise the
/// single named destination (§3).
async fn resolve_recipients(broker: &Broker, from: u64, meta: &Meta) -> Vec<NodeRecord> {
    match meta.destination {
        Some(destination) if !meta.broadcast => match broker.registry.lookup(destination).await {
            Some(record) => vec![record],
            None => vec![],
        },
        _ => broker.registry.list_except(from).await,
    }
}

async fn handle_tx(broker: &Arc<Broker>, from: u64, data: String, meta: Meta) {
    let Some(sender) = broker.registry.lookup(from).await else {
        logging::log_dropped(from, None, meta.sf_clamped(), None, None, &DropReason::Unregistered.to_string());
        return;
    };

    let unicast_miss = meta.destination.is_some() && !meta.broadcast;
    let recipients = resolve_recipients(broker, from, &meta).await;

    if recipients.is_empty() {
        if unicast_miss {
            logging::log_dropped(from, meta.destination, meta.sf_clamped(), None, None, &DropReason::NoRoute.to_string());
        }
        return;
    }

    for receiver in recipients {
        deliver_one(broker.clone(), sender.clone(), receiver, data.clone(), meta.clone()).await;
    }
}

async fn deliver_one(broker: Arc<Broker>, sender: NodeRecord, receiver: NodeRecord, data: String, meta: Meta) {
    let sf = meta.sf_clamped();
    let link = Link {
        distance_km: sender.distance_km(&receiver),
        frequency_mhz: meta.frequency,
        sf,
        tx_power_dbm: meta.tx_power as f64,
        aqi: meta.aqi,
        weather: meta.weather(),
        obstacle_loss_db: obstacle_loss_db(&meta.obstacle),
        coding_rate: meta.coding_rate,
        preamble: meta.preamble,
        payload_bytes: meta.payload_bytes_or(data.len()),
    };

    broker.tracker.begin(sf);
    let outcome = propagation::compute(&link, &broker.rng);

    let ctx = OracleContext {
        ms_since_last_delivery: broker.tracker.ms_since_last_delivery(receiver.node_id),
        active_transmissions: broker.tracker.active_transmissions(),
        loss_streak: broker.tracker.loss_streak(sender.node_id, receiver.node_id),
        concurrent_on_sf: broker.tracker.concurrent_on_sf(sf),
    };

    match drop_oracle::evaluate(&link, &outcome, &ctx, &broker.rng) {
        Some(reason) => {
            broker.tracker.record_drop(sender.node_id, receiver.node_id);
            broker.tracker.end(sf);
            broker.stats.record_dropped(reason);
            logging::log_dropped(
                sender.node_id,
                Some(receiver.node_id),
                sf,
                Some(outcome.rssi_dbm),
                Some(outcome.snr_db),
                &reason.to_string(),
            );
        }
        None => {
            crate::scheduler::schedule_delivery(broker, sender, receiver, data, meta, outcome);
        }
    }
}
