//! Delivery scheduler (§4.5): sleeps out the computed delay, then writes the
//! `rx` frame to the receiver.
//!
//! Ordering is preserved without an explicit priority queue: each receiver's
//! write half is guarded by its own `tokio::sync::Mutex`, and a task that
//! sleeps for a shorter delay reaches that mutex before one sleeping
//! longer, so frames land in the order their deadlines actually elapse.

use crate::broker::Broker;
use crate::drop_oracle::DropReason;
use crate::frame::{Meta, RxFrame};
use crate::logging;
use crate::propagation::Outcome;
use crate::registry::NodeRecord;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Spawn the task that will deliver one already-accepted frame after its
/// computed delay elapses.
pub fn schedule_delivery(
    broker: Arc<Broker>,
    sender: NodeRecord,
    receiver: NodeRecord,
    data: String,
    meta: Meta,
    outcome: Outcome,
) {
    tokio::spawn(async move {
        let sf = meta.sf_clamped();
        tokio::time::sleep(Duration::from_secs_f64(outcome.delay_ms / 1000.0)).await;

        let payload_bytes = meta.payload_bytes_or(data.len());
        let rx = RxFrame::new(sender.node_id, data, outcome.rssi_dbm, outcome.snr_db, &meta, payload_bytes);
        let line = match rx.to_line() {
            Ok(line) => line,
            Err(_) => {
                broker.tracker.end(sf);
                return;
            }
        };

        let write = async {
            let mut writer = receiver.writer.lock().await;
            writer.write_all(line.as_bytes()).await
        };

        let result = tokio::time::timeout(
            Duration::from_millis(crate::constants::WRITE_TIMEOUT_MS),
            write,
        )
        .await;

        broker.tracker.end(sf);

        match result {
            Ok(Ok(())) => {
                broker.tracker.record_delivery(sender.node_id, receiver.node_id);
                broker.stats.record_delivered();
                logging::log_delivered(sender.node_id, receiver.node_id, sf, outcome.rssi_dbm, outcome.snr_db, outcome.delay_ms);
            }
            Ok(Err(_)) | Err(_) => {
                broker.tracker.record_drop(sender.node_id, receiver.node_id);
                broker.stats.record_dropped(DropReason::PeerGone);
                logging::log_dropped(
                    sender.node_id,
                    Some(receiver.node_id),
                    sf,
                    Some(outcome.rssi_dbm),
                    Some(outcome.snr_db),
                    &DropReason::PeerGone.to_string(),
                );
                broker.registry.remove(receiver.node_id).await;
            }
        }
    });
}
