//! The `Broker`: the single piece of shared state every connection task
//! holds a reference to (§9 "global mutable state becomes fields of a
//! single value passed by reference to every task").

use crate::config::BrokerConfig;
use crate::error::BrokerError;
use crate::logging;
use crate::registry::{NodeRegistry, SharedWriter};
use crate::rng::BrokerRng;
use crate::stats::BrokerStats;
use crate::tracker::InFlightTracker;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::AbortHandle;

pub struct Broker {
    pub registry: NodeRegistry,
    pub tracker: InFlightTracker,
    pub rng: BrokerRng,
    pub stats: BrokerStats,
}

impl Broker {
    pub fn new(config: &BrokerConfig) -> Self {
        Self {
            registry: NodeRegistry::new(),
            tracker: InFlightTracker::new(),
            rng: BrokerRng::from_seed(config.seed),
            stats: BrokerStats::new(),
        }
    }

    /// Record a `register` frame: (re-)insert `node_id` with its location
    /// and connection handles, closing any prior connection for that id.
    pub async fn handle_register(&self, node_id: u64, location: (f64, f64), writer: SharedWriter, reader_abort: AbortHandle) {
        let (x_km, y_km) = location;
        self.registry
            .register(crate::registry::NodeRecord::new(node_id, x_km, y_km, writer, reader_abort))
            .await;
        logging::log_register(node_id, x_km, y_km);
    }

    /// A connection closed: drop its registry entry if it is still the
    /// current one for that id (a concurrent re-register may have already
    /// replaced it, in which case this is a no-op).
    pub async fn handle_disconnect(&self, node_id: u64) {
        self.registry.remove(node_id).await;
        logging::log_disconnect(node_id);
    }

    /// Bind the configured address and serve it forever.
    pub async fn run(self: Arc<Self>, config: &BrokerConfig) -> Result<(), BrokerError> {
        let listener = TcpListener::bind(&config.listen)
            .await
            .map_err(|source| BrokerError::Bind {
                addr: config.listen.clone(),
                source,
            })?;
        log::info!(target: "lora_medium_broker", "event=LISTENING addr={}", config.listen);
        self.serve(listener).await
    }

    /// Accept connections from an already-bound listener forever, spawning
    /// one reader task per connection (§4.3). Split from [`Broker::run`] so
    /// tests can bind to an ephemeral port and learn its address before
    /// serving.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<(), BrokerError> {
        loop {
            let (stream, _peer_addr) = listener.accept().await?;
            let (read_half, write_half) = stream.into_split();
            let writer: SharedWriter = Arc::new(tokio::sync::Mutex::new(write_half));
            spawn_reader(self.clone(), read_half, writer);
        }
    }
}

/// Spawn the reader task for one freshly accepted connection.
///
/// The task needs its own `AbortHandle` to hand to the registry once it
/// sees a `register` frame (so a later reconnect under the same id can
/// close it), but `JoinHandle::abort_handle()` isn't available until after
/// `tokio::spawn` returns, which is after the task body already moved in.
/// A one-shot channel closes that loop: the task awaits its own handle
/// before doing anything else.
fn spawn_reader(broker: Arc<Broker>, read_half: tokio::net::tcp::OwnedReadHalf, writer: SharedWriter) {
    let (tx, rx) = tokio::sync::oneshot::channel::<AbortHandle>();
    let join = tokio::spawn(async move {
        let reader_abort = rx.await.expect("abort handle sender dropped before first recv");
        crate::pipeline::run(broker, read_half, writer, reader_abort).await;
    });
    let _ = tx.send(join.abort_handle());
}
