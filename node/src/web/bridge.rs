use crate::web::model::StatusModel;
use anyhow::Context;
use log::error;
use rd03dcore::protocol::TargetSnapshot;
use rd03dcore::telemetry::PipelineMetrics;
use std::{
    net::SocketAddr,
    sync::{mpsc, Arc},
    thread,
    time::Instant,
};
use tokio::runtime::Builder;
use tokio::sync::watch;
use warp::Filter;

pub fn bind_address(port: u16) -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], port))
}

/// `GET /targets` returns the last emitted snapshot, `GET /status` the counters.
pub fn routes(
    snapshots: watch::Receiver<Arc<TargetSnapshot>>,
    metrics: Arc<PipelineMetrics>,
    started: Instant,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let snapshot_filter = warp::any().map(move || snapshots.clone());
    let metrics_filter = warp::any().map(move || metrics.clone());

    let targets_route = warp::path("targets")
        .and(warp::path::end())
        .and(warp::get())
        .and(snapshot_filter.clone())
        .map(|snapshots: watch::Receiver<Arc<TargetSnapshot>>| {
            let snapshot = snapshots.borrow().clone();
            warp::reply::json(snapshot.as_ref())
        });

    let status_route = warp::path("status")
        .and(warp::path::end())
        .and(warp::get())
        .and(snapshot_filter)
        .and(metrics_filter)
        .map(
            move |snapshots: watch::Receiver<Arc<TargetSnapshot>>,
                  metrics: Arc<PipelineMetrics>| {
                let snapshot = snapshots.borrow().clone();
                let model = StatusModel::new(
                    started.elapsed().as_millis() as u64,
                    snapshot.sequence(),
                    snapshot.active_count(),
                    &metrics.snapshot(),
                );
                warp::reply::json(&model)
            },
        );

    targets_route.or(status_route)
}

/// Hosts the JSON endpoint on its own thread and runtime.
///
/// `spawn` only returns once the listener is bound, so a port that is taken
/// or privileged fails startup instead of leaving a dead endpoint.
pub struct WebBridge {
    address: SocketAddr,
}

impl WebBridge {
    pub fn spawn(
        port: u16,
        snapshots: watch::Receiver<Arc<TargetSnapshot>>,
        metrics: Arc<PipelineMetrics>,
    ) -> anyhow::Result<Self> {
        let address = bind_address(port);
        let routes = routes(snapshots, metrics, Instant::now());
        let (bound_tx, bound_rx) = mpsc::channel::<Result<SocketAddr, String>>();

        thread::Builder::new()
            .name("web-bridge".into())
            .spawn(move || {
                let runtime = match Builder::new_current_thread().enable_all().build() {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        let _ = bound_tx.send(Err(format!("creating runtime: {}", err)));
                        return;
                    }
                };
                runtime.block_on(async move {
                    match warp::serve(routes).try_bind_ephemeral(address) {
                        Ok((bound, server)) => {
                            let _ = bound_tx.send(Ok(bound));
                            server.await;
                        }
                        Err(err) => {
                            error!("web bridge could not bind {}: {}", address, err);
                            let _ = bound_tx.send(Err(err.to_string()));
                        }
                    }
                });
            })
            .context("spawning web bridge thread")?;

        let bound = bound_rx
            .recv()
            .context("web bridge thread exited before binding")?
            .map_err(|err| anyhow::anyhow!("binding web bridge on {}: {}", address, err))?;
        Ok(Self { address: bound })
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }
}
