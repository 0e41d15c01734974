//! AdapterHandle - Wraps AdapterLogic with consistent lifecycle management
//!
//! The adapter runs once. A failed poll is not a failed run: polling errors are
//! absorbed into the snapshot as `Unknown` and the next tick tries again, so
//! there is no restart loop here.

use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::adapters::traits::{AdapterContext, AdapterLogic};
use crate::bus::{BusEvent, SharedBus};

/// AdapterHandle wraps an AdapterLogic implementation and provides:
/// - Consistent shutdown handling
/// - Automatic ACK on stop via AdapterStopped event
/// - ShuttingDown event watching
pub struct AdapterHandle<T: AdapterLogic> {
    logic: Arc<T>,
    bus: SharedBus,
    shutdown: CancellationToken,
}

impl<T: AdapterLogic> AdapterHandle<T> {
    pub fn new(logic: T, bus: SharedBus, shutdown: CancellationToken) -> Self {
        Self {
            logic: Arc::new(logic),
            bus,
            shutdown,
        }
    }

    /// Get the adapter's prefix
    pub fn prefix(&self) -> &'static str {
        self.logic.prefix()
    }

    /// Run the adapter with lifecycle management
    /// - Calls init() if implemented
    /// - Runs the adapter's main loop
    /// - Watches for ShuttingDown events on the bus
    /// - Publishes AdapterStopped on exit
    pub async fn run(self) -> Result<()> {
        let prefix = self.logic.prefix();
        info!("Starting adapter: {}", prefix);

        let result = self.run_once().await;

        // Automatic ACK - publish AdapterStopped
        self.bus.publish(BusEvent::AdapterStopped {
            adapter: prefix.to_string(),
        });

        info!("Adapter {} stopped", prefix);
        result
    }

    async fn run_once(&self) -> Result<()> {
        let prefix = self.logic.prefix();

        if let Err(e) = self.logic.init().await {
            error!("{}: init failed: {}", prefix, e);
            return Err(e);
        }

        // Subscribe before running so a ShuttingDown published during startup is seen
        let mut rx = self.bus.subscribe();

        let ctx = AdapterContext {
            shutdown: self.shutdown.clone(),
        };

        tokio::select! {
            result = self.logic.run(ctx) => {
                match &result {
                    Ok(()) => info!("{}: completed normally", prefix),
                    Err(e) => error!("{}: error: {}", prefix, e),
                }
                result
            }

            _ = async {
                while let Ok(event) = rx.recv().await {
                    if matches!(event, BusEvent::ShuttingDown { .. }) {
                        info!("{}: received ShuttingDown event", prefix);
                        break;
                    }
                }
            } => {
                info!("{}: stopping due to ShuttingDown event", prefix);
                Ok(())
            }

            // Direct cancellation (backup mechanism)
            _ = self.shutdown.cancelled() => {
                info!("{}: cancelled via token", prefix);
                Ok(())
            }
        }
    }
}
