//! Daemon supervisor (C7): owns the runtime lifecycle. Builds the CEC adapter
//! and amplifier client, runs the protocol engine and external watcher
//! concurrently, and reconnects with bounded exponential backoff on adapter
//! failure.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};

use crate::amplifier::client::{AmplifierClient, HttpAmplifierClient, Target};
use crate::cec::adapter::{AdapterConfig, CecAdapter, CecAdapterInterface, VendorCompat as AdapterVendorCompat};
use crate::cec::frame;
use crate::config::{Config, VendorCompat};
use crate::engine::{AudioState, ProtocolEngine};
use crate::event_policy::{Decision, EventPolicy};
use crate::watcher::ExternalWatcher;

/// Runs the daemon until `stop` is set to `true`.
pub async fn run(config: Config, stop: watch::Receiver<bool>) {
    let mut backoff = config.reconnect_delay_s;
    let max_backoff = config.reconnect_delay_s.max(20.0);

    loop {
        if *stop.borrow() {
            log::info!("shutdown requested before starting a new cycle");
            return;
        }

        match run_cycle(&config, stop.clone()).await {
            Ok(()) => {
                log::info!("daemon cycle ended cleanly");
                if *stop.borrow() {
                    return;
                }
                backoff = config.reconnect_delay_s;
            }
            Err(e) => {
                log::warn!("daemon cycle failed: {e}, reconnecting in {backoff}s");
                tokio::time::sleep(Duration::from_secs_f64(backoff)).await;
                backoff = (backoff * 2.0).min(max_backoff);
            }
        }
    }
}

async fn run_cycle(
    config: &Config,
    stop: watch::Receiver<bool>,
) -> Result<(), crate::cec::adapter::AdapterError> {
    let adapter_config = AdapterConfig {
        device_path: config.cec_device_path.clone(),
        osd_name: config.cec_osd_name.clone(),
        vendor_compat: match config.cec_vendor_compat {
            VendorCompat::None => AdapterVendorCompat::None,
            VendorCompat::Samsung => AdapterVendorCompat::Samsung,
        },
    };
    let adapter: Arc<dyn CecAdapterInterface> = Arc::new(CecAdapter::open(&adapter_config).await?);

    let amplifier: Arc<dyn AmplifierClient> = Arc::new(HttpAmplifierClient::new(&Target {
        address: config
            .target
            .address
            .clone()
            .expect("target address must be resolved before the daemon starts"),
        port: config.target.port,
        base_path: config.target.base_path.clone(),
    }));

    let state = Arc::new(Mutex::new(AudioState::default()));
    let engine = ProtocolEngine::new(
        amplifier.clone(),
        adapter.clone(),
        state.clone(),
        config.cec_vendor_compat,
        config.cec_osd_name.clone(),
    );
    let watcher = ExternalWatcher::new(amplifier, adapter.clone(), state);

    tokio::join!(
        engine_loop(adapter, engine, config.dedupe_window_s, config.min_interval_s, stop.clone()),
        watcher.run(stop),
    );
    Ok(())
}

async fn engine_loop(
    adapter: Arc<dyn CecAdapterInterface>,
    engine: ProtocolEngine,
    dedupe_window_s: f64,
    min_interval_s: f64,
    mut stop: watch::Receiver<bool>,
) {
    let mut policy = EventPolicy::new(dedupe_window_s, min_interval_s);
    loop {
        tokio::select! {
            frame = adapter.recv() => {
                if let Some(bytes) = frame {
                    if let Some(event) = frame::parse(&bytes) {
                        let policy_gated = matches!(
                            event.kind,
                            frame::EventKind::VolumeUp
                                | frame::EventKind::VolumeDown
                                | frame::EventKind::Mute
                        );
                        let emit = !policy_gated
                            || policy.should_emit(&event, std::time::Instant::now()) == Decision::Emit;
                        if emit {
                            engine.handle_event(&event).await;
                        }
                    }
                }
            }
            _ = stop.changed() => {
                log::info!("protocol engine received shutdown signal");
                return;
            }
        }
    }
}
