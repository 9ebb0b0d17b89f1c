//! External watcher (C6): periodically polls the amplifier for drift against
//! the cache the protocol engine owns, and pushes a fresh `REPORT_AUDIO_STATUS`
//! when it observes a change the engine didn't cause.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::interval;

use crate::amplifier::client::AmplifierClient;
use crate::cec::adapter::CecAdapterInterface;
use crate::cec::frame::encode_report_audio_status;
use crate::engine::AudioState;

const EXTERNAL_WATCH_INTERVAL_S: f64 = 0.5;

pub struct ExternalWatcher {
    amplifier: Arc<dyn AmplifierClient>,
    adapter: Arc<dyn CecAdapterInterface>,
    state: Arc<Mutex<AudioState>>,
}

impl ExternalWatcher {
    pub fn new(
        amplifier: Arc<dyn AmplifierClient>,
        adapter: Arc<dyn CecAdapterInterface>,
        state: Arc<Mutex<AudioState>>,
    ) -> ExternalWatcher {
        ExternalWatcher { amplifier, adapter, state }
    }

    /// Runs until `stop` is set to `true`. Exits cleanly, never panics.
    pub async fn run(&self, mut stop: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = interval(Duration::from_secs_f64(EXTERNAL_WATCH_INTERVAL_S));
        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                _ = stop.changed() => {
                    log::info!("external watcher received shutdown signal");
                    return;
                }
            }
        }
    }

    /// Runs a single poll cycle: checks the suspension deadline, then fetches
    /// `get_volume`/`get_muted` and reconciles the cache.
    pub async fn tick(&self) {
        let mut state = self.state.lock().await;
        if let Some(until) = state.external_watch_suspend_until {
            if Instant::now() < until {
                return;
            }
        }

        let volume = match self.amplifier.get_volume().await {
            Ok(v) => v,
            Err(e) => {
                log::debug!("watcher get_volume failed: {e}");
                return;
            }
        };
        let muted = match self.amplifier.get_muted().await {
            Ok(m) => m,
            Err(e) => {
                log::debug!("watcher get_muted failed: {e}");
                return;
            }
        };

        if state.cached_volume.is_none() || state.cached_muted.is_none() {
            state.cached_volume = Some(volume);
            state.cached_muted = Some(muted);
            state.vendor_state_byte = volume;
            return;
        }

        let drifted = state.cached_volume != Some(volume) || state.cached_muted != Some(muted);
        if drifted {
            state.cached_volume = Some(volume);
            state.cached_muted = Some(muted);
            state.vendor_state_byte = volume;
            if !self.adapter.send(&encode_report_audio_status(volume, muted)).await {
                log::debug!("watcher failed to transmit drift report");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amplifier::client::MockAmplifierClient;
    use crate::cec::adapter::MockCecAdapterInterface;

    fn watcher(
        amplifier: MockAmplifierClient,
        adapter: MockCecAdapterInterface,
        state: Arc<Mutex<AudioState>>,
    ) -> ExternalWatcher {
        ExternalWatcher::new(Arc::new(amplifier), Arc::new(adapter), state)
    }

    #[tokio::test]
    async fn seeds_empty_cache_without_transmitting() {
        let mut amplifier = MockAmplifierClient::new();
        amplifier.expect_get_volume().returning(|| Ok(10));
        amplifier.expect_get_muted().returning(|| Ok(false));
        let adapter = MockCecAdapterInterface::new();

        let state = Arc::new(Mutex::new(AudioState::default()));
        let watcher = watcher(amplifier, adapter, state.clone());
        watcher.tick().await;

        let state = state.lock().await;
        assert_eq!(state.cached_volume, Some(10));
        assert_eq!(state.cached_muted, Some(false));
    }

    #[tokio::test]
    async fn transmits_on_drift() {
        let mut amplifier = MockAmplifierClient::new();
        amplifier.expect_get_volume().returning(|| Ok(20));
        amplifier.expect_get_muted().returning(|| Ok(false));
        let mut adapter = MockCecAdapterInterface::new();
        adapter
            .expect_send()
            .withf(|bytes| bytes == &[0x50, 0x7a, 0x14])
            .returning(|_| true);

        let state = Arc::new(Mutex::new(AudioState {
            cached_volume: Some(10),
            cached_muted: Some(false),
            vendor_state_byte: 10,
            external_watch_suspend_until: None,
        }));
        let watcher = watcher(amplifier, adapter, state.clone());
        watcher.tick().await;

        let state = state.lock().await;
        assert_eq!(state.cached_volume, Some(20));
    }

    #[tokio::test]
    async fn skips_tick_while_suspended() {
        let amplifier = MockAmplifierClient::new();
        let adapter = MockCecAdapterInterface::new();

        let state = Arc::new(Mutex::new(AudioState {
            cached_volume: Some(10),
            cached_muted: Some(false),
            vendor_state_byte: 10,
            external_watch_suspend_until: Some(Instant::now() + Duration::from_secs(5)),
        }));
        let watcher = watcher(amplifier, adapter, state.clone());
        watcher.tick().await;
    }
}
