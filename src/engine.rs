//! The Audio-System protocol state machine (C5): maps inbound CEC events to
//! outbound frames and amplifier operations, and owns the single cached
//! audio state shared with the external watcher.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::amplifier::client::AmplifierClient;
use crate::cec::adapter::CecAdapterInterface;
use crate::cec::frame::{self, EventKind, InboundEvent};
use crate::config::VendorCompat;

const EXTERNAL_WATCH_SUSPEND_S: f64 = 0.8;

/// The single shared mutable cell described in the concurrency model: cached
/// amplifier state plus the watcher-suspension deadline, all behind one lock.
#[derive(Debug, Clone)]
pub struct AudioState {
    pub cached_volume: Option<u8>,
    pub cached_muted: Option<bool>,
    pub vendor_state_byte: u8,
    pub external_watch_suspend_until: Option<Instant>,
}

impl Default for AudioState {
    fn default() -> Self {
        AudioState {
            cached_volume: None,
            cached_muted: None,
            vendor_state_byte: 0x14,
            external_watch_suspend_until: None,
        }
    }
}

pub struct ProtocolEngine {
    amplifier: Arc<dyn AmplifierClient>,
    adapter: Arc<dyn CecAdapterInterface>,
    state: Arc<Mutex<AudioState>>,
    vendor_compat: VendorCompat,
    vendor_id: u32,
    osd_name: String,
}

impl ProtocolEngine {
    pub fn new(
        amplifier: Arc<dyn AmplifierClient>,
        adapter: Arc<dyn CecAdapterInterface>,
        state: Arc<Mutex<AudioState>>,
        vendor_compat: VendorCompat,
        osd_name: String,
    ) -> ProtocolEngine {
        let vendor_id = match vendor_compat {
            VendorCompat::Samsung => 0x0000f0,
            VendorCompat::None => 0,
        };
        ProtocolEngine {
            amplifier,
            adapter,
            state,
            vendor_compat,
            vendor_id,
            osd_name,
        }
    }

    pub async fn handle_event(&self, event: &InboundEvent) {
        let mut state = self.state.lock().await;
        state.external_watch_suspend_until =
            Some(Instant::now() + Duration::from_secs_f64(EXTERNAL_WATCH_SUSPEND_S));

        match &event.kind {
            EventKind::SystemAudioModeRequest => {
                self.transmit(frame::encode_set_system_audio_mode_on()).await
            }
            EventKind::GiveSystemAudioModeStatus => {
                self.transmit(frame::encode_system_audio_mode_status_on()).await
            }
            EventKind::RequestArcInitiation => self.transmit(frame::encode_initiate_arc()).await,
            EventKind::RequestArcTermination => self.transmit(frame::encode_terminate_arc()).await,
            EventKind::RequestShortAudioDescriptor => {
                self.transmit(frame::encode_report_short_audio_descriptor()).await
            }
            EventKind::GiveDeviceVendorId => {
                self.transmit(frame::encode_device_vendor_id(self.vendor_id)).await
            }
            EventKind::GiveOsdName => {
                self.transmit(frame::encode_set_osd_name(&self.osd_name)).await
            }
            EventKind::GiveDevicePowerStatus | EventKind::UserControlReleased => {}

            EventKind::GiveAudioStatus => {
                self.ensure_cache(&mut state).await;
                self.report_audio_status(&state).await;
            }

            EventKind::SetAudioVolumeLevel { level, muted } => {
                self.handle_set_audio_volume_level(&mut state, *level, *muted).await
            }

            EventKind::VolumeUp => self.handle_relative_step(&mut state, true).await,
            EventKind::VolumeDown => self.handle_relative_step(&mut state, false).await,

            EventKind::Mute => self.handle_mute(&mut state).await,

            EventKind::SamsungVendor { subcommand, mode, payload } => {
                self.handle_samsung_vendor(&mut state, *subcommand, *mode, payload).await
            }
            EventKind::SamsungVendorWithId { .. } => {
                log::debug!("dropping SamsungVendorWithId frame, unsupported per reverse-engineering notes");
            }
        }
    }

    async fn handle_set_audio_volume_level(&self, state: &mut AudioState, level: u8, muted: bool) {
        let level = level.min(100);
        if let Err(e) = self.amplifier.set_volume(level).await {
            log::debug!("set_volume failed, dropping SetAudioVolumeLevel event: {e}");
            return;
        }
        state.cached_volume = Some(level);
        state.vendor_state_byte = level;

        let current_muted = match state.cached_muted {
            Some(m) => m,
            None => match self.amplifier.get_muted().await {
                Ok(m) => m,
                Err(e) => {
                    log::debug!("get_muted failed, dropping SetAudioVolumeLevel event: {e}");
                    return;
                }
            },
        };
        if current_muted != muted {
            if let Err(e) = self.amplifier.mute_toggle().await {
                log::debug!("mute_toggle failed, dropping SetAudioVolumeLevel event: {e}");
                return;
            }
        }
        state.cached_muted = Some(muted);

        self.report_audio_status(state).await;
    }

    async fn handle_relative_step(&self, state: &mut AudioState, up: bool) {
        let stepped: Result<u8, crate::amplifier::client::AmplifierError> = async {
            let current = self.amplifier.get_volume().await?;
            let target = if up {
                current.saturating_add(1)
            } else {
                current.saturating_sub(1)
            }
            .min(100);
            if target != current {
                self.amplifier.set_volume(target).await?;
            }
            Ok(target)
        }
        .await;

        let resolved = match stepped {
            Ok(target) => Some(target),
            Err(e) => {
                log::debug!("get_volume/set_volume failed during relative step, falling back: {e}");
                let fallback = if up {
                    self.amplifier.volume_up().await
                } else {
                    self.amplifier.volume_down().await
                };
                match fallback {
                    Ok(()) => state.cached_volume.map(|v| {
                        if up { v.saturating_add(1) } else { v.saturating_sub(1) }.min(100)
                    }),
                    Err(e) => {
                        log::debug!("volume step fallback failed: {e}");
                        None
                    }
                }
            }
        };

        let volume = match resolved {
            Some(v) => v,
            None => return,
        };
        state.cached_volume = Some(volume);
        state.vendor_state_byte = volume;
        self.report_audio_status(state).await;
    }

    async fn handle_mute(&self, state: &mut AudioState) {
        if let Err(e) = self.amplifier.mute_toggle().await {
            log::debug!("mute_toggle failed, dropping Mute event: {e}");
            return;
        }
        if let Some(m) = state.cached_muted {
            state.cached_muted = Some(!m);
        }
        self.report_audio_status(state).await;
    }

    async fn handle_samsung_vendor(
        &self,
        state: &mut AudioState,
        subcommand: u8,
        mode: Option<u8>,
        payload: &[u8],
    ) {
        if self.vendor_compat != VendorCompat::Samsung {
            log::debug!("dropping SamsungVendor frame, vendor compat disabled");
            return;
        }
        match subcommand {
            0x95 => {
                if let Some(v) = state.cached_volume {
                    state.vendor_state_byte = v;
                }
                self.transmit(frame::encode_samsung_vendor_sync_reply(state.vendor_state_byte))
                    .await;
            }
            0x92 => match mode {
                Some(0x01) | Some(0x03) | Some(0x04) | Some(0x05) | Some(0x06) => {
                    log::debug!("accepted Q-Symphony mode update {mode:?}");
                }
                _ => log::debug!("dropping unsupported Q-Symphony mode {mode:?}"),
            },
            0x88 | 0x96 => {
                log::debug!("accepted samsung subcommand {subcommand:#x}");
                if subcommand == 0x96 && payload.len() >= 2 {
                    let candidate = payload[payload.len() - 1];
                    if candidate <= 100 {
                        if Some(candidate) != state.cached_volume {
                            if let Err(e) = self.amplifier.set_volume(candidate).await {
                                log::debug!("set_volume failed for samsung TV-driven update: {e}");
                                return;
                            }
                        }
                        state.cached_volume = Some(candidate);
                        state.vendor_state_byte = candidate;
                    }
                }
            }
            other => log::debug!("dropping unrecognized samsung subcommand {other:#x}"),
        }
    }

    async fn ensure_cache(&self, state: &mut AudioState) {
        if state.cached_volume.is_none() {
            match self.amplifier.get_volume().await {
                Ok(v) => {
                    let v = v.min(100);
                    state.cached_volume = Some(v);
                    state.vendor_state_byte = v;
                }
                Err(e) => log::debug!("get_volume failed while hydrating cache: {e}"),
            }
        }
        if state.cached_muted.is_none() {
            match self.amplifier.get_muted().await {
                Ok(m) => state.cached_muted = Some(m),
                Err(e) => log::debug!("get_muted failed while hydrating cache: {e}"),
            }
        }
    }

    async fn report_audio_status(&self, state: &AudioState) {
        let volume = state.cached_volume.unwrap_or(0);
        let muted = state.cached_muted.unwrap_or(false);
        self.transmit(frame::encode_report_audio_status(volume, muted)).await;
    }

    async fn transmit(&self, bytes: Vec<u8>) {
        if !self.adapter.send(&bytes).await {
            log::debug!("failed to transmit cec frame {bytes:02x?}");
        }
    }
}
