//! Owns the `/dev/cecX` character device: claims logical address 5 (Audio
//! System) on open, then exposes a non-blocking `recv`/`send` pair to the
//! protocol engine.

use std::fs::OpenOptions;
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;

use async_trait::async_trait;
use nix::libc::O_NONBLOCK;
use tokio::io::unix::AsyncFd;
use tokio::time::{sleep, Duration};

use super::sys::{
    self, CecLogAddrType, CecLogAddrs, CecMsg, CecPrimDevType, CecVersion,
    CEC_MODE_FOLLOWER_ALL, CEC_MODE_INITIATOR_SEND,
};

const CLAIM_RETRY_DELAYS_MS: [u64; 3] = [100, 250, 500];
const AUDIO_SYSTEM_LOG_ADDR_BIT: u16 = 1 << 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorCompat {
    None,
    Samsung,
}

impl VendorCompat {
    fn vendor_id(self) -> Option<u32> {
        match self {
            VendorCompat::None => None,
            VendorCompat::Samsung => Some(0x0000f0),
        }
    }
}

pub struct AdapterConfig {
    pub device_path: String,
    pub osd_name: String,
    pub vendor_compat: VendorCompat,
}

#[derive(Debug)]
pub enum AdapterError {
    Io(io::Error),
    /// Logical address 5 is already claimed by another device and stayed
    /// busy through every retry.
    Busy,
}

impl std::fmt::Display for AdapterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterError::Io(e) => write!(f, "cec adapter io error: {e}"),
            AdapterError::Busy => write!(f, "logical address 5 stayed busy after retries"),
        }
    }
}

impl std::error::Error for AdapterError {}

impl From<io::Error> for AdapterError {
    fn from(e: io::Error) -> Self {
        AdapterError::Io(e)
    }
}

impl From<nix::Error> for AdapterError {
    fn from(e: nix::Error) -> Self {
        AdapterError::Io(io::Error::from(e))
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CecAdapterInterface: Sync + Send {
    /// One received frame, or `None` if nothing is pending right now.
    async fn recv(&self) -> Option<Vec<u8>>;
    /// Transmit a frame. Returns `false` (never panics) on a failed send.
    async fn send(&self, bytes: &[u8]) -> bool;
}

struct RawDevice(std::fs::File);

impl AsRawFd for RawDevice {
    fn as_raw_fd(&self) -> std::os::unix::io::RawFd {
        self.0.as_raw_fd()
    }
}

pub struct CecAdapter {
    fd: AsyncFd<RawDevice>,
}

impl CecAdapter {
    /// Opens the device and runs the adapter-configuration sequence: set
    /// mode, read the log-address mask, and claim logical address 5 unless
    /// it is already held.
    pub async fn open(config: &AdapterConfig) -> Result<CecAdapter, AdapterError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(O_NONBLOCK)
            .open(&config.device_path)?;
        let fd = AsyncFd::with_interest(
            RawDevice(file),
            tokio::io::Interest::READABLE | tokio::io::Interest::WRITABLE | tokio::io::Interest::PRIORITY,
        )?;
        let adapter = CecAdapter { fd };
        adapter.configure(config).await?;
        Ok(adapter)
    }

    async fn configure(&self, config: &AdapterConfig) -> Result<(), AdapterError> {
        let raw = self.fd.get_ref().as_raw_fd();
        let mode: u32 = CEC_MODE_INITIATOR_SEND | CEC_MODE_FOLLOWER_ALL;
        unsafe { sys::set_mode(raw, &mode) }?;

        let mut addrs = CecLogAddrs::default();
        unsafe { sys::get_log_addrs(raw, &mut addrs) }?;
        if addrs.log_addr_mask & AUDIO_SYSTEM_LOG_ADDR_BIT != 0 {
            log::info!("logical address 5 already claimed, skipping claim");
            return Ok(());
        }

        let mut delays = CLAIM_RETRY_DELAYS_MS.iter();
        loop {
            match self.claim(config) {
                Ok(()) => break,
                Err(AdapterError::Busy) => match delays.next() {
                    Some(ms) => {
                        log::info!("logical address 5 busy, retrying in {ms}ms");
                        sleep(Duration::from_millis(*ms)).await;
                    }
                    None => {
                        log::warn!("logical address 5 stayed busy after all retries");
                        return Err(AdapterError::Busy);
                    }
                },
                Err(e) => return Err(e),
            }
        }

        if let Some(vendor_id) = config.vendor_compat.vendor_id() {
            let frame = super::frame::encode_vendor_id_broadcast(vendor_id);
            if !self.send(&frame).await {
                log::warn!("failed to broadcast vendor-id announce after claim");
            }
        }
        Ok(())
    }

    fn claim(&self, config: &AdapterConfig) -> Result<(), AdapterError> {
        let raw = self.fd.get_ref().as_raw_fd();
        let mut addrs = CecLogAddrs::default();
        addrs.num_log_addrs = 1;
        addrs.cec_version = CecVersion::V1_4 as u8;
        addrs.primary_device_type[0] = CecPrimDevType::AudioSystem as u8;
        addrs.log_addr_type[0] = CecLogAddrType::AudioSystem as u8;
        addrs.all_device_types[0] = CecPrimDevType::AudioSystem as u8;
        let name = osd_name_bytes(&config.osd_name);
        addrs.osd_name[..name.len()].copy_from_slice(&name);
        if let Some(vendor_id) = config.vendor_compat.vendor_id() {
            addrs.vendor_id = vendor_id;
        }
        match unsafe { sys::set_log_addrs(raw, &mut addrs) } {
            Ok(_) => Ok(()),
            Err(nix::Error::EBUSY) => Err(AdapterError::Busy),
            Err(e) => Err(AdapterError::Io(io::Error::from(e))),
        }
    }
}

fn osd_name_bytes(osd_name: &str) -> Vec<u8> {
    let name = if osd_name.is_empty() { "Audio" } else { osd_name };
    name.as_bytes().iter().copied().take(14).collect()
}

#[async_trait]
impl CecAdapterInterface for CecAdapter {
    async fn recv(&self) -> Option<Vec<u8>> {
        loop {
            let mut guard = match self.fd.readable().await {
                Ok(g) => g,
                Err(e) => {
                    log::warn!("cec adapter readable() failed: {e}");
                    return None;
                }
            };
            let mut msg = CecMsg::empty();
            let raw = self.fd.get_ref().as_raw_fd();
            let result = unsafe { sys::receive(raw, &mut msg) };
            match result {
                Ok(_) => {
                    guard.clear_ready();
                    if msg.is_tx_status_echo() {
                        continue;
                    }
                    return Some(msg.bytes().to_vec());
                }
                Err(nix::Error::EAGAIN) => {
                    guard.clear_ready();
                    return None;
                }
                Err(e) => {
                    guard.clear_ready();
                    log::warn!("cec receive ioctl failed: {e}");
                    return None;
                }
            }
        }
    }

    async fn send(&self, bytes: &[u8]) -> bool {
        let mut guard = match self.fd.writable().await {
            Ok(g) => g,
            Err(e) => {
                log::warn!("cec adapter writable() failed: {e}");
                return false;
            }
        };
        let mut msg = CecMsg::from_bytes(bytes);
        let raw = self.fd.get_ref().as_raw_fd();
        let result = unsafe { sys::transmit(raw, &mut msg) };
        guard.clear_ready();
        match result {
            Ok(_) => true,
            Err(e) => {
                log::warn!("cec transmit ioctl failed: {e}");
                false
            }
        }
    }
}
