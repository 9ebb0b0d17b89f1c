//! Linux CEC UAPI ioctl bindings, reproduced from `<linux/cec.h>`.
//!
//! Only the subset the adapter actually drives is modeled: adapter
//! capabilities, logical-address claim/query, mode, and transmit/receive.
//! Physical-address handling is left to the kernel/EDID and is not
//! exposed here.

use bitflags::bitflags;
use nix::{ioctl_read, ioctl_readwrite, ioctl_write_ptr};
use num_enum::{IntoPrimitive, TryFromPrimitive};

pub const CEC_MAX_MSG_SIZE: usize = 16;
pub const CEC_MAX_LOG_ADDRS: usize = 4;

bitflags! {
    /// Capabilities of the CEC adapter (`CEC_ADAP_G_CAPS.capabilities`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        const PHYS_ADDR   = 1 << 0;
        const LOG_ADDRS   = 1 << 1;
        const TRANSMIT    = 1 << 2;
        const PASSTHROUGH = 1 << 3;
        const RC          = 1 << 4;
        const MONITOR_ALL = 1 << 5;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TxStatus: u8 {
        const OK          = 1 << 0;
        const ARB_LOST    = 1 << 1;
        const NACK        = 1 << 2;
        const LOW_DRIVE   = 1 << 3;
        const ERROR       = 1 << 4;
        const MAX_RETRIES = 1 << 5;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RxStatus: u8 {
        const OK            = 1 << 0;
        const TIMEOUT       = 1 << 1;
        const FEATURE_ABORT = 1 << 2;
    }
}

/// `cec_log_addr_mask`: one bit per claimed logical address (bit 5 = Audio System).
pub type LogAddrMask = u16;

#[derive(Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Copy, Clone)]
#[repr(u8)]
pub enum CecPrimDevType {
    Tv = 0,
    Record = 1,
    Tuner = 3,
    Playback = 4,
    AudioSystem = 5,
    Switch = 6,
    Processor = 7,
}

#[derive(Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Copy, Clone)]
#[repr(u8)]
pub enum CecLogAddrType {
    Tv = 0,
    Record = 1,
    Tuner = 2,
    Playback = 3,
    AudioSystem = 4,
    Specific = 5,
    Unregistered = 6,
}

#[derive(Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Copy, Clone)]
#[repr(u32)]
pub enum CecVersion {
    V1_3a = 4,
    V1_4 = 5,
    V2_0 = 6,
}

/// `cec_log_addrs`.
#[derive(Debug)]
#[repr(C)]
pub struct CecLogAddrs {
    pub log_addr: [u8; CEC_MAX_LOG_ADDRS],
    pub log_addr_mask: LogAddrMask,
    pub cec_version: u8,
    pub num_log_addrs: u8,
    pub vendor_id: u32,
    pub flags: u32,
    pub osd_name: [u8; 15],
    pub primary_device_type: [u8; CEC_MAX_LOG_ADDRS],
    pub log_addr_type: [u8; CEC_MAX_LOG_ADDRS],
    pub all_device_types: [u8; CEC_MAX_LOG_ADDRS],
    pub features: [[u8; CEC_MAX_LOG_ADDRS]; 12],
}

impl Default for CecLogAddrs {
    fn default() -> Self {
        CecLogAddrs {
            log_addr: [0xff; CEC_MAX_LOG_ADDRS],
            log_addr_mask: 0,
            cec_version: CecVersion::V1_4 as u8,
            num_log_addrs: 0,
            vendor_id: 0,
            flags: 0,
            osd_name: [0; 15],
            primary_device_type: [CecPrimDevType::Tv as u8; CEC_MAX_LOG_ADDRS],
            log_addr_type: [CecLogAddrType::Tv as u8; CEC_MAX_LOG_ADDRS],
            all_device_types: [0; CEC_MAX_LOG_ADDRS],
            features: [[0; CEC_MAX_LOG_ADDRS]; 12],
        }
    }
}

/// `cec_caps`.
#[derive(Debug)]
#[repr(C)]
pub struct CecCaps {
    pub driver: [u8; 32],
    pub name: [u8; 32],
    pub available_log_addrs: u32,
    pub capabilities: Capabilities,
    pub version: u32,
}

impl Default for CecCaps {
    fn default() -> Self {
        CecCaps {
            driver: [0; 32],
            name: [0; 32],
            available_log_addrs: 0,
            capabilities: Capabilities::empty(),
            version: 0,
        }
    }
}

/// `cec_msg`.
#[derive(Debug)]
#[repr(C)]
pub struct CecMsg {
    tx_ts: u64,
    rx_ts: u64,
    pub len: u32,
    pub timeout: u32,
    pub sequence: u32,
    flags: u32,
    pub msg: [u8; CEC_MAX_MSG_SIZE],
    reply: u8,
    pub rx_status: RxStatus,
    pub tx_status: TxStatus,
    tx_arb_lost_cnt: u8,
    tx_nack_cnt: u8,
    tx_low_drive_cnt: u8,
    tx_error_cnt: u8,
}

impl CecMsg {
    pub fn from_bytes(bytes: &[u8]) -> CecMsg {
        let mut msg = CecMsg::empty();
        let len = bytes.len().min(CEC_MAX_MSG_SIZE);
        msg.msg[..len].copy_from_slice(&bytes[..len]);
        msg.len = len as u32;
        msg
    }

    pub fn empty() -> CecMsg {
        CecMsg {
            tx_ts: 0,
            rx_ts: 0,
            len: 0,
            timeout: 0,
            sequence: 0,
            flags: 0,
            msg: [0; CEC_MAX_MSG_SIZE],
            reply: 0,
            rx_status: RxStatus::empty(),
            tx_status: TxStatus::empty(),
            tx_arb_lost_cnt: 0,
            tx_nack_cnt: 0,
            tx_low_drive_cnt: 0,
            tx_error_cnt: 0,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.msg[..self.len as usize]
    }

    /// True for the internal status echo the kernel emits for a completed
    /// non-blocking transmit: `sequence != 0`, a transmit status was set, but
    /// no receive status (i.e. not an actual inbound frame).
    pub fn is_tx_status_echo(&self) -> bool {
        self.sequence != 0 && !self.tx_status.is_empty() && self.rx_status.is_empty()
    }
}

// CEC_ADAP_G_CAPS  _IOWR('a', 0, struct cec_caps)
ioctl_readwrite! {
    caps, b'a', 0, CecCaps
}

// CEC_ADAP_G_LOG_ADDRS  _IOR('a', 3, struct cec_log_addrs)
ioctl_read! {
    get_log_addrs, b'a', 3, CecLogAddrs
}

// CEC_ADAP_S_LOG_ADDRS  _IOWR('a', 4, struct cec_log_addrs)
ioctl_readwrite! {
    set_log_addrs, b'a', 4, CecLogAddrs
}

// CEC_G_MODE  _IOR('a', 8, __u32)
ioctl_read! {
    get_mode, b'a', 8, u32
}

// CEC_S_MODE  _IOW('a', 9, __u32)
ioctl_write_ptr! {
    set_mode, b'a', 9, u32
}

// CEC_TRANSMIT  _IOWR('a', 5, struct cec_msg)
ioctl_readwrite! {
    transmit, b'a', 5, CecMsg
}

// CEC_RECEIVE  _IOWR('a', 6, struct cec_msg)
ioctl_readwrite! {
    receive, b'a', 6, CecMsg
}

pub const CEC_MODE_INITIATOR_SEND: u32 = 1;
pub const CEC_MODE_FOLLOWER_ALL: u32 = 0x1 << 4;
