//! Pure CEC byte-frame codec: parse inbound frames into [`InboundEvent`]s and
//! encode the fixed set of outbound frames the Audio System emits.
//!
//! Carries no I/O and no logging; malformed or unhandled frames simply parse
//! to `None`.

pub const INITIATOR_TV: u8 = 0x0;
pub const INITIATOR_AUDIO_SYSTEM: u8 = 0x5;
pub const BROADCAST: u8 = 0xf;

/// Semantic payload of a parsed inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    VolumeUp,
    VolumeDown,
    Mute,
    UserControlReleased,
    GiveAudioStatus,
    SystemAudioModeRequest,
    GiveSystemAudioModeStatus,
    RequestArcInitiation,
    RequestArcTermination,
    RequestShortAudioDescriptor,
    GiveDeviceVendorId,
    GiveOsdName,
    GiveDevicePowerStatus,
    SetAudioVolumeLevel { level: u8, muted: bool },
    SamsungVendor { subcommand: u8, mode: Option<u8>, payload: Vec<u8> },
    SamsungVendorWithId { payload: Vec<u8> },
}

impl EventKind {
    /// Stable tag used (together with `source`) to build a dedupe fingerprint.
    pub fn tag(&self) -> &'static str {
        match self {
            EventKind::VolumeUp => "VolumeUp",
            EventKind::VolumeDown => "VolumeDown",
            EventKind::Mute => "Mute",
            EventKind::UserControlReleased => "UserControlReleased",
            EventKind::GiveAudioStatus => "GiveAudioStatus",
            EventKind::SystemAudioModeRequest => "SystemAudioModeRequest",
            EventKind::GiveSystemAudioModeStatus => "GiveSystemAudioModeStatus",
            EventKind::RequestArcInitiation => "RequestArcInitiation",
            EventKind::RequestArcTermination => "RequestArcTermination",
            EventKind::RequestShortAudioDescriptor => "RequestShortAudioDescriptor",
            EventKind::GiveDeviceVendorId => "GiveDeviceVendorId",
            EventKind::GiveOsdName => "GiveOsdName",
            EventKind::GiveDevicePowerStatus => "GiveDevicePowerStatus",
            EventKind::SetAudioVolumeLevel { .. } => "SetAudioVolumeLevel",
            EventKind::SamsungVendor { .. } => "SamsungVendor",
            EventKind::SamsungVendorWithId { .. } => "SamsungVendorWithId",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub source: &'static str,
    pub key: &'static str,
    pub kind: EventKind,
}

impl InboundEvent {
    fn new(kind: EventKind) -> InboundEvent {
        let key = kind.tag();
        InboundEvent { source: "cec", key, kind }
    }
}

/// Parse a received frame (header byte + opcode + operands) into a typed
/// event. Returns `None` for frames too short to carry an opcode, or whose
/// opcode this Audio System does not react to.
pub fn parse(bytes: &[u8]) -> Option<InboundEvent> {
    if bytes.len() < 2 {
        return None;
    }
    let opcode = bytes[1];
    let len = bytes.len();

    match opcode {
        0x44 if len >= 3 => match bytes[2] {
            0x41 => Some(InboundEvent::new(EventKind::VolumeUp)),
            0x42 => Some(InboundEvent::new(EventKind::VolumeDown)),
            0x43 => Some(InboundEvent::new(EventKind::Mute)),
            _ => None,
        },
        0x45 => Some(InboundEvent::new(EventKind::UserControlReleased)),
        0x71 => Some(InboundEvent::new(EventKind::GiveAudioStatus)),
        0x73 if len >= 3 => {
            let status = bytes[2];
            Some(InboundEvent::new(EventKind::SetAudioVolumeLevel {
                level: status & 0x7f,
                muted: status & 0x80 != 0,
            }))
        }
        0x89 if len >= 3 => {
            let subcommand = bytes[2];
            let mode = if subcommand == 0x92 && len >= 4 { Some(bytes[3]) } else { None };
            Some(InboundEvent::new(EventKind::SamsungVendor {
                subcommand,
                mode,
                payload: bytes[2..].to_vec(),
            }))
        }
        0xa0 if len >= 3 => Some(InboundEvent::new(EventKind::SamsungVendorWithId {
            payload: bytes[2..].to_vec(),
        })),
        0x46 => Some(InboundEvent::new(EventKind::GiveOsdName)),
        0x70 => Some(InboundEvent::new(EventKind::SystemAudioModeRequest)),
        0x7d => Some(InboundEvent::new(EventKind::GiveSystemAudioModeStatus)),
        0x8c => Some(InboundEvent::new(EventKind::GiveDeviceVendorId)),
        0x8f => Some(InboundEvent::new(EventKind::GiveDevicePowerStatus)),
        0xa4 => Some(InboundEvent::new(EventKind::RequestShortAudioDescriptor)),
        0xc3 => Some(InboundEvent::new(EventKind::RequestArcInitiation)),
        0xc4 => Some(InboundEvent::new(EventKind::RequestArcTermination)),
        _ => None,
    }
}

fn header(initiator: u8, destination: u8) -> u8 {
    (initiator << 4) | destination
}

pub fn encode_set_system_audio_mode_on() -> Vec<u8> {
    vec![header(INITIATOR_AUDIO_SYSTEM, INITIATOR_TV), 0x72, 0x01]
}

pub fn encode_system_audio_mode_status_on() -> Vec<u8> {
    vec![header(INITIATOR_AUDIO_SYSTEM, INITIATOR_TV), 0x7e, 0x01]
}

pub fn encode_initiate_arc() -> Vec<u8> {
    vec![header(INITIATOR_AUDIO_SYSTEM, INITIATOR_TV), 0xc0]
}

pub fn encode_terminate_arc() -> Vec<u8> {
    vec![header(INITIATOR_AUDIO_SYSTEM, INITIATOR_TV), 0xc5]
}

pub fn encode_report_short_audio_descriptor() -> Vec<u8> {
    vec![header(INITIATOR_AUDIO_SYSTEM, INITIATOR_TV), 0xa3, 0x09, 0x07, 0x07]
}

pub fn encode_device_vendor_id(vendor_id: u32) -> Vec<u8> {
    vendor_id_frame(header(INITIATOR_AUDIO_SYSTEM, INITIATOR_TV), vendor_id)
}

pub fn encode_vendor_id_broadcast(vendor_id: u32) -> Vec<u8> {
    vendor_id_frame(header(INITIATOR_AUDIO_SYSTEM, BROADCAST), vendor_id)
}

fn vendor_id_frame(head: u8, vendor_id: u32) -> Vec<u8> {
    vec![
        head,
        0x87,
        ((vendor_id >> 16) & 0xff) as u8,
        ((vendor_id >> 8) & 0xff) as u8,
        (vendor_id & 0xff) as u8,
    ]
}

/// `osd_name` is clamped to 14 ASCII bytes; empty names fall back to "Audio".
pub fn encode_set_osd_name(osd_name: &str) -> Vec<u8> {
    let name = if osd_name.is_empty() { "Audio" } else { osd_name };
    let mut frame = vec![header(INITIATOR_AUDIO_SYSTEM, INITIATOR_TV), 0x47];
    frame.extend(name.as_bytes().iter().copied().take(14));
    frame
}

pub fn encode_report_audio_status(volume: u8, muted: bool) -> Vec<u8> {
    let status = (if muted { 0x80 } else { 0 }) | (volume & 0x7f);
    vec![header(INITIATOR_AUDIO_SYSTEM, INITIATOR_TV), 0x7a, status]
}

pub fn encode_samsung_vendor_sync_reply(vendor_state_byte: u8) -> Vec<u8> {
    vec![
        header(INITIATOR_AUDIO_SYSTEM, INITIATOR_TV),
        0x89,
        0x95,
        0x01,
        vendor_state_byte,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_volume_keys() {
        assert_eq!(parse(&[0x05, 0x44, 0x41]).unwrap().kind, EventKind::VolumeUp);
        assert_eq!(parse(&[0x05, 0x44, 0x42]).unwrap().kind, EventKind::VolumeDown);
        assert_eq!(parse(&[0x05, 0x44, 0x43]).unwrap().kind, EventKind::Mute);
        assert!(parse(&[0x05, 0x44, 0x99]).is_none());
    }

    #[test]
    fn parses_user_control_released() {
        assert_eq!(
            parse(&[0x05, 0x45]).unwrap().kind,
            EventKind::UserControlReleased
        );
    }

    #[test]
    fn parses_give_audio_status() {
        assert_eq!(parse(&[0x05, 0x71]).unwrap().kind, EventKind::GiveAudioStatus);
    }

    #[test]
    fn parses_set_audio_volume_level() {
        let ev = parse(&[0x05, 0x73, 0x9a]).unwrap();
        assert_eq!(
            ev.kind,
            EventKind::SetAudioVolumeLevel { level: 0x1a, muted: true }
        );
    }

    #[test]
    fn parses_samsung_vendor_with_mode() {
        let ev = parse(&[0x05, 0x89, 0x92, 0x03]).unwrap();
        match ev.kind {
            EventKind::SamsungVendor { subcommand, mode, payload } => {
                assert_eq!(subcommand, 0x92);
                assert_eq!(mode, Some(0x03));
                assert_eq!(payload, vec![0x92, 0x03]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_samsung_vendor_without_mode_when_short() {
        let ev = parse(&[0x05, 0x89, 0x95]).unwrap();
        match ev.kind {
            EventKind::SamsungVendor { subcommand, mode, .. } => {
                assert_eq!(subcommand, 0x95);
                assert_eq!(mode, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_samsung_vendor_with_id() {
        let ev = parse(&[0x05, 0xa0, 0x01, 0x02]).unwrap();
        match ev.kind {
            EventKind::SamsungVendorWithId { payload } => assert_eq!(payload, vec![0x01, 0x02]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_fixed_system_request_table() {
        assert_eq!(parse(&[0x05, 0x46]).unwrap().kind, EventKind::GiveOsdName);
        assert_eq!(
            parse(&[0x05, 0x70]).unwrap().kind,
            EventKind::SystemAudioModeRequest
        );
        assert_eq!(
            parse(&[0x05, 0x7d]).unwrap().kind,
            EventKind::GiveSystemAudioModeStatus
        );
        assert_eq!(
            parse(&[0x05, 0x8c]).unwrap().kind,
            EventKind::GiveDeviceVendorId
        );
        assert_eq!(
            parse(&[0x05, 0x8f]).unwrap().kind,
            EventKind::GiveDevicePowerStatus
        );
        assert_eq!(
            parse(&[0x05, 0xa4]).unwrap().kind,
            EventKind::RequestShortAudioDescriptor
        );
        assert_eq!(
            parse(&[0x05, 0xc3]).unwrap().kind,
            EventKind::RequestArcInitiation
        );
        assert_eq!(
            parse(&[0x05, 0xc4]).unwrap().kind,
            EventKind::RequestArcTermination
        );
    }

    #[test]
    fn unhandled_opcode_is_none() {
        assert!(parse(&[0x05, 0x00]).is_none());
        assert!(parse(&[0x05, 0x84, 0x10, 0x20]).is_none());
    }

    #[test]
    fn never_panics_on_arbitrary_short_frames() {
        for len in 0..=16usize {
            let frame: Vec<u8> = (0..len as u8).collect();
            let _ = parse(&frame);
        }
    }

    #[test]
    fn status_byte_round_trips() {
        for v in 0..=100u8 {
            for m in [true, false] {
                let frame = encode_report_audio_status(v, m);
                let decoded = parse(&[0x50, 0x7a, frame[2]]).unwrap();
                match decoded.kind {
                    EventKind::SetAudioVolumeLevel { .. } => panic!("wrong opcode for test"),
                    _ => {}
                }
                let status = frame[2];
                assert_eq!(status & 0x7f, v);
                assert_eq!(status & 0x80 != 0, m);
            }
        }
    }

    #[test]
    fn osd_name_falls_back_to_audio_and_clamps() {
        assert_eq!(&encode_set_osd_name("")[2..], b"Audio");
        let long = "A".repeat(20);
        let frame = encode_set_osd_name(&long);
        assert_eq!(frame.len() - 2, 14);
    }
}
