//! Framing for the subset of the JS5 protocol used to observe liveness

/// Protocol revision negotiated during the handshake
pub type Revision = u32;

/// Revision the handshake starts from unless configured otherwise
pub const BASELINE_REVISION: Revision = 223;

/// Opcode opening a handshake
pub const HANDSHAKE_OPCODE: u8 = 15;
/// Opcode of a liveness probe
pub const PING_OPCODE: u8 = 1;
/// Session id sent with every probe; only the low 24 bits go on the wire
pub const PING_SESSION: u32 = 0xFF_FFFF;

/// Length of an encoded handshake request
pub const HANDSHAKE_LEN: usize = 1 + 4 + HANDSHAKE_PADDING;
/// Zero bytes trailing the revision. The server drops handshakes without them.
const HANDSHAKE_PADDING: usize = 16;
/// Length of an encoded ping request
pub const PING_LEN: usize = 4;

/// Largest ping response read in one go
pub const MAX_RESPONSE: usize = 0xFFFF;

/// Encode a handshake request for `revision`
pub fn handshake_frame(revision: Revision) -> [u8; HANDSHAKE_LEN] {
    let mut frame = [0; HANDSHAKE_LEN];
    frame[0] = HANDSHAKE_OPCODE;
    frame[1..5].copy_from_slice(&revision.to_be_bytes());
    frame
}

/// Encode a liveness probe
pub fn ping_frame() -> [u8; PING_LEN] {
    let session = PING_SESSION.to_be_bytes();
    [PING_OPCODE, session[1], session[2], session[3]]
}

/// Server's answer to a handshake
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Status {
    /// Revision accepted; the connection is usable for pings
    Match,
    /// Revision too old; retry with the next one on a new connection
    Mismatch,
}

impl Status {
    pub const MATCH: u8 = 0;
    pub const MISMATCH: u8 = 6;

    /// Decode a status byte, or `None` if it isn't one we understand
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            Self::MATCH => Some(Status::Match),
            Self::MISMATCH => Some(Status::Mismatch),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_layout() {
        let frame = handshake_frame(223);
        assert_eq!(frame.len(), 21);
        assert_eq!(&frame[..5], &[0x0F, 0x00, 0x00, 0x00, 0xDF]);
        assert!(frame[5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn handshake_revision_is_big_endian() {
        let frame = handshake_frame(0x0102_0304);
        assert_eq!(&frame[1..5], &[1, 2, 3, 4]);
    }

    #[test]
    fn ping_layout() {
        assert_eq!(ping_frame(), [0x01, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn status_bytes() {
        assert_eq!(Status::from_byte(0), Some(Status::Match));
        assert_eq!(Status::from_byte(6), Some(Status::Mismatch));
        assert_eq!(Status::from_byte(1), None);
        assert_eq!(Status::from_byte(0xFF), None);
    }
}
