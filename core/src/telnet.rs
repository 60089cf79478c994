//! Telnet protocol bytes and the extension options the server negotiates.
//!
//! Only the small slice of RFC 854 the connection layer needs: the IAC
//! command set, the option numbers for the MUD extension suite, and the
//! MTTS capability bitfield delivered by the third TTYPE round.

use bitflags::bitflags;

pub const IAC: u8 = 255;
pub const DONT: u8 = 254;
pub const DO: u8 = 253;
pub const WONT: u8 = 252;
pub const WILL: u8 = 251;
pub const SB: u8 = 250;
pub const GA: u8 = 249;
pub const SE: u8 = 240;

pub const TELOPT_ECHO: u8 = 1;
/// End-of-record; clients accepting it get a go-ahead after prompts.
pub const TELOPT_EOR: u8 = 25;
pub const TELOPT_TTYPE: u8 = 24;
pub const TELOPT_NAWS: u8 = 31;
pub const TELOPT_CHARSET: u8 = 42;
pub const TELOPT_COMPRESS: u8 = 85;
pub const TELOPT_COMPRESS2: u8 = 86;
pub const TELOPT_MXP: u8 = 91;
pub const TELOPT_GMCP: u8 = 201;

/// TTYPE subnegotiation qualifiers (RFC 1091).
pub const TELQUAL_IS: u8 = 0;
pub const TELQUAL_SEND: u8 = 1;

/// CHARSET subnegotiation opcodes (RFC 2066).
pub const CHARSET_REQUEST: u8 = 1;
pub const CHARSET_ACCEPTED: u8 = 2;
pub const CHARSET_REJECTED: u8 = 3;

/// Echo suppression around password entry.
pub const ECHO_OFF: [u8; 3] = [IAC, WILL, TELOPT_ECHO];
pub const ECHO_ON: [u8; 3] = [IAC, WONT, TELOPT_ECHO];

/// Go-ahead marker appended after a prompt when the client asked for it.
pub const GO_AHEAD: [u8; 2] = [IAC, GA];

bitflags! {
    /// MTTS capability bitfield, round 3 of the TTYPE probe.
    ///
    /// The client replies `IS "MTTS <n>"` where `n` is the decimal sum of
    /// these bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MttsFlags: u32 {
        const ANSI          = 1;
        const VT100         = 2;
        const UTF8          = 4;
        const COLORS_256    = 8;
        const MOUSE         = 16;
        const OSC_COLOR     = 32;
        const SCREEN_READER = 64;
        const PROXY         = 128;
        const TRUECOLOR     = 256;
        const MNES          = 512;
        const MSLP          = 1024;
        const SSL           = 2048;
    }
}

impl MttsFlags {
    /// Parse the decimal payload of an `"MTTS <n>"` reply. Unknown high
    /// bits are preserved so future capabilities round-trip.
    pub fn from_decimal(s: &str) -> Option<Self> {
        s.trim().parse::<u32>().ok().map(Self::from_bits_retain)
    }
}

/// Build a two-byte negotiation command (`IAC <verb> <option>`).
pub fn negotiate(verb: u8, option: u8) -> [u8; 3] {
    [IAC, verb, option]
}

/// Build a subnegotiation frame: `IAC SB <option> <payload> IAC SE`,
/// doubling any `0xFF` bytes inside the payload.
pub fn subnegotiation(option: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 5);
    out.extend_from_slice(&[IAC, SB, option]);
    for &b in payload {
        out.push(b);
        if b == IAC {
            out.push(IAC);
        }
    }
    out.extend_from_slice(&[IAC, SE]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mtts_parse_known_bits() {
        let flags = MttsFlags::from_decimal("77").unwrap();
        assert!(flags.contains(MttsFlags::ANSI));
        assert!(flags.contains(MttsFlags::UTF8));
        assert!(flags.contains(MttsFlags::COLORS_256));
        assert!(flags.contains(MttsFlags::SCREEN_READER));
        assert!(!flags.contains(MttsFlags::TRUECOLOR));
    }

    #[test]
    fn mtts_parse_preserves_unknown_bits() {
        let flags = MttsFlags::from_decimal("4096").unwrap();
        assert_eq!(flags.bits(), 4096);
    }

    #[test]
    fn mtts_parse_rejects_garbage() {
        assert!(MttsFlags::from_decimal("MTTS").is_none());
        assert!(MttsFlags::from_decimal("").is_none());
    }

    #[test]
    fn subnegotiation_escapes_iac() {
        let frame = subnegotiation(TELOPT_GMCP, &[b'a', IAC, b'b']);
        assert_eq!(
            frame,
            vec![IAC, SB, TELOPT_GMCP, b'a', IAC, IAC, b'b', IAC, SE]
        );
    }

    #[test]
    fn negotiate_builds_three_bytes() {
        assert_eq!(negotiate(DO, TELOPT_TTYPE), [IAC, DO, TELOPT_TTYPE]);
    }
}
