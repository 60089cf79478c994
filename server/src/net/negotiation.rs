//! The telnet extension suite: TTYPE/MTTS, NAWS, CHARSET, GMCP, MXP and
//! MCCP, plus the capability-detection window and intro banner tiers.
//!
//! All extensions follow the same shape: the accept path sends one
//! burst of offers, the client answers in any order (or not at all),
//! and handlers update the descriptor's capability record. Refusals may
//! arrive mid-session and are honored.

use core::telnet::*;

use super::descriptor::{Caps, Charset, ConState, Descriptor};
use super::telnet::TelnetEvent;

/// `IAC SB TTYPE SEND IAC SE`: ask for the next terminal-type round.
const TTYPE_SEND: [u8; 6] = [IAC, SB, TELOPT_TTYPE, TELQUAL_SEND, IAC, SE];

const TTYPE_MAX_ROUNDS: u8 = 3;

/// Offer every extension in one burst right after accept.
pub fn offer_burst(desc: &mut Descriptor) {
    let mut bytes = Vec::with_capacity(24);
    bytes.extend(negotiate(DO, TELOPT_TTYPE));
    bytes.extend(negotiate(DO, TELOPT_NAWS));
    bytes.extend(negotiate(WILL, TELOPT_CHARSET));
    bytes.extend(negotiate(WILL, TELOPT_EOR));
    bytes.extend(negotiate(WILL, TELOPT_GMCP));
    bytes.extend(negotiate(WILL, TELOPT_MXP));
    bytes.extend(super::mccp::offers());
    desc.write_raw(&bytes);
}

/// Dispatch one parsed negotiation event.
pub fn handle_event(desc: &mut Descriptor, event: TelnetEvent) {
    match event {
        TelnetEvent::Will(TELOPT_TTYPE) => {
            if !desc.caps.ttype_enabled {
                desc.caps.ttype_enabled = true;
                desc.caps.ttype_round = 0;
                desc.write_raw(&TTYPE_SEND);
            }
        }
        TelnetEvent::Wont(TELOPT_TTYPE) => {
            desc.caps.ttype_enabled = false;
        }
        TelnetEvent::Will(TELOPT_NAWS) => {
            desc.caps.naws_enabled = true;
        }
        TelnetEvent::Wont(TELOPT_NAWS) => {
            desc.caps.naws_enabled = false;
        }
        TelnetEvent::Do(TELOPT_CHARSET) => {
            // REQUEST " UTF-8" (RFC 2066: first byte is the separator).
            let mut payload = vec![CHARSET_REQUEST];
            payload.extend(b" UTF-8");
            let frame = subnegotiation(TELOPT_CHARSET, &payload);
            desc.write_raw(&frame);
        }
        TelnetEvent::Dont(TELOPT_CHARSET) => {
            // No negotiation; the MTTS fallback decides later.
        }
        TelnetEvent::Do(TELOPT_GMCP) => {
            desc.caps.gmcp_enabled = true;
        }
        TelnetEvent::Dont(TELOPT_GMCP) => {
            desc.caps.gmcp_enabled = false;
        }
        TelnetEvent::Do(TELOPT_MXP) => {
            desc.caps.mxp_enabled = true;
        }
        TelnetEvent::Dont(TELOPT_MXP) => {
            desc.caps.mxp_enabled = false;
        }
        TelnetEvent::Do(TELOPT_EOR) => {
            desc.caps.send_ga = true;
        }
        TelnetEvent::Dont(TELOPT_EOR) => {
            desc.caps.send_ga = false;
        }
        TelnetEvent::Do(opt @ (TELOPT_COMPRESS | TELOPT_COMPRESS2)) => {
            let version = if opt == TELOPT_COMPRESS2 { 2 } else { 1 };
            // v2 wins if the client accepts both; never restart a live
            // stream.
            if desc.mccp.is_none()
                && desc.mccp_start.map_or(true, |pending| version > pending)
            {
                desc.mccp_start = Some(version);
            }
        }
        TelnetEvent::Dont(TELOPT_COMPRESS | TELOPT_COMPRESS2) => {
            if desc.mccp.is_some() {
                desc.mccp_stop = true;
            }
            desc.mccp_start = None;
        }
        TelnetEvent::Subnegotiation(TELOPT_TTYPE, payload) => {
            handle_ttype(desc, &payload);
        }
        TelnetEvent::Subnegotiation(TELOPT_NAWS, payload) => {
            if payload.len() >= 4 {
                desc.caps.width = u16::from_be_bytes([payload[0], payload[1]]);
                desc.caps.height = u16::from_be_bytes([payload[2], payload[3]]);
            }
        }
        TelnetEvent::Subnegotiation(TELOPT_CHARSET, payload) => {
            handle_charset(desc, &payload);
        }
        TelnetEvent::Subnegotiation(TELOPT_GMCP, payload) => {
            log::debug!(
                "gmcp from {}: {}",
                desc.host,
                String::from_utf8_lossy(&payload)
            );
        }
        TelnetEvent::Will(opt) => {
            desc.write_raw(&negotiate(DONT, opt));
        }
        TelnetEvent::Do(opt) => {
            desc.write_raw(&negotiate(WONT, opt));
        }
        TelnetEvent::Wont(_) | TelnetEvent::Dont(_) => {}
        TelnetEvent::Subnegotiation(opt, _) => {
            log::debug!("subnegotiation for unhandled option {opt}");
        }
    }
}

/// TTYPE rounds: (1) client name, (2) terminal name, (3) MTTS bitfield.
/// Rounds two and three are requested only while the prior round
/// returned data.
fn handle_ttype(desc: &mut Descriptor, payload: &[u8]) {
    let Some((&TELQUAL_IS, term)) = payload.split_first() else {
        return;
    };
    let term = String::from_utf8_lossy(term).trim().to_string();
    if term.is_empty() {
        return;
    }

    desc.caps.ttype_enabled = true;
    desc.caps.ttype_round = (desc.caps.ttype_round + 1).min(TTYPE_MAX_ROUNDS);

    match desc.caps.ttype_round {
        1 => {
            desc.caps.client_name = term;
            desc.write_raw(&TTYPE_SEND);
        }
        2 => {
            desc.caps.terminal_type = term;
            desc.write_raw(&TTYPE_SEND);
        }
        _ => {
            if let Some(bits) = term.strip_prefix("MTTS ") {
                match MttsFlags::from_decimal(bits) {
                    Some(flags) => desc.caps.mtts = flags,
                    None => log::debug!("unparsable MTTS payload {term:?}"),
                }
            }
        }
    }
}

/// CHARSET replies: `ACCEPTED <sep>UTF-8` or `REJECTED`.
fn handle_charset(desc: &mut Descriptor, payload: &[u8]) {
    match payload.first() {
        Some(&CHARSET_ACCEPTED) => {
            let answer = String::from_utf8_lossy(&payload[1..]);
            if answer.trim_start().to_ascii_uppercase().starts_with("UTF-8") {
                desc.caps.charset = Charset::Utf8;
                desc.caps.charset_negotiated = true;
            }
        }
        Some(&CHARSET_REJECTED) => {
            desc.caps.charset = Charset::Ascii;
            desc.caps.charset_negotiated = true;
        }
        _ => {}
    }
}

/// Settle the charset once detection ends: explicit negotiation wins,
/// then the MTTS UTF-8 bit, then the modern UTF-8 default. Only an
/// explicit REJECTED lands on ASCII.
pub fn finalize_charset(caps: &mut Caps) {
    if !caps.charset_negotiated {
        caps.charset = Charset::Utf8;
        caps.charset_negotiated = true;
    }
}

/// Whether the detection window may close this pulse. An MTTS probe in
/// visible progress extends the deadline up to the hard cap.
pub fn detection_complete(desc: &Descriptor) -> bool {
    use core::constants::{DETECT_CAPS_PULSES, DETECT_CAPS_PULSES_MAX};

    if desc.state != ConState::DetectCaps {
        return true;
    }
    if desc.pulses >= DETECT_CAPS_PULSES_MAX {
        return true;
    }
    if desc.pulses < DETECT_CAPS_PULSES {
        return false;
    }
    // Base window elapsed; wait longer only for an active TTYPE probe.
    !(desc.caps.ttype_enabled && desc.caps.ttype_round < TTYPE_MAX_ROUNDS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntroTier {
    Rich,
    Standard,
    Basic,
    ScreenReader,
}

/// Pick the banner tier from the collected capability evidence.
pub fn intro_tier(caps: &Caps) -> IntroTier {
    if caps.screen_reader() {
        return IntroTier::ScreenReader;
    }
    if caps.mtts.contains(MttsFlags::TRUECOLOR) || caps.mtts.contains(MttsFlags::COLORS_256) {
        if caps.naws_enabled && caps.width >= 100 {
            return IntroTier::Rich;
        }
        return IntroTier::Standard;
    }
    if caps.mtts.contains(MttsFlags::ANSI) || caps.ttype_enabled || caps.naws_enabled {
        return IntroTier::Standard;
    }
    IntroTier::Basic
}

pub fn intro_text(tier: IntroTier) -> &'static str {
    match tier {
        IntroTier::Rich => concat!(
            "#t8080ff          .:  Shattered Aldermoor  :.#n\r\n",
            "#x240   forged in the ruin of the old kingdoms#n\r\n",
            "\r\n",
            " By what name do the chronicles know thee? "
        ),
        IntroTier::Standard => concat!(
            "#C          .:  Shattered Aldermoor  :.#n\r\n",
            "#c   forged in the ruin of the old kingdoms#n\r\n",
            "\r\n",
            " By what name do the chronicles know thee? "
        ),
        IntroTier::Basic => concat!(
            "          .:  Shattered Aldermoor  :.\r\n",
            "   forged in the ruin of the old kingdoms\r\n",
            "\r\n",
            " By what name do the chronicles know thee? "
        ),
        IntroTier::ScreenReader => concat!(
            "Welcome to Shattered Aldermoor, a text world.\r\n",
            "Screen reader mode is active; decorative art is disabled.\r\n",
            "Please enter your character name: "
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::super::descriptor::tests_support::test_descriptor;
    use super::*;

    #[test]
    fn ttype_three_round_probe() {
        let mut desc = test_descriptor();
        handle_event(&mut desc, TelnetEvent::Will(TELOPT_TTYPE));
        assert!(desc.caps.ttype_enabled);
        assert!(desc.outbuf.ends_with(&TTYPE_SEND));

        handle_event(
            &mut desc,
            TelnetEvent::Subnegotiation(TELOPT_TTYPE, b"\x00TINTIN++".to_vec()),
        );
        assert_eq!(desc.caps.client_name, "TINTIN++");
        handle_event(
            &mut desc,
            TelnetEvent::Subnegotiation(TELOPT_TTYPE, b"\x00TINTIN++".to_vec()),
        );
        assert_eq!(desc.caps.terminal_type, "TINTIN++");
        handle_event(
            &mut desc,
            TelnetEvent::Subnegotiation(TELOPT_TTYPE, b"\x00MTTS 77".to_vec()),
        );
        assert_eq!(desc.caps.mtts.bits(), 77);
        assert!(desc.caps.mtts.contains(MttsFlags::SCREEN_READER));
    }

    #[test]
    fn naws_parses_dimensions() {
        let mut desc = test_descriptor();
        handle_event(&mut desc, TelnetEvent::Will(TELOPT_NAWS));
        handle_event(
            &mut desc,
            TelnetEvent::Subnegotiation(TELOPT_NAWS, vec![0, 120, 0, 40]),
        );
        assert!(desc.caps.naws_enabled);
        assert_eq!(desc.caps.width, 120);
        assert_eq!(desc.caps.height, 40);
    }

    #[test]
    fn charset_accept_and_reject() {
        let mut desc = test_descriptor();
        handle_event(
            &mut desc,
            TelnetEvent::Subnegotiation(TELOPT_CHARSET, b"\x02 UTF-8".to_vec()),
        );
        assert_eq!(desc.caps.charset, Charset::Utf8);
        assert!(desc.caps.utf8());

        let mut desc = test_descriptor();
        handle_event(
            &mut desc,
            TelnetEvent::Subnegotiation(TELOPT_CHARSET, vec![CHARSET_REJECTED]),
        );
        assert_eq!(desc.caps.charset, Charset::Ascii);
        assert!(!desc.caps.utf8());
    }

    #[test]
    fn charset_defaults_to_utf8() {
        let mut caps = Caps::default();
        finalize_charset(&mut caps);
        assert_eq!(caps.charset, Charset::Utf8);
    }

    #[test]
    fn mccp_prefers_v2() {
        let mut desc = test_descriptor();
        handle_event(&mut desc, TelnetEvent::Do(TELOPT_COMPRESS));
        assert_eq!(desc.mccp_start, Some(1));
        handle_event(&mut desc, TelnetEvent::Do(TELOPT_COMPRESS2));
        assert_eq!(desc.mccp_start, Some(2));
        // A later v1 acceptance does not downgrade.
        handle_event(&mut desc, TelnetEvent::Do(TELOPT_COMPRESS));
        assert_eq!(desc.mccp_start, Some(2));
    }

    #[test]
    fn midsession_refusals_flip_flags() {
        let mut desc = test_descriptor();
        handle_event(&mut desc, TelnetEvent::Do(TELOPT_GMCP));
        assert!(desc.caps.gmcp_enabled);
        handle_event(&mut desc, TelnetEvent::Dont(TELOPT_GMCP));
        assert!(!desc.caps.gmcp_enabled);
    }

    #[test]
    fn detection_window_extends_for_mtts() {
        use core::constants::{DETECT_CAPS_PULSES, DETECT_CAPS_PULSES_MAX};
        let mut desc = test_descriptor();
        desc.state = ConState::DetectCaps;

        desc.pulses = DETECT_CAPS_PULSES;
        assert!(detection_complete(&desc));

        desc.caps.ttype_enabled = true;
        desc.caps.ttype_round = 1;
        assert!(!detection_complete(&desc));

        desc.pulses = DETECT_CAPS_PULSES_MAX;
        assert!(detection_complete(&desc));
    }

    #[test]
    fn tier_classification() {
        let mut caps = Caps::default();
        assert_eq!(intro_tier(&caps), IntroTier::Basic);

        caps.mtts = MttsFlags::ANSI;
        assert_eq!(intro_tier(&caps), IntroTier::Standard);

        caps.mtts = MttsFlags::ANSI | MttsFlags::COLORS_256;
        caps.naws_enabled = true;
        caps.width = 120;
        assert_eq!(intro_tier(&caps), IntroTier::Rich);

        caps.mtts |= MttsFlags::SCREEN_READER;
        assert_eq!(intro_tier(&caps), IntroTier::ScreenReader);
    }

    #[test]
    fn unknown_options_are_refused() {
        let mut desc = test_descriptor();
        handle_event(&mut desc, TelnetEvent::Will(99));
        assert!(desc.outbuf.ends_with(&negotiate(DONT, 99)));
        handle_event(&mut desc, TelnetEvent::Do(99));
        assert!(desc.outbuf.ends_with(&negotiate(WONT, 99)));
    }
}
