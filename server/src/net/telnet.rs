//! The telnet IAC state machine.
//!
//! Raw socket bytes go in; cooked text bytes and negotiation events come
//! out. Two-byte commands (WILL/WONT/DO/DONT + option) surface as events
//! for the negotiation layer; SB...SE payloads accumulate into a bounded
//! scratch buffer with `IAC IAC` unescaped, and oversized or malformed
//! subnegotiations are discarded without killing the connection.

use core::constants::SUBNEG_BUFFER_SIZE;
use core::telnet::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelnetEvent {
    Will(u8),
    Wont(u8),
    Do(u8),
    Dont(u8),
    Subnegotiation(u8, Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Data,
    Iac,
    Verb(u8),
    SubOption,
    SubData,
    SubIac,
}

pub struct TelnetParser {
    state: ParseState,
    sub_option: u8,
    sub_buf: Vec<u8>,
    sub_overflow: bool,
}

impl TelnetParser {
    pub fn new() -> Self {
        TelnetParser {
            state: ParseState::Data,
            sub_option: 0,
            sub_buf: Vec::new(),
            sub_overflow: false,
        }
    }

    /// Feed raw bytes. Cooked text is appended to `cooked`; protocol
    /// events are returned in arrival order.
    pub fn push(&mut self, input: &[u8], cooked: &mut Vec<u8>) -> Vec<TelnetEvent> {
        let mut events = Vec::new();

        for &byte in input {
            match self.state {
                ParseState::Data => {
                    if byte == IAC {
                        self.state = ParseState::Iac;
                    } else {
                        cooked.push(byte);
                    }
                }
                ParseState::Iac => match byte {
                    IAC => {
                        // Escaped 0xFF is data.
                        cooked.push(IAC);
                        self.state = ParseState::Data;
                    }
                    WILL | WONT | DO | DONT => {
                        self.state = ParseState::Verb(byte);
                    }
                    SB => {
                        self.state = ParseState::SubOption;
                    }
                    // NOP, GA, AYT and friends carry no payload.
                    _ => {
                        self.state = ParseState::Data;
                    }
                },
                ParseState::Verb(verb) => {
                    events.push(match verb {
                        WILL => TelnetEvent::Will(byte),
                        WONT => TelnetEvent::Wont(byte),
                        DO => TelnetEvent::Do(byte),
                        _ => TelnetEvent::Dont(byte),
                    });
                    self.state = ParseState::Data;
                }
                ParseState::SubOption => {
                    self.sub_option = byte;
                    self.sub_buf.clear();
                    self.sub_overflow = false;
                    self.state = ParseState::SubData;
                }
                ParseState::SubData => {
                    if byte == IAC {
                        self.state = ParseState::SubIac;
                    } else {
                        self.push_sub(byte);
                    }
                }
                ParseState::SubIac => match byte {
                    IAC => {
                        // IAC IAC inside a payload is a literal 0xFF.
                        self.push_sub(IAC);
                        self.state = ParseState::SubData;
                    }
                    SE => {
                        if self.sub_overflow {
                            log::warn!(
                                "oversized subnegotiation for option {} discarded",
                                self.sub_option
                            );
                        } else {
                            events.push(TelnetEvent::Subnegotiation(
                                self.sub_option,
                                std::mem::take(&mut self.sub_buf),
                            ));
                        }
                        self.sub_buf.clear();
                        self.state = ParseState::Data;
                    }
                    _ => {
                        // Stray IAC <x> inside SB: treat as payload noise.
                        self.push_sub(IAC);
                        self.push_sub(byte);
                        self.state = ParseState::SubData;
                    }
                },
            }
        }

        events
    }

    fn push_sub(&mut self, byte: u8) {
        if self.sub_buf.len() >= SUBNEG_BUFFER_SIZE {
            self.sub_overflow = true;
        } else {
            self.sub_buf.push(byte);
        }
    }
}

impl Default for TelnetParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(parser: &mut TelnetParser, input: &[u8]) -> (Vec<u8>, Vec<TelnetEvent>) {
        let mut cooked = Vec::new();
        let events = parser.push(input, &mut cooked);
        (cooked, events)
    }

    #[test]
    fn plain_text_passes_through() {
        let mut parser = TelnetParser::new();
        let (cooked, events) = feed(&mut parser, b"look\r\n");
        assert_eq!(cooked, b"look\r\n");
        assert!(events.is_empty());
    }

    /// `IAC IAC h i` delivers a literal 0xFF followed by text.
    #[test]
    fn escaped_iac_is_data() {
        let mut parser = TelnetParser::new();
        let (cooked, events) = feed(&mut parser, &[IAC, IAC, b'h', b'i', b'\n']);
        assert_eq!(cooked, vec![0xFF, b'h', b'i', b'\n']);
        assert!(events.is_empty());
    }

    #[test]
    fn will_do_events() {
        let mut parser = TelnetParser::new();
        let (cooked, events) = feed(
            &mut parser,
            &[IAC, WILL, TELOPT_TTYPE, b'x', IAC, DONT, TELOPT_MXP],
        );
        assert_eq!(cooked, b"x");
        assert_eq!(
            events,
            vec![
                TelnetEvent::Will(TELOPT_TTYPE),
                TelnetEvent::Dont(TELOPT_MXP)
            ]
        );
    }

    #[test]
    fn subnegotiation_with_escaped_iac() {
        let mut parser = TelnetParser::new();
        let (_, events) = feed(
            &mut parser,
            &[IAC, SB, TELOPT_GMCP, b'a', IAC, IAC, b'b', IAC, SE],
        );
        assert_eq!(
            events,
            vec![TelnetEvent::Subnegotiation(
                TELOPT_GMCP,
                vec![b'a', 0xFF, b'b']
            )]
        );
    }

    /// A subnegotiation split across reads reassembles.
    #[test]
    fn partial_reads_reassemble() {
        let mut parser = TelnetParser::new();
        let (_, events) = feed(&mut parser, &[IAC, SB, TELOPT_TTYPE, 0]);
        assert!(events.is_empty());
        let (_, events) = feed(&mut parser, b"MUDLET");
        assert!(events.is_empty());
        let (_, events) = feed(&mut parser, &[IAC, SE]);
        assert_eq!(
            events,
            vec![TelnetEvent::Subnegotiation(
                TELOPT_TTYPE,
                b"\x00MUDLET".to_vec()
            )]
        );
    }

    #[test]
    fn oversized_subnegotiation_discarded() {
        let mut parser = TelnetParser::new();
        let mut input = vec![IAC, SB, TELOPT_GMCP];
        input.extend(std::iter::repeat(b'x').take(SUBNEG_BUFFER_SIZE + 50));
        input.extend([IAC, SE]);
        let (_, events) = feed(&mut parser, &input);
        assert!(events.is_empty());

        // The parser recovers for the next frame.
        let (_, events) = feed(&mut parser, &[IAC, SB, TELOPT_GMCP, b'o', b'k', IAC, SE]);
        assert_eq!(
            events,
            vec![TelnetEvent::Subnegotiation(TELOPT_GMCP, b"ok".to_vec())]
        );
    }

    #[test]
    fn unknown_two_byte_commands_swallowed() {
        let mut parser = TelnetParser::new();
        // IAC GA mid-stream carries nothing.
        let (cooked, events) = feed(&mut parser, &[b'a', IAC, GA, b'b']);
        assert_eq!(cooked, b"ab");
        assert!(events.is_empty());
    }
}
