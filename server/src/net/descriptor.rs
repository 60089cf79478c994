//! Per-connection descriptor: socket, buffers, negotiation state, and
//! the line extractor with its repeat-flood counter.

use std::net::TcpStream;
use std::sync::Arc;

use core::color::ColorMode;
use core::constants::{
    INPUT_BUFFER_SIZE, MAX_INPUT_LENGTH, REPEAT_KICK_THRESHOLD, REPEAT_WARN_THRESHOLD,
};
use core::telnet::MttsFlags;

use crate::world::types::{CharId, DescId};

use super::dns::DnsLookup;
use super::mccp::MccpStream;
use super::telnet::TelnetParser;

/// Pre-playing connection states. Note composition and the string
/// editor run as [`InputMode`]s layered over `Playing` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConState {
    DetectCaps,
    GetName,
    GetOldPassword,
    ConfirmNewName,
    GetNewPassword,
    ConfirmNewPassword,
    GetNewSex,
    GetNewExplevel,
    GetNewAnsi,
    ReadMotd,
    Playing,
    CopyoverRecover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Unknown,
    Ascii,
    Utf8,
}

/// Everything learned about the client during capability detection.
#[derive(Debug, Clone, Default)]
pub struct Caps {
    pub ttype_enabled: bool,
    pub ttype_round: u8,
    pub mtts: MttsFlags,
    pub client_name: String,
    pub terminal_type: String,

    pub naws_enabled: bool,
    pub width: u16,
    pub height: u16,

    pub charset: Charset,
    pub charset_negotiated: bool,

    pub gmcp_enabled: bool,
    pub mxp_enabled: bool,
    pub mccp_version: u8,

    /// ANSI color chosen at login (or implied by MTTS).
    pub ansi: bool,
    /// Client asked for IAC GA after prompts.
    pub send_ga: bool,
}

impl Caps {
    pub fn utf8(&self) -> bool {
        match self.charset {
            Charset::Utf8 => true,
            Charset::Ascii => false,
            // Undetermined: MTTS evidence, then the modern default.
            Charset::Unknown => {
                self.mtts.contains(MttsFlags::UTF8) || !self.charset_negotiated
            }
        }
    }

    pub fn color_mode(&self) -> ColorMode {
        if !self.ansi && !self.mtts.contains(MttsFlags::ANSI) {
            return ColorMode::None;
        }
        if self.mtts.contains(MttsFlags::TRUECOLOR) {
            ColorMode::TrueColor
        } else if self.mtts.contains(MttsFlags::COLORS_256) {
            ColorMode::Xterm256
        } else {
            ColorMode::Ansi
        }
    }

    pub fn screen_reader(&self) -> bool {
        self.mtts.contains(MttsFlags::SCREEN_READER)
    }
}

/// Long output held for page-at-a-time delivery.
pub struct Pager {
    pub lines: Vec<String>,
    pub offset: usize,
}

/// What an input mode did with a line.
pub enum ModeResult {
    /// Keep feeding lines to this mode.
    Continue,
    /// Mode finished; drop it.
    Done,
}

/// Where a finished input mode's product goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSink {
    /// Post to the note board.
    Note,
    /// Replace the character's description.
    Description,
}

/// A coroutine-style line consumer layered over the playing state: the
/// string editor and the note composer. Feed one line, maybe finish.
pub trait InputMode: Send {
    fn prompt(&self) -> String;
    fn feed(&mut self, line: &str) -> ModeResult;
    /// The finished artifact, if the mode produces one.
    fn take_result(&mut self) -> Option<String>;
}

pub struct Descriptor {
    pub id: DescId,
    pub stream: TcpStream,
    /// Numeric peer address until the DNS worker resolves a name.
    pub host: String,
    pub dns: Option<Arc<DnsLookup>>,

    pub state: ConState,
    pub character: Option<CharId>,
    /// Canonical name being logged in, set at the name prompt and used
    /// by the later login states and copyover recovery.
    pub login_name: String,
    pub caps: Caps,

    pub parser: TelnetParser,
    /// Cooked text bytes awaiting line extraction.
    pub inbuf: Vec<u8>,
    inlast: String,
    repeat: u32,

    pub outbuf: Vec<u8>,
    /// Final wire bytes awaiting a socket write; a short write leaves
    /// its suffix here for the next pulse.
    pub wire_buf: Vec<u8>,
    pub mccp: Option<MccpStream>,
    /// Compression accepted; the output flush starts the stream so the
    /// start marker is never itself compressed.
    pub mccp_start: Option<u8>,
    /// Client disabled compression; flush finishes the stream.
    pub mccp_stop: bool,
    pub snoop_by: Option<DescId>,
    pub pager: Option<Pager>,
    pub input_mode: Option<(InputSink, Box<dyn InputMode>)>,

    /// Pulses since accept; drives the capability-detection window.
    pub pulses: u64,
    /// A command was executed this pulse (prompt follows output).
    pub fcommand: bool,
    pub close_pending: bool,
    /// Last dispatched command, recorded for the crash log.
    pub last_command: String,
}

/// Outcome of the per-pulse line extraction.
#[derive(Debug, PartialEq, Eq)]
pub enum LineResult {
    None,
    Line(String),
    FloodWarning(String),
    FloodKick,
}

impl Descriptor {
    pub fn new(id: DescId, stream: TcpStream, host: String) -> Self {
        Descriptor {
            id,
            stream,
            host,
            dns: None,
            state: ConState::DetectCaps,
            character: None,
            login_name: String::new(),
            caps: Caps::default(),
            parser: TelnetParser::new(),
            inbuf: Vec::new(),
            inlast: String::new(),
            repeat: 0,
            outbuf: Vec::new(),
            wire_buf: Vec::new(),
            mccp: None,
            mccp_start: None,
            mccp_stop: false,
            snoop_by: None,
            pager: None,
            input_mode: None,
            pulses: 0,
            fcommand: false,
            close_pending: false,
            last_command: String::new(),
        }
    }

    /// Queue protocol bytes verbatim, bypassing color rendering.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.outbuf.extend_from_slice(bytes);
    }

    /// Append cooked bytes, enforcing the raw buffer bound. Overflow
    /// truncates at a line boundary rather than closing the link.
    pub fn push_cooked(&mut self, bytes: &[u8]) {
        if self.inbuf.len() + bytes.len() > INPUT_BUFFER_SIZE {
            let room = INPUT_BUFFER_SIZE.saturating_sub(self.inbuf.len());
            self.inbuf.extend_from_slice(&bytes[..room]);
            self.inbuf.push(b'\n');
        } else {
            self.inbuf.extend_from_slice(bytes);
        }
    }

    /// Pull at most one line from the cooked buffer. An unterminated
    /// suffix stays for the next read; a line longer than the input
    /// limit is truncated and delivered (without advancing the flood
    /// counter). Identical repeats past the threshold warn, then kick.
    pub fn read_line(&mut self) -> LineResult {
        // Find a terminator; bail if none and the buffer is not full.
        let term = self.inbuf.iter().position(|&b| b == b'\r' || b == b'\n');
        let (raw, consumed, truncated) = match term {
            Some(pos) => {
                // CRLF and LFCR both consume the pair.
                let mut end = pos + 1;
                if self.inbuf.len() > end
                    && (self.inbuf[end] == b'\r' || self.inbuf[end] == b'\n')
                    && self.inbuf[end] != self.inbuf[pos]
                {
                    end += 1;
                }
                (self.inbuf[..pos].to_vec(), end, false)
            }
            None if self.inbuf.len() >= MAX_INPUT_LENGTH => {
                (self.inbuf[..MAX_INPUT_LENGTH].to_vec(), MAX_INPUT_LENGTH, true)
            }
            None => return LineResult::None,
        };
        self.inbuf.drain(..consumed);

        // Strip other control bytes; keep printable ASCII and UTF-8.
        let line: Vec<u8> = raw
            .into_iter()
            .filter(|&b| b == 0xFF || b >= 0x20 || b == b'\t')
            .collect();
        let line = String::from_utf8_lossy(&line[..line.len().min(MAX_INPUT_LENGTH)])
            .into_owned();

        if truncated {
            // Forced delivery of an overlong line does not count toward
            // the flood counter.
            return LineResult::Line(line);
        }

        // Repeat-flood defense: byte-identical lines, no normalization.
        if !line.is_empty() && line == self.inlast {
            self.repeat += 1;
            if self.repeat >= REPEAT_KICK_THRESHOLD {
                return LineResult::FloodKick;
            }
            if self.repeat == REPEAT_WARN_THRESHOLD {
                return LineResult::FloodWarning(line);
            }
        } else {
            self.repeat = 0;
            self.inlast = line.clone();
        }

        LineResult::Line(line)
    }
}

#[cfg(test)]
pub mod tests_support {
    use super::*;
    use std::net::{TcpListener, TcpStream};

    /// A descriptor over a loopback pair, for negotiation/output tests.
    /// The peer half is leaked so writes never hit a closed socket.
    pub fn test_descriptor() -> Descriptor {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let stream = TcpStream::connect(addr).unwrap();
        stream.set_nonblocking(true).unwrap();
        let (accepted, _) = listener.accept().unwrap();
        std::mem::forget(accepted);
        Descriptor::new(DescId(0), stream, "127.0.0.1".into())
    }
}

#[cfg(test)]
mod tests {
    use super::tests_support::test_descriptor as test_desc;
    use super::*;

    #[test]
    fn one_line_per_call() {
        let mut desc = test_desc();
        desc.push_cooked(b"north\r\nsouth\r\n");
        assert_eq!(desc.read_line(), LineResult::Line("north".into()));
        assert_eq!(desc.read_line(), LineResult::Line("south".into()));
        assert_eq!(desc.read_line(), LineResult::None);
    }

    #[test]
    fn partial_line_waits() {
        let mut desc = test_desc();
        desc.push_cooked(b"nor");
        assert_eq!(desc.read_line(), LineResult::None);
        desc.push_cooked(b"th\n");
        assert_eq!(desc.read_line(), LineResult::Line("north".into()));
    }

    #[test]
    fn crlf_and_bare_lf_both_terminate() {
        let mut desc = test_desc();
        desc.push_cooked(b"a\r\nb\nc\r");
        assert_eq!(desc.read_line(), LineResult::Line("a".into()));
        assert_eq!(desc.read_line(), LineResult::Line("b".into()));
        assert_eq!(desc.read_line(), LineResult::Line("c".into()));
    }

    #[test]
    fn overlong_line_truncated_and_delivered() {
        let mut desc = test_desc();
        let long = vec![b'x'; MAX_INPUT_LENGTH + 50];
        desc.push_cooked(&long);
        match desc.read_line() {
            LineResult::Line(line) => assert_eq!(line.len(), MAX_INPUT_LENGTH),
            other => panic!("expected line, got {other:?}"),
        }
        // The repeat counter did not advance.
        assert_eq!(desc.repeat, 0);
    }

    #[test]
    fn flood_warns_then_kicks() {
        let mut desc = test_desc();
        let mut warned = false;
        for i in 0..REPEAT_KICK_THRESHOLD + 2 {
            desc.push_cooked(b"kill rabbit\n");
            match desc.read_line() {
                LineResult::Line(_) => {}
                LineResult::FloodWarning(_) => warned = true,
                LineResult::FloodKick => {
                    assert!(warned, "kick before warning at iteration {i}");
                    return;
                }
                LineResult::None => panic!("line lost"),
            }
        }
        panic!("never kicked");
    }

    #[test]
    fn different_line_resets_flood_counter() {
        let mut desc = test_desc();
        for _ in 0..REPEAT_WARN_THRESHOLD - 2 {
            desc.push_cooked(b"n\n");
            desc.read_line();
        }
        desc.push_cooked(b"look\n");
        desc.read_line();
        assert_eq!(desc.repeat, 0);
    }

    #[test]
    fn literal_iac_survives_into_line() {
        let mut desc = test_desc();
        desc.push_cooked(&[0xFF, b'h', b'i', b'\n']);
        match desc.read_line() {
            LineResult::Line(line) => {
                // 0xFF is not valid UTF-8 alone; it maps to U+FFFD but
                // the text survives.
                assert!(line.ends_with("hi"));
            }
            other => panic!("expected line, got {other:?}"),
        }
    }
}
