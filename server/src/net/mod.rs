//! Connection layer: the descriptor set, the accept path, and reads.

pub mod descriptor;
pub mod dns;
pub mod mccp;
pub mod modes;
pub mod negotiation;
pub mod output;
pub mod telnet;

use std::io::Read;
use std::net::{TcpListener, TcpStream};

use core::constants::ACCEPTS_PER_PULSE;

use crate::world::types::{Arena, DescId};

use descriptor::Descriptor;
use telnet::TelnetEvent;

pub struct Descriptors {
    arena: Arena<Descriptor>,
    /// Accept order; command dispatch iterates deterministically.
    pub order: Vec<DescId>,
}

impl Descriptors {
    pub fn new() -> Self {
        Descriptors {
            arena: Arena::new(),
            order: Vec::new(),
        }
    }

    pub fn insert(&mut self, stream: TcpStream, host: String) -> DescId {
        // The id must be final before the descriptor exists, so reserve
        // the slot with a placeholder-free two-step insert.
        let id = DescId(self.arena.insert(Descriptor::new(
            DescId(u32::MAX),
            stream,
            host,
        )));
        if let Some(desc) = self.arena.get_mut(id.0) {
            desc.id = id;
        }
        self.order.push(id);
        id
    }

    pub fn get(&self, id: DescId) -> Option<&Descriptor> {
        self.arena.get(id.0)
    }

    pub fn get_mut(&mut self, id: DescId) -> Option<&mut Descriptor> {
        self.arena.get_mut(id.0)
    }

    pub fn remove(&mut self, id: DescId) -> Option<Descriptor> {
        self.order.retain(|&d| d != id);
        // Anyone snooping this descriptor loses the tap.
        for (_, other) in self.arena.iter_mut() {
            if other.snoop_by == Some(id) {
                other.snoop_by = None;
            }
        }
        let desc = self.arena.remove(id.0);
        if let Some(desc) = &desc {
            if let Some(dns) = &desc.dns {
                dns.abandon();
            }
        }
        desc
    }

    pub fn ids(&self) -> Vec<DescId> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Game text to one descriptor, mirrored to its snooper.
    pub fn write(&mut self, id: DescId, text: &str) {
        let snooper = match self.arena.get_mut(id.0) {
            Some(desc) => {
                desc.write_text(text);
                desc.snoop_by
            }
            None => return,
        };
        if let Some(snooper) = snooper {
            if let Some(snoop_desc) = self.arena.get_mut(snooper.0) {
                snoop_desc.write_text(text);
            }
        }
    }

    /// Poll finished DNS lookups and adopt resolved names.
    pub fn poll_dns(&mut self) {
        for (_, desc) in self.arena.iter_mut() {
            let resolved = desc.dns.as_ref().and_then(|dns| dns.take_result());
            if let Some(name) = resolved {
                log::info!("resolved {} -> {}", desc.host, name);
                desc.host = name;
                desc.dns = None;
            }
        }
    }
}

impl Default for Descriptors {
    fn default() -> Self {
        Self::new()
    }
}

/// Accept pending connections, bounded per pulse. Each new descriptor
/// starts in capability detection with its offer burst already queued
/// and a DNS lookup in flight.
pub fn accept_new(listener: &TcpListener, descriptors: &mut Descriptors) -> Vec<DescId> {
    let mut accepted = Vec::new();
    for _ in 0..ACCEPTS_PER_PULSE {
        match listener.accept() {
            Ok((stream, addr)) => {
                if let Err(e) = stream.set_nonblocking(true) {
                    log::error!("set_nonblocking on new connection: {e}");
                    continue;
                }
                let _ = stream.set_nodelay(true);
                let id = descriptors.insert(stream, addr.ip().to_string());
                if let Some(desc) = descriptors.get_mut(id) {
                    desc.dns = Some(dns::spawn_lookup(addr));
                    negotiation::offer_burst(desc);
                }
                log::info!("new connection from {}", addr);
                accepted.push(id);
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
            Err(e) => {
                log::warn!("accept failed: {e}");
                break;
            }
        }
    }
    accepted
}

/// Outcome of a per-pulse descriptor read.
pub enum ReadOutcome {
    Ok,
    /// Peer closed or errored; tear the descriptor down at pulse end.
    Closed,
}

/// Non-blocking read: drain what the socket has, run the telnet parser,
/// apply negotiation events. EAGAIN is simply "nothing this pulse".
pub fn read_descriptor(desc: &mut Descriptor) -> ReadOutcome {
    let mut buf = [0u8; 2048];
    loop {
        match desc.stream.read(&mut buf) {
            Ok(0) => return ReadOutcome::Closed,
            Ok(n) => {
                let mut cooked = Vec::with_capacity(n);
                let events: Vec<TelnetEvent> = desc.parser.push(&buf[..n], &mut cooked);
                desc.push_cooked(&cooked);
                for event in events {
                    negotiation::handle_event(desc, event);
                }
                if n < buf.len() {
                    return ReadOutcome::Ok;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return ReadOutcome::Ok,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::debug!("read error from {}: {e}", desc.host);
                return ReadOutcome::Closed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn loopback_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn read_parses_and_banks_lines() {
        let (mut client, server) = loopback_pair();
        server.set_nonblocking(true).unwrap();
        let mut descriptors = Descriptors::new();
        let id = descriptors.insert(server, "127.0.0.1".into());

        client.write_all(b"look\r\n").unwrap();
        client.flush().unwrap();
        // Give loopback a moment.
        std::thread::sleep(std::time::Duration::from_millis(20));

        let desc = descriptors.get_mut(id).unwrap();
        assert!(matches!(read_descriptor(desc), ReadOutcome::Ok));
        assert_eq!(
            desc.read_line(),
            super::descriptor::LineResult::Line("look".into())
        );
    }

    #[test]
    fn closed_peer_reports_closed() {
        let (client, server) = loopback_pair();
        server.set_nonblocking(true).unwrap();
        let mut descriptors = Descriptors::new();
        let id = descriptors.insert(server, "127.0.0.1".into());
        drop(client);
        std::thread::sleep(std::time::Duration::from_millis(20));

        let desc = descriptors.get_mut(id).unwrap();
        assert!(matches!(read_descriptor(desc), ReadOutcome::Closed));
    }

    #[test]
    fn remove_clears_snoop_links() {
        let (_c1, s1) = loopback_pair();
        let (_c2, s2) = loopback_pair();
        let mut descriptors = Descriptors::new();
        let a = descriptors.insert(s1, "a".into());
        let b = descriptors.insert(s2, "b".into());
        descriptors.get_mut(b).unwrap().snoop_by = Some(a);

        descriptors.remove(a);
        assert_eq!(descriptors.get(b).unwrap().snoop_by, None);
        assert_eq!(descriptors.ids(), vec![b]);
    }

    #[test]
    fn snooped_output_is_mirrored() {
        let (_c1, s1) = loopback_pair();
        let (_c2, s2) = loopback_pair();
        let mut descriptors = Descriptors::new();
        let target = descriptors.insert(s1, "a".into());
        let spy = descriptors.insert(s2, "b".into());
        descriptors.get_mut(target).unwrap().snoop_by = Some(spy);

        descriptors.write(target, "secret plans");
        assert!(descriptors
            .get(spy)
            .unwrap()
            .outbuf
            .windows(12)
            .any(|w| w == b"secret plans"));
    }
}
