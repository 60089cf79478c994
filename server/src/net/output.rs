//! Per-descriptor output: color rendering, prompt formatting, the
//! pager, and the flush path (transliteration, MCCP, non-blocking
//! socket writes with short-write retention).

use std::io::Write;

use core::color;
use core::constants::OUTPUT_HIGH_WATER;
use core::telnet::GO_AHEAD;
use core::utf8;

use crate::world::types::{CharId, Position};
use crate::world::World;

use super::descriptor::{ConState, Descriptor, Pager};
use super::mccp::{start_marker, MccpStream};

impl Descriptor {
    /// Queue game text: color escapes render against the client's
    /// capabilities.
    pub fn write_text(&mut self, text: &str) {
        let rendered = color::render(text, self.caps.color_mode());
        self.outbuf.extend_from_slice(rendered.as_bytes());
        if self.outbuf.len() > OUTPUT_HIGH_WATER {
            log::warn!("output overflow for {}; closing", self.host);
            self.close_pending = true;
        }
    }

    /// Long text goes through the pager: the first page immediately,
    /// the rest on Enter.
    pub fn show_paged(&mut self, text: &str) {
        let lines: Vec<String> = text.split('\n').map(|l| l.trim_end_matches('\r').to_string()).collect();
        let page = self.page_lines();
        if lines.len() <= page {
            self.write_text(text);
            return;
        }
        let mut pager = Pager { lines, offset: 0 };
        self.show_next_page(&mut pager);
        self.pager = Some(pager);
    }

    fn page_lines(&self) -> usize {
        let height = if self.caps.naws_enabled && self.caps.height > 4 {
            self.caps.height as usize
        } else {
            24
        };
        height - 2
    }

    fn show_next_page(&mut self, pager: &mut Pager) {
        let page = self.page_lines();
        let end = (pager.offset + page).min(pager.lines.len());
        let chunk = pager.lines[pager.offset..end].join("\r\n");
        self.write_text(&chunk);
        self.write_text("\r\n");
        pager.offset = end;
    }

    /// Feed one input line to an active pager. Returns false when no
    /// pager is active.
    pub fn pager_input(&mut self, line: &str) -> bool {
        let Some(mut pager) = self.pager.take() else {
            return false;
        };
        if line.trim().eq_ignore_ascii_case("q") {
            return true;
        }
        self.show_next_page(&mut pager);
        if pager.offset < pager.lines.len() {
            self.pager = Some(pager);
        }
        true
    }

    /// End-of-pulse output: pre-prompt newline, prompt, optional GA,
    /// then the wire flush.
    pub fn process_output(&mut self, world: &World) -> std::io::Result<()> {
        if self.fcommand && self.state == ConState::Playing {
            if self.pager.is_some() {
                self.write_text("\r\n[Hit Return to continue, q to stop]");
            } else if let Some(ch_id) = self.character {
                let prompt = render_prompt(world, ch_id);
                self.write_text("\r\n");
                self.write_text(&prompt);
            }
            if self.caps.send_ga {
                self.write_raw(&GO_AHEAD);
            }
            self.fcommand = false;
        }
        self.flush()
    }

    /// Move queued output onto the socket: degrade to ASCII when the
    /// client rejected UTF-8, run the MCCP stream transitions, compress,
    /// and write without blocking. A short write keeps the suffix for
    /// the next pulse.
    pub fn flush(&mut self) -> std::io::Result<()> {
        if !self.outbuf.is_empty() || self.mccp_start.is_some() || self.mccp_stop {
            let chunk = std::mem::take(&mut self.outbuf);
            let chunk = if self.caps.utf8() {
                chunk
            } else {
                utf8::transliterate(&chunk)
            };

            let mut wire = Vec::with_capacity(chunk.len() + 16);
            if self.mccp_stop {
                if let Some(mut stream) = self.mccp.take() {
                    stream.compress(&chunk, &mut wire);
                    wire.extend(stream.finish());
                    self.caps.mccp_version = 0;
                } else {
                    wire.extend_from_slice(&chunk);
                }
                self.mccp_stop = false;
                self.mccp_start = None;
            } else if let Some(stream) = self.mccp.as_mut() {
                stream.compress(&chunk, &mut wire);
            } else {
                wire.extend_from_slice(&chunk);
                if let Some(version) = self.mccp_start.take() {
                    // Everything after the marker is compressed.
                    wire.extend(start_marker(version));
                    self.mccp = Some(MccpStream::new(version));
                    self.caps.mccp_version = version;
                }
            }
            self.wire_buf.extend(wire);
        }

        if self.wire_buf.is_empty() {
            return Ok(());
        }

        match self.stream.write(&self.wire_buf) {
            // Zero bytes accepted is back-pressure, not a closed peer.
            Ok(0) => Ok(()),
            Ok(n) => {
                self.wire_buf.drain(..n);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Render a player's prompt template. `%h/%H %m/%M %v/%V` are
/// current/max vitals, `%x` experience, `%g` gold, `%r` room name,
/// `%f` fight target, `%%` a literal percent.
pub fn render_prompt(world: &World, ch_id: CharId) -> String {
    let Some(ch) = world.ch(ch_id) else {
        return String::new();
    };

    let template = ch
        .pcdata
        .as_ref()
        .map(|pcdata| {
            if ch.position == Position::Fighting && !pcdata.cprompt.is_empty() {
                pcdata.cprompt.clone()
            } else {
                pcdata.prompt.clone()
            }
        })
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "<%hhp %mm %vmv> ".to_string());

    let mut out = String::with_capacity(template.len() + 16);
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('h') => out.push_str(&ch.hit.to_string()),
            Some('H') => out.push_str(&ch.max_hit.to_string()),
            Some('m') => out.push_str(&ch.mana.to_string()),
            Some('M') => out.push_str(&ch.max_mana.to_string()),
            Some('v') => out.push_str(&ch.move_points.to_string()),
            Some('V') => out.push_str(&ch.max_move.to_string()),
            Some('x') => out.push_str(&ch.exp.to_string()),
            Some('g') => out.push_str(&ch.gold.to_string()),
            Some('r') => {
                if let Some(room) = ch.in_room {
                    out.push_str(&world.room(room).name);
                }
            }
            Some('f') => {
                let name = ch
                    .fighting
                    .and_then(|id| world.ch(id))
                    .map(|victim| victim.short_descr.clone())
                    .unwrap_or_default();
                out.push_str(&name);
            }
            Some('%') => out.push('%'),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::super::descriptor::tests_support::test_descriptor;
    use super::*;
    use crate::world::types::*;

    fn world_with_player() -> (World, CharId) {
        let mut world = World::new();
        world.areas.push(Area::default());
        let room = world
            .add_room(Room {
                vnum: 3001,
                area: AreaId(0),
                name: "Temple Square".into(),
                description: String::new(),
                room_flags: RoomFlags::empty(),
                sector_type: 0,
                exits: Default::default(),
                extra_descr: Vec::new(),
                people: Vec::new(),
                contents: Vec::new(),
                scripts: Vec::new(),
            })
            .unwrap();
        let ch = CharId(world.chars.insert(Character {
            name: "Bob".into(),
            hit: 80,
            max_hit: 100,
            mana: 40,
            max_mana: 50,
            move_points: 90,
            max_move: 120,
            gold: 7,
            exp: 1234,
            pcdata: Some(PcData::default()),
            ..Character::default()
        }));
        world.char_list.push(ch);
        world.char_to_room(ch, room);
        (world, ch)
    }

    #[test]
    fn prompt_substitutions() {
        let (mut world, ch) = world_with_player();
        world.ch_mut(ch).unwrap().pcdata.as_mut().unwrap().prompt =
            "[%h/%H %m/%M %v/%V %x %g %r 100%%] ".into();
        let prompt = render_prompt(&world, ch);
        assert_eq!(prompt, "[80/100 40/50 90/120 1234 7 Temple Square 100%] ");
    }

    #[test]
    fn default_prompt_when_unset() {
        let (world, ch) = world_with_player();
        assert_eq!(render_prompt(&world, ch), "<80hp 40m 90mv> ");
    }

    #[test]
    fn combat_prompt_used_while_fighting() {
        let (mut world, ch) = world_with_player();
        {
            let c = world.ch_mut(ch).unwrap();
            c.pcdata.as_mut().unwrap().prompt = "peace ".into();
            c.pcdata.as_mut().unwrap().cprompt = "war %h ".into();
            c.position = Position::Fighting;
        }
        assert_eq!(render_prompt(&world, ch), "war 80 ");
    }

    #[test]
    fn ascii_client_gets_transliterated_output() {
        let mut desc = test_descriptor();
        desc.caps.charset = super::super::descriptor::Charset::Ascii;
        desc.caps.charset_negotiated = true;
        desc.write_text("中文 room");
        desc.flush().unwrap();
        // Wire buffer may already be written; check nothing multi-byte
        // survived in either place.
        assert!(desc.outbuf.is_empty());
        assert!(desc.wire_buf.iter().all(|&b| b < 0x80));
    }

    #[test]
    fn overflow_flags_close() {
        let mut desc = test_descriptor();
        let big = "x".repeat(OUTPUT_HIGH_WATER + 1);
        desc.write_text(&big);
        assert!(desc.close_pending);
    }

    #[test]
    fn pager_splits_long_text() {
        let mut desc = test_descriptor();
        desc.caps.naws_enabled = true;
        desc.caps.height = 10;
        let text = (0..40)
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\r\n");
        desc.show_paged(&text);
        assert!(desc.pager.is_some());

        // Enter advances, q stops.
        assert!(desc.pager_input(""));
        assert!(desc.pager.is_some());
        assert!(desc.pager_input("q"));
        assert!(desc.pager.is_none());
    }
}
