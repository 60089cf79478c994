//! The pulse scheduler and the `Server` that owns everything.
//!
//! One thread, fixed-rate pulses: accept, read, dispatch, world update
//! phases in a fixed order, flush, periodic saves. The speed multiplier
//! divides the pulse period so every pulse-denominated timer scales
//! uniformly for accelerated testing.

use std::collections::HashMap;
use std::net::TcpListener;
use std::time::{Duration, Instant};

use core::constants::{
    LEVEL_IMPLEMENTOR, PULSE_AREA, PULSE_DB_DUMP, PULSE_MOBILE, PULSE_PER_SECOND, PULSE_SAVE,
    PULSE_TICK, PULSE_VIOLENCE,
};

use crate::commands;
use crate::db::{self, player_db, writer};
use crate::net::descriptor::{ConState, InputSink, LineResult, ModeResult};
use crate::net::{self, negotiation, Descriptors, ReadOutcome};
use crate::paths::GamePaths;
use crate::profiling::Profiler;
use crate::session;
use crate::world::types::{CharId, DescId, Position};
use crate::world::{reset, update, World};

const DEFAULT_MOTD: &str = "\
#CWelcome to Shattered Aldermoor.#n\r\n\
\r\n\
Be courteous; report bugs with the note command; the bell you hear in\r\n\
the distance means an area is about to repopulate.\r\n";

pub struct Server {
    pub paths: GamePaths,
    pub port: u16,
    pub listener: Option<TcpListener>,
    pub world: World,
    pub descriptors: Descriptors,
    pub saver: writer::BackgroundSaver,
    pub profiler: Profiler,

    pub pulse: u64,
    pub speed_multiplier: u64,
    next_pulse: Option<Instant>,

    pub wizlock: bool,
    pub bans: Vec<(String, String)>,
    pub disabled: HashMap<String, String>,
    pub notes: Vec<String>,
    pub motd: String,

    pub shutdown_requested: bool,
    pub copyover_requested: bool,
}

impl Server {
    pub fn new(paths: GamePaths, port: u16) -> Self {
        Server {
            paths,
            port,
            listener: None,
            world: World::new(),
            descriptors: Descriptors::new(),
            saver: writer::spawn(),
            profiler: Profiler::new(),
            pulse: 0,
            speed_multiplier: 1,
            next_pulse: None,
            wizlock: false,
            bans: Vec::new(),
            disabled: HashMap::new(),
            notes: Vec::new(),
            motd: DEFAULT_MOTD.to_string(),
            shutdown_requested: false,
            copyover_requested: false,
        }
    }

    /// Cold boot: load the world, run the initial population pass, bind
    /// the listen socket.
    pub fn boot(&mut self) -> anyhow::Result<()> {
        let epoch = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        update::boot_time(&mut self.world, epoch);

        let loaded = db::boot_load(&mut self.world, &self.paths.db_areas)?;

        // Initial population: every area resets exactly once before any
        // player can connect, sidestepping the deferred-reset logic.
        for area_id in loaded {
            reset::reset_area(&mut self.world, area_id);
            self.world.areas[area_id.index()].needs_reset = false;
        }

        let listener = TcpListener::bind(("0.0.0.0", self.port))?;
        listener.set_nonblocking(true)?;
        log::info!("listening on port {}", self.port);
        self.listener = Some(listener);

        self.paths.write_uptime()?;
        Ok(())
    }

    fn pulse_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / (PULSE_PER_SECOND * self.speed_multiplier.max(1)))
    }

    /// One scheduler pulse. Sleeps out the remainder of the previous
    /// pulse first, so calling this in a loop produces the fixed rate.
    pub fn tick(&mut self) {
        // The only suspension point: wait for the pulse boundary.
        let now = Instant::now();
        let deadline = self.next_pulse.unwrap_or(now);
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        self.next_pulse = Some(deadline.max(now) + self.pulse_period());

        self.pulse = self.pulse.wrapping_add(1);
        self.profiler.pulse_begin();

        {
            let _span = self.profiler.span("net accept");
            if let Some(listener) = self.listener.take() {
                net::accept_new(&listener, &mut self.descriptors);
                self.listener = Some(listener);
            }
        }
        self.descriptors.poll_dns();


        {
            let _span = self.profiler.span("net read");
            for id in self.descriptors.ids() {
                let Some(desc) = self.descriptors.get_mut(id) else {
                    continue;
                };
                desc.pulses += 1;
                match net::read_descriptor(desc) {
                    ReadOutcome::Ok => {}
                    ReadOutcome::Closed => desc.close_pending = true,
                }
            }
        }

        let started = Instant::now();
        for id in self.descriptors.ids() {
            self.dispatch_one(id);
        }
        self.profiler.record("dispatch", started.elapsed());

        self.run_update_phases();

        let started = Instant::now();
        for id in self.descriptors.ids() {
            let closed = {
                let Some(desc) = self.descriptors.get_mut(id) else {
                    continue;
                };
                desc.process_output(&self.world).is_err()
            };
            if closed {
                if let Some(desc) = self.descriptors.get_mut(id) {
                    desc.close_pending = true;
                }
            }
        }
        for id in self.descriptors.ids() {
            let close = self
                .descriptors
                .get(id)
                .is_some_and(|desc| desc.close_pending);
            if close {
                self.close_descriptor(id);
            }
        }
        self.profiler.record("net write", started.elapsed());

        if self.pulse % PULSE_SAVE == 0 {
            let started = Instant::now();
            self.autosave_players();
            self.profiler.record("player autosave", started.elapsed());
        }
        if self.pulse % PULSE_DB_DUMP == 0 {
            let _span = self.profiler.span("world save");
            db::save_all_areas(&self.world, &self.paths.db_areas);
        }

        self.profiler.pulse_end();
    }

    /// Route one pulse of input for a descriptor: capability window,
    /// wait-state, pager, input modes, the nanny, the interpreter.
    fn dispatch_one(&mut self, id: DescId) {
        let (state, has_mode, has_pager) = match self.descriptors.get(id) {
            Some(desc) => (desc.state, desc.input_mode.is_some(), desc.pager.is_some()),
            None => return,
        };

        if state == ConState::DetectCaps {
            // No input expected; close the window when it elapses. Any
            // early bytes also end it so eager clients aren't delayed.
            let ready = self
                .descriptors
                .get(id)
                .is_some_and(|desc| !desc.inbuf.is_empty() || negotiation::detection_complete(desc));
            if ready {
                session::finish_detection(self, id);
            }
            return;
        }

        // Wait-state: lagged characters spend the pulse, not a command.
        if state == ConState::Playing {
            if let Some(ch_id) = self.descriptors.get(id).and_then(|d| d.character) {
                let (wait, trust) = self
                    .world
                    .ch(ch_id)
                    .map(|ch| (ch.wait, ch.trust.max(ch.level)))
                    .unwrap_or((0, 0));
                if wait > 0 && trust < LEVEL_IMPLEMENTOR {
                    if let Some(ch) = self.world.ch_mut(ch_id) {
                        ch.wait -= 1;
                    }
                    return;
                }
            }
        }

        let line = match self.descriptors.get_mut(id) {
            Some(desc) => match desc.read_line() {
                LineResult::None => return,
                LineResult::Line(line) => line,
                LineResult::FloodWarning(line) => {
                    desc.write_text("\r\n#RStop hammering that key.#n\r\n");
                    line
                }
                LineResult::FloodKick => {
                    log::info!("flood kick: {}", desc.host);
                    desc.write_text("\r\nFlooding is rude. Goodbye.\r\n");
                    desc.close_pending = true;
                    return;
                }
            },
            None => return,
        };

        if let Some(desc) = self.descriptors.get_mut(id) {
            desc.fcommand = true;
            desc.last_command = line.clone();
        }
        crate::crash::record_command(&line);

        if has_pager {
            if let Some(desc) = self.descriptors.get_mut(id) {
                desc.pager_input(&line);
            }
            return;
        }

        if has_mode {
            self.feed_input_mode(id, &line);
            return;
        }

        match state {
            ConState::Playing => {
                let ch_id = self.descriptors.get(id).and_then(|d| d.character);
                match ch_id {
                    Some(ch_id) => {
                        if let Some(ch) = self.world.ch_mut(ch_id) {
                            ch.timer = 0;
                        }
                        commands::interpret(self, ch_id, &line);
                    }
                    None => self.close_descriptor(id),
                }
            }
            _ => session::nanny(self, id, &line),
        }
    }

    /// Feed a line to the descriptor's editor/composer mode.
    fn feed_input_mode(&mut self, id: DescId, line: &str) {
        let Some(desc) = self.descriptors.get_mut(id) else {
            return;
        };
        let Some((sink, mut mode)) = desc.input_mode.take() else {
            return;
        };
        match mode.feed(line) {
            ModeResult::Continue => {
                let prompt = mode.prompt();
                desc.input_mode = Some((sink, mode));
                desc.write_text(&prompt);
            }
            ModeResult::Done => {
                let ch_id = desc.character;
                match (sink, mode.take_result()) {
                    (InputSink::Note, Some(result)) => {
                        desc.write_text("Note posted.\r\n");
                        log::info!("note posted by {}", desc.login_name);
                        self.notes.push(result);
                    }
                    (InputSink::Description, Some(result)) => {
                        desc.write_text("Description set.\r\n");
                        if let Some(ch) =
                            ch_id.and_then(|ch_id| self.world.ch_mut(ch_id))
                        {
                            ch.description = result;
                        }
                    }
                    (_, None) => desc.write_text("Ok.\r\n"),
                }
            }
        }
    }

    /// The fixed-order world update phases.
    fn run_update_phases(&mut self) {
        if self.pulse % PULSE_VIOLENCE == 0 {
            let _span = self.profiler.span("violence");
            update::violence_update(&mut self.world);
        }
        if self.pulse % PULSE_MOBILE == 0 {
            let _span = self.profiler.span("mobile ai");
            update::aggro_update(&mut self.world);
        }
        if self.pulse % PULSE_TICK == 0 {
            let weather = {
                let _span = self.profiler.span("weather");
                update::weather_update(&mut self.world)
            };
            for message in weather {
                self.broadcast(&format!("#B{message}#n\r\n"));
            }

            let events = {
                let _span = self.profiler.span("char update");
                update::char_update(&mut self.world)
            };
            self.deliver(events.messages);
            for ch_id in events.idle_out {
                let name = self
                    .world
                    .ch(ch_id)
                    .map(|ch| ch.name.clone())
                    .unwrap_or_default();
                log::info!("{name} idled out while link-dead");
                self.save_player(ch_id);
                self.world.extract_char(ch_id, true);
            }

            let events = {
                let _span = self.profiler.span("obj update");
                update::obj_update(&mut self.world)
            };
            self.deliver(events.messages);

            let events = {
                let _span = self.profiler.span("affects");
                update::affect_update(&mut self.world)
            };
            self.deliver(events.messages);
        }
        if self.pulse % PULSE_AREA == 0 {
            let started = Instant::now();
            let bells = reset::area_update(&mut self.world);
            for area_id in bells {
                let listeners: Vec<CharId> = self.world.areas[area_id.index()]
                    .rooms
                    .iter()
                    .flat_map(|&room| self.world.room(room).people.clone())
                    .collect();
                for ch_id in listeners {
                    let awake = self
                        .world
                        .ch(ch_id)
                        .is_some_and(|ch| !ch.is_npc() && ch.position > Position::Sleeping);
                    if awake {
                        self.send_to_char(
                            ch_id,
                            "You hear the sound of a bell in the distance.\r\n",
                        );
                    }
                }
            }
            self.profiler.record("area update", started.elapsed());
        }
    }

    fn deliver(&mut self, messages: Vec<(CharId, String)>) {
        for (ch_id, message) in messages {
            self.send_to_char(ch_id, &message);
            self.send_to_char(ch_id, "\r\n");
        }
    }

    pub fn send_to_char(&mut self, ch_id: CharId, text: &str) {
        let Some(desc_id) = self.world.ch(ch_id).and_then(|ch| ch.desc) else {
            return;
        };
        self.descriptors.write(desc_id, text);
    }

    /// To every playing descriptor.
    pub fn broadcast(&mut self, text: &str) {
        for id in self.descriptors.ids() {
            let playing = self
                .descriptors
                .get(id)
                .is_some_and(|desc| desc.state == ConState::Playing);
            if playing {
                self.descriptors.write(id, text);
            }
        }
    }

    /// Snapshot and enqueue a player save plus its backup copy.
    /// Returns false for NPCs and the unsaveable.
    pub fn save_player(&mut self, ch_id: CharId) -> bool {
        let Some(save) = player_db::snapshot_player(&self.world, ch_id) else {
            return false;
        };
        if save.name.is_empty() {
            return false;
        }
        let path = self.paths.player_db(&save.name);
        let backup = self.paths.player_backup(&save.name);
        self.saver.save_player(path.clone(), save);
        self.saver.backup_player(path, backup);
        true
    }

    fn autosave_players(&mut self) {
        for ch_id in self.world.char_list.clone() {
            let is_pc = self.world.ch(ch_id).is_some_and(|ch| !ch.is_npc());
            if is_pc {
                self.save_player(ch_id);
            }
        }
    }

    /// Tear a descriptor down at end of pulse. A playing character goes
    /// link-dead rather than being extracted; a pre-playing provisional
    /// character is freed.
    pub fn close_descriptor(&mut self, id: DescId) {
        let (state, ch_id, host) = match self.descriptors.get(id) {
            Some(desc) => (desc.state, desc.character, desc.host.clone()),
            None => return,
        };

        match (state, ch_id) {
            (ConState::Playing, Some(ch_id)) => {
                if let Some(ch) = self.world.ch_mut(ch_id) {
                    ch.desc = None;
                    ch.timer = 0;
                }
                let name = self
                    .world
                    .ch(ch_id)
                    .map(|ch| ch.name.clone())
                    .unwrap_or_default();
                log::info!("{name}@{host} has lost the link");
                crate::act::act(
                    &self.world,
                    &mut self.descriptors,
                    "$n has lost $s link.",
                    ch_id,
                    crate::act::ActArgs::default(),
                    crate::act::ActTarget::ToRoom,
                );
            }
            (_, Some(ch_id)) => {
                // Mid-creation or mid-MOTD: the provisional character
                // and anything it was holding die with the link.
                self.world.extract_char(ch_id, true);
            }
            _ => {}
        }

        if let Some(mut desc) = self.descriptors.remove(id) {
            let _ = desc.flush();
        }
        log::info!("closed connection from {host}");
    }

    /// Drain pending saves and close every socket; the end of the
    /// process lifecycle.
    pub fn shutdown(&mut self) {
        log::info!(
            "shutting down: saving {} characters",
            self.world.char_list.len()
        );
        for ch_id in self.world.char_list.clone() {
            let is_pc = self.world.ch(ch_id).is_some_and(|ch| !ch.is_npc());
            if is_pc {
                self.save_player(ch_id);
            }
        }
        db::save_all_areas(&self.world, &self.paths.db_areas);
        self.saver.wait_pending();
        for id in self.descriptors.ids() {
            self.descriptors
                .write(id, "The world dissolves around you.\r\n");
            self.close_descriptor(id);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::tests_support::*;
    use super::*;

    #[test]
    fn interpret_unknown_command_says_huh() {
        let (mut srv, ch) = test_server_with_player();
        commands::interpret(&mut srv, ch, "frobnicate");
        let out = drain_output(&mut srv, ch);
        assert!(out.contains("Huh?"));
    }

    #[test]
    fn alias_expansion_is_single_shot() {
        let (mut srv, ch) = test_server_with_player();
        // An alias whose expansion begins with itself must not recurse.
        commands::do_alias(&mut srv, ch, "say say again");
        drain_output(&mut srv, ch);
        commands::interpret(&mut srv, ch, "say hello");
        let out = drain_output(&mut srv, ch);
        assert!(out.contains("You say 'again hello'"), "got: {out}");
    }

    #[test]
    fn disabled_command_short_circuits() {
        let (mut srv, ch) = test_server_with_player();
        srv.disabled.insert("say".into(), "Morgan".into());
        commands::interpret(&mut srv, ch, "say hi");
        let out = drain_output(&mut srv, ch);
        assert!(out.contains("disabled by Morgan"));
    }

    #[test]
    fn position_gate_blocks_sleepers() {
        let (mut srv, ch) = test_server_with_player();
        srv.world.ch_mut(ch).unwrap().position = Position::Sleeping;
        commands::interpret(&mut srv, ch, "north");
        let out = drain_output(&mut srv, ch);
        assert!(out.contains("In your dreams"));
    }

    #[test]
    fn trust_gate_hides_staff_commands() {
        let (mut srv, ch) = test_server_with_player();
        srv.world.ch_mut(ch).unwrap().trust = 0;
        srv.world.ch_mut(ch).unwrap().level = 3;
        commands::interpret(&mut srv, ch, "shutdown");
        let out = drain_output(&mut srv, ch);
        assert!(out.contains("Huh?"));
        assert!(!srv.shutdown_requested);
    }

    #[test]
    fn close_while_playing_goes_linkdead() {
        let (mut srv, ch) = test_server_with_player();
        let desc_id = srv.world.ch(ch).unwrap().desc.unwrap();
        srv.close_descriptor(desc_id);
        let body = srv.world.ch(ch).unwrap();
        assert!(body.desc.is_none());
        assert!(body.in_room.is_some(), "link-dead body stays in world");
    }

    #[test]
    fn wait_state_consumes_pulses() {
        let (mut srv, ch) = test_server_with_player();
        srv.world.ch_mut(ch).unwrap().trust = 0;
        srv.world.ch_mut(ch).unwrap().wait = 2;
        let desc_id = srv.world.ch(ch).unwrap().desc.unwrap();
        srv.descriptors
            .get_mut(desc_id)
            .unwrap()
            .push_cooked(b"say trapped\n");

        srv.dispatch_one(desc_id);
        assert_eq!(srv.world.ch(ch).unwrap().wait, 1);
        srv.dispatch_one(desc_id);
        assert_eq!(srv.world.ch(ch).unwrap().wait, 0);
        // Lag spent: the buffered command now runs.
        srv.dispatch_one(desc_id);
        let out = drain_output(&mut srv, ch);
        assert!(out.contains("You say 'trapped'"));
    }

    #[test]
    fn speed_multiplier_shortens_pulse() {
        let (mut srv, _ch) = test_server_with_player();
        let slow = srv.pulse_period();
        srv.speed_multiplier = 8;
        assert_eq!(srv.pulse_period(), slow / 8);
    }
}
