//! Hot-restart ("copyover"): re-exec the server binary while keeping
//! every client socket open.
//!
//! The initiating process writes one `<fd> <name> <host>` line per live
//! descriptor to `run/copyover.data`, forces synchronous saves, clears
//! close-on-exec on the sockets, and execs itself with a sentinel
//! argument naming the handoff file's fd. The new process re-wraps each
//! fd into a fresh descriptor in `CopyoverRecover`; characters reload
//! from persistence on the first input, never from the handoff file.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};

use crate::game_loop::Server;
use crate::net::descriptor::ConState;
use crate::net::negotiation;

#[cfg(unix)]
pub fn initiate(srv: &mut Server) -> Result<()> {
    use std::os::fd::AsRawFd;
    use std::os::unix::process::CommandExt;

    let path = srv.paths.copyover_file();
    let mut file = std::fs::File::create(&path)
        .with_context(|| format!("creating {}", path.display()))?;

    // Only playing descriptors survive; half-logged-in ones are closed.
    for id in srv.descriptors.ids() {
        let keep = srv
            .descriptors
            .get(id)
            .is_some_and(|desc| desc.state == ConState::Playing && desc.character.is_some());
        if !keep {
            srv.descriptors
                .write(id, "\r\nSorry, we are rebooting. Come back in a minute.\r\n");
            srv.close_descriptor(id);
            continue;
        }

        let ch_name = srv
            .descriptors
            .get(id)
            .and_then(|desc| desc.character)
            .and_then(|ch_id| srv.world.ch(ch_id))
            .map(|ch| ch.name.clone())
            .unwrap_or_default();

        if let Some(desc) = srv.descriptors.get_mut(id) {
            // A live MCCP stream cannot survive exec; finish it now.
            if desc.mccp.is_some() {
                desc.mccp_stop = true;
            }
            desc.write_text("\r\nA ripple passes through reality...\r\n");
            let _ = desc.flush();

            let fd = desc.stream.as_raw_fd();
            writeln!(file, "{fd} {ch_name} {}", desc.host)?;

            // The socket must outlive exec.
            unsafe {
                let flags = libc::fcntl(fd, libc::F_GETFD);
                if flags >= 0 {
                    libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC);
                }
            }
        }
    }
    file.flush()?;

    // Synchronous saves: nothing may be in flight across exec.
    for ch_id in srv.world.char_list.clone() {
        let is_pc = srv.world.ch(ch_id).is_some_and(|ch| !ch.is_npc());
        if is_pc {
            srv.save_player(ch_id);
        }
    }
    srv.saver.wait_pending();
    crate::db::save_all_areas(&srv.world, &srv.paths.db_areas);

    // Reopen the handoff file as an inheritable fd for the child.
    let handoff = std::fs::File::open(&path)?;
    let handoff_fd = handoff.as_raw_fd();
    unsafe {
        let flags = libc::fcntl(handoff_fd, libc::F_GETFD);
        if flags >= 0 {
            libc::fcntl(handoff_fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC);
        }
    }

    let exe = std::env::current_exe().context("locating executable for exec")?;
    log::info!("copyover: exec {} copyover {handoff_fd}", exe.display());

    // On success exec never returns; keep the file open across it.
    let err = std::process::Command::new(exe)
        .arg("copyover")
        .arg(handoff_fd.to_string())
        .arg(srv.port.to_string())
        .exec();
    drop(handoff);
    Err(err).context("exec for copyover failed")
}

#[cfg(not(unix))]
pub fn initiate(_srv: &mut Server) -> Result<()> {
    anyhow::bail!("copyover is not supported on this platform");
}

/// Rebuild descriptors from the handoff fd after exec. Returns the
/// number recovered; a missing or empty file means cold start.
#[cfg(unix)]
pub fn recover(srv: &mut Server, handoff_fd: i32) -> usize {
    use std::net::TcpStream;
    use std::os::fd::FromRawFd;

    // SAFETY: the fd was opened by the parent and named in our argv;
    // nothing else in this process owns it.
    let file = unsafe { std::fs::File::from_raw_fd(handoff_fd) };
    let reader = std::io::BufReader::new(file);

    let mut recovered = 0;
    for line in reader.lines() {
        let Ok(line) = line else { break };
        let mut parts = line.split_whitespace();
        let (Some(fd), Some(name), Some(host)) = (parts.next(), parts.next(), parts.next())
        else {
            log::warn!("malformed copyover line: {line:?}");
            continue;
        };
        let Ok(fd) = fd.parse::<i32>() else {
            log::warn!("bad fd in copyover line: {line:?}");
            continue;
        };

        // SAFETY: the parent recorded this fd as an open, inherited
        // client socket.
        let stream = unsafe { TcpStream::from_raw_fd(fd) };
        if stream.set_nonblocking(true).is_err() {
            log::warn!("stale socket for {name}; dropping");
            continue;
        }

        let id = srv.descriptors.insert(stream, host.to_string());
        if let Some(desc) = srv.descriptors.get_mut(id) {
            desc.state = ConState::CopyoverRecover;
            desc.login_name = name.to_string();
            negotiation::offer_burst(desc);
            desc.write_text("\r\nCopyover complete.\r\n[Hit Return to continue]\r\n");
        }
        log::info!("copyover: recovered {name}@{host} on fd {fd}");
        recovered += 1;
    }

    // Consumed exactly once.
    let path = srv.paths.copyover_file();
    if let Err(e) = std::fs::remove_file(&path) {
        log::warn!("could not delete {}: {e}", path.display());
    }

    recovered
}

#[cfg(not(unix))]
pub fn recover(_srv: &mut Server, _handoff_fd: i32) -> usize {
    0
}
