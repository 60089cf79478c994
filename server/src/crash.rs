//! Crash marker: a SIGSEGV handler that records the crash and the last
//! dispatched command, then lets the process die. No recovery is
//! attempted inside a corrupted process; operators restart externally.

use std::path::Path;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

const PATH_MAX: usize = 512;
const CMD_MAX: usize = 256;

// The handler may only touch pre-rendered bytes; both buffers are
// plain atomics so no lock can deadlock inside the signal.
static CRASH_PATH: [AtomicU8; PATH_MAX] = [const { AtomicU8::new(0) }; PATH_MAX];
static CRASH_PATH_LEN: AtomicUsize = AtomicUsize::new(0);
static LAST_COMMAND: [AtomicU8; CMD_MAX] = [const { AtomicU8::new(0) }; CMD_MAX];
static LAST_COMMAND_LEN: AtomicUsize = AtomicUsize::new(0);

/// Remember the command being dispatched; the crash handler writes it
/// into the marker file.
pub fn record_command(line: &str) {
    let bytes = line.as_bytes();
    let len = bytes.len().min(CMD_MAX);
    for (slot, &b) in LAST_COMMAND.iter().zip(bytes.iter().take(len)) {
        slot.store(b, Ordering::Relaxed);
    }
    LAST_COMMAND_LEN.store(len, Ordering::Relaxed);
}

/// Install the SIGSEGV/SIGBUS handler, pointed at `run/crash.txt`.
/// `signal_hook`'s safe registry refuses fault signals, so this goes
/// through `sigaction` directly.
#[cfg(unix)]
pub fn install(crash_file: &Path) {
    use std::os::unix::ffi::OsStrExt;

    let bytes = crash_file.as_os_str().as_bytes();
    let len = bytes.len().min(PATH_MAX - 1);
    for (slot, &b) in CRASH_PATH.iter().zip(bytes.iter().take(len)) {
        slot.store(b, Ordering::Relaxed);
    }
    CRASH_PATH_LEN.store(len, Ordering::Relaxed);

    // SAFETY: the handler only calls async-signal-safe libc functions
    // (open/write/close/_exit) and reads atomics.
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = on_crash as usize;
        action.sa_flags = 0;
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(libc::SIGSEGV, &action, std::ptr::null_mut()) != 0 {
            log::warn!("could not install SIGSEGV handler");
        }
        if libc::sigaction(libc::SIGBUS, &action, std::ptr::null_mut()) != 0 {
            log::warn!("could not install SIGBUS handler");
        }
    }
}

#[cfg(not(unix))]
pub fn install(_crash_file: &Path) {}

#[cfg(unix)]
extern "C" fn on_crash(_sig: libc::c_int) {
    let mut path = [0u8; PATH_MAX];
    let path_len = CRASH_PATH_LEN.load(Ordering::Relaxed).min(PATH_MAX - 1);
    for i in 0..path_len {
        path[i] = CRASH_PATH[i].load(Ordering::Relaxed);
    }

    unsafe {
        let fd = libc::open(
            path.as_ptr() as *const libc::c_char,
            libc::O_CREAT | libc::O_WRONLY | libc::O_TRUNC,
            0o644,
        );
        if fd >= 0 {
            let header = b"crashed; last command: ";
            libc::write(fd, header.as_ptr() as *const libc::c_void, header.len());

            let mut cmd = [0u8; CMD_MAX];
            let cmd_len = LAST_COMMAND_LEN.load(Ordering::Relaxed).min(CMD_MAX);
            for i in 0..cmd_len {
                cmd[i] = LAST_COMMAND[i].load(Ordering::Relaxed);
            }
            libc::write(fd, cmd.as_ptr() as *const libc::c_void, cmd_len);
            libc::write(fd, b"\n".as_ptr() as *const libc::c_void, 1);
            libc::close(fd);
        }
        libc::_exit(139);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_command_truncates() {
        let long = "x".repeat(CMD_MAX + 100);
        record_command(&long);
        assert_eq!(LAST_COMMAND_LEN.load(Ordering::Relaxed), CMD_MAX);

        record_command("kill rabbit");
        assert_eq!(LAST_COMMAND_LEN.load(Ordering::Relaxed), 11);
        let first = LAST_COMMAND[0].load(Ordering::Relaxed);
        assert_eq!(first, b'k');
    }
}
