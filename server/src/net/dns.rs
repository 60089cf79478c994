//! Reverse DNS on a worker thread.
//!
//! The accept path stores the numeric peer address immediately and
//! kicks off a detached lookup. The scheduler thread polls the shared
//! status each pulse and adopts the resolved name once `Done`. If the
//! descriptor dies first it flips the status to `Wait`; the worker then
//! marks `Closed` and the result is simply discarded.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStatus {
    /// Worker still resolving.
    Lookup,
    /// Result available.
    Done,
    /// Descriptor closed while the worker ran.
    Wait,
    /// Worker observed the close; nothing will read the result.
    Closed,
}

pub struct DnsLookup {
    pub status: Mutex<LookupStatus>,
    pub result: Mutex<Option<String>>,
}

impl DnsLookup {
    /// Main-thread poll: the resolved name, once, after `Done`.
    pub fn take_result(&self) -> Option<String> {
        let mut status = self.status.lock().unwrap();
        if *status != LookupStatus::Done {
            return None;
        }
        *status = LookupStatus::Closed;
        self.result.lock().unwrap().take()
    }

    /// Main-thread notice that the descriptor is gone.
    pub fn abandon(&self) {
        let mut status = self.status.lock().unwrap();
        if *status == LookupStatus::Lookup {
            *status = LookupStatus::Wait;
        }
    }
}

/// Resolve `addr` on a detached worker. Returns the shared state the
/// descriptor polls.
pub fn spawn_lookup(addr: SocketAddr) -> Arc<DnsLookup> {
    let lookup = Arc::new(DnsLookup {
        status: Mutex::new(LookupStatus::Lookup),
        result: Mutex::new(None),
    });

    let worker_state = Arc::clone(&lookup);
    let spawned = std::thread::Builder::new()
        .name("dns-lookup".into())
        .spawn(move || {
            let resolved = resolve(addr);
            let mut status = worker_state.status.lock().unwrap();
            match *status {
                LookupStatus::Lookup => {
                    *worker_state.result.lock().unwrap() = resolved;
                    *status = LookupStatus::Done;
                }
                // Closed while we were resolving; result is garbage now.
                _ => *status = LookupStatus::Closed,
            }
        });
    if spawned.is_err() {
        log::warn!("could not spawn dns worker; keeping numeric host");
        *lookup.status.lock().unwrap() = LookupStatus::Closed;
    }

    lookup
}

#[cfg(unix)]
fn resolve(addr: SocketAddr) -> Option<String> {
    use std::ffi::CStr;

    // NI_MAXHOST on every platform we run on.
    let mut host = [0 as libc::c_char; 1025];

    let result = match addr {
        SocketAddr::V4(v4) => {
            let sin = libc::sockaddr_in {
                sin_family: libc::AF_INET as libc::sa_family_t,
                sin_port: v4.port().to_be(),
                sin_addr: libc::in_addr {
                    s_addr: u32::from_ne_bytes(v4.ip().octets()),
                },
                sin_zero: [0; 8],
            };
            unsafe {
                libc::getnameinfo(
                    &sin as *const _ as *const libc::sockaddr,
                    std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
                    host.as_mut_ptr(),
                    host.len() as libc::socklen_t,
                    std::ptr::null_mut(),
                    0,
                    libc::NI_NAMEREQD,
                )
            }
        }
        SocketAddr::V6(v6) => {
            let sin6 = libc::sockaddr_in6 {
                sin6_family: libc::AF_INET6 as libc::sa_family_t,
                sin6_port: v6.port().to_be(),
                sin6_flowinfo: 0,
                sin6_addr: libc::in6_addr {
                    s6_addr: v6.ip().octets(),
                },
                sin6_scope_id: 0,
            };
            unsafe {
                libc::getnameinfo(
                    &sin6 as *const _ as *const libc::sockaddr,
                    std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t,
                    host.as_mut_ptr(),
                    host.len() as libc::socklen_t,
                    std::ptr::null_mut(),
                    0,
                    libc::NI_NAMEREQD,
                )
            }
        }
    };

    if result != 0 {
        return None;
    }
    let cstr = unsafe { CStr::from_ptr(host.as_ptr()) };
    cstr.to_str().ok().map(str::to_string)
}

#[cfg(not(unix))]
fn resolve(_addr: SocketAddr) -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abandoned_lookup_discards_result() {
        let lookup = Arc::new(DnsLookup {
            status: Mutex::new(LookupStatus::Lookup),
            result: Mutex::new(None),
        });
        lookup.abandon();
        assert_eq!(*lookup.status.lock().unwrap(), LookupStatus::Wait);

        // Worker finishing after the abandon marks Closed.
        {
            let mut status = lookup.status.lock().unwrap();
            if *status != LookupStatus::Lookup {
                *status = LookupStatus::Closed;
            }
        }
        assert!(lookup.take_result().is_none());
    }

    #[test]
    fn done_result_is_taken_once() {
        let lookup = DnsLookup {
            status: Mutex::new(LookupStatus::Done),
            result: Mutex::new(Some("host.example".into())),
        };
        assert_eq!(lookup.take_result(), Some("host.example".into()));
        assert_eq!(lookup.take_result(), None);
    }

    #[test]
    fn loopback_lookup_terminates() {
        // The worker must terminate regardless of resolver outcome.
        let lookup = spawn_lookup("127.0.0.1:3000".parse().unwrap());
        for _ in 0..200 {
            let status = *lookup.status.lock().unwrap();
            if status != LookupStatus::Lookup {
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        panic!("dns worker never finished");
    }
}
