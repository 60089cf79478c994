use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use signal_hook::consts::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;

use server::game_loop::Server;
use server::paths::GamePaths;
use server::{copyover, crash};

fn setup_signal_handling(
    quit_flag: Arc<AtomicBool>,
) -> (std::thread::JoinHandle<()>, signal_hook::iterator::Handle) {
    // Set up signal handling in a separate thread
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGQUIT, SIGHUP]).unwrap();
    let handle = signals.handle();

    let signal_thread = std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGINT | SIGTERM | SIGQUIT => {
                    if !quit_flag.load(Ordering::SeqCst) {
                        log::info!("Got signal to terminate. Shutdown initiated...");
                    } else {
                        log::info!("Alright, alright, I'm already terminating!");
                    }
                    quit_flag.store(true, Ordering::SeqCst);
                }
                _ => {
                    log::warn!("Received unsupported signal: {}", sig);
                }
            }
        }
    });

    (signal_thread, handle)
}

/// `server [port]` for a cold start, `server copyover <fd> [port]` when
/// re-exec'd by a hot restart.
struct Args {
    port: u16,
    copyover_fd: Option<i32>,
}

fn parse_args(args: &[String]) -> Args {
    let mut parsed = Args {
        port: core::constants::DEFAULT_PORT,
        copyover_fd: None,
    };
    let mut rest = &args[1..];
    if rest.first().map(String::as_str) == Some("copyover") {
        parsed.copyover_fd = rest.get(1).and_then(|fd| fd.parse().ok());
        rest = rest.get(2..).unwrap_or(&[]);
    }
    if let Some(port) = rest.first().and_then(|p| p.parse().ok()) {
        parsed.port = port;
    }
    parsed
}

fn main() -> Result<(), String> {
    let args: Vec<String> = std::env::args().collect();
    let args = parse_args(&args);

    let paths = GamePaths::from_exe().map_err(|e| format!("path setup failed: {e:#}"))?;

    let log_file = paths.new_log_file();
    core::initialize_logger(log::LevelFilter::Info, log_file.to_str()).unwrap_or_else(|e| {
        eprintln!("Failed to initialize logger: {}. Exiting.", e);
        process::exit(1);
    });

    log::info!("Starting Shattered Aldermoor server");
    log::info!("Process PID: {}", process::id());

    // A shutdown marker means "stay down" until an operator removes it.
    if paths.refuses_boot() {
        log::error!(
            "{} exists; refusing to boot. Remove it to re-enable.",
            paths.shutdown_file().display()
        );
        process::exit(1);
    }
    if paths.crash_file().exists() {
        log::warn!(
            "previous run crashed; see {}",
            paths.crash_file().display()
        );
    }

    crash::install(&paths.crash_file());

    let quit_flag = Arc::new(AtomicBool::new(false));
    let (signal_thread, handle) = setup_signal_handling(quit_flag.clone());

    let mut server = Server::new(paths, args.port);
    if let Err(e) = server.boot() {
        log::error!("boot failed: {e:#}");
        process::exit(1);
    }

    match args.copyover_fd {
        Some(fd) => {
            let recovered = copyover::recover(&mut server, fd);
            log::info!("copyover recovery: {recovered} connections re-attached");
        }
        None => log::info!("cold boot complete"),
    }

    log::info!("Entering main game loop...");
    while !quit_flag.load(Ordering::SeqCst) && !server.shutdown_requested {
        server.tick();

        if server.copyover_requested {
            server.copyover_requested = false;
            // On success this never returns.
            if let Err(e) = copyover::initiate(&mut server) {
                log::error!("copyover failed: {e:#}");
                server.broadcast("Copyover failed; play on.\r\n");
            }
        }
    }

    // An admin shutdown (not a signal) leaves the do-not-restart marker.
    if server.shutdown_requested {
        if let Err(e) = std::fs::write(server.paths.shutdown_file(), "shutdown by admin\n") {
            log::error!("could not write shutdown marker: {e}");
        }
    }

    log::info!("Shutdown signal received, exiting main loop...");
    server.shutdown();
    log::info!("Server shutdown complete.");

    handle.close();
    signal_thread.join().unwrap_or_else(|e| {
        log::error!("Failed to join signal handling thread: {:?}", e);
    });

    Ok(())
}
