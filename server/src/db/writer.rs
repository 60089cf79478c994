//! Background persistence thread for player saves and backups.
//!
//! The scheduler thread snapshots a player into an owned [`PlayerSave`]
//! and sends it here via an `mpsc` channel; this thread owns the
//! database connections and performs the writes. A pending counter
//! under one mutex/condvar pair lets shutdown block until every queued
//! save has hit disk, so no quit can lose data.

use std::path::PathBuf;
use std::sync::{mpsc, Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use super::player_db::{self, PlayerSave};

pub enum SaveJob {
    /// Write a full player snapshot to its database file.
    Player { path: PathBuf, save: PlayerSave },
    /// Byte-for-byte copy of a player file into the backup directory.
    Backup { src: PathBuf, dst: PathBuf },
    /// Stop the thread after draining the queue.
    Shutdown,
}

struct Pending {
    count: Mutex<usize>,
    zero: Condvar,
}

pub struct BackgroundSaver {
    tx: mpsc::Sender<SaveJob>,
    handle: Option<JoinHandle<()>>,
    pending: Arc<Pending>,
}

impl BackgroundSaver {
    /// Enqueue a player save. Falls back to a synchronous inline write
    /// if the writer thread is gone.
    pub fn save_player(&self, path: PathBuf, save: PlayerSave) {
        self.bump();
        if let Err(mpsc::SendError(job)) = self.tx.send(SaveJob::Player { path, save }) {
            log::error!("background saver unavailable, saving inline");
            if let SaveJob::Player { path, save } = job {
                if let Err(e) = player_db::save_to_path(&path, &save) {
                    log::error!("inline player save failed: {e:#}");
                }
            }
            self.done();
        }
    }

    /// Enqueue a backup copy of a player file.
    pub fn backup_player(&self, src: PathBuf, dst: PathBuf) {
        self.bump();
        if self.tx.send(SaveJob::Backup { src, dst }).is_err() {
            log::error!("background saver unavailable, skipping backup");
            self.done();
        }
    }

    fn bump(&self) {
        *self.pending.count.lock().unwrap() += 1;
    }

    fn done(&self) {
        let mut count = self.pending.count.lock().unwrap();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.pending.zero.notify_all();
        }
    }

    /// Block until every queued write has completed. Called on quit and
    /// before shutdown/copyover so nothing in flight is lost.
    pub fn wait_pending(&self) {
        let mut count = self.pending.count.lock().unwrap();
        while *count > 0 {
            count = self.pending.zero.wait(count).unwrap();
        }
    }

    pub fn pending_count(&self) -> usize {
        *self.pending.count.lock().unwrap()
    }

    /// Signal the thread to stop and join it. Safe to call twice.
    pub fn shutdown(&mut self) {
        self.wait_pending();
        let _ = self.tx.send(SaveJob::Shutdown);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.join() {
                log::error!("background saver thread panicked: {e:?}");
            }
        }
    }
}

impl Drop for BackgroundSaver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawn the writer thread and hand back its control handle.
pub fn spawn() -> BackgroundSaver {
    let (tx, rx) = mpsc::channel::<SaveJob>();
    let pending = Arc::new(Pending {
        count: Mutex::new(0),
        zero: Condvar::new(),
    });
    let pending_thread = Arc::clone(&pending);

    let handle = thread::Builder::new()
        .name("player-saver".into())
        .spawn(move || saver_thread_main(rx, pending_thread))
        .expect("Failed to spawn background saver thread");

    BackgroundSaver {
        tx,
        handle: Some(handle),
        pending,
    }
}

fn saver_thread_main(rx: mpsc::Receiver<SaveJob>, pending: Arc<Pending>) {
    log::info!("Background saver thread started.");

    let finish_one = |pending: &Pending| {
        let mut count = pending.count.lock().unwrap();
        *count = count.saturating_sub(1);
        if *count == 0 {
            pending.zero.notify_all();
        }
    };

    loop {
        let job = match rx.recv() {
            Ok(job) => job,
            Err(_) => break,
        };

        match job {
            SaveJob::Player { path, save } => {
                let t = std::time::Instant::now();
                match player_db::save_to_path(&path, &save) {
                    Ok(()) => log::debug!(
                        "background save: {} in {:.2?}",
                        save.name,
                        t.elapsed()
                    ),
                    Err(e) => log::error!(
                        "background save of {} failed: {e:#}",
                        path.display()
                    ),
                }
                finish_one(&pending);
            }
            SaveJob::Backup { src, dst } => {
                match std::fs::copy(&src, &dst) {
                    Ok(bytes) => log::debug!(
                        "backup: {} ({bytes} bytes)",
                        dst.display()
                    ),
                    Err(e) => log::error!(
                        "backup copy {} -> {} failed: {e}",
                        src.display(),
                        dst.display()
                    ),
                }
                finish_one(&pending);
            }
            SaveJob::Shutdown => break,
        }
    }

    log::info!("Background saver thread exiting.");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mud-saver-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn queued_save_lands_on_disk() {
        let dir = scratch("a");
        let path = dir.join("Queued.db");
        let _ = std::fs::remove_file(&path);

        let mut saver = spawn();
        let save = PlayerSave {
            name: "Queued".into(),
            level: 3,
            ..PlayerSave::default()
        };
        saver.save_player(path.clone(), save);
        saver.wait_pending();

        let loaded = player_db::load_player(&path).unwrap().unwrap();
        assert_eq!(loaded.name, "Queued");
        assert_eq!(loaded.level, 3);

        saver.shutdown();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn wait_pending_drains_backups_too() {
        let dir = scratch("b");
        let src = dir.join("Src.db");
        let dst = dir.join("Dst.db");
        std::fs::write(&src, b"player bytes").unwrap();

        let mut saver = spawn();
        saver.backup_player(src.clone(), dst.clone());
        saver.wait_pending();
        assert_eq!(std::fs::read(&dst).unwrap(), b"player bytes");
        assert_eq!(saver.pending_count(), 0);

        saver.shutdown();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn double_shutdown_is_harmless() {
        let mut saver = spawn();
        saver.shutdown();
        saver.shutdown();
    }
}
