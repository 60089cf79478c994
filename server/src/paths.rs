//! Executable-relative directory layout and runtime marker files.
//!
//! Everything the server reads or writes lives next to the executable:
//!
//! ```text
//! <base>/run/          shutdown.txt, crash.txt, copyover.data, uptime.dat
//! <base>/log/          YYYYMMDD-HHMMSS.log, one per startup
//! <base>/db/areas/     one .db per area
//! <base>/db/players/   one .db per player, backup/ subdir
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;

#[derive(Debug, Clone)]
pub struct GamePaths {
    pub base: PathBuf,
    pub run: PathBuf,
    pub log: PathBuf,
    pub db_areas: PathBuf,
    pub db_players: PathBuf,
    pub db_players_backup: PathBuf,
}

impl GamePaths {
    /// Resolve the layout from the running executable's location and
    /// create any missing directories.
    pub fn from_exe() -> Result<Self> {
        let exe = std::env::current_exe().context("cannot locate executable")?;
        let base = exe
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::at(&base)
    }

    /// Resolve the layout under an explicit base directory.
    pub fn at(base: &Path) -> Result<Self> {
        let base = base
            .canonicalize()
            .unwrap_or_else(|_| base.to_path_buf());
        let paths = GamePaths {
            run: base.join("run"),
            log: base.join("log"),
            db_areas: base.join("db").join("areas"),
            db_players: base.join("db").join("players"),
            db_players_backup: base.join("db").join("players").join("backup"),
            base,
        };
        for dir in [
            &paths.run,
            &paths.log,
            &paths.db_areas,
            &paths.db_players,
            &paths.db_players_backup,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(paths)
    }

    pub fn shutdown_file(&self) -> PathBuf {
        self.run.join("shutdown.txt")
    }

    pub fn crash_file(&self) -> PathBuf {
        self.run.join("crash.txt")
    }

    pub fn copyover_file(&self) -> PathBuf {
        self.run.join("copyover.data")
    }

    pub fn uptime_file(&self) -> PathBuf {
        self.run.join("uptime.dat")
    }

    /// One log file per startup, named by boot time.
    pub fn new_log_file(&self) -> PathBuf {
        self.log
            .join(Local::now().format("%Y%m%d-%H%M%S.log").to_string())
    }

    pub fn area_db(&self, stem: &str) -> PathBuf {
        self.db_areas.join(format!("{stem}.db"))
    }

    pub fn player_db(&self, name: &str) -> PathBuf {
        self.db_players
            .join(format!("{}.db", core::string_operations::capitalize(name)))
    }

    pub fn player_backup(&self, name: &str) -> PathBuf {
        self.db_players_backup
            .join(format!("{}.db", core::string_operations::capitalize(name)))
    }

    /// A shutdown marker present at boot means "do not restart": the
    /// operator must remove it before the server will come up again.
    pub fn refuses_boot(&self) -> bool {
        self.shutdown_file().exists()
    }

    pub fn write_uptime(&self) -> Result<()> {
        fs::write(
            self.uptime_file(),
            format!("{}\n", Local::now().format("%Y-%m-%d %H:%M:%S")),
        )
        .context("writing uptime file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mud-paths-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn creates_layout() {
        let base = scratch();
        fs::create_dir_all(&base).unwrap();
        let paths = GamePaths::at(&base).unwrap();
        assert!(paths.run.is_dir());
        assert!(paths.db_areas.is_dir());
        assert!(paths.db_players_backup.is_dir());
        fs::remove_dir_all(&base).unwrap();
    }

    #[test]
    fn shutdown_marker_refuses_boot() {
        let base = scratch();
        fs::create_dir_all(&base).unwrap();
        let paths = GamePaths::at(&base).unwrap();
        assert!(!paths.refuses_boot());
        fs::write(paths.shutdown_file(), "no restart\n").unwrap();
        assert!(paths.refuses_boot());
        fs::remove_dir_all(&base).unwrap();
    }

    #[test]
    fn player_db_name_is_canonical() {
        let base = scratch();
        fs::create_dir_all(&base).unwrap();
        let paths = GamePaths::at(&base).unwrap();
        assert!(paths
            .player_db("tEStChaR")
            .ends_with("db/players/Testchar.db"));
        fs::remove_dir_all(&base).unwrap();
    }
}
