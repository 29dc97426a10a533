//! Time-driven backup of the position store.
//!
//! Long solver runs periodically snapshot the database and the
//! transposition table to sibling paths, so a crash loses at most one
//! period of work. Snapshots run under an exclusive flush lock: flush,
//! copy, release.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::info;

use crate::error::StoreError;
use crate::store::{PositionStore, StoreEntry};

/// Backup policy: where snapshots go and how often.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// Database snapshot path. `None` disables database backups.
    pub db_bak_filename: Option<PathBuf>,
    /// Delay before the first database backup.
    pub db_bak_start: Duration,
    /// Interval between database backups.
    pub db_bak_period: Duration,
    /// Transposition-table snapshot path. `None` disables table backups.
    pub tt_bak_filename: Option<PathBuf>,
    /// Delay before the first table backup.
    pub tt_bak_start: Duration,
    /// Interval between table backups.
    pub tt_bak_period: Duration,
}

impl Default for BackupConfig {
    fn default() -> BackupConfig {
        BackupConfig {
            db_bak_filename: None,
            db_bak_start: Duration::from_secs(60),
            db_bak_period: Duration::from_secs(600),
            tt_bak_filename: None,
            tt_bak_start: Duration::from_secs(60),
            tt_bak_period: Duration::from_secs(600),
        }
    }
}

/// Schedules and performs store snapshots.
pub struct BackupScheduler {
    config: BackupConfig,
    flush_lock: Mutex<()>,
    next_db: Mutex<Option<Instant>>,
    next_tt: Mutex<Option<Instant>>,
}

impl BackupScheduler {
    /// Create a scheduler; the first backups are due after the configured
    /// start delays.
    pub fn new(config: BackupConfig) -> BackupScheduler {
        let now = Instant::now();
        let next_db = config
            .db_bak_filename
            .as_ref()
            .map(|_| now + config.db_bak_start);
        let next_tt = config
            .tt_bak_filename
            .as_ref()
            .map(|_| now + config.tt_bak_start);
        BackupScheduler {
            config,
            flush_lock: Mutex::new(()),
            next_db: Mutex::new(next_db),
            next_tt: Mutex::new(next_tt),
        }
    }

    /// Replace the policy. Deadlines restart from now.
    pub fn reconfigure(&mut self, config: BackupConfig) {
        *self = BackupScheduler::new(config);
    }

    /// The current policy.
    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    fn db_due(&self) -> bool {
        let next = self.next_db.lock().expect("backup lock poisoned");
        next.is_some_and(|t| Instant::now() >= t)
    }

    fn tt_due(&self) -> bool {
        let next = self.next_tt.lock().expect("backup lock poisoned");
        next.is_some_and(|t| Instant::now() >= t)
    }

    /// Perform any backups that have come due. Returns whether one ran.
    pub fn maybe_backup<T: StoreEntry>(
        &self,
        store: &PositionStore<T>,
    ) -> Result<bool, StoreError> {
        let mut ran = false;
        if self.db_due() {
            self.backup_db(store)?;
            ran = true;
        }
        if self.tt_due() {
            self.backup_tt(store)?;
            ran = true;
        }
        Ok(ran)
    }

    /// Snapshot the database now, if a path is configured.
    pub fn backup_db<T: StoreEntry>(
        &self,
        store: &PositionStore<T>,
    ) -> Result<(), StoreError> {
        let Some(path) = &self.config.db_bak_filename else {
            return Ok(());
        };
        let _flush = self.flush_lock.lock().expect("flush lock poisoned");
        if let Some(db) = store.db() {
            db.flush()?;
            db.backup_to(path)?;
            info!(path = %path.display(), "database backed up");
        }
        *self.next_db.lock().expect("backup lock poisoned") =
            Some(Instant::now() + self.config.db_bak_period);
        Ok(())
    }

    /// Snapshot the transposition table now, if a path is configured.
    pub fn backup_tt<T: StoreEntry>(
        &self,
        store: &PositionStore<T>,
    ) -> Result<(), StoreError> {
        let Some(path) = &self.config.tt_bak_filename else {
            return Ok(());
        };
        let _flush = self.flush_lock.lock().expect("flush lock poisoned");
        store.tt().save(path)?;
        info!(path = %path.display(), "transposition table backed up");
        *self.next_tt.lock().expect("backup lock poisoned") =
            Some(Instant::now() + self.config.tt_bak_period);
        Ok(())
    }
}

impl std::fmt::Debug for BackupScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupScheduler")
            .field("config", &self.config)
            .finish()
    }
}
