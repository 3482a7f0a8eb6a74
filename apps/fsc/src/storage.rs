//! # Session Storage
//!
//! Two backends hold the same encoded snapshot:
//! - `file`: the binary snapshot written to a flat file
//! - `redb`: one row in a redb database (ACID, crash safe)

use crate::error::{CliError, CliResult};
use fsc_core::{Session, decode_snapshot, encode_snapshot};
use redb::{Database, ReadableDatabase, TableDefinition};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Session table: session key -> encoded snapshot.
const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

/// Key of the session held by a database.
const SESSION_KEY: &str = "current";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backend {
    #[default]
    File,
    Redb,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::File => "file",
            Backend::Redb => "redb",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = CliError;

    fn from_str(s: &str) -> CliResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(Backend::File),
            "redb" => Ok(Backend::Redb),
            other => Err(CliError::usage(format!(
                "unknown backend '{}' (expected file or redb)",
                other
            ))),
        }
    }
}

/// Create an empty store holding `session`.
pub fn create(path: &Path, backend: Backend, session: &Session) -> CliResult<()> {
    if backend == Backend::Redb && path.exists() {
        std::fs::remove_file(path)?;
    }
    save(path, backend, session)
}

/// Load the stored session, or `None` if the store does not exist yet.
pub fn load(path: &Path, backend: Backend) -> CliResult<Option<Session>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = match backend {
        Backend::File => Some(std::fs::read(path)?),
        Backend::Redb => read_redb(path)?,
    };
    let Some(bytes) = bytes else {
        return Ok(None);
    };
    let snapshot = decode_snapshot(&bytes)?;
    tracing::debug!(
        path = %path.display(),
        backend = %backend,
        entities = snapshot.entity_count(),
        "loaded session"
    );
    Ok(Some(Session::from_snapshot(&snapshot)?))
}

/// Persist `session`, replacing what was stored.
pub fn save(path: &Path, backend: Backend, session: &Session) -> CliResult<()> {
    let bytes = encode_snapshot(&session.export_snapshot())?;
    match backend {
        Backend::File => write_file(path, &bytes)?,
        Backend::Redb => write_redb(path, &bytes)?,
    }
    tracing::debug!(
        path = %path.display(),
        backend = %backend,
        bytes = bytes.len(),
        "saved session"
    );
    Ok(())
}

/// Write through a sibling temp file so a crash never leaves a torn snapshot.
fn write_file(path: &Path, bytes: &[u8]) -> CliResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn read_redb(path: &Path) -> CliResult<Option<Vec<u8>>> {
    let db = Database::open(path)?;
    let txn = db.begin_read()?;
    let table = match txn.open_table(SESSIONS) {
        Ok(table) => table,
        Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(table.get(SESSION_KEY)?.map(|guard| guard.value().to_vec()))
}

fn write_redb(path: &Path, bytes: &[u8]) -> CliResult<()> {
    let db = Database::create(path)?;
    let txn = db.begin_write()?;
    {
        let mut table = txn.open_table(SESSIONS)?;
        table.insert(SESSION_KEY, bytes)?;
    }
    txn.commit()?;
    Ok(())
}
