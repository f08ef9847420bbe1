//! On-disk cache format and atomic replacement.
//!
//! The file is `{"entries": {<identity>: <record>}}`. Writers serialize the
//! whole map to a sibling temporary file, flush it, then rename it over the
//! target, so a reader in any process sees either the old or the new file.

use std::{
    collections::BTreeMap,
    fs, io,
    io::Write,
    path::{Path, PathBuf},
};

use rekey_core::PublicKeyRecord;
use serde::{Deserialize, Serialize, de::Error as _};
use tempfile::NamedTempFile;

use crate::CacheError;

pub(crate) type Entries = BTreeMap<String, PublicKeyRecord>;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CacheFile {
    entries: Entries,
}

#[derive(Serialize)]
struct CacheFileRef<'a> {
    entries: &'a Entries,
}

/// Directory holding `path`. A bare file name lives in the working directory.
pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Create `dir` (and missing ancestors) readable only by the owner.
pub(crate) fn ensure_dir(dir: &Path) -> Result<(), CacheError> {
    if dir.is_dir() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }

    builder
        .create(dir)
        .map_err(|source| CacheError::CreateDir { path: dir.to_path_buf(), source })
}

/// Load entries from `path`. A missing file is an empty cache.
pub(crate) fn load(path: &Path) -> Result<Entries, CacheError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Entries::new()),
        Err(source) => return Err(CacheError::Read { path: path.to_path_buf(), source }),
    };

    let parse_err = |source| CacheError::Parse { path: path.to_path_buf(), source };
    let file: CacheFile = serde_json::from_slice(&bytes).map_err(parse_err)?;
    validate(&file.entries).map_err(parse_err)?;
    Ok(file.entries)
}

/// Reject records a hand edit could have broken: the map key must be the
/// record's identity and a record cannot expire before it was fetched.
fn validate(entries: &Entries) -> Result<(), serde_json::Error> {
    for (identity, record) in entries {
        if *identity != record.identity {
            return Err(serde_json::Error::custom(format!(
                "entry {identity} holds a record for {}",
                record.identity
            )));
        }
        if record.expires_at < record.fetched_at {
            return Err(serde_json::Error::custom(format!(
                "entry {identity} expires before it was fetched"
            )));
        }
    }
    Ok(())
}

/// Atomically replace `path` with `entries`.
///
/// On failure the temporary file is removed and `path` is untouched.
pub(crate) fn store(path: &Path, entries: &Entries) -> Result<(), CacheError> {
    let write_err = |source| CacheError::Write { path: path.to_path_buf(), source };

    let bytes = serde_json::to_vec_pretty(&CacheFileRef { entries })
        .map_err(|source| CacheError::Serialize { path: path.to_path_buf(), source })?;

    let mut tmp = NamedTempFile::new_in(parent_dir(path)).map_err(write_err)?;
    restrict_permissions(tmp.as_file()).map_err(write_err)?;
    tmp.write_all(&bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;

    tmp.persist(path).map_err(|err| CacheError::Persist {
        path: PathBuf::from(path),
        source: err.error,
    })?;
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(file: &fs::File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &fs::File) -> io::Result<()> {
    Ok(())
}
