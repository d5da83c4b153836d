//! Persistent cache of decoded class universes.
//!
//! Uses LMDB (via heed). Each entry maps a content fingerprint of an
//! artifact's binary locations to the JSON form of the classes decoded from
//! them. Cached classes are frozen again through `Universe::from_classes`, so
//! supertype resolution is never skipped.

use anyhow::{Context, Result};
use heed::types::Str;
use heed::{Database, Env, EnvFlags, EnvOpenOptions};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::catalog::load_locations;
use crate::origin::PackagePattern;
use crate::scan::class_files;
use crate::universe::{ClassEntity, Universe};

pub const UNIVERSES_DB: &str = "universes";

/// Bumped whenever the serialized class model changes shape.
const FORMAT_VERSION: &str = "plugin-analyzer/universe/1";

const DEFAULT_MAP_SIZE: usize = 1024 * 1024 * 1024;
const DEFAULT_MAX_DBS: u32 = 4;

type StrDb = Database<Str, Str>;

#[derive(Debug)]
pub struct UniverseCache {
    env: Env,
    db_path: PathBuf,
    universes: StrDb,
}

impl UniverseCache {
    pub fn open(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create cache directory: {}", parent.display())
            })?;
        }

        let env = open_env(&db_path)?;
        let mut wtxn = env.write_txn()?;
        let universes = env.create_database::<Str, Str>(&mut wtxn, Some(UNIVERSES_DB))?;
        wtxn.commit()?;

        Ok(Self {
            env,
            db_path,
            universes,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<ClassEntity>>> {
        let rtxn = self.env.read_txn()?;
        let Some(json) = self.universes.get(&rtxn, key)? else {
            return Ok(None);
        };
        let classes = serde_json::from_str(json)
            .with_context(|| format!("Corrupt cache entry: {key}"))?;
        Ok(Some(classes))
    }

    pub fn put(&self, key: &str, classes: &[ClassEntity]) -> Result<()> {
        let json = serde_json::to_string(classes)?;
        let mut wtxn = self.env.write_txn()?;
        self.universes.put(&mut wtxn, key, json.as_str())?;
        wtxn.commit()?;
        Ok(())
    }

    pub fn len(&self) -> Result<u64> {
        let rtxn = self.env.read_txn()?;
        Ok(self.universes.len(&rtxn)?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// SHA-256 over the contents of every location, in path order. Directories
/// contribute each class file, sorted, together with its relative path.
pub fn fingerprint(paths: &[PathBuf]) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(FORMAT_VERSION.as_bytes());
    for path in paths {
        hasher.update([0u8]);
        if path.is_dir() {
            hasher.update(b"dir");
            for file in class_files(path)? {
                let relative = file.strip_prefix(path).unwrap_or(&file);
                hasher.update(relative.to_string_lossy().as_bytes());
                hasher.update([0u8]);
                hash_file(&mut hasher, &file)?;
            }
        } else {
            hasher.update(b"file");
            hash_file(&mut hasher, path)?;
        }
    }
    Ok(hex::encode(hasher.finalize()))
}

fn hash_file(hasher: &mut Sha256, path: &Path) -> Result<()> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read binary location: {}", path.display()))?;
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(&bytes);
    Ok(())
}

/// Opens the class universe for `paths`, reusing decoded classes from `cache`
/// when the binaries are unchanged. Cache failures fall back to decoding.
pub fn open_universe(
    paths: &[PathBuf],
    runtime_packages: &[PackagePattern],
    cache: Option<&UniverseCache>,
) -> Result<Universe> {
    let Some(cache) = cache else {
        return Ok(Universe::open(paths, runtime_packages)?);
    };

    let key = fingerprint(paths)?;
    match cache.get(&key) {
        Ok(Some(classes)) => {
            debug!(key = %key, classes = classes.len(), "universe cache hit");
            return Ok(Universe::from_classes(classes, runtime_packages)?);
        }
        Ok(None) => debug!(key = %key, "universe cache miss"),
        Err(err) => warn!(key = %key, error = %format!("{err:#}"), "ignoring unreadable cache entry"),
    }

    let classes = load_locations(paths)?;
    if let Err(err) = cache.put(&key, &classes) {
        warn!(key = %key, error = %format!("{err:#}"), "failed to store universe in cache");
    }
    Ok(Universe::from_classes(classes, runtime_packages)?)
}

fn open_env(db_path: &Path) -> Result<Env> {
    let mut options = EnvOpenOptions::new();
    options.map_size(DEFAULT_MAP_SIZE);
    options.max_dbs(DEFAULT_MAX_DBS);
    // SAFETY: Default LMDB locking is kept; NO_SUB_DIR stores the env as a
    // single file at `db_path`.
    unsafe {
        options.flags(EnvFlags::NO_SUB_DIR);
        options
            .open(db_path)
            .with_context(|| format!("Failed to create/open cache env: {}", db_path.display()))
    }
}
