use anyhow::Result;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tracing::debug;

use crate::error::LoadError;

pub fn default_m2_repository() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Failed to resolve home directory"))?;
    Ok(home.join(".m2").join("repository"))
}

/// Every `.class` file below `root`, sorted so loading order is reproducible.
/// Links are followed. An entry that cannot be read, or a `.class` entry that
/// is not a regular file, fails the whole walk.
pub fn class_files(root: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let (tx, rx) = mpsc::channel();

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .ignore(false)
        .parents(false)
        .follow_links(true)
        .build_parallel();

    walker.run(|| {
        let tx = tx.clone();
        Box::new(move |entry| {
            let found = match entry {
                Ok(entry) if is_class_file(entry.path()) => match entry.file_type() {
                    Some(t) if t.is_file() => Some(Ok(entry.into_path())),
                    Some(t) if t.is_dir() => None,
                    _ => Some(Err(LoadError::NotAFile {
                        path: entry.into_path(),
                    })),
                },
                Ok(_) => None,
                Err(source) => Some(Err(LoadError::Walk {
                    path: root.to_path_buf(),
                    source,
                })),
            };
            match found {
                Some(Err(err)) => {
                    debug!(error = %err, "unreadable directory entry");
                    let _ = tx.send(Err(err));
                    ignore::WalkState::Quit
                }
                Some(Ok(path)) => {
                    let _ = tx.send(Ok(path));
                    ignore::WalkState::Continue
                }
                None => ignore::WalkState::Continue,
            }
        })
    });

    drop(tx);
    let mut files = rx.iter().collect::<Result<Vec<PathBuf>, LoadError>>()?;
    files.sort();
    Ok(files)
}

pub fn is_class_file(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "class")
        && path.file_name().is_some_and(|n| n != "module-info.class")
}

pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("jar") || e.eq_ignore_ascii_case("zip"))
}

/// Whether a jar entry is a class that belongs on the classpath.
pub fn is_class_entry(name: &str) -> bool {
    name.ends_with(".class") && !name.starts_with("META-INF/") && !name.ends_with("module-info.class")
}
