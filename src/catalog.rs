//! Reading class files out of binary locations.

use memmap2::Mmap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

use crate::classfile::parse_class;
use crate::error::LoadError;
use crate::scan::{class_files, is_archive, is_class_entry, is_class_file};
use crate::universe::ClassEntity;

/// Decodes every class in a directory, jar/zip archive or single class file.
pub fn load_classes(path: &Path) -> Result<Vec<ClassEntity>, LoadError> {
    let metadata = std::fs::metadata(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if metadata.is_dir() {
        load_directory(path)
    } else if is_archive(path) {
        load_archive(path)
    } else if is_class_file(path) {
        let bytes = read_file(path)?;
        let class = decode(path, &path.to_string_lossy(), &bytes)?;
        Ok(vec![class])
    } else {
        Err(LoadError::UnsupportedLocation {
            path: path.to_path_buf(),
        })
    }
}

/// Decodes every location in classpath order.
pub fn load_locations(paths: &[PathBuf]) -> Result<Vec<ClassEntity>, LoadError> {
    let mut classes = Vec::new();
    for path in paths {
        let loaded = load_classes(path)?;
        debug!(path = %path.display(), classes = loaded.len(), "loaded binary location");
        classes.extend(loaded);
    }
    Ok(classes)
}

fn load_directory(root: &Path) -> Result<Vec<ClassEntity>, LoadError> {
    class_files(root)?
        .iter()
        .map(|file| {
            let bytes = read_file(file)?;
            let entry = file.strip_prefix(root).unwrap_or(file).to_string_lossy();
            decode(root, &entry, &bytes)
        })
        .collect()
}

fn load_archive(path: &Path) -> Result<Vec<ClassEntity>, LoadError> {
    let io = |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io)?;
    // SAFETY: The file is opened read-only and outlives the mapping within this function.
    let mmap = unsafe { Mmap::map(&file) }.map_err(io)?;
    let archive_error = |source| LoadError::Archive {
        path: path.to_path_buf(),
        source,
    };
    let mut archive = ZipArchive::new(Cursor::new(&mmap[..])).map_err(archive_error)?;

    let mut classes = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(archive_error)?;
        if entry.is_dir() || !is_class_entry(entry.name()) {
            continue;
        }
        let name = entry.name().to_string();
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes).map_err(io)?;
        classes.push(decode(path, &name, &bytes)?);
    }
    Ok(classes)
}

fn read_file(path: &Path) -> Result<Vec<u8>, LoadError> {
    std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn decode(location: &Path, entry: &str, bytes: &[u8]) -> Result<ClassEntity, LoadError> {
    parse_class(bytes).map_err(|source| LoadError::Malformed {
        path: location.to_path_buf(),
        entry: entry.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, content) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn non_class_entries_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("empty.jar");
        write_jar(
            &jar,
            &[
                ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"),
                ("META-INF/versions/11/a/A.class", b"junk"),
                ("module-info.class", b"junk"),
                ("a/messages.properties", b"x=y"),
            ],
        );
        assert!(load_classes(&jar).unwrap().is_empty());
    }

    #[test]
    fn malformed_classes_name_the_entry() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("broken.jar");
        write_jar(&jar, &[("a/Broken.class", b"\x00\x01")]);
        match load_classes(&jar) {
            Err(LoadError::Malformed { entry, .. }) => assert_eq!(entry, "a/Broken.class"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn unsupported_and_missing_locations() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("readme.txt");
        std::fs::write(&text, "hi").unwrap();
        assert!(matches!(
            load_classes(&text),
            Err(LoadError::UnsupportedLocation { .. })
        ));
        assert!(matches!(
            load_classes(&dir.path().join("missing.jar")),
            Err(LoadError::Io { .. })
        ));

        let not_zip = dir.path().join("fake.jar");
        std::fs::write(&not_zip, "not a zip").unwrap();
        assert!(matches!(load_classes(&not_zip), Err(LoadError::Archive { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn linked_classes_in_directories_are_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let classes = dir.path().join("classes");
        std::fs::create_dir_all(&classes).unwrap();
        std::fs::write(dir.path().join("corrupt.bin"), b"\x00\x01").unwrap();
        std::os::unix::fs::symlink(dir.path().join("corrupt.bin"), classes.join("Linked.class"))
            .unwrap();
        match load_classes(&classes) {
            Err(LoadError::Malformed { entry, .. }) => assert_eq!(entry, "Linked.class"),
            other => panic!("unexpected result: {other:?}"),
        }

        std::fs::remove_file(dir.path().join("corrupt.bin")).unwrap();
        assert!(matches!(
            load_classes(&classes),
            Err(LoadError::Walk { .. } | LoadError::NotAFile { .. })
        ));
    }
}
