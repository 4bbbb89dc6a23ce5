/*!
Generic directory <-> archive packing.

Independent of the project container layout: any directory tree can be
packed into a deflate archive and unpacked back. Hidden files (names
starting with `.`) are skipped on pack; entry paths are sanitized on
unpack so a crafted archive cannot write outside the target directory.
*/

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::{ArchiveError, Result};

const COPY_BUFFER_SIZE: usize = 16384;

/// Pack `directory` into a fresh archive at `target`.
///
/// With `keep_base_dir` the directory's own name becomes the top-level
/// prefix inside the archive; otherwise entries start at its children.
pub fn pack_directory(
    directory: &Path,
    target: &Path,
    keep_base_dir: bool,
    compression_level: i64,
) -> Result<()> {
    if !directory.is_dir() {
        return Err(ArchiveError::validation(format!(
            "{} is not a directory",
            directory.display()
        )));
    }

    let file = File::create(target)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(compression_level));

    let base = if keep_base_dir {
        directory.parent().unwrap_or(directory)
    } else {
        directory
    };

    pack_tree(&mut zip, directory, base, options)?;
    zip.finish()?;
    Ok(())
}

fn pack_tree(
    zip: &mut ZipWriter<File>,
    dir: &Path,
    base: &Path,
    options: SimpleFileOptions,
) -> Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .collect::<io::Result<Vec<_>>>()?
        .into_iter()
        .map(|e| e.path())
        .collect();
    // deterministic entry order regardless of filesystem
    entries.sort();

    for path in entries {
        // applies to directories too, so OS artifacts like `.git/`
        // never enter the archive
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'))
        {
            debug!(path = %path.display(), "skipping hidden entry");
            continue;
        }

        let name = entry_name(&path, base)?;

        if path.is_dir() {
            zip.add_directory(name, options)?;
            pack_tree(zip, &path, base, options)?;
        } else {
            zip.start_file(name, options)?;
            let mut source = File::open(&path)?;
            copy_stream(&mut source, zip)?;
        }
    }

    Ok(())
}

/// Unpack every entry of `archive` under `target`, recreating the
/// directory structure. Entries whose names escape the target are
/// rejected.
pub fn unpack_archive(archive: &Path, target: &Path) -> Result<()> {
    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(file)?;
    std::fs::create_dir_all(target)?;

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        let relative = entry.enclosed_name().ok_or_else(|| {
            ArchiveError::validation(format!("unsafe entry name: {}", entry.name()))
        })?;
        let dest = target.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&dest)?;
            continue;
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&dest)?;
        copy_stream(&mut entry, &mut out)?;
    }

    Ok(())
}

fn entry_name(path: &Path, base: &Path) -> Result<String> {
    let relative: PathBuf = path
        .strip_prefix(base)
        .map_err(|_| ArchiveError::validation(format!("{} escapes pack root", path.display())))?
        .to_path_buf();

    // archive entry names always use forward slashes
    let mut name = String::new();
    for component in relative.components() {
        if !name.is_empty() {
            name.push('/');
        }
        name.push_str(&component.as_os_str().to_string_lossy());
    }
    Ok(name)
}

fn copy_stream<R: Read, W: Write>(source: &mut R, dest: &mut W) -> Result<()> {
    let mut buffer = [0u8; COPY_BUFFER_SIZE];
    loop {
        let read = source.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        dest.write_all(&buffer[..read])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn build_tree(root: &Path) {
        std::fs::create_dir_all(root.join("sub/deeper")).unwrap();
        std::fs::write(root.join("top.txt"), b"top level").unwrap();
        std::fs::write(root.join("sub/nested.txt"), b"nested bytes").unwrap();
        std::fs::write(root.join("sub/deeper/leaf.bin"), vec![0u8; 40000]).unwrap();
        std::fs::write(root.join(".hidden"), b"skip me").unwrap();
    }

    #[test]
    fn test_pack_unpack_round_trip() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("tree");
        std::fs::create_dir(&source).unwrap();
        build_tree(&source);

        let archive = dir.path().join("tree.zip");
        pack_directory(&source, &archive, false, 6).unwrap();

        let out = dir.path().join("out");
        unpack_archive(&archive, &out).unwrap();

        assert_eq!(std::fs::read(out.join("top.txt")).unwrap(), b"top level");
        assert_eq!(
            std::fs::read(out.join("sub/nested.txt")).unwrap(),
            b"nested bytes"
        );
        assert_eq!(
            std::fs::read(out.join("sub/deeper/leaf.bin")).unwrap().len(),
            40000
        );
        assert!(!out.join(".hidden").exists());
    }

    #[test]
    fn test_hidden_directories_are_skipped() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("tree");
        std::fs::create_dir_all(source.join(".git/refs")).unwrap();
        std::fs::write(source.join(".git/HEAD"), b"ref: refs/heads/main").unwrap();
        std::fs::write(source.join("doc.txt"), b"kept").unwrap();

        let archive = dir.path().join("tree.zip");
        pack_directory(&source, &archive, false, 6).unwrap();

        let file = File::open(&archive).unwrap();
        let zip = ZipArchive::new(file).unwrap();
        let names: Vec<&str> = zip.file_names().collect();
        assert_eq!(names, vec!["doc.txt"]);
    }

    #[test]
    fn test_keep_base_dir_prefixes_entries() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("tree");
        std::fs::create_dir(&source).unwrap();
        std::fs::write(source.join("file.txt"), b"x").unwrap();

        let archive = dir.path().join("tree.zip");
        pack_directory(&source, &archive, true, 6).unwrap();

        let file = File::open(&archive).unwrap();
        let zip = ZipArchive::new(file).unwrap();
        let names: Vec<&str> = zip.file_names().collect();
        assert!(names.contains(&"tree/file.txt"));
    }

    #[test]
    fn test_pack_rejects_non_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain.txt");
        std::fs::write(&file, b"x").unwrap();

        let result = pack_directory(&file, &dir.path().join("out.zip"), false, 6);
        assert!(matches!(result, Err(ArchiveError::Validation(_))));
    }

    #[test]
    fn test_unpack_rejects_escaping_entry() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("evil.zip");
        {
            let file = File::create(&archive).unwrap();
            let mut zip = ZipWriter::new(file);
            zip.start_file("../escape.txt", SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"nope").unwrap();
            zip.finish().unwrap();
        }

        let out = dir.path().join("out");
        let result = unpack_archive(&archive, &out);
        assert!(result.is_err());
        assert!(!dir.path().join("escape.txt").exists());
    }
}
