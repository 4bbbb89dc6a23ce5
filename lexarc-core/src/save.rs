/*!
Atomic save protocol and the project-level load/save entrypoints.

A save attempt is a short state machine: acquire a temp slot in the
project's working directory, serialize there, copy the result next to
the destination, prove the copy loadable by feeding it through the full
read path into a throwaway model, and only then replace the previous
file. A process kill at any point before the final replace leaves the
previous good file intact.
*/

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::container::{self, ArchiveReader, CON_FONT_ENTRY, DOCUMENT_ENTRY, LOCAL_FONT_ENTRY};
use crate::document::DocumentCodec;
use crate::packer;
use crate::report::LoadReport;
use crate::resources::ProjectModel;
use crate::{ArchiveError, Result};

/// Per-save caller flags.
#[derive(Debug, Clone, Copy)]
pub struct SaveOptions {
    /// Append the committed document bytes to the reversion ring
    pub write_to_history: bool,
    /// Remove the working-directory temp file even when the save
    /// fails; by default it is retained for forensic inspection
    pub force_clean: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            write_to_history: true,
            force_clean: false,
        }
    }
}

/// Which reserved font slot to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontSlot {
    Conlang,
    Local,
}

impl FontSlot {
    fn entry_name(self) -> &'static str {
        match self {
            FontSlot::Conlang => CON_FONT_ENTRY,
            FontSlot::Local => LOCAL_FONT_ENTRY,
        }
    }
}

/// Orchestrates saves and loads of one project archive at a time.
///
/// The engine holds no mutable state; all file-scoped context is
/// passed per call. It is not safe to run two save attempts against
/// the same destination concurrently.
pub struct ArchiveEngine<C: DocumentCodec> {
    config: EngineConfig,
    codec: C,
}

impl<C: DocumentCodec> ArchiveEngine<C> {
    pub fn new(config: EngineConfig, codec: C) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, codec })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Save the project to `dest`, staging through `working_dir`.
    ///
    /// `document` is the serialized in-memory document snapshot. On
    /// success the committed file has been proven loadable and, when
    /// requested, the document bytes were appended to the model's
    /// reversion ring. Returns the advisory write log when any
    /// optional asset failed to pack, `None` on a clean run.
    pub fn save_project(
        &self,
        dest: &Path,
        document: &[u8],
        model: &mut ProjectModel,
        working_dir: &Path,
        save_time: DateTime<Utc>,
        options: SaveOptions,
    ) -> Result<Option<String>> {
        // a bare relative destination stages in the current directory
        let dest_dir = match dest.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let temp = self.acquire_temp_slot(working_dir)?;
        let result = self.save_attempt(dest, dest_dir, document, model, save_time, options, &temp);

        if (result.is_ok() || options.force_clean) && temp.exists() {
            if let Err(e) = std::fs::remove_file(&temp) {
                warn!(temp = %temp.display(), "unable to remove temp save file: {e}");
            }
        }

        match result {
            Ok(write_log) if write_log.is_empty() => {
                info!(dest = %dest.display(), "project saved");
                Ok(None)
            }
            Ok(write_log) => {
                info!(dest = %dest.display(), "project saved with advisories");
                Ok(Some(write_log))
            }
            Err(e) => Err(e),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn save_attempt(
        &self,
        dest: &Path,
        dest_dir: &Path,
        document: &[u8],
        model: &mut ProjectModel,
        save_time: DateTime<Utc>,
        options: SaveOptions,
        temp: &Path,
    ) -> Result<String> {
        let write_log = container::write_archive(temp, document, model, &self.config)?;

        // Relocate a copy next to the destination; the pre-existing
        // file is untouched so far. Paths are compared resolved, not
        // lexically: copying the temp file onto itself would truncate
        // it.
        let staged = dest_dir.join(temp.file_name().unwrap_or_default());
        let staged_is_temp = match (staged.canonicalize(), temp.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if !staged_is_temp {
            std::fs::copy(temp, &staged)?;
        }

        // A save is never complete until the bytes that would become
        // the new file have been proven loadable.
        if let Err(e) = self.verify_archive(&staged, Some(document)) {
            if !staged_is_temp {
                let _ = std::fs::remove_file(&staged);
            }
            return Err(ArchiveError::verification(e.to_string()));
        }

        // Commit. The only step that destroys the previous good file.
        if dest.exists() {
            std::fs::remove_file(dest)?;
        }
        std::fs::rename(&staged, dest)?;

        if options.write_to_history {
            model.reversions.add_version(document.to_vec(), save_time);
        }

        Ok(write_log)
    }

    /// Load a project archive into `model`.
    ///
    /// `override_document` re-injects externally supplied document
    /// bytes in place of the archive's document entry (used by the
    /// verification path). Hard failure only when the primary document
    /// is unrecoverable; everything else accumulates in the report.
    pub fn load_project(
        &self,
        path: &Path,
        model: &mut ProjectModel,
        override_document: Option<&[u8]>,
    ) -> Result<LoadReport> {
        if !path.exists() {
            return Err(ArchiveError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("file {} does not exist", path.display()),
            )));
        }

        let mut reader = ArchiveReader::open(path)?;
        let mut report = LoadReport::new();

        reader.read_assets(model, &mut report)?;

        let mut document_report = LoadReport::new();
        model.document = self.read_document(&mut reader, override_document, &mut document_report)?;

        reader.read_reversions(&mut model.reversions, &model.document, &mut report);

        // document diagnostics come first in the surfaced report
        report.prepend(&document_report);

        info!(path = %path.display(), clean = report.is_clean(), "project loaded");
        Ok(report)
    }

    /// Document read path with the recovery escalation: strict read,
    /// then byte salvage, then structural repair, then hard failure.
    fn read_document(
        &self,
        reader: &mut ArchiveReader,
        override_document: Option<&[u8]>,
        report: &mut LoadReport,
    ) -> Result<Vec<u8>> {
        let mut raw = match override_document {
            Some(bytes) => bytes.to_vec(),
            None => match reader.entry_bytes(DOCUMENT_ENTRY) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(path = %reader.path().display(), "document entry unreadable: {e}");
                    report.error("Encountered corrupted document entry. Recovery-read attempted.");
                    reader.salvage_entry_bytes(DOCUMENT_ENTRY)
                }
            },
        };

        if let Err(first_error) = self.codec.decode(&raw) {
            let text = String::from_utf8_lossy(&raw);
            let repaired = crate::recovery::repair_document(&text);

            self.codec.decode(repaired.as_bytes()).map_err(|_| {
                ArchiveError::unrecoverable(format!(
                    "document could not be repaired: {first_error}"
                ))
            })?;

            report.warn(
                "Document was damaged; structural recovery was applied. \
                 Recovered data may be incomplete.",
            );
            raw = repaired.into_bytes();
        }

        Ok(raw)
    }

    /// Prove an archive loadable by feeding it through the normal read
    /// path into an isolated, discarded model. When
    /// `expected_document` is given, the reloaded document must hash
    /// identically to it.
    fn verify_archive(&self, path: &Path, expected_document: Option<&[u8]>) -> Result<()> {
        let mut probe = ProjectModel::with_reversion_capacity(self.config.max_reversions);
        let report = self.load_project(path, &mut probe, None)?;

        // a load that needed recovery is not a trustworthy save
        if !report.errors().is_empty() {
            return Err(ArchiveError::verification(
                report.errors().trim_end().to_string(),
            ));
        }

        if let Some(expected) = expected_document {
            let expected_hash = content_hash(expected);
            let actual_hash = content_hash(&probe.document);
            if expected_hash != actual_hash {
                return Err(ArchiveError::verification(format!(
                    "document hash mismatch: expected {expected_hash}, got {actual_hash}"
                )));
            }
        }

        Ok(())
    }

    /// Build a project archive from a loose directory tree, then put
    /// it through the same self-verification as a regular save.
    pub fn pack_project_directory(&self, directory: &Path, target: &Path) -> Result<()> {
        packer::pack_directory(directory, target, false, self.config.compression_level)?;
        self.verify_archive(target, None)
            .map_err(|e| ArchiveError::verification(e.to_string()))
    }

    /// Extract an embedded font payload to a standalone file. The
    /// export path gets a `.ttf` extension appended when missing.
    pub fn export_font(&self, archive_path: &Path, slot: FontSlot, export_path: &Path) -> Result<()> {
        let export_path = ensure_ttf_extension(export_path);
        let mut reader = ArchiveReader::open(archive_path)?;
        reader.extract_entry(slot.entry_name(), &export_path)
    }

    /// Locate or create the working-directory temp slot. A stale temp
    /// file from a crashed save is renamed aside with an epoch-seconds
    /// suffix, never deleted outright.
    fn acquire_temp_slot(&self, working_dir: &Path) -> Result<PathBuf> {
        let temp = working_dir.join(&self.config.temp_file_stem);

        if temp.exists() {
            let aside = working_dir.join(format!(
                "{}{}",
                self.config.temp_file_stem,
                Utc::now().timestamp()
            ));
            warn!(stale = %temp.display(), aside = %aside.display(),
                "stale temp save file found; renaming aside");
            std::fs::rename(&temp, &aside)?;
        }

        Ok(temp)
    }

    /// Most recent temp save file left behind by a crashed save, if
    /// any: the exact stem first, else any aside-renamed copy. Lets a
    /// frontend offer crash recovery on startup.
    pub fn find_stale_temp_save(&self, working_dir: &Path) -> Result<Option<PathBuf>> {
        let exact = working_dir.join(&self.config.temp_file_stem);
        if exact.exists() {
            return Ok(Some(exact));
        }

        for entry in std::fs::read_dir(working_dir)? {
            let path = entry?.path();
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if path.is_file() && name.starts_with(&self.config.temp_file_stem) {
                return Ok(Some(path));
            }
        }

        Ok(None)
    }
}

/// Rename a file into the working directory as
/// `<epoch>_<name>.archive`, preserving it out of the way.
pub fn archive_file_aside(source: &Path, working_dir: &Path) -> Result<PathBuf> {
    let name = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ArchiveError::validation("source has no file name"))?;

    let dest = working_dir.join(format!("{}_{name}.archive", Utc::now().timestamp()));
    std::fs::rename(source, &dest)?;
    Ok(dest)
}

fn ensure_ttf_extension(path: &Path) -> PathBuf {
    let matches = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("ttf"));

    if matches {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_os_string();
        name.push(".ttf");
        PathBuf::from(name)
    }
}

fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
