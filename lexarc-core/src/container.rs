//! Container codec: bidirectional mapping between the zip-structured
//! project file and the in-memory [`ProjectModel`].
//!
//! Entry naming is fixed: the primary document first, the two reserved
//! font payloads, then asset namespaces keyed by resource id, then the
//! reversion history. No two entries share a name.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::config::EngineConfig;
use crate::recovery;
use crate::report::{LoadReport, WriteLog};
use crate::resources::{ProjectModel, ResourceId, ResourceStore};
use crate::reversion::ReversionRing;
use crate::{ArchiveError, Result};

/// Reserved name of the primary structured document entry.
pub const DOCUMENT_ENTRY: &str = "project.xml";
/// Reserved name of the embedded constructed-language font payload.
pub const CON_FONT_ENTRY: &str = "font_conlang.ttf";
/// Reserved name of the embedded local-language font payload.
pub const LOCAL_FONT_ENTRY: &str = "font_local.ttf";
/// Namespace prefix for image entries (`images/<id>.png`).
pub const IMAGES_PREFIX: &str = "images/";
/// Namespace prefix for audio clip entries (`audio/<id>.raw`).
pub const AUDIO_PREFIX: &str = "audio/";
/// Namespace prefix for logograph glyph entries (`logographs/<id>.png`).
pub const GLYPHS_PREFIX: &str = "logographs/";
/// Namespace prefix for reversion snapshot entries.
pub const REVERSION_PREFIX: &str = "reversion/";
/// Filename stem of persisted snapshots (`reversion/history_<index>`).
pub const REVERSION_BASE: &str = "history_";

/// Zip local-file-header signature, the container magic number.
const ARCHIVE_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

const COPY_BUFFER_SIZE: usize = 16384;

/// True when the file at `path` is recognizable as a project
/// container: at least 4 bytes, not a directory, and leading bytes
/// equal to the zip local-file-header signature.
pub fn is_archive_file<P: AsRef<Path>>(path: P) -> Result<bool> {
    let path = path.as_ref();
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(_) => return Ok(false),
    };

    if metadata.is_dir() || metadata.len() < 4 {
        return Ok(false);
    }

    let mut magic = [0u8; 4];
    let mut file = File::open(path)?;
    file.read_exact(&mut magic)?;

    Ok(magic == ARCHIVE_MAGIC)
}

fn entry_options(config: &EngineConfig) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(config.compression_level))
}

/// Serialize the document and every resource collection into a new
/// archive at `path`.
///
/// Write order: primary document, fonts (when customized), images,
/// audio, glyphs, reversion history. A single asset failing to encode
/// is logged and skipped; only archive-level I/O aborts the save.
/// Returns the advisory write log, empty on a clean run.
pub fn write_archive(
    path: &Path,
    document: &[u8],
    model: &ProjectModel,
    config: &EngineConfig,
) -> Result<String> {
    let file = File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options = entry_options(config);
    let mut log = WriteLog::new();

    // The document entry always comes first.
    zip.start_file(DOCUMENT_ENTRY, options)?;
    zip.write_all(document)?;

    if let Some(font) = &model.fonts.conlang {
        zip.start_file(CON_FONT_ENTRY, options)?;
        zip.write_all(font)?;
    }

    if let Some(font) = &model.fonts.local {
        zip.start_file(LOCAL_FONT_ENTRY, options)?;
        zip.write_all(font)?;
    }

    write_image_entries(&mut zip, IMAGES_PREFIX, &model.images, options, &mut log, "image");
    write_raw_entries(&mut zip, AUDIO_PREFIX, ".raw", &model.audio, options, &mut log, "sound");
    write_image_entries(&mut zip, GLYPHS_PREFIX, &model.glyphs, options, &mut log, "logograph");
    write_reversion_entries(&mut zip, &model.reversions, options)?;

    zip.finish()?;
    debug!(path = %path.display(), "archive written");

    Ok(log.into_string())
}

/// PNG-validated asset namespace (images and logograph glyphs). An
/// undecodable payload is skipped with a log line rather than aborting
/// the whole save.
fn write_image_entries(
    zip: &mut ZipWriter<File>,
    prefix: &str,
    store: &ResourceStore,
    options: SimpleFileOptions,
    log: &mut WriteLog,
    kind: &str,
) {
    if store.is_empty() {
        return;
    }

    if let Err(e) = zip.add_directory(prefix.trim_end_matches('/'), options) {
        log.push(format!("Unable to save {kind}s: {e}"));
        return;
    }

    for (id, bytes) in store.iter() {
        if let Err(e) = image::load_from_memory(bytes) {
            warn!(id, kind, "skipping undecodable {kind}: {e}");
            log.push(format!("Unable to save {kind} {id}: {e}"));
            continue;
        }

        if let Err(e) = write_entry(zip, &format!("{prefix}{id}.png"), bytes, options) {
            warn!(id, kind, "skipping unwritable {kind}: {e}");
            log.push(format!("Unable to save {kind} {id}: {e}"));
        }
    }
}

/// Opaque asset namespace (audio clips); payloads are written as-is.
fn write_raw_entries(
    zip: &mut ZipWriter<File>,
    prefix: &str,
    extension: &str,
    store: &ResourceStore,
    options: SimpleFileOptions,
    log: &mut WriteLog,
    kind: &str,
) {
    if store.is_empty() {
        return;
    }

    if let Err(e) = zip.add_directory(prefix.trim_end_matches('/'), options) {
        log.push(format!("Unable to save {kind}s: {e}"));
        return;
    }

    for (id, bytes) in store.iter() {
        if let Err(e) = write_entry(zip, &format!("{prefix}{id}{extension}"), bytes, options) {
            warn!(id, kind, "skipping unwritable {kind}: {e}");
            log.push(format!("Unable to save {kind} {id}: {e}"));
        }
    }
}

/// Reversion snapshots, oldest first as `history_0..history_n`. Unlike
/// optional assets, a failure here aborts the save: losing history
/// silently would defeat its purpose.
fn write_reversion_entries(
    zip: &mut ZipWriter<File>,
    ring: &ReversionRing,
    options: SimpleFileOptions,
) -> Result<()> {
    zip.add_directory(REVERSION_PREFIX.trim_end_matches('/'), options)?;

    for (index, snapshot) in ring.iter().enumerate() {
        write_entry(
            zip,
            &format!("{REVERSION_PREFIX}{REVERSION_BASE}{index}"),
            snapshot.bytes(),
            options,
        )?;
    }

    Ok(())
}

fn write_entry(
    zip: &mut ZipWriter<File>,
    name: &str,
    bytes: &[u8],
    options: SimpleFileOptions,
) -> Result<()> {
    zip.start_file(name, options)?;
    zip.write_all(bytes)?;
    Ok(())
}

/// Read half of the container codec.
///
/// Opening performs the magic-number check; entry routing classifies
/// each name into its resource class and feeds the matching store.
pub struct ArchiveReader {
    archive: ZipArchive<File>,
    path: PathBuf,
}

impl ArchiveReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !is_archive_file(path)? {
            return Err(ArchiveError::NotAnArchive(path.to_path_buf()));
        }

        let archive = ZipArchive::new(File::open(path)?)?;
        Ok(Self {
            archive,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry_names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    pub fn has_entry(&self, name: &str) -> bool {
        self.archive.index_for_name(name).is_some()
    }

    /// Full strict read of one entry.
    pub fn entry_bytes(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut entry = self.archive.by_name(name).map_err(|_| {
            ArchiveError::EntryNotFound {
                archive: self.path.clone(),
                entry: name.to_string(),
            }
        })?;

        let mut bytes = Vec::new();
        let mut chunk = [0u8; COPY_BUFFER_SIZE];
        loop {
            let n = entry.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..n]);
        }

        Ok(bytes)
    }

    /// Best-effort read of one entry; never fails, may be truncated.
    pub fn salvage_entry_bytes(&mut self, name: &str) -> Vec<u8> {
        recovery::salvage_entry_bytes(&mut self.archive, name)
    }

    /// Route every asset entry into the matching resource collection.
    ///
    /// An entry whose identifier cannot be parsed, or whose payload
    /// fails to decode as its expected type, contributes one warning
    /// line and does not stop the remaining entries. The primary
    /// document and reversion entries are handled by their own paths.
    pub fn read_assets(&mut self, model: &mut ProjectModel, report: &mut LoadReport) -> Result<()> {
        for name in self.entry_names() {
            // directory markers and the separately handled entries
            if name == DOCUMENT_ENTRY || name.ends_with('/') || name.starts_with(REVERSION_PREFIX)
            {
                continue;
            }

            if name == CON_FONT_ENTRY {
                match self.entry_bytes(&name) {
                    Ok(bytes) => model.fonts.conlang = Some(bytes),
                    Err(e) => report.warn(format!("Unable to load conlang font: {e}")),
                }
            } else if name == LOCAL_FONT_ENTRY {
                match self.entry_bytes(&name) {
                    Ok(bytes) => model.fonts.local = Some(bytes),
                    Err(e) => report.warn(format!("Unable to load local language font: {e}")),
                }
            } else if let Some(stem) = name.strip_prefix(IMAGES_PREFIX) {
                self.route_asset(&name, stem, ".png", true, report, &mut model.images);
            } else if let Some(stem) = name.strip_prefix(GLYPHS_PREFIX) {
                self.route_asset(&name, stem, ".png", true, report, &mut model.glyphs);
            } else if let Some(stem) = name.strip_prefix(AUDIO_PREFIX) {
                self.route_asset(&name, stem, ".raw", false, report, &mut model.audio);
            } else {
                // unrecognized entries are tolerated for forward compatibility
                debug!(entry = %name, "ignoring unrecognized archive entry");
            }
        }

        Ok(())
    }

    /// Parse the id from `stem`, read and (optionally) validate the
    /// payload, and insert it into `store`.
    fn route_asset(
        &mut self,
        name: &str,
        stem: &str,
        extension: &str,
        validate_png: bool,
        report: &mut LoadReport,
        store: &mut ResourceStore,
    ) {
        let id: ResourceId = match stem.trim_end_matches(extension).parse() {
            Ok(id) => id,
            Err(_) => {
                report.warn(format!("Problem loading asset (bad identifier): {name}"));
                return;
            }
        };

        let bytes = match self.entry_bytes(name) {
            Ok(bytes) => bytes,
            Err(e) => {
                report.warn(format!("Problem loading asset {name}: {e}"));
                return;
            }
        };

        if validate_png && image::load_from_memory(&bytes).is_err() {
            report.warn(format!("Problem loading image: {name}"));
            return;
        }

        store.insert_with_id(id, bytes);
    }

    /// Rehydrate the reversion ring from `history_<index>` entries,
    /// oldest first, then append the current document bytes as the
    /// newest entry. Unreadable snapshots are reported and skipped.
    pub fn read_reversions(
        &mut self,
        ring: &mut ReversionRing,
        current_document: &[u8],
        report: &mut LoadReport,
    ) {
        let mut index = 0;
        loop {
            let name = format!("{REVERSION_PREFIX}{REVERSION_BASE}{index}");
            if !self.has_entry(&name) || index >= ring.capacity() {
                break;
            }

            match self.entry_bytes(&name) {
                Ok(bytes) => ring.add_version_to_end(bytes),
                Err(e) => report.error(format!("Unable to load reversion state {index}: {e}")),
            }

            index += 1;
        }

        // the ring always ends with this file's last saved document
        ring.push_newest(current_document.to_vec());
    }

    /// Extract one named entry to a standalone file (the export
    /// operation). Read-only with respect to the archive.
    pub fn extract_entry(&mut self, name: &str, dest: &Path) -> Result<()> {
        let mut entry = self.archive.by_name(name).map_err(|_| {
            ArchiveError::EntryNotFound {
                archive: self.path.clone(),
                entry: name.to_string(),
            }
        })?;

        let mut out = File::create(dest)?;
        let mut chunk = [0u8; COPY_BUFFER_SIZE];
        loop {
            let n = entry.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            out.write_all(&chunk[..n])?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::FontSlots;
    use chrono::Utc;
    use tempfile::TempDir;

    /// 1x1 PNG produced by the same codec that validates assets.
    fn tiny_png() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(1, 1, image::Rgb([120, 30, 200]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn sample_model() -> ProjectModel {
        let mut model = ProjectModel::new();
        model.images.insert_with_id(10, tiny_png());
        model.audio.insert_with_id(3, vec![0x01, 0x02, 0x03]);
        model.glyphs.insert_with_id(7, tiny_png());
        model.fonts = FontSlots {
            conlang: Some(b"conlang font bytes".to_vec()),
            local: None,
        };
        model
    }

    #[test]
    fn test_write_then_read_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.lexarc");
        let document = b"<project><word>sel</word></project>";
        let model = sample_model();

        let log = write_archive(&path, document, &model, &EngineConfig::default()).unwrap();
        assert!(log.is_empty());
        assert!(is_archive_file(&path).unwrap());

        let mut reader = ArchiveReader::open(&path).unwrap();
        assert_eq!(reader.entry_bytes(DOCUMENT_ENTRY).unwrap(), document);

        let mut loaded = ProjectModel::new();
        let mut report = LoadReport::new();
        reader.read_assets(&mut loaded, &mut report).unwrap();

        assert!(report.is_clean(), "unexpected: {}", report.warnings());
        assert_eq!(loaded.images.get(10), Some(tiny_png().as_slice()));
        assert_eq!(loaded.audio.get(3), Some(&[0x01, 0x02, 0x03][..]));
        assert_eq!(loaded.glyphs.get(7), Some(tiny_png().as_slice()));
        assert_eq!(
            loaded.fonts.conlang.as_deref(),
            Some(&b"conlang font bytes"[..])
        );
        assert!(loaded.fonts.local.is_none());
    }

    #[test]
    fn test_undecodable_image_is_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.lexarc");
        let mut model = ProjectModel::new();
        model.images.insert_with_id(1, b"not a png".to_vec());
        model.images.insert_with_id(2, tiny_png());

        let log = write_archive(&path, b"<p/>", &model, &EngineConfig::default()).unwrap();
        assert!(log.contains("image 1"));

        let mut reader = ArchiveReader::open(&path).unwrap();
        assert!(!reader.has_entry("images/1.png"));
        assert!(reader.has_entry("images/2.png"));
    }

    #[test]
    fn test_bad_identifier_produces_warning_and_continues() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.lexarc");

        // hand-build an archive with a garbage asset name
        let file = File::create(&path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        zip.start_file(DOCUMENT_ENTRY, options).unwrap();
        zip.write_all(b"<p/>").unwrap();
        zip.start_file("images/notanid.png", options).unwrap();
        zip.write_all(&tiny_png()).unwrap();
        zip.start_file("audio/5.raw", options).unwrap();
        zip.write_all(&[9, 9]).unwrap();
        zip.finish().unwrap();

        let mut reader = ArchiveReader::open(&path).unwrap();
        let mut model = ProjectModel::new();
        let mut report = LoadReport::new();
        reader.read_assets(&mut model, &mut report).unwrap();

        assert!(report.warnings().contains("notanid"));
        assert_eq!(model.audio.get(5), Some(&[9, 9][..]));
        assert!(model.images.is_empty());
    }

    #[test]
    fn test_maximal_asset_identifier_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.lexarc");

        let file = File::create(&path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        zip.start_file(DOCUMENT_ENTRY, options).unwrap();
        zip.write_all(b"<p/>").unwrap();
        zip.start_file(format!("images/{}.png", ResourceId::MAX), options)
            .unwrap();
        zip.write_all(&tiny_png()).unwrap();
        zip.finish().unwrap();

        let mut reader = ArchiveReader::open(&path).unwrap();
        let mut model = ProjectModel::new();
        let mut report = LoadReport::new();
        reader.read_assets(&mut model, &mut report).unwrap();

        assert!(report.is_clean(), "unexpected: {}", report.warnings());
        assert_eq!(model.images.get(ResourceId::MAX), Some(tiny_png().as_slice()));
    }

    #[test]
    fn test_reversion_rehydration_appends_current_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.lexarc");
        let document = b"<project>current</project>";

        let mut model = ProjectModel::new();
        model.reversions.add_version(b"v0".to_vec(), Utc::now());
        model.reversions.add_version(b"v1".to_vec(), Utc::now());

        write_archive(&path, document, &model, &EngineConfig::default()).unwrap();

        let mut reader = ArchiveReader::open(&path).unwrap();
        let mut ring = ReversionRing::with_capacity(10);
        let mut report = LoadReport::new();
        reader.read_reversions(&mut ring, document, &mut report);

        assert!(report.errors().is_empty());
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.oldest().unwrap().bytes(), b"v0");
        assert_eq!(ring.newest().unwrap().bytes(), document);
    }

    #[test]
    fn test_magic_check_rejects_non_archives() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fake.lexarc");
        std::fs::write(&path, b"PK only in spirit").unwrap();

        assert!(!is_archive_file(&path).unwrap());
        assert!(matches!(
            ArchiveReader::open(&path),
            Err(ArchiveError::NotAnArchive(_))
        ));

        // directories and tiny files are rejected outright
        assert!(!is_archive_file(dir.path()).unwrap());
        let short = dir.path().join("short");
        std::fs::write(&short, b"PK").unwrap();
        assert!(!is_archive_file(&short).unwrap());
    }

    #[test]
    fn test_extract_entry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.lexarc");
        let model = sample_model();
        write_archive(&path, b"<p/>", &model, &EngineConfig::default()).unwrap();

        let out = dir.path().join("exported.ttf");
        let mut reader = ArchiveReader::open(&path).unwrap();
        reader.extract_entry(CON_FONT_ENTRY, &out).unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"conlang font bytes");

        assert!(matches!(
            reader.extract_entry("no_such_entry", &out),
            Err(ArchiveError::EntryNotFound { .. })
        ));
    }
}
