/*!
# Lexarc Core Engine

Project archive persistence core library for conlang authoring tools.

This crate persists a full project as a single zip-structured archive:
an XML document plus binary assets (fonts, images, audio, logographs)
and a bounded ring of prior document snapshots, with support for:

- Atomic saves that never destroy the previous good file before the
  replacement has been proven loadable
- Corruption recovery via raw byte salvage and structural XML repair
- Reversion history with oldest-first eviction at a configured bound
- Generic directory <-> archive packing with zip-slip protection

## Usage

```rust,no_run
use lexarc_core::{ArchiveEngine, EngineConfig, ProjectModel, SaveOptions, XmlDocumentCodec};

let engine = ArchiveEngine::new(EngineConfig::default(), XmlDocumentCodec::new())?;
let mut model = ProjectModel::new();

let document = b"<project><word id=\"1\">sel</word></project>";
engine.save_project(
    "project.lexarc".as_ref(),
    document,
    &mut model,
    "/tmp".as_ref(),
    chrono::Utc::now(),
    SaveOptions::default(),
)?;

let mut reloaded = ProjectModel::new();
let report = engine.load_project("project.lexarc".as_ref(), &mut reloaded, None)?;
assert!(report.is_clean());
# Ok::<(), lexarc_core::ArchiveError>(())
```
*/

pub mod config;
pub mod container;
pub mod document;
pub mod error;
pub mod packer;
pub mod recovery;
pub mod report;
pub mod resources;
pub mod reversion;
pub mod save;

pub use config::{EngineConfig, DEFAULT_COMPRESSION_LEVEL, DEFAULT_MAX_REVERSIONS};
pub use container::{
    is_archive_file, ArchiveReader, AUDIO_PREFIX, CON_FONT_ENTRY, DOCUMENT_ENTRY, GLYPHS_PREFIX,
    IMAGES_PREFIX, LOCAL_FONT_ENTRY, REVERSION_BASE, REVERSION_PREFIX,
};
pub use document::{DocumentCodec, XmlDocumentCodec};
pub use error::{ArchiveError, Result};
pub use packer::{pack_directory, unpack_archive};
pub use recovery::repair_document;
pub use report::LoadReport;
pub use resources::{FontSlots, ProjectModel, ResourceId, ResourceStore};
pub use reversion::{ReversionRing, ReversionSnapshot};
pub use save::{archive_file_aside, ArchiveEngine, FontSlot, SaveOptions};
