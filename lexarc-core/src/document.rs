//! Structured-document codec boundary.
//!
//! The engine treats the primary document as an opaque byte buffer; a
//! [`DocumentCodec`] decides whether those bytes are a readable
//! document. The shipped [`XmlDocumentCodec`] checks XML
//! well-formedness without interpreting any linguistic content, which
//! is all the persistence layer needs.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::{ArchiveError, Result};

/// Validates/parses primary document bytes on behalf of the engine.
///
/// The consuming application supplies its real codec; the engine only
/// ever asks "do these bytes decode?". Verification after a save
/// constructs a throwaway model and runs the same decode path.
pub trait DocumentCodec {
    /// Decode (or at minimum validate) a document byte buffer.
    ///
    /// An `Err` from this method triggers the corruption-recovery
    /// escalation during load.
    fn decode(&self, bytes: &[u8]) -> Result<()>;
}

/// Well-formedness-only XML codec.
#[derive(Debug, Clone, Default)]
pub struct XmlDocumentCodec;

impl XmlDocumentCodec {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentCodec for XmlDocumentCodec {
    fn decode(&self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Err(ArchiveError::unrecoverable("document is empty"));
        }

        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().check_end_names = true;

        let mut buf = Vec::new();
        let mut depth = 0usize;
        let mut seen_root = false;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(_)) => {
                    if seen_root && depth == 0 {
                        return Err(ArchiveError::unrecoverable(
                            "content found after document root closed",
                        ));
                    }
                    seen_root = true;
                    depth += 1;
                }
                Ok(Event::End(_)) => {
                    depth = depth.saturating_sub(1);
                }
                Ok(Event::Empty(_)) => {
                    if seen_root && depth == 0 {
                        return Err(ArchiveError::unrecoverable(
                            "content found after document root closed",
                        ));
                    }
                    seen_root = true;
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(ArchiveError::unrecoverable(format!(
                        "malformed document at byte {}: {e}",
                        reader.buffer_position()
                    )));
                }
            }
            buf.clear();
        }

        if depth != 0 {
            return Err(ArchiveError::unrecoverable(
                "document truncated with unclosed elements",
            ));
        }
        if !seen_root {
            return Err(ArchiveError::unrecoverable("document has no root element"));
        }

        Ok(())
    }
}
