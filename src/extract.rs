//! Streaming extraction of drug records from the DrugBank XML catalog.
//!
//! The catalog is a single document wrapping thousands of `<drug>` elements,
//! large enough that materializing the tree is not an option. [`CatalogReader`]
//! walks the document with an event-driven parser and yields one flat
//! [`CatalogDrug`] per qualifying drug, dropping all per-drug state before the
//! next drug begins. The reader is a forward-only, single-pass iterator: it
//! cannot be restarted and never accumulates unrelated elements across the
//! scan.
//!
//! ## Extraction Rules
//!
//! - Only top-level `<drug>` elements are entities; `<drug>` elements nested
//!   under pathways are part of their parent's subtree and are never emitted
//! - Drugs whose `type` attribute is not "small molecule" or "biotech" are
//!   skipped entirely, with no partial extraction
//! - The catalog identifier prefers a `<drugbank-id primary="true">` child,
//!   falling back to the first identifier in document order, then to none
//! - Groups, ATC codes, synonyms and target names are collected from matching
//!   descendants anywhere under the drug, trimmed, and joined with `"; "` at
//!   emission time

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

use crate::error::{LinkError, Result};

/// Entity types accepted from the catalog; everything else is skipped.
const ACCEPTED_TYPES: [&str; 2] = ["small molecule", "biotech"];

/// Delimiter for list fields in their canonical joined form.
const LIST_DELIMITER: &str = "; ";

/// One drug extracted from the catalog.
///
/// List fields (`groups`, `atc_codes`, `synonyms`, `targets`) are held in
/// their canonical joined form from emission onward: `"; "`-separated, empty
/// string when no values were present.
#[derive(Debug, Clone, Default)]
pub struct CatalogDrug {
    /// Chosen catalog identifier (primary-first, falling back to the first
    /// alternate); `None` when the drug carries no identifier at all
    pub drugbank_id: Option<String>,

    /// Drug display name
    pub name: String,

    /// Free-text description, when present
    pub description: Option<String>,

    /// The `type` attribute: "small molecule" or "biotech"
    pub drug_type: String,

    /// Approval status tags (approved, investigational, withdrawn, ...)
    pub groups: String,

    /// ATC classification codes from `<atc-code code="...">` attributes
    pub atc_codes: String,

    /// Alternate names
    pub synonyms: String,

    /// Display names of biological targets
    pub targets: String,
}

/// What the current text content belongs to, if anything.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Capture {
    None,
    Id { primary: bool },
    Name,
    Description,
    Group,
    Synonym,
    TargetName,
}

/// Forward-only streaming reader over the catalog document.
///
/// Yields `Result<CatalogDrug>` for each qualifying drug in document order.
/// Parsing stops at the first structural error; per-record anomalies (missing
/// identifiers, empty fields) never fail the scan.
pub struct CatalogReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    depth: usize,
    emitted: usize,
    done: bool,
}

impl CatalogReader<BufReader<File>> {
    /// Open a catalog file for streaming extraction.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: BufRead> CatalogReader<R> {
    /// Wrap any buffered reader producing catalog XML.
    pub fn from_reader(source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(true);
        CatalogReader {
            reader,
            buf: Vec::new(),
            depth: 0,
            emitted: 0,
            done: false,
        }
    }

    /// Advance to the next qualifying drug, or `None` at end of document.
    fn next_drug(&mut self) -> Result<Option<CatalogDrug>> {
        loop {
            self.buf.clear();
            // Decide what to do with the event first; the borrow on the event
            // buffer must end before read_drug/skip_drug can run.
            let entered: Option<String> = match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => {
                    self.depth += 1;
                    if self.depth == 2 && e.name().as_ref() == b"drug" {
                        Some(attr_value(&e, b"type").unwrap_or_default())
                    } else {
                        None
                    }
                }
                Event::End(_) => {
                    self.depth = self.depth.saturating_sub(1);
                    None
                }
                Event::Eof => return Ok(None),
                _ => None,
            };

            if let Some(drug_type) = entered {
                if ACCEPTED_TYPES.contains(&drug_type.as_str()) {
                    let drug = self.read_drug(drug_type)?;
                    self.emitted += 1;
                    if self.emitted % 1000 == 0 {
                        info!("parsed {} catalog drugs...", self.emitted);
                    }
                    return Ok(Some(drug));
                }
                // Wrong type: skim the whole subtree, extract nothing
                self.skip_drug()?;
            }
        }
    }

    /// Extract all fields of one accepted drug, consuming events up to and
    /// including its closing tag. All per-drug state lives here and is dropped
    /// on return, so nothing can leak into the next drug.
    fn read_drug(&mut self, drug_type: String) -> Result<CatalogDrug> {
        let mut ids: Vec<String> = Vec::new();
        let mut primary_id: Option<String> = None;
        let mut name = String::new();
        let mut description = String::new();
        let mut groups: Vec<String> = Vec::new();
        let mut atc_codes: Vec<String> = Vec::new();
        let mut synonyms: Vec<String> = Vec::new();
        let mut targets: Vec<String> = Vec::new();

        let mut capture = Capture::None;
        let mut text = String::new();
        let mut in_targets = false;
        let mut in_target = false;
        let mut target_named = false;
        let mut target_depth = 0usize;

        // The opening <drug> has been consumed; we are at depth 2 and its
        // direct children sit at depth 3.
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => {
                    self.depth += 1;
                    match e.name().as_ref() {
                        b"drugbank-id" if self.depth == 3 => {
                            let primary = attr_value(&e, b"primary").as_deref() == Some("true");
                            capture = Capture::Id { primary };
                            text.clear();
                        }
                        b"name" if self.depth == 3 && name.is_empty() => {
                            capture = Capture::Name;
                            text.clear();
                        }
                        b"name" if in_target && !target_named && self.depth == target_depth + 1 => {
                            capture = Capture::TargetName;
                            text.clear();
                        }
                        b"description" if self.depth == 3 && description.is_empty() => {
                            capture = Capture::Description;
                            text.clear();
                        }
                        b"group" => {
                            capture = Capture::Group;
                            text.clear();
                        }
                        b"synonym" => {
                            capture = Capture::Synonym;
                            text.clear();
                        }
                        b"atc-code" => {
                            if let Some(code) = attr_value(&e, b"code") {
                                let code = code.trim().to_string();
                                if !code.is_empty() {
                                    atc_codes.push(code);
                                }
                            }
                        }
                        b"targets" if self.depth == 3 => {
                            in_targets = true;
                        }
                        b"target" if in_targets => {
                            in_target = true;
                            target_named = false;
                            target_depth = self.depth;
                        }
                        _ => {}
                    }
                }
                Event::Empty(e) => {
                    // Self-closing <atc-code code="..."/> still carries its code
                    if e.name().as_ref() == b"atc-code" {
                        if let Some(code) = attr_value(&e, b"code") {
                            let code = code.trim().to_string();
                            if !code.is_empty() {
                                atc_codes.push(code);
                            }
                        }
                    }
                }
                Event::Text(e) => {
                    if capture != Capture::None {
                        text.push_str(&e.unescape()?);
                    }
                }
                Event::End(e) => {
                    match (capture, e.name().as_ref()) {
                        (Capture::Id { primary }, b"drugbank-id") => {
                            let id = text.trim().to_string();
                            if !id.is_empty() {
                                if primary && primary_id.is_none() {
                                    primary_id = Some(id.clone());
                                }
                                ids.push(id);
                            }
                            capture = Capture::None;
                        }
                        (Capture::Name, b"name") => {
                            name = text.trim().to_string();
                            capture = Capture::None;
                        }
                        (Capture::TargetName, b"name") => {
                            let target = text.trim().to_string();
                            if !target.is_empty() {
                                targets.push(target);
                            }
                            target_named = true;
                            capture = Capture::None;
                        }
                        (Capture::Description, b"description") => {
                            description = text.trim().to_string();
                            capture = Capture::None;
                        }
                        (Capture::Group, b"group") => {
                            let group = text.trim().to_string();
                            if !group.is_empty() {
                                groups.push(group);
                            }
                            capture = Capture::None;
                        }
                        (Capture::Synonym, b"synonym") => {
                            let synonym = text.trim().to_string();
                            if !synonym.is_empty() {
                                synonyms.push(synonym);
                            }
                            capture = Capture::None;
                        }
                        _ => {}
                    }

                    match e.name().as_ref() {
                        b"target" if in_target && self.depth == target_depth => {
                            in_target = false;
                        }
                        b"targets" if in_targets && self.depth == 3 => {
                            in_targets = false;
                        }
                        _ => {}
                    }

                    self.depth -= 1;
                    if self.depth == 1 {
                        break;
                    }
                }
                Event::Eof => {
                    return Err(LinkError::MalformedSource(
                        "catalog document ended inside a drug element".to_string(),
                    ))
                }
                _ => {}
            }
        }

        let drugbank_id = primary_id.or_else(|| ids.first().cloned());

        Ok(CatalogDrug {
            drugbank_id,
            name,
            description: if description.is_empty() { None } else { Some(description) },
            drug_type,
            groups: groups.join(LIST_DELIMITER),
            atc_codes: atc_codes.join(LIST_DELIMITER),
            synonyms: synonyms.join(LIST_DELIMITER),
            targets: targets.join(LIST_DELIMITER),
        })
    }

    /// Consume the rest of a non-qualifying drug subtree without extracting
    /// anything from it.
    fn skip_drug(&mut self) -> Result<()> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(_) => self.depth += 1,
                Event::End(_) => {
                    self.depth -= 1;
                    if self.depth == 1 {
                        return Ok(());
                    }
                }
                Event::Eof => {
                    return Err(LinkError::MalformedSource(
                        "catalog document ended inside a skipped drug element".to_string(),
                    ))
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for CatalogReader<R> {
    type Item = Result<CatalogDrug>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_drug() {
            Ok(Some(drug)) => Some(Ok(drug)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Look up a single attribute value on a start tag.
fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}
