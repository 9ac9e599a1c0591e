//! # Druglink - SIDER / DrugBank Record Linkage
//!
//! This crate links and consolidates drug records describing the same substance across
//! two heterogeneous pharmaceutical sources:
//!
//! - **SIDER/STITCH tables**: tab-separated relations keyed by an opaque compound
//!   identifier (names, ATC codes, indications, side effects)
//! - **DrugBank catalog**: a large XML document describing drugs by name with
//!   structured metadata (ATC codes, synonyms, biological targets, approval groups)
//!
//! The two sources share no common key, so linkage is done by fuzzy name matching.
//! The output is one unified CSV table with exactly one row per compound, with
//! multi-valued attributes merged deterministically.
//!
//! ## Pipeline Overview
//!
//! 1. **Table Loading**: Read the tab-separated SIDER relations into memory
//! 2. **Aggregation**: Collapse one-to-many side tables (indications, side effects)
//!    into one deduplicated, sorted, `;`-joined string per compound
//! 3. **Streaming Extraction**: Walk the DrugBank XML with an event-driven parser,
//!    emitting one flat record per small-molecule/biotech drug without ever holding
//!    the full tree in memory
//! 4. **Fuzzy Resolution**: Match each compound name against the catalog names using
//!    a token-sort similarity ratio above a configurable threshold
//! 5. **Consolidation**: Left-join matched records, merge both sides' ATC codes into
//!    a single deduplicated field, and write the final CSV

pub mod consolidate;
pub mod error;
pub mod extract;
pub mod logging;
pub mod matcher;
pub mod normalize;
pub mod pipeline;
pub mod tables;
