//! Loading and aggregation of the tab-separated SIDER/STITCH relations.
//!
//! The input relations are headerless TSV files that share an opaque compound
//! key (the STITCH identifier) but carry different payload columns:
//!
//! - **names**: `(stitch_id, drug_name)`
//! - **ATC codes**: `(stitch_id, atc_code)` — duplicate keys collapsed
//! - **indications**: seven columns, disease term last
//! - **side effects**: six columns, side-effect term last
//!
//! The one-to-many side tables are collapsed to exactly one row per compound
//! before any join, so the rest of the pipeline only ever sees canonical
//! `;`-joined strings.

use csv::ReaderBuilder;
use std::collections::{btree_map::Entry, BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use tracing::info;

use crate::error::{LinkError, Result};

/// One compound from the SIDER side of the link, after aggregation.
///
/// List-valued fields are already in their canonical joined form: deduplicated,
/// lexicographically sorted, `;`-separated. `None` means no side-table row
/// contributed a value for this compound.
#[derive(Debug, Clone)]
pub struct CompoundRecord {
    /// Opaque STITCH compound identifier
    pub compound_key: String,

    /// Drug display name as given in the names relation
    pub name: String,

    /// ATC classification code from the codes relation
    pub atc_code: Option<String>,

    /// Aggregated disease terms this compound is indicated for
    pub indications: Option<String>,

    /// Aggregated side-effect terms reported for this compound
    pub side_effects: Option<String>,
}

/// Load a two-column-of-interest relation from a headerless TSV file.
///
/// Reads every row and picks out the key and value columns by position. Rows
/// are allowed to carry surplus columns (the MedDRA relations do), but a row
/// missing either required column is a structural error that aborts the run.
///
/// # Arguments
///
/// * `path` - TSV file path
/// * `key_idx` - zero-based column index of the compound key
/// * `value_idx` - zero-based column index of the payload value
///
/// # Errors
///
/// Returns `LinkError::MalformedSource` when a row lacks a required column,
/// or the underlying CSV error for unreadable input.
pub fn load_pairs(path: &Path, key_idx: usize, value_idx: usize) -> Result<Vec<(String, String)>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut pairs = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let key = record.get(key_idx).ok_or_else(|| {
            LinkError::MalformedSource(format!(
                "{}: row {} has no column {}",
                path.display(),
                row + 1,
                key_idx
            ))
        })?;
        let value = record.get(value_idx).ok_or_else(|| {
            LinkError::MalformedSource(format!(
                "{}: row {} has no column {}",
                path.display(),
                row + 1,
                value_idx
            ))
        })?;
        pairs.push((key.to_string(), value.to_string()));
    }

    Ok(pairs)
}

/// Collapse a (key, value) relation to one joined string per distinct key.
///
/// For each key, the non-empty values are deduplicated, sorted
/// lexicographically, and joined with `;`. The result depends only on value
/// content, never on input row order, so aggregation is reproducible across
/// runs and across different physical orderings of the input table.
///
/// Aggregation is idempotent: re-splitting a joined string on `;` and
/// aggregating again reproduces it unchanged.
pub fn aggregate_values(pairs: &[(String, String)]) -> HashMap<String, String> {
    let mut grouped: HashMap<String, BTreeSet<String>> = HashMap::new();
    for (key, value) in pairs {
        if value.is_empty() {
            continue;
        }
        grouped.entry(key.clone()).or_default().insert(value.clone());
    }

    grouped
        .into_iter()
        .map(|(key, values)| {
            let joined = values.into_iter().collect::<Vec<_>>().join(";");
            (key, joined)
        })
        .collect()
}

/// Collapse duplicate compound keys in the ATC relation to one code per key.
///
/// The raw relation can repeat a compound key; keeping "first row wins" would
/// make the result depend on physical row order, so the tie-break is explicit:
/// the lexicographically smallest code wins. Empty codes are dropped.
pub fn dedup_codes(pairs: &[(String, String)]) -> HashMap<String, String> {
    let mut codes: BTreeMap<String, String> = BTreeMap::new();
    for (key, code) in pairs {
        if code.is_empty() {
            continue;
        }
        match codes.entry(key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(code.clone());
            }
            Entry::Occupied(mut slot) => {
                if code < slot.get() {
                    slot.insert(code.clone());
                }
            }
        }
    }
    codes.into_iter().collect()
}

/// Assemble the per-compound table from the four SIDER relations.
///
/// The names relation is the primary table: it defines output order and
/// cardinality, with the first occurrence winning when a compound key repeats.
/// The codes, indications and side-effect maps are left-joined onto it, so a
/// compound with no side-table rows still appears with `None` in those fields.
///
/// # Arguments
///
/// * `names` - `(compound_key, name)` rows in table order
/// * `codes` - deduplicated code per key (see [`dedup_codes`])
/// * `indications` - aggregated disease terms per key
/// * `side_effects` - aggregated side-effect terms per key
pub fn build_compound_table(
    names: &[(String, String)],
    codes: &HashMap<String, String>,
    indications: &HashMap<String, String>,
    side_effects: &HashMap<String, String>,
) -> Vec<CompoundRecord> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut compounds = Vec::with_capacity(names.len());

    for (key, name) in names {
        if !seen.insert(key.as_str()) {
            continue;
        }
        compounds.push(CompoundRecord {
            compound_key: key.clone(),
            name: name.clone(),
            atc_code: codes.get(key).cloned(),
            indications: indications.get(key).cloned(),
            side_effects: side_effects.get(key).cloned(),
        });
    }

    info!("built compound table with {} records", compounds.len());
    compounds
}
