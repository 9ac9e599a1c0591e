//! Consolidation of linked records into the final output table.
//!
//! The join is left-outer and source-A-preserving: every compound appears in
//! the output exactly once, with catalog fields populated when a link exists
//! and null otherwise. The two sides' ATC code lists are merged into one
//! unified field, and all matching scaffold (normalized names, per-side code
//! fields, the link itself) disappears from the output shape.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::extract::CatalogDrug;
use crate::tables::CompoundRecord;

/// Delimiter of the unified ATC field and the aggregated list fields.
const FIELD_DELIMITER: char = ';';

/// One row of the final merged table.
///
/// Serialized headers follow the source vocabularies: STITCH columns first,
/// then the unified ATC field, then the catalog columns. Catalog fields are
/// all `None` when the compound found no match.
#[derive(Debug, Clone, Serialize)]
pub struct MergedRecord {
    /// Opaque compound identifier from the STITCH tables
    #[serde(rename = "stitch_id")]
    pub compound_key: String,

    /// Compound display name from the names relation
    #[serde(rename = "drug_name")]
    pub name: String,

    /// Unified ATC codes: deduplicated, sorted union of both sides
    #[serde(rename = "ATC")]
    pub atc: Option<String>,

    /// Aggregated indication terms
    #[serde(rename = "indications")]
    pub indications: Option<String>,

    /// Aggregated side-effect terms
    #[serde(rename = "side_effects")]
    pub side_effects: Option<String>,

    /// Matched catalog drug name
    #[serde(rename = "drugbank_name")]
    pub catalog_name: Option<String>,

    /// Catalog description
    #[serde(rename = "description")]
    pub description: Option<String>,

    /// Catalog entity type ("small molecule" or "biotech")
    #[serde(rename = "drug_type")]
    pub drug_type: Option<String>,

    /// Approval status tags
    #[serde(rename = "groups")]
    pub groups: Option<String>,

    /// Alternate names from the catalog
    #[serde(rename = "synonyms")]
    pub synonyms: Option<String>,

    /// Biological target display names
    #[serde(rename = "targets")]
    pub targets: Option<String>,
}

/// Merge both sides' ATC code lists into the unified field.
///
/// Each side is split on `;`, segments are trimmed and uppercased (ATC codes
/// are canonically uppercase, which makes the dedup policy explicit: `"a01"`
/// and `"A01"` are the same code and surface as `"A01"`), empty segments are
/// dropped, and the union is sorted and rejoined with `;`. Returns `None`
/// when neither side contributed a code.
pub fn merge_atc_codes(left: Option<&str>, right: Option<&str>) -> Option<String> {
    let mut codes: BTreeSet<String> = BTreeSet::new();
    for side in [left, right].into_iter().flatten() {
        for code in side.split(FIELD_DELIMITER) {
            let code = code.trim();
            if !code.is_empty() {
                codes.insert(code.to_uppercase());
            }
        }
    }

    if codes.is_empty() {
        None
    } else {
        Some(codes.into_iter().collect::<Vec<_>>().join(";"))
    }
}

/// Renormalize a `;`-joined list field: drop empty segments, rejoin.
///
/// Idempotent and safe to reapply; canonicalizing an already-canonical field
/// returns it unchanged. A field with no surviving segments becomes `None`.
pub fn canonicalize_list(field: &str, delimiter: char) -> Option<String> {
    let segments: Vec<&str> = field
        .split(delimiter)
        .filter(|segment| !segment.is_empty())
        .collect();

    if segments.is_empty() {
        None
    } else {
        Some(segments.join(&delimiter.to_string()))
    }
}

/// Left-join the compound table with its resolved catalog links.
///
/// `links` runs parallel to `compounds` (one entry per compound, in order)
/// and holds the catalog index chosen by the resolver, or `None` for
/// unresolved names. Output cardinality always equals the compound count.
/// Empty catalog list fields surface as `None`, never as empty strings. The
/// unified ATC field gets a final canonicalization pass.
pub fn consolidate(
    compounds: &[CompoundRecord],
    catalog: &[CatalogDrug],
    links: &[Option<usize>],
) -> Vec<MergedRecord> {
    compounds
        .iter()
        .zip(links)
        .map(|(compound, link)| {
            let matched = link.map(|index| &catalog[index]);

            let atc = merge_atc_codes(
                compound.atc_code.as_deref(),
                matched.map(|drug| drug.atc_codes.as_str()),
            )
            .and_then(|codes| canonicalize_list(&codes, FIELD_DELIMITER));

            MergedRecord {
                compound_key: compound.compound_key.clone(),
                name: compound.name.clone(),
                atc,
                indications: compound.indications.clone(),
                side_effects: compound.side_effects.clone(),
                catalog_name: matched.map(|drug| drug.name.clone()),
                description: matched.and_then(|drug| drug.description.clone()),
                drug_type: matched.map(|drug| drug.drug_type.clone()),
                groups: matched.and_then(|drug| non_empty(&drug.groups)),
                synonyms: matched.and_then(|drug| non_empty(&drug.synonyms)),
                targets: matched.and_then(|drug| non_empty(&drug.targets)),
            }
        })
        .collect()
}

fn non_empty(field: &str) -> Option<String> {
    if field.is_empty() {
        None
    } else {
        Some(field.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compound(key: &str, name: &str, atc: Option<&str>) -> CompoundRecord {
        CompoundRecord {
            compound_key: key.to_string(),
            name: name.to_string(),
            atc_code: atc.map(|c| c.to_string()),
            indications: None,
            side_effects: None,
        }
    }

    fn catalog_drug(name: &str, atc_codes: &str) -> CatalogDrug {
        CatalogDrug {
            drugbank_id: Some("DB00001".to_string()),
            name: name.to_string(),
            drug_type: "small molecule".to_string(),
            atc_codes: atc_codes.to_string(),
            ..CatalogDrug::default()
        }
    }

    #[test]
    fn merges_codes_case_insensitively_to_uppercase() {
        // Source A carries "A01", the catalog carries "a01; A01"
        let merged = merge_atc_codes(Some("A01"), Some("a01; A01"));
        assert_eq!(merged.as_deref(), Some("A01"));
    }

    #[test]
    fn merged_codes_are_sorted_and_unique() {
        let merged = merge_atc_codes(Some("N02BA01;A01AD05"), Some("N02BA01; B01AC06"))
            .expect("codes present");
        assert_eq!(merged, "A01AD05;B01AC06;N02BA01");

        // No duplicates, no empty segments
        let segments: Vec<&str> = merged.split(';').collect();
        let unique: BTreeSet<&str> = segments.iter().copied().collect();
        assert_eq!(segments.len(), unique.len());
        assert!(segments.iter().all(|s| !s.is_empty()));
    }

    #[test]
    fn merging_nothing_yields_none() {
        assert_eq!(merge_atc_codes(None, None), None);
        assert_eq!(merge_atc_codes(Some(""), Some(" ; ")), None);
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let messy = "N02BA01;;A01AD05;";
        let canonical = canonicalize_list(messy, ';').unwrap();
        assert_eq!(canonical, "N02BA01;A01AD05");
        assert_eq!(canonicalize_list(&canonical, ';').unwrap(), canonical);
    }

    #[test]
    fn canonicalizing_an_empty_field_yields_none() {
        assert_eq!(canonicalize_list("", ';'), None);
        assert_eq!(canonicalize_list(";;", ';'), None);
    }

    #[test]
    fn join_preserves_cardinality_and_fills_nulls() {
        let compounds = vec![
            compound("c1", "aspirin", Some("N02BA01")),
            compound("c2", "zzzxyz", Some("Z01")),
        ];
        let catalog = vec![catalog_drug("Aspirin", "N02BA01")];
        let links = vec![Some(0), None];

        let merged = consolidate(&compounds, &catalog, &links);
        assert_eq!(merged.len(), compounds.len());

        assert_eq!(merged[0].catalog_name.as_deref(), Some("Aspirin"));
        assert_eq!(merged[0].atc.as_deref(), Some("N02BA01"));

        // Unmatched row: catalog side null, source codes carried unchanged
        assert!(merged[1].catalog_name.is_none());
        assert!(merged[1].drug_type.is_none());
        assert!(merged[1].groups.is_none());
        assert_eq!(merged[1].atc.as_deref(), Some("Z01"));
    }

    #[test]
    fn empty_catalog_list_fields_surface_as_none() {
        let compounds = vec![compound("c1", "cetuximab", None)];
        let catalog = vec![CatalogDrug {
            drugbank_id: Some("DB00002".to_string()),
            name: "Cetuximab".to_string(),
            drug_type: "biotech".to_string(),
            ..CatalogDrug::default()
        }];
        let links = vec![Some(0)];

        let merged = consolidate(&compounds, &catalog, &links);
        assert!(merged[0].groups.is_none());
        assert!(merged[0].synonyms.is_none());
        assert!(merged[0].targets.is_none());
        assert!(merged[0].atc.is_none());
    }
}
