//! End-to-end batch pipeline: load, aggregate, extract, resolve, consolidate,
//! write.
//!
//! A run either completes or fails outright; there is no partial output and
//! no recovery mid-run. All stages are sequential and each consumes immutable
//! inputs, so the only shared state is the read-only candidate index used by
//! the parallel resolution stage.

use csv::Writer;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::consolidate::consolidate;
use crate::error::Result;
use crate::extract::{CatalogDrug, CatalogReader};
use crate::matcher::{resolve_links, CandidateIndex, NameMatcher, TokenSortMatcher};
use crate::tables::{aggregate_values, build_compound_table, dedup_codes, load_pairs};

/// Input file locations for one linkage run.
#[derive(Debug, Clone)]
pub struct SourcePaths {
    /// Headerless TSV: (stitch_id, drug_name)
    pub names: PathBuf,

    /// Headerless TSV: (stitch_id, atc_code)
    pub atc: PathBuf,

    /// Headerless TSV, seven columns, disease term last
    pub indications: PathBuf,

    /// Headerless TSV, six columns, side-effect term last
    pub side_effects: PathBuf,

    /// DrugBank XML catalog
    pub catalog: PathBuf,
}

/// Counters reported after a completed run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSummary {
    /// Rows in the output table (one per compound)
    pub compounds: usize,

    /// Qualifying drugs extracted from the catalog
    pub catalog_drugs: usize,

    /// Compounds linked to a catalog drug
    pub matched: usize,

    /// Compounds with no candidate above threshold
    pub unmatched: usize,
}

/// Run the full linkage batch and write the merged CSV.
///
/// # Arguments
///
/// * `paths` - the four TSV relations plus the XML catalog
/// * `output` - destination CSV path (header row included, UTF-8)
/// * `threshold` - minimum similarity score (0-100) for a name match
///
/// # Errors
///
/// Any structural problem with an input (unreadable file, malformed XML, row
/// missing a required column) aborts the run before output is written.
pub fn run(paths: &SourcePaths, output: &Path, threshold: f64) -> Result<PipelineSummary> {
    // Stage 1: load the STITCH relations and aggregate the side tables
    info!("loading STITCH relations...");
    let names = load_pairs(&paths.names, 0, 1)?;
    let codes = dedup_codes(&load_pairs(&paths.atc, 0, 1)?);
    let indications = aggregate_values(&load_pairs(&paths.indications, 0, 6)?);
    let side_effects = aggregate_values(&load_pairs(&paths.side_effects, 0, 5)?);
    info!(
        "loaded {} name rows, {} coded compounds, {} indicated, {} with side effects",
        names.len(),
        codes.len(),
        indications.len(),
        side_effects.len()
    );

    let compounds = build_compound_table(&names, &codes, &indications, &side_effects);

    // Stage 2: stream the catalog
    info!("streaming catalog: {}", paths.catalog.display());
    let catalog: Vec<CatalogDrug> =
        CatalogReader::from_path(&paths.catalog)?.collect::<Result<Vec<_>>>()?;
    info!("extracted {} qualifying catalog drugs", catalog.len());

    // Stage 3: fuzzy name resolution against the shared candidate index
    info!("resolving compound names (threshold {})...", threshold);
    let index = CandidateIndex::build(&catalog);
    let matcher = TokenSortMatcher;
    let links = resolve_links(&compounds, &index, &matcher as &dyn NameMatcher, threshold);

    // Stage 4: consolidate and write
    let merged = consolidate(&compounds, &catalog, &links);
    write_output(output, &merged)?;

    let matched = links.iter().filter(|link| link.is_some()).count();
    let summary = PipelineSummary {
        compounds: merged.len(),
        catalog_drugs: catalog.len(),
        matched,
        unmatched: merged.len() - matched,
    };

    info!(
        "run complete: {} compounds, {} matched ({:.1}%), {} unmatched, output {}",
        summary.compounds,
        summary.matched,
        if summary.compounds > 0 {
            summary.matched as f64 / summary.compounds as f64 * 100.0
        } else {
            0.0
        },
        summary.unmatched,
        output.display()
    );

    Ok(summary)
}

fn write_output(path: &Path, records: &[crate::consolidate::MergedRecord]) -> Result<()> {
    let mut writer = Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}
