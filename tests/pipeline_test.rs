//! End-to-end pipeline tests over temporary fixture files.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use druglink::matcher::DEFAULT_THRESHOLD;
use druglink::pipeline::{run, SourcePaths};
use tempfile::TempDir;

const CATALOG_XML: &str = r#"<drugbank xmlns="http://www.drugbank.ca">
  <drug type="small molecule">
    <drugbank-id primary="true">DB00945</drugbank-id>
    <name>Aspirin</name>
    <description>A common analgesic and antipyretic.</description>
    <groups><group>approved</group></groups>
    <synonyms><synonym>Acetylsalicylic acid</synonym></synonyms>
    <atc-codes><atc-code code="N02BA01"/></atc-codes>
    <targets><target><name>Prostaglandin G/H synthase 1</name></target></targets>
  </drug>
  <drug type="small molecule">
    <drugbank-id primary="true">DB09341</drugbank-id>
    <name>Caffeine</name>
    <atc-codes><atc-code code="a01"/><atc-code code="A01"/></atc-codes>
  </drug>
  <drug type="biosimilar">
    <drugbank-id primary="true">DB77777</drugbank-id>
    <name>Zzzxyz</name>
    <atc-codes><atc-code code="Q99QQ99"/></atc-codes>
  </drug>
</drugbank>"#;

fn write_fixtures(dir: &Path) -> SourcePaths {
    let names = dir.join("drug_names.tsv");
    let atc = dir.join("drug_atc.tsv");
    let indications = dir.join("meddra_all_indications.tsv");
    let side_effects = dir.join("meddra_all_se.tsv");
    let catalog = dir.join("catalog.xml");

    fs::write(&names, "CID001\taspirin\nCID002\tcaffeine\nCID003\tzzzxyz\n").unwrap();
    fs::write(&atc, "CID002\tA01\nCID003\tZ01AA01\n").unwrap();
    fs::write(
        &indications,
        "CID001\tC01\tlabel\tpain\tPT\tM01\tpain\n\
         CID001\tC02\tlabel\tfever\tPT\tM02\tfever\n\
         CID001\tC01\tlabel\tpain\tPT\tM01\tpain\n",
    )
    .unwrap();
    fs::write(
        &side_effects,
        "CID001\tCID101\tU01\tPT\tM11\tnausea\n\
         CID002\tCID102\tU02\tPT\tM12\tinsomnia\n",
    )
    .unwrap();
    fs::write(&catalog, CATALOG_XML).unwrap();

    SourcePaths {
        names,
        atc,
        indications,
        side_effects,
        catalog,
    }
}

/// Read the output CSV back as one map per row, keyed by header name.
fn read_output(path: &Path) -> Vec<HashMap<String, String>> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    reader
        .records()
        .map(|record| {
            let record = record.unwrap();
            headers
                .iter()
                .cloned()
                .zip(record.iter().map(String::from))
                .collect()
        })
        .collect()
}

#[test]
fn full_run_links_and_consolidates() {
    let dir = TempDir::new().unwrap();
    let paths = write_fixtures(dir.path());
    let output = dir.path().join("merged.csv");

    let summary = run(&paths, &output, DEFAULT_THRESHOLD).unwrap();

    // Outer join preserves cardinality: one row per source compound
    assert_eq!(summary.compounds, 3);
    assert_eq!(summary.matched, 2);
    assert_eq!(summary.unmatched, 1);
    // The biosimilar never entered the catalog
    assert_eq!(summary.catalog_drugs, 2);

    let rows = read_output(&output);
    assert_eq!(rows.len(), 3);

    // Scenario 1: "aspirin" matches catalog "Aspirin", unified codes from
    // the catalog side only
    let aspirin = &rows[0];
    assert_eq!(aspirin["stitch_id"], "CID001");
    assert_eq!(aspirin["drug_name"], "aspirin");
    assert_eq!(aspirin["drugbank_name"], "Aspirin");
    assert_eq!(aspirin["drug_type"], "small molecule");
    assert_eq!(aspirin["ATC"], "N02BA01");
    assert_eq!(aspirin["indications"], "fever;pain");
    assert_eq!(aspirin["side_effects"], "nausea");
    assert_eq!(aspirin["groups"], "approved");
    assert_eq!(aspirin["synonyms"], "Acetylsalicylic acid");
    assert_eq!(aspirin["targets"], "Prostaglandin G/H synthase 1");
    assert_eq!(aspirin["description"], "A common analgesic and antipyretic.");

    // Scenario 2: source code "A01" plus catalog "a01; A01" dedups to "A01"
    let caffeine = &rows[1];
    assert_eq!(caffeine["drugbank_name"], "Caffeine");
    assert_eq!(caffeine["ATC"], "A01");

    // Scenario 3: no similar catalog name (the same-named biosimilar was
    // excluded by type), catalog side all null, source code unchanged
    let unmatched = &rows[2];
    assert_eq!(unmatched["stitch_id"], "CID003");
    assert_eq!(unmatched["drugbank_name"], "");
    assert_eq!(unmatched["drug_type"], "");
    assert_eq!(unmatched["description"], "");
    assert_eq!(unmatched["ATC"], "Z01AA01");
}

#[test]
fn malformed_relation_aborts_the_run() {
    let dir = TempDir::new().unwrap();
    let mut paths = write_fixtures(dir.path());

    // Indication rows missing the disease-term column are structural errors
    let broken = dir.path().join("broken_indications.tsv");
    fs::write(&broken, "CID001\tonly-two-columns\n").unwrap();
    paths.indications = broken;

    let output = dir.path().join("merged.csv");
    assert!(run(&paths, &output, DEFAULT_THRESHOLD).is_err());
}

#[test]
fn rerunning_the_batch_is_reproducible() {
    let dir = TempDir::new().unwrap();
    let paths = write_fixtures(dir.path());

    let first = dir.path().join("first.csv");
    let second = dir.path().join("second.csv");
    run(&paths, &first, DEFAULT_THRESHOLD).unwrap();
    run(&paths, &second, DEFAULT_THRESHOLD).unwrap();

    assert_eq!(fs::read_to_string(&first).unwrap(), fs::read_to_string(&second).unwrap());
}
