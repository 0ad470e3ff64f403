//! Output tables and the output directory guard.

use std::fs;
use std::path::Path;

use biocat_core::{BiocatError, Result};
use serde::{Deserialize, Serialize};

use crate::matcher::{MatchRecord, ReferenceRow};

pub const NEW_COMPOUNDS_FILE: &str = "new_compounds.tsv";
pub const MATCHES_FILE: &str = "matches.tsv";

/// Header of the new-compounds table, in column order.
pub const NEW_COMPOUND_HEADERS: [&str; 7] = [
    "OriginalCompoundID",
    "OriginalCompoundSmiles",
    "OriginalReactionRuleID",
    "NewCompoundID",
    "NewCompoundSmiles",
    "NewReactionSmiles",
    "EC_Numbers",
];

/// One row of the new-compounds table: a reconciled product with its
/// provenance fields already joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCompoundRow {
    #[serde(rename = "OriginalCompoundID")]
    pub source_compound_id: String,
    #[serde(rename = "OriginalCompoundSmiles")]
    pub source_compound_smiles: String,
    #[serde(rename = "OriginalReactionRuleID")]
    pub rule_ids: String,
    #[serde(rename = "NewCompoundID")]
    pub product_id: String,
    #[serde(rename = "NewCompoundSmiles")]
    pub product_smiles: String,
    #[serde(rename = "NewReactionSmiles")]
    pub reaction_identities: String,
    #[serde(rename = "EC_Numbers")]
    pub classification_codes: String,
}

/// Fail if any of `files` already exists in `dir`.
pub fn check_collisions(dir: &Path, files: &[&str]) -> Result<()> {
    for name in files {
        let path = dir.join(name);
        if path.exists() {
            return Err(BiocatError::OutputExists(path));
        }
    }
    Ok(())
}

/// Create the output directory, re-checking for collisions right before the
/// run starts writing.
pub fn prepare_output_dir(dir: &Path, files: &[&str]) -> Result<()> {
    fs::create_dir_all(dir)?;
    check_collisions(dir, files)
}

/// Atomically write the new-compounds table.
pub fn write_new_compounds(dir: &Path, rows: &[NewCompoundRow]) -> Result<()> {
    biocat_io::write_records_atomic(dir.join(NEW_COMPOUNDS_FILE), &NEW_COMPOUND_HEADERS, rows)
}

/// Atomically write the matches table. `field` names the reference column.
pub fn write_matches(
    dir: &Path,
    field: &str,
    products: &[NewCompoundRow],
    references: &[ReferenceRow],
    records: &[MatchRecord],
) -> Result<()> {
    let headers = [
        "ParentCompound",
        "ParentCompoundSmiles",
        "ParentCompoundExactMass",
        field,
        "NewCompoundID",
        "NewCompoundSmiles",
        "NewCompoundExactMass",
        "MassDiff",
        "EC_Numbers",
    ];
    let rows = records.iter().map(|record| {
        let product = &products[record.product];
        let reference = &references[record.reference];
        vec![
            reference.parent_compound.clone(),
            reference.parent_smiles.clone(),
            format_mass(record.parent_mass),
            reference.raw_value.clone(),
            product.product_id.clone(),
            product.product_smiles.clone(),
            format_mass(Some(record.product_mass)),
            format_mass(record.mass_difference),
            product.classification_codes.clone(),
        ]
    });
    biocat_io::write_table_atomic(dir.join(MATCHES_FILE), &headers, rows)
}

fn format_mass(mass: Option<f64>) -> String {
    match mass {
        Some(m) => format!("{m:.4}"),
        None => "NA".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str) -> NewCompoundRow {
        NewCompoundRow {
            source_compound_id: "c1".into(),
            source_compound_smiles: "CCO".into(),
            rule_ids: "r1;r2".into(),
            product_id: id.into(),
            product_smiles: "CC=O".into(),
            reaction_identities: "CCO>>CC=O".into(),
            classification_codes: "1.1.1.1".into(),
        }
    }

    #[test]
    fn new_compounds_written_with_header() {
        let dir = tempfile::tempdir().unwrap();
        write_new_compounds(dir.path(), &[row("c1_abc")]).unwrap();
        let text = fs::read_to_string(dir.path().join(NEW_COMPOUNDS_FILE)).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), NEW_COMPOUND_HEADERS.join("\t"));
        assert_eq!(
            lines.next().unwrap(),
            "c1\tCCO\tr1;r2\tc1_abc\tCC=O\tCCO>>CC=O\t1.1.1.1"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn empty_table_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        write_new_compounds(dir.path(), &[]).unwrap();
        let text = fs::read_to_string(dir.path().join(NEW_COMPOUNDS_FILE)).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn matches_use_configured_field() {
        let dir = tempfile::tempdir().unwrap();
        let products = vec![row("c1_abc")];
        let references = vec![ReferenceRow {
            parent_compound: "c1".into(),
            parent_smiles: "CCO".into(),
            value: 44.03,
            raw_value: "44.03".into(),
        }];
        let records = vec![MatchRecord {
            product: 0,
            reference: 0,
            parent_mass: Some(46.0419),
            product_mass: 44.0262,
            mass_difference: Some(2.0157),
        }];
        write_matches(dir.path(), "Observed", &products, &references, &records).unwrap();
        let text = fs::read_to_string(dir.path().join(MATCHES_FILE)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].contains("\tObserved\t"));
        assert_eq!(
            lines[1],
            "c1\tCCO\t46.0419\t44.03\tc1_abc\tCC=O\t44.0262\t2.0157\t1.1.1.1"
        );
    }

    #[test]
    fn collisions_detected() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/out");
        prepare_output_dir(&out, &[NEW_COMPOUNDS_FILE, MATCHES_FILE]).unwrap();
        assert!(out.is_dir());
        fs::write(out.join(MATCHES_FILE), "").unwrap();
        assert!(check_collisions(&out, &[NEW_COMPOUNDS_FILE]).is_ok());
        let err = check_collisions(&out, &[NEW_COMPOUNDS_FILE, MATCHES_FILE]).unwrap_err();
        assert!(matches!(err, BiocatError::OutputExists(p) if p.ends_with(MATCHES_FILE)));
    }
}
