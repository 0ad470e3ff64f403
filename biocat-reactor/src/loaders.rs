//! Loading catalog and reference tables from TSV files or inline lists.
//!
//! Missing files and missing required columns are configuration errors.
//! Malformed chemistry inside a well-formed table is not: such entries are
//! kept (compounds) or dropped with a warning (reject lists).

use std::collections::BTreeMap;
use std::path::Path;

use biocat_core::{BiocatError, MolecularOps, Result};
use biocat_io::read_table;
use serde::Deserialize;

use crate::catalog::{split_list, Compound, ReactionRule, TagFilter};
use crate::config::looks_like_path;
use crate::matcher::ReferenceRow;
use crate::output::{NewCompoundRow, NEW_COMPOUND_HEADERS};

const RULE_ID: &[&str] = &["InternalID", "internal_id"];
const RULE_REACTANTS: &[&str] = &["Reactants", "reactant_template"];
const RULE_PATTERN: &[&str] = &["SMARTS", "pattern"];
const RULE_CODES: &[&str] = &["EC_Numbers", "classification_codes"];
const RULE_TAGS: &[&str] = &["Organisms", "applicability_tags"];

/// Load input compounds from a TSV (`compound_id`, `smiles`) or from an inline
/// `;`-separated list of structures, which is accepted when at least one entry
/// parses. Inline compounds are named `input_compound_{i}`.
pub fn load_compounds<M: MolecularOps>(
    ops: &M,
    source: &str,
    neutralize: bool,
) -> Result<Vec<Compound>> {
    let path = Path::new(source);
    let mut compounds = if path.is_file() {
        let table = read_table(path)?;
        let id_col = table.require(&["compound_id"])?;
        let smiles_col = table.require(&["smiles"])?;
        table
            .values(id_col)
            .zip(table.values(smiles_col))
            .map(|(id, smiles)| Compound::new(id.trim(), smiles.trim()))
            .collect()
    } else if names_table_file(path) {
        return Err(BiocatError::NotFound(path.to_path_buf()));
    } else {
        let entries: Vec<&str> = source
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if !entries.iter().any(|s| ops.parse(s).is_some()) {
            return Err(BiocatError::InvalidInput(format!(
                "compounds '{source}' is neither a file nor a list of valid structures"
            )));
        }
        entries
            .iter()
            .enumerate()
            .map(|(i, smiles)| Compound::new(format!("input_compound_{i}"), *smiles))
            .collect::<Vec<_>>()
    };

    if neutralize {
        for compound in &mut compounds {
            if let Some(structure) = ops.parse(&compound.smiles) {
                compound.smiles = ops.neutralize(&structure);
                compound.neutralized = true;
            }
        }
    }
    Ok(compounds)
}

fn names_table_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("tsv" | "csv" | "txt" | "tab")
    )
}

/// Load reaction rules. Both the historical column names (`InternalID`,
/// `Reactants`, `SMARTS`, `EC_Numbers`, `Organisms`) and the logical ones are
/// accepted.
pub fn load_rules(path: impl AsRef<Path>) -> Result<Vec<ReactionRule>> {
    let table = read_table(path)?;
    let id = table.require(RULE_ID)?;
    let reactants = table.require(RULE_REACTANTS)?;
    let pattern = table.require(RULE_PATTERN)?;
    let codes = table.require(RULE_CODES)?;
    let tags = table.require(RULE_TAGS)?;

    Ok(table
        .rows()
        .iter()
        .map(|row| {
            let cell = |i: usize| row.get(i).unwrap_or("");
            ReactionRule::from_fields(
                cell(id),
                cell(reactants),
                cell(pattern),
                cell(codes),
                cell(tags),
            )
        })
        .collect())
}

/// Load a tag filter from a TSV with an `org_id` column, or from an inline
/// `;`-separated list.
pub fn load_tag_filter(source: &str) -> Result<TagFilter> {
    let path = Path::new(source);
    if path.is_file() {
        let table = read_table(path)?;
        let col = table.require(&["org_id"])?;
        Ok(TagFilter::new(table.values(col)))
    } else if looks_like_path(source) {
        Err(BiocatError::NotFound(path.to_path_buf()))
    } else {
        Ok(TagFilter::new(split_list(source)))
    }
}

#[derive(Debug, Deserialize)]
struct CoreactantRecord {
    coreactant_id: String,
    smiles: String,
}

/// Load the co-reactant table as id -> structure text.
pub fn load_coreactants(path: impl AsRef<Path>) -> Result<BTreeMap<String, String>> {
    let records: Vec<CoreactantRecord> = biocat_io::read_records(path)?;
    let mut map = BTreeMap::new();
    for record in records {
        let id = record.coreactant_id.trim().to_string();
        if map.insert(id.clone(), record.smiles.trim().to_string()).is_some() {
            return Err(BiocatError::InvalidInput(format!("duplicate co-reactant id '{id}'")));
        }
    }
    Ok(map)
}

/// Load the byproduct reject list, canonicalized through `ops`.
pub fn load_byproducts<M: MolecularOps>(ops: &M, path: impl AsRef<Path>) -> Result<Vec<String>> {
    let table = read_table(path)?;
    let col = table.require(&["smiles"])?;
    let mut canonical = Vec::new();
    for smiles in table.values(col).map(str::trim).filter(|s| !s.is_empty()) {
        match ops.parse(smiles) {
            Some(structure) => canonical.push(ops.canonicalize(&structure)),
            None => log::warn!("{}: dropping unparseable byproduct '{smiles}'", table.name()),
        }
    }
    Ok(canonical)
}

/// Load the pattern reject list as raw pattern text.
pub fn load_patterns(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let table = read_table(path)?;
    let col = table.require(&["smarts"])?;
    Ok(table
        .values(col)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect())
}

/// Load the MS reference table. `field` names the measured-value column.
pub fn load_ms_data(path: impl AsRef<Path>, field: &str) -> Result<Vec<ReferenceRow>> {
    let table = read_table(path)?;
    let parent = table.require(&["ParentCompound"])?;
    let parent_smiles = table.require(&["ParentCompoundSmiles"])?;
    let value = table.require(&[field])?;

    table
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let raw = row.get(value).unwrap_or("").trim();
            let parsed: f64 = raw.parse().map_err(|_| {
                BiocatError::Parse(format!(
                    "{}: row {}: '{}' is not a number in column '{}'",
                    table.name(),
                    i + 2,
                    raw,
                    field
                ))
            })?;
            Ok(ReferenceRow {
                parent_compound: row.get(parent).unwrap_or("").trim().to_string(),
                parent_smiles: row.get(parent_smiles).unwrap_or("").trim().to_string(),
                value: parsed,
                raw_value: raw.to_string(),
            })
        })
        .collect()
}

/// Load a new-compounds table written by a previous `react` run.
pub fn load_new_compounds(path: impl AsRef<Path>) -> Result<Vec<NewCompoundRow>> {
    let table = read_table(path)?;
    let mut cols = [0usize; 7];
    for (slot, header) in cols.iter_mut().zip(NEW_COMPOUND_HEADERS) {
        *slot = table.require(&[header])?;
    }
    if table.is_empty() {
        return Err(BiocatError::InvalidInput(format!(
            "{}: no compounds to match",
            table.name()
        )));
    }
    Ok(table
        .rows()
        .iter()
        .map(|row| {
            let cell = |i: usize| row.get(cols[i]).unwrap_or("").to_string();
            NewCompoundRow {
                source_compound_id: cell(0),
                source_compound_smiles: cell(1),
                rule_ids: cell(2),
                product_id: cell(3),
                product_smiles: cell(4),
                reaction_identities: cell(5),
                classification_codes: cell(6),
            }
        })
        .collect())
}
