//! Tolerance-based mass matching against an MS reference table.
//!
//! Matching is many-to-many: every reference row within tolerance of a
//! product matches it, and one row may match many products. A row is only
//! considered for products whose source compound is the row's
//! `ParentCompound`.

use std::collections::HashMap;

use biocat_core::MolecularOps;

use crate::config::{MatchMode, MatcherConfig};
use crate::output::NewCompoundRow;
use crate::workers::Workers;

/// Absolute slack added to the tolerance so that values exactly on the bound
/// survive binary floating-point error.
pub const FLOAT_SLACK: f64 = 1e-9;

/// One row of the MS reference table.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceRow {
    pub parent_compound: String,
    pub parent_smiles: String,
    /// Measured value: a mass or a mass difference, depending on the mode.
    pub value: f64,
    /// The value as written in the table, echoed to the output.
    pub raw_value: String,
}

/// A (product, reference row) pair within tolerance.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    /// Index into the matched product list.
    pub product: usize,
    /// Index into the reference table.
    pub reference: usize,
    pub parent_mass: Option<f64>,
    pub product_mass: f64,
    /// Parent mass minus product mass, when the parent mass is known.
    pub mass_difference: Option<f64>,
}

/// All matches of a run plus the products that could not be scored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchReport {
    pub records: Vec<MatchRecord>,
    /// Ids of products whose mass (or parent mass, in mass-difference mode)
    /// could not be computed.
    pub unscoreable: Vec<String>,
}

/// Inclusive tolerance test.
pub fn within_tolerance(value: f64, reference: f64, tolerance: f64) -> bool {
    (value - reference).abs() <= tolerance + FLOAT_SLACK
}

enum Scored {
    Matches(Vec<MatchRecord>),
    Unscoreable,
}

/// Matches products against a reference table.
pub struct MassMatcher<'a, M: MolecularOps> {
    ops: &'a M,
    tolerance: f64,
    mode: MatchMode,
    references: &'a [ReferenceRow],
    by_parent: HashMap<&'a str, Vec<usize>>,
}

impl<'a, M: MolecularOps> MassMatcher<'a, M> {
    pub fn new(ops: &'a M, config: &MatcherConfig, references: &'a [ReferenceRow]) -> Self {
        let mut by_parent: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, row) in references.iter().enumerate() {
            by_parent.entry(row.parent_compound.as_str()).or_default().push(i);
        }
        MassMatcher {
            ops,
            tolerance: config.tolerance,
            mode: config.mode,
            references,
            by_parent,
        }
    }

    fn mass_of(&self, smiles: &str) -> Option<f64> {
        self.ops.parse(smiles).and_then(|s| self.ops.exact_mass(&s))
    }

    fn score(&self, index: usize, product: &NewCompoundRow, parent_mass: Option<f64>) -> Scored {
        let Some(product_mass) = self.mass_of(&product.product_smiles) else {
            return Scored::Unscoreable;
        };
        let quantity = match self.mode {
            MatchMode::Mass => product_mass,
            MatchMode::MassDiff => match parent_mass {
                Some(parent) => parent - product_mass,
                None => return Scored::Unscoreable,
            },
        };
        let candidates = self
            .by_parent
            .get(product.source_compound_id.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let records = candidates
            .iter()
            .filter(|&&r| within_tolerance(quantity, self.references[r].value, self.tolerance))
            .map(|&r| MatchRecord {
                product: index,
                reference: r,
                parent_mass,
                product_mass,
                mass_difference: parent_mass.map(|p| p - product_mass),
            })
            .collect();
        Scored::Matches(records)
    }

    /// Match every product. Records are ordered by product, then by
    /// reference row.
    pub fn run(&self, products: &[NewCompoundRow], workers: &Workers) -> MatchReport {
        let mut parent_masses: HashMap<&str, Option<f64>> = HashMap::new();
        for product in products {
            parent_masses
                .entry(product.source_compound_smiles.as_str())
                .or_insert_with(|| self.mass_of(&product.source_compound_smiles));
        }

        let indexed: Vec<(usize, &NewCompoundRow)> = products.iter().enumerate().collect();
        let scored = workers.map(&indexed, |&(i, product)| {
            let parent = parent_masses
                .get(product.source_compound_smiles.as_str())
                .copied()
                .flatten();
            self.score(i, product, parent)
        });

        let mut report = MatchReport::default();
        for (result, product) in scored.into_iter().zip(products) {
            match result {
                Scored::Matches(records) => report.records.extend(records),
                Scored::Unscoreable => report.unscoreable.push(product.product_id.clone()),
            }
        }
        if !report.unscoreable.is_empty() {
            log::info!(
                "{} product(s) could not be scored: {}",
                report.unscoreable.len(),
                report.unscoreable.join(", ")
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockChem;

    fn product(id: &str, compound: &str, smiles: &str) -> NewCompoundRow {
        NewCompoundRow {
            source_compound_id: compound.into(),
            source_compound_smiles: format!("{compound}_smiles"),
            rule_ids: "r1".into(),
            product_id: id.into(),
            product_smiles: smiles.into(),
            reaction_identities: "x>>y".into(),
            classification_codes: "1.1.1.1".into(),
        }
    }

    fn reference(parent: &str, value: f64) -> ReferenceRow {
        ReferenceRow {
            parent_compound: parent.into(),
            parent_smiles: format!("{parent}_smiles"),
            value,
            raw_value: value.to_string(),
        }
    }

    fn run(chem: &MockChem, config: &MatcherConfig, products: &[NewCompoundRow], refs: &[ReferenceRow]) -> MatchReport {
        let workers = Workers::new(2).unwrap();
        MassMatcher::new(chem, config, refs).run(products, &workers)
    }

    #[test]
    fn ambiguous_matches_all_kept() {
        let chem = MockChem::new().mass("P", 180.063).mass("c1_smiles", 200.0);
        let refs = vec![
            reference("c1", 180.08),
            reference("c1", 180.05),
            reference("c1", 180.10),
        ];
        let report = run(&chem, &MatcherConfig::default(), &[product("p1", "c1", "P")], &refs);
        let matched: Vec<usize> = report.records.iter().map(|r| r.reference).collect();
        assert_eq!(matched, vec![0, 1]);
        assert!(report.unscoreable.is_empty());
        let diff = report.records[0].mass_difference.unwrap();
        assert!((diff - 19.937).abs() < 1e-9);
    }

    #[test]
    fn one_row_matches_many_products() {
        let chem = MockChem::new().mass("A", 100.0).mass("B", 100.01);
        let refs = vec![reference("c1", 100.005)];
        let products = [product("a", "c1", "A"), product("b", "c1", "B")];
        let report = run(&chem, &MatcherConfig::default(), &products, &refs);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[1].product, 1);
    }

    #[test]
    fn provenance_gate() {
        let chem = MockChem::new().mass("P", 100.0);
        let refs = vec![reference("c2", 100.0)];
        let report = run(&chem, &MatcherConfig::default(), &[product("p", "c1", "P")], &refs);
        assert!(report.records.is_empty());
    }

    #[test]
    fn unscoreable_products_reported() {
        let chem = MockChem::new();
        let refs = vec![reference("c1", 100.0)];
        let report = run(&chem, &MatcherConfig::default(), &[product("p", "c1", "P")], &refs);
        assert!(report.records.is_empty());
        assert_eq!(report.unscoreable, vec!["p"]);
    }

    #[test]
    fn mass_difference_mode() {
        let chem = MockChem::new().mass("c1_smiles", 194.0804).mass("P", 180.0647);
        let config = MatcherConfig {
            mode: MatchMode::MassDiff,
            ..MatcherConfig::default()
        };
        let refs = vec![reference("c1", 14.02), reference("c1", 14.05)];
        let report = run(&chem, &config, &[product("p", "c1", "P")], &refs);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].reference, 0);

        // Without a parent mass the product cannot be scored in this mode.
        let chem = MockChem::new().mass("P", 180.0647);
        let report = run(&chem, &config, &[product("p", "c1", "P")], &refs);
        assert_eq!(report.unscoreable, vec!["p"]);
    }

    #[test]
    fn parent_mass_optional_in_mass_mode() {
        let chem = MockChem::new().mass("P", 50.0);
        let refs = vec![reference("c1", 50.0)];
        let report = run(&chem, &MatcherConfig::default(), &[product("p", "c1", "P")], &refs);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].parent_mass, None);
        assert_eq!(report.records[0].mass_difference, None);
    }

    #[test]
    fn boundary_is_inclusive() {
        assert!(within_tolerance(180.063, 180.083, 0.02));
        assert!(within_tolerance(100.0, 100.02, 0.02));
        assert!(within_tolerance(0.3, 0.1 + 0.2, 0.0));
        assert!(!within_tolerance(180.063, 180.10, 0.02));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn symmetric(a in 0.0f64..2000.0, b in 0.0f64..2000.0, tol in 0.0f64..1.0) {
            prop_assert_eq!(within_tolerance(a, b, tol), within_tolerance(b, a, tol));
        }

        #[test]
        fn exact_bound_matches(m in 50.0f64..1500.0, tol in 0.001f64..0.5) {
            prop_assert!(within_tolerance(m, m + tol, tol));
            prop_assert!(within_tolerance(m, m - tol, tol));
        }

        #[test]
        fn outside_bound_does_not_match(m in 50.0f64..1500.0, tol in 0.001f64..0.5, extra in 1e-6f64..1.0) {
            prop_assert!(!within_tolerance(m, m + tol + extra, tol));
        }
    }
}
