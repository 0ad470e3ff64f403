//! [`MolecularOps`] implementation over the native molecule model.

use biocat_core::{MolecularOps, Summarizable};

use crate::canon::canonical_smiles;
use crate::fingerprint;
use crate::molecule::Molecule;
use crate::properties;
use crate::reaction::{parse_reaction, run_reaction, Reaction};
use crate::smarts::{has_match, parse_smarts, SmartsPattern};
use crate::smiles::parse_smiles;
use crate::standardize;

/// The native chemistry backend: SMILES structures, SMARTS patterns and
/// reaction SMARTS rules.
///
/// Stateless, so a single value can be shared by every worker.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeChem;

impl NativeChem {
    pub fn new() -> Self {
        NativeChem
    }
}

impl MolecularOps for NativeChem {
    type Structure = Molecule;
    type Pattern = SmartsPattern;
    type Rule = Reaction;

    fn parse(&self, text: &str) -> Option<Molecule> {
        match parse_smiles(text) {
            Ok(mol) => Some(mol),
            Err(e) => {
                log::trace!("unparseable structure {text:?}: {e}");
                None
            }
        }
    }

    fn canonicalize(&self, structure: &Molecule) -> String {
        canonical_smiles(structure)
    }

    fn parse_pattern(&self, text: &str) -> Option<SmartsPattern> {
        parse_smarts(text).ok()
    }

    fn substructure_match(&self, structure: &Molecule, pattern: &SmartsPattern) -> bool {
        has_match(structure, pattern)
    }

    fn heavy_atom_count(&self, structure: &Molecule) -> usize {
        structure.heavy_atom_count()
    }

    fn exact_mass(&self, structure: &Molecule) -> Option<f64> {
        properties::exact_mass(structure)
    }

    fn similarity(&self, a: &Molecule, b: &Molecule) -> f64 {
        fingerprint::similarity(a, b)
    }

    fn neutralize(&self, structure: &Molecule) -> String {
        canonical_smiles(&standardize::neutralize(structure))
    }

    fn parse_rule(&self, text: &str) -> Option<Reaction> {
        match parse_reaction(text) {
            Ok(rule) => Some(rule),
            Err(e) => {
                log::trace!("unparseable rule {text:?}: {e}");
                None
            }
        }
    }

    fn apply_rule(&self, reactants: &[Molecule], rule: &Reaction) -> Vec<Vec<Molecule>> {
        let outcomes = run_reaction(rule, reactants).unwrap_or_default();
        if log::log_enabled!(log::Level::Trace) {
            for product in outcomes.iter().flatten() {
                log::trace!("built {}", product.summary());
            }
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_canonicalize() {
        let chem = NativeChem::new();
        let a = chem.parse("OCC").unwrap();
        let b = chem.parse("CCO").unwrap();
        assert_eq!(chem.canonicalize(&a), chem.canonicalize(&b));
        assert!(chem.parse("C1CC").is_none());
        assert!(chem.parse("not a molecule").is_none());
    }

    #[test]
    fn pattern_matching() {
        let chem = NativeChem::new();
        let phenol = chem.parse("Oc1ccccc1").unwrap();
        let hydroxyl = chem.parse_pattern("[OX2H]").unwrap();
        let amine = chem.parse_pattern("[NX3]").unwrap();
        assert!(chem.substructure_match(&phenol, &hydroxyl));
        assert!(!chem.substructure_match(&phenol, &amine));
        assert!(chem.parse_pattern("[C").is_none());
    }

    #[test]
    fn counts_and_mass() {
        let chem = NativeChem::new();
        let ethanol = chem.parse("CCO").unwrap();
        assert_eq!(chem.heavy_atom_count(&ethanol), 3);
        assert_eq!(chem.exact_mass(&ethanol), Some(46.0419));
    }

    #[test]
    fn similarity_bounds() {
        let chem = NativeChem::new();
        let a = chem.parse("CCO").unwrap();
        let b = chem.parse("c1ccccc1").unwrap();
        assert!((chem.similarity(&a, &a) - 1.0).abs() < 1e-12);
        let s = chem.similarity(&a, &b);
        assert!((0.0..1.0).contains(&s));
    }

    #[test]
    fn neutralize_returns_canonical_text() {
        let chem = NativeChem::new();
        let acetate = chem.parse("[O-]C(C)=O").unwrap();
        let acid = chem.parse("CC(=O)O").unwrap();
        assert_eq!(chem.neutralize(&acetate), chem.canonicalize(&acid));
    }

    #[test]
    fn apply_rule_end_to_end() {
        let chem = NativeChem::new();
        let rule = chem.parse_rule("[CH3:1][O:2][c:3]>>[OH:2][c:3]").unwrap();
        let anisole = chem.parse("COc1ccccc1").unwrap();
        let outcomes = chem.apply_rule(&[anisole], &rule);
        assert_eq!(outcomes.len(), 1);
        let phenol = chem.parse("Oc1ccccc1").unwrap();
        assert_eq!(chem.canonicalize(&outcomes[0][0]), chem.canonicalize(&phenol));
    }

    #[test]
    fn kekule_input_reacts_like_aromatic_input() {
        let chem = NativeChem::new();
        let rule = chem.parse_rule("[CH3:1][O:2][c:3]>>[OH:2][c:3]").unwrap();
        let anisole = chem.parse("COC1=CC=CC=C1").unwrap();
        assert_eq!(chem.canonicalize(&anisole), chem.canonicalize(&chem.parse("COc1ccccc1").unwrap()));
        let outcomes = chem.apply_rule(&[anisole], &rule);
        assert_eq!(outcomes.len(), 1);
        let phenol = chem.parse("OC1=CC=CC=C1").unwrap();
        assert_eq!(chem.canonicalize(&outcomes[0][0]), chem.canonicalize(&phenol));
    }

    #[test]
    fn enantiomers_give_distinct_products() {
        let chem = NativeChem::new();
        let rule = chem.parse_rule("[C:1][OH:2]>>[C:1][O:2]C").unwrap();
        let products: Vec<String> = ["C[C@H](O)CC", "C[C@@H](O)CC"]
            .iter()
            .map(|s| {
                let outcomes = chem.apply_rule(&[chem.parse(s).unwrap()], &rule);
                chem.canonicalize(&outcomes[0][0])
            })
            .collect();
        assert_ne!(products[0], products[1]);
        assert!(products.iter().all(|p| p.contains('@')));
    }

    #[test]
    fn apply_rule_wrong_arity_is_empty() {
        let chem = NativeChem::new();
        let rule = chem.parse_rule("[C:1][OH:2].[N:3]>>[C:1][N:3]").unwrap();
        let ethanol = chem.parse("CCO").unwrap();
        assert!(chem.apply_rule(&[ethanol], &rule).is_empty());
        assert!(chem.parse_rule("not a rule").is_none());
    }
}
