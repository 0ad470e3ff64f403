//! A programmable [`MolecularOps`] for exercising the pipeline without a
//! chemistry backend. Structures, patterns and rules are plain strings.

use std::collections::{HashMap, HashSet};

use biocat_core::MolecularOps;

#[derive(Debug, Clone, Default)]
pub struct MockChem {
    invalid: HashSet<String>,
    canonical: HashMap<String, String>,
    heavy_atoms: HashMap<String, usize>,
    masses: HashMap<String, f64>,
    similarities: HashMap<(String, String), f64>,
    neutral: HashMap<String, String>,
    outcomes: HashMap<(String, Vec<String>), Vec<Vec<String>>>,
}

impl MockChem {
    pub fn new() -> Self {
        MockChem::default()
    }

    /// `text` fails to parse as a structure, pattern or rule.
    pub fn invalid(mut self, text: &str) -> Self {
        self.invalid.insert(text.to_string());
        self
    }

    pub fn canonical(mut self, text: &str, canonical: &str) -> Self {
        self.canonical.insert(text.to_string(), canonical.to_string());
        self
    }

    pub fn heavy_atoms(mut self, text: &str, count: usize) -> Self {
        self.heavy_atoms.insert(text.to_string(), count);
        self
    }

    pub fn mass(mut self, text: &str, mass: f64) -> Self {
        self.masses.insert(text.to_string(), mass);
        self
    }

    pub fn similarity(mut self, a: &str, b: &str, score: f64) -> Self {
        self.similarities.insert((a.to_string(), b.to_string()), score);
        self
    }

    pub fn neutral(mut self, text: &str, neutral: &str) -> Self {
        self.neutral.insert(text.to_string(), neutral.to_string());
        self
    }

    /// Applying `rule` to exactly `reactants` yields one more outcome.
    pub fn outcome(mut self, rule: &str, reactants: &[&str], products: &[&str]) -> Self {
        let key = (
            rule.to_string(),
            reactants.iter().map(|s| s.to_string()).collect(),
        );
        self.outcomes
            .entry(key)
            .or_default()
            .push(products.iter().map(|s| s.to_string()).collect());
        self
    }

    fn accepts(&self, text: &str) -> bool {
        !text.is_empty() && !text.contains(char::is_whitespace) && !self.invalid.contains(text)
    }
}

impl MolecularOps for MockChem {
    type Structure = String;
    type Pattern = String;
    type Rule = String;

    fn parse(&self, text: &str) -> Option<String> {
        self.accepts(text).then(|| text.to_string())
    }

    fn canonicalize(&self, structure: &String) -> String {
        self.canonical
            .get(structure)
            .cloned()
            .unwrap_or_else(|| structure.clone())
    }

    fn parse_pattern(&self, text: &str) -> Option<String> {
        self.accepts(text).then(|| text.to_string())
    }

    fn substructure_match(&self, structure: &String, pattern: &String) -> bool {
        structure.contains(pattern.as_str())
    }

    /// Defaults to the number of ASCII letters.
    fn heavy_atom_count(&self, structure: &String) -> usize {
        self.heavy_atoms
            .get(structure)
            .copied()
            .unwrap_or_else(|| structure.chars().filter(char::is_ascii_alphabetic).count())
    }

    fn exact_mass(&self, structure: &String) -> Option<f64> {
        self.masses.get(structure).copied()
    }

    /// Symmetric lookup; 1.0 for identical text, otherwise 0.0 by default.
    fn similarity(&self, a: &String, b: &String) -> f64 {
        if a == b {
            return 1.0;
        }
        self.similarities
            .get(&(a.clone(), b.clone()))
            .or_else(|| self.similarities.get(&(b.clone(), a.clone())))
            .copied()
            .unwrap_or(0.0)
    }

    fn neutralize(&self, structure: &String) -> String {
        self.neutral
            .get(structure)
            .cloned()
            .unwrap_or_else(|| self.canonicalize(structure))
    }

    fn parse_rule(&self, text: &str) -> Option<String> {
        self.accepts(text).then(|| text.to_string())
    }

    fn apply_rule(&self, reactants: &[String], rule: &String) -> Vec<Vec<String>> {
        self.outcomes
            .get(&(rule.clone(), reactants.to_vec()))
            .cloned()
            .unwrap_or_default()
    }
}
