//! Core trait definitions for the biocatalyzer workspace.
//!
//! These traits define the contracts that domain types implement across crates.

/// A type whose identity can be derived from its content via cryptographic hash.
pub trait ContentAddressable {
    /// Return the content hash as a hex string (e.g. SHA-256).
    fn content_hash(&self) -> String;
}

/// A type that can produce a summary of its contents.
pub trait Summarizable {
    /// A one-line summary suitable for display.
    fn summary(&self) -> String;
}

/// The molecular capability set the enumeration core is written against.
///
/// Structures, patterns and rules are opaque to the caller; only the backend
/// knows how to build and interpret them. A single backend value is shared
/// read-only by every worker, so implementations must not keep per-call state.
///
/// Every operation is total: failures are reported as `None`, `false` or an
/// empty result, never as a panic or error.
pub trait MolecularOps: Send + Sync {
    /// A parsed molecular structure.
    type Structure: Clone + Send + Sync;
    /// A parsed substructure query.
    type Pattern: Send + Sync;
    /// A parsed reaction rule.
    type Rule: Send + Sync;

    /// Parse a textual structure, or `None` if it is not a valid molecule.
    fn parse(&self, text: &str) -> Option<Self::Structure>;

    /// Canonical textual form. Two structures are the same molecule iff their
    /// canonical forms are equal.
    fn canonicalize(&self, structure: &Self::Structure) -> String;

    /// Parse a substructure pattern.
    fn parse_pattern(&self, text: &str) -> Option<Self::Pattern>;

    /// Whether `pattern` occurs anywhere in `structure`.
    fn substructure_match(&self, structure: &Self::Structure, pattern: &Self::Pattern) -> bool;

    /// Number of non-hydrogen atoms.
    fn heavy_atom_count(&self, structure: &Self::Structure) -> usize;

    /// Monoisotopic mass, or `None` when it cannot be computed.
    fn exact_mass(&self, structure: &Self::Structure) -> Option<f64>;

    /// Structural similarity in `[0, 1]`.
    fn similarity(&self, a: &Self::Structure, b: &Self::Structure) -> f64;

    /// Charge-neutralized canonical form.
    fn neutralize(&self, structure: &Self::Structure) -> String;

    /// Parse a reaction rule.
    fn parse_rule(&self, text: &str) -> Option<Self::Rule>;

    /// Apply `rule` to the ordered reactant list.
    ///
    /// Each inner vector is one reaction outcome holding one product structure
    /// per product template, in template order. Inapplicable rules yield an
    /// empty vector.
    fn apply_rule(&self, reactants: &[Self::Structure], rule: &Self::Rule) -> Vec<Vec<Self::Structure>>;
}
