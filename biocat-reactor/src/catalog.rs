//! In-memory compound, rule and co-reactant tables.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use biocat_core::{BiocatError, Result};

/// Reactant-template token replaced by the compound under test.
pub const WILDCARD: &str = "Any";

/// Tag that keeps a rule under any tag filter.
pub const UNIVERSAL_TAG: &str = "spontaneous_reaction";

/// An input compound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compound {
    pub id: String,
    /// Structure text as loaded (after neutralization, if requested).
    pub smiles: String,
    pub neutralized: bool,
}

impl Compound {
    pub fn new(id: impl Into<String>, smiles: impl Into<String>) -> Self {
        Compound {
            id: id.into(),
            smiles: smiles.into(),
            neutralized: false,
        }
    }
}

/// A reaction rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionRule {
    pub internal_id: String,
    /// Ordered reactant tokens: [`WILDCARD`], a co-reactant id, or a literal
    /// structure.
    pub reactant_template: Vec<String>,
    /// Reaction pattern handed to the backend.
    pub pattern: String,
    pub classification_codes: Vec<String>,
    pub applicability_tags: BTreeSet<String>,
}

impl ReactionRule {
    /// Build a rule from its external `;`-joined fields. Empty and `nan`
    /// entries are dropped from codes and tags.
    pub fn from_fields(
        internal_id: &str,
        reactants: &str,
        pattern: &str,
        codes: &str,
        tags: &str,
    ) -> Self {
        ReactionRule {
            internal_id: internal_id.trim().to_string(),
            reactant_template: reactants
                .split(';')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect(),
            pattern: pattern.trim().to_string(),
            classification_codes: split_list(codes),
            applicability_tags: split_list(tags).into_iter().collect(),
        }
    }

    /// Classification codes in external form, or empty when there are none.
    pub fn codes_field(&self) -> String {
        self.classification_codes.join(";")
    }

    /// Whether the rule survives `filter`.
    pub fn applies_to(&self, filter: &TagFilter) -> bool {
        self.applicability_tags.contains(UNIVERSAL_TAG)
            || self
                .applicability_tags
                .iter()
                .any(|tag| filter.tags.contains(tag))
    }
}

/// Split a `;`-joined cell, dropping blanks and `nan`.
pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("nan"))
        .map(String::from)
        .collect()
}

/// The set of applicability tags a run is narrowed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    tags: BTreeSet<String>,
}

impl TagFilter {
    /// A filter over `tags`; the universal tag is always included.
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tags: BTreeSet<String> = tags
            .into_iter()
            .map(Into::into)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        tags.insert(UNIVERSAL_TAG.to_string());
        TagFilter { tags }
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }
}

/// Compounds, rules and co-reactants for one run. Ids are unique within
/// each table.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    compounds: Vec<Compound>,
    rules: Vec<ReactionRule>,
    coreactants: BTreeMap<String, String>,
}

impl Catalog {
    pub fn new(
        compounds: Vec<Compound>,
        rules: Vec<ReactionRule>,
        coreactants: BTreeMap<String, String>,
    ) -> Result<Self> {
        ensure_unique("compound", compounds.iter().map(|c| c.id.as_str()))?;
        ensure_unique("reaction rule", rules.iter().map(|r| r.internal_id.as_str()))?;
        Ok(Catalog {
            compounds,
            rules,
            coreactants,
        })
    }

    /// Keep only the rules that apply under `filter`.
    pub fn with_tag_filter(mut self, filter: Option<&TagFilter>) -> Self {
        if let Some(filter) = filter {
            let before = self.rules.len();
            self.rules.retain(|rule| rule.applies_to(filter));
            log::info!(
                "tag filter kept {} of {} reaction rules",
                self.rules.len(),
                before
            );
        }
        self
    }

    pub fn compounds(&self) -> &[Compound] {
        &self.compounds
    }

    pub fn rules(&self) -> &[ReactionRule] {
        &self.rules
    }

    /// Structure text registered for a co-reactant id.
    pub fn coreactant(&self, id: &str) -> Option<&str> {
        self.coreactants.get(id).map(String::as_str)
    }

    /// Number of (compound, rule) pairs to evaluate.
    pub fn pair_count(&self) -> usize {
        self.compounds.len() * self.rules.len()
    }
}

fn ensure_unique<'a>(kind: &str, ids: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(BiocatError::InvalidInput(format!("duplicate {kind} id '{id}'")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str, tags: &str) -> ReactionRule {
        ReactionRule::from_fields(id, "Any", "[C:1]>>[C:1]O", "1.1.1.1", tags)
    }

    #[test]
    fn rule_fields_are_split() {
        let rule = ReactionRule::from_fields(
            " r1 ",
            "Any; O=C=O ",
            "[C:1]>>[C:1]",
            "1.1.1.1;nan;;2.3.1.5",
            "hsa;NaN;eco",
        );
        assert_eq!(rule.internal_id, "r1");
        assert_eq!(rule.reactant_template, vec!["Any", "O=C=O"]);
        assert_eq!(rule.classification_codes, vec!["1.1.1.1", "2.3.1.5"]);
        assert_eq!(rule.codes_field(), "1.1.1.1;2.3.1.5");
        assert_eq!(rule.applicability_tags.len(), 2);
    }

    #[test]
    fn tag_filter_keeps_intersecting_and_universal() {
        let catalog = Catalog::new(
            vec![Compound::new("c1", "CCO")],
            vec![
                rule("human", "hsa"),
                rule("bacterial", "eco"),
                rule("spont", UNIVERSAL_TAG),
                rule("untagged", ""),
            ],
            BTreeMap::new(),
        )
        .unwrap();
        let filter = TagFilter::new(["hsa"]);
        let filtered = catalog.with_tag_filter(Some(&filter));
        let kept: Vec<&str> = filtered.rules().iter().map(|r| r.internal_id.as_str()).collect();
        assert_eq!(kept, vec!["human", "spont"]);
    }

    #[test]
    fn no_filter_keeps_everything() {
        let catalog = Catalog::new(vec![], vec![rule("a", ""), rule("b", "x")], BTreeMap::new())
            .unwrap()
            .with_tag_filter(None);
        assert_eq!(catalog.rules().len(), 2);
        assert_eq!(catalog.pair_count(), 0);
    }

    #[test]
    fn duplicate_ids_rejected() {
        let dup = Catalog::new(
            vec![Compound::new("c1", "CCO"), Compound::new("c1", "CCN")],
            vec![],
            BTreeMap::new(),
        );
        assert!(matches!(dup, Err(BiocatError::InvalidInput(_))));
        let dup = Catalog::new(vec![], vec![rule("r", ""), rule("r", "")], BTreeMap::new());
        assert!(dup.is_err());
    }

    #[test]
    fn coreactant_lookup() {
        let mut co = BTreeMap::new();
        co.insert("NADH".to_string(), "NC(=O)C1=CN(C)C=CC1".to_string());
        let catalog = Catalog::new(vec![], vec![], co).unwrap();
        assert!(catalog.coreactant("NADH").is_some());
        assert!(catalog.coreactant("ATP").is_none());
    }
}
