//! Candidate generation: one (compound, rule) pair in, raw outcomes out.

use std::collections::HashSet;

use biocat_core::MolecularOps;

use crate::catalog::{Catalog, ReactionRule, WILDCARD};

/// One raw application result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateOutcome {
    /// Canonical product structures, in product-template order.
    pub products: Vec<String>,
    /// `reactants>>products` over canonical structures; the dedup key.
    pub identity: String,
}

/// Resolve a rule's reactant template for `compound`.
///
/// The wildcard becomes the compound itself. Any other token is looked up as
/// a co-reactant id first and otherwise parsed as a literal structure.
/// Returns `None` when a token cannot be resolved.
pub fn resolve_reactants<M: MolecularOps>(
    ops: &M,
    compound: &M::Structure,
    rule: &ReactionRule,
    catalog: &Catalog,
) -> Option<Vec<M::Structure>> {
    if rule.reactant_template.is_empty() {
        log::debug!("rule {}: empty reactant template", rule.internal_id);
        return None;
    }
    rule.reactant_template
        .iter()
        .map(|token| {
            if token == WILDCARD {
                return Some(compound.clone());
            }
            let text = catalog.coreactant(token).unwrap_or(token.as_str());
            let resolved = ops.parse(text);
            if resolved.is_none() {
                log::debug!(
                    "rule {}: cannot resolve co-reactant '{}'",
                    rule.internal_id,
                    token
                );
            }
            resolved
        })
        .collect()
}

/// Apply `rule` (pre-parsed as `compiled`) to `compound`.
///
/// Never fails: unresolvable reactants or an inapplicable rule yield an empty
/// result. Outcomes with identical identities are collapsed, keeping the first.
pub fn generate<M: MolecularOps>(
    ops: &M,
    compound: &M::Structure,
    rule: &ReactionRule,
    compiled: &M::Rule,
    catalog: &Catalog,
) -> Vec<CandidateOutcome> {
    let Some(reactants) = resolve_reactants(ops, compound, rule, catalog) else {
        return Vec::new();
    };
    let reactant_side = reactants
        .iter()
        .map(|r| ops.canonicalize(r))
        .collect::<Vec<_>>()
        .join(".");

    let mut seen = HashSet::new();
    let mut outcomes = Vec::new();
    for raw in ops.apply_rule(&reactants, compiled) {
        let products: Vec<String> = raw
            .iter()
            .map(|p| strip_stray_delimiter(&ops.canonicalize(p)).to_string())
            .collect();
        if products.is_empty() {
            continue;
        }
        let identity = format!("{}>>{}", reactant_side, products.join("."));
        if seen.insert(identity.clone()) {
            outcomes.push(CandidateOutcome { products, identity });
        }
    }
    outcomes
}

/// Drop one stray leading `(` or trailing `)` when the total count of
/// parentheses is odd. Deeper imbalance is left for re-parsing to reject.
///
/// Applied to every product text a backend hands back. A backend whose
/// writer always balances its branches, like the native one, never trips it.
pub fn strip_stray_delimiter(text: &str) -> &str {
    let count = text.chars().filter(|&c| c == '(' || c == ')').count();
    if count % 2 == 0 {
        return text;
    }
    if let Some(rest) = text.strip_prefix('(') {
        rest
    } else if let Some(rest) = text.strip_suffix(')') {
        rest
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockChem;
    use std::collections::BTreeMap;

    fn rule(reactants: &str) -> ReactionRule {
        ReactionRule::from_fields("r1", reactants, "rxn", "1.1.1.1", "")
    }

    fn catalog() -> Catalog {
        let mut co = BTreeMap::new();
        co.insert("water".to_string(), "O".to_string());
        Catalog::new(vec![], vec![], co).unwrap()
    }

    #[test]
    fn wildcard_and_coreactants_resolve() {
        let chem = MockChem::new();
        let compound = "CCO".to_string();
        let reactants = resolve_reactants(&chem, &compound, &rule("Any;water;N"), &catalog());
        assert_eq!(
            reactants,
            Some(vec!["CCO".to_string(), "O".to_string(), "N".to_string()])
        );
    }

    #[test]
    fn unresolvable_token_yields_nothing() {
        let chem = MockChem::new()
            .invalid("NADPH")
            .outcome("rxn", &["CCO", "NADPH"], &["CC=O"]);
        let compound = "CCO".to_string();
        let r = rule("Any;NADPH");
        assert!(resolve_reactants(&chem, &compound, &r, &catalog()).is_none());
        assert!(generate(&chem, &compound, &r, &"rxn".to_string(), &catalog()).is_empty());
        assert!(resolve_reactants(&chem, &compound, &rule(""), &catalog()).is_none());
    }

    #[test]
    fn identities_are_built_and_deduplicated() {
        let chem = MockChem::new()
            .canonical("OCC", "CCO")
            .outcome("rxn", &["OCC", "O"], &["CC=O", "O"])
            .outcome("rxn", &["OCC", "O"], &["CC=O", "O"])
            .outcome("rxn", &["OCC", "O"], &["OCC=O"]);
        let compound = "OCC".to_string();
        let out = generate(&chem, &compound, &rule("Any;water"), &"rxn".to_string(), &catalog());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].identity, "CCO.O>>CC=O.O");
        assert_eq!(out[0].products, vec!["CC=O", "O"]);
        assert_eq!(out[1].identity, "CCO.O>>OCC=O");
    }

    #[test]
    fn inapplicable_rule_is_empty() {
        let chem = MockChem::new();
        let compound = "CCO".to_string();
        assert!(generate(&chem, &compound, &rule("Any"), &"rxn".to_string(), &catalog()).is_empty());
    }

    #[test]
    fn product_text_loses_a_stray_delimiter() {
        let chem = MockChem::new()
            .outcome("rxn", &["CCO"], &["(CC=O"])
            .outcome("rxn", &["CCO"], &["CC(C)=O)", "O"]);
        let compound = "CCO".to_string();
        let out = generate(&chem, &compound, &rule("Any"), &"rxn".to_string(), &catalog());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].products, vec!["CC=O"]);
        assert_eq!(out[0].identity, "CCO>>CC=O");
        assert_eq!(out[1].products, vec!["CC(C)=O", "O"]);
    }

    #[test]
    fn stray_delimiters() {
        assert_eq!(strip_stray_delimiter("(CCO"), "CCO");
        assert_eq!(strip_stray_delimiter("CC(C)O)"), "CC(C)O");
        assert_eq!(strip_stray_delimiter("CC(C)O"), "CC(C)O");
        // Odd count without a leading or trailing delimiter is left alone.
        assert_eq!(strip_stray_delimiter("CC(CO"), "CC(CO");
        assert_eq!(strip_stray_delimiter(""), "");
    }
}
