//! The product filter pipeline.
//!
//! Stages run in a fixed order and stop at the first rejection:
//!
//! 1. parse validity (always on)
//! 2. minimum heavy-atom count (off when the threshold is 0)
//! 3. byproduct identity (off when the reject list is empty)
//! 4. pattern exclusion (off when the pattern list is empty)

use std::collections::HashSet;
use std::fmt;

use biocat_core::MolecularOps;

/// A filter stage, reported with each rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    ParseValidity,
    MinAtomCount,
    Byproduct,
    PatternExclusion,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ParseValidity => "parse validity",
            Stage::MinAtomCount => "minimum atom count",
            Stage::Byproduct => "byproduct",
            Stage::PatternExclusion => "pattern exclusion",
        };
        f.write_str(name)
    }
}

/// Accept/reject chain over candidate product structures.
pub struct FilterPipeline<M: MolecularOps> {
    stages: Vec<Stage>,
    min_atom_count: usize,
    byproducts: HashSet<String>,
    patterns: Vec<M::Pattern>,
}

impl<M: MolecularOps> FilterPipeline<M> {
    /// Build a pipeline. `byproducts` must already be canonical; `patterns`
    /// are parsed here and unparseable ones are dropped with a warning.
    pub fn new(ops: &M, min_atom_count: usize, byproducts: Vec<String>, patterns: &[String]) -> Self {
        let patterns: Vec<M::Pattern> = patterns
            .iter()
            .filter_map(|text| {
                let parsed = ops.parse_pattern(text);
                if parsed.is_none() {
                    log::warn!("dropping unparseable reject pattern '{text}'");
                }
                parsed
            })
            .collect();
        let byproducts: HashSet<String> = byproducts.into_iter().collect();

        let mut stages = vec![Stage::ParseValidity];
        if min_atom_count > 0 {
            stages.push(Stage::MinAtomCount);
        }
        if !byproducts.is_empty() {
            stages.push(Stage::Byproduct);
        }
        if !patterns.is_empty() {
            stages.push(Stage::PatternExclusion);
        }

        FilterPipeline {
            stages,
            min_atom_count,
            byproducts,
            patterns,
        }
    }

    /// A pipeline with only the parse-validity stage.
    pub fn permissive(ops: &M) -> Self {
        Self::new(ops, 0, Vec::new(), &[])
    }

    /// Enabled stages, in execution order.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Run the pipeline over `text`. On acceptance the parsed structure is
    /// returned; otherwise the stage that rejected it.
    pub fn check(&self, ops: &M, text: &str) -> Result<M::Structure, Stage> {
        let parsed = if text.contains('*') {
            None
        } else {
            ops.parse(text)
        };
        for &stage in &self.stages {
            let rejected = match stage {
                Stage::ParseValidity => parsed.is_none(),
                Stage::MinAtomCount => parsed
                    .as_ref()
                    .map_or(true, |s| ops.heavy_atom_count(s) < self.min_atom_count),
                Stage::Byproduct => parsed
                    .as_ref()
                    .map_or(false, |s| self.byproducts.contains(&ops.canonicalize(s))),
                // An unparseable structure counts as a pattern hit.
                Stage::PatternExclusion => parsed.as_ref().map_or(true, |s| {
                    self.patterns.iter().any(|p| ops.substructure_match(s, p))
                }),
            };
            if rejected {
                return Err(stage);
            }
        }
        parsed.ok_or(Stage::ParseValidity)
    }

    /// Whether `text` passes every enabled stage.
    pub fn accept(&self, ops: &M, text: &str) -> bool {
        self.check(ops, text).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockChem;

    #[test]
    fn stages_enabled_by_configuration() {
        let chem = MockChem::new();
        assert_eq!(FilterPipeline::permissive(&chem).stages(), &[Stage::ParseValidity]);
        let all = FilterPipeline::new(&chem, 5, vec!["O".into()], &["N".into()]);
        assert_eq!(
            all.stages(),
            &[
                Stage::ParseValidity,
                Stage::MinAtomCount,
                Stage::Byproduct,
                Stage::PatternExclusion
            ]
        );
    }

    #[test]
    fn parse_validity() {
        let chem = MockChem::new().invalid("C1CC");
        let pipeline = FilterPipeline::permissive(&chem);
        assert_eq!(pipeline.check(&chem, "C1CC"), Err(Stage::ParseValidity));
        assert_eq!(pipeline.check(&chem, "CC*"), Err(Stage::ParseValidity));
        assert_eq!(pipeline.check(&chem, ""), Err(Stage::ParseValidity));
        assert_eq!(pipeline.check(&chem, "CCO"), Ok("CCO".to_string()));
    }

    #[test]
    fn min_atom_count() {
        let chem = MockChem::new();
        let pipeline = FilterPipeline::new(&chem, 5, vec![], &[]);
        assert_eq!(pipeline.check(&chem, "CCCC"), Err(Stage::MinAtomCount));
        assert!(pipeline.accept(&chem, "CCCCC"));
        // The count comes from the backend, not the text length.
        let chem = MockChem::new().heavy_atoms("Cl[Se]Br", 3).heavy_atoms("CCCC", 6);
        assert_eq!(pipeline.check(&chem, "Cl[Se]Br"), Err(Stage::MinAtomCount));
        assert!(pipeline.accept(&chem, "CCCC"));
    }

    #[test]
    fn zero_threshold_disables_size_check() {
        let chem = MockChem::new();
        let pipeline = FilterPipeline::new(&chem, 0, vec![], &[]);
        assert!(pipeline.accept(&chem, "O"));
    }

    #[test]
    fn byproduct_compared_by_canonical_identity() {
        let chem = MockChem::new().canonical("OC(C)=O", "CC(=O)O");
        let pipeline = FilterPipeline::new(&chem, 0, vec!["CC(=O)O".into()], &[]);
        assert_eq!(pipeline.check(&chem, "OC(C)=O"), Err(Stage::Byproduct));
        // Identity, not substructure.
        assert!(pipeline.accept(&chem, "CCC(=O)O"));
    }

    #[test]
    fn pattern_exclusion() {
        let chem = MockChem::new().invalid("[bad");
        let pipeline = FilterPipeline::new(&chem, 0, vec![], &["[N+]".into(), "[bad".into()]);
        assert_eq!(pipeline.stages().len(), 2);
        assert_eq!(pipeline.check(&chem, "C[N+](=O)[O-]"), Err(Stage::PatternExclusion));
        assert!(pipeline.accept(&chem, "CCN"));
    }

    #[test]
    fn first_rejecting_stage_is_reported() {
        let chem = MockChem::new();
        let pipeline = FilterPipeline::new(&chem, 10, vec!["CO".into()], &["O".into()]);
        assert_eq!(pipeline.check(&chem, "CO"), Err(Stage::MinAtomCount));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::testing::MockChem;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn below_threshold_always_rejected(
            text in "[CNOS]{1,12}",
            min in 1usize..15,
            with_byproducts in any::<bool>(),
            with_patterns in any::<bool>(),
        ) {
            let chem = MockChem::new();
            let byproducts = if with_byproducts { vec!["CCCCCCCCCCCCCCCCCC".to_string()] } else { vec![] };
            let patterns = if with_patterns { vec!["P".to_string()] } else { vec![] };
            let pipeline = FilterPipeline::new(&chem, min, byproducts, &patterns);
            if chem.heavy_atom_count(&text) < min {
                prop_assert!(!pipeline.accept(&chem, &text));
            }
        }

        #[test]
        fn raising_the_threshold_never_admits_more(text in "[CNO]{1,12}", min in 0usize..12) {
            let chem = MockChem::new();
            let lower = FilterPipeline::new(&chem, min, vec![], &[]);
            let higher = FilterPipeline::new(&chem, min + 1, vec![], &[]);
            if higher.accept(&chem, &text) {
                prop_assert!(lower.accept(&chem, &text));
            }
        }
    }
}
