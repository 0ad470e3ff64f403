//! The enumeration pipeline: generate, filter, select, neutralize, reconcile.

use std::path::Path;
use std::time::{Duration, Instant};

use biocat_core::{MolecularOps, Result, Summarizable};

use crate::catalog::Catalog;
use crate::config::ReactorConfig;
use crate::filter::FilterPipeline;
use crate::generate::generate;
use crate::loaders;
use crate::output::NewCompoundRow;
use crate::reconcile::{reconcile, select_representative, Product, Provenance, ProvenanceKey};
use crate::workers::Workers;

/// Products of one enumeration run.
#[derive(Debug, Clone)]
pub struct ReactionReport {
    pub products: Vec<Product>,
    pub pairs: usize,
    pub elapsed: Duration,
}

impl ReactionReport {
    pub fn rows(&self) -> Vec<NewCompoundRow> {
        self.products.iter().map(Product::to_row).collect()
    }
}

impl Summarizable for ReactionReport {
    fn summary(&self) -> String {
        format!(
            "{} products from {} pairs in {:.2}s",
            self.products.len(),
            self.pairs,
            self.elapsed.as_secs_f64()
        )
    }
}

/// A prepared enumeration run.
///
/// Everything is resolved at construction: compound structures are parsed,
/// rule patterns compiled, reject lists loaded and the worker pool built.
/// The reactor is immutable afterwards; a different configuration needs a new
/// reactor.
pub struct BioReactor<'a, M: MolecularOps> {
    ops: &'a M,
    config: ReactorConfig,
    catalog: Catalog,
    filter: FilterPipeline<M>,
    structures: Vec<Option<M::Structure>>,
    compiled: Vec<Option<M::Rule>>,
    workers: Workers,
}

impl<'a, M: MolecularOps> BioReactor<'a, M> {
    /// Build a reactor over an already loaded catalog. `byproducts` must be
    /// canonical structures.
    pub fn new(
        ops: &'a M,
        config: ReactorConfig,
        catalog: Catalog,
        byproducts: Vec<String>,
        patterns: &[String],
    ) -> Result<Self> {
        let filter = FilterPipeline::new(ops, config.min_atom_count, byproducts, patterns);
        let structures = catalog
            .compounds()
            .iter()
            .map(|c| {
                let parsed = ops.parse(&c.smiles);
                if parsed.is_none() {
                    log::debug!("compound {}: unparseable structure '{}'", c.id, c.smiles);
                }
                parsed
            })
            .collect();
        let compiled = catalog
            .rules()
            .iter()
            .map(|r| {
                let parsed = ops.parse_rule(&r.pattern);
                if parsed.is_none() {
                    log::warn!("rule {}: unparseable pattern '{}'", r.internal_id, r.pattern);
                }
                parsed
            })
            .collect();
        let workers = Workers::new(config.parallelism)?;
        Ok(BioReactor {
            ops,
            config,
            catalog,
            filter,
            structures,
            compiled,
            workers,
        })
    }

    /// Load every table named by `config` and build a reactor.
    pub fn load(
        ops: &'a M,
        compounds: &str,
        reaction_rules: &Path,
        config: ReactorConfig,
    ) -> Result<Self> {
        let compound_list = loaders::load_compounds(ops, compounds, config.neutralize)?;
        let rules = loaders::load_rules(reaction_rules)?;
        let coreactants = match &config.coreactants {
            Some(path) => loaders::load_coreactants(path)?,
            None => Default::default(),
        };
        let tag_filter = config
            .tag_filter
            .as_deref()
            .map(loaders::load_tag_filter)
            .transpose()?;
        let byproducts = match &config.byproducts {
            Some(path) => loaders::load_byproducts(ops, path)?,
            None => Vec::new(),
        };
        let patterns = match &config.patterns {
            Some(path) => loaders::load_patterns(path)?,
            None => Vec::new(),
        };
        let catalog =
            Catalog::new(compound_list, rules, coreactants)?.with_tag_filter(tag_filter.as_ref());
        log::info!(
            "loaded {} compounds and {} reaction rules",
            catalog.compounds().len(),
            catalog.rules().len()
        );
        Self::new(ops, config, catalog, byproducts, &patterns)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &ReactorConfig {
        &self.config
    }

    pub fn filter(&self) -> &FilterPipeline<M> {
        &self.filter
    }

    /// Evaluate every (compound, rule) pair and reconcile the products.
    pub fn react(&self) -> ReactionReport {
        let start = Instant::now();
        let n_rules = self.catalog.rules().len();
        let pairs: Vec<(usize, usize)> = (0..self.catalog.compounds().len())
            .flat_map(|c| (0..n_rules).map(move |r| (c, r)))
            .collect();
        log::info!(
            "evaluating {} compound/rule pairs on {} worker(s)",
            pairs.len(),
            self.workers.threads()
        );

        let per_pair = self.workers.map(&pairs, |&(c, r)| self.react_pair(c, r));
        let products = reconcile(per_pair.into_iter().flatten());

        let report = ReactionReport {
            products,
            pairs: pairs.len(),
            elapsed: start.elapsed(),
        };
        log::info!("{}", report.summary());
        report
    }

    /// Products of one pair, before cross-pair reconciliation.
    fn react_pair(&self, c: usize, r: usize) -> Vec<Product> {
        let compound = &self.catalog.compounds()[c];
        let rule = &self.catalog.rules()[r];
        let (Some(structure), Some(compiled)) = (&self.structures[c], &self.compiled[r]) else {
            return Vec::new();
        };

        let mut products = Vec::new();
        for (o, outcome) in generate(self.ops, structure, rule, compiled, &self.catalog)
            .into_iter()
            .enumerate()
        {
            let Some(pick) = select_representative(self.ops, structure, &outcome.products) else {
                continue;
            };
            let candidate = &outcome.products[pick];
            let accepted = match self.filter.check(self.ops, candidate) {
                Ok(accepted) => accepted,
                Err(stage) => {
                    log::debug!(
                        "{} x {}: '{}' rejected by {}",
                        compound.id,
                        rule.internal_id,
                        candidate,
                        stage
                    );
                    continue;
                }
            };
            let product_structure = if self.config.neutralize {
                self.ops.neutralize(&accepted)
            } else {
                candidate.clone()
            };
            products.push(Product::new(
                compound.id.clone(),
                compound.smiles.clone(),
                product_structure,
                ProvenanceKey {
                    compound: c,
                    rule: r,
                    outcome: o,
                },
                Provenance {
                    rule_id: rule.internal_id.clone(),
                    reaction_identity: outcome.identity,
                    classification_codes: rule.codes_field(),
                },
            ));
        }
        products
    }
}
