//! Biotransformation product enumeration and MS mass matching.
//!
//! Every (compound, rule) pair of a [`Catalog`] is expanded into candidate
//! reaction outcomes, each outcome is reduced to one representative product,
//! the product passes through a [`FilterPipeline`], and the survivors from all
//! pairs are reconciled into one record per (source compound, structure).
//! Reconciled products can then be matched against measured masses with a
//! [`MassMatcher`].
//!
//! The pipeline is generic over a [`biocat_core::MolecularOps`] backend.
//!
//! # Example
//!
//! ```no_run
//! use biocat_reactor::{run_pipeline, RunConfig};
//! # fn demo<M: biocat_core::MolecularOps>(chem: &M) -> biocat_core::Result<()> {
//! let mut config = RunConfig::new("COc1ccccc1;CCO", "rules.tsv", "results");
//! config.reactor.min_atom_count = 5;
//! let summary = run_pipeline(chem, &config)?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod filter;
pub mod generate;
pub mod loaders;
pub mod matcher;
pub mod output;
pub mod reactor;
pub mod reconcile;
pub mod run;
pub mod workers;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog::{Catalog, Compound, ReactionRule, TagFilter};
pub use config::{MatchMode, MatcherConfig, ReactorConfig, RunConfig};
pub use filter::{FilterPipeline, Stage};
pub use generate::{generate, CandidateOutcome};
pub use matcher::{MassMatcher, MatchRecord, MatchReport, ReferenceRow};
pub use output::{NewCompoundRow, MATCHES_FILE, NEW_COMPOUNDS_FILE};
pub use reactor::{BioReactor, ReactionReport};
pub use reconcile::{merge_fields, select_representative, Product};
pub use run::{run_matcher, run_pipeline, RunSummary};
pub use workers::Workers;
