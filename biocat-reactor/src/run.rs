//! End-to-end runs: `react` (enumerate, optionally match) and `match` alone.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use biocat_core::{BiocatError, MolecularOps, Result, Summarizable};

use crate::config::{MatcherConfig, RunConfig};
use crate::loaders;
use crate::matcher::MassMatcher;
use crate::output::{self, MATCHES_FILE, NEW_COMPOUNDS_FILE};
use crate::reactor::BioReactor;
use crate::workers::Workers;

/// Aggregate counts of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub output_dir: PathBuf,
    pub compounds: usize,
    /// Rules left after the tag filter.
    pub rules: usize,
    pub pairs: usize,
    pub products: usize,
    /// `None` when no matching was requested.
    pub matches: Option<usize>,
    pub unscoreable: usize,
    pub elapsed: Duration,
}

impl Summarizable for RunSummary {
    fn summary(&self) -> String {
        let mut line = format!(
            "{} compounds x {} rules = {} pairs -> {} products",
            self.compounds, self.rules, self.pairs, self.products
        );
        if let Some(matches) = self.matches {
            line.push_str(&format!(", {matches} matches ({} unscoreable)", self.unscoreable));
        }
        line.push_str(&format!(" in {:.2}s", self.elapsed.as_secs_f64()));
        line
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "output:      {}", self.output_dir.display())?;
        writeln!(f, "compounds:   {}", self.compounds)?;
        writeln!(f, "rules:       {}", self.rules)?;
        writeln!(f, "pairs:       {}", self.pairs)?;
        writeln!(f, "products:    {}", self.products)?;
        if let Some(matches) = self.matches {
            writeln!(f, "matches:     {matches}")?;
            writeln!(f, "unscoreable: {}", self.unscoreable)?;
        }
        write!(f, "elapsed:     {:.2}s", self.elapsed.as_secs_f64())
    }
}

/// Run the full pipeline described by `config`.
///
/// Every configuration error (bad option, missing path or column, existing
/// output) is reported before generation starts. Each table is written only
/// once its stage completes.
pub fn run_pipeline<M: MolecularOps>(ops: &M, config: &RunConfig) -> Result<RunSummary> {
    let start = Instant::now();
    config.validate()?;

    let reactor = BioReactor::load(
        ops,
        &config.compounds,
        &config.reaction_rules,
        config.reactor.clone(),
    )?;
    let references = match &config.ms_data {
        Some(path) => Some(loaders::load_ms_data(path, config.matcher.field())?),
        None => None,
    };

    let mut outputs = vec![NEW_COMPOUNDS_FILE];
    if references.is_some() {
        outputs.push(MATCHES_FILE);
    }
    output::prepare_output_dir(&config.output_dir, &outputs)?;

    let report = reactor.react();
    let rows = report.rows();
    output::write_new_compounds(&config.output_dir, &rows)?;

    let mut summary = RunSummary {
        output_dir: config.output_dir.clone(),
        compounds: reactor.catalog().compounds().len(),
        rules: reactor.catalog().rules().len(),
        pairs: report.pairs,
        products: rows.len(),
        matches: None,
        unscoreable: 0,
        elapsed: Duration::ZERO,
    };

    if let Some(references) = references {
        let workers = Workers::new(config.reactor.parallelism)?;
        let matched = MassMatcher::new(ops, &config.matcher, &references).run(&rows, &workers);
        output::write_matches(
            &config.output_dir,
            config.matcher.field(),
            &rows,
            &references,
            &matched.records,
        )?;
        summary.matches = Some(matched.records.len());
        summary.unscoreable = matched.unscoreable.len();
    }

    summary.elapsed = start.elapsed();
    log::info!("{}", summary.summary());
    Ok(summary)
}

/// Match an existing new-compounds table against MS data.
pub fn run_matcher<M: MolecularOps>(
    ops: &M,
    ms_data: &Path,
    new_compounds: &Path,
    output_dir: &Path,
    config: &MatcherConfig,
    parallelism: usize,
) -> Result<RunSummary> {
    let start = Instant::now();
    config.validate()?;
    for path in [ms_data, new_compounds] {
        if !path.exists() {
            return Err(BiocatError::NotFound(path.to_path_buf()));
        }
    }
    output::check_collisions(output_dir, &[MATCHES_FILE])?;

    let rows = loaders::load_new_compounds(new_compounds)?;
    let references = loaders::load_ms_data(ms_data, config.field())?;
    output::prepare_output_dir(output_dir, &[MATCHES_FILE])?;

    let workers = Workers::new(parallelism)?;
    let matched = MassMatcher::new(ops, config, &references).run(&rows, &workers);
    output::write_matches(output_dir, config.field(), &rows, &references, &matched.records)?;

    let mut compounds: Vec<&str> = rows.iter().map(|r| r.source_compound_id.as_str()).collect();
    compounds.sort_unstable();
    compounds.dedup();
    let summary = RunSummary {
        output_dir: output_dir.to_path_buf(),
        compounds: compounds.len(),
        rules: 0,
        pairs: 0,
        products: rows.len(),
        matches: Some(matched.records.len()),
        unscoreable: matched.unscoreable.len(),
        elapsed: start.elapsed(),
    };
    log::info!("{}", summary.summary());
    Ok(summary)
}
