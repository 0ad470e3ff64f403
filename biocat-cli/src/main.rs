use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use biocat_chem::NativeChem;
use biocat_reactor::{run_matcher, run_pipeline, MatchMode, MatcherConfig, ReactorConfig, RunConfig};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "biocatalyzer")]
#[command(about = "Enumerate biotransformation products and match them against MS data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply reaction rules to compounds and optionally match the products
    React(ReactArgs),
    /// Match an existing new-compounds table against MS data
    Match(MatchArgs),
}

#[derive(Args)]
struct MatchOptions {
    /// What to compare: product mass or parent-minus-product mass difference
    #[arg(long, default_value = "mass")]
    mode: MatchMode,
    /// MS data column with the measured values (default: Mass or MassDiff)
    #[arg(long)]
    ms_field: Option<String>,
    /// Inclusive absolute mass tolerance in Da
    #[arg(long, default_value_t = 0.02)]
    tolerance: f64,
}

impl MatchOptions {
    fn to_config(&self) -> MatcherConfig {
        MatcherConfig {
            tolerance: self.tolerance,
            mode: self.mode,
            ms_field: self.ms_field.clone(),
        }
    }
}

#[derive(Args)]
struct ReactArgs {
    /// Compounds TSV (compound_id, smiles) or a ';'-separated list of SMILES
    #[arg(required_unless_present = "config")]
    compounds: Option<String>,
    /// Directory for new_compounds.tsv and matches.tsv
    #[arg(required_unless_present = "config")]
    output_dir: Option<PathBuf>,
    /// Reaction rules TSV
    #[arg(long, required_unless_present = "config")]
    reaction_rules: Option<PathBuf>,
    /// Neutralize compounds and products
    #[arg(long)]
    neutralize: bool,
    /// Organism ids to keep rules for: TSV with an org_id column or a ';'-separated list
    #[arg(long)]
    organisms: Option<String>,
    /// Co-reactants TSV (coreactant_id, smiles)
    #[arg(long)]
    coreactants: Option<PathBuf>,
    /// TSV with a smiles column of products to discard
    #[arg(long)]
    molecules_to_remove: Option<PathBuf>,
    /// TSV with a smarts column of substructures to discard
    #[arg(long)]
    patterns_to_remove: Option<PathBuf>,
    /// Minimum heavy-atom count of a product (0 disables)
    #[arg(long, default_value_t = 5)]
    min_atom_count: usize,
    /// Match the products against --ms-data
    #[arg(long)]
    match_ms_data: bool,
    /// MS data TSV (ParentCompound, ParentCompoundSmiles, <ms-field>)
    #[arg(long)]
    ms_data: Option<PathBuf>,
    #[command(flatten)]
    matching: MatchOptions,
    /// Worker threads (0 uses every core)
    #[arg(long, default_value_t = 0)]
    n_jobs: usize,
    /// JSON run configuration; replaces every other option
    #[arg(long, conflicts_with_all = ["compounds", "output_dir", "reaction_rules"])]
    config: Option<PathBuf>,
}

impl ReactArgs {
    fn into_config(self) -> Result<RunConfig> {
        if let Some(path) = &self.config {
            return RunConfig::from_json_file(path)
                .with_context(|| format!("loading run configuration {}", path.display()));
        }
        if self.match_ms_data && self.ms_data.is_none() {
            bail!("--match-ms-data requires --ms-data");
        }
        let (Some(compounds), Some(output_dir), Some(reaction_rules)) =
            (self.compounds, self.output_dir, self.reaction_rules)
        else {
            bail!("COMPOUNDS, OUTPUT_DIR and --reaction-rules are required without --config");
        };
        Ok(RunConfig {
            compounds,
            reaction_rules,
            output_dir,
            reactor: ReactorConfig {
                neutralize: self.neutralize,
                tag_filter: self.organisms,
                min_atom_count: self.min_atom_count,
                byproducts: self.molecules_to_remove,
                patterns: self.patterns_to_remove,
                coreactants: self.coreactants,
                parallelism: self.n_jobs,
            },
            ms_data: if self.match_ms_data { self.ms_data } else { None },
            matcher: self.matching.to_config(),
        })
    }
}

#[derive(Args)]
struct MatchArgs {
    /// MS data TSV (ParentCompound, ParentCompoundSmiles, <ms-field>)
    ms_data: PathBuf,
    /// new_compounds.tsv from a previous react run
    new_compounds: PathBuf,
    /// Directory for matches.tsv
    output_dir: PathBuf,
    #[command(flatten)]
    matching: MatchOptions,
    /// Worker threads (0 uses every core)
    #[arg(long, default_value_t = 0)]
    n_jobs: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let chem = NativeChem::new();

    let summary = match cli.command {
        Commands::React(args) => {
            let config = args.into_config()?;
            log::info!("writing results to {}", config.output_dir.display());
            run_pipeline(&chem, &config).context("react run failed")?
        }
        Commands::Match(args) => {
            let config = args.matching.to_config();
            log::info!("matching in {} mode, tolerance {} Da", config.mode, config.tolerance);
            run_matcher(
                &chem,
                &args.ms_data,
                &args.new_compounds,
                &args.output_dir,
                &config,
                args.n_jobs,
            )
            .context("match run failed")?
        }
    };
    println!("{summary}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn react_flags_build_a_run_config() {
        let cli = Cli::try_parse_from([
            "biocatalyzer",
            "react",
            "CCO;COc1ccccc1",
            "out",
            "--reaction-rules",
            "rules.tsv",
            "--organisms",
            "hsa;eco",
            "--min-atom-count",
            "3",
            "--match-ms-data",
            "--ms-data",
            "ms.tsv",
            "--mode",
            "mass-diff",
            "--n-jobs",
            "4",
        ])
        .unwrap();
        let Commands::React(args) = cli.command else {
            panic!("expected react");
        };
        let config = args.into_config().unwrap();
        assert_eq!(config.compounds, "CCO;COc1ccccc1");
        assert_eq!(config.reactor.tag_filter.as_deref(), Some("hsa;eco"));
        assert_eq!(config.reactor.min_atom_count, 3);
        assert_eq!(config.reactor.parallelism, 4);
        assert_eq!(config.ms_data, Some(PathBuf::from("ms.tsv")));
        assert_eq!(config.matcher.mode, MatchMode::MassDiff);
        assert_eq!(config.matcher.field(), "MassDiff");
    }

    #[test]
    fn matching_without_ms_data_is_rejected() {
        let cli = Cli::try_parse_from([
            "biocatalyzer",
            "react",
            "CCO",
            "out",
            "--reaction-rules",
            "rules.tsv",
            "--match-ms-data",
        ])
        .unwrap();
        let Commands::React(args) = cli.command else {
            panic!("expected react");
        };
        assert!(args.into_config().is_err());
    }

    #[test]
    fn ms_data_is_ignored_unless_matching_is_requested() {
        let cli = Cli::try_parse_from([
            "biocatalyzer",
            "react",
            "CCO",
            "out",
            "--reaction-rules",
            "rules.tsv",
            "--ms-data",
            "ms.tsv",
        ])
        .unwrap();
        let Commands::React(args) = cli.command else {
            panic!("expected react");
        };
        assert_eq!(args.into_config().unwrap().ms_data, None);
    }

    #[test]
    fn positional_arguments_required_without_config() {
        assert!(Cli::try_parse_from(["biocatalyzer", "react", "CCO"]).is_err());
        assert!(Cli::try_parse_from(["biocatalyzer", "react", "--config", "run.json"]).is_ok());
    }
}
