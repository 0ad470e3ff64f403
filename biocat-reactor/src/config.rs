//! Run configuration.
//!
//! Configuration is plain immutable data. A [`crate::BioReactor`] is built
//! from a [`ReactorConfig`] once; changing a setting means building a new
//! reactor.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use biocat_core::{BiocatError, Result};
use serde::{Deserialize, Serialize};

use crate::output::{check_collisions, MATCHES_FILE, NEW_COMPOUNDS_FILE};

/// Options for product generation and filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactorConfig {
    /// Neutralize input compounds at load time and products before they are
    /// recorded.
    pub neutralize: bool,
    /// Applicability tags to keep, as a TSV path with an `org_id` column or an
    /// inline `;`-separated list. `None` keeps every rule.
    pub tag_filter: Option<String>,
    /// Minimum heavy-atom count of a product; 0 disables the check.
    pub min_atom_count: usize,
    /// TSV with a `smiles` column of structures to reject outright.
    pub byproducts: Option<PathBuf>,
    /// TSV with a `smarts` column of substructures to reject.
    pub patterns: Option<PathBuf>,
    /// TSV with `coreactant_id` and `smiles` columns.
    pub coreactants: Option<PathBuf>,
    /// Worker count; 0 uses every core.
    pub parallelism: usize,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        ReactorConfig {
            neutralize: false,
            tag_filter: None,
            min_atom_count: 5,
            byproducts: None,
            patterns: None,
            coreactants: None,
            parallelism: 0,
        }
    }
}

/// What the mass matcher compares against the reference column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Product exact mass.
    #[default]
    Mass,
    /// Parent exact mass minus product exact mass.
    MassDiff,
}

impl MatchMode {
    /// Reference column read when no field is configured.
    pub fn default_field(self) -> &'static str {
        match self {
            MatchMode::Mass => "Mass",
            MatchMode::MassDiff => "MassDiff",
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::Mass => write!(f, "mass"),
            MatchMode::MassDiff => write!(f, "mass_diff"),
        }
    }
}

impl FromStr for MatchMode {
    type Err = BiocatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "mass" => Ok(MatchMode::Mass),
            "mass_diff" | "massdiff" => Ok(MatchMode::MassDiff),
            other => Err(BiocatError::InvalidInput(format!(
                "unknown match mode '{other}' (expected mass or mass_diff)"
            ))),
        }
    }
}

/// Options for the mass matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Inclusive absolute tolerance in daltons.
    pub tolerance: f64,
    pub mode: MatchMode,
    /// Reference column holding the measured values; defaults by mode.
    pub ms_field: Option<String>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        MatcherConfig {
            tolerance: 0.02,
            mode: MatchMode::Mass,
            ms_field: None,
        }
    }
}

impl MatcherConfig {
    /// The reference column name in effect.
    pub fn field(&self) -> &str {
        self.ms_field
            .as_deref()
            .unwrap_or_else(|| self.mode.default_field())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(BiocatError::InvalidInput(format!(
                "tolerance must be a finite non-negative number, got {}",
                self.tolerance
            )));
        }
        if self.field().trim().is_empty() {
            return Err(BiocatError::InvalidInput("ms_field must not be empty".into()));
        }
        Ok(())
    }
}

/// A complete `react` run: inputs, outputs and both option sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Compounds TSV path, or an inline `;`-separated list of structures.
    pub compounds: String,
    pub reaction_rules: PathBuf,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub reactor: ReactorConfig,
    /// MS reference table; when set, products are mass matched.
    #[serde(default)]
    pub ms_data: Option<PathBuf>,
    #[serde(default)]
    pub matcher: MatcherConfig,
}

impl RunConfig {
    pub fn new(
        compounds: impl Into<String>,
        reaction_rules: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        RunConfig {
            compounds: compounds.into(),
            reaction_rules: reaction_rules.into(),
            output_dir: output_dir.into(),
            reactor: ReactorConfig::default(),
            ms_data: None,
            matcher: MatcherConfig::default(),
        }
    }

    /// Load a run configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BiocatError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| BiocatError::Parse(format!("{}: {}", path.display(), e)))
    }

    /// Check everything that can be checked before loading any table: numeric
    /// options, existence of input paths and output collisions.
    pub fn validate(&self) -> Result<()> {
        self.matcher.validate()?;

        require_exists(&self.reaction_rules)?;
        for path in [
            &self.reactor.byproducts,
            &self.reactor.patterns,
            &self.reactor.coreactants,
            &self.ms_data,
        ]
        .into_iter()
        .flatten()
        {
            require_exists(path)?;
        }
        if let Some(filter) = &self.reactor.tag_filter {
            if looks_like_path(filter) {
                require_exists(Path::new(filter))?;
            }
        }
        if self.compounds.trim().is_empty() {
            return Err(BiocatError::InvalidInput("no compounds given".into()));
        }

        let mut outputs = vec![NEW_COMPOUNDS_FILE];
        if self.ms_data.is_some() {
            outputs.push(MATCHES_FILE);
        }
        check_collisions(&self.output_dir, &outputs)
    }
}

fn require_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(BiocatError::NotFound(path.to_path_buf()))
    }
}

/// A tag-filter or compound argument that names a file rather than listing values.
pub(crate) fn looks_like_path(value: &str) -> bool {
    Path::new(value).exists() || value.contains('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults() {
        let reactor = ReactorConfig::default();
        assert_eq!(reactor.min_atom_count, 5);
        assert!(!reactor.neutralize);
        assert_eq!(reactor.parallelism, 0);
        let matcher = MatcherConfig::default();
        assert_eq!(matcher.tolerance, 0.02);
        assert_eq!(matcher.field(), "Mass");
    }

    #[test]
    fn field_defaults_by_mode() {
        let matcher = MatcherConfig {
            mode: MatchMode::MassDiff,
            ..MatcherConfig::default()
        };
        assert_eq!(matcher.field(), "MassDiff");
        let matcher = MatcherConfig {
            ms_field: Some("Observed".into()),
            ..matcher
        };
        assert_eq!(matcher.field(), "Observed");
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("mass".parse::<MatchMode>().unwrap(), MatchMode::Mass);
        assert_eq!("mass-diff".parse::<MatchMode>().unwrap(), MatchMode::MassDiff);
        assert_eq!("MASS_DIFF".parse::<MatchMode>().unwrap(), MatchMode::MassDiff);
        assert!("ppm".parse::<MatchMode>().is_err());
        assert_eq!(MatchMode::MassDiff.to_string(), "mass_diff");
    }

    #[test]
    fn bad_tolerance_rejected() {
        for tolerance in [-0.1, f64::NAN, f64::INFINITY] {
            let matcher = MatcherConfig {
                tolerance,
                ..MatcherConfig::default()
            };
            assert!(matcher.validate().is_err());
        }
        assert!(MatcherConfig {
            tolerance: 0.0,
            ..MatcherConfig::default()
        }
        .validate()
        .is_ok());
    }

    #[test]
    fn json_round_trip_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        fs::write(
            &path,
            r#"{
                "compounds": "CCO;CCN",
                "reaction_rules": "rules.tsv",
                "output_dir": "out",
                "reactor": { "neutralize": true, "min_atom_count": 3 },
                "matcher": { "mode": "mass_diff", "tolerance": 0.01 }
            }"#,
        )
        .unwrap();
        let config = RunConfig::from_json_file(&path).unwrap();
        assert!(config.reactor.neutralize);
        assert_eq!(config.reactor.min_atom_count, 3);
        assert_eq!(config.reactor.parallelism, 0);
        assert_eq!(config.matcher.mode, MatchMode::MassDiff);
        assert_eq!(config.ms_data, None);
    }

    #[test]
    fn missing_json_is_not_found() {
        let err = RunConfig::from_json_file("/nonexistent/run.json").unwrap_err();
        assert!(matches!(err, BiocatError::NotFound(_)));
    }

    #[test]
    fn validate_checks_inputs_and_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let rules = dir.path().join("rules.tsv");
        let out = dir.path().join("out");

        let config = RunConfig::new("CCO", &rules, &out);
        assert!(matches!(config.validate(), Err(BiocatError::NotFound(_))));

        fs::write(&rules, "InternalID\n").unwrap();
        assert!(config.validate().is_ok());

        let config = RunConfig {
            reactor: ReactorConfig {
                tag_filter: Some("missing_orgs.tsv".into()),
                ..ReactorConfig::default()
            },
            ..config
        };
        assert!(matches!(config.validate(), Err(BiocatError::NotFound(_))));

        let config = RunConfig {
            reactor: ReactorConfig {
                tag_filter: Some("hsa;eco".into()),
                ..ReactorConfig::default()
            },
            ..config
        };
        assert!(config.validate().is_ok());

        fs::create_dir_all(&out).unwrap();
        fs::write(out.join(NEW_COMPOUNDS_FILE), "x\n").unwrap();
        assert!(matches!(config.validate(), Err(BiocatError::OutputExists(_))));
    }
}
