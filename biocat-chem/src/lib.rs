//! Native chemistry backend for the biocatalyzer workspace.
//!
//! Provides a molecular graph model with aromaticity perception and stereo,
//! SMILES parsing and canonical writing, SMARTS substructure search, reaction
//! SMARTS application, exact mass, Morgan fingerprints and charge
//! neutralization. [`NativeChem`] bundles them
//! behind the [`biocat_core::MolecularOps`] interface.
//!
//! # Example
//!
//! ```
//! use biocat_chem::{exact_mass, parse_reaction, parse_smiles, run_reaction, canonical_smiles};
//!
//! let anisole = parse_smiles("COc1ccccc1").unwrap();
//! assert_eq!(exact_mass(&anisole), Some(108.0575));
//!
//! let demethylation = parse_reaction("[c:1][O:2][CH3:3]>>[c:1][OH:2]").unwrap();
//! let outcomes = run_reaction(&demethylation, &[anisole]).unwrap();
//! assert_eq!(canonical_smiles(&outcomes[0][0]), canonical_smiles(&parse_smiles("Oc1ccccc1").unwrap()));
//! ```

pub mod aromaticity;
pub mod backend;
pub mod canon;
pub mod element;
pub mod fingerprint;
pub mod molecule;
pub mod properties;
pub mod reaction;
pub mod smarts;
pub mod smiles;
pub mod standardize;
pub mod stereo;

mod ring;

pub use backend::NativeChem;
pub use canon::canonical_smiles;
pub use element::{element_by_number, element_by_symbol, Element};
pub use fingerprint::{morgan_fingerprint, similarity, tanimoto_similarity, Fingerprint};
pub use molecule::{Bond, BondOrder, BondStereo, Chirality, MolAtom, Molecule};
pub use properties::{exact_mass, molecular_formula};
pub use reaction::{parse_reaction, run_reaction, Reaction};
pub use smarts::{find_matches, has_match, parse_smarts, SmartsPattern};
pub use smiles::parse_smiles;
pub use standardize::neutralize;
