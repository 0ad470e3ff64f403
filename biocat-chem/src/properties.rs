//! Mass calculation.

use crate::element::{element_by_number, ELECTRON_MASS};
use crate::molecule::Molecule;

/// Mass difference between consecutive isotopes, near enough for the light
/// elements that appear in labelled metabolites.
const NEUTRON_SHIFT: f64 = 1.003355;

/// Monoisotopic mass in daltons, rounded to 4 decimals.
///
/// Attached hydrogens are counted, and the mass of the missing (or extra)
/// electrons is removed (or added) for charged species. Returns `None` if the
/// molecule holds an element without mass data.
pub fn exact_mass(mol: &Molecule) -> Option<f64> {
    let hydrogen = element_by_number(1)?.monoisotopic_mass;
    let mut mass = 0.0;
    for atom in &mol.atoms {
        let elem = element_by_number(atom.atomic_number)?;
        mass += match atom.isotope {
            Some(iso) => {
                let nominal = elem.monoisotopic_mass.round();
                elem.monoisotopic_mass + (iso as f64 - nominal) * NEUTRON_SHIFT
            }
            None => elem.monoisotopic_mass,
        };
        mass += atom.implicit_hydrogens as f64 * hydrogen;
    }
    mass -= mol.net_charge() as f64 * ELECTRON_MASS;
    Some(round4(mass))
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Hill-order molecular formula (C, H, then alphabetical).
pub fn molecular_formula(mol: &Molecule) -> String {
    use std::collections::BTreeMap;

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut hydrogens = 0usize;
    for atom in &mol.atoms {
        hydrogens += atom.implicit_hydrogens as usize;
        if atom.atomic_number == 1 {
            hydrogens += 1;
            continue;
        }
        if let Some(elem) = element_by_number(atom.atomic_number) {
            *counts.entry(elem.symbol).or_insert(0) += 1;
        }
    }

    let mut formula = String::new();
    let mut push = |symbol: &str, count: usize| {
        if count == 0 {
            return;
        }
        formula.push_str(symbol);
        if count > 1 {
            formula.push_str(&count.to_string());
        }
    };
    let carbon = counts.remove("C").unwrap_or(0);
    push("C", carbon);
    push("H", hydrogens);
    for (symbol, count) in counts {
        push(symbol, count);
    }
    formula
}
