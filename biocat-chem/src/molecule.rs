//! Molecular graph representation.

use biocat_core::Summarizable;

use crate::canon::canonical_smiles;
use crate::element::charged_valences;
use crate::properties::molecular_formula;

/// Tetrahedral configuration of an atom.
///
/// Looking from the first of the atom's reference neighbours, the other
/// three run anticlockwise (`@`) or clockwise (`@@`). The reference order
/// puts the implicit hydrogen or lone pair first, then the explicit
/// neighbours by ascending atom index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Chirality {
    #[default]
    None,
    /// `@` in SMILES.
    CounterClockwise,
    /// `@@` in SMILES.
    Clockwise,
}

impl Chirality {
    /// The opposite configuration.
    pub fn inverted(self) -> Self {
        match self {
            Chirality::None => Chirality::None,
            Chirality::CounterClockwise => Chirality::Clockwise,
            Chirality::Clockwise => Chirality::CounterClockwise,
        }
    }
}

/// Configuration of a double bond, relative to the lowest-indexed
/// substituent at each end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BondStereo {
    #[default]
    None,
    Cis,
    Trans,
}

/// Bond order classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Aromatic,
}

impl BondOrder {
    /// Numeric bond order for valence calculations.
    pub fn as_f64(self) -> f64 {
        match self {
            BondOrder::Single => 1.0,
            BondOrder::Double => 2.0,
            BondOrder::Triple => 3.0,
            BondOrder::Aromatic => 1.5,
        }
    }
}

/// An atom in a molecular graph. Hydrogens are normally folded into their
/// heavy atom as a count rather than stored as graph nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct MolAtom {
    pub atomic_number: u8,
    pub formal_charge: i8,
    pub isotope: Option<u16>,
    pub is_aromatic: bool,
    /// Attached hydrogen count.
    pub implicit_hydrogens: u8,
    /// The hydrogen count was given explicitly (bracket atom) and must not be
    /// recomputed from the default valence.
    pub fixed_hydrogens: bool,
    pub chirality: Chirality,
}

impl MolAtom {
    pub fn new(atomic_number: u8) -> Self {
        MolAtom {
            atomic_number,
            ..MolAtom::default()
        }
    }
}

/// A bond between two atoms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bond {
    pub atom1: usize,
    pub atom2: usize,
    pub order: BondOrder,
    pub stereo: BondStereo,
}

impl Bond {
    pub fn new(atom1: usize, atom2: usize, order: BondOrder) -> Self {
        Bond { atom1, atom2, order, stereo: BondStereo::None }
    }

    /// The endpoint opposite `atom`.
    pub fn other(&self, atom: usize) -> usize {
        if self.atom1 == atom {
            self.atom2
        } else {
            self.atom1
        }
    }
}

/// A molecular graph with atoms, bonds, and adjacency information.
#[derive(Debug, Clone)]
pub struct Molecule {
    pub atoms: Vec<MolAtom>,
    pub bonds: Vec<Bond>,
    /// adjacency[atom_idx] = Vec<(neighbor_atom_idx, bond_idx)>
    pub adjacency: Vec<Vec<(usize, usize)>>,
}

impl Molecule {
    /// Create a new molecule, building the adjacency list from atoms and bonds.
    pub fn new(atoms: Vec<MolAtom>, bonds: Vec<Bond>) -> Self {
        let mut adjacency = vec![Vec::new(); atoms.len()];
        for (bi, bond) in bonds.iter().enumerate() {
            adjacency[bond.atom1].push((bond.atom2, bi));
            adjacency[bond.atom2].push((bond.atom1, bi));
        }
        Molecule { atoms, bonds, adjacency }
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    /// Number of non-hydrogen atoms.
    pub fn heavy_atom_count(&self) -> usize {
        self.atoms.iter().filter(|a| a.atomic_number != 1).count()
    }

    /// Graph degree of an atom (number of explicit bonds).
    pub fn degree(&self, atom_idx: usize) -> usize {
        self.adjacency[atom_idx].len()
    }

    /// Index of the bond between two atoms, if any.
    pub fn bond_between(&self, a1: usize, a2: usize) -> Option<usize> {
        self.adjacency[a1]
            .iter()
            .find(|&&(n, _)| n == a2)
            .map(|&(_, bi)| bi)
    }

    /// Sum of bond orders around an atom, aromatic bonds counting 1.5.
    pub fn bond_order_sum(&self, atom_idx: usize) -> f64 {
        self.adjacency[atom_idx]
            .iter()
            .map(|&(_, bi)| self.bonds[bi].order.as_f64())
            .sum()
    }

    /// Explicit valence: bond orders plus attached hydrogens.
    pub fn explicit_valence(&self, atom_idx: usize) -> u8 {
        let bonds = self.bond_order_sum(atom_idx).round() as u8;
        bonds.saturating_add(self.atoms[atom_idx].implicit_hydrogens)
    }

    /// Hydrogen count an unbracketed atom of this kind would carry, or `None`
    /// for elements without a valence model.
    ///
    /// Aromatic bonds count one towards the sigma framework. An aromatic atom
    /// with valence to spare gives one unit to the pi system; one without
    /// (pyrrole-type N, furan O, exocyclic C=O) contributes a lone pair or
    /// nothing and takes no hydrogen for it.
    pub fn default_hydrogens(&self, atom_idx: usize) -> Option<u8> {
        let atom = &self.atoms[atom_idx];
        let used = self.bond_units(atom_idx);
        let target = self.target_valence(atom_idx, used)?;
        let spare = target - used;
        if atom.is_aromatic && spare > 0 {
            Some(spare - 1)
        } else {
            Some(spare)
        }
    }

    /// Valence units used by bonds, aromatic and single counting one.
    pub fn bond_units(&self, atom_idx: usize) -> u8 {
        self.adjacency[atom_idx]
            .iter()
            .map(|&(_, bi)| match self.bonds[bi].order {
                BondOrder::Single | BondOrder::Aromatic => 1u8,
                BondOrder::Double => 2,
                BondOrder::Triple => 3,
            })
            .fold(0u8, u8::saturating_add)
    }

    /// Smallest allowed valence of the atom that is at least `used`.
    pub fn target_valence(&self, atom_idx: usize, used: u8) -> Option<u8> {
        let atom = &self.atoms[atom_idx];
        charged_valences(atom.atomic_number, atom.formal_charge)
            .iter()
            .copied()
            .find(|&v| v >= used)
    }

    /// Recompute the hydrogen count of every atom whose count is not fixed.
    pub fn assign_default_hydrogens(&mut self) {
        for i in 0..self.atoms.len() {
            if self.atoms[i].fixed_hydrogens {
                continue;
            }
            self.atoms[i].implicit_hydrogens = self.default_hydrogens(i).unwrap_or(0);
        }
    }

    /// Total hydrogen count (attached counts plus explicit H atoms).
    pub fn total_hydrogen_count(&self) -> usize {
        let explicit = self.atoms.iter().filter(|a| a.atomic_number == 1).count();
        let implicit: usize = self.atoms.iter().map(|a| a.implicit_hydrogens as usize).sum();
        explicit + implicit
    }

    /// Net formal charge.
    pub fn net_charge(&self) -> i32 {
        self.atoms.iter().map(|a| a.formal_charge as i32).sum()
    }
}

impl Summarizable for Molecule {
    fn summary(&self) -> String {
        format!(
            "{} ({}): {} atoms, {} bonds",
            canonical_smiles(self),
            molecular_formula(self),
            self.atom_count(),
            self.bond_count()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_water() -> Molecule {
        let mut water = MolAtom::new(8);
        water.implicit_hydrogens = 2;
        Molecule::new(vec![water], vec![])
    }

    fn make_ethane() -> Molecule {
        let mut mol = Molecule::new(
            vec![MolAtom::new(6), MolAtom::new(6)],
            vec![Bond::new(0, 1, BondOrder::Single)],
        );
        mol.assign_default_hydrogens();
        mol
    }

    #[test]
    fn construction_and_adjacency() {
        let mol = make_ethane();
        assert_eq!(mol.atom_count(), 2);
        assert_eq!(mol.bond_count(), 1);
        assert_eq!(mol.degree(0), 1);
        assert_eq!(mol.bond_between(0, 1), Some(0));
        assert_eq!(mol.bonds[0].other(0), 1);
    }

    #[test]
    fn default_hydrogens_fill_valence() {
        let mol = make_ethane();
        assert_eq!(mol.atoms[0].implicit_hydrogens, 3);
        assert_eq!(mol.explicit_valence(0), 4);
        assert_eq!(mol.total_hydrogen_count(), 6);
    }

    #[test]
    fn fixed_hydrogens_are_kept() {
        let mut mol = make_ethane();
        mol.atoms[1].fixed_hydrogens = true;
        mol.atoms[1].implicit_hydrogens = 1;
        mol.assign_default_hydrogens();
        assert_eq!(mol.atoms[0].implicit_hydrogens, 3);
        assert_eq!(mol.atoms[1].implicit_hydrogens, 1);
    }

    #[test]
    fn charged_nitrogen_takes_four_bonds() {
        let mut n = MolAtom::new(7);
        n.formal_charge = 1;
        let mol = Molecule::new(vec![n], vec![]);
        assert_eq!(mol.default_hydrogens(0), Some(4));
    }

    #[test]
    fn aromatic_atoms_reserve_one_unit_only_when_spare() {
        // Ring of six aromatic carbons plus one three-connected aromatic N.
        let mut atoms: Vec<MolAtom> = (0..5)
            .map(|_| MolAtom { is_aromatic: true, ..MolAtom::new(6) })
            .collect();
        atoms.push(MolAtom { is_aromatic: true, ..MolAtom::new(7) });
        atoms.push(MolAtom::new(6));
        let mut bonds: Vec<Bond> = (0..6)
            .map(|i| Bond::new(i, (i + 1) % 6, BondOrder::Aromatic))
            .collect();
        bonds.push(Bond::new(5, 6, BondOrder::Single));
        let mol = Molecule::new(atoms, bonds);
        assert_eq!(mol.default_hydrogens(0), Some(1));
        assert_eq!(mol.default_hydrogens(5), Some(0));
        assert_eq!(mol.default_hydrogens(6), Some(3));
    }

    #[test]
    fn chirality_inverts() {
        assert_eq!(Chirality::Clockwise.inverted(), Chirality::CounterClockwise);
        assert_eq!(Chirality::None.inverted(), Chirality::None);
    }

    #[test]
    fn heavy_atom_count_skips_hydrogen() {
        let mol = make_water();
        assert_eq!(mol.heavy_atom_count(), 1);
        assert_eq!(mol.total_hydrogen_count(), 2);
    }

    #[test]
    fn summary_names_structure_and_formula() {
        let mol = make_ethane();
        assert_eq!(mol.summary(), "CC (C2H6): 2 atoms, 1 bonds");
    }
}
