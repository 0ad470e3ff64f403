//! Kekulization of aromatic input and Hückel aromaticity perception.
//!
//! Parsed structures are first reduced to a Kekulé form, then every ring of
//! the smallest set of smallest rings, and every pair of rings fused on one
//! bond, whose pi electron count is 4n+2 is marked aromatic. A Kekulé and an
//! aromatic spelling of the same molecule end up with the same atom and bond
//! flags.

use std::collections::BTreeSet;

use biocat_core::{BiocatError, Result};

use crate::molecule::{BondOrder, BondStereo, Molecule};
use crate::ring::{find_sssr, ring_bonds};

const SP2_CAPABLE: [u8; 8] = [5, 6, 7, 8, 15, 16, 33, 34];

/// Backtracking steps allowed when placing double bonds.
const KEKULE_STEP_LIMIT: usize = 100_000;

/// Replace aromatic bonds by single and double bonds and clear the aromatic
/// atom flags.
///
/// Every aromatic atom with valence to spare after its bonds and hydrogens
/// takes exactly one double bond. Fails when no such placement exists, as for
/// `c1cccc1`.
pub fn kekulize(mol: &mut Molecule) -> Result<()> {
    if !mol.atoms.iter().any(|a| a.is_aromatic)
        && !mol.bonds.iter().any(|b| b.order == BondOrder::Aromatic)
    {
        return Ok(());
    }
    let needs_double: Vec<bool> = (0..mol.atom_count())
        .map(|i| {
            let atom = &mol.atoms[i];
            if !atom.is_aromatic {
                return false;
            }
            let used = mol.bond_units(i).saturating_add(atom.implicit_hydrogens);
            matches!(mol.target_valence(i, used), Some(t) if t > used)
        })
        .collect();

    let n = mol.atom_count();
    let mut search = DoubleBondSearch {
        mol: &*mol,
        needs_double: &needs_double,
        taken: vec![false; n],
        chosen: Vec::new(),
        steps: 0,
    };
    if !search.place() {
        let stranded: Vec<usize> = (0..n).filter(|&i| needs_double[i]).collect();
        return Err(BiocatError::Parse(format!(
            "cannot kekulize aromatic system around atoms {stranded:?}"
        )));
    }
    let doubles: BTreeSet<usize> = search.chosen.into_iter().collect();

    for (bi, bond) in mol.bonds.iter_mut().enumerate() {
        if bond.order == BondOrder::Aromatic {
            bond.order = if doubles.contains(&bi) {
                BondOrder::Double
            } else {
                BondOrder::Single
            };
        }
    }
    for atom in &mut mol.atoms {
        atom.is_aromatic = false;
    }
    Ok(())
}

/// Perfect matching over aromatic bonds between atoms that need a double
/// bond. The most constrained atom is placed first.
struct DoubleBondSearch<'a> {
    mol: &'a Molecule,
    needs_double: &'a [bool],
    taken: Vec<bool>,
    chosen: Vec<usize>,
    steps: usize,
}

impl DoubleBondSearch<'_> {
    fn place(&mut self) -> bool {
        self.steps += 1;
        if self.steps > KEKULE_STEP_LIMIT {
            return false;
        }
        let mut best: Option<(usize, Vec<(usize, usize)>)> = None;
        for atom in 0..self.mol.atom_count() {
            if !self.needs_double[atom] || self.taken[atom] {
                continue;
            }
            let options = self.options(atom);
            if options.is_empty() {
                return false;
            }
            if best.as_ref().map_or(true, |(_, o)| options.len() < o.len()) {
                best = Some((atom, options));
            }
        }
        let Some((atom, options)) = best else {
            return true;
        };

        self.taken[atom] = true;
        for (partner, bi) in options {
            self.taken[partner] = true;
            self.chosen.push(bi);
            if self.place() {
                return true;
            }
            self.chosen.pop();
            self.taken[partner] = false;
        }
        self.taken[atom] = false;
        false
    }

    fn options(&self, atom: usize) -> Vec<(usize, usize)> {
        self.mol.adjacency[atom]
            .iter()
            .copied()
            .filter(|&(nb, bi)| {
                self.needs_double[nb]
                    && !self.taken[nb]
                    && self.mol.bonds[bi].order == BondOrder::Aromatic
            })
            .collect()
    }
}

/// Mark the aromatic rings of a Kekulé structure.
///
/// Atoms and bonds of every Hückel ring become aromatic; bonds between
/// aromatic atoms of different rings (biphenyl) stay single.
pub fn perceive_aromaticity(mol: &mut Molecule) {
    let rings = find_sssr(mol);
    if rings.is_empty() {
        return;
    }
    let in_ring = ring_bonds(mol);
    let electrons: Vec<Option<u8>> = (0..mol.atom_count())
        .map(|i| pi_electrons(mol, i, &in_ring))
        .collect();

    let mut aromatic: Vec<bool> = rings
        .iter()
        .map(|ring| is_huckel(ring.iter().map(|&i| electrons[i])))
        .collect();

    // Fused pairs such as azulene are aromatic only as a whole.
    for a in 0..rings.len() {
        for b in a + 1..rings.len() {
            if aromatic[a] && aromatic[b] {
                continue;
            }
            let shared: Vec<usize> = rings[a]
                .iter()
                .copied()
                .filter(|x| rings[b].contains(x))
                .collect();
            if shared.len() != 2 || mol.bond_between(shared[0], shared[1]).is_none() {
                continue;
            }
            let envelope: BTreeSet<usize> = rings[a].iter().chain(&rings[b]).copied().collect();
            if is_huckel(envelope.iter().map(|&i| electrons[i])) {
                aromatic[a] = true;
                aromatic[b] = true;
            }
        }
    }

    for (ring, _) in rings.iter().zip(&aromatic).filter(|(_, &flag)| flag) {
        for (k, &atom) in ring.iter().enumerate() {
            mol.atoms[atom].is_aromatic = true;
            let next = ring[(k + 1) % ring.len()];
            if let Some(bi) = mol.bond_between(atom, next) {
                mol.bonds[bi].order = BondOrder::Aromatic;
                mol.bonds[bi].stereo = BondStereo::None;
            }
        }
    }
}

/// Kekulize and perceive again, for structures assembled by a reaction.
///
/// On failure the structure is left as it was.
pub fn rearomatize(mol: &mut Molecule) -> Result<()> {
    let mut kekule = mol.clone();
    kekulize(&mut kekule)?;
    perceive_aromaticity(&mut kekule);
    *mol = kekule;
    Ok(())
}

/// Pi electrons an atom of a Kekulé structure gives to a ring it lies in.
fn pi_electrons(mol: &Molecule, idx: usize, ring_bond: &[bool]) -> Option<u8> {
    let atom = &mol.atoms[idx];
    if !SP2_CAPABLE.contains(&atom.atomic_number) {
        return None;
    }
    let mut exocyclic = None;
    for &(nb, bi) in &mol.adjacency[idx] {
        match mol.bonds[bi].order {
            BondOrder::Triple => return None,
            BondOrder::Double if ring_bond[bi] => return Some(1),
            BondOrder::Double => exocyclic = Some(nb),
            _ => {}
        }
    }
    if let Some(partner) = exocyclic {
        // C=O, C=N and C=S leave the ring carbon's p orbital empty.
        let z = mol.atoms[partner].atomic_number;
        return (atom.atomic_number == 6 && matches!(z, 7 | 8 | 16)).then_some(0);
    }
    let connections = mol.degree(idx) + atom.implicit_hydrogens as usize;
    match (atom.atomic_number, atom.formal_charge) {
        (6, -1) => Some(2),
        (6, 1) | (5, 0) => Some(0),
        (7 | 15 | 33, 0) if connections == 3 => Some(2),
        (7 | 15, -1) if connections == 2 => Some(2),
        (8 | 16 | 34, 0) if connections == 2 => Some(2),
        _ => None,
    }
}

fn is_huckel(electrons: impl Iterator<Item = Option<u8>>) -> bool {
    let mut total: u32 = 0;
    for e in electrons {
        match e {
            Some(e) => total += e as u32,
            None => return false,
        }
    }
    total >= 2 && (total - 2) % 4 == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canon::canonical_smiles;
    use crate::smiles::parse_smiles;

    fn aromatic_count(smiles: &str) -> usize {
        let mol = parse_smiles(smiles).unwrap();
        mol.atoms.iter().filter(|a| a.is_aromatic).count()
    }

    fn canon(smiles: &str) -> String {
        canonical_smiles(&parse_smiles(smiles).unwrap())
    }

    #[test]
    fn kekule_benzene_is_perceived() {
        let mol = parse_smiles("C1=CC=CC=C1").unwrap();
        assert!(mol.atoms.iter().all(|a| a.is_aromatic && a.implicit_hydrogens == 1));
        assert!(mol.bonds.iter().all(|b| b.order == BondOrder::Aromatic));
    }

    #[test]
    fn heteroaromatic_rings() {
        assert_eq!(aromatic_count("C1=CC=NC=C1"), 6);
        assert_eq!(aromatic_count("C1=CNC=C1"), 5);
        assert_eq!(aromatic_count("C1=COC=C1"), 5);
        assert_eq!(aromatic_count("C1=CSC=C1"), 5);
        assert_eq!(aromatic_count("O=C1C=CC=CN1"), 6);
    }

    #[test]
    fn non_aromatic_rings() {
        assert_eq!(aromatic_count("C1=CCC=C1"), 0);
        assert_eq!(aromatic_count("C1=CC=CC=CC=C1"), 0);
        assert_eq!(aromatic_count("O=C1C=CC(=O)C=C1"), 0);
        assert_eq!(aromatic_count("C1CCCCC1"), 0);
    }

    #[test]
    fn fused_systems() {
        assert_eq!(aromatic_count("C1=CC2=CC=CC=C2C=C1"), 10);
        assert_eq!(aromatic_count("C1=CC=C2C=CC=C2C=C1"), 10);
        assert_eq!(aromatic_count("C1=CC2=C(C1)C=CC=C2"), 6);
    }

    #[test]
    fn biaryl_link_stays_single() {
        let mol = parse_smiles("C1=CC=C(C=C1)C1=CC=CC=C1").unwrap();
        assert_eq!(mol.bonds.iter().filter(|b| b.order == BondOrder::Single).count(), 1);
    }

    #[test]
    fn kekule_and_aromatic_spellings_agree() {
        let pairs = [
            ("OC1=CC=CC=C1", "Oc1ccccc1"),
            ("C1=CC2=CC=CC=C2C=C1", "c1ccc2ccccc2c1"),
            ("CN1C=NC2=C1C(=O)N(C)C(=O)N2C", "Cn1cnc2c1c(=O)n(C)c(=O)n2C"),
            ("C1=CC=NC=C1", "c1ccncc1"),
            ("C1=CNC=C1", "c1cc[nH]c1"),
            ("COC1=CC=C(C)C=C1", "COc1ccc(C)cc1"),
        ];
        for (kekule, aromatic) in pairs {
            assert_eq!(canon(kekule), canon(aromatic), "{kekule} vs {aromatic}");
        }
    }

    #[test]
    fn caffeine_writes_without_brackets() {
        let can = canon("CN1C=NC2=C1C(=O)N(C)C(=O)N2C");
        assert!(!can.contains('['), "{can}");
    }

    #[test]
    fn alternating_double_bond_placements_agree() {
        assert_eq!(canon("CC1=CC=CC=C1O"), canon("CC1=C(O)C=CC=C1"));
    }

    #[test]
    fn unkekulizable_input_is_rejected() {
        assert!(parse_smiles("c1cccc1").is_err());
        assert!(parse_smiles("c1ccccc1c").is_err());
        assert!(parse_smiles("n1cccc1").is_err());
    }

    #[test]
    fn rearomatize_restores_flags() {
        let mut mol = parse_smiles("c1ccccc1").unwrap();
        kekulize(&mut mol).unwrap();
        assert!(mol.atoms.iter().all(|a| !a.is_aromatic));
        assert_eq!(mol.bonds.iter().filter(|b| b.order == BondOrder::Double).count(), 3);
        rearomatize(&mut mol).unwrap();
        assert!(mol.atoms.iter().all(|a| a.is_aromatic));
    }

    #[test]
    fn huckel_counts() {
        assert!(is_huckel([Some(2)].into_iter()));
        assert!(is_huckel([Some(1); 6].into_iter()));
        assert!(!is_huckel([Some(1); 4].into_iter()));
        assert!(!is_huckel([Some(1), None].into_iter()));
        assert!(is_huckel([Some(1); 10].into_iter()));
    }
}
