//! Stereo bookkeeping: tetrahedral centres and double-bond configurations.
//!
//! Both are stored relative to atom indices (see [`Chirality`] and
//! [`BondStereo`]), so every step that renumbers atoms carries them over with
//! [`transfer_stereo`]. Double bonds inside rings carry no configuration.

use crate::molecule::{BondOrder, BondStereo, Chirality, Molecule};
use crate::ring::ring_bonds;

/// A neighbour position around a tetrahedral centre: an explicit atom, or
/// `None` for the implicit hydrogen or lone pair.
pub type Slot = Option<usize>;

/// Where an atom of one structure went in another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Image {
    Atom(usize),
    /// Folded into its neighbour's hydrogen count.
    Hydrogen,
    Gone,
}

/// Stand-in slot for a neighbour that no longer exists.
const VANISHED: Slot = Some(usize::MAX);

/// Reference neighbour order of a possible tetrahedral centre: implicit
/// hydrogen or lone pair first when the atom has three explicit neighbours,
/// then the explicit neighbours by ascending index.
pub fn reference_order(mol: &Molecule, atom: usize) -> Option<Vec<Slot>> {
    let mut neighbors: Vec<usize> = mol.adjacency[atom].iter().map(|&(nb, _)| nb).collect();
    neighbors.sort_unstable();
    match (neighbors.len(), mol.atoms[atom].implicit_hydrogens) {
        (4, 0) => Some(neighbors.into_iter().map(Some).collect()),
        (3, 0 | 1) => Some(std::iter::once(None).chain(neighbors.into_iter().map(Some)).collect()),
        _ => None,
    }
}

/// Whether `order` is an even permutation of `reference`, or `None` when the
/// two do not hold the same distinct slots.
pub fn is_even_permutation(order: &[Slot], reference: &[Slot]) -> Option<bool> {
    if order.len() != reference.len() {
        return None;
    }
    let positions: Vec<usize> = order
        .iter()
        .map(|slot| reference.iter().position(|r| r == slot))
        .collect::<Option<_>>()?;
    let mut distinct = positions.clone();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() != positions.len() {
        return None;
    }
    let mut inversions = 0usize;
    for i in 0..positions.len() {
        for j in i + 1..positions.len() {
            if positions[i] > positions[j] {
                inversions += 1;
            }
        }
    }
    Some(inversions % 2 == 0)
}

/// Restate a configuration given for neighbour order `from` for order `to`.
pub fn restate(chirality: Chirality, from: &[Slot], to: &[Slot]) -> Chirality {
    match is_even_permutation(from, to) {
        Some(true) => chirality,
        Some(false) => chirality.inverted(),
        None => Chirality::None,
    }
}

/// Turn configurations written against the SMILES neighbour order of each
/// atom into reference-order configurations. `written[i]` is empty for atoms
/// without a stereo mark.
pub(crate) fn assign_tetrahedral(mol: &mut Molecule, written: &[Vec<Slot>]) {
    for atom in 0..mol.atom_count() {
        let stated = mol.atoms[atom].chirality;
        if stated == Chirality::None {
            continue;
        }
        mol.atoms[atom].chirality = match reference_order(mol, atom) {
            Some(reference) => restate(stated, &written[atom], &reference),
            None => Chirality::None,
        };
    }
}

/// Side of `substituent` relative to `center` for a bond mark: `up` says the
/// atom written second lies above the one written first (`/`).
///
/// The relation is its own inverse, so it also turns a wanted side into the
/// mark to write.
pub fn side_of(first_written: usize, up: bool, center: usize) -> bool {
    if first_written == center {
        up
    } else {
        !up
    }
}

/// Settle double-bond configurations from bond marks, `marks[bond]` being
/// `(atom written first, up)` for `/` and `\` bonds.
pub(crate) fn assign_double_bonds(mol: &mut Molecule, marks: &[Option<(usize, bool)>]) {
    if marks.iter().all(Option::is_none) {
        return;
    }
    let in_ring = ring_bonds(mol);
    for bi in 0..mol.bond_count() {
        if mol.bonds[bi].order != BondOrder::Double || in_ring[bi] {
            continue;
        }
        let (a, b) = (mol.bonds[bi].atom1, mol.bonds[bi].atom2);
        let (Some(side_a), Some(side_b)) = (marked_side(mol, marks, a, b), marked_side(mol, marks, b, a))
        else {
            continue;
        };
        let (Some(ref_a), Some(ref_b)) = (reference_substituent(mol, a, b), reference_substituent(mol, b, a))
        else {
            continue;
        };
        let up_a = if side_a.0 == ref_a { side_a.1 } else { !side_a.1 };
        let up_b = if side_b.0 == ref_b { side_b.1 } else { !side_b.1 };
        mol.bonds[bi].stereo = if up_a == up_b { BondStereo::Cis } else { BondStereo::Trans };
    }
}

/// First marked substituent of `center` and whether it lies above it.
fn marked_side(
    mol: &Molecule,
    marks: &[Option<(usize, bool)>],
    center: usize,
    partner: usize,
) -> Option<(usize, bool)> {
    if !(1..=2).contains(&substituents(mol, center, partner).len()) {
        return None;
    }
    mol.adjacency[center].iter().find_map(|&(nb, bi)| {
        let (first, up) = marks[bi]?;
        (nb != partner).then(|| (nb, side_of(first, up, center)))
    })
}

/// Neighbours of `center` other than its double-bond `partner`.
pub fn substituents(mol: &Molecule, center: usize, partner: usize) -> Vec<usize> {
    mol.adjacency[center]
        .iter()
        .map(|&(nb, _)| nb)
        .filter(|&nb| nb != partner)
        .collect()
}

/// Lowest-indexed substituent of `center`.
pub fn reference_substituent(mol: &Molecule, center: usize, partner: usize) -> Option<usize> {
    substituents(mol, center, partner).into_iter().min()
}

/// Whether substituent `s` of end `a` and substituent `t` of end `b` of a
/// stereo double bond lie on the same side.
pub fn substituents_cis(mol: &Molecule, bond: usize, a: usize, s: usize, b: usize, t: usize) -> Option<bool> {
    let cis = match mol.bonds[bond].stereo {
        BondStereo::None => return None,
        BondStereo::Cis => true,
        BondStereo::Trans => false,
    };
    let ref_a = reference_substituent(mol, a, b)?;
    let ref_b = reference_substituent(mol, b, a)?;
    Some(cis ^ (s != ref_a) ^ (t != ref_b))
}

/// Remove every stereo mark.
pub(crate) fn clear_stereo(mol: &mut Molecule) {
    for atom in &mut mol.atoms {
        atom.chirality = Chirality::None;
    }
    for bond in &mut mol.bonds {
        bond.stereo = BondStereo::None;
    }
}

/// Carry the stereo of `old` over to `new`, `images[i]` telling where old
/// atom `i` went.
///
/// A centre keeps its configuration when its neighbours map across, and also
/// when exactly one neighbour was replaced by another in the same position.
/// A double bond keeps its configuration while each end still has a
/// substituent that came from `old`.
pub(crate) fn transfer_stereo(old: &Molecule, new: &mut Molecule, images: &[Image]) {
    for atom in 0..old.atom_count() {
        let chirality = old.atoms[atom].chirality;
        if chirality == Chirality::None {
            continue;
        }
        let Image::Atom(target) = images[atom] else { continue };
        let (Some(before), Some(after)) = (reference_order(old, atom), reference_order(new, target)) else {
            continue;
        };
        let mut mapped: Vec<Slot> = before
            .iter()
            .map(|slot| match slot {
                None => None,
                Some(nb) => match images[*nb] {
                    Image::Atom(k) => Some(k),
                    Image::Hydrogen => None,
                    Image::Gone => VANISHED,
                },
            })
            .collect();
        let added: Vec<Slot> = after.iter().copied().filter(|s| !mapped.contains(s)).collect();
        let lost: Vec<usize> = (0..mapped.len()).filter(|&p| !after.contains(&mapped[p])).collect();
        if let ([slot], [pos]) = (added.as_slice(), lost.as_slice()) {
            mapped[*pos] = *slot;
        }
        new.atoms[target].chirality = restate(chirality, &mapped, &after);
    }

    for (bi, bond) in old.bonds.iter().enumerate() {
        if bond.stereo == BondStereo::None {
            continue;
        }
        let (Image::Atom(a), Image::Atom(b)) = (images[bond.atom1], images[bond.atom2]) else {
            continue;
        };
        let Some(nbi) = new.bond_between(a, b) else { continue };
        if new.bonds[nbi].order != BondOrder::Double {
            continue;
        }
        let (Some(up_a), Some(up_b)) = (
            carried_side(old, new, images, bi, bond.atom1, a, b),
            carried_side(old, new, images, bi, bond.atom2, b, a),
        ) else {
            continue;
        };
        // Old reference substituents sit on sides (true, cis).
        let cis_old = bond.stereo == BondStereo::Cis;
        let same = (up_a == up_b) == cis_old;
        new.bonds[nbi].stereo = if same { BondStereo::Cis } else { BondStereo::Trans };
    }
}

/// Side of the new reference substituent at one end, on the scale where the
/// old reference substituent of that end is `true`.
fn carried_side(
    old: &Molecule,
    new: &Molecule,
    images: &[Image],
    old_bond: usize,
    old_end: usize,
    new_end: usize,
    new_partner: usize,
) -> Option<bool> {
    let old_partner = old.bonds[old_bond].other(old_end);
    let old_ref = reference_substituent(old, old_end, old_partner)?;
    let new_subs = substituents(new, new_end, new_partner);
    let new_ref = new_subs.iter().copied().min()?;
    let origin = |target: usize| {
        substituents(old, old_end, old_partner)
            .into_iter()
            .find(|&s| images[s] == Image::Atom(target))
    };
    if let Some(s) = origin(new_ref) {
        return Some(s == old_ref);
    }
    let other = new_subs.into_iter().find(|&s| s != new_ref)?;
    origin(other).map(|s| s != old_ref)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    #[test]
    fn permutation_parity() {
        let reference = [None, Some(1), Some(2), Some(3)];
        assert_eq!(is_even_permutation(&reference, &reference), Some(true));
        assert_eq!(is_even_permutation(&[Some(1), None, Some(2), Some(3)], &reference), Some(false));
        assert_eq!(is_even_permutation(&[Some(2), Some(3), Some(1), None], &reference), Some(false));
        assert_eq!(is_even_permutation(&[Some(1), Some(2), Some(3), Some(4)], &reference), None);
        assert_eq!(is_even_permutation(&[None, None, Some(2), Some(3)], &reference), None);
    }

    #[test]
    fn restating_swaps_on_odd_permutations() {
        let from = [Some(0), Some(1), Some(2), Some(3)];
        let to = [Some(1), Some(0), Some(2), Some(3)];
        assert_eq!(restate(Chirality::Clockwise, &from, &to), Chirality::CounterClockwise);
        assert_eq!(restate(Chirality::Clockwise, &from, &from), Chirality::Clockwise);
    }

    #[test]
    fn reference_order_requires_four_positions() {
        let mol = parse_smiles("C[C@H](N)O").unwrap();
        assert_eq!(reference_order(&mol, 1), Some(vec![None, Some(0), Some(2), Some(3)]));
        assert_eq!(reference_order(&mol, 0), None);
    }

    #[test]
    fn centres_are_stored_against_the_reference_order() {
        // Same centre written from two starting points.
        let a = parse_smiles("N[C@@H](C)O").unwrap();
        let b = parse_smiles("C[C@H](N)O").unwrap();
        assert_ne!(a.atoms[1].chirality, Chirality::None);
        // Atoms 0 and 2 trade places between the spellings, an odd permutation
        // of the reference order.
        assert_eq!(a.atoms[1].chirality, b.atoms[1].chirality.inverted());
    }

    #[test]
    fn double_bond_configuration_from_marks() {
        let trans = parse_smiles("F/C=C/F").unwrap();
        let cis = parse_smiles("F/C=C\\F").unwrap();
        assert_eq!(trans.bonds[1].stereo, BondStereo::Trans);
        assert_eq!(cis.bonds[1].stereo, BondStereo::Cis);
        // A mark on a branch reads from the atom that opens it.
        let also_trans = parse_smiles("C(\\F)=C/F").unwrap();
        assert_eq!(also_trans.bonds[1].stereo, BondStereo::Trans);
    }

    #[test]
    fn unmarked_or_ring_double_bonds_stay_plain() {
        let mol = parse_smiles("FC=CF").unwrap();
        assert!(mol.bonds.iter().all(|b| b.stereo == BondStereo::None));
        let mol = parse_smiles("C/C1=C/CCCCC1").unwrap();
        assert!(mol.bonds.iter().all(|b| b.stereo == BondStereo::None));
    }

    #[test]
    fn impossible_centres_are_cleared() {
        let mol = parse_smiles("[C@H2](F)Cl").unwrap();
        assert_eq!(mol.atoms[0].chirality, Chirality::None);
    }

    #[test]
    fn transfer_follows_renumbering() {
        let old = parse_smiles("F[C@H](Cl)Br").unwrap();
        // Reverse the atom order.
        let images: Vec<Image> = (0..4).map(|i| Image::Atom(3 - i)).collect();
        let atoms: Vec<_> = old.atoms.iter().rev().cloned().collect();
        let bonds = old
            .bonds
            .iter()
            .map(|b| crate::molecule::Bond::new(3 - b.atom1, 3 - b.atom2, b.order))
            .collect();
        let mut new = Molecule::new(atoms, bonds);
        clear_stereo(&mut new);
        transfer_stereo(&old, &mut new, &images);
        // Reference order [H, F, Cl, Br] becomes [H, Br, Cl, F]: one swap.
        assert_eq!(new.atoms[2].chirality, old.atoms[1].chirality.inverted());
    }
}
