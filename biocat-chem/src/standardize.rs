//! Charge neutralization.

use crate::molecule::Molecule;

/// Neutralize charges by adding or removing hydrogens.
///
/// Protonated cations lose hydrogens until neutral. Anions are protonated,
/// except that as many negative charges as remain on hydrogen-free cations
/// (quaternary ammonium, nitro N, metal counterions) are left in place so the
/// overall charge balance of zwitterions and salts is preserved. Anions bonded
/// to such a cation are the ones kept charged first.
pub fn neutralize(mol: &Molecule) -> Molecule {
    let mut out = mol.clone();

    for atom in out.atoms.iter_mut() {
        if atom.formal_charge > 0 && atom.implicit_hydrogens > 0 {
            let removed = (atom.formal_charge as u8).min(atom.implicit_hydrogens);
            atom.formal_charge -= removed as i8;
            atom.implicit_hydrogens -= removed;
            atom.fixed_hydrogens = true;
        }
    }

    let mut reserved: i32 = out
        .atoms
        .iter()
        .filter(|a| a.formal_charge > 0)
        .map(|a| a.formal_charge as i32)
        .sum();

    let mut anions: Vec<usize> = (0..out.atom_count())
        .filter(|&i| out.atoms[i].formal_charge < 0)
        .collect();
    // Partners of a remaining cation first, then input order.
    anions.sort_by_key(|&i| {
        let paired = out.adjacency[i]
            .iter()
            .any(|&(nb, _)| out.atoms[nb].formal_charge > 0);
        (!paired, i)
    });

    for i in anions {
        let atom = &mut out.atoms[i];
        let units = -(atom.formal_charge as i32);
        let kept = units.min(reserved);
        reserved -= kept;
        let protonate = units - kept;
        if protonate > 0 {
            atom.formal_charge += protonate as i8;
            atom.implicit_hydrogens = atom.implicit_hydrogens.saturating_add(protonate as u8);
            atom.fixed_hydrogens = true;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canon::canonical_smiles;
    use crate::smiles::parse_smiles;

    fn neutral(smiles: &str) -> String {
        canonical_smiles(&neutralize(&parse_smiles(smiles).unwrap()))
    }

    fn canon(smiles: &str) -> String {
        canonical_smiles(&parse_smiles(smiles).unwrap())
    }

    #[test]
    fn neutralize_amine() {
        assert_eq!(neutral("C[NH3+]"), canon("CN"));
        assert_eq!(neutral("[NH4+]"), canon("N"));
    }

    #[test]
    fn neutralize_carboxylate() {
        assert_eq!(neutral("CC(=O)[O-]"), canon("CC(=O)O"));
    }

    #[test]
    fn neutralize_thiolate() {
        assert_eq!(neutral("CC[S-]"), canon("CCS"));
    }

    #[test]
    fn amino_acid_zwitterion() {
        assert_eq!(neutral("[NH3+]CC(=O)[O-]"), canon("NCC(=O)O"));
    }

    #[test]
    fn nitro_group_kept() {
        let nitro = "C[N+](=O)[O-]";
        assert_eq!(neutral(nitro), canon(nitro));
    }

    #[test]
    fn quaternary_ammonium_keeps_counter_anion() {
        let betaine = "C[N+](C)(C)CC(=O)[O-]";
        assert_eq!(neutral(betaine), canon(betaine));
    }

    #[test]
    fn neutral_input_unchanged() {
        assert_eq!(neutral("c1ccccc1O"), canon("c1ccccc1O"));
    }

    #[test]
    fn idempotent() {
        for smiles in ["C[NH3+]", "CC(=O)[O-]", "C[N+](=O)[O-]", "[NH3+]CC(=O)[O-]"] {
            let once = neutralize(&parse_smiles(smiles).unwrap());
            let twice = neutralize(&once);
            assert_eq!(canonical_smiles(&once), canonical_smiles(&twice));
        }
    }
}
