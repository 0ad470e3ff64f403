//! Circular fingerprints and Tanimoto similarity.

use crate::molecule::Molecule;
use crate::ring;

/// Radius used by [`similarity`]; radius 2 corresponds to ECFP4.
pub const DEFAULT_RADIUS: usize = 2;
/// Bit length used by [`similarity`].
pub const DEFAULT_NBITS: usize = 2048;

/// A fixed-size bit vector fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    bits: Vec<u64>,
    nbits: usize,
}

impl Fingerprint {
    /// An empty fingerprint of `nbits` bits (at least one).
    pub fn new(nbits: usize) -> Self {
        let nbits = nbits.max(1);
        Fingerprint {
            bits: vec![0u64; (nbits + 63) / 64],
            nbits,
        }
    }

    pub fn set_bit(&mut self, pos: usize) {
        let pos = pos % self.nbits;
        self.bits[pos / 64] |= 1u64 << (pos % 64);
    }

    pub fn get_bit(&self, pos: usize) -> bool {
        let pos = pos % self.nbits;
        (self.bits[pos / 64] >> (pos % 64)) & 1 == 1
    }

    pub fn count_ones(&self) -> u32 {
        self.bits.iter().map(|w| w.count_ones()).sum()
    }

    pub fn nbits(&self) -> usize {
        self.nbits
    }
}

/// Morgan (ECFP-like) fingerprint.
///
/// Each atom starts from a hash of its element, degree, hydrogen count,
/// charge, ring membership and aromaticity; every iteration folds in the
/// sorted (identifier, bond order) pairs of its neighbours. Identifiers from
/// every iteration up to `radius` are set in the bit vector.
pub fn morgan_fingerprint(mol: &Molecule, radius: usize, nbits: usize) -> Fingerprint {
    let n = mol.atom_count();
    let mut fp = Fingerprint::new(nbits);
    if n == 0 {
        return fp;
    }

    let in_ring = ring::ring_atoms(mol);
    let mut identifiers: Vec<u64> = mol
        .atoms
        .iter()
        .enumerate()
        .map(|(i, atom)| {
            let mut h = FNV_OFFSET;
            h = fnv1a_update(h, atom.atomic_number as u64);
            h = fnv1a_update(h, mol.degree(i) as u64);
            h = fnv1a_update(h, atom.implicit_hydrogens as u64);
            h = fnv1a_update(h, atom.formal_charge as i64 as u64);
            h = fnv1a_update(h, in_ring[i] as u64);
            fnv1a_update(h, atom.is_aromatic as u64)
        })
        .collect();

    for &id in &identifiers {
        fp.set_bit(fold_hash(id, fp.nbits));
    }

    for _ in 0..radius {
        let next: Vec<u64> = (0..n)
            .map(|i| {
                let mut neighbors: Vec<(u64, u8)> = mol.adjacency[i]
                    .iter()
                    .map(|&(nb, bi)| (identifiers[nb], mol.bonds[bi].order as u8))
                    .collect();
                neighbors.sort_unstable();
                let mut h = fnv1a_update(FNV_OFFSET, identifiers[i]);
                for (id, order) in neighbors {
                    h = fnv1a_update(h, id);
                    h = fnv1a_update(h, order as u64);
                }
                h
            })
            .collect();
        for &id in &next {
            fp.set_bit(fold_hash(id, fp.nbits));
        }
        identifiers = next;
    }

    fp
}

/// Tanimoto coefficient of two fingerprints, in `[0, 1]`.
///
/// Two empty fingerprints are identical (1.0). Fingerprints of different
/// lengths are compared over their common words.
pub fn tanimoto_similarity(fp1: &Fingerprint, fp2: &Fingerprint) -> f64 {
    let mut and_count = 0u32;
    let mut or_count = 0u32;
    for (w1, w2) in fp1.bits.iter().zip(fp2.bits.iter()) {
        and_count += (w1 & w2).count_ones();
        or_count += (w1 | w2).count_ones();
    }
    if or_count == 0 {
        return 1.0;
    }
    and_count as f64 / or_count as f64
}

/// Radius-2, 2048-bit Morgan Tanimoto similarity of two molecules.
pub fn similarity(a: &Molecule, b: &Molecule) -> f64 {
    tanimoto_similarity(
        &morgan_fingerprint(a, DEFAULT_RADIUS, DEFAULT_NBITS),
        &morgan_fingerprint(b, DEFAULT_RADIUS, DEFAULT_NBITS),
    )
}

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv1a_update(hash: u64, value: u64) -> u64 {
    value
        .to_le_bytes()
        .iter()
        .fold(hash, |h, &b| (h ^ b as u64).wrapping_mul(FNV_PRIME))
}

fn fold_hash(hash: u64, nbits: usize) -> usize {
    (hash % nbits as u64) as usize
}
