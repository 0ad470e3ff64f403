//! Ring perception: ring membership and the smallest set of smallest rings.

use std::collections::VecDeque;

use crate::molecule::Molecule;

/// Ring membership per atom. Atoms of degree one or less are pruned
/// repeatedly; of the survivors, only atoms with a ring bond are kept, which
/// drops linkers between two rings.
pub fn ring_atoms(mol: &Molecule) -> Vec<bool> {
    let mut in_ring = prune_terminal(mol);
    let ring_bond = ring_bonds_from(mol, &in_ring);
    for (i, flag) in in_ring.iter_mut().enumerate() {
        if *flag {
            *flag = mol.adjacency[i].iter().any(|&(_, bi)| ring_bond[bi]);
        }
    }
    in_ring
}

/// Ring membership per bond: a bond is in a ring when its endpoints stay
/// connected after the bond is removed.
pub fn ring_bonds(mol: &Molecule) -> Vec<bool> {
    ring_bonds_from(mol, &prune_terminal(mol))
}

fn prune_terminal(mol: &Molecule) -> Vec<bool> {
    let n = mol.atom_count();
    let mut degree: Vec<usize> = (0..n).map(|i| mol.degree(i)).collect();
    let mut queue: VecDeque<usize> = (0..n).filter(|&i| degree[i] <= 1).collect();

    let mut removed = vec![false; n];
    while let Some(atom) = queue.pop_front() {
        if removed[atom] {
            continue;
        }
        removed[atom] = true;
        for &(neighbor, _) in &mol.adjacency[atom] {
            if !removed[neighbor] {
                degree[neighbor] -= 1;
                if degree[neighbor] <= 1 {
                    queue.push_back(neighbor);
                }
            }
        }
    }
    removed.iter().map(|&r| !r).collect()
}

fn ring_bonds_from(mol: &Molecule, candidates: &[bool]) -> Vec<bool> {
    mol.bonds
        .iter()
        .enumerate()
        .map(|(bi, bond)| {
            candidates[bond.atom1]
                && candidates[bond.atom2]
                && shortest_path(mol, bond.atom1, bond.atom2, bi, candidates).is_some()
        })
        .collect()
}

/// Smallest set of smallest rings, each ring a list of atom indices in
/// path order, sorted by ring size.
pub fn find_sssr(mol: &Molecule) -> Vec<Vec<usize>> {
    if mol.atom_count() == 0 || mol.bond_count() == 0 {
        return Vec::new();
    }
    let expected =
        mol.bond_count() as isize - mol.atom_count() as isize + count_components(mol) as isize;
    if expected <= 0 {
        return Vec::new();
    }

    let in_ring = ring_atoms(mol);
    let mut rings: Vec<Vec<usize>> = Vec::new();
    for (bi, bond) in mol.bonds.iter().enumerate() {
        if !in_ring[bond.atom1] || !in_ring[bond.atom2] {
            continue;
        }
        if let Some(mut ring) = shortest_path(mol, bond.atom1, bond.atom2, bi, &in_ring) {
            normalize_ring(&mut ring);
            if !rings.contains(&ring) {
                rings.push(ring);
            }
        }
    }

    rings.sort_by_key(|r| r.len());
    rings.truncate(expected as usize);
    rings
}

fn count_components(mol: &Molecule) -> usize {
    let n = mol.atom_count();
    let mut visited = vec![false; n];
    let mut components = 0;
    for start in 0..n {
        if visited[start] {
            continue;
        }
        components += 1;
        let mut queue = VecDeque::from([start]);
        visited[start] = true;
        while let Some(curr) = queue.pop_front() {
            for &(neighbor, _) in &mol.adjacency[curr] {
                if !visited[neighbor] {
                    visited[neighbor] = true;
                    queue.push_back(neighbor);
                }
            }
        }
    }
    components
}

/// BFS from `start` to `end` avoiding one bond, restricted to allowed atoms.
fn shortest_path(
    mol: &Molecule,
    start: usize,
    end: usize,
    excluded_bond: usize,
    allowed: &[bool],
) -> Option<Vec<usize>> {
    let n = mol.atom_count();
    let mut visited = vec![false; n];
    let mut parent = vec![usize::MAX; n];
    let mut queue = VecDeque::from([start]);
    visited[start] = true;

    while let Some(curr) = queue.pop_front() {
        if curr == end {
            let mut path = vec![end];
            let mut node = end;
            while node != start {
                node = parent[node];
                path.push(node);
            }
            path.reverse();
            return Some(path);
        }
        for &(neighbor, bi) in &mol.adjacency[curr] {
            if bi != excluded_bond && !visited[neighbor] && allowed[neighbor] {
                visited[neighbor] = true;
                parent[neighbor] = curr;
                queue.push_back(neighbor);
            }
        }
    }
    None
}

/// Rotate a ring to start at its smallest index and walk in the direction
/// whose second element is smaller.
fn normalize_ring(ring: &mut [usize]) {
    let Some(min_pos) = ring
        .iter()
        .enumerate()
        .min_by_key(|&(_, &v)| v)
        .map(|(i, _)| i)
    else {
        return;
    };
    ring.rotate_left(min_pos);
    let n = ring.len();
    if n > 2 && ring[n - 1] < ring[1] {
        ring[1..].reverse();
    }
}
