//! SMILES string parser.

use std::collections::BTreeMap;

use biocat_core::{BiocatError, Result};

use crate::aromaticity::{kekulize, perceive_aromaticity};
use crate::element::{charged_valences, element_by_symbol};
use crate::molecule::{Bond, BondOrder, Chirality, MolAtom, Molecule};
use crate::ring::ring_atoms;
use crate::stereo::{assign_double_bonds, assign_tetrahedral, clear_stereo, transfer_stereo, Image, Slot};

/// Parse a SMILES string into a `Molecule`.
///
/// Aromatic input is kekulized and aromaticity is then perceived afresh, so
/// Kekulé and aromatic spellings of a molecule give the same structure.
/// Tetrahedral (`@`, `@@`) and double-bond (`/`, `\`) stereo is kept; atom
/// classes are dropped. Explicit `[H]` atoms bonded to a heavy atom are
/// folded into that atom's hydrogen count. The result is sanity checked:
/// aromatic atoms must lie in a ring and no atom may exceed its maximum
/// allowed valence. Anything after the first whitespace is treated as a
/// title and ignored.
pub fn parse_smiles(smiles: &str) -> Result<Molecule> {
    let body = smiles.split_whitespace().next().unwrap_or("");
    if body.is_empty() {
        return Err(BiocatError::Parse("empty SMILES".into()));
    }
    let mut parser = SmilesParser::new(body);
    parser.parse()?;
    parser.check_unclosed()?;
    let written = parser.written_orders();
    let marks = std::mem::take(&mut parser.marks);

    let mut mol = Molecule::new(parser.atoms, parser.bonds);
    check_aromatic_in_rings(&mol)?;
    mol.assign_default_hydrogens();
    kekulize(&mut mol)?;
    assign_tetrahedral(&mut mol, &written);
    assign_double_bonds(&mut mol, &marks);
    let mut mol = fold_explicit_hydrogens(&mol);
    validate(&mol)?;
    perceive_aromaticity(&mut mol);
    Ok(mol)
}

struct SmilesParser<'a> {
    input: &'a [u8],
    pos: usize,
    atoms: Vec<MolAtom>,
    bonds: Vec<Bond>,
    ring_closures: BTreeMap<u16, OpenRing>,
    /// Stack of atom indices for branch handling
    stack: Vec<Option<usize>>,
    prev_atom: Option<usize>,
    pending_bond: Option<BondOrder>,
    /// `Some(true)` after `/`, `Some(false)` after `\`.
    pending_direction: Option<bool>,
    /// Per bond: (atom written first, `/`) for directional bonds.
    marks: Vec<Option<(usize, bool)>>,
    /// Per atom: neighbours in the order the string lists them.
    neighbor_order: Vec<Vec<usize>>,
    /// Per atom: whether it was bonded to a preceding atom when written.
    has_preceding: Vec<bool>,
}

/// A ring-closure digit waiting for its partner.
struct OpenRing {
    atom: usize,
    order: Option<BondOrder>,
    direction: Option<bool>,
    /// Position reserved in the opening atom's neighbour order.
    slot: usize,
}

impl<'a> SmilesParser<'a> {
    fn new(input: &'a str) -> Self {
        SmilesParser {
            input: input.as_bytes(),
            pos: 0,
            atoms: Vec::new(),
            bonds: Vec::new(),
            ring_closures: BTreeMap::new(),
            stack: Vec::new(),
            prev_atom: None,
            pending_bond: None,
            pending_direction: None,
            marks: Vec::new(),
            neighbor_order: Vec::new(),
            has_preceding: Vec::new(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn error(&self, msg: &str) -> BiocatError {
        BiocatError::Parse(format!("{} at position {}", msg, self.pos))
    }

    fn set_bond(&mut self, order: BondOrder, direction: Option<bool>) -> Result<()> {
        if self.pending_bond.is_some() {
            return Err(self.error("two consecutive bond symbols"));
        }
        if self.prev_atom.is_none() {
            return Err(self.error("bond without a preceding atom"));
        }
        self.pending_bond = Some(order);
        self.pending_direction = direction;
        Ok(())
    }

    fn parse(&mut self) -> Result<()> {
        while let Some(ch) = self.peek() {
            match ch {
                b'(' => {
                    if self.prev_atom.is_none() {
                        return Err(self.error("branch without a preceding atom"));
                    }
                    self.advance();
                    self.stack.push(self.prev_atom);
                }
                b')' => {
                    if self.pending_bond.is_some() {
                        return Err(self.error("dangling bond before ')'"));
                    }
                    self.advance();
                    self.prev_atom = self
                        .stack
                        .pop()
                        .ok_or_else(|| self.error("unmatched ')'"))?;
                }
                b'-' => {
                    self.advance();
                    self.set_bond(BondOrder::Single, None)?;
                }
                b'/' | b'\\' => {
                    self.advance();
                    self.set_bond(BondOrder::Single, Some(ch == b'/'))?;
                }
                b'=' => {
                    self.advance();
                    self.set_bond(BondOrder::Double, None)?;
                }
                b'#' => {
                    self.advance();
                    self.set_bond(BondOrder::Triple, None)?;
                }
                b':' => {
                    self.advance();
                    self.set_bond(BondOrder::Aromatic, None)?;
                }
                b'%' => {
                    self.advance();
                    let ring_num = self.parse_two_digit_ring()?;
                    self.handle_ring_closure(ring_num)?;
                }
                b'[' => self.parse_bracket_atom()?,
                b'0'..=b'9' => {
                    self.advance();
                    self.handle_ring_closure((ch - b'0') as u16)?;
                }
                b'.' => {
                    if self.pending_bond.is_some() {
                        return Err(self.error("dangling bond before '.'"));
                    }
                    self.advance();
                    self.prev_atom = None;
                }
                b'*' => return Err(self.error("wildcard atom")),
                _ if is_organic_atom_start(ch) => self.parse_organic_atom()?,
                _ => {
                    return Err(self.error(&format!("unexpected character '{}'", ch as char)));
                }
            }
        }
        if self.pending_bond.is_some() {
            return Err(self.error("SMILES ends with a bond"));
        }
        Ok(())
    }

    fn parse_organic_atom(&mut self) -> Result<()> {
        let ch = self.advance().ok_or_else(|| self.error("expected atom"))?;
        let is_aromatic = ch.is_ascii_lowercase();
        let symbol = match ch.to_ascii_uppercase() {
            b'B' if !is_aromatic && self.peek() == Some(b'r') => {
                self.advance();
                "Br"
            }
            b'C' if !is_aromatic && self.peek() == Some(b'l') => {
                self.advance();
                "Cl"
            }
            b'B' => "B",
            b'C' => "C",
            b'N' => "N",
            b'O' => "O",
            b'P' => "P",
            b'S' => "S",
            b'F' => "F",
            b'I' => "I",
            other => {
                return Err(self.error(&format!("unknown organic atom '{}'", other as char)));
            }
        };

        let elem = element_by_symbol(symbol)
            .ok_or_else(|| self.error(&format!("unknown element '{symbol}'")))?;
        let mut atom = MolAtom::new(elem.atomic_number);
        atom.is_aromatic = is_aromatic;
        self.push_atom(atom)
    }

    fn parse_bracket_atom(&mut self) -> Result<()> {
        self.advance(); // '['

        let isotope = self.parse_optional_number();

        let first = self
            .advance()
            .ok_or_else(|| self.error("unexpected end of SMILES in bracket atom"))?;
        if !first.is_ascii_alphabetic() {
            return Err(self.error(&format!("expected element symbol, found '{}'", first as char)));
        }
        let is_aromatic = first.is_ascii_lowercase();
        let upper = first.to_ascii_uppercase() as char;

        // Prefer the two-letter symbol when it names a real element
        // (aromatic "se" and "as" included).
        let symbol = match self.peek() {
            Some(next) if next.is_ascii_lowercase() => {
                let two = format!("{}{}", upper, next as char);
                if element_by_symbol(&two).is_some() {
                    self.advance();
                    two
                } else {
                    upper.to_string()
                }
            }
            _ => upper.to_string(),
        };
        let elem = element_by_symbol(&symbol)
            .ok_or_else(|| self.error(&format!("unknown element '{symbol}'")))?;
        if is_aromatic && !matches!(elem.atomic_number, 5 | 6 | 7 | 8 | 15 | 16 | 33 | 34) {
            return Err(self.error(&format!("element '{symbol}' cannot be aromatic")));
        }

        let chirality = self.parse_chirality();

        let mut hydrogens = 0u8;
        if self.peek() == Some(b'H') {
            self.advance();
            hydrogens = match self.peek() {
                Some(d) if d.is_ascii_digit() => {
                    self.advance();
                    d - b'0'
                }
                _ => 1,
            };
        }

        let charge = self.parse_charge()?;

        // Atom class, e.g. [CH3:4]
        if self.peek() == Some(b':') {
            self.advance();
            if self.parse_optional_number().is_none() {
                return Err(self.error("expected atom class after ':'"));
            }
        }

        if self.advance() != Some(b']') {
            return Err(self.error("expected ']' in bracket atom"));
        }

        let isotope = match isotope {
            Some(n) => Some(u16::try_from(n).map_err(|_| self.error("isotope out of range"))?),
            None => None,
        };
        let atom = MolAtom {
            atomic_number: elem.atomic_number,
            formal_charge: charge,
            isotope,
            is_aromatic,
            implicit_hydrogens: hydrogens,
            fixed_hydrogens: true,
            chirality,
        };
        self.push_atom(atom)
    }

    /// `@`, `@@`, `@TH1` and `@TH2`. Other chirality classes are accepted
    /// and dropped.
    fn parse_chirality(&mut self) -> Chirality {
        if self.peek() != Some(b'@') {
            return Chirality::None;
        }
        self.advance();
        let mut chirality = Chirality::CounterClockwise;
        if self.peek() == Some(b'@') {
            self.advance();
            chirality = Chirality::Clockwise;
        }
        let rest = &self.input[self.pos..];
        let class = [b"TH", b"AL", b"SP", b"TB", b"OH"]
            .into_iter()
            .find(|c| rest.starts_with(*c));
        if let Some(class) = class {
            self.pos += 2;
            let number = self.parse_optional_number();
            chirality = match (class, number) {
                (b"TH", Some(1)) => Chirality::CounterClockwise,
                (b"TH", Some(2)) => Chirality::Clockwise,
                _ => Chirality::None,
            };
        }
        chirality
    }

    fn parse_charge(&mut self) -> Result<i8> {
        let sign: i8 = match self.peek() {
            Some(b'+') => 1,
            Some(b'-') => -1,
            _ => return Ok(0),
        };
        let symbol = self.advance().unwrap_or(b'+');
        if let Some(n) = self.parse_optional_number() {
            let n = i8::try_from(n).map_err(|_| self.error("charge out of range"))?;
            return Ok(sign * n);
        }
        let mut magnitude: i8 = 1;
        while self.peek() == Some(symbol) {
            self.advance();
            magnitude = magnitude.saturating_add(1);
        }
        Ok(sign * magnitude)
    }

    fn push_atom(&mut self, atom: MolAtom) -> Result<()> {
        let atom_idx = self.atoms.len();
        self.atoms.push(atom);
        self.neighbor_order.push(Vec::new());
        self.has_preceding.push(self.prev_atom.is_some());
        if let Some(prev) = self.prev_atom {
            let order = self.pending_bond.take().unwrap_or_else(|| {
                self.implicit_order(prev, atom_idx)
            });
            self.add_bond(prev, atom_idx, order, self.pending_direction);
            self.neighbor_order[prev].push(atom_idx);
            self.neighbor_order[atom_idx].push(prev);
        }
        self.pending_bond = None;
        self.pending_direction = None;
        self.prev_atom = Some(atom_idx);
        Ok(())
    }

    /// `direction` is read from `from` towards `to`.
    fn add_bond(&mut self, from: usize, to: usize, order: BondOrder, direction: Option<bool>) {
        self.bonds.push(Bond::new(from, to, order));
        self.marks.push(direction.map(|up| (from, up)));
    }

    /// Neighbour order of every stereo-marked atom as the string gives it, the
    /// implicit hydrogen or lone pair following the preceding atom.
    fn written_orders(&self) -> Vec<Vec<Slot>> {
        self.atoms
            .iter()
            .enumerate()
            .map(|(i, atom)| {
                if atom.chirality == Chirality::None {
                    return Vec::new();
                }
                let mut order: Vec<Slot> = self.neighbor_order[i].iter().map(|&nb| Some(nb)).collect();
                if order.len() == 3 {
                    order.insert(usize::from(self.has_preceding[i]), None);
                }
                order
            })
            .collect()
    }

    fn implicit_order(&self, a: usize, b: usize) -> BondOrder {
        if self.atoms[a].is_aromatic && self.atoms[b].is_aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        }
    }

    fn parse_optional_number(&mut self) -> Option<u32> {
        let mut n: u32 = 0;
        let mut found = false;
        while let Some(ch) = self.peek() {
            if !ch.is_ascii_digit() {
                break;
            }
            self.advance();
            n = n.saturating_mul(10).saturating_add((ch - b'0') as u32);
            found = true;
        }
        found.then_some(n)
    }

    fn parse_two_digit_ring(&mut self) -> Result<u16> {
        let d1 = self.advance().ok_or_else(|| self.error("expected digit after '%'"))?;
        let d2 = self
            .advance()
            .ok_or_else(|| self.error("expected second digit after '%'"))?;
        if !d1.is_ascii_digit() || !d2.is_ascii_digit() {
            return Err(self.error("invalid ring closure number after '%'"));
        }
        Ok((d1 - b'0') as u16 * 10 + (d2 - b'0') as u16)
    }

    fn handle_ring_closure(&mut self, ring_num: u16) -> Result<()> {
        let current = self
            .prev_atom
            .ok_or_else(|| self.error("ring closure without preceding atom"))?;

        match self.ring_closures.remove(&ring_num) {
            Some(open) => {
                let open_atom = open.atom;
                if open_atom == current || self.bond_exists(open_atom, current) {
                    return Err(self.error("ring closure duplicates an existing bond"));
                }
                let order = match (self.pending_bond.take(), open.order) {
                    (Some(a), Some(b)) if a != b => {
                        return Err(self.error("conflicting ring closure bond orders"));
                    }
                    (Some(a), _) | (None, Some(a)) => a,
                    (None, None) => self.implicit_order(open_atom, current),
                };
                match (open.direction, self.pending_direction.take()) {
                    (Some(up), _) => self.add_bond(open_atom, current, order, Some(up)),
                    (None, direction) => self.add_bond(current, open_atom, order, direction),
                }
                self.neighbor_order[open_atom][open.slot] = current;
                self.neighbor_order[current].push(open_atom);
            }
            None => {
                let slot = self.neighbor_order[current].len();
                self.neighbor_order[current].push(usize::MAX);
                let open = OpenRing {
                    atom: current,
                    order: self.pending_bond.take(),
                    direction: self.pending_direction.take(),
                    slot,
                };
                self.ring_closures.insert(ring_num, open);
            }
        }
        Ok(())
    }

    fn bond_exists(&self, a: usize, b: usize) -> bool {
        self.bonds
            .iter()
            .any(|bd| (bd.atom1 == a && bd.atom2 == b) || (bd.atom1 == b && bd.atom2 == a))
    }

    fn check_unclosed(&self) -> Result<()> {
        if !self.ring_closures.is_empty() {
            let open: Vec<_> = self.ring_closures.keys().collect();
            return Err(BiocatError::Parse(format!(
                "unmatched ring closure(s): {:?}",
                open
            )));
        }
        if !self.stack.is_empty() {
            return Err(BiocatError::Parse(format!(
                "{} unmatched '(' in SMILES",
                self.stack.len()
            )));
        }
        if self.atoms.is_empty() {
            return Err(BiocatError::Parse("SMILES contains no atoms".into()));
        }
        Ok(())
    }
}

fn is_organic_atom_start(ch: u8) -> bool {
    matches!(
        ch,
        b'B' | b'C' | b'N' | b'O' | b'P' | b'S' | b'F' | b'I'
            | b'b' | b'c' | b'n' | b'o' | b'p' | b's'
    )
}

/// Remove plain hydrogen atoms bonded to exactly one heavy atom, adding them
/// to that atom's hydrogen count. Stereo follows the renumbering.
fn fold_explicit_hydrogens(mol: &Molecule) -> Molecule {
    let removable: Vec<bool> = (0..mol.atom_count())
        .map(|i| {
            let atom = &mol.atoms[i];
            atom.atomic_number == 1
                && atom.formal_charge == 0
                && atom.isotope.is_none()
                && mol.degree(i) == 1
                && mol.bonds[mol.adjacency[i][0].1].order == BondOrder::Single
                && mol.atoms[mol.adjacency[i][0].0].atomic_number != 1
        })
        .collect();
    if !removable.iter().any(|&r| r) {
        return mol.clone();
    }

    let mut atoms = mol.atoms.clone();
    for (i, &remove) in removable.iter().enumerate() {
        if remove {
            let heavy = mol.adjacency[i][0].0;
            atoms[heavy].implicit_hydrogens = atoms[heavy].implicit_hydrogens.saturating_add(1);
        }
    }

    let mut images = vec![Image::Hydrogen; mol.atom_count()];
    let mut kept = Vec::with_capacity(atoms.len());
    for (i, atom) in atoms.into_iter().enumerate() {
        if !removable[i] {
            images[i] = Image::Atom(kept.len());
            kept.push(atom);
        }
    }
    let index = |i: usize| match images[i] {
        Image::Atom(k) => k,
        _ => usize::MAX,
    };
    let bonds = mol
        .bonds
        .iter()
        .filter(|b| !removable[b.atom1] && !removable[b.atom2])
        .map(|b| Bond::new(index(b.atom1), index(b.atom2), b.order))
        .collect();
    let mut folded = Molecule::new(kept, bonds);
    clear_stereo(&mut folded);
    transfer_stereo(mol, &mut folded, &images);
    folded
}

fn check_aromatic_in_rings(mol: &Molecule) -> Result<()> {
    let in_ring = ring_atoms(mol);
    match (0..mol.atom_count()).find(|&i| mol.atoms[i].is_aromatic && !in_ring[i]) {
        Some(i) => Err(BiocatError::Parse(format!("non-ring atom {i} marked aromatic"))),
        None => Ok(()),
    }
}

fn validate(mol: &Molecule) -> Result<()> {
    for (i, atom) in mol.atoms.iter().enumerate() {
        let allowed = charged_valences(atom.atomic_number, atom.formal_charge);
        if let Some(&max) = allowed.last() {
            let valence = mol.explicit_valence(i);
            if valence > max {
                return Err(BiocatError::Parse(format!(
                    "explicit valence {} for atom {} exceeds the maximum of {}",
                    valence, i, max
                )));
            }
        }
    }
    Ok(())
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Strategy for simple acyclic SMILES: chains of aliphatic organic atoms
    fn simple_smiles() -> impl Strategy<Value = String> {
        let atoms = prop_oneof![Just("C"), Just("N"), Just("O"), Just("S"), Just("Cl")];
        proptest::collection::vec(atoms, 1..=20).prop_map(|parts| parts.join(""))
    }

    proptest! {
        #[test]
        fn parse_smiles_does_not_panic(s in "\\PC{0,100}") {
            let _ = parse_smiles(&s);
        }

        #[test]
        fn atom_count_matches_tokens(smi in simple_smiles()) {
            if let Ok(mol) = parse_smiles(&smi) {
                let expected = smi.replace("Cl", "X").len();
                prop_assert_eq!(mol.atom_count(), expected);
            }
        }
    }
}
