//! SMARTS pattern parsing and substructure matching.
//!
//! Supports the atom primitives used by reaction and structural-alert
//! patterns (elements, aromaticity, hydrogen counts, degree, connectivity,
//! valence, charge, isotope, ring membership), the four logical operators
//! with their usual precedence, recursive `$(...)` environments, bond
//! expressions, and atom maps (`[C:1]`).

use std::collections::BTreeMap;

use biocat_core::{BiocatError, Result};

use crate::element::element_by_symbol;
use crate::molecule::{BondOrder, Molecule};
use crate::ring;

/// Upper bound on the mappings collected by [`find_matches`].
pub const MAX_MATCHES: usize = 1000;

/// A primitive atom query.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomPrimitive {
    /// Element with a fixed aromaticity (`C`, `c`, `[Cl]`, `[se]`).
    Element { atomic_number: u8, aromatic: bool },
    /// Element regardless of aromaticity (`#6`).
    AtomicNum(u8),
    Aromatic,
    Aliphatic,
    /// Explicit connections (`D2`).
    Degree(u8),
    /// Total attached hydrogens (`H1`).
    TotalH(u8),
    /// Implicit hydrogens (`h1`).
    ImplicitH(u8),
    Charge(i8),
    Isotope(u16),
    /// Member of any ring (`R`).
    RingMember,
    /// Member of exactly n SSSR rings (`R2`, `R0`).
    RingCount(u8),
    /// Member of an SSSR ring of the given size (`r5`).
    RingSize(u8),
    /// Total connections including hydrogens (`X3`).
    Connectivity(u8),
    /// Total bond order including hydrogens (`v4`).
    Valence(u8),
    /// Tetrahedral mark (`@`, `@@`, `@?`); any configuration matches.
    Chiral,
    Wildcard,
}

/// A logical atom expression.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomExpr {
    Prim(AtomPrimitive),
    And(Vec<AtomExpr>),
    Or(Vec<AtomExpr>),
    Not(Box<AtomExpr>),
    /// Atom environment (`$(...)`); the atom must map to the first atom of
    /// the inner pattern.
    Recursive(Box<SmartsPattern>),
}

/// A bond expression.
#[derive(Debug, Clone, PartialEq)]
pub enum BondExpr {
    Single,
    Double,
    Triple,
    Aromatic,
    /// The implicit bond between two atoms written side by side.
    SingleOrAromatic,
    Ring,
    Any,
    Not(Box<BondExpr>),
    And(Vec<BondExpr>),
    Or(Vec<BondExpr>),
}

impl BondExpr {
    /// The bond order this expression pins down, if it names exactly one.
    pub fn order(&self) -> Option<BondOrder> {
        match self {
            BondExpr::Single => Some(BondOrder::Single),
            BondExpr::Double => Some(BondOrder::Double),
            BondExpr::Triple => Some(BondOrder::Triple),
            BondExpr::Aromatic => Some(BondOrder::Aromatic),
            BondExpr::And(terms) => terms.iter().find_map(BondExpr::order),
            _ => None,
        }
    }
}

/// A single atom in a SMARTS pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct SmartsAtom {
    pub expr: AtomExpr,
    /// Atom-map number (`[C:1]`).
    pub map: Option<u16>,
}

impl SmartsAtom {
    /// Element and, when stated, aromaticity required by the expression.
    pub fn element(&self) -> Option<(u8, Option<bool>)> {
        let mut aromatic = None;
        let mut element = None;
        for prim in positive_primitives(&self.expr) {
            match prim {
                AtomPrimitive::Element { atomic_number, aromatic: a } => {
                    element = Some(*atomic_number);
                    aromatic = Some(*a);
                }
                AtomPrimitive::AtomicNum(z) => element = element.or(Some(*z)),
                AtomPrimitive::Aromatic => aromatic = Some(true),
                AtomPrimitive::Aliphatic => aromatic = Some(false),
                _ => {}
            }
        }
        element.map(|z| (z, aromatic))
    }

    /// Formal charge required by the expression.
    pub fn charge(&self) -> Option<i8> {
        positive_primitives(&self.expr).into_iter().find_map(|p| match p {
            AtomPrimitive::Charge(c) => Some(*c),
            _ => None,
        })
    }

    /// Total hydrogen count required by the expression.
    pub fn hydrogens(&self) -> Option<u8> {
        positive_primitives(&self.expr).into_iter().find_map(|p| match p {
            AtomPrimitive::TotalH(h) | AtomPrimitive::ImplicitH(h) => Some(*h),
            _ => None,
        })
    }

    pub fn isotope(&self) -> Option<u16> {
        positive_primitives(&self.expr).into_iter().find_map(|p| match p {
            AtomPrimitive::Isotope(i) => Some(*i),
            _ => None,
        })
    }
}

/// Primitives that must hold for the expression to hold: the expression
/// itself or the terms of a top-level conjunction.
fn positive_primitives(expr: &AtomExpr) -> Vec<&AtomPrimitive> {
    match expr {
        AtomExpr::Prim(p) => vec![p],
        AtomExpr::And(terms) => terms.iter().flat_map(positive_primitives).collect(),
        _ => Vec::new(),
    }
}

/// A bond between two atoms in a SMARTS pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct SmartsBond {
    pub atom1: usize,
    pub atom2: usize,
    pub expr: BondExpr,
}

/// A parsed SMARTS pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct SmartsPattern {
    pub atoms: Vec<SmartsAtom>,
    pub bonds: Vec<SmartsBond>,
    adjacency: Vec<Vec<(usize, usize)>>,
}

impl SmartsPattern {
    fn new(atoms: Vec<SmartsAtom>, bonds: Vec<SmartsBond>) -> Self {
        let mut adjacency = vec![Vec::new(); atoms.len()];
        for (bi, bond) in bonds.iter().enumerate() {
            adjacency[bond.atom1].push((bond.atom2, bi));
            adjacency[bond.atom2].push((bond.atom1, bi));
        }
        SmartsPattern { atoms, bonds, adjacency }
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Index of the pattern bond between two pattern atoms, if any.
    pub fn bond_between(&self, a1: usize, a2: usize) -> Option<usize> {
        self.adjacency[a1]
            .iter()
            .find(|&&(n, _)| n == a2)
            .map(|&(_, bi)| bi)
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct SmartsParser<'a> {
    input: &'a [u8],
    pos: usize,
    atoms: Vec<SmartsAtom>,
    bonds: Vec<SmartsBond>,
    stack: Vec<Option<usize>>,
    prev_atom: Option<usize>,
    pending_bond: Option<BondExpr>,
    ring_closures: BTreeMap<u16, (usize, Option<BondExpr>)>,
}

impl<'a> SmartsParser<'a> {
    fn new(input: &'a str) -> Self {
        SmartsParser {
            input: input.as_bytes(),
            pos: 0,
            atoms: Vec::new(),
            bonds: Vec::new(),
            stack: Vec::new(),
            prev_atom: None,
            pending_bond: None,
            ring_closures: BTreeMap::new(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn error(&self, msg: &str) -> BiocatError {
        BiocatError::Parse(format!("{} at position {} in SMARTS", msg, self.pos))
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
                    self.advance();
                    self.prev_atom = self.stack.pop().ok_or_else(|| self.error("unmatched ')'"))?;
                    self.pending_bond = None;
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
                    self.advance();
                    self.prev_atom = None;
                    self.pending_bond = None;
                }
                b'*' => {
                    self.advance();
                    self.push_atom(AtomExpr::Prim(AtomPrimitive::Wildcard), None);
                }
                _ if is_bond_start(ch) => {
                    if self.prev_atom.is_none() {
                        return Err(self.error("bond without a preceding atom"));
                    }
                    let expr = self.parse_bond_low()?;
                    self.pending_bond = Some(expr);
                }
                _ if is_organic_start(ch) => self.parse_organic_atom()?,
                _ => {
                    return Err(self.error(&format!("unexpected character '{}'", ch as char)));
                }
            }
        }
        if !self.ring_closures.is_empty() {
            let open: Vec<_> = self.ring_closures.keys().collect();
            return Err(BiocatError::Parse(format!(
                "unmatched ring closure(s) in SMARTS: {:?}",
                open
            )));
        }
        if !self.stack.is_empty() {
            return Err(BiocatError::Parse("unmatched '(' in SMARTS".into()));
        }
        if self.pending_bond.is_some() {
            return Err(BiocatError::Parse("SMARTS ends with a bond".into()));
        }
        Ok(())
    }

    fn push_atom(&mut self, expr: AtomExpr, map: Option<u16>) {
        let idx = self.atoms.len();
        self.atoms.push(SmartsAtom { expr, map });
        if let Some(prev) = self.prev_atom {
            let expr = self.pending_bond.take().unwrap_or(BondExpr::SingleOrAromatic);
            self.bonds.push(SmartsBond { atom1: prev, atom2: idx, expr });
        }
        self.pending_bond = None;
        self.prev_atom = Some(idx);
    }

    fn parse_organic_atom(&mut self) -> Result<()> {
        let ch = self.advance().ok_or_else(|| self.error("expected atom"))?;
        let aromatic = ch.is_ascii_lowercase();
        let symbol = match ch {
            b'B' if self.peek() == Some(b'r') => {
                self.advance();
                "Br"
            }
            b'C' if self.peek() == Some(b'l') => {
                self.advance();
                "Cl"
            }
            b'B' | b'b' => "B",
            b'C' | b'c' => "C",
            b'N' | b'n' => "N",
            b'O' | b'o' => "O",
            b'P' | b'p' => "P",
            b'S' | b's' => "S",
            b'F' => "F",
            b'I' => "I",
            _ => return Err(self.error(&format!("unknown organic atom '{}'", ch as char))),
        };
        let elem = element_by_symbol(symbol).ok_or_else(|| self.error("unknown element"))?;
        self.push_atom(
            AtomExpr::Prim(AtomPrimitive::Element {
                atomic_number: elem.atomic_number,
                aromatic,
            }),
            None,
        );
        Ok(())
    }

    fn parse_bracket_atom(&mut self) -> Result<()> {
        self.advance(); // '['
        let expr = self.parse_atom_low()?;
        let mut map = None;
        if self.peek() == Some(b':') {
            self.advance();
            let n = self.parse_number()?;
            map = Some(u16::try_from(n).map_err(|_| self.error("atom map out of range"))?);
        }
        if self.advance() != Some(b']') {
            return Err(self.error("expected ']'"));
        }
        self.push_atom(expr, map);
        Ok(())
    }

    // Precedence, loosest first:
    //   low_and = or (';' or)*
    //   or      = and (',' and)*
    //   and     = not (('&' | juxtaposition) not)*
    //   not     = '!'* primitive

    fn parse_atom_low(&mut self) -> Result<AtomExpr> {
        let mut terms = vec![self.parse_atom_or()?];
        while self.peek() == Some(b';') {
            self.advance();
            terms.push(self.parse_atom_or()?);
        }
        Ok(collapse(terms, AtomExpr::And))
    }

    fn parse_atom_or(&mut self) -> Result<AtomExpr> {
        let mut terms = vec![self.parse_atom_and()?];
        while self.peek() == Some(b',') {
            self.advance();
            terms.push(self.parse_atom_and()?);
        }
        Ok(collapse(terms, AtomExpr::Or))
    }

    fn parse_atom_and(&mut self) -> Result<AtomExpr> {
        let mut terms = vec![self.parse_atom_not()?];
        loop {
            match self.peek() {
                Some(b'&') => {
                    self.advance();
                    terms.push(self.parse_atom_not()?);
                }
                Some(b']' | b',' | b';' | b':') | None => break,
                Some(_) => terms.push(self.parse_atom_not()?),
            }
        }
        Ok(collapse(terms, AtomExpr::And))
    }

    fn parse_atom_not(&mut self) -> Result<AtomExpr> {
        if self.peek() == Some(b'!') {
            self.advance();
            let inner = self.parse_atom_not()?;
            return Ok(AtomExpr::Not(Box::new(inner)));
        }
        self.parse_atom_primitive()
    }

    fn parse_atom_primitive(&mut self) -> Result<AtomExpr> {
        let ch = self.peek().ok_or_else(|| self.error("unexpected end"))?;
        let prim = match ch {
            b'$' => return self.parse_recursive(),
            b'0'..=b'9' => {
                let n = self.parse_number()?;
                AtomPrimitive::Isotope(u16::try_from(n).map_err(|_| self.error("isotope out of range"))?)
            }
            b'#' => {
                self.advance();
                let n = self.parse_number()?;
                AtomPrimitive::AtomicNum(u8::try_from(n).map_err(|_| self.error("atomic number out of range"))?)
            }
            b'*' => {
                self.advance();
                AtomPrimitive::Wildcard
            }
            b'+' | b'-' => AtomPrimitive::Charge(self.parse_charge()?),
            b'@' => {
                self.advance();
                if self.peek() == Some(b'@') {
                    self.advance();
                }
                if self.peek() == Some(b'?') {
                    self.advance();
                }
                AtomPrimitive::Chiral
            }
            b'H' if self.hydrogen_is_element() => {
                self.advance();
                AtomPrimitive::Element { atomic_number: 1, aromatic: false }
            }
            _ if ch.is_ascii_alphabetic() => {
                if let Some(prim) = self.try_element()? {
                    prim
                } else {
                    self.advance();
                    match ch {
                        b'a' => AtomPrimitive::Aromatic,
                        b'A' => AtomPrimitive::Aliphatic,
                        b'D' => AtomPrimitive::Degree(self.count_or(1)?),
                        b'H' => AtomPrimitive::TotalH(self.count_or(1)?),
                        b'h' => AtomPrimitive::ImplicitH(self.count_or(1)?),
                        b'X' => AtomPrimitive::Connectivity(self.count_or(1)?),
                        b'v' => AtomPrimitive::Valence(self.count_or(1)?),
                        b'R' => match self.optional_count()? {
                            Some(n) => AtomPrimitive::RingCount(n),
                            None => AtomPrimitive::RingMember,
                        },
                        b'r' => match self.optional_count()? {
                            Some(n) => AtomPrimitive::RingSize(n),
                            None => AtomPrimitive::RingMember,
                        },
                        _ => {
                            return Err(self.error(&format!("unknown atom primitive '{}'", ch as char)))
                        }
                    }
                }
            }
            _ => return Err(self.error(&format!("unexpected '{}' in atom expression", ch as char))),
        };
        Ok(AtomExpr::Prim(prim))
    }

    /// `H` names the element when it opens the bracket (after an optional
    /// isotope) and nothing but a charge or map follows.
    fn hydrogen_is_element(&self) -> bool {
        let mut start = self.pos;
        while start > 0 && self.input[start - 1].is_ascii_digit() {
            start -= 1;
        }
        let opens = start > 0 && self.input[start - 1] == b'[';
        opens && matches!(self.peek_at(1), Some(b']' | b'+' | b'-' | b':'))
    }

    /// Element symbols: two-letter symbols first, then the one-letter ones
    /// that do not double as primitives.
    fn try_element(&mut self) -> Result<Option<AtomPrimitive>> {
        let Some(first) = self.peek() else {
            return Ok(None);
        };
        let aromatic = first.is_ascii_lowercase();
        if let Some(second) = self.peek_at(1).filter(u8::is_ascii_lowercase) {
            let two = [first.to_ascii_uppercase() as char, second as char]
                .iter()
                .collect::<String>();
            let aromatic_pair = aromatic && matches!(two.as_str(), "Se" | "As");
            if !aromatic || aromatic_pair {
                if let Some(elem) = element_by_symbol(&two) {
                    self.pos += 2;
                    return Ok(Some(AtomPrimitive::Element {
                        atomic_number: elem.atomic_number,
                        aromatic,
                    }));
                }
            }
        }
        let single = match first {
            b'B' | b'C' | b'N' | b'O' | b'P' | b'S' | b'F' | b'I' | b'K' | b'V' | b'Y' => {
                first as char
            }
            b'b' | b'c' | b'n' | b'o' | b'p' | b's' => first.to_ascii_uppercase() as char,
            _ => return Ok(None),
        };
        let elem = element_by_symbol(&single.to_string())
            .ok_or_else(|| self.error(&format!("unknown element '{single}'")))?;
        self.advance();
        Ok(Some(AtomPrimitive::Element { atomic_number: elem.atomic_number, aromatic }))
    }

    fn parse_recursive(&mut self) -> Result<AtomExpr> {
        self.advance(); // '$'
        if self.advance() != Some(b'(') {
            return Err(self.error("expected '(' after '$'"));
        }
        let start = self.pos;
        let mut depth = 1usize;
        while depth > 0 {
            match self.advance() {
                Some(b'(') => depth += 1,
                Some(b')') => depth -= 1,
                Some(_) => {}
                None => return Err(self.error("unterminated recursive SMARTS")),
            }
        }
        let inner = std::str::from_utf8(&self.input[start..self.pos - 1])
            .map_err(|_| self.error("invalid UTF-8 in recursive SMARTS"))?;
        let pattern = parse_smarts(inner)?;
        Ok(AtomExpr::Recursive(Box::new(pattern)))
    }

    fn parse_charge(&mut self) -> Result<i8> {
        let symbol = self.advance().ok_or_else(|| self.error("expected charge"))?;
        let sign: i8 = if symbol == b'+' { 1 } else { -1 };
        if matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            let n = self.parse_number()?;
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

    fn parse_number(&mut self) -> Result<u32> {
        let mut n: u32 = 0;
        let mut found = false;
        while let Some(ch) = self.peek().filter(u8::is_ascii_digit) {
            self.advance();
            n = n.saturating_mul(10).saturating_add((ch - b'0') as u32);
            found = true;
        }
        if !found {
            return Err(self.error("expected number"));
        }
        Ok(n)
    }

    fn optional_count(&mut self) -> Result<Option<u8>> {
        if !matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            return Ok(None);
        }
        let n = self.parse_number()?;
        u8::try_from(n)
            .map(Some)
            .map_err(|_| self.error("count out of range"))
    }

    fn count_or(&mut self, default: u8) -> Result<u8> {
        Ok(self.optional_count()?.unwrap_or(default))
    }

    // Bond expressions use the same precedence as atom expressions.

    fn parse_bond_low(&mut self) -> Result<BondExpr> {
        let mut terms = vec![self.parse_bond_or()?];
        while self.peek() == Some(b';') {
            self.advance();
            terms.push(self.parse_bond_or()?);
        }
        Ok(collapse(terms, BondExpr::And))
    }

    fn parse_bond_or(&mut self) -> Result<BondExpr> {
        let mut terms = vec![self.parse_bond_and()?];
        while self.peek() == Some(b',') {
            self.advance();
            terms.push(self.parse_bond_and()?);
        }
        Ok(collapse(terms, BondExpr::Or))
    }

    fn parse_bond_and(&mut self) -> Result<BondExpr> {
        let mut terms = vec![self.parse_bond_not()?];
        loop {
            match self.peek() {
                Some(b'&') => {
                    self.advance();
                    terms.push(self.parse_bond_not()?);
                }
                Some(c) if is_bond_start(c) => terms.push(self.parse_bond_not()?),
                _ => break,
            }
        }
        Ok(collapse(terms, BondExpr::And))
    }

    fn parse_bond_not(&mut self) -> Result<BondExpr> {
        if self.peek() == Some(b'!') {
            self.advance();
            let inner = self.parse_bond_not()?;
            return Ok(BondExpr::Not(Box::new(inner)));
        }
        let expr = match self.advance() {
            Some(b'-' | b'/' | b'\\') => BondExpr::Single,
            Some(b'=') => BondExpr::Double,
            Some(b'#') => BondExpr::Triple,
            Some(b':') => BondExpr::Aromatic,
            Some(b'~') => BondExpr::Any,
            Some(b'@') => BondExpr::Ring,
            _ => return Err(self.error("expected bond symbol")),
        };
        Ok(expr)
    }

    fn parse_two_digit_ring(&mut self) -> Result<u16> {
        let d1 = self.advance().ok_or_else(|| self.error("expected digit after '%'"))?;
        let d2 = self.advance().ok_or_else(|| self.error("expected digit after '%'"))?;
        if !d1.is_ascii_digit() || !d2.is_ascii_digit() {
            return Err(self.error("invalid ring closure after '%'"));
        }
        Ok((d1 - b'0') as u16 * 10 + (d2 - b'0') as u16)
    }

    fn handle_ring_closure(&mut self, ring_num: u16) -> Result<()> {
        let current = self
            .prev_atom
            .ok_or_else(|| self.error("ring closure without preceding atom"))?;
        match self.ring_closures.remove(&ring_num) {
            Some((open_atom, open_bond)) => {
                let expr = self
                    .pending_bond
                    .take()
                    .or(open_bond)
                    .unwrap_or(BondExpr::SingleOrAromatic);
                self.bonds.push(SmartsBond { atom1: open_atom, atom2: current, expr });
            }
            None => {
                let bond = self.pending_bond.take();
                self.ring_closures.insert(ring_num, (current, bond));
            }
        }
        Ok(())
    }
}

fn collapse<T>(mut terms: Vec<T>, wrap: fn(Vec<T>) -> T) -> T {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        wrap(terms)
    }
}

fn is_organic_start(ch: u8) -> bool {
    matches!(
        ch,
        b'B' | b'C' | b'N' | b'O' | b'P' | b'S' | b'F' | b'I'
            | b'b' | b'c' | b'n' | b'o' | b'p' | b's'
    )
}

fn is_bond_start(ch: u8) -> bool {
    matches!(ch, b'-' | b'=' | b'#' | b':' | b'~' | b'@' | b'/' | b'\\' | b'!')
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse a SMARTS string into a `SmartsPattern`.
pub fn parse_smarts(smarts: &str) -> Result<SmartsPattern> {
    let smarts = smarts.trim();
    if smarts.is_empty() {
        return Err(BiocatError::Parse("empty SMARTS string".into()));
    }
    let mut parser = SmartsParser::new(smarts);
    parser.parse()?;
    if parser.atoms.is_empty() {
        return Err(BiocatError::Parse("SMARTS contains no atoms".into()));
    }
    Ok(SmartsPattern::new(parser.atoms, parser.bonds))
}

/// Whether any substructure of `target` matches `pattern`.
pub fn has_match(target: &Molecule, pattern: &SmartsPattern) -> bool {
    let ctx = RingContext::new(target);
    let mut state = Matcher::new(target, pattern, &ctx, 1);
    state.search(None);
    !state.matches.is_empty()
}

/// All matches of `pattern` in `target`, up to [`MAX_MATCHES`]. Each match
/// maps pattern atom `i` to target atom `m[i]`. Matches differing only in
/// the order of symmetric atoms are all reported.
pub fn find_matches(target: &Molecule, pattern: &SmartsPattern) -> Vec<Vec<usize>> {
    let ctx = RingContext::new(target);
    let mut state = Matcher::new(target, pattern, &ctx, MAX_MATCHES);
    state.search(None);
    state.matches
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

struct RingContext {
    ring_atom: Vec<bool>,
    ring_bond: Vec<bool>,
    ring_sizes: Vec<Vec<usize>>,
    ring_count: Vec<usize>,
}

impl RingContext {
    fn new(mol: &Molecule) -> Self {
        let mut ring_sizes = vec![Vec::new(); mol.atom_count()];
        let mut ring_count = vec![0usize; mol.atom_count()];
        for r in ring::find_sssr(mol) {
            for &atom in &r {
                ring_count[atom] += 1;
                if !ring_sizes[atom].contains(&r.len()) {
                    ring_sizes[atom].push(r.len());
                }
            }
        }
        RingContext {
            ring_atom: ring::ring_atoms(mol),
            ring_bond: ring::ring_bonds(mol),
            ring_sizes,
            ring_count,
        }
    }
}

fn eval_atom(expr: &AtomExpr, mol: &Molecule, ctx: &RingContext, idx: usize) -> bool {
    match expr {
        AtomExpr::Prim(prim) => eval_primitive(prim, mol, ctx, idx),
        AtomExpr::And(terms) => terms.iter().all(|t| eval_atom(t, mol, ctx, idx)),
        AtomExpr::Or(terms) => terms.iter().any(|t| eval_atom(t, mol, ctx, idx)),
        AtomExpr::Not(inner) => !eval_atom(inner, mol, ctx, idx),
        AtomExpr::Recursive(pattern) => {
            let mut state = Matcher::new(mol, pattern, ctx, 1);
            state.search(Some(idx));
            !state.matches.is_empty()
        }
    }
}

fn eval_primitive(prim: &AtomPrimitive, mol: &Molecule, ctx: &RingContext, idx: usize) -> bool {
    let atom = &mol.atoms[idx];
    let explicit_h = mol.adjacency[idx]
        .iter()
        .filter(|&&(n, _)| mol.atoms[n].atomic_number == 1)
        .count();
    let total_h = atom.implicit_hydrogens as usize + explicit_h;
    match prim {
        AtomPrimitive::Element { atomic_number, aromatic } => {
            atom.atomic_number == *atomic_number && atom.is_aromatic == *aromatic
        }
        AtomPrimitive::AtomicNum(z) => atom.atomic_number == *z,
        AtomPrimitive::Aromatic => atom.is_aromatic,
        AtomPrimitive::Aliphatic => !atom.is_aromatic,
        AtomPrimitive::Degree(d) => mol.degree(idx) == *d as usize,
        AtomPrimitive::TotalH(h) => total_h == *h as usize,
        AtomPrimitive::ImplicitH(h) => atom.implicit_hydrogens == *h,
        AtomPrimitive::Charge(c) => atom.formal_charge == *c,
        AtomPrimitive::Isotope(i) => atom.isotope == Some(*i),
        AtomPrimitive::RingMember => ctx.ring_atom[idx],
        AtomPrimitive::RingCount(n) => ctx.ring_count[idx] == *n as usize,
        AtomPrimitive::RingSize(s) => ctx.ring_sizes[idx].contains(&(*s as usize)),
        AtomPrimitive::Connectivity(x) => mol.degree(idx) + atom.implicit_hydrogens as usize == *x as usize,
        AtomPrimitive::Valence(v) => mol.explicit_valence(idx) == *v,
        AtomPrimitive::Chiral | AtomPrimitive::Wildcard => true,
    }
}

fn eval_bond(expr: &BondExpr, mol: &Molecule, ctx: &RingContext, bi: usize) -> bool {
    let order = mol.bonds[bi].order;
    match expr {
        BondExpr::Single => order == BondOrder::Single,
        BondExpr::Double => order == BondOrder::Double,
        BondExpr::Triple => order == BondOrder::Triple,
        BondExpr::Aromatic => order == BondOrder::Aromatic,
        BondExpr::SingleOrAromatic => matches!(order, BondOrder::Single | BondOrder::Aromatic),
        BondExpr::Ring => ctx.ring_bond[bi],
        BondExpr::Any => true,
        BondExpr::Not(inner) => !eval_bond(inner, mol, ctx, bi),
        BondExpr::And(terms) => terms.iter().all(|t| eval_bond(t, mol, ctx, bi)),
        BondExpr::Or(terms) => terms.iter().any(|t| eval_bond(t, mol, ctx, bi)),
    }
}

/// Backtracking subgraph matcher over pattern atoms in index order.
struct Matcher<'a> {
    target: &'a Molecule,
    pattern: &'a SmartsPattern,
    ctx: &'a RingContext,
    limit: usize,
    core_target: Vec<Option<usize>>,
    core_pattern: Vec<Option<usize>>,
    matches: Vec<Vec<usize>>,
}

impl<'a> Matcher<'a> {
    fn new(
        target: &'a Molecule,
        pattern: &'a SmartsPattern,
        ctx: &'a RingContext,
        limit: usize,
    ) -> Self {
        Matcher {
            target,
            pattern,
            ctx,
            limit,
            core_target: vec![None; target.atom_count()],
            core_pattern: vec![None; pattern.atoms.len()],
            matches: Vec::new(),
        }
    }

    /// Run the search, optionally pinning pattern atom 0 to `anchor`.
    fn search(&mut self, anchor: Option<usize>) {
        if self.pattern.atoms.is_empty() || self.pattern.atoms.len() > self.target.atom_count() {
            return;
        }
        match anchor {
            Some(target_atom) => {
                if self.is_feasible(0, target_atom) {
                    self.assign(0, Some(target_atom));
                    self.extend(1);
                }
            }
            None => self.extend(0),
        }
    }

    fn assign(&mut self, pattern_atom: usize, target_atom: Option<usize>) {
        if let Some(old) = self.core_pattern[pattern_atom] {
            self.core_target[old] = None;
        }
        self.core_pattern[pattern_atom] = target_atom;
        if let Some(t) = target_atom {
            self.core_target[t] = Some(pattern_atom);
        }
    }

    fn done(&self) -> bool {
        self.matches.len() >= self.limit
    }

    fn extend(&mut self, depth: usize) {
        if self.done() {
            return;
        }
        if depth == self.pattern.atoms.len() {
            let mapping = self.core_pattern.iter().flatten().copied().collect();
            self.matches.push(mapping);
            return;
        }
        for target_atom in self.candidates(depth) {
            if self.is_feasible(depth, target_atom) {
                self.assign(depth, Some(target_atom));
                self.extend(depth + 1);
                self.assign(depth, None);
                if self.done() {
                    return;
                }
            }
        }
    }

    fn candidates(&self, pattern_atom: usize) -> Vec<usize> {
        let mapped_neighbor = self.pattern.adjacency[pattern_atom]
            .iter()
            .find_map(|&(pn, _)| self.core_pattern[pn]);
        match mapped_neighbor {
            Some(t) => self.target.adjacency[t]
                .iter()
                .map(|&(n, _)| n)
                .filter(|&n| self.core_target[n].is_none())
                .collect(),
            None => (0..self.target.atom_count())
                .filter(|&i| self.core_target[i].is_none())
                .collect(),
        }
    }

    fn is_feasible(&self, pattern_atom: usize, target_atom: usize) -> bool {
        if self.core_target[target_atom].is_some() {
            return false;
        }
        if !eval_atom(&self.pattern.atoms[pattern_atom].expr, self.target, self.ctx, target_atom) {
            return false;
        }
        self.pattern.adjacency[pattern_atom]
            .iter()
            .all(|&(pn, pbi)| match self.core_pattern[pn] {
                Some(t) => match self.target.bond_between(target_atom, t) {
                    Some(tbi) => eval_bond(&self.pattern.bonds[pbi].expr, self.target, self.ctx, tbi),
                    None => false,
                },
                None => true,
            })
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn parse_smarts_does_not_panic(s in "\\PC{0,60}") {
            let _ = parse_smarts(&s);
        }
    }
}
