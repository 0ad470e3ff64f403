//! Reaction SMARTS parsing and application.
//!
//! A reaction is written `reactants>agents>products` (agents are optional and
//! ignored), each side a `.`-separated list of SMARTS templates. Applying a
//! reaction matches every reactant template against its reactant, takes the
//! cartesian product of the matches, and builds one set of products per
//! combination:
//!
//! - mapped product atoms start from the matched reactant atom and take any
//!   element, charge, isotope or hydrogen count the product template states;
//! - unmapped product atoms are created from the template alone;
//! - reactant atoms outside the match are carried over with their bonds;
//! - a bond between two mapped atoms is broken when the reactant template
//!   has it and the product template does not, and copied from the reactant
//!   when neither template mentions it.
//!
//! Products keep the stereo of the reactant atoms they came from, while
//! chirality written in templates is not applied. Each product is then
//! kekulized and its aromaticity perceived again.

use std::collections::{HashMap, HashSet, VecDeque};

use biocat_core::{BiocatError, Result};

use crate::aromaticity::rearomatize;
use crate::molecule::{Bond, BondOrder, MolAtom, Molecule};
use crate::smarts::{find_matches, parse_smarts, BondExpr, SmartsAtom, SmartsPattern};
use crate::stereo::{clear_stereo, transfer_stereo, Image};

/// Upper bound on match combinations expanded per application.
pub const MAX_COMBINATIONS: usize = 1000;

/// A parsed reaction.
#[derive(Debug, Clone)]
pub struct Reaction {
    pub reactant_templates: Vec<SmartsPattern>,
    pub product_templates: Vec<SmartsPattern>,
}

impl Reaction {
    pub fn reactant_count(&self) -> usize {
        self.reactant_templates.len()
    }

    pub fn product_count(&self) -> usize {
        self.product_templates.len()
    }
}

/// Parse a reaction SMARTS (`A.B>>C`, `A>agent>C`).
pub fn parse_reaction(text: &str) -> Result<Reaction> {
    let parts: Vec<&str> = text.trim().split('>').collect();
    if parts.len() != 3 {
        return Err(BiocatError::Parse(format!(
            "reaction SMARTS must have the form 'reactants>agents>products': {text}"
        )));
    }
    let reactant_templates = parse_side(parts[0])?;
    let product_templates = parse_side(parts[2])?;
    if reactant_templates.is_empty() || product_templates.is_empty() {
        return Err(BiocatError::Parse(format!(
            "reaction SMARTS has an empty side: {text}"
        )));
    }
    Ok(Reaction { reactant_templates, product_templates })
}

fn parse_side(side: &str) -> Result<Vec<SmartsPattern>> {
    split_components(side)
        .into_iter()
        .filter(|c| !c.is_empty())
        .map(parse_smarts)
        .collect()
}

/// Split on `.` outside brackets and parentheses.
fn split_components(side: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let (mut depth, mut in_bracket, mut start) = (0i32, false, 0usize);
    for (i, ch) in side.char_indices() {
        match ch {
            '[' => in_bracket = true,
            ']' => in_bracket = false,
            '(' if !in_bracket => depth += 1,
            ')' if !in_bracket => depth -= 1,
            '.' if !in_bracket && depth == 0 => {
                parts.push(side[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(side[start..].trim());
    parts
}

/// Apply `reaction` to `reactants`, one reactant per reactant template.
///
/// Returns one entry per match combination, each holding one molecule per
/// product template. No match yields an empty result; a reactant count that
/// differs from the template count is an error.
pub fn run_reaction(reaction: &Reaction, reactants: &[Molecule]) -> Result<Vec<Vec<Molecule>>> {
    if reactants.len() != reaction.reactant_count() {
        return Err(BiocatError::InvalidInput(format!(
            "reaction expects {} reactant(s), got {}",
            reaction.reactant_count(),
            reactants.len()
        )));
    }

    let per_template: Vec<Vec<Vec<usize>>> = reaction
        .reactant_templates
        .iter()
        .zip(reactants)
        .map(|(tmpl, mol)| find_matches(mol, tmpl))
        .collect();
    if per_template.iter().any(Vec::is_empty) {
        return Ok(Vec::new());
    }

    let mut outcomes = Vec::new();
    for combo in cartesian_product(&per_template, MAX_COMBINATIONS) {
        let ctx = MatchContext::new(reaction, &combo, reactants)?;
        let products: Option<Vec<Molecule>> = reaction
            .product_templates
            .iter()
            .map(|tmpl| build_product(tmpl, &ctx, reactants))
            .collect();
        if let Some(products) = products {
            outcomes.push(products);
        }
    }
    Ok(outcomes)
}

/// Combinations of one match per template, in template-major order, capped at `max`.
fn cartesian_product<T>(sets: &[Vec<T>], max: usize) -> Vec<Vec<&T>> {
    let mut result: Vec<Vec<&T>> = vec![Vec::new()];
    for set in sets {
        let mut next = Vec::new();
        'outer: for combo in &result {
            for item in set {
                if next.len() == max {
                    break 'outer;
                }
                let mut extended = combo.clone();
                extended.push(item);
                next.push(extended);
            }
        }
        result = next;
    }
    result
}

/// Atom-map bookkeeping for one match combination.
struct MatchContext {
    /// map number -> (reactant, reactant atom)
    by_map: HashMap<u16, (usize, usize)>,
    /// per reactant: reactant atom -> map number
    map_of: Vec<HashMap<usize, u16>>,
    /// per reactant: atoms covered by the match
    matched: Vec<HashSet<usize>>,
    /// per reactant template: bonds between mapped atoms, as map-number pairs
    template_bonds: Vec<HashSet<(u16, u16)>>,
}

impl MatchContext {
    fn new(reaction: &Reaction, combo: &[&Vec<usize>], reactants: &[Molecule]) -> Result<Self> {
        let mut by_map = HashMap::new();
        let mut map_of = vec![HashMap::new(); reactants.len()];
        for (ri, (tmpl, mapping)) in reaction.reactant_templates.iter().zip(combo).enumerate() {
            for (q, atom) in tmpl.atoms.iter().enumerate() {
                if let Some(mn) = atom.map {
                    if by_map.insert(mn, (ri, mapping[q])).is_some() {
                        return Err(BiocatError::InvalidInput(format!(
                            "atom map {mn} appears twice among reactant templates"
                        )));
                    }
                    map_of[ri].insert(mapping[q], mn);
                }
            }
        }
        Ok(MatchContext {
            by_map,
            map_of,
            matched: combo.iter().map(|m| m.iter().copied().collect()).collect(),
            template_bonds: reaction.reactant_templates.iter().map(mapped_pairs).collect(),
        })
    }
}

fn mapped_pairs(tmpl: &SmartsPattern) -> HashSet<(u16, u16)> {
    tmpl.bonds
        .iter()
        .filter_map(|b| {
            let (ma, mb) = (tmpl.atoms[b.atom1].map?, tmpl.atoms[b.atom2].map?);
            Some((ma.min(mb), ma.max(mb)))
        })
        .collect()
}

/// How a product atom's hydrogen count is settled once all bonds exist.
#[derive(Clone, Copy)]
enum HydrogenRule {
    /// Stated by the template.
    Template,
    /// Copied with its reactant environment.
    Carried,
    /// Mapped from a reactant atom whose count was explicit: adjust by the
    /// change in bonding.
    Adjust { reactant: usize, atom: usize },
    /// Recomputed from the default valence.
    Default,
}

struct ProductBuilder {
    atoms: Vec<MolAtom>,
    bonds: Vec<Bond>,
    bonded: HashSet<(usize, usize)>,
    rules: Vec<HydrogenRule>,
}

impl ProductBuilder {
    fn add_atom(&mut self, atom: MolAtom, rule: HydrogenRule) -> usize {
        self.atoms.push(atom);
        self.rules.push(rule);
        self.atoms.len() - 1
    }

    fn add_bond(&mut self, a: usize, b: usize, order: BondOrder) {
        if a != b && self.bonded.insert((a.min(b), a.max(b))) {
            self.bonds.push(Bond::new(a, b, order));
        }
    }

    fn has_bond(&self, a: usize, b: usize) -> bool {
        self.bonded.contains(&(a.min(b), a.max(b)))
    }
}

fn build_product(tmpl: &SmartsPattern, ctx: &MatchContext, reactants: &[Molecule]) -> Option<Molecule> {
    let mut pb = ProductBuilder {
        atoms: Vec::new(),
        bonds: Vec::new(),
        bonded: HashSet::new(),
        rules: Vec::new(),
    };
    let mut node_of = Vec::with_capacity(tmpl.atom_count());
    let mut node_of_map: HashMap<u16, usize> = HashMap::new();

    for p_atom in &tmpl.atoms {
        let source = p_atom.map.and_then(|mn| ctx.by_map.get(&mn).copied());
        let (mut atom, mut rule) = match source {
            Some((ri, t)) => {
                let reactant_atom = reactants[ri].atoms[t].clone();
                let rule = if reactant_atom.fixed_hydrogens {
                    HydrogenRule::Adjust { reactant: ri, atom: t }
                } else {
                    HydrogenRule::Default
                };
                (reactant_atom, rule)
            }
            None => {
                p_atom.element()?;
                (MolAtom::default(), HydrogenRule::Default)
            }
        };
        apply_template_atom(&mut atom, p_atom);
        if let Some(h) = p_atom.hydrogens() {
            atom.implicit_hydrogens = h;
            atom.fixed_hydrogens = true;
            rule = HydrogenRule::Template;
        }
        let node = pb.add_atom(atom, rule);
        node_of.push(node);
        if let Some(mn) = p_atom.map {
            node_of_map.insert(mn, node);
        }
    }

    for bond in &tmpl.bonds {
        let (a, b) = (node_of[bond.atom1], node_of[bond.atom2]);
        let order = bond
            .expr
            .order()
            .or_else(|| reactant_order(tmpl, bond.atom1, bond.atom2, ctx, reactants))
            .unwrap_or_else(|| implicit_order(&bond.expr, &pb.atoms[a], &pb.atoms[b]));
        pb.add_bond(a, b, order);
    }

    let product_pairs = mapped_pairs(tmpl);
    let mut carried: HashMap<(usize, usize), usize> = HashMap::new();

    for p_atom in &tmpl.atoms {
        let Some(mn) = p_atom.map else { continue };
        let Some(&(ri, t)) = ctx.by_map.get(&mn) else { continue };
        let node = node_of_map[&mn];
        let mol = &reactants[ri];

        for &(nb, bi) in &mol.adjacency[t] {
            if ctx.matched[ri].contains(&nb) {
                let Some(&nb_map) = ctx.map_of[ri].get(&nb) else { continue };
                let pair = (mn.min(nb_map), mn.max(nb_map));
                let in_reactant = ctx.template_bonds[ri].contains(&pair);
                let in_product = product_pairs.contains(&pair);
                if !in_reactant && !in_product {
                    if let Some(&nb_node) = node_of_map.get(&nb_map) {
                        pb.add_bond(node, nb_node, mol.bonds[bi].order);
                    }
                }
                continue;
            }
            carry_substituents(&mut pb, mol, ri, &ctx.matched[ri], t, nb, node, &mut carried);
        }
    }

    // Atoms left without aromatic bonds cannot stay aromatic.
    for (i, atom) in pb.atoms.iter_mut().enumerate() {
        if atom.is_aromatic
            && !pb.bonds.iter().any(|b| {
                b.order == BondOrder::Aromatic && (b.atom1 == i || b.atom2 == i)
            })
        {
            atom.is_aromatic = false;
        }
    }

    let rules = pb.rules;
    let mut product = Molecule::new(pb.atoms, pb.bonds);
    for (i, rule) in rules.into_iter().enumerate() {
        match rule {
            HydrogenRule::Template | HydrogenRule::Carried => {}
            HydrogenRule::Adjust { reactant, atom } => {
                let source = &reactants[reactant];
                let before = source.bond_units(atom).saturating_add(source.atoms[atom].implicit_hydrogens);
                product.atoms[i].implicit_hydrogens = before.saturating_sub(product.bond_units(i));
            }
            HydrogenRule::Default => {
                product.atoms[i].fixed_hydrogens = false;
                product.atoms[i].implicit_hydrogens = product.default_hydrogens(i).unwrap_or(0);
            }
        }
    }

    clear_stereo(&mut product);
    for (ri, reactant) in reactants.iter().enumerate() {
        let images: Vec<Image> = (0..reactant.atom_count())
            .map(|atom| {
                ctx.map_of[ri]
                    .get(&atom)
                    .and_then(|mn| node_of_map.get(mn))
                    .or_else(|| carried.get(&(ri, atom)))
                    .map_or(Image::Gone, |&node| Image::Atom(node))
            })
            .collect();
        transfer_stereo(reactant, &mut product, &images);
    }
    if let Err(e) = rearomatize(&mut product) {
        log::trace!("product kept as built: {e}");
    }
    Some(product)
}

fn apply_template_atom(atom: &mut MolAtom, p_atom: &SmartsAtom) {
    if let Some((z, aromatic)) = p_atom.element() {
        atom.atomic_number = z;
        if let Some(aromatic) = aromatic {
            atom.is_aromatic = aromatic;
        }
    }
    if let Some(charge) = p_atom.charge() {
        atom.formal_charge = charge;
    }
    if let Some(isotope) = p_atom.isotope() {
        atom.isotope = Some(isotope);
    }
}

/// Order of the reactant bond between the atoms behind two mapped template atoms.
fn reactant_order(
    tmpl: &SmartsPattern,
    p1: usize,
    p2: usize,
    ctx: &MatchContext,
    reactants: &[Molecule],
) -> Option<BondOrder> {
    let (r1, a1) = *ctx.by_map.get(&tmpl.atoms[p1].map?)?;
    let (r2, a2) = *ctx.by_map.get(&tmpl.atoms[p2].map?)?;
    if r1 != r2 {
        return None;
    }
    let bi = reactants[r1].bond_between(a1, a2)?;
    Some(reactants[r1].bonds[bi].order)
}

fn implicit_order(expr: &BondExpr, a: &MolAtom, b: &MolAtom) -> BondOrder {
    match expr {
        BondExpr::SingleOrAromatic if a.is_aromatic && b.is_aromatic => BondOrder::Aromatic,
        _ => BondOrder::Single,
    }
}

/// Copy the unmatched part of a reactant reachable from `start` (a neighbour
/// of the matched atom `anchor`) into the product, attached to `product_anchor`.
#[allow(clippy::too_many_arguments)]
fn carry_substituents(
    pb: &mut ProductBuilder,
    mol: &Molecule,
    reactant: usize,
    matched: &HashSet<usize>,
    anchor: usize,
    start: usize,
    product_anchor: usize,
    carried: &mut HashMap<(usize, usize), usize>,
) {
    let anchor_order = mol
        .bond_between(anchor, start)
        .map(|bi| mol.bonds[bi].order)
        .unwrap_or(BondOrder::Single);

    if let Some(&existing) = carried.get(&(reactant, start)) {
        if !pb.has_bond(product_anchor, existing) {
            pb.add_bond(product_anchor, existing, anchor_order);
        }
        return;
    }

    let first = pb.add_atom(mol.atoms[start].clone(), HydrogenRule::Carried);
    carried.insert((reactant, start), first);
    pb.add_bond(product_anchor, first, anchor_order);

    let mut queue = VecDeque::from([(start, first)]);
    while let Some((r_node, p_node)) = queue.pop_front() {
        for &(nb, bi) in &mol.adjacency[r_node] {
            if matched.contains(&nb) {
                continue;
            }
            let order = mol.bonds[bi].order;
            if let Some(&existing) = carried.get(&(reactant, nb)) {
                pb.add_bond(p_node, existing, order);
                continue;
            }
            let nb_node = pb.add_atom(mol.atoms[nb].clone(), HydrogenRule::Carried);
            carried.insert((reactant, nb), nb_node);
            pb.add_bond(p_node, nb_node, order);
            queue.push_back((nb, nb_node));
        }
    }
}
