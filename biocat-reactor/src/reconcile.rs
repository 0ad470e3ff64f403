//! Representative selection, product identity and provenance merging.
//!
//! A [`Product`] is keyed by (source compound, product structure). Every
//! path that produced it is stored under a [`ProvenanceKey`] drawn from
//! catalog order, so merging is a keyed union: associative, commutative and
//! idempotent. Joined output fields are derived by walking provenance in key
//! order, which makes "first seen" mean first in catalog order regardless of
//! which worker finished first.

use std::collections::{BTreeMap, HashSet};

use biocat_core::hash::sha256_fields;
use biocat_core::{ContentAddressable, MolecularOps};

use crate::output::NewCompoundRow;

/// Marker written when a joined field has no values.
pub const NO_DATA: &str = "NA";

/// Pick the output of a multi-product outcome most similar to `source`.
///
/// A single output is returned as is. Otherwise outputs are scored by
/// similarity to the source; the first of equally scored outputs wins, and
/// outputs that do not parse rank below every scored one. Returns `None`
/// only for an empty slice.
pub fn select_representative<M: MolecularOps>(
    ops: &M,
    source: &M::Structure,
    products: &[String],
) -> Option<usize> {
    match products.len() {
        0 => None,
        1 => Some(0),
        _ => {
            let mut best: Option<(usize, f64)> = None;
            for (i, text) in products.iter().enumerate() {
                let score = ops
                    .parse(text)
                    .map(|p| ops.similarity(source, &p))
                    .unwrap_or(f64::NEG_INFINITY);
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((i, score));
                }
            }
            best.map(|(i, _)| i)
        }
    }
}

/// Position of one generation path in catalog order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProvenanceKey {
    pub compound: usize,
    pub rule: usize,
    pub outcome: usize,
}

/// What one generation path contributes to a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub rule_id: String,
    pub reaction_identity: String,
    /// Codes in external `;`-joined form.
    pub classification_codes: String,
}

/// A reconciled product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub source_compound_id: String,
    pub source_compound_smiles: String,
    pub product_structure: String,
    provenance: BTreeMap<ProvenanceKey, Provenance>,
}

impl Product {
    /// A product produced by a single path.
    pub fn new(
        source_compound_id: impl Into<String>,
        source_compound_smiles: impl Into<String>,
        product_structure: impl Into<String>,
        key: ProvenanceKey,
        provenance: Provenance,
    ) -> Self {
        let mut paths = BTreeMap::new();
        paths.insert(key, provenance);
        Product {
            source_compound_id: source_compound_id.into(),
            source_compound_smiles: source_compound_smiles.into(),
            product_structure: product_structure.into(),
            provenance: paths,
        }
    }

    /// Deterministic id: `{compound_id}_{h}` where `h` is the first 12 hex
    /// digits of the content hash.
    pub fn product_id(&self) -> String {
        format!("{}_{}", self.source_compound_id, &self.content_hash()[..12])
    }

    /// Grouping key.
    pub fn key(&self) -> (&str, &str) {
        (&self.source_compound_id, &self.product_structure)
    }

    /// Earliest contributing path.
    pub fn first_key(&self) -> Option<ProvenanceKey> {
        self.provenance.keys().next().copied()
    }

    pub fn provenance(&self) -> &BTreeMap<ProvenanceKey, Provenance> {
        &self.provenance
    }

    /// Fold `other`'s provenance into `self`. Both must share a key.
    pub fn merge(&mut self, other: Product) {
        debug_assert_eq!(self.key(), other.key());
        for (key, path) in other.provenance {
            self.provenance.entry(key).or_insert(path);
        }
    }

    pub fn rule_ids(&self) -> String {
        merge_fields(self.provenance.values().map(|p| p.rule_id.as_str()))
    }

    pub fn reaction_identities(&self) -> String {
        merge_fields(self.provenance.values().map(|p| p.reaction_identity.as_str()))
    }

    pub fn classification_codes(&self) -> String {
        merge_fields(self.provenance.values().map(|p| p.classification_codes.as_str()))
    }

    /// The product as an output row.
    pub fn to_row(&self) -> NewCompoundRow {
        NewCompoundRow {
            source_compound_id: self.source_compound_id.clone(),
            source_compound_smiles: self.source_compound_smiles.clone(),
            rule_ids: self.rule_ids(),
            product_id: self.product_id(),
            product_smiles: self.product_structure.clone(),
            reaction_identities: self.reaction_identities(),
            classification_codes: self.classification_codes(),
        }
    }
}

impl ContentAddressable for Product {
    /// SHA-256 over the source compound id and the product structure.
    fn content_hash(&self) -> String {
        sha256_fields(&[self.source_compound_id.as_str(), self.product_structure.as_str()])
    }
}

/// Join `;`-separated fields: split, trim, drop empty and `nan` items,
/// de-duplicate keeping the first occurrence. Returns [`NO_DATA`] when nothing
/// remains.
pub fn merge_fields<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    let mut seen = HashSet::new();
    let items: Vec<&str> = fields
        .into_iter()
        .flat_map(|f| f.split(';'))
        .map(str::trim)
        .filter(|item| !item.is_empty() && !item.eq_ignore_ascii_case("nan") && *item != NO_DATA)
        .filter(|item| seen.insert(*item))
        .collect();
    if items.is_empty() {
        NO_DATA.to_string()
    } else {
        items.join(";")
    }
}

/// Serial reduction: group by (source compound, structure), merge, and order
/// by (compound, first contributing path, structure).
pub fn reconcile(products: impl IntoIterator<Item = Product>) -> Vec<Product> {
    let mut grouped: BTreeMap<(String, String), Product> = BTreeMap::new();
    for product in products {
        let key = (
            product.source_compound_id.clone(),
            product.product_structure.clone(),
        );
        match grouped.get_mut(&key) {
            Some(existing) => existing.merge(product),
            None => {
                grouped.insert(key, product);
            }
        }
    }
    let mut merged: Vec<Product> = grouped.into_values().collect();
    merged.sort_by(|a, b| {
        a.first_key()
            .cmp(&b.first_key())
            .then_with(|| a.product_structure.cmp(&b.product_structure))
    });
    merged
}
