use criterion::{black_box, criterion_group, criterion_main, Criterion};
use biocat_chem::{
    canonical_smiles, has_match, morgan_fingerprint, parse_reaction, parse_smarts, parse_smiles,
    run_reaction, tanimoto_similarity, Molecule,
};

/// Representative metabolite-sized structures
const SMILES_SET: &[&str] = &[
    "CCO",                                 // ethanol
    "CC(=O)O",                             // acetic acid
    "c1ccccc1",                            // benzene
    "CC(=O)Oc1ccccc1C(=O)O",               // aspirin
    "CC12CCC3C(C1CCC2O)CCC4=CC(=O)CCC34C", // testosterone
    "Cn1cnc2c1c(=O)n(C)c(=O)n2C",          // caffeine
    "CC(C)Cc1ccc(cc1)C(C)C(=O)O",          // ibuprofen
    "OC(=O)c1ccccc1O",                     // salicylic acid
    "COc1ccc(CC(N)=O)cc1",                 // methoxyphenylacetamide
    "CC(=O)Nc1ccc(O)cc1",                  // acetaminophen
    "NCC(=O)O",                            // glycine
    "c1ccc2ccccc2c1",                      // naphthalene
    "OC1C(O)C(O)C(O)C(O)C1O",              // inositol
    "COc1cc(C=CC(=O)O)ccc1O",              // ferulic acid
    "c1ccncc1",                            // pyridine
    "c1cc[nH]c1",                          // pyrrole
];

fn parsed() -> Vec<Molecule> {
    SMILES_SET.iter().filter_map(|s| parse_smiles(s).ok()).collect()
}

fn bench_smiles(c: &mut Criterion) {
    let mut group = c.benchmark_group("smiles");
    let smiles_1k: Vec<&str> = SMILES_SET.iter().copied().cycle().take(1000).collect();
    group.bench_function("parse_1k", |b| {
        b.iter(|| {
            for &smi in black_box(&smiles_1k) {
                let _ = parse_smiles(smi);
            }
        })
    });

    let mols = parsed();
    group.bench_function("canonicalize_set", |b| {
        b.iter(|| {
            for mol in black_box(&mols) {
                let _ = canonical_smiles(mol);
            }
        })
    });
    group.finish();
}

fn bench_substructure(c: &mut Criterion) {
    let mols = parsed();
    let hydroxyl = parse_smarts("[OX2H][#6]").unwrap();
    c.bench_function("smarts_match_set", |b| {
        b.iter(|| mols.iter().filter(|m| has_match(black_box(m), &hydroxyl)).count())
    });
}

fn bench_reaction(c: &mut Criterion) {
    let demethylation = parse_reaction("[c:1][O:2][CH3:3]>>[c:1][OH:2]").unwrap();
    let ferulic = parse_smiles("COc1cc(C=CC(=O)O)ccc1O").unwrap();
    c.bench_function("o_demethylation", |b| {
        b.iter(|| run_reaction(&demethylation, black_box(std::slice::from_ref(&ferulic))))
    });
}

fn bench_similarity(c: &mut Criterion) {
    let mols = parsed();
    let fps: Vec<_> = mols.iter().map(|m| morgan_fingerprint(m, 2, 2048)).collect();
    c.bench_function("tanimoto_all_pairs", |bench| {
        bench.iter(|| {
            let mut total = 0.0;
            for x in &fps {
                for y in &fps {
                    total += tanimoto_similarity(black_box(x), black_box(y));
                }
            }
            total
        })
    });
}

criterion_group!(benches, bench_smiles, bench_substructure, bench_reaction, bench_similarity);
criterion_main!(benches);
