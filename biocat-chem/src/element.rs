//! Periodic table data and element lookup.

/// A chemical element from the periodic table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element {
    pub atomic_number: u8,
    pub symbol: &'static str,
    pub name: &'static str,
    /// Mass of the most abundant isotope, in daltons.
    pub monoisotopic_mass: f64,
    /// Allowed neutral valences, smallest first. Empty for elements that never
    /// receive implicit hydrogens (metals, noble gases).
    pub valences: &'static [u8],
}

/// Mass of an electron, in daltons.
pub const ELECTRON_MASS: f64 = 0.000548579909;

/// Elements 1–54 (H through Xe).
static ELEMENTS: [Element; 54] = [
    Element { atomic_number: 1, symbol: "H", name: "Hydrogen", monoisotopic_mass: 1.00782503207, valences: &[1] },
    Element { atomic_number: 2, symbol: "He", name: "Helium", monoisotopic_mass: 4.00260325415, valences: &[] },
    Element { atomic_number: 3, symbol: "Li", name: "Lithium", monoisotopic_mass: 7.016004548, valences: &[1] },
    Element { atomic_number: 4, symbol: "Be", name: "Beryllium", monoisotopic_mass: 9.012182201, valences: &[2] },
    Element { atomic_number: 5, symbol: "B", name: "Boron", monoisotopic_mass: 11.009305406, valences: &[3] },
    Element { atomic_number: 6, symbol: "C", name: "Carbon", monoisotopic_mass: 12.0, valences: &[4] },
    Element { atomic_number: 7, symbol: "N", name: "Nitrogen", monoisotopic_mass: 14.00307400478, valences: &[3] },
    Element { atomic_number: 8, symbol: "O", name: "Oxygen", monoisotopic_mass: 15.99491461956, valences: &[2] },
    Element { atomic_number: 9, symbol: "F", name: "Fluorine", monoisotopic_mass: 18.998403205, valences: &[1] },
    Element { atomic_number: 10, symbol: "Ne", name: "Neon", monoisotopic_mass: 19.99244017542, valences: &[] },
    Element { atomic_number: 11, symbol: "Na", name: "Sodium", monoisotopic_mass: 22.98976966, valences: &[1] },
    Element { atomic_number: 12, symbol: "Mg", name: "Magnesium", monoisotopic_mass: 23.98504187, valences: &[2] },
    Element { atomic_number: 13, symbol: "Al", name: "Aluminum", monoisotopic_mass: 26.981538, valences: &[3] },
    Element { atomic_number: 14, symbol: "Si", name: "Silicon", monoisotopic_mass: 27.97692649, valences: &[4] },
    Element { atomic_number: 15, symbol: "P", name: "Phosphorus", monoisotopic_mass: 30.97376151, valences: &[3, 5, 7] },
    Element { atomic_number: 16, symbol: "S", name: "Sulfur", monoisotopic_mass: 31.97207069, valences: &[2, 4, 6] },
    Element { atomic_number: 17, symbol: "Cl", name: "Chlorine", monoisotopic_mass: 34.96885271, valences: &[1] },
    Element { atomic_number: 18, symbol: "Ar", name: "Argon", monoisotopic_mass: 39.9623831225, valences: &[] },
    Element { atomic_number: 19, symbol: "K", name: "Potassium", monoisotopic_mass: 38.9637069, valences: &[1] },
    Element { atomic_number: 20, symbol: "Ca", name: "Calcium", monoisotopic_mass: 39.9625912, valences: &[2] },
    Element { atomic_number: 21, symbol: "Sc", name: "Scandium", monoisotopic_mass: 44.9559102, valences: &[] },
    Element { atomic_number: 22, symbol: "Ti", name: "Titanium", monoisotopic_mass: 47.9479471, valences: &[] },
    Element { atomic_number: 23, symbol: "V", name: "Vanadium", monoisotopic_mass: 50.9439635, valences: &[] },
    Element { atomic_number: 24, symbol: "Cr", name: "Chromium", monoisotopic_mass: 51.9405119, valences: &[] },
    Element { atomic_number: 25, symbol: "Mn", name: "Manganese", monoisotopic_mass: 54.9380496, valences: &[] },
    Element { atomic_number: 26, symbol: "Fe", name: "Iron", monoisotopic_mass: 55.9349421, valences: &[] },
    Element { atomic_number: 27, symbol: "Co", name: "Cobalt", monoisotopic_mass: 58.9332002, valences: &[] },
    Element { atomic_number: 28, symbol: "Ni", name: "Nickel", monoisotopic_mass: 57.9353479, valences: &[] },
    Element { atomic_number: 29, symbol: "Cu", name: "Copper", monoisotopic_mass: 62.9296011, valences: &[] },
    Element { atomic_number: 30, symbol: "Zn", name: "Zinc", monoisotopic_mass: 63.9291466, valences: &[] },
    Element { atomic_number: 31, symbol: "Ga", name: "Gallium", monoisotopic_mass: 68.925581, valences: &[3] },
    Element { atomic_number: 32, symbol: "Ge", name: "Germanium", monoisotopic_mass: 73.9211782, valences: &[4] },
    Element { atomic_number: 33, symbol: "As", name: "Arsenic", monoisotopic_mass: 74.9215964, valences: &[3, 5] },
    Element { atomic_number: 34, symbol: "Se", name: "Selenium", monoisotopic_mass: 79.9165218, valences: &[2, 4, 6] },
    Element { atomic_number: 35, symbol: "Br", name: "Bromine", monoisotopic_mass: 78.9183376, valences: &[1] },
    Element { atomic_number: 36, symbol: "Kr", name: "Krypton", monoisotopic_mass: 83.911507, valences: &[] },
    Element { atomic_number: 37, symbol: "Rb", name: "Rubidium", monoisotopic_mass: 84.9117893, valences: &[1] },
    Element { atomic_number: 38, symbol: "Sr", name: "Strontium", monoisotopic_mass: 87.9056143, valences: &[2] },
    Element { atomic_number: 39, symbol: "Y", name: "Yttrium", monoisotopic_mass: 88.9058479, valences: &[] },
    Element { atomic_number: 40, symbol: "Zr", name: "Zirconium", monoisotopic_mass: 89.9047037, valences: &[] },
    Element { atomic_number: 41, symbol: "Nb", name: "Niobium", monoisotopic_mass: 92.9063775, valences: &[] },
    Element { atomic_number: 42, symbol: "Mo", name: "Molybdenum", monoisotopic_mass: 97.9054078, valences: &[] },
    Element { atomic_number: 43, symbol: "Tc", name: "Technetium", monoisotopic_mass: 97.907216, valences: &[] },
    Element { atomic_number: 44, symbol: "Ru", name: "Ruthenium", monoisotopic_mass: 101.9043495, valences: &[] },
    Element { atomic_number: 45, symbol: "Rh", name: "Rhodium", monoisotopic_mass: 102.905504, valences: &[] },
    Element { atomic_number: 46, symbol: "Pd", name: "Palladium", monoisotopic_mass: 105.903483, valences: &[] },
    Element { atomic_number: 47, symbol: "Ag", name: "Silver", monoisotopic_mass: 106.905093, valences: &[] },
    Element { atomic_number: 48, symbol: "Cd", name: "Cadmium", monoisotopic_mass: 113.903358, valences: &[] },
    Element { atomic_number: 49, symbol: "In", name: "Indium", monoisotopic_mass: 114.903878, valences: &[3] },
    Element { atomic_number: 50, symbol: "Sn", name: "Tin", monoisotopic_mass: 119.9021966, valences: &[4] },
    Element { atomic_number: 51, symbol: "Sb", name: "Antimony", monoisotopic_mass: 120.903818, valences: &[3, 5] },
    Element { atomic_number: 52, symbol: "Te", name: "Tellurium", monoisotopic_mass: 129.9062228, valences: &[2, 4, 6] },
    Element { atomic_number: 53, symbol: "I", name: "Iodine", monoisotopic_mass: 126.904468, valences: &[1, 3, 5] },
    Element { atomic_number: 54, symbol: "Xe", name: "Xenon", monoisotopic_mass: 131.9041545, valences: &[] },
];

/// Look up an element by its symbol (case-sensitive, e.g. "C", "Cl").
pub fn element_by_symbol(symbol: &str) -> Option<&'static Element> {
    ELEMENTS.iter().find(|e| e.symbol == symbol)
}

/// Look up an element by atomic number.
pub fn element_by_number(atomic_number: u8) -> Option<&'static Element> {
    if atomic_number == 0 || atomic_number as usize > ELEMENTS.len() {
        return None;
    }
    Some(&ELEMENTS[atomic_number as usize - 1])
}

/// Allowed valences of an atom after accounting for its formal charge.
///
/// Charged main-group atoms take the valences of their isoelectronic neighbour
/// (N+ behaves like C, O- like F, C- like N). Returns an empty slice for
/// elements without a valence model.
pub fn charged_valences(atomic_number: u8, formal_charge: i8) -> &'static [u8] {
    let own = match element_by_number(atomic_number) {
        Some(e) => e.valences,
        None => return &[],
    };
    if formal_charge == 0 || own.is_empty() {
        return own;
    }
    let shifted = atomic_number as i16 - formal_charge as i16;
    if shifted < 1 || shifted > u8::MAX as i16 {
        return &[];
    }
    match element_by_number(shifted as u8) {
        // Stay within the same period: B- is like C, but Na+ is not like Ne.
        Some(e) if period(e.atomic_number) == period(atomic_number) => e.valences,
        _ => &[],
    }
}

fn period(atomic_number: u8) -> u8 {
    match atomic_number {
        1..=2 => 1,
        3..=10 => 2,
        11..=18 => 3,
        19..=36 => 4,
        _ => 5,
    }
}
