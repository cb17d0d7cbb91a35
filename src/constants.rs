//! Constants shared by the preprocessing pipeline.

/// SMILES atom-level tokenization regex pattern
/// Matches:
/// - Bracketed atoms: [C@@H], [nH], [O-], etc.
/// - Two-char elements: Br, Cl (must come before B, C)
/// - Single-char elements: C, N, O, S, P, F, I, B
/// - Aromatic atoms: b, c, n, o, s, p
/// - Bonds: =, #, -, :, ~
/// - Stereochemistry: @, /, \
/// - Branches: (, )
/// - Disconnected: .
/// - Ring numbers: single digit or %XX
/// - Other: +, ?, >, *, $
pub const SMILES_ATOM_PATTERN: &str = r"(\[[^\]]+]|Br?|Cl?|N|O|S|P|F|I|b|c|n|o|s|p|\(|\)|\.|=|#|-|\+|\\|\/|:|~|@|\?|>|\*|\$|\%[0-9]{2}|[0-9])";

/// Reserved vocabulary symbols, always written first (ids 0-3).
pub const PAD_TOKEN: &str = "_PAD";
pub const UNK_TOKEN: &str = "_UNK";
pub const SOS_TOKEN: &str = "_SOS";
pub const EOS_TOKEN: &str = "_EOS";

pub const RESERVED_TOKENS: [&str; 4] = [PAD_TOKEN, UNK_TOKEN, SOS_TOKEN, EOS_TOKEN];

/// Token stream substituted for a source line that tokenizes to nothing.
pub const EMPTY_SOURCE_PLACEHOLDER: [&str; 2] = ["C", "C"];

/// Log a progress line every this many encoded lines.
pub const PROGRESS_INTERVAL: usize = 10_000;

/// Base-16 alphabet used by SELFIES to encode branch lengths and ring distances.
pub const SELFIES_INDEX_ALPHABET: [&str; 16] = [
    "[C]",
    "[Ring1]",
    "[Ring2]",
    "[Branch1]",
    "[=Branch1]",
    "[#Branch1]",
    "[Branch2]",
    "[=Branch2]",
    "[#Branch2]",
    "[O]",
    "[N]",
    "[=N]",
    "[=C]",
    "[#C]",
    "[S]",
    "[P]",
];

/// Largest number of index symbols following a `[Branch]` or `[Ring]` symbol.
pub const SELFIES_MAX_INDEX_DIGITS: usize = 3;

/// Element symbols in atomic-number order (H = 1).
pub const ELEMENTS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh",
    "Fl", "Mc", "Lv", "Ts", "Og",
];

/// Atomic number for an element symbol, `0` for the `*` wildcard.
pub fn atomic_number(symbol: &str) -> Option<u8> {
    if symbol == "*" {
        return Some(0);
    }
    ELEMENTS
        .iter()
        .position(|&e| e == symbol)
        .map(|idx| (idx + 1) as u8)
}

/// Allowed valences for organic-subset atoms, smallest first.
pub fn default_valences(symbol: &str) -> &'static [u8] {
    match symbol {
        "B" => &[3],
        "C" => &[4],
        "N" => &[3, 5],
        "O" => &[2],
        "P" => &[3, 5],
        "S" => &[2, 4, 6],
        "F" | "Cl" | "Br" | "I" => &[1],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_number() {
        assert_eq!(atomic_number("H"), Some(1));
        assert_eq!(atomic_number("C"), Some(6));
        assert_eq!(atomic_number("Cl"), Some(17));
        assert_eq!(atomic_number("Og"), Some(118));
        assert_eq!(atomic_number("*"), Some(0));
        assert_eq!(atomic_number("Xx"), None);
    }

    #[test]
    fn test_reserved_tokens_order() {
        assert_eq!(RESERVED_TOKENS[0], PAD_TOKEN);
        assert_eq!(RESERVED_TOKENS[3], EOS_TOKEN);
    }
}
