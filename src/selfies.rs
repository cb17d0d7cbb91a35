//! SMILES to SELFIES translation.
//!
//! Symbols are derived in SMILES atom order. A branch is announced by
//! `[<bond>Branch<L>]` plus `L` index symbols holding the branch's symbol
//! count minus one; a ring closure by `[<bond>Ring<L>]` plus `L` index symbols
//! holding the distance back to the partner atom minus one.

use std::fmt::Write;

use crate::constants::{SELFIES_INDEX_ALPHABET, SELFIES_MAX_INDEX_DIGITS};
use crate::error::{PrepError, Result};
use crate::smiles::{parse_smiles, Atom, Bond, MolGraph};

/// Translate a SMILES string into SELFIES.
pub fn smiles_to_selfies(smiles: &str) -> Result<String> {
    Ok(selfies_symbols(smiles)?.concat())
}

/// Translate a SMILES string into its SELFIES symbols; fragments are separated by `.`.
pub fn selfies_symbols(smiles: &str) -> Result<Vec<String>> {
    let mut graph = parse_smiles(smiles)?;
    if !graph.kekulize() {
        return Err(PrepError::Kekulization(smiles.to_string()));
    }

    let encoder = Encoder {
        graph: &graph,
        smiles,
    };
    let mut symbols = Vec::with_capacity(graph.atoms.len() * 2);
    for (i, &root) in graph.roots.iter().enumerate() {
        if i > 0 {
            symbols.push(".".to_string());
        }
        encoder.derive(root, &mut symbols)?;
    }
    Ok(symbols)
}

/// Split a SELFIES string into `[...]` symbols and `.` separators.
pub fn split_selfies(selfies: &str) -> Vec<&str> {
    let mut symbols = Vec::new();
    let mut start = None;
    for (i, c) in selfies.char_indices() {
        match c {
            '.' if start.is_none() => symbols.push(&selfies[i..i + 1]),
            '[' if start.is_none() => start = Some(i),
            ']' => {
                if let Some(s) = start.take() {
                    symbols.push(&selfies[s..=i]);
                }
            }
            _ => {}
        }
    }
    symbols
}

/// Index symbols for `index`, most significant digit first.
fn index_symbols(index: usize) -> Option<Vec<&'static str>> {
    let base = SELFIES_INDEX_ALPHABET.len();
    if index >= base.pow(SELFIES_MAX_INDEX_DIGITS as u32) {
        return None;
    }
    let mut digits = Vec::with_capacity(SELFIES_MAX_INDEX_DIGITS);
    let mut rest = index;
    loop {
        digits.push(SELFIES_INDEX_ALPHABET[rest % base]);
        rest /= base;
        if rest == 0 {
            break;
        }
    }
    digits.reverse();
    Some(digits)
}

fn atom_symbol(atom: &Atom, incoming: Option<&Bond>) -> String {
    let mut symbol = String::from("[");
    if let Some(bond) = incoming {
        match bond.stereo {
            Some(stereo) => symbol.push(stereo),
            None => symbol.push_str(bond.order.selfies_prefix()),
        }
    }
    if let Some(isotope) = atom.isotope {
        let _ = write!(symbol, "{}", isotope);
    }
    symbol.push_str(&atom.element);
    if let Some(chirality) = &atom.chirality {
        symbol.push_str(chirality);
    }
    if atom.bracketed {
        let h = atom.h_count.unwrap_or(0);
        if h > 0 {
            let _ = write!(symbol, "H{}", h);
        }
        if atom.charge != 0 {
            let _ = write!(symbol, "{:+}", atom.charge);
        }
    }
    symbol.push(']');
    symbol
}

struct Encoder<'a> {
    graph: &'a MolGraph,
    smiles: &'a str,
}

/// Pending work of the iterative depth-first derivation.
enum Step {
    Atom { atom: usize, incoming: Option<usize> },
    OpenBranch,
    CloseBranch { bond: usize },
}

impl Encoder<'_> {
    /// Derive the symbols of the fragment rooted at `root`.
    ///
    /// Runs on an explicit work stack so molecule size never bounds thread
    /// stack depth. A branch header is spliced in front of the branch once its
    /// length, nested headers included, is known.
    fn derive(&self, root: usize, out: &mut Vec<String>) -> Result<()> {
        let graph = self.graph;
        let mut steps = vec![Step::Atom {
            atom: root,
            incoming: None,
        }];
        let mut branch_starts: Vec<usize> = Vec::new();

        while let Some(step) = steps.pop() {
            match step {
                Step::Atom { atom, incoming } => {
                    out.push(atom_symbol(
                        &graph.atoms[atom],
                        incoming.map(|b| &graph.bonds[b]),
                    ));

                    for b in graph.closing_ring_bonds(atom) {
                        let bond = &graph.bonds[b];
                        let q = self.index(atom - bond.src - 1, "ring closure")?;
                        out.push(format!("[{}Ring{}]", bond.order.selfies_prefix(), q.len()));
                        out.extend(q.into_iter().map(str::to_owned));
                    }

                    let children: Vec<usize> = graph.child_bonds(atom).collect();
                    let Some((&last, branches)) = children.split_last() else {
                        continue;
                    };
                    steps.push(Step::Atom {
                        atom: graph.bonds[last].dst,
                        incoming: Some(last),
                    });
                    for &b in branches.iter().rev() {
                        steps.push(Step::CloseBranch { bond: b });
                        steps.push(Step::Atom {
                            atom: graph.bonds[b].dst,
                            incoming: Some(b),
                        });
                        steps.push(Step::OpenBranch);
                    }
                }
                Step::OpenBranch => branch_starts.push(out.len()),
                Step::CloseBranch { bond } => {
                    let start = branch_starts.pop().unwrap_or(out.len());
                    let q = self.index(out.len() - start - 1, "branch")?;
                    let mut header = Vec::with_capacity(q.len() + 1);
                    header.push(format!(
                        "[{}Branch{}]",
                        graph.bonds[bond].order.selfies_prefix(),
                        q.len()
                    ));
                    header.extend(q.into_iter().map(str::to_owned));
                    out.splice(start..start, header);
                }
            }
        }
        Ok(())
    }

    fn index(&self, value: usize, what: &str) -> Result<Vec<&'static str>> {
        index_symbols(value).ok_or_else(|| PrepError::Selfies {
            smiles: self.smiles.to_string(),
            reason: format!("{} length {} does not fit in index symbols", what, value + 1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_chain() {
        assert_eq!(smiles_to_selfies("CCO").unwrap(), "[C][C][O]");
        assert_eq!(smiles_to_selfies("C=CC#N").unwrap(), "[C][=C][C][#N]");
    }

    #[test]
    fn test_branch() {
        assert_eq!(
            smiles_to_selfies("CC(=O)O").unwrap(),
            "[C][C][=Branch1][C][=O][O]"
        );
    }

    #[test]
    fn test_ring() {
        assert_eq!(
            smiles_to_selfies("C1CC1").unwrap(),
            "[C][C][C][Ring1][Ring1]"
        );
    }

    #[test]
    fn test_aromatic_ring_is_kekulized() {
        assert_eq!(
            smiles_to_selfies("c1ccccc1").unwrap(),
            "[C][=C][C][=C][C][=C][Ring1][=Branch1]"
        );
    }

    #[test]
    fn test_bracket_atoms_and_fragments() {
        assert_eq!(smiles_to_selfies("[Na+].[Cl-]").unwrap(), "[Na+1].[Cl-1]");
        assert_eq!(smiles_to_selfies("C[C@@H](O)N").unwrap(), "[C][C@@H1][Branch1][C][O][N]");
    }

    #[test]
    fn test_stereo_bond_prefix() {
        assert_eq!(smiles_to_selfies("F/C=C/F").unwrap(), "[F][/C][=C][/F]");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(smiles_to_selfies("").unwrap(), "");
    }

    #[test]
    fn test_kekulization_failure() {
        assert!(matches!(
            smiles_to_selfies("c1cccc1"),
            Err(PrepError::Kekulization(_))
        ));
    }

    #[test]
    fn test_index_symbols() {
        assert_eq!(index_symbols(0).unwrap(), vec!["[C]"]);
        assert_eq!(index_symbols(4).unwrap(), vec!["[=Branch1]"]);
        assert_eq!(index_symbols(17).unwrap(), vec!["[Ring1]", "[Ring1]"]);
        assert_eq!(index_symbols(4095).unwrap().len(), 3);
        assert!(index_symbols(4096).is_none());
    }

    #[test]
    fn test_split_selfies() {
        assert_eq!(
            split_selfies("[C][=O].[Na+1]"),
            vec!["[C]", "[=O]", ".", "[Na+1]"]
        );
    }

    #[test]
    fn test_long_branch_uses_two_digit_index() {
        let smiles = format!("C({})O", "C".repeat(17));
        let symbols = selfies_symbols(&smiles).unwrap();
        assert_eq!(symbols[1], "[Branch2]");
        assert_eq!(&symbols[2..4], &["[Ring1]", "[C]"]);
    }
}
