//! SMILES parsing into a molecular graph.
//!
//! Atoms are numbered in the order they are written, which is also the order a
//! depth-first walk visits them (branches before the continuing chain). The
//! SELFIES encoder and the graph featurizer both rely on that numbering.

use ahash::AHashMap;
use compact_str::CompactString;

use crate::constants::{atomic_number, default_valences, ELEMENTS};
use crate::error::{PrepError, Result};

/// Aromatic element symbols allowed in brackets, two-letter ones first.
const AROMATIC_BRACKET_SYMBOLS: [&str; 9] = ["se", "as", "te", "b", "c", "n", "o", "p", "s"];

/// Cap on matching attempts while kekulizing one molecule.
const KEKULIZE_STEP_LIMIT: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Quadruple,
    Aromatic,
}

impl BondOrder {
    fn from_symbol(c: u8) -> Option<(Self, Option<char>)> {
        match c {
            b'-' => Some((BondOrder::Single, None)),
            b'=' => Some((BondOrder::Double, None)),
            b'#' => Some((BondOrder::Triple, None)),
            b'$' => Some((BondOrder::Quadruple, None)),
            b':' => Some((BondOrder::Aromatic, None)),
            b'/' => Some((BondOrder::Single, Some('/'))),
            b'\\' => Some((BondOrder::Single, Some('\\'))),
            _ => None,
        }
    }

    /// Valence consumed by one end of the bond; aromatic bonds count as one.
    pub fn valence(self) -> u8 {
        match self {
            BondOrder::Single | BondOrder::Aromatic => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Quadruple => 4,
        }
    }

    /// Prefix used in front of SELFIES atom, branch and ring symbols.
    pub fn selfies_prefix(self) -> &'static str {
        match self {
            BondOrder::Single | BondOrder::Aromatic => "",
            BondOrder::Double => "=",
            BondOrder::Triple => "#",
            BondOrder::Quadruple => "$",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Capitalized element symbol (`C`, `Cl`, `Se`) or `*`
    pub element: CompactString,
    pub aromatic: bool,
    pub bracketed: bool,
    pub isotope: Option<u16>,
    pub chirality: Option<CompactString>,
    /// Explicit hydrogen count; `None` outside brackets
    pub h_count: Option<u8>,
    pub charge: i8,
}

impl Atom {
    fn organic(element: &str, aromatic: bool) -> Self {
        Self {
            element: CompactString::from(element),
            aromatic,
            bracketed: false,
            isotope: None,
            chirality: None,
            h_count: None,
            charge: 0,
        }
    }

    pub fn atomic_number(&self) -> u8 {
        atomic_number(&self.element).unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bond {
    /// Atom written first
    pub src: usize,
    /// Atom written second; always greater than `src`
    pub dst: usize,
    pub order: BondOrder,
    pub stereo: Option<char>,
    /// Written as a ring-closure digit rather than by adjacency
    pub ring_closure: bool,
}

impl Bond {
    pub fn other(&self, atom: usize) -> usize {
        if self.src == atom {
            self.dst
        } else {
            self.src
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MolGraph {
    pub atoms: Vec<Atom>,
    pub bonds: Vec<Bond>,
    /// Bond indices touching each atom, in the order they were written
    adjacency: Vec<Vec<usize>>,
    /// First atom of each dot-separated fragment
    pub roots: Vec<usize>,
}

impl MolGraph {
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn degree(&self, atom: usize) -> usize {
        self.adjacency[atom].len()
    }

    /// Bonds written by adjacency that lead from `atom` to a later atom,
    /// in the order the branches appear.
    pub fn child_bonds(&self, atom: usize) -> impl Iterator<Item = usize> + '_ {
        self.adjacency[atom].iter().copied().filter(move |&b| {
            let bond = &self.bonds[b];
            !bond.ring_closure && bond.src == atom
        })
    }

    /// Ring-closure bonds whose second digit sits on `atom`.
    pub fn closing_ring_bonds(&self, atom: usize) -> impl Iterator<Item = usize> + '_ {
        self.adjacency[atom].iter().copied().filter(move |&b| {
            let bond = &self.bonds[b];
            bond.ring_closure && bond.dst == atom
        })
    }

    /// Valence used by an atom's bonds; `None` if it does not fit in a `u8`.
    fn bond_valence_sum(&self, atom: usize) -> Option<u8> {
        self.adjacency[atom]
            .iter()
            .try_fold(0u8, |acc, &b| acc.checked_add(self.bonds[b].order.valence()))
    }

    fn add_atom(&mut self, atom: Atom) -> usize {
        self.atoms.push(atom);
        self.adjacency.push(Vec::new());
        self.atoms.len() - 1
    }

    fn add_bond(&mut self, bond: Bond) {
        let idx = self.bonds.len();
        self.adjacency[bond.src].push(idx);
        self.adjacency[bond.dst].push(idx);
        self.bonds.push(bond);
    }

    fn has_bond(&self, a: usize, b: usize) -> bool {
        self.adjacency[a]
            .iter()
            .any(|&idx| self.bonds[idx].other(a) == b)
    }

    /// Replace aromatic bonds by alternating single and double bonds.
    ///
    /// Returns `false` when no assignment exists; the graph is left unchanged then.
    pub fn kekulize(&mut self) -> bool {
        if !self.bonds.iter().any(|b| b.order == BondOrder::Aromatic) {
            return true;
        }

        let needs_double: Vec<bool> = (0..self.atoms.len())
            .map(|atom| self.needs_double_bond(atom))
            .collect();
        let candidates: Vec<usize> = (0..self.atoms.len())
            .filter(|&atom| needs_double[atom])
            .collect();

        let mut matched: Vec<Option<usize>> = vec![None; self.atoms.len()];
        if !self.match_aromatic(&candidates, &needs_double, &mut matched) {
            return false;
        }

        for (idx, bond) in self.bonds.iter_mut().enumerate() {
            if bond.order == BondOrder::Aromatic {
                bond.order = if matched[bond.src] == Some(idx) {
                    BondOrder::Double
                } else {
                    BondOrder::Single
                };
            }
        }
        true
    }

    fn needs_double_bond(&self, atom: usize) -> bool {
        let has_aromatic_bond = self.adjacency[atom]
            .iter()
            .any(|&b| self.bonds[b].order == BondOrder::Aromatic);
        if !has_aromatic_bond {
            return false;
        }
        let a = &self.atoms[atom];
        let charge = i16::from(a.charge);
        let valence = match a.element.as_str() {
            "B" => 3 - charge,
            "C" | "Si" => 4 - charge.abs(),
            "N" | "P" | "As" => 3 + charge,
            "O" | "S" | "Se" | "Te" => 2 + charge,
            _ => return false,
        };
        let Some(bonded) = self.bond_valence_sum(atom) else {
            return false;
        };
        let used = i16::from(bonded) + i16::from(a.h_count.unwrap_or(0));
        valence - used >= 1
    }

    /// Depth-first search for a perfect matching of `candidates` over aromatic bonds.
    ///
    /// Backtracking runs on an explicit stack of `(candidate position, next
    /// adjacency slot)` frames; the bond chosen by a frame's atom is the one
    /// recorded in `matched` for that atom.
    fn match_aromatic(
        &self,
        candidates: &[usize],
        needs_double: &[bool],
        matched: &mut [Option<usize>],
    ) -> bool {
        let mut frames: Vec<(usize, usize)> = Vec::new();
        let mut steps = 0usize;
        let mut from = 0usize;

        loop {
            match candidates[from..]
                .iter()
                .position(|&atom| matched[atom].is_none())
            {
                Some(offset) => frames.push((from + offset, 0)),
                None => return true,
            }

            loop {
                let Some(top) = frames.len().checked_sub(1) else {
                    return false;
                };
                let (next, slot) = frames[top];
                let atom = candidates[next];
                if let Some(b) = matched[atom].take() {
                    matched[self.bonds[b].other(atom)] = None;
                }

                let adjacency = &self.adjacency[atom];
                let chosen = (slot..adjacency.len()).find(|&i| {
                    let bond = &self.bonds[adjacency[i]];
                    let other = bond.other(atom);
                    bond.order == BondOrder::Aromatic
                        && needs_double[other]
                        && matched[other].is_none()
                });

                match chosen {
                    Some(i) => {
                        steps += 1;
                        if steps > KEKULIZE_STEP_LIMIT {
                            return false;
                        }
                        let b = adjacency[i];
                        frames[top].1 = i + 1;
                        matched[atom] = Some(b);
                        matched[self.bonds[b].other(atom)] = Some(b);
                        from = next + 1;
                        break;
                    }
                    None => {
                        frames.pop();
                    }
                }
            }
        }
    }

    /// Total hydrogen count of an atom: explicit inside brackets, implied by the
    /// lowest fitting default valence otherwise. `None` if the valence is exceeded.
    ///
    /// Meant for kekulized graphs; aromatic bonds count as single bonds.
    pub fn hydrogen_count(&self, atom: usize) -> Option<u8> {
        let a = &self.atoms[atom];
        if a.bracketed {
            return Some(a.h_count.unwrap_or(0));
        }
        let used = self.bond_valence_sum(atom)?;
        let valences = default_valences(&a.element);
        if valences.is_empty() {
            return Some(0);
        }
        valences.iter().find(|&&v| v >= used).map(|&v| v - used)
    }

    /// Whether each bond lies on a ring, i.e. is not a bridge of the graph.
    pub fn ring_membership(&self) -> Vec<bool> {
        let n = self.atoms.len();
        let mut discovered = vec![usize::MAX; n];
        let mut low = vec![0usize; n];
        let mut in_ring = vec![true; self.bonds.len()];
        let mut timer = 0usize;

        for start in 0..n {
            if discovered[start] != usize::MAX {
                continue;
            }
            discovered[start] = timer;
            low[start] = timer;
            timer += 1;
            // (atom, bond used to reach it, next adjacency slot)
            let mut stack: Vec<(usize, Option<usize>, usize)> = vec![(start, None, 0)];

            while let Some(top) = stack.len().checked_sub(1) {
                let (atom, via, slot) = stack[top];
                if let Some(&b) = self.adjacency[atom].get(slot) {
                    stack[top].2 += 1;
                    if Some(b) == via {
                        continue;
                    }
                    let next = self.bonds[b].other(atom);
                    if discovered[next] == usize::MAX {
                        discovered[next] = timer;
                        low[next] = timer;
                        timer += 1;
                        stack.push((next, Some(b), 0));
                    } else {
                        low[atom] = low[atom].min(discovered[next]);
                    }
                } else {
                    stack.pop();
                    if let (Some(b), Some(&(parent, _, _))) = (via, stack.last()) {
                        low[parent] = low[parent].min(low[atom]);
                        if low[atom] > discovered[parent] {
                            in_ring[b] = false;
                        }
                    }
                }
            }
        }
        in_ring
    }
}

/// Parse a SMILES string (whitespace already removed) into a molecular graph.
pub fn parse_smiles(smiles: &str) -> Result<MolGraph> {
    Parser::new(smiles).parse()
}

type PendingBond = (BondOrder, Option<char>);

struct RingOpening {
    atom: usize,
    bond: Option<PendingBond>,
}

struct Parser<'a> {
    smiles: &'a str,
    bytes: &'a [u8],
    pos: usize,
    graph: MolGraph,
    prev: Option<usize>,
    branches: Vec<usize>,
    pending: Option<PendingBond>,
    rings: AHashMap<u16, RingOpening>,
}

impl<'a> Parser<'a> {
    fn new(smiles: &'a str) -> Self {
        Self {
            smiles,
            bytes: smiles.as_bytes(),
            pos: 0,
            graph: MolGraph::default(),
            prev: None,
            branches: Vec::new(),
            pending: None,
            rings: AHashMap::new(),
        }
    }

    fn error(&self, reason: impl Into<String>) -> PrepError {
        PrepError::Smiles {
            smiles: self.smiles.to_string(),
            position: self.pos,
            reason: reason.into(),
        }
    }

    fn parse(mut self) -> Result<MolGraph> {
        while self.pos < self.bytes.len() {
            let c = self.bytes[self.pos];
            match c {
                b'(' => {
                    let Some(prev) = self.prev else {
                        return Err(self.error("branch without a preceding atom"));
                    };
                    if self.pending.is_some() {
                        return Err(self.error("bond before '('"));
                    }
                    self.branches.push(prev);
                    self.pos += 1;
                }
                b')' => {
                    if self.pending.is_some() {
                        return Err(self.error("bond before ')'"));
                    }
                    let Some(anchor) = self.branches.pop() else {
                        return Err(self.error("unbalanced ')'"));
                    };
                    self.prev = Some(anchor);
                    self.pos += 1;
                }
                b'.' => {
                    if self.pending.is_some() {
                        return Err(self.error("bond before '.'"));
                    }
                    if !self.branches.is_empty() {
                        return Err(self.error("'.' inside a branch"));
                    }
                    self.prev = None;
                    self.pos += 1;
                }
                b'0'..=b'9' => {
                    let number = u16::from(c - b'0');
                    self.ring_bond(number)?;
                    self.pos += 1;
                }
                b'%' => {
                    let digits = self.bytes.get(self.pos + 1..self.pos + 3);
                    let number = match digits {
                        Some([a, b]) if a.is_ascii_digit() && b.is_ascii_digit() => {
                            u16::from(a - b'0') * 10 + u16::from(b - b'0')
                        }
                        _ => return Err(self.error("'%' must be followed by two digits")),
                    };
                    self.ring_bond(number)?;
                    self.pos += 3;
                }
                b'[' => {
                    let atom = self.bracket_atom()?;
                    self.push_atom(atom)?;
                }
                _ => {
                    if let Some(bond) = BondOrder::from_symbol(c) {
                        if self.pending.is_some() {
                            return Err(self.error("two consecutive bonds"));
                        }
                        if self.prev.is_none() {
                            return Err(self.error("bond without a preceding atom"));
                        }
                        self.pending = Some(bond);
                        self.pos += 1;
                    } else {
                        let atom = self.organic_atom()?;
                        self.push_atom(atom)?;
                    }
                }
            }
        }

        if self.pending.is_some() {
            return Err(self.error("dangling bond at end of string"));
        }
        if !self.branches.is_empty() {
            return Err(self.error("unclosed branch"));
        }
        if let Some(number) = self.rings.keys().min() {
            return Err(self.error(format!("unclosed ring {}", number)));
        }
        Ok(self.graph)
    }

    fn push_atom(&mut self, atom: Atom) -> Result<()> {
        let aromatic = atom.aromatic;
        let idx = self.graph.add_atom(atom);
        match self.prev {
            Some(prev) => {
                let (order, stereo) = self
                    .pending
                    .take()
                    .unwrap_or_else(|| (self.implicit_order(prev, aromatic), None));
                self.graph.add_bond(Bond {
                    src: prev,
                    dst: idx,
                    order,
                    stereo,
                    ring_closure: false,
                });
            }
            None => self.graph.roots.push(idx),
        }
        self.prev = Some(idx);
        Ok(())
    }

    fn implicit_order(&self, other: usize, aromatic: bool) -> BondOrder {
        if aromatic && self.graph.atoms[other].aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        }
    }

    fn ring_bond(&mut self, number: u16) -> Result<()> {
        let Some(atom) = self.prev else {
            return Err(self.error("ring bond without a preceding atom"));
        };
        let pending = self.pending.take();

        let Some(opening) = self.rings.remove(&number) else {
            self.rings.insert(number, RingOpening { atom, bond: pending });
            return Ok(());
        };

        if opening.atom == atom {
            return Err(self.error(format!("ring {} closes on its own atom", number)));
        }
        if self.graph.has_bond(opening.atom, atom) {
            return Err(self.error(format!("ring {} duplicates an existing bond", number)));
        }
        let bond = match (opening.bond, pending) {
            (Some(a), Some(b)) if a.0 != b.0 => {
                return Err(self.error(format!("conflicting bond orders on ring {}", number)));
            }
            (Some(a), _) => Some(a),
            (None, b) => b,
        };
        let (order, stereo) = bond.unwrap_or_else(|| {
            let aromatic = self.graph.atoms[atom].aromatic;
            (self.implicit_order(opening.atom, aromatic), None)
        });
        self.graph.add_bond(Bond {
            src: opening.atom,
            dst: atom,
            order,
            stereo,
            ring_closure: true,
        });
        Ok(())
    }

    fn organic_atom(&mut self) -> Result<Atom> {
        let c = self.bytes[self.pos];
        let next = self.bytes.get(self.pos + 1).copied();
        let (element, aromatic, width) = match (c, next) {
            (b'B', Some(b'r')) => ("Br", false, 2),
            (b'C', Some(b'l')) => ("Cl", false, 2),
            (b'B', _) => ("B", false, 1),
            (b'C', _) => ("C", false, 1),
            (b'N', _) => ("N", false, 1),
            (b'O', _) => ("O", false, 1),
            (b'P', _) => ("P", false, 1),
            (b'S', _) => ("S", false, 1),
            (b'F', _) => ("F", false, 1),
            (b'I', _) => ("I", false, 1),
            (b'*', _) => ("*", false, 1),
            (b'b', _) => ("B", true, 1),
            (b'c', _) => ("C", true, 1),
            (b'n', _) => ("N", true, 1),
            (b'o', _) => ("O", true, 1),
            (b'p', _) => ("P", true, 1),
            (b's', _) => ("S", true, 1),
            _ => {
                let shown = self.smiles[self.pos..].chars().next().unwrap_or('?');
                return Err(self.error(format!("unexpected character '{}'", shown)));
            }
        };
        self.pos += width;
        Ok(Atom::organic(element, aromatic))
    }

    fn bracket_atom(&mut self) -> Result<Atom> {
        let start = self.pos + 1;
        let Some(len) = self.smiles[start..].find(']') else {
            return Err(self.error("unclosed '['"));
        };
        let body = &self.smiles[start..start + len];
        let atom = parse_bracket_body(body).map_err(|reason| self.error(reason))?;
        self.pos = start + len + 1;
        Ok(atom)
    }
}

/// Parse the text between `[` and `]`: isotope, symbol, chirality, H count,
/// charge and atom class (the class is accepted and discarded).
fn parse_bracket_body(body: &str) -> std::result::Result<Atom, String> {
    let bytes = body.as_bytes();
    let mut pos = 0;

    let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    let isotope = if digits > 0 {
        let value = body[..digits]
            .parse::<u16>()
            .map_err(|_| format!("isotope out of range in [{}]", body))?;
        pos = digits;
        Some(value)
    } else {
        None
    };

    let rest = &body[pos..];
    let (element, aromatic, width) = if rest.starts_with('*') {
        ("*".to_string(), false, 1)
    } else if let Some(sym) = AROMATIC_BRACKET_SYMBOLS
        .iter()
        .find(|sym| rest.starts_with(**sym))
    {
        let mut capitalized = sym.to_ascii_uppercase();
        capitalized.truncate(1);
        capitalized.push_str(&sym[1..]);
        (capitalized, true, sym.len())
    } else {
        let two = rest.get(..2).filter(|s| {
            s.as_bytes()[1].is_ascii_lowercase() && ELEMENTS.contains(s)
        });
        match (two, rest.get(..1)) {
            (Some(sym), _) => (sym.to_string(), false, 2),
            (None, Some(sym)) if ELEMENTS.contains(&sym) => (sym.to_string(), false, 1),
            _ => return Err(format!("unknown element in [{}]", body)),
        }
    };
    pos += width;

    let mut chirality = None;
    if bytes.get(pos) == Some(&b'@') {
        let begin = pos;
        pos += 1;
        if bytes.get(pos) == Some(&b'@') {
            pos += 1;
        } else {
            let class_len = bytes[pos..]
                .iter()
                .take_while(|b| b.is_ascii_uppercase())
                .count();
            if class_len == 2 {
                pos += class_len;
                pos += bytes[pos..].iter().take_while(|b| b.is_ascii_digit()).count();
            }
        }
        chirality = Some(CompactString::from(&body[begin..pos]));
    }

    let mut h_count = 0u8;
    if bytes.get(pos) == Some(&b'H') {
        pos += 1;
        let n = bytes[pos..].iter().take_while(|b| b.is_ascii_digit()).count();
        h_count = if n == 0 {
            1
        } else {
            body[pos..pos + n]
                .parse()
                .map_err(|_| format!("hydrogen count out of range in [{}]", body))?
        };
        pos += n;
    }

    let mut charge = 0i8;
    if let Some(&sign @ (b'+' | b'-')) = bytes.get(pos) {
        let unit: i8 = if sign == b'+' { 1 } else { -1 };
        pos += 1;
        let n = bytes[pos..].iter().take_while(|b| b.is_ascii_digit()).count();
        if n > 0 {
            let magnitude: i8 = body[pos..pos + n]
                .parse()
                .map_err(|_| format!("charge out of range in [{}]", body))?;
            charge = unit * magnitude;
            pos += n;
        } else {
            charge = unit;
            while bytes.get(pos) == Some(&sign) {
                charge = charge
                    .checked_add(unit)
                    .ok_or_else(|| format!("charge out of range in [{}]", body))?;
                pos += 1;
            }
        }
    }

    if bytes.get(pos) == Some(&b':') {
        pos += 1;
        let n = bytes[pos..].iter().take_while(|b| b.is_ascii_digit()).count();
        if n == 0 {
            return Err(format!("empty atom class in [{}]", body));
        }
        pos += n;
    }

    if pos != bytes.len() {
        return Err(format!("unexpected trailing text in [{}]", body));
    }

    Ok(Atom {
        element: CompactString::from(element),
        aromatic,
        bracketed: true,
        isotope,
        chirality,
        h_count: Some(h_count),
        charge,
    })
}
