//! Graph featurization boundary and the default molecular graph featurizer.

use serde::{Deserialize, Serialize};

use crate::pool::WorkerPool;
use crate::smiles::parse_smiles;
use crate::utils::strip_whitespace;

/// Outcome of featurizing one source line.
///
/// `Failed` is the expected result for an unprocessable molecule and never
/// aborts a run; the sample is dropped during alignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Featurized<R> {
    Record(R),
    Failed { reason: String },
}

impl<R> Featurized<R> {
    pub fn failed(reason: impl Into<String>) -> Self {
        Featurized::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Featurized::Failed { .. })
    }

    pub fn record(self) -> Option<R> {
        match self {
            Featurized::Record(r) => Some(r),
            Featurized::Failed { .. } => None,
        }
    }
}

/// Converts a raw source string into a graph record.
///
/// Implementations must be pure per line; they are called from pool workers.
pub trait GraphFeaturizer: Sync {
    type Record: Send + Serialize;

    fn featurize(&self, smiles: &str) -> Featurized<Self::Record>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomFeatures {
    pub atomic_number: u8,
    pub formal_charge: i8,
    pub aromatic: bool,
    pub num_hs: u8,
    pub degree: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeFeatures {
    /// 1, 2, 3 or 4 after kekulization
    pub order: u8,
    pub aromatic: bool,
    pub in_ring: bool,
}

/// Atoms plus a directed edge list holding every bond in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphRecord {
    pub atoms: Vec<AtomFeatures>,
    pub edge_index: Vec<[u32; 2]>,
    pub edges: Vec<EdgeFeatures>,
}

impl GraphRecord {
    pub fn num_atoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edge_index.len()
    }
}

/// Default featurizer built on the crate's own SMILES parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct MolGraphFeaturizer;

impl GraphFeaturizer for MolGraphFeaturizer {
    type Record = GraphRecord;

    fn featurize(&self, smiles: &str) -> Featurized<GraphRecord> {
        let mut graph = match parse_smiles(smiles) {
            Ok(graph) => graph,
            Err(e) => return Featurized::failed(e.to_string()),
        };
        if graph.is_empty() {
            return Featurized::failed("empty molecule");
        }
        if !graph.kekulize() {
            return Featurized::failed("kekulization failed");
        }

        let mut atoms = Vec::with_capacity(graph.atoms.len());
        for (i, atom) in graph.atoms.iter().enumerate() {
            let Some(num_hs) = graph.hydrogen_count(i) else {
                return Featurized::failed(format!("valence exceeded on atom {} ({})", i, atom.element));
            };
            atoms.push(AtomFeatures {
                atomic_number: atom.atomic_number(),
                formal_charge: atom.charge,
                aromatic: atom.aromatic,
                num_hs,
                degree: u8::try_from(graph.degree(i)).unwrap_or(u8::MAX),
            });
        }

        let in_ring = graph.ring_membership();
        let mut edge_index = Vec::with_capacity(graph.bonds.len() * 2);
        let mut edges = Vec::with_capacity(graph.bonds.len() * 2);
        for (b, bond) in graph.bonds.iter().enumerate() {
            let features = EdgeFeatures {
                order: bond.order.valence(),
                aromatic: in_ring[b]
                    && graph.atoms[bond.src].aromatic
                    && graph.atoms[bond.dst].aromatic,
                in_ring: in_ring[b],
            };
            edge_index.push([bond.src as u32, bond.dst as u32]);
            edge_index.push([bond.dst as u32, bond.src as u32]);
            edges.push(features.clone());
            edges.push(features);
        }

        Featurized::Record(GraphRecord {
            atoms,
            edge_index,
            edges,
        })
    }
}

/// Featurize every raw source line, keeping input order.
pub fn featurize_lines<F: GraphFeaturizer>(
    featurizer: &F,
    lines: &[String],
    pool: &WorkerPool,
) -> Vec<Featurized<F::Record>> {
    pool.map(lines, |_, line| featurizer.featurize(&strip_whitespace(line)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(smiles: &str) -> GraphRecord {
        match MolGraphFeaturizer.featurize(smiles) {
            Featurized::Record(r) => r,
            Featurized::Failed { reason } => panic!("featurization failed: {reason}"),
        }
    }

    #[test]
    fn test_ethanol_features() {
        let g = record("CCO");
        assert_eq!(g.num_atoms(), 3);
        assert_eq!(g.num_edges(), 4);
        assert_eq!(
            g.atoms.iter().map(|a| a.atomic_number).collect::<Vec<_>>(),
            vec![6, 6, 8]
        );
        assert_eq!(
            g.atoms.iter().map(|a| a.num_hs).collect::<Vec<_>>(),
            vec![3, 2, 1]
        );
        assert_eq!(g.edge_index[0], [0, 1]);
        assert_eq!(g.edge_index[1], [1, 0]);
        assert!(g.edges.iter().all(|e| e.order == 1 && !e.in_ring));
    }

    #[test]
    fn test_benzene_is_aromatic_ring() {
        let g = record("c1ccccc1");
        assert_eq!(g.num_atoms(), 6);
        assert_eq!(g.num_edges(), 12);
        assert!(g.atoms.iter().all(|a| a.aromatic && a.num_hs == 1 && a.degree == 2));
        assert!(g.edges.iter().all(|e| e.aromatic && e.in_ring));
        let doubles = g.edges.iter().filter(|e| e.order == 2).count();
        assert_eq!(doubles, 6);
    }

    #[test]
    fn test_charged_bracket_atom() {
        let g = record("C[N+](C)(C)C");
        assert_eq!(g.atoms[1].formal_charge, 1);
        assert_eq!(g.atoms[1].num_hs, 0);
        assert_eq!(g.atoms[1].degree, 4);
    }

    #[test]
    fn test_failures_are_soft() {
        assert!(MolGraphFeaturizer.featurize("").is_failed());
        assert!(MolGraphFeaturizer.featurize("C(C").is_failed());
        assert!(MolGraphFeaturizer.featurize("c1cccc1").is_failed());
        assert!(MolGraphFeaturizer.featurize("C(C)(C)(C)(C)C").is_failed());
    }

    #[test]
    fn test_out_of_range_values_are_soft_failures() {
        let charged = format!("[C{}]", "+".repeat(200));
        assert!(MolGraphFeaturizer.featurize(&charged).is_failed());
        let crowded = format!("C{}C", "(#C)".repeat(90));
        assert!(MolGraphFeaturizer.featurize(&crowded).is_failed());
    }

    #[test]
    fn test_featurize_lines_keeps_order() {
        let lines: Vec<String> = ["C", "", "CC", "CCC"].iter().map(|s| s.to_string()).collect();
        let pool = WorkerPool::new(3).unwrap();
        let out = featurize_lines(&MolGraphFeaturizer, &lines, &pool);
        assert_eq!(out.len(), 4);
        assert!(out[1].is_failed());
        let sizes: Vec<Option<usize>> = out
            .into_iter()
            .map(|f| f.record().map(|g| g.num_atoms()))
            .collect();
        assert_eq!(sizes, vec![Some(1), None, Some(2), Some(3)]);
    }

    #[test]
    fn test_record_serializes_to_json() {
        let json = serde_json::to_string(&record("C=O")).unwrap();
        assert!(json.contains("\"edge_index\":[[0,1],[1,0]]"));
        assert!(json.contains("\"order\":2"));
    }
}
