//! Dropping samples whose graph could not be built.

use crate::error::{PrepError, Result};
use crate::graph::Featurized;

/// Graph and sequence records that survived filtering, index for index.
#[derive(Debug, Clone, PartialEq)]
pub struct Aligned<R, S> {
    pub graphs: Vec<R>,
    pub sequences: Vec<S>,
    /// Original indices of the removed samples, ascending.
    pub dropped: Vec<usize>,
}

/// Remove every index whose graph record failed from both collections.
///
/// Survivors keep their relative order, so `graphs[k]` and `sequences[k]`
/// always come from the same input line.
pub fn filter_aligned<R, S>(graphs: Vec<Featurized<R>>, sequences: Vec<S>) -> Result<Aligned<R, S>> {
    if graphs.len() != sequences.len() {
        return Err(PrepError::AlignmentLength {
            graphs: graphs.len(),
            sequences: sequences.len(),
        });
    }

    let mut kept_graphs = Vec::with_capacity(graphs.len());
    let mut kept_sequences = Vec::with_capacity(sequences.len());
    let mut dropped = Vec::new();
    for (i, (graph, sequence)) in graphs.into_iter().zip(sequences).enumerate() {
        match graph {
            Featurized::Record(record) => {
                kept_graphs.push(record);
                kept_sequences.push(sequence);
            }
            Featurized::Failed { reason } => {
                log::debug!("Dropping sample {}: {}", i, reason);
                dropped.push(i);
            }
        }
    }

    Ok(Aligned {
        graphs: kept_graphs,
        sequences: kept_sequences,
        dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_failed_middle_sample() {
        let graphs = vec![
            Featurized::Record("g0"),
            Featurized::failed("bad"),
            Featurized::Record("g2"),
        ];
        let aligned = filter_aligned(graphs, vec![0, 1, 2]).unwrap();
        assert_eq!(aligned.graphs, vec!["g0", "g2"]);
        assert_eq!(aligned.sequences, vec![0, 2]);
        assert_eq!(aligned.dropped, vec![1]);
    }

    #[test]
    fn test_keeps_everything_without_failures() {
        let graphs: Vec<Featurized<usize>> = (0..5).map(Featurized::Record).collect();
        let aligned = filter_aligned(graphs, (0..5).collect::<Vec<_>>()).unwrap();
        assert_eq!(aligned.graphs, aligned.sequences);
        assert!(aligned.dropped.is_empty());
    }

    #[test]
    fn test_all_failed() {
        let graphs: Vec<Featurized<()>> = vec![Featurized::failed("a"), Featurized::failed("b")];
        let aligned = filter_aligned(graphs, vec!['x', 'y']).unwrap();
        assert!(aligned.graphs.is_empty());
        assert!(aligned.sequences.is_empty());
        assert_eq!(aligned.dropped, vec![0, 1]);
    }

    #[test]
    fn test_survivors_stay_paired() {
        let graphs: Vec<Featurized<usize>> = (0..100)
            .map(|i| {
                if i % 7 == 3 {
                    Featurized::failed("skip")
                } else {
                    Featurized::Record(i)
                }
            })
            .collect();
        let aligned = filter_aligned(graphs, (0..100).collect::<Vec<usize>>()).unwrap();
        assert_eq!(aligned.graphs.len(), aligned.sequences.len());
        assert_eq!(aligned.graphs, aligned.sequences);
        assert!(aligned.graphs.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(aligned.dropped.len() + aligned.graphs.len(), 100);
    }

    #[test]
    fn test_length_mismatch_is_an_error() {
        let graphs = vec![Featurized::Record(1)];
        assert!(matches!(
            filter_aligned(graphs, vec![1, 2]),
            Err(PrepError::AlignmentLength {
                graphs: 1,
                sequences: 2
            })
        ));
    }
}
