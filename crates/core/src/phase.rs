use crate::{Bounds, Guess, PhaseScaling};

/// Per-phase dimension counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dimensions {
    pub states: usize,
    pub controls: usize,
    pub parameters: usize,
    pub events: usize,
    pub path: usize,
}

/// A phase as declared during level-1 setup.
///
/// Only sizing information lives here. Bounds, scaling and the initial guess
/// become available on [`Phase`] once [`Setup::build`](crate::Setup::build)
/// has sized them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseSetup {
    pub dimensions: Dimensions,

    /// Mesh sizes, one per mesh iteration (e.g. `vec![20, 40, 80]`).
    pub nodes: Vec<usize>,
}

impl Default for PhaseSetup {
    fn default() -> Self {
        Self {
            dimensions: Dimensions::default(),
            nodes: vec![20],
        }
    }
}

/// A fully sized phase of a [`Problem`](crate::Problem).
#[derive(Debug, Clone, PartialEq)]
pub struct Phase {
    index: usize,
    dimensions: Dimensions,
    nodes: Vec<usize>,
    bounds: Bounds,
    guess: Guess,
    scale: PhaseScaling,
}

impl Phase {
    pub(crate) fn new(index: usize, setup: PhaseSetup) -> Self {
        let dims = setup.dimensions;
        Self {
            index,
            dimensions: dims,
            nodes: setup.nodes,
            bounds: Bounds::new(index, dims),
            guess: Guess::new(index, dims),
            scale: PhaseScaling::ones(&dims),
        }
    }

    /// Returns the 1-based phase index.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn dimensions(&self) -> &Dimensions {
        &self.dimensions
    }

    /// Returns the requested mesh sizes.
    #[must_use]
    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    #[must_use]
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn bounds_mut(&mut self) -> &mut Bounds {
        &mut self.bounds
    }

    #[must_use]
    pub fn guess(&self) -> &Guess {
        &self.guess
    }

    pub fn guess_mut(&mut self) -> &mut Guess {
        &mut self.guess
    }

    #[must_use]
    pub fn scale(&self) -> &PhaseScaling {
        &self.scale
    }

    pub fn scale_mut(&mut self) -> &mut PhaseScaling {
        &mut self.scale
    }

    /// Mesh size for a 1-based mesh iteration; short lists repeat their last entry.
    pub(crate) fn nodes_at(&self, iteration: usize) -> usize {
        let i = iteration.saturating_sub(1).min(self.nodes.len().saturating_sub(1));
        self.nodes.get(i).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_two_sizes_every_array() {
        let phase = Phase::new(
            1,
            PhaseSetup {
                dimensions: Dimensions {
                    states: 3,
                    controls: 1,
                    parameters: 2,
                    events: 5,
                    path: 1,
                },
                nodes: vec![40],
            },
        );
        assert_eq!(phase.bounds().lower().states.len(), 3);
        assert_eq!(phase.bounds().upper().events.len(), 5);
        assert_eq!(phase.scale().defects.len(), 3);
        assert_eq!(phase.scale().path.len(), 1);
        assert_eq!(phase.guess().parameters().len(), 2);
        assert!(phase.guess().is_empty());
    }

    #[test]
    fn short_node_lists_repeat_last_entry() {
        let phase = Phase::new(
            2,
            PhaseSetup {
                dimensions: Dimensions::default(),
                nodes: vec![10, 20],
            },
        );
        assert_eq!(phase.nodes_at(1), 10);
        assert_eq!(phase.nodes_at(2), 20);
        assert_eq!(phase.nodes_at(5), 20);
    }
}
