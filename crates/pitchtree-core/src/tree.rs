// Count tree geometry: fixed node positions and ball/strike transitions.
//
// The tree is a DAG rooted at 0-0 whose single sink is 3-2. Every node sits
// at depth balls + strikes; the y coordinate decreases by one per level so
// the diagram reads top-down.

use serde::{Deserialize, Serialize};

use crate::count::{Count, CountError};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A 2D layout coordinate in diagram units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// The outcome that moves the at-bat along an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PitchOutcome {
    Ball,
    Strike,
}

/// Outgoing transitions from a count. A side is `None` when that axis is
/// already at its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transitions {
    pub ball: Option<Count>,
    pub strike: Option<Count>,
}

impl Transitions {
    pub fn is_empty(&self) -> bool {
        self.ball.is_none() && self.strike.is_none()
    }

    /// Iterate the present transitions, ball first.
    pub fn iter(&self) -> impl Iterator<Item = (PitchOutcome, Count)> + '_ {
        self.ball
            .map(|c| (PitchOutcome::Ball, c))
            .into_iter()
            .chain(self.strike.map(|c| (PitchOutcome::Strike, c)))
    }
}

/// A count together with its diagram position and outgoing edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CountNode {
    pub count: Count,
    pub position: Point,
    pub transitions: Transitions,
}

/// A directed edge of the count tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: Count,
    pub to: Count,
    pub outcome: PitchOutcome,
}

// ---------------------------------------------------------------------------
// Static layout table
// ---------------------------------------------------------------------------

/// (balls, strikes, x, y) for every live count.
const NODE_LAYOUT: [(u8, u8, f64, f64); 12] = [
    (0, 0, 0.0, 5.0),
    (1, 0, -2.0, 4.0),
    (0, 1, 2.0, 4.0),
    (2, 0, -3.0, 3.0),
    (1, 1, 0.0, 3.0),
    (0, 2, 3.0, 3.0),
    (3, 0, -4.0, 2.0),
    (2, 1, -1.5, 2.0),
    (1, 2, 1.5, 2.0),
    (3, 1, -3.0, 1.0),
    (2, 2, 0.0, 1.0),
    (3, 2, -1.5, 0.0),
];

// ---------------------------------------------------------------------------
// CountTreeLayout
// ---------------------------------------------------------------------------

/// Stateless access to the count tree. All methods are pure lookups over the
/// static table above.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountTreeLayout;

impl CountTreeLayout {
    /// All twelve live counts, ordered by balls then strikes.
    pub fn all_counts(&self) -> Vec<Count> {
        Count::all()
    }

    /// Diagram position of `count`.
    pub fn layout_of(&self, count: Count) -> Result<Point, CountError> {
        NODE_LAYOUT
            .iter()
            .find(|(b, s, _, _)| *b == count.balls() && *s == count.strikes())
            .map(|&(_, _, x, y)| Point { x, y })
            .ok_or_else(|| CountError::UnknownCount(count.to_string()))
    }

    /// Position lookup from the canonical string form. Anything that is not
    /// one of the twelve counts is reported as `UnknownCount`.
    pub fn layout_of_str(&self, count: &str) -> Result<Point, CountError> {
        let parsed = count.parse::<Count>().map_err(|e| match e {
            CountError::Malformed(text) => CountError::UnknownCount(text),
            other => other,
        })?;
        self.layout_of(parsed)
    }

    /// Ball and strike successors of `count`.
    pub fn transitions_of(&self, count: Count) -> Transitions {
        Transitions {
            ball: count.next_ball(),
            strike: count.next_strike(),
        }
    }

    /// Every node of the tree in `all_counts()` order.
    pub fn nodes(&self) -> Result<Vec<CountNode>, CountError> {
        self.all_counts()
            .into_iter()
            .map(|count| {
                Ok(CountNode {
                    count,
                    position: self.layout_of(count)?,
                    transitions: self.transitions_of(count),
                })
            })
            .collect()
    }

    /// Every edge of the tree, grouped by source count.
    pub fn edges(&self) -> Vec<Edge> {
        self.all_counts()
            .into_iter()
            .flat_map(|from| {
                self.transitions_of(from)
                    .iter()
                    .map(move |(outcome, to)| Edge { from, to, outcome })
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn c(b: u8, s: u8) -> Count {
        Count::new(b, s).unwrap()
    }

    #[test]
    fn every_count_has_a_layout_entry() {
        let tree = CountTreeLayout;
        for count in tree.all_counts() {
            assert!(tree.layout_of(count).is_ok(), "missing layout for {count}");
        }
    }

    #[test]
    fn layout_matches_diagram_coordinates() {
        let tree = CountTreeLayout;
        assert_eq!(tree.layout_of(c(0, 0)).unwrap(), Point { x: 0.0, y: 5.0 });
        assert_eq!(tree.layout_of(c(2, 1)).unwrap(), Point { x: -1.5, y: 2.0 });
        assert_eq!(tree.layout_of(c(3, 2)).unwrap(), Point { x: -1.5, y: 0.0 });
    }

    #[test]
    fn y_coordinate_tracks_depth() {
        let tree = CountTreeLayout;
        for count in tree.all_counts() {
            let p = tree.layout_of(count).unwrap();
            assert_eq!(p.y, 5.0 - f64::from(count.depth()), "{count}");
        }
    }

    #[test]
    fn layout_of_str_rejects_unknown_counts() {
        let tree = CountTreeLayout;
        assert!(tree.layout_of_str("1-1").is_ok());
        assert_eq!(
            tree.layout_of_str("4-0"),
            Err(CountError::UnknownCount("4-0".into()))
        );
        assert_eq!(
            tree.layout_of_str("nonsense"),
            Err(CountError::UnknownCount("nonsense".into()))
        );
    }

    #[test]
    fn only_full_count_has_no_transitions() {
        let tree = CountTreeLayout;
        for count in tree.all_counts() {
            let t = tree.transitions_of(count);
            if count == Count::full() {
                assert!(t.is_empty());
            } else {
                assert!(!t.is_empty(), "{count} should have a transition");
            }
        }
    }

    #[test]
    fn transitions_increment_one_axis() {
        let tree = CountTreeLayout;
        let t = tree.transitions_of(c(1, 1));
        assert_eq!(t.ball, Some(c(2, 1)));
        assert_eq!(t.strike, Some(c(1, 2)));

        let t = tree.transitions_of(c(3, 0));
        assert_eq!(t.ball, None);
        assert_eq!(t.strike, Some(c(3, 1)));
    }

    #[test]
    fn edges_go_one_level_deeper() {
        let tree = CountTreeLayout;
        let edges = tree.edges();
        // 4x3 grid: 3*3 ball edges + 4*2 strike edges.
        assert_eq!(edges.len(), 17);
        for e in &edges {
            assert_eq!(e.to.depth(), e.from.depth() + 1);
        }
    }

    #[test]
    fn every_node_reachable_from_first_pitch() {
        let tree = CountTreeLayout;
        let mut seen = vec![Count::first_pitch()];
        let mut frontier = vec![Count::first_pitch()];
        while let Some(next) = frontier.pop() {
            for (_, to) in tree.transitions_of(next).iter() {
                if !seen.contains(&to) {
                    seen.push(to);
                    frontier.push(to);
                }
            }
        }
        assert_eq!(seen.len(), 12);
    }

    #[test]
    fn nodes_carry_position_and_transitions() {
        let tree = CountTreeLayout;
        let nodes = tree.nodes().unwrap();
        assert_eq!(nodes.len(), 12);
        let root = nodes.iter().find(|n| n.count == Count::first_pitch()).unwrap();
        assert_eq!(root.position, Point { x: 0.0, y: 5.0 });
        assert_eq!(root.transitions.ball, Some(c(1, 0)));
        assert_eq!(root.transitions.strike, Some(c(0, 1)));
    }
}
