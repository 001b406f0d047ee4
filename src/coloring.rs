//! Greedy graph coloring and palette mapping.
//!
//! Largest-first greedy: nodes in descending degree (ties by ascending
//! index), each takes the smallest class no colored neighbour uses. Not
//! optimal, but polynomial and reproducible.
//!
//! Classes map to display colors modulo the palette size. Once more classes
//! are used than the palette holds, two conflicting trails can end up with the
//! same display color; this is reported, not corrected.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::conflict::ConflictGraph;
use crate::error::{Result, TrailError};

/// Color class per trail index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Coloring {
    classes: Vec<usize>,
}

impl Coloring {
    pub fn class_of(&self, node: usize) -> usize {
        self.classes[node]
    }

    pub fn classes(&self) -> &[usize] {
        &self.classes
    }

    /// Number of distinct classes used (max class + 1).
    pub fn class_count(&self) -> usize {
        self.classes.iter().max().map_or(0, |&c| c + 1)
    }

    /// Whether no edge joins two nodes of the same class.
    pub fn is_proper(&self, graph: &ConflictGraph) -> bool {
        graph
            .edges()
            .all(|(i, j)| self.classes[i] != self.classes[j])
    }
}

/// Largest-first greedy coloring.
///
/// # Example
/// ```
/// use trailmap::coloring::greedy_color;
/// use trailmap::conflict::ConflictGraph;
///
/// let triangle = ConflictGraph::from_edges(3, &[(0, 1), (1, 2), (0, 2)]);
/// let coloring = greedy_color(&triangle);
/// assert_eq!(coloring.class_count(), 3);
/// assert!(coloring.is_proper(&triangle));
/// ```
pub fn greedy_color(graph: &ConflictGraph) -> Coloring {
    let n = graph.node_count();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| graph.degree(b).cmp(&graph.degree(a)).then(a.cmp(&b)));

    let mut classes: Vec<Option<usize>> = vec![None; n];
    let mut taken: Vec<bool> = Vec::new();

    for node in order {
        taken.clear();
        taken.resize(graph.degree(node) + 1, false);
        for &nb in graph.neighbors(node) {
            if let Some(c) = classes[nb] {
                // A class above the degree can never be the smallest free one
                if c < taken.len() {
                    taken[c] = true;
                }
            }
        }
        let class = taken.iter().position(|&t| !t).unwrap_or(taken.len());
        classes[node] = Some(class);
    }

    Coloring {
        classes: classes.into_iter().map(|c| c.unwrap_or(0)).collect(),
    }
}

/// Display colors as `#RRGGBB` hex strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Palette(Vec<String>);

impl Default for Palette {
    fn default() -> Self {
        Self(
            [
                "#800000", "#FF0000", "#FFA500", "#FFFF00", "#808000", "#800080", "#FF00FF",
                "#FFFFFF", "#00FF00", "#008000",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        )
    }
}

impl Palette {
    /// Validated palette: non-empty, every entry `#RRGGBB`.
    pub fn new<I, S>(colors: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let palette = Self(colors.into_iter().map(Into::into).collect());
        palette.validate()?;
        Ok(palette)
    }

    pub fn validate(&self) -> Result<()> {
        if self.0.is_empty() {
            return Err(TrailError::config("palette is empty"));
        }
        for color in &self.0 {
            let hex = color.strip_prefix('#').unwrap_or("");
            if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(TrailError::config(format!(
                    "palette entry '{}' is not a #RRGGBB color",
                    color
                )));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn colors(&self) -> &[String] {
        &self.0
    }

    /// Display color of a class: `palette[class mod len]`.
    pub fn color_for(&self, class: usize) -> &str {
        &self.0[class % self.0.len()]
    }

    /// Log when the coloring wraps around the palette.
    pub fn check_capacity(&self, coloring: &Coloring) -> bool {
        let used = coloring.class_count();
        if used > self.len() {
            warn!(
                "[Coloring] {} color classes needed but palette has {}; \
                 some conflicting trails will share a display color",
                used,
                self.len()
            );
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(k: usize) -> ConflictGraph {
        let mut edges = Vec::new();
        for i in 0..k {
            for j in i + 1..k {
                edges.push((i, j));
            }
        }
        ConflictGraph::from_edges(k, &edges)
    }

    #[test]
    fn test_no_edges_single_class() {
        let graph = ConflictGraph::new(5);
        let coloring = greedy_color(&graph);
        assert!(coloring.is_proper(&graph));
        assert_eq!(coloring.class_count(), 1);
    }

    #[test]
    fn test_complete_graph_uses_k_classes() {
        for k in 1..=Palette::default().len() {
            let graph = complete(k);
            let coloring = greedy_color(&graph);
            assert!(coloring.is_proper(&graph));
            assert_eq!(coloring.class_count(), k);
        }
    }

    #[test]
    fn test_star_center_distinct_leaves_shared() {
        let graph = ConflictGraph::from_edges(5, &[(2, 0), (2, 1), (2, 3), (2, 4)]);
        let coloring = greedy_color(&graph);
        assert!(coloring.is_proper(&graph));
        // Highest degree goes first and takes class 0
        assert_eq!(coloring.class_of(2), 0);
        for leaf in [0, 1, 3, 4] {
            assert_eq!(coloring.class_of(leaf), 1);
        }
    }

    #[test]
    fn test_ties_broken_by_index() {
        // Path 0-1-2-3: nodes 1 and 2 have degree 2; 1 goes first
        let graph = ConflictGraph::from_edges(4, &[(0, 1), (1, 2), (2, 3)]);
        let coloring = greedy_color(&graph);
        assert_eq!(coloring.classes(), &[1, 0, 1, 0]);
    }

    #[test]
    fn test_deterministic() {
        let graph = ConflictGraph::from_edges(
            8,
            &[(0, 1), (1, 2), (2, 3), (3, 0), (4, 5), (5, 6), (6, 4), (0, 4), (7, 3)],
        );
        let first = greedy_color(&graph);
        assert!(first.is_proper(&graph));
        for _ in 0..5 {
            assert_eq!(greedy_color(&graph), first);
        }
    }

    #[test]
    fn test_palette_wraps() {
        let palette = Palette::new(["#FF0000", "#00FF00"]).unwrap();
        assert_eq!(palette.color_for(0), "#FF0000");
        assert_eq!(palette.color_for(3), "#00FF00");

        let coloring = greedy_color(&complete(3));
        assert!(!palette.check_capacity(&coloring));
        assert!(Palette::default().check_capacity(&coloring));
    }

    #[test]
    fn test_palette_validation() {
        assert!(Palette::new(Vec::<String>::new()).is_err());
        assert!(Palette::new(["red"]).is_err());
        assert!(Palette::new(["#12345G"]).is_err());
        assert!(Palette::default().validate().is_ok());
    }
}
