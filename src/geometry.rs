use serde::{Deserialize, Serialize};

use crate::model::Edge;

/// Lateral displacement applied to each member of a reciprocal edge pair.
/// Visual constant, not derived from content, so repeated renders of the
/// same diagram produce identical paths.
pub const BIDIRECTIONAL_OFFSET: f32 = 25.0;

/// Fraction of the endpoint distance used for bezier control handles.
pub const BEZIER_CURVATURE: f32 = 0.25;

/// Minimum control-handle length so short edges still curve away from the
/// node border instead of collapsing into a straight line.
pub const MIN_CONTROL_DISTANCE: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Point { x, y }
    }
}

/// Compass side of the node a connection attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Top,
    Right,
    Bottom,
    Left,
}

impl Position {
    fn direction(self) -> (f32, f32) {
        match self {
            Position::Top => (0.0, -1.0),
            Position::Right => (1.0, 0.0),
            Position::Bottom => (0.0, 1.0),
            Position::Left => (-1.0, 0.0),
        }
    }
}

/// On-screen endpoints of one edge, as resolved by the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeEndpoints {
    pub source: Point,
    pub source_position: Position,
    pub target: Point,
    pub target_position: Position,
}

/// Computed curve for one edge: the SVG path and the anchor the label box
/// is centered on.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeParams {
    pub path: String,
    pub label_anchor: Point,
    pub bidirectional: bool,
}

/// True iff some other edge in `edges` runs between the same node pair in
/// the opposite direction. Derived from the full edge set on every call and
/// never cached: the set can change between renders.
pub fn is_bidirectional(edge: &Edge, edges: &[Edge]) -> bool {
    edges.iter().any(|other| {
        other.id != edge.id && other.source == edge.target && other.target == edge.source
    })
}

/// Compute the curve for `edge` given its resolved endpoints and the full
/// current edge set.
///
/// Reciprocal pairs would otherwise overlap exactly, hiding one direction
/// and stacking both labels; each member of such a pair is routed through a
/// laterally offset quadratic control point instead. The offset sign follows
/// the source/target x-order, so the two curves of a pair diverge.
pub fn compute_edge_params(edge: &Edge, endpoints: &EdgeEndpoints, edges: &[Edge]) -> EdgeParams {
    let source = endpoints.source;
    let target = endpoints.target;

    if is_bidirectional(edge, edges) {
        let offset = if source.x < target.x {
            BIDIRECTIONAL_OFFSET
        } else {
            -BIDIRECTIONAL_OFFSET
        };
        let mid_x = (source.x + target.x) / 2.0;
        let mid_y = (source.y + target.y) / 2.0;

        let path = format!(
            "M {:.1},{:.1} Q {:.1},{:.1} {:.1},{:.1}",
            source.x,
            source.y,
            mid_x,
            mid_y + offset,
            target.x,
            target.y
        );

        return EdgeParams {
            path,
            // quadratic midpoint at t = 0.5: the control pulls the curve
            // half the offset away from the chord
            label_anchor: Point::new(mid_x, mid_y + offset / 2.0),
            bidirectional: true,
        };
    }

    let dx = target.x - source.x;
    let dy = target.y - source.y;
    let distance = (dx * dx + dy * dy).sqrt();
    let handle = (distance * BEZIER_CURVATURE).max(MIN_CONTROL_DISTANCE);

    let (sdx, sdy) = endpoints.source_position.direction();
    let (tdx, tdy) = endpoints.target_position.direction();

    let c1 = Point::new(source.x + sdx * handle, source.y + sdy * handle);
    let c2 = Point::new(target.x + tdx * handle, target.y + tdy * handle);

    let path = format!(
        "M {:.1},{:.1} C {:.1},{:.1} {:.1},{:.1} {:.1},{:.1}",
        source.x, source.y, c1.x, c1.y, c2.x, c2.y, target.x, target.y
    );

    // cubic midpoint at t = 0.5
    let label_anchor = Point::new(
        (source.x + 3.0 * c1.x + 3.0 * c2.x + target.x) / 8.0,
        (source.y + 3.0 * c1.y + 3.0 * c2.y + target.y) / 8.0,
    );

    EdgeParams {
        path,
        label_anchor,
        bidirectional: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Edge;

    fn edge(id: &str, source: &str, target: &str) -> Edge {
        Edge {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            label: None,
            has_label: false,
            cardinality: None,
        }
    }

    fn endpoints(sx: f32, sy: f32, tx: f32, ty: f32) -> EdgeEndpoints {
        EdgeEndpoints {
            source: Point::new(sx, sy),
            source_position: Position::Right,
            target: Point::new(tx, ty),
            target_position: Position::Left,
        }
    }

    #[test]
    fn repeated_calls_return_identical_paths() {
        let a = edge("e1", "n1", "n2");
        let b = edge("e2", "n2", "n1");
        let set = vec![a.clone(), b.clone()];
        let eps = endpoints(0.0, 0.0, 200.0, 100.0);

        let first = compute_edge_params(&a, &eps, &set);
        let second = compute_edge_params(&a, &eps, &set);
        assert_eq!(first.path, second.path);
        assert_eq!(first.label_anchor, second.label_anchor);
    }

    #[test]
    fn reverse_edge_makes_both_bidirectional() {
        let a = edge("e1", "n1", "n2");
        let b = edge("e2", "n2", "n1");
        let set = vec![a.clone(), b.clone()];

        assert!(is_bidirectional(&a, &set));
        assert!(is_bidirectional(&b, &set));

        let without_b = vec![a.clone()];
        assert!(!is_bidirectional(&a, &without_b));
    }

    #[test]
    fn reciprocal_pair_diverges_with_opposite_offsets() {
        let a = edge("e1", "n1", "n2");
        let b = edge("e2", "n2", "n1");
        let set = vec![a.clone(), b.clone()];

        let params_a = compute_edge_params(&a, &endpoints(0.0, 0.0, 200.0, 0.0), &set);
        // b runs right-to-left, so its endpoints swap
        let params_b = compute_edge_params(
            &b,
            &EdgeEndpoints {
                source: Point::new(200.0, 0.0),
                source_position: Position::Left,
                target: Point::new(0.0, 0.0),
                target_position: Position::Right,
            },
            &set,
        );

        assert!(params_a.bidirectional);
        assert!(params_b.bidirectional);
        assert_ne!(params_a.path, params_b.path);
        // offsets carry opposite signs: one anchor sits below the chord,
        // the other above
        assert!(params_a.label_anchor.y > 0.0);
        assert!(params_b.label_anchor.y < 0.0);
    }

    #[test]
    fn self_edge_is_not_its_own_reverse() {
        let a = edge("e1", "n1", "n1");
        let set = vec![a.clone()];
        assert!(!is_bidirectional(&a, &set));
    }

    #[test]
    fn plain_edge_uses_a_cubic_with_center_anchor() {
        let a = edge("e1", "n1", "n2");
        let set = vec![a.clone()];
        let params = compute_edge_params(&a, &endpoints(0.0, 0.0, 100.0, 0.0), &set);

        assert!(!params.bidirectional);
        assert!(params.path.starts_with("M 0.0,0.0 C "));
        assert!((params.label_anchor.x - 50.0).abs() < 0.01);
        assert!((params.label_anchor.y - 0.0).abs() < 0.01);
    }

    #[test]
    fn label_anchor_sits_half_the_offset_off_the_chord() {
        let a = edge("e1", "n1", "n2");
        let b = edge("e2", "n2", "n1");
        let set = vec![a.clone(), b];
        let params = compute_edge_params(&a, &endpoints(0.0, 0.0, 200.0, 0.0), &set);
        assert!((params.label_anchor.y - BIDIRECTIONAL_OFFSET / 2.0).abs() < 0.01);
    }
}
