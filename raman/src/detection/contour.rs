//! Outer boundary tracing (Moore neighborhood) on a label map.

use glam::IVec2;

use super::labeling::LabelMap;

/// 8-neighborhood in clockwise order (image axes, y down), starting east.
const DIRECTIONS: [IVec2; 8] = [
    IVec2::new(1, 0),
    IVec2::new(1, 1),
    IVec2::new(0, 1),
    IVec2::new(-1, 1),
    IVec2::new(-1, 0),
    IVec2::new(-1, -1),
    IVec2::new(0, -1),
    IVec2::new(1, -1),
];

const WEST: usize = 4;

/// Traces the outer boundary of component `label`, starting from its first
/// pixel in raster order.
///
/// Returns the closed sequence of boundary pixel centers (the start is not
/// repeated at the end). A single-pixel component yields one point. Pixels
/// where the boundary pinches appear more than once.
pub fn trace_outer_boundary(labels: &LabelMap, label: u32, start: IVec2, area: usize) -> Vec<IVec2> {
    let inside = |p: IVec2| labels.get_signed(p.x, p.y) == label;

    let mut contour = vec![start];
    // The raster-first pixel has background to its west.
    let Some((second, mut backtrack)) = next_boundary_step(&inside, start, WEST) else {
        return contour;
    };

    let max_steps = 8 * area + 16;
    let mut current = second;
    for _ in 0..max_steps {
        let Some((next, next_backtrack)) = next_boundary_step(&inside, current, backtrack) else {
            break;
        };
        // Jacob's criterion: stop when the first move is about to repeat.
        if current == start && next == second {
            break;
        }
        contour.push(current);
        current = next;
        backtrack = next_backtrack;
    }

    contour
}

/// Scans the neighbors of `p` clockwise, starting after the backtrack
/// direction. Returns the first foreground neighbor and the direction from it
/// back to the last background pixel examined.
fn next_boundary_step(
    inside: &impl Fn(IVec2) -> bool,
    p: IVec2,
    backtrack: usize,
) -> Option<(IVec2, usize)> {
    for i in 1..=8 {
        let dir = (backtrack + i) % 8;
        let candidate = p + DIRECTIONS[dir];
        if inside(candidate) {
            let previous = p + DIRECTIONS[(backtrack + i - 1) % 8];
            return Some((candidate, direction_index(previous - candidate)));
        }
    }
    None
}

fn direction_index(delta: IVec2) -> usize {
    DIRECTIONS
        .iter()
        .position(|&d| d == delta)
        .unwrap_or(WEST)
}

/// Keeps only the points where the boundary changes direction, like a
/// chain-code contour with horizontal, vertical and diagonal segments merged.
pub fn compress_collinear(points: &[IVec2]) -> Vec<IVec2> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }
    let kept: Vec<IVec2> = (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            points[i] - prev != next - points[i]
        })
        .map(|i| points[i])
        .collect();
    if kept.is_empty() {
        points[..1].to_vec()
    } else {
        kept
    }
}
