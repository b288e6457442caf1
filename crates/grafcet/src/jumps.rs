//! Jump resolution, the second compilation pass.
//!
//! A `Jump <n>` can point at any step, including one declared later, so its
//! connection can only be routed once the forward pass has placed every
//! element. Each jump gets a lane to the left of everything placed so far,
//! and its detour runs up or down that lane:
//!
//! ```text
//!   +---> [ n ]          up the lane, then right into the target
//!   |       |
//!   |      ...
//!   |       |
//!   |      ---           source
//!   |       |
//!   +-------+
//! ```
//!
//! Every lane sits one jump margin further left than the previous one, so
//! the vertical runs of two detours never overlap. Getting from the source
//! into the lane, and from the lane into the target, is a shortest path
//! search over an orthogonal grid laid between the placed elements: a detour
//! leaving a branch lane or entering one threads through the gaps of the
//! lanes to its left instead of crossing their steps. Detours may still
//! cross other connections.

use log::{debug, info, warn};
use petgraph::{
    algo::astar,
    graph::{NodeIndex, UnGraph},
    visit::EdgeRef,
};

use grafcet_core::{
    diagram::GrafcetDiagram,
    element::{Connection, ConnectionKind, Element, Orientation, Segment},
    geometry::{Bounds, Point},
};
use grafcet_parser::error::{Diagnostic, ErrorCode};

use crate::{
    analysis,
    compiler::{CompiledChart, ContextParts, PendingJump},
    error::CompileError,
};

/// A finished diagram with every non-fatal diagnostic of its compilation.
#[derive(Debug, Clone)]
pub struct CompiledDiagram {
    pub diagram: GrafcetDiagram,
    pub warnings: Vec<Diagnostic>,
}

impl CompiledDiagram {
    pub fn diagram(&self) -> &GrafcetDiagram {
        &self.diagram
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn into_diagram(self) -> GrafcetDiagram {
        self.diagram
    }
}

impl CompiledChart {
    /// The laid out diagram, jumps not included.
    pub fn diagram(&self) -> GrafcetDiagram {
        GrafcetDiagram::from_elements(self.context.title(), self.context.elements().to_vec())
    }

    pub fn pending_jumps(&self) -> &[PendingJump] {
        self.context.pending_jumps()
    }

    /// Route every pending jump and analyse the finished chart.
    ///
    /// # Errors
    ///
    /// Returns a [`CompileError`] listing every jump whose target step does
    /// not exist (`E205`), followed by the warnings gathered so far.
    pub fn resolve_jumps(self) -> Result<CompiledDiagram, CompileError> {
        let ContextParts {
            config,
            mut diagram,
            step_index,
            spans,
            pending_jumps,
            mut warnings,
        } = self.context.into_parts();

        let margin = config.jump_margin();
        let clearance = config.jump_clearance();
        let mut left = diagram
            .extent()
            .map_or(config.origin().x(), |extent| extent.min_x());

        let router = JumpRouter::new(&diagram, clearance, margin);
        let mut errors = Vec::new();
        let mut routed = Vec::with_capacity(pending_jumps.len());

        for (index, jump) in pending_jumps.iter().enumerate() {
            let Some(target) = step_index
                .get(&jump.target)
                .and_then(|id| diagram.element(id))
                .and_then(Element::as_step)
            else {
                errors.push(
                    Diagnostic::error(format!("jump to undefined step {}", jump.target))
                        .with_code(ErrorCode::E205)
                        .with_label(jump.span, "no step with this number")
                        .with_help("declare the step or jump to an existing step number")
                        .with_element(jump.source_id.as_str()),
                );
                continue;
            };

            let lane_x = left - margin;
            left = lane_x;

            let entry = target.bounds().top_center();
            let segments = router
                .route(jump.source_point, entry, lane_x)
                .unwrap_or_else(|| {
                    warn!(
                        source = jump.source_id,
                        target = target.id();
                        "No clear path for jump, falling back to a plain detour"
                    );
                    detour(jump.source_point, entry, lane_x, clearance)
                });
            debug!(
                source = jump.source_id,
                target = target.id(),
                lane_x;
                "Jump resolved"
            );
            routed.push(Element::Connection(Connection::new(
                format!("jump-{index}"),
                jump.source_id.clone(),
                target.id(),
                ConnectionKind::Jump,
                segments,
            )));
        }

        if !errors.is_empty() {
            info!(errors = errors.len(); "Jump resolution failed");
            errors.extend(warnings);
            return Err(CompileError::new(errors));
        }

        for connection in routed {
            diagram.push(connection);
        }

        warnings.extend(analysis::analyze(&diagram, &spans));
        info!(
            jumps = pending_jumps.len(),
            warnings = warnings.len();
            "Jumps resolved"
        );

        Ok(CompiledDiagram { diagram, warnings })
    }
}

/// Segments of a jump detour running down the vertical line `lane_x`.
fn detour(source: Point, target: Point, lane_x: f32, clearance: f32) -> Vec<Segment> {
    let below_source = source.y() + clearance;
    let above_target = target.y() - clearance;
    vec![
        Segment::vertical(source.x(), source.y(), below_source),
        Segment::horizontal(below_source, source.x(), lane_x),
        Segment::vertical(lane_x, below_source, above_target),
        Segment::horizontal(above_target, lane_x, target.x()),
        Segment::vertical(target.x(), above_target, target.y()),
    ]
}

/// Routes jump detours around the elements of the forward pass.
///
/// Grid lines run `clearance` away from every element edge, plus through the
/// source, the target and the lane of each jump. A grid point has one node
/// per orientation so that turning costs `bend_cost` on top of the length.
struct JumpRouter {
    /// Element bounds grown by half the clearance.
    obstacles: Vec<Bounds>,
    xs: Vec<f32>,
    ys: Vec<f32>,
    clearance: f32,
    bend_cost: f32,
}

impl JumpRouter {
    fn new(diagram: &GrafcetDiagram, clearance: f32, bend_cost: f32) -> Self {
        let bounds: Vec<Bounds> = diagram.elements().iter().filter_map(Element::bounds).collect();
        let xs = bounds
            .iter()
            .flat_map(|b| [b.min_x() - clearance, b.max_x() + clearance])
            .collect();
        let ys = bounds
            .iter()
            .flat_map(|b| [b.min_y() - clearance, b.max_y() + clearance])
            .collect();
        Self {
            obstacles: bounds.iter().map(|b| b.inflate(clearance / 2.0)).collect(),
            xs,
            ys,
            clearance,
            bend_cost,
        }
    }

    /// Route from `source` down to the lane at `lane_x`, along the lane and
    /// into `entry` from above. `None` when the grid has no clear path.
    fn route(&self, source: Point, entry: Point, lane_x: f32) -> Option<Vec<Segment>> {
        let below_source = source.with_y(source.y() + self.clearance);
        let above_entry = entry.with_y(entry.y() - self.clearance);
        let grid = self.grid(&[below_source, above_entry], lane_x);

        let outbound = grid.path_to_lane(grid.node(below_source, Orientation::Vertical)?, lane_x)?;
        let inbound = grid.path_to_lane(grid.node(above_entry, Orientation::Vertical)?, lane_x)?;

        let mut points = vec![source];
        points.extend(outbound);
        points.extend(inbound.into_iter().rev());
        points.push(entry);
        Some(segments_through(&points))
    }

    fn grid(&self, extra: &[Point], lane_x: f32) -> Grid {
        let mut xs = self.xs.clone();
        xs.push(lane_x);
        xs.extend(extra.iter().map(|p| p.x()));
        let mut ys = self.ys.clone();
        ys.extend(extra.iter().map(|p| p.y()));
        for coordinates in [&mut xs, &mut ys] {
            coordinates.sort_by(f32::total_cmp);
            coordinates.dedup();
        }

        // Only obstacles straddling a grid line can block it.
        let rows: Vec<Vec<Bounds>> = ys
            .iter()
            .map(|&y| self.blockers(|b| b.min_y() < y && y < b.max_y()))
            .collect();
        let columns: Vec<Vec<Bounds>> = xs
            .iter()
            .map(|&x| self.blockers(|b| b.min_x() < x && x < b.max_x()))
            .collect();

        let mut graph: UnGraph<(Point, Orientation), f32> = UnGraph::default();
        let mut nodes = Vec::with_capacity(xs.len() * ys.len());
        for (row, &y) in ys.iter().enumerate() {
            for &x in &xs {
                let point = Point::new(x, y);
                if rows[row].iter().any(|b| b.contains(point)) {
                    nodes.push(None);
                    continue;
                }
                let horizontal = graph.add_node((point, Orientation::Horizontal));
                let vertical = graph.add_node((point, Orientation::Vertical));
                graph.add_edge(horizontal, vertical, self.bend_cost);
                nodes.push(Some([horizontal, vertical]));
            }
        }

        let width = xs.len();
        for (row, &y) in ys.iter().enumerate() {
            for (col, &x) in xs.iter().enumerate() {
                let Some([horizontal, vertical]) = nodes[row * width + col] else {
                    continue;
                };
                if let Some(&next_x) = xs.get(col + 1) {
                    if let Some([next, _]) = nodes[row * width + col + 1] {
                        if is_clear(&rows[row], &Segment::horizontal(y, x, next_x)) {
                            graph.add_edge(horizontal, next, next_x - x);
                        }
                    }
                }
                if let Some(&next_y) = ys.get(row + 1) {
                    if let Some([_, next]) = nodes[(row + 1) * width + col] {
                        if is_clear(&columns[col], &Segment::vertical(x, y, next_y)) {
                            graph.add_edge(vertical, next, next_y - y);
                        }
                    }
                }
            }
        }

        Grid {
            graph,
            xs,
            ys,
            nodes,
        }
    }

    fn blockers(&self, straddles: impl Fn(&Bounds) -> bool) -> Vec<Bounds> {
        self.obstacles.iter().copied().filter(|b| straddles(b)).collect()
    }
}

fn is_clear(obstacles: &[Bounds], segment: &Segment) -> bool {
    let bounds = segment.bounds();
    !obstacles.iter().any(|b| b.intersects(&bounds))
}

/// The routing grid of one jump.
struct Grid {
    graph: UnGraph<(Point, Orientation), f32>,
    xs: Vec<f32>,
    ys: Vec<f32>,
    /// Horizontal and vertical node of each grid point, row by row. `None`
    /// for points inside an element.
    nodes: Vec<Option<[NodeIndex; 2]>>,
}

impl Grid {
    fn node(&self, point: Point, orientation: Orientation) -> Option<NodeIndex> {
        let col = self.xs.iter().position(|&x| x == point.x())?;
        let row = self.ys.iter().position(|&y| y == point.y())?;
        let [horizontal, vertical] = self.nodes[row * self.xs.len() + col]?;
        Some(match orientation {
            Orientation::Horizontal => horizontal,
            Orientation::Vertical => vertical,
        })
    }

    /// Cheapest path from `start` to any point of the lane.
    fn path_to_lane(&self, start: NodeIndex, lane_x: f32) -> Option<Vec<Point>> {
        let (_, path) = astar(
            &self.graph,
            start,
            |node| self.graph[node].0.x() == lane_x,
            |edge| *edge.weight(),
            |node| (self.graph[node].0.x() - lane_x).abs(),
        )?;
        Some(path.into_iter().map(|node| self.graph[node].0).collect())
    }
}

/// Orthogonal segments through `points`, merging repeated and collinear
/// points.
fn segments_through(points: &[Point]) -> Vec<Segment> {
    let mut corners: Vec<Point> = Vec::with_capacity(points.len());
    for &point in points {
        let collinear = match corners.as_slice() {
            [.., before, last] => {
                (before.x() == last.x() && last.x() == point.x())
                    || (before.y() == last.y() && last.y() == point.y())
            }
            _ => false,
        };
        if collinear {
            corners.pop();
        }
        if corners.last() != Some(&point) {
            corners.push(point);
        }
    }

    corners
        .windows(2)
        .map(|pair| {
            let (from, to) = (pair[0], pair[1]);
            if from.x() == to.x() {
                Segment::vertical(from.x(), from.y(), to.y())
            } else {
                Segment::horizontal(from.y(), from.x(), to.x())
            }
        })
        .collect()
}
