//! Layout compiler: turns a parsed chart into positioned elements.
//!
//! The compiler walks the statement tree top to bottom with a vertical
//! cursor. Every element is centered on the x coordinate of its lane; the
//! main chain runs in the lane at [`LayoutConfig::origin`] and the branches
//! of a divergence get lanes to its right.
//!
//! ```text
//!        [ 0 ]            step
//!          |
//!         ---             transition
//!          |
//!   ===============       AND divergence gate
//!     |          |
//!   [ 1 ]      [ 2 ]      one lane per branch
//!     |          |
//!   ===============       AND convergence gate
//! ```
//!
//! `Jump` statements are only recorded here; their connections are routed by
//! [`CompiledChart::resolve_jumps`] once every step has its final position.

use std::collections::HashMap;

use log::{debug, info, trace};

use grafcet_core::{
    diagram::GrafcetDiagram,
    element::{
        ActionBlock, Connection, ConnectionKind, Element, Gate, GateRole, Segment, Step,
        Transition,
    },
    geometry::{Point, Size},
};
use grafcet_parser::{
    DivergenceBlock, ParserInput, Span, Spanned, Statement, StepDecl, TransitionDecl,
    error::Diagnostic,
};

use crate::{config::LayoutConfig, error::CompileError, validate};

/// A jump waiting for its target step to be placed.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingJump {
    /// Id of the element the jump leaves from.
    pub source_id: String,
    /// Point the detour starts at, the bottom center of the source.
    pub source_point: Point,
    /// Number of the target step.
    pub target: u32,
    /// Span of the `Jump` statement.
    pub span: Span,
}

/// What a chain of elements continues from.
#[derive(Debug, Clone)]
struct Tail {
    id: String,
    /// Where the outgoing connection starts.
    exit: Point,
    is_gate: bool,
}

/// Horizontal extent of laid out content, relative to its lane center.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Extent {
    left: f32,
    right: f32,
}

impl Extent {
    fn symmetric(half_width: f32) -> Self {
        Self {
            left: half_width,
            right: half_width,
        }
    }

    fn union(self, other: Extent) -> Self {
        Self {
            left: self.left.max(other.left),
            right: self.right.max(other.right),
        }
    }
}

/// State of one compilation.
///
/// Created at the start of [`Compiler::compile`], filled by the layout walk
/// and handed to the jump resolver inside [`CompiledChart`].
#[derive(Debug)]
pub struct CompilationContext {
    config: LayoutConfig,
    title: String,
    elements: Vec<Element>,
    /// Bottom of the last placed element of the current chain.
    current_y: f32,
    transition_counter: usize,
    gate_counter: usize,
    connection_counter: usize,
    /// Step number to step id.
    step_index: HashMap<u32, String>,
    /// Element id to the span of the statement that declared it.
    spans: HashMap<String, Span>,
    pending_jumps: Vec<PendingJump>,
    warnings: Vec<Diagnostic>,
}

impl CompilationContext {
    fn new(config: LayoutConfig, title: String, warnings: Vec<Diagnostic>) -> Self {
        let current_y = config.origin().y();
        Self {
            config,
            title,
            elements: Vec::new(),
            current_y,
            transition_counter: 0,
            gate_counter: 0,
            connection_counter: 0,
            step_index: HashMap::new(),
            spans: HashMap::new(),
            pending_jumps: Vec::new(),
            warnings,
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Elements placed so far, in creation order.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn current_y(&self) -> f32 {
        self.current_y
    }

    pub fn pending_jumps(&self) -> &[PendingJump] {
        &self.pending_jumps
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    /// Id of the step with the given number.
    pub fn step_id(&self, number: u32) -> Option<&str> {
        self.step_index.get(&number).map(String::as_str)
    }

    /// Span of the statement that declared an element.
    pub fn span_of(&self, id: &str) -> Option<Span> {
        self.spans.get(id).copied()
    }

    pub(crate) fn into_parts(self) -> ContextParts {
        ContextParts {
            config: self.config,
            diagram: GrafcetDiagram::from_elements(self.title, self.elements),
            step_index: self.step_index,
            spans: self.spans,
            pending_jumps: self.pending_jumps,
            warnings: self.warnings,
        }
    }

    /// Vertical gap before the next element.
    fn gap(&self, tail: Option<&Tail>, next_is_gate: bool) -> f32 {
        match tail {
            None => 0.0,
            Some(tail) if tail.is_gate || next_is_gate => self.config.compressed_gap(),
            Some(_) => self.config.normal_gap(),
        }
    }

    fn next_connection_id(&mut self) -> String {
        let id = format!("connection-{}", self.connection_counter);
        self.connection_counter += 1;
        id
    }

    /// Connect `tail` to the element `target_id` entered at `entry`.
    fn connect(&mut self, tail: &Tail, target_id: &str, entry: Point) {
        let id = self.next_connection_id();
        let segments = route(tail.exit, entry);
        trace!(id, source = tail.id, target = target_id; "Connection routed");
        self.elements.push(Element::Connection(Connection::new(
            id,
            tail.id.clone(),
            target_id,
            ConnectionKind::Flow,
            segments,
        )));
    }

    /// Horizontal extent of a statement list laid out in one lane.
    fn sequence_extent(&self, statements: &[Spanned<Statement>]) -> Extent {
        statements
            .iter()
            .map(|statement| match statement.inner() {
                Statement::Step(step) => self.step_extent(step),
                Statement::Transition(_) => {
                    Extent::symmetric(self.config.transition_size().width() / 2.0)
                }
                Statement::Divergence(block) => self.block_extent(block),
                Statement::Jump(_) => Extent::default(),
            })
            .fold(Extent::default(), Extent::union)
    }

    fn step_extent(&self, step: &StepDecl) -> Extent {
        let half = self.config.step_size().width() / 2.0;
        let actions = if step.actions.is_empty() {
            0.0
        } else {
            self.config.action_gap()
                + step.actions.len() as f32 * self.config.action_size().width()
        };
        Extent {
            left: half,
            right: half + actions,
        }
    }

    fn block_extent(&self, block: &DivergenceBlock) -> Extent {
        let pad = self.config.step_size().width() / 2.0;
        let offsets = self.lane_offsets(block);
        let mut extent = Extent {
            left: pad,
            right: offsets.last().copied().unwrap_or_default() + pad,
        };
        for (branch, offset) in block.branches.iter().zip(&offsets) {
            let inner = self.sequence_extent(&branch.statements);
            extent = extent.union(Extent {
                left: inner.left - offset,
                right: offset + inner.right,
            });
        }
        extent
    }

    /// Offsets of the branch lanes from the parent lane.
    ///
    /// Lane `i` sits `i × branch_spacing` to the right of the parent lane,
    /// pushed further right only when the content of two neighbouring
    /// branches would otherwise come closer than the action gap.
    fn lane_offsets(&self, block: &DivergenceBlock) -> Vec<f32> {
        let spacing = self.config.branch_spacing();
        let gap = self.config.action_gap();
        let mut offsets: Vec<f32> = Vec::with_capacity(block.branches.len());
        let mut previous: Option<(f32, Extent)> = None;

        for branch in &block.branches {
            let extent = self.sequence_extent(&branch.statements);
            let offset = match previous {
                None => 0.0,
                Some((prev_offset, prev_extent)) => (prev_offset + spacing)
                    .max(prev_offset + prev_extent.right + gap + extent.left),
            };
            offsets.push(offset);
            previous = Some((offset, extent));
        }
        offsets
    }

    /// Lay out a statement list in the lane centered on `x`.
    ///
    /// Returns the element the chain ends with, `None` if it ends in a jump.
    fn layout_sequence(
        &mut self,
        statements: &[Spanned<Statement>],
        x: f32,
        mut tail: Option<Tail>,
    ) -> Option<Tail> {
        for statement in statements {
            let span = statement.span();
            tail = match statement.inner() {
                Statement::Step(step) => Some(self.place_step(step, span, x, tail.as_ref())),
                Statement::Transition(transition) => {
                    Some(self.place_transition(transition, span, x, tail.as_ref()))
                }
                Statement::Divergence(block) => {
                    Some(self.place_block(block, span, x, tail.as_ref()))
                }
                Statement::Jump(jump) => {
                    if let Some(source) = &tail {
                        debug!(source = source.id, target = *jump.target.inner(); "Jump registered");
                        self.pending_jumps.push(PendingJump {
                            source_id: source.id.clone(),
                            source_point: source.exit,
                            target: *jump.target.inner(),
                            span,
                        });
                    }
                    // Room for the detour leaving the source.
                    self.current_y += self.config.jump_margin();
                    None
                }
            };
        }
        tail
    }

    fn place_step(&mut self, decl: &StepDecl, span: Span, x: f32, tail: Option<&Tail>) -> Tail {
        let size = self.config.step_size();
        let top = self.current_y + self.gap(tail, false);
        let position = Point::new(x - size.width() / 2.0, top);
        let id = format!("step-{}", decl.number);

        let mut step = Step::new(id.clone(), decl.number, decl.step_type, position, size)
            .with_label(decl.label.clone())
            .with_linked_file(decl.linked_file.as_ref().map(|file| file.inner().clone()));

        if let Some(tail) = tail {
            self.connect(tail, &id, Point::new(x, top));
        }

        let action_size = self.config.action_size();
        let mut actions = Vec::with_capacity(decl.actions.len());
        for (index, action) in decl.actions.iter().enumerate() {
            let action_id = format!("action-{}-{index}", decl.number);
            let action_position = Point::new(
                position.x()
                    + size.width()
                    + self.config.action_gap()
                    + index as f32 * action_size.width(),
                top + (size.height() - action_size.height()) / 2.0,
            );
            step.push_action(action_id.clone());
            self.spans.insert(action_id.clone(), action.span());
            actions.push(Element::ActionBlock(
                ActionBlock::new(
                    action_id,
                    id.clone(),
                    action.variable.clone(),
                    action.qualifier,
                    action_position,
                    action_size,
                )
                .with_duration(action.duration.clone()),
            ));
        }

        trace!(id, x = position.x(), y = top, actions = actions.len(); "Step placed");
        self.step_index.insert(decl.number, id.clone());
        self.spans.insert(id.clone(), span);
        self.elements.push(Element::Step(step));
        self.elements.extend(actions);
        self.current_y = top + size.height();

        Tail {
            id,
            exit: Point::new(x, self.current_y),
            is_gate: false,
        }
    }

    fn place_transition(
        &mut self,
        decl: &TransitionDecl,
        span: Span,
        x: f32,
        tail: Option<&Tail>,
    ) -> Tail {
        let size = self.config.transition_size();
        let top = self.current_y + self.gap(tail, false);
        let index = self.transition_counter;
        self.transition_counter += 1;

        let id = format!("transition-{index}");
        let name = decl.name.clone().unwrap_or_else(|| format!("T{index}"));

        if let Some(tail) = tail {
            self.connect(tail, &id, Point::new(x, top));
        }

        trace!(id, name, y = top; "Transition placed");
        self.spans.insert(id.clone(), span);
        self.elements.push(Element::Transition(Transition::new(
            id.clone(),
            name,
            decl.condition.inner().clone(),
            Point::new(x - size.width() / 2.0, top),
            size,
        )));
        self.current_y = top + size.height();

        Tail {
            id,
            exit: Point::new(x, self.current_y),
            is_gate: false,
        }
    }

    /// Place a divergence gate, its branches and the matching convergence.
    fn place_block(
        &mut self,
        block: &DivergenceBlock,
        span: Span,
        x: f32,
        tail: Option<&Tail>,
    ) -> Tail {
        let index = self.gate_counter;
        self.gate_counter += 1;

        let pad = self.config.step_size().width() / 2.0;
        let gate_height = self.config.gate_height();
        let lanes: Vec<f32> = self
            .lane_offsets(block)
            .into_iter()
            .map(|offset| x + offset)
            .collect();
        let first = lanes.first().copied().unwrap_or(x);
        let last = lanes.last().copied().unwrap_or(x);
        let center = (first + last) / 2.0;
        let gate_size = Size::new(last - first + 2.0 * pad, gate_height);

        let divergence_id = format!("divergence-{index}");
        let top = self.current_y + self.gap(tail, true);
        if let Some(tail) = tail {
            self.connect(tail, &divergence_id, Point::new(center, top));
        }
        let branch_top = top + gate_height;
        self.spans.insert(divergence_id.clone(), span);
        self.elements.push(Element::Gate(Gate::new(
            divergence_id.clone(),
            block.kind,
            GateRole::Divergence,
            Point::new(first - pad, top),
            gate_size,
            lanes.iter().map(|&lane| Point::new(lane, branch_top)).collect(),
        )));
        debug!(id = divergence_id, kind:% = block.kind, branches = lanes.len(); "Divergence placed");

        let mut ends = Vec::with_capacity(lanes.len());
        let mut bottom = branch_top;
        for (branch, &lane) in block.branches.iter().zip(&lanes) {
            self.current_y = branch_top;
            let start = Tail {
                id: divergence_id.clone(),
                exit: Point::new(lane, branch_top),
                is_gate: true,
            };
            let end = self.layout_sequence(&branch.statements, lane, Some(start));
            bottom = bottom.max(self.current_y);
            ends.push((lane, end));
        }

        let convergence_id = format!("convergence-{index}");
        let convergence_top = bottom + self.config.compressed_gap();
        for (lane, end) in &ends {
            if let Some(end) = end {
                self.connect(end, &convergence_id, Point::new(*lane, convergence_top));
            }
        }
        self.spans.insert(convergence_id.clone(), span);
        self.elements.push(Element::Gate(Gate::new(
            convergence_id.clone(),
            block.kind,
            GateRole::Convergence,
            Point::new(first - pad, convergence_top),
            gate_size,
            lanes
                .iter()
                .map(|&lane| Point::new(lane, convergence_top))
                .collect(),
        )));
        self.current_y = convergence_top + gate_height;

        Tail {
            id: convergence_id,
            exit: Point::new(center, self.current_y),
            is_gate: true,
        }
    }
}

/// Pieces of a finished context, consumed by the jump resolver.
pub(crate) struct ContextParts {
    pub config: LayoutConfig,
    pub diagram: GrafcetDiagram,
    pub step_index: HashMap<u32, String>,
    pub spans: HashMap<String, Span>,
    pub pending_jumps: Vec<PendingJump>,
    pub warnings: Vec<Diagnostic>,
}

/// Route an orthogonal connection from `from` down to `to`.
///
/// A single vertical segment when both points share an x coordinate,
/// otherwise a vertical drop, a horizontal traverse halfway and a second
/// vertical drop.
pub fn route(from: Point, to: Point) -> Vec<Segment> {
    if from.x() == to.x() {
        return vec![Segment::vertical(from.x(), from.y(), to.y())];
    }
    let mid_y = (from.y() + to.y()) / 2.0;
    vec![
        Segment::vertical(from.x(), from.y(), mid_y),
        Segment::horizontal(mid_y, from.x(), to.x()),
        Segment::vertical(to.x(), mid_y, to.y()),
    ]
}

/// Compiles parsed charts with a fixed layout configuration.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    config: LayoutConfig,
    title: Option<String>,
}

impl Compiler {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            title: None,
        }
    }

    /// Use `title` instead of the title declared in the source.
    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    /// Validate and lay out a parsed chart.
    ///
    /// # Errors
    ///
    /// Returns a [`CompileError`] with every structural diagnostic when at
    /// least one of them is fatal. Nothing is laid out in that case.
    pub fn compile(&self, input: ParserInput) -> Result<CompiledChart, CompileError> {
        let diagnostics = validate::validate(&input);
        if diagnostics.iter().any(|d| d.severity().is_error()) {
            let (mut errors, warnings): (Vec<_>, Vec<_>) = diagnostics
                .into_iter()
                .partition(|d| d.severity().is_error());
            info!(errors = errors.len(); "Chart rejected by validation");
            errors.extend(warnings);
            return Err(CompileError::new(errors));
        }

        let title = self
            .title
            .clone()
            .or_else(|| input.title.map(Spanned::into_inner))
            .unwrap_or_default();

        let mut context = CompilationContext::new(self.config.clone(), title, diagnostics);
        context.layout_sequence(&input.statements, self.config.origin().x(), None);

        info!(
            elements = context.elements.len(),
            pending_jumps = context.pending_jumps.len(),
            warnings = context.warnings.len();
            "Chart laid out"
        );
        Ok(CompiledChart { context })
    }
}

/// A laid out chart whose jumps are not routed yet.
///
/// Call [`resolve_jumps`](CompiledChart::resolve_jumps) to obtain the
/// finished diagram.
#[derive(Debug)]
pub struct CompiledChart {
    pub(crate) context: CompilationContext,
}

impl CompiledChart {
    pub fn context(&self) -> &CompilationContext {
        &self.context
    }
}
