//! Configuration types for chart compilation and simulation.
//!
//! All types implement [`serde::Deserialize`] with defaults for every field,
//! so a configuration file only needs to name the values it changes.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration combining layout and simulation settings.
//! - [`LayoutConfig`] - Element sizes and spacing used by the layout compiler.
//! - [`SimulationConfig`] - Limits applied by the scenario runner.
//!
//! # Example
//!
//! ```
//! # use grafcet::config::AppConfig;
//! let config = AppConfig::default();
//! assert_eq!(config.layout().step_size().width(), 40.0);
//! assert_eq!(config.simulation().max_scenarios(), Some(1000));
//! ```

use serde::Deserialize;

use grafcet_core::geometry::{Point, Size};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Layout configuration section.
    #[serde(default)]
    layout: LayoutConfig,

    /// Simulation configuration section.
    #[serde(default)]
    simulation: SimulationConfig,
}

impl AppConfig {
    /// Creates a new [`AppConfig`] from its sections.
    pub fn new(layout: LayoutConfig, simulation: SimulationConfig) -> Self {
        Self { layout, simulation }
    }

    /// Returns the layout configuration.
    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Returns the simulation configuration.
    pub fn simulation(&self) -> &SimulationConfig {
        &self.simulation
    }
}

/// Fixed sizes and spacing of the chart layout.
///
/// Every length is in layout units. The vertical gap between a step and a
/// transition is [`normal_gap`](Self::normal_gap) on a straight edge and
/// [`compressed_gap`](Self::compressed_gap) next to a divergence or
/// convergence gate.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    step_width: f32,
    step_height: f32,
    transition_width: f32,
    transition_height: f32,
    gate_height: f32,
    action_width: f32,
    action_height: f32,
    /// Horizontal distance between a step and its first action block.
    action_gap: f32,
    normal_gap: f32,
    compressed_gap: f32,
    /// Horizontal distance between two neighbouring branch lanes.
    branch_spacing: f32,
    origin_x: f32,
    origin_y: f32,
    /// Distance kept between a jump detour and the leftmost element.
    jump_margin: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            step_width: 40.0,
            step_height: 40.0,
            transition_width: 30.0,
            transition_height: 4.0,
            gate_height: 8.0,
            action_width: 100.0,
            action_height: 30.0,
            action_gap: 20.0,
            normal_gap: 40.0,
            compressed_gap: 20.0,
            branch_spacing: 160.0,
            origin_x: 200.0,
            origin_y: 50.0,
            jump_margin: 40.0,
        }
    }
}

impl LayoutConfig {
    pub fn step_size(&self) -> Size {
        Size::new(self.step_width, self.step_height)
    }

    pub fn transition_size(&self) -> Size {
        Size::new(self.transition_width, self.transition_height)
    }

    pub fn gate_height(&self) -> f32 {
        self.gate_height
    }

    pub fn action_size(&self) -> Size {
        Size::new(self.action_width, self.action_height)
    }

    pub fn action_gap(&self) -> f32 {
        self.action_gap
    }

    pub fn normal_gap(&self) -> f32 {
        self.normal_gap
    }

    pub fn compressed_gap(&self) -> f32 {
        self.compressed_gap
    }

    pub fn branch_spacing(&self) -> f32 {
        self.branch_spacing
    }

    /// Center of the first element of the chart: `x` is the main lane, `y`
    /// the top of the first element.
    pub fn origin(&self) -> Point {
        Point::new(self.origin_x, self.origin_y)
    }

    pub fn jump_margin(&self) -> f32 {
        self.jump_margin
    }

    /// Vertical distance a jump detour keeps from its source and target.
    pub fn jump_clearance(&self) -> f32 {
        self.compressed_gap / 2.0
    }

    /// Returns a copy with a different branch spacing.
    pub fn with_branch_spacing(mut self, branch_spacing: f32) -> Self {
        self.branch_spacing = branch_spacing;
        self
    }

    /// Returns a copy with a different jump margin.
    pub fn with_jump_margin(mut self, jump_margin: f32) -> Self {
        self.jump_margin = jump_margin;
        self
    }
}

/// Scenario runner limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Largest scenario list accepted in one run; `0` disables the bound.
    max_scenarios: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_scenarios: 1000,
        }
    }
}

impl SimulationConfig {
    pub fn new(max_scenarios: usize) -> Self {
        Self { max_scenarios }
    }

    /// The scenario bound, `None` when unbounded.
    pub fn max_scenarios(&self) -> Option<usize> {
        (self.max_scenarios > 0).then_some(self.max_scenarios)
    }
}
