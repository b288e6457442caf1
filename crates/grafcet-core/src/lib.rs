//! Grafcet Core Types and Definitions
//!
//! This crate provides the data model shared by the Grafcet compiler and
//! simulator. It includes:
//!
//! - **Geometry**: Points, sizes and bounds for layout ([`geometry`] module)
//! - **Elements**: The closed set of chart element kinds ([`element::Element`])
//! - **Diagram**: The compiled chart document ([`diagram::GrafcetDiagram`])

pub mod diagram;
pub mod element;
pub mod geometry;
