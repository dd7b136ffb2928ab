//! ferritin-plots
//!
//! SVG renderings of structure-prediction diagnostics:
//!
//! * [`plot_predicted_alignment_error`]: PAE heat map per model
//! * [`plot_plddt`]: per-residue confidence with chain boundaries
//! * [`plot_msa_coverage`]: MSA rows coloured by identity to the query
//!
//! Every function returns an [`svg::Document`]; write it with [`save`].
pub mod colormap;
mod coverage;
mod pae;
mod plddt;

pub use coverage::plot_msa_coverage;
pub use pae::plot_predicted_alignment_error;
pub use plddt::plot_plddt;

use std::path::Path;
use svg::node::element::{Rectangle, Text};
use svg::Document;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlotError>;

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("nothing to plot: {0}")]
    Empty(&'static str),

    #[error("{name} must be square, got {rows}x{cols}")]
    NotSquare {
        name: String,
        rows: usize,
        cols: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub fn save<P: AsRef<Path>>(path: P, document: &Document) -> Result<()> {
    svg::save(path, document)?;
    Ok(())
}

/// Plot area inside a panel, in document coordinates.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Frame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Frame {
    pub fn outline(&self) -> Rectangle {
        Rectangle::new()
            .set("x", self.x)
            .set("y", self.y)
            .set("width", self.width)
            .set("height", self.height)
            .set("fill", "none")
            .set("stroke", "black")
            .set("stroke-width", 1)
    }

    /// Document x for a data value in `[0, max]`.
    pub fn x_at(&self, value: f64, max: f64) -> f64 {
        if max <= 0.0 {
            return self.x;
        }
        self.x + self.width * value / max
    }

    /// Document y for a data value in `[0, max]`, origin at the bottom.
    pub fn y_at(&self, value: f64, max: f64) -> f64 {
        if max <= 0.0 {
            return self.y + self.height;
        }
        self.y + self.height * (1.0 - value / max)
    }
}

pub(crate) fn label(x: f64, y: f64, content: &str, size: u32) -> Text {
    Text::new(content)
        .set("x", x)
        .set("y", y)
        .set("font-family", "sans-serif")
        .set("font-size", size)
        .set("text-anchor", "middle")
}

pub(crate) fn document(width: f64, height: f64) -> Document {
    Document::new()
        .set("width", width)
        .set("height", height)
        .set("viewBox", (0.0, 0.0, width, height))
        .add(
            Rectangle::new()
                .set("width", width)
                .set("height", height)
                .set("fill", "white"),
        )
}
