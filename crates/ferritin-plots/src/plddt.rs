use crate::{document, label, Frame, PlotError, Result};
use ndarray::ArrayView1;
use svg::node::element::{Line, Polyline};
use svg::Document;

const WIDTH: f64 = 600.0;
const HEIGHT: f64 = 300.0;
const MARGIN: f64 = 40.0;

const LINE_COLORS: [&str; 5] = ["#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd"];

/// Per-residue pLDDT (0 to 100) of every model, with a vertical line at each
/// chain boundary.
pub fn plot_plddt(models: &[(&str, ArrayView1<f32>)], chain_lengths: &[usize]) -> Result<Document> {
    let num_res = models
        .iter()
        .map(|(_, plddt)| plddt.len())
        .max()
        .ok_or(PlotError::Empty("no models"))?;
    let frame = Frame {
        x: MARGIN,
        y: MARGIN,
        width: WIDTH - 2.0 * MARGIN,
        height: HEIGHT - 2.0 * MARGIN,
    };
    let x_max = num_res.saturating_sub(1).max(1) as f64;

    let mut doc = document(WIDTH, HEIGHT)
        .add(frame.outline())
        .add(label(WIDTH / 2.0, MARGIN * 0.6, "Predicted lDDT per position", 12))
        .add(label(WIDTH / 2.0, HEIGHT - MARGIN * 0.3, "Positions", 10));

    for (n, (name, plddt)) in models.iter().enumerate() {
        let points: Vec<String> = plddt
            .iter()
            .enumerate()
            .map(|(i, v)| {
                format!(
                    "{:.2},{:.2}",
                    frame.x_at(i as f64, x_max),
                    frame.y_at((*v as f64).clamp(0.0, 100.0), 100.0)
                )
            })
            .collect();
        let color = LINE_COLORS[n % LINE_COLORS.len()];
        doc = doc
            .add(
                Polyline::new()
                    .set("points", points.join(" "))
                    .set("fill", "none")
                    .set("stroke", color)
                    .set("stroke-width", 1.5),
            )
            .add(
                label(frame.x + frame.width - 40.0, frame.y + 15.0 * (n + 1) as f64, name, 10)
                    .set("fill", color),
            );
    }

    let mut boundary = 0;
    for len in chain_lengths.iter().take(chain_lengths.len().saturating_sub(1)) {
        boundary += len;
        let x = frame.x_at(boundary as f64, x_max);
        doc = doc.add(
            Line::new()
                .set("x1", x)
                .set("x2", x)
                .set("y1", frame.y_at(0.0, 100.0))
                .set("y2", frame.y_at(100.0, 100.0))
                .set("stroke", "black")
                .set("class", "chain-boundary"),
        );
    }
    Ok(doc)
}
