use crate::colormap::{bwr, normalize};
use crate::{document, label, Frame, PlotError, Result};
use ndarray::ArrayView2;
use svg::node::element::{Group, Rectangle};
use svg::Document;

const PANEL: f64 = 300.0;
const MARGIN: f64 = 30.0;
const PAE_MAX: f64 = 30.0;

/// One heat-map panel per model, coloured `bwr` over 0 to 30 Å.
pub fn plot_predicted_alignment_error(models: &[(&str, ArrayView2<f32>)]) -> Result<Document> {
    if models.is_empty() {
        return Err(PlotError::Empty("no models"));
    }
    let width = models.len() as f64 * (PANEL + MARGIN) + MARGIN;
    let height = PANEL + 2.0 * MARGIN;
    let mut doc = document(width, height);

    for (n, (name, pae)) in models.iter().enumerate() {
        let (rows, cols) = pae.dim();
        if rows != cols {
            return Err(PlotError::NotSquare {
                name: name.to_string(),
                rows,
                cols,
            });
        }
        let frame = Frame {
            x: MARGIN + n as f64 * (PANEL + MARGIN),
            y: MARGIN,
            width: PANEL,
            height: PANEL,
        };
        let cell = if rows == 0 { 0.0 } else { PANEL / rows as f64 };
        let mut cells = Group::new().set("class", "pae");
        for ((i, j), value) in pae.indexed_iter() {
            cells = cells.add(
                Rectangle::new()
                    .set("x", frame.x + j as f64 * cell)
                    .set("y", frame.y + i as f64 * cell)
                    .set("width", cell)
                    .set("height", cell)
                    .set("fill", bwr(normalize(*value as f64, 0.0, PAE_MAX)).to_css()),
            );
        }
        doc = doc
            .add(cells)
            .add(frame.outline())
            .add(label(frame.x + PANEL / 2.0, MARGIN * 0.6, name, 12));
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_pae_cells() {
        let pae = array![[0.0f32, 30.0], [15.0, 0.0]];
        let doc = plot_predicted_alignment_error(&[("model_1", pae.view())]).unwrap();
        let svg = doc.to_string();
        assert_eq!(svg.matches("class=\"pae\"").count(), 1);
        assert!(svg.contains("rgb(255,0,0)"));
        assert!(svg.contains("rgb(255,255,255)"));
        assert!(svg.contains("model_1"));
    }

    #[test]
    fn test_pae_rejects_non_square() {
        let pae = ndarray::Array2::<f32>::zeros((2, 3));
        assert!(matches!(
            plot_predicted_alignment_error(&[("m", pae.view())]),
            Err(PlotError::NotSquare { rows: 2, cols: 3, .. })
        ));
        assert!(plot_predicted_alignment_error(&[]).is_err());
    }
}
