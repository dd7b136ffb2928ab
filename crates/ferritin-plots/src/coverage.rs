use crate::colormap::rainbow_r;
use crate::{document, label, Frame, PlotError, Result};
use ferritin_core::MSA_GAP_IDX;
use ndarray::ArrayView2;
use svg::node::element::{Group, Polyline, Rectangle};
use svg::Document;

const WIDTH: f64 = 600.0;
const HEIGHT: f64 = 400.0;
const MARGIN: f64 = 40.0;

/// Fraction of columns identical to the first row, per row.
fn identity_to_query(msa: &ArrayView2<i64>) -> Vec<f64> {
    let query = msa.row(0);
    let num_res = msa.ncols().max(1) as f64;
    msa.rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .zip(query.iter())
                .filter(|(a, b)| a == b)
                .count() as f64
                / num_res
        })
        .collect()
}

/// Sequence coverage of an MSA given as residue ids with [`MSA_GAP_IDX`] for gaps.
///
/// Rows are sorted by identity to the query (most similar on top) and their
/// non-gap spans coloured by that identity; the black line counts non-gap
/// rows per column.
pub fn plot_msa_coverage(msa: ArrayView2<i64>) -> Result<Document> {
    let (num_seq, num_res) = msa.dim();
    if num_seq == 0 || num_res == 0 {
        return Err(PlotError::Empty("empty MSA"));
    }
    let frame = Frame {
        x: MARGIN,
        y: MARGIN,
        width: WIDTH - 2.0 * MARGIN,
        height: HEIGHT - 2.0 * MARGIN,
    };
    let seqid = identity_to_query(&msa);
    let mut order: Vec<usize> = (0..num_seq).collect();
    order.sort_by(|&a, &b| seqid[a].total_cmp(&seqid[b]));

    let row_height = frame.height / num_seq as f64;
    let col_width = frame.width / num_res as f64;
    let mut rows = Group::new().set("class", "coverage");
    for (rank, &row_idx) in order.iter().enumerate() {
        let color = rainbow_r(seqid[row_idx]).to_css();
        let y = frame.y_at((rank + 1) as f64, num_seq as f64);
        let row = msa.row(row_idx);
        let mut col = 0;
        while col < num_res {
            if row[col] == MSA_GAP_IDX {
                col += 1;
                continue;
            }
            let start = col;
            while col < num_res && row[col] != MSA_GAP_IDX {
                col += 1;
            }
            rows = rows.add(
                Rectangle::new()
                    .set("x", frame.x + start as f64 * col_width)
                    .set("y", y)
                    .set("width", (col - start) as f64 * col_width)
                    .set("height", row_height)
                    .set("fill", color.as_str()),
            );
        }
    }

    let points: Vec<String> = msa
        .columns()
        .into_iter()
        .enumerate()
        .map(|(j, column)| {
            let covered = column.iter().filter(|&&aa| aa != MSA_GAP_IDX).count();
            format!(
                "{:.2},{:.2}",
                frame.x + (j as f64 + 0.5) * col_width,
                frame.y_at(covered as f64, num_seq as f64)
            )
        })
        .collect();

    Ok(document(WIDTH, HEIGHT)
        .add(rows)
        .add(
            Polyline::new()
                .set("points", points.join(" "))
                .set("fill", "none")
                .set("stroke", "black")
                .set("stroke-width", 1.5),
        )
        .add(frame.outline())
        .add(label(WIDTH / 2.0, MARGIN * 0.6, "Sequence coverage", 12))
        .add(label(WIDTH / 2.0, HEIGHT - MARGIN * 0.3, "Positions", 10)))
}
