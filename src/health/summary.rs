//! Text table of a cluster view, logged whenever the view changes

use super::readiness;
use super::state::ClusterView;

/// Render one row per known address: label, verdict, region, column index, then the vector
pub fn render_table(view: &ClusterView) -> String {
    let width = view.columns().len();
    let mut rows: Vec<Vec<String>> = Vec::with_capacity(width + 1);

    let mut header = vec![
        "ip/host".to_string(),
        "ready".to_string(),
        "dc".to_string(),
        "id".to_string(),
    ];
    header.extend((0..width).map(|i| i.to_string()));
    rows.push(header);

    for (index, column) in view.columns().iter().enumerate() {
        let mut row = vec![
            column.label().to_string(),
            readiness::is_ready(view, &column.address).to_string(),
            column.region.clone().unwrap_or_default(),
            index.to_string(),
        ];
        match view.vector(&column.address) {
            Some(vector) => row.extend(vector.iter().map(ToString::to_string)),
            None => row.extend(std::iter::repeat(String::new()).take(width)),
        }
        rows.push(row);
    }

    let cells = rows.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..cells)
        .map(|i| {
            rows.iter()
                .filter_map(|row| row.get(i))
                .map(String::len)
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    for (i, row) in rows.iter().enumerate() {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<w$}", cell, w = *w))
            .collect();
        out.push_str("| ");
        out.push_str(&line.join(" | "));
        out.push_str(" |\n");
        if i == 0 {
            let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
            out.push_str("|-");
            out.push_str(&rule.join("-|-"));
            out.push_str("-|\n");
        }
    }
    out
}
