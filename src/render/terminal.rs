use prettytable::{format, Cell, Row, Table};

use super::label;
use crate::aggregate::{Overview, PivotTable};

fn header(cells: &[&str]) -> Row {
    Row::new(cells.iter().map(|c| Cell::new(c).style_spec("bFg")).collect())
}

fn counts_table(title: &str, data: &[(String, usize)], total: usize) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.set_titles(header(&[title, "Count", "Share"]));
    for (name, n) in data {
        let share = if total == 0 {
            0.0
        } else {
            *n as f64 * 100.0 / total as f64
        };
        table.add_row(Row::new(vec![
            Cell::new(label(name)),
            Cell::new(&n.to_string()).style_spec("r"),
            Cell::new(&format!("{:.1}%", share)).style_spec("r"),
        ]));
    }
    table
}

fn pivot_table(p: &PivotTable) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    let corner = format!("{} \\ {}", p.row_field, p.col_field);
    let mut titles: Vec<&str> = vec![corner.as_str()];
    titles.extend(p.cols.iter().map(|c| label(c)));
    titles.push("Total");
    table.set_titles(header(&titles));

    for ((name, cells), total) in p.rows.iter().zip(&p.cells).zip(p.row_totals()) {
        let mut row = vec![Cell::new(label(name))];
        row.extend(cells.iter().map(|n| Cell::new(&n.to_string()).style_spec("r")));
        row.push(Cell::new(&total.to_string()).style_spec("br"));
        table.add_row(Row::new(row));
    }
    table
}

/// Render the overview as box-drawn tables.
pub fn format_overview(o: &Overview) -> String {
    let s = &o.summary;
    let mut metrics = Table::new();
    metrics.set_format(*format::consts::FORMAT_BOX_CHARS);
    metrics.set_titles(header(&["Metric", "Value"]));
    let date = |d: Option<chrono::NaiveDate>| {
        d.map(|d| d.to_string()).unwrap_or_else(|| "-".into())
    };
    for (k, v) in [
        ("Total Companies", s.total_companies.to_string()),
        ("Total Records", s.total_records.to_string()),
        ("Total Responsible", s.total_responsible.to_string()),
        ("Total Sources", s.total_sources.to_string()),
        ("First created", date(s.first_created)),
        ("Last created", date(s.last_created)),
    ] {
        metrics.add_row(Row::new(vec![Cell::new(k), Cell::new(&v).style_spec("r")]));
    }

    let mut out = String::new();
    out.push_str("\n--- Summary Statistics ---\n");
    out.push_str(&metrics.to_string());
    for (title, data) in [
        ("Stage", &o.stage),
        ("Responsible", &o.responsible),
        ("Source", &o.source),
    ] {
        out.push_str(&format!("\n--- {} Distribution ---\n", title));
        out.push_str(&counts_table(title, data, s.total_records).to_string());
    }
    out.push_str("\n--- Companies per Responsible ---\n");
    let companies: usize = o.companies_per_responsible.iter().map(|(_, n)| n).sum();
    out.push_str(&counts_table("Responsible", &o.companies_per_responsible, companies).to_string());
    out.push_str(&format!("\n--- Records Over Time (per {}) ---\n", o.granularity));
    let series: Vec<(String, usize)> = o
        .created_over_time
        .iter()
        .map(|(d, n)| (d.to_string(), *n))
        .collect();
    out.push_str(&counts_table("Date", &series, s.total_records).to_string());
    if !o.heatmap.is_empty() {
        out.push_str("\n--- Heat-map ---\n");
        out.push_str(&pivot_table(&o.heatmap).to_string());
    }
    out
}

pub fn print_summary(o: &Overview) {
    print!("{}", format_overview(o));
}
