use anyhow::Result;
use chrono::NaiveDate;

use super::{encode_query, escape, label, svg};
use crate::aggregate::{self, Granularity, Summary};
use crate::config::HeatmapAxes;
use crate::export::csv_export::export_headers;
use crate::filter::Filter;
use crate::load::date_parser::format_timestamp;
use crate::record::{DateField, Dataset, Field, Record};
use crate::schema::SchemaError;

const STYLE: &str = r#"
body{font-family:system-ui,-apple-system,Segoe UI,Roboto,sans-serif;margin:0;color:#222;display:flex}
aside{width:260px;min-height:100vh;background:#f0f2f6;padding:16px;box-sizing:border-box}
aside fieldset{border:none;margin:0 0 14px;padding:0;max-height:220px;overflow:auto}
aside legend{font-weight:600;margin-bottom:4px}
aside label{display:block;font-size:14px}
main{flex:1;padding:16px 32px;min-width:0}
.cards{display:flex;gap:16px;margin:12px 0}
.card{background:#fff;border:1px solid #e6e6e6;border-radius:8px;padding:12px 18px;min-width:150px}
.card .v{font-size:28px;font-weight:600}
.card .k{font-size:13px;color:#555}
.grid{display:flex;flex-wrap:wrap;gap:24px}
.empty{color:#888;padding:24px}
.table-wrap{overflow:auto;max-height:480px;border:1px solid #e6e6e6}
table{border-collapse:collapse;font-size:13px}
th,td{padding:4px 8px;border-bottom:1px solid #eee;text-align:left;white-space:nowrap}
th{position:sticky;top:0;background:#fafafa}
.note{color:#666;font-size:13px}
.error{background:#fdecea;border:1px solid #f5c2c0;padding:16px;border-radius:8px}
"#;

/// Everything one page render needs.
pub struct PageContext<'a> {
    pub title: &'a str,
    pub dataset: &'a Dataset,
    pub filter: &'a Filter,
    /// Rows passing `filter`, in input order.
    pub rows: &'a [&'a Record],
    pub table_rows: usize,
    pub granularity: Granularity,
    pub heatmap: &'a HeatmapAxes,
    /// Where the filter form submits; `None` renders it read-only.
    pub form_action: Option<&'a str>,
    /// Link for the CSV download of the current rows.
    pub export_href: Option<String>,
}

pub fn render_page(ctx: &PageContext<'_>) -> Result<String> {
    let overview = aggregate::overview(
        ctx.rows,
        ctx.granularity,
        ctx.heatmap.rows,
        ctx.heatmap.columns,
    )?;

    let mut body = String::new();
    body.push_str(&sidebar(ctx));
    body.push_str("<main>");
    body.push_str(&format!("<h1>📊 {}</h1>", escape(ctx.title)));
    body.push_str(
        "<p><strong>Analysis of Stage, Responsible, Source, Dates, and Company Names</strong></p>",
    );
    body.push_str(&cards(&overview.summary));
    if let Some(href) = &ctx.export_href {
        body.push_str(&format!(
            r#"<p><a class="download" href="{}" download="filtered.csv">⬇ Download filtered data (CSV)</a></p>"#,
            escape(href)
        ));
    }

    body.push_str(r#"<h2>Distributions</h2><div class="grid">"#);
    for (field, counts) in [
        (Field::Stage, &overview.stage),
        (Field::Responsible, &overview.responsible),
        (Field::Source, &overview.source),
    ] {
        body.push_str(&section(
            &format!("{} Distribution", field),
            &svg::pie(counts)?,
        ));
    }
    body.push_str("</div>");

    body.push_str(&section(
        "Records Over Time",
        &svg::line(&overview.created_over_time)?,
    ));
    body.push_str(&section(
        "Companies per Responsible",
        &svg::bar(&overview.companies_per_responsible)?,
    ));
    body.push_str(&section(
        &format!("{} × {}", ctx.heatmap.rows, ctx.heatmap.columns),
        &svg::heatmap(&overview.heatmap)?,
    ));

    body.push_str("<h2>Filtered Data</h2>");
    body.push_str(&data_table(ctx));
    body.push_str("</main>");

    Ok(page(ctx.title, &body))
}

/// Page shown in place of the dashboard when the input is unusable.
pub fn render_error_page(title: &str, err: &SchemaError) -> String {
    let items: String = err
        .missing()
        .iter()
        .map(|name| format!("<li><code>{}</code></li>", escape(name)))
        .collect();
    let body = format!(
        r#"<main><h1>{}</h1><div class="error"><p><strong>The data file is missing expected columns:</strong></p><ul>{}</ul><p class="note">Column names are matched ignoring case, extra spaces and invisible characters.</p></div></main>"#,
        escape(title),
        items
    );
    page(title, &body)
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\"><title>{}</title><style>{}</style></head><body>{}</body></html>",
        escape(title),
        STYLE,
        body
    )
}

fn section(title: &str, content: &str) -> String {
    format!(
        "<section><h3>{}</h3>{}</section>",
        escape(title),
        content
    )
}

fn cards(s: &Summary) -> String {
    let card = |k: &str, v: usize| {
        format!(
            r#"<div class="card"><div class="k">{}</div><div class="v">{}</div></div>"#,
            k, v
        )
    };
    let mut out = String::from(r#"<div class="cards">"#);
    out.push_str(&card("Total Companies", s.total_companies));
    out.push_str(&card("Total Records", s.total_records));
    out.push_str(&card("Total Responsible", s.total_responsible));
    out.push_str(&card("Total Sources", s.total_sources));
    out.push_str("</div>");
    out
}

fn sidebar(ctx: &PageContext<'_>) -> String {
    let disabled = if ctx.form_action.is_some() { "" } else { " disabled" };
    let mut out = format!(
        r#"<aside><h2>Filters</h2><form method="get" action="{}">"#,
        escape(ctx.form_action.unwrap_or(""))
    );

    for (field, key) in [
        (Field::Stage, "stage"),
        (Field::Responsible, "responsible"),
        (Field::Source, "source"),
    ] {
        let selection = ctx.filter.selection(field);
        out.push_str(&format!(
            r#"<fieldset><legend>Select {}</legend><input type="hidden" name="present" value="{}">"#,
            field, key
        ));
        for value in ctx.dataset.distinct(field) {
            let checked = selection.map_or(true, |s| s.contains(&value));
            out.push_str(&format!(
                r#"<label><input type="checkbox" name="{}" value="{}"{}{}> {}</label>"#,
                key,
                escape(&value),
                if checked { " checked" } else { "" },
                disabled,
                escape(label(&value))
            ));
        }
        out.push_str("</fieldset>");
    }

    let bounds = ctx.dataset.date_bounds(DateField::Created);
    let date_input = |name: &str, caption: &str, value: Option<NaiveDate>| {
        let attr = |d: Option<NaiveDate>| {
            d.map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        };
        format!(
            r#"<label>{} <input type="date" name="{}" value="{}" min="{}" max="{}"{}></label>"#,
            caption,
            name,
            attr(value),
            attr(bounds.map(|b| b.0)),
            attr(bounds.map(|b| b.1)),
            disabled
        )
    };
    out.push_str("<fieldset><legend>Date of creation</legend>");
    out.push_str(&date_input("from", "From", ctx.filter.created_from));
    out.push_str(&date_input("to", "To", ctx.filter.created_to));
    out.push_str("</fieldset>");

    if ctx.form_action.is_some() {
        out.push_str(r#"<button type="submit">Apply</button> "#);
        out.push_str(&format!(
            r#"<a href="{}">Reset</a>"#,
            escape(ctx.form_action.unwrap_or(""))
        ));
    } else if !ctx.filter.to_query().is_empty() {
        out.push_str(&format!(
            r#"<p class="note">Filter: <code>{}</code></p>"#,
            escape(&encode_query(&ctx.filter.to_query()))
        ));
    }
    out.push_str("</form></aside>");
    out
}

fn data_table(ctx: &PageContext<'_>) -> String {
    let mut out = String::from(r#"<div class="table-wrap"><table><thead><tr>"#);
    for h in export_headers(&ctx.dataset.extra_headers) {
        out.push_str(&format!("<th>{}</th>", escape(&h)));
    }
    out.push_str("</tr></thead><tbody>");

    let fmt_date = |d: &Option<chrono::NaiveDateTime>| {
        d.as_ref().map(format_timestamp).unwrap_or_default()
    };
    for r in ctx.rows.iter().take(ctx.table_rows) {
        out.push_str("<tr>");
        let cells = [
            r.stage.clone(),
            r.source.clone(),
            r.responsible.clone(),
            r.company_name.clone(),
            fmt_date(&r.created),
            fmt_date(&r.modified),
        ];
        for c in cells.iter().chain(r.extra.iter()) {
            out.push_str(&format!("<td>{}</td>", escape(c)));
        }
        out.push_str("</tr>");
    }
    out.push_str("</tbody></table></div>");

    if ctx.rows.len() > ctx.table_rows {
        out.push_str(&format!(
            r#"<p class="note">Showing {} of {} rows; download the CSV for the rest.</p>"#,
            ctx.table_rows,
            ctx.rows.len()
        ));
    } else {
        out.push_str(&format!(r#"<p class="note">{} rows</p>"#, ctx.rows.len()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Selection;

    fn dataset() -> Dataset {
        let rec = |stage: &str, resp: &str, company: &str| Record {
            stage: stage.into(),
            source: "Web".into(),
            responsible: resp.into(),
            company_name: company.into(),
            created: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(9, 0, 0),
            ..Default::default()
        };
        Dataset {
            records: vec![
                rec("New", "Ann", "Acme"),
                rec("Won", "Bob", "<script>"),
                rec("New", "Bob", "Gamma"),
            ],
            ..Default::default()
        }
    }

    fn render(ds: &Dataset, filter: &Filter, table_rows: usize, action: Option<&str>) -> String {
        let rows = filter.apply(ds);
        let axes = HeatmapAxes::default();
        render_page(&PageContext {
            title: "Company Data Dashboard",
            dataset: ds,
            filter,
            rows: &rows,
            table_rows,
            granularity: Granularity::Day,
            heatmap: &axes,
            form_action: action,
            export_href: Some(format!("/export.csv?{}", encode_query(&filter.to_query()))),
        })
        .unwrap()
    }

    #[test]
    fn page_has_every_section() {
        let ds = dataset();
        let html = render(&ds, &Filter::default(), 100, Some("/"));
        for needle in [
            "Total Companies",
            "Stage Distribution",
            "Responsible Distribution",
            "Source Distribution",
            "Records Over Time",
            "Companies per Responsible",
            "Responsible × Stage",
            "Filtered Data",
            "/export.csv",
        ] {
            assert!(html.contains(needle), "missing {}", needle);
        }
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn checkboxes_reflect_selection() {
        let ds = dataset();
        let filter = Filter {
            stages: Selection::only(["Won"]),
            ..Default::default()
        };
        let html = render(&ds, &filter, 100, Some("/"));
        assert!(html.contains(r#"name="stage" value="Won" checked>"#));
        assert!(html.contains(r#"name="stage" value="New">"#));
        assert!(html.contains("stage=Won"));
    }

    #[test]
    fn table_is_capped() {
        let ds = dataset();
        let html = render(&ds, &Filter::default(), 2, None);
        assert!(html.contains("Showing 2 of 3 rows"));
        assert!(html.contains(" disabled"));
    }

    #[test]
    fn error_page_lists_missing_columns() {
        let err = SchemaError::MissingColumns(vec!["Stage".into(), "Source".into()]);
        let html = render_error_page("Company Data Dashboard", &err);
        assert!(html.contains("<code>Stage</code>"));
        assert!(html.contains("<code>Source</code>"));
    }
}
