use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use crmdash::{
    aggregate,
    config::Settings,
    export::{csv_bytes, export_to_path, ExportFormat},
    filter::{Filter, Selection},
    load::{self, LoadOptions},
    record::{Dataset, Field},
    render::{encode_query, print_summary, render_page, PageContext},
    schema::{ColumnMap, SchemaError},
    server::{self, AppState, Source},
};
use prettytable::{format, row, Table};
use std::{
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    process::ExitCode,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Dashboard over a CRM company export: filters, charts and CSV export"
)]
struct Cli {
    /// YAML settings file (defaults to ./crmdash.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Worksheet to read (first sheet when omitted)
    #[arg(long, global = true)]
    sheet: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show how the input headers map onto the expected columns
    Columns {
        #[arg(required = true)]
        inputs: Vec<String>,
    },
    /// Print metrics and distributions of the filtered rows
    Summary {
        #[arg(required = true)]
        inputs: Vec<String>,
        #[command(flatten)]
        filter: FilterArgs,
        /// Emit JSON instead of tables
        #[arg(long)]
        json: bool,
    },
    /// Write the filtered rows to a file
    Export {
        #[arg(required = true)]
        inputs: Vec<String>,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(short, long)]
        output: PathBuf,
        /// csv or parquet; guessed from the output extension when omitted
        #[arg(long)]
        format: Option<ExportFormat>,
    },
    /// Write a static dashboard page plus the filtered CSV into a directory
    Report {
        #[arg(required = true)]
        inputs: Vec<String>,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(short, long, default_value = "./report")]
        output: PathBuf,
    },
    /// Serve the interactive dashboard over HTTP
    Serve {
        #[arg(required = true)]
        inputs: Vec<String>,
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Keep only these stages (repeatable)
    #[arg(long)]
    stage: Vec<String>,
    /// Keep only these responsibles (repeatable)
    #[arg(long)]
    responsible: Vec<String>,
    /// Keep only these sources (repeatable)
    #[arg(long)]
    source: Vec<String>,
    /// Earliest creation date, inclusive (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Latest creation date, inclusive (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
}

impl FilterArgs {
    fn to_filter(&self) -> Filter {
        let selection = |values: &[String]| {
            if values.is_empty() {
                Selection::All
            } else {
                Selection::only(values.iter().cloned())
            }
        };
        Filter {
            stages: selection(&self.stage),
            responsibles: selection(&self.responsible),
            sources: selection(&self.source),
            created_from: self.from,
            created_to: self.to,
        }
    }
}

fn main() -> ExitCode {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(schema) = e.downcast_ref::<SchemaError>() {
                eprintln!("error: {:#}", e);
                for name in schema.missing() {
                    eprintln!("  - {}", name);
                }
            } else {
                error!("{:#}", e);
                eprintln!("error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if cli.sheet.is_some() {
        settings.sheet = cli.sheet;
    }
    let opts = settings.load_options();

    match cli.command {
        Command::Columns { inputs } => show_columns(&inputs, &opts),
        Command::Summary {
            inputs,
            filter,
            json,
        } => {
            let ds = load::load_inputs(&inputs, &opts)?;
            let filter = filter.to_filter();
            let rows = filter.apply(&ds);
            let overview = aggregate::overview(
                &rows,
                settings.trend_granularity,
                settings.heatmap.rows,
                settings.heatmap.columns,
            )?;
            if json {
                let out = serde_json::json!({ "filter": filter, "overview": overview });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                print_summary(&overview);
            }
            Ok(())
        }
        Command::Export {
            inputs,
            filter,
            output,
            format,
        } => {
            let ds = load::load_inputs(&inputs, &opts)?;
            let rows = filter.to_filter().apply(&ds);
            let format = format.unwrap_or_else(|| ExportFormat::from_path(&output));
            let n = export_to_path(
                &output,
                format,
                settings.csv_delimiter as u8,
                &ds.extra_headers,
                &rows,
            )?;
            info!(rows = n, path = %output.display(), ?format, "export written");
            Ok(())
        }
        Command::Report {
            inputs,
            filter,
            output,
        } => {
            let ds = load::load_inputs(&inputs, &opts)?;
            write_report(&ds, &filter.to_filter(), &settings, &output)
        }
        Command::Serve { inputs, bind } => {
            if let Some(bind) = bind {
                settings.bind = bind;
            }
            let source = match load::load_inputs(&inputs, &opts) {
                Ok(ds) => Source::Ready(ds),
                Err(e) => match e.downcast::<SchemaError>() {
                    Ok(schema) => {
                        error!("{}", schema);
                        Source::Invalid(schema)
                    }
                    Err(e) => return Err(e),
                },
            };
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("building tokio runtime")?
                .block_on(server::serve(AppState { source, settings }))
        }
    }
}

fn show_columns(inputs: &[String], opts: &LoadOptions) -> Result<()> {
    let mut missing = Vec::new();
    for path in load::expand_patterns(inputs)? {
        let table = load::load_path(&path, opts)?;
        println!("{}", path.display());
        match ColumnMap::resolve(&table.headers, &opts.aliases) {
            Ok(map) => {
                let mut out = Table::new();
                out.set_format(*format::consts::FORMAT_BOX_CHARS);
                out.set_titles(row![b => "Column", "Found as", "Position"]);
                for field in Field::ALL {
                    let found = map.matched_headers.get(&field).map_or("", String::as_str);
                    out.add_row(row![field.canonical_name(), found, map.index(field)]);
                }
                for (i, name) in &map.extras {
                    out.add_row(row!["(extra)", name, i]);
                }
                out.printstd();
            }
            Err(e) => {
                println!("  {}", e);
                missing.push((path, e));
            }
        }
    }
    match missing.into_iter().next() {
        Some((path, e)) => Err(e).with_context(|| format!("in {}", path.display())),
        None => Ok(()),
    }
}

fn write_report(ds: &Dataset, filter: &Filter, settings: &Settings, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let rows = filter.apply(ds);

    let csv_path = dir.join("filtered.csv");
    let delimiter = settings.csv_delimiter as u8;
    fs::write(&csv_path, csv_bytes(delimiter, &ds.extra_headers, &rows)?)
        .with_context(|| format!("writing {}", csv_path.display()))?;

    let html = render_page(&PageContext {
        title: &settings.title,
        dataset: ds,
        filter,
        rows: &rows,
        table_rows: settings.table_rows,
        granularity: settings.trend_granularity,
        heatmap: &settings.heatmap,
        form_action: None,
        export_href: Some("filtered.csv".to_string()),
    })?;
    let page_path = dir.join("index.html");
    fs::write(&page_path, html).with_context(|| format!("writing {}", page_path.display()))?;

    info!(
        rows = rows.len(),
        filter = %encode_query(&filter.to_query()),
        dir = %dir.display(),
        "report written"
    );
    Ok(())
}
