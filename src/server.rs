use anyhow::Result;
use std::{convert::Infallible, sync::Arc, time::Instant};
use tracing::{error, info};
use warp::{
    http::{header, Response, StatusCode},
    reply::Reply,
    Filter as _,
};

use crate::aggregate;
use crate::config::Settings;
use crate::export::csv_bytes;
use crate::filter::Filter;
use crate::record::Dataset;
use crate::render::{encode_query, render_error_page, render_page, PageContext};
use crate::schema::SchemaError;

/// What the server renders: the dataset, or the reason there is none.
#[derive(Debug)]
pub enum Source {
    Ready(Dataset),
    Invalid(SchemaError),
}

#[derive(Debug)]
pub struct AppState {
    pub source: Source,
    pub settings: Settings,
}

type Query = Vec<(String, String)>;

fn with_state(
    state: Arc<AppState>,
) -> impl warp::Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// All routes, separated from `serve` so tests can drive them.
pub fn routes(
    state: Arc<AppState>,
) -> impl warp::Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| {
            warp::reply::json(&serde_json::json!({
                "status": "healthy",
                "service": "crmdash"
            }))
        });

    let dashboard = warp::path::end()
        .and(warp::get())
        .and(warp::query::<Query>())
        .and(with_state(state.clone()))
        .map(dashboard_page);

    let export = warp::path("export.csv")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<Query>())
        .and(with_state(state.clone()))
        .map(export_csv);

    let api = warp::path!("api" / "summary")
        .and(warp::get())
        .and(warp::query::<Query>())
        .and(with_state(state))
        .map(summary_json);

    health
        .or(dashboard)
        .or(export)
        .or(api)
        .with(warp::log::custom(|info| {
            info!(
                method = %info.method(),
                path = info.path(),
                status = info.status().as_u16(),
                elapsed = ?info.elapsed(),
                "request"
            );
        }))
}

fn schema_error_reply(state: &AppState, err: &SchemaError) -> Response<String> {
    Response::builder()
        .status(StatusCode::UNPROCESSABLE_ENTITY)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(render_error_page(&state.settings.title, err))
        .unwrap_or_else(|_| Response::new(err.to_string()))
}

fn dashboard_page(query: Query, state: Arc<AppState>) -> Response<String> {
    let start = Instant::now();
    let ds = match &state.source {
        Source::Ready(ds) => ds,
        Source::Invalid(err) => return schema_error_reply(&state, err),
    };
    let filter = Filter::from_query(&query);
    let rows = filter.apply(ds);
    let export_query = encode_query(&filter.to_query());
    let page = render_page(&PageContext {
        title: &state.settings.title,
        dataset: ds,
        filter: &filter,
        rows: &rows,
        table_rows: state.settings.table_rows,
        granularity: state.settings.trend_granularity,
        heatmap: &state.settings.heatmap,
        form_action: Some("/"),
        export_href: Some(if export_query.is_empty() {
            "/export.csv".to_string()
        } else {
            format!("/export.csv?{}", export_query)
        }),
    });
    let html = match page {
        Ok(html) => html,
        Err(e) => {
            error!("rendering dashboard failed: {:#}", e);
            let mut resp = Response::new("dashboard rendering failed".to_string());
            *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            return resp;
        }
    };
    info!(rows = rows.len(), elapsed = ?start.elapsed(), "rendered dashboard");

    Response::builder()
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(html)
        .unwrap_or_else(|e| {
            error!("building response failed: {}", e);
            Response::new(String::new())
        })
}

fn export_csv(query: Query, state: Arc<AppState>) -> Response<Vec<u8>> {
    let ds = match &state.source {
        Source::Ready(ds) => ds,
        Source::Invalid(err) => {
            let mut resp = Response::new(err.to_string().into_bytes());
            *resp.status_mut() = StatusCode::UNPROCESSABLE_ENTITY;
            return resp;
        }
    };
    let filter = Filter::from_query(&query);
    let rows = filter.apply(ds);
    let delimiter = state.settings.csv_delimiter as u8;
    let built = csv_bytes(delimiter, &ds.extra_headers, &rows).and_then(|body| {
        Response::builder()
            .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
            .header(
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"filtered.csv\"",
            )
            .body(body)
            .map_err(Into::into)
    });
    match built {
        Ok(resp) => {
            info!(rows = rows.len(), "exported csv");
            resp
        }
        Err(e) => {
            error!("csv export failed: {:#}", e);
            let mut resp = Response::new(b"export failed".to_vec());
            *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            resp
        }
    }
}

fn summary_json(query: Query, state: Arc<AppState>) -> warp::reply::Response {
    match &state.source {
        Source::Ready(ds) => {
            let filter = Filter::from_query(&query);
            let rows = filter.apply(ds);
            let overview = aggregate::overview(
                &rows,
                state.settings.trend_granularity,
                state.settings.heatmap.rows,
                state.settings.heatmap.columns,
            );
            match overview {
                Ok(overview) => warp::reply::json(&serde_json::json!({
                    "filter": filter,
                    "overview": overview,
                }))
                .into_response(),
                Err(e) => {
                    error!("summary failed: {:#}", e);
                    warp::reply::with_status(
                        warp::reply::json(&serde_json::json!({ "error": e.to_string() })),
                        StatusCode::INTERNAL_SERVER_ERROR,
                    )
                    .into_response()
                }
            }
        }
        Source::Invalid(err) => warp::reply::with_status(
            warp::reply::json(&serde_json::json!({
                "error": err.to_string(),
                "missing": err.missing(),
            })),
            StatusCode::UNPROCESSABLE_ENTITY,
        )
        .into_response(),
    }
}

/// Serve until Ctrl-C.
pub async fn serve(state: AppState) -> Result<()> {
    let bind = state.settings.bind;
    let state = Arc::new(state);
    if let Source::Ready(ds) = &state.source {
        info!(records = ds.len(), "serving dashboard on http://{}", bind);
    } else {
        info!("serving error page on http://{}", bind);
    }

    let (addr, server) = warp::serve(routes(state)).try_bind_with_graceful_shutdown(
        bind,
        async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        },
    )?;
    info!(%addr, "listening");
    server.await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    fn state() -> Arc<AppState> {
        let rec = |stage: &str, resp: &str| Record {
            stage: stage.into(),
            responsible: resp.into(),
            source: "Web".into(),
            company_name: format!("{} Co", resp),
            ..Default::default()
        };
        Arc::new(AppState {
            source: Source::Ready(Dataset {
                records: vec![rec("New", "Ann"), rec("Won", "Bob"), rec("New", "Bob")],
                ..Default::default()
            }),
            settings: Settings::default(),
        })
    }

    #[tokio::test]
    async fn dashboard_renders_html() {
        let resp = warp::test::request()
            .method("GET")
            .path("/?stage=New&present=stage")
            .reply(&routes(state()))
            .await;
        assert_eq!(resp.status(), 200);
        let body = String::from_utf8_lossy(resp.body());
        assert!(body.contains("Company Data Dashboard"));
        assert!(body.contains("/export.csv?present=stage&amp;stage=New"));
    }

    #[tokio::test]
    async fn export_returns_filtered_csv() {
        let resp = warp::test::request()
            .path("/export.csv?responsible=Bob")
            .reply(&routes(state()))
            .await;
        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"filtered.csv\""
        );
        let body = String::from_utf8_lossy(resp.body()).to_string();
        assert_eq!(body.lines().count(), 3);
        assert!(body.contains("Won,Web,Bob,Bob Co,,"));
    }

    #[tokio::test]
    async fn summary_endpoint_is_json() {
        let resp = warp::test::request()
            .path("/api/summary?stage=New")
            .reply(&routes(state()))
            .await;
        assert_eq!(resp.status(), 200);
        let json: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(json["overview"]["summary"]["total_records"], 2);
    }

    #[tokio::test]
    async fn invalid_source_answers_422() {
        let st = Arc::new(AppState {
            source: Source::Invalid(SchemaError::MissingColumns(vec!["Stage".into()])),
            settings: Settings::default(),
        });
        let resp = warp::test::request().path("/").reply(&routes(st.clone())).await;
        assert_eq!(resp.status(), 422);
        assert!(String::from_utf8_lossy(resp.body()).contains("<code>Stage</code>"));

        let resp = warp::test::request()
            .path("/health")
            .reply(&routes(st))
            .await;
        assert_eq!(resp.status(), 200);
    }
}
