use crate::data_structures::{insert_upload, AppState, SharedConfig, SharedUploads, StoredUpload};
use crate::pages::{self, ManualChart, Notice, SheetView};
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use axum_extra::extract::Form;
use ganttlab::chart::{render_activities, ChartOptions};
use ganttlab::error::{ManualEntryError, ScheduleError};
use ganttlab::models::{Activity, CleaningReport, ScheduleRow};
use ganttlab::services::{clean_manual_rows, load_activities, prepare_for_gantt, Workbook};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

const DEFAULT_BLANK_ROWS: usize = 3;
const MAX_EDITOR_ROWS: usize = 200;

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/", get(index_handler))
        .route("/healthz", get(healthz_handler))
        .route("/upload", get(upload_form_handler).post(upload_handler))
        .route("/upload/{id}", get(sheet_handler))
        .route("/upload/{id}/chart.svg", get(sheet_chart_handler))
        .route("/manual", get(manual_form_handler).post(manual_handler))
        .route("/manual/chart.svg", post(manual_chart_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

// --- Error pages ---

/// A failed request, rendered as an HTML page with a link back.
#[derive(Debug)]
pub struct PageError {
    status: StatusCode,
    title: &'static str,
    notice: Notice,
    back: String,
}

impl PageError {
    fn upload_not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            title: "Arquivo não encontrado",
            notice: Notice::error("Arquivo não encontrado ou expirado. Envie a planilha novamente."),
            back: "/upload".to_string(),
        }
    }

    fn sheet(err: ScheduleError, sheet: &str, id: Uuid) -> Self {
        let status = match err {
            ScheduleError::SheetNotFound(_) => StatusCode::NOT_FOUND,
            ScheduleError::MissingColumn { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            title: "Erro ao carregar a aba",
            notice: Notice::error(&format!("Erro ao carregar a aba '{}': {}", sheet, err)),
            back: format!("/upload/{}", id),
        }
    }

    fn chart(err: ScheduleError, back: &str) -> Self {
        error!(error = %err, "Chart rendering failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            title: "Erro ao gerar o gráfico",
            notice: Notice::error(&format!("Erro ao gerar o gráfico: {}", err)),
            back: back.to_string(),
        }
    }

    fn nothing_to_draw(back: &str) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            title: "Nada para desenhar",
            notice: Notice::warning("Nenhuma atividade com datas válidas nesta aba."),
            back: back.to_string(),
        }
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        (
            self.status,
            Html(pages::error_page(self.title, &self.notice, &self.back)),
        )
            .into_response()
    }
}

fn svg_download(svg: String, label: &str) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", download_name(label));
    (
        [
            (header::CONTENT_TYPE, "image/svg+xml; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        svg,
    )
        .into_response()
}

/// `gantt_<label>.svg` with everything but ASCII letters, digits, `-` and `_` replaced.
fn download_name(label: &str) -> String {
    let safe: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("gantt_{}.svg", safe)
}

// --- Static pages ---

pub async fn index_handler() -> Html<String> {
    Html(pages::index_page())
}

pub async fn healthz_handler() -> &'static str {
    "ok"
}

// --- Upload mode ---

pub async fn upload_form_handler() -> Html<String> {
    Html(pages::upload_form_page(None))
}

fn upload_form_with(status: StatusCode, notice: Notice) -> Response {
    (status, Html(pages::upload_form_page(Some(&notice)))).into_response()
}

/// The `file` field of the form, if any.
async fn read_file_field(multipart: &mut Multipart) -> Result<Option<(String, Vec<u8>)>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        return Ok(Some((filename, bytes.to_vec())));
    }
    Ok(None)
}

#[instrument(skip(uploads, config, multipart))]
pub async fn upload_handler(
    State(uploads): State<SharedUploads>,
    State(config): State<SharedConfig>,
    mut multipart: Multipart,
) -> Response {
    let (filename, bytes) = match read_file_field(&mut multipart).await {
        Ok(Some((filename, bytes))) if !bytes.is_empty() => (filename, bytes),
        Ok(_) => {
            debug!("Upload without a file");
            return upload_form_with(
                StatusCode::BAD_REQUEST,
                Notice::info("Envie um arquivo Excel para gerar o gráfico de Gantt."),
            );
        }
        Err(e) => {
            warn!(error = %e, "Failed to read multipart body");
            return upload_form_with(
                e.status(),
                Notice::error(&format!("Erro ao ler o arquivo: {}", e.body_text())),
            );
        }
    };

    let workbook = match Workbook::from_upload(&filename, &bytes) {
        Ok(workbook) => workbook,
        Err(e) => {
            warn!(%filename, error = %e, "Rejected upload");
            return upload_form_with(
                StatusCode::BAD_REQUEST,
                Notice::error(&format!("Erro ao ler o arquivo: {}", e)),
            );
        }
    };

    let sheets = workbook.sheets().len();
    let id = {
        let mut store = uploads.lock().await;
        insert_upload(&mut store, StoredUpload::new(filename.clone(), workbook), config.max_stored_uploads)
    };
    info!(%id, %filename, sheets, size = bytes.len(), "Stored upload");

    Redirect::to(&format!("/upload/{}", id)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct SheetQuery {
    pub sheet: Option<String>,
}

/// One sheet of a stored upload, cleaned.
struct LoadedSheet {
    upload: StoredUpload,
    sheet: String,
    /// Sheet order, for the preview table
    activities: Vec<Activity>,
    /// Sorted by project and start, for the chart
    sorted: Vec<Activity>,
    report: CleaningReport,
}

async fn load_sheet(uploads: &SharedUploads, id: Uuid, sheet: Option<&str>) -> Result<LoadedSheet, PageError> {
    let upload = uploads
        .lock()
        .await
        .get(&id)
        .cloned()
        .ok_or_else(PageError::upload_not_found)?;

    let selected = upload
        .workbook
        .sheet_or_first(sheet)
        .map_err(|e| PageError::sheet(e, sheet.unwrap_or_default(), id))?;
    let name = selected.name.clone();
    let (activities, report) =
        load_activities(&selected.table, &name).map_err(|e| PageError::sheet(e, &name, id))?;

    let sorted = prepare_for_gantt(&activities);
    Ok(LoadedSheet {
        upload,
        sheet: name,
        activities,
        sorted,
        report,
    })
}

#[instrument(skip(uploads, config), fields(sheet = ?query.sheet))]
pub async fn sheet_handler(
    State(uploads): State<SharedUploads>,
    State(config): State<SharedConfig>,
    Path(id): Path<Uuid>,
    Query(query): Query<SheetQuery>,
) -> Result<Html<String>, PageError> {
    let loaded = load_sheet(&uploads, id, query.sheet.as_deref()).await?;
    let back = format!("/upload/{}", id);

    let options = ChartOptions::for_sheet(&loaded.sheet).with_width(config.chart_width);
    let svg = render_activities(&loaded.sorted, &options).map_err(|e| PageError::chart(e, &back))?;

    let upload_id = id.to_string();
    let sheet_names = loaded.upload.workbook.sheet_names();
    let view = SheetView {
        upload_id: &upload_id,
        filename: &loaded.upload.filename,
        sheet_names: &sheet_names,
        selected: &loaded.sheet,
        activities: &loaded.activities,
        report: &loaded.report,
        svg: svg.as_deref(),
    };
    Ok(Html(pages::sheet_page(&view)))
}

#[instrument(skip(uploads, config), fields(sheet = ?query.sheet))]
pub async fn sheet_chart_handler(
    State(uploads): State<SharedUploads>,
    State(config): State<SharedConfig>,
    Path(id): Path<Uuid>,
    Query(query): Query<SheetQuery>,
) -> Result<Response, PageError> {
    let loaded = load_sheet(&uploads, id, query.sheet.as_deref()).await?;
    let back = format!("/upload/{}", id);

    let options = ChartOptions::for_sheet(&loaded.sheet).with_width(config.chart_width);
    let svg = render_activities(&loaded.sorted, &options)
        .map_err(|e| PageError::chart(e, &back))?
        .ok_or_else(|| PageError::nothing_to_draw(&back))?;

    info!(sheet = %loaded.sheet, bytes = svg.len(), "Serving chart download");
    Ok(svg_download(svg, &loaded.sheet))
}

// --- Manual mode ---

#[derive(Debug, Deserialize)]
pub struct ManualQuery {
    pub rows: Option<usize>,
}

/// The editor table, one repeated field per column.
#[derive(Debug, Default, Deserialize)]
pub struct ManualForm {
    #[serde(default)]
    pub project: Vec<String>,
    #[serde(default)]
    pub task: Vec<String>,
    #[serde(default)]
    pub start: Vec<String>,
    #[serde(default)]
    pub end: Vec<String>,
    #[serde(default)]
    pub deliverable: Vec<String>,
    pub action: Option<String>,
}

impl ManualForm {
    /// Rows in form order. Columns shorter than the longest one read as blank.
    pub fn rows(&self) -> Vec<ScheduleRow> {
        let count = [&self.project, &self.task, &self.start, &self.end, &self.deliverable]
            .iter()
            .map(|column| column.len())
            .max()
            .unwrap_or(0)
            .min(MAX_EDITOR_ROWS);
        let pick = |column: &[String], index: usize| column.get(index).cloned().unwrap_or_default();

        (0..count)
            .map(|i| ScheduleRow {
                project: pick(&self.project, i),
                task: pick(&self.task, i),
                start: pick(&self.start, i),
                end: pick(&self.end, i),
                deliverable: pick(&self.deliverable, i),
            })
            .collect()
    }
}

fn manual_notice(err: &ManualEntryError) -> Notice {
    match err {
        ManualEntryError::NoValidRows => {
            Notice::warning("Nenhuma linha válida encontrada. Preencha pelo menos uma atividade.")
        }
        ManualEntryError::AllDatesInvalid => {
            Notice::error("Todas as datas ficaram inválidas. Verifique o formato (DD-MM-YYYY).")
        }
    }
}

/// Clean, sort and draw editor rows. Entry problems come back as the editor
/// with a notice.
fn draw_manual_rows(
    rows: &[ScheduleRow],
    width: u32,
) -> Result<(Vec<Activity>, CleaningReport, String), Response> {
    let (activities, report) = clean_manual_rows(rows).map_err(|err| {
        debug!(error = %err, rows = rows.len(), "Manual entry has nothing to draw");
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Html(pages::manual_page(rows, Some(&manual_notice(&err)), None)),
        )
            .into_response()
    })?;

    let activities = prepare_for_gantt(&activities);
    let options = ChartOptions::for_manual_entry().with_width(width);
    let svg = render_activities(&activities, &options)
        .map_err(|e| PageError::chart(e, "/manual").into_response())?
        .ok_or_else(|| PageError::nothing_to_draw("/manual").into_response())?;

    Ok((activities, report, svg))
}

pub async fn manual_form_handler(Query(query): Query<ManualQuery>) -> Html<String> {
    let blank = query.rows.unwrap_or(DEFAULT_BLANK_ROWS);
    let mut rows = ScheduleRow::example_rows();
    let total = rows.len().saturating_add(blank).min(MAX_EDITOR_ROWS);
    rows.resize(total, ScheduleRow::default());
    Html(pages::manual_page(&rows, None, None))
}

#[instrument(skip(config, form), fields(rows = form.project.len(), action = ?form.action))]
pub async fn manual_handler(State(config): State<SharedConfig>, Form(form): Form<ManualForm>) -> Response {
    let mut rows = form.rows();

    if form.action.as_deref() == Some("add_row") {
        if rows.len() < MAX_EDITOR_ROWS {
            rows.push(ScheduleRow::default());
        }
        return Html(pages::manual_page(&rows, None, None)).into_response();
    }

    match draw_manual_rows(&rows, config.chart_width) {
        Ok((activities, report, svg)) => {
            info!(activities = activities.len(), "Rendered manual schedule");
            let chart = ManualChart {
                svg: &svg,
                activities: &activities,
                report: &report,
            };
            Html(pages::manual_page(&rows, None, Some(&chart))).into_response()
        }
        Err(response) => response,
    }
}

#[instrument(skip(config, form), fields(rows = form.project.len()))]
pub async fn manual_chart_handler(State(config): State<SharedConfig>, Form(form): Form<ManualForm>) -> Response {
    let rows = form.rows();
    match draw_manual_rows(&rows, config.chart_width) {
        Ok((_, _, svg)) => svg_download(svg, "entrada_manual"),
        Err(response) => response,
    }
}
