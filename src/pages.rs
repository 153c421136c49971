use ganttlab::models::{Activity, CleaningReport, ScheduleRow};
use ganttlab::utils::format_day_first;
use std::fmt::Write;

const STYLE: &str = "body{font-family:sans-serif;max-width:1280px;margin:0 auto;padding:1rem 2rem;color:#222}\
table{border-collapse:collapse;margin:.5rem 0}td,th{border:1px solid #ccc;padding:.25rem .5rem;text-align:left}\
th{background:#f3f3f3}input[type=text]{width:100%;box-sizing:border-box}\
.notice{padding:.6rem 1rem;border-radius:4px;margin:.75rem 0}\
.info{background:#e8f1fb}.warning{background:#fff4d6}.error{background:#fde2e1}\
nav a{margin-right:1rem}.chart{overflow-x:auto}";

/// How a message above the page content should look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    /// Already-escaped HTML
    html: String,
}

impl Notice {
    pub fn info(text: &str) -> Self {
        Self::new(NoticeKind::Info, text)
    }

    pub fn warning(text: &str) -> Self {
        Self::new(NoticeKind::Warning, text)
    }

    pub fn error(text: &str) -> Self {
        Self::new(NoticeKind::Error, text)
    }

    fn new(kind: NoticeKind, text: &str) -> Self {
        Self {
            kind,
            html: escape(text),
        }
    }

    fn render(&self) -> String {
        let class = match self.kind {
            NoticeKind::Info => "info",
            NoticeKind::Warning => "warning",
            NoticeKind::Error => "error",
        };
        format!(r#"<div class="notice {}">{}</div>"#, class, self.html)
    }
}

/// Escape text for HTML element content and quoted attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
<meta charset="utf-8">
<title>{title} – Cronogramas de Pesquisa</title>
<style>{STYLE}</style>
</head>
<body>
<nav><a href="/">Instruções</a><a href="/upload">Carregar planilha</a><a href="/manual">Preencher manualmente</a></nav>
<h1>Geração de Gráficos de Gantt para Projetos de Pesquisa</h1>
{body}
</body>
</html>
"#,
        title = escape(title),
    )
}

pub fn index_page() -> String {
    let body = r#"<h2>Instruções gerais para preenchimento</h2>
<p>Esta aplicação permite que cada pesquisador <b>defina e visualize o seu cronograma</b>
de forma padronizada, gerando um gráfico de Gantt automaticamente.</p>
<h3>Estrutura das atividades</h3>
<ul>
<li>Cada linha do cronograma representa <b>uma atividade</b>.</li>
<li>Para cada atividade, preencha:
<ul>
<li><b>Projeto</b>: nome do projeto ou subprojeto (ex.: <code>Dowsing</code>, <code>GML</code>).</li>
<li><b>Tarefa</b>: o que será feito em termos operacionais (ex.: <code>Coleta de dados fase 1</code>).</li>
<li><b>Início</b>: data de início no formato <b>DD-MM-YYYY</b> (ex.: <code>01-03-2025</code>).</li>
<li><b>Fim</b>: data de fim no formato <b>DD-MM-YYYY</b> (ex.: <code>31-05-2025</code>).</li>
<li><b>Entrega_mensurável</b>: o resultado concreto ao final da atividade
(ex.: para <code>Coleta de dados</code>, <code>Banco de dados organizado</code>).</li>
</ul></li>
</ul>
<h3>Sobre as entregas mensuráveis</h3>
<p>Cada atividade do cronograma <b>deve ter uma entrega mensurável</b>.
Isso ajuda a conectar o cronograma com resultados concretos e verificáveis.</p>
<ul>
<li><code>Revisão da literatura</code>: arquivo com revisão inicial ou bibliografia organizada (Zotero, Mendeley).</li>
<li><code>Coleta de dados</code>: banco de dados em formato padronizado.</li>
<li><code>Análise de dados preliminar</code>: notebook com análises exploratórias.</li>
<li><code>Redação do artigo (introdução)</code>: rascunho da seção de introdução.</li>
</ul>
<h3>Modo de uso</h3>
<ul>
<li><a href="/upload">Carregar planilha Excel</a> (<code>.xlsx</code> ou <code>.csv</code>)</li>
<li><a href="/manual">Preencher cronograma manualmente</a> (sem Excel)</li>
</ul>"#;
    layout("Instruções", body)
}

pub fn upload_form_page(notice: Option<&Notice>) -> String {
    let mut body = String::from(
        r#"<h2>Modo: Carregar planilha Excel</h2>
<p><b>Formato esperado da planilha:</b></p>
<ul>
<li>Arquivo Excel (<code>.xlsx</code>) ou CSV (<code>.csv</code>, separado por <code>;</code> ou <code>,</code>).</li>
<li><b>Uma aba por pesquisador</b>, ou uma única aba, com as colunas
<code>Projeto</code>, <code>Tarefa</code>, <code>Início</code> (DD-MM-YYYY), <code>Fim</code> (DD-MM-YYYY)
e <code>Entrega_mensurável</code> (opcional, mas fortemente recomendada).</li>
<li>Cada linha da planilha deve representar <b>uma atividade</b>.</li>
</ul>
"#,
    );
    if let Some(notice) = notice {
        body.push_str(&notice.render());
    }
    body.push_str(
        r#"<form method="post" action="/upload" enctype="multipart/form-data">
<label>Faça upload da planilha Excel <input type="file" name="file" accept=".xlsx,.xlsm,.csv"></label>
<button type="submit">Enviar</button>
</form>"#,
    );
    layout("Carregar planilha", &body)
}

/// Everything shown for one sheet of a stored upload.
pub struct SheetView<'a> {
    pub upload_id: &'a str,
    pub filename: &'a str,
    pub sheet_names: &'a [&'a str],
    pub selected: &'a str,
    pub activities: &'a [Activity],
    pub report: &'a CleaningReport,
    pub svg: Option<&'a str>,
}

pub fn sheet_page(view: &SheetView<'_>) -> String {
    let mut body = format!(
        "<h2>Modo: Carregar planilha Excel</h2>\n<p>Arquivo: <b>{}</b></p>\n",
        escape(view.filename)
    );

    if view.sheet_names.len() == 1 {
        body.push_str(&format!(
            r#"<div class="notice info">Arquivo possui uma única aba. Usando: <b>{}</b></div>"#,
            escape(view.selected)
        ));
    } else {
        body.push_str(&sheet_selector(view));
    }

    body.push_str("<h3>Pré-visualização da tabela</h3>\n");
    body.push_str(&report_notices(view.report));
    body.push_str(&activity_table(view.activities));

    body.push_str("<h3>Gráfico de Gantt</h3>\n");
    match view.svg {
        Some(svg) => {
            let _ = write!(body, r#"<div class="chart">{}</div>"#, svg);
            let _ = write!(
                body,
                r#"<form method="get" action="/upload/{}/chart.svg"><input type="hidden" name="sheet" value="{}"><button type="submit">Baixar gráfico (SVG)</button></form>"#,
                escape(view.upload_id),
                escape(view.selected)
            );
        }
        None => body.push_str(
            &Notice::warning("Nenhuma atividade com datas válidas nesta aba.").render(),
        ),
    }

    layout(&format!("Cronograma – {}", view.selected), &body)
}

fn sheet_selector(view: &SheetView<'_>) -> String {
    let mut options = String::new();
    for name in view.sheet_names {
        let selected = if *name == view.selected { " selected" } else { "" };
        let _ = write!(
            options,
            r#"<option value="{0}"{1}>{0}</option>"#,
            escape(name),
            selected
        );
    }
    format!(
        r#"<form method="get" action="/upload/{}">
<label>Selecione a aba (pesquisador) a visualizar <select name="sheet">{}</select></label>
<button type="submit">Visualizar</button>
</form>
"#,
        escape(view.upload_id),
        options
    )
}

fn report_notices(report: &CleaningReport) -> String {
    let mut out = String::new();
    if report.has_drops() {
        let text = format!(
            "{} de {} linhas ignoradas: {} sem Projeto ou Tarefa, {} com datas inválidas.",
            report.dropped_blank + report.dropped_invalid_dates,
            report.total_rows,
            report.dropped_blank,
            report.dropped_invalid_dates
        );
        out.push_str(&Notice::warning(&text).render());
    }
    if !report.inverted.is_empty() {
        let rows: Vec<String> = report.inverted.iter().map(|r| r.to_string()).collect();
        let text = format!(
            "Fim anterior ao Início nas linhas: {}.",
            rows.join(", ")
        );
        out.push_str(&Notice::warning(&text).render());
    }
    out
}

/// Cleaned activities with day-first dates.
pub fn activity_table(activities: &[Activity]) -> String {
    let mut table = String::from(
        "<table>\n<tr><th>Projeto</th><th>Tarefa</th><th>Início</th><th>Fim</th><th>Entrega_mensurável</th></tr>\n",
    );
    for activity in activities {
        let _ = writeln!(
            table,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&activity.project),
            escape(&activity.task),
            format_day_first(activity.start),
            format_day_first(activity.end),
            escape(&activity.deliverable)
        );
    }
    table.push_str("</table>\n");
    table
}

/// Successful manual entry: the chart and the rows it was drawn from.
pub struct ManualChart<'a> {
    pub svg: &'a str,
    pub activities: &'a [Activity],
    pub report: &'a CleaningReport,
}

pub fn manual_page(rows: &[ScheduleRow], notice: Option<&Notice>, chart: Option<&ManualChart<'_>>) -> String {
    let mut body = String::from(
        r#"<h2>Modo: Preencher cronograma manualmente (sem Excel)</h2>
<p>Use a tabela abaixo para montar o seu cronograma diretamente na aplicação.</p>
<ul>
<li>Edite as células, use <b>Adicionar linha</b> para novas atividades e esvazie uma linha para removê-la.</li>
<li>Datas devem ser informadas no formato <b>DD-MM-YYYY</b>.</li>
<li>Procure sempre preencher a coluna <b>Entrega_mensurável</b> com um resultado concreto.</li>
</ul>
<p>Quando terminar, clique em <b>Gerar gráfico de Gantt</b>.</p>
"#,
    );
    if let Some(notice) = notice {
        body.push_str(&notice.render());
    }
    body.push_str(&editor(rows));

    if let Some(chart) = chart {
        body.push_str("<h3>Gráfico de Gantt (dados preenchidos na tela)</h3>\n");
        body.push_str(&report_notices(chart.report));
        let _ = write!(body, r#"<div class="chart">{}</div>"#, chart.svg);
        body.push_str("<details><summary>Ver dados utilizados para o Gantt</summary>\n");
        body.push_str(&activity_table(chart.activities));
        body.push_str("</details>\n");
    }

    layout("Preencher manualmente", &body)
}

fn editor(rows: &[ScheduleRow]) -> String {
    let mut form = String::from(
        r#"<form method="post" action="/manual">
<table>
<tr><th>Projeto</th><th>Tarefa</th><th>Início</th><th>Fim</th><th>Entrega_mensurável</th></tr>
"#,
    );
    for row in rows {
        form.push_str("<tr>");
        for (name, value) in [
            ("project", &row.project),
            ("task", &row.task),
            ("start", &row.start),
            ("end", &row.end),
            ("deliverable", &row.deliverable),
        ] {
            let _ = write!(
                form,
                r#"<td><input type="text" name="{}" value="{}"></td>"#,
                name,
                escape(value)
            );
        }
        form.push_str("</tr>\n");
    }
    form.push_str(
        r#"</table>
<button type="submit" name="action" value="add_row">Adicionar linha</button>
<button type="submit" name="action" value="render">Gerar gráfico de Gantt</button>
<button type="submit" formaction="/manual/chart.svg">Baixar gráfico (SVG)</button>
</form>
"#,
    );
    form
}

pub fn error_page(title: &str, notice: &Notice, back: &str) -> String {
    let body = format!(
        r#"{}<p><a href="{}">Voltar</a></p>"#,
        notice.render(),
        escape(back)
    );
    layout(title, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ganttlab::utils::parse_day_first;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<b>"GML" & 'Dowsing'</b>"#),
            "&lt;b&gt;&quot;GML&quot; &amp; &#39;Dowsing&#39;&lt;/b&gt;"
        );
        assert_eq!(escape("Revisão"), "Revisão");
    }

    #[test]
    fn test_manual_page_escapes_typed_values() {
        let rows = vec![ScheduleRow::new("<script>", "t", "01-01-2025", "02-01-2025", "")];
        let html = manual_page(&rows, None, None);
        assert!(html.contains(r#"value="&lt;script&gt;""#));
        assert!(!html.contains("<script>"));
        assert_eq!(html.matches(r#"name="project""#).count(), 1);
    }

    #[test]
    fn test_activity_table_formats_dates_day_first() {
        let activity = Activity {
            project: "GML".to_string(),
            task: "Coleta".to_string(),
            start: parse_day_first("01-03-2025").unwrap(),
            end: parse_day_first("31-05-2025").unwrap(),
            deliverable: String::new(),
        };
        let html = activity_table(&[activity]);
        assert!(html.contains("<td>01-03-2025</td><td>31-05-2025</td>"));
    }

    #[test]
    fn test_report_notices() {
        let report = CleaningReport {
            total_rows: 5,
            dropped_blank: 1,
            dropped_invalid_dates: 2,
            inverted: vec![4],
        };
        let html = report_notices(&report);
        assert!(html.contains("3 de 5 linhas ignoradas"));
        assert!(html.contains("linhas: 4."));
        assert!(report_notices(&CleaningReport::default()).is_empty());
    }
}
