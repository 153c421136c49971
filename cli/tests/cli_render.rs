//! End-to-end tests for the `ganttlab` binary: sheets, check and render.

use std::fs;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

const SCHEDULE_CSV: &str = "Projeto;Tarefa;Início;Fim;Entrega_mensurável
GML;Coleta de dados fase 1;01-03-2025;31-05-2025;Banco de dados organizado
Dowsing;Revisão da literatura;06-01-2025;14-02-2025;Bibliografia no Zotero
GML;Análise preliminar;01-06-2025;data ruim;Notebook
";

fn ganttlab(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ganttlab"))
        .args(args)
        .env("RUST_LOG", "off")
        .stdin(Stdio::null())
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ganttlab {:?}: {}", args, e))
}

fn write_schedule(dir: &Path) -> String {
    let path = dir.join("ana.csv");
    fs::write(&path, SCHEDULE_CSV).unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn sheets_lists_csv_as_single_sheet() {
    let dir = TempDir::new().unwrap();
    let input = write_schedule(dir.path());

    let output = ganttlab(&["sheets", "--input", &input]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "ana");
}

#[test]
fn check_prints_sorted_activities_and_report() {
    let dir = TempDir::new().unwrap();
    let input = write_schedule(dir.path());

    let output = ganttlab(&["check", "--input", &input]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["sheet"], "ana");
    let activities = json["activities"].as_array().unwrap();
    assert_eq!(activities.len(), 2);
    assert_eq!(activities[0]["project"], "Dowsing");
    assert_eq!(activities[0]["start"], "2025-01-06");
    assert_eq!(activities[1]["task"], "Coleta de dados fase 1");
    assert_eq!(json["report"]["dropped_invalid_dates"], 1);
}

#[test]
fn render_writes_svg_next_to_input() {
    let dir = TempDir::new().unwrap();
    let input = write_schedule(dir.path());

    let output = ganttlab(&["render", "--input", &input]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let svg = fs::read_to_string(dir.path().join("ana.svg")).unwrap();
    assert!(svg.contains("Cronograma – ana"));
    assert!(svg.contains("Revisão da literatura"));
}

#[test]
fn render_unknown_sheet_fails() {
    let dir = TempDir::new().unwrap();
    let input = write_schedule(dir.path());

    let output = ganttlab(&["render", "--input", &input, "--sheet", "Bruno"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("sheet 'Bruno' not found"));
}
