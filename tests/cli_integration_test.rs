//! CLI integration tests.
//!
//! Tests cover:
//! - Config loading and store selection
//! - Payload files and CSV series on disk
//! - Catalog resolution and comparison rendering
//! - Full command runs against an on-disk SQLite store

mod common;

use clap::Parser;
use common::*;
use std::process::ExitCode;
use stratlab::cli::{self, Cli};
use stratlab::domain::comparison::compare;
use stratlab::domain::error::StratlabError;
use stratlab::domain::record::ModuleKind;
use stratlab::domain::session::SessionId;
use stratlab::domain::step_config::load_step_gate;
use stratlab::ports::session_catalog_port::SessionCatalog;

// ExitCode has no PartialEq; compare through Debug.
fn assert_exit(code: ExitCode, expected: u8) {
    assert_eq!(format!("{code:?}"), format!("{:?}", ExitCode::from(expected)));
}

fn run(args: &[&str]) -> ExitCode {
    let mut argv = vec!["stratlab"];
    argv.extend_from_slice(args);
    cli::run(Cli::try_parse_from(argv).unwrap())
}

const CATALOG: &str = r#"[
    {"id": "s1", "name": "Tech Growth Portfolio", "module": "Portfolio Optimization",
     "timestamp": "2025-05-17T10:12:00Z",
     "metricsSummary": {"expectedReturn": 12.5, "volatility": 18.2, "sharpeRatio": 0.69}},
    {"id": "s2", "name": "Momentum Strategy Test", "module": "Backtesting",
     "timestamp": "2025-05-16T14:22:00Z",
     "metricsSummary": {"totalReturn": 28.7, "maxDrawdown": 15.2, "sharpeRatio": 1.2}}
]"#;

mod config_loading {
    use super::*;

    #[test]
    fn no_config_means_defaults() {
        let config = cli::load_config(None).unwrap();
        let gate = load_step_gate(&config).unwrap();
        assert_eq!(gate.definitions().len(), 5);
    }

    #[test]
    fn missing_config_file_is_io_error() {
        let result = cli::load_config(Some(std::path::Path::new("/nonexistent/stratlab.ini")));
        assert!(matches!(result, Err(StratlabError::Io(_))));
    }

    #[test]
    fn config_file_defines_pipeline() {
        let file = write_temp_ini(
            "[pipeline]\nsteps = alphaSignal, hedging\n\n[step.hedging]\nname = Hedging\nstorage_key = lab_hedging\nrequired = true\n",
        );
        let config = cli::load_config(Some(file.path())).unwrap();
        let gate = load_step_gate(&config).unwrap();
        let ids: Vec<&str> = gate.definitions().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["alphaSignal", "hedging"]);
        assert!(gate.definition("hedging").unwrap().required);
    }

    #[test]
    fn memory_backend_opens() {
        let file = write_temp_ini("[store]\nbackend = memory\n");
        let config = cli::load_config(Some(file.path())).unwrap();
        let store = cli::open_store(&config).unwrap();
        let key = stratlab::domain::session::StoreKey::new("ns", SessionId::generate());
        assert!(!store.has(&key));
    }

    #[test]
    fn unknown_backend_is_config_error() {
        let file = write_temp_ini("[store]\nbackend = redis\n");
        let config = cli::load_config(Some(file.path())).unwrap();
        match cli::open_store(&config) {
            Err(e) => {
                assert!(matches!(e, StratlabError::ConfigInvalid { .. }));
                assert_exit((&e).into(), 2);
            }
            Ok(_) => panic!("expected ConfigInvalid"),
        }
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_backend_needs_path() {
        let file = write_temp_ini("[store]\nbackend = sqlite\n");
        let config = cli::load_config(Some(file.path())).unwrap();
        assert!(matches!(
            cli::open_store(&config),
            Err(StratlabError::ConfigMissing { .. })
        ));
    }

    #[test]
    fn data_dir_precedence() {
        let file = write_temp_ini("[series]\ndir = /data/series\n");
        let config = cli::load_config(Some(file.path())).unwrap();
        assert_eq!(
            cli::resolve_data_dir(&config, None),
            std::path::PathBuf::from("/data/series")
        );
        assert_eq!(
            cli::resolve_data_dir(&config, Some(std::path::Path::new("/override"))),
            std::path::PathBuf::from("/override")
        );
        let empty = cli::load_config(None).unwrap();
        assert_eq!(cli::resolve_data_dir(&empty, None), std::path::PathBuf::from("."));
    }
}

mod payload_files {
    use super::*;

    #[test]
    fn envelope_file_is_read_as_is() {
        let dir = tempfile::TempDir::new().unwrap();
        write_file(
            dir.path(),
            "risk.json",
            r#"{"module": "riskAnalysis", "schemaVersion": 2, "data": {"var95": -2.1}}"#,
        );
        let payload = cli::read_payload_file(&dir.path().join("risk.json"), None).unwrap();
        assert_eq!(payload.module, ModuleKind::RiskAnalysis);
        assert_eq!(payload.schema_version, 2);
        assert_eq!(payload.data["var95"], -2.1);
    }

    #[test]
    fn raw_file_is_wrapped_with_module() {
        let dir = tempfile::TempDir::new().unwrap();
        write_file(dir.path(), "regime.json", r#"{"regimes": [0, 1, 1, 2]}"#);
        let payload =
            cli::read_payload_file(&dir.path().join("regime.json"), Some("regimeDetection")).unwrap();
        assert_eq!(payload.module, ModuleKind::RegimeDetection);
        assert_eq!(payload.schema_version, 1);
    }

    #[test]
    fn raw_file_without_module_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        write_file(dir.path(), "raw.json", r#"{"regimes": []}"#);
        match cli::read_payload_file(&dir.path().join("raw.json"), None) {
            Err(StratlabError::Data { reason }) => assert!(reason.contains("--module")),
            other => panic!("expected Data error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_module_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        write_file(dir.path(), "x.json", "{}");
        assert!(matches!(
            cli::read_payload_file(&dir.path().join("x.json"), Some("astrology")),
            Err(StratlabError::Data { .. })
        ));
    }
}

mod catalog_and_comparison {
    use super::*;

    #[test]
    fn catalog_path_from_config() {
        let dir = tempfile::TempDir::new().unwrap();
        write_file(dir.path(), "sessions.json", CATALOG);
        let ini = format!("[catalog]\npath = {}\n", dir.path().join("sessions.json").display());
        let file = write_temp_ini(&ini);
        let config = cli::load_config(Some(file.path())).unwrap();

        let catalog = cli::resolve_catalog(&config, None).unwrap();
        assert_eq!(catalog.list_sessions().unwrap().len(), 2);
    }

    #[test]
    fn catalog_without_path_is_config_missing() {
        let config = cli::load_config(None).unwrap();
        assert!(matches!(
            cli::resolve_catalog(&config, None),
            Err(StratlabError::ConfigMissing { .. })
        ));
    }

    #[test]
    fn rendered_table_marks_missing_cells() {
        let sessions = demo_catalog().list_sessions().unwrap();
        let table = compare(&sessions[..2]).unwrap();
        let text = cli::render_table(&table);

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1 + table.rows.len());
        assert!(lines[0].contains("Tech Growth Portfolio"));
        let volatility = lines.iter().find(|l| l.starts_with("Volatility")).unwrap();
        assert!(volatility.contains("18.20"));
        assert!(volatility.trim_end().ends_with('-'));
    }

    #[test]
    fn compare_command_exit_codes() {
        let dir = tempfile::TempDir::new().unwrap();
        write_file(dir.path(), "sessions.json", CATALOG);
        let catalog = dir.path().join("sessions.json");
        let catalog = catalog.to_str().unwrap();

        assert_exit(run(&["compare", "--catalog", catalog, "s1", "s2"]), 0);
        assert_exit(run(&["compare", "--catalog", catalog, "s1"]), 5);
        assert_exit(run(&["compare", "--catalog", catalog, "s1", "s9"]), 5);
        assert_exit(run(&["sessions", "--catalog", catalog, "--module", "backtesting"]), 0);
    }
}

#[cfg(feature = "sqlite")]
mod end_to_end {
    use super::*;

    struct Workspace {
        dir: tempfile::TempDir,
        ini: tempfile::NamedTempFile,
    }

    impl Workspace {
        fn new() -> Self {
            let dir = tempfile::TempDir::new().unwrap();
            let ini = write_temp_ini(&format!(
                "[store]\nbackend = sqlite\n\n[sqlite]\npath = {}\n\n[series]\ndir = {}\n",
                dir.path().join("sessions.db").display(),
                dir.path().display()
            ));
            write_file(
                dir.path(),
                "momentum_trades.csv",
                "date,asset,entry,exit,pnl\n\
                 2023-01-03,AAPL,100,107,700\n\
                 2023-01-10,MSFT,250,245,-500\n\
                 2023-01-17,NVDA,400,410,1000\n",
            );
            write_file(
                dir.path(),
                "momentum_equity.csv",
                "date,equity\n2023-01,100000\n2023-02,100700\n2023-03,100200\n2023-04,101200\n",
            );
            Self { dir, ini }
        }

        fn config(&self) -> &str {
            self.ini.path().to_str().unwrap()
        }
    }

    #[test]
    fn export_import_advance() {
        let ws = Workspace::new();
        let c = ws.config();
        let sid = "session_e2e";

        assert_exit(run(&["import", "-c", c, "--session", sid, "--step", "backtesting"]), 6);
        assert_exit(run(&["advance", "-c", c, "--session", sid]), 7);

        write_file(ws.dir.path(), "alpha.json", r#"{"ic": 0.04}"#);
        let alpha = ws.dir.path().join("alpha.json");
        assert_exit(
            run(&[
                "export", "-c", c, "--session", sid, "--step", "alphaSignal",
                "--file", alpha.to_str().unwrap(), "--module", "alphaSignal",
            ]),
            0,
        );
        assert_exit(
            run(&["export", "-c", c, "--session", sid, "--step", "backtesting", "--series", "momentum"]),
            0,
        );

        assert_exit(run(&["import", "-c", c, "--session", sid, "--step", "backtesting"]), 0);
        assert_exit(run(&["advance", "-c", c, "--session", sid]), 0);
        assert_exit(run(&["status", "-c", c, "--session", sid]), 0);
        assert_exit(run(&["summarize", "-c", c, "--session", sid]), 0);
    }

    #[test]
    fn series_commands() {
        let ws = Workspace::new();
        let c = ws.config();

        assert_exit(run(&["summarize", "-c", c, "--series", "momentum", "--json"]), 0);
        assert_exit(run(&["trades", "-c", c, "--series", "momentum", "--sort", "pnl", "--desc"]), 0);
        assert_exit(run(&["drawdown", "-c", c, "--series", "momentum"]), 0);
        assert_exit(run(&["trades", "-c", c, "--series", "missing"]), 4);
        assert_exit(run(&["trades", "-c", c, "--series", "momentum", "--sort", "volume"]), 2);
    }

    #[test]
    fn validation_failures() {
        let ws = Workspace::new();
        let c = ws.config();

        assert_exit(run(&["import", "-c", c, "--session", "s1", "--step", "hedging"]), 5);
        assert_exit(run(&["status", "-c", c, "--session", "  "]), 5);
        assert_exit(run(&["summarize", "-c", c, "--session", "never_exported"]), 6);
    }

    #[test]
    fn summarize_without_backtest_reports_missing_data() {
        let ws = Workspace::new();
        let c = ws.config();
        let sid = "session_partial";

        write_file(ws.dir.path(), "alpha.json", r#"{"ic": 0.04}"#);
        let alpha = ws.dir.path().join("alpha.json");
        assert_exit(
            run(&[
                "export", "-c", c, "--session", sid, "--step", "alphaSignal",
                "--file", alpha.to_str().unwrap(), "--module", "alphaSignal",
            ]),
            0,
        );

        assert_exit(run(&["summarize", "-c", c, "--session", sid]), 6);
        assert_exit(run(&["summarize", "-c", c, "--session", sid, "--json"]), 6);
        assert_exit(run(&["summarize", "-c", c, "--session", sid, "--step", "hedging"]), 5);
    }
}
