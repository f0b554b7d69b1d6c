// Pitch count tree entry point.
//
// Startup sequence:
// 1. Parse arguments
// 2. Initialize tracing (log to file, stdout carries results)
// 3. Load config
// 4. Session commands run directly against the session database
// 5. Everything else goes through the orchestrator: spawn it, send one
//    command, print updates until the command finishes
// 6. Quit the orchestrator and wait for it

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{error, info};

use pitchtree_app::app::{self, AppCommand, AppState, Severity, UiUpdate};
use pitchtree_app::config::{self, Config};
use pitchtree_app::db::Database;
use pitchtree_app::filters::FilterState;
use pitchtree_app::report::render_text;
use pitchtree_app::session::{SessionContext, SqliteSessionStore};
use pitchtree_client::protocol::{Handedness, League, OpponentType, PitcherOption};
use pitchtree_client::ApiClient;
use pitchtree_core::metrics::RateMetric;
use pitchtree_core::tree::CountTreeLayout;

#[derive(Debug, Parser)]
#[command(name = "pitchtree", version, about = "Count-by-count pitch recommendations")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start a session
    Login {
        username: String,
        #[arg(long)]
        password: String,
    },
    /// End the current session
    Logout,
    /// Check the analytics backend
    Health,
    /// List pitchers for a league
    Pitchers {
        #[arg(default_value = "mlb")]
        league: League,
    },
    /// Generate a count tree report from the backend
    Analyze(ReportArgs),
    /// Upload a MiLB pitch CSV for a pitcher
    Upload {
        file: PathBuf,
        #[arg(long)]
        pitcher_id: String,
    },
    /// Score a pitch-level CSV locally
    ScoreCsv {
        file: PathBuf,
        #[arg(long)]
        min_pitches: Option<u32>,
        #[arg(long, value_delimiter = ',', value_parser = parse_metric)]
        metrics: Vec<RateMetric>,
    },
    /// Generate a report from sample data (needs demo.enabled)
    Demo(ReportArgs),
    /// Print the count tree layout
    Tree,
}

#[derive(Debug, Args)]
struct ReportArgs {
    #[arg(long)]
    pitcher_id: Option<i64>,
    #[arg(long)]
    pitcher_name: Option<String>,
    #[arg(long, default_value = "mlb")]
    league: League,
    /// Season to include; repeat for two seasons
    #[arg(long = "year")]
    years: Vec<String>,
    /// Analyze against one batter instead of the league average
    #[arg(long)]
    batter: Option<String>,
    #[arg(long, default_value = "R")]
    handedness: Handedness,
    #[arg(long)]
    min_pitches: Option<u32>,
    /// Metrics to show, e.g. whiff,chase
    #[arg(long, value_delimiter = ',', value_parser = parse_metric)]
    metrics: Vec<RateMetric>,
}

fn parse_metric(s: &str) -> Result<RateMetric, String> {
    let key = s.trim().to_ascii_lowercase();
    RateMetric::from_key(&key)
        .or_else(|| RateMetric::from_key(&format!("{key}_rate")))
        .ok_or_else(|| format!("unknown metric `{s}`"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing()?;
    info!("pitchtree starting");

    if let Command::Tree = cli.command {
        print_tree()?;
        return Ok(());
    }

    let config = config::load_config().context("failed to load configuration")?;
    let db = Database::open(&config.session.db_path).context("failed to open database")?;
    info!("Database opened at {}", config.session.db_path);
    let session = SessionContext::new(Arc::new(SqliteSessionStore::new(Arc::new(db))));

    let (cmd, metrics) = match cli.command {
        Command::Login { username, password } => {
            let s = session.login(&username, &password)?;
            println!("Login Successful: welcome, {}", s.username);
            return Ok(());
        }
        Command::Logout => {
            if session.logout()? {
                println!("Logged out");
            } else {
                println!("No active session");
            }
            return Ok(());
        }
        Command::Tree => return Ok(()),
        Command::Health => (AppCommand::CheckHealth, Vec::new()),
        Command::Pitchers { league } => (AppCommand::LoadPitchers(league), Vec::new()),
        Command::Analyze(args) => {
            let metrics = args.metrics.clone();
            let filters = build_filters(&config, args, None)?;
            (AppCommand::GenerateReport(filters), metrics)
        }
        Command::Demo(args) => {
            let metrics = args.metrics.clone();
            let demo_pitcher = PitcherOption {
                label: "Demo Pitcher".into(),
                value: 0,
            };
            let filters = build_filters(&config, args, Some(demo_pitcher))?;
            (AppCommand::GenerateDemo(filters), metrics)
        }
        Command::Upload { file, pitcher_id } => (
            AppCommand::UploadMilb {
                path: file,
                pitcher_id,
            },
            Vec::new(),
        ),
        Command::ScoreCsv {
            file,
            min_pitches,
            metrics,
        } => (
            AppCommand::ScoreLocalCsv {
                path: file,
                min_pitches: min_pitches.unwrap_or(config.report.default_min_pitches),
            },
            metrics,
        ),
    };
    let metrics = if metrics.is_empty() {
        vec![RateMetric::Whiff, RateMetric::HardHit]
    } else {
        metrics
    };

    let backend = ApiClient::from_env(&config.backend.client_settings())
        .context("failed to build HTTP client")?;
    info!("Backend at {}", backend.base_url());

    let (task_tx, task_rx) = mpsc::channel(16);
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let (ui_tx, mut ui_rx) = mpsc::channel(64);

    let state = AppState::new(config, Arc::new(backend), session, task_tx)?;
    let app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(task_rx, cmd_rx, ui_tx, state).await {
            error!("Application loop error: {}", e);
        }
    });

    cmd_tx.send(cmd).await.context("orchestrator stopped early")?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut cancel_sent = false;
    let mut failures = Vec::new();

    loop {
        tokio::select! {
            update = ui_rx.recv() => {
                match update {
                    Some(UiUpdate::TaskFinished { generation }) => {
                        info!("command {} finished", generation);
                        break;
                    }
                    None => break,
                    Some(update) => {
                        if let Some(failure) = print_update(update, &metrics) {
                            failures.push(failure);
                        }
                    }
                }
            }
            _ = &mut ctrl_c, if !cancel_sent => {
                info!("Ctrl+C received, cancelling request");
                cancel_sent = true;
                let _ = cmd_tx.send(AppCommand::Cancel).await;
            }
        }
    }

    let _ = cmd_tx.send(AppCommand::Quit).await;
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), app_handle).await;
    info!("pitchtree finished");

    if let Some(first) = failures.into_iter().next() {
        bail!(first);
    }
    Ok(())
}

/// Turn command-line report arguments into a filter selection.
fn build_filters(
    config: &Config,
    args: ReportArgs,
    fallback_pitcher: Option<PitcherOption>,
) -> anyhow::Result<FilterState> {
    let mut filters = FilterState::new(Utc::now().date_naive());
    filters.min_pitches = args.min_pitches.unwrap_or(config.report.default_min_pitches);
    filters.set_league(args.league);

    if !args.years.is_empty() {
        filters.years.clear();
        for year in &args.years {
            filters.toggle_year(year)?;
        }
    }

    filters.pitcher = match args.pitcher_id {
        Some(value) => Some(PitcherOption {
            label: args.pitcher_name.unwrap_or_else(|| format!("Pitcher {value}")),
            value,
        }),
        None => fallback_pitcher,
    };

    match args.batter {
        Some(batter) => {
            filters.opponent = OpponentType::Specific;
            filters.batter_name = batter;
        }
        None => {
            filters.opponent = OpponentType::Average;
            filters.handedness = args.handedness;
        }
    }

    if !args.metrics.is_empty() {
        filters.metrics = args.metrics;
    }
    Ok(filters)
}

/// Print one update. Returns an error line for failed notifications.
fn print_update(update: UiUpdate, metrics: &[RateMetric]) -> Option<String> {
    match update {
        UiUpdate::Notification(n) => {
            let line = format!("{}: {}", n.title, n.description);
            if n.severity == Severity::Error {
                eprintln!("{line}");
                return Some(line);
            }
            println!("{line}");
        }
        UiUpdate::ConnectionChanged(status) => info!("connection status: {:?}", status),
        UiUpdate::Health(h) => {
            println!("status: {}", h.status);
            println!("pybaseball available: {}", h.pybaseball_available);
        }
        UiUpdate::Pitchers { league, pitchers } => {
            println!("{} pitchers ({}):", league.to_string().to_uppercase(), pitchers.len());
            for p in pitchers {
                println!("  {:>8}  {}", p.value, p.label);
            }
        }
        UiUpdate::Report(report) => print!("{}", render_text(&report, metrics)),
        UiUpdate::Uploaded(r) => println!("{}", r.message),
        UiUpdate::TaskFinished { .. } => {}
    }
    None
}

fn print_tree() -> anyhow::Result<()> {
    let layout = CountTreeLayout;
    for node in layout.nodes()? {
        let next: Vec<String> = node
            .transitions
            .iter()
            .map(|(outcome, to)| format!("{outcome:?} -> {to}"))
            .collect();
        let next = if next.is_empty() {
            "terminal".to_string()
        } else {
            next.join(", ")
        };
        println!(
            "{}  ({:+.1}, {:.1})  {}",
            node.count, node.position.x, node.position.y, next
        );
    }
    println!("{} edges", layout.edges().len());
    Ok(())
}

/// Initialize tracing to log to a file so stdout only carries results.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("pitchtree.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pitchtree=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn metric_names_accept_short_and_wire_forms() {
        assert_eq!(parse_metric("whiff").unwrap(), RateMetric::Whiff);
        assert_eq!(parse_metric("hard_hit_rate").unwrap(), RateMetric::HardHit);
        assert_eq!(parse_metric("is_chase").unwrap(), RateMetric::Chase);
        assert!(parse_metric("spin").is_err());
    }

    #[test]
    fn analyze_args_build_specific_opponent_filters() {
        let cli = Cli::try_parse_from([
            "pitchtree",
            "analyze",
            "--pitcher-id",
            "554430",
            "--year",
            "2024",
            "--year",
            "2025",
            "--batter",
            "Juan Soto",
            "--metrics",
            "whiff,chase",
        ])
        .unwrap();
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        let config = test_config("pitchtree_cli_config_specific");
        let filters = build_filters(&config, args, None).unwrap();
        assert_eq!(filters.years, vec!["2025", "2024"]);
        assert_eq!(filters.opponent, OpponentType::Specific);
        assert_eq!(filters.metrics, vec![RateMetric::Whiff, RateMetric::Chase]);
        let season_start = chrono::NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        let req = filters.validate_as_of(season_start).unwrap();
        assert_eq!(req.pitcher_id, 554430);
        assert_eq!(req.batter_name.as_deref(), Some("Juan Soto"));
    }

    #[test]
    fn three_years_are_rejected() {
        let cli = Cli::try_parse_from([
            "pitchtree", "analyze", "--year", "2023", "--year", "2024", "--year", "2025",
        ])
        .unwrap();
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        let config = test_config("pitchtree_cli_config_three_years");
        assert!(build_filters(&config, args, None).is_err());
    }

    /// Config loaded from the shipped defaults, in a temp dir owned by one test.
    fn test_config(dir_name: &str) -> Config {
        let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
        let tmp = std::env::temp_dir().join(dir_name);
        let _ = std::fs::remove_dir_all(&tmp);
        std::fs::create_dir_all(tmp.join("config")).unwrap();
        std::fs::copy(
            root.join("defaults/dashboard.toml"),
            tmp.join("config/dashboard.toml"),
        )
        .unwrap();
        let config = config::load_config_from(&tmp).unwrap();
        let _ = std::fs::remove_dir_all(&tmp);
        config
    }
}
