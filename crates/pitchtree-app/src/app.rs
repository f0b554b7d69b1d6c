// Application orchestrator: owns all state and reacts to user commands and
// completed backend requests.
//
// Every command is numbered with a generation, in arrival order from 1, and
// ends with exactly one `TaskFinished` carrying that number. Requests run as
// spawned tasks that report back over `task_tx`. Only one is in flight at a
// time: a newer request supersedes it and `Cancel` aborts it. Either way the
// old command is finished on the spot and its late result is dropped.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use pitchtree_client::protocol::{
    AnalysisResponse, HealthStatus, League, PitcherOption, UploadResponse,
};
use pitchtree_client::{AnalyticsBackend, ApiError, CsvUpload, UploadError};
use pitchtree_core::aggregate::aggregate_csv;
use pitchtree_core::demo::{sample_arsenal, DemoJitter};
use pitchtree_core::scoring::CountScoringEngine;
use pitchtree_core::Count;

use crate::config::Config;
use crate::filters::FilterState;
use crate::report::{CountTreeReport, ReportMetadata};
use crate::session::{SessionContext, SessionError};

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Commands from the user-facing surface.
#[derive(Debug, Clone)]
pub enum AppCommand {
    CheckHealth,
    LoadPitchers(League),
    GenerateReport(FilterState),
    /// Score a pitch-level CSV locally, without the backend.
    ScoreLocalCsv { path: PathBuf, min_pitches: u32 },
    UploadMilb { path: PathBuf, pitcher_id: String },
    /// Build a report from the sample arsenal. Requires `demo.enabled`.
    GenerateDemo(FilterState),
    Cancel,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

impl Notification {
    fn new(title: &str, description: impl Into<String>, severity: Severity) -> Self {
        Notification {
            title: title.to_string(),
            description: description.into(),
            severity,
        }
    }

    fn error(title: &str, description: impl Into<String>) -> Self {
        Notification::new(title, description, Severity::Error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Unknown,
    Connected,
    Disconnected,
}

/// Updates pushed to the user-facing surface.
#[derive(Debug, Clone)]
pub enum UiUpdate {
    Notification(Notification),
    ConnectionChanged(ConnectionStatus),
    Health(HealthStatus),
    Pitchers {
        league: League,
        pitchers: Vec<PitcherOption>,
    },
    Report(Box<CountTreeReport>),
    Uploaded(UploadResponse),
    /// The command numbered `generation` is done, successfully or not.
    TaskFinished { generation: u64 },
}

/// Result of a spawned request.
#[derive(Debug)]
pub enum TaskOutcome {
    Health(Result<HealthStatus, ApiError>),
    Pitchers {
        league: League,
        result: Result<Vec<PitcherOption>, ApiError>,
    },
    Analysis(Result<AnalysisResponse, ApiError>),
    LocalReport(anyhow::Result<CountTreeReport>),
    Upload {
        file_name: String,
        result: Result<UploadResponse, ApiError>,
    },
}

#[derive(Debug)]
pub struct TaskEvent {
    pub generation: u64,
    pub outcome: TaskOutcome,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// The spawned request whose command has not finished yet.
#[derive(Debug)]
pub struct RunningTask {
    pub generation: u64,
    handle: JoinHandle<()>,
}

pub struct AppState {
    pub config: Config,
    pub engine: CountScoringEngine,
    pub backend: Arc<dyn AnalyticsBackend>,
    pub session: SessionContext,
    pub connection_status: ConnectionStatus,
    pub current_task: Option<RunningTask>,
    /// Number of the latest command. Task results are accepted only when they
    /// match `current_task`.
    pub generation: u64,
    task_tx: mpsc::Sender<TaskEvent>,
}

impl AppState {
    pub fn new(
        config: Config,
        backend: Arc<dyn AnalyticsBackend>,
        session: SessionContext,
        task_tx: mpsc::Sender<TaskEvent>,
    ) -> anyhow::Result<Self> {
        let engine = config.engine().context("invalid scoring configuration")?;
        Ok(AppState {
            config,
            engine,
            backend,
            session,
            connection_status: ConnectionStatus::Unknown,
            current_task: None,
            generation: 0,
            task_tx,
        })
    }

    /// Number the next command.
    fn begin_command(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Abort the in-flight task, if any, and invalidate its result.
    ///
    /// Returns the generation of the aborted command. Its result may already
    /// sit in `task_rx`; it is dropped there, so the caller owes that command
    /// its `TaskFinished`.
    pub fn cancel_task(&mut self) -> Option<u64> {
        let task = self.current_task.take()?;
        task.handle.abort();
        info!("Cancelled in-flight request (gen: {})", task.generation);
        Some(task.generation)
    }

    /// Cancel the running task on behalf of command `by` and finish it.
    async fn supersede(&mut self, by: u64, ui_tx: &mpsc::Sender<UiUpdate>) {
        if let Some(old) = self.cancel_task() {
            info!("Request {} superseded by {}", old, by);
            notify(
                ui_tx,
                Notification::new(
                    "Request Superseded",
                    "The previous request was replaced by a newer one",
                    Severity::Info,
                ),
            )
            .await;
            finish(ui_tx, old).await;
        }
    }

    /// Replace whatever is running with `fut` as command `generation`.
    async fn spawn_task<F>(
        &mut self,
        generation: u64,
        label: &'static str,
        fut: F,
        ui_tx: &mpsc::Sender<UiUpdate>,
    ) where
        F: std::future::Future<Output = TaskOutcome> + Send + 'static,
    {
        self.supersede(generation, ui_tx).await;
        let tx = self.task_tx.clone();
        let handle = tokio::spawn(async move {
            let outcome = fut.await;
            if tx.send(TaskEvent { generation, outcome }).await.is_err() {
                debug!("task channel closed before {label} result was delivered");
            }
        });
        self.current_task = Some(RunningTask { generation, handle });
        info!("Started {} (gen: {})", label, generation);
    }

    fn demo_jitter(&self) -> DemoJitter {
        DemoJitter::new(self.config.demo.seed)
    }
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

/// Run the orchestrator until `Quit` or until the command channel closes.
///
/// Listens on two channels using `tokio::select!`:
/// 1. Results from spawned request tasks
/// 2. User commands
pub async fn run(
    mut task_rx: mpsc::Receiver<TaskEvent>,
    mut cmd_rx: mpsc::Receiver<AppCommand>,
    ui_tx: mpsc::Sender<UiUpdate>,
    mut state: AppState,
) -> anyhow::Result<()> {
    info!("Orchestrator loop started");

    loop {
        tokio::select! {
            // AppState holds a sender, so this channel never closes while we run.
            Some(event) = task_rx.recv() => {
                handle_task_event(&mut state, event, &ui_tx).await;
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(AppCommand::Quit) => {
                        info!("Quit command received, shutting down");
                        break;
                    }
                    Some(cmd) => {
                        handle_command(&mut state, cmd, &ui_tx).await;
                    }
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }
        }
    }

    if let Some(generation) = state.cancel_task() {
        debug!("Dropped unfinished request {} on shutdown", generation);
    }
    Ok(())
}

async fn notify(ui_tx: &mpsc::Sender<UiUpdate>, notification: Notification) {
    let _ = ui_tx.send(UiUpdate::Notification(notification)).await;
}

async fn finish(ui_tx: &mpsc::Sender<UiUpdate>, generation: u64) {
    let _ = ui_tx.send(UiUpdate::TaskFinished { generation }).await;
}

async fn set_connection(
    state: &mut AppState,
    status: ConnectionStatus,
    ui_tx: &mpsc::Sender<UiUpdate>,
) {
    if state.connection_status != status {
        info!("Backend connection: {:?} -> {:?}", state.connection_status, status);
        state.connection_status = status;
        let _ = ui_tx.send(UiUpdate::ConnectionChanged(status)).await;
    }
}

/// Gate for protected commands. Sends the denial notification itself.
async fn authorize(state: &AppState, ui_tx: &mpsc::Sender<UiUpdate>) -> bool {
    match state.session.require_authenticated() {
        Ok(session) => {
            debug!(username = %session.username, "session check passed");
            true
        }
        Err(e @ SessionError::NotAuthenticated) => {
            warn!("protected command rejected: not logged in");
            notify(ui_tx, Notification::error("Access Denied", e.to_string())).await;
            false
        }
        Err(e) => {
            error!("session store error: {e:#}");
            notify(ui_tx, Notification::error("Access Denied", e.to_string())).await;
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn handle_command(state: &mut AppState, cmd: AppCommand, ui_tx: &mpsc::Sender<UiUpdate>) {
    if matches!(cmd, AppCommand::Quit) {
        return;
    }
    let generation = state.begin_command();

    match cmd {
        AppCommand::CheckHealth => {
            let backend = Arc::clone(&state.backend);
            let task = async move { TaskOutcome::Health(backend.health().await) };
            state.spawn_task(generation, "health check", task, ui_tx).await;
        }

        AppCommand::LoadPitchers(league) => {
            let backend = Arc::clone(&state.backend);
            let task = async move {
                TaskOutcome::Pitchers {
                    league,
                    result: backend.pitchers(league).await,
                }
            };
            state.spawn_task(generation, "pitcher list", task, ui_tx).await;
        }

        AppCommand::GenerateReport(filters) => {
            if !authorize(state, ui_tx).await {
                finish(ui_tx, generation).await;
                return;
            }
            let request = match filters.validate() {
                Ok(r) => r,
                Err(e) => {
                    notify(ui_tx, Notification::error(e.title(), e.to_string())).await;
                    finish(ui_tx, generation).await;
                    return;
                }
            };
            let backend = Arc::clone(&state.backend);
            let task = async move { TaskOutcome::Analysis(backend.analyze(&request).await) };
            state.spawn_task(generation, "analysis", task, ui_tx).await;
        }

        AppCommand::ScoreLocalCsv { path, min_pitches } => {
            if !authorize(state, ui_tx).await {
                finish(ui_tx, generation).await;
                return;
            }
            let engine = state.engine.clone();
            let top_n = state.config.report.top_n;
            let task = async move {
                TaskOutcome::LocalReport(score_local_csv(&engine, path, min_pitches, top_n).await)
            };
            state.spawn_task(generation, "local CSV scoring", task, ui_tx).await;
        }

        AppCommand::UploadMilb { path, pitcher_id } => {
            if !authorize(state, ui_tx).await {
                finish(ui_tx, generation).await;
                return;
            }
            let upload = match CsvUpload::from_path(&path).await {
                Ok(u) => u,
                Err(e) => {
                    warn!("rejected upload {}: {}", path.display(), e);
                    let description = match e {
                        UploadError::InvalidMimeType { .. } => {
                            "Please select a valid CSV file".to_string()
                        }
                        other => other.to_string(),
                    };
                    notify(ui_tx, Notification::error("Invalid File", description)).await;
                    finish(ui_tx, generation).await;
                    return;
                }
            };
            let backend = Arc::clone(&state.backend);
            let file_name = upload.file_name().to_string();
            let task = async move {
                TaskOutcome::Upload {
                    file_name,
                    result: backend.upload_milb(upload, &pitcher_id).await,
                }
            };
            state.spawn_task(generation, "MiLB upload", task, ui_tx).await;
        }

        AppCommand::GenerateDemo(filters) => {
            if !authorize(state, ui_tx).await {
                finish(ui_tx, generation).await;
                return;
            }
            if !state.config.demo.enabled {
                notify(
                    ui_tx,
                    Notification::error(
                        "Demo Disabled",
                        "Set demo.enabled = true in config/dashboard.toml to use sample data",
                    ),
                )
                .await;
                finish(ui_tx, generation).await;
                return;
            }
            if let Err(e) = filters.validate() {
                notify(ui_tx, Notification::error(e.title(), e.to_string())).await;
                finish(ui_tx, generation).await;
                return;
            }
            state.supersede(generation, ui_tx).await;
            match build_demo_report(state, &filters) {
                Ok(report) => deliver_report(report, ui_tx).await,
                Err(e) => {
                    error!("demo report failed: {e:#}");
                    notify(ui_tx, Notification::error("Analysis Failed", format!("{e:#}"))).await;
                }
            }
            finish(ui_tx, generation).await;
        }

        AppCommand::Cancel => {
            if let Some(old) = state.cancel_task() {
                notify(
                    ui_tx,
                    Notification::new("Request Cancelled", "The request was cancelled", Severity::Info),
                )
                .await;
                finish(ui_tx, old).await;
            }
            finish(ui_tx, generation).await;
        }

        AppCommand::Quit => {}
    }
}

async fn deliver_report(report: CountTreeReport, ui_tx: &mpsc::Sender<UiUpdate>) {
    let description = format!(
        "Generated count tree analysis for {} pitches",
        report.metadata.total_pitches
    );
    info!(source = report.source.label(), "{}", description);
    let _ = ui_tx.send(UiUpdate::Report(Box::new(report))).await;
    notify(ui_tx, Notification::new("Analysis Complete", description, Severity::Success)).await;
}

fn build_demo_report(state: &AppState, filters: &FilterState) -> anyhow::Result<CountTreeReport> {
    let arsenal = sample_arsenal();
    let total_pitches = arsenal.iter().map(|p| u64::from(p.pitches)).sum();
    let by_count: BTreeMap<Count, _> = Count::all()
        .into_iter()
        .map(|count| (count, arsenal.clone()))
        .collect();
    let ranked = state
        .engine
        .recommend_all(&by_count, state.config.report.top_n)
        .context("failed to score demo arsenal")?;

    let metadata = ReportMetadata {
        pitcher_name: filters
            .pitcher
            .as_ref()
            .map(|p| p.label.clone())
            .unwrap_or_default(),
        opponent_name: filters.opponent_label(),
        years: filters.years.clone(),
        league: filters.league.to_string(),
        total_pitches,
    };
    CountTreeReport::from_demo(metadata, ranked, &state.demo_jitter())
        .context("failed to lay out demo report")
}

async fn score_local_csv(
    engine: &CountScoringEngine,
    path: PathBuf,
    min_pitches: u32,
    top_n: usize,
) -> anyhow::Result<CountTreeReport> {
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let by_count = aggregate_csv(bytes.as_slice(), min_pitches)
        .with_context(|| format!("failed to aggregate {}", path.display()))?;
    let total_pitches = by_count
        .values()
        .flatten()
        .map(|p| u64::from(p.pitches))
        .sum();
    let ranked = engine
        .recommend_all(&by_count, top_n)
        .context("failed to score pitches")?;

    let metadata = ReportMetadata {
        pitcher_name: path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        opponent_name: "All batters".to_string(),
        years: Vec::new(),
        league: "local".to_string(),
        total_pitches,
    };
    CountTreeReport::from_ranked(metadata, ranked).context("failed to lay out report")
}

// ---------------------------------------------------------------------------
// Task results
// ---------------------------------------------------------------------------

async fn handle_task_event(
    state: &mut AppState,
    event: TaskEvent,
    ui_tx: &mpsc::Sender<UiUpdate>,
) {
    match &state.current_task {
        Some(task) if task.generation == event.generation => {}
        _ => {
            debug!(
                "Discarding stale task result (event gen: {}, latest gen: {})",
                event.generation, state.generation
            );
            return;
        }
    }
    state.current_task = None;

    match event.outcome {
        TaskOutcome::Health(Ok(health)) => {
            let status = if health.is_healthy() {
                ConnectionStatus::Connected
            } else {
                ConnectionStatus::Disconnected
            };
            set_connection(state, status, ui_tx).await;
            let _ = ui_tx.send(UiUpdate::Health(health)).await;
        }
        TaskOutcome::Health(Err(e)) => {
            warn!("health check failed: {}", e);
            set_connection(state, ConnectionStatus::Disconnected, ui_tx).await;
            notify(ui_tx, Notification::error("Backend Unavailable", e.to_string())).await;
        }

        TaskOutcome::Pitchers { league, result: Ok(pitchers) } => {
            info!("Loaded {} {} pitchers", pitchers.len(), league);
            set_connection(state, ConnectionStatus::Connected, ui_tx).await;
            let _ = ui_tx.send(UiUpdate::Pitchers { league, pitchers }).await;
        }
        TaskOutcome::Pitchers { league, result: Err(e) } => {
            warn!("failed to load {} pitchers: {}", league, e);
            if e.is_connectivity() {
                set_connection(state, ConnectionStatus::Disconnected, ui_tx).await;
            }
            notify(ui_tx, Notification::error("Failed to Load Pitchers", e.to_string())).await;
        }

        TaskOutcome::Analysis(Ok(response)) => {
            set_connection(state, ConnectionStatus::Connected, ui_tx).await;
            match CountTreeReport::from_backend(&response, state.config.report.top_n) {
                Ok(report) => deliver_report(report, ui_tx).await,
                Err(e) => {
                    error!("count tree layout failed: {}", e);
                    notify(ui_tx, Notification::error("Analysis Failed", e.to_string())).await;
                }
            }
        }
        TaskOutcome::Analysis(Err(e)) => {
            warn!("analysis failed: {}", e);
            set_connection(state, ConnectionStatus::Disconnected, ui_tx).await;
            notify(ui_tx, Notification::error("Analysis Failed", e.to_string())).await;
        }

        TaskOutcome::LocalReport(Ok(report)) => deliver_report(report, ui_tx).await,
        TaskOutcome::LocalReport(Err(e)) => {
            warn!("local scoring failed: {e:#}");
            notify(ui_tx, Notification::error("Analysis Failed", format!("{e:#}"))).await;
        }

        TaskOutcome::Upload { file_name, result: Ok(response) } => {
            info!("Uploaded {} for pitcher {}", file_name, response.pitcher_id);
            set_connection(state, ConnectionStatus::Connected, ui_tx).await;
            notify(
                ui_tx,
                Notification::new(
                    "Upload Successful",
                    format!("MiLB data uploaded for pitcher {}", response.pitcher_id),
                    Severity::Success,
                ),
            )
            .await;
            let _ = ui_tx.send(UiUpdate::Uploaded(response)).await;
        }
        TaskOutcome::Upload { file_name, result: Err(e) } => {
            warn!("upload of {} failed: {}", file_name, e);
            if e.is_connectivity() {
                set_connection(state, ConnectionStatus::Disconnected, ui_tx).await;
            }
            notify(ui_tx, Notification::error("Upload Failed", e.to_string())).await;
        }
    }

    finish(ui_tx, event.generation).await;
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
