// Count-tree report: binds ranked pitches to the tree layout.
//
// Every report has all twelve nodes regardless of where the pitches came
// from (backend analysis, a local CSV, or demo data). Nodes with no pitches
// carry no rating.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::{debug, error};

use pitchtree_client::protocol::AnalysisResponse;
use pitchtree_core::count::{Count, CountError};
use pitchtree_core::demo::{DemoJitter, DisplayedPitch};
use pitchtree_core::metrics::{format_rate, RateMetric, ScoredPitch};
use pitchtree_core::scoring::{classify_on, rank_scored, Rating, ScoreScale, GOOD_THRESHOLD, POOR_THRESHOLD};
use pitchtree_core::tree::{CountTreeLayout, Edge, Point};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportSource {
    Backend,
    LocalCsv,
    Demo,
}

impl ReportSource {
    pub fn label(&self) -> &'static str {
        match self {
            ReportSource::Backend => "analytics backend",
            ReportSource::LocalCsv => "local CSV",
            ReportSource::Demo => "demo data",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub pitcher_name: String,
    pub opponent_name: String,
    pub years: Vec<String>,
    pub league: String,
    pub total_pitches: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportNode {
    pub count: Count,
    pub position: Point,
    pub rows: Vec<DisplayedPitch>,
    /// Rating of the top row; `None` when the count has no data.
    pub rating: Option<Rating>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountTreeReport {
    pub metadata: ReportMetadata,
    pub nodes: Vec<ReportNode>,
    pub edges: Vec<Edge>,
    pub scale: ScoreScale,
    pub source: ReportSource,
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

impl CountTreeReport {
    /// Build from a backend analysis. Rows with an unknown count are logged
    /// and dropped.
    pub fn from_backend(response: &AnalysisResponse, top_n: usize) -> Result<Self, CountError> {
        let scale = ScoreScale::detect(response.recommendations.iter().map(|r| r.score));

        let mut by_count: BTreeMap<Count, Vec<ScoredPitch>> = BTreeMap::new();
        for rec in &response.recommendations {
            let count = match rec.count.parse::<Count>() {
                Ok(c) => c,
                Err(e) => {
                    error!(pitch_type = %rec.pitch_type, "skipping recommendation: {e}");
                    continue;
                }
            };
            by_count.entry(count).or_default().push(ScoredPitch {
                metrics: rec.metrics(),
                count,
                score: rec.score,
                rank: 0,
            });
        }

        let rows = by_count
            .into_iter()
            .map(|(count, scored)| {
                let ranked = rank_scored(scored, top_n);
                (count, ranked.into_iter().map(DisplayedPitch::exact).collect())
            })
            .collect();

        let metadata = ReportMetadata {
            pitcher_name: response.pitcher_name.clone(),
            opponent_name: response.opponent_name.clone(),
            years: response.years.clone(),
            league: response.league.clone(),
            total_pitches: response.total_pitches,
        };
        assemble(metadata, rows, scale, ReportSource::Backend)
    }

    /// Build from locally scored pitches (already ranked per count).
    pub fn from_ranked(
        metadata: ReportMetadata,
        ranked: BTreeMap<Count, Vec<ScoredPitch>>,
    ) -> Result<Self, CountError> {
        let rows = ranked
            .into_iter()
            .map(|(count, scored)| (count, scored.into_iter().map(DisplayedPitch::exact).collect()))
            .collect();
        assemble(metadata, rows, ScoreScale::TenPoint, ReportSource::LocalCsv)
    }

    /// Build from demo scoring. Displayed rates are jittered; scores are not.
    pub fn from_demo(
        metadata: ReportMetadata,
        ranked: BTreeMap<Count, Vec<ScoredPitch>>,
        jitter: &DemoJitter,
    ) -> Result<Self, CountError> {
        let rows = ranked
            .into_iter()
            .enumerate()
            .map(|(i, (count, scored))| {
                // Separate stream per count so nodes don't share identical noise.
                let node_jitter = DemoJitter::new(jitter.seed().wrapping_add(i as u64));
                (count, node_jitter.perturb_display(&scored))
            })
            .collect();
        assemble(metadata, rows, ScoreScale::TenPoint, ReportSource::Demo)
    }

    pub fn node(&self, count: Count) -> Option<&ReportNode> {
        self.nodes.iter().find(|n| n.count == count)
    }

    /// Nodes that have at least one pitch.
    pub fn populated(&self) -> impl Iterator<Item = &ReportNode> {
        self.nodes.iter().filter(|n| !n.rows.is_empty())
    }
}

fn assemble(
    metadata: ReportMetadata,
    mut rows: BTreeMap<Count, Vec<DisplayedPitch>>,
    scale: ScoreScale,
    source: ReportSource,
) -> Result<CountTreeReport, CountError> {
    let layout = CountTreeLayout;
    let nodes = layout
        .nodes()?
        .into_iter()
        .map(|node| {
            let rows = rows.remove(&node.count).unwrap_or_default();
            let rating = rows.first().map(|r| classify_on(scale, r.scored.score));
            ReportNode {
                count: node.count,
                position: node.position,
                rows,
                rating,
            }
        })
        .collect::<Vec<_>>();

    debug!(
        source = source.label(),
        populated = nodes.iter().filter(|n| !n.rows.is_empty()).count(),
        "assembled count tree report"
    );

    Ok(CountTreeReport {
        metadata,
        nodes,
        edges: layout.edges(),
        scale,
        source,
    })
}

// ---------------------------------------------------------------------------
// Text rendering
// ---------------------------------------------------------------------------

fn format_score(scale: ScoreScale, score: f64) -> String {
    match scale {
        ScoreScale::TenPoint => format!("{score:.2}"),
        ScoreScale::Percentile => format!("{score:.1}"),
    }
}

/// Plain-text rendering of the tree, one block per count, showing the
/// selected metrics for each pitch.
pub fn render_text(report: &CountTreeReport, selected: &[RateMetric]) -> String {
    let mut out = String::new();
    let m = &report.metadata;
    let _ = writeln!(out, "Pitch count tree: {} vs {}", m.pitcher_name, m.opponent_name);
    let _ = writeln!(
        out,
        "League: {}  Years: {}  Pitches: {}  Source: {}",
        m.league.to_uppercase(),
        m.years.join(", "),
        m.total_pitches,
        report.source.label()
    );
    out.push('\n');

    let mut any_synthetic = false;
    for node in &report.nodes {
        let rating = node.rating.map(|r| r.label()).unwrap_or("No data");
        let _ = writeln!(
            out,
            "{} ({:+.1}, {:.1})  [{}]",
            node.count, node.position.x, node.position.y, rating
        );
        for row in &node.rows {
            let marker = if row.synthetic { "*" } else { "" };
            any_synthetic |= row.synthetic;
            let _ = write!(
                out,
                "  {}. {}{}  {}",
                row.scored.rank,
                row.displayed.pitch_type,
                marker,
                format_score(report.scale, row.scored.score)
            );
            for metric in selected {
                let _ = write!(
                    out,
                    "  {} {}",
                    metric.label(),
                    format_rate(row.displayed.rate(*metric))
                );
            }
            let _ = writeln!(out, "  ({} pitches)", row.displayed.pitches);
        }
    }

    out.push('\n');
    let (good, poor) = match report.scale {
        ScoreScale::TenPoint => (GOOD_THRESHOLD, POOR_THRESHOLD),
        ScoreScale::Percentile => (GOOD_THRESHOLD * 10.0, POOR_THRESHOLD * 10.0),
    };
    let _ = writeln!(
        out,
        "Legend: Good {good}+  Average {poor}-{good}  Poor <{poor}"
    );
    if any_synthetic {
        let _ = writeln!(out, "* demo data: displayed rates include random noise");
    }
    out
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
