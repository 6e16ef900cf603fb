use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::bands::BandCount;
use crate::charts::{self, ChartArtifact, ChartSlot};
use crate::config::Setup;
use crate::error::{RenderingUnavailable, SchemaError, SusError};
use crate::grouping::group_all;
use crate::ingest::Dataset;
use crate::layout::{ReportAssembler, ReportContent, ReportDocument};
use crate::models::{
    CategoryGroup, SampleStatistics, ScoredResponse, SurveyResponse, MAX_ATTRIBUTES,
};
use crate::render::{ChartRenderer, RasterImage};
use crate::scoring::score_sample;
use crate::stats::aggregate;
use crate::summary::{build_prompt, request_summary, SummaryOutcome, SummaryProvider};

/// Private state of a single report request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub setup: Setup,
    pub responses: Vec<SurveyResponse>,
    pub attributes: Vec<String>,
}

impl RequestContext {
    pub fn new(setup: Setup, responses: Vec<SurveyResponse>, attributes: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            setup,
            responses,
            attributes,
        }
    }

    pub fn from_dataset(setup: &Setup, dataset: &Dataset) -> Self {
        Self::new(setup.clone(), dataset.responses.clone(), dataset.attribute_names())
    }
}

#[derive(Debug, Clone)]
pub struct Analysis {
    pub scored: Vec<ScoredResponse>,
    pub stats: SampleStatistics,
    pub band_counts: Vec<BandCount>,
    pub acceptability_counts: Vec<BandCount>,
    pub groups: Vec<CategoryGroup>,
}

/// Scores, aggregates, classifies and groups. Only schema problems fail.
pub fn analyze(
    responses: &[SurveyResponse],
    attributes: &[String],
    setup: &Setup,
) -> Result<Analysis, SchemaError> {
    let scored = score_sample(responses)?;
    let stats = aggregate(&scored, &setup.config.thresholds);
    let scores = || scored.iter().map(|response| response.score);
    let band_counts = setup.bands.distribution(scores());
    let acceptability_counts = setup.acceptability.distribution(scores());

    let attributes = if attributes.len() > MAX_ATTRIBUTES {
        warn!(
            supplied = attributes.len(),
            kept = MAX_ATTRIBUTES,
            "too many category attributes, keeping the first ones"
        );
        &attributes[..MAX_ATTRIBUTES]
    } else {
        attributes
    };
    let groups = group_all(&scored, attributes);

    info!(
        respondents = stats.count,
        mean = stats.mean,
        scheme = %setup.bands.name,
        "analysis complete"
    );
    Ok(Analysis {
        scored,
        stats,
        band_counts,
        acceptability_counts,
        groups,
    })
}

/// Chart descriptions for every report slot that has data.
pub fn build_charts(analysis: &Analysis, setup: &Setup) -> Vec<(ChartSlot, ChartArtifact)> {
    let labels = setup.config.language.labels();
    let mut artifacts = Vec::new();

    if analysis.stats.is_empty() {
        warn!("empty sample, only category charts can be built");
    } else {
        let mean = analysis.stats.mean;
        artifacts.push((
            ChartSlot::ScoreGauge,
            charts::gauge(labels.score_chart, mean, &setup.bands),
        ));
        artifacts.push((
            ChartSlot::AcceptabilityGauge,
            charts::gauge(labels.acceptability_chart, mean, &setup.acceptability),
        ));
        artifacts.push((
            ChartSlot::Histogram,
            charts::histogram(
                labels.histogram_chart,
                &analysis.scored,
                &analysis.stats,
                setup.config.histogram_bins,
            ),
        ));
        artifacts.push((ChartSlot::Radar, charts::radar(labels.radar_chart, &analysis.scored)));
        artifacts.push((
            ChartSlot::BandDistribution,
            charts::band_distribution(labels.distribution_chart, &analysis.band_counts),
        ));
    }

    for (index, group) in analysis.groups.iter().enumerate() {
        match charts::category_bars(group, index) {
            Some(artifact) => artifacts.push((ChartSlot::Category(index), artifact)),
            None => warn!(attribute = %group.attribute, "category has no data, chart skipped"),
        }
    }
    artifacts
}

/// Renders one artifact on the blocking pool, bounded by `timeout`.
pub async fn render_chart(
    renderer: Arc<dyn ChartRenderer>,
    artifact: ChartArtifact,
    timeout: Duration,
) -> Result<RasterImage, RenderingUnavailable> {
    let task = tokio::task::spawn_blocking(move || renderer.render(&artifact));
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(RenderingUnavailable::Worker(join.to_string())),
        Err(_) => Err(RenderingUnavailable::Timeout {
            what: "chart rendering",
            after: timeout,
        }),
    }
}

/// Drives `future` on a fresh multi-thread runtime. A render worker abandoned
/// after its timeout keeps its blocking thread, so shutdown waits at most
/// `grace` for it instead of joining it.
pub fn block_on_with_grace<F: Future>(future: F, grace: Duration) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(grace);
    Ok(output)
}

/// Renders every artifact in order, dropping the ones that fail.
pub async fn render_charts(
    renderer: Arc<dyn ChartRenderer>,
    artifacts: &[(ChartSlot, ChartArtifact)],
    timeout: Duration,
) -> BTreeMap<ChartSlot, RasterImage> {
    let mut images = BTreeMap::new();
    for (slot, artifact) in artifacts {
        match render_chart(Arc::clone(&renderer), artifact.clone(), timeout).await {
            Ok(image) => {
                images.insert(*slot, image);
            }
            Err(err) => {
                warn!(slot = ?slot, error = %err, "chart unavailable, zone will be omitted")
            }
        }
    }
    images
}

/// External collaborators for one run.
pub struct Collaborators {
    pub renderer: Arc<dyn ChartRenderer>,
    pub summary: Option<Box<dyn SummaryProvider>>,
}

#[derive(Debug, Clone)]
pub struct ReportOutput {
    pub request_id: Uuid,
    pub analysis: Analysis,
    pub artifacts: Vec<(ChartSlot, ChartArtifact)>,
    pub images: BTreeMap<ChartSlot, RasterImage>,
    pub summary: SummaryOutcome,
    pub document: ReportDocument,
}

pub async fn generate_report(
    context: &RequestContext,
    collaborators: &Collaborators,
) -> Result<ReportOutput, SusError> {
    let setup = &context.setup;
    let analysis = analyze(&context.responses, &context.attributes, setup)?;
    let artifacts = build_charts(&analysis, setup);
    let images = render_charts(
        Arc::clone(&collaborators.renderer),
        &artifacts,
        setup.config.render.timeout(),
    )
    .await;

    let summary = if analysis.stats.is_empty() {
        SummaryOutcome::Unavailable("empty sample".to_string())
    } else {
        let prompt = build_prompt(&analysis.stats, &analysis.band_counts, &analysis.groups);
        request_summary(
            collaborators.summary.as_deref(),
            &prompt,
            setup.config.summary.timeout(),
        )
        .await
    };

    let labels = setup.config.language.labels();
    let assembler =
        ReportAssembler::new(&setup.config.page, labels, context.id, context.created_at);
    let category_titles: Vec<String> = analysis
        .groups
        .iter()
        .map(|group| group.attribute.clone())
        .collect();
    let document = assembler.assemble(&ReportContent {
        stats: &analysis.stats,
        band_counts: &analysis.band_counts,
        images: &images,
        category_titles: &category_titles,
        prose: summary.text(),
    });

    info!(
        request = %context.id,
        charts = images.len(),
        of = artifacts.len(),
        pages = document.pages.len(),
        "report assembled"
    );
    Ok(ReportOutput {
        request_id: context.id,
        analysis,
        artifacts,
        images,
        summary,
        document,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalysisConfig, BandChoice};
    use crate::models::{AttributeValue, ITEM_COUNT};
    use crate::render::RasterRenderer;

    fn setup() -> Setup {
        AnalysisConfig::default()
            .with_bands(BandChoice::SixZone)
            .validate()
            .unwrap()
    }

    fn sample() -> Vec<SurveyResponse> {
        (0..12)
            .map(|i| {
                let answer = if i % 2 == 0 { 4 } else { 2 };
                let team = if i < 6 { "Ops" } else { "Dev" };
                let items = [answer, 2, answer, 2, answer, 2, answer, 2, answer, 2];
                SurveyResponse::complete(format!("r{i}"), items)
                    .with_attribute("Team", Some(AttributeValue::Text(team.into())))
                    .with_attribute("Notes", None)
            })
            .collect()
    }

    struct Broken;

    impl ChartRenderer for Broken {
        fn render(&self, _artifact: &ChartArtifact) -> Result<RasterImage, RenderingUnavailable> {
            Err(RenderingUnavailable::renderer("backend offline"))
        }
    }

    struct Sluggish;

    impl ChartRenderer for Sluggish {
        fn render(&self, artifact: &ChartArtifact) -> Result<RasterImage, RenderingUnavailable> {
            if matches!(artifact, ChartArtifact::Radar(_)) {
                std::thread::sleep(Duration::from_millis(300));
            }
            Ok(RasterImage::png(vec![1, 2, 3], 400, 200))
        }
    }

    struct Hanging;

    impl ChartRenderer for Hanging {
        fn render(&self, _artifact: &ChartArtifact) -> Result<RasterImage, RenderingUnavailable> {
            std::thread::sleep(Duration::from_secs(10));
            Ok(RasterImage::png(vec![1], 1, 1))
        }
    }

    #[test]
    fn hung_renderer_does_not_hold_runtime_shutdown() {
        let started = std::time::Instant::now();
        let result = block_on_with_grace(
            render_chart(
                Arc::new(Hanging),
                charts::radar("Items", &[]),
                Duration::from_millis(50),
            ),
            Duration::from_millis(100),
        )
        .unwrap();
        assert!(matches!(result, Err(RenderingUnavailable::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn analysis_keeps_empty_groups_aligned() {
        let analysis = analyze(&sample(), &["Team".into(), "Notes".into()], &setup()).unwrap();
        assert_eq!(analysis.stats.count, 12);
        assert_eq!(analysis.groups.len(), 2);
        assert!(analysis.groups[0].is_renderable());
        assert!(!analysis.groups[1].is_renderable());

        let slots: Vec<ChartSlot> = build_charts(&analysis, &setup())
            .into_iter()
            .map(|(slot, _)| slot)
            .collect();
        assert!(slots.contains(&ChartSlot::Category(0)));
        assert!(!slots.contains(&ChartSlot::Category(1)));
        assert_eq!(slots.len(), 6);
    }

    #[test]
    fn analysis_fails_fast_on_missing_item() {
        let mut responses = sample();
        responses[3].items[7] = None;
        let err = analyze(&responses, &[], &setup()).unwrap_err();
        assert!(matches!(err, SchemaError::MissingItem { item: 8, .. }));
    }

    #[test]
    fn empty_sample_builds_no_score_charts() {
        let analysis = analyze(&[], &[], &setup()).unwrap();
        assert!(analysis.stats.is_empty());
        assert!(build_charts(&analysis, &setup()).is_empty());
    }

    #[tokio::test]
    async fn failed_renderer_still_yields_a_report() {
        let context = RequestContext::new(setup(), sample(), vec!["Team".into()]);
        let collaborators = Collaborators {
            renderer: Arc::new(Broken),
            summary: None,
        };
        let output = generate_report(&context, &collaborators).await.unwrap();
        assert!(output.images.is_empty());
        assert!(output.document.has_table());
        assert_eq!(output.document.id, context.id);
        assert!(matches!(output.summary, SummaryOutcome::Unavailable(_)));
    }

    #[tokio::test]
    async fn slow_chart_is_dropped_after_timeout() {
        let artifacts = build_charts(&analyze(&sample(), &[], &setup()).unwrap(), &setup());
        let images =
            render_charts(Arc::new(Sluggish), &artifacts, Duration::from_millis(100)).await;
        assert!(!images.contains_key(&ChartSlot::Radar));
        assert!(images.contains_key(&ChartSlot::ScoreGauge));
    }

    #[tokio::test]
    async fn full_run_with_builtin_renderer() {
        let context = RequestContext::new(setup(), sample(), vec!["Team".into()]);
        let collaborators = Collaborators {
            renderer: Arc::new(RasterRenderer { scale: 1 }),
            summary: None,
        };
        let output = generate_report(&context, &collaborators).await.unwrap();
        assert_eq!(output.images.len(), output.artifacts.len());
        assert_eq!(output.document.images().count(), output.images.len());
        assert_eq!(output.analysis.scored[0].items.len(), ITEM_COUNT);
    }
}
