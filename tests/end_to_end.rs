use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use sus_report::charts::ChartSlot;
use sus_report::config::{AnalysisConfig, BandChoice, Setup};
use sus_report::ingest;
use sus_report::labels::Language;
use sus_report::layout::Element;
use sus_report::pipeline::{generate_report, Collaborators, RequestContext};
use sus_report::render::RasterRenderer;
use sus_report::report::{write_bundle, CHARTS_DIR, DOCUMENT_FILE, MARKDOWN_FILE};
use sus_report::summary::{ChatCompletionsClient, SummaryOutcome};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn setup(bands: BandChoice) -> Setup {
    AnalysisConfig::default().with_bands(bands).validate().unwrap()
}

fn neutral_survey(rows: usize) -> String {
    let mut csv = String::from("id,Q1,Q2,Q3,Q4,Q5,Q6,Q7,Q8,Q9,Q10,Age,Team\n");
    for row in 0..rows {
        let team = ["Ops", "Dev", "Sales"][row % 3];
        let _ = writeln!(csv, "p{row},3,3,3,3,3,3,3,3,3,3,{},{team}", 20 + row);
    }
    csv
}

#[test]
fn twenty_seven_neutral_respondents_score_fifty() {
    let setup = setup(BandChoice::SixZone);
    let dataset = ingest::read_bytes(neutral_survey(27).as_bytes(), &setup.config).unwrap();
    assert_eq!(dataset.responses.len(), 27);

    let analysis =
        sus_report::analyze(&dataset.responses, &dataset.attribute_names(), &setup).unwrap();
    assert!(analysis.scored.iter().all(|scored| scored.adjusted == [2; 10]));
    assert!(analysis.scored.iter().all(|scored| scored.score == 50.0));
    assert_eq!(analysis.stats.count, 27);
    assert_eq!(analysis.stats.mean, 50.0);
    assert_eq!(analysis.stats.std_dev, 0.0);
    assert_eq!(analysis.stats.min, 50.0);
    assert_eq!(analysis.stats.max, 50.0);

    let acceptable = analysis
        .band_counts
        .iter()
        .find(|entry| entry.count > 0)
        .unwrap();
    assert_eq!(acceptable.band.label, "Acceptable");
    assert_eq!(acceptable.count, 27);

    // 27 ages fall in the n < 100 rule: six quantile buckets.
    assert_eq!(analysis.groups[0].attribute, "Age");
    assert_eq!(analysis.groups[0].buckets.len(), 6);
    assert_eq!(analysis.groups[0].total(), 27);
    let teams: Vec<&str> = analysis.groups[1]
        .buckets
        .iter()
        .map(|bucket| bucket.label.as_str())
        .collect();
    assert_eq!(teams, vec!["Dev", "Ops", "Sales"]);
}

#[test]
fn missing_item_column_is_reported_before_scoring() {
    let setup = setup(BandChoice::Bangor);
    let csv = "id,Q1,Q2,Q3,Q4,Q5,Q6,Q7,Q8,Q9,Team\np1,3,3,3,3,3,3,3,3,3,Ops\n";
    let err = ingest::read_bytes(csv.as_bytes(), &setup.config).unwrap_err();
    assert!(err.to_string().contains("Q10"), "{err}");
}

#[test]
fn unconfigured_band_scheme_is_fatal() {
    let err = AnalysisConfig::default().validate().unwrap_err();
    assert!(matches!(err, sus_report::ConfigurationError::BandSchemeNotChosen));
}

#[tokio::test]
async fn report_bundle_contains_document_markdown_and_charts() {
    let setup = setup(BandChoice::SixZone);
    let dataset = ingest::read_bytes(neutral_survey(27).as_bytes(), &setup.config).unwrap();
    let context = RequestContext::from_dataset(&setup, &dataset);
    let collaborators = Collaborators {
        renderer: Arc::new(RasterRenderer { scale: 1 }),
        summary: None,
    };

    let output = generate_report(&context, &collaborators).await.unwrap();
    let pages = output.document.pages.len();
    assert_eq!(pages, 2);
    let slots = |index: usize| {
        output.document.pages[index]
            .images()
            .map(|(slot, _, _)| *slot)
            .collect::<Vec<_>>()
    };
    assert_eq!(
        slots(0),
        vec![
            ChartSlot::ScoreGauge,
            ChartSlot::AcceptabilityGauge,
            ChartSlot::Histogram,
            ChartSlot::Radar,
        ]
    );
    assert_eq!(
        slots(1),
        vec![
            ChartSlot::BandDistribution,
            ChartSlot::Category(0),
            ChartSlot::Category(1),
        ]
    );

    let dir = tempfile::tempdir().unwrap();
    let bundle = write_bundle(&output, Language::En.labels(), dir.path()).unwrap();
    assert_eq!(bundle.charts.len(), output.images.len());
    assert!(dir.path().join(CHARTS_DIR).join("score_gauge.png").exists());
    assert!(dir.path().join(CHARTS_DIR).join("category_2.png").exists());

    let raw = std::fs::read_to_string(dir.path().join(DOCUMENT_FILE)).unwrap();
    let document: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(document["id"], json!(context.id.to_string()));
    assert_eq!(document["pages"].as_array().unwrap().len(), pages);
    assert!(!raw.contains("\"bytes\""));

    let markdown = std::fs::read_to_string(dir.path().join(MARKDOWN_FILE)).unwrap();
    assert!(markdown.starts_with("# SUS analysis report"));
    assert!(markdown.contains("![Mean SUS score](charts/score_gauge.png)"));
    assert!(markdown.contains("_Written analysis unavailable_"));
}

#[tokio::test]
async fn written_analysis_adds_a_final_page() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "content": "Scores sit at the acceptable threshold.\n\nImprove onboarding."
                }
            }]
        })))
        .mount(&server)
        .await;

    let setup = setup(BandChoice::SixZone);
    let dataset = ingest::read_bytes(neutral_survey(9).as_bytes(), &setup.config).unwrap();
    let context = RequestContext::from_dataset(&setup, &dataset);
    let client = ChatCompletionsClient::with_config(
        "sk-test",
        server.uri(),
        "gpt-4o-mini",
        500,
        Duration::from_secs(5),
    )
    .unwrap();
    let collaborators = Collaborators {
        renderer: Arc::new(RasterRenderer { scale: 1 }),
        summary: Some(Box::new(client)),
    };

    let output = generate_report(&context, &collaborators).await.unwrap();
    assert!(matches!(output.summary, SummaryOutcome::Ready(_)));
    assert_eq!(output.document.pages.len(), 3);
    let last = output.document.pages.last().unwrap();
    let texts: Vec<&str> = last
        .elements
        .iter()
        .filter_map(|element| match element {
            Element::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert!(texts.contains(&"Analysis"));
    assert!(texts.contains(&"Improve onboarding."));
    assert_eq!(last.images().count(), 0);
    assert!(output.images.contains_key(&ChartSlot::Category(1)));
}
