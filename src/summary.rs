//! Best-effort prose summary from an external text-generation service.
//!
//! Failures never propagate: [`request_summary`] folds every error and
//! timeout into [`SummaryOutcome::Unavailable`].

use std::fmt::Write;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bands::BandCount;
use crate::config::SummaryConfig;
use crate::error::RenderingUnavailable;
use crate::models::{CategoryGroup, SampleStatistics};

const SYSTEM_PROMPT: &str = "You are a concise, professional UX expert.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SummaryOutcome {
    Ready(String),
    Unavailable(String),
}

impl SummaryOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            SummaryOutcome::Ready(text) => Some(text),
            SummaryOutcome::Unavailable(_) => None,
        }
    }
}

#[async_trait]
pub trait SummaryProvider: Send + Sync {
    async fn summarize(&self, prompt: &str) -> Result<String, RenderingUnavailable>;
}

pub fn build_prompt(
    stats: &SampleStatistics,
    bands: &[BandCount],
    groups: &[CategoryGroup],
) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Analyse the results of a System Usability Scale (SUS) survey and write a short \
         interpretation for a product team: overall usability level, notable differences \
         between respondent groups, and two or three recommendations."
    );
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Sample statistics:");
    let _ = writeln!(prompt, "- responses: {}", stats.count);
    let _ = writeln!(prompt, "- mean score: {:.1}", stats.mean);
    let _ = writeln!(prompt, "- median: {:.1}", stats.median);
    let _ = writeln!(prompt, "- standard deviation: {:.2}", stats.std_dev);
    let _ = writeln!(prompt, "- min / max: {:.1} / {:.1}", stats.min, stats.max);
    let _ = writeln!(
        prompt,
        "- Q1 / Q3 / IQR: {:.1} / {:.1} / {:.1}",
        stats.q1, stats.q3, stats.iqr
    );
    for share in &stats.thresholds {
        let _ = writeln!(prompt, "- responses >= {:.0}: {:.1}%", share.cutoff, share.percent);
    }

    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Band distribution:");
    for entry in bands {
        let _ = writeln!(
            prompt,
            "- {} ({}): {} responses ({:.1}%)",
            entry.band.label,
            entry.band.range_label(),
            entry.count,
            entry.percent
        );
    }

    for group in groups.iter().filter(|group| group.is_renderable()) {
        let _ = writeln!(prompt);
        let _ = writeln!(prompt, "Mean score by {}:", group.attribute);
        for bucket in &group.buckets {
            let _ = writeln!(
                prompt,
                "- {}: {:.1} (n={})",
                bucket.label, bucket.mean_score, bucket.count
            );
        }
    }
    prompt
}

/// Runs the provider under `timeout`. Never fails.
pub async fn request_summary(
    provider: Option<&dyn SummaryProvider>,
    prompt: &str,
    timeout: Duration,
) -> SummaryOutcome {
    let Some(provider) = provider else {
        return SummaryOutcome::Unavailable("no summary provider configured".to_string());
    };

    let result = match tokio::time::timeout(timeout, provider.summarize(prompt)).await {
        Ok(result) => result,
        Err(_) => Err(RenderingUnavailable::Timeout {
            what: "summary request",
            after: timeout,
        }),
    };

    match result {
        Ok(text) if !text.trim().is_empty() => {
            info!(chars = text.len(), "received prose summary");
            SummaryOutcome::Ready(text.trim().to_string())
        }
        Ok(_) => {
            warn!("summary service returned empty text");
            SummaryOutcome::Unavailable("empty response".to_string())
        }
        Err(err) => {
            warn!(error = %err, "prose summary unavailable");
            SummaryOutcome::Unavailable(err.to_string())
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl ChatCompletionsClient {
    pub fn with_config(
        api_key: &str,
        base_url: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, RenderingUnavailable> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| RenderingUnavailable::NotConfigured("invalid API key format".into()))?;
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| RenderingUnavailable::NotConfigured(format!("http client: {err}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            max_tokens,
        })
    }

    /// Reads the API key from the environment variable named in the config.
    pub fn from_config(config: &SummaryConfig) -> Result<Self, RenderingUnavailable> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            RenderingUnavailable::NotConfigured(format!("{} not set", config.api_key_env))
        })?;
        Self::with_config(
            &api_key,
            config.base_url.clone(),
            config.model.clone(),
            config.max_tokens,
            config.timeout(),
        )
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl SummaryProvider for ChatCompletionsClient {
    async fn summarize(&self, prompt: &str) -> Result<String, RenderingUnavailable> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(self.chat_url())
            .json(&body)
            .send()
            .await
            .map_err(|err| RenderingUnavailable::summary(format!("request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(RenderingUnavailable::summary(format!(
                "HTTP {}: {}",
                status.as_u16(),
                detail.chars().take(200).collect::<String>()
            )));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| RenderingUnavailable::summary(format!("invalid response body: {err}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RenderingUnavailable::summary("response carried no choices"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bands::BandScheme;
    use crate::labels::Language;
    use crate::models::{Binning, Bucket, ThresholdShare};

    struct Fixed(&'static str);

    #[async_trait]
    impl SummaryProvider for Fixed {
        async fn summarize(&self, _prompt: &str) -> Result<String, RenderingUnavailable> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl SummaryProvider for Failing {
        async fn summarize(&self, _prompt: &str) -> Result<String, RenderingUnavailable> {
            Err(RenderingUnavailable::summary("HTTP 500"))
        }
    }

    struct Slow;

    #[async_trait]
    impl SummaryProvider for Slow {
        async fn summarize(&self, _prompt: &str) -> Result<String, RenderingUnavailable> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".to_string())
        }
    }

    #[test]
    fn prompt_lists_statistics_bands_and_groups() {
        let stats = SampleStatistics {
            count: 27,
            mean: 50.0,
            thresholds: vec![ThresholdShare {
                cutoff: 70.0,
                percent: 0.0,
            }],
            ..SampleStatistics::default()
        };
        let bands = BandScheme::six_zone(Language::En).distribution(vec![50.0; 27]);
        let group = CategoryGroup {
            attribute: "Team".into(),
            kind: None,
            binning: Binning::Distinct,
            buckets: vec![Bucket {
                label: "Ops".into(),
                lower: None,
                upper: None,
                mean_score: 50.0,
                count: 27,
            }],
        };
        let prompt = build_prompt(&stats, &bands, &[group, CategoryGroup::empty("Age")]);
        assert!(prompt.contains("- responses: 27"));
        assert!(prompt.contains("- responses >= 70: 0.0%"));
        assert!(prompt.contains("- Acceptable (39–52): 27 responses (100.0%)"));
        assert!(prompt.contains("Mean score by Team:"));
        assert!(!prompt.contains("Mean score by Age:"));
    }

    #[tokio::test]
    async fn ready_when_provider_answers() {
        let outcome =
            request_summary(Some(&Fixed("  Solid usability.  ")), "p", Duration::from_secs(1))
                .await;
        assert_eq!(outcome, SummaryOutcome::Ready("Solid usability.".to_string()));
    }

    #[tokio::test]
    async fn unavailable_on_error_missing_provider_or_timeout() {
        let failed = request_summary(Some(&Failing), "p", Duration::from_secs(1)).await;
        assert!(matches!(
            failed,
            SummaryOutcome::Unavailable(ref reason) if reason.contains("HTTP 500")
        ));

        let missing = request_summary(None, "p", Duration::from_secs(1)).await;
        assert!(missing.text().is_none());

        let slow = request_summary(Some(&Slow), "p", Duration::from_millis(20)).await;
        assert!(matches!(
            slow,
            SummaryOutcome::Unavailable(ref reason) if reason.contains("timed out")
        ));
    }
}
