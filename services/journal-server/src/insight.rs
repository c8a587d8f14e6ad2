//! Lesson text generation for the agent memory

use agent_memory::Lesson;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const INSIGHT_TIMEOUT_SECS: u64 = 10;

/// Opaque text generator; failures fall back to the detector's own lesson
#[async_trait]
pub trait InsightGenerator: Send + Sync {
    async fn generate(&self, trend: &str, recent_lessons: &[Lesson]) -> anyhow::Result<String>;
}

/// Deterministic offline generator
#[derive(Debug, Clone, Default)]
pub struct CannedInsight;

#[async_trait]
impl InsightGenerator for CannedInsight {
    async fn generate(&self, trend: &str, recent_lessons: &[Lesson]) -> anyhow::Result<String> {
        let advice = match trend {
            "LOSING_STREAK" => "Cut size and wait for an A-grade setup before trading again.",
            "FAVORABLE_HOUR" => "This session suits the strategy; prioritise it.",
            "STRATEGY_STRONG" => "Keep allocating to this strategy while its edge holds.",
            "STRATEGY_WEAK" => "Pause this strategy and review its entry rules.",
            _ => "Stick to the plan and journal every trade.",
        };
        let seen = recent_lessons.iter().filter(|l| l.trend_context == trend).count();
        if seen > 0 {
            Ok(format!("{} Seen {} time(s) recently.", advice, seen))
        } else {
            Ok(advice.to_string())
        }
    }
}

#[derive(Serialize)]
struct InsightRequest<'a> {
    trend: &'a str,
    lessons: Vec<&'a str>,
}

#[derive(Deserialize)]
struct InsightResponse {
    insight: String,
}

/// Posts the trend and recent lessons to an external text service
#[derive(Clone)]
pub struct HttpInsightGenerator {
    client: Client,
    url: String,
}

impl HttpInsightGenerator {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(INSIGHT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl InsightGenerator for HttpInsightGenerator {
    async fn generate(&self, trend: &str, recent_lessons: &[Lesson]) -> anyhow::Result<String> {
        let body = InsightRequest {
            trend,
            lessons: recent_lessons.iter().map(|l| l.insight.as_str()).collect(),
        };
        let response = self.client.post(&self.url).json(&body).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("insight service returned {}", response.status());
        }

        let parsed: InsightResponse = response.json().await?;
        let insight = parsed.insight.trim();
        if insight.is_empty() {
            anyhow::bail!("insight service returned empty text");
        }
        Ok(insight.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_memory::AgentMemory;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_canned_is_deterministic() {
        let mut memory = AgentMemory::seed();
        memory.add_lesson("old", "LOSING_STREAK");
        let a = CannedInsight.generate("LOSING_STREAK", &memory.lessons).await.unwrap();
        let b = CannedInsight.generate("LOSING_STREAK", &memory.lessons).await.unwrap();
        assert_eq!(a, b);
        assert!(a.contains("1 time(s)"));
    }

    #[tokio::test]
    async fn test_http_generator_posts_trend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/insight"))
            .and(body_partial_json(serde_json::json!({ "trend": "STRATEGY_WEAK" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "insight": " Review entries. " })))
            .expect(1)
            .mount(&server)
            .await;

        let generator = HttpInsightGenerator::new(&format!("{}/insight", server.uri())).unwrap();
        let text = generator.generate("STRATEGY_WEAK", &[]).await.unwrap();
        assert_eq!(text, "Review entries.");
    }

    #[tokio::test]
    async fn test_http_generator_surfaces_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let generator = HttpInsightGenerator::new(&server.uri()).unwrap();
        assert!(generator.generate("LOSING_STREAK", &[]).await.is_err());
    }
}
