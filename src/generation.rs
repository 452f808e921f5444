//! Synthetic fraud data generation
//!
//! Asks the generative model for transaction records in small batches,
//! normalizes what comes back and stores the result as one JSON document
//! under the synthetic data prefix, where the reconciler picks it up.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::models::{GeneratedTransaction, GenerationReport, GenerationRequest, SyntheticRecord};
use crate::pipeline::{PipelineError, PipelineResult};
use crate::services::{GenerationPrompt, ObjectStore, ObjectUri, ServiceError, TextGenerator};

const GENERATED_CONTENT_TYPE: &str = "application/json";

static FENCED_JSON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```json\s*(\[[\s\S]*?\])\s*```").expect("valid fenced json regex"));

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub bucket: String,
    /// Key prefix for generated files, e.g. `synthetic-fraud/`
    pub output_prefix: String,
    /// Records requested per model call
    pub max_batch_size: usize,
    /// Pause between model calls
    pub batch_delay: Duration,
}

#[derive(Debug, Error)]
enum BatchError {
    #[error("model invocation failed: {0}")]
    Invoke(#[from] ServiceError),

    #[error("model output is not a JSON record array: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("model returned no records")]
    Empty,
}

pub struct SyntheticGenerator {
    model: Arc<dyn TextGenerator>,
    store: Arc<dyn ObjectStore>,
    config: GeneratorConfig,
}

impl SyntheticGenerator {
    pub fn new(model: Arc<dyn TextGenerator>, store: Arc<dyn ObjectStore>, config: GeneratorConfig) -> Self {
        Self { model, store, config }
    }

    /// Generate up to `request.count` records and store them.
    ///
    /// A failed batch is counted and reported, then retried as part of the
    /// next attempt. Attempts stop at twice the planned batch count.
    pub async fn generate(&self, request: &GenerationRequest) -> PipelineResult<GenerationReport> {
        let requested = request.count as usize;
        let batch_size = self.config.max_batch_size.max(1);
        let max_attempts = (requested.div_ceil(batch_size) * 2) as u32;

        tracing::info!(
            fraud_type = %request.fraud_type,
            count = requested,
            "Starting synthetic fraud generation"
        );

        let mut generated: Vec<GeneratedTransaction> = Vec::with_capacity(requested);
        let mut attempts = 0u32;
        let mut failures = Vec::new();

        while generated.len() < requested && attempts < max_attempts {
            if attempts > 0 && !self.config.batch_delay.is_zero() {
                tokio::time::sleep(self.config.batch_delay).await;
            }
            attempts += 1;

            let wanted = (requested - generated.len()).min(batch_size);
            match self.generate_batch(request, wanted).await {
                Ok(mut batch) => {
                    batch.truncate(wanted);
                    generated.extend(batch);
                    tracing::info!(
                        batch = attempts,
                        total = generated.len(),
                        requested,
                        "Generated synthetic batch"
                    );
                }
                Err(e) => {
                    tracing::warn!(batch = attempts, error = %e, "Synthetic batch failed");
                    failures.push(format!("batch {}: {}", attempts, e));
                }
            }
        }

        let mut report = GenerationReport {
            status: String::new(),
            requested: request.count,
            generated: generated.len(),
            batches_attempted: attempts,
            batches_failed: failures.len() as u32,
            failures,
            location: None,
        };

        if generated.is_empty() {
            tracing::warn!(fraud_type = %request.fraud_type, "No synthetic fraud data could be generated");
            report.status = "No synthetic fraud data could be generated.".to_string();
            return Ok(report);
        }

        let now = Utc::now();
        let records = post_process(generated, now);
        let body = serde_json::to_vec_pretty(&records)
            .map_err(|e| PipelineError::InvariantViolation(format!("unserializable synthetic records: {}", e)))?;

        let location = ObjectUri::new(
            self.config.bucket.clone(),
            format!(
                "{}{}_{}.json",
                self.config.output_prefix,
                key_safe(&request.fraud_type),
                now.timestamp_millis()
            ),
        );
        self.store
            .put(&location, body, GENERATED_CONTENT_TYPE)
            .await
            .map_err(|e| PipelineError::external("object-store", e))?;

        tracing::info!(location = %location, records = records.len(), "Synthetic fraud data stored");

        report.status = if records.len() == requested {
            format!("Generated and stored {} synthetic fraud records to {}", records.len(), location)
        } else {
            format!(
                "Generated and stored {} of {} requested synthetic fraud records to {} ({} batches failed)",
                records.len(),
                requested,
                location,
                report.batches_failed
            )
        };
        report.location = Some(location.to_string());
        Ok(report)
    }

    async fn generate_batch(
        &self,
        request: &GenerationRequest,
        count: usize,
    ) -> Result<Vec<GeneratedTransaction>, BatchError> {
        let prompt = build_prompt(&request.fraud_type, count, request.additional_details.as_deref());
        let content = self.model.complete(&prompt).await?;
        let batch: Vec<GeneratedTransaction> = serde_json::from_str(extract_json_array(&content))?;
        if batch.is_empty() {
            return Err(BatchError::Empty);
        }
        Ok(batch)
    }
}

fn build_prompt(fraud_type: &str, count: usize, details: Option<&str>) -> GenerationPrompt {
    let instructions = format!(
        "You generate test data for an online payment fraud detection system.\n\
         Produce a JSON array of exactly {count} synthetic transaction records. Each record is an object with:\n\
         - \"transactionId\": a UUID\n\
         - \"userId\": a user identifier\n\
         - \"amount\": transaction amount as a number, e.g. 123.45\n\
         - \"currency\": ISO currency code, e.g. \"USD\"\n\
         - \"ipAddress\": an IPv4 address\n\
         - \"deviceId\": a device identifier\n\
         - \"paymentMethod\": e.g. \"Credit Card\", \"Debit Card\", \"PayPal\"\n\
         - \"transactionTimestamp\": ISO-8601 UTC instant ending in Z, e.g. \"2024-01-01T12:30:00Z\"\n\
         - \"fraudLabel\": \"FRAUD\" or \"LEGIT\", mixed across the batch\n\
         - \"reason\": a short explanation of the label\n\n\
         Reply with the JSON array only, inside a ```json code block.\n\n\
         Fraud type: {fraud_type}\n\
         Additional details: {details}\n",
        count = count,
        fraud_type = fraud_type,
        details = details.unwrap_or(""),
    );

    GenerationPrompt {
        prompt: format!("Human: {}\n\nAssistant: ```json\n", instructions),
        max_tokens_to_sample: 4000,
        temperature: 0.7,
        top_p: 0.9,
        stop_sequences: vec!["```".to_string()],
    }
}

/// The array inside a ```` ```json ```` fence, or the whole content.
fn extract_json_array(content: &str) -> &str {
    FENCED_JSON_RE
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or_else(|| content.trim())
}

fn post_process(generated: Vec<GeneratedTransaction>, now: DateTime<Utc>) -> Vec<SyntheticRecord> {
    let mut rng = rand::thread_rng();
    generated.into_iter().map(|t| t.normalize(now, &mut rng)).collect()
}

fn key_safe(fraud_type: &str) -> String {
    fraud_type
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
