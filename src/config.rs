//! Configuration module

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::generation::GeneratorConfig;
use crate::pipeline::{JobDriverConfig, ReconcilerConfig, RegistrarConfig};
use crate::scoring::ScorerConfig;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Log output format (pretty, json)
    pub log_format: String,

    /// Bucket holding raw, synthetic and combined training data
    pub data_bucket: String,

    /// Object store backend (local, memory)
    pub storage_backend: String,

    /// Root directory for the local object store
    pub storage_root: PathBuf,

    /// Base URL of the managed training job gateway
    pub training_service_url: String,

    /// Execution role handed to the training service
    pub training_role_arn: String,

    /// Container image used for training jobs
    pub training_image: String,

    /// Instance class used when a request names none
    pub default_instance_type: String,

    /// Seconds between training status checks
    pub poll_interval_secs: u64,

    /// Wall-clock bound on waiting for a training job
    pub poll_timeout_secs: u64,

    /// Runtime bound enforced by the training service itself
    pub max_runtime_secs: u64,

    /// Base URL of the decision model registry gateway
    pub registry_service_url: String,

    /// Decision model that receives new versions
    pub detector_model_id: String,

    /// Role the registry uses to read the combined events data
    pub events_data_role_arn: String,

    /// Base URL of the generative model runtime gateway
    pub generator_service_url: String,

    /// Generative model identifier
    pub generator_model_id: String,

    /// Delay between generation batches, in milliseconds
    pub generator_batch_delay_ms: u64,

    /// Base URL of the real-time scoring runtime gateway
    pub scoring_service_url: String,

    /// Detector that scores incoming transactions
    pub detector_id: String,

    /// Event type the detector is configured for
    pub event_type_name: String,

    /// Base URL of the attribution endpoint gateway
    pub attribution_service_url: String,

    /// Attribution endpoint name; explanations are unavailable without one
    pub attribution_endpoint: Option<String>,

    /// Timeout for outbound HTTP calls
    pub http_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),

            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),

            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string()),

            data_bucket: env::var("DATA_BUCKET")
                .unwrap_or_else(|_| "fraudshield-data".to_string()),

            storage_backend: env::var("STORAGE_BACKEND")
                .unwrap_or_else(|_| "local".to_string()),

            storage_root: env::var("STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),

            training_service_url: env::var("TRAINING_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:9101".to_string()),

            training_role_arn: env::var("TRAINING_ROLE_ARN")
                .unwrap_or_else(|_| "arn:aws:iam::000000000000:role/fraudshield-training".to_string()),

            training_image: env::var("TRAINING_IMAGE")
                .unwrap_or_else(|_| "683313688378.dkr.ecr.us-east-1.amazonaws.com/sagemaker-xgboost:1.7-1".to_string()),

            default_instance_type: env::var("TRAINING_DEFAULT_INSTANCE_TYPE")
                .unwrap_or_else(|_| "ml.m5.xlarge".to_string()),

            poll_interval_secs: env::var("TRAINING_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),

            poll_timeout_secs: env::var("TRAINING_POLL_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3600),

            max_runtime_secs: env::var("TRAINING_MAX_RUNTIME_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3600),

            registry_service_url: env::var("REGISTRY_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:9102".to_string()),

            detector_model_id: env::var("DETECTOR_MODEL_ID")
                .unwrap_or_else(|_| "fraudshield_detector".to_string()),

            events_data_role_arn: env::var("EVENTS_DATA_ROLE_ARN")
                .unwrap_or_else(|_| "arn:aws:iam::000000000000:role/fraudshield-events-access".to_string()),

            generator_service_url: env::var("GENERATOR_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:9103".to_string()),

            generator_model_id: env::var("GENERATOR_MODEL_ID")
                .unwrap_or_else(|_| "cohere.command-r-plus-v1:0".to_string()),

            generator_batch_delay_ms: env::var("GENERATOR_BATCH_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1000),

            scoring_service_url: env::var("SCORING_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:9104".to_string()),

            detector_id: env::var("DETECTOR_ID")
                .unwrap_or_else(|_| "fraudshield_payments".to_string()),

            event_type_name: env::var("EVENT_TYPE_NAME")
                .unwrap_or_else(|_| "online_payment_transaction".to_string()),

            attribution_service_url: env::var("ATTRIBUTION_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:9105".to_string()),

            attribution_endpoint: env::var("ATTRIBUTION_ENDPOINT")
                .ok()
                .filter(|s| !s.trim().is_empty()),

            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            bucket: self.data_bucket.clone(),
            combined_prefix: "training-data/combined/".to_string(),
        }
    }

    pub fn job_driver_config(&self) -> JobDriverConfig {
        JobDriverConfig {
            training_image: self.training_image.clone(),
            role_arn: self.training_role_arn.clone(),
            output_bucket: self.data_bucket.clone(),
            output_prefix: "model-artifacts/".to_string(),
            default_instance_type: self.default_instance_type.clone(),
            poll_interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            default_timeout: Duration::from_secs(self.poll_timeout_secs),
            default_max_runtime_secs: self.max_runtime_secs,
            hyperparameters: [("num_round".to_string(), "100".to_string())]
                .into_iter()
                .collect(),
        }
    }

    pub fn registrar_config(&self) -> RegistrarConfig {
        RegistrarConfig {
            model_id: self.detector_model_id.clone(),
            events_data_role_arn: self.events_data_role_arn.clone(),
        }
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            bucket: self.data_bucket.clone(),
            output_prefix: "synthetic-fraud/".to_string(),
            max_batch_size: 10,
            batch_delay: Duration::from_millis(self.generator_batch_delay_ms),
        }
    }

    pub fn scorer_config(&self) -> ScorerConfig {
        ScorerConfig {
            detector_id: self.detector_id.clone(),
            event_type_name: self.event_type_name.clone(),
        }
    }
}
