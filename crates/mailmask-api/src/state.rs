//! Application state management
//!
//! Author: hephaex@gmail.com

use mailmask_core::config::AppConfig;
use mailmask_core::{Category, EntityType, Result};
use mailmask_pipeline::EmailProcessor;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Per-endpoint request statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct EndpointMetrics {
    /// Responses by HTTP status code
    pub status_counts: BTreeMap<u16, u64>,
    pub total_latency_us: u64,
    pub max_latency_us: u64,
    pub latency_count: u64,
}

impl EndpointMetrics {
    fn record(&mut self, status: u16, latency_us: u64) {
        *self.status_counts.entry(status).or_insert(0) += 1;
        self.total_latency_us += latency_us;
        self.max_latency_us = self.max_latency_us.max(latency_us);
        self.latency_count += 1;
    }

    pub fn avg_latency_us(&self) -> u64 {
        self.total_latency_us
            .checked_div(self.latency_count)
            .unwrap_or(0)
    }
}

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Masking and classification pipeline
    pub processor: Arc<EmailProcessor>,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Ready status
    pub is_ready: AtomicBool,
    /// Request statistics keyed by path
    pub metrics: RwLock<BTreeMap<String, EndpointMetrics>>,
    /// Masked entities by type, in `EntityType::ALL` order
    entity_counts: [AtomicU64; EntityType::ALL.len()],
    /// Classified emails by category, in `Category::ALL` order
    category_counts: [AtomicU64; Category::ALL.len()],
}

impl AppState {
    /// Create new application state around an existing processor
    pub fn new(config: AppConfig, processor: Arc<EmailProcessor>) -> Self {
        Self {
            config,
            processor,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            is_ready: AtomicBool::new(true),
            metrics: RwLock::new(BTreeMap::new()),
            entity_counts: std::array::from_fn(|_| AtomicU64::new(0)),
            category_counts: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    /// Build the processor described by `config`
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let processor = EmailProcessor::from_config(&config)?;
        Ok(Self::new(config, Arc::new(processor)))
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Set ready status
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }

    /// Record one finished request
    pub async fn record_request(&self, endpoint: String, status: u16, latency_us: u64) {
        self.metrics
            .write()
            .await
            .entry(endpoint)
            .or_default()
            .record(status, latency_us);
    }

    /// Count masked entities by type
    pub fn record_entities(&self, types: impl IntoIterator<Item = EntityType>) {
        for entity_type in types {
            if let Some(i) = EntityType::ALL.iter().position(|t| *t == entity_type) {
                self.entity_counts[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Count one classified email
    pub fn record_category(&self, category: Category) {
        if let Some(i) = Category::ALL.iter().position(|c| *c == category) {
            self.category_counts[i].fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Masked entity totals keyed by type name
    pub fn entity_counts(&self) -> BTreeMap<&'static str, u64> {
        EntityType::ALL
            .iter()
            .zip(&self.entity_counts)
            .map(|(t, n)| (t.as_str(), n.load(Ordering::Relaxed)))
            .collect()
    }

    /// Classified email totals keyed by category name
    pub fn category_counts(&self) -> BTreeMap<&'static str, u64> {
        Category::ALL
            .iter()
            .zip(&self.category_counts)
            .map(|(c, n)| (c.as_str(), n.load(Ordering::Relaxed)))
            .collect()
    }
}
