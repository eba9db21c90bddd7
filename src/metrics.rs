//! Metrics and observability for soma_presets

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use serde::{Deserialize, Serialize};

use crate::selector::SelectionStage;

/// Global metrics collector
#[derive(Default)]
pub struct Metrics {
    pub total_requests: AtomicU64,
    pub successful_requests: AtomicU64,
    pub failed_requests: AtomicU64,
    pub total_latency_ms: AtomicU64,

    // Per-operation counters
    pub ingest_sidecar_count: AtomicU64,
    pub ingest_json_count: AtomicU64,
    pub convert_count: AtomicU64,
    pub validate_count: AtomicU64,
    pub select_count: AtomicU64,
    pub admin_count: AtomicU64,

    // Which selection stage answered
    pub builtin_mapping_hits: AtomicU64,
    pub uploaded_match_hits: AtomicU64,
    pub photo_type_hits: AtomicU64,
    pub default_hits: AtomicU64,
    pub not_found: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_request(&self, op: &str, success: bool, latency_ms: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }

        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);

        // Increment operation-specific counter
        match op {
            "preset.ingest_sidecar" => self.ingest_sidecar_count.fetch_add(1, Ordering::Relaxed),
            "preset.ingest_json" => self.ingest_json_count.fetch_add(1, Ordering::Relaxed),
            "preset.convert" => self.convert_count.fetch_add(1, Ordering::Relaxed),
            "preset.validate" => self.validate_count.fetch_add(1, Ordering::Relaxed),
            "preset.select" => self.select_count.fetch_add(1, Ordering::Relaxed),
            "preset.list" | "preset.get" | "preset.delete" | "preset.set_default" => {
                self.admin_count.fetch_add(1, Ordering::Relaxed)
            }
            _ => 0,
        };
    }

    pub fn record_selection(&self, stage: SelectionStage) {
        let counter = match stage {
            SelectionStage::BuiltinMapping => &self.builtin_mapping_hits,
            SelectionStage::UploadedMatch => &self.uploaded_match_hits,
            SelectionStage::PhotoType => &self.photo_type_hits,
            SelectionStage::Default => &self.default_hits,
            SelectionStage::NotFound => &self.not_found,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let successful = self.successful_requests.load(Ordering::Relaxed);
        let failed = self.failed_requests.load(Ordering::Relaxed);
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);

        MetricsSnapshot {
            total_requests: total,
            successful_requests: successful,
            failed_requests: failed,
            error_rate: if total > 0 { failed as f64 / total as f64 } else { 0.0 },
            avg_latency_ms: if total > 0 { total_latency / total } else { 0 },
            operations: OperationMetrics {
                ingest_sidecar: self.ingest_sidecar_count.load(Ordering::Relaxed),
                ingest_json: self.ingest_json_count.load(Ordering::Relaxed),
                convert: self.convert_count.load(Ordering::Relaxed),
                validate: self.validate_count.load(Ordering::Relaxed),
                select: self.select_count.load(Ordering::Relaxed),
                admin: self.admin_count.load(Ordering::Relaxed),
            },
            selection: SelectionMetrics {
                builtin_mapping: self.builtin_mapping_hits.load(Ordering::Relaxed),
                uploaded_match: self.uploaded_match_hits.load(Ordering::Relaxed),
                photo_type: self.photo_type_hits.load(Ordering::Relaxed),
                default: self.default_hits.load(Ordering::Relaxed),
                not_found: self.not_found.load(Ordering::Relaxed),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub error_rate: f64,
    pub avg_latency_ms: u64,
    pub operations: OperationMetrics,
    pub selection: SelectionMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationMetrics {
    pub ingest_sidecar: u64,
    pub ingest_json: u64,
    pub convert: u64,
    pub validate: u64,
    pub select: u64,
    pub admin: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionMetrics {
    pub builtin_mapping: u64,
    pub uploaded_match: u64,
    pub photo_type: u64,
    pub default: u64,
    pub not_found: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_rates() {
        let metrics = Metrics::new();
        metrics.record_request("preset.select", true, 4);
        metrics.record_request("preset.delete", false, 2);
        metrics.record_selection(SelectionStage::Default);
        metrics.record_selection(SelectionStage::Default);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 2);
        assert_eq!(snapshot.failed_requests, 1);
        assert!((snapshot.error_rate - 0.5).abs() < 1e-9);
        assert_eq!(snapshot.avg_latency_ms, 3);
        assert_eq!(snapshot.operations.select, 1);
        assert_eq!(snapshot.operations.admin, 1);
        assert_eq!(snapshot.selection.default, 2);
        assert_eq!(snapshot.selection.not_found, 0);
    }
}
