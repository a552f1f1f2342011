#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Chunked, strictly sequential upload of normalized survey records.
//!
//! [`upload_all`] splits the record list into contiguous chunks and
//! persists them one awaited Store call at a time, in order. A rejected
//! chunk is counted and skipped, never retried, so a flaky Store degrades
//! the dataset instead of aborting the run.

pub mod progress;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use survey_map_store::SurveyStore;
use survey_map_survey_models::SurveyRecord;

use crate::progress::{ProgressCallback, null_progress};

/// How many records go into one Store call.
pub const UPLOAD_CHUNK_SIZE: usize = 100;

/// Tuning knobs for [`upload_all`].
#[derive(Debug, Clone, Copy)]
pub struct UploadOptions {
    /// Records per Store call. Values below 1 are treated as 1.
    pub chunk_size: usize,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            chunk_size: UPLOAD_CHUNK_SIZE,
        }
    }
}

/// Outcome tally for one upload run.
///
/// `successful + failed == total_records` always holds. The category
/// tallies and the label set cover persisted records only; a rejected
/// chunk contributes nothing beyond its `failed` count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStats {
    /// Records handed to the uploader.
    pub total_records: u64,
    /// Records in chunks the Store accepted.
    pub successful: u64,
    /// Records in chunks the Store rejected.
    pub failed: u64,
    /// Persisted records with at least one categorized answer.
    pub with_category: u64,
    /// Persisted records with no categorized answers.
    pub without_category: u64,
    /// Wall-clock duration of the run, in milliseconds.
    pub processing_time: u64,
    /// Category labels observed across persisted records.
    pub categories: BTreeSet<String>,
}

/// Persists `records` to the Store in contiguous chunks of
/// `options.chunk_size`, one awaited call at a time, in input order.
///
/// Chunk failures are absorbed: the chunk's records count as `failed` and
/// the run moves on to the next chunk. Progress positions are cumulative
/// and never exceed the record total.
pub async fn upload_all(
    store: &dyn SurveyStore,
    records: &[SurveyRecord],
    options: &UploadOptions,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> ProcessingStats {
    let start = Instant::now();
    let total = records.len() as u64;
    let chunk_size = options.chunk_size.max(1);
    let chunk_count = records.len().div_ceil(chunk_size);

    let progress = progress.unwrap_or_else(null_progress);
    progress.set_total(total);

    let mut stats = ProcessingStats {
        total_records: total,
        ..ProcessingStats::default()
    };

    let mut processed: u64 = 0;

    for (chunk_index, chunk) in records.chunks(chunk_size).enumerate() {
        let chunk_len = chunk.len() as u64;
        progress.set_message(format!(
            "Uploading chunk {}/{chunk_count}",
            chunk_index + 1
        ));

        match store.upload_records(chunk).await {
            Ok(()) => {
                stats.successful += chunk_len;
                for record in chunk {
                    if record.responses.is_empty() {
                        stats.without_category += 1;
                    } else {
                        stats.with_category += 1;
                    }
                    stats.categories.extend(record.observed_categories());
                }
            }
            Err(e) => {
                stats.failed += chunk_len;
                log::warn!(
                    "Chunk {}/{chunk_count} rejected ({chunk_len} records): {e}",
                    chunk_index + 1
                );
            }
        }

        processed += chunk_len;
        progress.set_position(processed.min(total));
    }

    stats.processing_time = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    progress.finish(format!(
        "Uploaded {}/{} records ({} failed)",
        stats.successful, stats.total_records, stats.failed
    ));

    log::info!(
        "Upload complete: {}/{} records persisted, {} failed, {} categories observed, took {:.1}s",
        stats.successful,
        stats.total_records,
        stats.failed,
        stats.categories.len(),
        start.elapsed().as_secs_f64()
    );

    stats
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;
    use survey_map_store::StoreError;
    use survey_map_store_models::{AggregateStat, MigrationProgress};
    use survey_map_survey_models::{
        Category, KnownCategory, Location, RecordMetadata, SurveyRecord,
    };

    use super::*;

    struct RecordingStore {
        chunk_sizes: Mutex<Vec<usize>>,
        fail_calls: Vec<usize>,
    }

    impl RecordingStore {
        fn new(fail_calls: &[usize]) -> Self {
            Self {
                chunk_sizes: Mutex::new(Vec::new()),
                fail_calls: fail_calls.to_vec(),
            }
        }
    }

    #[async_trait]
    impl SurveyStore for RecordingStore {
        async fn clear_destination(&self) -> Result<(), StoreError> {
            Ok(())
        }

        async fn get_migration_progress(&self) -> Result<MigrationProgress, StoreError> {
            Ok(MigrationProgress::default())
        }

        async fn migrate_batch(
            &self,
            _batch_size: u64,
            _offset: u64,
        ) -> Result<String, StoreError> {
            Ok(String::new())
        }

        async fn upload_records(&self, records: &[SurveyRecord]) -> Result<(), StoreError> {
            let mut chunk_sizes = self.chunk_sizes.lock().unwrap();
            let call_index = chunk_sizes.len();
            chunk_sizes.push(records.len());
            if self.fail_calls.contains(&call_index) {
                return Err(StoreError::Rpc {
                    status: 500,
                    message: "insert failed".to_string(),
                });
            }
            Ok(())
        }

        async fn get_aggregate_stats(
            &self,
            _category_filter: Option<&str>,
        ) -> Result<Vec<AggregateStat>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        totals: Mutex<Vec<u64>>,
        positions: Mutex<Vec<u64>>,
    }

    impl ProgressCallback for RecordingProgress {
        fn set_total(&self, total: u64) {
            self.totals.lock().unwrap().push(total);
        }

        fn set_position(&self, pos: u64) {
            self.positions.lock().unwrap().push(pos);
        }

        fn set_message(&self, _msg: String) {}
        fn finish(&self, _msg: String) {}
        fn finish_and_clear(&self) {}
    }

    fn record(row_number: usize, categories: &[Category]) -> SurveyRecord {
        let mut responses = BTreeMap::new();
        for category in categories {
            let mut answers = BTreeMap::new();
            answers.insert("¿Pregunta?".to_string(), "Respuesta".to_string());
            responses.insert(category.clone(), answers);
        }
        SurveyRecord {
            id: format!("sv-1700000000000-{row_number}"),
            sociodemographic: BTreeMap::new(),
            location: Location {
                barrio: Some("EL PRADO".to_string()),
                ..Location::default()
            },
            responses,
            metadata: RecordMetadata {
                stratum: None,
                observations: None,
                category_distribution: BTreeSet::new(),
                processing_date: Utc::now(),
                row_number,
            },
        }
    }

    fn records(count: usize) -> Vec<SurveyRecord> {
        (0..count)
            .map(|row| record(row, &[Category::Known(KnownCategory::Salud)]))
            .collect()
    }

    #[tokio::test]
    async fn splits_records_into_contiguous_chunks() {
        let store = RecordingStore::new(&[]);
        let options = UploadOptions { chunk_size: 100 };

        let stats = upload_all(&store, &records(250), &options, None).await;

        assert_eq!(*store.chunk_sizes.lock().unwrap(), vec![100, 100, 50]);
        assert_eq!(stats.total_records, 250);
        assert_eq!(stats.successful, 250);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn failed_chunks_are_counted_and_skipped() {
        let store = RecordingStore::new(&[1]);
        let options = UploadOptions { chunk_size: 100 };

        let stats = upload_all(&store, &records(250), &options, None).await;

        // The rejected chunk is not retried; later chunks still run.
        assert_eq!(store.chunk_sizes.lock().unwrap().len(), 3);
        assert_eq!(stats.successful, 150);
        assert_eq!(stats.failed, 100);
        assert_eq!(stats.successful + stats.failed, stats.total_records);
    }

    #[tokio::test]
    async fn category_tallies_cover_persisted_records_only() {
        let store = RecordingStore::new(&[0]);
        let options = UploadOptions { chunk_size: 2 };
        let batch = vec![
            record(0, &[Category::Known(KnownCategory::Seguridad)]),
            record(1, &[Category::Known(KnownCategory::Seguridad)]),
            record(2, &[Category::Known(KnownCategory::Salud)]),
            record(3, &[]),
        ];

        let stats = upload_all(&store, &batch, &options, None).await;

        assert_eq!(stats.with_category, 1);
        assert_eq!(stats.without_category, 1);
        assert!(stats.categories.contains("SALUD"));
        assert!(!stats.categories.contains("SEGURIDAD"));
    }

    #[tokio::test]
    async fn progress_positions_are_monotonic_and_capped() {
        let store = RecordingStore::new(&[2]);
        let options = UploadOptions { chunk_size: 30 };
        let progress = Arc::new(RecordingProgress::default());

        upload_all(&store, &records(100), &options, Some(progress.clone())).await;

        assert_eq!(*progress.totals.lock().unwrap(), vec![100]);
        let positions = progress.positions.lock().unwrap();
        assert_eq!(*positions, vec![30, 60, 90, 100]);
        assert!(positions.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(positions.iter().all(|&pos| pos <= 100));
    }

    #[tokio::test]
    async fn empty_input_makes_no_store_calls() {
        let store = RecordingStore::new(&[]);

        let stats = upload_all(&store, &[], &UploadOptions::default(), None).await;

        assert!(store.chunk_sizes.lock().unwrap().is_empty());
        assert_eq!(stats.total_records, 0);
        assert_eq!(stats.successful, 0);
        assert_eq!(stats.failed, 0);
    }

    #[test]
    fn stats_serialize_with_camel_case_keys() {
        let stats = ProcessingStats {
            total_records: 4,
            successful: 3,
            failed: 1,
            with_category: 2,
            without_category: 1,
            processing_time: 1250,
            categories: BTreeSet::from(["SALUD".to_string()]),
        };

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["totalRecords"], 4);
        assert_eq!(json["withCategory"], 2);
        assert_eq!(json["withoutCategory"], 1);
        assert_eq!(json["processingTime"], 1250);
        assert_eq!(json["categories"][0], "SALUD");
    }
}
