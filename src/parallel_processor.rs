use crate::document_processor::{DocumentProcessor, ProcessedDocument};
use crate::error::ProcessingError;
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::Once;
use log::{debug, error, info};

static INIT: Once = Once::new();

/// Parallel coordinator for many independent documents
///
/// Architecture:
/// - Rayon global pool, sized from the logical core count, configured once
/// - Documents are grouped into batches and batches run in parallel
/// - Every document gets its own `Result`; output order is input order
pub struct ParallelProcessor {
    batch_size: usize,      // Documents per batch
    max_parallelism: usize, // Maximum parallel threads
}

impl ParallelProcessor {
    /// Initialize with a system-aware configuration
    ///
    /// `batch_size` of 0 derives it from the core count (twice the cores,
    /// at least 8).
    pub fn new(logical_cores: usize, batch_size: usize) -> Result<Self, ProcessingError> {
        let max_parallelism = logical_cores.max(1);
        let batch_size = if batch_size == 0 {
            std::cmp::max(max_parallelism * 2, 8)
        } else {
            batch_size
        };

        info!(
            "Parallel processor initialized: batch_size={}, max_parallelism={}",
            batch_size, max_parallelism
        );

        let mut thread_pool_error: Option<String> = None;

        INIT.call_once(|| {
            if let Err(e) = rayon::ThreadPoolBuilder::new()
                .num_threads(max_parallelism)
                .build_global()
            {
                error!("Thread pool setup failed: {}", e);
                thread_pool_error = Some(format!("Thread pool setup failed: {}", e));
            }
        });

        if let Some(error_msg) = thread_pool_error {
            return Err(ProcessingError::ParallelError(error_msg));
        }

        Ok(ParallelProcessor {
            batch_size,
            max_parallelism,
        })
    }

    /// Detect the core count and use the configured batch size
    pub fn from_system(batch_size: usize) -> Result<Self, ProcessingError> {
        let logical_cores = num_cpus::get();
        info!("Detected {} logical cores", logical_cores);
        Self::new(logical_cores, batch_size)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn max_parallelism(&self) -> usize {
        self.max_parallelism
    }

    /// Clean many raw texts at once; results line up with the inputs
    pub fn process_texts_parallel(&self, processor: &DocumentProcessor, texts: &[String]) -> Vec<ProcessedDocument> {
        info!("Starting parallel cleaning: {} texts in batches of {}", texts.len(), self.batch_size);

        texts
            .par_chunks(self.batch_size)
            .enumerate()
            .flat_map_iter(|(batch_idx, batch)| {
                debug!("Processing batch {} with {} texts", batch_idx, batch.len());
                batch.iter().map(|text| processor.process(text))
            })
            .collect()
    }

    /// Extract and clean many files at once
    ///
    /// A file that fails extraction yields an `Err` in its own slot and
    /// the rest of the batch carries on.
    pub fn process_files_parallel(
        &self,
        processor: &DocumentProcessor,
        paths: &[PathBuf],
    ) -> Vec<Result<ProcessedDocument, ProcessingError>> {
        info!("Starting parallel processing: {} files in batches of {}", paths.len(), self.batch_size);

        let results: Vec<Result<ProcessedDocument, ProcessingError>> = paths
            .par_chunks(self.batch_size)
            .enumerate()
            .flat_map_iter(|(batch_idx, batch)| {
                debug!("Processing batch {} with {} files", batch_idx, batch.len());
                batch.iter().map(|path| {
                    processor.process_file(path).inspect_err(|e| {
                        error!("Failed to process {}: {}", path.display(), e);
                    })
                })
            })
            .collect();

        let failed = results.iter().filter(|r| r.is_err()).count();
        info!("Parallel processing complete: {} succeeded, {} failed", results.len() - failed, failed);
        results
    }
}
