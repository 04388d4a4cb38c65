pub mod collaborators;
pub mod config;
pub mod document_processor;
pub mod error;
pub mod numeric_normalizers;
pub mod parallel_processor;
pub mod policy_analyzer;
pub mod policy_comparator;
pub mod recommender;
pub mod structure_cleaners;
pub mod text_cleaners;
pub mod text_extractor;
pub mod weather_data;

pub use collaborators::{Entity, EntityExtractor, SentenceEncoder, Summarizer, extract_entities, summarize};
pub use config::{ClimateLexicon, PipelineConfig};
pub use document_processor::{DocumentMetadata, DocumentProcessor, ProcessedDocument};
pub use error::ProcessingError;
pub use parallel_processor::ParallelProcessor;
pub use policy_analyzer::{PolicyAnalysis, PolicyAnalyzer, PolicyTopic};
pub use policy_comparator::{PolicyComparison, TermOverlap, compare_policies, term_overlap};
pub use recommender::{RecommendationResult, Recommender, SharedRecommender, SimilarSample, cosine_similarity};
pub use structure_cleaners::Section;
pub use text_extractor::{FileType, RawDocument, TextExtractor};
pub use weather_data::{FeatureEncoder, HistoricalSample, WeatherQuery, load_samples_csv, read_samples};

#[cfg(feature = "python")]
mod python {
    use crate::document_processor::DocumentProcessor;
    use crate::error::ProcessingError;
    use crate::policy_analyzer::PolicyAnalyzer;
    use crate::recommender::Recommender;
    use crate::weather_data::{WeatherQuery, load_samples_csv};
    use once_cell::sync::Lazy;
    use parking_lot::Mutex;
    use pyo3::exceptions::{PyRuntimeError, PyValueError};
    use pyo3::prelude::*;
    use pyo3::types::PyDict;
    use rustc_hash::FxHashMap as HashMap;
    use std::sync::Arc;

    /// Fitted recommenders keyed by corpus path
    static RECOMMENDERS: Lazy<Mutex<HashMap<String, Arc<Recommender>>>> = Lazy::new(|| Mutex::new(HashMap::default()));

    fn to_py_err(e: ProcessingError) -> PyErr {
        match e {
            ProcessingError::InputFormat { .. }
            | ProcessingError::Schema { .. }
            | ProcessingError::InvalidSample { .. }
            | ProcessingError::EmptyCorpus => PyErr::new::<PyValueError, _>(e.to_string()),
            other => PyErr::new::<PyRuntimeError, _>(other.to_string()),
        }
    }

    fn cached_recommender(csv_path: &str) -> Result<Arc<Recommender>, ProcessingError> {
        if let Some(existing) = RECOMMENDERS.lock().get(csv_path) {
            return Ok(existing.clone());
        }
        let fitted = Arc::new(Recommender::fit(load_samples_csv(csv_path)?)?);
        RECOMMENDERS.lock().insert(csv_path.to_string(), fitted.clone());
        Ok(fitted)
    }

    /// Python module initialization
    /// This is the entry point that Maturin uses to create the Python extension
    #[pymodule]
    fn climate_policy_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
        let _ = env_logger::try_init();

        m.add_function(wrap_pyfunction!(process_text, m)?)?;
        m.add_function(wrap_pyfunction!(analyze_text, m)?)?;
        m.add_function(wrap_pyfunction!(recommend, m)?)?;
        m.add_function(wrap_pyfunction!(refit_recommender, m)?)?;

        m.add("__version__", env!("CARGO_PKG_VERSION"))?;

        Ok(())
    }

    /// Clean raw policy text
    ///
    /// Returns a dict with `cleaned_text`, `sections` (list of dicts with
    /// title, content, start_line, end_line) and `metadata`.
    #[pyfunction]
    fn process_text<'py>(py: Python<'py>, text: String) -> PyResult<Bound<'py, PyDict>> {
        let processor = DocumentProcessor::shared().map_err(to_py_err)?;
        let document = py.allow_threads(|| processor.process(&text));

        let sections = document
            .sections
            .iter()
            .map(|section| {
                let dict = PyDict::new(py);
                dict.set_item("title", &section.title)?;
                dict.set_item("content", &section.content)?;
                dict.set_item("start_line", section.start_line)?;
                dict.set_item("end_line", section.end_line)?;
                Ok(dict)
            })
            .collect::<PyResult<Vec<_>>>()?;

        let metadata = PyDict::new(py);
        metadata.set_item("document_id", &document.metadata.document_id)?;
        metadata.set_item("original_length", document.metadata.original_length)?;
        metadata.set_item("processed_length", document.metadata.processed_length)?;
        metadata.set_item("compression_ratio", document.metadata.compression_ratio)?;
        metadata.set_item("section_count", document.metadata.section_count)?;

        let result = PyDict::new(py);
        result.set_item("cleaned_text", document.cleaned_text)?;
        result.set_item("sections", sections)?;
        result.set_item("metadata", metadata)?;
        Ok(result)
    }

    /// Tag sentences of (cleaned) text by policy topic
    #[pyfunction]
    fn analyze_text<'py>(py: Python<'py>, text: String) -> PyResult<Bound<'py, PyDict>> {
        let analysis = PolicyAnalyzer::new().analyze(&text);

        let result = PyDict::new(py);
        for (topic, sentences) in analysis.topics {
            result.set_item(topic.as_str(), sentences)?;
        }
        Ok(result)
    }

    /// Recommend a weather condition from the historical corpus at `csv_path`
    ///
    /// The corpus is fitted once per path and reused; call
    /// `refit_recommender` after the file changes.
    #[pyfunction]
    #[pyo3(signature = (csv_path, location, month, temperature_c, humidity_pct, wind_kmh, top_n=5))]
    fn recommend<'py>(
        py: Python<'py>,
        csv_path: String,
        location: String,
        month: u8,
        temperature_c: f64,
        humidity_pct: f64,
        wind_kmh: f64,
        top_n: usize,
    ) -> PyResult<Bound<'py, PyDict>> {
        let recommender = cached_recommender(&csv_path).map_err(to_py_err)?;
        let query = WeatherQuery {
            location,
            month,
            temperature_c,
            humidity_pct,
            wind_kmh,
        };
        let recommendation = py.allow_threads(|| recommender.recommend(&query, top_n));

        let neighbors = recommendation
            .neighbors
            .iter()
            .map(|neighbor| {
                let dict = PyDict::new(py);
                dict.set_item("location", &neighbor.sample.location)?;
                dict.set_item("month", neighbor.sample.month)?;
                dict.set_item("temperature_c", neighbor.sample.temperature_c)?;
                dict.set_item("humidity_pct", neighbor.sample.humidity_pct)?;
                dict.set_item("wind_kmh", neighbor.sample.wind_kmh)?;
                dict.set_item("condition", &neighbor.sample.condition)?;
                dict.set_item("similarity", neighbor.similarity)?;
                Ok(dict)
            })
            .collect::<PyResult<Vec<_>>>()?;

        let result = PyDict::new(py);
        result.set_item("predicted_condition", recommendation.predicted_condition)?;
        result.set_item("confidence", recommendation.confidence)?;
        result.set_item("neighbors", neighbors)?;
        Ok(result)
    }

    /// Drop the cached fit for `csv_path` and fit it again
    #[pyfunction]
    fn refit_recommender(csv_path: String) -> PyResult<()> {
        let fitted = Arc::new(
            Recommender::fit(load_samples_csv(&csv_path).map_err(to_py_err)?).map_err(to_py_err)?,
        );
        RECOMMENDERS.lock().insert(csv_path, fitted);
        Ok(())
    }
}
