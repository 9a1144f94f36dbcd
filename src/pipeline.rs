//! Dump to figure orchestration shared by the binaries

use rand::SeedableRng;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::analysis::{select, AttributeCounts};
use crate::config::VisConfig;
use crate::data::{curves_dump_path, prediction_dump_path, ImportanceCurves, PredictionDump};
use crate::dictionary::{dictionary_figure_paths, DictionaryDump};
use crate::error::{Result, VisError};
use crate::export::SelectionReport;
use crate::plotting;
use crate::verify::{validate_dictionary_dump, validate_dump};

/// Attributes in the default forest space (catch22 plus mean, std, slope)
pub const DEFAULT_NUM_ATTRIBUTES: usize = 25;

/// Which prediction dump to explain and what the producer reported about it
#[derive(Debug, Clone)]
pub struct InterpretRequest {
    pub dir: PathBuf,
    pub seed: u64,
    pub pred_id: usize,
    pub num_trees: Option<usize>,
    pub series_length: Option<usize>,
    pub num_attributes: usize,
    /// Ensemble prediction; recomputed by majority vote when absent
    pub predicted_class: Option<usize>,
}

impl InterpretRequest {
    pub fn new(dir: impl Into<PathBuf>, seed: u64, pred_id: usize) -> Self {
        Self {
            dir: dir.into(),
            seed,
            pred_id,
            num_trees: None,
            series_length: None,
            num_attributes: DEFAULT_NUM_ATTRIBUTES,
            predicted_class: None,
        }
    }

    pub fn dump_path(&self) -> PathBuf {
        prediction_dump_path(&self.dir, self.seed, self.pred_id)
    }
}

#[derive(Debug, Clone)]
pub struct InterpretOutcome {
    pub figure: PathBuf,
    pub summary: Option<PathBuf>,
    pub report: SelectionReport,
}

/// Read a prediction dump, select the explained attributes and draw the figure
pub fn explain_prediction(request: &InterpretRequest, config: &VisConfig) -> Result<InterpretOutcome> {
    config.validate()?;

    let dump_path = request.dump_path();
    let dump = PredictionDump::load(&dump_path)?;
    validate_dump(&dump, request.num_trees, request.series_length)?;

    let rng_seed = config.seed_or(request.seed);
    let mut rng = rand::rngs::StdRng::seed_from_u64(rng_seed);

    let predicted_class = match request.predicted_class {
        Some(class) => class,
        None => dump
            .ensemble_prediction(&mut rng)
            .ok_or_else(|| VisError::Validation("dump contains no trees".to_string()))?,
    };

    let nodes = dump.agreeing_nodes(predicted_class);
    let votes_for_class = dump
        .trees
        .iter()
        .filter(|t| t.predicted_class == predicted_class)
        .count();
    debug!(
        predicted_class,
        votes_for_class,
        nodes = nodes.len(),
        "filtered to agreeing trees"
    );

    let counts = AttributeCounts::from_nodes(&nodes, request.num_attributes, dump.series.len())?;
    let selections = select(&counts, &nodes, config.top_n, &mut rng)?;

    let figure = dump_path.with_extension(config.format.extension());
    let title = format!(
        "Predicted class {} ({}/{} trees agree)",
        predicted_class,
        votes_for_class,
        dump.trees.len()
    );
    plotting::plot_prediction_explanation(&dump.series, &selections, &title, &figure, config)
        .map_err(|e| VisError::Render(e.to_string()))?;

    let report = SelectionReport {
        dump: dump_path.display().to_string(),
        predicted_class,
        votes_for_class,
        total_trees: dump.trees.len(),
        rng_seed,
        selections,
    };

    let summary = if config.write_summary {
        let path = dump_path.with_extension("json");
        report.save_json(&path)?;
        Some(path)
    } else {
        None
    };

    info!(
        figure = %figure.display(),
        selected = report.selections.len(),
        "explained prediction"
    );

    Ok(InterpretOutcome {
        figure,
        summary,
        report,
    })
}

/// Which importance-curve dump to draw
#[derive(Debug, Clone)]
pub struct CurvesRequest {
    pub dir: PathBuf,
    pub seed: u64,
    pub num_attributes: usize,
}

impl CurvesRequest {
    pub fn dump_path(&self) -> PathBuf {
        curves_dump_path(&self.dir, self.seed)
    }
}

/// Draw the temporal importance curves of the top attributes
pub fn render_importance_curves(request: &CurvesRequest, config: &VisConfig) -> Result<PathBuf> {
    config.validate()?;
    if config.top_n > request.num_attributes {
        return Err(VisError::Config(format!(
            "cannot select top {} of {} attributes",
            config.top_n, request.num_attributes
        )));
    }

    let dump_path = request.dump_path();
    let curves = ImportanceCurves::load(&dump_path, request.num_attributes)?;

    let figure = dump_path.with_extension(config.format.extension());
    plotting::plot_importance_curves(&curves, config.top_n, &figure, config)
        .map_err(|e| VisError::Render(e.to_string()))?;

    info!(figure = %figure.display(), "rendered importance curves");
    Ok(figure)
}

/// Which dictionary classifier dump to draw
#[derive(Debug, Clone)]
pub struct DictionaryRequest {
    pub dir: PathBuf,
    pub seed: u64,
    pub num_classes: usize,
}

impl DictionaryRequest {
    pub fn dump_path(&self) -> PathBuf {
        curves_dump_path(&self.dir, self.seed)
    }
}

#[derive(Debug, Clone)]
pub struct DictionaryFigures {
    pub histograms: PathBuf,
    pub transform: PathBuf,
}

/// Draw the word histograms and the SFA transform of a dictionary dump
pub fn render_dictionary_figures(
    request: &DictionaryRequest,
    config: &VisConfig,
) -> Result<DictionaryFigures> {
    config.validate()?;

    let dump = DictionaryDump::load(request.dump_path(), request.num_classes)?;
    validate_dictionary_dump(&dump)?;
    debug!(
        rank = dump.rank,
        num_classifiers = dump.num_classifiers,
        weight = dump.weight,
        "drawing dictionary member"
    );

    let (histograms, transform) =
        dictionary_figure_paths(&request.dir, request.seed, config.format.extension());
    plotting::plot_word_histograms(&dump, &histograms, config)
        .map_err(|e| VisError::Render(e.to_string()))?;
    plotting::plot_sfa_transform(&dump, &transform, config)
        .map_err(|e| VisError::Render(e.to_string()))?;

    info!(
        histograms = %histograms.display(),
        transform = %transform.display(),
        "rendered dictionary figures"
    );
    Ok(DictionaryFigures {
        histograms,
        transform,
    })
}

/// `(seed, pred_id)` of every `pred<seed>-<id>.txt` in `dir`, sorted
pub fn find_prediction_dumps(dir: &Path) -> Result<Vec<(u64, usize)>> {
    let mut found = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) != Some("txt") {
            continue;
        }
        if let Some(ids) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(parse_dump_stem)
        {
            found.push(ids);
        }
    }

    found.sort();
    Ok(found)
}

fn parse_dump_stem(stem: &str) -> Option<(u64, usize)> {
    let (seed, pred_id) = stem.strip_prefix("pred")?.split_once('-')?;
    Some((seed.parse().ok()?, pred_id.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn dump_stem_parsing() {
        assert_eq!(parse_dump_stem("pred0-12"), Some((0, 12)));
        assert_eq!(parse_dump_stem("pred3-x"), None);
        assert_eq!(parse_dump_stem("vis0"), None);
    }

    #[test]
    fn finds_prediction_dumps_in_order() {
        let dir = TempDir::new().unwrap();
        for name in ["pred1-0.txt", "pred0-2.txt", "pred0-1.txt", "vis0.txt", "pred0-3.png"] {
            fs::write(dir.path().join(name), "").unwrap();
        }

        let found = find_prediction_dumps(dir.path()).unwrap();
        assert_eq!(found, vec![(0, 1), (0, 2), (1, 0)]);
    }

    #[test]
    fn missing_dump_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let request = InterpretRequest::new(dir.path(), 0, 0);
        let err = explain_prediction(&request, &VisConfig::default()).unwrap_err();
        assert!(matches!(err, VisError::Io(_)));
    }

    #[test]
    fn dictionary_dump_with_wrong_class_count_draws_nothing() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("vis0.txt"),
            "1.0\n1 1\n2 1.0\ntrue 1.0\n1 1.0\nfalse 1.0\n2 2\n1.0\n[1]\n[0.0, 1.0]\n[0.5, 0.5]\nab\n[0.0, 1.0];[0.0, 1.0]\n[ab]\n[1]\n[]\n[]\n",
        )
        .unwrap();

        let request = DictionaryRequest {
            dir: dir.path().to_path_buf(),
            seed: 0,
            num_classes: 2,
        };
        let err = render_dictionary_figures(&request, &VisConfig::default()).unwrap_err();
        assert!(matches!(err, VisError::Validation(_)));
        assert!(!dir.path().join("vis0.png").exists());
    }

    #[test]
    fn curves_reject_oversized_top_n() {
        let request = CurvesRequest {
            dir: PathBuf::from("."),
            seed: 0,
            num_attributes: 2,
        };
        let err = render_importance_curves(&request, &VisConfig::default()).unwrap_err();
        assert!(matches!(err, VisError::Config(_)));
    }
}
