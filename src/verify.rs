use crate::data::{DecisionNode, PredictionDump};
use crate::dictionary::DictionaryDump;
use crate::error::{Result, VisError};

/// Check every node against the attribute space and series length
pub fn validate_nodes(
    nodes: &[DecisionNode],
    num_attributes: usize,
    series_length: usize,
) -> Result<()> {
    for (idx, node) in nodes.iter().enumerate() {
        if node.attribute >= num_attributes {
            return Err(VisError::Validation(format!(
                "node {} tests attribute {}, only {} attributes exist",
                idx, node.attribute, num_attributes
            )));
        }
        if node.interval_start > node.interval_end {
            return Err(VisError::Validation(format!(
                "node {} has inverted interval {}..{}",
                idx, node.interval_start, node.interval_end
            )));
        }
        if node.interval_end >= series_length {
            return Err(VisError::Validation(format!(
                "node {} interval ends at {}, series has {} points",
                idx, node.interval_end, series_length
            )));
        }
        if !node.threshold.is_finite() {
            return Err(VisError::Validation(format!(
                "node {} has non-finite threshold {}",
                idx, node.threshold
            )));
        }
    }
    Ok(())
}

/// Check the dump against the tree count and series length the producer reported
pub fn validate_dump(
    dump: &PredictionDump,
    expected_trees: Option<usize>,
    expected_length: Option<usize>,
) -> Result<()> {
    if dump.series.is_empty() {
        return Err(VisError::Validation("series is empty".to_string()));
    }
    if let Some(expected) = expected_trees {
        if dump.trees.len() != expected {
            return Err(VisError::Validation(format!(
                "dump lists {} trees, expected {}",
                dump.trees.len(),
                expected
            )));
        }
    }
    if let Some(expected) = expected_length {
        if dump.series.len() != expected {
            return Err(VisError::Validation(format!(
                "series has {} points, expected {}",
                dump.series.len(),
                expected
            )));
        }
    }
    Ok(())
}

/// Check that the drawn word, its breakpoints and the series agree
pub fn validate_dictionary_dump(dump: &DictionaryDump) -> Result<()> {
    if dump.series.is_empty() {
        return Err(VisError::Validation("series is empty".to_string()));
    }
    let letters = dump.word.chars().count();
    if letters != dump.word_length.value {
        return Err(VisError::Validation(format!(
            "word '{}' has {} letters, word length is {}",
            dump.word, letters, dump.word_length.value
        )));
    }
    if dump.breakpoints.len() < letters {
        return Err(VisError::Validation(format!(
            "{} breakpoint rows for a {} letter word",
            dump.breakpoints.len(),
            letters
        )));
    }
    if let Some(idx) = dump.breakpoints.iter().position(|row| row.len() < 2) {
        return Err(VisError::Validation(format!(
            "breakpoint row {} needs at least two bounds",
            idx
        )));
    }
    if dump.window_length == 0 || dump.window_length > dump.series.len() {
        return Err(VisError::Validation(format!(
            "window length {} does not fit a series of {} points",
            dump.window_length,
            dump.series.len()
        )));
    }
    Ok(())
}
