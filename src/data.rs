use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, VisError};

/// Which branch a tree took at a decision node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Feature value `<=` threshold (left child)
    LessOrEqual,
    /// Feature value `>` threshold (right child)
    Greater,
}

impl Comparison {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::LessOrEqual => "<=",
            Comparison::Greater => ">",
        }
    }
}

/// One decision node visited while classifying the explained series.
///
/// Interval bounds are inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionNode {
    pub attribute: usize,
    pub interval_start: usize,
    pub interval_end: usize,
    pub threshold: f64,
    pub comparison: Comparison,
}

impl DecisionNode {
    pub fn new(
        attribute: usize,
        interval_start: usize,
        interval_end: usize,
        threshold: f64,
        comparison: Comparison,
    ) -> Self {
        Self {
            attribute,
            interval_start,
            interval_end,
            threshold,
            comparison,
        }
    }

    pub fn contains(&self, time_point: usize) -> bool {
        self.interval_start <= time_point && time_point <= self.interval_end
    }

    pub fn width(&self) -> usize {
        self.interval_end - self.interval_start
    }
}

/// Path of one tree through the forest for the explained series
#[derive(Debug, Clone, PartialEq)]
pub struct TreePath {
    pub index: usize,
    pub predicted_class: usize,
    pub nodes: Vec<DecisionNode>,
    pub leaf_distribution: Vec<f64>,
}

/// Contents of a `pred<seed>-<id>.txt` dump
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionDump {
    pub series: Vec<f64>,
    pub trees: Vec<TreePath>,
}

impl PredictionDump {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let dump = Self::parse(&text)?;
        debug!(
            path = %path.as_ref().display(),
            trees = dump.trees.len(),
            series_length = dump.series.len(),
            "loaded prediction dump"
        );
        Ok(dump)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = numbered_lines(text);

        let (line_no, header) = lines
            .next()
            .ok_or_else(|| VisError::parse(1, "empty dump"))?;
        if header != "Series" {
            return Err(VisError::parse(
                line_no,
                format!("expected 'Series', found '{}'", header),
            ));
        }
        let (line_no, series_line) = lines
            .next()
            .ok_or_else(|| VisError::parse(line_no + 1, "missing series values"))?;
        let series = parse_array_line(series_line, line_no)?;

        let mut trees = Vec::new();
        while let Some((line_no, header)) = lines.next() {
            let (index, num_lines, predicted_class) = parse_tree_header(header, line_no)?;
            if num_lines == 0 {
                return Err(VisError::parse(line_no, "tree must list at least its leaf"));
            }

            let mut nodes = Vec::new();
            for _ in 0..num_lines - 1 {
                let (node_line, text) = lines.next().ok_or_else(|| {
                    VisError::parse(line_no, format!("tree {} ends early", index))
                })?;
                nodes.push(parse_node(text, node_line)?);
            }

            let (leaf_line, text) = lines.next().ok_or_else(|| {
                VisError::parse(line_no, format!("tree {} is missing its leaf", index))
            })?;
            let leaf_distribution = parse_array_line(text, leaf_line)?;
            if predicted_class >= leaf_distribution.len() {
                return Err(VisError::parse(
                    line_no,
                    format!(
                        "tree {} predicts class {} but its leaf lists {} classes",
                        index,
                        predicted_class,
                        leaf_distribution.len()
                    ),
                ));
            }

            trees.push(TreePath {
                index,
                predicted_class,
                nodes,
                leaf_distribution,
            });
        }

        Ok(Self { series, trees })
    }

    /// Number of trees voting for each class
    pub fn class_votes(&self) -> Vec<usize> {
        let num_classes = self
            .trees
            .iter()
            .map(|t| t.predicted_class + 1)
            .max()
            .unwrap_or(0);
        let mut votes = vec![0; num_classes];
        for tree in &self.trees {
            votes[tree.predicted_class] += 1;
        }
        votes
    }

    /// Majority vote of the forest, ties broken at random
    pub fn ensemble_prediction<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        let votes = self.class_votes();
        let best = votes.iter().copied().max().filter(|&v| v > 0)?;
        let tied: Vec<usize> = votes
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v == best)
            .map(|(class, _)| class)
            .collect();
        tied.choose(rng).copied()
    }

    /// Decision nodes of every tree that predicted `class`
    pub fn agreeing_nodes(&self, class: usize) -> Vec<DecisionNode> {
        self.trees
            .iter()
            .filter(|t| t.predicted_class == class)
            .flat_map(|t| t.nodes.iter().copied())
            .collect()
    }
}

/// Temporal importance curves from a `vis<seed>.txt` dump
#[derive(Debug, Clone, PartialEq)]
pub struct ImportanceCurves {
    pub names: Vec<String>,
    pub curves: Vec<Vec<f64>>,
}

impl ImportanceCurves {
    pub fn load<P: AsRef<Path>>(path: P, num_attributes: usize) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::parse(&text, num_attributes)
    }

    pub fn parse(text: &str, num_attributes: usize) -> Result<Self> {
        let mut lines = numbered_lines(text);
        let mut names = Vec::new();
        let mut curves = Vec::new();

        for attribute in 0..num_attributes {
            let (_, name) = lines.next().ok_or_else(|| {
                VisError::Validation(format!(
                    "expected {} attributes, dump ends at attribute {}",
                    num_attributes, attribute
                ))
            })?;
            let (line_no, values) = lines.next().ok_or_else(|| {
                VisError::Validation(format!("attribute '{}' has no curve", name))
            })?;
            names.push(name.to_string());
            curves.push(parse_array_line(values, line_no)?);
        }

        if let Some(first) = curves.first() {
            if let Some((idx, curve)) = curves
                .iter()
                .enumerate()
                .find(|(_, c)| c.len() != first.len())
            {
                return Err(VisError::Validation(format!(
                    "curve for '{}' has {} points, expected {}",
                    names[idx],
                    curve.len(),
                    first.len()
                )));
            }
        }

        Ok(Self { names, curves })
    }
}

const CATCH22_NAMES: [&str; 22] = [
    "DN_HistogramMode_5",
    "DN_HistogramMode_10",
    "SB_BinaryStats_mean_longstretch1",
    "DN_OutlierInclude_p_001_mdrmd",
    "DN_OutlierInclude_n_001_mdrmd",
    "CO_f1ecac",
    "CO_FirstMin_ac",
    "SP_Summaries_welch_rect_area_5_1",
    "SP_Summaries_welch_rect_centroid",
    "FC_LocalSimple_mean3_stderr",
    "CO_trev_1_num",
    "CO_HistogramAMI_even_2_5",
    "IN_AutoMutualInfoStats_40_gaussian_fmmi",
    "MD_hrv_classic_pnn40",
    "SB_BinaryStats_diff_longstretch0",
    "SB_MotifThree_quantile_hh",
    "FC_LocalSimple_mean1_tauresrat",
    "CO_Embed2_Dist_tau_d_expfit_meandiff",
    "SC_FluctAnal_2_dfa_50_1_2_logi_prop_r1",
    "SC_FluctAnal_2_rsrangefit_50_1_logi_prop_r1",
    "SB_TransitionMatrix_3ac_sumdiagcov",
    "PD_PeriodicityWang_th0_01",
];

/// Display name of a forest attribute (catch22 features, then mean/std/slope)
pub fn attribute_name(index: usize) -> String {
    match index {
        i if i < CATCH22_NAMES.len() => CATCH22_NAMES[i].to_string(),
        22 => "Mean".to_string(),
        23 => "Standard Deviation".to_string(),
        24 => "Slope".to_string(),
        i => format!("Attribute {}", i),
    }
}

pub fn prediction_dump_path(dir: &Path, seed: u64, pred_id: usize) -> PathBuf {
    dir.join(format!("pred{}-{}.txt", seed, pred_id))
}

pub fn curves_dump_path(dir: &Path, seed: u64) -> PathBuf {
    dir.join(format!("vis{}.txt", seed))
}

/// Parse a `[a, b, c]` line as written by `Arrays.toString`
pub fn parse_array_line(line: &str, line_no: usize) -> Result<Vec<f64>> {
    let inner = line
        .trim()
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| VisError::parse(line_no, format!("expected '[...]', found '{}'", line)))?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    inner
        .split(',')
        .map(|token| {
            let token = token.trim();
            token
                .parse::<f64>()
                .map_err(|_| VisError::parse(line_no, format!("invalid number '{}'", token)))
        })
        .collect()
}

/// Non-blank lines paired with their 1-based line numbers
pub(crate) fn numbered_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
}

/// `Tree <index> - <n> nodes - pred <class>`
fn parse_tree_header(line: &str, line_no: usize) -> Result<(usize, usize, usize)> {
    let bad_header = || VisError::parse(line_no, format!("malformed tree header '{}'", line));

    let parts: Vec<&str> = line.split(" - ").map(str::trim).collect();
    if parts.len() != 3 {
        return Err(bad_header());
    }

    let index = parts[0]
        .strip_prefix("Tree ")
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(bad_header)?;
    let num_lines = parts[1]
        .strip_suffix(" nodes")
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(bad_header)?;
    let predicted_class = parts[2]
        .strip_prefix("pred ")
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(bad_header)?;

    Ok((index, num_lines, predicted_class))
}

fn parse_node(line: &str, line_no: usize) -> Result<DecisionNode> {
    let values = parse_array_line(line, line_no)?;
    if values.len() != 5 {
        return Err(VisError::parse(
            line_no,
            format!("decision node needs 5 values, found {}", values.len()),
        ));
    }

    let comparison = match values[4] {
        v if v == 0.0 => Comparison::LessOrEqual,
        v if v == 1.0 => Comparison::Greater,
        v => {
            return Err(VisError::parse(
                line_no,
                format!("branch direction must be 0 or 1, found {}", v),
            ))
        }
    };

    Ok(DecisionNode {
        attribute: as_index(values[0], "attribute", line_no)?,
        interval_start: as_index(values[1], "interval start", line_no)?,
        interval_end: as_index(values[2], "interval end", line_no)?,
        threshold: values[3],
        comparison,
    })
}

pub(crate) fn as_index(value: f64, field: &str, line_no: usize) -> Result<usize> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
        Ok(value as usize)
    } else {
        Err(VisError::parse(
            line_no,
            format!("{} must be a non-negative integer, found {}", field, value),
        ))
    }
}
