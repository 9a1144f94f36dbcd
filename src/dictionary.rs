//! Reader for the dictionary classifier's `vis<seed>.txt` dump.
//!
//! The dump describes one ensemble member (chosen by the most weighted word
//! length and level count), the SFA transform of the first window of a
//! training series, and per-class word histograms of that member's bags.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::data::{as_index, numbered_lines, parse_array_line};
use crate::error::{Result, VisError};

/// Deepest spatial pyramid the reader accepts
pub const MAX_LEVELS: usize = 8;

/// A parameter value of the drawn member and the ensemble weight behind it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedChoice<T> {
    pub value: T,
    pub weight: f64,
}

/// Word counts of one pyramid quadrant (or the bigrams), one row per class
#[derive(Debug, Clone, PartialEq)]
pub struct WordHistogram {
    pub label: String,
    pub words: Vec<String>,
    pub counts: Vec<Vec<f64>>,
}

impl WordHistogram {
    /// Counts divided by the number of bags each class contributed.
    ///
    /// Classes that contributed no bag come out as zeros.
    pub fn normalised(&self, class_counts: &[usize]) -> Vec<Vec<f64>> {
        self.counts
            .iter()
            .enumerate()
            .map(|(class, row)| {
                let bags = class_counts.get(class).copied().unwrap_or(0);
                if bags == 0 {
                    vec![0.0; row.len()]
                } else {
                    row.iter().map(|c| c / bags as f64).collect()
                }
            })
            .collect()
    }
}

/// Height of each stacked bar
pub fn stack_totals(stacks: &[Vec<f64>]) -> Vec<f64> {
    let width = stacks.iter().map(Vec::len).max().unwrap_or(0);
    (0..width)
        .map(|i| stacks.iter().filter_map(|row| row.get(i)).sum())
        .collect()
}

/// Contents of a dictionary classifier `vis<seed>.txt` dump
#[derive(Debug, Clone, PartialEq)]
pub struct DictionaryDump {
    /// Weight of the drawn member
    pub weight: f64,
    /// 1-based rank of the member by weight
    pub rank: usize,
    pub num_classifiers: usize,
    pub word_length: WeightedChoice<usize>,
    pub normalise: WeightedChoice<bool>,
    pub levels: WeightedChoice<usize>,
    pub igb: WeightedChoice<bool>,
    pub window_length: usize,
    pub median_window_length: usize,
    pub weight_sum: f64,
    /// Bags per class that went into the histograms
    pub class_counts: Vec<usize>,
    pub series: Vec<f64>,
    pub dft: Vec<f64>,
    pub word: String,
    /// One row of breakpoints per word letter
    pub breakpoints: Vec<Vec<f64>>,
    /// Pyramid quadrants, level by level (1 + 2 + 4 + ...)
    pub quadrants: Vec<WordHistogram>,
    pub bigrams: WordHistogram,
}

impl DictionaryDump {
    pub fn load<P: AsRef<Path>>(path: P, num_classes: usize) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let dump = Self::parse(&text, num_classes)?;
        debug!(
            path = %path.as_ref().display(),
            levels = dump.levels.value,
            word_length = dump.word_length.value,
            words = dump.quadrants.iter().map(|h| h.words.len()).sum::<usize>(),
            "loaded dictionary dump"
        );
        Ok(dump)
    }

    pub fn parse(text: &str, num_classes: usize) -> Result<Self> {
        if num_classes == 0 {
            return Err(VisError::Config("need at least one class".to_string()));
        }
        let mut lines = Lines::new(text);

        let (line_no, raw) = lines.take("member weight")?;
        let weight: f64 = parse_token(raw, "member weight", line_no)?;
        let (rank, num_classifiers): (usize, usize) = lines.pair("rank")?;
        let (word_length, word_length_weight): (usize, f64) = lines.pair("word length")?;
        let (normalise, normalise_weight): (bool, f64) = lines.pair("normalisation")?;
        let (levels, levels_weight): (usize, f64) = lines.pair("levels")?;
        let (igb, igb_weight): (bool, f64) = lines.pair("IGB")?;
        let (window_length, median_window_length): (usize, usize) = lines.pair("window length")?;
        let (line_no, raw) = lines.take("weight sum")?;
        let weight_sum: f64 = parse_token(raw, "weight sum", line_no)?;

        let (line_no, raw) = lines.take("class counts")?;
        let class_counts = parse_array_line(raw, line_no)?
            .into_iter()
            .map(|v| as_index(v, "class count", line_no))
            .collect::<Result<Vec<usize>>>()?;
        if class_counts.len() != num_classes {
            return Err(VisError::Validation(format!(
                "dump lists bag counts for {} classes, expected {}",
                class_counts.len(),
                num_classes
            )));
        }

        let (line_no, raw) = lines.take("series")?;
        let series = parse_array_line(raw, line_no)?;
        let (line_no, raw) = lines.take("DFT")?;
        let dft = parse_array_line(raw, line_no)?;
        let (_, word) = lines.take("word")?;
        let (line_no, raw) = lines.take("breakpoints")?;
        let breakpoints = raw
            .split(';')
            .map(|row| parse_array_line(row, line_no))
            .collect::<Result<Vec<_>>>()?;

        if levels == 0 || levels > MAX_LEVELS {
            return Err(VisError::Validation(format!(
                "levels must be between 1 and {}, found {}",
                MAX_LEVELS, levels
            )));
        }
        let num_quadrants = (1usize << levels) - 1;
        let mut quadrants = Vec::with_capacity(num_quadrants);
        for index in 0..num_quadrants {
            quadrants.push(lines.histogram(quadrant_label(index), num_classes)?);
        }
        let bigrams = lines.histogram("Bigrams".to_string(), num_classes)?;

        Ok(Self {
            weight,
            rank,
            num_classifiers,
            word_length: WeightedChoice {
                value: word_length,
                weight: word_length_weight,
            },
            normalise: WeightedChoice {
                value: normalise,
                weight: normalise_weight,
            },
            levels: WeightedChoice {
                value: levels,
                weight: levels_weight,
            },
            igb: WeightedChoice {
                value: igb,
                weight: igb_weight,
            },
            window_length,
            median_window_length,
            weight_sum,
            class_counts,
            series,
            dft,
            word: word.to_string(),
            breakpoints,
            quadrants,
            bigrams,
        })
    }

    /// Quadrant histograms grouped by pyramid level
    pub fn level_rows(&self) -> Vec<&[WordHistogram]> {
        let mut rows = Vec::new();
        let mut start = 0;
        let mut width = 1;
        while start < self.quadrants.len() {
            let end = (start + width).min(self.quadrants.len());
            rows.push(&self.quadrants[start..end]);
            start = end;
            width *= 2;
        }
        rows
    }

    /// First level, bigrams, then the deeper levels, as one histogram
    pub fn concatenated(&self) -> WordHistogram {
        let mut parts: Vec<&WordHistogram> = Vec::with_capacity(self.quadrants.len() + 1);
        parts.extend(self.quadrants.first());
        parts.push(&self.bigrams);
        parts.extend(self.quadrants.iter().skip(1));

        let num_classes = self.class_counts.len();
        let mut words = Vec::new();
        let mut counts = vec![Vec::new(); num_classes];
        for part in parts {
            words.extend(part.words.iter().cloned());
            for (class, row) in counts.iter_mut().enumerate() {
                match part.counts.get(class) {
                    Some(values) => row.extend_from_slice(values),
                    None => row.extend(std::iter::repeat(0.0).take(part.words.len())),
                }
            }
        }

        WordHistogram {
            label: "Concatenated and Weighted Features".to_string(),
            words,
            counts,
        }
    }

    /// Series values covered by the first sliding window
    pub fn first_window(&self) -> &[f64] {
        &self.series[..self.window_length.min(self.series.len())]
    }

    /// Y range shared by the DFT coefficients and the letter breakpoints
    pub fn breakpoint_range(&self) -> (f64, f64) {
        let (lo, hi) = self
            .breakpoints
            .iter()
            .flat_map(|row| row.iter().take(row.len().saturating_sub(1)))
            .chain(self.dft.iter())
            .copied()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });

        if !lo.is_finite() || !hi.is_finite() {
            return (0.0, 1.0);
        }
        if (hi - lo).abs() < f64::EPSILON {
            return (lo - 1.0, hi + 1.0);
        }
        let pad = (hi - lo) / 10.0;
        (lo - pad, hi + pad)
    }
}

/// Breakpoints of one word position that open a new letter region.
///
/// The last breakpoint bounds the top letter and is skipped, as are values
/// that do not rise above the previous kept one.
pub fn letter_bounds(row: &[f64]) -> Vec<(usize, f64)> {
    let mut kept: Vec<(usize, f64)> = Vec::new();
    for (letter, &bound) in row.iter().enumerate().take(row.len().saturating_sub(1)) {
        let rises = kept.last().map_or(true, |&(_, prev)| bound > prev);
        if bound.is_finite() && rises {
            kept.push((letter, bound));
        }
    }
    kept
}

/// SFA letter for an alphabet index
pub fn letter(index: usize) -> char {
    u8::try_from(index)
        .ok()
        .filter(|&i| i < 26)
        .map_or('?', |i| (b'a' + i) as char)
}

/// `Level 1`, `Level 2 Q1`, `Level 2 Q2`, `Level 3 Q1`, ...
pub fn quadrant_label(index: usize) -> String {
    let level = (usize::BITS - (index + 1).leading_zeros()) as usize;
    if level == 1 {
        "Level 1".to_string()
    } else {
        format!("Level {} Q{}", level, index + 2 - (1 << (level - 1)))
    }
}

/// Word-histogram figure and SFA transform figure for a dictionary dump
pub fn dictionary_figure_paths(dir: &Path, seed: u64, extension: &str) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("vis{}.{}", seed, extension)),
        dir.join(format!("vis{}_2.{}", seed, extension)),
    )
}

struct Lines<'a> {
    lines: Vec<(usize, &'a str)>,
    next: usize,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: numbered_lines(text).collect(),
            next: 0,
        }
    }

    fn take(&mut self, what: &str) -> Result<(usize, &'a str)> {
        match self.lines.get(self.next) {
            Some(&line) => {
                self.next += 1;
                Ok(line)
            }
            None => {
                let line_no = self.lines.last().map_or(1, |&(n, _)| n + 1);
                Err(VisError::parse(line_no, format!("dump ends before {}", what)))
            }
        }
    }

    /// `<value> <value>` header line
    fn pair<A: FromStr, B: FromStr>(&mut self, what: &str) -> Result<(A, B)> {
        let (line_no, line) = self.take(what)?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != 2 {
            return Err(VisError::parse(
                line_no,
                format!("{} line needs two values, found '{}'", what, line),
            ));
        }
        Ok((
            parse_token(tokens[0], what, line_no)?,
            parse_token(tokens[1], what, line_no)?,
        ))
    }

    /// Word list followed by one count line per class
    fn histogram(&mut self, label: String, num_classes: usize) -> Result<WordHistogram> {
        let (line_no, raw) = self.take(&label)?;
        let words = parse_word_line(raw, line_no)?;

        let mut counts = Vec::with_capacity(num_classes);
        for class in 0..num_classes {
            let (line_no, raw) = self.take(&format!("{} counts for class {}", label, class))?;
            let row = parse_array_line(raw, line_no)?;
            if row.len() != words.len() {
                return Err(VisError::parse(
                    line_no,
                    format!(
                        "{} has {} words but class {} lists {} counts",
                        label,
                        words.len(),
                        class,
                        row.len()
                    ),
                ));
            }
            counts.push(row);
        }

        Ok(WordHistogram {
            label,
            words,
            counts,
        })
    }
}

fn parse_token<T: FromStr>(token: &str, what: &str, line_no: usize) -> Result<T> {
    token
        .trim()
        .parse()
        .map_err(|_| VisError::parse(line_no, format!("invalid {} '{}'", what, token)))
}

/// `[w1, w2, ...]` as written by `ArrayList.toString`
fn parse_word_line(line: &str, line_no: usize) -> Result<Vec<String>> {
    let inner = line
        .trim()
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| VisError::parse(line_no, format!("expected '[...]', found '{}'", line)))?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(inner.split(',').map(|w| w.trim().to_string()).collect())
}
