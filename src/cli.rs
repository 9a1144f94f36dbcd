use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{ImageFormat, VisConfig};
use crate::pipeline::{CurvesRequest, DictionaryRequest, InterpretRequest, DEFAULT_NUM_ATTRIBUTES};

#[derive(Parser, Debug)]
#[command(name = "tsvis")]
#[command(version)]
#[command(about = "Figures explaining interval forest and dictionary time series classifiers", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Print diagnostic tracing to stderr
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Explain one prediction from a pred<SEED>-<PRED_ID>.txt dump
    Interp(InterpArgs),
    /// Draw temporal importance curves from a vis<SEED>.txt dump
    Curves(CurvesArgs),
    /// Draw word histograms and the SFA transform from a dictionary vis<SEED>.txt dump
    Tde(TdeArgs),
}

/// Flags shared by every figure
#[derive(Args, Debug, Clone, Default)]
pub struct FigureArgs {
    /// Number of attributes to show
    #[arg(long = "top", value_name = "N")]
    pub top_n: Option<usize>,

    /// Seed for random tie-breaks (defaults to the dump seed)
    #[arg(long, value_name = "SEED")]
    pub rng_seed: Option<u64>,

    /// Image format
    #[arg(long, value_enum)]
    pub format: Option<ImageFormat>,

    /// Also write a JSON summary next to the figure
    #[arg(long)]
    pub summary: bool,
}

impl FigureArgs {
    /// Flags override whatever `config` already holds
    pub fn apply(&self, mut config: VisConfig) -> VisConfig {
        if let Some(top_n) = self.top_n {
            config.top_n = top_n;
        }
        if let Some(seed) = self.rng_seed {
            config.rng_seed = Some(seed);
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if self.summary {
            config.write_summary = true;
        }
        config
    }
}

#[derive(Args, Debug)]
pub struct InterpArgs {
    /// Directory holding the dump
    pub dir: PathBuf,
    pub seed: u64,
    pub pred_id: usize,
    /// Tree count reported by the classifier
    pub num_trees: Option<usize>,
    /// Series length reported by the classifier
    pub series_length: Option<usize>,
    /// Number of attributes in the forest's feature space
    pub num_attributes: Option<usize>,
    /// Ensemble prediction; majority vote of the dump when omitted
    pub predicted_class: Option<usize>,

    #[command(flatten)]
    pub figure: FigureArgs,
}

impl InterpArgs {
    pub fn request(&self) -> InterpretRequest {
        InterpretRequest {
            dir: self.dir.clone(),
            seed: self.seed,
            pred_id: self.pred_id,
            num_trees: self.num_trees,
            series_length: self.series_length,
            num_attributes: self.num_attributes.unwrap_or(DEFAULT_NUM_ATTRIBUTES),
            predicted_class: self.predicted_class,
        }
    }
}

#[derive(Args, Debug)]
pub struct CurvesArgs {
    /// Directory holding the dump
    pub dir: PathBuf,
    pub seed: u64,
    pub num_attributes: usize,
    /// Number of curves to draw (same as --top)
    pub top: Option<usize>,

    #[command(flatten)]
    pub figure: FigureArgs,
}

impl CurvesArgs {
    pub fn request(&self) -> CurvesRequest {
        CurvesRequest {
            dir: self.dir.clone(),
            seed: self.seed,
            num_attributes: self.num_attributes,
        }
    }

    pub fn apply(&self, config: VisConfig) -> VisConfig {
        let mut config = self.figure.apply(config);
        if let Some(top) = self.top {
            config.top_n = top;
        }
        config
    }
}

#[derive(Args, Debug)]
pub struct TdeArgs {
    /// Directory holding the dump
    pub dir: PathBuf,
    pub seed: u64,
    pub num_classes: usize,

    /// Image format
    #[arg(long, value_enum)]
    pub format: Option<ImageFormat>,
}

impl TdeArgs {
    pub fn request(&self) -> DictionaryRequest {
        DictionaryRequest {
            dir: self.dir.clone(),
            seed: self.seed,
            num_classes: self.num_classes,
        }
    }

    pub fn apply(&self, mut config: VisConfig) -> VisConfig {
        if let Some(format) = self.format {
            config.format = format;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interp_positionals_mirror_producer_invocation() {
        let cli = Cli::parse_from(["tsvis", "interp", "out/", "0", "3", "500", "24", "25", "1"]);
        let Command::Interp(args) = cli.command else {
            panic!("expected interp subcommand");
        };

        let request = args.request();
        assert_eq!(request.pred_id, 3);
        assert_eq!(request.num_trees, Some(500));
        assert_eq!(request.series_length, Some(24));
        assert_eq!(request.predicted_class, Some(1));
    }

    #[test]
    fn interp_optional_positionals_default() {
        let cli = Cli::parse_from(["tsvis", "interp", "out/", "7", "0", "--top", "2", "--format", "svg"]);
        let Command::Interp(args) = cli.command else {
            panic!("expected interp subcommand");
        };

        let request = args.request();
        assert_eq!(request.num_attributes, DEFAULT_NUM_ATTRIBUTES);
        assert_eq!(request.predicted_class, None);

        let config = args.figure.apply(VisConfig::default());
        assert_eq!(config.top_n, 2);
        assert_eq!(config.format, ImageFormat::Svg);
    }

    #[test]
    fn curves_positional_top_overrides() {
        let cli = Cli::parse_from(["tsvis", "--debug", "curves", "vis/", "0", "25", "4"]);
        assert!(cli.debug);
        let Command::Curves(args) = cli.command else {
            panic!("expected curves subcommand");
        };

        let config = args.apply(VisConfig::default());
        assert_eq!(config.top_n, 4);
        assert_eq!(args.request().num_attributes, 25);
    }

    #[test]
    fn tde_positionals() {
        let cli = Cli::parse_from(["tsvis", "tde", "vis/", "2", "3", "--format", "svg"]);
        let Command::Tde(args) = cli.command else {
            panic!("expected tde subcommand");
        };

        let request = args.request();
        assert_eq!(request.seed, 2);
        assert_eq!(request.num_classes, 3);
        assert_eq!(args.apply(VisConfig::default()).format, ImageFormat::Svg);
    }
}
