//! CSSR - command-line driver
//!
//! Reads a data file, infers the causal-state automaton and writes the four
//! result files next to the chosen output prefix.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use cssr::{Alphabet, Artifacts, Engine, InferenceConfig, Result, TestKind};

/// Causal State Splitting Reconstruction
#[derive(Parser, Debug)]
#[command(name = "cssr")]
#[command(author = "Apilium Technologies")]
#[command(version)]
#[command(about = "Infer the minimal predictive automaton of a symbol sequence", long_about = None)]
struct Args {
    /// Symbols of the alphabet, written as one string (e.g. "01")
    #[arg(short, long)]
    alphabet: String,

    /// Data file
    #[arg(short, long)]
    data: PathBuf,

    /// Longest history considered [env: CSSR_MAX_LENGTH, default: 3]
    #[arg(short = 'L', long)]
    max_length: Option<usize>,

    /// Significance level of the equivalence test [env: CSSR_SIGNIFICANCE, default: 0.05]
    #[arg(short, long)]
    significance: Option<f64>,

    /// Equivalence test: "ks" (Kolmogorov-Smirnov) or "ch" (chi-squared) [env: CSSR_TEST, default: ks]
    #[arg(short, long)]
    test: Option<TestKind>,

    /// Treat every non-empty line of the data file as its own sequence
    #[arg(short, long)]
    multi_line: bool,

    /// Prefix of the output files; defaults to the data file path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write every artifact as JSON to <prefix>.json
    #[arg(long)]
    json: bool,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    if let Err(e) = run(args) {
        log::error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(if e.is_input_error() { 2 } else { 1 });
    }
}

fn run(args: Args) -> Result<()> {
    let alphabet = Alphabet::parse(&args.alphabet)?;
    let config = apply_args(InferenceConfig::from_env(), &args);

    let raw = fs::read_to_string(&args.data)
        .map_err(|e| cssr::Error::Io(format!("{}: {}", args.data.display(), e)))?;
    let sequences = split_sequences(&raw, args.multi_line);

    let mut engine = Engine::with_config(alphabet, config)?;
    engine.feed_all(&sequences)?;
    let automaton = engine.infer()?;

    let artifacts = Artifacts::from_automaton(&automaton).with_multi_line(args.multi_line);
    let prefix = args.output.unwrap_or_else(|| args.data.clone());
    let (dir, name) = split_prefix(&prefix);
    artifacts.write_to(&dir, &name)?;
    if args.json {
        let path = dir.join(format!("{}.json", name));
        fs::write(&path, artifacts.to_json()?)
            .map_err(|e| cssr::Error::Io(format!("{}: {}", path.display(), e)))?;
    }

    println!(
        "Statistical Complexity: {:.7}",
        automaton.statistical_complexity()
    );
    let stationary: Vec<String> = automaton
        .stationary()
        .iter()
        .map(|p| format!("{:.7}", p))
        .collect();
    println!("Stationary Distribution: {}", stationary.join(" "));
    Ok(())
}

/// Overrides `base` with the options given on the command line. Options left
/// out keep whatever `base` holds, so `CSSR_*` variables still apply.
fn apply_args(mut base: InferenceConfig, args: &Args) -> InferenceConfig {
    if let Some(max_length) = args.max_length {
        base.max_length = max_length;
    }
    if let Some(level) = args.significance {
        base.significance_level = level;
    }
    if let Some(kind) = args.test {
        base.test_kind = kind;
    }
    base
}

/// Single-line mode joins the whole file into one sequence; multi-line mode
/// keeps each non-empty line. Whitespace is never part of the data.
fn split_sequences(raw: &str, multi_line: bool) -> Vec<String> {
    let strip = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
    if multi_line {
        raw.lines()
            .map(strip)
            .filter(|line| !line.is_empty())
            .collect()
    } else {
        vec![strip(raw)]
    }
}

fn split_prefix(prefix: &Path) -> (PathBuf, String) {
    let dir = prefix
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let name = prefix
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    (dir, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line_strips_whitespace() {
        assert_eq!(split_sequences("01 01\n10\n", false), vec!["010110"]);
    }

    #[test]
    fn test_multi_line_skips_blank_lines() {
        assert_eq!(
            split_sequences("0101\n\n  \n110\n", true),
            vec!["0101", "110"]
        );
    }

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["cssr", "--alphabet", "01", "--data", "data.txt"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_omitted_options_keep_base_config() {
        let base = InferenceConfig::new(5)
            .with_significance(0.5)
            .with_test(TestKind::ChiSquared);
        let config = apply_args(base.clone(), &parse(&[]));
        assert_eq!(config, base);
    }

    #[test]
    fn test_given_options_override_base_config() {
        let base = InferenceConfig::new(5)
            .with_significance(0.5)
            .with_test(TestKind::ChiSquared);
        let config = apply_args(base, &parse(&["-L", "4", "-s", "0.01", "--test", "ks"]));
        assert_eq!(config.max_length, 4);
        assert_eq!(config.significance_level, 0.01);
        assert_eq!(config.test_kind, TestKind::KolmogorovSmirnov);
        assert_eq!(config.min_sample, 5);
    }

    #[test]
    fn test_split_prefix() {
        let (dir, name) = split_prefix(Path::new("out/run1"));
        assert_eq!(dir, PathBuf::from("out"));
        assert_eq!(name, "run1");
    }
}
