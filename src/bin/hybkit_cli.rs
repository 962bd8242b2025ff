use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use hybkit_rs::settings::ErrorMode;
use hybkit_rs::type_finder::{IdMap, StringMatchParams};
use hybkit_rs::{
    analyze_mirna_folds, analyze_mirna_targets, annotate_record, create_fold, create_hyb, filter_records,
    open_fold, open_hyb, summarize_hyb_files, CountMode, Error, FoldFormat, HybFoldIter, MatchMode,
    Property, RecordFilter, Result, Settings, TargetFilter, TypeFinder,
};

#[derive(Debug, Parser)]
#[command(name = "hybkit-rs", version, about = "Work with hyb chimeric-read files and their folds")]
struct Cli {
    #[arg(long = "settings", global = true, value_name = "YAML", help = "Settings file; flags below override it")]
    settings: Option<PathBuf>,

    #[arg(long = "error-mode", global = true, value_name = "MODE", help = "raise, warn_return, return, warn_skip or skip")]
    error_mode: Option<ErrorMode>,

    #[arg(long = "allowed-mismatches", global = true, value_name = "N")]
    allowed_mismatches: Option<usize>,

    #[arg(long = "count-mode", global = true, value_name = "MODE", help = "read or record")]
    count_mode: Option<CountMode>,

    #[arg(long = "allow-undefined-flags", global = true)]
    allow_undefined_flags: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse hyb files (and optional fold files) and report problems.
    Check {
        #[arg(short = 'i', long = "hyb", required = true, num_args = 1.., value_name = "PATH")]
        hyb: Vec<PathBuf>,

        #[arg(short = 'f', long = "fold", num_args = 1.., value_name = "PATH", help = "Fold files, one per hyb file")]
        fold: Vec<PathBuf>,
    },
    /// Keep records matching the given properties.
    Filter {
        #[arg(short = 'i', long = "hyb", required = true, value_name = "PATH")]
        hyb: PathBuf,

        #[arg(short = 'o', long = "out", required = true, value_name = "PATH")]
        out: PathBuf,

        #[arg(long = "include", value_name = "PROPERTY")]
        include: Vec<Property>,

        #[arg(long = "exclude", value_name = "PROPERTY")]
        exclude: Vec<Property>,

        #[arg(long = "any", help = "Keep records matching any include property")]
        any: bool,

        #[arg(long = "allow-unknown", help = "Unknown values test false instead of failing")]
        allow_unknown: bool,

        #[arg(long = "eval-types", help = "Assign segment types and miRNA flags before filtering")]
        eval_types: bool,

        #[command(flatten)]
        types: TypeArgs,
    },
    /// Summarize segment types and miRNA content; with --fold, analyze miRNA folding.
    Analyze {
        #[arg(short = 'i', long = "hyb", required = true, num_args = 1.., value_name = "PATH")]
        hyb: Vec<PathBuf>,

        #[arg(short = 'f', long = "fold", value_name = "PATH", help = "Fold file for a single hyb input")]
        fold: Option<PathBuf>,

        #[arg(short = 'o', long = "out-prefix", required = true, value_name = "PREFIX")]
        out_prefix: PathBuf,

        #[command(flatten)]
        types: TypeArgs,

        #[command(flatten)]
        targets: TargetArgs,
    },
    /// Pair hyb records with fold records and write the accepted pairs.
    Pair {
        #[arg(short = 'i', long = "hyb", required = true, value_name = "PATH")]
        hyb: PathBuf,

        #[arg(short = 'f', long = "fold", required = true, value_name = "PATH")]
        fold: PathBuf,

        #[arg(long = "out-hyb", required = true, value_name = "PATH")]
        out_hyb: PathBuf,

        #[arg(long = "out-fold", value_name = "PATH")]
        out_fold: Option<PathBuf>,

        #[arg(long = "fold-format", value_name = "FORMAT", help = "vienna, viennad or ct; inferred from the suffix by default")]
        fold_format: Option<FoldFormat>,
    },
}

#[derive(Debug, Args)]
struct TypeArgs {
    #[arg(long = "string-match", value_name = "CSV", conflicts_with = "id_map", help = "search_type,search_string,seg_type rules")]
    string_match: Option<PathBuf>,

    #[arg(long = "id-map", value_name = "CSV", num_args = 1.., help = "identifier,seg_type files")]
    id_map: Vec<PathBuf>,
}

impl TypeArgs {
    fn finder(&self) -> Result<TypeFinder> {
        if let Some(path) = &self.string_match {
            return Ok(TypeFinder::StringMatch(StringMatchParams::from_path(path)?));
        }
        if !self.id_map.is_empty() {
            return Ok(TypeFinder::IdMap(IdMap::from_paths(&self.id_map)?));
        }
        Ok(TypeFinder::Hybformat)
    }
}

#[derive(Debug, Args)]
struct TargetArgs {
    #[arg(long = "targets", help = "Also count each miRNA's targets")]
    enabled: bool,

    #[arg(long = "double-count-duplexes", help = "Count miRNA dimers once from each side")]
    double_count_duplexes: bool,

    #[arg(long = "mirna-contains", value_name = "TEXT")]
    mirna_contains: Option<String>,

    #[arg(long = "mirna-matches", value_name = "NAME")]
    mirna_matches: Option<String>,

    #[arg(long = "target-contains", value_name = "TEXT")]
    target_contains: Option<String>,

    #[arg(long = "target-matches", value_name = "NAME")]
    target_matches: Option<String>,
}

impl TargetArgs {
    fn filter(&self) -> TargetFilter {
        TargetFilter {
            mirna_contains: self.mirna_contains.clone(),
            mirna_matches: self.mirna_matches.clone(),
            target_contains: self.target_contains.clone(),
            target_matches: self.target_matches.clone(),
        }
    }
}

fn spinner(color: &str, msg: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&[
                "⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏",
            ])
            .template(&format!("{{spinner:.{}}} {{msg}}", color))
            .expect("Invalid spinner template"),
    );
    spinner.set_message(msg.into());
    spinner
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.settings {
        Some(path) => Settings::from_yaml_file(path)?,
        None => Settings::default(),
    };
    if let Some(mode) = cli.error_mode {
        settings.iter.error_mode = mode;
    }
    if let Some(n) = cli.allowed_mismatches {
        settings.fold.reconcile.allowed_mismatches = n;
    }
    if let Some(mode) = cli.count_mode {
        settings.analysis.count_mode = mode;
    }
    if cli.allow_undefined_flags {
        settings.hyb.allow_undefined_flags = true;
    }
    settings.validate()?;
    Ok(settings)
}

fn run_check(hyb: &[PathBuf], fold: &[PathBuf], settings: &Settings) -> Result<()> {
    if !fold.is_empty() && fold.len() != hyb.len() {
        return Err(Error::Analysis(format!(
            "{} hyb files but {} fold files",
            hyb.len(),
            fold.len()
        )));
    }
    for (i, hyb_path) in hyb.iter().enumerate() {
        let sp = spinner("blue", format!("Checking {}...", hyb_path.display()));
        match fold.get(i) {
            Some(fold_path) => {
                let hyb_reader = open_hyb(hyb_path, settings.hyb.clone())?;
                let fold_reader = open_fold(fold_path, settings.fold.format, &settings.fold.placeholder)?;
                let mut pairs = HybFoldIter::from_settings(hyb_reader, fold_reader, settings);
                while let Some(step) = pairs.next_step() {
                    step?;
                }
                sp.finish_with_message(pairs.report().report());
            }
            None => {
                let mut n_records = 0usize;
                for record in open_hyb(hyb_path, settings.hyb.clone())? {
                    record?;
                    n_records += 1;
                }
                sp.finish_with_message(format!("{}: {} valid records", hyb_path.display(), n_records));
            }
        }
    }
    Ok(())
}

fn run_filter(
    hyb: &Path,
    out: &Path,
    filter: &RecordFilter,
    eval_types: bool,
    finder: &TypeFinder,
    settings: &Settings,
) -> Result<()> {
    let sp = spinner("green", format!("Filtering {}...", hyb.display()));
    let mut writer = create_hyb(out, settings.hyb.clone())?;
    let mut kept = 0usize;
    if eval_types {
        for record in open_hyb(hyb, settings.hyb.clone())? {
            let mut record = record?;
            annotate_record(&mut record, finder, settings)?;
            if filter.matches(&record)? {
                writer.write_record(&record)?;
                kept += 1;
            }
        }
    } else {
        for record in filter_records(open_hyb(hyb, settings.hyb.clone())?, filter) {
            writer.write_record(&record?)?;
            kept += 1;
        }
    }
    writer.finish()?;
    sp.finish_with_message(format!("Kept {} records in {}", kept, out.display()));
    Ok(())
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn run_analyze(
    hyb: &[PathBuf],
    fold: Option<&Path>,
    out_prefix: &Path,
    finder: &TypeFinder,
    targets: &TargetArgs,
    settings: &Settings,
) -> Result<()> {
    let sp = spinner("green", "Summarizing hyb files...");
    let results = summarize_hyb_files(hyb, finder, settings)?;
    let summary_path = with_suffix(out_prefix, "_summary.csv");
    fs::write(&summary_path, results.get_summary_text())?;
    sp.finish_with_message(format!("Summary written to {}", summary_path.display()));

    if targets.enabled {
        let sp = spinner("cyan", "Counting miRNA targets...");
        let mut target_settings = settings.clone();
        if targets.double_count_duplexes {
            target_settings.analysis.double_count_duplexes = true;
        }
        let analysis = analyze_mirna_targets(hyb, finder, &targets.filter(), &target_settings)?;
        let target_out = with_suffix(out_prefix, "_mirna_targets.csv");
        let mut text = analysis.to_lines(&settings.analysis.out_delim).join("\n");
        text.push('\n');
        fs::write(&target_out, text)?;
        sp.finish_with_message(format!(
            "miRNA targets written to {} ({} counted)",
            target_out.display(),
            analysis.total()
        ));
    }

    if let Some(fold_path) = fold {
        let [hyb_path] = hyb else {
            return Err(Error::Analysis("fold analysis takes exactly one hyb file".to_string()));
        };
        let sp = spinner("yellow", "Analyzing miRNA folds...");
        let (analysis, report) = analyze_mirna_folds(hyb_path, fold_path, finder, settings)?;
        let fold_out = with_suffix(out_prefix, "_mirna_fold.csv");
        let mut text = analysis.to_lines(&settings.analysis.out_delim).join("\n");
        text.push('\n');
        fs::write(&fold_out, text)?;
        sp.finish_with_message(format!(
            "miRNA fold analysis written to {} ({} pairs)",
            fold_out.display(),
            report.paired
        ));
    }
    Ok(())
}

fn run_pair(
    hyb: &Path,
    fold: &Path,
    out_hyb: &Path,
    out_fold: Option<&Path>,
    fold_format: Option<FoldFormat>,
    settings: &Settings,
) -> Result<()> {
    let sp = spinner("green", "Pairing hyb and fold records...");
    let format = fold_format.or(settings.fold.format);
    let hyb_reader = open_hyb(hyb, settings.hyb.clone())?;
    let fold_reader = open_fold(fold, format, &settings.fold.placeholder)?;
    let mut pairs = HybFoldIter::from_settings(hyb_reader, fold_reader, settings);

    let mut hyb_writer = create_hyb(out_hyb, settings.hyb.clone())?;
    let mut fold_writer = match out_fold {
        Some(path) => Some(create_fold(
            path,
            FoldFormat::from_path(path).unwrap_or(FoldFormat::Vienna),
            &settings.fold.placeholder,
        )?),
        None => None,
    };
    for paired in pairs.by_ref() {
        let paired = paired?;
        hyb_writer.write_record(&paired.hyb)?;
        if let (Some(writer), Some(fold_record)) = (fold_writer.as_mut(), paired.fold.as_ref()) {
            writer.write_record(fold_record)?;
        }
    }
    hyb_writer.finish()?;
    if let Some(writer) = fold_writer {
        writer.finish()?;
    }
    sp.finish_with_message(pairs.report().report());
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(&cli)?;
    match cli.command {
        Command::Check { hyb, fold } => run_check(&hyb, &fold, &settings),
        Command::Filter {
            hyb,
            out,
            include,
            exclude,
            any,
            allow_unknown,
            eval_types,
            types,
        } => {
            let filter = RecordFilter {
                include,
                exclude,
                mode: if any { MatchMode::Any } else { MatchMode::All },
                allow_unknown,
            };
            run_filter(&hyb, &out, &filter, eval_types, &types.finder()?, &settings)
        }
        Command::Analyze {
            hyb,
            fold,
            out_prefix,
            types,
            targets,
        } => run_analyze(&hyb, fold.as_deref(), &out_prefix, &types.finder()?, &targets, &settings),
        Command::Pair {
            hyb,
            fold,
            out_hyb,
            out_fold,
            fold_format,
        } => run_pair(&hyb, &fold, &out_hyb, out_fold.as_deref(), fold_format, &settings),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => {
            info!("All done!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
