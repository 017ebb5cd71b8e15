use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use class_core::{
    drive, generate_profiles, run_ensemble, ClassOutput, ClassResult, Config, MixedLayerModel,
    OutputVariable, ProfileSettings, RunOptions, Sweep, DEFAULT_OUTPUT_FREQUENCY,
};
use serde_json::Value;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Run the CLASS mixed-layer model without a GUI
#[derive(Parser, Debug)]
#[command(name = "class-headless")]
#[command(about = "CLASS mixed-layer boundary layer model", long_about = None)]
struct Args {
    /// JSON configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output interval in seconds, a whole multiple of dt
    #[arg(short, long, default_value_t = DEFAULT_OUTPUT_FREQUENCY)]
    freq: f64,

    /// Comma-separated output variables (h, theta, dtheta, q, dq)
    #[arg(long, value_delimiter = ',')]
    vars: Vec<OutputVariable>,

    /// Also record every diagnostic quantity
    #[arg(short, long)]
    diagnostics: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Csv)]
    format: Format,

    /// Output file; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Parameter sweep `section.parameter=start:step:steps` (repeatable)
    #[arg(short, long)]
    sweep: Vec<Sweep>,

    /// Write the vertical profile of the final state as JSON to this file
    #[arg(short, long, value_name = "FILE")]
    profile: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Csv,
    Json,
}

impl Args {
    fn run_options(&self) -> RunOptions {
        let mut options = RunOptions::default().with_freq(self.freq);
        if !self.vars.is_empty() {
            options = options.with_variables(self.vars.clone());
        }
        if self.diagnostics {
            options = options.with_all_diagnostics();
        }
        options
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> ClassResult<()> {
    let config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            Config::from_json_file(path)?
        }
        None => Config::default(),
    };
    info!(
        "Running '{}': dt={}s, runtime={}s, output every {}s",
        config.name, config.time_control.dt, config.time_control.runtime, args.freq
    );

    if args.sweep.is_empty() {
        run_single(args, config)
    } else {
        run_sweeps(args, &config)
    }
}

fn run_single(args: &Args, config: Config) -> ClassResult<()> {
    let mut model = MixedLayerModel::new(config)?;
    let output = drive(&mut model, &args.run_options())?;
    emit(&output, args.format, args.output.as_deref())?;

    if let Some(path) = &args.profile {
        let profile = generate_profiles(model.config(), model.state(), &ProfileSettings::default())?;
        profile.write_json_file(path)?;
        info!("Wrote final profile ({} levels) to {}", profile.z.len(), path.display());
    }
    Ok(())
}

fn run_sweeps(args: &Args, config: &Config) -> ClassResult<()> {
    for sweep in &args.sweep {
        info!("Sweep {}: {:?}", sweep, sweep.values());
    }
    if args.profile.is_some() {
        warn!("--profile is ignored for ensemble runs");
    }

    let members = run_ensemble(config, &args.sweep, &args.run_options())?;
    let mut failed = 0;
    for member in &members {
        match (&member.result, &args.output) {
            (Ok(output), Some(path)) => {
                emit(
                    output,
                    args.format,
                    Some(member_path(path, member.index).as_path()),
                )?;
            }
            (Ok(output), None) => {
                println!("{}", summary_line(member.index, &member.overrides, output));
            }
            (Err(err), _) => {
                failed += 1;
                println!("#{} {}: failed: {}", member.index, member.overrides, err);
            }
        }
    }

    info!("Ensemble finished: {} members, {} failed", members.len(), failed);
    Ok(())
}

fn emit(output: &ClassOutput, format: Format, path: Option<&Path>) -> ClassResult<()> {
    match (format, path) {
        (Format::Csv, Some(path)) => output.write_csv_file(path)?,
        (Format::Json, Some(path)) => output.write_json_file(path)?,
        (Format::Csv, None) => output.write_csv(&mut io::stdout().lock())?,
        (Format::Json, None) => output.write_json(&mut io::stdout().lock())?,
    }
    if let Some(path) = path {
        info!("Wrote {} samples to {}", output.len(), path.display());
    }
    Ok(())
}

/// `out/run.csv` becomes `out/run_<index>.csv`.
fn member_path(path: &Path, index: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map_or_else(|| "member".to_string(), |s| s.to_string_lossy().into_owned());
    let mut name = format!("{stem}_{index}");
    if let Some(ext) = path.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    path.with_file_name(name)
}

/// Final value of every recorded variable, one line per member.
fn summary_line(index: usize, overrides: &Value, output: &ClassOutput) -> String {
    let finals: Vec<String> = output
        .variables()
        .iter()
        .filter_map(|&var| {
            output
                .column(var)
                .and_then(<[f64]>::last)
                .map(|value| format!("{var}={value:.4}"))
        })
        .collect();
    format!("#{index} {overrides}: {}", finals.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_variables_and_repeated_sweeps() {
        let args = Args::try_parse_from([
            "class-headless",
            "--vars",
            "h,theta",
            "--sweep",
            "initialState.h_0=100:100:3",
            "--sweep",
            "mixedLayer.beta=0.1:0.1:2",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(args.vars, vec![OutputVariable::H, OutputVariable::Theta]);
        assert_eq!(args.sweep.len(), 2);
        assert_eq!(args.sweep[0].parameter, "h_0");
        assert_eq!(args.format, Format::Json);
        assert_eq!(args.freq, DEFAULT_OUTPUT_FREQUENCY);

        let options = args.run_options();
        assert_eq!(options.variables.len(), 2);
        assert!(options.diagnostics.is_empty());
    }

    #[test]
    fn rejects_unknown_variables_and_bad_sweeps() {
        assert!(Args::try_parse_from(["class-headless", "--vars", "windspeed"]).is_err());
        assert!(Args::try_parse_from(["class-headless", "--sweep", "h_0=1:2:3"]).is_err());
        assert!(Args::try_parse_from(["class-headless", "--profile"]).is_err());
    }

    #[test]
    fn profile_goes_to_its_own_file() {
        let args =
            Args::try_parse_from(["class-headless", "--format", "json", "--profile", "out/profile.json"])
                .unwrap();
        assert_eq!(args.profile, Some(PathBuf::from("out/profile.json")));
        assert!(args.output.is_none());

        let args = Args::try_parse_from(["class-headless"]).unwrap();
        assert!(args.profile.is_none());
    }

    #[test]
    fn member_paths_keep_directory_and_extension() {
        assert_eq!(
            member_path(Path::new("out/run.csv"), 3),
            PathBuf::from("out/run_3.csv")
        );
        assert_eq!(member_path(Path::new("run"), 0), PathBuf::from("run_0"));
    }

    #[test]
    fn summary_reports_final_values() {
        let config = Config::default();
        let mut model = MixedLayerModel::new(config).unwrap();
        let options = RunOptions::default().with_variables(vec![OutputVariable::H]);
        let output = drive(&mut model, &options).unwrap();

        let line = summary_line(2, &serde_json::json!({"mixedLayer": {"beta": 0.2}}), &output);
        assert!(line.starts_with("#2 {\"mixedLayer\":{\"beta\":0.2}}: h="));
    }
}
