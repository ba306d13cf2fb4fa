use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{App, AppSettings, Arg, ArgMatches};
use thousands::Separable;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod binning;
mod chart;
mod config;
mod error;
mod export;
mod history;
mod render;

use binning::BinnedSeries;
use chart::ChartDescriptor;
use config::{ChartConfig, TimestampPolicy};
use error::{Error, Result};

fn build_app() -> App<'static, 'static> {
    App::new("shellhist")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Plots the busiest commands in a timestamped shell history as stacked bars")
        .setting(AppSettings::ColoredHelp)
        .arg(Arg::with_name("file")
            .short("f")
            .long("file")
            .value_name("FILE")
            .help("History file to read [default: shellhist]")
            .takes_value(true))
        .arg(Arg::with_name("output")
            .short("o")
            .long("output")
            .value_name("FILE")
            .help("SVG file to write [default: shellhist_pandas_stacked_bars.svg]")
            .takes_value(true))
        .arg(Arg::with_name("config")
            .short("c")
            .long("config")
            .value_name("FILE")
            .help("TOML configuration file [default: ~/.shellhistrc]")
            .takes_value(true))
        .arg(Arg::with_name("interval")
            .short("i")
            .long("interval")
            .value_name("SECONDS")
            .help("Bucket width in seconds [default: 3600]")
            .takes_value(true))
        .arg(Arg::with_name("top")
            .short("n")
            .long("top")
            .value_name("N")
            .help("Number of commands drawn as stacked bars [default: 10]")
            .takes_value(true))
        .arg(Arg::with_name("strict")
            .long("strict")
            .help("Abort on the first unparseable timestamp instead of skipping it"))
        .arg(Arg::with_name("json")
            .short("j")
            .long("json")
            .help("Print the binned summary as JSON"))
        .arg(Arg::with_name("csv")
            .long("csv")
            .value_name("FILE")
            .help("Also write the full binned table as CSV")
            .takes_value(true))
        .arg(Arg::with_name("quiet")
            .short("q")
            .long("quiet")
            .help("Suppress the summary"))
        .arg(Arg::with_name("debug")
            .long("debug")
            .help("Verbose logging on stderr"))
        .after_help("EXAMPLES:\n  shellhist                 # shellhist -> shellhist_pandas_stacked_bars.svg\n  shellhist -f log -o day.svg -i 900\n  shellhist -n 5 --json     # Top five, JSON summary\n  shellhist --csv hours.csv # Keep the binned table too")
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn parse_number<T: std::str::FromStr>(matches: &ArgMatches, name: &str) -> Result<Option<T>> {
    match matches.value_of(name) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("--{} expects a number, got '{}'", name, raw))),
        None => Ok(None),
    }
}

/// Command-line flags take precedence over the configuration file.
fn resolve_config(matches: &ArgMatches) -> Result<ChartConfig> {
    let mut config = ChartConfig::load(matches.value_of("config").map(Path::new))?;

    if let Some(file) = matches.value_of("file") {
        config.input = PathBuf::from(file);
    }
    if let Some(output) = matches.value_of("output") {
        config.output = PathBuf::from(output);
    }
    if let Some(interval) = parse_number(matches, "interval")? {
        config.interval_seconds = interval;
    }
    if let Some(top_n) = parse_number(matches, "top")? {
        config.top_n = top_n;
    }
    if matches.is_present("strict") {
        config.on_bad_timestamp = TimestampPolicy::Fail;
    }

    config.validate()?;
    Ok(config)
}

fn print_summary(chart: &ChartDescriptor, binned: &BinnedSeries, skipped_timestamps: usize) {
    println!(
        "Commands: {} ({} unique) in {} buckets of {}s",
        binned.total().separate_with_commas(),
        binned.commands().len().separate_with_commas(),
        chart.buckets.len().separate_with_commas(),
        chart.interval_seconds.separate_with_commas()
    );
    if skipped_timestamps > 0 {
        println!("Skipped timestamps: {}", skipped_timestamps.separate_with_commas());
    }
    println!("\nTop commands:");
    for (i, series) in chart.series.iter().enumerate() {
        println!("{:>2}. {:20} {:>8}", i + 1, series.command, series.total.separate_with_commas());
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    let config = resolve_config(matches)?;
    info!(?config, "resolved configuration");

    // Invalid UTF-8 is replaced, not fatal //
    let bytes = fs::read(&config.input).map_err(|e| Error::io(&config.input, e))?;
    let text = String::from_utf8_lossy(&bytes);
    let history = history::load(&text, config.on_bad_timestamp)?;
    if history.skipped_timestamps > 0 {
        warn!(count = history.skipped_timestamps, "skipped lines with unparseable timestamps");
    }

    let binned = BinnedSeries::from_events(&history.events, config.interval()?);
    if binned.is_empty() {
        return Err(Error::NoData { path: config.input });
    }
    let chart = ChartDescriptor::build(&binned, config.top_n);
    info!(
        buckets = chart.buckets.len(),
        commands = binned.commands().len(),
        stacked = chart.series.len(),
        "binned history"
    );

    render::write_svg(&chart, &config.output)?;
    if let Some(csv_path) = matches.value_of("csv") {
        export::write_csv(&binned, Path::new(csv_path))?;
    }

    if matches.is_present("json") {
        let summary = export::summary_json(&chart, &binned, history.skipped_timestamps);
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if !matches.is_present("quiet") {
        print_summary(&chart, &binned, history.skipped_timestamps);
        eprintln!("\nChart written to {}", config.output.display());
    }

    Ok(())
}

fn report_error(err: &Error) {
    // Colour only for a real terminal, never for a pipe or file //
    if io::stderr().is_terminal() {
        if let Some(mut t) = term::stderr() {
            if t.fg(term::color::RED).is_ok() {
                let _ = t.attr(term::Attr::Bold);
                let _ = write!(t, "error:");
                let _ = t.reset();
                let _ = writeln!(t, " {}", err);
                return;
            }
        }
    }
    eprintln!("error: {}", err);
}

fn main() {
    let matches = build_app().get_matches();
    init_tracing(matches.is_present("debug"));

    if let Err(err) = run(&matches) {
        report_error(&err);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(args: &[&str]) -> ArgMatches<'static> {
        let mut argv = vec!["shellhist"];
        argv.extend_from_slice(args);
        build_app().get_matches_from(argv)
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let rc = dir.path().join("rc.toml");
        fs::write(&rc, "top_n = 3\ninterval_seconds = 60\ninput = \"from-file\"\n").unwrap();
        let rc = rc.to_str().unwrap().to_string();

        let config = resolve_config(&matches(&["-c", rc.as_str(), "-n", "5", "--strict"])).unwrap();
        assert_eq!(config.top_n, 5);
        assert_eq!(config.interval_seconds, 60);
        assert_eq!(config.input, PathBuf::from("from-file"));
        assert_eq!(config.on_bad_timestamp, TimestampPolicy::Fail);
    }

    #[test]
    fn non_numeric_interval_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let rc = dir.path().join("empty.toml");
        fs::write(&rc, "").unwrap();
        let rc = rc.to_str().unwrap().to_string();

        let err = resolve_config(&matches(&["-c", rc.as_str(), "-i", "hourly"])).unwrap_err();
        assert!(err.to_string().contains("--interval expects a number"));
    }

    #[test]
    fn zero_interval_flag_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let rc = dir.path().join("empty.toml");
        fs::write(&rc, "").unwrap();
        let rc = rc.to_str().unwrap().to_string();

        assert!(resolve_config(&matches(&["-c", rc.as_str(), "-i", "0"])).is_err());
    }

    #[test]
    fn flag_can_repair_an_invalid_file_value() {
        let dir = tempfile::tempdir().unwrap();
        let rc = dir.path().join("rc.toml");
        fs::write(&rc, "interval_seconds = 0\ntop_n = 0\n").unwrap();
        let rc = rc.to_str().unwrap().to_string();

        let config = resolve_config(&matches(&["-c", rc.as_str(), "-i", "60", "-n", "2"])).unwrap();
        assert_eq!(config.interval_seconds, 60);
        assert_eq!(config.top_n, 2);

        let err = resolve_config(&matches(&["-c", rc.as_str(), "-i", "60"])).unwrap_err();
        assert!(err.to_string().contains("top_n must be at least 1"));
    }
}
