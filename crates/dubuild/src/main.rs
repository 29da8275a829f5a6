use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, debug, info};

use dubuild::{
    config::Config,
    environment::Environment,
    orchestrator::{BuildMode, Builder},
};

#[derive(Parser, Debug)]
#[command(name = "dubuild", version, about, long_about = None)]
struct Cli {
    /// Directory scanned recursively for sources
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Main source file
    #[arg(short, long)]
    main: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory to skip during discovery (repeatable)
    #[arg(short, long)]
    exclude: Vec<PathBuf>,

    /// Which artifacts to write
    #[arg(long, value_enum, default_value_t = BuildMode::Plain)]
    mode: BuildMode,

    /// External minifier command line, e.g. "luamin --stdin"
    #[arg(long)]
    minify_command: Option<String>,

    /// Skip broken source files instead of failing the build
    #[arg(long)]
    no_strict: bool,

    /// Do not look up file revisions with git
    #[arg(long)]
    no_git: bool,

    /// Extra placeholder value as KEY=VALUE (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    env: Vec<(String, String)>,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the resolved dependency graph as Graphviz DOT
    #[arg(long, value_name = "PATH")]
    emit_graph: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_env_pair(value: &str) -> Result<(String, String)> {
    match value.split_once('=') {
        Some((key, _)) if key.is_empty() => bail!("empty key in '{value}'"),
        Some((key, val)) => Ok((key.to_owned(), val.to_owned())),
        None => bail!("expected KEY=VALUE, got '{value}'"),
    }
}

impl Cli {
    /// Command-line flags take precedence over the configuration file
    fn apply(self, mut config: Config) -> (Config, Vec<(String, String)>) {
        if let Some(source) = self.source {
            config.source_dir = source;
        }
        if let Some(main) = self.main {
            config.main_file = Some(main);
        }
        if let Some(output) = self.output {
            config.output_dir = output;
        }
        config.exclude.extend(self.exclude);
        if let Some(command) = self.minify_command {
            config.minify_command = Some(command.split_whitespace().map(str::to_owned).collect());
        }
        if self.no_strict {
            config.strict = false;
        }
        if self.no_git {
            config.git = false;
        }
        (config, self.env)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let mode = cli.mode;
    let emit_graph = cli.emit_graph.clone();
    let (config, cli_env) = cli.apply(config);
    debug!("Effective configuration: {config:?}");

    let mut environment = Environment::from_process();
    environment.extend(config.env.clone());
    environment.extend(cli_env);

    let builder = Builder::new(config, environment).with_graph_output(emit_graph);
    info!(
        "Building {} from {}",
        builder.main_name(),
        builder.config().source_dir.display()
    );

    let written = builder.build_and_save(mode)?;
    info!("Build finished, {} artifact(s) written", written.len());
    Ok(())
}
