use clap::{Args, Parser, Subcommand};
use configmerge::app;
use configmerge::config::Config;
use configmerge::engine::EngineKind;
use configmerge::report::OutputFormat;
use configmerge::transform::GroupOrder;
use std::path::PathBuf;
use tracing::{debug, error, trace};
use tracing_subscriber::EnvFilter;

/// Group ConfigMaps by label and merge them into one per group
#[derive(Parser)]
#[command(name = "configmerge", version)]
#[command(about = "Group ConfigMaps by vpc-id and merge their subnet-id entries", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one engine and print the merged ConfigMaps (default command)
    Run(RunArgs),
    /// Run every engine and check each against the native result
    Compare {
        /// ConfigMap input file (JSON or YAML); defaults to the sample set
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Only pass records matching this expression
        #[arg(long)]
        filter: Option<String>,
    },
    /// Print the built-in sample ConfigMaps
    Sample {
        #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
    },
}

#[derive(Args, Default)]
struct RunArgs {
    /// Engine to run
    #[arg(short, long, value_enum)]
    engine: Option<EngineKind>,

    /// ConfigMap input file (JSON or YAML); defaults to the sample set
    #[arg(short, long)]
    input: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Order of merged groups
    #[arg(long, value_enum)]
    order: Option<GroupOrder>,

    /// Only pass records matching this expression
    #[arg(long)]
    filter: Option<String>,

    /// JavaScript or TypeScript (.ts) file for the script engine
    #[arg(long)]
    script: Option<PathBuf>,

    /// Tera template for the template engine
    #[arg(long)]
    template: Option<PathBuf>,
}

impl RunArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(engine) = self.engine {
            config.engine = engine;
        }
        if let Some(order) = self.order {
            config.group_order = order;
        }
        if let Some(filter) = &self.filter {
            config.selection.filter = Some(filter.clone());
        }
        if let Some(script) = &self.script {
            config.script.path = Some(script.clone());
        }
        if let Some(template) = &self.template {
            config.template.path = Some(template.clone());
        }
    }
}

fn init_tracing(verbose: u8, configured: Option<&str>) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(configured.unwrap_or("warn"))),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .with_line_number(verbose >= 3)
        .init();
}

fn main() {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref());
    let configured_level = config
        .as_ref()
        .ok()
        .and_then(|config| config.log_level.clone());
    init_tracing(cli.verbose, configured_level.as_deref());

    debug!("configmerge started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    let result = config
        .map_err(anyhow::Error::from)
        .and_then(|config| execute(cli.command, config));

    if let Err(e) = result {
        error!("Fatal error: {}", e);
        eprintln!("Error: {e}");
        if let Some(location) = e
            .downcast_ref::<configmerge::Error>()
            .and_then(configmerge::Error::location)
        {
            if !location.snippet.is_empty() {
                eprintln!("  --> {location}");
                eprintln!("{}", location.snippet);
            }
        }
        std::process::exit(1);
    }
}

fn execute(command: Option<Commands>, mut config: Config) -> anyhow::Result<()> {
    match command.unwrap_or_else(|| Commands::Run(RunArgs::default())) {
        Commands::Run(args) => {
            args.apply(&mut config);
            let output = app::run(&config, args.input.as_deref(), args.format)?;
            print!("{output}");
        }
        Commands::Compare { input, filter } => {
            if filter.is_some() {
                config.selection.filter = filter;
            }
            let comparison = app::compare(&config, input.as_deref())?;
            print!("{}", comparison.render());
            if !comparison.all_match() {
                anyhow::bail!("engines disagree with the native result");
            }
        }
        Commands::Sample { format } => {
            print!("{}", app::sample(format)?);
        }
    }
    Ok(())
}
