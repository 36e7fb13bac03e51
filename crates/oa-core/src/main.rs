//! Outlier Analysis Core - flow-node duration outlier engine
//!
//! The main entry point for oa-core, handling:
//! - Duration charts and outlier bounds per flow node
//! - Flow-node outlier maps with heat
//! - Significant variable terms and outlier instance export
//! - Configuration inspection and validation

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use oa_common::{
    AnalysisConfig, ConfigPaths, ConfigResolver, Error, FlowNodeDurationStats, FlowNodeId,
    LoadedConfig, OutlierParameters, OutlierVariableParameters, OutputFormat, ProcessScope,
    Result, SCHEMA_VERSION,
};
use oa_core::analysis::interval::bucket_count;
use oa_core::analysis::{compute_bounds, select_interval, FindingsOptions, OutlierAnalyzer};
use oa_core::exit_codes::ExitCode;
use oa_core::gateway::InMemoryGateway;
use oa_core::log_event;
use oa_core::logging::{
    event_names, generate_run_id, init_logging, LogConfig, LogContext, LogFormat, Stage,
};
use oa_core::output::{
    render, render_error, BoundsReport, ChartReport, ConfigReport, FindingsReport,
    InstancesReport, IntervalReport, Render, TermsReport, VersionReport,
};
use serde::Serialize;

/// Outlier Analysis Core - duration outliers of process flow nodes
#[derive(Parser)]
#[command(name = "oa-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Process-instance dataset (JSON) backing the in-memory aggregate store
    #[arg(long, global = true, env = "OA_DATA")]
    data: Option<PathBuf>,

    /// Analysis config file (overrides OA_CONFIG and the XDG config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Log format on stderr (human or jsonl)
    #[arg(long, global = true, env = "OA_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Duration histogram of one flow node with outlier buckets flagged
    Chart(ChartArgs),

    /// Outlier findings and heat for every flow node of a process
    Findings(FindingsArgs),

    /// Variable values significantly over-represented among outliers
    Terms(TermsArgs),

    /// Ids of outlier instances carrying a variable value
    Instances(InstancesArgs),

    /// Outlier bounds from explicit statistics or from the dataset
    Bounds(BoundsArgs),

    /// Histogram interval for a duration range
    Interval(IntervalArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Print version information
    Version,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Chart(_) => "chart",
            Commands::Findings(_) => "findings",
            Commands::Terms(_) => "terms",
            Commands::Instances(_) => "instances",
            Commands::Bounds(_) => "bounds",
            Commands::Interval(_) => "interval",
            Commands::Config(args) => match args.command {
                ConfigCommands::Show => "config show",
                ConfigCommands::Validate { .. } => "config validate",
                ConfigCommands::Default => "config default",
            },
            Commands::Version => "version",
        }
    }
}

#[derive(Args, Debug, Clone)]
struct ScopeArgs {
    /// Process definition key
    #[arg(long = "process")]
    process_definition_key: String,

    /// Definition version ("all", "latest" or a number); repeatable
    #[arg(long = "definition-version", default_value = "all")]
    definition_versions: Vec<String>,

    /// Tenant id; repeatable. Omit for every tenant
    #[arg(long = "tenant")]
    tenant_ids: Vec<String>,
}

impl ScopeArgs {
    fn scope(&self) -> ProcessScope {
        ProcessScope::new(self.process_definition_key.clone())
            .with_versions(self.definition_versions.clone())
            .with_tenants(self.tenant_ids.clone())
    }
}

#[derive(Args, Debug, Clone)]
struct BoundArgs {
    /// Lower outlier bound (ms). Without --lower/--higher, bounds are derived from the data
    #[arg(long)]
    lower: Option<f64>,

    /// Higher outlier bound (ms)
    #[arg(long)]
    higher: Option<f64>,
}

impl BoundArgs {
    fn is_given(&self) -> bool {
        self.lower.is_some() || self.higher.is_some()
    }
}

#[derive(Args, Debug)]
struct ChartArgs {
    #[command(flatten)]
    scope: ScopeArgs,

    /// Flow node id
    #[arg(long)]
    flow_node: String,

    #[command(flatten)]
    bounds: BoundArgs,
}

#[derive(Args, Debug)]
struct FindingsArgs {
    #[command(flatten)]
    scope: ScopeArgs,

    /// Only consider human task flow nodes
    #[arg(long)]
    only_human_tasks: bool,
}

#[derive(Args, Debug)]
struct TermsArgs {
    #[command(flatten)]
    scope: ScopeArgs,

    /// Flow node id
    #[arg(long)]
    flow_node: String,

    #[command(flatten)]
    bounds: BoundArgs,
}

#[derive(Args, Debug)]
struct InstancesArgs {
    #[command(flatten)]
    scope: ScopeArgs,

    /// Flow node id
    #[arg(long)]
    flow_node: String,

    #[command(flatten)]
    bounds: BoundArgs,

    /// Variable name to match
    #[arg(long)]
    variable: String,

    /// Variable value to match
    #[arg(long)]
    term: String,
}

#[derive(Args, Debug)]
struct BoundsArgs {
    /// Process definition key; with --flow-node, stats come from the dataset
    #[arg(long)]
    process: Option<String>,

    /// Flow node id
    #[arg(long, default_value = "flowNode")]
    flow_node: String,

    /// Execution count
    #[arg(long, conflicts_with = "process")]
    count: Option<u64>,

    /// Minimum duration (ms)
    #[arg(long, conflicts_with = "process")]
    min: Option<f64>,

    /// Maximum duration (ms)
    #[arg(long, conflicts_with = "process")]
    max: Option<f64>,

    /// Mean duration (ms)
    #[arg(long, conflicts_with = "process")]
    mean: Option<f64>,

    /// Population standard deviation (ms)
    #[arg(long, conflicts_with = "process")]
    std_dev: Option<f64>,
}

#[derive(Args, Debug)]
struct IntervalArgs {
    /// Minimum duration (ms)
    #[arg(long, allow_negative_numbers = true)]
    min: f64,

    /// Maximum duration (ms)
    #[arg(long, allow_negative_numbers = true)]
    max: f64,

    /// Target bucket count (defaults to the configured value)
    #[arg(long, allow_negative_numbers = true)]
    target: Option<i64>,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show the effective configuration and where it came from
    Show,

    /// Validate a configuration file (defaults to the resolved one)
    Validate {
        /// Path to a config file
        path: Option<PathBuf>,
    },

    /// Print the built-in default configuration as JSON
    Default,
}

// ============================================================================
// Main entry point
// ============================================================================

fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_env(
        LogConfig::level_from_verbosity(cli.global.verbose, cli.global.quiet),
        cli.global.log_format,
    );
    init_logging(&log_config);

    let ctx = LogContext::new(generate_run_id());
    let command = cli.command.name();
    log_event!(
        ctx,
        DEBUG,
        event_names::ANALYSIS_STARTED,
        Stage::Init,
        "command started",
        command = command
    );

    let exit_code = match dispatch(&cli, &ctx) {
        Ok(code) => code,
        Err(err) => {
            log_event!(
                ctx,
                DEBUG,
                event_names::INTERNAL_ERROR,
                Stage::Report,
                "command failed",
                command = command,
                code = err.code()
            );
            eprintln!("{}", render_error(cli.global.format, command, &ctx.run_id, &err));
            ExitCode::from(&err)
        }
    };

    log_event!(
        ctx,
        DEBUG,
        event_names::ANALYSIS_FINISHED,
        Stage::Report,
        "command finished",
        command = command,
        exit_code = exit_code.as_i32() as i64
    );
    std::process::exit(exit_code.as_i32());
}

fn dispatch(cli: &Cli, ctx: &LogContext) -> Result<ExitCode> {
    let global = &cli.global;
    let command = cli.command.name();
    match &cli.command {
        Commands::Chart(args) => {
            let report = run_chart(global, ctx, args)?;
            emit(global, command, ctx, &report)
        }
        Commands::Findings(args) => {
            let report = run_findings(global, ctx, args)?;
            emit(global, command, ctx, &report)
        }
        Commands::Terms(args) => {
            let report = run_terms(global, ctx, args)?;
            emit(global, command, ctx, &report)
        }
        Commands::Instances(args) => {
            let report = run_instances(global, ctx, args)?;
            emit(global, command, ctx, &report)
        }
        Commands::Bounds(args) => {
            let report = run_bounds(global, ctx, args)?;
            emit(global, command, ctx, &report)
        }
        Commands::Interval(args) => {
            let report = run_interval(global, ctx, args)?;
            emit(global, command, ctx, &report)
        }
        Commands::Config(args) => run_config(global, ctx, command, args),
        Commands::Version => {
            let report = VersionReport {
                oa_core_version: env!("CARGO_PKG_VERSION"),
                rust_version: env!("CARGO_PKG_RUST_VERSION"),
                schema_version: SCHEMA_VERSION,
            };
            emit(global, command, ctx, &report)?;
            Ok(ExitCode::Clean)
        }
    }
}

/// Print a report on stdout and map it to an exit code.
fn emit<T: Serialize + Render>(
    global: &GlobalOpts,
    command: &str,
    ctx: &LogContext,
    report: &T,
) -> Result<ExitCode> {
    println!("{}", render(global.format, command, &ctx.run_id, report)?);
    Ok(ExitCode::for_results(report.has_results()))
}

// ============================================================================
// Environment: config + dataset
// ============================================================================

fn load_config(global: &GlobalOpts, ctx: &LogContext) -> Result<LoadedConfig> {
    load_config_from(global.config.clone(), ctx)
}

fn load_config_from(path: Option<PathBuf>, ctx: &LogContext) -> Result<LoadedConfig> {
    let resolver = ConfigResolver::new(ConfigPaths { config_path: path });
    let loaded = LoadedConfig::load(&resolver).map_err(|e| {
        log_event!(
            ctx,
            WARN,
            event_names::CONFIG_ERROR,
            Stage::Init,
            "configuration rejected",
            error = tracing::field::display(&e)
        );
        Error::from(e)
    })?;

    if loaded.snapshot.is_default() {
        log_event!(
            ctx,
            DEBUG,
            event_names::CONFIG_DEFAULT_USED,
            Stage::Init,
            "using built-in configuration"
        );
    } else {
        log_event!(
            ctx,
            DEBUG,
            event_names::CONFIG_LOADED,
            Stage::Init,
            "configuration loaded",
            path = loaded.snapshot.source.path.as_deref().unwrap_or(""),
            resolution = loaded.snapshot.source.resolution.as_str()
        );
    }
    Ok(loaded)
}

fn load_gateway(
    global: &GlobalOpts,
    config: &AnalysisConfig,
    ctx: &LogContext,
) -> Result<InMemoryGateway> {
    let Some(path) = global.data.as_ref() else {
        return Err(Error::Validation(
            "no dataset given: pass --data <file> or set OA_DATA".to_string(),
        ));
    };
    let gateway = InMemoryGateway::from_path(path)?.with_max_page_size(config.max_page_size);
    log_event!(
        ctx,
        INFO,
        event_names::DATASET_LOADED,
        Stage::Load,
        "dataset loaded",
        path = path.display().to_string().as_str(),
        instances = gateway.instance_count() as u64
    );
    Ok(gateway)
}

/// Explicit bounds, or the ones derived from the flow node's statistics.
fn resolve_bounds(
    analyzer: &OutlierAnalyzer<'_, InMemoryGateway>,
    scope: &ProcessScope,
    flow_node_id: &FlowNodeId,
    args: &BoundArgs,
) -> Result<(Option<f64>, Option<f64>)> {
    if args.is_given() {
        return Ok((args.lower, args.higher));
    }
    Ok(analyzer
        .flow_node_bounds(scope, flow_node_id)?
        .map_or((None, None), |fb| {
            (fb.bounds.lower_bound_value, fb.bounds.upper_bound_value)
        }))
}

// ============================================================================
// Command implementations
// ============================================================================

fn run_chart(global: &GlobalOpts, ctx: &LogContext, args: &ChartArgs) -> Result<ChartReport> {
    let loaded = load_config(global, ctx)?;
    let gateway = load_gateway(global, &loaded.config, ctx)?;
    let ctx = ctx
        .clone()
        .with_process_definition_key(&args.scope.process_definition_key);
    let analyzer = OutlierAnalyzer::new(&gateway, &loaded.config, ctx);

    let scope = args.scope.scope();
    let flow_node_id = FlowNodeId::new(args.flow_node.clone());
    let (lower, higher) = resolve_bounds(&analyzer, &scope, &flow_node_id, &args.bounds)?;
    let params = OutlierParameters::new(scope, flow_node_id).with_bounds(lower, higher);
    let entries = analyzer.duration_chart(&params)?;

    Ok(ChartReport {
        flow_node_id: params.flow_node_id,
        lower_outlier_bound: lower,
        higher_outlier_bound: higher,
        entries,
    })
}

fn run_findings(
    global: &GlobalOpts,
    ctx: &LogContext,
    args: &FindingsArgs,
) -> Result<FindingsReport> {
    let loaded = load_config(global, ctx)?;
    let gateway = load_gateway(global, &loaded.config, ctx)?;
    let ctx = ctx
        .clone()
        .with_process_definition_key(&args.scope.process_definition_key);
    let analyzer = OutlierAnalyzer::new(&gateway, &loaded.config, ctx);

    let findings = analyzer.flow_node_outlier_map(
        &args.scope.scope(),
        FindingsOptions {
            only_human_tasks: args.only_human_tasks,
        },
    )?;
    Ok(FindingsReport {
        process_definition_key: args.scope.process_definition_key.clone(),
        only_human_tasks: args.only_human_tasks,
        findings,
    })
}

fn run_terms(global: &GlobalOpts, ctx: &LogContext, args: &TermsArgs) -> Result<TermsReport> {
    let loaded = load_config(global, ctx)?;
    let gateway = load_gateway(global, &loaded.config, ctx)?;
    let ctx = ctx
        .clone()
        .with_process_definition_key(&args.scope.process_definition_key);
    let analyzer = OutlierAnalyzer::new(&gateway, &loaded.config, ctx);

    let scope = args.scope.scope();
    let flow_node_id = FlowNodeId::new(args.flow_node.clone());
    let (lower, higher) = resolve_bounds(&analyzer, &scope, &flow_node_id, &args.bounds)?;
    let params = OutlierParameters::new(scope, flow_node_id).with_bounds(lower, higher);

    // Derived bounds can be absent on both sides: then there are no outliers.
    let terms = if !args.bounds.is_given() && lower.is_none() && higher.is_none() {
        Vec::new()
    } else {
        analyzer.significant_variable_terms(&params)?
    };

    Ok(TermsReport {
        flow_node_id: params.flow_node_id,
        lower_outlier_bound: lower,
        higher_outlier_bound: higher,
        significance_level: loaded.config.significance_level,
        terms,
    })
}

fn run_instances(
    global: &GlobalOpts,
    ctx: &LogContext,
    args: &InstancesArgs,
) -> Result<InstancesReport> {
    let loaded = load_config(global, ctx)?;
    let gateway = load_gateway(global, &loaded.config, ctx)?;
    let ctx = ctx
        .clone()
        .with_process_definition_key(&args.scope.process_definition_key);
    let analyzer = OutlierAnalyzer::new(&gateway, &loaded.config, ctx);

    let scope = args.scope.scope();
    let flow_node_id = FlowNodeId::new(args.flow_node.clone());
    let (lower, higher) = resolve_bounds(&analyzer, &scope, &flow_node_id, &args.bounds)?;
    let params = OutlierVariableParameters {
        outlier: OutlierParameters::new(scope, flow_node_id).with_bounds(lower, higher),
        variable_name: args.variable.clone(),
        variable_term: args.term.clone(),
    };

    let instance_ids = if !args.bounds.is_given() && lower.is_none() && higher.is_none() {
        Vec::new()
    } else {
        analyzer.outlier_instance_ids(&params)?
    };

    Ok(InstancesReport {
        flow_node_id: params.outlier.flow_node_id,
        variable_name: params.variable_name,
        variable_term: params.variable_term,
        export_limit: loaded.config.export_limit,
        instance_ids,
    })
}

fn run_bounds(global: &GlobalOpts, ctx: &LogContext, args: &BoundsArgs) -> Result<BoundsReport> {
    let loaded = load_config(global, ctx)?;
    let config = &loaded.config;
    let flow_node_id = FlowNodeId::new(args.flow_node.clone());

    let (stats, bounds) = if let Some(process) = &args.process {
        let gateway = load_gateway(global, config, ctx)?;
        let analyzer = OutlierAnalyzer::new(
            &gateway,
            config,
            ctx.clone().with_process_definition_key(process),
        );
        match analyzer.flow_node_bounds(&ProcessScope::new(process.clone()), &flow_node_id)? {
            Some(fb) => (fb.stats, fb.bounds),
            None => {
                let stats = FlowNodeDurationStats::empty(flow_node_id.clone());
                let bounds = compute_bounds(
                    &stats,
                    config.std_dev_multiplier,
                    config.minimum_deviation_from_avg,
                );
                (stats, bounds)
            }
        }
    } else {
        let (Some(count), Some(min), Some(max), Some(mean), Some(std_deviation)) =
            (args.count, args.min, args.max, args.mean, args.std_dev)
        else {
            return Err(Error::Validation(
                "pass --process, or all of --count --min --max --mean --std-dev".to_string(),
            ));
        };
        if min > max {
            return Err(Error::InvalidRange { min, max });
        }
        if std_deviation < 0.0 {
            return Err(Error::Validation(format!(
                "standard deviation must be non-negative (got {})",
                std_deviation
            )));
        }
        let stats = FlowNodeDurationStats {
            flow_node_id,
            count,
            min,
            max,
            mean,
            std_deviation,
        };
        let bounds = compute_bounds(
            &stats,
            config.std_dev_multiplier,
            config.minimum_deviation_from_avg,
        );
        (stats, bounds)
    };

    Ok(BoundsReport {
        stats,
        std_dev_multiplier: config.std_dev_multiplier,
        minimum_deviation_from_avg: config.minimum_deviation_from_avg,
        bounds,
    })
}

fn run_interval(
    global: &GlobalOpts,
    ctx: &LogContext,
    args: &IntervalArgs,
) -> Result<IntervalReport> {
    let target = match args.target {
        Some(t) => t,
        None => load_config(global, ctx)?.config.target_bucket_count,
    };
    let interval = select_interval(args.min, args.max, target)?;
    Ok(IntervalReport {
        min: args.min,
        max: args.max,
        target_bucket_count: target,
        interval,
        bucket_count: bucket_count(args.min, args.max, interval),
    })
}

fn run_config(
    global: &GlobalOpts,
    ctx: &LogContext,
    command: &str,
    args: &ConfigArgs,
) -> Result<ExitCode> {
    match &args.command {
        ConfigCommands::Show => {
            let loaded = load_config(global, ctx)?;
            let report = ConfigReport {
                status: "loaded",
                source: loaded.snapshot,
                config: loaded.config,
            };
            emit(global, command, ctx, &report)
        }
        ConfigCommands::Validate { path } => {
            let path = path.clone().or_else(|| global.config.clone());
            let loaded = load_config_from(path, ctx)?;
            let report = ConfigReport {
                status: "valid",
                source: loaded.snapshot,
                config: loaded.config,
            };
            emit(global, command, ctx, &report)
        }
        ConfigCommands::Default => {
            println!("{}", serde_json::to_string_pretty(&AnalysisConfig::default())?);
            Ok(ExitCode::Clean)
        }
    }
}
