use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use loopscope_config::LoopscopeConfig;
use loopscope_core::prelude::*;
use loopscope_engine::{Command, PlaybackScheduler, StepDispatcher};
use loopscope_simulator::cli::{CategoryArg, EnvironmentArg, ScenarioSource};
use loopscope_simulator::replay::run_to_end;
use loopscope_simulator::{Simulator, Verification};
use loopscope_telemetry::MetricsRecorder;

#[derive(Parser)]
#[command(name = "loopscope", version, about)]
pub struct Cli {
    /// Configuration file (default: config/loopscope.yaml plus LOOPSCOPE_* variables)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List catalog scenarios
    List(ListArgs),
    /// Print a scenario's code, expected output and steps
    Show(ShowArgs),
    /// Run a scenario to the end and report its output and digest
    Replay(ReplayArgs),
    /// Play a scenario in real time, printing console output as it appears
    Play(PlayArgs),
    /// Step a scenario to a given point and print the runtime state
    Inspect(InspectArgs),
    /// Check scenarios against their expected output
    Verify(VerifyArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[arg(long, value_enum)]
    pub category: Option<CategoryArg>,
    /// Only scenarios that run in this environment
    #[arg(short, long, value_enum)]
    pub environment: Option<EnvironmentArg>,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    #[command(flatten)]
    pub source: ScenarioSource,
    /// Also print every scripted step
    #[arg(long, default_value_t = false)]
    pub steps: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    #[command(flatten)]
    pub source: ScenarioSource,
    /// Print the report as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
    /// Print the event log
    #[arg(long, default_value_t = false)]
    pub events: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PlayArgs {
    #[command(flatten)]
    pub source: ScenarioSource,
    /// Playback multiplier (default: playback.default_speed)
    #[arg(short, long)]
    pub speed: Option<f64>,
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    #[command(flatten)]
    pub source: ScenarioSource,
    /// Number of steps to apply
    #[arg(long, default_value_t = 0)]
    pub step: u64,
    /// Undo this many steps afterwards
    #[arg(long, default_value_t = 0)]
    pub undo: u64,
    /// Enqueue an ad-hoc task of this kind (repeatable)
    #[arg(long = "enqueue", value_parser = str::parse::<TaskKind>)]
    pub enqueue: Vec<TaskKind>,
    /// Tick pending operations this many times outside the trace
    #[arg(long, default_value_t = 0)]
    pub tick: u32,
    /// Print the state as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub source: ScenarioSource,
    /// Verify every catalog scenario
    #[arg(long, default_value_t = false, conflicts_with_all = ["id", "file", "digest"])]
    pub all: bool,
    /// Expected hex digest of the run
    #[arg(long)]
    pub digest: Option<String>,
}

pub async fn run_command(cli: Cli, config: LoopscopeConfig) -> anyhow::Result<()> {
    let mut simulator = Simulator::new(config)?;
    if simulator.config().telemetry.metrics {
        simulator = simulator.with_metrics(Arc::new(MetricsRecorder::new()?));
    }

    match cli.command {
        Commands::List(args) => list(&simulator, args),
        Commands::Show(args) => show(&simulator, args),
        Commands::Replay(args) => replay(&simulator, args),
        Commands::Play(args) => play(&simulator, args).await,
        Commands::Inspect(args) => inspect(&simulator, args),
        Commands::Verify(args) => verify(&simulator, args),
    }
}

fn list(simulator: &Simulator, args: ListArgs) -> anyhow::Result<()> {
    let category = args.category.map(Category::from);
    let environment = args.environment.map(Environment::from);
    for scenario in simulator.catalog().iter() {
        if category.is_some_and(|c| scenario.category != c) {
            continue;
        }
        if environment.is_some_and(|e| !scenario.environment.supports(e)) {
            continue;
        }
        println!(
            "{:<26} {:<13} {:<8} {}",
            scenario.id,
            format!("{:?}", scenario.category).to_lowercase(),
            format!("{:?}", scenario.environment).to_lowercase(),
            scenario.title
        );
    }
    Ok(())
}

fn show(simulator: &Simulator, args: ShowArgs) -> anyhow::Result<()> {
    let scenario = args.source.resolve(simulator)?;
    println!("{} ({})", scenario.title, scenario.id);
    if !scenario.description.is_empty() {
        println!("{}", scenario.description);
    }
    println!("\n{}", scenario.code.trim_end());
    println!("\nExpected output:");
    for line in &scenario.expected_output {
        println!("  {line}");
    }
    if !scenario.explanation.is_empty() {
        println!("\n{}", scenario.explanation);
    }
    if args.steps {
        println!();
        for (index, step) in scenario.steps.iter().enumerate() {
            println!("{:>4} {:?} {}", index + 1, step.kind, step.action.name());
        }
    }
    Ok(())
}

fn replay(simulator: &Simulator, args: ReplayArgs) -> anyhow::Result<()> {
    let scenario = args.source.resolve(simulator)?;
    let report = simulator.replay(Arc::clone(&scenario), args.source.environment());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in &report.console_output {
            println!("> {line}");
        }
        println!(
            "{} steps, {} events, {}, digest {}",
            report.steps_applied, report.events_recorded, report.environment, report.digest
        );
    }

    if args.events {
        let mut dispatcher = simulator.dispatcher_with(scenario, args.source.environment());
        run_to_end(&mut dispatcher);
        for entry in dispatcher.state().event_log.iter() {
            println!("{entry}");
        }
    }

    if let Some(metrics) = simulator.metrics() {
        info!(metrics = %metrics.gather_metrics()?, "replay metrics");
    }
    Ok(())
}

async fn play(simulator: &Simulator, args: PlayArgs) -> anyhow::Result<()> {
    let scenario = args.source.resolve(simulator)?;
    let mut dispatcher = simulator.dispatcher_with(scenario, args.source.environment());
    if let Some(speed) = args.speed {
        if !dispatcher.set_speed(speed).is_applied() {
            bail!("invalid playback speed {speed}");
        }
    }

    let poll = dispatcher.interval() / 4;
    let mut scheduler = PlaybackScheduler::new(dispatcher);
    scheduler.play();

    let mut printed = 0;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                scheduler.pause();
                warn!("playback interrupted");
                break;
            }
            _ = tokio::time::sleep(poll.max(Duration::from_millis(10))) => {}
        }
        let state = scheduler.snapshot();
        for line in state.sim.console_output.iter().skip(printed) {
            println!("> {line}");
        }
        printed = state.sim.console_output.len();
        if !scheduler.is_ticking() {
            break;
        }
    }

    let dispatcher = scheduler.shutdown().await?;
    let state = dispatcher.state();
    for line in state.sim.console_output.iter().skip(printed) {
        println!("> {line}");
    }
    println!(
        "stopped at step {}/{} ({:?})",
        dispatcher.cursor(),
        dispatcher.total_steps(),
        state.sim.status
    );
    Ok(())
}

fn inspect(simulator: &Simulator, args: InspectArgs) -> anyhow::Result<()> {
    let scenario = args.source.resolve(simulator)?;
    let mut dispatcher = simulator.dispatcher_with(scenario, args.source.environment());
    let commands = step_commands(&args);
    for command in commands {
        let name = command.name();
        if !dispatcher.dispatch(command).is_applied() {
            warn!(command = name, "command ignored");
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&dispatcher.state().sim)?);
    } else {
        print_state(&dispatcher);
    }
    Ok(())
}

/// Commands `inspect` sends, in order.
fn step_commands(args: &InspectArgs) -> Vec<Command> {
    let mut commands = Vec::new();
    for _ in 0..args.step {
        commands.push(Command::StepForward);
    }
    for _ in 0..args.undo {
        commands.push(Command::Undo);
    }
    for kind in &args.enqueue {
        commands.push(Command::EnqueueAdHoc {
            kind: *kind,
            label: None,
        });
    }
    for _ in 0..args.tick {
        commands.push(Command::TickPending);
    }
    commands
}

fn print_state(dispatcher: &StepDispatcher) {
    let sim = &dispatcher.state().sim;
    println!(
        "step {}/{}  {:?}  {}  phase: {}{}",
        dispatcher.cursor(),
        dispatcher.total_steps(),
        sim.status,
        sim.environment,
        sim.phase.label(sim.environment),
        if dispatcher.can_step_backward() { "  (undo available)" } else { "" }
    );

    println!("call stack (top last):");
    for frame in sim.call_stack.iter() {
        println!("  {}", frame.label);
    }
    for (name, queue) in [
        ("priority", QueueSelector::NextTick),
        ("microtasks", QueueSelector::Microtask),
        ("macrotasks", QueueSelector::Macrotask),
    ] {
        let labels: Vec<_> = sim.queue(queue).iter().map(|task| task.label.as_str()).collect();
        println!("{name}: [{}]", labels.join(", "));
    }
    for operation in sim.pending_operations.iter() {
        println!(
            "pending: {} ({:.0}%, {} left)",
            operation.label, operation.progress, operation.remaining_steps
        );
    }
    println!("console: {:?}", sim.console_output.iter().collect::<Vec<_>>());
}

fn verify(simulator: &Simulator, args: VerifyArgs) -> anyhow::Result<()> {
    let scenarios: Vec<Arc<Scenario>> = if args.all {
        simulator.catalog().iter().cloned().collect()
    } else {
        vec![args.source.resolve(simulator)?]
    };

    let mut failures = 0;
    for scenario in &scenarios {
        let report = simulator.replay(Arc::clone(scenario), args.source.environment());
        let verification = report.verify(scenario);
        print_verification(&verification);
        if !verification.passed() {
            failures += 1;
        }
        if let Some(expected) = &args.digest {
            if !expected.eq_ignore_ascii_case(&report.digest) {
                println!("  digest mismatch: expected {expected}, got {}", report.digest);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{failures} check(s) failed");
    }
    Ok(())
}

fn print_verification(verification: &Verification) {
    if verification.passed() {
        println!("ok   {}", verification.scenario_id);
    } else {
        println!("FAIL {}", verification.scenario_id);
        println!("  expected: {:?}", verification.expected);
        println!("  actual:   {:?}", verification.actual);
    }
}
