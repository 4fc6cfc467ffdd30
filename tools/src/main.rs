//! sim-runner: headless driver for the staged-outcome simulation.
//!
//! Usage:
//!   sim-runner --seed 12345 --strategy idle
//!   sim-runner --config data/scenario.json --strategy alternate
//!   sim-runner --seed 12345 --ipc-mode

use anyhow::Result;
use stagesim_core::{
    command::{PlayerCommand, QueuedCommand},
    config::SimConfig,
    engine::SimEngine,
    event::SimEvent,
    market::MarketPoint,
    snapshot::SimSnapshot,
    types::{Direction, Tick},
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    /// `count` frames; each frame runs `ticks_per_step()` ticks.
    Tick {
        count: u64,
    },
    Command {
        command: PlayerCommand,
    },
    Quit,
}

#[derive(serde::Serialize)]
struct UiState<'a> {
    snapshot: SimSnapshot,
    paused: bool,
    series: &'a [MarketPoint],
    events: Vec<SimEvent>,
}

/// How the headless player picks a direction each stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Up,
    Down,
    Idle,
    Alternate,
}

impl Strategy {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "up"        => Some(Self::Up),
            "down"      => Some(Self::Down),
            "idle"      => Some(Self::Idle),
            "alternate" => Some(Self::Alternate),
            _ => None,
        }
    }

    fn pick(self, stage: usize) -> Option<Direction> {
        match self {
            Self::Up    => Some(Direction::Up),
            Self::Down  => Some(Direction::Down),
            Self::Idle  => None,
            Self::Alternate if stage % 2 == 0 => Some(Direction::Up),
            Self::Alternate => Some(Direction::Down),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let max_ticks = parse_arg(&args, "--max-ticks", 100_000u64);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let config_path = find_arg(&args, "--config");
    let strategy_name = find_arg(&args, "--strategy").unwrap_or("idle");
    let strategy = Strategy::parse(strategy_name)
        .ok_or_else(|| anyhow::anyhow!("Unknown strategy '{strategy_name}' (up|down|idle|alternate)"))?;

    let config = match config_path {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };

    let run_id = format!("run-{seed}-{}", chrono::Utc::now().format("%Y%m%dT%H%M%S"));

    if !ipc_mode {
        println!("Staged simulation: sim-runner");
        println!("  run_id:    {run_id}");
        println!("  seed:      {seed}");
        println!("  config:    {}", config_path.unwrap_or("(built-in)"));
        println!("  strategy:  {strategy_name}");
        println!();
    }

    let mut engine = SimEngine::build(run_id.clone(), seed, config)?;

    if ipc_mode {
        run_ipc_loop(&mut engine)?;
    } else {
        run_headless(&mut engine, strategy, max_ticks)?;
        print_summary(&engine)?;
    }

    Ok(())
}

fn run_headless(engine: &mut SimEngine, strategy: Strategy, max_ticks: Tick) -> Result<()> {
    let budget = engine.stage_tick_budget();
    engine.start()?;

    while !engine.state().simulation_complete {
        if engine.clock.current_tick >= max_ticks {
            anyhow::bail!("Tick limit {max_ticks} reached before completion");
        }
        let stage = engine.state().stage_index;
        if let Some(direction) = strategy.pick(stage) {
            let queued = QueuedCommand::new(
                engine.run_id.clone(),
                engine.clock.current_tick,
                PlayerCommand::Select { direction },
            );
            log::debug!("queued {} {:?}", queued.command_id, queued.command);
            engine.apply_command(queued.command)?;
        }
        engine.run_until_settled(budget)?;
        if !engine.state().stage_complete {
            anyhow::bail!("Stage {stage} did not settle within {budget} ticks");
        }
        engine.acknowledge_stage_complete()?;
    }
    Ok(())
}

fn run_ipc_loop(engine: &mut SimEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Rejected IPC line: {e}");
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        let events = match cmd {
            IpcCommand::Quit => break,
            IpcCommand::GetState => vec![],
            IpcCommand::Tick { count } => {
                let ticks = count * engine.clock.ticks_per_step();
                engine.run_ticks(ticks)?
            }
            IpcCommand::Command { command } => engine.apply_command(command)?,
        };
        let state = UiState {
            snapshot: engine.snapshot(),
            paused: engine.clock.paused,
            series: engine.current_series().unwrap_or(&[]),
            events,
        };
        writeln!(stdout, "{}", serde_json::to_string(&state)?)?;
        stdout.flush()?;
    }
    engine.teardown();
    Ok(())
}

fn print_summary(engine: &SimEngine) -> Result<()> {
    let config = engine.config();
    let table = config.outcome_table()?;
    let projected = table.project(config.initial_balance, &config.calculator(), &config.settlement);

    println!("=== STAGES ===");
    for entry in engine.event_log().entries() {
        let event: SimEvent = serde_json::from_str(&entry.payload)?;
        match event {
            SimEvent::SelectionMade { stage_index, direction, forced, .. } => {
                let how = if forced { "forced" } else { "picked" };
                println!("  stage {}: {how} {direction:?}", stage_index + 1);
            }
            SimEvent::StageResolved { stage_index, success, wager, balance_after, .. } => {
                let outcome = if success { "WIN " } else { "LOSS" };
                let planned = projected.get(stage_index).copied().unwrap_or_default();
                println!(
                    "  stage {}: {outcome} wager {wager:>5} -> balance {balance_after:>6} (planned {planned})",
                    stage_index + 1
                );
            }
            _ => {}
        }
    }

    let state = engine.state();
    println!();
    println!("=== RUN SUMMARY ===");
    println!("  run_id:         {}", engine.run_id);
    println!("  final tick:     {} ({} ms)", engine.clock.current_tick, engine.clock.elapsed_ms());
    println!("  stages:         {}", engine.stage_count());
    println!("  initial:        {}", config.initial_balance);
    println!("  final balance:  {}", state.balance);
    println!("  complete:       {}", state.simulation_complete);
    println!("  notifications:  {}", engine.event_log().count_of("notification_posted"));
    println!("  events logged:  {}", engine.event_log().len());
    Ok(())
}

fn find_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    find_arg(args, flag)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
