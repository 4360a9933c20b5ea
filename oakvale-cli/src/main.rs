//! Oakvale CLI - play the game, or run a single NPC worker over stdio

mod ui;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use oakvale_core::config::{LLMProviderKind, OakvaleConfig, RuntimeKind, UiMode};
use oakvale_core::engine::{Engine, PlayerAction, WorldSnapshot};
use oakvale_core::error::OakvaleError;
use oakvale_core::llm::{DecisionClient, LLMProvider, LLMProviderFactory};
use oakvale_core::request::DecisionRequestBuilder;
use oakvale_core::worker::{NpcWorker, run_stdio};
use oakvale_core::world::demo;
use oakvale_supervisor::{
    NpcProcessManager, ProcessRuntime, ProcessRuntimeConfig, TaskRuntime, WorkerRuntime,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::ui::Command;

#[derive(Parser)]
#[command(name = "oakvale")]
#[command(about = "A village whose people think for themselves", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play in the village of Oakvale
    Play {
        /// Model to ask for NPC decisions
        #[arg(long, env = "OAKVALE_MODEL")]
        model: Option<String>,

        /// terminal or headless
        #[arg(long)]
        ui: Option<String>,

        /// Configuration file (defaults to oakvale.toml and OAKVALE_* variables)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Verbose logging
        #[arg(long)]
        debug: bool,

        /// task or process
        #[arg(long)]
        runtime: Option<String>,

        /// Stop after this many turns
        #[arg(long)]
        turns: Option<u64>,

        /// Use canned NPC replies instead of a model server
        #[arg(long)]
        offline: bool,
    },
    /// Run one NPC worker speaking JSON lines on stdin/stdout
    Worker {
        #[arg(long)]
        character_id: String,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        offline: bool,

        #[arg(long)]
        debug: bool,
    },
    /// Validate configuration and check the model server
    Check {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Version information
    Version,
}

/// Failures that map to dedicated exit codes
#[derive(Debug, thiserror::Error)]
enum Fatal {
    #[error("{0}")]
    Config(String),

    #[error("LLM service unreachable: {0}")]
    LlmUnreachable(String),
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<Fatal>() {
        Some(Fatal::LlmUnreachable(_)) => 2,
        Some(Fatal::Config(_)) => 3,
        None => match err.downcast_ref::<OakvaleError>() {
            Some(OakvaleError::Configuration(_)) => 3,
            _ => 1,
        },
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<OakvaleConfig> {
    let loaded = match path {
        Some(path) => OakvaleConfig::from_file(path),
        None => OakvaleConfig::load(),
    };
    loaded.map_err(|e| Fatal::Config(e.to_string()).into())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Play {
            model,
            ui,
            config,
            debug,
            runtime,
            turns,
            offline,
        } => {
            play(PlayOptions {
                model,
                ui,
                config,
                debug,
                runtime,
                turns,
                offline,
            })
            .await
        }
        Commands::Worker {
            character_id,
            config,
            model,
            offline,
            debug,
        } => worker(character_id, config, model, offline, debug).await,
        Commands::Check { config } => check(config).await,
        Commands::Version => {
            println!("oakvale {}", env!("CARGO_PKG_VERSION"));
            println!("oakvale-core {}", oakvale_core::VERSION);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("oakvale: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

struct PlayOptions {
    model: Option<String>,
    ui: Option<String>,
    config: Option<PathBuf>,
    debug: bool,
    runtime: Option<String>,
    turns: Option<u64>,
    offline: bool,
}

impl PlayOptions {
    fn apply(&self, config: &mut OakvaleConfig) -> Result<()> {
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(ui) = &self.ui {
            config.ui = ui
                .parse::<UiMode>()
                .map_err(|e| Fatal::Config(e.to_string()))?;
        }
        if let Some(runtime) = &self.runtime {
            config.scheduler.runtime = match runtime.to_lowercase().as_str() {
                "task" => RuntimeKind::Task,
                "process" => RuntimeKind::Process,
                other => return Err(Fatal::Config(format!("Invalid runtime: {}", other)).into()),
            };
        }
        if self.offline {
            config.llm.provider = LLMProviderKind::Scripted;
        }
        config.debug |= self.debug;
        config.validate().map_err(|e| Fatal::Config(e.to_string()))?;
        Ok(())
    }

    /// Arguments a worker child needs to rebuild the same configuration
    fn worker_args(&self, config: &OakvaleConfig) -> Vec<String> {
        let mut args = vec!["worker".to_string()];
        if let Some(path) = &self.config {
            args.push("--config".to_string());
            args.push(path.display().to_string());
        }
        args.push("--model".to_string());
        args.push(config.llm.model.clone());
        if config.llm.provider == LLMProviderKind::Scripted {
            args.push("--offline".to_string());
        }
        if config.debug {
            args.push("--debug".to_string());
        }
        args
    }
}

async fn ensure_reachable(provider: &Arc<dyn LLMProvider>) -> Result<()> {
    provider
        .health_check()
        .await
        .map_err(|e| Fatal::LlmUnreachable(e.to_string()).into())
}

async fn play(options: PlayOptions) -> Result<()> {
    let mut config = load_config(options.config.as_deref())?;
    options.apply(&mut config)?;
    init_tracing(config.debug);

    let provider = LLMProviderFactory::create(&config.llm);
    ensure_reachable(&provider).await?;
    info!("NPCs will think with {}", provider.model_info().model_name);

    let runtime: Arc<dyn WorkerRuntime> = match config.scheduler.runtime {
        RuntimeKind::Task => Arc::new(TaskRuntime::new(provider.clone(), &config)),
        RuntimeKind::Process => {
            let program = std::env::current_exe().context("Cannot locate the oakvale binary")?;
            Arc::new(ProcessRuntime::new(ProcessRuntimeConfig {
                program,
                args: options.worker_args(&config),
                mailbox_capacity: config.scheduler.mailbox_capacity,
                working_dir: None,
            })?)
        }
    };

    let world = demo::oakvale_village(&config)?;
    let manager = NpcProcessManager::new(runtime, config.scheduler.clone());
    let mut engine = Engine::new(world, manager, &config);

    let opening = engine.start().await?;
    let outcome = match config.ui {
        UiMode::Terminal => terminal_loop(&mut engine, opening, options.turns).await,
        UiMode::Headless => headless_loop(&mut engine, &config, options.turns.unwrap_or(20)).await,
    };

    engine.shutdown().await?;
    outcome
}

type GameEngine = Engine<NpcProcessManager>;

async fn terminal_loop(engine: &mut GameEngine, opening: WorldSnapshot, turns: Option<u64>) -> Result<()> {
    println!("{}\nType 'help' for commands.", ui::render(&opening));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut played = 0;

    loop {
        if turns.is_some_and(|limit| played >= limit) {
            println!("That's all for today.");
            return Ok(());
        }

        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read input")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            return Ok(());
        };

        let action = match ui::parse_command(&line) {
            Ok(Command::Quit) => return Ok(()),
            Ok(Command::Help) => {
                println!("{}", ui::HELP);
                continue;
            }
            Ok(Command::Look) => {
                println!("{}", ui::render(&engine.snapshot()));
                continue;
            }
            Ok(Command::Act(action)) => action,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };

        match engine.advance_turn(action).await {
            Ok(snapshot) => {
                played += 1;
                println!("{}", ui::render(&snapshot));
            }
            Err(OakvaleError::InvalidAction(reason)) => println!("You can't: {}", reason),
            Err(e) => return Err(e.into()),
        }
    }
}

/// Lets turns pass on their own, giving NPCs one action interval to think each turn
async fn headless_loop(engine: &mut GameEngine, config: &OakvaleConfig, turns: u64) -> Result<()> {
    for _ in 0..turns {
        tokio::select! {
            _ = tokio::time::sleep(config.scheduler.action_interval) => {}
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted");
                return Ok(());
            }
        }
        let snapshot = engine.advance_turn(PlayerAction::Wait).await?;
        println!("{}", ui::render_status(&snapshot));
    }
    let final_state = serde_json::to_string_pretty(&engine.snapshot().characters)?;
    println!("{}", final_state);
    Ok(())
}

async fn worker(
    character_id: String,
    config: Option<PathBuf>,
    model: Option<String>,
    offline: bool,
    debug: bool,
) -> Result<()> {
    let mut config = load_config(config.as_deref())?;
    if let Some(model) = model {
        config.llm.model = model;
    }
    if offline {
        config.llm.provider = LLMProviderKind::Scripted;
    }
    config.debug |= debug;
    init_tracing(config.debug);

    let provider = LLMProviderFactory::create(&config.llm);
    let client = DecisionClient::new(provider, &config.llm);
    let worker = NpcWorker::new(
        character_id.into(),
        client,
        DecisionRequestBuilder::new(config.perception.max_prompt_chars),
    );
    run_stdio(worker, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;
    Ok(())
}

async fn check(config: Option<PathBuf>) -> Result<()> {
    let config = load_config(config.as_deref())?;
    init_tracing(config.debug);
    println!("Configuration OK");
    println!("  provider: {:?}, model: {}", config.llm.provider, config.llm.model);
    println!(
        "  runtime: {:?}, max active workers: {}, activation radius: {}",
        config.scheduler.runtime, config.scheduler.max_active_workers, config.scheduler.activation_radius
    );

    let provider = LLMProviderFactory::create(&config.llm);
    ensure_reachable(&provider).await?;
    println!("Model server reachable ({})", provider.model_info().model_name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&Fatal::LlmUnreachable("down".into()).into()), 2);
        assert_eq!(exit_code(&Fatal::Config("bad".into()).into()), 3);
        assert_eq!(
            exit_code(&OakvaleError::Configuration("bad".into()).into()),
            3
        );
        assert_eq!(exit_code(&anyhow::anyhow!("boom")), 1);
    }

    #[test]
    fn test_play_options_override_config() {
        let options = PlayOptions {
            model: Some("mistral".into()),
            ui: Some("headless".into()),
            config: Some(PathBuf::from("custom.toml")),
            debug: true,
            runtime: Some("process".into()),
            turns: None,
            offline: false,
        };
        let mut config = OakvaleConfig::default();
        options.apply(&mut config).unwrap();
        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.ui, UiMode::Headless);
        assert_eq!(config.scheduler.runtime, RuntimeKind::Process);
        assert!(config.debug);
        assert_eq!(
            options.worker_args(&config),
            vec!["worker", "--config", "custom.toml", "--model", "mistral", "--debug"]
        );

        let bad = PlayOptions {
            runtime: Some("threads".into()),
            ..options
        };
        let err = bad.apply(&mut OakvaleConfig::default()).unwrap_err();
        assert_eq!(exit_code(&err), 3);
    }

    #[test]
    fn test_cli_parses_worker() {
        let cli = Cli::parse_from(["oakvale", "worker", "--character-id", "guard_01", "--offline"]);
        assert!(matches!(
            cli.command,
            Commands::Worker { ref character_id, offline: true, debug: false, .. } if character_id == "guard_01"
        ));

        let cli = Cli::parse_from(["oakvale", "worker", "--character-id", "guard_01", "--debug"]);
        assert!(matches!(cli.command, Commands::Worker { debug: true, .. }));
    }
}
