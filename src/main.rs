use std::{fs::File, path::PathBuf, time::Instant};

use anyhow::{Context, ensure};
use clap::Parser;
use polars::{
    frame::DataFrame,
    io::SerWriter,
    prelude::{Column, CsvWriter, NamedFrom},
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::info;
use tracing_subscriber::EnvFilter;

use td3::{
    Td3Agent, Td3Config, Transition,
    device::DEVICE,
    environment::{Environment, Pendulum},
    noise::GaussianExploration,
};

#[derive(Parser, Debug)]
#[command(name = "td3", about = "Train a TD3 agent on the inverted pendulum")]
struct Args {
    #[arg(long, default_value_t = 100)]
    episodes: u64,
    #[arg(long, default_value_t = 200)]
    max_episode_steps: u64,
    /// Uniformly random actions are taken for this many initial steps
    #[arg(long, default_value_t = 1000)]
    start_steps: u64,
    /// Exploration noise std, relative to the action bound
    #[arg(long, default_value_t = 0.1)]
    exploration_noise: f32,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// JSON file with agent hyperparameters
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value = "output/actor.safetensors")]
    save: PathBuf,
    #[arg(long, default_value = "output/episodes.csv")]
    log_csv: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut env = Pendulum::new();

    let config = match &args.config {
        Some(path) => Td3Config::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Td3Config {
            state_size: env.state_size(),
            action_size: env.action_size(),
            action_bound: env.action_bound(),
            ..Default::default()
        },
    };
    ensure!(
        config.state_size == env.state_size() && config.action_size == env.action_size(),
        "config dimensions {}x{} do not match the environment's {}x{}",
        config.state_size,
        config.action_size,
        env.state_size(),
        env.action_size()
    );

    let bound = config.action_bound;
    let mut agent = Td3Agent::new(config, &DEVICE, StdRng::seed_from_u64(args.seed))?;
    let exploration = GaussianExploration::new(args.exploration_noise, bound)?;
    let mut rng = StdRng::seed_from_u64(args.seed.wrapping_add(1));

    let mut episode_log: Vec<u32> = Vec::new();
    let mut return_log: Vec<f32> = Vec::new();
    let mut length_log: Vec<u32> = Vec::new();

    let start = Instant::now();
    let mut global_step: u64 = 0;
    for episode in 0..args.episodes {
        let mut state = env.reset(&mut rng);
        let mut episode_return = 0.0f32;
        let mut episode_len = 0u64;

        for episode_step in 1..=args.max_episode_steps {
            global_step += 1;
            let action: Vec<f32> = if global_step <= args.start_steps {
                (0..env.action_size())
                    .map(|_| rng.random_range(-bound..=bound))
                    .collect()
            } else {
                let mut action = agent.act(&state)?;
                exploration.perturb(&mut rng, &mut action);
                action
            };

            let step = env.step(&action);
            episode_return += step.reward;
            episode_len = episode_step;

            // the step limit ends the loop without marking the transition terminal
            let transition = Transition::new(
                state,
                action,
                step.reward,
                step.next_state.clone(),
                step.done,
            );
            agent.train(global_step, episode_step, transition)?;

            state = step.next_state;
            if step.done {
                break;
            }
        }

        info!(
            episode,
            episode_return,
            episode_len,
            global_step,
            critic_updates = agent.critic_updates(),
            "episode finished"
        );
        episode_log.push(episode as u32);
        return_log.push(episode_return);
        length_log.push(episode_len as u32);
    }
    info!(elapsed_s = start.elapsed().as_secs_f32(), "training finished");

    if let Some(parent) = args.save.parent() {
        std::fs::create_dir_all(parent)?;
    }
    agent.save_actor(&args.save)?;

    if let Some(parent) = args.log_csv.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut df = DataFrame::new(vec![
        Column::new("episode".into(), episode_log),
        Column::new("return".into(), return_log),
        Column::new("length".into(), length_log),
    ])?;
    let mut file = File::create(&args.log_csv)
        .with_context(|| format!("creating {}", args.log_csv.display()))?;
    CsvWriter::new(&mut file).finish(&mut df)?;
    info!(path = %args.log_csv.display(), "episode log written");

    Ok(())
}
