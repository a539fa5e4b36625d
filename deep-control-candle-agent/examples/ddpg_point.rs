use anyhow::Result;
use clap::{Parser, ValueEnum};
use deep_control_candle_agent::{
    actor::ActorConfig,
    critic::CriticConfig,
    ddpg::{Ddpg, DdpgConfig},
    mlp::{Mlp, Mlp2, MlpConfig},
    sac::{EntCoefMode, Sac, SacConfig},
    td3::{Td3, Td3Config},
    Activation, Device,
};
use deep_control_core::{
    noise::OuNoiseConfig,
    record::{NullRecorder, Recorder},
    replay_buffer::{
        PerConfig, PrioritizedReplayBuffer, PrioritizedReplayBufferConfig, ReplayBuffer,
        ReplayBufferConfig, Transition,
    },
    toy_env::{PointEnv, PointEnvConfig},
    Agent, Configurable, ExperienceBufferBase, ReplayBufferBase, Trainer, TrainerConfig,
};
use deep_control_tensorboard::TensorboardRecorder;
use log::info;

const DIM_OBS: usize = 2;
const DIM_ACT: usize = 1;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Algo {
    Ddpg,
    Td3,
    Sac,
}

/// Train DDPG, TD3 or SAC agent on the point mass environment
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Algorithm
    #[arg(long, value_enum, default_value_t = Algo::Ddpg)]
    algo: Algo,

    /// Use the prioritized replay buffer
    #[arg(long, default_value_t = false)]
    prioritized: bool,

    /// Number of training steps
    #[arg(long, default_value_t = 20_000)]
    num_steps: usize,

    /// Number of random transitions collected before training
    #[arg(long, default_value_t = 1_000)]
    warmup_steps: usize,

    #[arg(long, default_value_t = 1)]
    transitions_per_step: usize,

    #[arg(long, default_value_t = 1)]
    gradient_updates_per_step: usize,

    #[arg(long, default_value_t = 200)]
    max_episode_steps: usize,

    #[arg(long, default_value_t = 1_000)]
    eval_interval: usize,

    #[arg(long, default_value_t = 5)]
    eval_episodes: usize,

    #[arg(long, default_value_t = 5_000)]
    save_interval: usize,

    /// Clip noisy actions into the action space
    #[arg(long, default_value_t = false)]
    clip_exploration: bool,

    #[arg(long, default_value_t = 100_000)]
    capacity: usize,

    #[arg(long, default_value_t = 128)]
    batch_size: usize,

    #[arg(long, default_value_t = 1e-4)]
    actor_lr: f64,

    #[arg(long, default_value_t = 1e-3)]
    critic_lr: f64,

    #[arg(long, default_value_t = 0.0)]
    actor_l2: f64,

    #[arg(long, default_value_t = 0.0)]
    critic_l2: f64,

    /// Maximum gradient norm of the actor
    #[arg(long)]
    actor_clip: Option<f64>,

    /// Maximum gradient norm of the critic
    #[arg(long)]
    critic_clip: Option<f64>,

    #[arg(long, default_value_t = 0.99)]
    gamma: f64,

    #[arg(long, default_value_t = 0.005)]
    tau: f64,

    /// Initial scale of the exploration noise
    #[arg(long, default_value_t = 0.2)]
    sigma_start: f32,

    /// Final scale of the exploration noise
    #[arg(long, default_value_t = 0.1)]
    sigma_final: f32,

    /// Number of steps over which the noise scale is annealed
    #[arg(long, default_value_t = 10_000)]
    sigma_anneal: usize,

    /// Mean reversion rate of the exploration noise
    #[arg(long, default_value_t = 0.15)]
    theta: f32,

    /// Fixed entropy coefficient of SAC, tuned automatically if not given
    #[arg(long)]
    alpha: Option<f64>,

    /// Lower bound of the log standard deviation of the SAC policy
    #[arg(long, default_value_t = -10.0, allow_hyphen_values = true)]
    log_std_low: f64,

    /// Upper bound of the log standard deviation of the SAC policy
    #[arg(long, default_value_t = 2.0)]
    log_std_high: f64,

    /// Hidden units of the actor and the critic
    #[arg(long, num_args = 1.., default_values_t = vec![64, 64])]
    units: Vec<usize>,

    /// Disable bootstrapping through time-limit truncations
    #[arg(long, default_value_t = false)]
    no_infinite_bootstrap: bool,

    /// Directory of TensorBoard logs
    #[arg(long)]
    logdir: Option<String>,

    /// Directory of saved parameters
    #[arg(long)]
    model_dir: Option<String>,

    /// Index of the CUDA device, CPU if not given
    #[arg(long)]
    cuda: Option<usize>,

    #[arg(long, default_value_t = 42)]
    seed: i64,
}

fn device(args: &Args) -> Device {
    match args.cuda {
        Some(ix) => Device::Cuda(ix),
        None => Device::Cpu,
    }
}

fn actor_config(args: &Args) -> ActorConfig<MlpConfig> {
    ActorConfig::default().pi_config(MlpConfig::new(
        DIM_OBS,
        args.units.clone(),
        DIM_ACT,
        Activation::None,
    ))
}

fn critic_config(args: &Args) -> CriticConfig<MlpConfig> {
    CriticConfig::default().q_config(MlpConfig::new(
        DIM_OBS + DIM_ACT,
        args.units.clone(),
        1,
        Activation::None,
    ))
}

fn ddpg_config(args: &Args) -> DdpgConfig<MlpConfig, MlpConfig> {
    DdpgConfig::default()
        .actor_config(actor_config(args))
        .critic_config(critic_config(args))
        .actor_lr(args.actor_lr)
        .critic_lr(args.critic_lr)
        .actor_l2(args.actor_l2)
        .critic_l2(args.critic_l2)
        .actor_clip(args.actor_clip)
        .critic_clip(args.critic_clip)
        .discount_factor(args.gamma)
        .tau(args.tau)
        .batch_size(args.batch_size)
        .device(device(args))
}

fn td3_config(args: &Args) -> Td3Config<MlpConfig, MlpConfig> {
    Td3Config::default()
        .actor_config(actor_config(args))
        .critic_config(critic_config(args))
        .actor_lr(args.actor_lr)
        .critic_lr(args.critic_lr)
        .actor_l2(args.actor_l2)
        .critic_l2(args.critic_l2)
        .actor_clip(args.actor_clip)
        .critic_clip(args.critic_clip)
        .discount_factor(args.gamma)
        .tau(args.tau)
        .batch_size(args.batch_size)
        .seed(args.seed as u64)
        .device(device(args))
}

fn sac_config(args: &Args) -> SacConfig<MlpConfig, MlpConfig> {
    let ent_coef_mode = match args.alpha {
        Some(alpha) => EntCoefMode::Fix(alpha),
        None => EntCoefMode::default(),
    };
    SacConfig::default()
        .actor_config(actor_config(args))
        .critic_config(critic_config(args))
        .actor_lr(args.actor_lr)
        .critic_lr(args.critic_lr)
        .actor_l2(args.actor_l2)
        .critic_l2(args.critic_l2)
        .actor_clip(args.actor_clip)
        .critic_clip(args.critic_clip)
        .discount_factor(args.gamma)
        .tau(args.tau)
        .batch_size(args.batch_size)
        .ent_coef_mode(ent_coef_mode)
        .lstd_bounds(args.log_std_low, args.log_std_high)
        .seed(args.seed as u64)
        .device(device(args))
}

fn trainer_config(args: &Args) -> TrainerConfig {
    // SAC explores with its own stochastic policy.
    let (sigma_start, sigma_final) = match args.algo {
        Algo::Sac => (0.0, 0.0),
        _ => (args.sigma_start, args.sigma_final),
    };
    let noise = OuNoiseConfig::default()
        .theta(args.theta)
        .sigma(sigma_start, sigma_final, args.sigma_anneal)
        .seed(args.seed as u64);
    let config = TrainerConfig::default()
        .num_steps(args.num_steps)
        .warmup_steps(args.warmup_steps)
        .transitions_per_step(args.transitions_per_step)
        .gradient_updates_per_step(args.gradient_updates_per_step)
        .max_episode_steps(args.max_episode_steps)
        .eval_interval(args.eval_interval)
        .eval_episodes(args.eval_episodes)
        .save_interval(args.save_interval)
        .clip_exploration(args.clip_exploration)
        .infinite_bootstrap(!args.no_infinite_bootstrap)
        .noise(noise)
        .seed(args.seed);
    match &args.model_dir {
        Some(dir) => config.model_dir(dir.as_str()),
        None => config,
    }
}

fn buffer_config(args: &Args) -> ReplayBufferConfig {
    ReplayBufferConfig::default()
        .capacity(args.capacity)
        .obs_dim(DIM_OBS)
        .act_dim(DIM_ACT)
        .seed(args.seed as u64)
}

fn create_recorder(args: &Args) -> Box<dyn Recorder> {
    match &args.logdir {
        Some(logdir) => Box::new(TensorboardRecorder::new(logdir)),
        None => Box::new(NullRecorder::new()),
    }
}

fn train<A, R>(args: &Args, agent: &mut A, replay_buffer_config: R::Config) -> Result<()>
where
    A: Agent<PointEnv, R>,
    R: ExperienceBufferBase<Item = Transition> + ReplayBufferBase,
{
    let config = trainer_config(args);
    let mut trainer = Trainer::<PointEnv, R>::build(config, PointEnvConfig::default(), replay_buffer_config)?;
    let mut evaluator = trainer.evaluator()?;
    let mut recorder = create_recorder(args);

    let curve = trainer.train(agent, recorder.as_mut(), &mut evaluator)?;
    for (step, ret) in curve.iter() {
        info!("step {:>8}: eval return {:.3}", step, ret);
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    info!("{:?}", args);

    match (args.algo, args.prioritized) {
        (Algo::Ddpg, false) => {
            let mut agent = Ddpg::<PointEnv, Mlp, Mlp, ReplayBuffer>::build(ddpg_config(&args))?;
            train(&args, &mut agent, buffer_config(&args))
        }
        (Algo::Ddpg, true) => {
            let mut agent =
                Ddpg::<PointEnv, Mlp, Mlp, PrioritizedReplayBuffer>::build(ddpg_config(&args))?;
            let config = PrioritizedReplayBufferConfig::new(buffer_config(&args), PerConfig::default());
            train(&args, &mut agent, config)
        }
        (Algo::Td3, false) => {
            let mut agent = Td3::<PointEnv, Mlp, Mlp, ReplayBuffer>::build(td3_config(&args))?;
            train(&args, &mut agent, buffer_config(&args))
        }
        (Algo::Td3, true) => {
            let mut agent =
                Td3::<PointEnv, Mlp, Mlp, PrioritizedReplayBuffer>::build(td3_config(&args))?;
            let config = PrioritizedReplayBufferConfig::new(buffer_config(&args), PerConfig::default());
            train(&args, &mut agent, config)
        }
        (Algo::Sac, false) => {
            let mut agent = Sac::<PointEnv, Mlp, Mlp2, ReplayBuffer>::build(sac_config(&args))?;
            train(&args, &mut agent, buffer_config(&args))
        }
        (Algo::Sac, true) => {
            let mut agent =
                Sac::<PointEnv, Mlp, Mlp2, PrioritizedReplayBuffer>::build(sac_config(&args))?;
            let config = PrioritizedReplayBufferConfig::new(buffer_config(&args), PerConfig::default());
            train(&args, &mut agent, config)
        }
    }
}
