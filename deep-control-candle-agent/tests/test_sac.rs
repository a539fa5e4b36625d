use anyhow::Result;
use deep_control_candle_agent::{
    actor::ActorConfig,
    critic::CriticConfig,
    mlp::{Mlp, Mlp2, MlpConfig},
    sac::{EntCoefMode, Sac, SacConfig},
    Activation,
};
use deep_control_core::{
    noise::OuNoiseConfig,
    record::BufferedRecorder,
    replay_buffer::{PerConfig, PrioritizedReplayBuffer, PrioritizedReplayBufferConfig, ReplayBuffer, ReplayBufferConfig},
    toy_env::{PointEnv, PointEnvConfig},
    Agent, Configurable, Env, Policy, ReplayBufferBase, Sampler, Trainer, TrainerConfig,
};
use tempdir::TempDir;

const OBS_DIM: usize = 2;
const ACT_DIM: usize = 1;
const WARMUP_STEPS: usize = 50;
const NUM_STEPS: usize = 60;
const BATCH_SIZE: usize = 8;

type SacAgent<R> = Sac<PointEnv, Mlp, Mlp2, R>;

fn sac_config() -> SacConfig<MlpConfig, MlpConfig> {
    let actor_config =
        ActorConfig::default().pi_config(MlpConfig::new(OBS_DIM, vec![16, 16], ACT_DIM, Activation::None));
    let critic_config =
        CriticConfig::default().q_config(MlpConfig::new(OBS_DIM + ACT_DIM, vec![16, 16], 1, Activation::None));
    SacConfig::default()
        .actor_config(actor_config)
        .critic_config(critic_config)
        .batch_size(BATCH_SIZE)
}

fn trainer_config() -> TrainerConfig {
    // The policy is stochastic during training, so no extra noise is added.
    let noise = OuNoiseConfig::default().sigma(0.0, 0.0, 1);
    TrainerConfig::default()
        .num_steps(NUM_STEPS)
        .warmup_steps(WARMUP_STEPS)
        .max_episode_steps(30)
        .eval_interval(NUM_STEPS)
        .eval_episodes(1)
        .record_interval(10)
        .noise(noise)
}

fn buffer_config() -> ReplayBufferConfig {
    ReplayBufferConfig::default()
        .capacity(1000)
        .obs_dim(OBS_DIM)
        .act_dim(ACT_DIM)
}

#[test]
fn test_sac_point_env() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let buffer_config = PrioritizedReplayBufferConfig::new(buffer_config(), PerConfig::default());
    let mut trainer =
        Trainer::<PointEnv, PrioritizedReplayBuffer>::build(trainer_config(), PointEnvConfig::default(), buffer_config)?;
    let mut agent = SacAgent::<PrioritizedReplayBuffer>::build(sac_config())?;
    let mut recorder = BufferedRecorder::new();
    let mut evaluator = trainer.evaluator()?;

    let curve = trainer.train(&mut agent, &mut recorder, &mut evaluator)?;
    assert_eq!(agent.n_opts(), NUM_STEPS);
    assert!(curve.iter().all(|(_, r)| r.is_finite()));

    let alphas = recorder
        .iter()
        .filter_map(|r| r.get_scalar("alpha").ok())
        .collect::<Vec<_>>();
    assert_eq!(alphas.len(), NUM_STEPS / 10);
    assert!(alphas.iter().all(|a| a.is_finite() && *a > 0.0));
    for key in ["loss_critic1", "loss_critic2", "loss_actor", "entropy"] {
        assert!(recorder.iter().any(|r| r.get_scalar(key).map_or(false, |v| v.is_finite())));
    }
    Ok(())
}

#[test]
fn test_sac_fixed_alpha_is_kept() -> Result<()> {
    let mut buffer = ReplayBuffer::build(&buffer_config())?;
    let mut sampler = Sampler::new(PointEnv::build(&PointEnvConfig::default(), 0)?, &trainer_config())?;
    for _ in 0..BATCH_SIZE * 2 {
        sampler.random_and_push(&mut buffer)?;
    }

    let mut agent = SacAgent::<ReplayBuffer>::build(sac_config().ent_coef_mode(EntCoefMode::Fix(0.3)))?;
    agent.train();
    for _ in 0..5 {
        agent.opt(&mut buffer)?;
    }
    assert!((agent.alpha()? - 0.3).abs() < 1e-6);
    Ok(())
}

#[test]
fn test_sac_save_and_load() -> Result<()> {
    let mut buffer = ReplayBuffer::build(&buffer_config())?;
    let mut sampler = Sampler::new(PointEnv::build(&PointEnvConfig::default(), 0)?, &trainer_config())?;
    for _ in 0..BATCH_SIZE * 2 {
        sampler.random_and_push(&mut buffer)?;
    }

    let mut agent = SacAgent::<ReplayBuffer>::build(sac_config())?;
    agent.train();
    for _ in 0..5 {
        agent.opt(&mut buffer)?;
    }

    let dir = TempDir::new("test_sac_save_and_load")?;
    agent.save_params(dir.path())?;
    for name in ["actor.pt", "critic1.pt", "critic2.pt", "ent_coef.pt"] {
        assert!(dir.path().join(name).exists(), "{} is missing", name);
    }

    // Deterministic actions and the entropy coefficient survive the round trip.
    let mut agent_ = SacAgent::<ReplayBuffer>::build(sac_config().seed(7))?;
    agent_.load_params(dir.path())?;
    agent.eval();
    agent_.eval();
    let obs = [0.5f32, -0.25];
    let a = Policy::<PointEnv>::sample(&mut agent, &obs)?;
    let a_ = Policy::<PointEnv>::sample(&mut agent_, &obs)?;
    assert_eq!(a.len(), ACT_DIM);
    for (x, y) in a.iter().zip(a_.iter()) {
        assert!((x - y).abs() < 1e-6);
        assert!(x.abs() <= 1.0);
    }
    assert!((agent.alpha()? - agent_.alpha()?).abs() < 1e-6);
    Ok(())
}
