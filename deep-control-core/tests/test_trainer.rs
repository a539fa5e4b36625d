use anyhow::Result;
use deep_control_core::{
    record::{BufferedRecorder, Record, RecordValue},
    replay_buffer::{
        PerConfig, PrioritizedReplayBuffer, PrioritizedReplayBufferConfig, ReplayBuffer,
        ReplayBufferConfig, TransitionBatch,
    },
    toy_env::{PointEnv, PointEnvConfig},
    Agent, DefaultEvaluator, Env, Evaluator, ExperienceBufferBase, Policy, ReplayBufferBase, Trainer,
    TrainerConfig,
};
use std::{
    fs,
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
};
use tempdir::TempDir;

const WARMUP_STEPS: usize = 50;
const NUM_STEPS: usize = 100;
const BATCH_SIZE: usize = 8;
const EVAL_INTERVAL: usize = 25;
const MAX_EPISODE_STEPS: usize = 30;
const CAPACITY: usize = 1000;

/// Acts with a constant force and counts optimization steps.
struct StubAgent {
    force: f32,
    n_opts: usize,
    train: bool,
    stop_after: Option<(usize, &'static AtomicBool)>,
}

impl StubAgent {
    fn new() -> Self {
        Self {
            force: -0.5,
            n_opts: 0,
            train: false,
            stop_after: None,
        }
    }
}

impl Policy<PointEnv> for StubAgent {
    fn sample(&mut self, _obs: &[f32]) -> Result<Vec<f32>> {
        Ok(vec![self.force])
    }
}

impl<R> Agent<PointEnv, R> for StubAgent
where
    R: ReplayBufferBase<Batch = TransitionBatch>,
{
    fn train(&mut self) {
        self.train = true;
    }

    fn eval(&mut self) {
        self.train = false;
    }

    fn is_train(&self) -> bool {
        self.train
    }

    fn opt_with_record(&mut self, buffer: &mut R) -> Result<Record> {
        assert!(self.train);
        let batch = buffer.batch(BATCH_SIZE)?;
        let priorities = vec![1.0; batch.len()];
        buffer.update_priority(&batch.ix_sample, &Some(priorities))?;
        self.n_opts += 1;
        if let Some((n, stop)) = self.stop_after {
            if self.n_opts == n {
                stop.store(true, Ordering::Relaxed);
            }
        }
        Ok(Record::from_scalar("n_opts", self.n_opts as f32))
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::write(path.join("stub.txt"), format!("{}", self.n_opts))?;
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.n_opts = fs::read_to_string(path.join("stub.txt"))?.parse()?;
        Ok(())
    }
}

fn trainer_config() -> TrainerConfig {
    TrainerConfig::default()
        .num_steps(NUM_STEPS)
        .warmup_steps(WARMUP_STEPS)
        .max_episode_steps(MAX_EPISODE_STEPS)
        .eval_interval(EVAL_INTERVAL)
        .eval_episodes(2)
        .record_interval(10)
}

fn env_config() -> PointEnvConfig {
    PointEnvConfig::default()
}

fn buffer_config() -> ReplayBufferConfig {
    ReplayBufferConfig::default()
        .capacity(CAPACITY)
        .obs_dim(2)
        .act_dim(1)
}

#[test]
fn test_train_loop_counts() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = trainer_config().transitions_per_step(2).gradient_updates_per_step(3);
    let mut trainer = Trainer::<PointEnv, ReplayBuffer>::build(config.clone(), env_config(), buffer_config())?;
    let env = PointEnv::build(&env_config(), config.seed)?;
    let mut sampler = deep_control_core::Sampler::new(env, &config)?;
    let mut buffer = ReplayBuffer::build(&buffer_config())?;
    let mut agent = StubAgent::new();
    let mut recorder = BufferedRecorder::new();
    let mut evaluator = DefaultEvaluator::<PointEnv>::new(&env_config(), 1, 2, MAX_EPISODE_STEPS)?;
    let stop = AtomicBool::new(false);

    let curve = trainer.run(&mut agent, &mut buffer, &mut sampler, &mut recorder, &mut evaluator, &stop)?;

    assert_eq!(buffer.len(), WARMUP_STEPS + 2 * NUM_STEPS);
    assert_eq!(agent.n_opts, 3 * NUM_STEPS);
    assert!(Agent::<PointEnv, ReplayBuffer>::is_train(&agent));

    let steps = curve.iter().map(|(s, _)| *s).collect::<Vec<_>>();
    assert_eq!(steps, vec![0, 25, 50, 75, 99]);
    assert!(curve.iter().all(|(_, r)| r.is_finite()));

    // Evaluation records carry the number of environment steps.
    let eval_env_steps = recorder
        .iter()
        .filter(|r| r.get("eval_return").is_some())
        .map(|r| r.get_scalar("env_steps").unwrap())
        .collect::<Vec<_>>();
    assert_eq!(eval_env_steps, vec![0., 50., 100., 150., 198.]);

    // Optimization records every `record_interval` steps.
    let n_opt_records = recorder.iter().filter(|r| r.get("n_opts").is_some()).count();
    assert_eq!(n_opt_records, NUM_STEPS / 10);

    // Nothing is saved without a model directory.
    assert!(recorder.iter().all(|r| r.get("best_model_dir").is_none()));

    // Episodes are capped at `max_episode_steps`.
    assert!(recorder
        .iter()
        .filter_map(|r| r.get("episode_length"))
        .all(|v| matches!(v, RecordValue::Scalar(l) if *l <= MAX_EPISODE_STEPS as f32)));
    Ok(())
}

#[test]
fn test_train_with_prioritized_buffer() -> Result<()> {
    let buffer_config = PrioritizedReplayBufferConfig::new(buffer_config(), PerConfig::default());
    let mut trainer = Trainer::<PointEnv, PrioritizedReplayBuffer>::build(
        trainer_config(),
        env_config(),
        buffer_config,
    )?;
    let mut agent = StubAgent::new();
    let mut recorder = BufferedRecorder::new();
    let mut evaluator = trainer.evaluator()?;

    let curve = trainer.train(&mut agent, &mut recorder, &mut evaluator)?;
    assert_eq!(curve.len(), 5);
    assert_eq!(agent.n_opts, NUM_STEPS);
    Ok(())
}

#[test]
fn test_warmup_smaller_than_batch_fails() {
    let config = trainer_config().warmup_steps(0);
    let mut trainer =
        Trainer::<PointEnv, ReplayBuffer>::build(config, env_config(), buffer_config()).unwrap();
    let mut agent = StubAgent::new();
    let mut recorder = BufferedRecorder::new();
    let mut evaluator = DefaultEvaluator::<PointEnv>::new(&env_config(), 1, 2, MAX_EPISODE_STEPS).unwrap();

    let err = trainer.train(&mut agent, &mut recorder, &mut evaluator).unwrap_err();
    let err = err.downcast_ref::<deep_control_core::error::ControlError>();
    assert!(matches!(
        err,
        Some(deep_control_core::error::ControlError::InsufficientData { .. })
    ));
}

#[test]
fn test_stop_flag() -> Result<()> {
    static STOP: AtomicBool = AtomicBool::new(false);
    let dir = TempDir::new("test_stop_flag")?;
    let model_dir = dir.path().join("model");
    let config = trainer_config().model_dir(model_dir.to_string_lossy());
    let mut trainer = Trainer::<PointEnv, ReplayBuffer>::build(config, env_config(), buffer_config())?;
    let mut agent = StubAgent::new();
    agent.stop_after = Some((10, &STOP));
    let mut recorder = BufferedRecorder::new();
    let mut evaluator = trainer.evaluator()?;

    let curve = trainer.train_with_stop(&mut agent, &mut recorder, &mut evaluator, &STOP)?;
    assert_eq!(agent.n_opts, 10);
    assert_eq!(curve.len(), 1);

    // The final parameters are saved, and the best ones under `best`.
    assert_eq!(fs::read_to_string(model_dir.join("stub.txt"))?, "10");
    assert_eq!(fs::read_to_string(model_dir.join("best").join("stub.txt"))?, "1");
    let best_dirs = recorder
        .iter()
        .filter_map(|r| r.get_string("best_model_dir").ok())
        .collect::<Vec<_>>();
    assert_eq!(best_dirs, vec![model_dir.join("best").to_string_lossy().into_owned()]);
    Ok(())
}

/// Counts the actions requested during evaluation.
struct CountingPolicy {
    n_calls: usize,
}

impl Policy<PointEnv> for CountingPolicy {
    fn sample(&mut self, _obs: &[f32]) -> Result<Vec<f32>> {
        self.n_calls += 1;
        Ok(vec![0.0])
    }
}

#[test]
fn test_evaluator_follows_config() -> Result<()> {
    let config = trainer_config().eval_episodes(3).max_episode_steps(7);
    let trainer = Trainer::<PointEnv, ReplayBuffer>::build(config, env_config(), buffer_config())?;
    let mut evaluator = trainer.evaluator()?;
    assert_eq!(evaluator.n_episodes(), 3);
    assert_eq!(evaluator.max_episode_steps(), 7);

    // With zero force the point rests at 1.0 and no episode ends early.
    let mut policy = CountingPolicy { n_calls: 0 };
    let record = evaluator.evaluate(&mut policy)?;
    assert_eq!(policy.n_calls, 3 * 7);
    assert!((record.get_scalar("episode_return")? + 7.0).abs() < 1e-5);
    Ok(())
}
