//! Train [`Agent`].
mod config;
mod sampler;
use crate::{
    record::{Record, RecordValue, RecordValue::Scalar, Recorder},
    replay_buffer::Transition,
    Agent, DefaultEvaluator, Env, Evaluator, ExperienceBufferBase, ReplayBufferBase,
};
use anyhow::Result;
pub use config::TrainerConfig;
use log::info;
pub use sampler::Sampler;
use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
    time::SystemTime,
};

/// Evaluation results `(step, mean return)` in the order they were made.
pub type LearningCurve = Vec<(usize, f32)>;

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Manages the training loop and related objects.
///
/// # Training loop
///
/// 1. Build the training environment, the replay buffer and a [`Sampler`].
/// 2. Warmup: push `warmup_steps` transitions with uniformly random actions.
///    The agent is not optimized. The episode in progress is then dropped.
/// 3. For `step` in `0..num_steps`:
///     1. Collect `transitions_per_step` transitions with the agent's action
///        plus Ornstein-Uhlenbeck noise.
///     2. Run `gradient_updates_per_step` optimization steps of the agent. An
///        optimization step is one learner pass followed by the soft update of
///        the target networks.
///     3. If `step % eval_interval == 0` or this is the last step, evaluate the
///        agent, append `(step, mean return)` to the learning curve and record
///        it as `"eval_return"` at `env_steps = step * transitions_per_step`.
///        If the result is the best so far, the parameters are saved in
///        `(model_dir)/best` and the record carries that directory as
///        `"best_model_dir"`.
///     4. If `step % save_interval == 0`, the parameters are saved in
///        `model_dir`.
/// 4. Save the parameters in `model_dir`.
///
/// Nothing is saved when `model_dir` is `None`.
///
/// The target networks are copied from the agent when the agent is built,
/// so the trainer does not touch them.
///
/// # Interaction of objects
///
/// ```mermaid
/// graph LR
///     A[Agent]-->|action + noise|B[Env]
///     B -->|"Step&lt;E: Env&gt;"|C[Sampler]
///     C -->|Transition|D[ReplayBufferBase]
///     D -->|Batch|A
///     A -->|priorities|D
/// ```
pub struct Trainer<E, R>
where
    E: Env,
    R: ExperienceBufferBase<Item = Transition> + ReplayBufferBase,
{
    config: TrainerConfig,

    /// Configuration of the environment for training.
    env_config_train: E::Config,

    /// Configuration of the replay buffer.
    replay_buffer_config: R::Config,
}

impl<E, R> Trainer<E, R>
where
    E: Env,
    R: ExperienceBufferBase<Item = Transition> + ReplayBufferBase,
{
    /// Constructs a trainer.
    pub fn build(
        config: TrainerConfig,
        env_config_train: E::Config,
        replay_buffer_config: R::Config,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            env_config_train,
            replay_buffer_config,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Builds a [`DefaultEvaluator`] running `eval_episodes` episodes of at most
    /// `max_episode_steps` steps.
    ///
    /// The evaluation environment is built from the training configuration
    /// with the seed `seed + 1`, so it never shares a state with the sampler.
    pub fn evaluator(&self) -> Result<DefaultEvaluator<E>> {
        DefaultEvaluator::new(
            &self.env_config_train,
            self.config.seed + 1,
            self.config.eval_episodes,
            self.config.max_episode_steps,
        )
    }

    fn save_model<A: Agent<E, R>>(agent: &A, model_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(model_dir)?;
        agent.save_params(model_dir)?;
        info!("Saved the model in {:?}", model_dir);
        Ok(())
    }

    /// Train the agent.
    ///
    /// [`Trainer::evaluator`] builds the evaluator described by the
    /// configuration; any other [`Evaluator`] works as well.
    pub fn train<A, V>(
        &mut self,
        agent: &mut A,
        recorder: &mut dyn Recorder,
        evaluator: &mut V,
    ) -> Result<LearningCurve>
    where
        A: Agent<E, R>,
        V: Evaluator<E>,
    {
        let stop = AtomicBool::new(false);
        self.train_with_stop(agent, recorder, evaluator, &stop)
    }

    /// Train the agent until the step budget is exhausted or `stop` is set.
    ///
    /// `stop` is checked between training steps. When training is stopped,
    /// the final parameters are still saved.
    pub fn train_with_stop<A, V>(
        &mut self,
        agent: &mut A,
        recorder: &mut dyn Recorder,
        evaluator: &mut V,
        stop: &AtomicBool,
    ) -> Result<LearningCurve>
    where
        A: Agent<E, R>,
        V: Evaluator<E>,
    {
        let env = E::build(&self.env_config_train, self.config.seed)?;
        let mut buffer = R::build(&self.replay_buffer_config)?;
        let mut sampler = Sampler::new(env, &self.config)?;
        self.run(agent, &mut buffer, &mut sampler, recorder, evaluator, stop)
    }

    /// Runs warmup and the training loop on the given buffer and sampler.
    pub fn run<A, V>(
        &mut self,
        agent: &mut A,
        buffer: &mut R,
        sampler: &mut Sampler<E>,
        recorder: &mut dyn Recorder,
        evaluator: &mut V,
        stop: &AtomicBool,
    ) -> Result<LearningCurve>
    where
        A: Agent<E, R>,
        V: Evaluator<E>,
    {
        let config = self.config.clone();
        let model_dir = config.model_dir.as_ref().map(PathBuf::from);
        let mut learning_curve = LearningCurve::new();
        let mut max_eval_return = f32::MIN;

        for _ in 0..config.warmup_steps {
            sampler.random_and_push(buffer)?;
        }
        sampler.force_reset();
        info!("Pushed {} warmup transitions", buffer.len());

        agent.train();
        let timer = SystemTime::now();

        for step in 0..config.num_steps {
            if stop.load(Ordering::Relaxed) {
                info!("Training stopped at step {}", step);
                break;
            }

            let mut record = Record::empty();
            for _ in 0..config.transitions_per_step {
                let r = sampler.sample_and_push(agent, buffer)?;
                record.merge_inplace(r);
            }

            let record_opt = (step + 1) % config.record_interval == 0;
            for i in 0..config.gradient_updates_per_step {
                if record_opt && i + 1 == config.gradient_updates_per_step {
                    record.merge_inplace(agent.opt_with_record(buffer)?);
                } else {
                    agent.opt(buffer)?;
                }
            }

            if record_opt {
                let secs = timer.elapsed()?.as_secs_f32();
                if secs > 0.0 {
                    record.insert("steps_per_sec", Scalar((step + 1) as f32 / secs));
                }
                record.insert("sigma", Scalar(sampler.noise().sigma()));
            }

            if !record.is_empty() {
                let env_steps = (step + 1) * config.transitions_per_step;
                record.insert("env_steps", Scalar(env_steps as f32));
                recorder.write(record);
            }

            let is_last = step + 1 == config.num_steps;
            if step % config.eval_interval == 0 || is_last {
                agent.eval();
                let eval_record = evaluator.evaluate(agent)?;
                agent.train();
                let mean_return = eval_record.get_scalar("episode_return")?;
                info!("Step {}: mean evaluation return = {}", step, mean_return);
                learning_curve.push((step, mean_return));

                let mut record = Record::from_scalar("eval_return", mean_return);
                let env_steps = step * config.transitions_per_step;
                record.insert("env_steps", Scalar(env_steps as f32));

                if mean_return > max_eval_return {
                    max_eval_return = mean_return;
                    if let Some(model_dir) = &model_dir {
                        let best_dir = model_dir.join("best");
                        Self::save_model(agent, &best_dir)?;
                        let best_dir = best_dir.to_string_lossy().into_owned();
                        record.insert("best_model_dir", RecordValue::String(best_dir));
                    }
                }
                recorder.write(record);
            }

            if step % config.save_interval == 0 {
                if let Some(model_dir) = &model_dir {
                    Self::save_model(agent, model_dir)?;
                }
            }
        }

        if let Some(model_dir) = &model_dir {
            Self::save_model(agent, model_dir)?;
        }

        Ok(learning_curve)
    }
}
