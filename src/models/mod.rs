/// Per-joint effort regressor
use std::collections::HashMap;
use std::path::Path;

use candle_core::{DType, Result, Tensor, Var};
use candle_nn::{AdamW, Linear, Module, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{ModelConfig, TrainingConfig};
use crate::device::ComputeContext;
use crate::training::checkpoint::{Checkpoint, CheckpointMetadata};

pub mod loader;

/// Feed-forward network mapping a 12-value kinematic state to one effort.
///
/// `num_hidden_layers` ReLU layers named `layer_{i}`, followed by a linear
/// `head` with a single output.
pub struct JointNetwork {
    hidden: Vec<Linear>,
    head: Linear,
}

impl JointNetwork {
    /// Create new network
    pub fn new(config: &ModelConfig, vb: VarBuilder) -> Result<Self> {
        let mut hidden = Vec::with_capacity(config.num_hidden_layers);
        let dims = layer_dims(config);
        for (name, fan_in, fan_out) in dims.into_iter().take(config.num_hidden_layers) {
            hidden.push(candle_nn::linear(fan_in, fan_out, vb.pp(name))?);
        }
        let head = candle_nn::linear(config.hidden_size, 1, vb.pp("head"))?;

        Ok(Self { hidden, head })
    }
}

impl Module for JointNetwork {
    /// `[batch, 12] -> [batch, 1]`
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut hidden_states = xs.clone();
        for layer in &self.hidden {
            hidden_states = layer.forward(&hidden_states)?.relu()?;
        }
        self.head.forward(&hidden_states)
    }
}

/// `(var prefix, fan_in, fan_out)` of every linear layer, head last
fn layer_dims(config: &ModelConfig) -> Vec<(String, usize, usize)> {
    let mut dims = Vec::with_capacity(config.num_hidden_layers + 1);
    let mut fan_in = config.input_size;
    for i in 0..config.num_hidden_layers {
        dims.push((format!("layer_{}", i), fan_in, config.hidden_size));
        fan_in = config.hidden_size;
    }
    dims.push(("head".to_string(), fan_in, 1));
    dims
}

/// Populate `varmap` with uniform(-1/sqrt(fan_in), 1/sqrt(fan_in)) weights and
/// biases drawn from `seed`. `VarMap::get` hands these back when the network
/// is built, so the same seed always yields the same parameters.
fn seed_parameters(
    varmap: &VarMap,
    config: &ModelConfig,
    seed: u64,
    context: &ComputeContext,
) -> crate::Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut vars = varmap
        .data()
        .lock()
        .map_err(|_| crate::EffortError::Model("parameter map lock poisoned".to_string()))?;

    for (name, fan_in, fan_out) in layer_dims(config) {
        let bound = 1.0 / (fan_in as f64).sqrt();
        let dist = Uniform::new_inclusive(-bound, bound);

        let weight: Vec<f32> = (0..fan_in * fan_out)
            .map(|_| dist.sample(&mut rng) as f32)
            .collect();
        let bias: Vec<f32> = (0..fan_out).map(|_| dist.sample(&mut rng) as f32).collect();

        let weight = Tensor::from_vec(weight, (fan_out, fan_in), context.device())?;
        let bias = Tensor::from_vec(bias, fan_out, context.device())?;

        vars.insert(format!("{}.weight", name), Var::from_tensor(&weight)?);
        vars.insert(format!("{}.bias", name), Var::from_tensor(&bias)?);
    }

    Ok(())
}

/// One joint's regressor together with its own Adam state.
///
/// Nothing is shared between joints: every model owns its `VarMap` and its
/// optimizer, so a backward pass through one joint's loss can only reach that
/// joint's parameters.
pub struct JointModel {
    joint: usize,
    config: ModelConfig,
    varmap: VarMap,
    network: JointNetwork,
    optimizer: AdamW,
    context: ComputeContext,
}

impl JointModel {
    /// Create the model for `joint`, seeded with `init_seed + joint` when a
    /// seed is configured
    pub fn new(
        joint: usize,
        model_config: &ModelConfig,
        training_config: &TrainingConfig,
        context: &ComputeContext,
    ) -> crate::Result<Self> {
        let seed = match training_config.init_seed {
            Some(seed) => seed.wrapping_add(joint as u64),
            None => rand::random(),
        };
        Self::with_seed(joint, model_config, training_config, context, seed)
    }

    /// Create the model for `joint` with an explicit initialization seed
    pub fn with_seed(
        joint: usize,
        model_config: &ModelConfig,
        training_config: &TrainingConfig,
        context: &ComputeContext,
        seed: u64,
    ) -> crate::Result<Self> {
        model_config.validate()?;

        let varmap = VarMap::new();
        seed_parameters(&varmap, model_config, seed, context)?;

        let vb = VarBuilder::from_varmap(&varmap, DType::F32, context.device());
        let network = JointNetwork::new(model_config, vb)?;

        // Adam: AdamW without weight decay
        let params = ParamsAdamW {
            lr: training_config.learning_rate,
            beta1: training_config.beta1,
            beta2: training_config.beta2,
            eps: training_config.eps,
            weight_decay: 0.0,
        };
        let optimizer = AdamW::new(varmap.all_vars(), params)?;

        log::debug!("Joint {} initialized with seed {}", joint, seed);

        Ok(Self {
            joint,
            config: model_config.clone(),
            varmap,
            network,
            optimizer,
            context: context.clone(),
        })
    }

    pub fn joint(&self) -> usize {
        self.joint
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn learning_rate(&self) -> f64 {
        self.optimizer.learning_rate()
    }

    /// Predict efforts for a `[batch, 12]` input
    pub fn forward(&self, features: &Tensor) -> Result<Tensor> {
        self.network.forward(features)
    }

    /// Mean squared error between the prediction and `target` (`[batch, 1]`)
    pub fn loss(&self, features: &Tensor, target: &Tensor) -> Result<Tensor> {
        let prediction = self.forward(features)?;
        candle_nn::loss::mse(&prediction, target)
    }

    /// Forward, backward and one Adam step. Returns the loss before the update.
    pub fn train_step(&mut self, features: &Tensor, target: &Tensor) -> Result<f32> {
        let loss = self.loss(features, target)?;
        // backward_step computes fresh gradients, so nothing carries over
        self.optimizer.backward_step(&loss)?;
        loss.to_scalar::<f32>()
    }

    /// Loss with frozen parameters
    pub fn evaluate(&self, features: &Tensor, target: &Tensor) -> Result<f32> {
        self.loss(features, target)?.to_scalar::<f32>()
    }

    /// Deep copy of every parameter, keyed by var name
    pub fn snapshot(&self) -> crate::Result<HashMap<String, Tensor>> {
        let vars = self
            .varmap
            .data()
            .lock()
            .map_err(|_| crate::EffortError::Model("parameter map lock poisoned".to_string()))?;

        let mut params = HashMap::with_capacity(vars.len());
        for (name, var) in vars.iter() {
            params.insert(name.clone(), var.as_tensor().copy()?);
        }
        Ok(params)
    }

    /// Overwrite parameters in place from a snapshot or checkpoint.
    ///
    /// Every parameter of the network must be present with a matching shape.
    /// Optimizer moments are left untouched.
    pub fn restore(&mut self, params: &HashMap<String, Tensor>) -> crate::Result<()> {
        let vars = self
            .varmap
            .data()
            .lock()
            .map_err(|_| crate::EffortError::Model("parameter map lock poisoned".to_string()))?;

        for (name, var) in vars.iter() {
            let value = params.get(name).ok_or_else(|| {
                crate::EffortError::Checkpoint(format!("missing parameter `{}`", name))
            })?;

            if value.dims() != var.dims() {
                return Err(crate::EffortError::ShapeMismatch(format!(
                    "parameter `{}`: expected {:?}, got {:?}",
                    name,
                    var.dims(),
                    value.dims()
                )));
            }

            let value = value
                .to_device(self.context.device())?
                .to_dtype(DType::F32)?;
            var.set(&value)?;
        }

        Ok(())
    }

    /// Write parameters and `metadata` to a safetensors file
    pub fn save_checkpoint<P: AsRef<Path>>(
        &self,
        path: P,
        metadata: CheckpointMetadata,
    ) -> crate::Result<()> {
        Checkpoint::new(self.snapshot()?, metadata).save(path)
    }

    /// Total number of trainable scalars
    pub fn num_parameters(&self) -> usize {
        self.varmap
            .all_vars()
            .iter()
            .map(|v| v.elem_count())
            .sum()
    }
}
