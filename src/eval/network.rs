//! Feed-forward neural network with one hidden layer.
//!
//! Sigmoid activations, a bias per neuron, online back-propagation with
//! momentum. Weights are stored row-major per neuron with the bias first:
//! `hidden_weights[h] = [bias, w_0, .., w_{inputs-1}]`.
//!
//! Inference (`run`) borrows the network immutably and can be called from
//! several threads at once. Training needs `&mut self`, so the borrow checker
//! rules out inference while a training pass is running.

use std::io::{Read, Write};
use std::path::Path;

use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::NetworkError;

/// Result type for network operations.
pub type NetworkResult<T> = std::result::Result<T, NetworkError>;

/// Version written into every marshalled network.
pub const FORMAT_VERSION: u32 = 1;

/// Hyper-parameters used by [`NeuralNetwork::train`] and weight init.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    pub learning_rate: f64,
    pub momentum: f64,
    /// Initial weights are drawn uniformly in `[-amplitude, amplitude]`.
    pub amplitude: f64,
    /// Mean squared error under which training stops.
    pub max_error: f64,
    pub epochs: usize,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.2,
            momentum: 0.2,
            amplitude: 0.5,
            max_error: 1e-4,
            epochs: 1000,
        }
    }
}

/// Why a training run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The error fell below `max_error`.
    Converged,
    /// `epochs` were run without converging.
    EpochLimit,
    /// The monitor asked to stop.
    Cancelled,
    /// Nothing to learn from; weights untouched.
    NoSamples,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    /// Epochs fully processed.
    pub epochs: usize,
    /// Mean squared error of the last processed epoch.
    pub error: f64,
    pub stop: StopReason,
}

impl TrainingSummary {
    pub fn is_cancelled(&self) -> bool {
        self.stop == StopReason::Cancelled
    }

    /// Whether the weights ran through a complete training run.
    pub fn did_train(&self) -> bool {
        matches!(self.stop, StopReason::Converged | StopReason::EpochLimit)
    }
}

/// Observer of a training run. Every method has a no-op default.
pub trait TrainingMonitor {
    /// `error` is the error of the previous epoch, 1.0 before the first.
    fn epoch_started(&mut self, _epoch: usize, _error: f64) {}

    fn epoch_ended(&mut self, _epoch: usize, _error: f64) {}

    /// Called after each sample with its index in the training set.
    fn sample_processed(&mut self, _index: usize) {}

    /// Polled before every epoch.
    fn should_stop(&self) -> bool {
        false
    }
}

/// Monitor that observes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMonitor;

impl TrainingMonitor for NoMonitor {}

#[derive(Deserialize)]
struct Header {
    format_version: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuralNetwork {
    format_version: u32,
    input_count: usize,
    hidden_count: usize,
    output_count: usize,
    hidden_weights: Vec<Vec<f64>>,
    output_weights: Vec<Vec<f64>>,
    params: TrainingParams,
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn random_matrix<R: Rng + ?Sized>(rows: usize, cols: usize, amplitude: f64, rng: &mut R) -> Vec<Vec<f64>> {
    (0..rows)
        .map(|_| {
            (0..cols)
                .map(|_| {
                    if amplitude > 0.0 {
                        rng.gen_range(-amplitude..=amplitude)
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect()
}

impl NeuralNetwork {
    /// Network with random weights.
    pub fn new<R: Rng + ?Sized>(
        input_count: usize,
        hidden_count: usize,
        output_count: usize,
        params: TrainingParams,
        rng: &mut R,
    ) -> NetworkResult<Self> {
        if input_count == 0 || hidden_count == 0 || output_count == 0 {
            return Err(NetworkError::Topology {
                message: format!("{input_count} x {hidden_count} x {output_count}"),
            });
        }
        let mut network = Self {
            format_version: FORMAT_VERSION,
            input_count,
            hidden_count,
            output_count,
            hidden_weights: Vec::new(),
            output_weights: Vec::new(),
            params,
        };
        network.reset(rng);
        Ok(network)
    }

    /// Like [`NeuralNetwork::new`] with a reproducible weight draw.
    pub fn seeded(
        input_count: usize,
        hidden_count: usize,
        output_count: usize,
        params: TrainingParams,
        seed: u64,
    ) -> NetworkResult<Self> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        Self::new(input_count, hidden_count, output_count, params, &mut rng)
    }

    /// Draw fresh weights, forgetting everything learned.
    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let amplitude = self.params.amplitude;
        self.hidden_weights = random_matrix(self.hidden_count, self.input_count + 1, amplitude, rng);
        self.output_weights = random_matrix(self.output_count, self.hidden_count + 1, amplitude, rng);
    }

    pub fn input_count(&self) -> usize {
        self.input_count
    }

    pub fn hidden_count(&self) -> usize {
        self.hidden_count
    }

    pub fn output_count(&self) -> usize {
        self.output_count
    }

    pub fn params(&self) -> &TrainingParams {
        &self.params
    }

    pub fn set_params(&mut self, params: TrainingParams) {
        self.params = params;
    }

    /// Forward pass.
    pub fn run(&self, input: &[f64]) -> NetworkResult<Vec<f64>> {
        self.check_input(input)?;
        let mut hidden = vec![0.0; self.hidden_count];
        let mut output = vec![0.0; self.output_count];
        self.forward(input, &mut hidden, &mut output);
        Ok(output)
    }

    fn check_input(&self, input: &[f64]) -> NetworkResult<()> {
        if input.len() != self.input_count {
            return Err(NetworkError::InputSize {
                expected: self.input_count,
                actual: input.len(),
            });
        }
        Ok(())
    }

    fn forward(&self, input: &[f64], hidden: &mut [f64], output: &mut [f64]) {
        for (h, weights) in hidden.iter_mut().zip(&self.hidden_weights) {
            let sum: f64 = weights[0]
                + weights[1..]
                    .iter()
                    .zip(input)
                    .map(|(w, x)| w * x)
                    .sum::<f64>();
            *h = sigmoid(sum);
        }
        for (o, weights) in output.iter_mut().zip(&self.output_weights) {
            let sum: f64 = weights[0]
                + weights[1..]
                    .iter()
                    .zip(hidden.iter())
                    .map(|(w, x)| w * x)
                    .sum::<f64>();
            *o = sigmoid(sum);
        }
    }

    /// Online back-propagation over `inputs` and their `desired` outputs.
    ///
    /// Stops when the mean squared error of an epoch falls below
    /// `max_error`, after `epochs` epochs, or when the monitor asks to.
    pub fn train(
        &mut self,
        inputs: &[Vec<f64>],
        desired: &[Vec<f64>],
        monitor: &mut dyn TrainingMonitor,
    ) -> NetworkResult<TrainingSummary> {
        if inputs.len() != desired.len() {
            return Err(NetworkError::TrainingSet {
                inputs: inputs.len(),
                desired: desired.len(),
            });
        }
        for (input, target) in inputs.iter().zip(desired) {
            self.check_input(input)?;
            if target.len() != self.output_count {
                return Err(NetworkError::InputSize {
                    expected: self.output_count,
                    actual: target.len(),
                });
            }
        }
        if inputs.is_empty() {
            return Ok(TrainingSummary {
                epochs: 0,
                error: 0.0,
                stop: StopReason::NoSamples,
            });
        }

        let TrainingParams {
            learning_rate,
            momentum,
            max_error,
            epochs,
            ..
        } = self.params;

        let mut hidden = vec![0.0; self.hidden_count];
        let mut output = vec![0.0; self.output_count];
        let mut output_gradient = vec![0.0; self.output_count];
        let mut hidden_gradient = vec![0.0; self.hidden_count];
        let mut hidden_delta = vec![vec![0.0; self.input_count + 1]; self.hidden_count];
        let mut output_delta = vec![vec![0.0; self.hidden_count + 1]; self.output_count];

        let mut error = 1.0;
        for epoch in 0..epochs {
            if monitor.should_stop() {
                tracing::info!(epoch, error, "training cancelled");
                return Ok(TrainingSummary {
                    epochs: epoch,
                    error,
                    stop: StopReason::Cancelled,
                });
            }
            monitor.epoch_started(epoch, error);

            let mut squared = 0.0;
            for (index, (input, target)) in inputs.iter().zip(desired).enumerate() {
                self.forward(input, &mut hidden, &mut output);

                for o in 0..self.output_count {
                    let e = target[o] - output[o];
                    squared += e * e;
                    output_gradient[o] = e * output[o] * (1.0 - output[o]);
                }
                for h in 0..self.hidden_count {
                    let back: f64 = (0..self.output_count)
                        .map(|o| output_gradient[o] * self.output_weights[o][h + 1])
                        .sum();
                    hidden_gradient[h] = hidden[h] * (1.0 - hidden[h]) * back;
                }

                for o in 0..self.output_count {
                    for k in 0..=self.hidden_count {
                        let activation = if k == 0 { 1.0 } else { hidden[k - 1] };
                        let delta = learning_rate * output_gradient[o] * activation
                            + momentum * output_delta[o][k];
                        self.output_weights[o][k] += delta;
                        output_delta[o][k] = delta;
                    }
                }
                for h in 0..self.hidden_count {
                    for j in 0..=self.input_count {
                        let activation = if j == 0 { 1.0 } else { input[j - 1] };
                        let delta = learning_rate * hidden_gradient[h] * activation
                            + momentum * hidden_delta[h][j];
                        self.hidden_weights[h][j] += delta;
                        hidden_delta[h][j] = delta;
                    }
                }
                monitor.sample_processed(index);
            }

            error = squared / (inputs.len() * self.output_count) as f64;
            monitor.epoch_ended(epoch, error);
            if error < max_error {
                tracing::info!(epochs = epoch + 1, error, "training converged");
                return Ok(TrainingSummary {
                    epochs: epoch + 1,
                    error,
                    stop: StopReason::Converged,
                });
            }
        }

        tracing::info!(epochs, error, "training reached epoch limit");
        Ok(TrainingSummary {
            epochs,
            error,
            stop: StopReason::EpochLimit,
        })
    }

    // -- persistence -------------------------------------------------------

    /// Write the network as JSON.
    pub fn marshal<W: Write>(&self, writer: W) -> NetworkResult<()> {
        serde_json::to_writer_pretty(writer, self).map_err(|e| NetworkError::Serialization {
            message: e.to_string(),
        })
    }

    /// Read a network written by [`NeuralNetwork::marshal`].
    pub fn unmarshal<R: Read>(mut reader: R) -> NetworkResult<Self> {
        let mut content = String::new();
        reader
            .read_to_string(&mut content)
            .map_err(|e| NetworkError::Serialization {
                message: e.to_string(),
            })?;
        Self::from_json(&content)
    }

    fn from_json(content: &str) -> NetworkResult<Self> {
        let header: Header = serde_json::from_str(content).map_err(|e| NetworkError::Serialization {
            message: e.to_string(),
        })?;
        if header.format_version != FORMAT_VERSION {
            return Err(NetworkError::FormatVersion {
                found: header.format_version,
                supported: FORMAT_VERSION,
            });
        }
        let network: Self = serde_json::from_str(content).map_err(|e| NetworkError::Serialization {
            message: e.to_string(),
        })?;
        network.validate()?;
        Ok(network)
    }

    /// Check that weight matrices agree with the declared topology.
    fn validate(&self) -> NetworkResult<()> {
        let hidden_ok = self.hidden_weights.len() == self.hidden_count
            && self.hidden_weights.iter().all(|w| w.len() == self.input_count + 1);
        let output_ok = self.output_weights.len() == self.output_count
            && self.output_weights.iter().all(|w| w.len() == self.hidden_count + 1);
        if self.input_count == 0 || self.hidden_count == 0 || self.output_count == 0 {
            return Err(NetworkError::Topology {
                message: "empty layer".into(),
            });
        }
        if !hidden_ok || !output_ok {
            return Err(NetworkError::Topology {
                message: format!(
                    "weights do not match {} x {} x {}",
                    self.input_count, self.hidden_count, self.output_count
                ),
            });
        }
        Ok(())
    }

    /// Marshal to a file, replacing it.
    pub fn store(&self, path: &Path) -> NetworkResult<()> {
        let io_err = |e| NetworkError::Io {
            path: path.display().to_string(),
            source: e,
        };
        let file = std::fs::File::create(path).map_err(io_err)?;
        let mut writer = std::io::BufWriter::new(file);
        self.marshal(&mut writer)?;
        writer.flush().map_err(io_err)?;
        tracing::debug!(path = %path.display(), "network stored");
        Ok(())
    }

    /// Unmarshal from a file.
    pub fn load(path: &Path) -> NetworkResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| NetworkError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json(&content)
    }
}
