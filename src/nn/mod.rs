//! Learned parameters as validated flat buffers.
//!
//! The core treats network weights as externally trained constants: a
//! `Linear` layer owns a row-major weight matrix plus a bias vector, and a
//! `SharedMlp` chains linear layers with ReLU activations, applied
//! independently to every element of a point set. Evaluation is pure and
//! allocation-free (`forward_into` writes into caller scratch), which keeps
//! repeated inference deterministic and safe to run concurrently over
//! independent inputs.

use crate::util::{VoteBoxError, VoteBoxResult};

/// Fully connected layer with row-major weights.
///
/// `weights[o * in_dim + i]` multiplies input `i` for output `o`.
#[derive(Clone)]
pub struct Linear {
    in_dim: usize,
    out_dim: usize,
    weights: Vec<f32>,
    bias: Vec<f32>,
}

impl Linear {
    /// Creates a layer, validating buffer sizes against the declared shape.
    pub fn new(
        in_dim: usize,
        out_dim: usize,
        weights: Vec<f32>,
        bias: Vec<f32>,
    ) -> VoteBoxResult<Self> {
        if in_dim == 0 || out_dim == 0 {
            return Err(VoteBoxError::InvalidConfig {
                reason: "linear layer dimensions must be > 0",
            });
        }
        let needed = in_dim
            .checked_mul(out_dim)
            .ok_or(VoteBoxError::InvalidConfig {
                reason: "linear layer size overflows",
            })?;
        if weights.len() != needed {
            return Err(VoteBoxError::BufferSizeMismatch {
                needed,
                got: weights.len(),
                context: "linear weights",
            });
        }
        if bias.len() != out_dim {
            return Err(VoteBoxError::BufferSizeMismatch {
                needed: out_dim,
                got: bias.len(),
                context: "linear bias",
            });
        }
        Ok(Self {
            in_dim,
            out_dim,
            weights,
            bias,
        })
    }

    /// Returns the input dimension.
    pub fn in_dim(&self) -> usize {
        self.in_dim
    }

    /// Returns the output dimension.
    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    /// Evaluates the layer into `out`.
    ///
    /// Callers guarantee `input.len() == in_dim` and `out.len() == out_dim`;
    /// both are checked by the constructors of the enclosing modules.
    pub(crate) fn forward_into(&self, input: &[f32], out: &mut [f32]) {
        debug_assert_eq!(input.len(), self.in_dim);
        debug_assert_eq!(out.len(), self.out_dim);
        for (o, slot) in out.iter_mut().enumerate() {
            let row = &self.weights[o * self.in_dim..(o + 1) * self.in_dim];
            let mut acc = self.bias[o];
            for (w, x) in row.iter().zip(input) {
                acc += w * x;
            }
            *slot = acc;
        }
    }
}

/// Stack of linear layers with ReLU after every layer.
///
/// Used as the shared per-point trunk of each pipeline stage; output heads
/// that need raw logits append a separate `Linear` after the trunk.
#[derive(Clone)]
pub struct SharedMlp {
    layers: Vec<Linear>,
    scratch_dim: usize,
}

impl SharedMlp {
    /// Creates a trunk from a non-empty chain of layers.
    ///
    /// Fails if consecutive layers disagree on their shared dimension.
    pub fn new(layers: Vec<Linear>) -> VoteBoxResult<Self> {
        if layers.is_empty() {
            return Err(VoteBoxError::InvalidConfig {
                reason: "mlp must have at least one layer",
            });
        }
        for pair in layers.windows(2) {
            if pair[0].out_dim() != pair[1].in_dim() {
                return Err(VoteBoxError::LayerShapeMismatch {
                    expected: pair[0].out_dim(),
                    got: pair[1].in_dim(),
                    context: "mlp layer chain",
                });
            }
        }
        let widest = layers
            .iter()
            .map(Linear::out_dim)
            .chain(std::iter::once(layers[0].in_dim()))
            .max()
            .unwrap_or(0);
        Ok(Self {
            layers,
            scratch_dim: widest,
        })
    }

    /// Returns the trunk input dimension.
    pub fn in_dim(&self) -> usize {
        self.layers[0].in_dim()
    }

    /// Returns the trunk output dimension.
    pub fn out_dim(&self) -> usize {
        self.layers[self.layers.len() - 1].out_dim()
    }

    /// Returns the scratch length `forward_into` requires (twice the widest
    /// layer, for ping-pong evaluation).
    pub(crate) fn scratch_len(&self) -> usize {
        2 * self.scratch_dim
    }

    /// Evaluates the trunk into `out` using caller-provided scratch.
    pub(crate) fn forward_into(&self, input: &[f32], scratch: &mut [f32], out: &mut [f32]) {
        debug_assert!(scratch.len() >= self.scratch_len());
        debug_assert_eq!(input.len(), self.in_dim());
        debug_assert_eq!(out.len(), self.out_dim());

        let (cur, next) = scratch.split_at_mut(self.scratch_dim);
        let mut cur: &mut [f32] = cur;
        let mut next: &mut [f32] = next;
        cur[..input.len()].copy_from_slice(input);
        let mut cur_len = input.len();

        let last = self.layers.len() - 1;
        for (idx, layer) in self.layers.iter().enumerate() {
            if idx == last {
                layer.forward_into(&cur[..cur_len], out);
                for value in out.iter_mut() {
                    if *value < 0.0 {
                        *value = 0.0;
                    }
                }
            } else {
                let dst = &mut next[..layer.out_dim()];
                layer.forward_into(&cur[..cur_len], dst);
                for value in dst.iter_mut() {
                    if *value < 0.0 {
                        *value = 0.0;
                    }
                }
                cur_len = layer.out_dim();
                std::mem::swap(&mut cur, &mut next);
            }
        }
    }
}
