//! Fused recurrent cells.
//!
//! Both ops take `(src_layer, src_iter, weights_layer, weights_iter, bias)`.
//! Weights are stored input-major (`[features, gates * hidden]`) with the
//! gate columns ordered forget, input, candidate, output. The recurrent state
//! stacks the hidden state on top of the cell state along axis 0; a
//! multi-layer `Rnn` repeats that `[h_l; c_l]` block per layer, earliest
//! layer first, in both its `src_iter` input and its state output.

use std::fmt;

use smallvec::smallvec;
use snafu::ensure;

use crate::error::*;
use crate::ops::OutputTypes;
use crate::shape::{Shape, TensorType, ensure_rank, ensure_same_shape};

/// Gates of an LSTM cell.
pub const LSTM_GATES: usize = 4;

/// Hidden and cell state.
pub const LSTM_CELL_STATES: usize = 2;

/// Attributes of a fused recurrent sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RnnAttrs {
    pub num_timesteps: usize,
    pub num_gates_per_cell: usize,
    pub src_sequence_length: usize,
    pub src_layer_feature_size: usize,
    pub src_iter_feature_size: usize,
    pub num_cell_states: usize,
    /// 1 for unidirectional, 2 for bidirectional.
    pub direction: usize,
    pub num_fused_layers: usize,
}

impl RnnAttrs {
    /// Batch size implied by a `src_layer` with `rows` rows.
    pub fn batch_size(&self, rows: usize) -> usize {
        rows / self.num_timesteps
    }
}

impl fmt::Display for RnnAttrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "timesteps={}, gates={}, seq_len={}, features=({}, {}), cell_states={}, direction={}, layers={}",
            self.num_timesteps,
            self.num_gates_per_cell,
            self.src_sequence_length,
            self.src_layer_feature_size,
            self.src_iter_feature_size,
            self.num_cell_states,
            self.direction,
            self.num_fused_layers
        )
    }
}

fn ensure_float_inputs(op: &'static str, inputs: &[TensorType]) -> Result<()> {
    let dtype = inputs[0].dtype;
    ensure!(dtype.is_float(), InvalidDTypeSnafu { op, dtype });
    for input in &inputs[1..] {
        ensure!(input.dtype == dtype, DTypeMismatchSnafu { op, lhs: dtype, rhs: input.dtype });
    }
    Ok(())
}

pub(crate) fn infer_lstm(inputs: &[TensorType]) -> Result<OutputTypes> {
    let op = "Lstm";
    ensure_float_inputs(op, inputs)?;
    let [src_layer, src_iter, weights_layer, weights_iter, bias] = inputs else {
        unreachable!("arity is checked before inference")
    };
    for input in [src_layer, src_iter, weights_layer, weights_iter] {
        ensure_rank(op, &input.shape, 2)?;
    }

    let batch = src_layer.shape[0];
    let layer_features = src_layer.shape[1];
    let iter_features = src_iter.shape[1];
    let gate_width = weights_layer.shape[1];
    ensure!(
        gate_width % LSTM_GATES == 0 && gate_width > 0,
        InvalidAttributeSnafu { op, reason: format!("weights_layer width {gate_width} is not a multiple of {LSTM_GATES}") }
    );
    let hidden = gate_width / LSTM_GATES;

    ensure_same_shape(op, &[LSTM_CELL_STATES * batch, hidden], &src_iter.shape)?;
    ensure_same_shape(op, &[layer_features, gate_width], &weights_layer.shape)?;
    ensure_same_shape(op, &[iter_features, gate_width], &weights_iter.shape)?;
    ensure_same_shape(op, &[gate_width], &bias.shape)?;

    let dtype = src_layer.dtype;
    Ok(smallvec![
        TensorType::new(dtype, Shape::from_slice(&[batch, hidden])),
        TensorType::new(dtype, Shape::from_slice(&[LSTM_CELL_STATES * batch, hidden])),
    ])
}

pub(crate) fn infer_rnn(attrs: &RnnAttrs, inputs: &[TensorType]) -> Result<OutputTypes> {
    let op = "Rnn";
    ensure_float_inputs(op, inputs)?;
    let invalid = |reason: String| InvalidAttributeSnafu { op, reason };
    ensure!(attrs.num_timesteps > 0, invalid("num_timesteps must be positive".into()));
    ensure!(attrs.num_gates_per_cell > 0, invalid("num_gates_per_cell must be positive".into()));
    ensure!(attrs.num_cell_states > 0, invalid("num_cell_states must be positive".into()));
    ensure!(attrs.num_fused_layers > 0, invalid("num_fused_layers must be positive".into()));
    ensure!(matches!(attrs.direction, 1 | 2), invalid(format!("direction must be 1 or 2, got {}", attrs.direction)));
    ensure!(
        attrs.src_sequence_length == attrs.num_timesteps,
        invalid(format!(
            "sequence length {} differs from num_timesteps {}",
            attrs.src_sequence_length, attrs.num_timesteps
        ))
    );

    let [src_layer, src_iter, weights_layer, weights_iter, bias] = inputs else {
        unreachable!("arity is checked before inference")
    };
    for input in [src_layer, src_iter, weights_layer, weights_iter] {
        ensure_rank(op, &input.shape, 2)?;
    }

    let rows = src_layer.shape[0];
    ensure!(
        rows % attrs.num_timesteps == 0,
        invalid(format!("src_layer has {rows} rows, not divisible into {} timesteps", attrs.num_timesteps))
    );
    let batch = attrs.batch_size(rows);
    let layers = attrs.num_fused_layers;
    let features = attrs.src_iter_feature_size;
    let gate_width = attrs.num_gates_per_cell * features;
    let states = attrs.num_cell_states * attrs.direction * layers * batch;

    ensure_same_shape(op, &[rows, attrs.src_layer_feature_size], &src_layer.shape)?;
    ensure_same_shape(op, &[states, features], &src_iter.shape)?;
    ensure_same_shape(op, &[layers * attrs.src_layer_feature_size, gate_width], &weights_layer.shape)?;
    ensure_same_shape(op, &[layers * features, gate_width], &weights_iter.shape)?;
    ensure_same_shape(op, &[layers * gate_width], &bias.shape)?;

    let dtype = src_layer.dtype;
    Ok(smallvec![
        TensorType::new(dtype, Shape::from_slice(&[rows, features * attrs.direction])),
        TensorType::new(dtype, Shape::from_slice(&[states, features])),
    ])
}
