//! Batched N-dimensional convolution and its two gradient operations.
//!
//! Layouts: the data batch is `[N, Ci, D1..Dk]`, the filters are
//! `[Co, Ci, F1..Fk]` and the result is `[N, Co, O1..Ok]`. For every spatial
//! axis `i`:
//!
//! ```text
//! dilated input   = (D_i - 1) * data_dilation_i + 1
//! padded input    = dilated input + padding_below_i + padding_above_i
//! dilated filter  = (F_i - 1) * window_dilation_i + 1
//! output extent   = floor((padded input - dilated filter) / window_movement_i) + 1
//! ```
//!
//! Padding is signed; a negative value crops the (dilated) input.
//!
//! Both gradients are themselves convolutions over transposed inputs. The
//! gradient ops store the forward parameters and the forward shape they
//! reconstruct, derive the transposed parameters from them, and re-run the
//! generic inference below to check that the transposed convolution produces
//! exactly the forward data (or filter) shape.

use std::fmt;

use bon::bon;
use smallvec::smallvec;
use snafu::ensure;

use crate::error::*;
use crate::shape::{CoordinateDiff, Shape, Strides, TensorType, ensure_same_shape};

/// Per-spatial-axis parameters of a forward convolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConvolutionParams {
    pub window_movement_strides: Strides,
    pub window_dilation_strides: Strides,
    pub padding_below: CoordinateDiff,
    pub padding_above: CoordinateDiff,
    pub data_dilation_strides: Strides,
}

#[bon]
impl ConvolutionParams {
    /// Parameters for `spatial_rank` spatial axes.
    ///
    /// Every omitted parameter defaults to unit strides/dilations and zero
    /// padding.
    #[builder]
    pub fn builder(
        spatial_rank: usize,
        window_movement_strides: Option<Strides>,
        window_dilation_strides: Option<Strides>,
        padding_below: Option<CoordinateDiff>,
        padding_above: Option<CoordinateDiff>,
        data_dilation_strides: Option<Strides>,
    ) -> Self {
        let ones = || -> Strides { smallvec![1; spatial_rank] };
        let zeros = || -> CoordinateDiff { smallvec![0; spatial_rank] };
        Self {
            window_movement_strides: window_movement_strides.unwrap_or_else(ones),
            window_dilation_strides: window_dilation_strides.unwrap_or_else(ones),
            padding_below: padding_below.unwrap_or_else(zeros),
            padding_above: padding_above.unwrap_or_else(zeros),
            data_dilation_strides: data_dilation_strides.unwrap_or_else(ones),
        }
    }

    /// Unit strides and dilations, no padding.
    pub fn unit(spatial_rank: usize) -> Self {
        Self::builder().spatial_rank(spatial_rank).build()
    }

    /// Parameters of the transposed convolution that maps an output delta
    /// back onto the data batch.
    ///
    /// The delta plays the data batch, the filters are read with their
    /// channel axes swapped, and movement and data dilation trade places.
    pub fn backprop_data(&self, data_batch_shape: &[usize], filters_shape: &[usize]) -> Self {
        let spatial = self.spatial_rank();
        let mut padding_below = CoordinateDiff::with_capacity(spatial);
        let mut padding_above = CoordinateDiff::with_capacity(spatial);
        for i in 0..spatial {
            let filter_span = self.dilated_filter_span(filters_shape, i);
            padding_below.push(filter_span - self.padding_below[i]);
            padding_above.push(filter_span + self.leftover(data_batch_shape, filters_shape, i) - self.padding_above[i]);
        }
        Self {
            window_movement_strides: self.data_dilation_strides.clone(),
            window_dilation_strides: self.window_dilation_strides.clone(),
            padding_below,
            padding_above,
            data_dilation_strides: self.window_movement_strides.clone(),
        }
    }

    /// Parameters of the transposed convolution that correlates the data
    /// batch with an output delta to recover the filter gradient.
    ///
    /// Batch and channel axes of the data are swapped, the delta plays the
    /// filters, and movement and window dilation trade places.
    pub fn backprop_filters(&self, data_batch_shape: &[usize], filters_shape: &[usize]) -> Self {
        let padding_above = (0..self.spatial_rank())
            .map(|i| self.padding_above[i] - self.leftover(data_batch_shape, filters_shape, i))
            .collect();
        Self {
            window_movement_strides: self.window_dilation_strides.clone(),
            window_dilation_strides: self.window_movement_strides.clone(),
            padding_below: self.padding_below.clone(),
            padding_above,
            data_dilation_strides: self.data_dilation_strides.clone(),
        }
    }

    pub fn spatial_rank(&self) -> usize {
        self.window_movement_strides.len()
    }

    /// `(F_i - 1) * window_dilation_i`: the reach of the dilated filter past its first tap.
    fn dilated_filter_span(&self, filters_shape: &[usize], axis: usize) -> isize {
        (filters_shape[axis + 2] as isize - 1) * self.window_dilation_strides[axis] as isize
    }

    /// Input positions past the last full window step; the transposed
    /// convolutions pad or crop by this amount to land on the forward shape.
    fn leftover(&self, data_batch_shape: &[usize], filters_shape: &[usize], axis: usize) -> isize {
        let span = self.padding_below[axis]
            + (data_batch_shape[axis + 2] as isize - 1) * self.data_dilation_strides[axis] as isize
            + self.padding_above[axis]
            - self.dilated_filter_span(filters_shape, axis);
        span % self.window_movement_strides[axis] as isize
    }
}

impl fmt::Display for ConvolutionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "strides={:?}, dilation={:?}, pad=({:?}, {:?}), data_dilation={:?}",
            self.window_movement_strides,
            self.window_dilation_strides,
            self.padding_below,
            self.padding_above,
            self.data_dilation_strides
        )
    }
}

/// Which axes of the operands carry batch and channel extents.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConvAxes {
    batch_data: usize,
    channel_data: usize,
    in_channel_filters: usize,
    out_channel_filters: usize,
    batch_result: usize,
    channel_result: usize,
}

impl ConvAxes {
    const FORWARD: Self = Self {
        batch_data: 0,
        channel_data: 1,
        in_channel_filters: 1,
        out_channel_filters: 0,
        batch_result: 0,
        channel_result: 1,
    };

    /// Delta `[N, Co, ..]` as data; filters `[Co, Ci, ..]` contract over `Co`.
    const BACKPROP_DATA: Self = Self {
        batch_data: 0,
        channel_data: 1,
        in_channel_filters: 0,
        out_channel_filters: 1,
        batch_result: 0,
        channel_result: 1,
    };

    /// Data `[N, Ci, ..]` with `N` as channels; delta `[N, Co, ..]` as filters.
    const BACKPROP_FILTERS: Self = Self {
        batch_data: 1,
        channel_data: 0,
        in_channel_filters: 0,
        out_channel_filters: 1,
        batch_result: 1,
        channel_result: 0,
    };
}

/// Output shape of a convolution-shaped computation.
///
/// Spatial axes are always `2..rank` in all three operands.
pub(crate) fn infer_convolution_output_shape(
    op: &'static str,
    data_shape: &[usize],
    filters_shape: &[usize],
    params: &ConvolutionParams,
    axes: ConvAxes,
) -> Result<Shape> {
    let rank = data_shape.len();
    ensure!(rank >= 3, RankTooSmallSnafu { op, min: 3usize, actual: Shape::from(data_shape) });
    ensure!(filters_shape.len() == rank, RankMismatchSnafu { op, expected: rank, actual: Shape::from(filters_shape) });

    let spatial = rank - 2;
    let vectors = [
        ("window movement strides", params.window_movement_strides.len()),
        ("window dilation strides", params.window_dilation_strides.len()),
        ("padding below", params.padding_below.len()),
        ("padding above", params.padding_above.len()),
        ("data dilation strides", params.data_dilation_strides.len()),
    ];
    for (parameter, actual) in vectors {
        ensure!(actual == spatial, ParameterRankMismatchSnafu { op, parameter, expected: spatial, actual });
    }
    for (parameter, values) in [
        ("window movement strides", &params.window_movement_strides),
        ("window dilation strides", &params.window_dilation_strides),
        ("data dilation strides", &params.data_dilation_strides),
    ] {
        ensure!(values.iter().all(|&v| v > 0), ZeroStrideSnafu { op, parameter, values: values.to_vec() });
    }

    let data_channels = data_shape[axes.channel_data];
    let filter_channels = filters_shape[axes.in_channel_filters];
    ensure!(data_channels == filter_channels, ChannelMismatchSnafu { op, data_channels, filter_channels });

    let mut result: Shape = smallvec![0; rank];
    result[axes.batch_result] = data_shape[axes.batch_data];
    result[axes.channel_result] = filters_shape[axes.out_channel_filters];

    for i in 0..spatial {
        let data_extent = data_shape[i + 2] as isize;
        let filter_extent = filters_shape[i + 2] as isize;
        ensure!(data_extent > 0, NonPositiveExtentSnafu { op, axis: i, extent: data_extent });
        ensure!(filter_extent > 0, NonPositiveExtentSnafu { op, axis: i, extent: filter_extent });

        let dilated = (data_extent - 1) * params.data_dilation_strides[i] as isize + 1;
        let padded = dilated + params.padding_below[i] + params.padding_above[i];
        ensure!(padded > 0, NonPositiveExtentSnafu { op, axis: i, extent: padded });

        let dilated_filter = (filter_extent - 1) * params.window_dilation_strides[i] as isize + 1;
        let output = (padded - dilated_filter).div_euclid(params.window_movement_strides[i] as isize) + 1;
        ensure!(output > 0, NonPositiveExtentSnafu { op, axis: i, extent: output });
        result[i + 2] = output as usize;
    }

    Ok(result)
}

pub(crate) fn infer_forward(data: &TensorType, filters: &TensorType, params: &ConvolutionParams) -> Result<TensorType> {
    let op = "Convolution";
    ensure!(data.dtype == filters.dtype, DTypeMismatchSnafu { op, lhs: data.dtype, rhs: filters.dtype });
    let shape = infer_convolution_output_shape(op, &data.shape, &filters.shape, params, ConvAxes::FORWARD)?;
    Ok(TensorType::new(data.dtype, shape))
}

pub(crate) fn infer_backprop_data(
    data_batch_shape: &[usize],
    filters: &TensorType,
    delta: &TensorType,
    forward: &ConvolutionParams,
) -> Result<TensorType> {
    let op = "ConvolutionBackpropData";
    ensure!(filters.dtype == delta.dtype, DTypeMismatchSnafu { op, lhs: filters.dtype, rhs: delta.dtype });

    let forward_output =
        infer_convolution_output_shape(op, data_batch_shape, &filters.shape, forward, ConvAxes::FORWARD)?;
    ensure_same_shape(op, &forward_output, &delta.shape)?;

    let backward = forward.backprop_data(data_batch_shape, &filters.shape);
    let reconstructed =
        infer_convolution_output_shape(op, &delta.shape, &filters.shape, &backward, ConvAxes::BACKPROP_DATA)?;
    ensure!(
        reconstructed.as_slice() == data_batch_shape,
        BackpropInvariantSnafu { op, expected: Shape::from(data_batch_shape), actual: reconstructed }
    );

    Ok(TensorType::new(delta.dtype, Shape::from(data_batch_shape)))
}

pub(crate) fn infer_backprop_filters(
    data: &TensorType,
    filters_shape: &[usize],
    delta: &TensorType,
    forward: &ConvolutionParams,
) -> Result<TensorType> {
    let op = "ConvolutionBackpropFilters";
    ensure!(data.dtype == delta.dtype, DTypeMismatchSnafu { op, lhs: data.dtype, rhs: delta.dtype });

    let forward_output = infer_convolution_output_shape(op, &data.shape, filters_shape, forward, ConvAxes::FORWARD)?;
    ensure_same_shape(op, &forward_output, &delta.shape)?;

    let backward = forward.backprop_filters(&data.shape, filters_shape);
    let reconstructed =
        infer_convolution_output_shape(op, &data.shape, &delta.shape, &backward, ConvAxes::BACKPROP_FILTERS)?;
    ensure!(
        reconstructed.as_slice() == filters_shape,
        BackpropInvariantSnafu { op, expected: Shape::from(filters_shape), actual: reconstructed }
    );

    Ok(TensorType::new(delta.dtype, Shape::from(filters_shape)))
}

/// Forward output shape for `data_batch_shape` convolved with `filters_shape`.
pub fn convolution_output_shape(
    data_batch_shape: &[usize],
    filters_shape: &[usize],
    params: &ConvolutionParams,
) -> Result<Shape> {
    infer_convolution_output_shape("Convolution", data_batch_shape, filters_shape, params, ConvAxes::FORWARD)
}
