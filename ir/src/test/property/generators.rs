//! Generators for property-based testing.
//!
//! Convolution cases are built constructively: the data extent of every
//! spatial axis is derived from the filter, dilations and padding so that the
//! forward output is never empty, which keeps rejection rates at zero.

use proptest::prelude::*;
use smallvec::SmallVec;

use kiln_dtype::DType;

use crate::ops::convolution::ConvolutionParams;
use crate::shape::{CoordinateDiff, Shape, Strides};

// ============================================================================
// Convolution cases
// ============================================================================

/// One spatial axis of a valid convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvAxisCase {
    pub data: usize,
    pub filter: usize,
    pub movement: usize,
    pub window_dilation: usize,
    pub data_dilation: usize,
    pub padding_below: isize,
    pub padding_above: isize,
}

impl ConvAxisCase {
    /// Output extent by the textbook formula.
    pub fn expected_output(&self) -> usize {
        let dilated = (self.data as isize - 1) * self.data_dilation as isize + 1;
        let padded = dilated + self.padding_below + self.padding_above;
        let dilated_filter = (self.filter as isize - 1) * self.window_dilation as isize + 1;
        ((padded - dilated_filter) / self.movement as isize + 1) as usize
    }
}

/// A valid forward convolution: shapes plus parameters.
#[derive(Debug, Clone)]
pub struct ConvCase {
    pub batch: usize,
    pub input_channels: usize,
    pub output_channels: usize,
    pub axes: Vec<ConvAxisCase>,
}

impl ConvCase {
    pub fn data_shape(&self) -> Shape {
        let mut shape: Shape = SmallVec::from_slice(&[self.batch, self.input_channels]);
        shape.extend(self.axes.iter().map(|axis| axis.data));
        shape
    }

    pub fn filters_shape(&self) -> Shape {
        let mut shape: Shape = SmallVec::from_slice(&[self.output_channels, self.input_channels]);
        shape.extend(self.axes.iter().map(|axis| axis.filter));
        shape
    }

    pub fn expected_output_shape(&self) -> Shape {
        let mut shape: Shape = SmallVec::from_slice(&[self.batch, self.output_channels]);
        shape.extend(self.axes.iter().map(ConvAxisCase::expected_output));
        shape
    }

    pub fn params(&self) -> ConvolutionParams {
        let strides = |f: fn(&ConvAxisCase) -> usize| -> Strides { self.axes.iter().map(f).collect() };
        let padding = |f: fn(&ConvAxisCase) -> isize| -> CoordinateDiff { self.axes.iter().map(f).collect() };
        ConvolutionParams::builder()
            .spatial_rank(self.axes.len())
            .window_movement_strides(strides(|a| a.movement))
            .window_dilation_strides(strides(|a| a.window_dilation))
            .data_dilation_strides(strides(|a| a.data_dilation))
            .padding_below(padding(|a| a.padding_below))
            .padding_above(padding(|a| a.padding_above))
            .build()
    }
}

/// A spatial axis whose padded, dilated input covers the dilated filter.
pub fn arb_conv_axis() -> impl Strategy<Value = ConvAxisCase> {
    (1usize..=4, 1usize..=3, 1usize..=3, 1usize..=3, -2isize..=2, -2isize..=2, 0usize..=4).prop_map(
        |(filter, movement, window_dilation, data_dilation, padding_below, padding_above, extra)| {
            let needed = (filter as isize - 1) * window_dilation as isize - padding_below - padding_above;
            let min_data = if needed <= 0 { 1 } else { (needed as usize).div_ceil(data_dilation) + 1 };
            ConvAxisCase {
                data: min_data + extra,
                filter,
                movement,
                window_dilation,
                data_dilation,
                padding_below,
                padding_above,
            }
        },
    )
}

/// Valid convolutions over 1 to 3 spatial axes.
pub fn arb_conv_case() -> impl Strategy<Value = ConvCase> {
    (1usize..=3, 1usize..=3, 1usize..=3, prop::collection::vec(arb_conv_axis(), 1..=3)).prop_map(
        |(batch, input_channels, output_channels, axes)| ConvCase { batch, input_channels, output_channels, axes },
    )
}

// ============================================================================
// Shapes and types
// ============================================================================

/// Shapes of rank 0 to 4 with small extents.
pub fn arb_shape() -> impl Strategy<Value = Shape> {
    prop::collection::vec(1usize..=5, 0..=4).prop_map(Shape::from_vec)
}

/// Non-empty shapes (rank at least 1).
pub fn arb_ranked_shape() -> impl Strategy<Value = Shape> {
    prop::collection::vec(1usize..=5, 1..=4).prop_map(Shape::from_vec)
}

pub fn arb_float_dtype() -> impl Strategy<Value = DType> {
    DType::float_generator()
}
