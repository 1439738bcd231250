use smallvec::smallvec;
use test_case::test_case;

use kiln_dtype::DType;

use crate::error::Error;
use crate::graph::Graph;
use crate::ops::convolution::{ConvolutionParams, convolution_output_shape};
use crate::shape::{CoordinateDiff, Strides};

fn params_2d(stride: usize, window_dilation: usize, data_dilation: usize, below: isize, above: isize) -> ConvolutionParams {
    ConvolutionParams::builder()
        .spatial_rank(2)
        .window_movement_strides(smallvec![stride; 2])
        .window_dilation_strides(smallvec![window_dilation; 2])
        .data_dilation_strides(smallvec![data_dilation; 2])
        .padding_below(smallvec![below; 2])
        .padding_above(smallvec![above; 2])
        .build()
}

#[test_case(1, 1, 1, 0, 0, 3; "valid")]
#[test_case(2, 1, 1, 1, 1, 3; "strided_same")]
#[test_case(1, 2, 1, 0, 0, 1; "window_dilated")]
#[test_case(1, 1, 2, 0, 0, 7; "data_dilated")]
#[test_case(1, 1, 1, -1, -1, 1; "negative_padding_crops")]
#[test_case(3, 1, 1, 0, 0, 1; "stride_past_edge")]
fn test_forward_output_extent(stride: usize, wd: usize, dd: usize, below: isize, above: isize, extent: usize) {
    let params = params_2d(stride, wd, dd, below, above);
    let shape = convolution_output_shape(&[2, 3, 5, 5], &[4, 3, 3, 3], &params).unwrap();
    assert_eq!(shape.as_slice(), &[2, 4, extent, extent]);
}

#[test]
fn test_builder_defaults_to_unit() {
    let params = ConvolutionParams::unit(3);
    assert_eq!(params.window_movement_strides.as_slice(), &[1, 1, 1]);
    assert_eq!(params.data_dilation_strides.as_slice(), &[1, 1, 1]);
    assert_eq!(params.padding_below.as_slice(), &[0, 0, 0]);
    assert_eq!(params.spatial_rank(), 3);
}

#[test]
fn test_channel_mismatch() {
    let err = convolution_output_shape(&[1, 2, 5, 5], &[1, 3, 3, 3], &ConvolutionParams::unit(2)).unwrap_err();
    assert_eq!(err, Error::ChannelMismatch { op: "Convolution", data_channels: 2, filter_channels: 3 });
}

#[test]
fn test_rank_errors() {
    let err = convolution_output_shape(&[1, 1], &[1, 1], &ConvolutionParams::unit(0)).unwrap_err();
    assert!(matches!(err, Error::RankTooSmall { min: 3, .. }));

    let err = convolution_output_shape(&[1, 1, 5, 5], &[1, 1, 3], &ConvolutionParams::unit(2)).unwrap_err();
    assert!(matches!(err, Error::RankMismatch { expected: 4, .. }));

    let err = convolution_output_shape(&[1, 1, 5, 5], &[1, 1, 3, 3], &ConvolutionParams::unit(1)).unwrap_err();
    assert!(matches!(err, Error::ParameterRankMismatch { expected: 2, actual: 1, .. }));
}

#[test]
fn test_zero_stride_rejected() {
    let params = params_2d(0, 1, 1, 0, 0);
    let err = convolution_output_shape(&[1, 1, 5, 5], &[1, 1, 3, 3], &params).unwrap_err();
    assert!(matches!(err, Error::ZeroStride { parameter: "window movement strides", .. }));
}

#[test]
fn test_filter_larger_than_input_is_non_positive() {
    let err = convolution_output_shape(&[1, 1, 2, 2], &[1, 1, 3, 3], &ConvolutionParams::unit(2)).unwrap_err();
    assert_eq!(err, Error::NonPositiveExtent { op: "Convolution", axis: 0, extent: 0 });
}

#[test]
fn test_padding_cropping_everything_is_non_positive() {
    let params = params_2d(1, 1, 1, -3, -3);
    let err = convolution_output_shape(&[1, 1, 5, 5], &[1, 1, 1, 1], &params).unwrap_err();
    assert!(matches!(err, Error::NonPositiveExtent { extent: -1, .. }));
}

// =============================================================================
// Transposed parameters
// =============================================================================

#[test]
fn test_backprop_data_params() {
    let forward = params_2d(2, 1, 1, 1, 1);
    let backward = forward.backprop_data(&[1, 1, 5, 5], &[1, 1, 3, 3]);
    let ones: Strides = smallvec![1, 1];
    let twos: Strides = smallvec![2, 2];
    let pad: CoordinateDiff = smallvec![1, 1];
    assert_eq!(backward.window_movement_strides, ones);
    assert_eq!(backward.data_dilation_strides, twos);
    assert_eq!(backward.padding_below, pad);
    assert_eq!(backward.padding_above, pad);
}

#[test]
fn test_backprop_data_pads_leftover() {
    // 6 wide, 3 tap filter, stride 2: the last input column is never a window start.
    let forward = ConvolutionParams::builder().spatial_rank(1).window_movement_strides(smallvec![2]).build();
    let backward = forward.backprop_data(&[1, 1, 6], &[1, 1, 3]);
    assert_eq!(backward.padding_below.as_slice(), &[2]);
    assert_eq!(backward.padding_above.as_slice(), &[3]);
}

#[test]
fn test_backprop_filters_params() {
    let forward = params_2d(2, 3, 1, 1, 1);
    let backward = forward.backprop_filters(&[1, 1, 9, 9], &[1, 1, 3, 3]);
    assert_eq!(backward.window_movement_strides.as_slice(), &[3, 3]);
    assert_eq!(backward.window_dilation_strides.as_slice(), &[2, 2]);
    assert_eq!(backward.padding_below.as_slice(), &[1, 1]);
    // span = 1 + 8 + 1 - 6 = 4, even: nothing left over.
    assert_eq!(backward.padding_above.as_slice(), &[1, 1]);
}

// =============================================================================
// Backprop operations
// =============================================================================

#[test]
fn test_backprop_ops_infer_forward_shapes() {
    let mut graph = Graph::new();
    let params = params_2d(2, 1, 1, 1, 0);
    let data = graph.add_parameter(DType::Float32, [2usize, 3, 6, 6]).unwrap();
    let filters = graph.add_parameter(DType::Float32, [4usize, 3, 3, 3]).unwrap();
    let output = graph.convolution(data, filters, params.clone()).unwrap();
    assert_eq!(graph.shape(output).unwrap().as_slice(), &[2, 4, 3, 3]);

    let delta = graph.add_parameter(DType::Float32, [2usize, 4, 3, 3]).unwrap();
    let data_delta = graph.convolution_backprop_data(&[2, 3, 6, 6], filters, delta, params.clone()).unwrap();
    let filters_delta = graph.convolution_backprop_filters(data, &[4, 3, 3, 3], delta, params).unwrap();
    assert_eq!(graph.shape(data_delta).unwrap().as_slice(), &[2, 3, 6, 6]);
    assert_eq!(graph.shape(filters_delta).unwrap().as_slice(), &[4, 3, 3, 3]);
}

#[test]
fn test_backprop_data_rejects_delta_of_other_shape() {
    let mut graph = Graph::new();
    let filters = graph.add_parameter(DType::Float32, [4usize, 3, 3, 3]).unwrap();
    let delta = graph.add_parameter(DType::Float32, [2usize, 4, 2, 2]).unwrap();
    let err = graph.convolution_backprop_data(&[2, 3, 5, 5], filters, delta, ConvolutionParams::unit(2)).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { op: "ConvolutionBackpropData", .. }));
}

#[test]
fn test_convolution_dtype_mismatch() {
    let mut graph = Graph::new();
    let data = graph.add_parameter(DType::Float32, [1usize, 1, 4, 4]).unwrap();
    let filters = graph.add_parameter(DType::Float64, [1usize, 1, 3, 3]).unwrap();
    let err = graph.convolution(data, filters, ConvolutionParams::unit(2)).unwrap_err();
    assert_eq!(err, Error::DTypeMismatch { op: "Convolution", lhs: DType::Float32, rhs: DType::Float64 });
}

#[test]
fn test_params_display() {
    let text = params_2d(2, 1, 1, -1, 0).to_string();
    assert_eq!(text, "strides=[2, 2], dilation=[1, 1], pad=([-1, -1], [0, 0]), data_dilation=[1, 1]");
}
