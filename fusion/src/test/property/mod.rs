//! Property-based tests for the fusion pipeline.
