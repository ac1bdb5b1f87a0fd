#![warn(missing_docs)]
//! # Saturators
//!
//! This crate provides abstractions over saturators, the standard saturator functions used inside
//! filter feedback paths, and the per-voice [`waveshaper`] stage.
//!
//! Saturators are set up so that their processing and their updating are separate; this allows
//! setting up iterative methods to improve accuracy.
use numeric_literals::replace_float_literals;

use polyvoice_core::math::fast;
use polyvoice_core::Scalar;

pub mod waveshaper;

/// Trait for types which are saturators.
///
/// Saturators are single-sample processors can have state, however the state must be updated after
/// the fact.
#[allow(unused_variables)]
pub trait Saturator<T: Scalar> {
    /// Saturate an input with a frozen state.
    fn saturate(&self, x: T) -> T;

    /// Update the state given an input and the output of [`Self::saturate`] for that input.
    #[inline(always)]
    fn update_state(&mut self, x: T, y: T) {}

    /// Differentiate the saturator at the given input.
    #[inline(always)]
    #[replace_float_literals(T::from_f64(literal))]
    fn sat_diff(&self, x: T) -> T {
        (self.saturate(x + 1e-4) - self.saturate(x)) / 1e-4
    }
}

/// The `tanh` function as a saturator.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Tanh;

#[profiling::all_functions]
impl<S: Scalar> Saturator<S> for Tanh {
    #[inline(always)]
    fn saturate(&self, x: S) -> S {
        fast::tanh(x)
    }

    #[inline(always)]
    #[replace_float_literals(S::from_f64(literal))]
    fn sat_diff(&self, x: S) -> S {
        let tanh = fast::tanh(x);
        1. - tanh * tanh
    }
}

/// Diode-like asymmetric saturator, with a softer negative half.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Diode;

#[profiling::all_functions]
impl<T: Scalar> Saturator<T> for Diode {
    #[inline(always)]
    #[replace_float_literals(T::from_f64(literal))]
    fn saturate(&self, x: T) -> T {
        let pos = fast::tanh(x);
        let neg = 0.5 * fast::tanh(2.0 * x);
        pos.select(x.simd_gt(0.0), neg)
    }
}
