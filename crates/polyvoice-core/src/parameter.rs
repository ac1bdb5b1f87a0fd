//! Parameter names, parameter maps and the modulation slots attached to them.
//!
//! Base values live in [`SharedParams`], a map of atomics written by the control context and read
//! once per block by the audio thread. Each voice owns a [`ModulationSlots`] instance holding its
//! own internal and external modulation offsets; the two are combined into a [`ModulatedValue`].
use std::borrow::Cow;
use std::marker::PhantomData;
use std::ops;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use portable_atomic::AtomicF32;

pub use polyvoice_derive::ParamName;

/// Parameter ID alias. Useful for type-erasing parameter names and make communication easier.
pub type ParamId = usize;

/// Trait for types that are parameter names.
///
/// This trait is most easily implemented as an enum of all possible parameters, through the
/// [`ParamName`](derive@ParamName) derive macro.
pub trait ParamName: Copy {
    /// Total number of elements in this type
    fn count() -> usize;

    /// Construct a [`Self`] from a [`ParamId`] value. The caller is expected to verify `value <
    /// Self::count()`, and so this method is declared as infallible.
    fn from_id(value: ParamId) -> Self;

    /// Construct a [`ParamId`] from this [`Self`].
    fn into_id(self) -> ParamId;

    /// Return a user-friendly name for this parameter name.
    fn name(&self) -> Cow<'static, str>;

    /// Checked conversion from a raw [`ParamId`].
    fn try_from_id(value: ParamId) -> Option<Self> {
        (value < Self::count()).then(|| Self::from_id(value))
    }

    /// Create an iterator returning all values for this type, that is, all values converted from
    /// IDs in sequence in the range `0..Self::count()`.
    fn iter() -> impl Iterator<Item = Self> {
        (0..Self::count()).map(Self::from_id)
    }
}

/// Specialized map type for storing values associated to parameters.
#[derive(Debug, Clone)]
pub struct ParamMap<P, T> {
    data: Box<[T]>,
    __param: PhantomData<P>,
}

impl<P: ParamName, T: Default> Default for ParamMap<P, T> {
    fn default() -> Self {
        Self::new(|_| T::default())
    }
}

impl<P: ParamName, T> ops::Index<P> for ParamMap<P, T> {
    type Output = T;

    fn index(&self, index: P) -> &Self::Output {
        &self.data[index.into_id()]
    }
}

impl<P: ParamName, T> ops::IndexMut<P> for ParamMap<P, T> {
    fn index_mut(&mut self, index: P) -> &mut Self::Output {
        &mut self.data[index.into_id()]
    }
}

impl<P: ParamName, T> ParamMap<P, T> {
    /// Create a new parameter map, filled in by the provided closure.
    ///
    /// # Arguments
    ///
    /// * `fill_fn`: Closure which is called for each parameter, and returns the associated value.
    ///
    /// returns: ParamMap<P, T>
    pub fn new(fill_fn: impl FnMut(P) -> T) -> Self {
        Self {
            data: P::iter().map(fill_fn).collect(),
            __param: PhantomData,
        }
    }

    /// Iterate over parameters and references to their values.
    pub fn iter(&self) -> impl '_ + Iterator<Item = (P, &T)> {
        self.data
            .iter()
            .enumerate()
            .map(|(i, x)| (P::from_id(i), x))
    }

    /// Overwrite every value with the given one.
    pub fn fill(&mut self, value: T)
    where
        T: Clone,
    {
        self.data.fill(value);
    }
}

/// Base parameter values, shared between the control context and the audio thread.
///
/// Every value is a single atomic `f32`; there is no read-modify-write shared between contexts.
#[derive(Debug)]
pub struct SharedParams<P: ParamName> {
    values: ParamMap<P, AtomicF32>,
}

impl<P: ParamName> SharedParams<P> {
    /// Create a new set of shared parameters, with initial values given by the closure.
    pub fn new(mut initial: impl FnMut(P) -> f32) -> Arc<Self> {
        Arc::new(Self {
            values: ParamMap::new(|p| AtomicF32::new(initial(p))),
        })
    }

    /// Set the base value of a parameter.
    pub fn set(&self, param: P, value: f32) {
        self.values[param].store(value, Ordering::Relaxed);
    }

    /// Set the parameter as a boolean value, such that `value > 0.5` decodes back to the input.
    pub fn set_bool(&self, param: P, value: bool) {
        self.set(param, if value { 1.0 } else { 0.0 });
    }

    /// Read the base value of a parameter.
    pub fn get(&self, param: P) -> f32 {
        self.values[param].load(Ordering::Relaxed)
    }

    /// Read the base value of a parameter as a boolean.
    pub fn get_bool(&self, param: P) -> bool {
        self.get(param) > 0.5
    }
}

/// Resolved modulated value of a parameter at a given point in time.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct ModulatedValue {
    /// Base value, as set by the control context
    pub base: f32,
    /// External (host-driven, per-voice) modulation offset
    pub external: f32,
    /// Internal (envelope, LFO and matrix-driven) modulation offset
    pub internal: f32,
}

impl ModulatedValue {
    /// Effective value of the parameter. Clamping is left to the consumer.
    #[inline]
    pub fn value(&self) -> f32 {
        self.base + self.external + self.internal
    }
}

/// Per-voice modulation offsets.
///
/// Slots are attached once at construction; parameters which aren't attached silently ignore
/// writes to their modulation offsets, and always report zero.
#[derive(Debug, Clone)]
pub struct ModulationSlots<P> {
    attached: ParamMap<P, bool>,
    external: ParamMap<P, f32>,
    internal: ParamMap<P, f32>,
}

impl<P: ParamName> ModulationSlots<P> {
    /// Create new modulation slots, attaching the parameters for which `is_attached` returns true.
    pub fn new(is_attached: impl FnMut(P) -> bool) -> Self {
        Self {
            attached: ParamMap::new(is_attached),
            external: ParamMap::new(|_| 0.0),
            internal: ParamMap::new(|_| 0.0),
        }
    }

    /// Returns true if this parameter has modulation slots attached.
    pub fn is_attached(&self, param: P) -> bool {
        self.attached[param]
    }

    /// Overwrite the external modulation offset. Returns false when the parameter isn't attached.
    pub fn set_external(&mut self, param: P, value: f32) -> bool {
        if !self.attached[param] {
            return false;
        }
        self.external[param] = value;
        true
    }

    /// External modulation offset of this parameter.
    pub fn external(&self, param: P) -> f32 {
        self.external[param]
    }

    /// Internal modulation offset of this parameter.
    pub fn internal(&self, param: P) -> f32 {
        self.internal[param]
    }

    /// Overwrite the internal modulation offset of this parameter.
    pub fn set_internal(&mut self, param: P, value: f32) {
        if self.attached[param] {
            self.internal[param] = value;
        }
    }

    /// Accumulate into the internal modulation offset of this parameter.
    pub fn add_internal(&mut self, param: P, value: f32) {
        if self.attached[param] {
            self.internal[param] += value;
        }
    }

    /// Zero all internal modulation offsets.
    pub fn clear_internal(&mut self) {
        self.internal.fill(0.0);
    }

    /// Zero all modulation offsets.
    pub fn clear(&mut self) {
        self.internal.fill(0.0);
        self.external.fill(0.0);
    }

    /// Combine the given base value with this parameter's offsets.
    #[inline]
    pub fn resolve(&self, param: P, base: f32) -> ModulatedValue {
        ModulatedValue {
            base,
            external: self.external[param],
            internal: self.internal[param],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Copy, Clone, PartialEq, Eq, ParamName)]
    enum TestParams {
        Cutoff,
        #[param_name(display = "Res")]
        Resonance,
        Drive,
    }

    #[test]
    fn derived_ids_round_trip() {
        assert_eq!(3, TestParams::count());
        for (i, p) in TestParams::iter().enumerate() {
            assert_eq!(i, p.into_id());
            assert_eq!(p, TestParams::from_id(i));
        }
        assert_eq!("Res", TestParams::Resonance.name());
        assert_eq!(None, TestParams::try_from_id(3));
    }

    #[test]
    fn shared_params_store_values() {
        let params = SharedParams::new(|p: TestParams| p.into_id() as f32);
        assert_eq!(1.0, params.get(TestParams::Resonance));
        params.set(TestParams::Drive, 0.25);
        assert_eq!(0.25, params.get(TestParams::Drive));
        params.set_bool(TestParams::Cutoff, true);
        assert!(params.get_bool(TestParams::Cutoff));
    }

    #[test]
    fn detached_slots_ignore_writes() {
        let mut slots = ModulationSlots::new(|p| p != TestParams::Drive);
        assert!(!slots.set_external(TestParams::Drive, 1.0));
        slots.add_internal(TestParams::Drive, 1.0);
        assert_eq!(ModulatedValue::default(), slots.resolve(TestParams::Drive, 0.0));

        assert!(slots.set_external(TestParams::Cutoff, 2.0));
        slots.add_internal(TestParams::Cutoff, 0.5);
        slots.add_internal(TestParams::Cutoff, 0.5);
        let value = slots.resolve(TestParams::Cutoff, 1.0);
        assert_eq!(4.0, value.value());

        slots.clear_internal();
        assert_eq!(3.0, slots.resolve(TestParams::Cutoff, 1.0).value());
    }
}
