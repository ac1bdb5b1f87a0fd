//! # Waveshaper
//!
//! Per-voice nonlinear transfer stage. The shaping curve is chosen from [`WaveshaperType`] when a
//! note starts and resolved into a plain function pointer, so the per-sample cost is one indirect
//! call with no matching. Each voice carries a small [`Registers`] bank which curves with memory
//! (the DC-blocked ones) use as state.
//!
//! Unknown type indices resolve to a passthrough.
use std::fmt;

use numeric_literals::replace_float_literals;

use polyvoice_core::math::fast;
use polyvoice_core::util::abs;
use polyvoice_core::Scalar;

/// Number of persistent registers each waveshaper instance holds.
pub const NUM_REGISTERS: usize = 4;

/// Register bank of a waveshaper.
pub type Registers<T> = [T; NUM_REGISTERS];

/// Step function of a waveshaper: updates the registers and returns the shaped sample. The input
/// has the drive already applied.
pub type StepFn<T> = fn(&mut Registers<T>, T) -> T;

/// Available waveshaping curves.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum WaveshaperType {
    /// Smooth symmetric saturation
    Soft,
    /// Overdrive pedal curve: asymmetric with a linear center region
    Ojd,
    /// Hard clip followed by amplitude quantization
    Digital,
    /// Full-wave rectifier, DC blocked
    FullWaveRect,
    /// Triangle wavefolder
    WestcoastFold,
    /// Biased high-gain clipper, DC blocked
    Fuzz,
}

impl WaveshaperType {
    /// All waveshaper types, in index order.
    pub const ALL: [Self; 6] = [
        Self::Soft,
        Self::Ojd,
        Self::Digital,
        Self::FullWaveRect,
        Self::WestcoastFold,
        Self::Fuzz,
    ];

    /// Decode a waveshaper type from its index, as stored in a parameter value.
    pub fn from_index(index: i32) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Index of this type.
    pub fn index(self) -> i32 {
        self as i32
    }

    /// Resolve the step function for this type.
    pub fn step_fn<T: Scalar>(self) -> StepFn<T> {
        match self {
            Self::Soft => soft,
            Self::Ojd => ojd,
            Self::Digital => digital,
            Self::FullWaveRect => full_wave_rect,
            Self::WestcoastFold => westcoast_fold,
            Self::Fuzz => fuzz,
        }
    }
}

/// Waveshaper instance, holding the selected step function and its registers.
#[derive(Copy, Clone)]
pub struct Waveshaper<T> {
    registers: Registers<T>,
    step: StepFn<T>,
    kind: Option<WaveshaperType>,
}

impl<T: fmt::Debug> fmt::Debug for Waveshaper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waveshaper")
            .field("registers", &self.registers)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl<T: Scalar> Default for Waveshaper<T> {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<T: Scalar> Waveshaper<T> {
    /// Create a new waveshaper of the given type; `None` creates a passthrough.
    pub fn new(kind: Option<WaveshaperType>) -> Self {
        Self {
            registers: [T::zero(); NUM_REGISTERS],
            step: kind.map_or(passthrough as StepFn<T>, WaveshaperType::step_fn),
            kind,
        }
    }

    /// Reinitialise the registers and select a new type.
    pub fn init(&mut self, kind: Option<WaveshaperType>) {
        *self = Self::new(kind);
    }

    /// Type currently selected, or `None` for the passthrough.
    pub fn kind(&self) -> Option<WaveshaperType> {
        self.kind
    }

    /// Shape a sample with the given linear drive gain. The passthrough ignores the drive.
    #[inline]
    pub fn process(&mut self, x: T, drive: T) -> T {
        if self.kind.is_none() {
            return x;
        }
        (self.step)(&mut self.registers, x * drive)
    }

    /// Registers of this waveshaper.
    pub fn registers(&self) -> &Registers<T> {
        &self.registers
    }
}

fn passthrough<T: Scalar>(_: &mut Registers<T>, x: T) -> T {
    x
}

/// Leaky-integrator DC blocker over registers 0 (last input) and 1 (last output).
#[replace_float_literals(T::from_f64(literal))]
fn dc_block<T: Scalar>(registers: &mut Registers<T>, x: T) -> T {
    let y = x - registers[0] + 0.995 * registers[1];
    registers[0] = x;
    registers[1] = y;
    y
}

fn soft<T: Scalar>(_: &mut Registers<T>, x: T) -> T {
    fast::tanh(x)
}

#[replace_float_literals(T::from_f64(literal))]
fn ojd<T: Scalar>(_: &mut Registers<T>, x: T) -> T {
    let lower = {
        let u = x + 0.3;
        u + u * u / (4.0 * 0.7) - 0.3
    };
    let upper = {
        let u = x - 0.9;
        u - u * u / (4.0 * 0.1) + 0.9
    };
    let y = x;
    let y = upper.select(x.simd_gt(0.9), y);
    let y = T::one().select(x.simd_ge(1.1), y);
    let y = lower.select(x.simd_lt(-0.3), y);
    (-T::one()).select(x.simd_le(-1.7), y)
}

#[replace_float_literals(T::from_f64(literal))]
fn digital<T: Scalar>(_: &mut Registers<T>, x: T) -> T {
    let clipped = x.simd_clamp(-1.0, 1.0);
    (clipped * 16.0 + 0.5).simd_floor() / 16.0
}

fn full_wave_rect<T: Scalar>(registers: &mut Registers<T>, x: T) -> T {
    dc_block(registers, abs(x))
}

#[replace_float_literals(T::from_f64(literal))]
fn westcoast_fold<T: Scalar>(_: &mut Registers<T>, x: T) -> T {
    let u = (x + 1.0) * 0.25;
    let frac = u - u.simd_floor();
    1.0 - 4.0 * abs(frac - 0.5)
}

#[replace_float_literals(T::from_f64(literal))]
fn fuzz<T: Scalar>(registers: &mut Registers<T>, x: T) -> T {
    let y = fast::tanh(3.0 * x + 0.2) - fast::tanh(0.2);
    dc_block(registers, y)
}
