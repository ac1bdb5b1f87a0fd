//! Modulation matrix: routing rows turning block-rate modulation sources into internal
//! modulation offsets.
use polyvoice_core::parameter::ModulationSlots;

use crate::params::Param;

/// Number of rows in the modulation matrix.
pub const NUM_ROUTINGS: usize = 8;

/// Modulation source.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum ModSource {
    /// No source. As a source it disables the row; as a "via" it leaves the source unscaled.
    #[default]
    None,
    /// First voice LFO
    Lfo1,
    /// Second voice LFO
    Lfo2,
    /// Amplitude envelope
    Aeg,
    /// Filter envelope
    Feg,
    /// Note-on velocity
    Velocity,
    /// Note-off velocity
    ReleaseVelocity,
    /// CC 1
    ModWheel,
    /// Polyphonic aftertouch
    PolyAftertouch,
    /// Channel aftertouch
    ChannelAftertouch,
    /// MPE timbre (CC 74)
    MpeTimbre,
    /// MPE channel pressure
    MpePressure,
}

impl ModSource {
    /// All sources, in index order.
    pub const ALL: [Self; 12] = [
        Self::None,
        Self::Lfo1,
        Self::Lfo2,
        Self::Aeg,
        Self::Feg,
        Self::Velocity,
        Self::ReleaseVelocity,
        Self::ModWheel,
        Self::PolyAftertouch,
        Self::ChannelAftertouch,
        Self::MpeTimbre,
        Self::MpePressure,
    ];

    /// Decode a source from its index; unknown indices decode to [`ModSource::None`].
    pub fn from_index(index: i32) -> Self {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .unwrap_or_default()
    }

    /// Index of this source.
    pub fn index(self) -> i32 {
        self as i32
    }
}

/// Current value of every modulation source of a voice.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct ModSourceValues {
    values: [f32; ModSource::ALL.len()],
}

impl ModSourceValues {
    /// Value of a source. [`ModSource::None`] always reads as 0.
    pub fn get(&self, source: ModSource) -> f32 {
        self.values[source as usize]
    }

    /// Update the value of a source. Writes to [`ModSource::None`] are ignored.
    pub fn set(&mut self, source: ModSource, value: f32) {
        if source != ModSource::None {
            self.values[source as usize] = value;
        }
    }
}

/// One routing of the modulation matrix.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct ModRouting {
    /// Modulation source
    pub source: ModSource,
    /// Source scaling the main one; [`ModSource::None`] applies no scaling
    pub via: ModSource,
    /// Target parameter, `None` for no target
    pub target: Option<Param>,
    /// Depth, in units of the target parameter
    pub depth: f32,
}

impl ModRouting {
    /// Returns true if this routing has both a source and a modulatable target.
    pub fn is_active(&self) -> bool {
        self.source != ModSource::None && self.target.is_some_and(Param::is_modulatable)
    }

    /// Modulation amount given the current source values.
    pub fn amount(&self, sources: &ModSourceValues) -> f32 {
        let via = match self.via {
            ModSource::None => 1.0,
            via => sources.get(via),
        };
        sources.get(self.source) * via * self.depth
    }
}

/// Fixed table of modulation routings.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct ModMatrix {
    routings: [ModRouting; NUM_ROUTINGS],
}

impl ModMatrix {
    /// Set a row of the matrix. A non-finite depth is stored as 0. Returns false if the row index
    /// is out of range.
    pub fn set(&mut self, row: usize, routing: ModRouting) -> bool {
        let Some(slot) = self.routings.get_mut(row) else {
            return false;
        };
        *slot = ModRouting {
            depth: if routing.depth.is_finite() {
                routing.depth
            } else {
                0.0
            },
            ..routing
        };
        true
    }

    /// Rows of the matrix.
    pub fn rows(&self) -> &[ModRouting; NUM_ROUTINGS] {
        &self.routings
    }

    /// Accumulate every active routing into the internal modulation slots.
    #[profiling::function]
    pub fn apply(&self, sources: &ModSourceValues, slots: &mut ModulationSlots<Param>) {
        for routing in self.routings.iter().filter(|r| r.is_active()) {
            if let Some(target) = routing.target {
                slots.add_internal(target, routing.amount(sources));
            }
        }
    }
}
