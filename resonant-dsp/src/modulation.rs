//! Modulation matrix
//!
//! Generators publish values into per-voice *sources*; consumers read the
//! accumulated value of their *destinations* once per control tick. Patches
//! connect one source to any number of destinations, each with its own depth
//! and update stage.
//!
//! Sources and destinations are plain integer ids into per-voice arenas, so
//! units only keep ids and the matrix is passed by reference where needed.

use tracing::debug;

/// Voice index into the matrix
pub type VoiceId = usize;

/// Handle of a modulation source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatchSource {
    pub id: u32,
}

/// Handle of a modulation destination with the patch depth towards it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchDestination {
    pub id: u32,
    /// Update stage the destination is accumulated in
    pub stage: u32,
    /// Multiplier applied to the source value
    pub depth: f32,
}

/// One source routed to one or more destinations
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub source: PatchSource,
    pub destinations: Vec<PatchDestination>,
    pub enabled: bool,
}

impl Patch {
    pub fn new(source: PatchSource, destinations: Vec<PatchDestination>) -> Self {
        Self {
            source,
            destinations,
            enabled: true,
        }
    }

    /// Single-destination patch with an explicit depth
    pub fn single(source: PatchSource, destination: PatchDestination, depth: f32) -> Self {
        Self::new(
            source,
            vec![PatchDestination {
                depth,
                ..destination
            }],
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct DestinationData {
    value: f32,
    dirty: bool,
}

#[derive(Debug, Clone, Default)]
struct VoiceState {
    sources: Vec<f32>,
    destinations: Vec<DestinationData>,
    patches: Vec<Patch>,
}

/// Per-voice routing table
#[derive(Debug, Clone, Default)]
pub struct ModulationMatrix {
    voices: Vec<VoiceState>,
}

impl ModulationMatrix {
    pub fn new(num_voices: usize) -> Self {
        let mut matrix = Self::default();
        matrix.init(num_voices);
        matrix
    }

    /// Drop every source, destination and patch and resize to `num_voices`
    pub fn init(&mut self, num_voices: usize) {
        self.voices = vec![VoiceState::default(); num_voices];
    }

    pub fn num_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn num_sources(&self, voice: VoiceId) -> usize {
        self.voices.get(voice).map_or(0, |v| v.sources.len())
    }

    pub fn num_destinations(&self, voice: VoiceId) -> usize {
        self.voices.get(voice).map_or(0, |v| v.destinations.len())
    }

    pub fn num_patches(&self, voice: VoiceId) -> usize {
        self.voices.get(voice).map_or(0, |v| v.patches.len())
    }

    /// Allocate the next source id of `voice`
    pub fn create_patch_source(&mut self, voice: VoiceId) -> Option<PatchSource> {
        let state = self.voices.get_mut(voice)?;
        let id = state.sources.len() as u32;
        state.sources.push(0.0);
        Some(PatchSource { id })
    }

    /// Allocate the next destination id of `voice`
    pub fn create_patch_destination(
        &mut self,
        voice: VoiceId,
        stage: u32,
        default_depth: f32,
    ) -> Option<PatchDestination> {
        let state = self.voices.get_mut(voice)?;
        let id = state.destinations.len() as u32;
        state.destinations.push(DestinationData::default());
        Some(PatchDestination {
            id,
            stage,
            depth: default_depth,
        })
    }

    /// Publish a source value; returns false for an unknown voice or source
    pub fn set_source_value(&mut self, voice: VoiceId, source: PatchSource, value: f32) -> bool {
        match self
            .voices
            .get_mut(voice)
            .and_then(|v| v.sources.get_mut(source.id as usize))
        {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn source_value(&self, voice: VoiceId, source: PatchSource) -> Option<f32> {
        self.voices
            .get(voice)
            .and_then(|v| v.sources.get(source.id as usize))
            .copied()
    }

    fn is_valid_patch(state: &VoiceState, patch: &Patch) -> bool {
        (patch.source.id as usize) < state.sources.len()
            && !patch.destinations.is_empty()
            && patch
                .destinations
                .iter()
                .all(|d| (d.id as usize) < state.destinations.len())
    }

    /// Register a patch. Unknown voices, sources or destinations are rejected.
    pub fn add_patch(&mut self, voice: VoiceId, patch: Patch) -> bool {
        let Some(state) = self.voices.get_mut(voice) else {
            debug!(voice, "add_patch rejected: unknown voice");
            return false;
        };
        if !Self::is_valid_patch(state, &patch) {
            debug!(voice, source = patch.source.id, "add_patch rejected: invalid ids");
            return false;
        }
        state.patches.push(patch);
        true
    }

    /// Remove the first patch equal to `patch` and reset its destinations
    pub fn remove_patch(&mut self, voice: VoiceId, patch: &Patch) -> bool {
        let Some(state) = self.voices.get_mut(voice) else {
            debug!(voice, "remove_patch rejected: unknown voice");
            return false;
        };
        let Some(index) = state.patches.iter().position(|p| p == patch) else {
            debug!(voice, source = patch.source.id, "remove_patch: no such patch");
            return false;
        };
        let removed = state.patches.remove(index);
        for dest in &removed.destinations {
            if let Some(data) = state.destinations.get_mut(dest.id as usize) {
                *data = DestinationData::default();
            }
        }
        true
    }

    /// Enable or disable every patch driven by `source`
    pub fn set_patch_enabled(&mut self, voice: VoiceId, source: PatchSource, enabled: bool) -> bool {
        let Some(state) = self.voices.get_mut(voice) else {
            return false;
        };
        let mut found = false;
        for patch in state.patches.iter_mut().filter(|p| p.source == source) {
            patch.enabled = enabled;
            found = true;
        }
        found
    }

    pub fn clear_patches(&mut self, voice: VoiceId) {
        if let Some(state) = self.voices.get_mut(voice) {
            state.patches.clear();
            state.destinations.fill(DestinationData::default());
        }
    }

    /// Recompute destination values of `voice` for update `stage`.
    ///
    /// Destinations targeted by any patch are reset first, then every enabled
    /// patch adds `source * depth` to the destinations of the matching stage.
    pub fn update(&mut self, voice: VoiceId, stage: u32) {
        let Some(state) = self.voices.get_mut(voice) else {
            return;
        };

        for patch in &state.patches {
            for dest in &patch.destinations {
                state.destinations[dest.id as usize] = DestinationData::default();
            }
        }

        for patch in state.patches.iter().filter(|p| p.enabled) {
            let source_value = state.sources[patch.source.id as usize];
            for dest in patch.destinations.iter().filter(|d| d.stage == stage) {
                let data = &mut state.destinations[dest.id as usize];
                data.value += source_value * dest.depth;
                data.dirty = true;
            }
        }
    }

    /// Accumulated value, only if the destination was touched by the last update
    pub fn get_destination_value(&self, voice: VoiceId, destination: PatchDestination) -> Option<f32> {
        let data = self
            .voices
            .get(voice)?
            .destinations
            .get(destination.id as usize)?;
        data.dirty.then_some(data.value)
    }
}
