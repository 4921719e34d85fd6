use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    AudioBands, AudioConfig, FrequencyBandAnalyzer, MotionError, Result, SpectrumAnalyser,
};

/// Thread-safe entry point for the audio capture side.
///
/// A capture thread pushes PCM blocks (or ready-made byte spectra) in, and
/// the tick thread reads the latest band energies through an [`AudioHandle`].
#[derive(Debug, Clone)]
pub struct AudioFeed {
    shared: Arc<Mutex<FeedState>>,
}

#[derive(Debug)]
struct FeedState {
    spectrum: SpectrumAnalyser,
    bands: FrequencyBandAnalyzer,
}

impl AudioFeed {
    pub fn new(config: &AudioConfig) -> Result<Self> {
        let state = FeedState {
            spectrum: SpectrumAnalyser::new(config)?,
            bands: FrequencyBandAnalyzer::new(config)?,
        };
        Ok(Self {
            shared: Arc::new(Mutex::new(state)),
        })
    }

    /// Returns a read-only view for the tick side.
    pub fn handle(&self) -> AudioHandle {
        AudioHandle {
            shared: self.shared.clone(),
        }
    }

    /// Feeds a block of floating point samples and returns the updated bands.
    /// An empty block leaves the analysis untouched.
    pub fn push_samples(&self, samples: &[f32]) -> Result<AudioBands> {
        let mut state = self.lock()?;
        if samples.is_empty() {
            return Ok(state.bands.latest());
        }

        let FeedState { spectrum, bands } = &mut *state;
        let bins = spectrum.process(samples)?;
        Ok(bands.analyze(bins))
    }

    /// Feeds a byte spectrum produced elsewhere, bypassing the FFT stage.
    pub fn push_spectrum(&self, bins: &[u8]) -> Result<AudioBands> {
        let mut state = self.lock()?;
        Ok(state.bands.analyze(bins))
    }

    /// Clears both analysis stages.
    pub fn reset(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.spectrum.reset();
        state.bands.reset();
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, FeedState>> {
        self.shared
            .lock()
            .map_err(|_| MotionError::Poisoned("audio feed"))
    }
}

/// Shared view over the latest analysis held by an [`AudioFeed`].
#[derive(Clone)]
pub struct AudioHandle {
    shared: Arc<Mutex<FeedState>>,
}

impl AudioHandle {
    /// Band energies from the most recent block.
    pub fn latest_bands(&self) -> Result<AudioBands> {
        Ok(self.lock()?.bands.latest())
    }

    /// Copy of the most recent byte spectrum.
    pub fn spectrum(&self) -> Result<Vec<u8>> {
        Ok(self.lock()?.spectrum.bytes().to_vec())
    }

    fn lock(&self) -> Result<MutexGuard<'_, FeedState>> {
        self.shared
            .lock()
            .map_err(|_| MotionError::Poisoned("audio feed"))
    }
}

impl std::fmt::Debug for AudioHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioHandle").finish()
    }
}
