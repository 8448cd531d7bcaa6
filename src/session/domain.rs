//! Session state: system parameters, the three line collections and the
//! bookkeeping of handed-out transducers.

use std::collections::HashSet;

use crate::common::error::{BftError, BftResult};
use crate::lines::domain::{ApodizationLineCollection, FocusLineCollection};
use crate::transducer::domain::TransducerId;

pub const DEFAULT_SAMPLING_FREQUENCY: f64 = 40e6;
pub const DEFAULT_SOUND_SPEED: f64 = 1540.0;

/// Sampling frequency [Hz] and speed of sound [m/s].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SystemParameters {
    pub sampling_frequency: f64,
    pub sound_speed: f64,
}

impl Default for SystemParameters {
    fn default() -> Self {
        Self {
            sampling_frequency: DEFAULT_SAMPLING_FREQUENCY,
            sound_speed: DEFAULT_SOUND_SPEED,
        }
    }
}

/// Named entries of the parameter table.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Parameter {
    SamplingFrequency,
    SoundSpeed,
}

impl Parameter {
    pub fn lookup(name: &str) -> BftResult<Self> {
        match name {
            "samplingFrequency" | "fs" => Ok(Parameter::SamplingFrequency),
            "soundSpeed" | "c" => Ok(Parameter::SoundSpeed),
            other => Err(BftError::UnknownParameter(other.to_string())),
        }
    }
}

impl SystemParameters {
    pub fn get(&self, param: Parameter) -> f64 {
        match param {
            Parameter::SamplingFrequency => self.sampling_frequency,
            Parameter::SoundSpeed => self.sound_speed,
        }
    }

    pub fn set(&mut self, param: Parameter, value: f64) {
        match param {
            Parameter::SamplingFrequency => self.sampling_frequency = value,
            Parameter::SoundSpeed => self.sound_speed = value,
        }
    }
}

/// Everything owned by an initialized session.
#[derive(Debug)]
pub struct SessionState {
    pub params: SystemParameters,
    pub focus: FocusLineCollection,
    pub apo: ApodizationLineCollection,
    pub sum_apo: ApodizationLineCollection,
    pub transducers: HashSet<TransducerId>,
}

impl SessionState {
    /// Default parameters and one line per collection.
    pub fn new() -> Self {
        Self {
            params: SystemParameters::default(),
            focus: FocusLineCollection::with_lines(1),
            apo: ApodizationLineCollection::with_lines(1),
            sum_apo: ApodizationLineCollection::with_lines(1),
            transducers: HashSet::new(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.focus.len()
    }

    pub fn resize(&mut self, count: usize) {
        self.focus.lines.resize(count);
        self.apo.resize(count);
        self.sum_apo.resize(count);
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
