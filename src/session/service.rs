//! The beamforming session: lifecycle, parameters, line collections and the
//! entry points that dispatch into beamforming, image combination and
//! resampling.
//!
//! Every operation other than [`BeamformingSession::initialize`] and
//! [`BeamformingSession::teardown`] first makes sure the session is
//! initialized, using the default sink and no banner.

use crate::beamform::service as beamform_service;
use crate::beamform::Transmit;
use crate::common::buf::Image;
use crate::common::config::ToolboxCfg;
use crate::common::error::{self, BftError, BftResult};
use crate::common::log::{MessageSink, Messenger};
use crate::image::service as image_service;
use crate::kernels::{BeamKernels, DirectKernels};
use crate::lines::domain::{ApodizationLine, DynamicFocus, FocusLine};
use crate::resample::domain::{DelayFraming, FilterBank, ResampleMethod};
use crate::resample::service as resample_service;
use crate::transducer::domain::{Point3D, Transducer};

use super::domain::{Parameter, SessionState, SystemParameters};

const START_BANNER: [&str; 7] = [
    "**************************************************************\n",
    "*                                                            *\n",
    "*               Beamforming  Toolbox                         *\n",
    "*                                                            *\n",
    "*      Session layer for focusing, apodization and           *\n",
    "*      delay-line resampling                                 *\n",
    "**************************************************************\n",
];

const EXIT_BANNER: [&str; 3] = [
    "**************************************************************\n",
    "*       Exiting the Beamforming Toolbox                      *\n",
    "**************************************************************\n",
];

static DIRECT: DirectKernels = DirectKernels;

/// Beamforming session owning the system parameters and the three line
/// collections.
pub struct BeamformingSession {
    state: Option<SessionState>,
    messenger: Messenger,
    quiet: bool,
    kernels: Option<Box<dyn BeamKernels + Send>>,
}

impl BeamformingSession {
    /// Uninitialized session using [`DirectKernels`].
    pub const fn new() -> Self {
        Self {
            state: None,
            messenger: Messenger::new(),
            quiet: false,
            kernels: None,
        }
    }

    /// Session dispatching to custom kernels.
    pub fn with_kernels(kernels: Box<dyn BeamKernels + Send>) -> Self {
        Self {
            kernels: Some(kernels),
            ..Self::new()
        }
    }

    pub fn messenger(&self) -> &Messenger {
        &self.messenger
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Install the message sink and start from a fresh state: default
    /// parameters and one line in every collection. An initialized session
    /// is torn down first.
    pub fn initialize(&mut self, sink: Option<MessageSink>, suppress_banner: bool) {
        let cfg = ToolboxCfg::load();
        self.messenger.set_sink(sink);
        self.messenger.set_max_line_len(cfg.max_line_len);
        self.quiet = cfg.quiet;

        if self.state.is_some() {
            self.teardown();
        }
        if !suppress_banner && !self.quiet {
            self.messenger.banner(&START_BANNER);
        }

        self.state = Some(SessionState::new());
        error::install_fault_observer();
        tracing::debug!(
            max_line_len = self.messenger.max_line_len(),
            quiet = self.quiet,
            "beamforming session initialized"
        );
    }

    /// Release all collections and forget tracked transducers. Calling it on
    /// an uninitialized session does nothing.
    pub fn teardown(&mut self) {
        let Some(state) = self.state.take() else {
            return;
        };
        if !state.transducers.is_empty() {
            tracing::warn!(open = state.transducers.len(), "detaching transducers still open");
        }
        drop(state);
        if !self.quiet {
            self.messenger.banner(&EXIT_BANNER);
        }
        tracing::debug!("beamforming session torn down");
    }

    /// Initialize with the default sink and no banner unless already
    /// initialized.
    pub fn ensure_initialized(&mut self) {
        if self.state.is_none() {
            self.initialize(None, true);
        }
    }

    fn state_mut(&mut self) -> &mut SessionState {
        self.ensure_initialized();
        self.state.get_or_insert_with(SessionState::new)
    }

    /// State and kernels borrowed together for the dispatching operations.
    fn parts(&mut self) -> (&mut SessionState, &dyn BeamKernels) {
        self.ensure_initialized();
        let kernels: &dyn BeamKernels = match &self.kernels {
            Some(kernels) => &**kernels,
            None => &DIRECT,
        };
        (self.state.get_or_insert_with(SessionState::new), kernels)
    }

    /// Set a named system parameter and return the applied value. Unknown
    /// names leave the parameters untouched.
    pub fn set_parameter(&mut self, name: &str, value: f64) -> BftResult<f64> {
        self.ensure_initialized();
        let param = match Parameter::lookup(name) {
            Ok(param) => param,
            Err(err) => {
                self.messenger
                    .diag("set_parameter", &format!("Could not find argument {name}"));
                return Err(err);
            }
        };
        self.state_mut().params.set(param, value);
        tracing::debug!(?param, value, "parameter set");
        Ok(value)
    }

    pub fn parameters(&mut self) -> SystemParameters {
        self.state_mut().params
    }

    /// Resize all three collections to `count` lines.
    pub fn set_line_count(&mut self, count: usize) -> usize {
        self.state_mut().resize(count);
        tracing::debug!(count, "line count set");
        count
    }

    /// Line counts of the focus, apodization and summation-apodization
    /// collections.
    pub fn line_counts(&mut self) -> (usize, usize, usize) {
        let state = self.state_mut();
        (state.focus.len(), state.apo.len(), state.sum_apo.len())
    }

    pub fn focus_line(&mut self, line: usize) -> BftResult<&FocusLine> {
        self.state_mut().focus.lines.get(line)
    }

    pub fn apodization_line(&mut self, line: usize) -> BftResult<&ApodizationLine> {
        self.state_mut().apo.get(line)
    }

    pub fn sum_apodization_line(&mut self, line: usize) -> BftResult<&ApodizationLine> {
        self.state_mut().sum_apo.get(line)
    }

    pub fn filter_bank(&mut self) -> Option<&FilterBank> {
        self.state_mut().focus.filter_bank.as_ref()
    }

    /// Transducers created through this session and not yet released.
    pub fn open_transducers(&mut self) -> usize {
        self.state_mut().transducers.len()
    }

    pub fn create_transducer(&mut self, centers: &[f64], elements: usize) -> BftResult<Transducer> {
        let xdc = Transducer::new(centers, elements)?;
        self.track(&xdc);
        tracing::debug!(id = xdc.id().raw(), elements, "transducer created");
        Ok(xdc)
    }

    /// Start tracking a transducer built by other means.
    pub fn track(&mut self, xdc: &Transducer) {
        self.state_mut().transducers.insert(xdc.id());
    }

    pub fn release_transducer(&mut self, xdc: Transducer) {
        self.state_mut().transducers.remove(&xdc.id());
    }

    pub fn replace_element_centers(
        &mut self,
        xdc: &mut Transducer,
        centers: &[f64],
        elements: usize,
    ) -> BftResult<()> {
        self.state_mut();
        xdc.replace_centers(centers, elements)
    }

    pub fn set_center_focus(&mut self, point: Point3D, line: usize) -> BftResult<()> {
        self.state_mut().focus.lines.get_mut(line)?.set_center(point);
        Ok(())
    }

    /// Focal points valid from the matching entry of `times` on.
    pub fn set_focus(
        &mut self,
        xdc: &Transducer,
        times: &[f64],
        points: &[f64],
        line: usize,
    ) -> BftResult<()> {
        let points = Point3D::from_flat(points, times.len())?;
        self.state_mut()
            .focus
            .lines
            .get_mut(line)?
            .set_points(xdc, times, points)
    }

    /// Pixel mode: the line yields one sample per point.
    pub fn set_focus_pixel(&mut self, xdc: &Transducer, points: &[f64], line: usize) -> BftResult<()> {
        if points.len() % 3 != 0 {
            return Err(BftError::invalid("pixel coordinates must come in triplets"));
        }
        let points = Point3D::from_flat(points, points.len() / 3)?;
        self.state_mut().focus.lines.get_mut(line)?.set_pixels(xdc, points);
        Ok(())
    }

    /// Explicit delays, one row of element delays per entry of `times`.
    pub fn set_focus_times(
        &mut self,
        xdc: &Transducer,
        times: &[f64],
        delays: &[f64],
        line: usize,
    ) -> BftResult<()> {
        self.state_mut()
            .focus
            .lines
            .get_mut(line)?
            .set_delays(xdc, times, delays)
    }

    /// Two-way focusing delays; stored like [`Self::set_focus_times`].
    pub fn set_focus_2way(
        &mut self,
        xdc: &Transducer,
        times: &[f64],
        delays: &[f64],
        line: usize,
    ) -> BftResult<()> {
        self.set_focus_times(xdc, times, delays, line)
    }

    pub fn set_dynamic_focus(
        &mut self,
        xdc: &Transducer,
        line: usize,
        dir_xz: f64,
        dir_yz: f64,
    ) -> BftResult<()> {
        self.state_mut()
            .focus
            .lines
            .get_mut(line)?
            .set_dynamic(xdc, DynamicFocus { dir_xz, dir_yz });
        Ok(())
    }

    pub fn set_apodization(
        &mut self,
        xdc: &Transducer,
        times: &[f64],
        weights: &[f64],
        line: usize,
    ) -> BftResult<()> {
        self.state_mut().apo.get_mut(line)?.set(xdc, times, weights)
    }

    /// Apodization used when adding a low-resolution image into a
    /// high-resolution one.
    pub fn set_sum_apodization(
        &mut self,
        xdc: &Transducer,
        times: &[f64],
        weights: &[f64],
        line: usize,
    ) -> BftResult<()> {
        self.state_mut().sum_apo.get_mut(line)?.set(xdc, times, weights)
    }

    pub fn attach_filter_bank(&mut self, coefficients: &[f64], banks: usize, taps: usize) -> BftResult<()> {
        let bank = FilterBank::new(coefficients, banks, taps)?;
        self.state_mut().focus.filter_bank = Some(bank);
        Ok(())
    }

    pub fn beamform(
        &mut self,
        rf: &[f64],
        start_time: f64,
        samples: usize,
        elements: usize,
        transmit: Transmit,
    ) -> BftResult<Image> {
        let (state, kernels) = self.parts();
        beamform_service::beamform(state, kernels, rf, start_time, samples, elements, transmit)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn sum_images(
        &mut self,
        data1: &[f64],
        element1: usize,
        data2: &[f64],
        element2: usize,
        start_time: f64,
        samples: usize,
    ) -> BftResult<Image> {
        let (state, kernels) = self.parts();
        image_service::sum_images(state, kernels, data1, element1, data2, element2, start_time, samples)
    }

    pub fn add_images(
        &mut self,
        hi_res: &mut [f64],
        lo_res: &[f64],
        samples: usize,
        start_time: f64,
        element: usize,
    ) -> BftResult<()> {
        let (state, kernels) = self.parts();
        image_service::add_images(state, kernels, hi_res, lo_res, samples, start_time, element)
    }

    pub fn sub_images(
        &mut self,
        hi_res: &mut [f64],
        lo_res: &[f64],
        samples: usize,
        start_time: f64,
        element: usize,
    ) -> BftResult<()> {
        let (state, kernels) = self.parts();
        image_service::sub_images(state, kernels, hi_res, lo_res, samples, start_time, element)
    }

    pub fn delay(
        &mut self,
        src: &[f64],
        times: &[f64],
        delays: &[f64],
        framing: DelayFraming,
        method: ResampleMethod,
    ) -> BftResult<Vec<f64>> {
        let (state, kernels) = self.parts();
        resample_service::delay(state, kernels, src, times, delays, framing, method)
    }
}

impl Default for BeamformingSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn captured() -> (BeamformingSession, Arc<Mutex<Vec<String>>>) {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink_lines = lines.clone();
        let mut session = BeamformingSession::new();
        session.initialize(
            Some(Arc::new(move |line: &str| {
                sink_lines.lock().unwrap().push(line.to_string());
            })),
            true,
        );
        (session, lines)
    }

    #[test]
    fn operations_initialize_lazily() {
        let mut session = BeamformingSession::new();
        assert!(!session.is_initialized());
        assert_eq!(session.line_counts(), (1, 1, 1));
        assert!(session.is_initialized());
    }

    #[test]
    fn unknown_parameter_still_initializes() {
        let mut session = BeamformingSession::new();
        assert!(session.set_parameter("bogus", 5.0).is_err());
        assert!(session.is_initialized());
        assert_eq!(session.parameters(), SystemParameters::default());
    }

    #[test]
    fn line_count_is_synchronized() {
        let (mut session, _) = captured();
        assert_eq!(session.set_line_count(4), 4);
        assert_eq!(session.line_counts(), (4, 4, 4));
        for n in [0, 1, 9, 2] {
            session.set_line_count(n);
            assert_eq!(session.line_counts(), (n, n, n));
        }
    }

    #[test]
    fn set_parameter_applies_known_names_only() {
        let (mut session, lines) = captured();
        assert_eq!(session.set_parameter("soundSpeed", 1500.0), Ok(1500.0));
        assert_eq!(
            session.set_parameter("bogus", 5.0),
            Err(BftError::UnknownParameter("bogus".into()))
        );
        assert_eq!(session.parameters().sound_speed, 1500.0);
        assert!(lines
            .lock()
            .unwrap()
            .iter()
            .any(|l| l.contains("Could not find argument bogus")));
    }

    #[test]
    fn teardown_twice_is_a_no_op() {
        let (mut session, lines) = captured();
        session.teardown();
        let after_first = lines.lock().unwrap().len();
        assert!(!session.is_initialized());
        session.teardown();
        assert!(!session.is_initialized());
        assert_eq!(lines.lock().unwrap().len(), after_first);
    }

    #[test]
    fn reinitialize_resets_state() {
        let (mut session, _) = captured();
        session.set_line_count(5);
        session.set_parameter("fs", 100e6).unwrap();
        session.attach_filter_bank(&[1.0], 1, 1).unwrap();
        session.initialize(None, true);
        assert_eq!(session.line_counts(), (1, 1, 1));
        assert_eq!(session.parameters(), SystemParameters::default());
        assert!(session.filter_bank().is_none());
    }

    #[test]
    fn teardown_detaches_but_does_not_free_transducers() {
        let (mut session, _) = captured();
        let xdc = session.create_transducer(&[0.0; 6], 2).unwrap();
        assert_eq!(session.open_transducers(), 1);
        session.teardown();
        assert_eq!(session.open_transducers(), 0);
        assert_eq!(xdc.elements(), 2);
        session.release_transducer(xdc);
    }

    #[test]
    fn release_forgets_transducer() {
        let (mut session, _) = captured();
        let xdc = session.create_transducer(&[0.0; 3], 1).unwrap();
        session.release_transducer(xdc);
        assert_eq!(session.open_transducers(), 0);
    }

    #[test]
    fn setters_reject_out_of_range_lines() {
        let (mut session, _) = captured();
        let xdc = Transducer::linear_array(2, 1e-3);
        session.set_line_count(2);
        assert_eq!(
            session.set_apodization(&xdc, &[0.0], &[1.0, 1.0], 2),
            Err(BftError::LineOutOfRange { index: 2, count: 2 })
        );
        assert!(session.set_center_focus(Point3D::default(), 5).is_err());
        assert!(session.set_dynamic_focus(&xdc, 3, 0.0, 0.0).is_err());
    }

    #[test]
    fn sum_apodization_goes_to_its_own_collection() {
        let (mut session, _) = captured();
        let xdc = Transducer::linear_array(2, 1e-3);
        session.set_sum_apodization(&xdc, &[0.0], &[0.5, 0.5], 0).unwrap();
        assert!(session.sum_apodization_line(0).unwrap().is_set());
        assert!(!session.apodization_line(0).unwrap().is_set());
    }

    #[test]
    fn focus_pixel_records_sample_count() {
        let (mut session, _) = captured();
        let xdc = Transducer::linear_array(4, 1e-3);
        session
            .set_focus_pixel(&xdc, &[0.0, 0.0, 0.01, 0.0, 0.0, 0.02], 0)
            .unwrap();
        let line = session.focus_line(0).unwrap();
        assert!(line.is_pixel());
        assert_eq!(line.sample_count(), 2);
        assert!(session.set_focus_pixel(&xdc, &[0.0; 4], 0).is_err());
    }

    #[test]
    fn set_focus_reads_point_triplets() {
        let (mut session, _) = captured();
        let xdc = Transducer::linear_array(2, 1e-3);
        session
            .set_focus(&xdc, &[0.0, 1e-5], &[0.0, 0.0, 0.02, 0.0, 0.0, 0.04], 0)
            .unwrap();
        assert_eq!(session.focus_line(0).unwrap().sample_count(), 2);
        assert!(session.set_focus(&xdc, &[0.0], &[0.0; 6], 0).is_err());
    }

    #[test]
    fn filter_bank_is_validated() {
        let (mut session, _) = captured();
        assert!(session.attach_filter_bank(&[0.5; 5], 2, 3).is_err());
        assert!(session.filter_bank().is_none());
        session.attach_filter_bank(&[0.5; 6], 2, 3).unwrap();
        assert_eq!(session.filter_bank().unwrap().banks(), 2);
    }

    #[test]
    fn beamform_returns_one_row_per_line() {
        let (mut session, _) = captured();
        let centers = [
            -1.5e-3, 0.0, 0.0, -0.5e-3, 0.0, 0.0, 0.5e-3, 0.0, 0.0, 1.5e-3, 0.0, 0.0,
        ];
        let xdc = session.create_transducer(&centers, 4).unwrap();
        session.set_line_count(3);
        for line in 0..3 {
            session.set_dynamic_focus(&xdc, line, 0.0, 0.0).unwrap();
        }
        let rf = vec![0.25; 4 * 32];
        let image = session.beamform(&rf, 1e-6, 32, 4, Transmit::None).unwrap();
        assert_eq!(image.lines(), 3);
        assert_eq!(image.samples(), 32);
        session.release_transducer(xdc);
    }

    #[test]
    fn pixel_line_overrides_requested_samples() {
        let (mut session, _) = captured();
        let xdc = Transducer::linear_array(4, 3e-4);
        let pixels: Vec<f64> = (0..7).flat_map(|i| [0.0, 0.0, 0.01 + i as f64 * 1e-3]).collect();
        session.set_focus_pixel(&xdc, &pixels, 0).unwrap();
        for samples in [16, 128] {
            let rf = vec![1.0; 4 * samples];
            let image = session.beamform(&rf, 0.0, samples, 4, Transmit::None).unwrap();
            assert_eq!((image.lines(), image.samples()), (1, 7));
        }
    }

    #[test]
    fn linear_delay_identity() {
        let (mut session, _) = captured();
        let framing = DelayFraming {
            src_start_time: 0.0,
            dest_start_time: 0.0,
            dest_len: 4,
        };
        let out = session
            .delay(
                &[0.0, 1.0, 2.0, 3.0],
                &[0.0, 1.0, 2.0, 3.0],
                &[0.0; 4],
                framing,
                ResampleMethod::Linear,
            )
            .unwrap();
        assert_eq!(out, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn zero_sampling_frequency_does_not_break_delay() {
        let (mut session, _) = captured();
        session.set_parameter("samplingFrequency", 0.0).unwrap();
        let framing = DelayFraming {
            src_start_time: 0.0,
            dest_start_time: 0.0,
            dest_len: 4,
        };
        for method in [ResampleMethod::Linear, ResampleMethod::FilterBank] {
            session.attach_filter_bank(&[1.0], 1, 1).unwrap();
            let out = session
                .delay(&[0.0, 1.0, 2.0, 3.0], &[0.0, 1.0], &[0.0, 0.0], framing, method)
                .unwrap();
            assert_eq!(out.len(), 4);
            assert!(out.iter().all(|v| v.is_finite()), "{out:?}");
        }
    }

    #[test]
    fn nan_start_time_reads_silence() {
        let (mut session, _) = captured();
        session.attach_filter_bank(&[1.0], 1, 1).unwrap();
        let framing = DelayFraming {
            src_start_time: 0.0,
            dest_start_time: f64::NAN,
            dest_len: 3,
        };
        for method in [ResampleMethod::Linear, ResampleMethod::FilterBank] {
            let out = session
                .delay(&[1.0, 2.0, 3.0], &[0.0], &[0.0], framing, method)
                .unwrap();
            assert_eq!(out, vec![0.0; 3]);
        }
    }

    #[test]
    fn custom_kernels_are_used() {
        struct Constant;
        impl BeamKernels for Constant {
            fn beamform_line(
                &self,
                _: &SystemParameters,
                _: &FocusLine,
                _: &ApodizationLine,
                _: &crate::common::buf::Frame<'_>,
                _: f64,
                _: Option<Point3D>,
                out: &mut [f64],
            ) -> BftResult<()> {
                out.fill(7.0);
                Ok(())
            }
            fn sum_lines(
                &self,
                _: &SystemParameters,
                _: &ApodizationLine,
                _: &[f64],
                _: usize,
                _: &[f64],
                _: usize,
                _: f64,
                _: &mut [f64],
            ) {
            }
            fn accumulate_line(
                &self,
                _: &SystemParameters,
                _: &ApodizationLine,
                _: &mut [f64],
                _: &[f64],
                _: usize,
                _: f64,
                _: f64,
            ) {
            }
            fn delay_filter(
                &self,
                _: &SystemParameters,
                _: &FilterBank,
                _: &crate::resample::domain::DelayTable<'_>,
                _: &[f64],
                framing: &DelayFraming,
            ) -> Vec<f64> {
                vec![0.0; framing.dest_len]
            }
            fn delay_linear(
                &self,
                _: &SystemParameters,
                _: &crate::resample::domain::DelayTable<'_>,
                _: &[f64],
                framing: &DelayFraming,
            ) -> Vec<f64> {
                vec![0.0; framing.dest_len]
            }
        }

        let mut session = BeamformingSession::with_kernels(Box::new(Constant));
        let image = session.beamform(&[0.0; 4], 0.0, 2, 2, Transmit::None).unwrap();
        assert_eq!(image.as_slice(), &[7.0, 7.0]);
    }
}
