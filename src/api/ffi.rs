//! C-compatible API exposed to the scripting front-ends.
//!
//! Every entry point works on one process-wide [`BeamformingSession`].
//! Sample buffers returned here belong to the caller and go back through
//! [`bft_free_mem`]; transducer handles go back through [`bft_xdc_free`].
//! Apart from an unknown parameter name, every error is fatal: the
//! diagnostic reaches the message sink and the process aborts.

use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::slice;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::api::buffers;
use crate::beamform::Transmit;
use crate::common::buf::checked_len;
use crate::common::error::{self, BftError, BftResult};
use crate::common::log::MessageSink;
use crate::resample::domain::{DelayFraming, ResampleMethod};
use crate::session::BeamformingSession;
use crate::transducer::domain::{Point3D, Transducer};

/// ABI version of the `bft_*` surface.
pub const API_VERSION: u32 = 1;

/// Message callback supplied by the host, one NUL-terminated line per call.
pub type BftMsgFunc = Option<extern "C" fn(*const c_char)>;

static SESSION: Mutex<BeamformingSession> = Mutex::new(BeamformingSession::new());

fn session() -> MutexGuard<'static, BeamformingSession> {
    SESSION.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run `op` on the global session; any error ends the process.
fn with_session<T>(func: &str, op: impl FnOnce(&mut BeamformingSession) -> BftResult<T>) -> T {
    let mut session = session();
    match op(&mut session) {
        Ok(value) => value,
        Err(err) => error::fatal(session.messenger(), func, &err),
    }
}

fn host_sink(func: extern "C" fn(*const c_char)) -> MessageSink {
    Arc::new(move |line: &str| {
        let text = CString::new(line.replace('\0', "")).unwrap_or_default();
        func(text.as_ptr());
    })
}

/// # Safety
/// A non-null `ptr` must be valid for `len` reads for the duration of the call.
unsafe fn doubles<'a>(ptr: *const f64, len: usize, what: &'static str) -> BftResult<&'a [f64]> {
    if ptr.is_null() {
        return if len == 0 {
            Ok(&[])
        } else {
            Err(BftError::NullPointer(what))
        };
    }
    Ok(slice::from_raw_parts(ptr, len))
}

/// # Safety
/// A non-null `ptr` must be valid for `len` writes and not aliased.
unsafe fn doubles_mut<'a>(ptr: *mut f64, len: usize, what: &'static str) -> BftResult<&'a mut [f64]> {
    if ptr.is_null() {
        return if len == 0 {
            Ok(&mut [])
        } else {
            Err(BftError::NullPointer(what))
        };
    }
    Ok(slice::from_raw_parts_mut(ptr, len))
}

/// # Safety
/// `ptr` must be null or point at three readable doubles.
unsafe fn point(ptr: *const f64, what: &'static str) -> BftResult<Point3D> {
    if ptr.is_null() {
        return Err(BftError::NullPointer(what));
    }
    let c = doubles(ptr, 3, what)?;
    Ok(Point3D::new(c[0], c[1], c[2]))
}

/// # Safety
/// `xdc` must be null or a handle returned by [`bft_xdc`] and not yet freed.
unsafe fn transducer<'a>(xdc: *const Transducer) -> BftResult<&'a Transducer> {
    xdc.as_ref().ok_or(BftError::NullPointer("transducer"))
}

fn to_u32(value: usize, what: &str) -> BftResult<u32> {
    u32::try_from(value).map_err(|_| BftError::invalid(format!("{what} {value} exceeds u32")))
}

#[no_mangle]
pub extern "C" fn bft_api_version() -> u32 {
    API_VERSION
}

/// Start (or restart) the toolbox. `msg` may be null to print to stdout.
#[no_mangle]
pub extern "C" fn bft_init(msg: BftMsgFunc, suppress: u32) {
    session().initialize(msg.map(host_sink), suppress != 0);
}

#[no_mangle]
pub extern "C" fn bft_end() {
    session().teardown();
}

/// Set a system parameter. Returns `val`, or `-val` when the name is not
/// recognised.
#[no_mangle]
pub extern "C" fn bft_param(id: *const c_char, val: f64) -> f64 {
    let mut session = session();
    session.ensure_initialized();
    if id.is_null() {
        session.messenger().diag("bft_param", "Found null pointer");
        return -val;
    }
    let name = unsafe { CStr::from_ptr(id) }.to_string_lossy();
    session.set_parameter(&name, val).unwrap_or(-val)
}

#[no_mangle]
pub extern "C" fn bft_no_lines(no_lines: u32) -> u32 {
    session().set_line_count(no_lines as usize);
    no_lines
}

/// Create a transducer from `nelem` element centers (`3 * nelem` doubles).
#[no_mangle]
pub extern "C" fn bft_xdc(centers: *const f64, nelem: u32) -> *mut Transducer {
    let xdc = with_session("bft_xdc", |s| {
        let n = nelem as usize;
        let centers = unsafe { doubles(centers, checked_len(n, 3)?, "centers") }?;
        s.create_transducer(centers, n)
    });
    Box::into_raw(Box::new(xdc))
}

#[no_mangle]
pub extern "C" fn bft_xdc_free(xdc: *mut Transducer) {
    with_session("bft_xdc_free", |s| {
        if xdc.is_null() {
            return Err(BftError::NullPointer("transducer"));
        }
        let xdc = unsafe { Box::from_raw(xdc) };
        s.release_transducer(*xdc);
        Ok(())
    })
}

/// Replace the element centers of `xdc`; the element count cannot change.
#[no_mangle]
pub extern "C" fn bft_xdc_set(xdc: *mut Transducer, centers: *const f64, no_elements: u32) {
    with_session("bft_xdc_set", |s| {
        let xdc = unsafe { xdc.as_mut() }.ok_or(BftError::NullPointer("transducer"))?;
        let n = no_elements as usize;
        let centers = unsafe { doubles(centers, checked_len(n, 3)?, "centers") }?;
        s.replace_element_centers(xdc, centers, n)
    })
}

#[no_mangle]
pub extern "C" fn bft_center_focus(point_xyz: *const f64, line_no: u32) {
    with_session("bft_center_focus", |s| {
        let center = unsafe { point(point_xyz, "center point") }?;
        s.set_center_focus(center, line_no as usize)
    })
}

#[no_mangle]
pub extern "C" fn bft_focus(
    xdc: *const Transducer,
    times: *const f64,
    focus: *const f64,
    no_times: u32,
    line_no: u32,
) {
    with_session("bft_focus", |s| {
        let xdc = unsafe { transducer(xdc) }?;
        let n = no_times as usize;
        let times = unsafe { doubles(times, n, "times") }?;
        let points = unsafe { doubles(focus, checked_len(n, 3)?, "focus points") }?;
        s.set_focus(xdc, times, points, line_no as usize)
    })
}

#[no_mangle]
pub extern "C" fn bft_focus_pixel(
    xdc: *const Transducer,
    points: *const f64,
    no_points: u32,
    line_no: u32,
) {
    with_session("bft_focus_pixel", |s| {
        let xdc = unsafe { transducer(xdc) }?;
        let points = unsafe { doubles(points, checked_len(no_points as usize, 3)?, "pixels") }?;
        s.set_focus_pixel(xdc, points, line_no as usize)
    })
}

#[no_mangle]
pub extern "C" fn bft_focus_2way(
    xdc: *const Transducer,
    times: *const f64,
    delays: *const f64,
    no_times: u32,
    line_no: u32,
) {
    with_session("bft_focus_2way", |s| {
        let xdc = unsafe { transducer(xdc) }?;
        let (times, delays) = unsafe { zoned(xdc, times, delays, no_times, "delays") }?;
        s.set_focus_2way(xdc, times, delays, line_no as usize)
    })
}

#[no_mangle]
pub extern "C" fn bft_focus_times(
    xdc: *const Transducer,
    times: *const f64,
    delays: *const f64,
    no_times: u32,
    line_no: u32,
) {
    with_session("bft_focus_times", |s| {
        let xdc = unsafe { transducer(xdc) }?;
        let (times, delays) = unsafe { zoned(xdc, times, delays, no_times, "delays") }?;
        s.set_focus_times(xdc, times, delays, line_no as usize)
    })
}

#[no_mangle]
pub extern "C" fn bft_apodization(
    xdc: *const Transducer,
    times: *const f64,
    apodization: *const f64,
    no_times: u32,
    line_no: u32,
) {
    with_session("bft_apodization", |s| {
        let xdc = unsafe { transducer(xdc) }?;
        let (times, weights) = unsafe { zoned(xdc, times, apodization, no_times, "apodization") }?;
        s.set_apodization(xdc, times, weights, line_no as usize)
    })
}

#[no_mangle]
pub extern "C" fn bft_sum_apodization(
    xdc: *const Transducer,
    times: *const f64,
    apodization: *const f64,
    no_times: u32,
    line_no: u32,
) {
    with_session("bft_sum_apodization", |s| {
        let xdc = unsafe { transducer(xdc) }?;
        let (times, weights) = unsafe { zoned(xdc, times, apodization, no_times, "apodization") }?;
        s.set_sum_apodization(xdc, times, weights, line_no as usize)
    })
}

/// Zone times plus one row of per-element values per zone.
///
/// # Safety
/// Same contract as [`doubles`] for both buffers.
unsafe fn zoned<'a>(
    xdc: &Transducer,
    times: *const f64,
    values: *const f64,
    no_times: u32,
    what: &'static str,
) -> BftResult<(&'a [f64], &'a [f64])> {
    let n = no_times as usize;
    let times = doubles(times, n, "times")?;
    let values = doubles(values, checked_len(n, xdc.elements())?, what)?;
    Ok((times, values))
}

#[no_mangle]
pub extern "C" fn bft_dynamic_focus(xdc: *const Transducer, line_no: u32, dir_xz: f64, dir_yz: f64) {
    with_session("bft_dynamic_focus", |s| {
        let xdc = unsafe { transducer(xdc) }?;
        s.set_dynamic_focus(xdc, line_no as usize, dir_xz, dir_yz)
    })
}

/// Attach `nf` fractional-delay filters of `ntaps` taps each, row-major.
#[no_mangle]
pub extern "C" fn bft_set_filter_bank(coef: *const f64, nf: u32, ntaps: u32) {
    with_session("bft_set_filter_bank", |s| {
        if coef.is_null() {
            return Err(BftError::NullPointer("filter coefficients"));
        }
        let (banks, taps) = (nf as usize, ntaps as usize);
        let coef = unsafe { doubles(coef, checked_len(banks, taps)?, "filter coefficients") }?;
        s.attach_filter_bank(coef, banks, taps)
    })
}

/// Beamform `no_elements` rows of `no_samples` RF samples.
///
/// `element_no` below `no_elements` selects that element as transmit origin;
/// a non-null `xmt` gives the origin explicitly. The line count and the
/// samples per line are written to `no_lines` and `no_out_samples`.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn bft_beamform(
    no_lines: *mut u32,
    no_out_samples: *mut u32,
    data: *const f64,
    time: f64,
    no_samples: u32,
    no_elements: u32,
    element_no: u32,
    xmt: *const f64,
) -> *mut f64 {
    with_session("bft_beamform", |s| {
        if no_lines.is_null() || no_out_samples.is_null() {
            return Err(BftError::NullPointer("output dimensions"));
        }
        let (samples, elements) = (no_samples as usize, no_elements as usize);
        let rf = unsafe { doubles(data, checked_len(elements, samples)?, "rf data") }?;
        let element = (element_no < no_elements).then_some(element_no as usize);
        let origin = if xmt.is_null() {
            None
        } else {
            Some(unsafe { point(xmt, "transmit origin") }?)
        };

        let image = s.beamform(rf, time, samples, elements, Transmit::from_parts(element, origin)?)?;
        let (lines, out_samples) = (to_u32(image.lines(), "line count")?, to_u32(image.samples(), "sample count")?);
        unsafe {
            *no_lines = lines;
            *no_out_samples = out_samples;
        }
        Ok(buffers::export(image.into_vec()))
    })
}

#[no_mangle]
pub extern "C" fn bft_sum_images(
    data1: *const f64,
    element1: u32,
    data2: *const f64,
    element2: u32,
    time: f64,
    no_samples: u32,
) -> *mut f64 {
    with_session("bft_sum_images", |s| {
        let samples = no_samples as usize;
        let len = checked_len(s.line_counts().0, samples)?;
        let data1 = unsafe { doubles(data1, len, "first image") }?;
        let data2 = unsafe { doubles(data2, len, "second image") }?;
        let image = s.sum_images(data1, element1 as usize, data2, element2 as usize, time, samples)?;
        Ok(buffers::export(image.into_vec()))
    })
}

/// Accumulate `lores` into `hires`, weighted by the summation apodization.
#[no_mangle]
pub extern "C" fn bft_add_images(hires: *mut f64, lores: *const f64, no_samples: u32, time: f64, element: u32) {
    with_session("bft_add_images", |s| {
        let samples = no_samples as usize;
        let (hi, lo) = unsafe { image_pair(s, hires, lores, samples) }?;
        s.add_images(hi, lo, samples, time, element as usize)
    })
}

/// Remove `lores` from `hires`, weighted by the apodization.
#[no_mangle]
pub extern "C" fn bft_sub_images(hires: *mut f64, lores: *const f64, no_samples: u32, time: f64, element: u32) {
    with_session("bft_sub_images", |s| {
        let samples = no_samples as usize;
        let (hi, lo) = unsafe { image_pair(s, hires, lores, samples) }?;
        s.sub_images(hi, lo, samples, time, element as usize)
    })
}

/// # Safety
/// Both buffers must hold `line count x samples` doubles and not overlap.
unsafe fn image_pair<'a>(
    s: &mut BeamformingSession,
    hires: *mut f64,
    lores: *const f64,
    samples: usize,
) -> BftResult<(&'a mut [f64], &'a [f64])> {
    if ptr::eq(hires, lores) && !hires.is_null() {
        return Err(BftError::invalid("high- and low-resolution images share one buffer"));
    }
    let len = checked_len(s.line_counts().0, samples)?;
    let lo = doubles(lores, len, "low-resolution image")?;
    let hi = doubles_mut(hires, len, "high-resolution image")?;
    Ok((hi, lo))
}

/// Resample `src` through a time-varying delay. `method` 0 uses the attached
/// filter bank, anything else linear interpolation.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn bft_delay(
    src: *const f64,
    src_len: u32,
    times: *const f64,
    delays: *const f64,
    times_len: u32,
    src_start_time: f64,
    dest_start_time: f64,
    dest_len: u32,
    method: u32,
) -> *mut f64 {
    with_session("bft_delay", |s| {
        let src = unsafe { doubles(src, src_len as usize, "source") }?;
        let times = unsafe { doubles(times, times_len as usize, "times") }?;
        let delays = unsafe { doubles(delays, times_len as usize, "delays") }?;
        let framing = DelayFraming {
            src_start_time,
            dest_start_time,
            dest_len: dest_len as usize,
        };
        let out = s.delay(src, times, delays, framing, ResampleMethod::from_code(method))?;
        Ok(buffers::export(out))
    })
}

/// Release a buffer returned by [`bft_beamform`], [`bft_sum_images`] or
/// [`bft_delay`].
#[no_mangle]
pub extern "C" fn bft_free_mem(ptr: *mut c_void) {
    with_session("bft_free_mem", |_| buffers::release(ptr.cast::<f64>()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Every test here drives the one global session.
    static SERIAL: Mutex<()> = Mutex::new(());

    fn serial() -> MutexGuard<'static, ()> {
        SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
    }

    static CAPTURED: Mutex<Vec<String>> = Mutex::new(Vec::new());

    extern "C" fn capture(line: *const c_char) {
        let text = unsafe { CStr::from_ptr(line) }.to_string_lossy().into_owned();
        CAPTURED.lock().unwrap().push(text);
    }

    fn linear_centers(elements: usize, pitch: f64) -> Vec<f64> {
        let offset = (elements as f64 - 1.0) / 2.0;
        (0..elements)
            .flat_map(|e| [(e as f64 - offset) * pitch, 0.0, 0.0])
            .collect()
    }

    fn take(ptr: *mut f64, len: usize) -> Vec<f64> {
        let values = unsafe { slice::from_raw_parts(ptr, len) }.to_vec();
        bft_free_mem(ptr.cast());
        values
    }

    #[test]
    fn version_is_reported() {
        assert_eq!(bft_api_version(), API_VERSION);
    }

    #[test]
    fn param_returns_negated_value_for_unknown_names() {
        let _guard = serial();
        bft_init(None, 1);
        let fs = CString::new("fs").unwrap();
        let bogus = CString::new("bogus").unwrap();
        assert_eq!(bft_param(fs.as_ptr(), 50e6), 50e6);
        assert_eq!(bft_param(bogus.as_ptr(), 5.0), -5.0);
        assert_eq!(bft_param(ptr::null(), 2.0), -2.0);
        assert_eq!(session().parameters().sampling_frequency, 50e6);
        bft_end();
    }

    #[test]
    fn null_parameter_name_initializes_session() {
        let _guard = serial();
        bft_end();
        assert!(!session().is_initialized());
        assert_eq!(bft_param(ptr::null(), 3.0), -3.0);
        assert!(session().is_initialized());
        bft_end();
    }

    #[test]
    fn sink_receives_diagnostics() {
        let _guard = serial();
        CAPTURED.lock().unwrap().clear();
        bft_init(Some(capture), 1);
        let speed = CString::new("speed").unwrap();
        bft_param(speed.as_ptr(), 1.0);
        bft_end();
        bft_init(None, 1);

        let lines = CAPTURED.lock().unwrap().clone();
        assert!(lines.iter().any(|l| l.contains("Could not find argument speed")));
    }

    #[test]
    fn line_count_and_beamform_round_trip() {
        let _guard = serial();
        bft_init(None, 1);
        assert_eq!(bft_no_lines(3), 3);

        let centers = linear_centers(4, 3e-4);
        let xdc = bft_xdc(centers.as_ptr(), 4);
        for line in 0..3 {
            bft_dynamic_focus(xdc, line, 0.0, 0.0);
        }

        let rf = vec![0.5; 4 * 16];
        let (mut lines, mut samples) = (0u32, 0u32);
        let beam = bft_beamform(&mut lines, &mut samples, rf.as_ptr(), 0.0, 16, 4, 65535, ptr::null());
        assert_eq!((lines, samples), (3, 16));
        assert_eq!(take(beam, 48).len(), 48);

        bft_xdc_free(xdc);
        bft_end();
    }

    #[test]
    fn single_pixel_line_sets_output_samples() {
        let _guard = serial();
        bft_init(None, 1);
        let centers = linear_centers(2, 1e-3);
        let xdc = bft_xdc(centers.as_ptr(), 2);
        let pixels = [0.0, 0.0, 0.01, 0.0, 0.0, 0.02, 0.0, 0.0, 0.03];
        bft_focus_pixel(xdc, pixels.as_ptr(), 3, 0);

        let rf = vec![0.0; 2 * 100];
        let (mut lines, mut samples) = (0u32, 0u32);
        let beam = bft_beamform(&mut lines, &mut samples, rf.as_ptr(), 0.0, 100, 2, 65535, ptr::null());
        assert_eq!((lines, samples), (1, 3));
        take(beam, 3);

        bft_xdc_free(xdc);
        bft_end();
    }

    #[test]
    fn xdc_set_keeps_element_count() {
        let _guard = serial();
        bft_init(None, 1);
        let centers = linear_centers(3, 1e-3);
        let xdc = bft_xdc(centers.as_ptr(), 3);
        let moved = linear_centers(3, 2e-3);
        bft_xdc_set(xdc, moved.as_ptr(), 3);
        let handle = unsafe { &*xdc };
        assert_eq!(handle.elements(), 3);
        assert!((handle.centers()[0].x + 2e-3).abs() < 1e-15);
        bft_xdc_free(xdc);
        bft_end();
    }

    #[test]
    fn linear_delay_with_zero_delays_is_identity() {
        let _guard = serial();
        bft_init(None, 1);
        let src = [0.0, 1.0, 2.0, 3.0, 4.0];
        let times = [0.0, 1.0];
        let delays = [0.0, 0.0];
        let out = bft_delay(
            src.as_ptr(),
            5,
            times.as_ptr(),
            delays.as_ptr(),
            2,
            0.0,
            0.0,
            5,
            1,
        );
        assert_eq!(take(out, 5), src);
        bft_end();
    }

    #[test]
    fn filter_bank_delay_after_attach() {
        let _guard = serial();
        bft_init(None, 1);
        let bank = [1.0];
        bft_set_filter_bank(bank.as_ptr(), 1, 1);
        let src = [3.0, 1.0, 4.0, 1.0];
        let out = bft_delay(src.as_ptr(), 4, ptr::null(), ptr::null(), 0, 0.0, 0.0, 4, 0);
        assert_eq!(take(out, 4), src);
        bft_end();
    }

    #[test]
    fn images_are_combined_in_place() {
        let _guard = serial();
        bft_init(None, 1);
        bft_no_lines(2);

        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [0.5, 0.5, 0.5, 0.5];
        let sum = bft_sum_images(a.as_ptr(), 0, b.as_ptr(), 1, 0.0, 2);
        assert_eq!(take(sum, 4), vec![1.5, 2.5, 3.5, 4.5]);

        let mut hi = [1.0; 4];
        bft_add_images(hi.as_mut_ptr(), a.as_ptr(), 2, 0.0, 0);
        assert_eq!(hi, [2.0, 3.0, 4.0, 5.0]);
        bft_sub_images(hi.as_mut_ptr(), a.as_ptr(), 2, 0.0, 0);
        assert_eq!(hi, [1.0; 4]);
        bft_end();
    }

    #[test]
    fn apodization_setters_accept_zoned_weights() {
        let _guard = serial();
        bft_init(None, 1);
        let centers = linear_centers(2, 1e-3);
        let xdc = bft_xdc(centers.as_ptr(), 2);
        let times = [0.0, 1e-5];
        let weights = [1.0, 0.5, 0.5, 1.0];
        bft_apodization(xdc, times.as_ptr(), weights.as_ptr(), 2, 0);
        bft_sum_apodization(xdc, times.as_ptr(), weights.as_ptr(), 2, 0);
        bft_focus_times(xdc, times.as_ptr(), weights.as_ptr(), 2, 0);
        bft_focus_2way(xdc, times.as_ptr(), weights.as_ptr(), 2, 0);

        let mut s = session();
        assert_eq!(s.apodization_line(0).unwrap().sample_count(), 2);
        assert_eq!(s.sum_apodization_line(0).unwrap().sample_count(), 2);
        assert_eq!(s.focus_line(0).unwrap().sample_count(), 2);
        drop(s);

        bft_xdc_free(xdc);
        bft_end();
    }
}
