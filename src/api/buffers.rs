//! Ownership bookkeeping for sample buffers handed across the C boundary.
//!
//! Every buffer returned by an entry point is registered here with its
//! length so that [`release`] can rebuild and drop the exact allocation.

use std::collections::BTreeMap;
use std::ptr;
use std::sync::{Mutex, PoisonError};

use crate::common::error::{BftError, BftResult};

struct Exported {
    len: usize,
    outstanding: usize,
}

static EXPORTED: Mutex<BTreeMap<usize, Exported>> = Mutex::new(BTreeMap::new());

/// Hand `values` over to the caller.
pub fn export(values: Vec<f64>) -> *mut f64 {
    let boxed = values.into_boxed_slice();
    let len = boxed.len();
    let raw = Box::into_raw(boxed) as *mut f64;

    let mut exported = EXPORTED.lock().unwrap_or_else(PoisonError::into_inner);
    // Empty buffers share one dangling address.
    exported
        .entry(raw as usize)
        .and_modify(|e| e.outstanding += 1)
        .or_insert(Exported { len, outstanding: 1 });
    raw
}

/// Take back a buffer previously returned by [`export`].
pub fn release(raw: *mut f64) -> BftResult<()> {
    if raw.is_null() {
        return Err(BftError::NullPointer("buffer"));
    }

    let len = {
        let mut exported = EXPORTED.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = exported
            .get_mut(&(raw as usize))
            .ok_or(BftError::UnknownBuffer)?;
        let len = entry.len;
        entry.outstanding -= 1;
        if entry.outstanding == 0 {
            exported.remove(&(raw as usize));
        }
        len
    };

    // SAFETY: `raw` was produced by `export` from a boxed slice of `len`
    // elements and has just been removed from the registry.
    unsafe {
        drop(Box::from_raw(ptr::slice_from_raw_parts_mut(raw, len)));
    }
    Ok(())
}

#[cfg(test)]
fn is_exported(raw: *const f64) -> bool {
    EXPORTED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .contains_key(&(raw as usize))
}
