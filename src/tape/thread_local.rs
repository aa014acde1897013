use std::cell::Cell;

use crate::float::Float;

use super::BytecodeTape;

thread_local! {
    static TAPE_F32: Cell<*mut BytecodeTape<f32>> = const { Cell::new(std::ptr::null_mut()) };
    static TAPE_F64: Cell<*mut BytecodeTape<f64>> = const { Cell::new(std::ptr::null_mut()) };
}

/// Selects the thread-local slot for a given float type.
///
/// Implemented for `f32` and `f64`, enabling `Var<F>` for these base types.
pub trait TapeThreadLocal: Float {
    fn tape_cell() -> &'static std::thread::LocalKey<Cell<*mut BytecodeTape<Self>>>;
}

impl TapeThreadLocal for f32 {
    fn tape_cell() -> &'static std::thread::LocalKey<Cell<*mut BytecodeTape<Self>>> {
        &TAPE_F32
    }
}

impl TapeThreadLocal for f64 {
    fn tape_cell() -> &'static std::thread::LocalKey<Cell<*mut BytecodeTape<Self>>> {
        &TAPE_F64
    }
}

/// Access the active bytecode tape for the current thread.
///
/// Panics if no tape is active: recorded arithmetic on `Var` is only
/// meaningful inside [`record`](super::record).
#[inline]
pub fn with_active_tape<F: TapeThreadLocal, R>(f: impl FnOnce(&mut BytecodeTape<F>) -> R) -> R {
    F::tape_cell().with(|cell| {
        let ptr = cell.get();
        assert!(
            !ptr.is_null(),
            "no active bytecode tape; Var arithmetic must run inside a recording"
        );
        // SAFETY: TapeGuard keeps the pointee alive and exclusively borrowed
        // for the recording scope; the slot is thread-local.
        let tape = unsafe { &mut *ptr };
        f(tape)
    })
}

/// RAII guard that sets a bytecode tape as the thread-local active tape.
pub struct TapeGuard<'a, F: TapeThreadLocal> {
    prev: *mut BytecodeTape<F>,
    _tape: std::marker::PhantomData<&'a mut BytecodeTape<F>>,
}

impl<'a, F: TapeThreadLocal> TapeGuard<'a, F> {
    /// Activate `tape` as the thread-local bytecode tape.
    pub fn new(tape: &'a mut BytecodeTape<F>) -> Self {
        let prev = F::tape_cell().with(|cell| {
            let prev = cell.get();
            cell.set(tape as *mut BytecodeTape<F>);
            prev
        });
        TapeGuard {
            prev,
            _tape: std::marker::PhantomData,
        }
    }
}

impl<F: TapeThreadLocal> Drop for TapeGuard<'_, F> {
    fn drop(&mut self) {
        F::tape_cell().with(|cell| {
            cell.set(self.prev);
        });
    }
}
