//! Directed `f64` operations on the SSE unit, switching the MXCSR rounding
//! control around each instruction.
//!
//! The results match `crate::directed` bit for bit. Flags match too, except
//! that the hardware detects underflow after rounding.
use std::arch::asm;
use std::marker::PhantomData;

use crate::rounding::{Flags, Outcome, RoundingMode};

const RC_MASK: u32 = 0x6000;
const FLAG_MASK: u32 = 0x003f;
const EXCEPTION_MASKS: u32 = 0x1f80;
const FLUSH_TO_ZERO: u32 = 0x8000;
const DENORMALS_ARE_ZERO: u32 = 0x0040;

const IE: u32 = 0x01;
const ZE: u32 = 0x04;
const OE: u32 = 0x08;
const UE: u32 = 0x10;
const PE: u32 = 0x20;

fn rounding_control(mode: RoundingMode) -> u32 {
    match mode {
        RoundingMode::Nearest => 0x0000,
        RoundingMode::Down => 0x2000,
        RoundingMode::Up => 0x4000,
        RoundingMode::Chop => 0x6000,
    }
}

#[inline]
fn read_mxcsr() -> u32 {
    let mut csr = 0u32;
    unsafe {
        asm!(
            "stmxcsr [{p}]",
            p = in(reg) &mut csr as *mut u32,
            options(nostack, preserves_flags),
        );
    }
    csr
}

#[inline]
fn write_mxcsr(csr: u32) {
    unsafe {
        asm!(
            "ldmxcsr [{p}]",
            p = in(reg) &csr as *const u32,
            options(nostack, preserves_flags, readonly),
        );
    }
}

/// Holds the SSE unit in one rounding mode with all exceptions masked and
/// the status flags cleared; the previous control word is restored on drop.
/// MXCSR is per thread, so the guard cannot leave its thread.
pub struct RoundingGuard {
    saved: u32,
    _thread: PhantomData<*const ()>,
}

impl RoundingGuard {
    pub fn new(mode: RoundingMode) -> Self {
        let saved = read_mxcsr();
        let csr = (saved & !(RC_MASK | FLAG_MASK | FLUSH_TO_ZERO | DENORMALS_ARE_ZERO))
            | EXCEPTION_MASKS
            | rounding_control(mode);
        write_mxcsr(csr);
        RoundingGuard {
            saved,
            _thread: PhantomData,
        }
    }

    /// Status raised since the guard was created or last asked
    pub fn take_flags(&mut self) -> Flags {
        let csr = read_mxcsr();
        write_mxcsr(csr & !FLAG_MASK);
        let mut flags = Flags::empty();
        flags.set(Flags::INVALID, csr & IE != 0);
        flags.set(Flags::DIV_BY_ZERO, csr & ZE != 0);
        flags.set(Flags::OVERFLOW, csr & OE != 0);
        flags.set(Flags::UNDERFLOW, csr & UE != 0);
        flags.set(Flags::INEXACT, csr & PE != 0);
        flags
    }
}

impl Drop for RoundingGuard {
    fn drop(&mut self) {
        write_mxcsr(self.saved);
    }
}

macro_rules! sse_binary_op {
    ($name:ident, $insn:literal) => {
        pub fn $name(a: f64, b: f64, mode: RoundingMode) -> Outcome<f64> {
            let mut guard = RoundingGuard::new(mode);
            let mut x = a;
            unsafe {
                asm!(
                    concat!($insn, " {x}, {y}"),
                    x = inout(xmm_reg) x,
                    y = in(xmm_reg) b,
                    options(nomem, nostack),
                );
            }
            let flags = guard.take_flags();
            Outcome::new(x, flags)
        }
    };
}

sse_binary_op!(add, "addsd");
sse_binary_op!(sub, "subsd");
sse_binary_op!(mul, "mulsd");
sse_binary_op!(div, "divsd");
