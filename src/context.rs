//! Explicit rounding state: the current mode, the trap table, sticky
//! exception flags and the trap log, passed by `&mut` to escalating calls.
use tracing::{debug, error, warn};

use crate::accumulator::Accumulator;
use crate::directed;
use crate::error::{ArithError, ParseError};
use crate::number::MpNumber;
use crate::rounding::{Flags, Outcome, RoundingMode};
use crate::traps::{Disposition, TrapKind, TrapLog, TrapRecord, TrapReport, TrapTable};

/// Builder for `RoundingContext`
pub struct ContextBuilder {
    mode: RoundingMode,
    precision: u32,
    traps: TrapTable,
    log_capacity: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        ContextBuilder::new()
    }
}

impl ContextBuilder {
    /// Nearest rounding, 128-bit working precision, default trap table
    pub fn new() -> Self {
        Self {
            mode: RoundingMode::Nearest,
            precision: 128,
            traps: TrapTable::default(),
            log_capacity: 64,
        }
    }

    pub fn mode(mut self, mode: RoundingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Working precision in bits for multi-precision operations
    pub fn precision(mut self, bits: u32) -> Self {
        self.precision = bits.max(1);
        self
    }

    pub fn traps(mut self, traps: TrapTable) -> Self {
        self.traps = traps;
        self
    }

    /// Number of trap records kept (default 64)
    pub fn log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    pub fn build(self) -> RoundingContext {
        RoundingContext {
            mode: self.mode,
            precision: self.precision,
            traps: self.traps,
            flags: Flags::empty(),
            log: TrapLog::with_capacity(self.log_capacity),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoundingContext {
    mode: RoundingMode,
    precision: u32,
    traps: TrapTable,
    flags: Flags,
    log: TrapLog,
}

impl Default for RoundingContext {
    fn default() -> Self {
        ContextBuilder::new().build()
    }
}

impl RoundingContext {
    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    #[inline]
    pub fn mode(&self) -> RoundingMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: RoundingMode) {
        self.mode = mode;
    }

    #[inline]
    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn set_precision(&mut self, bits: u32) {
        self.precision = bits.max(1);
    }

    /// Sticky flags raised since the last `clear_flags`
    #[inline]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn clear_flags(&mut self) {
        self.flags = Flags::empty();
    }

    pub fn traps(&self) -> &TrapTable {
        &self.traps
    }

    pub fn traps_mut(&mut self) -> &mut TrapTable {
        &mut self.traps
    }

    pub fn log(&self) -> &TrapLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut TrapLog {
        &mut self.log
    }

    /// Run `f` with a different rounding mode, restoring the previous one
    pub fn with_mode<T, F>(&mut self, mode: RoundingMode, f: F) -> T
    where
        F: FnOnce(&mut RoundingContext) -> T,
    {
        let saved = std::mem::replace(&mut self.mode, mode);
        let out = f(self);
        self.mode = saved;
        out
    }

    /// Report a trap of the given kind
    pub fn raise(&mut self, kind: TrapKind, op: &'static str, detail: &str) -> Result<(), ArithError> {
        self.raise_code(kind.code(), kind, op, detail)
    }

    /// Report a trap under a specific sub-code of `kind`'s group
    pub fn raise_code(
        &mut self,
        code: u32,
        kind: TrapKind,
        op: &'static str,
        detail: &str,
    ) -> Result<(), ArithError> {
        if let Some(flag) = kind.flag() {
            self.flags |= flag;
        }
        let Some((_, entry)) = self.traps.lookup(code) else {
            return Ok(());
        };
        if !entry.active {
            return Ok(());
        }

        let report = TrapReport {
            kind,
            code,
            op,
            detail: detail.to_owned(),
        };
        let entry = entry.clone();
        if let Some(handler) = &entry.handler {
            (**handler)(&report);
        }
        self.log.record(TrapRecord::capture(&report, entry.backtrace));

        match entry.disposition {
            Disposition::Continue => {
                if kind == TrapKind::Inexact {
                    debug!(target: "verarith::trap", code, "{report}");
                } else {
                    warn!(target: "verarith::trap", code, "{report}");
                }
                Ok(())
            }
            Disposition::Fail => {
                warn!(target: "verarith::trap", code, "{report}, failing");
                Err(ArithError::Trapped { kind, op })
            }
            Disposition::Abort => {
                error!(target: "verarith::trap", code, "{report}, aborting");
                if let Some(trace) = self.log.records().last().and_then(|r| r.backtrace.as_deref()) {
                    error!(target: "verarith::trap", "backtrace:\n{trace}");
                }
                std::process::abort()
            }
        }
    }

    /// Route a set of exception flags through the trap table, most severe first
    pub fn absorb(&mut self, flags: Flags, op: &'static str, detail: &str) -> Result<(), ArithError> {
        for kind in TrapKind::from_flags(flags) {
            self.raise(kind, op, detail)?;
        }
        Ok(())
    }

    /// Report an error surfaced by a fallible kernel call, then return it
    pub fn fail<T>(&mut self, err: ArithError, op: &'static str) -> Result<T, ArithError> {
        self.raise(err.trap_kind(), op, &err.to_string())?;
        Err(err)
    }

    fn escalate_binary(&mut self, out: Outcome<f64>, op: &'static str, a: f64, b: f64) -> Result<f64, ArithError> {
        if !out.flags.is_empty() {
            self.absorb(out.flags, op, &format!("{a:e}, {b:e}"))?;
        }
        Ok(out.value)
    }

    pub fn add(&mut self, a: f64, b: f64) -> Result<f64, ArithError> {
        let out = directed::add(a, b, self.mode);
        self.escalate_binary(out, "add", a, b)
    }

    pub fn sub(&mut self, a: f64, b: f64) -> Result<f64, ArithError> {
        let out = directed::sub(a, b, self.mode);
        self.escalate_binary(out, "sub", a, b)
    }

    pub fn mul(&mut self, a: f64, b: f64) -> Result<f64, ArithError> {
        let out = directed::mul(a, b, self.mode);
        self.escalate_binary(out, "mul", a, b)
    }

    pub fn div(&mut self, a: f64, b: f64) -> Result<f64, ArithError> {
        let out = directed::div(a, b, self.mode);
        self.escalate_binary(out, "div", a, b)
    }

    pub fn fma(&mut self, a: f64, b: f64, c: f64) -> Result<f64, ArithError> {
        let out = directed::fma(a, b, c, self.mode);
        if !out.flags.is_empty() {
            self.absorb(out.flags, "fma", &format!("{a:e}, {b:e}, {c:e}"))?;
        }
        Ok(out.value)
    }

    /// Multi-precision operations at the context's precision and mode
    pub fn mp_add(&mut self, a: &MpNumber, b: &MpNumber) -> Result<MpNumber, ArithError> {
        match a.add(b, self.precision, self.mode) {
            Ok(out) => out.escalate(self, "mp_add"),
            Err(err) => self.fail(err, "mp_add"),
        }
    }

    pub fn mp_sub(&mut self, a: &MpNumber, b: &MpNumber) -> Result<MpNumber, ArithError> {
        match a.sub(b, self.precision, self.mode) {
            Ok(out) => out.escalate(self, "mp_sub"),
            Err(err) => self.fail(err, "mp_sub"),
        }
    }

    pub fn mp_mul(&mut self, a: &MpNumber, b: &MpNumber) -> Result<MpNumber, ArithError> {
        match a.mul(b, self.precision, self.mode) {
            Ok(out) => out.escalate(self, "mp_mul"),
            Err(err) => self.fail(err, "mp_mul"),
        }
    }

    pub fn mp_div(&mut self, a: &MpNumber, b: &MpNumber) -> Result<MpNumber, ArithError> {
        match a.div(b, self.precision, self.mode) {
            Ok(out) => out.escalate(self, "mp_div"),
            Err(err) => self.fail(err, "mp_div"),
        }
    }

    /// Add `x * y` to an accumulator, reporting invalid combinations
    pub fn accumulate(&mut self, accu: &mut Accumulator, x: f64, y: f64) -> Result<(), ArithError> {
        let flags = accu.add_product(x, y);
        if !flags.is_empty() {
            self.absorb(flags, "accumulate", &format!("{x:e}, {y:e}"))?;
        }
        Ok(())
    }

    /// Exact dot product; invalid products and a length mismatch go through
    /// the trap table
    pub fn dot(&mut self, xs: &[f64], ys: &[f64]) -> Result<Accumulator, ArithError> {
        match Accumulator::dot(xs, ys) {
            Ok(out) => out.escalate(self, "dot"),
            Err(err) => self.fail(err, "dot"),
        }
    }

    /// Scan a decimal literal at the context's precision and mode. Malformed
    /// text is reported as an invalid argument before the error is returned.
    pub fn parse_decimal(&mut self, s: &str) -> Result<MpNumber, ParseError> {
        match MpNumber::from_decimal(s, self.precision, self.mode) {
            Ok(out) => Ok(out.escalate(self, "from_decimal")?),
            Err(ParseError::Arith(err)) => Ok(self.fail(err, "from_decimal")?),
            Err(err) => {
                self.raise(TrapKind::InvalidArgument, "from_decimal", &err.to_string())?;
                Err(err)
            }
        }
    }

    /// Round an accumulator in the context's mode
    pub fn round_accumulator(&mut self, accu: &Accumulator) -> Result<f64, ArithError> {
        accu.result(self.mode).escalate(self, "round_accumulator")
    }
}

impl<T> Outcome<T> {
    /// Hand the flags to the context's trap table and unwrap the value
    pub fn escalate(self, ctx: &mut RoundingContext, op: &'static str) -> Result<T, ArithError> {
        ctx.absorb(self.flags, op, "")?;
        Ok(self.value)
    }
}
