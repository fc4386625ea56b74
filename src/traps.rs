//! Per-kind trap configuration and the record of raised traps
use std::backtrace::Backtrace;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::rounding::Flags;

/// Exception classes. The discriminants are group codes: sub-codes such as
/// `0x101` resolve to the nearest registered class below them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum TrapKind {
    InvalidOperation = 0x100,
    DivByZero = 0xa00,
    Overflow = 0xb00,
    Underflow = 0xc00,
    Inexact = 0xd00,
    Allocation = 0xe00,
    InvalidArgument = 0x1200,
    IndexRange = 0x1300,
}

impl TrapKind {
    pub const ALL: [TrapKind; 8] = [
        TrapKind::InvalidOperation,
        TrapKind::DivByZero,
        TrapKind::Overflow,
        TrapKind::Underflow,
        TrapKind::Inexact,
        TrapKind::Allocation,
        TrapKind::InvalidArgument,
        TrapKind::IndexRange,
    ];

    #[inline]
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<TrapKind> {
        TrapKind::ALL.into_iter().find(|k| k.code() == code)
    }

    /// IEEE flag this kind corresponds to, if any
    pub fn flag(self) -> Option<Flags> {
        match self {
            TrapKind::InvalidOperation => Some(Flags::INVALID),
            TrapKind::DivByZero => Some(Flags::DIV_BY_ZERO),
            TrapKind::Overflow => Some(Flags::OVERFLOW),
            TrapKind::Underflow => Some(Flags::UNDERFLOW),
            TrapKind::Inexact => Some(Flags::INEXACT),
            _ => None,
        }
    }

    /// Kinds raised by a set of flags, most severe first
    pub fn from_flags(flags: Flags) -> impl Iterator<Item = TrapKind> {
        TrapKind::ALL
            .into_iter()
            .filter(move |k| k.flag().is_some_and(|f| flags.contains(f)))
    }

    pub fn description(self) -> &'static str {
        match self {
            TrapKind::InvalidOperation => "invalid operation",
            TrapKind::DivByZero => "division by zero",
            TrapKind::Overflow => "overflow",
            TrapKind::Underflow => "underflow",
            TrapKind::Inexact => "inexact result",
            TrapKind::Allocation => "allocation failure",
            TrapKind::InvalidArgument => "invalid argument",
            TrapKind::IndexRange => "index out of range",
        }
    }

    /// Kinds that cannot be continued from in strict mode
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            TrapKind::InvalidOperation
                | TrapKind::DivByZero
                | TrapKind::Overflow
                | TrapKind::Allocation
                | TrapKind::IndexRange
        )
    }
}

impl fmt::Display for TrapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#06x})", self.description(), self.code())
    }
}

/// What happens after an active trap has been reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Disposition {
    /// Deliver the default result
    #[default]
    Continue,
    /// Return `ArithError::Trapped` to the caller
    Fail,
    /// Log and abort the process
    Abort,
}

/// Details handed to a trap handler
#[derive(Debug, Clone)]
pub struct TrapReport {
    pub kind: TrapKind,
    pub code: u32,
    pub op: &'static str,
    pub detail: String,
}

impl fmt::Display for TrapReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            write!(f, "{} in {}", self.kind.description(), self.op)
        } else {
            write!(f, "{} in {}({})", self.kind.description(), self.op, self.detail)
        }
    }
}

pub type TrapHandler = Arc<dyn Fn(&TrapReport) + Send + Sync>;

#[derive(Clone, Default)]
pub struct TrapEntry {
    pub active: bool,
    pub disposition: Disposition,
    /// Capture a backtrace into the log when the trap fires
    pub backtrace: bool,
    pub handler: Option<TrapHandler>,
}

impl TrapEntry {
    pub fn active(disposition: Disposition) -> Self {
        TrapEntry {
            active: true,
            disposition,
            ..TrapEntry::default()
        }
    }

    pub fn inactive() -> Self {
        TrapEntry::default()
    }

    pub fn with_backtrace(mut self, enabled: bool) -> Self {
        self.backtrace = enabled;
        self
    }

    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&TrapReport) + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }
}

impl fmt::Debug for TrapEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrapEntry")
            .field("active", &self.active)
            .field("disposition", &self.disposition)
            .field("backtrace", &self.backtrace)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

/// Ordered table of trap entries keyed by code
#[derive(Debug, Clone)]
pub struct TrapTable {
    entries: BTreeMap<u32, TrapEntry>,
}

impl Default for TrapTable {
    /// Every kind active and continuing, except `Inexact` which is inactive
    fn default() -> Self {
        TrapTable::from_fn(|kind| match kind {
            TrapKind::Inexact => TrapEntry::inactive(),
            _ => TrapEntry::active(Disposition::Continue),
        })
    }
}

impl TrapTable {
    pub fn from_fn<F: FnMut(TrapKind) -> TrapEntry>(mut f: F) -> Self {
        TrapTable {
            entries: TrapKind::ALL.into_iter().map(|k| (k.code(), f(k))).collect(),
        }
    }

    /// Fatal kinds abort; the rest continue
    pub fn strict() -> Self {
        TrapTable::from_fn(|kind| match kind {
            TrapKind::Inexact => TrapEntry::inactive(),
            k if k.is_fatal() => TrapEntry::active(Disposition::Abort).with_backtrace(true),
            _ => TrapEntry::active(Disposition::Continue),
        })
    }

    /// Nothing is reported; only sticky flags accumulate
    pub fn quiet() -> Self {
        TrapTable::from_fn(|_| TrapEntry::inactive())
    }

    /// Fatal kinds fail with an error instead of aborting
    pub fn failing() -> Self {
        TrapTable::from_fn(|kind| match kind {
            TrapKind::Inexact => TrapEntry::inactive(),
            k if k.is_fatal() => TrapEntry::active(Disposition::Fail),
            _ => TrapEntry::active(Disposition::Continue),
        })
    }

    pub fn set(&mut self, kind: TrapKind, entry: TrapEntry) {
        self.entries.insert(kind.code(), entry);
    }

    /// Register an entry for a sub-code of a kind's group
    pub fn register(&mut self, code: u32, entry: TrapEntry) {
        self.entries.insert(code, entry);
    }

    pub fn get(&self, kind: TrapKind) -> Option<&TrapEntry> {
        self.entries.get(&kind.code())
    }

    pub fn get_mut(&mut self, kind: TrapKind) -> Option<&mut TrapEntry> {
        self.entries.get_mut(&kind.code())
    }

    /// Exact match, else the nearest registered code below
    pub fn lookup(&self, code: u32) -> Option<(u32, &TrapEntry)> {
        self.entries
            .range(..=code)
            .next_back()
            .map(|(&c, entry)| (c, entry))
    }

    pub fn is_active(&self, code: u32) -> bool {
        self.lookup(code).is_some_and(|(_, e)| e.active)
    }
}

#[derive(Debug, Clone)]
pub struct TrapRecord {
    pub kind: TrapKind,
    pub code: u32,
    pub op: &'static str,
    pub message: String,
    pub backtrace: Option<String>,
}

impl TrapRecord {
    pub(crate) fn capture(report: &TrapReport, backtrace: bool) -> Self {
        TrapRecord {
            kind: report.kind,
            code: report.code,
            op: report.op,
            message: report.to_string(),
            backtrace: backtrace.then(|| Backtrace::force_capture().to_string()),
        }
    }
}

/// Fixed-capacity log of fired traps; records past capacity are counted
/// but not kept
#[derive(Debug, Clone)]
pub struct TrapLog {
    records: Vec<TrapRecord>,
    capacity: usize,
    dropped: usize,
}

impl TrapLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    #[inline]
    pub fn reset(&mut self) {
        self.records.clear();
        self.dropped = 0;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records that did not fit
    #[inline]
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    #[inline]
    pub fn records(&self) -> &[TrapRecord] {
        &self.records
    }

    pub fn record(&mut self, record: TrapRecord) {
        if self.records.len() < self.capacity {
            self.records.push(record);
        } else {
            self.dropped += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_falls_back_to_group() {
        let table = TrapTable::default();
        assert_eq!(table.lookup(0x100).map(|(c, _)| c), Some(0x100));
        assert_eq!(table.lookup(0x101).map(|(c, _)| c), Some(0x100));
        assert_eq!(table.lookup(0xb42).map(|(c, _)| c), Some(0xb00));
        assert!(table.lookup(0x42).is_none());
        assert!(!table.is_active(TrapKind::Inexact.code()));
        assert!(table.is_active(0xa01));
    }

    #[test]
    fn registered_sub_code_wins() {
        let mut table = TrapTable::default();
        table.register(0x101, TrapEntry::active(Disposition::Fail));
        assert_eq!(table.lookup(0x101).map(|(_, e)| e.disposition), Some(Disposition::Fail));
        assert_eq!(table.lookup(0x102).map(|(_, e)| e.disposition), Some(Disposition::Fail));
        assert_eq!(table.lookup(0x100).map(|(_, e)| e.disposition), Some(Disposition::Continue));
    }

    #[test]
    fn presets() {
        let strict = TrapTable::strict();
        assert_eq!(
            strict.get(TrapKind::DivByZero).map(|e| e.disposition),
            Some(Disposition::Abort)
        );
        assert_eq!(
            strict.get(TrapKind::Underflow).map(|e| e.disposition),
            Some(Disposition::Continue)
        );
        let quiet = TrapTable::quiet();
        assert!(TrapKind::ALL.iter().all(|k| !quiet.is_active(k.code())));
    }

    #[test]
    fn flags_map_to_kinds_in_severity_order() {
        let kinds: Vec<_> = TrapKind::from_flags(Flags::INEXACT | Flags::OVERFLOW).collect();
        assert_eq!(kinds, vec![TrapKind::Overflow, TrapKind::Inexact]);
        assert_eq!(TrapKind::from_code(0xd00), Some(TrapKind::Inexact));
        assert_eq!(TrapKind::from_code(0xd01), None);
    }

    #[test]
    fn log_keeps_capacity() {
        let mut log = TrapLog::with_capacity(2);
        let report = TrapReport {
            kind: TrapKind::Overflow,
            code: TrapKind::Overflow.code(),
            op: "mul",
            detail: "1e308, 10".into(),
        };
        for _ in 0..3 {
            log.record(TrapRecord::capture(&report, false));
        }
        assert_eq!(log.len(), 2);
        assert_eq!(log.dropped(), 1);
        assert_eq!(log.records()[0].message, "overflow in mul(1e308, 10)");
        log.reset();
        assert!(log.is_empty());
    }
}
