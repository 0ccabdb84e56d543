use std::ops::{Range, RangeFrom, RangeFull, RangeTo};
use procdata_base::{fail, ErrorKind, Result};

/// A start/stop/step selection over rows with the usual extended-slice
/// rules: negative bounds count from the end, out-of-range bounds clamp,
/// and a negative step walks backwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Slice {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: i64,
}

/// A slice resolved against a concrete length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Resolved {
    pub(crate) start: i64,
    pub(crate) stop: i64,
    pub(crate) step: i64,
    pub(crate) count: usize,
}

impl Resolved {
    pub(crate) fn rows(&self) -> impl Iterator<Item = usize> {
        let Resolved { start, step, count, .. } = *self;
        (0..count).map(move |i| (start + (i as i64) * step) as usize)
    }

    /// Unit-step selections are the ones worth a bulk pass.
    pub(crate) fn as_range(&self) -> Option<Range<usize>> {
        if self.step == 1 {
            let start = self.start as usize;
            Some(start..start + self.count)
        } else {
            None
        }
    }
}

impl Slice {
    pub fn new(start: Option<i64>, stop: Option<i64>, step: i64) -> Self {
        Slice { start, stop, step }
    }

    pub fn all() -> Self {
        Slice::new(None, None, 1)
    }

    pub fn range(start: i64, stop: i64) -> Self {
        Slice::new(Some(start), Some(stop), 1)
    }

    pub fn with_step(self, step: i64) -> Self {
        Slice { step, ..self }
    }

    pub(crate) fn resolve(&self, len: usize) -> Result<Resolved> {
        let step = self.step;
        if step == 0 {
            return fail(ErrorKind::Validation, "slice step cannot be zero");
        }
        let len = len as i64;
        let (lower, upper) = if step < 0 { (-1, len - 1) } else { (0, len) };
        let clamp = |bound: Option<i64>, default: i64| match bound {
            None => default,
            Some(b) if b < 0 => (b + len).max(lower),
            Some(b) => b.min(upper),
        };
        let start = clamp(self.start, if step < 0 { upper } else { lower });
        let stop = clamp(self.stop, if step < 0 { lower } else { upper });
        let count = if step > 0 && start < stop {
            (stop - start - 1) / step + 1
        } else if step < 0 && stop < start {
            (start - stop - 1) / (-step) + 1
        } else {
            0
        };
        Ok(Resolved { start, stop, step, count: count as usize })
    }
}

impl From<Range<usize>> for Slice {
    fn from(r: Range<usize>) -> Self {
        Slice::range(r.start as i64, r.end as i64)
    }
}

impl From<RangeFrom<usize>> for Slice {
    fn from(r: RangeFrom<usize>) -> Self {
        Slice::new(Some(r.start as i64), None, 1)
    }
}

impl From<RangeTo<usize>> for Slice {
    fn from(r: RangeTo<usize>) -> Self {
        Slice::new(None, Some(r.end as i64), 1)
    }
}

impl From<RangeFull> for Slice {
    fn from(_: RangeFull) -> Self {
        Slice::all()
    }
}
