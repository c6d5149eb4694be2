use std::cell::RefCell;

use crate::Rational;

/// A LIFO free list of scratch [`Rational`] values.
///
/// Scoped to one evaluation (or one [`Module`](../notecore_module/struct.Module.html)),
/// never process-global. Every value handed out by [`Pool::acquire`] is a
/// fresh, independently owned `Rational`; `release` only returns storage to
/// the free list for the next `acquire` to reuse. Callers never observe
/// pooling — it exists purely to cut allocation churn inside a VM loop.
#[derive(Debug, Default)]
pub struct Pool {
    free: RefCell<Vec<Rational>>,
}

impl Pool {
    pub fn new() -> Self {
        Pool {
            free: RefCell::new(Vec::new()),
        }
    }

    /// Number of values currently parked in the free list (the pool's
    /// high-water mark is `len()` at the start of a scratch region).
    pub fn len(&self) -> usize {
        self.free.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a scratch rational equal to zero, reusing a freed value's
    /// storage where possible.
    pub fn acquire(&self) -> Rational {
        self.free.borrow_mut().pop().unwrap_or_else(Rational::zero)
    }

    /// Returns a value's storage to the pool. The value itself is dropped;
    /// only the pool's internal capacity is retained.
    pub fn release(&self, value: Rational) {
        self.free.borrow_mut().push(value);
    }

    /// Releases every value in `values`, e.g. everything popped off an
    /// evaluator's operand stack at the end of one `evaluate()` call.
    pub fn release_all<I: IntoIterator<Item = Rational>>(&self, values: I) {
        let mut free = self.free.borrow_mut();
        free.extend(values);
    }

    /// Drops every parked value, releasing the pool's memory. Called on
    /// `Module` teardown.
    pub fn clear(&self) {
        self.free.borrow_mut().clear();
    }
}
