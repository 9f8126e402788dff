//! Range selection
//!
//! A half-open key range `[lower, upper)` expressed as two cursors. The
//! iterator advances a clone of the lower cursor and stops as soon as it
//! no longer compares strictly below the upper cursor, so selections are
//! restartable and never materialize the range.

use std::cmp::Ordering;

use crate::error::Result;
use crate::store::NodeStore;

use super::location::BTreeLocation;

/// A bounded range over a B-tree's keys.
pub struct Selection<'a, S: NodeStore> {
    begin: BTreeLocation<'a, S>,
    end: BTreeLocation<'a, S>,
}

impl<'a, S: NodeStore> Selection<'a, S> {
    pub(crate) fn new(begin: BTreeLocation<'a, S>, end: BTreeLocation<'a, S>) -> Self {
        Self { begin, end }
    }

    /// Iterate the range from its lower bound. Each call restarts.
    pub fn iter(&self) -> SelectionIter<'a, S> {
        SelectionIter {
            current: Some(self.begin.clone()),
            end: self.end.clone(),
        }
    }
}

/// Iterator over a [`Selection`], yielding keys in ascending order.
pub struct SelectionIter<'a, S: NodeStore> {
    current: Option<BTreeLocation<'a, S>>,
    end: BTreeLocation<'a, S>,
}

impl<'a, S: NodeStore> Iterator for SelectionIter<'a, S> {
    type Item = Result<S::UserKey>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current.take()?;

        if current.compare(&self.end) != Ordering::Less {
            return None;
        }

        let key = current.key()?.clone();

        match current.next() {
            Ok(advanced) => {
                self.current = advanced;
                Some(Ok(key))
            }
            Err(e) => Some(Err(e)),
        }
    }
}
