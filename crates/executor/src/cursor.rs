use strata_types::{Row, RowBounds};

/// A forward-only walk over a query result. Rows are handed out one at a
/// time and never enter any cache; the requested bounds are applied during
/// iteration.
#[derive(Debug)]
pub struct Cursor {
    rows: std::vec::IntoIter<Row>,
    remaining: usize,
    to_skip: usize,
    consumed: usize,
    closed: bool,
}

impl Cursor {
    pub(crate) fn new(rows: Vec<Row>, bounds: RowBounds) -> Self {
        Self {
            rows: rows.into_iter(),
            remaining: bounds.limit,
            to_skip: bounds.offset,
            consumed: 0,
            closed: false,
        }
    }

    /// Index of the last row returned, or `None` before the first row.
    pub fn current_index(&self) -> Option<usize> {
        self.consumed.checked_sub(1)
    }

    pub fn is_open(&self) -> bool {
        !self.closed
    }

    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl Iterator for Cursor {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        if self.closed || self.remaining == 0 {
            return None;
        }
        while self.to_skip > 0 {
            self.rows.next()?;
            self.to_skip -= 1;
        }
        let row = self.rows.next()?;
        self.remaining -= 1;
        self.consumed += 1;
        Some(row)
    }
}
