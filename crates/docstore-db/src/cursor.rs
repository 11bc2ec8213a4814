use crate::traits::RowCursor;
use crate::value::Row;

/// Cursor over rows already fetched from the engine.
///
/// SQLite statements borrow their connection, so the binding drains each
/// statement into one of these before releasing the connection lock.
#[derive(Clone, Debug, Default)]
pub struct BufferedCursor {
    rows: Vec<Row>,
    pos: usize,
}

impl BufferedCursor {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows, pos: 0 }
    }
}

impl RowCursor for BufferedCursor {
    fn total(&self) -> usize {
        self.rows.len()
    }

    fn rewind(&mut self) {
        self.pos = 0;
    }

    fn next_row(&mut self) -> Option<Row> {
        let row = self.rows.get(self.pos).cloned()?;
        self.pos += 1;
        Some(row)
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::SqlValue;
    use std::sync::Arc;

    fn rows(n: i64) -> Vec<Row> {
        let columns: Arc<[String]> = vec!["n".to_string()].into();
        (0..n)
            .map(|i| Row::new(columns.clone(), vec![SqlValue::Integer(i)]))
            .collect()
    }

    #[test]
    fn empty_cursor_is_eof() {
        let mut cursor = BufferedCursor::new(Vec::new());
        assert!(cursor.is_eof());
        assert_eq!(cursor.total(), 0);
        assert!(cursor.next_row().is_none());
    }

    #[test]
    fn iterates_and_rewinds() {
        let mut cursor = BufferedCursor::new(rows(2));
        assert!(!cursor.is_eof());
        assert_eq!(cursor.next_row().unwrap().integer("n"), Some(0));
        assert_eq!(cursor.next_row().unwrap().integer("n"), Some(1));
        assert!(cursor.is_eof());
        assert!(cursor.next_row().is_none());

        cursor.rewind();
        assert!(!cursor.is_eof());
        assert_eq!(cursor.next_row().unwrap().integer("n"), Some(0));
    }
}
