///
/// Row views and iteration.
///
/// `Row` is a (statement handle, row stamp) pair taken when a step produced
/// a row. It hands out `Column`s by index or by name and an iterator over
/// all of them. Like `Column`, it only holds a weak reference to the
/// statement and refuses access once the statement has moved on.
///
/// `Rows` walks a statement's result set: the first `next()` resets the
/// statement and steps it, every later `next()` steps again, and iteration
/// stops once the statement reports it is done (or after yielding a step
/// error once).
///

use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use crate::Database;
use crate::column::{Column, FromColumn};
use crate::errors::{Error, Result};
use crate::handle::{RowStamp, StatementHandle};
use crate::statement::Statement;

#[derive(Debug, Clone)]
pub struct Row<'db> {
    handle: Weak<StatementHandle>,
    stamp: RowStamp,
    column_count: i32,
    _db: PhantomData<&'db Database>,
}

impl<'db> Row<'db> {
    pub(crate) fn new(handle: &Rc<StatementHandle>) -> Self {
        Self {
            handle: Rc::downgrade(handle),
            stamp: handle.stamp(),
            column_count: handle.column_count(),
            _db: PhantomData,
        }
    }

    /// Statement step this row was produced by (1 for the first row).
    pub fn row(&self) -> usize {
        self.stamp.step
    }

    pub fn column_count(&self) -> i32 {
        self.column_count
    }

    fn current(&self) -> Result<Rc<StatementHandle>> {
        let handle = self.handle.upgrade().ok_or(Error::StatementExpired)?;
        handle.check_current(self.stamp)?;
        Ok(handle)
    }

    pub fn at(&self, index: i32) -> Result<Column<'db>> {
        let handle = self.current()?;
        handle.check_index(index)?;
        Ok(Column::at_row(self.handle.clone(), index, self.stamp))
    }

    pub fn at_name(&self, name: &str) -> Result<Column<'db>> {
        let handle = self.current()?;
        let index = handle.column_index(name)?;
        Ok(Column::at_row(self.handle.clone(), index, self.stamp))
    }

    pub fn get_column(&self, index: i32) -> Result<Column<'db>> {
        self.at(index)
    }

    pub fn get_column_by_name(&self, name: &str) -> Result<Column<'db>> {
        self.at_name(name)
    }

    pub fn is_column_null(&self, index: i32) -> Result<bool> {
        self.at(index)?.is_null()
    }

    pub fn get<T: FromColumn>(&self, index: i32) -> Result<T> {
        self.at(index)?.get()
    }

    /// Builds a tuple out of the first columns of the row.
    pub fn get_columns<T: FromRow>(&self) -> Result<T> {
        T::from_row(self)
    }

    pub fn columns(&self) -> ColumnIter<'db> {
        ColumnIter {
            handle: self.handle.clone(),
            stamp: self.stamp,
            front: 0,
            back: self.column_count,
            _db: PhantomData,
        }
    }
}

impl<'db> IntoIterator for &Row<'db> {
    type Item = Column<'db>;
    type IntoIter = ColumnIter<'db>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns()
    }
}

/// Iterator over the columns of one row, from either end.
///
/// Two iterators compare equal when they walk the same statement, the same
/// row and sit at the same positions. Once either statement is gone they
/// compare equal only if both are exhausted.
#[derive(Debug, Clone)]
pub struct ColumnIter<'db> {
    handle: Weak<StatementHandle>,
    stamp: RowStamp,
    front: i32,
    back: i32,
    _db: PhantomData<&'db Database>,
}

impl ColumnIter<'_> {
    fn is_exhausted(&self) -> bool {
        self.front >= self.back
    }
}

impl<'db> Iterator for ColumnIter<'db> {
    type Item = Column<'db>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_exhausted() {
            return None;
        }
        let column = Column::at_row(self.handle.clone(), self.front, self.stamp);
        self.front += 1;
        Some(column)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = (self.back - self.front).max(0) as usize;
        (len, Some(len))
    }
}

impl DoubleEndedIterator for ColumnIter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.is_exhausted() {
            return None;
        }
        self.back -= 1;
        Some(Column::at_row(self.handle.clone(), self.back, self.stamp))
    }
}

impl ExactSizeIterator for ColumnIter<'_> {}

impl FusedIterator for ColumnIter<'_> {}

impl PartialEq for ColumnIter<'_> {
    fn eq(&self, other: &Self) -> bool {
        if self.handle.strong_count() == 0 || other.handle.strong_count() == 0 {
            return self.is_exhausted() && other.is_exhausted();
        }
        Weak::ptr_eq(&self.handle, &other.handle)
            && self.stamp == other.stamp
            && self.front == other.front
            && self.back == other.back
    }
}

/// Single-pass iterator over the result rows of a statement.
#[derive(Debug)]
pub struct Rows<'s, 'db> {
    statement: &'s mut Statement<'db>,
    started: bool,
    finished: bool,
}

impl<'s, 'db> Rows<'s, 'db> {
    pub(crate) fn new(statement: &'s mut Statement<'db>) -> Self {
        Self {
            statement,
            started: false,
            finished: false,
        }
    }
}

impl<'db> Iterator for Rows<'_, 'db> {
    type Item = Result<Row<'db>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if !self.started {
            self.started = true;
            // A failing reset only repeats the previous run's last step result.
            self.statement.try_reset();
        }
        match self.statement.execute_step() {
            Ok(true) => Some(self.statement.row()),
            Ok(false) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

impl FusedIterator for Rows<'_, '_> {}

/// Types that can be built from the leading columns of a row.
pub trait FromRow: Sized {
    fn from_row(row: &Row<'_>) -> Result<Self>;
}

macro_rules! impl_from_row {
    ($($index:tt $name:ident),+) => {
        impl<$($name: FromColumn),+> FromRow for ($($name,)+) {
            fn from_row(row: &Row<'_>) -> Result<Self> {
                Ok(($(row.at($index)?.get::<$name>()?,)+))
            }
        }
    };
}

impl_from_row!(0 A);
impl_from_row!(0 A, 1 B);
impl_from_row!(0 A, 1 B, 2 C);
impl_from_row!(0 A, 1 B, 2 C, 3 D);
impl_from_row!(0 A, 1 B, 2 C, 3 D, 4 E);
impl_from_row!(0 A, 1 B, 2 C, 3 D, 4 E, 5 F);
impl_from_row!(0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G);
impl_from_row!(0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H);
