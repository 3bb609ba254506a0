use std::fmt;
use std::marker::PhantomData;

use heapless::Vec as BoundedVec;
use serde::de::{Deserializer, IgnoredAny, SeqAccess, Visitor};
use serde::Deserialize;

/// Converts one decoded source element into a stored row, or rejects it.
pub trait Admit: Sized {
    type Row;

    fn admit(self) -> Option<Self::Row>;
}

/// A nested value that is either the expected shape or skipped.
///
/// Wrapping an element or sub-object in this keeps one malformed entry from
/// failing the whole document; the entry decodes as `Other` instead.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum Lenient<T> {
    Value(T),
    Other(IgnoredAny),
}

impl<T> Lenient<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Lenient::Value(value) => Some(value),
            Lenient::Other(_) => None,
        }
    }
}

impl<T: Admit> Admit for Lenient<T> {
    type Row = T::Row;

    fn admit(self) -> Option<T::Row> {
        self.into_option()?.admit()
    }
}

/// A JSON array decoded straight into at most `N` rows.
///
/// Elements are converted as they are parsed; once `N` rows are held the
/// rest of the array is skipped without being materialized.
pub struct Capped<T: Admit, const N: usize> {
    pub rows: BoundedVec<T::Row, N>,
    /// Source elements skipped after the container filled up.
    pub skipped: usize,
}

impl<'de, T, const N: usize> Deserialize<'de> for Capped<T, N>
where
    T: Admit + Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(CappedVisitor::<T, N>(PhantomData))
    }
}

struct CappedVisitor<T, const N: usize>(PhantomData<T>);

impl<'de, T, const N: usize> Visitor<'de> for CappedVisitor<T, N>
where
    T: Admit + Deserialize<'de>,
{
    type Value = Capped<T, N>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "an array of at most {N} retained elements")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut rows = BoundedVec::new();
        while !rows.is_full() {
            match seq.next_element::<T>()? {
                Some(item) => {
                    if let Some(row) = item.admit() {
                        // Cannot fail: checked `is_full` above.
                        let _ = rows.push(row);
                    }
                }
                None => return Ok(Capped { rows, skipped: 0 }),
            }
        }

        let mut skipped = 0;
        while seq.next_element::<IgnoredAny>()?.is_some() {
            skipped += 1;
        }
        Ok(Capped { rows, skipped })
    }
}
