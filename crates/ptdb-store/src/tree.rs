//! Path-addressed reads and mutations over the record set.
//!
//! [`RecordTree`] is a borrowed view over the records of a loaded document.
//! It performs the structural work only; persisting the result is the
//! caller's job (see [`Database`](crate::Database)).

use ptdb_types::{DbPath, Records, Value};
use serde_json::Map;

use crate::error::{DbError, DbResult};

/// Mutable view over a record set, addressed by [`DbPath`].
pub struct RecordTree<'a> {
    records: &'a mut Records,
}

impl<'a> RecordTree<'a> {
    pub fn new(records: &'a mut Records) -> Self {
        Self { records }
    }

    /// Read the value at `path`, cloning it out of the tree.
    ///
    /// The root yields the whole record set as an object. A missing key
    /// anywhere along the path yields `None`.
    pub fn get(&self, path: &DbPath) -> DbResult<Option<Value>> {
        read_value(self.records, path)
    }

    /// Write `value` at `path`, creating intermediate mappings as needed.
    ///
    /// The final key is always overwritten. Writing to the root replaces the
    /// whole record set and therefore requires an object.
    pub fn set(&mut self, path: &DbPath, value: Value) -> DbResult<Value> {
        let Some((last, parents)) = path.split_last() else {
            return match value {
                Value::Object(map) => {
                    *self.records = map.clone();
                    Ok(Value::Object(map))
                }
                _ => Err(not_traversable(".", path)),
            };
        };

        let parent = descend(self.records, parents, path, true)?.ok_or_else(|| {
            // Creating walks always reach the parent.
            not_traversable(last, path)
        })?;
        parent.insert(last.clone(), value.clone());
        Ok(value)
    }

    /// Append `value` to the array at `path`, creating an empty array first
    /// if nothing is there. Returns the array after the push.
    pub fn push(&mut self, path: &DbPath, value: Value) -> DbResult<Vec<Value>> {
        let array = self.array_or_default(path)?;
        array.push(value);
        Ok(array.clone())
    }

    /// Prepend `value` to the array at `path`, creating an empty array first
    /// if nothing is there. Returns the array after the insert.
    pub fn unshift(&mut self, path: &DbPath, value: Value) -> DbResult<Vec<Value>> {
        let array = self.array_or_default(path)?;
        array.insert(0, value);
        Ok(array.clone())
    }

    /// Remove and return the last element of the array at `path`.
    pub fn pop(&mut self, path: &DbPath) -> DbResult<Option<Value>> {
        let array = self.existing_array(path)?;
        Ok(array.pop())
    }

    /// Remove and return the first element of the array at `path`.
    pub fn shift(&mut self, path: &DbPath) -> DbResult<Option<Value>> {
        let array = self.existing_array(path)?;
        if array.is_empty() {
            return Ok(None);
        }
        Ok(Some(array.remove(0)))
    }

    /// Remove the value at `path`. Returns whether anything was removed.
    ///
    /// The root clears every record. A missing intermediate key means the
    /// value is already gone, which is not an error.
    pub fn unset(&mut self, path: &DbPath) -> DbResult<bool> {
        let Some((last, parents)) = path.split_last() else {
            let removed = !self.records.is_empty();
            self.records.clear();
            return Ok(removed);
        };

        match descend(self.records, parents, path, false)? {
            Some(parent) => Ok(parent.remove(last).is_some()),
            None => Ok(false),
        }
    }

    fn array_or_default(&mut self, path: &DbPath) -> DbResult<&mut Vec<Value>> {
        let Some((last, parents)) = path.split_last() else {
            return Err(not_array(path));
        };
        let parent = descend(self.records, parents, path, true)?
            .ok_or_else(|| not_traversable(last, path))?;

        match parent
            .entry(last.clone())
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            Value::Array(array) => Ok(array),
            _ => Err(not_array(path)),
        }
    }

    fn existing_array(&mut self, path: &DbPath) -> DbResult<&mut Vec<Value>> {
        let Some((last, parents)) = path.split_last() else {
            return Err(not_array(path));
        };
        let parent = descend(self.records, parents, path, false)?.ok_or_else(|| not_array(path))?;

        match parent.get_mut(last) {
            Some(Value::Array(array)) => Ok(array),
            _ => Err(not_array(path)),
        }
    }
}

/// Resolve `path` to an owned value, treating the root as the whole record
/// set. Shared by [`RecordTree::get`] and watch evaluation.
pub(crate) fn read_value(records: &Records, path: &DbPath) -> DbResult<Option<Value>> {
    let Some((last, parents)) = path.split_last() else {
        return Ok(Some(Value::Object(records.clone())));
    };

    let mut current = records;
    for segment in parents {
        current = match current.get(segment) {
            None => return Ok(None),
            Some(Value::Object(map)) => map,
            Some(_) => return Err(not_traversable(segment, path)),
        };
    }
    Ok(current.get(last).cloned())
}

/// Walk the intermediate segments, returning the mapping that holds the
/// final key. With `create`, missing mappings are materialised; without it a
/// missing segment short-circuits to `None`.
fn descend<'t>(
    records: &'t mut Records,
    parents: &[String],
    path: &DbPath,
    create: bool,
) -> DbResult<Option<&'t mut Records>> {
    let mut current = records;
    for segment in parents {
        let next = if create {
            Some(
                current
                    .entry(segment.clone())
                    .or_insert_with(|| Value::Object(Map::new())),
            )
        } else {
            current.get_mut(segment)
        };

        current = match next {
            None => return Ok(None),
            Some(Value::Object(map)) => map,
            Some(_) => return Err(not_traversable(segment, path)),
        };
    }
    Ok(Some(current))
}

fn not_traversable(segment: &str, path: &DbPath) -> DbError {
    DbError::NotTraversable {
        segment: segment.to_owned(),
        path: path.to_string(),
    }
}

fn not_array(path: &DbPath) -> DbError {
    DbError::NotArray {
        path: path.to_string(),
    }
}
