//! Path operations on nested Map/Vector trees
//!
//! A path is a List whose entries are map keys or UInt32 vector indices.
//! The updating operations never mutate their input: they return a new
//! root that shares every unchanged subtree by reference, shallow-copying
//! only the containers along the path.

use crate::kind::DataKind;
use crate::value::Data;

fn path_segments(path: &Data) -> Vec<&Data> {
    path.list_iter().collect()
}

fn child<'a>(data: &'a Data, segment: &Data) -> Option<&'a Data> {
    match data.kind() {
        DataKind::Map => data.map_get(segment),
        DataKind::Vector => {
            let index = segment.as_u32().expect("vector path segment must be UInt32");
            data.vector_get(index)
        }
        other => panic!("path navigates into {}", other.name()),
    }
}

impl Data {
    /// Navigate `path`; a borrowed reference to the addressed value, or
    /// `None` when any segment misses. An empty path addresses self.
    pub fn get_at(&self, path: &Data) -> Option<&Data> {
        let mut current = self;
        for segment in path.list_iter() {
            current = child(current, segment)?;
        }
        Some(current)
    }

    /// A new root with `value` stored at `path`; unchanged subtrees are
    /// shared with self. An empty path returns `value` itself.
    pub fn add_at(&self, path: &Data, value: Data) -> Data {
        add_at_segments(self, &path_segments(path), value)
    }

    /// A new root with the value at `path` removed. Removing a vector
    /// index empties the slot and compacts. An empty path returns a
    /// shallow copy of self.
    pub fn remove_at(&self, path: &Data) -> Data {
        remove_at_segments(self, &path_segments(path))
    }

    /// A new root where the leaf at `path` is replaced by `f(leaf)`.
    /// An empty path applies `f` to self. Missing map keys leave the
    /// tree untouched (a shallow copy is still returned).
    pub fn update_at(&self, path: &Data, f: &dyn Fn(&Data) -> Data) -> Data {
        update_at_segments(self, &path_segments(path), f)
    }
}

fn add_at_segments(data: &Data, segments: &[&Data], value: Data) -> Data {
    let Some((segment, rest)) = segments.split_first() else {
        return value;
    };
    let mut result = data.shallow_copy();
    match data.kind() {
        DataKind::Map => {
            let below = child(data, segment).expect("path segment not found");
            result.map_insert((*segment).clone(), add_at_segments(below, rest, value));
        }
        DataKind::Vector => {
            let index = segment.as_u32().expect("vector path segment must be UInt32");
            let below = data.vector_get(index).expect("path segment not found");
            result.vector_set(index, Some(add_at_segments(below, rest, value)));
        }
        other => panic!("path navigates into {}", other.name()),
    }
    result
}

fn remove_at_segments(data: &Data, segments: &[&Data]) -> Data {
    let mut result = data.shallow_copy();
    let Some((segment, rest)) = segments.split_first() else {
        return result;
    };
    match data.kind() {
        DataKind::Map => {
            if rest.is_empty() {
                result.map_remove(segment);
            } else if let Some(below) = child(data, segment) {
                result.map_insert((*segment).clone(), remove_at_segments(below, rest));
            }
        }
        DataKind::Vector => {
            let index = segment.as_u32().expect("vector path segment must be UInt32");
            if rest.is_empty() {
                result.vector_set(index, None);
                result.vector_compact();
            } else if let Some(below) = data.vector_get(index) {
                result.vector_set(index, Some(remove_at_segments(below, rest)));
            }
        }
        other => panic!("path navigates into {}", other.name()),
    }
    result
}

fn update_at_segments(data: &Data, segments: &[&Data], f: &dyn Fn(&Data) -> Data) -> Data {
    let Some((segment, rest)) = segments.split_first() else {
        return f(data);
    };
    let mut result = data.shallow_copy();
    match data.kind() {
        DataKind::Map => {
            if let Some(below) = child(data, segment) {
                result.map_insert((*segment).clone(), update_at_segments(below, rest, f));
            }
        }
        DataKind::Vector => {
            let index = segment.as_u32().expect("vector path segment must be UInt32");
            if let Some(below) = data.vector_get(index) {
                result.vector_set(index, Some(update_at_segments(below, rest, f)));
            }
        }
        other => panic!("path navigates into {}", other.name()),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(segments: Vec<Data>) -> Data {
        let mut list = Data::list();
        for s in segments {
            list.list_push_back(s);
        }
        list
    }

    fn sample() -> Data {
        // {"sensors": [{"id": 1}, {"id": 2}], "site": "plant-7"}
        let mut first = Data::map(DataKind::String);
        first.map_insert_str("id", Data::from(1i64));
        let mut second = Data::map(DataKind::String);
        second.map_insert_str("id", Data::from(2i64));
        let mut root = Data::map(DataKind::String);
        root.map_insert_str("sensors", Data::vector_of(vec![first, second]));
        root.map_insert_str("site", Data::from("plant-7"));
        root
    }

    #[test]
    fn test_get_at() {
        let root = sample();
        let p = path(vec![Data::from("sensors"), Data::from(1u32), Data::from("id")]);
        assert_eq!(root.get_at(&p).and_then(Data::as_i64), Some(2));
        assert!(root.get_at(&path(vec![Data::from("missing")])).is_none());
        // empty path addresses the root itself
        assert!(root.get_at(&Data::list()).unwrap().same(&root));
    }

    #[test]
    fn test_add_at_shares_unchanged_subtrees() {
        let root = sample();
        let p = path(vec![Data::from("sensors"), Data::from(0u32), Data::from("id")]);
        let updated = root.add_at(&p, Data::from(99i64));

        assert_eq!(updated.get_at(&p).and_then(Data::as_i64), Some(99));
        // original untouched
        assert_eq!(root.get_at(&p).and_then(Data::as_i64), Some(1));
        // the sibling subtree is shared, not copied
        let sibling = path(vec![Data::from("sensors"), Data::from(1u32)]);
        assert!(root.get_at(&sibling).unwrap().same(updated.get_at(&sibling).unwrap()));
        // untouched top-level values are shared too
        assert!(root.map_get_str("site").unwrap().same(updated.map_get_str("site").unwrap()));
    }

    #[test]
    fn test_add_at_empty_path_returns_value() {
        let root = sample();
        let replacement = Data::from(5i64);
        let out = root.add_at(&Data::list(), replacement.clone());
        assert!(out.same(&replacement));
    }

    #[test]
    fn test_remove_at_map_key() {
        let root = sample();
        let out = root.remove_at(&path(vec![Data::from("site")]));
        assert!(out.map_get_str("site").is_none());
        assert_eq!(out.map_len(), 1);
        assert_eq!(root.map_len(), 2);
    }

    #[test]
    fn test_remove_at_vector_index_compacts() {
        let root = sample();
        let out = root.remove_at(&path(vec![Data::from("sensors"), Data::from(0u32)]));
        let sensors = out.map_get_str("sensors").unwrap();
        assert_eq!(sensors.vector_len(), 1);
        assert_eq!(
            sensors.vector_get(0).unwrap().map_get_i64("id", 0),
            2,
            "remaining element shifts down"
        );
        assert_eq!(root.map_get_str("sensors").unwrap().vector_len(), 2);
    }

    #[test]
    fn test_update_at() {
        let root = sample();
        let p = path(vec![Data::from("sensors"), Data::from(1u32), Data::from("id")]);
        let out = root.update_at(&p, &|leaf| {
            let mut next = leaf.deep_copy();
            next.increment();
            next
        });
        assert_eq!(out.get_at(&p).and_then(Data::as_i64), Some(3));
        assert_eq!(root.get_at(&p).and_then(Data::as_i64), Some(2));
    }

    #[test]
    fn test_update_at_missing_key_is_untouched() {
        let root = sample();
        let out = root.update_at(&path(vec![Data::from("absent")]), &|_| Data::null());
        assert!(out.equal(&root));
    }
}
