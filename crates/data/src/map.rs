//! Maps: ordered key→value stores over a left-leaning red-black tree
//!
//! Keys are values, unique by `compare`, held in ascending order. A map
//! declares a key kind and an element kind (either may be Multi). The map
//! hash is maintained incrementally: inserting a new pair XORs
//! `hash(key) ^ hash(value)` into the fold (the value hash is skipped when
//! it equals the key hash, so the pair does not cancel to zero); value
//! replacement and key removal mark the hash stale instead.
//!
//! Tree invariants after any operation sequence: the root is black, a red
//! node never has a red child, and every root-to-leaf path crosses the
//! same number of black nodes.

use crate::kind::DataKind;
use crate::value::{Data, Value};
use std::cmp::Ordering;

#[derive(Debug, Clone)]
pub(crate) struct Node {
    key: Data,
    value: Data,
    red: bool,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

#[derive(Debug, Clone)]
pub(crate) struct MapValue {
    pub(crate) key: DataKind,
    pub(crate) element: DataKind,
    size: u32,
    root: Option<Box<Node>>,
}

fn is_red(node: &Option<Box<Node>>) -> bool {
    node.as_ref().is_some_and(|n| n.red)
}

fn rotate_left(mut h: Box<Node>) -> Box<Node> {
    let mut x = h.right.take().expect("rotate_left requires a right child");
    h.right = x.left.take();
    x.red = h.red;
    h.red = true;
    x.left = Some(h);
    x
}

fn rotate_right(mut h: Box<Node>) -> Box<Node> {
    let mut x = h.left.take().expect("rotate_right requires a left child");
    h.left = x.right.take();
    x.red = h.red;
    h.red = true;
    x.right = Some(h);
    x
}

fn flip_colors(h: &mut Node) {
    h.red = !h.red;
    if let Some(l) = h.left.as_mut() {
        l.red = !l.red;
    }
    if let Some(r) = h.right.as_mut() {
        r.red = !r.red;
    }
}

fn fix_up(mut h: Box<Node>) -> Box<Node> {
    if is_red(&h.right) && !is_red(&h.left) {
        h = rotate_left(h);
    }
    if is_red(&h.left) && h.left.as_ref().is_some_and(|l| is_red(&l.left)) {
        h = rotate_right(h);
    }
    if is_red(&h.left) && is_red(&h.right) {
        flip_colors(&mut h);
    }
    h
}

fn move_red_left(mut h: Box<Node>) -> Box<Node> {
    flip_colors(&mut h);
    if h.right.as_ref().is_some_and(|r| is_red(&r.left)) {
        h.right = Some(rotate_right(h.right.take().unwrap()));
        h = rotate_left(h);
        flip_colors(&mut h);
    }
    h
}

fn move_red_right(mut h: Box<Node>) -> Box<Node> {
    flip_colors(&mut h);
    if h.left.as_ref().is_some_and(|l| is_red(&l.left)) {
        h = rotate_right(h);
        flip_colors(&mut h);
    }
    h
}

fn insert_node(node: Option<Box<Node>>, key: Data, value: Data) -> (Box<Node>, bool) {
    let Some(mut h) = node else {
        return (Box::new(Node { key, value, red: true, left: None, right: None }), false);
    };
    let replaced = match key.compare(&h.key) {
        Ordering::Less => {
            let (n, replaced) = insert_node(h.left.take(), key, value);
            h.left = Some(n);
            replaced
        }
        Ordering::Greater => {
            let (n, replaced) = insert_node(h.right.take(), key, value);
            h.right = Some(n);
            replaced
        }
        // Key present: keep the resident key, drop the new one, swap
        // the value in.
        Ordering::Equal => {
            h.value = value;
            true
        }
    };
    (fix_up(h), replaced)
}

fn delete_min(mut h: Box<Node>) -> (Option<Box<Node>>, (Data, Data)) {
    if h.left.is_none() {
        return (None, (h.key, h.value));
    }
    if !is_red(&h.left) && !h.left.as_ref().is_some_and(|l| is_red(&l.left)) {
        h = move_red_left(h);
    }
    let (left, min) = delete_min(h.left.take().unwrap());
    h.left = left;
    (Some(fix_up(h)), min)
}

// Precondition: the key is present in the subtree.
fn delete_node(mut h: Box<Node>, key: &Data) -> Option<Box<Node>> {
    if key.compare(&h.key) == Ordering::Less {
        if !is_red(&h.left) && !h.left.as_ref().is_some_and(|l| is_red(&l.left)) {
            h = move_red_left(h);
        }
        h.left = delete_node(h.left.take().unwrap(), key);
    } else {
        if is_red(&h.left) {
            h = rotate_right(h);
        }
        if key.compare(&h.key) == Ordering::Equal && h.right.is_none() {
            return None;
        }
        if !is_red(&h.right) && !h.right.as_ref().is_some_and(|r| is_red(&r.left)) {
            h = move_red_right(h);
        }
        if key.compare(&h.key) == Ordering::Equal {
            let (right, (min_key, min_value)) = delete_min(h.right.take().unwrap());
            h.right = right;
            h.key = min_key;
            h.value = min_value;
        } else {
            h.right = delete_node(h.right.take().unwrap(), key);
        }
    }
    Some(fix_up(h))
}

impl MapValue {
    pub(crate) fn new(key: DataKind, element: DataKind) -> MapValue {
        MapValue { key, element, size: 0, root: None }
    }

    pub(crate) fn len(&self) -> u32 {
        self.size
    }

    /// Hash contribution of one pair.
    pub(crate) fn pair_hash(key: &Data, value: &Data) -> u32 {
        let kh = key.hash32();
        let vh = value.hash32();
        if vh != kh { kh ^ vh } else { kh }
    }

    /// Descend by a comparator receiving each node key; the comparator
    /// returns where the probe sits relative to that key.
    fn find_by(&self, cmp: impl Fn(&Data) -> Ordering) -> Option<&Node> {
        let mut node = self.root.as_deref();
        while let Some(n) = node {
            match cmp(&n.key) {
                Ordering::Equal => return Some(n),
                Ordering::Less => node = n.left.as_deref(),
                Ordering::Greater => node = n.right.as_deref(),
            }
        }
        None
    }

    fn find_by_mut(&mut self, cmp: impl Fn(&Data) -> Ordering) -> Option<&mut Node> {
        let mut node = self.root.as_deref_mut();
        while let Some(n) = node {
            match cmp(&n.key) {
                Ordering::Equal => return Some(n),
                Ordering::Less => node = n.left.as_deref_mut(),
                Ordering::Greater => node = n.right.as_deref_mut(),
            }
        }
        None
    }

    pub(crate) fn get(&self, key: &Data) -> Option<&Data> {
        self.find_by(|k| key.compare(k)).map(|n| &n.value)
    }

    pub(crate) fn get_str(&self, key: &str) -> Option<&Data> {
        self.find_by(|k| match k.as_str() {
            Some(s) => key.cmp(s),
            // A string probe against a non-string key orders by kind
            None => DataKind::String.cmp(&k.kind()),
        })
        .map(|n| &n.value)
    }

    pub(crate) fn get_mut(&mut self, key: &Data) -> Option<&mut Data> {
        self.find_by_mut(|k| key.compare(k)).map(|n| &mut n.value)
    }

    /// Returns true when the key already existed (value replaced).
    pub(crate) fn insert(&mut self, key: Data, value: Data) -> bool {
        let (root, replaced) = insert_node(self.root.take(), key, value);
        let mut root = root;
        root.red = false;
        self.root = Some(root);
        if !replaced {
            self.size += 1;
        }
        replaced
    }

    /// Returns true when a node was removed.
    pub(crate) fn remove(&mut self, key: &Data) -> bool {
        if self.get(key).is_none() {
            return false;
        }
        let mut root = self.root.take().unwrap();
        if !is_red(&root.left) && !is_red(&root.right) {
            root.red = true;
        }
        self.root = delete_node(root, key);
        if let Some(r) = self.root.as_mut() {
            r.red = false;
        }
        self.size -= 1;
        true
    }

    pub(crate) fn clear(&mut self) {
        self.root = None;
        self.size = 0;
    }

    /// In-order (ascending key) iteration.
    pub(crate) fn iter(&self) -> MapIter<'_> {
        let mut iter = MapIter { stack: Vec::new() };
        iter.push_left(self.root.as_deref());
        iter
    }

    /// Reverse (descending key) iteration.
    pub(crate) fn iter_rev(&self) -> MapIterRev<'_> {
        let mut iter = MapIterRev { stack: Vec::new() };
        iter.push_right(self.root.as_deref());
        iter
    }

    pub(crate) fn iter_mut(&mut self) -> MapIterMut<'_> {
        let mut iter = MapIterMut { stack: Vec::new() };
        iter.push_left(self.root.as_mut());
        iter
    }

    /// Visit every node with both key and value mutable. Callers must
    /// only replace a key with a compare-equal value, or the tree order
    /// breaks. Used by structural interning.
    pub(crate) fn visit_pairs_mut(&mut self, f: &mut impl FnMut(&mut Data, &mut Data)) {
        fn walk(node: Option<&mut Box<Node>>, f: &mut impl FnMut(&mut Data, &mut Data)) {
            if let Some(n) = node {
                walk(n.left.as_mut(), f);
                f(&mut n.key, &mut n.value);
                walk(n.right.as_mut(), f);
            }
        }
        walk(self.root.as_mut(), f);
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        fn black_height(node: &Option<Box<Node>>) -> u32 {
            let Some(n) = node else { return 1 };
            if n.red {
                assert!(!is_red(&n.left) && !is_red(&n.right), "red node with red child");
            }
            let lh = black_height(&n.left);
            let rh = black_height(&n.right);
            assert_eq!(lh, rh, "unequal black heights");
            lh + u32::from(!n.red)
        }
        assert!(!is_red(&self.root), "red root");
        black_height(&self.root);
        // size accounting matches live nodes
        assert_eq!(self.iter().count() as u32, self.size);
    }
}

pub(crate) struct MapIter<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> MapIter<'a> {
    fn push_left(&mut self, mut node: Option<&'a Node>) {
        while let Some(n) = node {
            self.stack.push(n);
            node = n.left.as_deref();
        }
    }
}

impl<'a> Iterator for MapIter<'a> {
    type Item = (&'a Data, &'a Data);

    fn next(&mut self) -> Option<(&'a Data, &'a Data)> {
        let node = self.stack.pop()?;
        self.push_left(node.right.as_deref());
        Some((&node.key, &node.value))
    }
}

pub(crate) struct MapIterRev<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> MapIterRev<'a> {
    fn push_right(&mut self, mut node: Option<&'a Node>) {
        while let Some(n) = node {
            self.stack.push(n);
            node = n.right.as_deref();
        }
    }
}

impl<'a> Iterator for MapIterRev<'a> {
    type Item = (&'a Data, &'a Data);

    fn next(&mut self) -> Option<(&'a Data, &'a Data)> {
        let node = self.stack.pop()?;
        self.push_right(node.left.as_deref());
        Some((&node.key, &node.value))
    }
}

pub(crate) struct MapIterMut<'a> {
    stack: Vec<(&'a Data, &'a mut Data, Option<&'a mut Box<Node>>)>,
}

impl<'a> MapIterMut<'a> {
    fn push_left(&mut self, mut node: Option<&'a mut Box<Node>>) {
        while let Some(n) = node {
            let Node { key, value, left, right, .. } = &mut **n;
            self.stack.push((&*key, value, right.as_mut()));
            node = left.as_mut();
        }
    }
}

impl<'a> Iterator for MapIterMut<'a> {
    type Item = (&'a Data, &'a mut Data);

    fn next(&mut self) -> Option<(&'a Data, &'a mut Data)> {
        let (key, value, right) = self.stack.pop()?;
        self.push_left(right);
        Some((key, value))
    }
}

impl Data {
    /// An empty Map with the given key kind and unrestricted values.
    pub fn map(key: DataKind) -> Data {
        Data::typed_map(key, DataKind::Multi)
    }

    /// An empty Map with declared key and element kinds.
    pub fn typed_map(key: DataKind, element: DataKind) -> Data {
        assert!(key != DataKind::Null, "Null is not a legal map key kind");
        Data::container(Value::Map(MapValue::new(key, element)))
    }

    fn map_value(&self) -> &MapValue {
        match self.value() {
            Value::Map(m) => m,
            _ => panic!("map operation on {}", self.kind_name()),
        }
    }

    pub fn map_len(&self) -> u32 {
        self.map_value().len()
    }

    /// Insert or replace. Panics on a key/element kind mismatch with the
    /// map's declared kinds.
    pub fn map_insert(&mut self, key: Data, value: Data) {
        {
            let m = self.map_value();
            assert!(
                m.key == DataKind::Multi || m.key == key.kind(),
                "map key kind mismatch: expected {}, got {}",
                m.key.name(),
                key.kind_name()
            );
            assert!(
                m.element == DataKind::Multi || m.element == value.kind(),
                "map element kind mismatch: expected {}, got {}",
                m.element.name(),
                value.kind_name()
            );
        }
        let pair = MapValue::pair_hash(&key, &value);
        let inner = self.inner_mut();
        let Value::Map(m) = &mut inner.value else { unreachable!() };
        if m.insert(key, value) {
            Data::mark_rehash(inner);
        } else {
            Data::hash_xor(inner, pair);
        }
    }

    /// Insert under a string key (copied into an owned key value).
    pub fn map_insert_str(&mut self, key: &str, value: Data) {
        self.map_insert(Data::from(key), value);
    }

    /// Insert only when the key is absent; returns false (dropping the
    /// pair) when it is already present.
    pub fn map_add_unused(&mut self, key: Data, value: Data) -> bool {
        if self.map_get(&key).is_some() {
            return false;
        }
        self.map_insert(key, value);
        true
    }

    pub fn map_get(&self, key: &Data) -> Option<&Data> {
        self.map_value().get(key)
    }

    /// Lookup requiring the value to be of `kind`.
    pub fn map_get_typed(&self, key: &Data, kind: DataKind) -> Option<&Data> {
        self.map_get(key).filter(|v| v.kind() == kind)
    }

    /// String-keyed lookup without allocating a key value.
    pub fn map_get_str(&self, key: &str) -> Option<&Data> {
        self.map_value().get_str(key)
    }

    pub fn map_get_string(&self, key: &str) -> Option<&str> {
        self.map_get_str(key).and_then(Data::as_str)
    }

    pub fn map_get_i64(&self, key: &str, default: i64) -> i64 {
        self.map_get_str(key).and_then(Data::as_i64).unwrap_or(default)
    }

    pub fn map_get_u64(&self, key: &str, default: u64) -> u64 {
        self.map_get_str(key).and_then(Data::as_u64).unwrap_or(default)
    }

    pub fn map_get_f64(&self, key: &str, default: f64) -> f64 {
        self.map_get_str(key).and_then(Data::as_f64).unwrap_or(default)
    }

    pub fn map_get_bool(&self, key: &str, default: bool) -> bool {
        self.map_get_str(key).and_then(Data::as_bool).unwrap_or(default)
    }

    pub fn map_get_vector(&self, key: &str) -> Option<&Data> {
        self.map_get_str(key).filter(|v| v.kind() == DataKind::Vector)
    }

    pub fn map_get_map(&self, key: &str) -> Option<&Data> {
        self.map_get_str(key).filter(|v| v.kind() == DataKind::Map)
    }

    pub fn map_get_list(&self, key: &str) -> Option<&Data> {
        self.map_get_str(key).filter(|v| v.kind() == DataKind::List)
    }

    pub fn map_remove(&mut self, key: &Data) -> bool {
        let inner = self.inner_mut();
        let Value::Map(m) = &mut inner.value else {
            panic!("map operation on non-map");
        };
        if m.remove(key) {
            Data::mark_rehash(inner);
            true
        } else {
            false
        }
    }

    pub fn map_remove_str(&mut self, key: &str) -> bool {
        // Transient key: only compare needs it
        self.map_remove(&Data::from(key))
    }

    /// Copy every pair of `src` into self, overwriting existing keys.
    pub fn map_merge(&mut self, src: &Data) {
        for (key, value) in src.map_value().iter() {
            self.map_insert(key.clone(), value.clone());
        }
    }

    /// Drop every pair.
    pub fn map_clear(&mut self) {
        let inner = self.inner_mut();
        if let Value::Map(m) = &mut inner.value {
            m.clear();
        }
        Data::hash_set(inner, 0);
    }

    /// Ascending-key iteration.
    pub fn map_iter(&self) -> impl Iterator<Item = (&Data, &Data)> {
        self.map_value().iter()
    }

    /// Descending-key iteration.
    pub fn map_iter_rev(&self) -> impl Iterator<Item = (&Data, &Data)> {
        self.map_value().iter_rev()
    }

    /// Ascending-key iteration with replaceable values; the container
    /// hash is marked stale up front.
    pub fn map_iter_mut(&mut self) -> impl Iterator<Item = (&Data, &mut Data)> {
        let inner = self.inner_mut();
        Data::mark_rehash(inner);
        match &mut inner.value {
            Value::Map(m) => m.iter_mut(),
            _ => panic!("map operation on non-map"),
        }
    }

    /// Replace a base64 String value at `key` with the decoded UInt8
    /// Array in place; false when the key is absent, the value is not a
    /// String, or the base64 is bad.
    pub fn decode_base64(&mut self, key: &Data) -> bool {
        let Some(value) = self.map_get(key) else { return false };
        let Some(encoded) = value.as_str() else { return false };
        let Some(array) = Data::array_from_base64(encoded) else { return false };
        let inner = self.inner_mut();
        let Value::Map(m) = &mut inner.value else { unreachable!() };
        *m.get_mut(key).unwrap() = array;
        Data::mark_rehash(inner);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_map(pairs: &[(&str, i64)]) -> Data {
        let mut map = Data::map(DataKind::String);
        for (k, v) in pairs {
            map.map_insert_str(k, Data::from(*v));
        }
        map
    }

    fn invariants(map: &Data) {
        match map.value() {
            Value::Map(m) => m.check_invariants(),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_insert_get_remove() {
        let mut map = Data::map(DataKind::String);
        map.map_insert_str("one", Data::from(1i64));
        map.map_insert_str("two", Data::from(2i64));
        assert_eq!(map.map_len(), 2);
        assert_eq!(map.map_get_i64("one", 0), 1);
        assert_eq!(map.map_get_i64("missing", -7), -7);
        assert!(map.map_remove_str("one"));
        assert!(!map.map_remove_str("one"));
        assert_eq!(map.map_len(), 1);
    }

    #[test]
    fn test_insert_replaces_value() {
        let mut map = string_map(&[("k", 1)]);
        map.map_insert_str("k", Data::from(2i64));
        assert_eq!(map.map_len(), 1);
        assert_eq!(map.map_get_i64("k", 0), 2);
    }

    #[test]
    fn test_iteration_is_sorted() {
        let mut map = Data::map(DataKind::String);
        for k in ["delta", "alpha", "echo", "charlie", "bravo"] {
            map.map_insert_str(k, Data::from(0i64));
        }
        let keys: Vec<&str> = map.map_iter().filter_map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["alpha", "bravo", "charlie", "delta", "echo"]);
        let rev: Vec<&str> = map.map_iter_rev().filter_map(|(k, _)| k.as_str()).collect();
        assert_eq!(rev, vec!["echo", "delta", "charlie", "bravo", "alpha"]);
    }

    #[test]
    fn test_rb_invariants_under_churn() {
        let mut map = Data::map(DataKind::UInt32);
        // Insert a deliberately adversarial mix of orders
        for i in 0..128u32 {
            map.map_insert(Data::from(i), Data::from(i as i64));
            invariants(&map);
        }
        for i in (0..512u32).rev().step_by(3) {
            map.map_insert(Data::from(i), Data::from(i as i64));
        }
        invariants(&map);
        let before = map.map_len();
        for i in (0..128u32).step_by(2) {
            assert!(map.map_remove(&Data::from(i)));
            invariants(&map);
        }
        assert_eq!(map.map_len(), before - 64);
        // Size equals inserted minus removed distinct keys
        for i in 0..128u32 {
            map.map_remove(&Data::from(i));
        }
        invariants(&map);
    }

    #[test]
    fn test_map_equality_and_hash() {
        let a = string_map(&[("x", 1), ("y", 2)]);
        let b = string_map(&[("y", 2), ("x", 1)]);
        assert!(a.equal(&b));
        assert_eq!(a.hash32(), b.hash32());
        let c = string_map(&[("x", 1), ("y", 3)]);
        assert!(!a.equal(&c));
    }

    #[test]
    fn test_hash_recovers_after_replace() {
        let mut a = string_map(&[("x", 1)]);
        a.map_insert_str("x", Data::from(9i64));
        let fresh = string_map(&[("x", 9)]);
        assert_eq!(a.hash32(), fresh.hash32());
        assert!(a.equal(&fresh));
    }

    #[test]
    fn test_map_merge() {
        let mut a = string_map(&[("One", 1), ("Two", 2), ("Three", 33)]);
        let b = string_map(&[("Three", 3), ("Four", 4), ("Five", 5)]);
        a.map_merge(&b);
        assert_eq!(a.map_len(), 5);
        assert_eq!(a.map_get_i64("Three", 0), 3);
        assert_eq!(a.map_get_i64("One", 0), 1);
    }

    #[test]
    fn test_map_add_unused() {
        let mut map = string_map(&[("k", 1)]);
        assert!(!map.map_add_unused(Data::from("k"), Data::from(5i64)));
        assert_eq!(map.map_get_i64("k", 0), 1);
        assert!(map.map_add_unused(Data::from("j"), Data::from(5i64)));
        assert_eq!(map.map_len(), 2);
    }

    #[test]
    fn test_typed_map_enforces_kinds() {
        let mut map = Data::typed_map(DataKind::String, DataKind::Int64);
        map.map_insert_str("ok", Data::from(1i64));
        let r = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            map.map_insert_str("bad", Data::from("string"));
        }));
        assert!(r.is_err());
        let r = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            map.map_insert(Data::from(1u8), Data::from(1i64));
        }));
        assert!(r.is_err());
    }

    #[test]
    fn test_non_string_keys() {
        let mut map = Data::map(DataKind::UInt64);
        map.map_insert(Data::from(30u64), Data::from("c"));
        map.map_insert(Data::from(10u64), Data::from("a"));
        map.map_insert(Data::from(20u64), Data::from("b"));
        let values: Vec<&str> = map.map_iter().filter_map(|(_, v)| v.as_str()).collect();
        assert_eq!(values, vec!["a", "b", "c"]);
        assert_eq!(map.map_get(&Data::from(20u64)).and_then(Data::as_str), Some("b"));
    }

    #[test]
    fn test_map_iter_mut_replace() {
        let mut map = string_map(&[("a", 1), ("b", 2)]);
        for (_, v) in map.map_iter_mut() {
            *v = Data::from(v.as_i64().unwrap() * 10);
        }
        assert_eq!(map.map_get_i64("a", 0), 10);
        assert_eq!(map.map_get_i64("b", 0), 20);
        assert!(map.equal(&string_map(&[("a", 10), ("b", 20)])));
    }

    #[test]
    fn test_decode_base64_in_place() {
        let mut map = Data::map(DataKind::String);
        map.map_insert_str("payload", Data::from("AQID"));
        assert!(map.decode_base64(&Data::from("payload")));
        let value = map.map_get_str("payload").unwrap();
        assert_eq!(value.kind(), DataKind::Array);
        assert_eq!(value.as_bytes(), Some(&[1u8, 2, 3][..]));
        // second decode fails: no longer a string
        assert!(!map.decode_base64(&Data::from("payload")));
    }

    #[test]
    fn test_shared_map_mutation_copies() {
        let mut a = string_map(&[("k", 1)]);
        let b = a.clone();
        a.map_insert_str("j", Data::from(2i64));
        assert_eq!(a.map_len(), 2);
        assert_eq!(b.map_len(), 1);
    }

    #[test]
    fn test_map_clear() {
        let mut map = string_map(&[("a", 1), ("b", 2)]);
        map.map_clear();
        assert_eq!(map.map_len(), 0);
        assert!(map.equal(&Data::map(DataKind::String)));
    }
}
