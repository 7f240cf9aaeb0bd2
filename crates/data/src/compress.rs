//! Structural interning of equal subvalues
//!
//! Walks a container and folds every structurally equal child onto a
//! single shared instance, recursively. An external cache map (Multi key,
//! Multi value) may be supplied to intern across several roots; the cache
//! holds a reference to every interned value.

use crate::kind::DataKind;
use crate::value::{Data, Value};

fn cache_add(cache: &mut Data, slot: &mut Data) {
    if let Some(cached) = cache.map_get(slot).cloned() {
        *slot = cached;
        return;
    }
    cache.map_insert(slot.clone(), slot.clone());
    if slot.kind().is_composed() {
        compress_children(slot, cache);
    }
}

fn compress_children(data: &mut Data, cache: &mut Data) {
    let inner = data.inner_mut();
    match &mut inner.value {
        Value::Vector(v) => {
            for slot in v.slots.iter_mut().flatten() {
                cache_add(cache, slot);
            }
        }
        Value::List(l) => {
            for item in l.items.iter_mut() {
                cache_add(cache, item);
            }
        }
        Value::Map(m) => {
            // Keys are replaced with compare-equal instances only, so
            // tree order is preserved.
            m.visit_pairs_mut(&mut |key, value| {
                cache_add(cache, key);
                cache_add(cache, value);
            });
        }
        _ => {}
    }
}

impl Data {
    /// Intern equal subvalues within this container.
    pub fn compress(&mut self) {
        let mut cache = Data::typed_map(DataKind::Multi, DataKind::Multi);
        self.compress_with_cache(&mut cache);
    }

    /// Intern equal subvalues through a caller-owned cache map, allowing
    /// sharing across multiple roots. Panics unless the cache is a
    /// Multi/Multi map.
    pub fn compress_with_cache(&mut self, cache: &mut Data) {
        assert!(
            cache.kind() == DataKind::Map
                && cache.key_kind() == DataKind::Multi
                && cache.element_kind() == DataKind::Multi,
            "compress cache must be a Multi/Multi map"
        );
        if self.kind().is_composed() {
            compress_children(self, cache);
        }
    }
}
