//! Component lifecycle and factory surface
//!
//! Core services (scheduler, worker pool, bus) are components: they carry
//! a coarse run state and expose a factory record so an external
//! container can construct them from a configuration map. The container
//! itself lives outside this crate; only its name-to-component resolution
//! is consumed here, as a trait.

use std::any::Any;
use std::sync::Arc;
use tether_data::Data;

/// Coarse component run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentState {
    Stopped,
    Running,
    /// Terminal: worker threads observing this state exit.
    Deleted,
}

/// Factory category, for container-side component listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Core,
    Extension,
}

/// Type-erased shared handle to a constructed component.
pub type ComponentRef = Arc<dyn Any + Send + Sync>;

/// The one container operation the core consumes: resolving a component
/// reference by name while configuring another component.
pub trait ComponentResolver {
    fn find_component(&self, name: &str) -> Option<ComponentRef>;
}

/// A resolver with no components, for standalone configuration.
pub struct NoComponents;

impl ComponentResolver for NoComponents {
    fn find_component(&self, _name: &str) -> Option<ComponentRef> {
        None
    }
}

/// Factory record for one component type.
pub struct ComponentFactory {
    /// Stable type name ("tether::scheduler", ...).
    pub type_name: &'static str,
    pub category: Category,
    /// Build a component from a String-keyed configuration map, resolving
    /// collaborator names through the container.
    pub configure: fn(&dyn ComponentResolver, &Data) -> Option<ComponentRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_ref_downcast() {
        let component: ComponentRef = Arc::new(42u32);
        assert_eq!(component.downcast_ref::<u32>(), Some(&42));
        assert!(component.downcast_ref::<String>().is_none());
    }

    #[test]
    fn test_no_components_resolver() {
        assert!(NoComponents.find_component("anything").is_none());
    }
}
