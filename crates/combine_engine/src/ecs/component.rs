//! Component trait and the per-object component registry
//!
//! A scene object holds at most one component of any concrete type. The
//! registry stores them type-erased, keyed by [`TypeId`], in attach order so
//! both update passes of a frame visit components in the same order.

use std::any::{Any, TypeId};

use crate::foundation::math::Transform;
use crate::scene::Renderable;

/// Upcast helper so boxed components can be downcast to their concrete type
pub trait AsAny: Any {
    /// Borrow as `Any`
    fn as_any(&self) -> &dyn Any;

    /// Mutably borrow as `Any`
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Behaviour attached to a scene object
///
/// Every hook receives the owning object's state through [`ComponentOwner`];
/// components never hold a pointer to their owner themselves.
pub trait Component: AsAny {
    /// Called once after the component is stored
    fn on_attach(&mut self, _owner: &mut ComponentOwner<'_>) {}

    /// Called once before the component is dropped
    fn on_detach(&mut self, _owner: &mut ComponentOwner<'_>) {}

    /// Called every frame while the component is enabled and its owner active
    fn on_update(&mut self, _owner: &mut ComponentOwner<'_>, _delta_time: f32) {}

    /// Called after all scripts have run for the frame
    fn on_late_update(&mut self, _owner: &mut ComponentOwner<'_>, _delta_time: f32) {}
}

/// Borrowed view of the scene object a component belongs to
pub struct ComponentOwner<'a> {
    /// Owner name
    pub name: &'a str,
    /// Owner tag, empty when untagged
    pub tag: &'a str,
    /// Owner transform
    pub transform: &'a mut Transform,
    /// Owner geometry, for renderable objects
    pub renderable: Option<&'a mut Renderable>,
}

/// Component registry errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ComponentError {
    /// A component of this type is already attached
    #[error("component {0} is already attached")]
    AlreadyAttached(&'static str),

    /// No component of this type is attached
    #[error("component {0} is not attached")]
    NotAttached(&'static str),
}

struct Slot {
    type_id: TypeId,
    type_name: &'static str,
    enabled: bool,
    component: Box<dyn Component>,
}

/// Type-indexed, single-slot component storage with lifecycle hooks
#[derive(Default)]
pub struct ComponentRegistry {
    slots: Vec<Slot>,
}

impl ComponentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn position<T: Component>(&self) -> Option<usize> {
        let type_id = TypeId::of::<T>();
        self.slots.iter().position(|slot| slot.type_id == type_id)
    }

    /// Attach a component and run its attach hook
    ///
    /// Attaching a second component of a type that is already present is
    /// rejected; use [`ComponentRegistry::replace`] to swap one in.
    pub fn attach<T: Component>(
        &mut self,
        component: T,
        owner: &mut ComponentOwner<'_>,
    ) -> Result<&mut T, ComponentError> {
        if self.position::<T>().is_some() {
            return Err(ComponentError::AlreadyAttached(std::any::type_name::<T>()));
        }
        self.store(component, owner)
    }

    /// Detach any existing component of this type, then attach the new one
    pub fn replace<T: Component>(
        &mut self,
        component: T,
        owner: &mut ComponentOwner<'_>,
    ) -> Result<&mut T, ComponentError> {
        self.remove::<T>(owner);
        self.store(component, owner)
    }

    fn store<T: Component>(
        &mut self,
        component: T,
        owner: &mut ComponentOwner<'_>,
    ) -> Result<&mut T, ComponentError> {
        let index = self.slots.len();
        self.slots.push(Slot {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            enabled: true,
            component: Box::new(component),
        });

        let type_name = std::any::type_name::<T>();
        let slot = &mut self.slots[index];
        slot.component.on_attach(owner);
        log::trace!("Attached component {} to '{}'", type_name, owner.name);

        AsAny::as_any_mut(&mut *slot.component)
            .downcast_mut::<T>()
            .ok_or(ComponentError::NotAttached(type_name))
    }

    /// Borrow the component of type `T`
    pub fn get<T: Component>(&self) -> Option<&T> {
        let index = self.position::<T>()?;
        AsAny::as_any(&*self.slots[index].component).downcast_ref::<T>()
    }

    /// Mutably borrow the component of type `T`
    pub fn get_mut<T: Component>(&mut self) -> Option<&mut T> {
        let index = self.position::<T>()?;
        AsAny::as_any_mut(&mut *self.slots[index].component).downcast_mut::<T>()
    }

    /// Whether a component of type `T` is attached
    pub fn has<T: Component>(&self) -> bool {
        self.position::<T>().is_some()
    }

    /// Run the detach hook of the `T` component, then drop it
    ///
    /// Returns `false` when no such component was attached.
    pub fn remove<T: Component>(&mut self, owner: &mut ComponentOwner<'_>) -> bool {
        let Some(index) = self.position::<T>() else {
            return false;
        };
        let mut slot = self.slots.remove(index);
        slot.component.on_detach(owner);
        log::trace!("Detached component {} from '{}'", slot.type_name, owner.name);
        true
    }

    /// Enable or disable the `T` component
    pub fn set_enabled<T: Component>(&mut self, enabled: bool) -> Result<(), ComponentError> {
        let index = self
            .position::<T>()
            .ok_or(ComponentError::NotAttached(std::any::type_name::<T>()))?;
        self.slots[index].enabled = enabled;
        Ok(())
    }

    /// Whether the `T` component is enabled, or `None` if it is not attached
    pub fn is_enabled<T: Component>(&self) -> Option<bool> {
        self.position::<T>().map(|index| self.slots[index].enabled)
    }

    /// Run `on_update` on every enabled component
    pub fn update_all(&mut self, owner: &mut ComponentOwner<'_>, delta_time: f32) {
        for slot in self.slots.iter_mut().filter(|slot| slot.enabled) {
            slot.component.on_update(owner, delta_time);
        }
    }

    /// Run `on_late_update` on every enabled component
    pub fn late_update_all(&mut self, owner: &mut ComponentOwner<'_>, delta_time: f32) {
        for slot in self.slots.iter_mut().filter(|slot| slot.enabled) {
            slot.component.on_late_update(owner, delta_time);
        }
    }

    /// Detach and drop every component, most recently attached first
    pub fn detach_all(&mut self, owner: &mut ComponentOwner<'_>) {
        while let Some(mut slot) = self.slots.pop() {
            slot.component.on_detach(owner);
        }
    }

    /// Number of attached components
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no component is attached
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Type names of the attached components, in attach order
    pub fn type_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.slots.iter().map(|slot| slot.type_name)
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.type_names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Counters {
        attached: Cell<u32>,
        detached: Cell<u32>,
        updated: Cell<u32>,
        late: Cell<u32>,
    }

    struct Probe {
        counters: Rc<Counters>,
        value: i32,
    }

    impl Component for Probe {
        fn on_attach(&mut self, _owner: &mut ComponentOwner<'_>) {
            self.counters.attached.set(self.counters.attached.get() + 1);
        }

        fn on_detach(&mut self, _owner: &mut ComponentOwner<'_>) {
            self.counters.detached.set(self.counters.detached.get() + 1);
        }

        fn on_update(&mut self, owner: &mut ComponentOwner<'_>, delta_time: f32) {
            self.counters.updated.set(self.counters.updated.get() + 1);
            owner.transform.position.x += delta_time;
        }

        fn on_late_update(&mut self, _owner: &mut ComponentOwner<'_>, _delta_time: f32) {
            self.counters.late.set(self.counters.late.get() + 1);
        }
    }

    struct Marker;

    impl Component for Marker {}

    fn probe(counters: &Rc<Counters>, value: i32) -> Probe {
        Probe {
            counters: Rc::clone(counters),
            value,
        }
    }

    #[test]
    fn test_attach_get_remove() {
        let counters = Rc::new(Counters::default());
        let mut transform = Transform::default();
        let mut owner = ComponentOwner {
            name: "probe",
            tag: "",
            transform: &mut transform,
            renderable: None,
        };
        let mut registry = ComponentRegistry::new();

        registry.attach(probe(&counters, 7), &mut owner).unwrap().value = 8;
        assert_eq!(counters.attached.get(), 1);
        assert_eq!(registry.get::<Probe>().map(|p| p.value), Some(8));
        assert!(registry.has::<Probe>());
        assert!(!registry.has::<Marker>());

        assert!(registry.remove::<Probe>(&mut owner));
        assert!(!registry.has::<Probe>());
        assert_eq!(counters.detached.get(), 1);
        assert!(!registry.remove::<Probe>(&mut owner));
        assert_eq!(counters.detached.get(), 1);
    }

    #[test]
    fn test_double_attach_rejected() {
        let counters = Rc::new(Counters::default());
        let mut transform = Transform::default();
        let mut owner = ComponentOwner {
            name: "probe",
            tag: "",
            transform: &mut transform,
            renderable: None,
        };
        let mut registry = ComponentRegistry::new();

        registry.attach(probe(&counters, 1), &mut owner).unwrap();
        let second = registry.attach(probe(&counters, 2), &mut owner);
        assert!(matches!(second, Err(ComponentError::AlreadyAttached(_))));
        assert_eq!(registry.get::<Probe>().map(|p| p.value), Some(1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_replace_detaches_previous() {
        let counters = Rc::new(Counters::default());
        let mut transform = Transform::default();
        let mut owner = ComponentOwner {
            name: "probe",
            tag: "",
            transform: &mut transform,
            renderable: None,
        };
        let mut registry = ComponentRegistry::new();

        registry.attach(probe(&counters, 1), &mut owner).unwrap();
        registry.replace(probe(&counters, 2), &mut owner).unwrap();
        assert_eq!(counters.attached.get(), 2);
        assert_eq!(counters.detached.get(), 1);
        assert_eq!(registry.get::<Probe>().map(|p| p.value), Some(2));
    }

    #[test]
    fn test_disabled_components_skipped() {
        let counters = Rc::new(Counters::default());
        let mut transform = Transform::default();
        let mut owner = ComponentOwner {
            name: "probe",
            tag: "",
            transform: &mut transform,
            renderable: None,
        };
        let mut registry = ComponentRegistry::new();

        registry.attach(probe(&counters, 1), &mut owner).unwrap();
        registry.update_all(&mut owner, 0.5);
        registry.late_update_all(&mut owner, 0.5);
        registry.set_enabled::<Probe>(false).unwrap();
        for _ in 0..10 {
            registry.update_all(&mut owner, 0.5);
            registry.late_update_all(&mut owner, 0.5);
        }

        assert_eq!(registry.is_enabled::<Probe>(), Some(false));
        assert_eq!(counters.updated.get(), 1);
        assert_eq!(counters.late.get(), 1);
        assert!((owner.transform.position.x - 0.5).abs() < f32::EPSILON);
        assert!(registry.set_enabled::<Marker>(true).is_err());
    }

    #[test]
    fn test_detach_all() {
        let counters = Rc::new(Counters::default());
        let mut transform = Transform::default();
        let mut owner = ComponentOwner {
            name: "probe",
            tag: "",
            transform: &mut transform,
            renderable: None,
        };
        let mut registry = ComponentRegistry::new();

        registry.attach(probe(&counters, 1), &mut owner).unwrap();
        registry.attach(Marker, &mut owner).unwrap();
        registry.detach_all(&mut owner);

        assert!(registry.is_empty());
        assert_eq!(counters.detached.get(), 1);
    }
}
