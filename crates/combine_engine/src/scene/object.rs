//! Scene objects
//!
//! A named, optionally tagged transform with an active flag, a component
//! registry and, for renderable objects, geometry. Whether an object is
//! renderable is fixed when it is created.

use crate::ecs::{Component, ComponentError, ComponentOwner, ComponentRegistry};
use crate::foundation::math::Transform;

use super::Renderable;

/// Entity living in a [`super::SceneGraph`]
#[derive(Debug)]
pub struct SceneObject {
    /// Name; not required to be unique
    pub name: String,
    /// Tag used by tag queries; empty when untagged
    pub tag: String,
    /// Position, Euler rotation in degrees, and scale
    pub transform: Transform,
    /// Inactive objects are skipped by updates and rendering
    pub active: bool,
    /// Extra key/value pairs carried through map files
    pub properties: Vec<(String, String)>,
    renderable: Option<Renderable>,
    components: ComponentRegistry,
}

impl SceneObject {
    /// Create a plain (non-renderable) object
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: String::new(),
            transform: Transform::default(),
            active: true,
            properties: Vec::new(),
            renderable: None,
            components: ComponentRegistry::new(),
        }
    }

    /// Create a renderable object
    pub fn with_renderable(name: impl Into<String>, renderable: Renderable) -> Self {
        let mut object = Self::new(name);
        object.renderable = Some(renderable);
        object
    }

    /// Set the tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Set the transform
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Whether this object has geometry
    pub fn is_renderable(&self) -> bool {
        self.renderable.is_some()
    }

    /// Geometry of a renderable object
    pub fn renderable(&self) -> Option<&Renderable> {
        self.renderable.as_ref()
    }

    /// Mutable geometry of a renderable object
    pub fn renderable_mut(&mut self) -> Option<&mut Renderable> {
        self.renderable.as_mut()
    }

    /// Transform and geometry borrowed together, for submission to a renderer
    pub fn render_parts(&mut self) -> Option<(&Transform, &mut Renderable)> {
        self.renderable
            .as_mut()
            .map(|renderable| (&self.transform, renderable))
    }

    /// Value of an extra property
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn split(&mut self) -> (&mut ComponentRegistry, ComponentOwner<'_>) {
        let owner = ComponentOwner {
            name: &self.name,
            tag: &self.tag,
            transform: &mut self.transform,
            renderable: self.renderable.as_mut(),
        };
        (&mut self.components, owner)
    }

    /// Attach a component; a second component of the same type is rejected
    pub fn add_component<T: Component>(&mut self, component: T) -> Result<&mut T, ComponentError> {
        let (components, mut owner) = self.split();
        components.attach(component, &mut owner)
    }

    /// Detach any existing `T`, then attach `component`
    pub fn replace_component<T: Component>(&mut self, component: T) -> Result<&mut T, ComponentError> {
        let (components, mut owner) = self.split();
        components.replace(component, &mut owner)
    }

    /// Borrow the `T` component
    pub fn component<T: Component>(&self) -> Option<&T> {
        self.components.get::<T>()
    }

    /// Mutably borrow the `T` component
    pub fn component_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.components.get_mut::<T>()
    }

    /// Whether a `T` component is attached
    pub fn has_component<T: Component>(&self) -> bool {
        self.components.has::<T>()
    }

    /// Detach and drop the `T` component; `false` if there was none
    pub fn remove_component<T: Component>(&mut self) -> bool {
        let (components, mut owner) = self.split();
        components.remove::<T>(&mut owner)
    }

    /// Enable or disable the `T` component
    pub fn set_component_enabled<T: Component>(&mut self, enabled: bool) -> Result<(), ComponentError> {
        self.components.set_enabled::<T>(enabled)
    }

    /// Whether the `T` component is enabled
    pub fn is_component_enabled<T: Component>(&self) -> Option<bool> {
        self.components.is_enabled::<T>()
    }

    /// The component registry
    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Run every enabled component's update hook
    pub fn update_components(&mut self, delta_time: f32) {
        let (components, mut owner) = self.split();
        components.update_all(&mut owner, delta_time);
    }

    /// Run every enabled component's late-update hook
    pub fn late_update_components(&mut self, delta_time: f32) {
        let (components, mut owner) = self.split();
        components.late_update_all(&mut owner, delta_time);
    }
}

impl Drop for SceneObject {
    fn drop(&mut self) {
        let (components, mut owner) = self.split();
        components.detach_all(&mut owner);
    }
}
