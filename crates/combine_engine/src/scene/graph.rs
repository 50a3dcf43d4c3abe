//! Scene graph
//!
//! Owns every scene object in a generational arena. Objects listed in the
//! scene are updated and rendered in insertion order; objects outside it
//! (freshly spawned, or removed while a handle still refers to them) stay
//! alive only as long as an [`ObjectHandle`] does.
//!
//! Handles carry a shared token per arena slot, so the number of live
//! handles is the token's reference count minus the one the slot holds.
//! Slots are validated by generation on every access; a handle to a freed
//! slot simply resolves to nothing.

use std::rc::Rc;

use slotmap::{new_key_type, SlotMap};

use super::{Renderable, SceneObject};
use crate::foundation::math::{Color, Transform};
use crate::render::{Camera, Light, RenderId, Shader};

new_key_type! {
    /// Arena key of a scene object
    pub struct ObjectId;
}

#[derive(Debug)]
struct SlotToken;

/// Shared-ownership reference to a scene object
///
/// While any handle exists the object is kept alive, even after it has
/// been removed from the scene.
#[derive(Debug, Clone)]
pub struct ObjectHandle {
    id: ObjectId,
    token: Rc<SlotToken>,
}

impl ObjectHandle {
    /// Arena key of the referenced object
    pub fn id(&self) -> ObjectId {
        self.id
    }
}

impl PartialEq for ObjectHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ObjectHandle {}

#[derive(Debug)]
struct ObjectSlot {
    object: SceneObject,
    token: Rc<SlotToken>,
    in_scene: bool,
}

impl ObjectSlot {
    fn handle_count(&self) -> usize {
        Rc::strong_count(&self.token) - 1
    }
}

/// Objects, lights, named shaders, the camera and the ambient color
#[derive(Debug)]
pub struct SceneGraph {
    slots: SlotMap<ObjectId, ObjectSlot>,
    order: Vec<ObjectId>,
    renderables: Vec<ObjectId>,
    lights: Vec<Light>,
    shaders: Vec<Shader>,
    camera: Camera,
    ambient_color: Color,
    retired: Vec<RenderId>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    /// Create an empty scene with ambient color (0.2, 0.2, 0.2)
    pub fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
            order: Vec::new(),
            renderables: Vec::new(),
            lights: Vec::new(),
            shaders: Vec::new(),
            camera: Camera::default(),
            ambient_color: Color::new(0.2, 0.2, 0.2, 1.0),
            retired: Vec::new(),
        }
    }

    /// Add an object to the scene
    pub fn add(&mut self, object: SceneObject) -> ObjectId {
        let id = self.slots.insert(ObjectSlot {
            object,
            token: Rc::new(SlotToken),
            in_scene: false,
        });
        self.insert(id);
        id
    }

    /// Store an object outside the scene and return a handle keeping it alive
    pub fn spawn(&mut self, object: SceneObject) -> ObjectHandle {
        let token = Rc::new(SlotToken);
        let id = self.slots.insert(ObjectSlot {
            object,
            token: Rc::clone(&token),
            in_scene: false,
        });
        ObjectHandle { id, token }
    }

    /// Put a stored object into the scene
    ///
    /// Returns `false` if the object is already in the scene or no longer
    /// exists.
    pub fn insert(&mut self, id: ObjectId) -> bool {
        let Some(slot) = self.slots.get_mut(id) else {
            return false;
        };
        if slot.in_scene {
            log::debug!("'{}' is already in the scene", slot.object.name);
            return false;
        }
        slot.in_scene = true;
        self.order.push(id);
        if slot.object.is_renderable() {
            self.renderables.push(id);
        }
        true
    }

    /// Take an object out of the scene
    ///
    /// The object is destroyed immediately unless a handle still refers to
    /// it. Returns `false` if it was not in the scene.
    pub fn remove(&mut self, id: ObjectId) -> bool {
        match self.slots.get_mut(id) {
            Some(slot) if slot.in_scene => slot.in_scene = false,
            _ => return false,
        }
        self.order.retain(|other| *other != id);
        self.renderables.retain(|other| *other != id);
        self.free_if_orphaned(id);
        true
    }

    /// Remove every object with this name; returns how many were removed
    pub fn remove_by_name(&mut self, name: &str) -> usize {
        let matches: Vec<ObjectId> = self
            .objects()
            .filter(|(_, object)| object.name == name)
            .map(|(id, _)| id)
            .collect();
        matches.into_iter().filter(|id| self.remove(*id)).count()
    }

    /// Remove every object and light; shaders, camera and ambient color stay
    pub fn clear(&mut self) {
        for id in std::mem::take(&mut self.order) {
            if let Some(slot) = self.slots.get_mut(id) {
                slot.in_scene = false;
            }
            self.free_if_orphaned(id);
        }
        self.renderables.clear();
        self.lights.clear();
        log::debug!("Scene cleared");
    }

    fn free_if_orphaned(&mut self, id: ObjectId) {
        let orphaned = self
            .slots
            .get(id)
            .is_some_and(|slot| !slot.in_scene && slot.handle_count() == 0);
        if orphaned {
            if let Some(slot) = self.slots.remove(id) {
                self.retire(slot);
            }
        }
    }

    fn retire(&mut self, slot: ObjectSlot) {
        if let Some(render_id) = slot.object.renderable().and_then(Renderable::render_id) {
            self.retired.push(render_id);
        }
        log::trace!("Destroyed '{}'", slot.object.name);
    }

    /// Destroy objects outside the scene that no handle refers to any more
    ///
    /// Returns how many were destroyed.
    pub fn collect_orphans(&mut self) -> usize {
        let orphans: Vec<ObjectId> = self
            .slots
            .iter()
            .filter(|(_, slot)| !slot.in_scene && slot.handle_count() == 0)
            .map(|(id, _)| id)
            .collect();
        for id in &orphans {
            if let Some(slot) = self.slots.remove(*id) {
                self.retire(slot);
            }
        }
        orphans.len()
    }

    /// Render identities of destroyed renderables since the last call
    pub fn take_retired_render_ids(&mut self) -> Vec<RenderId> {
        std::mem::take(&mut self.retired)
    }

    /// New handle to a live object
    pub fn handle(&self, id: ObjectId) -> Option<ObjectHandle> {
        self.slots.get(id).map(|slot| ObjectHandle {
            id,
            token: Rc::clone(&slot.token),
        })
    }

    /// Number of live handles to an object
    pub fn handle_count(&self, id: ObjectId) -> usize {
        self.slots.get(id).map_or(0, ObjectSlot::handle_count)
    }

    /// Borrow a live object, in the scene or not
    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.slots.get(id).map(|slot| &slot.object)
    }

    /// Mutably borrow a live object, in the scene or not
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.slots.get_mut(id).map(|slot| &mut slot.object)
    }

    /// Whether the object exists
    pub fn is_alive(&self, id: ObjectId) -> bool {
        self.slots.contains_key(id)
    }

    /// Whether the object is listed in the scene
    pub fn contains(&self, id: ObjectId) -> bool {
        self.slots.get(id).is_some_and(|slot| slot.in_scene)
    }

    /// First object in insertion order with this name
    pub fn find_by_name(&self, name: &str) -> Option<ObjectId> {
        self.objects()
            .find(|(_, object)| object.name == name)
            .map(|(id, _)| id)
    }

    /// Every object with this tag, in insertion order
    pub fn find_by_tag(&self, tag: &str) -> Vec<ObjectId> {
        self.objects()
            .filter(|(_, object)| object.tag == tag)
            .map(|(id, _)| id)
            .collect()
    }

    /// Objects in the scene, in insertion order
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &SceneObject)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.slots.get(*id).map(|slot| (*id, &slot.object)))
    }

    /// Keys of the objects in the scene, in insertion order
    pub fn object_ids(&self) -> &[ObjectId] {
        &self.order
    }

    /// Number of objects in the scene
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the scene has no objects
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of live objects, including those outside the scene
    pub fn live_count(&self) -> usize {
        self.slots.len()
    }

    /// Run component updates of every active object
    pub fn update(&mut self, delta_time: f32) {
        for id in &self.order {
            if let Some(slot) = self.slots.get_mut(*id) {
                if slot.object.active {
                    slot.object.update_components(delta_time);
                }
            }
        }
    }

    /// Run component late updates of every active object
    pub fn late_update(&mut self, delta_time: f32) {
        for id in &self.order {
            if let Some(slot) = self.slots.get_mut(*id) {
                if slot.object.active {
                    slot.object.late_update_components(delta_time);
                }
            }
        }
    }

    /// Visit every active renderable in the scene, in insertion order
    ///
    /// The visitor also receives the scene's lights and ambient color.
    pub fn for_each_renderable(&mut self, mut visit: impl FnMut(&Transform, &mut Renderable, &[Light], Color)) {
        let ambient = self.ambient_color;
        for id in &self.renderables {
            let Some(slot) = self.slots.get_mut(*id) else {
                continue;
            };
            if !slot.object.active {
                continue;
            }
            if let Some((transform, renderable)) = slot.object.render_parts() {
                visit(transform, renderable, &self.lights, ambient);
            }
        }
    }

    /// Append a light
    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    /// Scene lights
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Scene lights, mutably
    pub fn lights_mut(&mut self) -> &mut Vec<Light> {
        &mut self.lights
    }

    /// Register a named shader handle, replacing one with the same name
    pub fn add_shader(&mut self, shader: Shader) {
        self.shaders.retain(|existing| existing.name != shader.name);
        self.shaders.push(shader);
    }

    /// Shader handle by name
    pub fn shader(&self, name: &str) -> Option<&Shader> {
        self.shaders.iter().find(|shader| shader.name == name)
    }

    /// All shader handles
    pub fn shaders(&self) -> &[Shader] {
        &self.shaders
    }

    /// Active camera
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Active camera, mutably
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Ambient color
    pub fn ambient_color(&self) -> Color {
        self.ambient_color
    }

    /// Set the ambient color
    pub fn set_ambient_color(&mut self, color: Color) {
        self.ambient_color = color;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{Component, ComponentOwner};
    use std::cell::Cell;

    struct Counter(Rc<Cell<u32>>);

    impl Component for Counter {
        fn on_update(&mut self, _owner: &mut ComponentOwner<'_>, _delta_time: f32) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_name_and_tag_queries() {
        let mut scene = SceneGraph::new();
        let first = scene.add(SceneObject::new("crate").with_tag("prop"));
        scene.add(SceneObject::new("crate").with_tag("prop"));
        scene.add(SceneObject::new("player"));

        assert_eq!(scene.find_by_name("crate"), Some(first));
        assert_eq!(scene.find_by_tag("prop").len(), 2);
        assert!(scene.find_by_name("ghost").is_none());

        assert_eq!(scene.remove_by_name("crate"), 2);
        assert_eq!(scene.len(), 1);
        assert_eq!(scene.live_count(), 1);
    }

    #[test]
    fn test_inactive_objects_skip_updates() {
        let mut scene = SceneGraph::new();
        let count = Rc::new(Cell::new(0));
        let id = scene.add(SceneObject::new("idle"));
        scene
            .get_mut(id)
            .unwrap()
            .add_component(Counter(Rc::clone(&count)))
            .unwrap();

        scene.update(0.1);
        scene.get_mut(id).unwrap().active = false;
        scene.update(0.1);
        scene.late_update(0.1);

        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_handle_keeps_removed_object_alive() {
        let mut scene = SceneGraph::new();
        let id = scene.add(SceneObject::with_renderable("cube", Renderable::cube()));
        let handle = scene.handle(id).unwrap();
        assert_eq!(scene.handle_count(id), 1);

        assert!(scene.remove(id));
        assert!(scene.is_alive(id));
        assert!(!scene.contains(id));
        assert_eq!(scene.collect_orphans(), 0);

        let copy = handle.clone();
        drop(handle);
        assert_eq!(scene.collect_orphans(), 0);
        drop(copy);
        assert_eq!(scene.collect_orphans(), 1);
        assert!(!scene.is_alive(id));
        assert!(scene.get(id).is_none());
    }

    #[test]
    fn test_spawned_object_can_be_inserted_once() {
        let mut scene = SceneGraph::new();
        let handle = scene.spawn(SceneObject::new("late"));
        assert!(scene.is_empty());

        assert!(scene.insert(handle.id()));
        assert!(!scene.insert(handle.id()));
        assert_eq!(scene.len(), 1);

        drop(handle);
        assert_eq!(scene.collect_orphans(), 0);
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn test_destroyed_renderables_report_render_ids() {
        let mut scene = SceneGraph::new();
        let id = scene.add(SceneObject::with_renderable("cube", Renderable::cube()));
        scene
            .get_mut(id)
            .and_then(SceneObject::renderable_mut)
            .unwrap()
            .bind_render_id(RenderId::new(9));

        scene.clear();
        assert_eq!(scene.take_retired_render_ids(), vec![RenderId::new(9)]);
        assert!(scene.take_retired_render_ids().is_empty());
    }

    #[test]
    fn test_clear_keeps_shaders() {
        let mut scene = SceneGraph::new();
        scene.add(SceneObject::new("a"));
        scene.add_light(Light::default());
        scene.add_shader(Shader::new("toon", "toon.vert", "toon.frag"));
        scene.clear();

        assert!(scene.is_empty());
        assert!(scene.lights().is_empty());
        assert!(scene.shader("toon").is_some());
    }

    #[test]
    fn test_for_each_renderable_skips_plain_and_inactive() {
        let mut scene = SceneGraph::new();
        scene.add(SceneObject::new("empty"));
        scene.add(SceneObject::with_renderable("visible", Renderable::cube()));
        let hidden = scene.add(SceneObject::with_renderable("hidden", Renderable::cube()));
        scene.get_mut(hidden).unwrap().active = false;
        scene.add_light(Light::default());

        let mut visited = 0;
        scene.for_each_renderable(|_, renderable, lights, _| {
            renderable.mark_clean();
            assert_eq!(lights.len(), 1);
            visited += 1;
        });
        assert_eq!(visited, 1);
    }
}
