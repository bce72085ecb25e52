//! The engine-side object space.
//!
//! A generational-index arena of script objects. Each slot carries a
//! generation counter so freed-and-recycled slots invalidate old handles
//! instead of aliasing the new occupant. Objects are either plain
//! (property map) or arrays (element vector), and may carry a bound native
//! instance in an internal slot that script code can never touch directly.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Weak;

use bitflags::bitflags;
use rustc_hash::FxHashMap;

use crate::class::ClassCore;
use crate::value::{ObjectHandle, Value};

bitflags! {
    /// Property attributes, honored by the engine's property path.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PropertyAttributes: u8 {
        const READ_ONLY   = 0b001;
        const DONT_ENUM   = 0b010;
        const DONT_DELETE = 0b100;
    }
}

impl Default for PropertyAttributes {
    fn default() -> Self {
        PropertyAttributes::empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Plain,
    Array,
}

/// The internal slot linking a script object to its bound native instance.
///
/// The strong reference lives in the owning class's instance tracker; the
/// object only holds a weak one, so a disposed instance fails to upgrade
/// instead of reading freed state.
pub(crate) struct BoundInstance {
    pub instance: Weak<dyn Any>,
    pub class: Weak<RefCell<ClassCore>>,
    /// Identity key in the owning class's instance tracker.
    pub id: usize,
    pub type_name: &'static str,
}

struct PropertySlot {
    value: Value,
    attrs: PropertyAttributes,
}

/// One script object: a property map, array elements when the object is an
/// array, and the optional bound native instance.
pub struct ScriptObject {
    kind: ObjectKind,
    properties: FxHashMap<String, PropertySlot>,
    elements: Vec<Value>,
    pub(crate) bound: Option<BoundInstance>,
}

impl ScriptObject {
    fn new(kind: ObjectKind) -> Self {
        ScriptObject {
            kind,
            properties: FxHashMap::default(),
            elements: Vec::new(),
            bound: None,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name).map(|slot| &slot.value)
    }

    pub fn property_attrs(&self, name: &str) -> Option<PropertyAttributes> {
        self.properties.get(name).map(|slot| slot.attrs)
    }

    /// Store a property, rejecting writes to READ_ONLY slots. Returns
    /// false when the write was rejected.
    pub fn set_property(&mut self, name: &str, value: Value) -> bool {
        if let Some(slot) = self.properties.get_mut(name) {
            if slot.attrs.contains(PropertyAttributes::READ_ONLY) {
                return false;
            }
            slot.value = value;
            return true;
        }
        self.define_property(name, value, PropertyAttributes::empty());
        true
    }

    /// (Re)define a property with explicit attributes, ignoring READ_ONLY
    /// on the existing slot. This is the registration-time path.
    pub fn define_property(&mut self, name: &str, value: Value, attrs: PropertyAttributes) {
        self.properties
            .insert(name.to_string(), PropertySlot { value, attrs });
    }

    pub fn delete_property(&mut self, name: &str) -> bool {
        match self.properties.get(name) {
            Some(slot) if slot.attrs.contains(PropertyAttributes::DONT_DELETE) => false,
            Some(_) => {
                self.properties.remove(name);
                true
            }
            None => false,
        }
    }

    /// Own enumerable properties, in map order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties
            .iter()
            .filter(|(_, slot)| !slot.attrs.contains(PropertyAttributes::DONT_ENUM))
            .map(|(name, slot)| (name.as_str(), &slot.value))
    }

    pub fn elements(&self) -> &[Value] {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut Vec<Value> {
        &mut self.elements
    }

    pub fn has_bound_instance(&self) -> bool {
        self.bound.is_some()
    }
}

struct Slot {
    generation: u32,
    entry: Option<ScriptObject>,
}

/// Generational arena of script objects.
pub struct ObjectSpace {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl ObjectSpace {
    pub fn new() -> Self {
        ObjectSpace {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn alloc(&mut self, kind: ObjectKind) -> ObjectHandle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(ScriptObject::new(kind));
            ObjectHandle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                entry: Some(ScriptObject::new(kind)),
            });
            ObjectHandle {
                index,
                generation: 0,
            }
        }
    }

    pub fn alloc_array(&mut self, elements: Vec<Value>) -> ObjectHandle {
        let handle = self.alloc(ObjectKind::Array);
        if let Some(obj) = self.get_mut(handle) {
            obj.elements = elements;
        }
        handle
    }

    pub fn get(&self, handle: ObjectHandle) -> Option<&ScriptObject> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    pub fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut ScriptObject> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    /// Free the slot and bump its generation; stale handles stop resolving.
    pub fn free(&mut self, handle: ObjectHandle) -> bool {
        let Some(slot) = self.slots.get_mut(handle.index as usize) else {
            return false;
        };
        if slot.generation != handle.generation || slot.entry.is_none() {
            return false;
        }
        slot.entry = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        true
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.entry.is_some()).count()
    }
}

impl Default for ObjectSpace {
    fn default() -> Self {
        Self::new()
    }
}
