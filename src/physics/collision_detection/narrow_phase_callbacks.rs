use std::fmt;

use super::contact_manifold::ManifoldPoint;
use crate::physics::constraints::contact::ConstraintPersistentData;
use crate::physics::handles::ObjectHandle;

/// Identifies the two features a new contact was generated between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactAddedInfo {
    pub object0: ObjectHandle,
    pub part_id0: i32,
    pub index0: i32,
    pub object1: ObjectHandle,
    pub part_id1: i32,
    pub index1: i32,
}

/// Invoked for each contact added to a pair where either object requested custom materials.
/// May rewrite `combined_friction` / `combined_restitution`; the return value reports whether
/// the point was modified.
pub type ContactAddedCallback = Box<dyn FnMut(&mut ManifoldPoint, &ContactAddedInfo) -> bool>;

/// Invoked with the solver payload of a contact that is removed from its manifold.
pub type ContactDestroyedCallback = Box<dyn FnMut(&ConstraintPersistentData)>;

/// Defines handlers for narrow phase events.
#[derive(Default)]
pub struct ContactCallbacks {
    pub contact_added: Option<ContactAddedCallback>,
    pub contact_destroyed: Option<ContactDestroyedCallback>,
    destroyed_payloads: u64,
}

impl ContactCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contact_added<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&mut ManifoldPoint, &ContactAddedInfo) -> bool + 'static,
    {
        self.contact_added = Some(Box::new(callback));
        self
    }

    pub fn with_contact_destroyed<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&ConstraintPersistentData) + 'static,
    {
        self.contact_destroyed = Some(Box::new(callback));
        self
    }

    /// Runs the contact-added hook, if any. Returns whether the point was modified.
    #[inline]
    pub fn notify_contact_added(&mut self, point: &mut ManifoldPoint, info: &ContactAddedInfo) -> bool {
        match self.contact_added.as_mut() {
            Some(callback) => callback(point, info),
            None => false,
        }
    }

    /// Drops the solver payload of `point`, reporting it to the contact-destroyed hook.
    pub fn clear_user_cache(&mut self, point: &mut ManifoldPoint) {
        if let Some(data) = point.persistent_data.take() {
            self.destroyed_payloads += 1;
            if let Some(callback) = self.contact_destroyed.as_mut() {
                callback(&data);
            }
        }
    }

    /// Number of solver payloads invalidated so far.
    #[inline]
    pub fn destroyed_payloads(&self) -> u64 {
        self.destroyed_payloads
    }
}

impl fmt::Debug for ContactCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContactCallbacks")
            .field("contact_added", &self.contact_added.is_some())
            .field("contact_destroyed", &self.contact_destroyed.is_some())
            .field("destroyed_payloads", &self.destroyed_payloads)
            .finish()
    }
}
