//! In-memory settings and contact store.

use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use super::{validate_contact, ContactStore, SettingsStore, StorageError};
use crate::types::{Contact, NewContact};

/// Process-local store holding settings and contacts behind `RwLock`s.
#[derive(Debug, Default)]
pub struct MemoryStore {
    settings: RwLock<HashMap<String, String>>,
    contacts: RwLock<Vec<Contact>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let settings = self.settings.read().map_err(|_| StorageError::Poisoned)?;
        Ok(settings.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut settings = self.settings.write().map_err(|_| StorageError::Poisoned)?;
        settings.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

impl ContactStore for MemoryStore {
    fn list_contacts(&self) -> Result<Vec<Contact>, StorageError> {
        let contacts = self.contacts.read().map_err(|_| StorageError::Poisoned)?;
        Ok(contacts.clone())
    }

    fn get_contact(&self, id: Uuid) -> Result<Option<Contact>, StorageError> {
        let contacts = self.contacts.read().map_err(|_| StorageError::Poisoned)?;
        Ok(contacts.iter().find(|c| c.id == id).cloned())
    }

    fn add_contact(&self, contact: NewContact) -> Result<Uuid, StorageError> {
        validate_contact(&contact)?;
        let id = Uuid::new_v4();
        let mut contacts = self.contacts.write().map_err(|_| StorageError::Poisoned)?;
        contacts.push(contact.into_contact(id));
        Ok(id)
    }

    fn update_contact(&self, id: Uuid, contact: NewContact) -> Result<bool, StorageError> {
        validate_contact(&contact)?;
        let mut contacts = self.contacts.write().map_err(|_| StorageError::Poisoned)?;
        match contacts.iter_mut().find(|c| c.id == id) {
            Some(existing) => {
                *existing = contact.into_contact(id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove_contact(&self, id: Uuid) -> Result<bool, StorageError> {
        let mut contacts = self.contacts.write().map_err(|_| StorageError::Poisoned)?;
        let before = contacts.len();
        contacts.retain(|c| c.id != id);
        Ok(contacts.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contacts_keep_insertion_order() {
        let store = MemoryStore::new();
        let a = store.add_contact(NewContact::new("A", "1", false)).unwrap();
        let b = store.add_contact(NewContact::new("B", "2", true)).unwrap();
        let c = store.add_contact(NewContact::new("C", "3", false)).unwrap();

        let ids: Vec<Uuid> = store.list_contacts().unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![a, b, c]);
    }

    #[test]
    fn update_and_remove_report_unknown_ids() {
        let store = MemoryStore::new();
        let unknown = Uuid::new_v4();

        assert!(!store
            .update_contact(unknown, NewContact::new("X", "9", false))
            .unwrap());
        assert!(!store.remove_contact(unknown).unwrap());
    }

    #[test]
    fn update_replaces_fields_in_place() {
        let store = MemoryStore::new();
        let first = store.add_contact(NewContact::new("A", "1", false)).unwrap();
        store.add_contact(NewContact::new("B", "2", false)).unwrap();

        assert!(store
            .update_contact(first, NewContact::new("Alice", "100", true))
            .unwrap());

        let contacts = store.list_contacts().unwrap();
        assert_eq!(contacts[0].name, "Alice");
        assert_eq!(contacts[0].phone, "100");
        assert!(contacts[0].is_default);
        assert_eq!(contacts[0].id, first);
    }

    #[test]
    fn remove_deletes_contact() {
        let store = MemoryStore::new();
        let id = store.add_contact(NewContact::new("A", "1", false)).unwrap();
        assert!(store.has_contacts().unwrap());

        assert!(store.remove_contact(id).unwrap());
        assert!(!store.has_contacts().unwrap());
        assert_eq!(store.get_contact(id).unwrap(), None);
    }

    #[test]
    fn add_rejects_invalid_contact() {
        let store = MemoryStore::new();
        let result = store.add_contact(NewContact::new("", "1", false));
        assert!(matches!(result, Err(StorageError::InvalidContact(_))));
        assert!(!store.has_contacts().unwrap());
    }
}
