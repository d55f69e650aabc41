//! Directory-backed settings and contact store.
//!
//! Layout under the data directory (`~/.lockwatch/` by default):
//!
//! - `settings/<key>`: one file per setting holding its text value
//! - `contacts.json`: ordered JSON array of contacts (file mode 0600)
//!
//! Every write goes to a temporary sibling file which is then renamed over
//! the target, so readers never observe a partially written value. Because
//! each setting lives in its own file, a recorder process and the daemon
//! can update different keys concurrently without losing either write.
//!
//! # Example
//!
//! ```no_run
//! use lockwatch_monitor::store::{FileStore, SettingsStore};
//!
//! let store = FileStore::new("/home/user/.lockwatch");
//! store.set_bool("service_enabled", true).unwrap();
//! assert!(store.get_bool("service_enabled", false).unwrap());
//! ```

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use uuid::Uuid;

use super::{validate_contact, ContactStore, SettingsStore, StorageError};
use crate::types::{Contact, NewContact};

/// Subdirectory holding one file per setting.
const SETTINGS_DIR: &str = "settings";

/// Contact list filename.
const CONTACTS_FILE: &str = "contacts.json";

/// Settings and contacts persisted under a data directory.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    /// Serializes read-modify-write cycles on the contact list.
    contacts_lock: Mutex<()>,
}

impl FileStore {
    /// Creates a store rooted at `root`. Directories are created lazily on
    /// the first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            contacts_lock: Mutex::new(()),
        }
    }

    /// Returns the data directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn setting_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(SETTINGS_DIR).join(key))
    }

    fn contacts_path(&self) -> PathBuf {
        self.root.join(CONTACTS_FILE)
    }

    fn read_contacts(&self) -> Result<Vec<Contact>, StorageError> {
        let path = self.contacts_path();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StorageError::Unavailable { path, source }),
        };

        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&contents).map_err(|e| StorageError::Corrupt {
            path,
            message: e.to_string(),
        })
    }

    fn write_contacts(&self, contacts: &[Contact]) -> Result<(), StorageError> {
        let path = self.contacts_path();
        let json = serde_json::to_vec_pretty(contacts).map_err(|e| StorageError::Corrupt {
            path: path.clone(),
            message: e.to_string(),
        })?;
        write_atomic(&path, &json, Some(0o600))
    }

    /// Runs `f` over the contact list and persists the result when `f`
    /// reports a change.
    fn modify_contacts<T>(
        &self,
        f: impl FnOnce(&mut Vec<Contact>) -> (bool, T),
    ) -> Result<T, StorageError> {
        let _guard = self.contacts_lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut contacts = self.read_contacts()?;
        let (changed, result) = f(&mut contacts);
        if changed {
            self.write_contacts(&contacts)?;
        }
        Ok(result)
    }
}

impl SettingsStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.setting_path(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Unavailable { path, source }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.setting_path(key)?;
        write_atomic(&path, value.as_bytes(), None)
    }
}

impl ContactStore for FileStore {
    fn list_contacts(&self) -> Result<Vec<Contact>, StorageError> {
        self.read_contacts()
    }

    fn get_contact(&self, id: Uuid) -> Result<Option<Contact>, StorageError> {
        Ok(self.read_contacts()?.into_iter().find(|c| c.id == id))
    }

    fn add_contact(&self, contact: NewContact) -> Result<Uuid, StorageError> {
        validate_contact(&contact)?;
        let id = Uuid::new_v4();
        self.modify_contacts(|contacts| {
            contacts.push(contact.into_contact(id));
            (true, id)
        })
    }

    fn update_contact(&self, id: Uuid, contact: NewContact) -> Result<bool, StorageError> {
        validate_contact(&contact)?;
        self.modify_contacts(|contacts| match contacts.iter_mut().find(|c| c.id == id) {
            Some(existing) => {
                *existing = contact.into_contact(id);
                (true, true)
            }
            None => (false, false),
        })
    }

    fn remove_contact(&self, id: Uuid) -> Result<bool, StorageError> {
        self.modify_contacts(|contacts| {
            let before = contacts.len();
            contacts.retain(|c| c.id != id);
            let removed = contacts.len() != before;
            (removed, removed)
        })
    }
}

/// Writes `bytes` to a temporary sibling of `path` and renames it into place.
fn write_atomic(path: &Path, bytes: &[u8], mode: Option<u32>) -> Result<(), StorageError> {
    let unavailable = |source| StorageError::Unavailable {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(unavailable)?;
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("value");
    let tmp_path = path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));

    let result = (|| {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = mode {
                let mut perms = fs::metadata(&tmp_path)?.permissions();
                perms.set_mode(mode);
                fs::set_permissions(&tmp_path, perms)?;
            }
        }
        #[cfg(not(unix))]
        let _ = mode;

        fs::rename(&tmp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result.map_err(unavailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn settings_persist_across_instances() {
        let dir = TempDir::new().unwrap();
        FileStore::new(dir.path()).set_i64("last_alert_time", 99).unwrap();

        let reopened = FileStore::new(dir.path());
        assert_eq!(reopened.get_i64("last_alert_time", 0).unwrap(), 99);
    }

    #[test]
    fn missing_setting_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        assert_eq!(store.get("service_enabled").unwrap(), None);
        assert!(!store.get_bool("service_enabled", false).unwrap());
    }

    #[test]
    fn each_setting_lives_in_its_own_file() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        store.set_bool("service_enabled", true).unwrap();
        store.set_i64("last_transition_time", 5).unwrap();

        let settings = dir.path().join(SETTINGS_DIR);
        assert_eq!(
            fs::read_to_string(settings.join("service_enabled")).unwrap(),
            "true"
        );
        assert_eq!(
            fs::read_to_string(settings.join("last_transition_time")).unwrap(),
            "5"
        );
    }

    #[test]
    fn writes_leave_no_temporary_files() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        store.set("sms_template", "hello").unwrap();
        store.set("sms_template", "hello again").unwrap();

        let names: Vec<String> = fs::read_dir(dir.path().join(SETTINGS_DIR))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["sms_template".to_string()]);
    }

    #[test]
    fn rejects_keys_with_path_separators() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        for key in ["../escape", "a/b", "", "."] {
            assert!(
                matches!(store.set(key, "x"), Err(StorageError::InvalidKey(_))),
                "key {key:?} should be rejected"
            );
        }
    }

    #[test]
    fn contacts_round_trip_in_order() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let a = store.add_contact(NewContact::new("A", "1", true)).unwrap();
        let b = store.add_contact(NewContact::new("B", "2", false)).unwrap();

        let reopened = FileStore::new(dir.path());
        let contacts = reopened.list_contacts().unwrap();
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].id, a);
        assert!(contacts[0].is_default);
        assert_eq!(contacts[1].id, b);
    }

    #[test]
    fn missing_contacts_file_is_empty_list() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.list_contacts().unwrap().is_empty());
        assert!(!store.has_contacts().unwrap());
    }

    #[test]
    fn corrupt_contacts_file_is_reported() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONTACTS_FILE), "{ not json").unwrap();

        let store = FileStore::new(dir.path());
        assert!(matches!(
            store.list_contacts(),
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[test]
    fn update_and_remove_contacts() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let id = store.add_contact(NewContact::new("A", "1", false)).unwrap();

        assert!(store
            .update_contact(id, NewContact::new("Anna", "111", true))
            .unwrap());
        let updated = store.get_contact(id).unwrap().unwrap();
        assert_eq!(updated.name, "Anna");
        assert_eq!(updated.phone, "111");

        assert!(store.remove_contact(id).unwrap());
        assert!(!store.remove_contact(id).unwrap());
        assert!(store.list_contacts().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn contacts_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        store.add_contact(NewContact::new("A", "1", false)).unwrap();

        let perms = fs::metadata(dir.path().join(CONTACTS_FILE))
            .unwrap()
            .permissions();
        assert_eq!(perms.mode() & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn unwritable_root_reports_unavailable() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not a directory").unwrap();

        let store = FileStore::new(&blocker);
        assert!(matches!(
            store.set("service_enabled", "true"),
            Err(StorageError::Unavailable { .. })
        ));
    }
}
