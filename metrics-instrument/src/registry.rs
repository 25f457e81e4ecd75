use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::debug;

use crate::interceptor::Wrapper;
use crate::{
    ConfigurationError, Instrumentation, InstrumentationKey, Method, MethodKey, NotFoundError,
};

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Returns the process-wide registry.
pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// Type-erased access to the wrapper chain of a [`Method`].
pub(crate) trait Slot: Send + Sync {
    /// Removes the wrapper installed under `key`, returning `false` if there is none.
    fn uninstall(&self, key: &InstrumentationKey) -> bool;

    /// Returns the number of installed wrappers.
    fn depth(&self) -> usize;
}

struct Installed {
    slot: &'static dyn Slot,
    keys: Vec<InstrumentationKey>,
}

impl Installed {
    fn is_slot(&self, slot: &'static dyn Slot) -> bool {
        let installed = self.slot as *const dyn Slot as *const ();
        std::ptr::eq(installed, slot as *const dyn Slot as *const ())
    }
}

/// Handle to an installed instrumentation.
///
/// Dropping the handle does not remove the instrumentation: it stays installed until explicitly removed, either through
/// [`Handle::unregister`] or through the [`Registry`] with the same key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Handle {
    key: InstrumentationKey,
}

impl Handle {
    /// Returns the key of the installed instrumentation.
    pub fn key(&self) -> &InstrumentationKey {
        &self.key
    }

    /// Removes the instrumentation from the process-wide registry.
    ///
    /// # Errors
    ///
    /// If the instrumentation was already removed, an error is returned.
    pub fn unregister(self) -> Result<(), NotFoundError> {
        registry().unregister(&self.key)
    }
}

/// Table of installed instrumentations.
///
/// The registry tracks, per method, the keys of every installed instrumentation, and serializes every change to the
/// wrapper chains. Calls to instrumented methods never touch the registry.
pub struct Registry {
    installed: Mutex<IndexMap<MethodKey, Installed>>,
}

impl Registry {
    fn new() -> Self {
        Registry { installed: Mutex::new(IndexMap::new()) }
    }

    /// Installs `instrumentation` around `method`.
    ///
    /// The new wrapper becomes the outermost one. Other instrumentations already installed on the method keep firing.
    ///
    /// # Errors
    ///
    /// If the instrumentation is invalid, or an instrumentation with the same key is already installed, an error is
    /// returned and nothing is installed.
    pub fn register<R, A, T, E, Y>(
        &self,
        method: &'static Method<R, A, T, E, Y>,
        instrumentation: Instrumentation<R, A, T, E>,
    ) -> Result<Handle, ConfigurationError>
    where
        R: ?Sized + 'static,
        A: 'static,
        T: 'static,
        E: 'static,
        Y: 'static,
    {
        instrumentation.validate()?;

        let method_key = method.key();
        let kind = instrumentation.kind();
        let key = InstrumentationKey::new(method_key, kind, instrumentation.name());
        let slot: &'static dyn Slot = method;

        let mut installed = self.installed.lock();
        if let Some(entry) = installed.get(&method_key) {
            if !entry.is_slot(slot) {
                return Err(ConfigurationError::MethodConflict { method: method_key });
            }
            if entry.keys.contains(&key) {
                return Err(ConfigurationError::Duplicate { key });
            }
        }

        method.install(Wrapper::new(key.clone(), instrumentation));
        let entry = installed.entry(method_key);
        entry.or_insert_with(|| Installed { slot, keys: Vec::new() }).keys.push(key.clone());

        debug!(instrumentation = %key, depth = slot.depth(), "Installed instrumentation.");

        Ok(Handle { key })
    }

    /// Removes the instrumentation installed under `key`.
    ///
    /// The wrappers above and below it are relinked, in whatever order instrumentations are removed. Once the last
    /// instrumentation of a method is removed, calls go straight to the original implementation again.
    ///
    /// # Errors
    ///
    /// If no instrumentation is installed under `key`, an error is returned and nothing changes.
    pub fn unregister(&self, key: &InstrumentationKey) -> Result<(), NotFoundError> {
        let mut installed = self.installed.lock();

        let method_key = key.method();
        let Some(entry) = installed.get_mut(&method_key) else {
            return Err(NotFoundError::new(key.clone()));
        };
        let Some(position) = entry.keys.iter().position(|k| k == key) else {
            return Err(NotFoundError::new(key.clone()));
        };
        if !entry.slot.uninstall(key) {
            return Err(NotFoundError::new(key.clone()));
        }

        entry.keys.remove(position);
        let depth = entry.slot.depth();
        if entry.keys.is_empty() {
            installed.shift_remove(&method_key);
        }

        debug!(instrumentation = %key, depth, "Removed instrumentation.");

        Ok(())
    }

    /// Returns the keys of all installed instrumentations.
    ///
    /// Keys are grouped by method, in the order methods were first instrumented, and in registration order within a
    /// method.
    pub fn instrumentations(&self) -> Vec<InstrumentationKey> {
        self.installed.lock().values().flat_map(|entry| entry.keys.iter().cloned()).collect()
    }

    /// Returns `true` if at least one instrumentation is installed on `method`.
    pub fn is_instrumented(&self, method: &MethodKey) -> bool {
        self.installed.lock().contains_key(method)
    }

    /// Removes every installed instrumentation, returning how many were removed.
    pub fn clear(&self) -> usize {
        let mut installed = self.installed.lock();

        let mut removed = 0;
        for (_, entry) in installed.drain(..) {
            for key in entry.keys.iter().rev() {
                if entry.slot.uninstall(key) {
                    removed += 1;
                }
            }
        }

        debug!(removed, "Cleared all instrumentations.");

        removed
    }
}
