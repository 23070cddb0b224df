//! Object identity registry.
//!
//! Maps live objects to stable string ids so specifications can refer to
//! shared collaborators as `<id:NAME>`. Identity is by reference: two `Arc`s
//! are the same object when they point at the same allocation.
//!
//! The registry also dispenses instances per type: queued one-shot
//! instances first, then an "always" instance, then an auto-synthesize
//! factory. Every mutation happens under a single mutex.

use std::any::{Any, TypeId};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Result, SpecError};

/// Always holds an `Arc<T>` for the `T` it was stored under.
type Stored = Box<dyn Any + Send + Sync>;
type Synthesizer = Arc<dyn Fn() -> Stored + Send + Sync>;

struct Registration {
    object: Stored,
    type_name: String,
}

#[derive(Default)]
struct RegistryState {
    objects: HashMap<String, Registration>,
    ids: HashMap<usize, String>,
    counters: HashMap<String, u64>,
    queued: HashMap<TypeId, VecDeque<Stored>>,
    always: HashMap<TypeId, Stored>,
    synthesizers: HashMap<TypeId, Synthesizer>,
}

/// Bidirectional id ↔ object map with per-type dispensing policies.
///
/// Construct one per test run; nothing in the crate relies on a global
/// instance.
#[derive(Default)]
pub struct IdentityRegistry {
    state: Mutex<RegistryState>,
}

impl fmt::Debug for IdentityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityRegistry").field("registered", &self.len()).finish()
    }
}

impl IdentityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `object` and returns its id.
    ///
    /// Without an explicit id, one of the form `TypeName_N` is generated.
    /// Registering an already-known object returns its original id.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Registration`] if `id` is taken by another
    /// object, if the object already has a different id, or if `id` is not
    /// a valid reference name.
    pub fn register<T>(&self, object: &Arc<T>, id: Option<&str>) -> Result<String>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.lock().register(object, id)
    }

    /// Returns the id of `object`, if it is registered.
    #[must_use]
    pub fn id_of<T: ?Sized>(&self, object: &Arc<T>) -> Option<String> {
        self.lock().ids.get(&address(object)).cloned()
    }

    /// Looks up the object registered under `id` as an `Arc<T>`.
    #[must_use]
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self, id: &str) -> Option<Arc<T>> {
        self.resolve_checked(id).ok()
    }

    /// Like [`resolve`](Self::resolve) but explains why resolution failed.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Resolution`] if the id is unknown or was
    /// registered under a different type.
    pub fn resolve_checked<T: ?Sized + Send + Sync + 'static>(&self, id: &str) -> Result<Arc<T>> {
        let state = self.lock();
        let registration =
            state.objects.get(id).ok_or_else(|| SpecError::resolution(id, "is not registered"))?;
        registration.object.downcast_ref::<Arc<T>>().cloned().ok_or_else(|| {
            SpecError::resolution(
                id,
                format!(
                    "is registered as {}, not {}",
                    registration.type_name,
                    short_type_name::<T>()
                ),
            )
        })
    }

    /// Registers `object` and queues it as a one-shot instance for `T`.
    ///
    /// # Errors
    ///
    /// Fails like [`register`](Self::register).
    pub fn set_one<T>(&self, object: Arc<T>, id: Option<&str>) -> Result<String>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let mut state = self.lock();
        let id = state.register(&object, id)?;
        state.queued.entry(TypeId::of::<T>()).or_default().push_back(Box::new(object));
        Ok(id)
    }

    /// Registers `object` and installs it as the persistent instance for `T`.
    ///
    /// # Errors
    ///
    /// Fails like [`register`](Self::register).
    pub fn set_always<T>(&self, object: Arc<T>, id: Option<&str>) -> Result<String>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let mut state = self.lock();
        let id = state.register(&object, id)?;
        state.always.insert(TypeId::of::<T>(), Box::new(object));
        Ok(id)
    }

    /// Installs a factory that synthesizes a fresh instance of `T` whenever
    /// no queued or persistent instance is available. Synthesized instances
    /// are registered with generated ids.
    pub fn set_auto<T, F>(&self, factory: F)
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        let synthesizer: Synthesizer = Arc::new(move || Box::new(factory()) as Stored);
        self.lock().synthesizers.insert(TypeId::of::<T>(), synthesizer);
    }

    /// Dispenses an instance of `T`: queued, then persistent, then
    /// synthesized. Returns `None` when no policy is configured.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Registration`] if a synthesized instance cannot
    /// be registered.
    pub fn dispense<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>> {
        let key = TypeId::of::<T>();
        let synthesizer = {
            let mut state = self.lock();
            if let Some(stored) = state.queued.get_mut(&key).and_then(VecDeque::pop_front) {
                return unpack::<T>(&stored).map(Some);
            }
            if let Some(stored) = state.always.get(&key) {
                return unpack::<T>(stored).map(Some);
            }
            match state.synthesizers.get(&key) {
                Some(synthesizer) => Arc::clone(synthesizer),
                None => return Ok(None),
            }
        };

        // The factory runs outside the lock; it may build proxies that
        // consult this registry.
        let object = unpack::<T>(&synthesizer())?;
        let id = self.register(&object, None)?;
        tracing::debug!(%id, "synthesized instance");
        Ok(Some(object))
    }

    /// Dispenses an instance of `T`, falling back to `fallback` when no
    /// policy is configured. Fallback instances are not registered.
    ///
    /// # Errors
    ///
    /// Fails like [`dispense`](Self::dispense).
    pub fn dispense_or<T, F>(&self, fallback: F) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
        F: FnOnce() -> Arc<T>,
    {
        Ok(self.dispense::<T>()?.unwrap_or_else(fallback))
    }

    /// Number of registered objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    /// Returns `true` when nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RegistryState {
    fn register<T>(&mut self, object: &Arc<T>, id: Option<&str>) -> Result<String>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let addr = address(object);
        if let Some(existing) = self.ids.get(&addr) {
            return match id {
                Some(requested) if requested != existing => Err(SpecError::Registration(format!(
                    "object is already registered as {existing:?}, cannot register it as {requested:?}"
                ))),
                _ => Ok(existing.clone()),
            };
        }

        let type_name = short_type_name::<T>();
        let id = match id {
            Some(requested) => {
                validate_id(requested)?;
                if self.objects.contains_key(requested) {
                    return Err(SpecError::Registration(format!(
                        "id {requested:?} is already used by another object"
                    )));
                }
                requested.to_string()
            }
            None => self.next_id(&type_name),
        };

        self.ids.insert(addr, id.clone());
        self.objects
            .insert(id.clone(), Registration { object: Box::new(Arc::clone(object)), type_name });
        tracing::debug!(%id, "registered object");
        Ok(id)
    }

    fn next_id(&mut self, type_name: &str) -> String {
        let counter = self.counters.entry(type_name.to_string()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{type_name}_{counter}");
            if !self.objects.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id.contains(|c: char| c.is_whitespace() || matches!(c, '<' | '>' | '"')) {
        return Err(SpecError::Registration(format!("{id:?} is not a valid object id")));
    }
    Ok(())
}

fn unpack<T: ?Sized + Send + Sync + 'static>(stored: &Stored) -> Result<Arc<T>> {
    stored.downcast_ref::<Arc<T>>().cloned().ok_or_else(|| {
        SpecError::Registration(format!("stored instance is not a {}", short_type_name::<T>()))
    })
}

/// Allocation address of the object behind an `Arc`, ignoring any vtable.
fn address<T: ?Sized>(object: &Arc<T>) -> usize {
    Arc::as_ptr(object).cast::<()>() as usize
}

/// Unqualified name of `T`: `my_crate::shop::Widget` becomes `Widget`,
/// `dyn shop::Inventory + Send` becomes `Inventory`.
#[must_use]
pub fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let full = full.strip_prefix("dyn ").unwrap_or(full);
    let head = full.split(['<', ' ']).next().unwrap_or(full);
    head.rsplit("::").next().unwrap_or(head).to_string()
}
