use std::{fmt, sync::Arc};

use arc_swap::ArcSwapOption;
use parking_lot::{const_mutex, Mutex};

use crate::interceptor::{Dispatched, Wrapper};
use crate::{
    registry, registry::Slot, ConfigurationError, Handle, Instrumentation, InstrumentationError,
    InstrumentationKey, MethodKey, MetricKind, NameSpecId, NotFoundError, Target,
};

/// An optional trailing callback passed to an instrumented method.
///
/// Wrappers never call the block themselves: it is handed untouched to the original implementation, which decides if
/// and when it runs.
pub type Block<'b, Y> = &'b mut dyn FnMut() -> Y;

/// The original implementation of an instrumentable method.
pub type Original<R, A, T, E, Y> = for<'b> fn(&R, &A, Option<Block<'b, Y>>) -> Result<T, E>;

/// A node of the wrapper chain.
///
/// Nodes are immutable once published. Removing a node rebuilds the nodes above it, so a call that already loaded the
/// chain keeps running against the chain it saw.
struct Link<R: ?Sized, A, T, E> {
    wrapper: Arc<Wrapper<R, A, T, E>>,
    inner: Option<Arc<Link<R, A, T, E>>>,
}

impl<R: ?Sized, A, T, E> Link<R, A, T, E> {
    /// Returns the chain starting at `link` with the node for `key` removed, or `None` if no node matches.
    fn without(link: Option<&Arc<Self>>, key: &InstrumentationKey) -> Option<Option<Arc<Self>>> {
        let link = link?;
        if link.wrapper.key() == key {
            return Some(link.inner.clone());
        }

        let inner = Self::without(link.inner.as_ref(), key)?;
        Some(Some(Arc::new(Link { wrapper: Arc::clone(&link.wrapper), inner })))
    }

    fn depth(link: Option<&Arc<Self>>) -> usize {
        let mut depth = 0;
        let mut current = link;
        while let Some(link) = current {
            depth += 1;
            current = link.inner.as_ref();
        }
        depth
    }
}

/// An instrumentable method.
///
/// A `Method` is the dispatch point for a single method of a type. It holds the original implementation, captured as a
/// plain function pointer, and the chain of wrappers currently installed around it. Methods are meant to be declared as
/// `static`s next to the type they belong to, with the method on the type forwarding to [`call`][Self::call]:
///
/// ```
/// use metrics_instrument::{InstrumentationError, Method, Target};
///
/// pub trait Datastore {
///     fn insert(&self, key: &str, value: &str) -> Result<bool, InstrumentationError>
///     where
///         Self: Sized + 'static,
///     {
///         INSERT.call(self as &dyn Datastore, &(key.to_string(), value.to_string()))
///     }
/// }
///
/// static INSERT: Method<dyn Datastore, (String, String), bool, InstrumentationError> =
///     Method::new(Target::of::<dyn Datastore>, "insert", |_, (key, _), _| Ok(!key.is_empty()));
///
/// struct Memory;
/// impl Datastore for Memory {}
///
/// assert_eq!(Memory.insert("a", "b").unwrap(), true);
/// ```
///
/// With no instrumentation installed, a call goes straight to the original implementation. Each installed
/// instrumentation wraps the implementation beneath it, the most recently registered one being the outermost.
pub struct Method<R: ?Sized, A, T, E, Y = ()> {
    target: fn() -> Target,
    name: &'static str,
    original: Original<R, A, T, E, Y>,
    chain: ArcSwapOption<Link<R, A, T, E>>,
    lock: Mutex<()>,
}

impl<R: ?Sized, A, T, E, Y> Method<R, A, T, E, Y> {
    /// Creates a new `Method`.
    ///
    /// `target` is called whenever the method key is needed, and is usually [`Target::of`] or [`Target::singleton`]
    /// instantiated for the receiver type.
    pub const fn new(
        target: fn() -> Target,
        name: &'static str,
        original: Original<R, A, T, E, Y>,
    ) -> Self {
        Method {
            target,
            name,
            original,
            chain: ArcSwapOption::const_empty(),
            lock: const_mutex(()),
        }
    }

    /// Returns the key identifying this method.
    pub fn key(&self) -> MethodKey {
        MethodKey::new((self.target)(), self.name)
    }

    /// Returns the name of this method.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if at least one instrumentation is installed.
    pub fn is_instrumented(&self) -> bool {
        self.chain.load().is_some()
    }

    /// Returns the number of installed instrumentations.
    pub fn depth(&self) -> usize {
        let head = self.chain.load();
        Link::depth(Option::as_ref(&head))
    }

    /// Calls the method.
    ///
    /// # Errors
    ///
    /// Errors from the original implementation are returned unchanged. If an installed instrumentation fails to resolve
    /// its metric name or tags, the original implementation is not called, no instrumentation emits anything for the
    /// call, and the resolution error is returned.
    pub fn call(&self, receiver: &R, args: &A) -> Result<T, E>
    where
        E: From<InstrumentationError>,
    {
        self.call_with_block(receiver, args, None)
    }

    /// Calls the method, passing along a block.
    ///
    /// # Errors
    ///
    /// Same as [`call`][Self::call].
    pub fn call_with_block(
        &self,
        receiver: &R,
        args: &A,
        block: Option<Block<'_, Y>>,
    ) -> Result<T, E>
    where
        E: From<InstrumentationError>,
    {
        let head = self.chain.load_full();
        match self.dispatch(head.as_deref(), receiver, args, block) {
            Ok(result) => result,
            Err(e) => Err(E::from(e)),
        }
    }

    fn dispatch(
        &self,
        link: Option<&Link<R, A, T, E>>,
        receiver: &R,
        args: &A,
        block: Option<Block<'_, Y>>,
    ) -> Dispatched<T, E> {
        match link {
            None => Ok((self.original)(receiver, args, block)),
            Some(link) => link.wrapper.intercept(receiver, args, || {
                self.dispatch(link.inner.as_deref(), receiver, args, block)
            }),
        }
    }

    pub(crate) fn install(&self, wrapper: Wrapper<R, A, T, E>) {
        let _guard = self.lock.lock();
        let inner = self.chain.load_full();
        self.chain.store(Some(Arc::new(Link { wrapper: Arc::new(wrapper), inner })));
    }

    pub(crate) fn uninstall(&self, key: &InstrumentationKey) -> bool {
        let _guard = self.lock.lock();
        let head = self.chain.load_full();
        match Link::without(head.as_ref(), key) {
            Some(head) => {
                self.chain.store(head);
                true
            }
            None => false,
        }
    }
}

impl<R, A, T, E, Y> Method<R, A, T, E, Y>
where
    R: ?Sized + 'static,
    A: 'static,
    T: 'static,
    E: 'static,
    Y: 'static,
{
    fn register(
        &'static self,
        expected: MetricKind,
        instrumentation: Instrumentation<R, A, T, E>,
    ) -> Result<Handle, ConfigurationError> {
        let actual = instrumentation.kind();
        if actual != expected {
            return Err(ConfigurationError::KindMismatch { expected, actual });
        }
        registry().register(self, instrumentation)
    }

    fn unregister(&self, kind: MetricKind, name: NameSpecId) -> Result<(), NotFoundError> {
        registry().unregister(&InstrumentationKey::new(self.key(), kind, name))
    }

    /// Installs a [`count`][Instrumentation::count] instrumentation in the process-wide registry.
    ///
    /// # Errors
    ///
    /// If the instrumentation was built for another kind, is invalid, or is already installed, an error is returned and
    /// nothing is installed.
    pub fn count(
        &'static self,
        instrumentation: Instrumentation<R, A, T, E>,
    ) -> Result<Handle, ConfigurationError> {
        self.register(MetricKind::Count, instrumentation)
    }

    /// Installs a [`count_if`][Instrumentation::count_if] instrumentation in the process-wide registry.
    ///
    /// # Errors
    ///
    /// Same as [`count`][Self::count].
    pub fn count_if(
        &'static self,
        instrumentation: Instrumentation<R, A, T, E>,
    ) -> Result<Handle, ConfigurationError> {
        self.register(MetricKind::CountIf, instrumentation)
    }

    /// Installs a [`count_success`][Instrumentation::count_success] instrumentation in the process-wide registry.
    ///
    /// # Errors
    ///
    /// Same as [`count`][Self::count].
    pub fn count_success(
        &'static self,
        instrumentation: Instrumentation<R, A, T, E>,
    ) -> Result<Handle, ConfigurationError> {
        self.register(MetricKind::CountSuccess, instrumentation)
    }

    /// Installs a [`measure`][Instrumentation::measure] instrumentation in the process-wide registry.
    ///
    /// # Errors
    ///
    /// Same as [`count`][Self::count].
    pub fn measure(
        &'static self,
        instrumentation: Instrumentation<R, A, T, E>,
    ) -> Result<Handle, ConfigurationError> {
        self.register(MetricKind::Measure, instrumentation)
    }

    /// Removes the `count` instrumentation installed under `name`.
    ///
    /// For instrumentations named by a resolver, pass a reference to the same [`NameSpec`][crate::NameSpec], or a clone
    /// of it.
    ///
    /// # Errors
    ///
    /// If no such instrumentation is installed, an error is returned and the method is left untouched.
    pub fn remove_count(&self, name: impl Into<NameSpecId>) -> Result<(), NotFoundError> {
        self.unregister(MetricKind::Count, name.into())
    }

    /// Removes the `count_if` instrumentation installed under `name`.
    ///
    /// # Errors
    ///
    /// Same as [`remove_count`][Self::remove_count].
    pub fn remove_count_if(&self, name: impl Into<NameSpecId>) -> Result<(), NotFoundError> {
        self.unregister(MetricKind::CountIf, name.into())
    }

    /// Removes the `count_success` instrumentation installed under `name`.
    ///
    /// # Errors
    ///
    /// Same as [`remove_count`][Self::remove_count].
    pub fn remove_count_success(&self, name: impl Into<NameSpecId>) -> Result<(), NotFoundError> {
        self.unregister(MetricKind::CountSuccess, name.into())
    }

    /// Removes the `measure` instrumentation installed under `name`.
    ///
    /// # Errors
    ///
    /// Same as [`remove_count`][Self::remove_count].
    pub fn remove_measure(&self, name: impl Into<NameSpecId>) -> Result<(), NotFoundError> {
        self.unregister(MetricKind::Measure, name.into())
    }
}

impl<R, A, T, E, Y> Slot for Method<R, A, T, E, Y>
where
    R: ?Sized + 'static,
    A: 'static,
    T: 'static,
    E: 'static,
    Y: 'static,
{
    fn uninstall(&self, key: &InstrumentationKey) -> bool {
        Method::uninstall(self, key)
    }

    fn depth(&self) -> usize {
        Method::depth(self)
    }
}

impl<R: ?Sized, A, T, E, Y> fmt::Debug for Method<R, A, T, E, Y> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("key", &self.key())
            .field("depth", &self.depth())
            .finish_non_exhaustive()
    }
}
