use std::{borrow::Cow, fmt, sync::Arc};

use crate::BoxError;

type NameResolver<R, A> = Arc<dyn Fn(&R, &A) -> Result<String, BoxError> + Send + Sync>;

/// Namespace separator replaced during normalization.
const NAMESPACE_SEPARATOR: &str = "::";

/// Metric-safe separator used in its place.
const METRIC_SEPARATOR: &str = ".";

/// Normalizes a metric name.
///
/// Namespace separators (`::`) are replaced with dots, so that names derived from type paths, such as
/// `ActiveMerchant::Gateway.ssl_post`, become `ActiveMerchant.Gateway.ssl_post`. Names that need no normalization are
/// borrowed as-is.
pub fn normalize_name(name: &str) -> Cow<'_, str> {
    if name.contains(NAMESPACE_SEPARATOR) {
        Cow::Owned(name.replace(NAMESPACE_SEPARATOR, METRIC_SEPARATOR))
    } else {
        Cow::Borrowed(name)
    }
}

/// How the metric name of an instrumentation is determined.
pub enum NameSpec<R: ?Sized, A> {
    /// A fixed name.
    Static(String),

    /// A name resolved from the receiver and the call arguments, freshly on every call.
    Resolver(NameResolver<R, A>),
}

impl<R: ?Sized, A> NameSpec<R, A> {
    /// Creates a name specification resolved on every call from the receiver and the call arguments.
    ///
    /// The resolver sees the runtime receiver: when the method is dispatched through a trait object, this is the
    /// concrete type behind it, not the type the method was registered against.
    pub fn resolver<F>(f: F) -> Self
    where
        F: Fn(&R, &A) -> String + Send + Sync + 'static,
    {
        Self::try_resolver(move |receiver, args| Ok(f(receiver, args)))
    }

    /// Creates a name specification from a fallible resolver.
    ///
    /// When the resolver fails, the underlying method is not invoked and the call returns an
    /// [`InstrumentationError`][crate::InstrumentationError].
    pub fn try_resolver<F>(f: F) -> Self
    where
        F: Fn(&R, &A) -> Result<String, BoxError> + Send + Sync + 'static,
    {
        NameSpec::Resolver(Arc::new(f))
    }

    /// Returns the identity of this name specification.
    ///
    /// Fixed names are identified by their text. Resolvers are identified by their shared allocation, so clones of a
    /// resolver specification share an identity while two separately created resolvers never do.
    pub fn id(&self) -> NameSpecId {
        match self {
            NameSpec::Static(name) => NameSpecId::Static(name.clone()),
            NameSpec::Resolver(resolver) => {
                NameSpecId::Resolver(Arc::as_ptr(resolver).cast::<()>() as usize)
            }
        }
    }

    /// Resolves the normalized metric name for a call.
    pub(crate) fn resolve(&self, receiver: &R, args: &A) -> Result<String, BoxError> {
        match self {
            NameSpec::Static(name) => Ok(normalize_name(name).into_owned()),
            NameSpec::Resolver(resolver) => {
                resolver(receiver, args).map(|name| normalize_name(&name).into_owned())
            }
        }
    }
}

impl<R: ?Sized, A> Clone for NameSpec<R, A> {
    fn clone(&self) -> Self {
        match self {
            NameSpec::Static(name) => NameSpec::Static(name.clone()),
            NameSpec::Resolver(resolver) => NameSpec::Resolver(Arc::clone(resolver)),
        }
    }
}

impl<R: ?Sized, A> fmt::Debug for NameSpec<R, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameSpec::Static(name) => f.debug_tuple("Static").field(name).finish(),
            NameSpec::Resolver(_) => f.debug_tuple("Resolver").field(&self.id()).finish(),
        }
    }
}

impl<R: ?Sized, A> From<&str> for NameSpec<R, A> {
    fn from(name: &str) -> Self {
        NameSpec::Static(name.to_string())
    }
}

impl<R: ?Sized, A> From<String> for NameSpec<R, A> {
    fn from(name: String) -> Self {
        NameSpec::Static(name)
    }
}

/// Identity of a [`NameSpec`], used to match instrumentations for removal.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum NameSpecId {
    /// A fixed name, as given at registration (before normalization).
    Static(String),

    /// A resolver, identified by the address of its shared allocation.
    Resolver(usize),
}

impl From<&str> for NameSpecId {
    fn from(name: &str) -> Self {
        NameSpecId::Static(name.to_string())
    }
}

impl From<String> for NameSpecId {
    fn from(name: String) -> Self {
        NameSpecId::Static(name)
    }
}

impl<R: ?Sized, A> From<&NameSpec<R, A>> for NameSpecId {
    fn from(spec: &NameSpec<R, A>) -> Self {
        spec.id()
    }
}

impl fmt::Display for NameSpecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameSpecId::Static(name) => f.write_str(name),
            NameSpecId::Resolver(addr) => write!(f, "<resolver {addr:#x}>"),
        }
    }
}
