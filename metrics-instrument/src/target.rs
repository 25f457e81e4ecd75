use std::{
    any::{type_name, TypeId},
    fmt,
};

/// Dispatch scope of an instrumented method.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum Scope {
    /// Methods dispatched on any instance of the target type.
    Instance,

    /// Methods of the single, shared object standing for the type itself ("class-level" methods).
    Singleton,
}

/// The type, or shared object, whose method is being instrumented.
///
/// Targets are usually trait objects, such as `dyn Gateway`: the method is registered once against the trait object
/// type, and every implementation dispatched through it is covered. Any metric name resolved at call time still sees
/// the concrete receiver behind the trait object.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct Target {
    scope: Scope,
    type_id: TypeId,
    type_name: &'static str,
}

impl Target {
    /// Targets instance methods dispatched on `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Target { scope: Scope::Instance, type_id: TypeId::of::<T>(), type_name: type_name::<T>() }
    }

    /// Targets methods of the shared, singleton object standing for `T`.
    ///
    /// A singleton target never collides with an instance target of the same type, even when the method names match.
    pub fn singleton<T: ?Sized + 'static>() -> Self {
        Target { scope: Scope::Singleton, type_id: TypeId::of::<T>(), type_name: type_name::<T>() }
    }

    /// Returns the dispatch scope of this target.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Returns the name of the target type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("scope", &self.scope)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            Scope::Instance => write!(f, "{}", self.type_name),
            Scope::Singleton => write!(f, "<{} singleton>", self.type_name),
        }
    }
}

/// Identifies a single method on a target, and with it the wrapper chain installed around it.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct MethodKey {
    target: Target,
    method: &'static str,
}

impl MethodKey {
    /// Creates a new `MethodKey`.
    pub fn new(target: Target, method: &'static str) -> Self {
        MethodKey { target, method }
    }

    /// Returns the target of the method.
    pub fn target(&self) -> Target {
        self.target
    }

    /// Returns the name of the method.
    pub fn method(&self) -> &'static str {
        self.method
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target.scope {
            Scope::Instance => write!(f, "{}#{}", self.target.type_name, self.method),
            Scope::Singleton => write!(f, "{}.{}", self.target.type_name, self.method),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MethodKey, Scope, Target};

    trait Gateway {}
    struct Base;

    #[test]
    fn instance_and_singleton_targets_are_distinct() {
        let instance = Target::of::<Base>();
        let singleton = Target::singleton::<Base>();

        assert_eq!(instance.scope(), Scope::Instance);
        assert_eq!(singleton.scope(), Scope::Singleton);
        assert_ne!(instance, singleton);
        assert_eq!(instance.type_name(), singleton.type_name());
        assert_ne!(MethodKey::new(instance, "sync"), MethodKey::new(singleton, "sync"));
    }

    #[test]
    fn trait_object_targets() {
        let target = Target::of::<dyn Gateway>();
        assert_eq!(target, Target::of::<dyn Gateway>());
        assert_ne!(target, Target::of::<Base>());
        assert!(target.type_name().contains("Gateway"));
    }

    #[test]
    fn method_key_display() {
        let instance = MethodKey::new(Target::of::<Base>(), "ssl_post");
        let singleton = MethodKey::new(Target::singleton::<Base>(), "sync");

        assert!(instance.to_string().ends_with("Base#ssl_post"));
        assert!(singleton.to_string().ends_with("Base.sync"));
    }
}
