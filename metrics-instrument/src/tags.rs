use std::{fmt, sync::Arc};

use indexmap::IndexMap;

use crate::{BoxError, Outcome};

type TagResolver<R, A> = Arc<dyn Fn(&R, &A) -> Result<Vec<String>, BoxError> + Send + Sync>;
type OutcomeTagResolver<R, A, T, E> =
    Arc<dyn Fn(&R, &A, Outcome<'_, T, E>) -> Result<Vec<String>, BoxError> + Send + Sync>;

/// Formats a single `key:value` tag.
fn format_tag(key: &str, value: &str) -> String {
    let mut tag = String::with_capacity(key.len() + 1 + value.len());
    tag.push_str(key);
    tag.push(':');
    tag.push_str(value);
    tag
}

fn format_tags<I, K, V>(pairs: I) -> Vec<String>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    pairs.into_iter().map(|(k, v)| format_tag(k.as_ref(), v.as_ref())).collect()
}

/// How the tags of an instrumentation are determined.
///
/// Tags are always emitted as `key:value` strings. Fixed mappings keep the order they were given in.
pub enum TagSpec<R: ?Sized, A, T, E> {
    /// No tags.
    None,

    /// A fixed list of preformatted tags.
    Static(Vec<String>),

    /// Tags resolved from the receiver and the call arguments before the method is invoked.
    ///
    /// A failure here prevents the invocation, just like a failing name resolver.
    Resolver(TagResolver<R, A>),

    /// Tags resolved from the receiver, the call arguments and the outcome after the method returned or raised.
    ///
    /// The method has already run when this resolver is consulted, so a failure here only drops the emission for that
    /// call; the outcome of the call is returned untouched.
    OutcomeResolver(OutcomeTagResolver<R, A, T, E>),
}

impl<R: ?Sized, A, T, E> TagSpec<R, A, T, E> {
    /// Creates a fixed tag list from a mapping of keys to values.
    ///
    /// Tags follow the iteration order of the mapping, so ordered mappings give stable tag lists.
    pub fn from_map<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        TagSpec::Static(format_tags(pairs))
    }

    /// Creates a fixed tag list from preformatted tags, such as `env:production`.
    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TagSpec::Static(tags.into_iter().map(Into::into).collect())
    }

    /// Creates tags resolved before each call from the receiver and the call arguments.
    pub fn resolver<F, K, V>(f: F) -> Self
    where
        F: Fn(&R, &A) -> IndexMap<K, V> + Send + Sync + 'static,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self::try_resolver(move |receiver, args| Ok(format_tags(f(receiver, args))))
    }

    /// Creates tags from a fallible resolver consulted before each call.
    pub fn try_resolver<F>(f: F) -> Self
    where
        F: Fn(&R, &A) -> Result<Vec<String>, BoxError> + Send + Sync + 'static,
    {
        TagSpec::Resolver(Arc::new(f))
    }

    /// Creates tags resolved after each call from the receiver, the call arguments and the outcome.
    pub fn outcome_resolver<F, K, V>(f: F) -> Self
    where
        F: Fn(&R, &A, Outcome<'_, T, E>) -> IndexMap<K, V> + Send + Sync + 'static,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self::try_outcome_resolver(move |receiver, args, outcome| {
            Ok(format_tags(f(receiver, args, outcome)))
        })
    }

    /// Creates tags from a fallible resolver consulted after each call.
    pub fn try_outcome_resolver<F>(f: F) -> Self
    where
        F: Fn(&R, &A, Outcome<'_, T, E>) -> Result<Vec<String>, BoxError> + Send + Sync + 'static,
    {
        TagSpec::OutcomeResolver(Arc::new(f))
    }

    /// Returns `true` if tags depend on the outcome of the call.
    pub(crate) fn needs_outcome(&self) -> bool {
        matches!(self, TagSpec::OutcomeResolver(_))
    }

    /// Resolves the tags available before the call.
    ///
    /// Tags depending on the outcome are not resolved here, and come out empty.
    pub(crate) fn resolve_before(&self, receiver: &R, args: &A) -> Result<Vec<String>, BoxError> {
        match self {
            TagSpec::None | TagSpec::OutcomeResolver(_) => Ok(Vec::new()),
            TagSpec::Static(tags) => Ok(tags.clone()),
            TagSpec::Resolver(resolver) => resolver(receiver, args),
        }
    }

    /// Resolves the tags that depend on the outcome of the call.
    pub(crate) fn resolve_after(
        &self,
        receiver: &R,
        args: &A,
        outcome: Outcome<'_, T, E>,
    ) -> Result<Vec<String>, BoxError> {
        match self {
            TagSpec::OutcomeResolver(resolver) => resolver(receiver, args, outcome),
            _ => Ok(Vec::new()),
        }
    }
}

impl<R: ?Sized, A, T, E> Default for TagSpec<R, A, T, E> {
    fn default() -> Self {
        TagSpec::None
    }
}

impl<R: ?Sized, A, T, E> Clone for TagSpec<R, A, T, E> {
    fn clone(&self) -> Self {
        match self {
            TagSpec::None => TagSpec::None,
            TagSpec::Static(tags) => TagSpec::Static(tags.clone()),
            TagSpec::Resolver(resolver) => TagSpec::Resolver(Arc::clone(resolver)),
            TagSpec::OutcomeResolver(resolver) => TagSpec::OutcomeResolver(Arc::clone(resolver)),
        }
    }
}

impl<R: ?Sized, A, T, E> fmt::Debug for TagSpec<R, A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagSpec::None => f.write_str("None"),
            TagSpec::Static(tags) => f.debug_tuple("Static").field(tags).finish(),
            TagSpec::Resolver(_) => f.write_str("Resolver(..)"),
            TagSpec::OutcomeResolver(_) => f.write_str("OutcomeResolver(..)"),
        }
    }
}

impl<R: ?Sized, A, T, E, K, V> From<IndexMap<K, V>> for TagSpec<R, A, T, E>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    fn from(map: IndexMap<K, V>) -> Self {
        TagSpec::from_map(map)
    }
}

impl<R: ?Sized, A, T, E, K, V, const N: usize> From<[(K, V); N]> for TagSpec<R, A, T, E>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        TagSpec::from_map(pairs)
    }
}

impl<R: ?Sized, A, T, E, K, V> From<Vec<(K, V)>> for TagSpec<R, A, T, E>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    fn from(pairs: Vec<(K, V)>) -> Self {
        TagSpec::from_map(pairs)
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::TagSpec;
    use crate::Outcome;

    struct Client {
        region: &'static str,
    }

    type Spec = TagSpec<Client, (u16,), u16, String>;

    #[test]
    fn mapping_serializes_to_key_value() {
        let spec: Spec = [("key", "value")].into();
        let tags = spec.resolve_before(&Client { region: "eu" }, &(1,)).expect("static");
        assert_eq!(tags, vec!["key:value".to_string()]);
    }

    #[test]
    fn mapping_order_is_preserved() {
        let mut map = IndexMap::new();
        map.insert("zone", "b");
        map.insert("app", "checkout");
        map.insert("env", "prod");

        let spec: Spec = map.into();
        for _ in 0..3 {
            let tags = spec.resolve_before(&Client { region: "eu" }, &(1,)).expect("static");
            assert_eq!(
                tags,
                vec!["zone:b".to_string(), "app:checkout".to_string(), "env:prod".to_string()]
            );
        }
    }

    #[test]
    fn absent_tags_are_empty() {
        let spec = Spec::default();
        let tags = spec.resolve_before(&Client { region: "eu" }, &(1,)).expect("static");
        assert!(tags.is_empty());
    }

    #[test]
    fn preformatted_tags() {
        let spec = Spec::from_tags(["env:prod", "team"]);
        let tags = spec.resolve_before(&Client { region: "eu" }, &(1,)).expect("static");
        assert_eq!(tags, vec!["env:prod".to_string(), "team".to_string()]);
    }

    #[test]
    fn resolver_uses_receiver_and_arguments() {
        let spec = Spec::resolver(|client, (port,)| {
            let mut map = IndexMap::new();
            map.insert("region", client.region.to_string());
            map.insert("port", port.to_string());
            map
        });

        let tags = spec.resolve_before(&Client { region: "us" }, &(443,)).expect("infallible");
        assert_eq!(tags, vec!["region:us".to_string(), "port:443".to_string()]);
        assert!(!spec.needs_outcome());
    }

    #[test]
    fn outcome_resolver_runs_after_the_call() {
        let spec = Spec::outcome_resolver(|_, _, outcome| {
            let mut map = IndexMap::new();
            map.insert("status", if outcome.is_raised() { "error" } else { "ok" });
            map
        });

        let client = Client { region: "us" };
        assert!(spec.needs_outcome());
        assert!(spec.resolve_before(&client, &(1,)).expect("deferred").is_empty());

        let ok: Result<u16, String> = Ok(200);
        let err: Result<u16, String> = Err("timeout".to_string());
        assert_eq!(
            spec.resolve_after(&client, &(1,), Outcome::from_result(&ok)).expect("infallible"),
            vec!["status:ok".to_string()]
        );
        assert_eq!(
            spec.resolve_after(&client, &(1,), Outcome::from_result(&err)).expect("infallible"),
            vec!["status:error".to_string()]
        );
    }
}
