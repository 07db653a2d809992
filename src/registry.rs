//! Process-wide registry for operator builders and host adapters.
//!
//! The registry maps operator names (`$eq`, `$in`, ...) to their compiler
//! functions and holds the adapters a host embeds: the regex engine, the
//! value converter, and the custom-matcher hooks. It is created on first use
//! with the builtin operator set registered; [`init`] forces that eagerly.
//!
//! Setters are intended for configuration before compiling. Dispatch reads
//! take a read lock only; changing adapters between quiescent uses is safe,
//! changing them while a match is in flight on another thread is not
//! supported (compiled matchers are single-threaded to begin with).

use crate::arena::Arena;
use crate::error::{Error, ErrorKind};
use crate::matcher::{compile, leaf, literal, Matcher};
use crate::value::Value;
use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

/// Opaque caller context threaded through compilation into custom matchers.
pub type ExternContext = Rc<dyn Any>;

/// Compiler function for one operator.
pub type OperatorBuilder =
    Arc<dyn Fn(&Arena, &Value, Option<&ExternContext>) -> Option<Matcher> + Send + Sync>;

/// Regex adapter: pattern match over a string value.
pub type RegexMatchFn = Arc<dyn Fn(&Arena, &Value, &Value) -> bool + Send + Sync>;

/// Regex adapter: render a pattern value for explain and trace output.
pub type RegexStringifyFn = Arc<dyn Fn(&Arena, &Value) -> String + Send + Sync>;

/// Deep conversion of a foreign object into an arena value.
pub type DeepConvertFn = Arc<dyn Fn(&Arena, &ExternContext) -> Option<Value> + Send + Sync>;

/// Shallow conversion applied when field extraction hits a pointer value.
pub type ShallowConvertFn = Arc<dyn Fn(&Arena, &ExternContext) -> Option<Value> + Send + Sync>;

/// Recovery of a foreign object back out of an arena value.
pub type RecoverFn = Arc<dyn Fn(&Arena, &Value) -> Option<ExternContext> + Send + Sync>;

/// Result of building a host-registered predicate.
pub struct CustomMatcherSpec {
    pub name: String,
    pub external: ExternContext,
}

pub type CustomLookupFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;
pub type CustomBuildFn =
    Arc<dyn Fn(&str, &Value, Option<&ExternContext>) -> Option<CustomMatcherSpec> + Send + Sync>;
pub type CustomMatchFn = Arc<dyn Fn(&ExternContext, Option<&Value>) -> bool + Send + Sync>;

pub struct Registry {
    operators: RwLock<HashMap<String, OperatorBuilder>>,
    regex_match: RwLock<RegexMatchFn>,
    regex_stringify: RwLock<RegexStringifyFn>,
    deep_convert: RwLock<Option<DeepConvertFn>>,
    shallow_convert: RwLock<Option<ShallowConvertFn>>,
    recover: RwLock<Option<RecoverFn>>,
    custom_lookup: RwLock<Option<CustomLookupFn>>,
    custom_build: RwLock<Option<CustomBuildFn>>,
    custom_match: RwLock<Option<CustomMatchFn>>,
    trace_colorful: AtomicBool,
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// The process-wide registry, created with the builtin operators on first
/// access.
pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::with_builtins)
}

/// Eagerly initializes the registry and the builtin operator set.
pub fn init() {
    let _ = registry();
}

/// Restores the registry to its initial state: builtin operators only,
/// default regex adapter, no converter, no custom matchers, colorized trace.
pub fn cleanup() {
    registry().restore_defaults();
}

impl Registry {
    fn with_builtins() -> Self {
        let registry = Self {
            operators: RwLock::new(HashMap::new()),
            regex_match: RwLock::new(default_regex_match()),
            regex_stringify: RwLock::new(default_regex_stringify()),
            deep_convert: RwLock::new(None),
            shallow_convert: RwLock::new(None),
            recover: RwLock::new(None),
            custom_lookup: RwLock::new(None),
            custom_build: RwLock::new(None),
            custom_match: RwLock::new(None),
            trace_colorful: AtomicBool::new(true),
        };
        registry.register_builtins();
        registry
    }

    fn register_builtins(&self) {
        self.register("$in", Arc::new(leaf::in_operator));
        self.register("$nin", Arc::new(leaf::nin_operator));
        self.register("$eq", Arc::new(leaf::eq_operator));
        self.register("$ne", Arc::new(leaf::ne_operator));
        self.register("$gt", Arc::new(leaf::gt_operator));
        self.register("$gte", Arc::new(leaf::gte_operator));
        self.register("$lt", Arc::new(leaf::lt_operator));
        self.register("$lte", Arc::new(leaf::lte_operator));
        self.register("$exists", Arc::new(leaf::exists_operator));
        self.register("$present", Arc::new(leaf::present_operator));
        self.register("$regex", Arc::new(leaf::regex_operator));
        self.register("$and", Arc::new(compile::and_operator));
        self.register("$or", Arc::new(compile::or_operator));
        self.register("$elemMatch", Arc::new(compile::elem_match_operator));
        self.register("$every", Arc::new(compile::every_operator));
        self.register("$not", Arc::new(literal::not_operator));
        self.register("$size", Arc::new(literal::size_operator));
    }

    fn restore_defaults(&self) {
        if let Ok(mut operators) = self.operators.write() {
            operators.clear();
        }
        self.register_builtins();
        if let Ok(mut slot) = self.regex_match.write() {
            *slot = default_regex_match();
        }
        if let Ok(mut slot) = self.regex_stringify.write() {
            *slot = default_regex_stringify();
        }
        if let Ok(mut slot) = self.deep_convert.write() {
            *slot = None;
        }
        if let Ok(mut slot) = self.shallow_convert.write() {
            *slot = None;
        }
        if let Ok(mut slot) = self.recover.write() {
            *slot = None;
        }
        if let Ok(mut slot) = self.custom_lookup.write() {
            *slot = None;
        }
        if let Ok(mut slot) = self.custom_build.write() {
            *slot = None;
        }
        if let Ok(mut slot) = self.custom_match.write() {
            *slot = None;
        }
        self.trace_colorful.store(true, Ordering::Relaxed);
    }

    /// Registers (or replaces) the builder for an operator name.
    pub fn register(&self, name: &str, builder: OperatorBuilder) {
        if let Ok(mut operators) = self.operators.write() {
            operators.insert(name.to_string(), builder);
        }
    }

    /// The registered builder for an operator name, if any. Useful for host
    /// extensions that compose builtin operators.
    pub fn operator(&self, name: &str) -> Option<OperatorBuilder> {
        self.operators.read().ok()?.get(name).cloned()
    }

    pub(crate) fn regex_match(&self, arena: &Arena, pattern: &Value, value: &Value) -> bool {
        let matcher = match self.regex_match.read() {
            Ok(slot) => slot.clone(),
            Err(_) => return false,
        };
        (*matcher)(arena, pattern, value)
    }

    pub(crate) fn regex_stringify(&self, arena: &Arena, pattern: &Value) -> String {
        let stringify = match self.regex_stringify.read() {
            Ok(slot) => slot.clone(),
            Err(_) => return "//".to_string(),
        };
        (*stringify)(arena, pattern)
    }

    /// Outer `None` means no shallow converter is registered; the inner
    /// option is the converter's own result.
    pub(crate) fn shallow_convert(
        &self,
        arena: &Arena,
        payload: &ExternContext,
    ) -> Option<Option<Value>> {
        let convert = self.shallow_convert.read().ok()?.clone()?;
        Some((*convert)(arena, payload))
    }

    /// Outer `None` means no deep converter is registered; the inner option
    /// is the converter's own result.
    pub(crate) fn deep_convert(
        &self,
        arena: &Arena,
        payload: &ExternContext,
    ) -> Option<Option<Value>> {
        let convert = self.deep_convert.read().ok()?.clone()?;
        Some((*convert)(arena, payload))
    }

    pub(crate) fn recover(&self, arena: &Arena, value: &Value) -> Option<ExternContext> {
        let recover = self.recover.read().ok()?.clone()?;
        (*recover)(arena, value)
    }

    pub(crate) fn custom_lookup(&self, key: &str) -> bool {
        let Some(lookup) = self.custom_lookup.read().ok().and_then(|s| s.clone()) else {
            return false;
        };
        (*lookup)(key)
    }

    pub(crate) fn custom_build(
        &self,
        key: &str,
        condition: &Value,
        ctx: Option<&ExternContext>,
    ) -> Option<CustomMatcherSpec> {
        let build = self.custom_build.read().ok()?.clone()?;
        (*build)(key, condition, ctx)
    }

    pub(crate) fn custom_match(&self, external: &ExternContext, value: Option<&Value>) -> bool {
        let Some(matcher) = self.custom_match.read().ok().and_then(|s| s.clone()) else {
            return false;
        };
        (*matcher)(external, value)
    }

    pub(crate) fn trace_colorful(&self) -> bool {
        self.trace_colorful.load(Ordering::Relaxed)
    }
}

fn default_regex_match() -> RegexMatchFn {
    Arc::new(|_, _, _| false)
}

fn default_regex_stringify() -> RegexStringifyFn {
    Arc::new(|_, _| "//".to_string())
}

// ----------------------------------------------------------------------
// Free-function setters, the shape the embedding API exposes.
// ----------------------------------------------------------------------

/// Registers an operator builder under a `$`-prefixed name.
pub fn register_operator(name: &str, builder: OperatorBuilder) {
    if !name.starts_with('$') {
        // Operator names are namespaced with '$'; anything else would be
        // shadowed by field lookup.
        return;
    }
    registry().register(name, builder);
}

pub fn set_regex_match(f: RegexMatchFn) {
    if let Ok(mut slot) = registry().regex_match.write() {
        *slot = f;
    }
}

pub fn set_regex_stringify(f: RegexStringifyFn) {
    if let Ok(mut slot) = registry().regex_stringify.write() {
        *slot = f;
    }
}

pub fn set_value_converter_deep(f: DeepConvertFn) {
    if let Ok(mut slot) = registry().deep_convert.write() {
        *slot = Some(f);
    }
}

pub fn set_value_converter_shallow(f: ShallowConvertFn) {
    if let Ok(mut slot) = registry().shallow_convert.write() {
        *slot = Some(f);
    }
}

pub fn set_value_converter_recover(f: RecoverFn) {
    if let Ok(mut slot) = registry().recover.write() {
        *slot = Some(f);
    }
}

pub fn set_custom_matcher_lookup(f: CustomLookupFn) {
    if let Ok(mut slot) = registry().custom_lookup.write() {
        *slot = Some(f);
    }
}

pub fn set_custom_matcher_build(f: CustomBuildFn) {
    if let Ok(mut slot) = registry().custom_build.write() {
        *slot = Some(f);
    }
}

pub fn set_custom_matcher_match(f: CustomMatchFn) {
    if let Ok(mut slot) = registry().custom_match.write() {
        *slot = Some(f);
    }
}

pub fn set_trace_colorful(colorful: bool) {
    registry().trace_colorful.store(colorful, Ordering::Relaxed);
}

/// Renders a regex value through the registered stringifier.
pub(crate) fn regex_stringify(pattern: &Value) -> String {
    registry().regex_stringify(pattern.arena(), pattern)
}

/// Deep-converts a foreign payload through the registered converter. Records
/// `UnsupportedOperation` on the arena when no converter is installed.
pub fn convert_foreign(arena: &Arena, payload: &ExternContext) -> Option<Value> {
    match registry().deep_convert(arena, payload) {
        Some(converted) => converted,
        None => {
            arena.set_error(Error::new(
                ErrorKind::UnsupportedOperation,
                "no deep value converter is registered",
            ));
            None
        }
    }
}

/// Recovers a foreign payload out of a value through the registered
/// converter.
pub fn recover_foreign(arena: &Arena, value: &Value) -> Option<ExternContext> {
    registry().recover(arena, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_operators_are_registered() {
        init();
        for name in [
            "$in",
            "$nin",
            "$eq",
            "$ne",
            "$gt",
            "$gte",
            "$lt",
            "$lte",
            "$exists",
            "$present",
            "$regex",
            "$and",
            "$or",
            "$elemMatch",
            "$every",
            "$not",
            "$size",
        ] {
            assert!(registry().operator(name).is_some(), "missing {name}");
        }
        assert!(registry().operator("$bogus").is_none());
    }

    // Default regex adapter behavior is covered by integration tests, which
    // run in their own process; unit tests share this process with tests
    // that install the real engine.

    #[test]
    fn test_register_operator_requires_dollar_prefix() {
        init();
        register_operator("plain", Arc::new(leaf::eq_operator));
        assert!(registry().operator("plain").is_none());
    }
}
