//! Handler method registry.
//!
//! The registry is filled once at startup through
//! [`register_handler`](HandlerRegistry::register_handler) and then moved into
//! a [`Dispatcher`](crate::Dispatcher), after which it is only read.
//!
//! Every [`MappingKind`] has its own pattern table. Within one table a pattern
//! string may be registered only once; the same string under another kind is
//! independent.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::error::{RegistrationError, RegistrationResult};
use crate::handler::{Controller, HandlerMethod, MappingKind, ParameterDescriptor, ResolutionKind};
use crate::matcher::{DestinationPattern, PathVariables};
use crate::resolver::ResolverChain;

/// The outcome of a successful lookup.
///
/// Created per message and dropped after invocation.
#[derive(Debug, Clone)]
pub struct MatchResult<'a> {
    pub method: &'a HandlerMethod,
    pub pattern: &'a DestinationPattern,
    pub variables: PathVariables,
}

#[derive(Debug)]
struct MappingEntry {
    pattern: DestinationPattern,
    method: usize,
}

#[derive(Debug, Default)]
struct MappingTable {
    entries: Vec<MappingEntry>,
    /// Pattern text to entry index, for duplicate detection and direct hits.
    by_pattern: HashMap<String, usize>,
}

/// Staged registration of one method, committed only if every method of the
/// batch validates.
struct Staged {
    method: HandlerMethod,
    kind: MappingKind,
    patterns: Vec<DestinationPattern>,
}

/// Maps destination patterns to handler methods.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    resolvers: ResolverChain,
    methods: Vec<HandlerMethod>,
    tables: HashMap<MappingKind, MappingTable>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry that binds parameters with `resolvers`.
    pub fn with_resolvers(resolvers: ResolverChain) -> Self {
        Self {
            resolvers,
            ..Self::default()
        }
    }

    /// Registers every mapped method of `controller`.
    ///
    /// Either all of the controller's methods are registered or, on error,
    /// none are. Returns the number of methods registered.
    pub fn register_handler<C: Controller>(
        &mut self,
        controller: Arc<C>,
    ) -> RegistrationResult<usize> {
        let name = controller.controller_name();
        let count = self.register_methods(controller.handler_methods())?;
        info!(controller = name, methods = count, "Registered controller");
        Ok(count)
    }

    /// Registers a single method.
    pub fn register_method(&mut self, method: HandlerMethod) -> RegistrationResult<usize> {
        self.register_methods(vec![method])
    }

    /// Registers a batch of methods atomically.
    pub fn register_methods(&mut self, methods: Vec<HandlerMethod>) -> RegistrationResult<usize> {
        let mut staged: Vec<Staged> = Vec::with_capacity(methods.len());

        for mut method in methods {
            let Some(mapping) = method.mapping() else {
                debug!(method = method.name(), "Skipping unmapped method");
                continue;
            };
            if mapping.patterns.is_empty() {
                warn!(
                    method = method.name(),
                    kind = %mapping.kind,
                    "Skipping mapping without destination patterns"
                );
                continue;
            }
            let kind = mapping.kind;

            let mut patterns = Vec::with_capacity(mapping.patterns.len());
            for raw in &mapping.patterns {
                let pattern = DestinationPattern::parse(raw).map_err(|source| {
                    RegistrationError::InvalidPattern {
                        method: method.name().to_string(),
                        source,
                    }
                })?;
                if patterns.contains(&pattern) {
                    return Err(RegistrationError::DuplicateMapping {
                        kind,
                        pattern: raw.clone(),
                        existing: method.name().to_string(),
                        duplicate: method.name().to_string(),
                    });
                }
                self.check_duplicate(kind, &pattern, &method, &staged)?;
                patterns.push(pattern);
            }

            method.resolver_plan = self.plan(&method, &patterns)?;
            staged.push(Staged {
                method,
                kind,
                patterns,
            });
        }

        let count = staged.len();
        for Staged {
            method,
            kind,
            patterns,
        } in staged
        {
            let index = self.methods.len();
            let table = self.tables.entry(kind).or_default();
            for pattern in patterns {
                debug!(
                    kind = %kind,
                    pattern = pattern.as_str(),
                    method = method.name(),
                    "Mapped destination"
                );
                table
                    .by_pattern
                    .insert(pattern.as_str().to_string(), table.entries.len());
                table.entries.push(MappingEntry {
                    pattern,
                    method: index,
                });
            }
            self.methods.push(method);
        }

        Ok(count)
    }

    fn check_duplicate(
        &self,
        kind: MappingKind,
        pattern: &DestinationPattern,
        method: &HandlerMethod,
        staged: &[Staged],
    ) -> RegistrationResult<()> {
        let existing = self
            .tables
            .get(&kind)
            .and_then(|t| {
                t.by_pattern
                    .get(pattern.as_str())
                    .map(|&i| self.methods[t.entries[i].method].name())
            })
            .or_else(|| {
                staged
                    .iter()
                    .find(|s| {
                        s.kind == kind && s.patterns.iter().any(|p| p.as_str() == pattern.as_str())
                    })
                    .map(|s| s.method.name())
            });

        match existing {
            Some(existing) => Err(RegistrationError::DuplicateMapping {
                kind,
                pattern: pattern.as_str().to_string(),
                existing: existing.to_string(),
                duplicate: method.name().to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Chooses a resolver for every parameter of `method`.
    fn plan(
        &self,
        method: &HandlerMethod,
        patterns: &[DestinationPattern],
    ) -> RegistrationResult<Vec<usize>> {
        method
            .parameters()
            .iter()
            .map(|param| {
                let unsupported = |reason: String| RegistrationError::UnsupportedParameter {
                    method: method.name().to_string(),
                    index: param.index,
                    reason,
                };

                if !can_be_absent(param) {
                    return Err(unsupported(format!(
                        "'{}' is not required but {} has no empty value; use Option or a default",
                        param.label(),
                        param.declared_type.type_name
                    )));
                }

                if let Some(pattern) = uncaptured(param, patterns) {
                    return Err(unsupported(format!(
                        "path variable '{}' is not captured by '{}'",
                        param.label(),
                        pattern.as_str()
                    )));
                }

                let index = self.resolvers.select(param).ok_or_else(|| {
                    unsupported(format!(
                        "no resolver binds {} as {}",
                        param.declared_type.type_name,
                        param.kind.name()
                    ))
                })?;
                trace!(
                    method = method.name(),
                    parameter = %param.label(),
                    resolver = self.resolvers.get(index).map(|r| r.name()),
                    "Planned parameter binding"
                );
                Ok(index)
            })
            .collect()
    }

    /// Finds the best handler for `destination` under `kind`.
    ///
    /// Returns `None` when no pattern matches.
    pub fn lookup(&self, kind: MappingKind, destination: &str) -> Option<MatchResult<'_>> {
        let table = self.tables.get(&kind)?;

        if let Some(&i) = table.by_pattern.get(destination) {
            let entry = &table.entries[i];
            if entry.pattern.is_literal() {
                trace!(destination, "Direct pattern hit");
                return Some(self.result(entry, PathVariables::new()));
            }
        }

        table
            .entries
            .iter()
            .filter_map(|e| e.pattern.match_destination(destination).map(|v| (e, v)))
            .min_by(|(a, _), (b, _)| a.pattern.compare(&b.pattern, destination))
            .map(|(entry, variables)| self.result(entry, variables))
    }

    fn result<'a>(&'a self, entry: &'a MappingEntry, variables: PathVariables) -> MatchResult<'a> {
        MatchResult {
            method: &self.methods[entry.method],
            pattern: &entry.pattern,
            variables,
        }
    }

    pub fn resolvers(&self) -> &ResolverChain {
        &self.resolvers
    }

    pub fn methods(&self) -> &[HandlerMethod] {
        &self.methods
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Returns the number of registered patterns across all kinds.
    pub fn mapping_count(&self) -> usize {
        self.tables.values().map(|t| t.entries.len()).sum()
    }

    /// Returns the registered pattern strings for `kind`, in registration order.
    pub fn patterns(&self, kind: MappingKind) -> impl Iterator<Item = &str> {
        self.tables
            .get(&kind)
            .into_iter()
            .flat_map(|t| t.entries.iter().map(|e| e.pattern.as_str()))
    }
}

/// A `required = false` binding without a default needs somewhere to put
/// "absent".
fn can_be_absent(param: &ParameterDescriptor) -> bool {
    match &param.kind {
        ResolutionKind::Header {
            required: false,
            default_value: None,
            ..
        }
        | ResolutionKind::Payload { required: false } => param.declared_type.optional,
        _ => true,
    }
}

/// A required path variable must be captured by every pattern of its method.
fn uncaptured<'a>(
    param: &ParameterDescriptor,
    patterns: &'a [DestinationPattern],
) -> Option<&'a DestinationPattern> {
    match &param.kind {
        ResolutionKind::PathVariable { name } if !param.declared_type.optional => patterns
            .iter()
            .find(|p| !p.variable_names().any(|v| v == name.as_str())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PatternError;

    fn method(name: &str, kind: MappingKind, patterns: &[&str]) -> HandlerMethod {
        let builder = HandlerMethod::builder(name);
        let builder = match kind {
            MappingKind::Message => builder.message_mapping(patterns.iter().copied()),
            MappingKind::Subscribe => builder.subscribe_mapping(patterns.iter().copied()),
        };
        builder.handler(|_| Ok(()))
    }

    #[test]
    fn test_duplicate_mapping_rejected() {
        let mut registry = HandlerRegistry::new();
        registry
            .register_method(method("first", MappingKind::Message, &["/duplicate"]))
            .unwrap();

        let err = registry
            .register_method(method("second", MappingKind::Message, &["/duplicate"]))
            .unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::DuplicateMapping { ref existing, ref duplicate, .. }
                if existing == "first" && duplicate == "second"
        ));

        // The first registration is untouched.
        let hit = registry.lookup(MappingKind::Message, "/duplicate").unwrap();
        assert_eq!(hit.method.name(), "first");
        assert_eq!(registry.method_count(), 1);
    }

    #[test]
    fn test_same_pattern_under_different_kinds() {
        let mut registry = HandlerRegistry::new();
        registry
            .register_methods(vec![
                method("msg", MappingKind::Message, &["/sub/{foo}/{name}"]),
                method("sub", MappingKind::Subscribe, &["/sub/{foo}/{name}"]),
            ])
            .unwrap();

        let hit = registry
            .lookup(MappingKind::Subscribe, "/sub/bar/value")
            .unwrap();
        assert_eq!(hit.method.name(), "sub");
        assert_eq!(hit.variables["foo"], "bar");
        assert_eq!(
            registry
                .lookup(MappingKind::Message, "/sub/bar/value")
                .unwrap()
                .method
                .name(),
            "msg"
        );
    }

    #[test]
    fn test_batch_is_atomic() {
        let mut registry = HandlerRegistry::new();
        let err = registry
            .register_methods(vec![
                method("ok", MappingKind::Message, &["/fine"]),
                method("a", MappingKind::Message, &["/dup"]),
                method("b", MappingKind::Message, &["/dup"]),
            ])
            .unwrap_err();

        assert!(matches!(err, RegistrationError::DuplicateMapping { .. }));
        assert_eq!(registry.method_count(), 0);
        assert!(registry.lookup(MappingKind::Message, "/fine").is_none());
    }

    #[test]
    fn test_invalid_pattern() {
        let mut registry = HandlerRegistry::new();
        let err = registry
            .register_method(method("bad", MappingKind::Message, &["/a/**/b"]))
            .unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::InvalidPattern {
                source: PatternError::DoubleWildcardNotLast { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_unsupported_parameter() {
        let mut registry = HandlerRegistry::new();
        let bad = HandlerMethod::builder("bad")
            .message_mapping(["/x/{h}"])
            .param(ParameterDescriptor::path_variable::<waypoint_core::MessageHeaders>("h"))
            .handler(|_| Ok(()));
        assert!(matches!(
            registry.register_method(bad).unwrap_err(),
            RegistrationError::UnsupportedParameter { index: 0, .. }
        ));

        let not_required = HandlerMethod::builder("nr")
            .message_mapping(["/y"])
            .param(ParameterDescriptor::header::<String>("h").required(false))
            .handler(|_| Ok(()));
        assert!(matches!(
            registry.register_method(not_required).unwrap_err(),
            RegistrationError::UnsupportedParameter { .. }
        ));
    }

    #[test]
    fn test_uncaptured_path_variable_rejected() {
        let mut registry = HandlerRegistry::new();
        let typo = HandlerMethod::builder("by_id")
            .message_mapping(["/orders/{id}"])
            .param(ParameterDescriptor::path_variable::<i64>("idd"))
            .handler(|_| Ok(()));
        let err = registry.register_method(typo).unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::UnsupportedParameter { ref method, index: 0, ref reason }
                if method == "by_id" && reason.contains("'idd'")
        ));
        assert!(registry.lookup(MappingKind::Message, "/orders/12").is_none());

        // Every pattern of the method must capture the variable.
        let partial = HandlerMethod::builder("partial")
            .message_mapping(["/items/{id}", "/items/latest"])
            .param(ParameterDescriptor::path_variable::<i64>("id"))
            .handler(|_| Ok(()));
        assert!(matches!(
            registry.register_method(partial).unwrap_err(),
            RegistrationError::UnsupportedParameter { .. }
        ));

        let optional = HandlerMethod::builder("optional")
            .message_mapping(["/items/{id}", "/items/latest"])
            .param(ParameterDescriptor::path_variable::<Option<i64>>("id"))
            .handler(|_| Ok(()));
        assert_eq!(registry.register_method(optional).unwrap(), 1);
    }

    #[test]
    fn test_unmapped_and_empty_mappings_skipped() {
        let mut registry = HandlerRegistry::new();
        let unmapped = HandlerMethod::builder("none").handler(|_| Ok(()));
        let empty = method("empty", MappingKind::Message, &[]);

        assert_eq!(registry.register_methods(vec![unmapped, empty]).unwrap(), 0);
        assert_eq!(registry.mapping_count(), 0);
    }

    #[test]
    fn test_best_match_and_direct_hit() {
        let mut registry = HandlerRegistry::new();
        registry
            .register_methods(vec![
                method("catch_all", MappingKind::Message, &["/bestmatch/**"]),
                method("specific", MappingKind::Message, &["/bestmatch/{foo}/path"]),
                method("exact", MappingKind::Message, &["/bestmatch/exact/path"]),
            ])
            .unwrap();

        let hit = registry
            .lookup(MappingKind::Message, "/bestmatch/bar/path")
            .unwrap();
        assert_eq!(hit.method.name(), "specific");
        assert_eq!(hit.variables["foo"], "bar");

        let hit = registry
            .lookup(MappingKind::Message, "/bestmatch/exact/path")
            .unwrap();
        assert_eq!(hit.method.name(), "exact");
        assert!(hit.variables.is_empty());

        let hit = registry
            .lookup(MappingKind::Message, "/bestmatch/a/b/c")
            .unwrap();
        assert_eq!(hit.method.name(), "catch_all");

        assert!(registry.lookup(MappingKind::Message, "/other").is_none());
        assert!(
            registry
                .lookup(MappingKind::Subscribe, "/bestmatch/bar/path")
                .is_none()
        );
    }

    #[test]
    fn test_patterns_listing() {
        let mut registry = HandlerRegistry::new();
        registry
            .register_method(method("m", MappingKind::Message, &["/a", "/b"]))
            .unwrap();
        let patterns: Vec<_> = registry.patterns(MappingKind::Message).collect();
        assert_eq!(patterns, vec!["/a", "/b"]);
        assert_eq!(registry.patterns(MappingKind::Subscribe).count(), 0);
    }
}
