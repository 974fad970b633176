//! Compilation state
//!
//! [`BuildContext`] is created once per run and handed to every synthesis
//! step. [`ServiceScope`] holds the state owned by a single service: the
//! registry of emitted type names, the synthesized types and the transform
//! helpers. Scopes of different services share nothing.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use super::transform::TransformHelper;
use crate::core::config::CompilerConfig;
use crate::expr::{ApiExpr, EndpointExpr, EndpointRef, ServiceExpr, TypeLookup, UserType};

/// Inputs of one compilation run
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub api: &'a ApiExpr,
    pub config: &'a CompilerConfig,
}

impl<'a> BuildContext<'a> {
    pub fn new(api: &'a ApiExpr, config: &'a CompilerConfig) -> Self {
        Self { api, config }
    }

    /// Services selected by the configuration
    pub fn services(&self) -> impl Iterator<Item = &'a ServiceExpr> + '_ {
        self.api
            .services
            .iter()
            .filter(|s| self.config.includes_service(&s.name))
    }

    /// Endpoints of `service` selected by the configuration
    pub fn endpoints(
        &self,
        service: &'a ServiceExpr,
    ) -> impl Iterator<Item = EndpointRef<'a>> + '_ {
        service
            .endpoints
            .iter()
            .filter(move |e: &&EndpointExpr| self.config.should_compile(&service.name, &e.name))
            .map(move |e| EndpointRef::new(self.api, service, e))
    }
}

/// Names of the types already emitted for a service
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    emitted: HashSet<String>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `name`; returns false if it was already recorded.
    pub fn register(&mut self, name: &str) -> bool {
        self.emitted.insert(name.to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.emitted.contains(name)
    }

    pub fn len(&self) -> usize {
        self.emitted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitted.is_empty()
    }
}

/// Types synthesized while compiling a service, in creation order
#[derive(Debug, Default, Clone)]
pub struct TypeStore {
    types: IndexMap<String, UserType>,
}

impl TypeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `user_type` unless a type with the same name exists.
    pub fn insert(&mut self, user_type: UserType) -> bool {
        if self.types.contains_key(&user_type.name) {
            return false;
        }
        self.types.insert(user_type.name.clone(), user_type);
        true
    }

    pub fn get(&self, name: &str) -> Option<&UserType> {
        self.types.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserType> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl TypeLookup for TypeStore {
    fn lookup(&self, name: &str) -> Option<&UserType> {
        self.types.get(name)
    }
}

/// State owned by the compilation of one service
#[derive(Debug)]
pub struct ServiceScope<'a> {
    design: &'a IndexMap<String, UserType>,
    registry: TypeRegistry,
    store: TypeStore,
    helpers: IndexMap<String, TransformHelper>,
    /// Suffixed copies of design types, keyed by type name and suffix
    copies: HashMap<(String, String), String>,
}

impl<'a> ServiceScope<'a> {
    pub fn new(design: &'a IndexMap<String, UserType>) -> Self {
        Self {
            design,
            registry: TypeRegistry::new(),
            store: TypeStore::new(),
            helpers: IndexMap::new(),
            copies: HashMap::new(),
        }
    }

    /// Reserves a type name. Returns false when the name was already
    /// emitted, in which case the caller must not define it again.
    pub fn claim(&mut self, name: &str) -> bool {
        let fresh = self.registry.register(name);
        if !fresh {
            tracing::trace!("Type {name} already emitted");
        }
        fresh
    }

    /// Reserves `name`, or the first free `name1`, `name2`... when `name` is
    /// already emitted or names a design type.
    pub fn claim_unique(&mut self, name: &str) -> String {
        let mut candidate = name.to_string();
        let mut count = 0;
        while self.design.contains_key(&candidate) || !self.claim(&candidate) {
            count += 1;
            candidate = format!("{name}{count}");
        }
        if count > 0 {
            tracing::debug!("Type name {name} is taken, using {candidate}");
        }
        candidate
    }

    /// Name of the copy of design type `name` made for `suffix`
    pub fn copy_of(&self, name: &str, suffix: &str) -> Option<&str> {
        self.copies
            .get(&(name.to_string(), suffix.to_string()))
            .map(String::as_str)
    }

    pub fn record_copy(&mut self, name: &str, suffix: &str, copy: &str) {
        self.copies
            .insert((name.to_string(), suffix.to_string()), copy.to_string());
    }

    /// Stores the definition of a claimed type
    pub fn define(&mut self, user_type: UserType) {
        self.store.insert(user_type);
    }

    /// Claims and defines `user_type` in one step. Declaring the same name
    /// twice keeps the first definition.
    pub fn declare(&mut self, user_type: UserType) -> bool {
        if !self.claim(&user_type.name) {
            return false;
        }
        self.define(user_type);
        true
    }

    pub fn is_emitted(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Synthesized types in creation order
    pub fn types(&self) -> &TypeStore {
        &self.store
    }

    pub fn helper(&self, name: &str) -> Option<&TransformHelper> {
        self.helpers.get(name)
    }

    pub fn has_helper(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    pub fn add_helper(&mut self, helper: TransformHelper) {
        self.helpers.entry(helper.name.clone()).or_insert(helper);
    }

    /// Transform helpers in creation order
    pub fn helpers(&self) -> impl Iterator<Item = &TransformHelper> {
        self.helpers.values()
    }
}

impl TypeLookup for ServiceScope<'_> {
    fn lookup(&self, name: &str) -> Option<&UserType> {
        self.store.get(name).or_else(|| self.design.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{AttributeSchema, Verb};

    #[test]
    fn test_declare_is_idempotent() {
        let design = IndexMap::new();
        let mut scope = ServiceScope::new(&design);
        let body = UserType::new("ShowRequestBody", AttributeSchema::string());

        assert!(scope.declare(body.clone()));
        assert!(!scope.declare(UserType::new("ShowRequestBody", AttributeSchema::user("X"))));
        assert_eq!(scope.types().len(), 1);
        assert_eq!(scope.types().get("ShowRequestBody"), Some(&body));
        assert!(scope.is_emitted("ShowRequestBody"));
    }

    #[test]
    fn test_claim_unique_skips_taken_names() {
        let mut design = IndexMap::new();
        design.insert(
            "ShowRequestBody1".to_string(),
            UserType::new("ShowRequestBody1", AttributeSchema::string()),
        );
        let mut scope = ServiceScope::new(&design);
        assert_eq!(scope.claim_unique("ShowRequestBody"), "ShowRequestBody");
        assert_eq!(scope.claim_unique("ShowRequestBody"), "ShowRequestBody2");
        assert!(scope.is_emitted("ShowRequestBody2"));
        assert!(!scope.is_emitted("ShowRequestBody1"));
    }

    #[test]
    fn test_scope_lookup_prefers_synthesized() {
        let mut design = IndexMap::new();
        design.insert(
            "Account".to_string(),
            UserType::new("Account", AttributeSchema::string()),
        );
        let mut scope = ServiceScope::new(&design);
        assert!(scope.lookup("Account").is_some());
        scope.declare(UserType::new("AccountRequestBody", AttributeSchema::string()));
        assert!(scope.lookup("AccountRequestBody").is_some());
        assert!(scope.lookup("Missing").is_none());
    }

    #[test]
    fn test_build_context_filters() {
        let api = ApiExpr::new("api")
            .with_service(
                ServiceExpr::new("account")
                    .with_endpoint(EndpointExpr::new("show").with_route(Verb::Get, "/"))
                    .with_endpoint(EndpointExpr::new("delete").with_route(Verb::Delete, "/")),
            )
            .with_service(ServiceExpr::new("billing"));
        let config = CompilerConfig {
            services: vec!["account".to_string()],
            exclude_endpoints: vec!["delete".to_string()],
            ..Default::default()
        };
        let ctx = BuildContext::new(&api, &config);
        let services: Vec<&ServiceExpr> = ctx.services().collect();
        assert_eq!(services.len(), 1);
        let endpoints: Vec<String> = ctx
            .endpoints(services[0])
            .map(|ep| ep.endpoint.name.clone())
            .collect();
        assert_eq!(endpoints, vec!["show"]);
    }
}
