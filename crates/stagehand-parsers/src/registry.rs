//! Parser registry for dynamic parser discovery and management.
//!
//! The registry maps file extensions and magic bytes to codecs so the CLI
//! and the stage importer can dispatch on a path without knowing the format.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::traits::{HumanReadable, ParseOptions, ParseResult, Parser};

/// Type-erased parser wrapper for storage in the registry
pub trait AnyParser: Send + Sync {
    fn name(&self) -> &str;

    fn extensions(&self) -> &[&str];

    fn magic_bytes(&self) -> Option<&[u8]>;

    fn can_parse(&self, path: &Path) -> bool;

    /// Decode `data` and hand back something printable
    fn describe(&self, data: &[u8], options: &ParseOptions) -> ParseResult<Box<dyn HumanReadable + Send>>;

    fn type_id(&self) -> std::any::TypeId;
}

impl<T> AnyParser for T
where
    T: Parser + 'static,
    T::Output: HumanReadable + 'static,
{
    fn name(&self) -> &str {
        Parser::name(self)
    }

    fn extensions(&self) -> &[&str] {
        Parser::extensions(self)
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Parser::magic_bytes(self)
    }

    fn can_parse(&self, path: &Path) -> bool {
        Parser::can_parse(self, path)
    }

    fn describe(&self, data: &[u8], options: &ParseOptions) -> ParseResult<Box<dyn HumanReadable + Send>> {
        Ok(Box::new(self.parse_bytes(data, options)?))
    }

    fn type_id(&self) -> std::any::TypeId {
        std::any::TypeId::of::<T>()
    }
}

/// Factory function type for creating parser instances
pub type ParserFactory = Box<dyn Fn() -> Arc<dyn AnyParser> + Send + Sync>;

/// Registration entry for a parser
pub struct ParserRegistration {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Lowercase, without the dot
    pub extensions: Vec<String>,
    /// Priority for extension conflicts (higher = preferred)
    pub priority: i32,
    pub factory: ParserFactory,
}

pub struct ParserRegistry {
    parsers: RwLock<HashMap<String, ParserRegistration>>,
    /// Extension to parser IDs, highest priority first
    extension_map: RwLock<HashMap<String, Vec<String>>>,
    instances: RwLock<HashMap<String, Arc<dyn AnyParser>>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self {
            parsers: RwLock::new(HashMap::new()),
            extension_map: RwLock::new(HashMap::new()),
            instances: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, registration: ParserRegistration) -> Result<(), RegistryError> {
        let id = registration.id.clone();
        let mut parsers = self.parsers.write();
        if parsers.contains_key(&id) {
            return Err(RegistryError::DuplicateId(id));
        }

        let priority = registration.priority;
        let mut ext_map = self.extension_map.write();
        for ext in &registration.extensions {
            let ids = ext_map.entry(ext.to_lowercase()).or_default();
            ids.push(id.clone());
            ids.sort_by_key(|other| {
                let p = if *other == id {
                    priority
                } else {
                    parsers.get(other).map_or(0, |p| p.priority)
                };
                std::cmp::Reverse(p)
            });
        }

        parsers.insert(id, registration);
        Ok(())
    }

    pub fn unregister(&self, id: &str) -> Result<(), RegistryError> {
        let registration = self
            .parsers
            .write()
            .remove(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        let mut ext_map = self.extension_map.write();
        for ext in &registration.extensions {
            if let Some(ids) = ext_map.get_mut(&ext.to_lowercase()) {
                ids.retain(|i| i != id);
            }
        }
        self.instances.write().remove(id);
        Ok(())
    }

    /// Get a parser instance by ID, creating and caching it on first use
    pub fn get(&self, id: &str) -> Result<Arc<dyn AnyParser>, RegistryError> {
        if let Some(instance) = self.instances.read().get(id) {
            return Ok(Arc::clone(instance));
        }

        let instance = {
            let parsers = self.parsers.read();
            let registration = parsers.get(id).ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
            (registration.factory)()
        };

        self.instances.write().insert(id.to_string(), Arc::clone(&instance));
        Ok(instance)
    }

    pub fn get_for_extension(&self, ext: &str) -> Result<Arc<dyn AnyParser>, RegistryError> {
        let ext_lower = ext.trim_start_matches('.').to_lowercase();
        let id = self
            .extension_map
            .read()
            .get(&ext_lower)
            .and_then(|ids| ids.first())
            .cloned()
            .ok_or(RegistryError::NoParserForExtension(ext_lower))?;
        self.get(&id)
    }

    /// Extension first, then magic bytes
    pub fn get_for_path(&self, path: &Path) -> Result<Arc<dyn AnyParser>, RegistryError> {
        if let Some(ext) = path.extension() {
            if let Ok(parser) = self.get_for_extension(&ext.to_string_lossy()) {
                return Ok(parser);
            }
        }

        let ids: Vec<String> = self.parsers.read().keys().cloned().collect();
        for id in ids {
            let parser = self.get(&id)?;
            if parser.can_parse(path) {
                return Ok(parser);
            }
        }

        Err(RegistryError::NoParserForPath(path.to_path_buf()))
    }

    /// Registered parsers, sorted by ID
    pub fn list(&self) -> Vec<ParserInfo> {
        let mut infos: Vec<ParserInfo> = self
            .parsers
            .read()
            .values()
            .map(|p| ParserInfo {
                id: p.id.clone(),
                name: p.name.clone(),
                description: p.description.clone(),
                extensions: p.extensions.clone(),
                priority: p.priority,
            })
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ParserInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub extensions: Vec<String>,
    pub priority: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Parser with ID '{0}' already registered")]
    DuplicateId(String),

    #[error("Parser with ID '{0}' not found")]
    NotFound(String),

    #[error("No parser available for extension '.{0}'")]
    NoParserForExtension(String),

    #[error("No parser available for path: {0}")]
    NoParserForPath(std::path::PathBuf),

    #[error("Incomplete registration: {0} is required")]
    Incomplete(&'static str),
}

/// Global registry instance; filled by [`crate::init_registry`]
pub static GLOBAL_REGISTRY: Lazy<ParserRegistry> = Lazy::new(ParserRegistry::new);

/// Builder for parser registration
pub struct ParserRegistrationBuilder {
    id: Option<String>,
    name: Option<String>,
    description: String,
    extensions: Vec<String>,
    priority: i32,
    factory: Option<ParserFactory>,
}

impl ParserRegistrationBuilder {
    pub fn new() -> Self {
        Self {
            id: None,
            name: None,
            description: String::new(),
            extensions: Vec::new(),
            priority: 0,
            factory: None,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn extensions(mut self, exts: &[&str]) -> Self {
        self.extensions = exts.iter().map(|s| s.to_lowercase()).collect();
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn factory<F, P>(mut self, factory: F) -> Self
    where
        F: Fn() -> P + Send + Sync + 'static,
        P: Parser + 'static,
        P::Output: HumanReadable + 'static,
    {
        self.factory = Some(Box::new(move || Arc::new(factory())));
        self
    }

    pub fn build(self) -> Result<ParserRegistration, RegistryError> {
        let id = self.id.ok_or(RegistryError::Incomplete("id"))?;
        let factory = self.factory.ok_or(RegistryError::Incomplete("factory"))?;

        Ok(ParserRegistration {
            name: self.name.unwrap_or_else(|| id.clone()),
            id,
            description: self.description,
            extensions: self.extensions,
            priority: self.priority,
            factory,
        })
    }
}

impl Default for ParserRegistrationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(usize);

    impl HumanReadable for Echo {
        fn to_readable_string(&self) -> String {
            format!("{} bytes", self.0)
        }

        fn to_json(&self) -> serde_json::Value {
            serde_json::json!({ "len": self.0 })
        }
    }

    struct MockParser;

    impl Parser for MockParser {
        type Output = Echo;

        fn extensions(&self) -> &[&str] {
            &["mock", "test"]
        }

        fn name(&self) -> &str {
            "Mock Parser"
        }

        fn parse_bytes(&self, data: &[u8], _options: &ParseOptions) -> ParseResult<Echo> {
            Ok(Echo(data.len()))
        }
    }

    fn mock(id: &str, priority: i32) -> ParserRegistration {
        ParserRegistrationBuilder::new()
            .id(id)
            .name("Mock Parser")
            .extensions(&["mock"])
            .priority(priority)
            .factory(|| MockParser)
            .build()
            .unwrap()
    }

    #[test]
    fn test_registry_registration() {
        let registry = ParserRegistry::new();
        registry.register(mock("mock", 10)).unwrap();

        let parser = registry.get("mock").unwrap();
        assert_eq!(parser.name(), "Mock Parser");
        assert!(matches!(registry.register(mock("mock", 1)), Err(RegistryError::DuplicateId(_))));
    }

    #[test]
    fn test_extension_lookup_prefers_priority() {
        let registry = ParserRegistry::new();
        registry.register(mock("low", 1)).unwrap();
        registry.register(mock("high", 50)).unwrap();

        let ids = registry.extension_map.read().get("mock").cloned().unwrap();
        assert_eq!(ids, vec!["high".to_string(), "low".to_string()]);
        assert!(registry.get_for_extension(".MOCK").is_ok());

        registry.unregister("high").unwrap();
        let ids = registry.extension_map.read().get("mock").cloned().unwrap();
        assert_eq!(ids, vec!["low".to_string()]);
    }

    #[test]
    fn test_describe_through_erased_parser() {
        let registry = ParserRegistry::new();
        registry.register(mock("mock", 0)).unwrap();

        let described = registry
            .get_for_extension("mock")
            .unwrap()
            .describe(&[1, 2, 3], &ParseOptions::default())
            .unwrap();
        assert_eq!(described.to_readable_string(), "3 bytes");
        assert_eq!(described.to_json()["len"], 3);
    }

    #[test]
    fn test_builder_requires_factory() {
        let result = ParserRegistrationBuilder::new().id("x").build();
        assert!(matches!(result, Err(RegistryError::Incomplete("factory"))));
    }
}
