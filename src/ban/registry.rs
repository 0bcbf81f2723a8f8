//! Registry of ban types

use crate::ban::{BanStore, BanType, Clock, EmailBanType, IpBanType, UserBanType};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Namespace prefix tried when a ban type name is not registered as-is
pub const TYPE_PREFIX: &str = "ban.type.";

/// Ban types by name, iterated in key order
#[derive(Default)]
pub struct BanTypeRegistry {
    types: BTreeMap<String, Box<dyn BanType>>,
}

impl BanTypeRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the user, ip and email ban types sharing `store`
    #[must_use]
    pub fn with_default_types(store: &BanStore, clock: &Arc<dyn Clock>) -> Self {
        let mut registry = Self::new();

        registry.register(
            format!("{TYPE_PREFIX}user"),
            Box::new(UserBanType::new(store.clone(), Arc::clone(clock))),
        );
        registry.register(
            format!("{TYPE_PREFIX}ip"),
            Box::new(IpBanType::new(store.clone(), Arc::clone(clock))),
        );
        registry.register(
            format!("{TYPE_PREFIX}email"),
            Box::new(EmailBanType::new(store.clone(), Arc::clone(clock))),
        );

        registry
    }

    /// Register a ban type, replacing any type with the same name
    pub fn register(&mut self, name: impl Into<String>, ban_type: Box<dyn BanType>) {
        self.types.insert(name.into(), ban_type);
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&(dyn BanType + 'static)> {
        self.types.get(name).map(AsRef::as_ref)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn BanType + 'static)> {
        self.types.get_mut(name).map(AsMut::as_mut)
    }

    /// Find the registered name for `name`: the name itself first, then the
    /// name under [`TYPE_PREFIX`].
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<String> {
        if self.contains(name) {
            return Some(name.to_string());
        }

        let prefixed = format!("{TYPE_PREFIX}{name}");
        self.contains(&prefixed).then_some(prefixed)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &(dyn BanType + 'static))> {
        self.types
            .iter()
            .map(|(name, ban_type)| (name.as_str(), ban_type.as_ref()))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut (dyn BanType + 'static))> {
        self.types
            .iter_mut()
            .map(|(name, ban_type)| (name.as_str(), ban_type.as_mut()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
