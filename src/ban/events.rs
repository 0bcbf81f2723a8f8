//! Interception points fired by the ban manager
//!
//! Listeners get a mutable event before a ban type is selected and before
//! items are handed to the selected ban type. They can rewrite the proposed
//! value or set `overridden` to take over the decision.

use crate::ban::BanType;

/// Fired by `BanManager::set_type` before the name is resolved
#[derive(Debug)]
pub struct SetTypeEvent<'a> {
    current_type: Option<&'a str>,
    /// Requested ban type name
    pub type_name: String,
    /// Accept `type_name` as-is without looking it up
    pub overridden: bool,
}

impl<'a> SetTypeEvent<'a> {
    pub fn new(current_type: Option<&'a str>, type_name: impl Into<String>) -> Self {
        Self {
            current_type,
            type_name: type_name.into(),
            overridden: false,
        }
    }

    /// Name of the ban type selected before this call
    #[must_use]
    pub fn current_type(&self) -> Option<&'a str> {
        self.current_type
    }

    pub fn into_parts(self) -> (String, bool) {
        (self.type_name, self.overridden)
    }
}

/// Fired by `BanManager::set_items` before the items reach the ban type
pub struct SetItemsEvent<'a> {
    type_name: &'a str,
    current_type: &'a dyn BanType,
    /// Items that are going to be set
    pub items: Vec<String>,
    /// Skip handing the items to the ban type
    pub overridden: bool,
}

impl<'a> SetItemsEvent<'a> {
    pub fn new(type_name: &'a str, current_type: &'a dyn BanType, items: Vec<String>) -> Self {
        Self {
            type_name,
            current_type,
            items,
            overridden: false,
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'a str {
        self.type_name
    }

    /// The selected ban type. It can be inspected but not replaced.
    #[must_use]
    pub fn current_type(&self) -> &'a dyn BanType {
        self.current_type
    }

    pub fn into_parts(self) -> (Vec<String>, bool) {
        (self.items, self.overridden)
    }
}

impl std::fmt::Debug for SetItemsEvent<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetItemsEvent")
            .field("type_name", &self.type_name)
            .field("items", &self.items)
            .field("overridden", &self.overridden)
            .finish()
    }
}

/// Hooks into ban manager decisions. Both methods default to doing nothing.
pub trait BanListener {
    fn on_set_type(&self, _event: &mut SetTypeEvent<'_>) {}

    fn on_set_items(&self, _event: &mut SetItemsEvent<'_>) {}
}

/// Calls listeners in registration order
#[derive(Default)]
pub struct EventDispatcher {
    listeners: Vec<Box<dyn BanListener>>,
}

impl EventDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Box<dyn BanListener>) {
        self.listeners.push(listener);
    }

    pub fn set_type(&self, event: &mut SetTypeEvent<'_>) {
        for listener in &self.listeners {
            listener.on_set_type(event);
        }
    }

    pub fn set_items(&self, event: &mut SetItemsEvent<'_>) {
        for listener in &self.listeners {
            listener.on_set_items(event);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
