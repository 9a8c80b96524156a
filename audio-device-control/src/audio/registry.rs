//! Device interface registry.
//!
//! A registry is a snapshot: backends build a fresh one on every enumeration
//! call and hand it out by value, so a concurrent reader never sees a
//! partially rebuilt mapping.

use super::device::DeviceLine;
use std::collections::HashMap;

/// Mapping of device interface name to the lines it exposes.
///
/// Lines keep enumeration order within an interface; interface order is not
/// significant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceRegistry {
    interfaces: HashMap<String, Vec<DeviceLine>>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an interface with no lines yet. No-op if already present.
    pub fn add_interface(&mut self, interface: &str) {
        if !self.interfaces.contains_key(interface) {
            self.interfaces.insert(interface.to_string(), Vec::new());
        }
    }

    /// Append a line to an interface, registering the interface if needed.
    pub fn add_line(&mut self, interface: &str, line: DeviceLine) {
        self.add_interface(interface);
        if let Some(lines) = self.interfaces.get_mut(interface) {
            lines.push(line);
        }
    }

    /// Lines of the given interface, in enumeration order.
    pub fn lines(&self, interface: &str) -> Option<&[DeviceLine]> {
        self.interfaces.get(interface).map(Vec::as_slice)
    }

    pub fn contains_interface(&self, interface: &str) -> bool {
        self.interfaces.contains_key(interface)
    }

    /// Iterate over `(interface, lines)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[DeviceLine])> {
        self.interfaces
            .iter()
            .map(|(name, lines)| (name.as_str(), lines.as_slice()))
    }

    /// Interface names, sorted for stable display.
    pub fn interface_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.interfaces.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }
}
