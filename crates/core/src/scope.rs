//! Session navigation state: the selected scope and the batch size.

use std::fmt::{Display, Formatter};

use log::debug;

use crate::config::ROOT_GROUP;
use crate::error::Result;
use crate::inventory::Inventory;

/// The scope commands run against and how they are batched.
///
/// Owned by the session and handed to the dispatcher for each line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeState {
    scope: String,
    serial: usize,
}

impl Default for ScopeState {
    fn default() -> Self {
        Self {
            scope: ROOT_GROUP.to_string(),
            serial: 0,
        }
    }
}

impl ScopeState {
    #[must_use]
    pub fn with_serial(serial: usize) -> Self {
        Self {
            serial,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    #[must_use]
    pub fn serial(&self) -> usize {
        self.serial
    }
}

impl Display for ScopeState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        if self.serial == 0 {
            formatter.write_str(&self.scope)
        } else {
            write!(formatter, "{} (serial {})", self.scope, self.serial)
        }
    }
}

/// Applies navigation commands to a [`ScopeState`] against an inventory.
pub struct ScopeNavigator<'a> {
    inventory: &'a Inventory,
}

impl<'a> ScopeNavigator<'a> {
    #[must_use]
    pub fn new(inventory: &'a Inventory) -> Self {
        Self { inventory }
    }

    /// Moves the scope to `target` if it resolves in the inventory.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::UnknownScope`] and leaves `state`
    /// untouched if `target` matches no group and no host.
    pub fn navigate(&self, state: &mut ScopeState, target: &str) -> Result<()> {
        self.inventory.resolve(target)?;
        debug!("Scope changed from `{}` to `{}`", state.scope, target);
        state.scope = target.to_string();
        Ok(())
    }

    pub fn set_serial(&self, state: &mut ScopeState, serial: usize) {
        debug!("Serial changed from {} to {}", state.serial, serial);
        state.serial = serial;
    }

    /// Expands the current scope into an ordered, duplicate-free host list.
    ///
    /// Always computed fresh from the inventory.
    ///
    /// # Errors
    ///
    /// Returns an error if the scope no longer resolves, which can only happen
    /// after the inventory changed underneath the state.
    pub fn resolve_current_hosts(&self, state: &ScopeState) -> Result<Vec<String>> {
        self.inventory.resolve(&state.scope)
    }

    /// Puts the scope back to `all` if it does not resolve any more.
    ///
    /// Returns `true` if the scope was reset.
    pub fn revalidate(&self, state: &mut ScopeState) -> bool {
        if self.inventory.resolve(&state.scope).is_ok() {
            return false;
        }

        state.scope = ROOT_GROUP.to_string();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn inventory() -> Inventory {
        Inventory::from_ini_str("[web]\nweb1\nweb2\n[db]\ndb1\n[site:children]\nweb\ndb\n")
    }

    #[test]
    fn test_initial_state() {
        let state = ScopeState::default();
        assert_eq!(state.scope(), "all");
        assert_eq!(state.serial(), 0);
    }

    #[test]
    fn test_navigate_to_group() {
        let inventory = inventory();
        let navigator = ScopeNavigator::new(&inventory);
        let mut state = ScopeState::default();

        navigator.navigate(&mut state, "web").unwrap();
        assert_eq!(state.scope(), "web");
        assert_eq!(navigator.resolve_current_hosts(&state).unwrap(), vec!["web1", "web2"]);
    }

    #[test]
    fn test_navigate_to_host_pattern() {
        let inventory = inventory();
        let navigator = ScopeNavigator::new(&inventory);
        let mut state = ScopeState::default();

        navigator.navigate(&mut state, "*1").unwrap();
        assert_eq!(navigator.resolve_current_hosts(&state).unwrap(), vec!["web1", "db1"]);
    }

    #[test]
    fn test_navigate_unknown_keeps_scope() {
        let inventory = inventory();
        let navigator = ScopeNavigator::new(&inventory);
        let mut state = ScopeState::default();
        navigator.navigate(&mut state, "db").unwrap();

        let result = navigator.navigate(&mut state, "mail");
        assert!(matches!(result, Err(Error::UnknownScope { .. })));
        assert_eq!(state.scope(), "db");
    }

    #[test]
    fn test_resolve_nested_group() {
        let inventory = inventory();
        let navigator = ScopeNavigator::new(&inventory);
        let mut state = ScopeState::default();

        navigator.navigate(&mut state, "site").unwrap();
        assert_eq!(
            navigator.resolve_current_hosts(&state).unwrap(),
            vec!["web1", "web2", "db1"]
        );
    }

    #[test]
    fn test_set_serial() {
        let inventory = inventory();
        let navigator = ScopeNavigator::new(&inventory);
        let mut state = ScopeState::default();

        navigator.set_serial(&mut state, 10_000);
        assert_eq!(state.serial(), 10_000);
        assert_eq!(state.scope(), "all");
    }

    #[test]
    fn test_resolution_follows_inventory_changes() {
        let before = inventory();
        let mut state = ScopeState::default();
        ScopeNavigator::new(&before).navigate(&mut state, "web").unwrap();

        let after = Inventory::from_ini_str("[web]\nweb1\nweb2\nweb3\n");
        let hosts = ScopeNavigator::new(&after).resolve_current_hosts(&state).unwrap();
        assert_eq!(hosts, vec!["web1", "web2", "web3"]);
    }

    #[test]
    fn test_revalidate_falls_back_to_all() {
        let before = inventory();
        let mut state = ScopeState::default();
        ScopeNavigator::new(&before).navigate(&mut state, "db").unwrap();

        let after = Inventory::from_ini_str("[web]\nweb1\n");
        assert!(ScopeNavigator::new(&after).revalidate(&mut state));
        assert_eq!(state.scope(), "all");
        assert!(!ScopeNavigator::new(&after).revalidate(&mut state));
    }

    #[test]
    fn test_display() {
        assert_eq!(ScopeState::default().to_string(), "all");
        assert_eq!(ScopeState::with_serial(2).to_string(), "all (serial 2)");
    }
}
