//! Host and group inventory.
//!
//! An inventory is loaded once from a YAML or INI file, together with any
//! `group_vars/` and `host_vars/` files next to it. Groups can nest, and every
//! host is implicitly a member of the `all` group. Host lists are always
//! returned in definition order without duplicates.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use log::debug;

use crate::config::{self, ROOT_GROUP};
use crate::error::{Error, Result};
use crate::vault::{envelope, Secret};

mod ini;
pub mod pattern;
pub mod variables;
mod yaml;

pub use variables::{SealedVars, Variable, Variables};

const UNGROUPED_GROUP: &str = "ungrouped";
const VARS_FILE_EXTENSIONS: [&str; 3] = ["", "yml", "yaml"];

#[derive(Debug, Default, Clone)]
struct HostEntry {
    vars: Variables,
    sealed: Vec<SealedVars>,
}

#[derive(Debug, Default, Clone)]
struct GroupEntry {
    hosts: Vec<String>,
    children: Vec<String>,
    vars: Variables,
    sealed: Vec<SealedVars>,
}

#[derive(Debug, Clone)]
pub struct Inventory {
    path: Option<PathBuf>,
    hosts: IndexMap<String, HostEntry>,
    groups: IndexMap<String, GroupEntry>,
    /// Host name to its groups in variable precedence order.
    memberships: HashMap<String, Vec<String>>,
}

impl Inventory {
    /// Loads an inventory file and its variable directories.
    ///
    /// Files ending in `.yml` or `.yaml` are read as YAML, anything else as INI.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a vars
    /// file next to it is malformed.
    pub fn load(path: &Path) -> Result<Self> {
        let path_description = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|e| {
            Error::io_error("inventory".to_string(), path_description.clone(), e)
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|extension| extension.to_str()),
            Some("yml" | "yaml")
        );

        let mut builder = if is_yaml {
            yaml::parse(&path_description, &text)?
        } else {
            ini::parse(&path_description, &text)
        };

        builder.load_vars_directories(path)?;

        let mut inventory = builder.finish();
        inventory.path = Some(path.to_path_buf());

        debug!(
            "Loaded inventory `{}` with {} hosts and {} groups",
            path_description,
            inventory.hosts.len(),
            inventory.groups.len()
        );
        Ok(inventory)
    }

    /// Parses a YAML inventory without looking for vars directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid YAML inventory.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(yaml::parse("<string>", text)?.finish())
    }

    /// Parses an INI inventory without looking for vars directories.
    #[must_use]
    pub fn from_ini_str(text: &str) -> Self {
        ini::parse("<string>", text).finish()
    }

    /// Reads the inventory again from the file it was loaded from.
    ///
    /// # Errors
    ///
    /// Returns an error if the inventory was not loaded from a file or if
    /// loading fails.
    pub fn reload(&self) -> Result<Self> {
        match &self.path {
            Some(path) => Self::load(path),
            None => Err(Error::inventory(
                "<string>",
                "inventory was not loaded from a file",
            )),
        }
    }

    #[must_use]
    pub fn has_host(&self, name: &str) -> bool {
        self.hosts.contains_key(name)
    }

    /// All host names in definition order.
    pub fn host_names(&self) -> impl Iterator<Item = &String> {
        self.hosts.keys()
    }

    /// All group names in definition order, `all` first.
    pub fn group_names(&self) -> impl Iterator<Item = &String> {
        self.groups.keys()
    }

    fn top_level_groups(&self) -> Vec<&String> {
        let nested: HashSet<&String> = self
            .groups
            .values()
            .flat_map(|group| group.children.iter())
            .collect();

        self.groups
            .keys()
            .filter(|name| name.as_str() != ROOT_GROUP && !nested.contains(name))
            .collect()
    }

    /// Expands a group and its subgroups into a flat, ordered host list.
    ///
    /// Returns `None` if the group does not exist.
    #[must_use]
    pub fn group_hosts(&self, name: &str) -> Option<IndexSet<String>> {
        if name == ROOT_GROUP {
            return Some(self.hosts.keys().cloned().collect());
        }

        if !self.groups.contains_key(name) {
            return None;
        }

        let mut hosts = IndexSet::new();
        let mut visited = HashSet::new();
        self.expand_group(name, &mut hosts, &mut visited);
        Some(hosts)
    }

    fn expand_group<'a>(
        &'a self,
        name: &'a str,
        hosts: &mut IndexSet<String>,
        visited: &mut HashSet<&'a str>,
    ) {
        if !visited.insert(name) {
            return;
        }

        let Some(group) = self.groups.get(name) else {
            return;
        };

        hosts.extend(group.hosts.iter().cloned());
        for child in &group.children {
            self.expand_group(child, hosts, visited);
        }
    }

    /// Records, for every host, the groups it belongs to directly or through
    /// nesting, ordered from least to most specific.
    fn index_memberships(&mut self) {
        self.memberships = self.ordered_memberships();
    }

    fn ordered_memberships(&self) -> HashMap<String, Vec<String>> {
        let depths = self.group_depths();

        let mut ordered: Vec<(usize, usize, &String)> = self
            .groups
            .keys()
            .enumerate()
            .map(|(position, name)| (depths.get(name).copied().unwrap_or(1), position, name))
            .collect();
        ordered.sort();

        let mut memberships: HashMap<String, Vec<String>> = HashMap::new();
        for (_, _, group) in ordered {
            for host in self.group_hosts(group).unwrap_or_default() {
                memberships.entry(host).or_default().push(group.clone());
            }
        }

        memberships
    }

    fn groups_of(&self, host: &str) -> &[String] {
        self.memberships.get(host).map_or(&[], Vec::as_slice)
    }

    fn group_depths(&self) -> HashMap<&String, usize> {
        let mut depths: HashMap<&String, usize> = HashMap::new();
        let mut pending: Vec<(&String, usize)> =
            self.top_level_groups().into_iter().map(|name| (name, 1)).collect();

        while let Some((name, depth)) = pending.pop() {
            if depths.get(name).is_some_and(|&known| known >= depth) {
                continue;
            }
            // Depth is bounded by the group count, which also stops cycles.
            if depth > self.groups.len() {
                continue;
            }
            depths.insert(name, depth);

            if let Some(group) = self.groups.get(name.as_str()) {
                pending.extend(group.children.iter().map(|child| (child, depth + 1)));
            }
        }

        if let Some((root, _)) = self.groups.get_key_value(ROOT_GROUP) {
            depths.insert(root, 0);
        }
        depths
    }

    /// Resolves the variables that apply to a host.
    ///
    /// Precedence runs from `all`, through groups by nesting depth, to the
    /// host's own variables. Within one level, vars files override inline
    /// inventory variables. `inventory_hostname` is always set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SecretRequired`] if an encrypted vars file applies and
    /// no secret is given, or a vault error if it cannot be decrypted.
    pub fn host_variables(&self, host: &str, secret: Option<&Secret>) -> Result<Variables> {
        let mut variables = Variables::new();

        for group_name in self.groups_of(host) {
            if let Some(group) = self.groups.get(group_name.as_str()) {
                merge_layer(&mut variables, &group.vars, &group.sealed, secret)?;
            }
        }

        if let Some(entry) = self.hosts.get(host) {
            merge_layer(&mut variables, &entry.vars, &entry.sealed, secret)?;
        }

        variables.insert(
            "inventory_hostname".to_string(),
            Variable::Plain(serde_yaml::Value::String(host.to_string())),
        );

        Ok(variables)
    }
}

fn merge_layer(
    variables: &mut Variables,
    inline: &Variables,
    sealed: &[SealedVars],
    secret: Option<&Secret>,
) -> Result<()> {
    variables.extend(inline.iter().map(|(k, v)| (k.clone(), v.clone())));
    for vars_file in sealed {
        variables.extend(vars_file.open(secret)?);
    }
    Ok(())
}

/// Collects hosts, groups and variables while an inventory source is parsed.
#[derive(Debug, Default)]
pub(crate) struct InventoryBuilder {
    hosts: IndexMap<String, HostEntry>,
    groups: IndexMap<String, GroupEntry>,
}

impl InventoryBuilder {
    pub(crate) fn new() -> Self {
        let mut builder = Self::default();
        builder.group(ROOT_GROUP);
        builder
    }

    pub(crate) fn group(&mut self, name: &str) {
        if !self.groups.contains_key(name) {
            self.groups.insert(name.to_string(), GroupEntry::default());
        }
    }

    pub(crate) fn add_host(&mut self, group: &str, host: &str, vars: Variables) {
        self.hosts.entry(host.to_string()).or_default().vars.extend(vars);

        self.group(group);
        if group == ROOT_GROUP {
            return;
        }

        if let Some(entry) = self.groups.get_mut(group) {
            if !entry.hosts.iter().any(|existing| existing == host) {
                entry.hosts.push(host.to_string());
            }
        }
    }

    pub(crate) fn add_child(&mut self, parent: &str, child: &str) {
        self.group(child);
        self.group(parent);
        if parent == ROOT_GROUP || parent == child {
            return;
        }

        if let Some(entry) = self.groups.get_mut(parent) {
            if !entry.children.iter().any(|existing| existing == child) {
                entry.children.push(child.to_string());
            }
        }
    }

    pub(crate) fn set_group_vars(&mut self, group: &str, vars: Variables) {
        self.group(group);
        if let Some(entry) = self.groups.get_mut(group) {
            entry.vars.extend(vars);
        }
    }

    fn load_vars_directories(&mut self, inventory_path: &Path) -> Result<()> {
        let group_vars = config::group_vars_directory(inventory_path);
        let group_names: Vec<String> = self.groups.keys().cloned().collect();
        for name in group_names {
            for (path, layer) in read_vars_files(&group_vars, &name)? {
                debug!("Loaded group vars `{path}`");
                if let Some(entry) = self.groups.get_mut(&name) {
                    layer.apply(&mut entry.vars, &mut entry.sealed);
                }
            }
        }

        let host_vars = config::host_vars_directory(inventory_path);
        let host_names: Vec<String> = self.hosts.keys().cloned().collect();
        for name in host_names {
            for (path, layer) in read_vars_files(&host_vars, &name)? {
                debug!("Loaded host vars `{path}`");
                if let Some(entry) = self.hosts.get_mut(&name) {
                    layer.apply(&mut entry.vars, &mut entry.sealed);
                }
            }
        }

        Ok(())
    }

    pub(crate) fn finish(mut self) -> Inventory {
        let grouped: HashSet<String> = self
            .groups
            .iter()
            .filter(|(name, _)| name.as_str() != ROOT_GROUP && name.as_str() != UNGROUPED_GROUP)
            .flat_map(|(_, group)| group.hosts.iter().cloned())
            .collect();

        let ungrouped: Vec<String> = self
            .hosts
            .keys()
            .filter(|host| !grouped.contains(*host))
            .cloned()
            .collect();

        self.group(UNGROUPED_GROUP);
        if let Some(entry) = self.groups.get_mut(UNGROUPED_GROUP) {
            for host in ungrouped {
                if !entry.hosts.contains(&host) {
                    entry.hosts.push(host);
                }
            }
        }

        let mut inventory = Inventory {
            path: None,
            hosts: self.hosts,
            groups: self.groups,
            memberships: HashMap::new(),
        };
        inventory.index_memberships();
        inventory
    }
}

enum VarsLayer {
    Plain(Variables),
    Sealed(SealedVars),
}

impl VarsLayer {
    fn apply(self, vars: &mut Variables, sealed: &mut Vec<SealedVars>) {
        match self {
            VarsLayer::Plain(layer) => vars.extend(layer),
            VarsLayer::Sealed(layer) => sealed.push(layer),
        }
    }
}

fn read_vars_files(directory: &Path, name: &str) -> Result<Vec<(String, VarsLayer)>> {
    let mut layers = Vec::new();

    for extension in VARS_FILE_EXTENSIONS {
        let path = if extension.is_empty() {
            directory.join(name)
        } else {
            directory.join(format!("{name}.{extension}"))
        };

        if !path.is_file() {
            continue;
        }

        let path_description = path.display().to_string();
        let text = fs::read_to_string(&path).map_err(|e| {
            Error::io_error("variables".to_string(), path_description.clone(), e)
        })?;

        let layer = if envelope::is_encrypted(&text) {
            VarsLayer::Sealed(SealedVars {
                path: path_description.clone(),
                envelope: text,
            })
        } else {
            VarsLayer::Plain(variables::parse_variables_document(&path_description, &text)?)
        };

        layers.push((path_description, layer));
    }

    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NESTED: &str = r"
all:
  vars:
    env: prod
    tier: none
  hosts:
    bastion:
  children:
    web:
      hosts:
        web1:
        web2:
          tier: edge
      vars:
        tier: frontend
    db:
      hosts:
        db1:
      children:
        replicas:
          hosts:
            db2:
            web1:
          vars:
            tier: replica
";

    fn inventory() -> Inventory {
        Inventory::from_yaml_str(NESTED).unwrap()
    }

    fn names(hosts: IndexSet<String>) -> Vec<String> {
        hosts.into_iter().collect()
    }

    #[test]
    fn test_all_contains_every_host_in_order() {
        let hosts = inventory().group_hosts("all").unwrap();
        assert_eq!(names(hosts), vec!["bastion", "web1", "web2", "db1", "db2"]);
    }

    #[test]
    fn test_nested_group_expansion_is_ordered_and_unique() {
        let hosts = inventory().group_hosts("db").unwrap();
        assert_eq!(names(hosts), vec!["db1", "db2", "web1"]);
    }

    #[test]
    fn test_unknown_group() {
        assert!(inventory().group_hosts("nope").is_none());
    }

    #[test]
    fn test_ungrouped_hosts() {
        let hosts = inventory().group_hosts("ungrouped").unwrap();
        assert_eq!(names(hosts), vec!["bastion"]);
    }

    #[test]
    fn test_memberships_follow_depth() {
        let inventory = inventory();
        assert_eq!(inventory.groups_of("web1"), ["all", "web", "db", "replicas"]);
        assert_eq!(inventory.groups_of("bastion"), ["all", "ungrouped"]);
        assert!(inventory.groups_of("nope").is_empty());
    }

    #[test]
    fn test_variable_precedence() {
        let inventory = inventory();

        let web2 = inventory.host_variables("web2", None).unwrap();
        assert_eq!(web2["tier"].reveal(None).unwrap(), "edge");
        assert_eq!(web2["env"].reveal(None).unwrap(), "prod");

        // web1 sits in `web` (depth 1) and `replicas` (depth 2).
        let web1 = inventory.host_variables("web1", None).unwrap();
        assert_eq!(web1["tier"].reveal(None).unwrap(), "replica");

        let bastion = inventory.host_variables("bastion", None).unwrap();
        assert_eq!(bastion["tier"].reveal(None).unwrap(), "none");
        assert_eq!(bastion["inventory_hostname"].reveal(None).unwrap(), "bastion");
    }

    #[test]
    fn test_group_cycle_does_not_loop() {
        let inventory = Inventory::from_ini_str(
            "[a]\nh1\n[b]\nh2\n[a:children]\nb\n[b:children]\na\n",
        );
        let hosts = inventory.group_hosts("a").unwrap();
        assert_eq!(names(hosts), vec!["h1", "h2"]);
        assert!(inventory.host_variables("h1", None).is_ok());
    }

    #[test]
    fn test_load_with_vars_directories() {
        let directory = tempfile::tempdir().unwrap();
        let inventory_path = directory.path().join("hosts");
        fs::write(&inventory_path, "[db]\ndb1\n").unwrap();

        let secret = Secret::new("pw".to_string());
        fs::create_dir(directory.path().join("group_vars")).unwrap();
        fs::write(
            directory.path().join("group_vars").join("db.yml"),
            envelope::encrypt(b"db_password: hunter2\n", &secret).unwrap(),
        )
        .unwrap();
        fs::create_dir(directory.path().join("host_vars")).unwrap();
        fs::write(
            directory.path().join("host_vars").join("db1.yaml"),
            "port: 5432\n",
        )
        .unwrap();

        let inventory = Inventory::load(&inventory_path).unwrap();

        assert!(matches!(
            inventory.host_variables("db1", None),
            Err(Error::SecretRequired)
        ));

        let variables = inventory.host_variables("db1", Some(&secret)).unwrap();
        assert_eq!(variables["db_password"].reveal(None).unwrap(), "hunter2");
        assert_eq!(variables["port"].reveal(None).unwrap(), "5432");
    }

    #[test]
    fn test_reload_picks_up_changes() {
        let directory = tempfile::tempdir().unwrap();
        let inventory_path = directory.path().join("hosts");
        fs::write(&inventory_path, "[web]\nweb1\n").unwrap();

        let inventory = Inventory::load(&inventory_path).unwrap();
        assert!(!inventory.has_host("web2"));

        fs::write(&inventory_path, "[web]\nweb1\nweb2\n").unwrap();
        let reloaded = inventory.reload().unwrap();
        assert!(reloaded.has_host("web2"));
    }

    #[test]
    fn test_reload_without_file() {
        assert!(inventory().reload().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let result = Inventory::load(Path::new("/this/path/does/not/exist.yml"));
        assert!(matches!(result, Err(Error::Io { .. })));
    }
}
