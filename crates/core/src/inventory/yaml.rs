//! YAML inventories: nested `hosts`, `vars` and `children` mappings under
//! top-level group names, usually just `all`.

use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result};
use crate::inventory::variables::variables_from_value;
use crate::inventory::InventoryBuilder;

pub(crate) fn parse(path: &str, text: &str) -> Result<InventoryBuilder> {
    let document: Value = serde_yaml::from_str(text).map_err(|e| {
        Error::yaml_error(
            "reading".to_string(),
            "inventory".to_string(),
            path.to_string(),
            e,
        )
    })?;

    let mut builder = InventoryBuilder::new();

    match &document {
        Value::Null => {}
        Value::Mapping(groups) => {
            for (name, group) in groups {
                let name = key_name(path, name)?;
                parse_group(path, &mut builder, name, group)?;
            }
        }
        _ => {
            return Err(Error::inventory(
                path,
                "top level must be a mapping of group names",
            ))
        }
    }

    Ok(builder)
}

fn parse_group(path: &str, builder: &mut InventoryBuilder, name: &str, group: &Value) -> Result<()> {
    builder.group(name);

    let group = match group {
        Value::Null => return Ok(()),
        Value::Mapping(group) => group,
        _ => {
            return Err(Error::inventory(
                path,
                format!("group `{name}` must be a mapping"),
            ))
        }
    };

    if let Some(hosts) = section(path, name, group, "hosts")? {
        for (host, vars) in hosts {
            let host = key_name(path, host)?;
            builder.add_host(name, host, variables_from_value(path, vars)?);
        }
    }

    if let Some(vars) = group.get("vars") {
        builder.set_group_vars(name, variables_from_value(path, vars)?);
    }

    if let Some(children) = section(path, name, group, "children")? {
        for (child, child_group) in children {
            let child = key_name(path, child)?;
            builder.add_child(name, child);
            parse_group(path, builder, child, child_group)?;
        }
    }

    Ok(())
}

fn section<'a>(
    path: &str,
    group_name: &str,
    group: &'a Mapping,
    key: &str,
) -> Result<Option<&'a Mapping>> {
    match group.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Mapping(mapping)) => Ok(Some(mapping)),
        Some(_) => Err(Error::inventory(
            path,
            format!("`{key}` of group `{group_name}` must be a mapping"),
        )),
    }
}

fn key_name<'a>(path: &str, key: &'a Value) -> Result<&'a str> {
    key.as_str()
        .ok_or_else(|| Error::inventory(path, "host and group names must be strings"))
}
