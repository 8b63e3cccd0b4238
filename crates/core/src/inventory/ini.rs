//! INI inventories.
//!
//! ```text
//! localhost ansible_connection=local
//!
//! [web]
//! web1 ansible_host=10.0.0.1
//!
//! [web:vars]
//! http_port=8080
//!
//! [site:children]
//! web
//! ```

use log::warn;
use serde_yaml::Value;

use crate::config::ROOT_GROUP;
use crate::inventory::{InventoryBuilder, Variable, Variables};

enum Section {
    Hosts(String),
    Children(String),
    Vars(String),
}

pub(crate) fn parse(path: &str, text: &str) -> InventoryBuilder {
    let mut builder = InventoryBuilder::new();
    let mut section = Section::Hosts(ROOT_GROUP.to_string());

    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            section = parse_header(header.trim());
            if let Section::Hosts(group) | Section::Children(group) | Section::Vars(group) =
                &section
            {
                builder.group(group);
            }
            continue;
        }

        match &section {
            Section::Hosts(group) => {
                let mut tokens = tokenize(line).into_iter();
                let Some(host) = tokens.next() else {
                    continue;
                };
                let vars = parse_assignments(path, number, tokens);
                builder.add_host(group, &host, vars);
            }
            Section::Children(group) => builder.add_child(group, line),
            Section::Vars(group) => {
                let vars = parse_assignments(path, number, tokenize(line).into_iter());
                builder.set_group_vars(group, vars);
            }
        }
    }

    builder
}

fn parse_header(header: &str) -> Section {
    match header.rsplit_once(':') {
        Some((group, "children")) => Section::Children(group.to_string()),
        Some((group, "vars")) => Section::Vars(group.to_string()),
        _ => Section::Hosts(header.to_string()),
    }
}

fn parse_assignments(path: &str, number: usize, tokens: impl Iterator<Item = String>) -> Variables {
    let mut vars = Variables::new();
    for token in tokens {
        match token.split_once('=') {
            Some((key, value)) => {
                vars.insert(
                    key.to_string(),
                    Variable::Plain(Value::String(value.to_string())),
                );
            }
            None => warn!(
                "Ignoring `{token}` on line {} of `{path}`, expected key=value",
                number + 1
            ),
        }
    }
    vars
}

/// Splits on whitespace, keeping quoted runs together and dropping the quotes.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_token = false;

    for character in line.chars() {
        match quote {
            Some(open) if character == open => quote = None,
            Some(_) => current.push(character),
            None if character == '"' || character == '\'' => {
                quote = Some(character);
                in_token = true;
            }
            None if character.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None if character == '#' && !in_token => break,
            None => {
                current.push(character);
                in_token = true;
            }
        }
    }

    if in_token {
        tokens.push(current);
    }
    tokens
}
