/*  osg-configure: site configuration for grid computing resources
 *  Copyright (C) 2019 The osg-configure developers
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! The attribute bus and the attributes file
//!
//! Modules publish their mappable options as attributes while parsing. The
//! bus is written to a shell script that job wrappers source to learn about
//! the site.

use std::collections::BTreeMap;
use std::path::Path;

use log::info;

use crate::config::Error;
use crate::util::atomic_file;
use crate::util::atomic_file::Ownership;

pub const DEFAULT_ATTRIBUTES_FILE: &str = "/var/lib/osg/osg-attributes.conf";

/// Value requesting removal of a variable from the environment
pub const UNSET: &str = "UNSET";

const HEADER: &str = "\
#!/bin/sh
#---------- This file automatically generated by osg-configure
#---------- This is periodically overwritten.  DO NOT HAND EDIT
#---------- Instead, write any environment variable customizations into
#---------- the [Local Settings] section of the configuration
";

const TEMPLATE: &str = "{{ header }}
#---------- variables
{% for entry in entries %}{% if entry.state == \"undefined\" %}# {{ entry.name }} is undefined
{% elif entry.state == \"unset\" %}unset {{ entry.name }}
{% else %}{{ entry.name }}=\"{{ entry.value }}\"
{% endif %}{% endfor %}
#---------- exports
{% for entry in entries %}{% if entry.state == \"set\" %}export {{ entry.name }}
{% endif %}{% endfor %}";

/// Attributes published by all modules of a run
///
/// A later publisher of the same name replaces the earlier value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeBus {
    values: BTreeMap<String, Option<String>>,
}

impl AttributeBus {
    pub fn new() -> AttributeBus {
        AttributeBus::default()
    }

    pub fn publish(&mut self, name: &str, value: Option<String>) {
        self.values.insert(name.to_owned(), value);
    }

    pub fn extend(&mut self, attributes: BTreeMap<String, String>) {
        for (name, value) in attributes {
            self.values.insert(name, Some(value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(|v| v.as_deref())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Option<String>)> {
        self.values.iter()
    }

    /// Shell script defining and exporting all attributes, sorted by name
    pub fn render(&self) -> Result<String, Error> {
        let entries: Vec<BTreeMap<&str, String>> = self
            .values
            .iter()
            .map(|(name, value)| {
                let mut entry = BTreeMap::new();
                entry.insert("name", name.to_owned());
                let state = match value {
                    None => "undefined",
                    Some(v) if v == UNSET => "unset",
                    Some(v) => {
                        entry.insert("value", shell_escape(v));
                        "set"
                    }
                };
                entry.insert("state", state.to_owned());
                entry
            })
            .collect();

        let mut tera = tera::Tera::default();
        tera.autoescape_on(vec![]);
        tera.add_raw_template("osg-attributes.conf", TEMPLATE)
            .map_err(|e| Error::Application(format!("Invalid attributes template: {e}")))?;
        let mut context = tera::Context::new();
        context.insert("header", HEADER);
        context.insert("entries", &entries);
        tera.render("osg-attributes.conf", &context)
            .map_err(|e| Error::Application(format!("Could not render attributes: {e}")))
    }
}

/// Write the attributes file atomically, readable by everyone
pub fn write_attributes_file(path: &Path, attributes: &AttributeBus) -> Result<(), Error> {
    let content = attributes.render()?;
    atomic_file::write_file(path, content.as_bytes(), 0o644, Ownership::Preserve)?;
    info!("Wrote {} attributes to {}", attributes.len(), path.display());
    Ok(())
}

/// Escape characters special inside double quotes
fn shell_escape(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            result.push('\\');
        }
        result.push(c);
    }
    result
}
