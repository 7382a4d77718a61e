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

//! The resource catalog advertised by the CE
//!
//! Each [ResourceEntry] becomes one classad record. The job router matches
//! incoming jobs against the `Requirements` of the records and applies the
//! `Transform` of the matching one. The catalog is rendered as a single
//! configuration variable:
//!
//! ```text
//! OSG_ResourceCatalog = { \
//!   [ \
//!     CPUs = 1; \
//!     Memory = 2000; \
//!     Name = "sc1"; \
//!     Requirements = TARGET.RequestCPUs <= CPUs && TARGET.RequestMemory <= Memory; \
//!     Transform = [ set_MaxMemory = RequestMemory; set_xcount = RequestCPUs; ]; \
//!   ] \
//! }
//! ```

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use log::warn;

use crate::config::SettingError;

/// Placeholder shipped in the example configuration
pub const BANNED_LITERAL: &str = "CHANGEME";

/// A homogeneous set of resources jobs can be routed to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceEntry {
    pub name: String,

    /// Configuration section the entry was read from
    pub section: Option<String>,
    pub cpus: Option<u32>,
    pub gpus: Option<u32>,
    pub memory_mb: Option<u32>,
    pub max_wall_time_minutes: Option<u32>,
    pub max_pilots: Option<u32>,

    /// `*` stands for the site-wide default VOs
    pub allowed_vos: Vec<String>,
    pub queue: Option<String>,
    pub subclusters: Vec<String>,
    pub vo_tag: Option<String>,
    pub require_singularity: bool,
    pub send_tests: bool,
    pub whole_node: bool,
    pub is_pilot: bool,
    pub os: Option<String>,
    pub extra_requirements: Option<String>,
    pub extra_transforms: Option<String>,
}

impl ResourceEntry {
    pub fn new(name: &str, cpus: u32, memory_mb: u32) -> ResourceEntry {
        ResourceEntry {
            name: name.to_owned(),
            cpus: Some(cpus),
            memory_mb: Some(memory_mb),
            ..ResourceEntry::default()
        }
    }

    pub fn validate(&self) -> Result<(), SettingError> {
        let fail = |message: String| {
            Err(SettingError {
                message,
                section: self.section.clone(),
                option: None,
            })
        };
        if self.name.trim().is_empty() {
            return fail("Resource entry without a name".to_owned());
        }
        if self.name.contains(BANNED_LITERAL) {
            return fail(format!(
                "Resource entry name '{}' contains {}, you must change it",
                self.name, BANNED_LITERAL
            ));
        }
        if self.cpus == Some(0) {
            return fail(format!("CPUs of resource entry {} must be at least 1", self.name));
        }
        if self.memory_mb == Some(0) {
            return fail(format!("Memory of resource entry {} must be at least 1", self.name));
        }
        if !self.is_pilot && (self.cpus.is_none() || self.memory_mb.is_none()) {
            return fail(format!("Resource entry {} needs both CPUs and memory", self.name));
        }
        Ok(())
    }
}

/// Ordered classad records, one per entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceCatalog {
    records: Vec<BTreeMap<&'static str, String>>,
}

impl ResourceCatalog {
    pub fn new() -> ResourceCatalog {
        ResourceCatalog::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Add an entry, expanding `*` in its VOs to `default_vos`
    pub fn add_entry(
        &mut self,
        entry: &ResourceEntry,
        default_vos: &BTreeSet<String>,
    ) -> Result<(), SettingError> {
        entry.validate()?;

        let mut record = BTreeMap::new();
        record.insert("Name", quote(&entry.name));
        if let Some(cpus) = entry.cpus {
            record.insert("CPUs", cpus.to_string());
        }
        if let Some(memory) = entry.memory_mb {
            record.insert("Memory", memory.to_string());
        }
        if let Some(gpus) = entry.gpus {
            record.insert("GPUs", gpus.to_string());
        }
        if let Some(wall_time) = entry.max_wall_time_minutes {
            record.insert("MaxWallTime", wall_time.to_string());
        }
        if let Some(pilots) = entry.max_pilots {
            record.insert("MaxPilots", pilots.to_string());
        }
        if let Some(os) = &entry.os {
            record.insert("OS", quote(os));
        }

        let allowed_vos = expand_vos(entry, default_vos);
        if !allowed_vos.is_empty() {
            record.insert("AllowedVOs", list(&allowed_vos));
        }
        if !entry.subclusters.is_empty() {
            record.insert("Subclusters", list(&entry.subclusters));
        }
        if entry.is_pilot {
            record.insert("IsPilotEntry", "True".to_owned());
            record.insert("RequireSingularity", classad_bool(entry.require_singularity));
            record.insert("SendTests", classad_bool(entry.send_tests));
            record.insert("WholeNode", classad_bool(entry.whole_node));
        }

        let mut requirements = Vec::new();
        if entry.cpus.is_some() {
            requirements.push("TARGET.RequestCPUs <= CPUs".to_owned());
        }
        if entry.memory_mb.is_some() {
            requirements.push("TARGET.RequestMemory <= Memory".to_owned());
        }
        if entry.gpus.is_some() {
            requirements.push("TARGET.RequestGPUs <= GPUs".to_owned());
        }
        if !allowed_vos.is_empty() {
            requirements.push("member(TARGET.VO, AllowedVOs)".to_owned());
        }
        if let Some(tag) = &entry.vo_tag {
            requirements.push(format!("TARGET.VOTag == {}", quote(tag)));
        }
        if let Some(extra) = non_empty(&entry.extra_requirements) {
            requirements.push(extra.to_owned());
        }
        record.insert(
            "Requirements",
            if requirements.is_empty() {
                "True".to_owned()
            } else {
                requirements.join(" && ")
            },
        );

        let mut transforms = vec![
            "set_MaxMemory = RequestMemory".to_owned(),
            "set_xcount = RequestCPUs".to_owned(),
        ];
        if let Some(queue) = &entry.queue {
            transforms.push(format!("set_remote_queue = {}", quote(queue)));
        }
        if let Some(tag) = &entry.vo_tag {
            transforms.push(format!("set_VOTag = {}", quote(tag)));
        }
        if let Some(extra) = non_empty(&entry.extra_transforms) {
            transforms.push(extra.trim_end_matches(';').trim().to_owned());
        }
        record.insert(
            "Transform",
            format!(
                "[ {}]",
                transforms
                    .iter()
                    .map(|t| format!("{t}; "))
                    .collect::<String>()
            ),
        );

        self.records.push(record);
        Ok(())
    }

    /// Render the catalog as a condor configuration assignment
    pub fn compose_text(&self) -> String {
        if self.records.is_empty() {
            return "OSG_ResourceCatalog = {}\n".to_owned();
        }

        let records: Vec<String> = self
            .records
            .iter()
            .map(|record| {
                let mut text = String::from("  [ \\\n");
                for (key, value) in record {
                    text.push_str(&format!("    {key} = {value}; \\\n"));
                }
                text.push_str("  ]");
                text
            })
            .collect();

        format!(
            "OSG_ResourceCatalog = {{ \\\n{} \\\n}}\n",
            records.join(", \\\n")
        )
    }
}

fn expand_vos(entry: &ResourceEntry, default_vos: &BTreeSet<String>) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();
    for vo in &entry.allowed_vos {
        if vo == "*" {
            if default_vos.is_empty() {
                warn!(
                    "Resource entry {} allows '*' but no default VOs are known, check the VOMS mapfiles",
                    entry.name
                );
            }
            for default in default_vos {
                if !result.contains(default) {
                    result.push(default.to_owned());
                }
            }
        } else if !result.contains(vo) {
            result.push(vo.to_owned());
        }
    }
    result
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn list(values: &[String]) -> String {
    format!(
        "{{ {} }}",
        values.iter().map(|v| quote(v)).collect::<Vec<_>>().join(", ")
    )
}

fn classad_bool(value: bool) -> String {
    if value { "True" } else { "False" }.to_owned()
}
