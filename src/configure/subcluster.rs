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

//! Read `Subcluster`, `Resource Entry` and `Pilot` sections
//!
//! The three section kinds describe compute partitions of the site. They
//! share most of their fields but differ in what is mandatory:
//!
//! * `Subcluster` sections carry the hardware description of the nodes
//! * `Resource Entry` sections only need what the job router matches on and
//!   may take CPUs and memory from the subclusters they reference
//! * `Pilot` sections describe pilot job slots

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use log::error;

use crate::config::{Configuration, SettingError};
use crate::configure::resource_catalog::{ResourceCatalog, ResourceEntry, BANNED_LITERAL};
use crate::util::validation;

/// Kind of a compute partition section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Subcluster,
    ResourceEntry,
    Pilot,
}

impl SectionKind {
    pub fn of(section: &str) -> Option<SectionKind> {
        let lower = section.to_lowercase();
        if lower.starts_with("subcluster") {
            Some(SectionKind::Subcluster)
        } else if lower.starts_with("resource entry") {
            Some(SectionKind::ResourceEntry)
        } else if lower.starts_with("pilot") {
            Some(SectionKind::Pilot)
        } else {
            None
        }
    }

    fn prefix_len(self) -> usize {
        match self {
            SectionKind::Subcluster => "subcluster".len(),
            SectionKind::ResourceEntry => "resource entry".len(),
            SectionKind::Pilot => "pilot".len(),
        }
    }

    fn mandatory(self) -> &'static [&'static str] {
        match self {
            SectionKind::Subcluster => &[
                "name",
                "node_count",
                "ram_mb",
                "cpu_speed_mhz",
                "cpus_per_node",
                "cores_per_node",
            ],
            SectionKind::ResourceEntry => &["name"],
            SectionKind::Pilot => &[],
        }
    }

    fn known(self) -> &'static [&'static str] {
        match self {
            SectionKind::Subcluster => &[
                "name",
                "node_count",
                "ram_mb",
                "swap_mb",
                "cpu_model",
                "cpu_vendor",
                "cpu_speed_mhz",
                "cpu_platform",
                "cpus_per_node",
                "cores_per_node",
                "inbound_network",
                "outbound_network",
                "hepspec",
                "si00",
                "sf00",
                "allowed_vos",
                "max_wall_time",
                "queue",
                "vo_tag",
                "extra_requirements",
                "extra_transforms",
            ],
            SectionKind::ResourceEntry => &[
                "name",
                "cpucount",
                "maxmemory",
                "allowed_vos",
                "max_wall_time",
                "queue",
                "subclusters",
                "vo_tag",
                "extra_requirements",
                "extra_transforms",
            ],
            SectionKind::Pilot => &[
                "name",
                "cpucount",
                "ram_mb",
                "gpucount",
                "max_pilots",
                "max_wall_time",
                "whole_node",
                "require_singularity",
                "os",
                "send_tests",
                "is_pilot",
                "queue",
                "allowed_vos",
                "extra_requirements",
                "extra_transforms",
            ],
        }
    }
}

/// Inclusive ranges of integer fields
const RANGES: [(&str, i64, i64); 4] = [
    ("cores_per_node", 1, 256),
    ("ram_mb", 500, 102_400),
    ("cpu_speed_mhz", 500, 10_000),
    ("node_count", 1, 1_000_000),
];

/// Inclusive ranges of fractional fields
const FLOAT_RANGES: [(&str, f64, f64); 1] = [("hepspec", 2.0, 50.0)];

const INTEGER_FIELDS: [&str; 13] = [
    "node_count",
    "ram_mb",
    "swap_mb",
    "cpu_speed_mhz",
    "cpus_per_node",
    "cores_per_node",
    "si00",
    "sf00",
    "cpucount",
    "maxmemory",
    "gpucount",
    "max_pilots",
    "max_wall_time",
];

const BOOLEAN_FIELDS: [&str; 6] = [
    "inbound_network",
    "outbound_network",
    "whole_node",
    "require_singularity",
    "send_tests",
    "is_pilot",
];

/// Configuration restricted to compute partition sections
pub fn partition_sections(config: &Configuration) -> Configuration {
    config.filter_sections(|name| SectionKind::of(name).is_some())
}

/// Validate every partition section and build its entry
///
/// All problems are collected so they can be reported in one pass.
pub fn read_entries(config: &Configuration) -> (Vec<ResourceEntry>, Vec<SettingError>) {
    let mut entries = Vec::new();
    let mut errors = Vec::new();

    for section in config.sections() {
        let kind = match SectionKind::of(section) {
            Some(kind) => kind,
            None => continue,
        };
        match read_section(config, section, kind) {
            Ok(entry) => entries.push((kind, section.to_owned(), entry)),
            Err(mut e) => errors.append(&mut e),
        }
    }

    // Resource entries may take their sizes from referenced subclusters
    let subclusters: BTreeMap<String, ResourceEntry> = entries
        .iter()
        .filter(|(kind, _, _)| *kind == SectionKind::Subcluster)
        .map(|(_, _, e)| (e.name.clone(), e.clone()))
        .collect();

    let mut result = Vec::with_capacity(entries.len());
    for (kind, section, mut entry) in entries {
        if kind == SectionKind::ResourceEntry {
            if let Err(e) = resolve_subclusters(&section, &mut entry, &subclusters) {
                errors.push(e);
                continue;
            }
        }
        match entry.validate() {
            Ok(()) => result.push(entry),
            Err(e) => errors.push(e),
        }
    }

    (result, errors)
}

/// Options of partition sections not known for their kind, as (section, option)
pub fn unknown_options(config: &Configuration) -> Vec<(String, String)> {
    let mut result = Vec::new();
    for section in config.sections() {
        let kind = match SectionKind::of(section) {
            Some(kind) => kind,
            None => continue,
        };
        for option in config.own_options(section) {
            if !kind.known().contains(&option.as_str()) {
                result.push((section.to_owned(), option));
            }
        }
    }
    result
}

/// Validate the partition sections, logging every problem
pub fn check_sections(config: &Configuration) -> bool {
    let (_, errors) = read_entries(config);
    for e in &errors {
        error!("{}", e);
    }
    errors.is_empty()
}

/// Build the catalog of all partition sections
pub fn resource_catalog_from_config(
    config: &Configuration,
    default_allowed_vos: &BTreeSet<String>,
) -> Result<ResourceCatalog, SettingError> {
    let (entries, mut errors) = read_entries(config);
    if !errors.is_empty() {
        return Err(errors.remove(0));
    }

    let mut catalog = ResourceCatalog::new();
    for entry in &entries {
        catalog.add_entry(entry, default_allowed_vos)?;
    }
    Ok(catalog)
}

fn read_section(
    config: &Configuration,
    section: &str,
    kind: SectionKind,
) -> Result<ResourceEntry, Vec<SettingError>> {
    if section.contains(BANNED_LITERAL) {
        return Err(vec![SettingError {
            message: format!("You have a section named '{section}', you must change this name."),
            section: Some(section.to_owned()),
            option: None,
        }]);
    }

    let mut errors = Vec::new();
    let mut values: BTreeMap<String, String> = BTreeMap::new();
    for option in config.own_options(section) {
        match config.get(section, &option) {
            Ok(Some(value)) if !validation::is_blank(&value) => {
                values.insert(option, value);
            }
            Ok(_) => {}
            Err(e) => errors.push(e),
        }
    }

    for (option, value) in &values {
        if value.trim() == BANNED_LITERAL {
            errors.push(SettingError::for_option(
                format!("Value for {option} in section {section} is {BANNED_LITERAL}, you must change it"),
                section,
                option,
            ));
        }
    }

    for option in kind.mandatory() {
        if !values.contains_key(*option) {
            errors.push(SettingError::for_option(
                format!("Option {option} in section {section} is mandatory"),
                section,
                option,
            ));
        }
    }

    let mut integers: BTreeMap<&str, i64> = BTreeMap::new();
    for option in INTEGER_FIELDS {
        let value = match values.get(option) {
            Some(value) => value,
            None => continue,
        };
        if !validation::valid_integer(value) {
            errors.push(SettingError::for_option(
                format!("Value for {option} in section {section} must be an integer, got {value}"),
                section,
                option,
            ));
            continue;
        }
        match value.trim().parse::<i64>() {
            Ok(v) if v <= i64::from(u32::MAX) => {
                integers.insert(option, v);
            }
            _ => errors.push(SettingError::for_option(
                format!(
                    "Value for {option} in section {section} is too large, at most {}",
                    u32::MAX
                ),
                section,
                option,
            )),
        }
    }
    for (option, min, max) in RANGES {
        if let Some(value) = integers.get(option) {
            if *value < min || *value > max {
                errors.push(SettingError::for_option(
                    format!(
                        "Value for {option} in section {section} is outside allowed range, {min}-{max}"
                    ),
                    section,
                    option,
                ));
            }
        }
    }
    for (option, min, max) in FLOAT_RANGES {
        if let Some(value) = values.get(option) {
            match value.trim().parse::<f64>() {
                Ok(v) if v.is_finite() && (min..=max).contains(&v) => {}
                Ok(_) => errors.push(SettingError::for_option(
                    format!(
                        "Value for {option} in section {section} is outside allowed range, {min}-{max}"
                    ),
                    section,
                    option,
                )),
                Err(_) => errors.push(SettingError::for_option(
                    format!("Value for {option} in section {section} must be a number, got {value}"),
                    section,
                    option,
                )),
            }
        }
    }
    for option in ["cpus_per_node", "cpucount", "maxmemory", "gpucount", "max_pilots", "max_wall_time"] {
        if let Some(value) = integers.get(option) {
            if *value < 1 {
                errors.push(SettingError::for_option(
                    format!("Value for {option} in section {section} must be at least 1"),
                    section,
                    option,
                ));
            }
        }
    }

    let mut booleans: BTreeMap<&str, bool> = BTreeMap::new();
    for option in BOOLEAN_FIELDS {
        let value = match values.get(option) {
            Some(value) => value,
            None => continue,
        };
        if validation::valid_boolean(config, section, option) {
            booleans.insert(option, validation::parse_boolean(value) == Some(true));
        } else {
            errors.push(SettingError::for_option(
                format!("Value for {option} in section {section} must be a boolean, got {value}"),
                section,
                option,
            ));
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    // Sizes were bounded to 1..=u32::MAX above
    let size = |option: &str| integers.get(option).and_then(|v| u32::try_from(*v).ok());
    let flag = |option: &str| booleans.get(option).copied().unwrap_or(false);
    let text = |option: &str| values.get(option).map(|v| v.trim().to_owned());

    let name = text("name").unwrap_or_else(|| section[kind.prefix_len()..].trim().to_owned());
    let mut entry = ResourceEntry {
        name,
        section: Some(section.to_owned()),
        max_wall_time_minutes: size("max_wall_time"),
        allowed_vos: split_list(values.get("allowed_vos")),
        queue: text("queue"),
        vo_tag: text("vo_tag"),
        extra_requirements: text("extra_requirements"),
        extra_transforms: text("extra_transforms"),
        ..ResourceEntry::default()
    };

    match kind {
        SectionKind::Subcluster => {
            entry.cpus = size("cores_per_node");
            entry.memory_mb = size("ram_mb");
        }
        SectionKind::ResourceEntry => {
            entry.cpus = size("cpucount");
            entry.memory_mb = size("maxmemory");
            entry.subclusters = split_list(values.get("subclusters"));
        }
        SectionKind::Pilot => {
            entry.cpus = size("cpucount");
            entry.memory_mb = size("ram_mb");
            entry.gpus = size("gpucount");
            entry.max_pilots = size("max_pilots");
            entry.whole_node = flag("whole_node");
            entry.require_singularity = booleans.get("require_singularity").copied().unwrap_or(true);
            entry.send_tests = booleans.get("send_tests").copied().unwrap_or(true);
            entry.is_pilot = booleans.get("is_pilot").copied().unwrap_or(true);
            entry.os = text("os");
        }
    }

    Ok(entry)
}

/// Fill missing CPUs and memory with the smallest referenced subcluster
fn resolve_subclusters(
    section: &str,
    entry: &mut ResourceEntry,
    subclusters: &BTreeMap<String, ResourceEntry>,
) -> Result<(), SettingError> {
    let mut referenced = Vec::with_capacity(entry.subclusters.len());
    for name in &entry.subclusters {
        match subclusters.get(name) {
            Some(subcluster) => referenced.push(subcluster),
            None => {
                return Err(SettingError::for_option(
                    format!("Subcluster '{name}' referenced in section {section} was not found"),
                    section,
                    "subclusters",
                ))
            }
        }
    }

    if entry.cpus.is_none() {
        entry.cpus = referenced.iter().filter_map(|s| s.cpus).min();
    }
    if entry.memory_mb.is_none() {
        entry.memory_mb = referenced.iter().filter_map(|s| s.memory_mb).min();
    }
    Ok(())
}

/// Split on commas and whitespace
fn split_list(value: Option<&String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configure::tests::config_from;

    #[test]
    fn section_kinds() {
        assert_eq!(Some(SectionKind::Subcluster), SectionKind::of("SubCluster Blue"));
        assert_eq!(Some(SectionKind::ResourceEntry), SectionKind::of("Resource Entry red"));
        assert_eq!(Some(SectionKind::Pilot), SectionKind::of("pilot gpu"));
        assert_eq!(None, SectionKind::of("Squid"));
    }

    #[test]
    fn subcluster_below_ram_minimum() {
        let config = config_from(&[("00.ini", &subcluster("X", "200"))]);

        let (_, errors) = read_entries(&config);

        assert_eq!(1, errors.len());
        assert_eq!(
            "Value for ram_mb in section Subcluster X is outside allowed range, 500-102400",
            errors[0].message
        );
    }

    #[test]
    fn hepspec_range() {
        for (value, valid) in [("10.5", true), ("2", true), ("100", false), ("1.5", false)] {
            let text = format!("{}hepspec = {value}\n", subcluster("X", "4000"));
            let config = config_from(&[("00.ini", &text)]);

            let (entries, errors) = read_entries(&config);

            assert_eq!(valid, errors.is_empty(), "hepspec = {value}");
            assert_eq!(valid, entries.len() == 1, "hepspec = {value}");
            if !valid {
                assert_eq!(
                    "Value for hepspec in section Subcluster X is outside allowed range, 2-50",
                    errors[0].message
                );
            }
        }
    }

    #[test]
    fn hepspec_must_be_a_number() {
        let text = format!("{}hepspec = fast\n", subcluster("X", "4000"));
        let config = config_from(&[("00.ini", &text)]);

        let (_, errors) = read_entries(&config);

        assert_eq!(1, errors.len());
        assert_eq!(Some("hepspec".to_owned()), errors[0].option);
    }

    #[test]
    fn oversized_values_are_rejected() {
        let config = config_from(&[(
            "00.ini",
            "[Resource Entry A]\nname = a\ncpucount = 1\nmaxmemory = 1000\nmax_wall_time = 5000000000\n\
             [Resource Entry B]\nname = b\ncpucount = 1\nmaxmemory = 5000000000\n",
        )]);

        let (entries, errors) = read_entries(&config);

        assert!(entries.is_empty());
        assert_eq!(2, errors.len());
        assert_eq!(Some("max_wall_time".to_owned()), errors[0].option);
        assert_eq!(Some("maxmemory".to_owned()), errors[1].option);
        assert!(errors[1].message.ends_with("is too large, at most 4294967295"));
    }

    #[test]
    fn unknown_options_are_listed_once() {
        let text = format!("{}colour = blue\n[Pilot p]\ncpucount = 1\nram_mb = 1000\n", subcluster("X", "4000"));
        let config = config_from(&[("00.ini", &text)]);

        assert_eq!(
            vec![("Subcluster X".to_owned(), "colour".to_owned())],
            unknown_options(&config)
        );
        let (entries, errors) = read_entries(&config);
        assert_eq!(2, entries.len());
        assert!(errors.is_empty());
    }

    #[test]
    fn changeme_section_is_rejected() {
        let config = config_from(&[("00.ini", &subcluster("CHANGEME", "4000"))]);

        let (_, errors) = read_entries(&config);

        assert_eq!(
            "You have a section named 'Subcluster CHANGEME', you must change this name.",
            errors[0].message
        );
    }

    #[test]
    fn changeme_value_is_rejected() {
        let config = config_from(&[(
            "00.ini",
            "[Resource Entry A]\nname = CHANGEME\ncpucount = 1\nmaxmemory = 1000\n",
        )]);

        let (entries, errors) = read_entries(&config);

        assert!(entries.is_empty());
        assert_eq!(Some("name".to_owned()), errors[0].option);
    }

    #[test]
    fn subcluster_becomes_entry() {
        let config = config_from(&[("00.ini", &subcluster("X", "4000"))]);

        let (entries, errors) = read_entries(&config);

        assert!(errors.is_empty());
        assert_eq!(1, entries.len());
        assert_eq!("sc1", entries[0].name);
        assert_eq!(Some(4), entries[0].cpus);
        assert_eq!(Some(4000), entries[0].memory_mb);
        assert_eq!(vec!["osg".to_owned(), "*".to_owned()], entries[0].allowed_vos);
    }

    #[test]
    fn resource_entry_takes_sizes_from_subcluster() {
        let text = format!(
            "{}\n[Resource Entry big]\nname = big\nsubclusters = sc1\nmaxmemory = 3000\nqueue = long\n",
            subcluster("X", "4000")
        );
        let config = config_from(&[("00.ini", &text)]);

        let (entries, errors) = read_entries(&config);

        assert!(errors.is_empty());
        let big = &entries[1];
        assert_eq!(Some(4), big.cpus);
        assert_eq!(Some(3000), big.memory_mb);
        assert_eq!(Some("long".to_owned()), big.queue);
        assert_eq!(vec!["sc1".to_owned()], big.subclusters);
    }

    #[test]
    fn unknown_subcluster_reference() {
        let config = config_from(&[(
            "00.ini",
            "[Resource Entry big]\nname = big\nsubclusters = nothing\n",
        )]);

        let (_, errors) = read_entries(&config);

        assert_eq!(Some("subclusters".to_owned()), errors[0].option);
    }

    #[test]
    fn resource_entry_without_sizes_is_rejected() {
        let config = config_from(&[("00.ini", "[Resource Entry big]\nname = big\n")]);

        let (entries, errors) = read_entries(&config);

        assert!(entries.is_empty());
        assert_eq!(Some("Resource Entry big".to_owned()), errors[0].section);
    }

    #[test]
    fn pilot_defaults() {
        let config = config_from(&[(
            "00.ini",
            "[Pilot gpu]\ngpucount = 1\nwhole_node = true\nmax_pilots = 5\nos = rhel9\n",
        )]);

        let (entries, errors) = read_entries(&config);

        assert!(errors.is_empty());
        let pilot = &entries[0];
        assert_eq!("gpu", pilot.name);
        assert!(pilot.is_pilot);
        assert!(pilot.whole_node);
        assert!(pilot.require_singularity);
        assert!(pilot.send_tests);
        assert_eq!(Some(1), pilot.gpus);
        assert_eq!(Some(5), pilot.max_pilots);
    }

    #[test]
    fn catalog_round_trip() {
        let text = format!("[Squid]\nenabled = false\n{}", subcluster("X", "4000"));
        let config = config_from(&[("00.ini", &text)]);
        let defaults: BTreeSet<String> = ["atlas".to_owned()].into_iter().collect();

        let catalog = resource_catalog_from_config(&partition_sections(&config), &defaults).unwrap();
        let text = catalog.compose_text();

        assert!(text.contains("    Name = \"sc1\"; \\\n"));
        assert!(text.contains("    CPUs = 4; \\\n"));
        assert!(text.contains("    Memory = 4000; \\\n"));
        assert!(text.contains("    AllowedVOs = { \"osg\", \"atlas\" }; \\\n"));
    }

    fn subcluster(suffix: &str, ram: &str) -> String {
        format!(
            "[Subcluster {suffix}]
name = sc1
node_count = 10
ram_mb = {ram}
cpu_model = Opteron
cpu_vendor = AMD
cpu_speed_mhz = 2400
cpu_platform = x86_64
cpus_per_node = 2
cores_per_node = 4
inbound_network = FALSE
outbound_network = TRUE
allowed_vos = osg, *
"
        )
    }
}
