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

//! The module framework
//!
//! Every concern of a site (its identity, each batch system, monitoring, ...)
//! is handled by one [Module] bound to a configuration section. A module goes
//! through a fixed lifecycle, driven by [crate::driver::Driver]:
//!
//! 1. [set_status](Module::set_status) reads the tri-valued `enabled` option
//! 2. [parse](Module::parse) resolves the declared options, only if enabled
//! 3. [check](Module::check) validates across fields and sections
//! 4. [configure](Module::configure) applies the settings to the host
//!
//! Modules share state only through the [AttributeBus](attributes::AttributeBus)
//! and the read-only [SiteState] snapshot taken after parsing.

pub mod attributes;
pub mod modules;
pub mod resource_catalog;
pub mod service_cert;
pub mod subcluster;
pub mod vo_mapping;

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;

use log::{log, warn, Level};

use crate::config::option::{get_option, ConfigOption, HostRole, Value};
use crate::config::{Configuration, Error, SettingError};
use crate::configure::attributes::AttributeBus;
use crate::util::validation;

/// Value of the `enabled` option of a section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionStatus {
    Enabled,

    /// Disabled or section missing
    Disabled,

    /// Neither validated nor configured, but the section counts as present
    Ignored,
}

impl SectionStatus {
    /// Interpret the `enabled` option of `section`
    pub fn read(config: &Configuration, section: &str) -> Result<SectionStatus, SettingError> {
        if config.has_section(section) && config.get_raw(section, "enabled").is_none() {
            warn!("No enabled option found in section {}, assuming disabled", section);
        }
        SectionStatus::read_or(config, section, SectionStatus::Disabled)
    }

    /// Like [read](Self::read), with the status of a section lacking `enabled`
    pub fn read_or(
        config: &Configuration,
        section: &str,
        without_option: SectionStatus,
    ) -> Result<SectionStatus, SettingError> {
        if !config.has_section(section) {
            return Ok(SectionStatus::Disabled);
        }
        let value = match config.get(section, "enabled")? {
            Some(value) => value,
            None => return Ok(without_option),
        };
        if value.trim().eq_ignore_ascii_case("ignore") {
            return Ok(SectionStatus::Ignored);
        }
        match validation::parse_boolean(&value) {
            Some(true) => Ok(SectionStatus::Enabled),
            Some(false) => Ok(SectionStatus::Disabled),
            None => Err(SettingError::for_option(
                format!("Invalid value '{value}' for enabled, use true, false or ignore"),
                section,
                "enabled",
            )),
        }
    }
}

/// Root under which all host paths are resolved
///
/// Production runs use `/`. Staging and tests redirect every file the tool
/// touches below a different directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLayout {
    root: PathBuf,

    pub attributes_file: PathBuf,
}

impl HostLayout {
    pub fn new(root: &Path, attributes_file: &Path) -> HostLayout {
        let mut layout = HostLayout {
            root: root.to_path_buf(),
            attributes_file: PathBuf::new(),
        };
        layout.attributes_file = layout.path(&attributes_file.to_string_lossy());
        layout
    }

    /// Map an absolute host path below the root
    pub fn path(&self, absolute: &str) -> PathBuf {
        self.root.join(absolute.trim_start_matches('/'))
    }
}

impl Default for HostLayout {
    fn default() -> HostLayout {
        HostLayout::new(Path::new("/"), Path::new(attributes::DEFAULT_ATTRIBUTES_FILE))
    }
}

/// Everything a module may look at while parsing
pub struct ParseContext<'a> {
    pub config: &'a Configuration,

    pub role: HostRole,

    pub layout: &'a HostLayout,
}

/// Parsed state of a module as seen by the others
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleState {
    pub status: SectionStatus,

    pub options: BTreeMap<String, ConfigOption>,
}

/// Snapshot of all modules after parsing, keyed by section
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteState {
    pub modules: BTreeMap<String, ModuleState>,
}

impl SiteState {
    pub fn status(&self, section: &str) -> SectionStatus {
        self.modules
            .get(section)
            .map(|m| m.status)
            .unwrap_or(SectionStatus::Disabled)
    }

    pub fn is_enabled(&self, section: &str) -> bool {
        self.status(section) == SectionStatus::Enabled
    }

    pub fn value(&self, section: &str, option: &str) -> Option<&Value> {
        self.modules
            .get(section)?
            .options
            .get(option)?
            .value
            .as_ref()
    }
}

/// Everything a module may look at while checking and configuring
pub struct RunContext<'a> {
    pub config: &'a Configuration,

    pub role: HostRole,

    pub layout: &'a HostLayout,

    pub attributes: &'a AttributeBus,

    pub site: &'a SiteState,
}

/// Log a message, locating the option in the configuration fragments
///
/// With both `section` and `option` the message names the fragment which set
/// the option, so operators know which file to edit.
pub fn report(
    config: &Configuration,
    level: Level,
    message: &str,
    section: Option<&str>,
    option: Option<&str>,
    exception: Option<&dyn std::fmt::Display>,
) {
    let mut text = match (section, option) {
        (Some(section), Some(option)) => match config.get_option_location(option, section) {
            Some(fragment) => format!("{fragment} [{section}] {option}: {message}"),
            None => format!("[{section}] {option}: {message}"),
        },
        (Some(section), None) => format!("[{section}]: {message}"),
        _ => message.to_owned(),
    };
    if let Some(exception) = exception {
        text = format!("{text} ({exception})");
    }
    log!(level, "{}", text);
}

/// A reason for a module to fail its check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub option: Option<String>,
    pub message: String,
}

impl Problem {
    pub fn new(option: &str, message: impl Into<String>) -> Problem {
        Problem {
            option: Some(option.to_owned()),
            message: message.into(),
        }
    }

    pub fn general(message: impl Into<String>) -> Problem {
        Problem {
            option: None,
            message: message.into(),
        }
    }
}

/// State common to all modules
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleBase {
    pub section: String,

    pub status: SectionStatus,

    pub options: BTreeMap<String, ConfigOption>,
}

impl ModuleBase {
    pub fn new(section: &str, options: Vec<ConfigOption>) -> ModuleBase {
        ModuleBase {
            section: section.to_owned(),
            status: SectionStatus::Disabled,
            options: options.into_iter().map(|o| (o.name.clone(), o)).collect(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.status == SectionStatus::Enabled
    }

    pub fn ignored(&self) -> bool {
        self.status == SectionStatus::Ignored
    }

    pub fn set_status(&mut self, config: &Configuration) -> Result<bool, SettingError> {
        self.status = SectionStatus::read(config, &self.section)?;
        Ok(self.enabled())
    }

    /// Resolve all declared options and warn about unknown ones
    pub fn parse_options(&mut self, ctx: &ParseContext) -> Result<(), SettingError> {
        for option in self.options.values_mut() {
            get_option(ctx.config, &self.section, option, ctx.role)?;
        }
        self.warn_unknown_options(ctx.config);
        Ok(())
    }

    /// Options set in the section which neither the module nor the defaults know
    pub fn unknown_options(&self, config: &Configuration) -> Vec<String> {
        config
            .own_options(&self.section)
            .into_iter()
            .filter(|o| o != "enabled")
            .filter(|o| !self.options.contains_key(o))
            .filter(|o| !config.defaults().contains_key(o))
            .collect()
    }

    pub fn warn_unknown_options(&self, config: &Configuration) {
        for option in self.unknown_options(config) {
            self.report(config, Level::Warn, Some(&option), "Found unknown option");
        }
    }

    pub fn report(&self, config: &Configuration, level: Level, option: Option<&str>, message: &str) {
        report(config, level, message, Some(&self.section), option, None);
    }

    /// Log all problems as errors, true if there were none
    pub fn report_problems(&self, config: &Configuration, problems: &[Problem]) -> bool {
        for problem in problems {
            self.report(config, Level::Error, problem.option.as_deref(), &problem.message);
        }
        problems.is_empty()
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.options.get(name).and_then(|o| o.value.as_ref())
    }

    /// String value of an option, empty if unset
    pub fn str(&self, name: &str) -> &str {
        self.options.get(name).map(ConfigOption::as_str).unwrap_or("")
    }

    pub fn bool(&self, name: &str) -> bool {
        self.options.get(name).map(ConfigOption::as_bool).unwrap_or(false)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.value(name).and_then(Value::as_int)
    }

    /// Attributes published by the mappable options with a value
    pub fn get_attributes_with<F>(&self, converter: F) -> BTreeMap<String, String>
    where
        F: Fn(&Value) -> String,
    {
        self.options
            .values()
            .filter(|o| o.is_mappable())
            .filter_map(|o| {
                let value = o.value.as_ref()?;
                Some((o.mapping.clone()?, converter(value)))
            })
            .collect()
    }

    pub fn state(&self) -> ModuleState {
        ModuleState {
            status: self.status,
            options: self.options.clone(),
        }
    }
}

/// Contract of all configuration modules
pub trait Module {
    fn base(&self) -> &ModuleBase;

    fn base_mut(&mut self) -> &mut ModuleBase;

    /// Name used on the command line
    fn module_name(&self) -> &'static str;

    /// True if the module may be configured on its own
    fn separately_configurable(&self) -> bool {
        false
    }

    /// Sections which must be configured before this one
    fn configure_after(&self) -> Vec<&'static str> {
        Vec::new()
    }

    fn set_status(&mut self, ctx: &ParseContext) -> Result<bool, SettingError> {
        self.base_mut().set_status(ctx.config)
    }

    fn parse(&mut self, ctx: &ParseContext) -> Result<(), SettingError> {
        self.base_mut().parse_options(ctx)
    }

    /// Validate the parsed options, logging every problem found
    fn check(&self, _ctx: &RunContext) -> bool {
        true
    }

    /// Apply the settings to the host
    ///
    /// `Ok(false)` reports a failure the operator can fix, errors are
    /// unexpected conditions.
    fn configure(&self, _ctx: &RunContext) -> Result<bool, Error> {
        Ok(true)
    }

    fn enabled_services(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn get_attributes(&self) -> BTreeMap<String, String> {
        self.base().get_attributes_with(Value::to_string)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::config_parser::parse_ini;
    use crate::config::option::{OptionType, Requiredness};
    use crate::config::Fragment;

    #[test]
    fn status_is_tri_valued() {
        let config = config_from(&[(
            "00.ini",
            "[A]\nenabled = True\n[B]\nenabled = false\n[C]\nenabled = IGNORE\n[D]\nfoo = bar\n",
        )]);

        assert_eq!(SectionStatus::Enabled, SectionStatus::read(&config, "A").unwrap());
        assert_eq!(SectionStatus::Disabled, SectionStatus::read(&config, "B").unwrap());
        assert_eq!(SectionStatus::Ignored, SectionStatus::read(&config, "C").unwrap());
        assert_eq!(SectionStatus::Disabled, SectionStatus::read(&config, "D").unwrap());
        assert_eq!(SectionStatus::Disabled, SectionStatus::read(&config, "E").unwrap());
    }

    #[test]
    fn malformed_status_gives_error() {
        let config = config_from(&[("00.ini", "[A]\nenabled = maybe\n")]);

        let error = SectionStatus::read(&config, "A").unwrap_err();

        assert_eq!(Some("enabled".to_owned()), error.option);
    }

    #[test]
    fn ignored_module_is_not_enabled() {
        let config = config_from(&[("00.ini", "[Squid]\nenabled = ignore\n")]);
        let mut base = ModuleBase::new("Squid", vec![]);

        assert!(!base.set_status(&config).unwrap());
        assert!(base.ignored());
    }

    #[test]
    fn unknown_options_exclude_declared_and_defaults() {
        let config = config_from(&[(
            "00.ini",
            "[DEFAULT]\nlocalhost = ce\n[Squid]\nenabled = true\nlocation = squid:3128\ntypo = 1\n",
        )]);
        let base = ModuleBase::new("Squid", vec![ConfigOption::string("location")]);

        assert_eq!(vec!["typo".to_owned()], base.unknown_options(&config));
    }

    #[test]
    fn attributes_only_from_mapped_values() {
        let config = config_from(&[("00.ini", "[Squid]\nenabled = true\nlocation = squid:3128\n")]);
        let mut base = ModuleBase::new(
            "Squid",
            vec![
                ConfigOption::string("location").mapped_to("OSG_SQUID_LOCATION"),
                ConfigOption::new("cache_size", OptionType::Int, Requiredness::Optional)
                    .mapped_to("OSG_SQUID_CACHE_SIZE"),
                ConfigOption::string("policy"),
            ],
        );
        let layout = HostLayout::default();

        base.parse_options(&ParseContext {
            config: &config,
            role: HostRole::Other,
            layout: &layout,
        })
        .unwrap();
        let attributes = base.get_attributes_with(Value::to_string);

        assert_eq!(1, attributes.len());
        assert_eq!(
            Some(&"squid:3128".to_owned()),
            attributes.get("OSG_SQUID_LOCATION")
        );
    }

    #[test]
    fn layout_maps_below_root() {
        let layout = HostLayout::new(Path::new("/tmp/stage"), Path::new("/var/lib/osg/attr.conf"));

        assert_eq!(PathBuf::from("/tmp/stage/etc/osg"), layout.path("/etc/osg"));
        assert_eq!(
            PathBuf::from("/tmp/stage/var/lib/osg/attr.conf"),
            layout.attributes_file
        );
    }

    /// Build a configuration from named fragment texts
    pub(crate) fn config_from(fragments: &[(&str, &str)]) -> Configuration {
        Configuration::from_fragments(
            fragments
                .iter()
                .map(|(name, text)| Fragment {
                    name: (*name).to_owned(),
                    document: parse_ini(text).unwrap(),
                })
                .collect(),
        )
    }
}
