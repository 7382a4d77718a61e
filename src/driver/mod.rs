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

//! Run the module lifecycle over a site configuration
//!
//! A run loads the configuration fragments, then walks all registered
//! modules through their phases:
//!
//! 1. parse, in registration order, publishing attributes as it goes
//! 2. check, with the attributes and parsed state of every module visible
//! 3. configure, in dependency order, stopping at the first failure
//!
//! Parsing always covers all modules since checks look across sections. A
//! restriction to named modules only limits checking and configuring.

pub mod dependency_graph;

use std::collections::BTreeSet;
use std::path::Path;

use log::{debug, error, info, warn, Level};

use crate::config::config_parser;
use crate::config::option::HostRole;
use crate::config::{Configuration, Error};
use crate::configure::attributes;
use crate::configure::attributes::AttributeBus;
use crate::configure::modules::all_modules;
use crate::configure::{report, HostLayout, Module, ParseContext, RunContext, SiteState};
use crate::driver::dependency_graph::DependencyManager;

/// Outcome of a run which did not hit an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Success,

    /// A check or configure step failed, details have been logged
    Failed,
}

impl Verdict {
    pub fn exit_code(self) -> i32 {
        match self {
            Verdict::Success => 0,
            Verdict::Failed => 1,
        }
    }
}

pub struct Driver {
    modules: Vec<Box<dyn Module>>,

    config: Configuration,

    role: HostRole,

    layout: HostLayout,

    attributes: AttributeBus,

    site: SiteState,
}

impl Driver {
    pub fn new(config: Configuration, role: HostRole, layout: HostLayout) -> Driver {
        Driver::with_modules(all_modules(), config, role, layout)
    }

    pub fn with_modules(
        modules: Vec<Box<dyn Module>>,
        config: Configuration,
        role: HostRole,
        layout: HostLayout,
    ) -> Driver {
        Driver {
            modules,
            config,
            role,
            layout,
            attributes: AttributeBus::new(),
            site: SiteState::default(),
        }
    }

    /// Read all fragments of `directory` and register the modules
    pub fn load(directory: &Path, role: HostRole, layout: HostLayout) -> Result<Driver, Error> {
        let config = config_parser::read_config_files(directory)?;
        Ok(Driver::new(config, role, layout))
    }

    pub fn modules(&self) -> &[Box<dyn Module>] {
        &self.modules
    }

    pub fn attributes(&self) -> &AttributeBus {
        &self.attributes
    }

    pub fn site(&self) -> &SiteState {
        &self.site
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// One line per module: command line name and section
    pub fn list_modules(&self) -> Vec<String> {
        self.modules
            .iter()
            .map(|m| {
                let marker = if m.separately_configurable() { " *" } else { "" };
                format!("{:<20} [{}]{}", m.module_name(), m.base().section, marker)
            })
            .collect()
    }

    /// Indices of the modules to check and configure
    ///
    /// No names select all modules. Named modules must exist and be
    /// configurable on their own.
    pub fn select(&self, names: &[String]) -> Result<Vec<usize>, Error> {
        if names.is_empty() {
            return Ok((0..self.modules.len()).collect());
        }

        let mut result = BTreeSet::new();
        for name in names {
            let index = self
                .modules
                .iter()
                .position(|m| m.module_name().eq_ignore_ascii_case(name))
                .ok_or_else(|| Error::Application(format!("Unknown module {name}")))?;
            if !self.modules[index].separately_configurable() {
                return Err(Error::Application(format!(
                    "Module {name} can only be configured together with all others"
                )));
            }
            result.insert(index);
        }
        Ok(result.into_iter().collect())
    }

    /// Set the status of every module and parse the enabled ones
    ///
    /// Attributes are published in registration order, so a later module
    /// overrides what an earlier one published under the same name.
    pub fn parse(&mut self) -> Result<(), Error> {
        self.attributes = AttributeBus::new();
        self.site = SiteState::default();
        let ctx = ParseContext {
            config: &self.config,
            role: self.role,
            layout: &self.layout,
        };

        for module in self.modules.iter_mut() {
            let section = module.base().section.clone();
            let result = module.set_status(&ctx).and_then(|enabled| {
                if enabled {
                    debug!("Parsing section {}", section);
                    module.parse(&ctx)?;
                }
                Ok(enabled)
            });
            match result {
                Ok(true) => self.attributes.extend(module.get_attributes()),
                Ok(false) => {
                    if module.base().ignored() {
                        warn!("Section {} is ignored, it is neither checked nor configured", section);
                    }
                }
                Err(e) => {
                    let section = e.section.clone().unwrap_or(section);
                    report(
                        ctx.config,
                        Level::Error,
                        &e.message,
                        Some(&section),
                        e.option.as_deref(),
                        None,
                    );
                    return Err(Error::Setting(e));
                }
            }
            self.site.modules.insert(section, module.base().state());
        }
        Ok(())
    }

    fn run_context(&self) -> RunContext<'_> {
        RunContext {
            config: &self.config,
            role: self.role,
            layout: &self.layout,
            attributes: &self.attributes,
            site: &self.site,
        }
    }

    /// Check the selected modules, all of them even after a failure
    pub fn check(&self, selection: &[usize]) -> Verdict {
        let ctx = self.run_context();
        let mut verdict = Verdict::Success;
        for index in selection {
            let module = &self.modules[*index];
            if !module.check(&ctx) {
                error!("Invalid settings in section {}", module.base().section);
                verdict = Verdict::Failed;
            }
        }
        verdict
    }

    /// Configure the selected modules in dependency order
    ///
    /// The first module failing stops the run.
    pub fn configure(&self, selection: &[usize]) -> Result<Verdict, Error> {
        let order = DependencyManager::with_modules(&self.modules).map_err(|index| {
            Error::Application(format!(
                "Cyclic configure dependency involving section {}",
                self.modules[index].base().section
            ))
        })?;

        let ctx = self.run_context();
        for index in order.order() {
            if !selection.contains(&index) {
                continue;
            }
            let module = &self.modules[index];
            if !module.base().enabled() {
                continue;
            }
            info!("Configuring section {}", module.base().section);
            if !module.configure(&ctx)? {
                error!("Failed to configure section {}", module.base().section);
                return Ok(Verdict::Failed);
            }
        }
        Ok(Verdict::Success)
    }

    /// Parse and check without touching the host
    pub fn verify(&mut self, names: &[String]) -> Result<Verdict, Error> {
        let selection = self.select(names)?;
        self.parse()?;
        Ok(self.check(&selection))
    }

    /// Parse, check, write the attributes file and configure
    pub fn run_configure(&mut self, names: &[String]) -> Result<Verdict, Error> {
        if self.verify(names)? == Verdict::Failed {
            return Ok(Verdict::Failed);
        }
        let selection = self.select(names)?;
        attributes::write_attributes_file(&self.layout.attributes_file, &self.attributes)?;
        self.configure(&selection)
    }

    /// Union of the services all enabled modules need
    pub fn enabled_services(&mut self) -> Result<BTreeSet<String>, Error> {
        self.parse()?;
        Ok(self
            .modules
            .iter()
            .flat_map(|m| m.enabled_services())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SITE: &str = "[Site Information]
group = OSG
host_name = ce.example.edu
resource = EXAMPLE_CE
resource_group = EXAMPLE
sponsor = osg
contact = Jane Admin
email = admin@example.edu
city = Madison
country = US
longitude = -89.4
latitude = 43.07
";

    #[test]
    fn later_fragment_wins() {
        let (_dir, mut driver) = driver_for(&[
            ("00.ini", "[Site Information]\ngroup = OSG\n"),
            ("10.ini", "[Site Information]\ngroup = OSG-ITB\n"),
        ]);

        driver.parse().unwrap();

        assert_eq!(
            "OSG-ITB",
            driver.site().value("Site Information", "group").unwrap().to_string()
        );
        assert_eq!(
            Some("10.ini"),
            driver.config().get_option_location("group", "Site Information")
        );
        assert_eq!(Some("OSG-ITB"), driver.attributes().get("OSG_GROUP"));
    }

    #[test]
    fn empty_directory_is_a_setting_error() {
        let dir = tempfile::tempdir().unwrap();

        let result = Driver::load(dir.path(), HostRole::Other, HostLayout::default());

        assert_eq!(1, result.err().map(|e| e.exit_code()).unwrap_or(0));
    }

    #[test]
    fn bad_group_fails_verify() {
        let text = SITE.replace("group = OSG", "group = OSG-FOO");
        let (_dir, mut driver) = driver_for(&[("00.ini", &text)]);

        assert_eq!(Verdict::Failed, driver.verify(&[]).unwrap());
    }

    #[test]
    fn bad_latitude_fails_verify() {
        let text = SITE.replace("latitude = 43.07", "latitude = 100.0");
        let (_dir, mut driver) = driver_for(&[("00.ini", &text)]);

        assert_eq!(Verdict::Failed, driver.verify(&[]).unwrap());
    }

    #[test]
    fn malformed_enabled_is_a_setting_error() {
        let (_dir, mut driver) = driver_for(&[("00.ini", "[Squid]\nenabled = sometimes\n")]);

        let error = driver.verify(&[]).unwrap_err();

        assert_eq!(1, error.exit_code());
    }

    #[test]
    fn ignored_section_is_not_checked() {
        let text = format!("{SITE}[Squid]\nenabled = ignore\nlocation = not a host:port\ncache_size = -5\n");
        let (dir, mut driver) = driver_for(&[("00.ini", &text)]);

        assert_eq!(Verdict::Success, driver.run_configure(&[]).unwrap());

        assert!(driver.attributes().get("OSG_SQUID_LOCATION").is_none());
        assert!(dir.path().join("root/var/lib/osg/osg-attributes.conf").exists());
    }

    #[test]
    fn disabled_sections_publish_nothing() {
        let (_dir, mut driver) = driver_for(&[(
            "00.ini",
            "[Squid]\nenabled = False\nlocation = squid.example.edu:3128\n[MonaLisa]\nenabled = False\n",
        )]);

        driver.parse().unwrap();

        assert!(driver.attributes().is_empty());
    }

    #[test]
    fn configure_is_idempotent() {
        let text = format!(
            "{SITE}[Squid]\nenabled = True\nlocation = squid.example.edu:3128\n[Local Settings]\nMY_VAR = 1\nOLD_VAR = UNSET\n"
        );
        let (dir, mut driver) = driver_for(&[("00.ini", &text)]);
        let attributes_file = dir.path().join("root/var/lib/osg/osg-attributes.conf");

        assert_eq!(Verdict::Success, driver.run_configure(&[]).unwrap());
        let first = fs::read(&attributes_file).unwrap();
        assert_eq!(Verdict::Success, driver.run_configure(&[]).unwrap());
        let second = fs::read(&attributes_file).unwrap();

        assert_eq!(first, second);
        let text = String::from_utf8(first).unwrap();
        assert!(text.contains("OSG_SITE_NAME=\"EXAMPLE_CE\"\n"));
        assert!(text.contains("unset OLD_VAR\n"));
        assert!(text.contains("export MY_VAR\n"));
    }

    #[test]
    fn failing_configure_stops_the_run() {
        // RSV copies the host credential, which this host does not have
        let text = format!("{SITE}[RSV]\nenabled = True\n");
        let (_dir, mut driver) = driver_for(&[("00.ini", &text)]);

        assert_eq!(Verdict::Failed, driver.run_configure(&[]).unwrap());
    }

    #[test]
    fn selection_by_module_name() {
        let (_dir, driver) = driver_for(&[("00.ini", SITE)]);

        let gratia = driver.select(&["Gratia".to_owned()]).unwrap();
        assert_eq!(1, gratia.len());
        assert_eq!("Gratia", driver.modules()[gratia[0]].base().section);

        assert!(driver.select(&["siteinformation".to_owned()]).is_err());
        assert!(driver.select(&["nosuchmodule".to_owned()]).is_err());
        assert_eq!(driver.modules().len(), driver.select(&[]).unwrap().len());
    }

    #[test]
    fn services_of_enabled_modules() {
        let text = format!("{SITE}[MonaLisa]\nenabled = True\n[RSV]\nenabled = False\n");
        let with_misc = format!("{text}[Misc Services]\n");
        let (_dir, mut driver) = driver_for(&[("00.ini", &text)]);

        let services = driver.enabled_services().unwrap();

        assert_eq!(vec!["MLD".to_owned()], services.into_iter().collect::<Vec<_>>());

        let (_dir, mut driver) = driver_for(&[("00.ini", &with_misc)]);
        let services = driver.enabled_services().unwrap();
        assert!(services.contains("fetch-crl-cron"));
    }

    #[test]
    fn every_module_is_listed() {
        let driver = Driver::new(Configuration::default(), HostRole::Other, HostLayout::default());

        let listing = driver.list_modules();

        assert_eq!(21, listing.len());
        assert!(listing[0].starts_with("siteinformation"));
        assert!(listing.iter().any(|l| l.contains("[Info Services] *")));
    }

    /// Driver over a configuration directory and a host root in a temporary directory
    fn driver_for(fragments: &[(&str, &str)]) -> (TempDir, Driver) {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join("config.d");
        fs::create_dir(&config_dir).unwrap();
        for (name, text) in fragments {
            fs::write(config_dir.join(name), text).unwrap();
        }
        let layout = HostLayout::new(
            &dir.path().join("root"),
            Path::new(attributes::DEFAULT_ATTRIBUTES_FILE),
        );
        let driver = Driver::load(&config_dir, HostRole::Other, layout).unwrap();
        (dir, driver)
    }
}
