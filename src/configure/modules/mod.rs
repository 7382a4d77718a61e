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

//! All configuration modules, in registration order
//!
//! Registration order is the order modules are parsed in and the tie-break
//! when ordering the configure phase.

use crate::configure::Module;

/// Implement the base accessors of [Module] for a struct with a `base` field
macro_rules! module_base {
    () => {
        fn base(&self) -> &$crate::configure::ModuleBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut $crate::configure::ModuleBase {
            &mut self.base
        }
    };
}
pub(crate) use module_base;

/// Return early from check or configure of a module not taking part
macro_rules! skip_unless_enabled {
    ($self:ident, $result:expr) => {
        if !$self.base.enabled() {
            return $result;
        }
    };
}
pub(crate) use skip_unless_enabled;

pub mod batch;
pub mod bestman;
pub mod bosco;
pub mod ce;
pub mod condor;
pub mod gateway;
pub mod gratia;
pub mod info_services;
pub mod install_locations;
pub mod local_settings;
pub mod lsf;
pub mod misc_services;
pub mod monalisa;
pub mod network;
pub mod pbs;
pub mod rsv;
pub mod sge;
pub mod site_information;
pub mod slurm;
pub mod squid;
pub mod storage;
pub mod xrootd;

pub fn all_modules() -> Vec<Box<dyn Module>> {
    vec![
        Box::new(site_information::SiteInformation::new()),
        Box::new(condor::Condor::new()),
        Box::new(pbs::Pbs::new()),
        Box::new(lsf::Lsf::new()),
        Box::new(sge::Sge::new()),
        Box::new(slurm::Slurm::new()),
        Box::new(bosco::Bosco::new()),
        Box::new(gateway::Gateway::new()),
        Box::new(ce::Ce::new()),
        Box::new(storage::Storage::new()),
        Box::new(squid::Squid::new()),
        Box::new(network::Network::new()),
        Box::new(monalisa::MonaLisa::new()),
        Box::new(gratia::Gratia::new()),
        Box::new(misc_services::MiscServices::new()),
        Box::new(rsv::Rsv::new()),
        Box::new(install_locations::InstallLocations::new()),
        Box::new(local_settings::LocalSettings::new()),
        Box::new(bestman::Bestman::new()),
        Box::new(xrootd::Xrootd::new()),
        Box::new(info_services::InfoServices::new()),
    ]
}

#[cfg(test)]
pub(crate) mod testing {
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::Once;

    use log::{LevelFilter, Log, Metadata, Record};

    use tempfile::TempDir;

    use crate::config::option::HostRole;
    use crate::config::{Configuration, SettingError};
    use crate::configure::attributes::AttributeBus;
    use crate::configure::tests::config_from;
    use crate::configure::{HostLayout, Module, ParseContext, RunContext, SiteState};

    static CAPTURED: Mutex<Vec<String>> = Mutex::new(Vec::new());

    struct CaptureLogger;

    impl Log for CaptureLogger {
        fn enabled(&self, _: &Metadata) -> bool {
            true
        }

        fn log(&self, record: &Record) {
            CAPTURED.lock().unwrap().push(record.args().to_string());
        }

        fn flush(&self) {}
    }

    static LOGGER: CaptureLogger = CaptureLogger;

    /// Keep every log message of the test process
    pub(crate) fn capture_logs() {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            log::set_logger(&LOGGER).unwrap();
            log::set_max_level(LevelFilter::Trace);
        });
    }

    /// Number of captured messages containing `needle`
    pub(crate) fn count_logged(needle: &str) -> usize {
        CAPTURED
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.contains(needle))
            .count()
    }

    /// A site below a temporary root, fed one module at a time
    pub(crate) struct TestSite {
        pub config: Configuration,

        pub role: HostRole,

        pub layout: HostLayout,

        pub attributes: AttributeBus,

        pub site: SiteState,

        pub root: TempDir,
    }

    impl TestSite {
        pub(crate) fn new(text: &str, role: HostRole) -> TestSite {
            let root = tempfile::tempdir().unwrap();
            TestSite {
                config: config_from(&[("00-test.ini", text)]),
                role,
                layout: HostLayout::new(root.path(), Path::new("/var/lib/osg/osg-attributes.conf")),
                attributes: AttributeBus::new(),
                site: SiteState::default(),
                root,
            }
        }

        /// Set the status and parse the module like the driver does
        pub(crate) fn parse(&mut self, module: &mut dyn Module) -> Result<bool, SettingError> {
            let ctx = ParseContext {
                config: &self.config,
                role: self.role,
                layout: &self.layout,
            };
            let enabled = module.set_status(&ctx)?;
            if enabled {
                module.parse(&ctx)?;
                self.attributes.extend(module.get_attributes());
            }
            self.site
                .modules
                .insert(module.base().section.clone(), module.base().state());
            Ok(enabled)
        }

        pub(crate) fn ctx(&self) -> RunContext<'_> {
            RunContext {
                config: &self.config,
                role: self.role,
                layout: &self.layout,
                attributes: &self.attributes,
                site: &self.site,
            }
        }

        /// Create a host file below the root
        pub(crate) fn write(&self, absolute: &str, content: &str) {
            let path = self.layout.path(absolute);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        pub(crate) fn read(&self, absolute: &str) -> String {
            fs::read_to_string(self.layout.path(absolute)).unwrap()
        }

        /// Absolute path of a directory created below the root
        pub(crate) fn mkdir(&self, absolute: &str) -> String {
            let path = self.layout.path(absolute);
            fs::create_dir_all(&path).unwrap();
            path.display().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn sections_are_unique() {
        let modules = all_modules();
        let sections: BTreeSet<String> = modules.iter().map(|m| m.base().section.clone()).collect();

        assert_eq!(modules.len(), sections.len());
    }

    #[test]
    fn module_names_are_unique() {
        let modules = all_modules();
        let names: BTreeSet<&str> = modules.iter().map(|m| m.module_name()).collect();

        assert_eq!(modules.len(), names.len());
    }

    #[test]
    fn site_information_comes_first() {
        assert_eq!("Site Information", all_modules()[0].base().section);
    }
}
