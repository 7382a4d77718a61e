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

//! Advertisement of the CE and its resource catalog to the central collectors

use std::collections::BTreeSet;

use log::{info, warn, Level};

use crate::config::config_parser::{jobmanager_enabled, JOBMANAGER_SECTIONS};
use crate::config::option::{ConfigOption, Value};
use crate::config::{Configuration, Error, SettingError};
use crate::configure::modules::{ce, module_base, skip_unless_enabled};
use crate::configure::subcluster;
use crate::configure::vo_mapping::VoMapResolver;
use crate::configure::{report, Module, ModuleBase, ParseContext, Problem, RunContext, SectionStatus};
use crate::util::atomic_file;
use crate::util::atomic_file::Ownership;
use crate::util::validation;

pub const SECTION: &str = "Info Services";

pub const RESOURCE_CATALOG_FILE: &str = "/etc/condor-ce/config.d/50-osg-resource-catalog.conf";

const DEFAULT_COLLECTORS: &str =
    "collector1.opensciencegrid.org:9619,collector2.opensciencegrid.org:9619";

pub struct InfoServices {
    base: ModuleBase,

    /// Subcluster, Resource Entry and Pilot sections
    partitions: Configuration,
}

impl InfoServices {
    pub fn new() -> InfoServices {
        InfoServices {
            base: ModuleBase::new(
                SECTION,
                vec![
                    ConfigOption::string("ce_collectors")
                        .with_default(Value::String(DEFAULT_COLLECTORS.to_owned())),
                    ConfigOption::string("allowed_vos"),
                ],
            ),
            partitions: Configuration::default(),
        }
    }

    pub fn collectors(&self) -> Vec<&str> {
        self.base
            .str("ce_collectors")
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect()
    }

    /// VOs allowed on entries listing `*`
    ///
    /// An explicit `allowed_vos` wins over the VOMS mapfiles of the host.
    pub fn default_allowed_vos(&self, ctx: &RunContext) -> BTreeSet<String> {
        let explicit: BTreeSet<String> = self
            .base
            .str("allowed_vos")
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|vo| !vo.is_empty())
            .map(str::to_lowercase)
            .collect();
        if !explicit.is_empty() {
            return explicit;
        }
        let vos = VoMapResolver::new(ctx.layout).get_allowed_vos();
        if vos.is_empty() {
            warn!("No VOs found in the VOMS mapfiles, entries allowing * will not advertise any VO");
        }
        vos
    }

    pub fn problems(&self) -> Vec<Problem> {
        let mut problems = Vec::new();
        for collector in self.collectors() {
            if !validation::valid_location(collector) {
                problems.push(Problem::new(
                    "ce_collectors",
                    format!("Invalid collector {collector}, use host[:port]"),
                ));
            }
        }
        for vo in self.base.str("allowed_vos").split(|c: char| c == ',' || c.is_whitespace()) {
            if !vo.is_empty() && !validation::valid_vo_name(vo) {
                problems.push(Problem::new("allowed_vos", format!("Invalid VO name {vo}")));
            }
        }
        problems
    }
}

impl Default for InfoServices {
    fn default() -> InfoServices {
        InfoServices::new()
    }
}

impl Module for InfoServices {
    module_base!();

    fn module_name(&self) -> &'static str {
        "infoservices"
    }

    fn separately_configurable(&self) -> bool {
        true
    }

    fn configure_after(&self) -> Vec<&'static str> {
        let mut after = vec![ce::SECTION];
        after.extend(JOBMANAGER_SECTIONS);
        after
    }

    /// Enabled on a CE with a batch system unless disabled explicitly
    fn set_status(&mut self, ctx: &ParseContext) -> Result<bool, SettingError> {
        let implied = if ctx.role.is_ce() && jobmanager_enabled(ctx.config) {
            SectionStatus::Enabled
        } else {
            SectionStatus::Disabled
        };
        self.base.status = if ctx.config.has_section(SECTION) {
            SectionStatus::read_or(ctx.config, SECTION, implied)?
        } else {
            implied
        };
        Ok(self.base.enabled())
    }

    fn parse(&mut self, ctx: &ParseContext) -> Result<(), SettingError> {
        self.base.parse_options(ctx)?;
        self.partitions = subcluster::partition_sections(ctx.config);
        for (section, option) in subcluster::unknown_options(&self.partitions) {
            report(
                ctx.config,
                Level::Warn,
                "Found unknown option",
                Some(&section),
                Some(&option),
                None,
            );
        }
        Ok(())
    }

    fn check(&self, ctx: &RunContext) -> bool {
        skip_unless_enabled!(self, true);
        let valid = self.base.report_problems(ctx.config, &self.problems());
        let partitions_valid = subcluster::check_sections(&self.partitions);
        if self.partitions.sections().next().is_none() {
            warn!("No Subcluster, Resource Entry or Pilot sections, the resource catalog is empty");
        }
        valid && partitions_valid
    }

    fn configure(&self, ctx: &RunContext) -> Result<bool, Error> {
        skip_unless_enabled!(self, Ok(true));
        let defaults = self.default_allowed_vos(ctx);
        let catalog = subcluster::resource_catalog_from_config(&self.partitions, &defaults)?;

        let path = ctx.layout.path(RESOURCE_CATALOG_FILE);
        atomic_file::write_file(&path, catalog.compose_text().as_bytes(), 0o644, Ownership::Preserve)?;
        info!("Wrote {} entries to {}", catalog.len(), path.display());

        ce::update_ce_config(ctx, "CONDOR_VIEW_HOST", &self.collectors().join(","))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::option::HostRole;
    use crate::configure::modules::testing;
    use crate::configure::modules::testing::TestSite;

    const PARTITIONS: &str = "[Condor]
enabled = True
[Subcluster Main]
name = Main
node_count = 10
ram_mb = 4096
cpu_speed_mhz = 2400
cpus_per_node = 2
cores_per_node = 4
allowed_vos = osg, *
";

    #[test]
    fn implied_on_ce_with_batch_system() {
        let mut site = TestSite::new(PARTITIONS, HostRole::Ce);
        assert!(site.parse(&mut InfoServices::new()).unwrap());

        let mut site = TestSite::new(PARTITIONS, HostRole::Other);
        assert!(!site.parse(&mut InfoServices::new()).unwrap());

        let mut site = TestSite::new("[Subcluster Main]\nname = Main\n", HostRole::Ce);
        assert!(!site.parse(&mut InfoServices::new()).unwrap());
    }

    #[test]
    fn explicit_vos_win_over_mapfiles() {
        let text = format!("{PARTITIONS}[Info Services]\nallowed_vos = CMS atlas\n");
        let mut site = TestSite::new(&text, HostRole::Ce);
        site.write("/etc/grid-security/voms-mapfile", "\"/osg/Role=NULL\" root\n");
        let mut module = InfoServices::new();
        site.parse(&mut module).unwrap();

        assert_eq!(
            BTreeSet::from(["atlas".to_owned(), "cms".to_owned()]),
            module.default_allowed_vos(&site.ctx())
        );
    }

    #[test]
    fn mapfile_vos_are_the_fallback() {
        let mut site = TestSite::new(PARTITIONS, HostRole::Ce);
        site.write("/etc/grid-security/voms-mapfile", "\"/GLOW/Role=NULL\" root\n");
        let mut module = InfoServices::new();
        site.parse(&mut module).unwrap();

        assert_eq!(
            BTreeSet::from(["glow".to_owned()]),
            module.default_allowed_vos(&site.ctx())
        );
    }

    #[test]
    fn configure_writes_catalog() {
        let text = format!("{PARTITIONS}[Info Services]\nallowed_vos = cms\n");
        let mut site = TestSite::new(&text, HostRole::Ce);
        let mut module = InfoServices::new();
        site.parse(&mut module).unwrap();

        assert!(module.check(&site.ctx()));
        assert!(module.configure(&site.ctx()).unwrap());

        let catalog = site.read(RESOURCE_CATALOG_FILE);
        assert!(catalog.starts_with("OSG_ResourceCatalog = { \\\n"));
        assert!(catalog.contains("    AllowedVOs = { \"osg\", \"cms\" }; \\\n"));
        assert!(site
            .read(ce::CE_CONFIG)
            .contains(&format!("CONDOR_VIEW_HOST = {DEFAULT_COLLECTORS}\n")));
    }

    #[test]
    fn unknown_partition_option_is_reported_once() {
        testing::capture_logs();
        let text = format!("{PARTITIONS}frobnicate_level = 3\n[Info Services]\nallowed_vos = cms\n");
        let mut site = TestSite::new(&text, HostRole::Ce);
        let mut module = InfoServices::new();
        site.parse(&mut module).unwrap();

        assert!(module.check(&site.ctx()));
        assert!(module.configure(&site.ctx()).unwrap());

        assert_eq!(1, testing::count_logged("frobnicate_level"));
    }

    #[test]
    fn bad_collector() {
        let text = format!("{PARTITIONS}[Info Services]\nce_collectors = collector.example.org:port\n");
        let mut site = TestSite::new(&text, HostRole::Ce);
        let mut module = InfoServices::new();
        site.parse(&mut module).unwrap();

        assert_eq!(1, module.problems().len());
    }

    #[test]
    fn collector_port_zero_is_rejected() {
        let text = format!("{PARTITIONS}[Info Services]\nce_collectors = a.example.org:9619,b.example.org:0\n");
        let mut site = TestSite::new(&text, HostRole::Ce);
        let mut module = InfoServices::new();
        site.parse(&mut module).unwrap();

        assert_eq!(
            vec![Problem::new(
                "ce_collectors",
                "Invalid collector b.example.org:0, use host[:port]"
            )],
            module.problems()
        );
    }

    #[test]
    fn invalid_partition_fails_check() {
        let text = format!("{PARTITIONS}[Subcluster CHANGEME]\nname = x\n");
        let mut site = TestSite::new(&text, HostRole::Ce);
        let mut module = InfoServices::new();
        site.parse(&mut module).unwrap();

        assert!(!module.check(&site.ctx()));
    }
}
