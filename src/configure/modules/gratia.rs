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

//! Gratia accounting probes
//!
//! On a CE without a `[Gratia]` section the module configures itself: every
//! enabled batch system gets its probe, reporting to the collector of the
//! site's group under the resource name from Site Information.

use std::collections::BTreeSet;

use log::{info, warn};

use crate::config::option::ConfigOption;
use crate::config::{Error, SettingError};
use crate::config::config_parser::JOBMANAGER_SECTIONS;
use crate::configure::modules::{module_base, site_information, skip_unless_enabled};
use crate::configure::{Module, ModuleBase, ParseContext, Problem, RunContext, SectionStatus};
use crate::util::atomic_file;
use crate::util::atomic_file::Ownership;
use crate::util::editing;
use crate::util::validation;

pub const SECTION: &str = "Gratia";

pub const OSG_COLLECTOR: &str = "gratia-osg-prod.opensciencegrid.org:80";
pub const ITB_COLLECTOR: &str = "gratia-osg-itb.opensciencegrid.org:80";

/// Stands for the probes of all enabled batch systems in a probe list
const JOBMANAGER_PROBE: &str = "jobmanager";

/// Where a probe reports to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub probe: String,

    /// `host:port` of the collector
    pub collector: String,
}

impl ProbeTarget {
    pub fn config_file(&self) -> String {
        format!("/etc/gratia/{}/ProbeConfig", self.probe)
    }
}

pub struct Gratia {
    base: ModuleBase,
}

impl Gratia {
    pub fn new() -> Gratia {
        Gratia {
            base: ModuleBase::new(
                SECTION,
                vec![ConfigOption::string("probes"), ConfigOption::string("resource")],
            ),
        }
    }

    /// Resource name, falling back to the one from Site Information
    pub fn resource<'a>(&'a self, ctx: &'a RunContext) -> &'a str {
        match self.base.str("resource") {
            "" => ctx.attributes.get("OSG_SITE_NAME").unwrap_or(""),
            resource => resource,
        }
    }

    /// Collector matching the group of the site
    pub fn default_collector(ctx: &RunContext) -> &'static str {
        let group = ctx
            .site
            .value(site_information::SECTION, "group")
            .map(|v| v.to_string())
            .or_else(|| ctx.attributes.get("OSG_GROUP").map(str::to_owned));
        match group.as_deref() {
            Some("OSG-ITB") => ITB_COLLECTOR,
            _ => OSG_COLLECTOR,
        }
    }

    /// Probes to configure with their collectors
    pub fn probe_targets(&self, ctx: &RunContext) -> Result<Vec<ProbeTarget>, Problem> {
        let probes = self.base.str("probes");
        if probes.is_empty() {
            let collector = Gratia::default_collector(ctx);
            return Ok(default_probes(ctx)
                .into_iter()
                .map(|probe| ProbeTarget {
                    probe,
                    collector: collector.to_owned(),
                })
                .collect());
        }

        let mut targets = Vec::new();
        for entry in probes.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (probe, collector) = match entry.split_once(':') {
                Some(parts) => parts,
                None => {
                    return Err(Problem::new(
                        "probes",
                        format!("Probe entry {entry} must have the form probe:host[:port]"),
                    ))
                }
            };
            if !validation::valid_location(collector) {
                return Err(Problem::new(
                    "probes",
                    format!("Invalid collector {collector} for probe {probe}"),
                ));
            }
            let names = if probe == JOBMANAGER_PROBE {
                batch_probes(ctx)
            } else {
                vec![probe.to_owned()]
            };
            targets.extend(names.into_iter().map(|probe| ProbeTarget {
                probe,
                collector: collector.to_owned(),
            }));
        }
        Ok(targets)
    }

    pub fn problems(&self, ctx: &RunContext) -> Vec<Problem> {
        let mut problems = Vec::new();
        if let Err(problem) = self.probe_targets(ctx) {
            problems.push(problem);
        }
        if ctx.role.is_ce() && self.resource(ctx).is_empty() {
            problems.push(Problem::new(
                "resource",
                "No resource name, set resource here or in Site Information",
            ));
        }
        problems
    }

    fn configure_probe(&self, ctx: &RunContext, target: &ProbeTarget) -> Result<(), Error> {
        let path = ctx.layout.path(&target.config_file());
        let content = match atomic_file::read_optional(&path)? {
            Some(content) => content,
            None => {
                warn!("Probe {} is not installed, skipping it", target.probe);
                return Ok(());
            }
        };

        let mut content = content;
        for (name, value) in [
            ("SiteName", self.resource(ctx)),
            ("CollectorHost", target.collector.as_str()),
            ("SSLHost", target.collector.as_str()),
            ("SSLRegistrationHost", target.collector.as_str()),
            ("EnableProbe", "1"),
        ] {
            let (edited, found) = editing::set_xml_attribute(&content, name, value);
            if !found {
                warn!("{} has no {} attribute", path.display(), name);
            }
            content = edited;
        }
        atomic_file::write_file(&path, content.as_bytes(), 0o644, Ownership::Preserve)?;
        info!("Probe {} reports to {}", target.probe, target.collector);
        Ok(())
    }
}

impl Default for Gratia {
    fn default() -> Gratia {
        Gratia::new()
    }
}

/// Probe names of the enabled batch systems
fn batch_probes(ctx: &RunContext) -> Vec<String> {
    let mut probes: Vec<String> = Vec::new();
    for section in JOBMANAGER_SECTIONS.iter().filter(|s| ctx.site.is_enabled(s)) {
        let probe = match *section {
            "PBS" | "LSF" => "pbs-lsf",
            "SGE" => "sge",
            "SLURM" => "slurm",
            _ => "condor",
        };
        if !probes.iter().any(|p| p == probe) {
            probes.push(probe.to_owned());
        }
    }
    probes
}

/// Probes configured without an explicit list
fn default_probes(ctx: &RunContext) -> Vec<String> {
    let mut probes = batch_probes(ctx);
    if ctx.role.is_ce() {
        probes.push("htcondor-ce".to_owned());
    }
    probes
}

impl Module for Gratia {
    module_base!();

    fn module_name(&self) -> &'static str {
        "gratia"
    }

    fn separately_configurable(&self) -> bool {
        true
    }

    fn configure_after(&self) -> Vec<&'static str> {
        let mut after = vec![site_information::SECTION];
        after.extend(JOBMANAGER_SECTIONS);
        after
    }

    /// Without a section a CE still gets accounting
    fn set_status(&mut self, ctx: &ParseContext) -> Result<bool, SettingError> {
        if !ctx.config.has_section(SECTION) && ctx.role.is_ce() {
            info!("No Gratia section on this CE, configuring the default probes");
            self.base.status = SectionStatus::Enabled;
            return Ok(true);
        }
        self.base.set_status(ctx.config)
    }

    fn check(&self, ctx: &RunContext) -> bool {
        skip_unless_enabled!(self, true);
        self.base.report_problems(ctx.config, &self.problems(ctx))
    }

    fn configure(&self, ctx: &RunContext) -> Result<bool, Error> {
        skip_unless_enabled!(self, Ok(true));
        let targets = match self.probe_targets(ctx) {
            Ok(targets) => targets,
            Err(problem) => {
                self.base
                    .report(ctx.config, log::Level::Error, problem.option.as_deref(), &problem.message);
                return Ok(false);
            }
        };
        for target in &targets {
            self.configure_probe(ctx, target)?;
        }
        Ok(true)
    }

    fn enabled_services(&self) -> BTreeSet<String> {
        if self.base.enabled() {
            BTreeSet::from(["gratia-probes-cron".to_owned()])
        } else {
            BTreeSet::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::option::HostRole;
    use crate::configure::modules::condor::Condor;
    use crate::configure::modules::pbs::Pbs;
    use crate::configure::modules::site_information::SiteInformation;
    use crate::configure::modules::testing::TestSite;

    const SITE: &str = "[Site Information]
group = OSG-ITB
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
[Condor]
enabled = True
";

    const PROBE_CONFIG: &str = "<ProbeConfiguration\n    CollectorHost=\"old:80\"\n    SSLHost=\"old:80\"\n    SSLRegistrationHost=\"old:80\"\n    SiteName=\"Generic\"\n    EnableProbe=\"0\"\n/>\n";

    fn parsed_site(text: &str, role: HostRole) -> (TestSite, Gratia) {
        let mut site = TestSite::new(text, role);
        site.parse(&mut SiteInformation::new()).unwrap();
        site.parse(&mut Condor::new()).unwrap();
        site.parse(&mut Pbs::new()).unwrap();
        let mut module = Gratia::new();
        site.parse(&mut module).unwrap();
        (site, module)
    }

    #[test]
    fn autoconfigures_on_ce() {
        let (site, module) = parsed_site(SITE, HostRole::Ce);

        assert!(module.base().enabled());
        assert_eq!(
            vec![
                ProbeTarget {
                    probe: "condor".to_owned(),
                    collector: ITB_COLLECTOR.to_owned()
                },
                ProbeTarget {
                    probe: "htcondor-ce".to_owned(),
                    collector: ITB_COLLECTOR.to_owned()
                },
            ],
            module.probe_targets(&site.ctx()).unwrap()
        );
        assert_eq!("EXAMPLE_CE", module.resource(&site.ctx()));
    }

    #[test]
    fn not_autoconfigured_elsewhere() {
        let (_, module) = parsed_site(SITE, HostRole::Other);

        assert!(!module.base().enabled());
    }

    #[test]
    fn jobmanager_expands_to_batch_probes() {
        let text = format!(
            "{SITE}[PBS]\nenabled = True\n[Gratia]\nenabled = True\nprobes = jobmanager:gratia.example.edu:80\n"
        );
        let (site, module) = parsed_site(&text, HostRole::Other);

        let probes: Vec<String> = module
            .probe_targets(&site.ctx())
            .unwrap()
            .into_iter()
            .map(|t| t.probe)
            .collect();

        assert_eq!(vec!["condor".to_owned(), "pbs-lsf".to_owned()], probes);
    }

    #[test]
    fn malformed_probe_entry() {
        let text = format!("{SITE}[Gratia]\nenabled = True\nprobes = condor\n");
        let (site, module) = parsed_site(&text, HostRole::Other);

        assert_eq!(1, module.problems(&site.ctx()).len());
    }

    #[test]
    fn collector_port_zero_is_rejected() {
        let text = format!("{SITE}[Gratia]\nenabled = True\nprobes = condor:gratia.example.edu:0\n");
        let (site, module) = parsed_site(&text, HostRole::Other);

        assert_eq!(
            Err(Problem::new(
                "probes",
                "Invalid collector gratia.example.edu:0 for probe condor"
            )),
            module.probe_targets(&site.ctx())
        );
    }

    #[test]
    fn configure_rewrites_probe_config() {
        let (site, module) = parsed_site(SITE, HostRole::Ce);
        site.write("/etc/gratia/condor/ProbeConfig", PROBE_CONFIG);

        assert!(module.configure(&site.ctx()).unwrap());

        let content = site.read("/etc/gratia/condor/ProbeConfig");
        assert!(content.contains(&format!("CollectorHost=\"{ITB_COLLECTOR}\"")));
        assert!(content.contains(&format!("SSLHost=\"{ITB_COLLECTOR}\"")));
        assert!(content.contains("SiteName=\"EXAMPLE_CE\""));
        assert!(content.contains("EnableProbe=\"1\""));
        // Not installed, skipped
        assert!(!site.layout.path("/etc/gratia/htcondor-ce/ProbeConfig").exists());
    }
}
