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

//! Job gateway settings of the CE

use std::collections::BTreeSet;

use log::warn;

use crate::config::option::{ConfigOption, OptionType, Requiredness, Value};
use crate::config::{Error, SettingError};
use crate::configure::modules::ce;
use crate::configure::modules::{module_base, skip_unless_enabled};
use crate::configure::{Module, ModuleBase, ParseContext, Problem, RunContext, SectionStatus};

pub const SECTION: &str = "Gateway";

const DEFAULT_PATH: &str = "/bin:/usr/bin:/sbin:/usr/sbin";

pub struct Gateway {
    base: ModuleBase,
}

impl Gateway {
    pub fn new() -> Gateway {
        Gateway {
            base: ModuleBase::new(
                SECTION,
                vec![
                    ConfigOption::new("htcondor_gateway_enabled", OptionType::Bool, Requiredness::Optional)
                        .with_default(Value::Bool(true)),
                    ConfigOption::string("job_envvar_path")
                        .with_default(Value::String(DEFAULT_PATH.to_owned())),
                ],
            ),
        }
    }

    pub fn problems(&self, ctx: &RunContext) -> Vec<Problem> {
        let mut problems = Vec::new();
        let path = self.base.str("job_envvar_path");
        for entry in path.split(':').filter(|e| !e.is_empty()) {
            if !entry.starts_with('/') {
                problems.push(Problem::new(
                    "job_envvar_path",
                    format!("{entry} in job_envvar_path is not an absolute path"),
                ));
            }
        }
        if ctx.role.is_ce() && !self.base.bool("htcondor_gateway_enabled") {
            warn!("The HTCondor gateway is disabled, this CE accepts no jobs");
        }
        problems
    }
}

impl Default for Gateway {
    fn default() -> Gateway {
        Gateway::new()
    }
}

impl Module for Gateway {
    module_base!();

    fn module_name(&self) -> &'static str {
        "gateway"
    }

    /// A present section is enabled unless disabled explicitly
    fn set_status(&mut self, ctx: &ParseContext) -> Result<bool, SettingError> {
        self.base.status = SectionStatus::read_or(ctx.config, SECTION, SectionStatus::Enabled)?;
        Ok(self.base.enabled())
    }

    fn check(&self, ctx: &RunContext) -> bool {
        skip_unless_enabled!(self, true);
        self.base.report_problems(ctx.config, &self.problems(ctx))
    }

    fn configure(&self, ctx: &RunContext) -> Result<bool, Error> {
        skip_unless_enabled!(self, Ok(true));
        if !self.base.bool("htcondor_gateway_enabled") {
            return Ok(true);
        }
        ce::update_ce_config(ctx, "OSG_JOB_ENVVAR_PATH", self.base.str("job_envvar_path"))?;
        Ok(true)
    }

    fn enabled_services(&self) -> BTreeSet<String> {
        if self.base.enabled() && self.base.bool("htcondor_gateway_enabled") {
            BTreeSet::from(["condor-ce".to_owned()])
        } else {
            BTreeSet::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::option::HostRole;
    use crate::configure::modules::ce::CE_CONFIG;
    use crate::configure::modules::testing::TestSite;

    #[test]
    fn relative_path_entries_are_reported() {
        let mut site = TestSite::new(
            "[Gateway]\njob_envvar_path = /bin:usr/bin\n",
            HostRole::Other,
        );
        let mut module = Gateway::new();
        site.parse(&mut module).unwrap();

        let problems = module.problems(&site.ctx());

        assert_eq!(1, problems.len());
        assert!(problems[0].message.starts_with("usr/bin"));
    }

    #[test]
    fn configure_sets_job_path() {
        let mut site = TestSite::new("[Gateway]\n", HostRole::Ce);
        let mut module = Gateway::new();
        site.parse(&mut module).unwrap();

        assert!(module.configure(&site.ctx()).unwrap());

        assert!(site
            .read(CE_CONFIG)
            .contains("OSG_JOB_ENVVAR_PATH = /bin:/usr/bin:/sbin:/usr/sbin\n"));
        assert_eq!(BTreeSet::from(["condor-ce".to_owned()]), module.enabled_services());
    }

    #[test]
    fn disabled_gateway_runs_no_service() {
        let mut site = TestSite::new("[Gateway]\nhtcondor_gateway_enabled = False\n", HostRole::Ce);
        let mut module = Gateway::new();
        site.parse(&mut module).unwrap();

        assert!(module.enabled_services().is_empty());
    }
}
