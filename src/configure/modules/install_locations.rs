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

//! Locations of installed software and shared files

use log::error;

use crate::config::option::{ConfigOption, Value};
use crate::config::SettingError;
use crate::configure::modules::{module_base, skip_unless_enabled};
use crate::configure::{Module, ModuleBase, ParseContext, Problem, RunContext, SectionStatus};
use crate::util::validation;

pub const SECTION: &str = "Install Locations";

pub struct InstallLocations {
    base: ModuleBase,
}

impl InstallLocations {
    pub fn new() -> InstallLocations {
        let path = |value: &str| Value::String(value.to_owned());
        InstallLocations {
            base: ModuleBase::new(
                SECTION,
                vec![
                    ConfigOption::string("osg").with_default(path("/")).mapped_to("OSG_LOCATION"),
                    ConfigOption::string("globus")
                        .with_default(path("/usr"))
                        .mapped_to("GLOBUS_LOCATION"),
                    ConfigOption::string("user_vo_map")
                        .with_default(path("/var/lib/osg/user-vo-map"))
                        .mapped_to("OSG_USER_VO_MAP"),
                    ConfigOption::string("gridftp_log")
                        .with_default(path("/var/log/gridftp.log"))
                        .mapped_to("OSG_GRIDFTP_LOG"),
                ],
            ),
        }
    }

    pub fn problems(&self, ctx: &RunContext) -> Vec<Problem> {
        let mut problems = Vec::new();
        let map = self.base.str("user_vo_map");
        let host_map = ctx.layout.path(map).to_string_lossy().to_string();
        if validation::valid_file(&host_map) {
            let (valid, invalid_lines) = validation::valid_user_vo_file(&host_map);
            if !valid {
                for line in &invalid_lines {
                    error!("Invalid line in {}: {}", map, line);
                }
                problems.push(Problem::new(
                    "user_vo_map",
                    format!("{map} has {} invalid lines", invalid_lines.len()),
                ));
            }
        }
        problems
    }
}

impl Default for InstallLocations {
    fn default() -> InstallLocations {
        InstallLocations::new()
    }
}

impl Module for InstallLocations {
    module_base!();

    fn module_name(&self) -> &'static str {
        "installlocations"
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
}
