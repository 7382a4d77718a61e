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

//! Storage areas advertised to jobs

use log::warn;

use crate::config::option::{ConfigOption, OptionType, Requiredness, Value};
use crate::config::SettingError;
use crate::configure::attributes::UNSET;
use crate::configure::modules::{module_base, skip_unless_enabled};
use crate::configure::{Module, ModuleBase, ParseContext, Problem, RunContext, SectionStatus};
use crate::util::validation;

pub const SECTION: &str = "Storage";

pub struct Storage {
    base: ModuleBase,
}

impl Storage {
    pub fn new() -> Storage {
        let on_ce = Requiredness::MandatoryOnCe;
        Storage {
            base: ModuleBase::new(
                SECTION,
                vec![
                    ConfigOption::new("se_available", OptionType::Bool, Requiredness::Optional)
                        .with_default(Value::Bool(false))
                        .mapped_to("OSG_STORAGE_ELEMENT"),
                    ConfigOption::string("default_se").mapped_to("OSG_DEFAULT_SE"),
                    ConfigOption::string("grid_dir")
                        .with_default(Value::String("/etc/osg/wn-client/".to_owned()))
                        .mapped_to("OSG_GRID"),
                    ConfigOption::string("app_dir").required(on_ce).mapped_to("OSG_APP"),
                    ConfigOption::string("data_dir").mapped_to("OSG_DATA"),
                    ConfigOption::string("worker_node_temp").mapped_to("OSG_WN_TMP"),
                    ConfigOption::string("site_read").mapped_to("OSG_SITE_READ"),
                    ConfigOption::string("site_write").mapped_to("OSG_SITE_WRITE"),
                ],
            ),
        }
    }

    pub fn problems(&self, ctx: &RunContext) -> Vec<Problem> {
        let mut problems = Vec::new();

        if self.base.bool("se_available") && self.base.str("default_se").is_empty() {
            problems.push(Problem::new(
                "default_se",
                "se_available is set but no default_se is given",
            ));
        }

        // Only the CE can see the shared areas
        if !ctx.role.is_ce() {
            return problems;
        }
        let app_dir = self.base.str("app_dir");
        if !app_dir.is_empty() && app_dir != UNSET {
            let host_dir = ctx.layout.path(app_dir);
            if !validation::valid_directory(&host_dir.to_string_lossy()) {
                problems.push(Problem::new("app_dir", format!("Directory {app_dir} does not exist")));
            } else if !host_dir.join("etc").is_dir() {
                problems.push(Problem::new(
                    "app_dir",
                    format!("{app_dir}/etc must exist and be writable by all users"),
                ));
            }
        }
        for option in ["data_dir", "worker_node_temp"] {
            let dir = self.base.str(option);
            if !dir.is_empty() && dir != UNSET && !validation::valid_directory(&ctx.layout.path(dir).to_string_lossy()) {
                warn!("{} {} does not exist on this host", option, dir);
            }
        }
        problems
    }
}

impl Default for Storage {
    fn default() -> Storage {
        Storage::new()
    }
}

impl Module for Storage {
    module_base!();

    fn module_name(&self) -> &'static str {
        "storage"
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::option::HostRole;
    use crate::configure::modules::testing::TestSite;

    #[test]
    fn storage_element_needs_default() {
        let mut site = TestSite::new("[Storage]\nse_available = True\n", HostRole::Other);
        let mut module = Storage::new();
        site.parse(&mut module).unwrap();

        let problems = module.problems(&site.ctx());

        assert_eq!(vec![Problem::new("default_se", "se_available is set but no default_se is given")], problems);
        assert_eq!(Some("true"), site.attributes.get("OSG_STORAGE_ELEMENT"));
    }

    #[test]
    fn app_dir_needs_etc_on_ce() {
        let mut site = TestSite::new("[Storage]\napp_dir = /osg/app\n", HostRole::Ce);
        site.mkdir("/osg/app");
        let mut module = Storage::new();
        site.parse(&mut module).unwrap();

        assert_eq!(1, module.problems(&site.ctx()).len());

        site.mkdir("/osg/app/etc");
        assert!(module.problems(&site.ctx()).is_empty());
    }

    #[test]
    fn unset_app_dir_is_accepted() {
        let mut site = TestSite::new("[Storage]\napp_dir = UNSET\n", HostRole::Ce);
        let mut module = Storage::new();
        site.parse(&mut module).unwrap();

        assert!(module.check(&site.ctx()));
        assert_eq!(Some(UNSET), site.attributes.get("OSG_APP"));
    }
}
