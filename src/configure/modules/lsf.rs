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

//! LSF as the local batch system

use crate::config::option::{ConfigOption, Value};
use crate::config::Error;
use crate::configure::modules::batch;
use crate::configure::modules::{module_base, skip_unless_enabled};
use crate::configure::{Module, ModuleBase, Problem, RunContext};

pub const SECTION: &str = "LSF";

pub struct Lsf {
    base: ModuleBase,
}

impl Lsf {
    pub fn new() -> Lsf {
        Lsf {
            base: ModuleBase::new(
                SECTION,
                vec![
                    ConfigOption::string("lsf_location")
                        .with_default(Value::String("/usr".to_owned()))
                        .mapped_to("OSG_LSF_LOCATION"),
                    ConfigOption::string("lsf_profile")
                        .with_default(Value::String("/lsf/conf/profile.lsf".to_owned()))
                        .mapped_to("OSG_LSF_PROFILE"),
                    ConfigOption::string("lsf_conf")
                        .with_default(Value::String("/etc".to_owned()))
                        .mapped_to("OSG_LSF_CONF"),
                ],
            ),
        }
    }

    pub fn problems(&self, ctx: &RunContext) -> Vec<Problem> {
        let mut problems: Vec<Problem> = [
            batch::check_directory(&self.base, ctx, "lsf_location"),
            batch::check_directory(&self.base, ctx, "lsf_conf"),
        ]
        .into_iter()
        .flatten()
        .collect();

        // Accounting logs are found through lsf_conf, a log directory is not honored
        if ctx.config.get_raw(SECTION, "log_directory").is_some() {
            problems.push(Problem::new(
                "log_directory",
                "log_directory is not supported for LSF, remove it and set lsf_conf instead",
            ));
        }
        problems
    }
}

impl Default for Lsf {
    fn default() -> Lsf {
        Lsf::new()
    }
}

impl Module for Lsf {
    module_base!();

    fn module_name(&self) -> &'static str {
        "lsf"
    }

    fn configure_after(&self) -> Vec<&'static str> {
        batch::configure_after()
    }

    fn check(&self, ctx: &RunContext) -> bool {
        skip_unless_enabled!(self, true);
        self.base.report_problems(ctx.config, &self.problems(ctx))
    }

    fn configure(&self, ctx: &RunContext) -> Result<bool, Error> {
        skip_unless_enabled!(self, Ok(true));
        batch::update_blah_config(
            ctx,
            &[
                ("lsf_binpath", batch::bin_dir(self.base.str("lsf_location"))),
                ("lsf_confpath", self.base.str("lsf_conf").to_owned()),
            ],
        )
    }
}
