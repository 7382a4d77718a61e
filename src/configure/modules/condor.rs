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

//! HTCondor as the local batch system

use crate::config::option::{ConfigOption, Value};
use crate::config::Error;
use crate::configure::modules::batch;
use crate::configure::modules::{module_base, skip_unless_enabled};
use crate::configure::{Module, ModuleBase, Problem, RunContext};

pub const SECTION: &str = "Condor";

pub struct Condor {
    base: ModuleBase,
}

impl Condor {
    pub fn new() -> Condor {
        Condor {
            base: ModuleBase::new(
                SECTION,
                vec![
                    ConfigOption::string("condor_location")
                        .with_default(Value::String("/usr".to_owned()))
                        .mapped_to("OSG_CONDOR_LOCATION"),
                    ConfigOption::string("condor_config")
                        .with_default(Value::String("/etc/condor/condor_config".to_owned()))
                        .mapped_to("OSG_CONDOR_CONFIG"),
                ],
            ),
        }
    }

    pub fn problems(&self, ctx: &RunContext) -> Vec<Problem> {
        [
            batch::check_directory(&self.base, ctx, "condor_location"),
            batch::check_file(&self.base, ctx, "condor_config"),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

impl Default for Condor {
    fn default() -> Condor {
        Condor::new()
    }
}

impl Module for Condor {
    module_base!();

    fn module_name(&self) -> &'static str {
        "condor"
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
                ("condor_binpath", batch::bin_dir(self.base.str("condor_location"))),
                ("condor_config", self.base.str("condor_config").to_owned()),
            ],
        )
    }
}
