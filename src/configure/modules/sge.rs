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

//! Grid Engine as the local batch system

use std::path::Path;

use crate::config::option::{ConfigOption, Requiredness, Value};
use crate::config::Error;
use crate::configure::modules::batch;
use crate::configure::modules::{module_base, skip_unless_enabled};
use crate::configure::{Module, ModuleBase, Problem, RunContext};
use crate::util::validation;

pub const SECTION: &str = "SGE";

pub struct Sge {
    base: ModuleBase,
}

impl Sge {
    pub fn new() -> Sge {
        Sge {
            base: ModuleBase::new(
                SECTION,
                vec![
                    ConfigOption::string("sge_root")
                        .required(Requiredness::Mandatory)
                        .mapped_to("OSG_SGE_ROOT"),
                    ConfigOption::string("sge_cell")
                        .with_default(Value::String("default".to_owned()))
                        .mapped_to("OSG_SGE_CELL"),
                    ConfigOption::string("sge_config")
                        .with_default(Value::String("/etc/sysconfig/gridengine".to_owned())),
                    ConfigOption::string("sge_bin_location")
                        .with_default(Value::String("default".to_owned())),
                ],
            ),
        }
    }

    /// Settings script of the configured cell
    fn settings_file(&self) -> String {
        Path::new(self.base.str("sge_root"))
            .join(self.base.str("sge_cell"))
            .join("common/settings.sh")
            .display()
            .to_string()
    }

    /// Binary directory, derived from the root unless set
    fn bin_location(&self) -> String {
        match self.base.str("sge_bin_location") {
            "default" | "" => batch::bin_dir(self.base.str("sge_root")),
            location => location.to_owned(),
        }
    }

    pub fn problems(&self, ctx: &RunContext) -> Vec<Problem> {
        let mut problems: Vec<Problem> = batch::check_directory(&self.base, ctx, "sge_root")
            .into_iter()
            .collect();

        if ctx.role.is_ce() {
            let settings = self.settings_file();
            if !validation::valid_file(&ctx.layout.path(&settings).to_string_lossy()) {
                problems.push(Problem::new(
                    "sge_cell",
                    format!("{settings} not found, check sge_root and sge_cell"),
                ));
            }
        }
        problems
    }
}

impl Default for Sge {
    fn default() -> Sge {
        Sge::new()
    }
}

impl Module for Sge {
    module_base!();

    fn module_name(&self) -> &'static str {
        "sge"
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
                ("sge_rootpath", self.base.str("sge_root").to_owned()),
                ("sge_cellname", self.base.str("sge_cell").to_owned()),
                ("sge_binpath", self.bin_location()),
            ],
        )
    }
}
