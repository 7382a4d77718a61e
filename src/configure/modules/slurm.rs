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

//! SLURM as the local batch system

use crate::config::option::{ConfigOption, OptionType, Requiredness, Value};
use crate::config::Error;
use crate::configure::modules::batch;
use crate::configure::modules::{module_base, skip_unless_enabled};
use crate::configure::{Module, ModuleBase, Problem, RunContext};
use crate::util::validation;

pub const SECTION: &str = "SLURM";

pub struct Slurm {
    base: ModuleBase,
}

impl Slurm {
    pub fn new() -> Slurm {
        Slurm {
            base: ModuleBase::new(
                SECTION,
                vec![
                    ConfigOption::string("slurm_location")
                        .with_default(Value::String("/usr".to_owned()))
                        .mapped_to("OSG_SLURM_LOCATION"),
                    ConfigOption::string("db_host"),
                    ConfigOption::new("db_port", OptionType::Int, Requiredness::Optional)
                        .with_default(Value::Int(3306)),
                    ConfigOption::string("db_user").with_default(Value::String("slurm".to_owned())),
                    ConfigOption::string("db_pass"),
                    ConfigOption::string("db_name")
                        .with_default(Value::String("slurm_acct_db".to_owned())),
                    ConfigOption::string("slurm_cluster"),
                ],
            ),
        }
    }

    pub fn problems(&self, ctx: &RunContext) -> Vec<Problem> {
        let mut problems: Vec<Problem> = batch::check_directory(&self.base, ctx, "slurm_location")
            .into_iter()
            .collect();

        let host = self.base.str("db_host");
        if !host.is_empty() && !validation::valid_domain(host, false) {
            problems.push(Problem::new("db_host", format!("Invalid database host: {host}")));
        }
        if let Some(port) = self.base.int("db_port") {
            if !(1..=65535).contains(&port) {
                problems.push(Problem::new("db_port", format!("Invalid port: {port}")));
            }
        }
        problems
    }
}

impl Default for Slurm {
    fn default() -> Slurm {
        Slurm::new()
    }
}

impl Module for Slurm {
    module_base!();

    fn module_name(&self) -> &'static str {
        "slurm"
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
            &[("slurm_binpath", batch::bin_dir(self.base.str("slurm_location")))],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::option::HostRole;
    use crate::configure::modules::testing::TestSite;

    #[test]
    fn database_settings_are_checked() {
        let mut site = TestSite::new(
            "[SLURM]\nenabled = True\ndb_host = db..example\ndb_port = 70000\n",
            HostRole::Other,
        );
        let mut module = Slurm::new();
        site.parse(&mut module).unwrap();

        assert_eq!(2, module.problems(&site.ctx()).len());
    }

    #[test]
    fn defaults_pass() {
        let mut site = TestSite::new("[SLURM]\nenabled = True\n", HostRole::Other);
        let mut module = Slurm::new();
        site.parse(&mut module).unwrap();

        assert!(module.check(&site.ctx()));
        assert_eq!(Some("/usr"), site.attributes.get("OSG_SLURM_LOCATION"));
    }
}
