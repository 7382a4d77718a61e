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

//! PBS (Torque, PBS Pro, OpenPBS) as the local batch system

use crate::config::option::{ConfigOption, Value};
use crate::config::Error;
use crate::configure::modules::batch;
use crate::configure::modules::{module_base, skip_unless_enabled};
use crate::configure::{Module, ModuleBase, Problem, RunContext};
use crate::util::validation;

pub const SECTION: &str = "PBS";

const FLAVORS: [&str; 3] = ["torque", "pro", "openpbs"];

pub struct Pbs {
    base: ModuleBase,
}

impl Pbs {
    pub fn new() -> Pbs {
        Pbs {
            base: ModuleBase::new(
                SECTION,
                vec![
                    ConfigOption::string("pbs_location")
                        .with_default(Value::String("/usr".to_owned()))
                        .mapped_to("OSG_PBS_LOCATION"),
                    ConfigOption::string("pbs_server").mapped_to("OSG_PBS_SERVER"),
                    ConfigOption::string("accounting_log_directory"),
                    ConfigOption::string("pbs_flavor").with_default(Value::String("torque".to_owned())),
                ],
            ),
        }
    }

    pub fn problems(&self, ctx: &RunContext) -> Vec<Problem> {
        let mut problems: Vec<Problem> = [
            batch::check_directory(&self.base, ctx, "pbs_location"),
            batch::check_directory(&self.base, ctx, "accounting_log_directory"),
        ]
        .into_iter()
        .flatten()
        .collect();

        let server = self.base.str("pbs_server");
        if !server.is_empty() && !validation::valid_domain(server, false) {
            problems.push(Problem::new("pbs_server", format!("Invalid server host: {server}")));
        }

        let flavor = self.base.str("pbs_flavor");
        if !FLAVORS.contains(&flavor) {
            problems.push(Problem::new(
                "pbs_flavor",
                format!("Unknown PBS flavor {flavor}, use one of {}", FLAVORS.join(", ")),
            ));
        }
        problems
    }
}

impl Default for Pbs {
    fn default() -> Pbs {
        Pbs::new()
    }
}

impl Module for Pbs {
    module_base!();

    fn module_name(&self) -> &'static str {
        "pbs"
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
        let mut settings = vec![
            ("pbs_binpath", batch::bin_dir(self.base.str("pbs_location"))),
            ("pbs_pro", (self.base.str("pbs_flavor") != "torque").to_string()),
        ];
        let spool = self.base.str("accounting_log_directory");
        if !spool.is_empty() {
            settings.push(("pbs_spoolpath", spool.to_owned()));
        }
        batch::update_blah_config(ctx, &settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::option::HostRole;
    use crate::configure::modules::batch::BLAH_CONFIG;
    use crate::configure::modules::testing::TestSite;

    #[test]
    fn server_and_flavor_are_checked() {
        let mut site = TestSite::new(
            "[PBS]\nenabled = True\npbs_server = not a host\npbs_flavor = lsf\n",
            HostRole::Other,
        );
        let mut module = Pbs::new();
        site.parse(&mut module).unwrap();

        let options: Vec<Option<String>> = module
            .problems(&site.ctx())
            .into_iter()
            .map(|p| p.option)
            .collect();

        assert_eq!(
            vec![Some("pbs_server".to_owned()), Some("pbs_flavor".to_owned())],
            options
        );
    }

    #[test]
    fn server_is_published() {
        let mut site = TestSite::new(
            "[PBS]\nenabled = True\npbs_server = pbs.example.edu\n",
            HostRole::Other,
        );
        let mut module = Pbs::new();
        site.parse(&mut module).unwrap();

        assert!(module.problems(&site.ctx()).is_empty());
        assert_eq!(Some("pbs.example.edu"), site.attributes.get("OSG_PBS_SERVER"));
    }

    #[test]
    fn configure_sets_spool() {
        let mut site = TestSite::new(
            "[PBS]\nenabled = True\naccounting_log_directory = /var/spool/pbs/accounting\n",
            HostRole::Ce,
        );
        let mut module = Pbs::new();
        site.parse(&mut module).unwrap();

        assert!(module.configure(&site.ctx()).unwrap());

        let blah = site.read(BLAH_CONFIG);
        assert!(blah.contains("pbs_binpath=\"/usr/bin\"\n"));
        assert!(blah.contains("pbs_pro=\"false\"\n"));
        assert!(blah.contains("pbs_spoolpath=\"/var/spool/pbs/accounting\"\n"));
    }
}
