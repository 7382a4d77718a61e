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

//! MonALISA monitoring agent

use std::collections::BTreeSet;

use crate::config::option::{ConfigOption, OptionType, Requiredness, Value};
use crate::configure::modules::{module_base, skip_unless_enabled};
use crate::configure::{Module, ModuleBase, Problem, RunContext};
use crate::util::validation;

pub const SECTION: &str = "MonaLisa";

pub struct MonaLisa {
    base: ModuleBase,
}

impl MonaLisa {
    pub fn new() -> MonaLisa {
        let optional = Requiredness::Optional;
        MonaLisa {
            base: ModuleBase::new(
                SECTION,
                vec![
                    ConfigOption::string("monitor_group")
                        .with_default(Value::String("OSG".to_owned()))
                        .mapped_to("MONALISA_GROUP"),
                    ConfigOption::string("user").with_default(Value::String("daemon".to_owned())),
                    ConfigOption::new("use_vo_modules", OptionType::Bool, optional)
                        .with_default(Value::Bool(true)),
                    ConfigOption::new("ganglia_support", OptionType::Bool, optional)
                        .with_default(Value::Bool(false)),
                    ConfigOption::string("ganglia_host"),
                    ConfigOption::new("ganglia_port", OptionType::Int, optional)
                        .with_default(Value::Int(8649)),
                    ConfigOption::new("auto_update", OptionType::Bool, optional)
                        .with_default(Value::Bool(false)),
                ],
            ),
        }
    }

    pub fn problems(&self, ctx: &RunContext) -> Vec<Problem> {
        let mut problems = Vec::new();

        let user = self.base.str("user");
        if ctx.role.is_ce() && !validation::valid_user(user) {
            problems.push(Problem::new("user", format!("User {user} does not exist")));
        }

        if self.base.bool("ganglia_support") {
            let host = self.base.str("ganglia_host");
            if !validation::valid_domain(host, false) {
                problems.push(Problem::new(
                    "ganglia_host",
                    format!("Ganglia support needs a valid ganglia_host, got '{host}'"),
                ));
            }
            let port = self.base.int("ganglia_port").unwrap_or(0);
            if !(1..=65535).contains(&port) {
                problems.push(Problem::new("ganglia_port", format!("Invalid port: {port}")));
            }
        }
        problems
    }
}

impl Default for MonaLisa {
    fn default() -> MonaLisa {
        MonaLisa::new()
    }
}

impl Module for MonaLisa {
    module_base!();

    fn module_name(&self) -> &'static str {
        "monalisa"
    }

    fn check(&self, ctx: &RunContext) -> bool {
        skip_unless_enabled!(self, true);
        self.base.report_problems(ctx.config, &self.problems(ctx))
    }

    fn enabled_services(&self) -> BTreeSet<String> {
        if self.base.enabled() {
            BTreeSet::from(["MLD".to_owned()])
        } else {
            BTreeSet::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::option::HostRole;
    use crate::configure::modules::testing::TestSite;

    #[test]
    fn ganglia_needs_host() {
        let mut site = TestSite::new(
            "[MonaLisa]\nenabled = True\nganglia_support = True\n",
            HostRole::Other,
        );
        let mut module = MonaLisa::new();
        site.parse(&mut module).unwrap();

        let problems = module.problems(&site.ctx());

        assert_eq!(1, problems.len());
        assert_eq!(Some("ganglia_host".to_owned()), problems[0].option);
    }

    #[test]
    fn enabled_agent_runs_service() {
        let mut site = TestSite::new("[MonaLisa]\nenabled = True\n", HostRole::Other);
        let mut module = MonaLisa::new();
        site.parse(&mut module).unwrap();

        assert!(module.check(&site.ctx()));
        assert_eq!(BTreeSet::from(["MLD".to_owned()]), module.enabled_services());
        assert_eq!(Some("OSG"), site.attributes.get("MONALISA_GROUP"));
    }
}
