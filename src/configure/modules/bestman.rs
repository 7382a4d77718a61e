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

//! BeStMan storage resource manager
//!
//! Only validated, the service is configured by its own tools.

use std::collections::BTreeSet;

use crate::config::option::{ConfigOption, OptionType, Requiredness, Value};
use crate::configure::modules::{module_base, skip_unless_enabled};
use crate::configure::{Module, ModuleBase, Problem, RunContext};
use crate::util::validation;

pub const SECTION: &str = "Bestman";

const MODES: [&str; 2] = ["gateway", "fullmode"];

pub struct Bestman {
    base: ModuleBase,
}

impl Bestman {
    pub fn new() -> Bestman {
        let optional = Requiredness::Optional;
        Bestman {
            base: ModuleBase::new(
                SECTION,
                vec![
                    ConfigOption::new("secure_port", OptionType::Int, optional)
                        .with_default(Value::Int(8443)),
                    ConfigOption::string("mode").with_default(Value::String("gateway".to_owned())),
                    ConfigOption::string("transfer_servers"),
                    ConfigOption::string("user").with_default(Value::String("bestman".to_owned())),
                    ConfigOption::new("sudo", OptionType::Bool, optional).with_default(Value::Bool(true)),
                ],
            ),
        }
    }

    pub fn problems(&self, ctx: &RunContext) -> Vec<Problem> {
        let mut problems = Vec::new();

        let port = self.base.int("secure_port").unwrap_or(0);
        if !(1..=65535).contains(&port) {
            problems.push(Problem::new("secure_port", format!("Invalid port: {port}")));
        }

        let mode = self.base.str("mode");
        if !MODES.contains(&mode) {
            problems.push(Problem::new(
                "mode",
                format!("Unknown mode {mode}, use gateway or fullmode"),
            ));
        }

        for server in self.base.str("transfer_servers").split(',').map(str::trim) {
            let host = server
                .split("://")
                .last()
                .and_then(|rest| rest.split([':', '/']).next())
                .unwrap_or("");
            if !server.is_empty() && !validation::valid_domain(host, false) {
                problems.push(Problem::new(
                    "transfer_servers",
                    format!("Invalid transfer server {server}"),
                ));
            }
        }

        let user = self.base.str("user");
        if ctx.role.is_ce() && !validation::valid_user(user) {
            problems.push(Problem::new("user", format!("User {user} does not exist")));
        }
        problems
    }
}

impl Default for Bestman {
    fn default() -> Bestman {
        Bestman::new()
    }
}

impl Module for Bestman {
    module_base!();

    fn module_name(&self) -> &'static str {
        "bestman"
    }

    fn check(&self, ctx: &RunContext) -> bool {
        skip_unless_enabled!(self, true);
        self.base.report_problems(ctx.config, &self.problems(ctx))
    }

    fn enabled_services(&self) -> BTreeSet<String> {
        if self.base.enabled() {
            BTreeSet::from(["bestman2".to_owned()])
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
    fn transfer_servers_and_mode() {
        let mut site = TestSite::new(
            "[Bestman]\nenabled = True\nmode = halfmode\ntransfer_servers = gsiftp://gftp.example.edu:2811, gsiftp://bad host\n",
            HostRole::Other,
        );
        let mut module = Bestman::new();
        site.parse(&mut module).unwrap();

        let options: Vec<Option<String>> =
            module.problems(&site.ctx()).into_iter().map(|p| p.option).collect();

        assert_eq!(
            vec![Some("mode".to_owned()), Some("transfer_servers".to_owned())],
            options
        );
    }

    #[test]
    fn configure_is_a_no_op() {
        let mut site = TestSite::new("[Bestman]\nenabled = True\n", HostRole::Other);
        let mut module = Bestman::new();
        site.parse(&mut module).unwrap();

        assert!(module.check(&site.ctx()));
        assert!(module.configure(&site.ctx()).unwrap());
    }
}
