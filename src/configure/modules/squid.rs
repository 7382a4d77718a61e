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

//! HTTP proxy available to worker nodes

use crate::config::option::{ConfigOption, OptionType, Requiredness, Value};
use crate::configure::modules::{module_base, skip_unless_enabled};
use crate::configure::{Module, ModuleBase, Problem, RunContext};
use crate::util::validation;

pub const SECTION: &str = "Squid";

pub struct Squid {
    base: ModuleBase,
}

impl Squid {
    pub fn new() -> Squid {
        Squid {
            base: ModuleBase::new(
                SECTION,
                vec![
                    ConfigOption::string("location")
                        .required(Requiredness::Mandatory)
                        .mapped_to("OSG_SQUID_LOCATION"),
                    ConfigOption::string("policy")
                        .with_default(Value::String("LRU".to_owned()))
                        .mapped_to("OSG_SQUID_POLICY"),
                    ConfigOption::new("cache_size", OptionType::Int, Requiredness::Optional)
                        .with_default(Value::Int(0))
                        .mapped_to("OSG_SQUID_CACHE_SIZE"),
                    ConfigOption::new("memory_size", OptionType::Int, Requiredness::Optional)
                        .with_default(Value::Int(0))
                        .mapped_to("OSG_SQUID_MEM_CACHE"),
                ],
            ),
        }
    }

    pub fn problems(&self) -> Vec<Problem> {
        let mut problems = Vec::new();

        let location = self.base.str("location");
        if !validation::valid_location(location) {
            problems.push(Problem::new(
                "location",
                format!("Invalid location {location}, use host[:port]"),
            ));
        }

        if self.base.int("cache_size").unwrap_or(0) < 0 {
            problems.push(Problem::new("cache_size", "cache_size must not be negative"));
        }
        if self.base.int("memory_size").unwrap_or(0) < 0 {
            problems.push(Problem::new("memory_size", "memory_size must not be negative"));
        }
        problems
    }
}

impl Default for Squid {
    fn default() -> Squid {
        Squid::new()
    }
}

impl Module for Squid {
    module_base!();

    fn module_name(&self) -> &'static str {
        "squid"
    }

    fn check(&self, ctx: &RunContext) -> bool {
        skip_unless_enabled!(self, true);
        self.base.report_problems(ctx.config, &self.problems())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::option::HostRole;
    use crate::configure::modules::testing::TestSite;

    #[test]
    fn valid_location_is_published() {
        let mut site = TestSite::new(
            "[Squid]\nenabled = True\nlocation = squid.example.edu:3128\ncache_size = 2048\n",
            HostRole::Other,
        );
        let mut module = Squid::new();
        site.parse(&mut module).unwrap();

        assert!(module.problems().is_empty());
        assert_eq!(Some("squid.example.edu:3128"), site.attributes.get("OSG_SQUID_LOCATION"));
        assert_eq!(Some("2048"), site.attributes.get("OSG_SQUID_CACHE_SIZE"));
    }

    #[test]
    fn negative_cache_size_is_one_problem() {
        let mut site = TestSite::new(
            "[Squid]\nenabled = True\nlocation = squid.example.edu\ncache_size = -1\n",
            HostRole::Other,
        );
        let mut module = Squid::new();
        site.parse(&mut module).unwrap();

        assert_eq!(
            vec![Problem::new("cache_size", "cache_size must not be negative")],
            module.problems()
        );
    }

    #[test]
    fn bad_port() {
        let mut site = TestSite::new(
            "[Squid]\nenabled = True\nlocation = squid.example.edu:http\n",
            HostRole::Other,
        );
        let mut module = Squid::new();
        site.parse(&mut module).unwrap();

        assert_eq!(1, module.problems().len());
    }

    #[test]
    fn port_zero_is_rejected() {
        let mut site = TestSite::new(
            "[Squid]\nenabled = True\nlocation = squid.example.edu:0\n",
            HostRole::Other,
        );
        let mut module = Squid::new();
        site.parse(&mut module).unwrap();

        assert_eq!(
            vec![Problem::new("location", "Invalid location squid.example.edu:0, use host[:port]")],
            module.problems()
        );
    }

    #[test]
    fn disabled_squid_publishes_nothing() {
        let mut site = TestSite::new("[Squid]\nenabled = False\nlocation = squid:3128\n", HostRole::Other);

        site.parse(&mut Squid::new()).unwrap();

        assert!(site.attributes.is_empty());
    }
}
