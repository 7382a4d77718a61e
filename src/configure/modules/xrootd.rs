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

//! XRootD data server or redirector
//!
//! Only validated, the service is configured by its own tools.

use std::collections::BTreeSet;

use crate::config::option::{ConfigOption, Value};
use crate::configure::modules::{module_base, skip_unless_enabled};
use crate::configure::{Module, ModuleBase, Problem, RunContext};
use crate::util::validation;

pub const SECTION: &str = "Xrootd";

const MODES: [&str; 2] = ["data", "redirector"];

pub struct Xrootd {
    base: ModuleBase,
}

impl Xrootd {
    pub fn new() -> Xrootd {
        Xrootd {
            base: ModuleBase::new(
                SECTION,
                vec![
                    ConfigOption::string("mode").with_default(Value::String("data".to_owned())),
                    ConfigOption::string("redirector_host"),
                    ConfigOption::string("redirector_storage_path")
                        .with_default(Value::String("/mnt/xrootd".to_owned())),
                ],
            ),
        }
    }

    pub fn problems(&self) -> Vec<Problem> {
        let mut problems = Vec::new();

        let mode = self.base.str("mode");
        if !MODES.contains(&mode) {
            problems.push(Problem::new(
                "mode",
                format!("Unknown mode {mode}, use data or redirector"),
            ));
        }

        let host = self.base.str("redirector_host");
        if mode == "data" && host.is_empty() {
            problems.push(Problem::new("redirector_host", "A data server needs a redirector_host"));
        } else if !host.is_empty() && !validation::valid_domain(host, false) {
            problems.push(Problem::new("redirector_host", format!("Invalid host name {host}")));
        }

        if !self.base.str("redirector_storage_path").starts_with('/') {
            problems.push(Problem::new(
                "redirector_storage_path",
                "redirector_storage_path must be an absolute path",
            ));
        }
        problems
    }
}

impl Default for Xrootd {
    fn default() -> Xrootd {
        Xrootd::new()
    }
}

impl Module for Xrootd {
    module_base!();

    fn module_name(&self) -> &'static str {
        "xrootd"
    }

    fn check(&self, ctx: &RunContext) -> bool {
        skip_unless_enabled!(self, true);
        self.base.report_problems(ctx.config, &self.problems())
    }

    fn enabled_services(&self) -> BTreeSet<String> {
        if self.base.enabled() {
            BTreeSet::from(["cmsd".to_owned(), "xrootd".to_owned()])
        } else {
            BTreeSet::new()
        }
    }
}
