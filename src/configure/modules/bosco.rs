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

//! Remote batch submission over SSH through Bosco

use std::collections::BTreeSet;

use log::info;

use crate::config::option::{ConfigOption, OptionType, Requiredness, Value};
use crate::config::Error;
use crate::configure::modules::batch;
use crate::configure::modules::{module_base, skip_unless_enabled};
use crate::configure::{Module, ModuleBase, Problem, RunContext};
use crate::util::atomic_file;
use crate::util::atomic_file::Ownership;
use crate::util::validation;

pub const SECTION: &str = "Bosco";

/// Remote clusters known to the CE, one line per submitting user
pub const CLUSTER_LIST: &str = "/etc/osg/bosco/clusterlist";

const BATCH_SYSTEMS: [&str; 5] = ["pbs", "lsf", "sge", "condor", "slurm"];
const INSTALL_MODES: [&str; 3] = ["always", "never", "if_needed"];

pub struct Bosco {
    base: ModuleBase,
}

impl Bosco {
    pub fn new() -> Bosco {
        let mandatory = Requiredness::Mandatory;
        Bosco {
            base: ModuleBase::new(
                SECTION,
                vec![
                    ConfigOption::string("endpoint").required(mandatory),
                    ConfigOption::string("batch").required(mandatory),
                    ConfigOption::string("users").required(mandatory),
                    ConfigOption::string("ssh_key").required(mandatory),
                    ConfigOption::new("max_jobs", OptionType::Int, Requiredness::Optional)
                        .with_default(Value::Int(1000)),
                    ConfigOption::string("install_cluster")
                        .with_default(Value::String("if_needed".to_owned())),
                ],
            ),
        }
    }

    pub fn users(&self) -> Vec<&str> {
        self.base
            .str("users")
            .split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .collect()
    }

    pub fn problems(&self, ctx: &RunContext) -> Vec<Problem> {
        let mut problems = Vec::new();

        let endpoint = self.base.str("endpoint");
        let valid_endpoint = match endpoint.split_once('@') {
            Some((user, host)) => !user.is_empty() && validation::valid_domain(host, false),
            None => false,
        };
        if !valid_endpoint {
            problems.push(Problem::new(
                "endpoint",
                format!("Endpoint must have the form user@host, got {endpoint}"),
            ));
        }

        let batch_system = self.base.str("batch");
        if !BATCH_SYSTEMS.contains(&batch_system) {
            problems.push(Problem::new(
                "batch",
                format!("Unknown batch system {batch_system}, use one of {}", BATCH_SYSTEMS.join(", ")),
            ));
        }

        let install = self.base.str("install_cluster");
        if !INSTALL_MODES.contains(&install) {
            problems.push(Problem::new(
                "install_cluster",
                format!("install_cluster must be one of {}", INSTALL_MODES.join(", ")),
            ));
        }

        if let Some(max_jobs) = self.base.int("max_jobs") {
            if max_jobs < 1 {
                problems.push(Problem::new("max_jobs", "max_jobs must be positive"));
            }
        }

        if ctx.role.is_ce() {
            for user in self.users() {
                if !validation::valid_user(user) {
                    problems.push(Problem::new("users", format!("User {user} does not exist")));
                }
            }
            let key = self.base.str("ssh_key");
            if !validation::valid_file(&ctx.layout.path(key).to_string_lossy()) {
                problems.push(Problem::new("ssh_key", format!("SSH key {key} not found")));
            }
        }
        problems
    }

    fn cluster_list(&self) -> String {
        let mut content = String::new();
        for user in self.users() {
            content.push_str(&format!(
                "{} {} {} max_jobs={}\n",
                user,
                self.base.str("endpoint"),
                self.base.str("batch"),
                self.base.int("max_jobs").unwrap_or(1000)
            ));
        }
        content
    }
}

impl Default for Bosco {
    fn default() -> Bosco {
        Bosco::new()
    }
}

impl Module for Bosco {
    module_base!();

    fn module_name(&self) -> &'static str {
        "bosco"
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
        let path = ctx.layout.path(CLUSTER_LIST);
        atomic_file::write_file(&path, self.cluster_list().as_bytes(), 0o644, Ownership::Preserve)?;
        info!("Wrote Bosco cluster list {}", path.display());
        Ok(true)
    }

    fn enabled_services(&self) -> BTreeSet<String> {
        if self.base.enabled() {
            BTreeSet::from(["condor-ce".to_owned()])
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

    const BOSCO: &str = "[Bosco]
enabled = True
endpoint = osg@hpc.example.edu
batch = slurm
users = osg, cms
ssh_key = /etc/osg/bosco/id_rsa
max_jobs = 500
";

    #[test]
    fn valid_settings_pass_off_ce() {
        let mut site = TestSite::new(BOSCO, HostRole::Other);
        let mut module = Bosco::new();
        site.parse(&mut module).unwrap();

        assert!(module.problems(&site.ctx()).is_empty());
    }

    #[test]
    fn bad_endpoint_and_batch() {
        let text = BOSCO
            .replace("osg@hpc.example.edu", "hpc.example.edu")
            .replace("batch = slurm", "batch = moab");
        let mut site = TestSite::new(&text, HostRole::Other);
        let mut module = Bosco::new();
        site.parse(&mut module).unwrap();

        assert_eq!(2, module.problems(&site.ctx()).len());
    }

    #[test]
    fn cluster_list_is_written() {
        let mut site = TestSite::new(BOSCO, HostRole::Other);
        let mut module = Bosco::new();
        site.parse(&mut module).unwrap();

        assert!(module.configure(&site.ctx()).unwrap());

        assert_eq!(
            "osg osg@hpc.example.edu slurm max_jobs=500\ncms osg@hpc.example.edu slurm max_jobs=500\n",
            site.read(CLUSTER_LIST)
        );
    }

    #[test]
    fn failed_write_is_an_error() {
        let mut site = TestSite::new(BOSCO, HostRole::Other);
        // A file where the directory should be
        site.write("/etc/osg/bosco", "not a directory");
        let mut module = Bosco::new();
        site.parse(&mut module).unwrap();

        let error = module.configure(&site.ctx()).unwrap_err();

        assert_eq!(2, error.exit_code());
    }
}
