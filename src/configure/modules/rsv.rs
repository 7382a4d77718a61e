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

//! RSV service probes run against the site's own endpoints

use std::collections::BTreeSet;

use log::info;

use crate::config::option::{ConfigOption, OptionType, Requiredness, Value};
use crate::config::Error;
use crate::configure::modules::{module_base, skip_unless_enabled};
use crate::configure::service_cert;
use crate::configure::{Module, ModuleBase, Problem, RunContext};
use crate::util::atomic_file;
use crate::util::atomic_file::Ownership;
use crate::util::editing;
use crate::util::validation;

pub const SECTION: &str = "RSV";

pub const RSV_CONFIG: &str = "/etc/rsv/rsv.conf";

const HOST_LISTS: [&str; 3] = ["ce_hosts", "gridftp_hosts", "srm_hosts"];

pub struct Rsv {
    base: ModuleBase,
}

impl Rsv {
    pub fn new() -> Rsv {
        let optional = Requiredness::Optional;
        Rsv {
            base: ModuleBase::new(
                SECTION,
                vec![
                    ConfigOption::string("ce_hosts"),
                    ConfigOption::string("gridftp_hosts"),
                    ConfigOption::string("srm_hosts"),
                    ConfigOption::string("rsv_user").with_default(Value::String("rsv".to_owned())),
                    ConfigOption::new("use_service_cert", OptionType::Bool, optional)
                        .with_default(Value::Bool(true)),
                    ConfigOption::string("rsv_cert_file")
                        .with_default(Value::String("/etc/grid-security/rsv/rsvcert.pem".to_owned())),
                    ConfigOption::string("rsv_key_file")
                        .with_default(Value::String("/etc/grid-security/rsv/rsvkey.pem".to_owned())),
                    ConfigOption::new("enable_local_probes", OptionType::Bool, optional)
                        .with_default(Value::Bool(true)),
                ],
            ),
        }
    }

    /// Entries of a comma separated host list
    pub fn hosts(&self, option: &str) -> Vec<&str> {
        self.base
            .str(option)
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .collect()
    }

    pub fn problems(&self, ctx: &RunContext) -> Vec<Problem> {
        let mut problems = Vec::new();
        for option in HOST_LISTS {
            for entry in self.hosts(option) {
                let host = entry.split(':').next().unwrap_or("");
                if !validation::valid_domain(host, false) {
                    problems.push(Problem::new(option, format!("Invalid host name {entry}")));
                }
            }
        }

        let user = self.base.str("rsv_user");
        if ctx.role.is_ce() && !validation::valid_user(user) {
            problems.push(Problem::new("rsv_user", format!("User {user} does not exist")));
        }
        problems
    }

    fn rsv_config(&self, content: &str) -> String {
        let mut content = content.to_owned();
        for option in HOST_LISTS {
            let key = option.replace('_', "-");
            content = editing::add_or_replace_setting(&content, &key, &self.hosts(option).join(","), false);
        }
        for (key, value) in [
            ("service-cert", self.base.str("rsv_cert_file")),
            ("service-key", self.base.str("rsv_key_file")),
        ] {
            content = editing::add_or_replace_setting(&content, key, value, false);
        }
        editing::add_or_replace_setting(
            &content,
            "enable-local-probes",
            &self.base.bool("enable_local_probes").to_string(),
            false,
        )
    }
}

impl Default for Rsv {
    fn default() -> Rsv {
        Rsv::new()
    }
}

impl Module for Rsv {
    module_base!();

    fn module_name(&self) -> &'static str {
        "rsv"
    }

    fn separately_configurable(&self) -> bool {
        true
    }

    fn check(&self, ctx: &RunContext) -> bool {
        skip_unless_enabled!(self, true);
        self.base.report_problems(ctx.config, &self.problems(ctx))
    }

    fn configure(&self, ctx: &RunContext) -> Result<bool, Error> {
        skip_unless_enabled!(self, Ok(true));
        if self.base.bool("use_service_cert")
            && !service_cert::create_service_credentials(
                &ctx.layout.path(service_cert::HOST_CERT),
                &ctx.layout.path(service_cert::HOST_KEY),
                &ctx.layout.path(self.base.str("rsv_cert_file")),
                &ctx.layout.path(self.base.str("rsv_key_file")),
                self.base.str("rsv_user"),
            )?
        {
            return Ok(false);
        }

        let path = ctx.layout.path(RSV_CONFIG);
        let content = atomic_file::read_optional(&path)?.unwrap_or_default();
        atomic_file::write_file(&path, self.rsv_config(&content).as_bytes(), 0o644, Ownership::Preserve)?;
        info!("Updated {}", path.display());
        Ok(true)
    }

    fn enabled_services(&self) -> BTreeSet<String> {
        if self.base.enabled() {
            BTreeSet::from(["condor-cron".to_owned(), "rsv".to_owned()])
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
    fn host_lists_are_validated() {
        let mut site = TestSite::new(
            "[RSV]\nenabled = True\nce_hosts = ce1.example.edu, ce2.example.edu:9619\nsrm_hosts = bad host\n",
            HostRole::Other,
        );
        let mut module = Rsv::new();
        site.parse(&mut module).unwrap();

        let problems = module.problems(&site.ctx());

        assert_eq!(vec![Problem::new("srm_hosts", "Invalid host name bad host")], problems);
    }

    #[test]
    fn configure_writes_hosts() {
        let mut site = TestSite::new(
            "[RSV]\nenabled = True\nce_hosts = ce1.example.edu, ce2.example.edu\nuse_service_cert = False\n",
            HostRole::Other,
        );
        site.write(RSV_CONFIG, "ce-hosts = old.example.edu\n");
        let mut module = Rsv::new();
        site.parse(&mut module).unwrap();

        assert!(module.configure(&site.ctx()).unwrap());

        let content = site.read(RSV_CONFIG);
        assert!(content.starts_with("ce-hosts = ce1.example.edu,ce2.example.edu\n"));
        assert!(content.contains("enable-local-probes = true\n"));
    }

    #[test]
    fn service_cert_needs_host_credential() {
        let mut site = TestSite::new("[RSV]\nenabled = True\n", HostRole::Other);
        let mut module = Rsv::new();
        site.parse(&mut module).unwrap();

        assert!(!module.configure(&site.ctx()).unwrap());
        assert!(!site.layout.path(RSV_CONFIG).exists());
    }
}
