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

//! Authorization, CRLs and service credentials

use std::collections::BTreeSet;

use log::{debug, info, warn};

use crate::config::option::{ConfigOption, OptionType, Requiredness, Value};
use crate::config::{Error, SettingError};
use crate::configure::modules::{module_base, skip_unless_enabled};
use crate::configure::service_cert;
use crate::configure::{Module, ModuleBase, ParseContext, Problem, RunContext, SectionStatus};
use crate::util::atomic_file;
use crate::util::atomic_file::Ownership;
use crate::util::commands;
use crate::util::commands::CommandOutcome;
use crate::util::validation;

pub const SECTION: &str = "Misc Services";

pub const LCMAPS_DB: &str = "/etc/lcmaps.db";
pub const GRID_MAPFILE: &str = "/etc/grid-security/grid-mapfile";
pub const FETCH_CRL: &str = "/usr/sbin/fetch-crl";
pub const HTTP_CERT: &str = "/etc/grid-security/http/httpcert.pem";
pub const HTTP_KEY: &str = "/etc/grid-security/http/httpkey.pem";

const HTTP_USER: &str = "tomcat";
const POLICY_HEADER: &str = "authorize_only:";

/// How grid identities are mapped to local accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationMethod {
    Gridmap,
    LocalGridmap,
    Vomsmap,
}

impl AuthorizationMethod {
    pub fn parse(value: &str) -> Option<AuthorizationMethod> {
        match value.trim().to_lowercase().as_str() {
            "gridmap" => Some(AuthorizationMethod::Gridmap),
            "local-gridmap" => Some(AuthorizationMethod::LocalGridmap),
            "vomsmap" => Some(AuthorizationMethod::Vomsmap),
            _ => None,
        }
    }

    /// lcmaps plugins active in the authorization policy
    fn plugins(self) -> &'static [&'static str] {
        match self {
            AuthorizationMethod::Gridmap | AuthorizationMethod::LocalGridmap => &["gridmapfile"],
            AuthorizationMethod::Vomsmap => &["vomsmapfile", "defaultmapfile"],
        }
    }
}

pub struct MiscServices {
    base: ModuleBase,
}

impl MiscServices {
    pub fn new() -> MiscServices {
        let optional = Requiredness::Optional;
        MiscServices {
            base: ModuleBase::new(
                SECTION,
                vec![
                    ConfigOption::string("authorization_method")
                        .with_default(Value::String("vomsmap".to_owned())),
                    ConfigOption::new("edit_lcmaps_db", OptionType::Bool, optional)
                        .with_default(Value::Bool(true)),
                    ConfigOption::new("copy_host_cert_for_service_certs", OptionType::Bool, optional)
                        .with_default(Value::Bool(false)),
                ],
            ),
        }
    }

    pub fn authorization_method(&self) -> Option<AuthorizationMethod> {
        AuthorizationMethod::parse(self.base.str("authorization_method"))
    }

    pub fn problems(&self, ctx: &RunContext) -> Vec<Problem> {
        let mut problems = Vec::new();
        match self.authorization_method() {
            None => problems.push(Problem::new(
                "authorization_method",
                format!(
                    "Unknown authorization method {}, use gridmap, local-gridmap or vomsmap",
                    self.base.str("authorization_method")
                ),
            )),
            Some(AuthorizationMethod::Gridmap) | Some(AuthorizationMethod::LocalGridmap) => {
                if !validation::valid_file(&ctx.layout.path(GRID_MAPFILE).to_string_lossy()) {
                    warn!("Using a grid-mapfile but {} does not exist", GRID_MAPFILE);
                }
            }
            Some(AuthorizationMethod::Vomsmap) => {}
        }
        problems
    }

    fn edit_lcmaps_db(&self, ctx: &RunContext, method: AuthorizationMethod) -> Result<bool, Error> {
        let path = ctx.layout.path(LCMAPS_DB);
        let content = match atomic_file::read_optional(&path)? {
            Some(content) => content,
            None => {
                warn!("{} not found, lcmaps is not installed", LCMAPS_DB);
                return Ok(true);
            }
        };
        match select_policy(&content, method) {
            Some(edited) => {
                atomic_file::write_file(&path, edited.as_bytes(), 0o644, Ownership::Preserve)?;
                info!("Set the lcmaps authorization policy to {:?}", method);
                Ok(true)
            }
            None => {
                self.base.report(
                    ctx.config,
                    log::Level::Error,
                    Some("edit_lcmaps_db"),
                    &format!("{LCMAPS_DB} has no {POLICY_HEADER} policy, edit it by hand or set edit_lcmaps_db to False"),
                );
                Ok(false)
            }
        }
    }

    fn fetch_crls(&self, ctx: &RunContext) {
        let program = ctx.layout.path(FETCH_CRL);
        let program = program.to_string_lossy();
        if !validation::valid_executable(&program) {
            debug!("{} not installed, not fetching CRLs", FETCH_CRL);
            return;
        }
        info!("Running fetch-crl, this may take a while");
        match commands::run_command(&[program.as_ref(), "-p", "10"], Some(commands::REMOTE_TIMEOUT)) {
            Ok(CommandOutcome::Success) => info!("CRLs updated"),
            Ok(CommandOutcome::Failed(code)) => {
                warn!("fetch-crl failed ({:?}), some CRLs may be stale", code)
            }
            Ok(CommandOutcome::TimedOut) => warn!(
                "fetch-crl did not finish within {} seconds, CRLs will be updated by the cron job",
                commands::REMOTE_TIMEOUT.as_secs()
            ),
            Err(e) => warn!("Could not run fetch-crl: {}", e),
        }
    }
}

impl Default for MiscServices {
    fn default() -> MiscServices {
        MiscServices::new()
    }
}

/// Activate the plugins of `method` in the `authorize_only` policy
///
/// Policy lines (`plugin -> good | bad`) following the header are commented
/// out unless they belong to the method. Returns `None` without a header.
pub fn select_policy(content: &str, method: AuthorizationMethod) -> Option<String> {
    let mut result = String::with_capacity(content.len());
    let mut found = false;
    let mut in_policy = false;

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed == POLICY_HEADER {
            found = true;
            in_policy = true;
            result.push_str(line);
            result.push('\n');
            continue;
        }
        if in_policy && (trimmed.is_empty() || (trimmed.ends_with(':') && !trimmed.starts_with('#'))) {
            in_policy = false;
        }

        let rule = trimmed.trim_start_matches('#').trim();
        if in_policy && rule.contains("->") {
            let plugin = rule.split_whitespace().next().unwrap_or("");
            if method.plugins().contains(&plugin) {
                result.push_str(rule);
            } else {
                result.push('#');
                result.push_str(rule);
            }
        } else {
            result.push_str(line);
        }
        result.push('\n');
    }

    if found {
        Some(result)
    } else {
        None
    }
}

impl Module for MiscServices {
    module_base!();

    fn module_name(&self) -> &'static str {
        "misc"
    }

    fn separately_configurable(&self) -> bool {
        true
    }

    /// A present section is enabled unless disabled explicitly
    fn set_status(&mut self, ctx: &ParseContext) -> Result<bool, SettingError> {
        self.base.status = SectionStatus::read_or(ctx.config, SECTION, SectionStatus::Enabled)?;
        Ok(self.base.enabled())
    }

    fn check(&self, ctx: &RunContext) -> bool {
        skip_unless_enabled!(self, true);
        self.base.report_problems(ctx.config, &self.problems(ctx))
    }

    fn configure(&self, ctx: &RunContext) -> Result<bool, Error> {
        skip_unless_enabled!(self, Ok(true));
        let method = match self.authorization_method() {
            Some(method) => method,
            None => {
                return Err(Error::Application(format!(
                    "Unknown authorization method {}",
                    self.base.str("authorization_method")
                )))
            }
        };

        if self.base.bool("edit_lcmaps_db") && !self.edit_lcmaps_db(ctx, method)? {
            return Ok(false);
        }

        if self.base.bool("copy_host_cert_for_service_certs")
            && !service_cert::create_service_credentials(
                &ctx.layout.path(service_cert::HOST_CERT),
                &ctx.layout.path(service_cert::HOST_KEY),
                &ctx.layout.path(HTTP_CERT),
                &ctx.layout.path(HTTP_KEY),
                HTTP_USER,
            )?
        {
            return Ok(false);
        }

        self.fetch_crls(ctx);
        Ok(true)
    }

    fn enabled_services(&self) -> BTreeSet<String> {
        if self.base.enabled() {
            BTreeSet::from(["fetch-crl-boot".to_owned(), "fetch-crl-cron".to_owned()])
        } else {
            BTreeSet::new()
        }
    }
}
