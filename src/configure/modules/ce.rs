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

//! The compute element itself: HTCondor-CE in front of the batch systems

use std::collections::BTreeSet;

use log::info;

use crate::config::config_parser::JOBMANAGER_SECTIONS;
use crate::config::{Error, SettingError};
use crate::configure::modules::{module_base, site_information, skip_unless_enabled};
use crate::configure::{Module, ModuleBase, ParseContext, Problem, RunContext, SectionStatus};
use crate::util::atomic_file;
use crate::util::atomic_file::Ownership;
use crate::util::editing;

pub const SECTION: &str = "CE";

/// Settings HTCondor-CE reads on top of its own configuration
pub const CE_CONFIG: &str = "/etc/condor-ce/config.d/50-osg-configure.conf";

const HEADER: &str = "# Generated by osg-configure, local changes are overwritten\n";

pub struct Ce {
    base: ModuleBase,
}

impl Ce {
    pub fn new() -> Ce {
        Ce {
            base: ModuleBase::new(SECTION, vec![]),
        }
    }

    pub fn problems(&self, ctx: &RunContext) -> Vec<Problem> {
        let mut problems = Vec::new();
        if enabled_batch_systems(ctx).is_empty() {
            problems.push(Problem::general(format!(
                "No batch system is enabled, enable one of {}",
                JOBMANAGER_SECTIONS.join(", ")
            )));
        }
        if !ctx.site.is_enabled(site_information::SECTION) {
            problems.push(Problem::general(
                "A Site Information section is required on a CE",
            ));
        }
        problems
    }
}

impl Default for Ce {
    fn default() -> Ce {
        Ce::new()
    }
}

/// Lowercase names of the enabled batch system sections, in registration order
pub fn enabled_batch_systems(ctx: &RunContext) -> Vec<String> {
    JOBMANAGER_SECTIONS
        .iter()
        .filter(|section| ctx.site.is_enabled(section))
        .map(|section| section.to_lowercase())
        .collect()
}

/// Set `key = value` in the CE configuration file
pub fn update_ce_config(ctx: &RunContext, key: &str, value: &str) -> Result<(), Error> {
    let path = ctx.layout.path(CE_CONFIG);
    let content = atomic_file::read_optional(&path)?.unwrap_or_else(|| HEADER.to_owned());
    let content = editing::add_or_replace_setting(&content, key, value, false);
    atomic_file::write_file(&path, content.as_bytes(), 0o644, Ownership::Preserve)
}

impl Module for Ce {
    module_base!();

    fn module_name(&self) -> &'static str {
        "ce"
    }

    fn configure_after(&self) -> Vec<&'static str> {
        JOBMANAGER_SECTIONS.to_vec()
    }

    /// Enabled on a CE unless disabled explicitly
    fn set_status(&mut self, ctx: &ParseContext) -> Result<bool, SettingError> {
        let implied = if ctx.role.is_ce() {
            SectionStatus::Enabled
        } else {
            SectionStatus::Disabled
        };
        self.base.status = if ctx.config.has_section(SECTION) {
            SectionStatus::read_or(ctx.config, SECTION, implied)?
        } else {
            implied
        };
        Ok(self.base.enabled())
    }

    fn check(&self, ctx: &RunContext) -> bool {
        skip_unless_enabled!(self, true);
        self.base.report_problems(ctx.config, &self.problems(ctx))
    }

    fn configure(&self, ctx: &RunContext) -> Result<bool, Error> {
        skip_unless_enabled!(self, Ok(true));
        let batch_systems = enabled_batch_systems(ctx).join(", ");
        update_ce_config(ctx, "OSG_BATCH_SYSTEMS", &batch_systems)?;
        info!("Job router batch systems: {}", batch_systems);
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
