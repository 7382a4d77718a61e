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

//! Port ranges for services behind a firewall

use std::path::Path;

use crate::config::option::ConfigOption;
use crate::config::SettingError;
use crate::configure::modules::{module_base, skip_unless_enabled};
use crate::configure::{Module, ModuleBase, ParseContext, Problem, RunContext, SectionStatus};

pub const SECTION: &str = "Network";

pub struct Network {
    base: ModuleBase,
}

impl Network {
    pub fn new() -> Network {
        Network {
            base: ModuleBase::new(
                SECTION,
                vec![
                    ConfigOption::string("port_range").mapped_to("GLOBUS_TCP_PORT_RANGE"),
                    ConfigOption::string("source_range").mapped_to("GLOBUS_TCP_SOURCE_RANGE"),
                    ConfigOption::string("port_state_file")
                        .mapped_to("GLOBUS_TCP_PORT_RANGE_STATE_FILE"),
                    ConfigOption::string("source_state_file")
                        .mapped_to("GLOBUS_TCP_SOURCE_RANGE_STATE_FILE"),
                ],
            ),
        }
    }

    pub fn problems(&self, ctx: &RunContext) -> Vec<Problem> {
        let mut problems = Vec::new();
        for (range, state_file) in [
            ("port_range", "port_state_file"),
            ("source_range", "source_state_file"),
        ] {
            let value = self.base.str(range);
            if !value.is_empty() && parse_range(value).is_none() {
                problems.push(Problem::new(
                    range,
                    format!("Invalid range {value}, use low,high with 0 < low <= high < 65536"),
                ));
            }

            let file = self.base.str(state_file);
            if file.is_empty() {
                continue;
            }
            if value.is_empty() {
                problems.push(Problem::new(
                    state_file,
                    format!("{state_file} is set without {range}"),
                ));
            }
            let parent = Path::new(file).parent().map(|p| p.display().to_string());
            match parent {
                Some(parent) if ctx.layout.path(&parent).is_dir() => {}
                _ => problems.push(Problem::new(
                    state_file,
                    format!("Directory of {file} does not exist"),
                )),
            }
        }
        problems
    }
}

impl Default for Network {
    fn default() -> Network {
        Network::new()
    }
}

/// Parse `low,high` (also `low high`) into a valid port range
fn parse_range(value: &str) -> Option<(u16, u16)> {
    let mut parts = value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty());
    let low = parts.next()?.parse::<u16>().ok()?;
    let high = parts.next()?.parse::<u16>().ok()?;
    if parts.next().is_some() || low == 0 || low > high {
        return None;
    }
    Some((low, high))
}

impl Module for Network {
    module_base!();

    fn module_name(&self) -> &'static str {
        "network"
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
}
