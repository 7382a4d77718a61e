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

//! Arbitrary attributes defined by the site administrator

use std::collections::BTreeMap;

use crate::config::SettingError;
use crate::configure::modules::module_base;
use crate::configure::{Module, ModuleBase, ParseContext, SectionStatus};

pub const SECTION: &str = "Local Settings";

/// Publishes every option of its section, under its uppercased name
pub struct LocalSettings {
    base: ModuleBase,

    settings: BTreeMap<String, String>,
}

impl LocalSettings {
    pub fn new() -> LocalSettings {
        LocalSettings {
            base: ModuleBase::new(SECTION, vec![]),
            settings: BTreeMap::new(),
        }
    }
}

impl Default for LocalSettings {
    fn default() -> LocalSettings {
        LocalSettings::new()
    }
}

impl Module for LocalSettings {
    module_base!();

    fn module_name(&self) -> &'static str {
        "localsettings"
    }

    /// A present section is enabled unless disabled explicitly
    fn set_status(&mut self, ctx: &ParseContext) -> Result<bool, SettingError> {
        self.base.status = SectionStatus::read_or(ctx.config, SECTION, SectionStatus::Enabled)?;
        Ok(self.base.enabled())
    }

    fn parse(&mut self, ctx: &ParseContext) -> Result<(), SettingError> {
        self.settings.clear();
        for option in ctx.config.own_options(SECTION) {
            if option == "enabled" {
                continue;
            }
            let value = ctx.config.get(SECTION, &option)?.unwrap_or_default();
            self.settings.insert(option.to_uppercase(), value);
        }
        Ok(())
    }

    fn get_attributes(&self) -> BTreeMap<String, String> {
        self.settings.clone()
    }
}
