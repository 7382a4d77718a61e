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

//! Pieces shared by the batch system modules

use std::path::Path;

use log::info;

use crate::config::Error;
use crate::configure::modules::site_information;
use crate::configure::{ModuleBase, Problem, RunContext};
use crate::util::atomic_file;
use crate::util::atomic_file::Ownership;
use crate::util::editing;
use crate::util::validation;

/// Configuration of the job submission layer used by the CE
pub const BLAH_CONFIG: &str = "/etc/blah.config";

pub fn configure_after() -> Vec<&'static str> {
    vec![site_information::SECTION]
}

/// Report `option` unless it names an existing directory
///
/// Only enforced on a CE, elsewhere the batch client may live on another host.
pub fn check_directory(base: &ModuleBase, ctx: &RunContext, option: &str) -> Option<Problem> {
    let path = base.str(option);
    if path.is_empty() || !ctx.role.is_ce() {
        return None;
    }
    let host_path = ctx.layout.path(path);
    if validation::valid_directory(&host_path.to_string_lossy()) {
        None
    } else {
        Some(Problem::new(option, format!("Directory {path} does not exist")))
    }
}

/// Like [check_directory] for a regular file
pub fn check_file(base: &ModuleBase, ctx: &RunContext, option: &str) -> Option<Problem> {
    let path = base.str(option);
    if path.is_empty() || !ctx.role.is_ce() {
        return None;
    }
    let host_path = ctx.layout.path(path);
    if validation::valid_file(&host_path.to_string_lossy()) {
        None
    } else {
        Some(Problem::new(option, format!("File {path} does not exist")))
    }
}

/// Set shell variables in the BLAH configuration, creating it if needed
pub fn update_blah_config(ctx: &RunContext, settings: &[(&str, String)]) -> Result<bool, Error> {
    let path = ctx.layout.path(BLAH_CONFIG);
    let mut content = atomic_file::read_optional(&path)?.unwrap_or_default();
    for (key, value) in settings {
        content = editing::set_shell_variable(&content, key, value);
    }
    atomic_file::write_file(&path, content.as_bytes(), 0o644, Ownership::Preserve)?;
    info!("Updated {}", path.display());
    Ok(true)
}

/// Directory holding the binaries of an installation prefix
pub fn bin_dir(location: &str) -> String {
    Path::new(location).join("bin").display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::option::HostRole;
    use crate::configure::modules::testing::TestSite;

    #[test]
    fn blah_config_is_created_and_updated() {
        let site = TestSite::new("", HostRole::Ce);
        site.write(BLAH_CONFIG, "# BLAH\npbs_binpath=/old\n");

        let result = update_blah_config(
            &site.ctx(),
            &[("pbs_binpath", "/usr/bin".to_owned()), ("pbs_spoolpath", "/var/spool".to_owned())],
        );

        assert!(result.unwrap());
        assert_eq!(
            "# BLAH\npbs_binpath=\"/usr/bin\"\npbs_spoolpath=\"/var/spool\"\n",
            site.read(BLAH_CONFIG)
        );
    }

    #[test]
    fn bin_dir_of_prefix() {
        assert_eq!("/usr/bin", bin_dir("/usr"));
        assert_eq!("/opt/lsf/bin", bin_dir("/opt/lsf/"));
    }
}
