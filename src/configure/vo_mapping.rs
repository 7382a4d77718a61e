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

//! Derive the VOs a site supports from its VOMS map files
//!
//! A mapfile line maps a quoted FQAN pattern to a local account:
//!
//! ```text
//! "/atlas/Role=production/Capability=NULL" usatlas1
//! ```
//!
//! Patterns listed in the ban file are dropped, as are mappings to accounts
//! missing on this host. The VO of a pattern is its first path component.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Once;

use log::{debug, warn};

use crate::configure::HostLayout;
use crate::util::validation;

pub const VOMS_MAPFILE: &str = "/etc/grid-security/voms-mapfile";
pub const VOMS_MAPFILE_DEFAULT: &str = "/usr/share/osg/voms-mapfile-default";
pub const BAN_MAPFILE: &str = "/etc/grid-security/ban-voms-mapfile";

static MISSING_BAN_FILE: Once = Once::new();

/// A single `(pattern, user)` mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoMapping {
    pub pattern: String,
    pub user: String,
}

impl VoMapping {
    /// Lowercase first path component of the pattern
    pub fn vo(&self) -> Option<String> {
        let rest = self.pattern.strip_prefix('/')?;
        let vo = rest.split('/').next()?;
        if vo.is_empty() {
            None
        } else {
            Some(vo.to_lowercase())
        }
    }
}

/// Reader for the map and ban files of a host
#[derive(Debug, Clone)]
pub struct VoMapResolver {
    pub map_files: Vec<PathBuf>,

    pub ban_file: PathBuf,
}

impl VoMapResolver {
    pub fn new(layout: &HostLayout) -> VoMapResolver {
        VoMapResolver {
            map_files: vec![layout.path(VOMS_MAPFILE), layout.path(VOMS_MAPFILE_DEFAULT)],
            ban_file: layout.path(BAN_MAPFILE),
        }
    }

    /// VOs with at least one usable mapping on this host
    pub fn get_allowed_vos(&self) -> BTreeSet<String> {
        self.allowed_vos_with(validation::valid_user)
    }

    /// Like [get_allowed_vos](Self::get_allowed_vos) with a custom user lookup
    pub fn allowed_vos_with<F>(&self, user_exists: F) -> BTreeSet<String>
    where
        F: Fn(&str) -> bool,
    {
        let result: BTreeSet<String> = self
            .mappings()
            .into_iter()
            .filter(|m| user_exists(&m.user))
            .filter_map(|m| m.vo())
            .collect();
        debug!("Allowed VOs from mapfiles: {:?}", result);
        result
    }

    /// All mappings not matching a ban pattern
    pub fn mappings(&self) -> Vec<VoMapping> {
        let bans = self.ban_patterns();
        self.map_files
            .iter()
            .filter_map(|path| match fs::read_to_string(path) {
                Ok(content) => Some(content),
                Err(e) => {
                    debug!("Skipping mapfile {}: {}", path.display(), e);
                    None
                }
            })
            .flat_map(|content| parse_mapfile(&content))
            .filter(|m| !bans.iter().any(|ban| glob_match(ban, &m.pattern)))
            .collect()
    }

    fn ban_patterns(&self) -> Vec<String> {
        match fs::read_to_string(&self.ban_file) {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .filter_map(|l| first_quoted(l).map(|(pattern, _)| pattern))
                .collect(),
            Err(_) => {
                MISSING_BAN_FILE.call_once(|| {
                    warn!(
                        "Ban mapfile {} not found, no VOs are banned",
                        self.ban_file.display()
                    )
                });
                Vec::new()
            }
        }
    }
}

/// Parse mapfile lines, skipping comments and malformed lines
pub fn parse_mapfile(content: &str) -> Vec<VoMapping> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| {
            let (pattern, rest) = first_quoted(l)?;
            let user = rest.split_whitespace().next()?;
            Some(VoMapping {
                pattern,
                user: user.to_owned(),
            })
        })
        .collect()
}

/// Split a line into its leading quoted string and the remainder
fn first_quoted(line: &str) -> Option<(String, &str)> {
    let rest = line.strip_prefix('"')?;
    let end = rest.find('"')?;
    Some((rest[..end].to_owned(), &rest[end + 1..]))
}

/// Match `text` against a pattern where `*` matches any sequence
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }

    let mut rest = match text.strip_prefix(parts[0]) {
        Some(rest) => rest,
        None => return false,
    };
    let last = parts[parts.len() - 1];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(position) => rest = &rest[position + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}
