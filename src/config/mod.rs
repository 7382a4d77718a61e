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

//! Read the INI configuration fragments of a site.
//!
//! The configuration directory holds any number of fragments. They are merged
//! in lexicographic order of their file names into one [Configuration], where
//! later fragments override earlier ones option by option. Each fragment is
//! kept around so that the origin of any option can be reported to the
//! operator.

pub mod config_parser;
pub mod option;

use std::collections::BTreeMap;
use std::fmt::Display;
use std::fmt::Error as FmtError;
use std::fmt::Formatter;
use std::io;

/// Name of the section providing defaults to every other section
pub const DEFAULT_SECTION: &str = "DEFAULT";

/// Maximum nesting of `%(name)s` references
const MAX_INTERPOLATION_DEPTH: usize = 10;

/// Malformed or missing configuration input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingError {
    pub message: String,
    pub section: Option<String>,
    pub option: Option<String>,
}

impl SettingError {
    pub fn new(message: impl Into<String>) -> SettingError {
        SettingError {
            message: message.into(),
            section: None,
            option: None,
        }
    }

    pub fn for_option(message: impl Into<String>, section: &str, option: &str) -> SettingError {
        SettingError {
            message: message.into(),
            section: Some(section.to_owned()),
            option: Some(option.to_owned()),
        }
    }
}

impl Display for SettingError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), FmtError> {
        match (&self.section, &self.option) {
            (Some(section), Some(option)) => {
                write!(f, "[{section}] {option}: {}", self.message)
            }
            (Some(section), None) => write!(f, "[{section}]: {}", self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

/// Errors ending a run
#[derive(Debug)]
pub enum Error {
    /// The configuration is unusable
    Setting(SettingError),

    /// Reading or writing a file failed
    Io { path: String, error: io::Error },

    /// The environment prevents the run from completing
    Application(String),
}

impl Error {
    pub fn io(path: impl Into<String>, error: io::Error) -> Error {
        Error::Io {
            path: path.into(),
            error,
        }
    }

    /// Process exit code reported for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Setting(_) => 1,
            Error::Io { .. } | Error::Application(_) => 2,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> Result<(), FmtError> {
        match self {
            Error::Setting(e) => write!(f, "Setting error: {e}"),
            Error::Io { path, error } => write!(f, "Could not access {path}: {error}"),
            Error::Application(message) => write!(f, "Application error: {message}"),
        }
    }
}

impl From<SettingError> for Error {
    fn from(error: SettingError) -> Self {
        Error::Setting(error)
    }
}

/// A named group of options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub options: BTreeMap<String, String>,
}

/// Parsed content of one or more INI documents
///
/// Sections keep the order in which they first appeared. Option names are
/// lowercase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    pub defaults: BTreeMap<String, String>,
    pub sections: Vec<Section>,
}

impl IniDocument {
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Get the section to write into, appending it if needed
    pub fn section_entry(&mut self, name: &str) -> &mut BTreeMap<String, String> {
        if name == DEFAULT_SECTION {
            return &mut self.defaults;
        }
        let index = match self.sections.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                self.sections.push(Section {
                    name: name.to_owned(),
                    options: BTreeMap::new(),
                });
                self.sections.len() - 1
            }
        };
        &mut self.sections[index].options
    }

    /// Overlay `other` on top of this document, option by option
    pub fn merge(&mut self, other: &IniDocument) {
        for (key, value) in &other.defaults {
            self.defaults.insert(key.to_owned(), value.to_owned());
        }
        for section in &other.sections {
            let target = self.section_entry(&section.name);
            for (key, value) in &section.options {
                target.insert(key.to_owned(), value.to_owned());
            }
        }
    }

    fn defines(&self, section: &str, option: &str) -> bool {
        let option = option.to_lowercase();
        if section == DEFAULT_SECTION {
            return self.defaults.contains_key(&option);
        }
        self.section(section)
            .map(|s| s.options.contains_key(&option))
            .unwrap_or(false)
    }
}

/// A single configuration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// File name without directory
    pub name: String,

    pub document: IniDocument,
}

/// Merged configuration of all fragments
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    merged: IniDocument,

    fragments: Vec<Fragment>,
}

impl Configuration {
    /// Merge the fragments in the given order
    pub fn from_fragments(fragments: Vec<Fragment>) -> Configuration {
        let mut merged = IniDocument::default();
        for fragment in &fragments {
            merged.merge(&fragment.document);
        }
        Configuration { merged, fragments }
    }

    /// Names of the merged fragments in merge order
    pub fn fragment_names(&self) -> Vec<&str> {
        self.fragments.iter().map(|f| f.name.as_str()).collect()
    }

    /// All section names except the defaults, in order of appearance
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.merged.sections.iter().map(|s| s.name.as_str())
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.merged.section(section).is_some()
    }

    /// True if the section or the defaults define the option
    pub fn has_option(&self, section: &str, option: &str) -> bool {
        let option = option.to_lowercase();
        match self.merged.section(section) {
            Some(s) => s.options.contains_key(&option) || self.merged.defaults.contains_key(&option),
            None => false,
        }
    }

    pub fn defaults(&self) -> &BTreeMap<String, String> {
        &self.merged.defaults
    }

    /// Option names of a section including those inherited from the defaults
    pub fn options(&self, section: &str) -> Vec<String> {
        let mut result: Vec<String> = self.merged.defaults.keys().cloned().collect();
        if let Some(s) = self.merged.section(section) {
            for key in s.options.keys() {
                if !self.merged.defaults.contains_key(key) {
                    result.push(key.to_owned());
                }
            }
        }
        result.sort_unstable();
        result
    }

    /// Option names set in the section itself
    pub fn own_options(&self, section: &str) -> Vec<String> {
        self.merged
            .section(section)
            .map(|s| s.options.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Value of an option without `%(name)s` expansion
    pub fn get_raw(&self, section: &str, option: &str) -> Option<&str> {
        let option = option.to_lowercase();
        let s = self.merged.section(section)?;
        s.options
            .get(&option)
            .or_else(|| self.merged.defaults.get(&option))
            .map(String::as_str)
    }

    /// Value of an option with references to other options expanded
    pub fn get(&self, section: &str, option: &str) -> Result<Option<String>, SettingError> {
        match self.get_raw(section, option) {
            None => Ok(None),
            Some(raw) => self.interpolate(section, option, raw, 0).map(Some),
        }
    }

    /// Fragment which set the option last
    ///
    /// Fragments are searched in reverse merge order, so the fragment whose
    /// value is effective is returned. Options inherited from the defaults are
    /// not attributed to a fragment.
    pub fn get_option_location(&self, option: &str, section: &str) -> Option<&str> {
        self.fragments
            .iter()
            .rev()
            .find(|f| f.document.defines(section, option))
            .map(|f| f.name.as_str())
    }

    /// Configuration restricted to the sections accepted by `filter`
    pub fn filter_sections<F>(&self, filter: F) -> Configuration
    where
        F: Fn(&str) -> bool,
    {
        let restrict = |document: &IniDocument| IniDocument {
            defaults: document.defaults.clone(),
            sections: document
                .sections
                .iter()
                .filter(|s| filter(&s.name))
                .cloned()
                .collect(),
        };
        Configuration {
            merged: restrict(&self.merged),
            fragments: self
                .fragments
                .iter()
                .map(|f| Fragment {
                    name: f.name.clone(),
                    document: restrict(&f.document),
                })
                .collect(),
        }
    }

    fn interpolate(
        &self,
        section: &str,
        option: &str,
        raw: &str,
        depth: usize,
    ) -> Result<String, SettingError> {
        if depth > MAX_INTERPOLATION_DEPTH {
            return Err(SettingError::for_option(
                "Value references itself too deeply",
                section,
                option,
            ));
        }

        let mut result = String::with_capacity(raw.len());
        let mut rest = raw;
        while let Some(position) = rest.find('%') {
            result.push_str(&rest[..position]);
            rest = &rest[position + 1..];
            if let Some(stripped) = rest.strip_prefix('%') {
                result.push('%');
                rest = stripped;
            } else if let Some(stripped) = rest.strip_prefix('(') {
                let end = stripped.find(")s").ok_or_else(|| {
                    SettingError::for_option(
                        format!("Bad interpolation syntax in '{raw}'"),
                        section,
                        option,
                    )
                })?;
                let reference = stripped[..end].to_lowercase();
                let value = self.get_raw(section, &reference).ok_or_else(|| {
                    SettingError::for_option(
                        format!("Value references unknown option '{reference}'"),
                        section,
                        option,
                    )
                })?;
                result.push_str(&self.interpolate(section, &reference, value, depth + 1)?);
                rest = &stripped[end + 2..];
            } else {
                return Err(SettingError::for_option(
                    format!("'%' must be followed by '%' or '(' in '{raw}'"),
                    section,
                    option,
                ));
            }
        }
        result.push_str(rest);
        Ok(result)
    }
}
