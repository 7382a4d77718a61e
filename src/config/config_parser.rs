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

//! Discover, validate and merge the configuration fragments of a directory

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use log::{debug, error, info};

use crate::config::{Configuration, Error, Fragment, IniDocument, SettingError};
use crate::util::validation;

/// Sections describing a batch system the CE submits to
pub const JOBMANAGER_SECTIONS: [&str; 6] = ["PBS", "Condor", "SGE", "LSF", "SLURM", "Bosco"];

/// Read and merge all fragments found in `dir`
///
/// Only visible files ending in `.ini` are considered. They are merged in
/// ascending order of their file names. Every fragment must pass
/// [valid_ini_file](validation::valid_ini_file) before anything is merged.
pub fn read_config_files(dir: &Path) -> Result<Configuration, Error> {
    let files = list_fragments(dir)?;
    if files.is_empty() {
        error!("No configuration files found in {}", dir.display());
        return Err(Error::Setting(SettingError::new(format!(
            "No configuration files found in {}",
            dir.display()
        ))));
    }

    info!(
        "Using configuration files: {}",
        files
            .iter()
            .map(|f| f.display().to_string())
            .collect::<Vec<String>>()
            .join(" ")
    );

    for file in &files {
        if !validation::valid_ini_file(file) {
            error!("There are errors in {}", file.display());
            return Err(Error::Setting(SettingError::new(format!(
                "Invalid INI file: {}",
                file.display()
            ))));
        }
    }

    let mut fragments = Vec::with_capacity(files.len());
    for file in files {
        let content = fs::read_to_string(&file)
            .map_err(|e| Error::io(file.display().to_string(), e))?;
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file.display().to_string());
        let document = parse_ini(&content).map_err(|mut e| {
            e.message = format!("{}: {}", name, e.message);
            Error::Setting(e)
        })?;
        debug!("Read {} sections from {}", document.sections.len(), name);
        fragments.push(Fragment { name, document });
    }

    Ok(Configuration::from_fragments(fragments))
}

/// List the fragments of a directory in merge order
pub fn list_fragments(dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let content = fs::read_dir(dir).map_err(|e| {
        error!("Failed to get directory content of {}: {}", dir.display(), e);
        Error::io(dir.display().to_string(), e)
    })?;

    let mut result = Vec::new();
    for entry in content {
        let entry = entry.map_err(|e| Error::io(dir.display().to_string(), e))?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || !name.ends_with(".ini") || !path.is_file() {
            continue;
        }
        result.push(path);
    }
    result.sort_unstable();
    Ok(result)
}

/// Parse the text of a single INI document
///
/// Lines beginning with whitespace continue the value of the previous
/// option. Option names are stored lowercase.
pub fn parse_ini(content: &str) -> Result<IniDocument, SettingError> {
    let mut document = IniDocument::default();
    let mut current_section: Option<String> = None;
    let mut last_option: Option<String> = None;

    for (number, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim_end_matches('\r');
        let trimmed = line.trim();

        if trimmed.is_empty() {
            last_option = None;
            continue;
        }
        if trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            match (&current_section, &last_option) {
                (Some(section), Some(option)) => {
                    let options = document.section_entry(section);
                    if let Some(value) = options.get_mut(option) {
                        value.push('\n');
                        value.push_str(trimmed);
                    }
                    continue;
                }
                _ => {
                    return Err(SettingError::new(format!(
                        "Line {} is indented but continues no option",
                        number + 1
                    )))
                }
            }
        }

        if trimmed.starts_with('[') {
            if !trimmed.ends_with(']') || trimmed.len() < 3 {
                return Err(SettingError::new(format!(
                    "Line {} is not a valid section header: {}",
                    number + 1,
                    trimmed
                )));
            }
            let name = trimmed[1..trimmed.len() - 1].trim().to_owned();
            document.section_entry(&name);
            current_section = Some(name);
            last_option = None;
            continue;
        }

        let section = match &current_section {
            Some(section) => section.clone(),
            None => {
                return Err(SettingError::new(format!(
                    "Line {} appears before any section header",
                    number + 1
                )))
            }
        };

        let (key, value) = split_option(trimmed).ok_or_else(|| {
            SettingError::new(format!(
                "Line {} is not of the form 'option = value': {}",
                number + 1,
                trimmed
            ))
        })?;
        document.section_entry(&section).insert(key.clone(), value);
        last_option = Some(key);
    }

    Ok(document)
}

/// Split `key = value` or `key: value` at the first delimiter
fn split_option(line: &str) -> Option<(String, String)> {
    let position = line.find(['=', ':'])?;
    let key = line[..position].trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_lowercase(), line[position + 1..].trim().to_owned()))
}

/// True if any batch system section is present and enabled
pub fn jobmanager_enabled(config: &Configuration) -> bool {
    JOBMANAGER_SECTIONS.iter().any(|section| {
        config.has_section(section)
            && config
                .get(section, "enabled")
                .ok()
                .flatten()
                .and_then(|v| validation::parse_boolean(&v))
                .unwrap_or(false)
    })
}
