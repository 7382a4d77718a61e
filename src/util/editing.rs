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

//! Edit third-party configuration text in place
//!
//! All functions work on the file content. Reading and the atomic write back
//! are up to the caller.

/// Set `key = value` in a condor style configuration
///
/// The first line assigning `key` is replaced and later assignments are
/// dropped. Without an existing assignment the setting is appended.
pub fn add_or_replace_setting(text: &str, key: &str, value: &str, quote: bool) -> String {
    let setting = if quote {
        format!("{key} = \"{value}\"")
    } else {
        format!("{key} = {value}")
    };

    replace_assignment(text, key, &setting)
}

/// Set `key="value"` in a file sourced by a shell
///
/// Same replacement rules as [add_or_replace_setting], without spaces around
/// the `=` so the file stays valid shell.
pub fn set_shell_variable(text: &str, key: &str, value: &str) -> String {
    replace_assignment(text, key, &format!("{key}=\"{value}\""))
}

fn replace_assignment(text: &str, key: &str, setting: &str) -> String {
    let mut result = String::with_capacity(text.len() + setting.len() + 1);
    let mut replaced = false;
    for line in text.lines() {
        if assigns(line, key) {
            if !replaced {
                result.push_str(setting);
                result.push('\n');
                replaced = true;
            }
            continue;
        }
        result.push_str(line);
        result.push('\n');
    }

    if !replaced {
        result.push_str(setting);
        result.push('\n');
    }
    result
}

fn assigns(line: &str, key: &str) -> bool {
    let trimmed = line.trim_start();
    match trimmed.strip_prefix(key) {
        Some(rest) => rest.trim_start().starts_with('='),
        None => false,
    }
}

/// Set an XML attribute `name="value"` wherever it occurs
///
/// Returns the new text and whether the attribute was present.
pub fn set_xml_attribute(text: &str, name: &str, value: &str) -> (String, bool) {
    let needle = format!("{name}=\"");
    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    let mut found = false;

    while let Some(position) = rest.find(&needle) {
        let boundary = position == 0
            || rest[..position]
                .chars()
                .last()
                .map(char::is_whitespace)
                .unwrap_or(true);
        let value_start = position + needle.len();
        let value_end = match rest[value_start..].find('"') {
            Some(end) => value_start + end,
            None => break,
        };
        if boundary {
            result.push_str(&rest[..value_start]);
            result.push_str(value);
            found = true;
        } else {
            result.push_str(&rest[..value_end]);
        }
        result.push('"');
        rest = &rest[value_end + 1..];
    }
    result.push_str(rest);
    (result, found)
}
