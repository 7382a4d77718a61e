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

//! Typed option descriptors
//!
//! A module declares every option it understands as a [ConfigOption]. The
//! descriptor knows how to read itself from a [Configuration] section, coerces
//! the raw text to its declared [OptionType], and optionally names the
//! attribute it publishes its value under.

use std::fmt::Display;
use std::fmt::Error as FmtError;
use std::fmt::Formatter;

use crate::config::{Configuration, SettingError};
use crate::util::validation;

/// Declared type of an option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionType {
    String,
    Int,
    Float,
    Bool,
}

/// A resolved option value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Renders floats with a fractional part, `100.0` stays `100.0`
impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> Result<(), FmtError> {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// When an option has to be present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requiredness {
    Mandatory,

    Optional,

    /// Mandatory only on hosts acting as a CE
    MandatoryOnCe,
}

/// Role of the host being configured, probed once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostRole {
    Ce,
    Other,
}

impl HostRole {
    pub fn is_ce(self) -> bool {
        self == HostRole::Ce
    }
}

/// Descriptor of a single option
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigOption {
    pub name: String,

    pub option_type: OptionType,

    pub default: Option<Value>,

    pub required: Requiredness,

    /// Attribute the resolved value is published under
    pub mapping: Option<String>,

    pub value: Option<Value>,
}

impl ConfigOption {
    pub fn new(name: &str, option_type: OptionType, required: Requiredness) -> ConfigOption {
        ConfigOption {
            name: name.to_owned(),
            option_type,
            default: None,
            required,
            mapping: None,
            value: None,
        }
    }

    /// Optional string option with an empty default
    pub fn string(name: &str) -> ConfigOption {
        ConfigOption::new(name, OptionType::String, Requiredness::Optional)
            .with_default(Value::String(String::new()))
    }

    pub fn with_default(mut self, default: Value) -> ConfigOption {
        self.default = Some(default);
        self
    }

    pub fn required(mut self, required: Requiredness) -> ConfigOption {
        self.required = required;
        self
    }

    pub fn mapped_to(mut self, mapping: &str) -> ConfigOption {
        self.mapping = Some(mapping.to_owned());
        self
    }

    pub fn is_mappable(&self) -> bool {
        self.mapping.as_ref().map(|m| !m.is_empty()).unwrap_or(false)
    }

    /// Coerce a raw string to the declared type and store it
    pub fn set_value(&mut self, raw: &str, section: &str) -> Result<(), SettingError> {
        let raw = raw.trim();
        let value = match self.option_type {
            OptionType::String => Some(Value::String(raw.to_owned())),
            OptionType::Int => raw.parse::<i64>().ok().map(Value::Int),
            OptionType::Float => raw.parse::<f64>().ok().map(Value::Float),
            OptionType::Bool => validation::parse_boolean(raw).map(Value::Bool),
        };

        match value {
            Some(value) => {
                self.value = Some(value);
                Ok(())
            }
            None => Err(SettingError::for_option(
                format!(
                    "Value '{}' is not a valid {}",
                    raw,
                    match self.option_type {
                        OptionType::String => "string",
                        OptionType::Int => "integer",
                        OptionType::Float => "number",
                        OptionType::Bool => "boolean",
                    }
                ),
                section,
                &self.name,
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        self.value.as_ref().and_then(Value::as_str).unwrap_or("")
    }

    pub fn as_bool(&self) -> bool {
        self.value.as_ref().and_then(Value::as_bool).unwrap_or(false)
    }
}

/// Resolve the value of `option` from `section`
///
/// A missing option, or one holding a blank sentinel, is an error if the
/// option is required for `role`. Otherwise it takes its default.
pub fn get_option(
    config: &Configuration,
    section: &str,
    option: &mut ConfigOption,
    role: HostRole,
) -> Result<(), SettingError> {
    let raw = config.get(section, &option.name)?;

    match raw {
        Some(raw) if !validation::is_blank(&raw) => option.set_value(&raw, section),
        _ => {
            let required = match option.required {
                Requiredness::Mandatory => true,
                Requiredness::MandatoryOnCe => role.is_ce(),
                Requiredness::Optional => false,
            };
            if required {
                return Err(SettingError::for_option(
                    format!("Can't get value for mandatory setting {}", option.name),
                    section,
                    &option.name,
                ));
            }
            option.value = option.default.clone();
            Ok(())
        }
    }
}
