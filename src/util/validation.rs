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

//! Predicates over configuration values
//!
//! None of the functions fail. Problems found while checking files are logged.

use std::fs;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;
use std::net::ToSocketAddrs;
use std::path::Path;

use log::{error, warn};
use nix::unistd::access;
use nix::unistd::AccessFlags;
use nix::unistd::User;

use crate::config::Configuration;

/// True if the value stands for "not configured"
pub fn is_blank(value: &str) -> bool {
    let value = value.trim();
    value.is_empty()
        || value.eq_ignore_ascii_case("UNAVAILABLE")
        || value.eq_ignore_ascii_case("DEFAULT")
        || value == "None"
}

/// Interpret the boolean spellings accepted in configuration files
pub fn parse_boolean(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Some(true),
        "0" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

/// Host name, IPv4 literal or bracketed IPv6 literal
///
/// With `resolve` the name must also be resolvable.
pub fn valid_domain(host: &str, resolve: bool) -> bool {
    let host = host.trim();
    if host.is_empty() {
        return false;
    }

    if let Some(inner) = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        return inner.parse::<Ipv6Addr>().is_ok();
    }

    if host.parse::<Ipv4Addr>().is_err() && !valid_hostname(host) {
        return false;
    }

    if resolve {
        match (host, 0).to_socket_addrs() {
            Ok(mut addresses) => addresses.next().is_some(),
            Err(e) => {
                warn!("Could not resolve {}: {}", host, e);
                false
            }
        }
    } else {
        true
    }
}

/// `host[:port]` with a valid host and a port between 1 and 65535
pub fn valid_location(location: &str) -> bool {
    let location = location.trim();
    let (host, port) = match location.rsplit_once(':') {
        Some((host, port)) if !location.ends_with(']') => (host, Some(port)),
        _ => (location, None),
    };
    let port_valid = match port {
        Some(port) => matches!(port.parse::<u16>(), Ok(p) if p > 0),
        None => true,
    };
    port_valid && valid_domain(host, false)
}

/// Optional sign followed by decimal digits
pub fn valid_integer(value: &str) -> bool {
    let value = value.trim();
    let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// True if the option is set and spells a boolean
pub fn valid_boolean(config: &Configuration, section: &str, option: &str) -> bool {
    matches!(
        config.get(section, option),
        Ok(Some(value)) if parse_boolean(&value).is_some()
    )
}

fn valid_hostname(host: &str) -> bool {
    if host.len() > 253 {
        return false;
    }
    let labels: Vec<&str> = host.split('.').collect();
    let labels_valid = labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });
    let top_level_numeric = labels
        .last()
        .map(|l| l.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(true);
    labels_valid && !top_level_numeric
}

pub fn valid_email(address: &str) -> bool {
    let mut parts = address.trim().split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => (local, domain),
        _ => return false,
    };
    let local_valid = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-._+".contains(c));
    let domain_valid = domain.contains('.')
        && domain.split('.').all(|label| {
            !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        });
    local_valid && domain_valid
}

/// True if the account exists in the local user database
pub fn valid_user(name: &str) -> bool {
    matches!(User::from_name(name.trim()), Ok(Some(_)))
}

pub fn valid_file(path: &str) -> bool {
    Path::new(path).is_file()
}

pub fn valid_directory(path: &str) -> bool {
    Path::new(path).is_dir()
}

pub fn valid_executable(path: &str) -> bool {
    valid_file(path) && access(Path::new(path), AccessFlags::X_OK).is_ok()
}

pub fn valid_vo_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// Check a user to VO map file
///
/// Returns whether the file is well formed and the offending lines.
pub fn valid_user_vo_file(path: &str) -> (bool, Vec<String>) {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!("Could not read {}: {}", path, e);
            return (false, Vec::new());
        }
    };

    let invalid: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            fields.len() != 2
                || !fields[0]
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
                || !valid_vo_name(fields[1])
        })
        .map(str::to_owned)
        .collect();

    (invalid.is_empty(), invalid)
}

/// Syntactic check of a configuration fragment
///
/// Besides the INI grammar, indented lines are rejected: they would silently
/// continue the previous value, which is almost never what the operator meant.
pub fn valid_ini_file(path: &Path) -> bool {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!("Could not read {}: {}", path.display(), e);
            return false;
        }
    };

    let mut valid = true;
    let mut in_section = false;
    for (number, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim_end_matches('\r');
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            error!(
                "{}: line {} begins with whitespace, options must start at the beginning of a line",
                path.display(),
                number + 1
            );
            valid = false;
        } else if trimmed.starts_with('[') {
            if !trimmed.ends_with(']') || trimmed.len() < 3 {
                error!(
                    "{}: line {} is not a valid section header",
                    path.display(),
                    number + 1
                );
                valid = false;
            }
            in_section = true;
        } else if !in_section {
            error!(
                "{}: line {} appears before any section header",
                path.display(),
                number + 1
            );
            valid = false;
        } else if trimmed
            .find(['=', ':'])
            .map(|p| trimmed[..p].trim().is_empty())
            .unwrap_or(true)
        {
            error!(
                "{}: line {} is not of the form 'option = value'",
                path.display(),
                number + 1
            );
            valid = false;
        }
    }
    valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn domains() {
        assert!(valid_domain("ce.example.org", false));
        assert!(valid_domain("localhost", false));
        assert!(valid_domain("192.168.1.10", false));
        assert!(valid_domain("[::1]", false));
        assert!(valid_domain("[2001:db8::1]", false));
        assert!(!valid_domain("", false));
        assert!(!valid_domain("-bad.example.org", false));
        assert!(!valid_domain("bad..example.org", false));
        assert!(!valid_domain("1.2.3.999", false));
        assert!(!valid_domain("host_name.example.org", false));
        assert!(!valid_domain("[not-ipv6]", false));
        assert!(!valid_domain(&"a".repeat(64), false));
    }

    #[test]
    fn locations() {
        assert!(valid_location("squid.example.org"));
        assert!(valid_location("squid.example.org:3128"));
        assert!(valid_location("10.0.0.1:65535"));
        assert!(valid_location("[::1]"));
        assert!(valid_location("[::1]:9619"));
        assert!(!valid_location("squid.example.org:0"));
        assert!(!valid_location("squid.example.org:65536"));
        assert!(!valid_location("squid.example.org:http"));
        assert!(!valid_location("squid.example.org:"));
        assert!(!valid_location(":3128"));
        assert!(!valid_location("bad_host:3128"));
    }

    #[test]
    fn integers() {
        assert!(valid_integer("42"));
        assert!(valid_integer(" -7 "));
        assert!(valid_integer("+3"));
        assert!(valid_integer("99999999999999999999"));
        assert!(!valid_integer(""));
        assert!(!valid_integer("-"));
        assert!(!valid_integer("4.5"));
        assert!(!valid_integer("0x10"));
    }

    #[test]
    fn boolean_options() {
        let config = crate::configure::tests::config_from(&[(
            "00.ini",
            "[Squid]\nenabled = Yes\nlocation = squid\nswitch = %(enabled)s\n",
        )]);

        assert!(valid_boolean(&config, "Squid", "enabled"));
        assert!(valid_boolean(&config, "Squid", "switch"));
        assert!(!valid_boolean(&config, "Squid", "location"));
        assert!(!valid_boolean(&config, "Squid", "missing"));
        assert!(!valid_boolean(&config, "Nowhere", "enabled"));
    }

    #[test]
    fn emails() {
        assert!(valid_email("admin@example.org"));
        assert!(valid_email("first.last+osg@mail.example.org"));
        assert!(!valid_email("admin"));
        assert!(!valid_email("admin@localhost"));
        assert!(!valid_email("a@b@example.org"));
        assert!(!valid_email("@example.org"));
    }

    #[test]
    fn blanks() {
        assert!(is_blank(""));
        assert!(is_blank("  "));
        assert!(is_blank("UNAVAILABLE"));
        assert!(is_blank("Default"));
        assert!(is_blank("None"));
        assert!(!is_blank("none of this"));
        assert!(!is_blank("OSG"));
    }

    #[test]
    fn booleans() {
        assert_eq!(Some(true), parse_boolean("True"));
        assert_eq!(Some(false), parse_boolean("off"));
        assert_eq!(None, parse_boolean("ignore"));
    }

    #[test]
    fn vo_names() {
        assert!(valid_vo_name("osg"));
        assert!(valid_vo_name("fermilab-test_1.0"));
        assert!(!valid_vo_name(""));
        assert!(!valid_vo_name("bad vo"));
    }

    #[test]
    fn root_is_valid_user() {
        assert!(valid_user("root"));
        assert!(!valid_user("no-such-user-for-osg-configure"));
    }

    #[test]
    fn executables() {
        assert!(valid_executable("/bin/sh"));
        assert!(!valid_executable("/etc/passwd"));
        assert!(valid_directory("/etc"));
        assert!(!valid_file("/etc"));
    }

    #[test]
    fn user_vo_file() {
        let file = write_temp("# comment\n\nusatlas1 atlas\ncmsuser cms\nbroken\ntoo many fields\n");

        let (valid, invalid) = valid_user_vo_file(file.path().to_str().unwrap());

        assert!(!valid);
        assert_eq!(vec!["broken".to_owned(), "too many fields".to_owned()], invalid);
    }

    #[test]
    fn ini_files() {
        let good = write_temp("; comment\n[Squid]\nenabled = true\nlocation: squid:3128\n");
        let indented = write_temp("[Squid]\nenabled = true\n    location = squid:3128\n");
        let headless = write_temp("enabled = true\n");
        let no_delimiter = write_temp("[Squid]\nenabled\n");

        assert!(valid_ini_file(good.path()));
        assert!(!valid_ini_file(indented.path()));
        assert!(!valid_ini_file(headless.path()));
        assert!(!valid_ini_file(no_delimiter.path()));
        assert!(!valid_ini_file(Path::new("/nonexistent/osg/00.ini")));
    }

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }
}
