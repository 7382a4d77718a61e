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

use clap::Arg;
use clap::ArgAction;
use clap::ArgGroup;
use clap::ArgMatches;
use clap::Command;

pub const FLAG_CONFIGURE: &str = "configure";
pub const FLAG_VERIFY: &str = "verify";
pub const FLAG_LIST_MODULES: &str = "list-modules";
pub const FLAG_ENABLED_SERVICES: &str = "enabled-services";
pub const FLAG_CONFIG_DIR: &str = "configuration-directory";
pub const FLAG_MODULE: &str = "module";
pub const FLAG_VERBOSE: &str = "verbose";
pub const FLAG_ATTRIBUTES_FILE: &str = "attributes-file";
pub const FLAG_LOG_FILE: &str = "log-file";
pub const FLAG_ROOT: &str = "root";
pub const FLAG_FORCE_CE: &str = "force-ce";
pub const FLAG_NOT_CE: &str = "not-ce";

pub const DEFAULT_CONFIG_DIR: &str = "/etc/osg/config.d";
pub const DEFAULT_LOG_FILE: &str = "/var/log/osg/osg-configure.log";

const VERBS: &str = "verb";

pub fn parse_arguments() -> ArgMatches {
    command().get_matches()
}

pub fn command() -> Command {
    Command::new("osg-configure")
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new(FLAG_CONFIGURE)
                .short('c')
                .long(FLAG_CONFIGURE)
                .help("Verify the configuration and configure the host")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(FLAG_VERIFY)
                .long(FLAG_VERIFY)
                .help("Only verify the configuration")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(FLAG_LIST_MODULES)
                .short('l')
                .long(FLAG_LIST_MODULES)
                .help("List all modules, * marks those configurable on their own")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(FLAG_ENABLED_SERVICES)
                .long(FLAG_ENABLED_SERVICES)
                .help("Print the services the enabled modules need")
                .action(ArgAction::SetTrue),
        )
        .group(
            ArgGroup::new(VERBS)
                .args([FLAG_CONFIGURE, FLAG_VERIFY, FLAG_LIST_MODULES, FLAG_ENABLED_SERVICES])
                .required(true),
        )
        .arg(
            Arg::new(FLAG_CONFIG_DIR)
                .short('d')
                .long(FLAG_CONFIG_DIR)
                .value_name("DIR")
                .help("Directory holding the *.ini configuration fragments")
                .default_value(DEFAULT_CONFIG_DIR),
        )
        .arg(
            Arg::new(FLAG_MODULE)
                .short('m')
                .long(FLAG_MODULE)
                .value_name("NAME")
                .help("Only verify and configure this module")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new(FLAG_ATTRIBUTES_FILE)
                .long(FLAG_ATTRIBUTES_FILE)
                .value_name("PATH")
                .help("Where to write the attributes file")
                .default_value(crate::configure::attributes::DEFAULT_ATTRIBUTES_FILE),
        )
        .arg(
            Arg::new(FLAG_LOG_FILE)
                .long(FLAG_LOG_FILE)
                .value_name("PATH")
                .help("Additionally log everything to this file"),
        )
        .arg(
            Arg::new(FLAG_ROOT)
                .long(FLAG_ROOT)
                .value_name("DIR")
                .help("Treat DIR as the root of the host file system")
                .default_value("/"),
        )
        .arg(
            Arg::new(FLAG_FORCE_CE)
                .long(FLAG_FORCE_CE)
                .help("Treat this host as a CE")
                .action(ArgAction::SetTrue)
                .conflicts_with(FLAG_NOT_CE),
        )
        .arg(
            Arg::new(FLAG_NOT_CE)
                .long(FLAG_NOT_CE)
                .help("Treat this host as not being a CE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(FLAG_VERBOSE)
                .short('v')
                .long(FLAG_VERBOSE)
                .help("Output information while running")
                .action(ArgAction::Count),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verb_is_required() {
        assert!(command().try_get_matches_from(["osg-configure"]).is_err());
        assert!(command()
            .try_get_matches_from(["osg-configure", "--verify", "--configure"])
            .is_err());
    }

    #[test]
    fn defaults() {
        let matches = command()
            .try_get_matches_from(["osg-configure", "--verify"])
            .unwrap();

        assert!(matches.get_flag(FLAG_VERIFY));
        assert_eq!(
            Some(&DEFAULT_CONFIG_DIR.to_owned()),
            matches.get_one::<String>(FLAG_CONFIG_DIR)
        );
        assert_eq!(0, matches.get_count(FLAG_VERBOSE));
        assert!(matches.get_many::<String>(FLAG_MODULE).is_none());
    }

    #[test]
    fn repeated_modules_and_verbosity() {
        let matches = command()
            .try_get_matches_from([
                "osg-configure",
                "-c",
                "-m",
                "gratia",
                "--module",
                "rsv",
                "-vv",
                "--force-ce",
            ])
            .unwrap();

        let modules: Vec<&String> = matches.get_many(FLAG_MODULE).unwrap().collect();
        assert_eq!(vec!["gratia", "rsv"], modules);
        assert_eq!(2, matches.get_count(FLAG_VERBOSE));
        assert!(matches.get_flag(FLAG_FORCE_CE));
    }

    #[test]
    fn role_overrides_conflict() {
        assert!(command()
            .try_get_matches_from(["osg-configure", "--verify", "--force-ce", "--not-ce"])
            .is_err());
    }
}
