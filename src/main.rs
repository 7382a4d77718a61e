//! Configure a grid computing site from INI configuration fragments
//!
//! ## Configuration
//!
//! osg-configure reads all `*.ini` files of its configuration directory in
//! lexicographic order, later files overriding earlier ones option by option.
//! Each section configures one part of the site:
//!
//! ```ini
//! [Site Information]
//! group = OSG
//! resource = EXAMPLE_CE
//! host_name = ce.example.edu
//!
//! [Condor]
//! enabled = True
//!
//! [Subcluster Main]
//! name = Main
//! node_count = 10
//! ```
//!
//! Every section accepts `enabled = True`, `False` or `ignore`. Ignored
//! sections are neither verified nor configured.
//!
//! ## Usage
//!
//! ```text
//! osg-configure (--configure | --verify | --list-modules | --enabled-services) [OPTIONS]
//!
//! OPTIONS:
//!     -d, --configuration-directory <DIR>    [default: /etc/osg/config.d]
//!     -m, --module <NAME>                    Only verify and configure this module
//!         --attributes-file <PATH>           [default: /var/lib/osg/osg-attributes.conf]
//!         --log-file <PATH>                  Additionally log everything to this file
//!         --root <DIR>                       Treat DIR as the root of the host file system
//!         --force-ce / --not-ce              Override the detected host role
//!     -v, --verbose                          Output information while running
//! ```
//!
//! ## Exit codes
//!
//! * `0`: success
//! * `1`: invalid settings or a failed configuration step
//! * `2`: I/O or application error
//!
//! ## Ordering
//!
//! Sections are parsed and verified in a fixed order starting with
//! `Site Information`. Configuring follows the dependencies between the
//! modules: batch systems after `Site Information`, `CE` after the batch
//! systems and `Info Services` after `CE`.

mod cli_parser;
mod config;
mod configure;
mod driver;
mod logging;
mod util;

use std::path::Path;
use std::path::PathBuf;
use std::process;

use clap::ArgMatches;
use log::{error, info};

use crate::config::option::HostRole;
use crate::config::{Configuration, Error};
use crate::configure::HostLayout;
use crate::driver::{Driver, Verdict};
use crate::util::commands;

fn main() {
    let arguments = cli_parser::parse_arguments();

    let log_file = arguments
        .get_one::<String>(cli_parser::FLAG_LOG_FILE)
        .map(PathBuf::from);
    if let Err(e) = logging::initialise(
        arguments.get_count(cli_parser::FLAG_VERBOSE),
        log_file.as_deref(),
    ) {
        eprintln!("{e}");
        process::exit(e.exit_code());
    }

    let code = match run(&arguments) {
        Ok(verdict) => verdict.exit_code(),
        Err(e) => {
            error!("osg-configure failed: {}", e);
            e.exit_code()
        }
    };
    process::exit(code);
}

fn run(arguments: &ArgMatches) -> Result<Verdict, Error> {
    let layout = HostLayout::new(
        Path::new(string_argument(arguments, cli_parser::FLAG_ROOT)?),
        Path::new(string_argument(arguments, cli_parser::FLAG_ATTRIBUTES_FILE)?),
    );

    if arguments.get_flag(cli_parser::FLAG_LIST_MODULES) {
        let driver = Driver::new(Configuration::default(), HostRole::Other, layout);
        for line in driver.list_modules() {
            println!("{line}");
        }
        return Ok(Verdict::Success);
    }

    let role = if arguments.get_flag(cli_parser::FLAG_FORCE_CE) {
        HostRole::Ce
    } else if arguments.get_flag(cli_parser::FLAG_NOT_CE) {
        HostRole::Other
    } else {
        commands::probe_host_role()
    };

    let directory = Path::new(string_argument(arguments, cli_parser::FLAG_CONFIG_DIR)?);
    info!("Configuration is at {}", directory.display());
    let mut driver = Driver::load(directory, role, layout)?;

    if arguments.get_flag(cli_parser::FLAG_ENABLED_SERVICES) {
        for service in driver.enabled_services()? {
            println!("{service}");
        }
        return Ok(Verdict::Success);
    }

    let modules: Vec<String> = arguments
        .get_many::<String>(cli_parser::FLAG_MODULE)
        .map(|names| names.cloned().collect())
        .unwrap_or_default();

    let verdict = if arguments.get_flag(cli_parser::FLAG_VERIFY) {
        driver.verify(&modules)?
    } else {
        driver.run_configure(&modules)?
    };
    match verdict {
        Verdict::Success => info!("Finished successfully"),
        Verdict::Failed => error!("Invalid settings or failed configuration step, see the messages above"),
    }
    Ok(verdict)
}

fn string_argument<'a>(arguments: &'a ArgMatches, name: &str) -> Result<&'a str, Error> {
    arguments
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| Error::Application(format!("Missing value for --{name}")))
}
