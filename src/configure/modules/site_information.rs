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

//! Identity of the site: name, group, contact and location

use std::collections::BTreeMap;

use log::warn;

use crate::config::option::{ConfigOption, OptionType, Requiredness, Value};
use crate::config::SettingError;
use crate::configure::modules::{module_base, skip_unless_enabled};
use crate::configure::{Module, ModuleBase, ParseContext, Problem, RunContext, SectionStatus};
use crate::util::validation;

pub const SECTION: &str = "Site Information";

const GROUPS: [&str; 2] = ["OSG", "OSG-ITB"];

pub struct SiteInformation {
    base: ModuleBase,
}

impl SiteInformation {
    pub fn new() -> SiteInformation {
        let on_ce = Requiredness::MandatoryOnCe;
        SiteInformation {
            base: ModuleBase::new(
                SECTION,
                vec![
                    ConfigOption::string("group")
                        .required(Requiredness::Mandatory)
                        .with_default(Value::String("OSG".to_owned()))
                        .mapped_to("OSG_GROUP"),
                    ConfigOption::string("host_name").required(on_ce).mapped_to("OSG_HOSTNAME"),
                    ConfigOption::string("site_name").mapped_to("OSG_SITE_NAME"),
                    ConfigOption::string("resource").required(on_ce),
                    ConfigOption::string("resource_group")
                        .required(on_ce)
                        .mapped_to("OSG_RESOURCE_GROUP"),
                    ConfigOption::string("sponsor").required(on_ce).mapped_to("OSG_SPONSOR"),
                    ConfigOption::string("site_policy").mapped_to("OSG_SITE_INFO"),
                    ConfigOption::string("contact").required(on_ce).mapped_to("OSG_CONTACT_NAME"),
                    ConfigOption::string("email").required(on_ce).mapped_to("OSG_CONTACT_EMAIL"),
                    ConfigOption::string("city").required(on_ce).mapped_to("OSG_SITE_CITY"),
                    ConfigOption::string("country").required(on_ce).mapped_to("OSG_SITE_COUNTRY"),
                    ConfigOption::new("longitude", OptionType::Float, on_ce)
                        .mapped_to("OSG_SITE_LONGITUDE"),
                    ConfigOption::new("latitude", OptionType::Float, on_ce)
                        .mapped_to("OSG_SITE_LATITUDE"),
                ],
            ),
        }
    }

    /// Name the site is published under, `resource` over `site_name`
    pub fn resource_name(&self) -> &str {
        match self.base.str("resource") {
            "" => self.base.str("site_name"),
            resource => resource,
        }
    }

    pub fn problems(&self, ctx: &RunContext) -> Vec<Problem> {
        let mut problems = Vec::new();

        let group = self.base.str("group");
        if !GROUPS.contains(&group) {
            problems.push(Problem::new(
                "group",
                "The group setting must be either OSG or OSG-ITB",
            ));
        }

        let host_name = self.base.str("host_name");
        if !host_name.is_empty() {
            if !validation::valid_domain(host_name, false) {
                problems.push(Problem::new(
                    "host_name",
                    format!("Invalid hostname: {host_name}"),
                ));
            } else if ctx.role.is_ce() && !validation::valid_domain(host_name, true) {
                warn!("Host name {} does not resolve", host_name);
            }
        }

        if let Some(latitude) = self.base.value("latitude").and_then(Value::as_float) {
            if !(-90.0..=90.0).contains(&latitude) {
                problems.push(Problem::new(
                    "latitude",
                    format!("Latitude must be between -90 and 90, got {latitude:?}"),
                ));
            }
        }
        if let Some(longitude) = self.base.value("longitude").and_then(Value::as_float) {
            if !(-180.0..=180.0).contains(&longitude) {
                problems.push(Problem::new(
                    "longitude",
                    format!("Longitude must be between -180 and 180, got {longitude:?}"),
                ));
            }
        }

        let email = self.base.str("email");
        if !email.is_empty() && !validation::valid_email(email) {
            problems.push(Problem::new("email", format!("Invalid email address: {email}")));
        }

        let sponsor = self.base.str("sponsor");
        if !sponsor.is_empty() {
            if let Err(message) = check_sponsor(sponsor) {
                problems.push(Problem::new("sponsor", message));
            }
        }

        if ctx.role.is_ce() && self.resource_name().is_empty() {
            problems.push(Problem::new("resource", "No resource name given"));
        }
        problems
    }
}

impl Default for SiteInformation {
    fn default() -> SiteInformation {
        SiteInformation::new()
    }
}

/// Validate a sponsor list such as `atlas:60 cms:40`
///
/// A single VO needs no percentage, with several they have to add up to 100.
fn check_sponsor(sponsor: &str) -> Result<(), String> {
    let entries: Vec<&str> = sponsor
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|e| !e.is_empty())
        .collect();

    let mut total: u64 = 0;
    for entry in &entries {
        let (vo, percent) = match entry.split_once(':') {
            Some((vo, percent)) => (vo, Some(percent)),
            None => (*entry, None),
        };
        if vo != "local" && !validation::valid_vo_name(vo) {
            return Err(format!("Invalid VO name in sponsor: {vo}"));
        }
        match percent {
            Some(percent) => match percent.parse::<u64>() {
                Ok(percent) if percent > 100 => {
                    return Err(format!("Percentage for {vo} must be at most 100, got {percent}"))
                }
                Ok(percent) => total += percent,
                Err(_) => return Err(format!("Invalid percentage for {vo}: {percent}")),
            },
            None if entries.len() == 1 => total = 100,
            None => return Err(format!("Missing percentage for sponsor {vo}")),
        }
    }

    if total != 100 {
        return Err(format!("Sponsor percentages must add up to 100, got {total}"));
    }
    Ok(())
}

impl Module for SiteInformation {
    module_base!();

    fn module_name(&self) -> &'static str {
        "siteinformation"
    }

    fn set_status(&mut self, ctx: &ParseContext) -> Result<bool, SettingError> {
        self.base.status = SectionStatus::read_or(ctx.config, SECTION, SectionStatus::Enabled)?;
        Ok(self.base.enabled())
    }

    fn check(&self, ctx: &RunContext) -> bool {
        skip_unless_enabled!(self, true);
        self.base.report_problems(ctx.config, &self.problems(ctx))
    }

    fn get_attributes(&self) -> BTreeMap<String, String> {
        let mut attributes = self.base.get_attributes_with(Value::to_string);
        let name = self.resource_name();
        if !name.is_empty() {
            attributes.insert("OSG_SITE_NAME".to_owned(), name.to_owned());
        }
        attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::option::HostRole;
    use crate::configure::modules::testing::TestSite;

    const VALID: &str = "[Site Information]
group = OSG
host_name = ce.example.edu
resource = EXAMPLE_CE
resource_group = EXAMPLE
sponsor = atlas:60 cms:40
site_policy =
contact = Jane Admin
email = admin@example.edu
city = Madison
country = US
longitude = -89.4
latitude = 43.07
";

    #[test]
    fn valid_site_passes() {
        let mut site = TestSite::new(VALID, HostRole::Other);
        let mut module = SiteInformation::new();

        assert!(site.parse(&mut module).unwrap());

        assert!(module.problems(&site.ctx()).is_empty());
        assert!(module.check(&site.ctx()));
    }

    #[test]
    fn resource_wins_over_site_name() {
        let text = format!("{VALID}site_name = OLD_NAME\n");
        let mut site = TestSite::new(&text, HostRole::Other);
        let mut module = SiteInformation::new();

        site.parse(&mut module).unwrap();

        assert_eq!(Some("EXAMPLE_CE"), site.attributes.get("OSG_SITE_NAME"));
        assert_eq!(Some("43.07"), site.attributes.get("OSG_SITE_LATITUDE"));
        assert_eq!(Some("OSG"), site.attributes.get("OSG_GROUP"));
    }

    #[test]
    fn bad_group_is_reported() {
        let text = VALID.replace("group = OSG", "group = Bogus");
        let mut site = TestSite::new(&text, HostRole::Other);
        let mut module = SiteInformation::new();
        site.parse(&mut module).unwrap();

        let problems = module.problems(&site.ctx());

        assert_eq!(
            vec![Problem::new("group", "The group setting must be either OSG or OSG-ITB")],
            problems
        );
        assert!(!module.check(&site.ctx()));
    }

    #[test]
    fn latitude_out_of_range() {
        let text = VALID.replace("latitude = 43.07", "latitude = 100");
        let mut site = TestSite::new(&text, HostRole::Other);
        let mut module = SiteInformation::new();
        site.parse(&mut module).unwrap();

        let problems = module.problems(&site.ctx());

        assert_eq!(1, problems.len());
        assert_eq!("Latitude must be between -90 and 90, got 100.0", problems[0].message);
    }

    #[test]
    fn missing_mandatory_on_ce() {
        let text = VALID.replace("contact = Jane Admin\n", "");
        let mut site = TestSite::new(&text, HostRole::Ce);

        let error = site.parse(&mut SiteInformation::new()).unwrap_err();

        assert_eq!(Some("contact".to_owned()), error.option);
    }

    #[test]
    fn explicitly_disabled_publishes_nothing() {
        let text = format!("{VALID}enabled = False\n");
        let mut site = TestSite::new(&text, HostRole::Other);

        assert!(!site.parse(&mut SiteInformation::new()).unwrap());
        assert!(site.attributes.is_empty());
    }

    #[test]
    fn sponsor_lists() {
        assert!(check_sponsor("osg").is_ok());
        assert!(check_sponsor("atlas:50, cms:50").is_ok());
        assert!(check_sponsor("local:100").is_ok());
        assert!(check_sponsor("atlas:50 cms:40").is_err());
        assert!(check_sponsor("atlas cms").is_err());
        assert!(check_sponsor("atlas:lots").is_err());
        assert!(check_sponsor("atlas:4294967295 cms:101").is_err());
        assert!(check_sponsor("atlas:101 cms:-1").is_err());
        assert_eq!(
            Err("Sponsor percentages must add up to 100, got 150".to_owned()),
            check_sponsor("atlas:100 cms:50")
        );
    }
}
