//! Normalized directory user record.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Directory attributes requested for every user lookup.
pub const USER_ATTRIBUTES: &[&str] = &[
    "uid",
    "mail",
    "cn",
    "sn",
    "title",
    "manager",
    "rhatCostCenter",
    "rhatCostCenterDesc",
    "rhatLocation",
    "rhatJobCode",
    "rhatUUID",
    "rhatHireDate",
    "rhatTermDate",
    "rhatAdjSvcDate",
];

/// One directory entry mapped onto flat fields.
///
/// Every field is an empty string when the entry lacks the attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Login name (`uid`)
    pub uid: String,
    /// Primary email address (`mail`)
    pub email: String,
    /// Display name (`cn`)
    pub display_name: String,
    /// Surname (`sn`)
    pub surname: String,
    /// Job title (`title`)
    pub title: String,
    /// Manager entry DN (`manager`)
    pub manager: String,
    /// Cost center code (`rhatCostCenter`)
    pub cost_center: String,
    /// Cost center description (`rhatCostCenterDesc`)
    pub cost_center_desc: String,
    /// Work location (`rhatLocation`)
    pub location: String,
    /// Job code (`rhatJobCode`)
    pub job_code: String,
    /// Directory-wide unique id (`rhatUUID`)
    pub uuid: String,
    /// Hire date, LDAP generalized time (`rhatHireDate`)
    pub hire_date: String,
    /// Termination date, LDAP generalized time (`rhatTermDate`)
    pub term_date: String,
    /// Adjusted service date, LDAP generalized time (`rhatAdjSvcDate`)
    pub adjusted_service_date: String,
}

impl UserRecord {
    /// Builds a record from an attribute lookup returning the first value of each attribute.
    pub fn from_attributes<'a, F>(attribute: F) -> Self
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let value = |name: &str| attribute(name).unwrap_or_default().to_string();
        Self {
            uid: value("uid"),
            email: value("mail"),
            display_name: value("cn"),
            surname: value("sn"),
            title: value("title"),
            manager: value("manager"),
            cost_center: value("rhatCostCenter"),
            cost_center_desc: value("rhatCostCenterDesc"),
            location: value("rhatLocation"),
            job_code: value("rhatJobCode"),
            uuid: value("rhatUUID"),
            hire_date: value("rhatHireDate"),
            term_date: value("rhatTermDate"),
            adjusted_service_date: value("rhatAdjSvcDate"),
        }
    }

    /// Returns true if the entry carries a termination date.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        !self.term_date.is_empty()
    }

    /// Returns the manager's login name taken from the leading `uid=` component of the manager DN.
    #[must_use]
    pub fn manager_uid(&self) -> Option<&str> {
        let first = self.manager.split(',').next()?.trim();
        let (attribute, value) = first.split_once('=')?;
        if attribute.trim().eq_ignore_ascii_case("uid") && !value.trim().is_empty() {
            Some(value.trim())
        } else {
            None
        }
    }

    /// Parsed hire date.
    #[must_use]
    pub fn hired_at(&self) -> Option<DateTime<Utc>> {
        parse_generalized_time(&self.hire_date)
    }

    /// Parsed termination date.
    #[must_use]
    pub fn terminated_at(&self) -> Option<DateTime<Utc>> {
        parse_generalized_time(&self.term_date)
    }

    /// Parsed adjusted service date.
    #[must_use]
    pub fn adjusted_service_at(&self) -> Option<DateTime<Utc>> {
        parse_generalized_time(&self.adjusted_service_date)
    }
}

/// Parses LDAP generalized time in its `YYYYMMDDHHMMSSZ` form.
#[must_use]
pub fn parse_generalized_time(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), "%Y%m%d%H%M%SZ")
        .ok()
        .map(|naive| naive.and_utc())
}
