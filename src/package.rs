use std::fmt::{Display, Formatter};
use std::str::FromStr;
use crate::report::{ReportDescriptor, TimestampError};

const PACKAGE_NAME_PREFIX: &str = "vulnerability-report";

/// Name and version of one package in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageCoordinate {
    pub name: String,
    pub version: String,
}

impl Display for PackageCoordinate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}@{}", self.name, self.version))
    }
}

/// How package names are derived from a report.
///
/// Field values are joined with `-` as-is, so `a-b` + `c` and `a` + `b-c`
/// produce the same name.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum NamingScheme {
    /// `vulnerability-report-{namespace}-{kind}-{name}`
    #[default]
    Basic,

    /// `vulnerability-report-{namespace}-{kind}-{name}-{container}-{YYYYMMDDHHMM}`
    Detailed,
}

impl FromStr for NamingScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "detailed" => Ok(Self::Detailed),
            _ => Err(s.to_string()),
        }
    }
}

impl NamingScheme {
    pub fn name(&self, descriptor: &ReportDescriptor) -> Result<String, TimestampError> {
        let mut parts = vec![
            PACKAGE_NAME_PREFIX.to_string(),
            descriptor.namespace.clone(),
            descriptor.resource_kind.clone(),
            descriptor.resource_name.clone(),
        ];

        if let Self::Detailed = self {
            parts.push(descriptor.container_name.clone());
            parts.push(descriptor.created_at()?.format("%Y%m%d%H%M").to_string());
        }

        Ok(parts.join("-"))
    }
}
