use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::geo::{Coordinate, Locatable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Verified,
    Rejected,
}

impl ReportStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Verified => "verified",
            ReportStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReportStatus::Pending),
            "verified" => Ok(ReportStatus::Verified),
            "rejected" => Ok(ReportStatus::Rejected),
            other => Err(format!("unknown report status: {other}")),
        }
    }
}

impl ToSql for ReportStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ReportStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

impl ToSql for UserRole {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for UserRole {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisasterReport {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub coordinates: Option<Coordinate>,
    pub image_url: String,
    pub status: ReportStatus,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub upvotes: i64,
    pub remarks: Option<String>,
}

impl Locatable for DisasterReport {
    fn coordinates(&self) -> Option<Coordinate> {
        self.coordinates
    }

    fn is_verified(&self) -> bool {
        self.status == ReportStatus::Verified
    }
}

/// Fields a citizen supplies when filing a report.
#[derive(Debug, Clone, Default)]
pub struct NewReport<'a> {
    pub user_id: &'a str,
    pub user_name: &'a str,
    pub user_email: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub location: &'a str,
    pub coordinates: Option<Coordinate>,
    pub image_url: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Donation {
    pub id: String,
    pub user_id: Option<String>,
    pub donor_name: String,
    pub user_email: String,
    pub amount: f64,
    pub campaign: String,
    pub timestamp: i64,
    pub status: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewDonation<'a> {
    pub user_id: Option<&'a str>,
    pub donor_name: &'a str,
    pub user_email: &'a str,
    pub amount: f64,
    pub campaign: &'a str,
}

/// Aggregate figures for the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_reports: usize,
    pub pending: usize,
    pub verified: usize,
    pub rejected: usize,
    pub total_donated: f64,
    pub donation_count: usize,
    pub distinct_donors: usize,
}
