//! Common types used throughout Outpost.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Locally generated identifier of a queued event.
///
/// Assigned at capture time, never by the remote system. The same value is
/// sent as the idempotency key on every delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    /// Create a new random event ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an event ID from a UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| CoreError::InvalidId(s.to_string()))
    }
}

/// Timestamp wrapper for consistent handling throughout Outpost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    /// Get the current timestamp.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create a timestamp from a `DateTime<Utc>`.
    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub fn into_inner(self) -> DateTime<Utc> {
        self.0
    }

    /// This timestamp shifted forward by `delay`, saturating at the
    /// latest representable instant.
    #[must_use]
    pub fn after(self, delay: Duration) -> Self {
        chrono::Duration::from_std(delay)
            .ok()
            .and_then(|d| self.0.checked_add_signed(d))
            .map_or(Self(DateTime::<Utc>::MAX_UTC), Self)
    }

    /// This timestamp shifted back by `age`, saturating at the earliest
    /// representable instant.
    #[must_use]
    pub fn before(self, age: Duration) -> Self {
        chrono::Duration::from_std(age)
            .ok()
            .and_then(|d| self.0.checked_sub_signed(d))
            .map_or(Self(DateTime::<Utc>::MIN_UTC), Self)
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%SZ"))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

/// Severity of an audit record.
///
/// Ordered: `Info < Warning < Error < Critical`. A "minimum severity"
/// filter admits exactly the levels greater than or equal to it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Routine activity.
    #[default]
    Info,
    /// Noteworthy or destructive activity.
    Warning,
    /// A failed action.
    Error,
    /// A security-relevant failure.
    Critical,
}

impl Severity {
    /// All levels in ascending order.
    pub const ALL: [Self; 4] = [Self::Info, Self::Warning, Self::Error, Self::Critical];

    /// Numeric rank, `0` for `Info` through `3` for `Critical`.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Info => 0,
            Self::Warning => 1,
            Self::Error => 2,
            Self::Critical => 3,
        }
    }

    /// Lowercase name used on the wire and in exports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    /// Whether this level passes a `minimum` threshold.
    #[must_use]
    pub const fn at_least(self, minimum: Self) -> bool {
        self.rank() >= minimum.rank()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" => Ok(Self::Critical),
            _ => Err(CoreError::InvalidSeverity(s.to_string())),
        }
    }
}

/// Closed set of back-office resources.
///
/// Deferred operations target one of these, and cache invalidation
/// notifications are keyed by them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Product catalogue.
    Products,
    /// Stock levels and movements.
    Inventory,
    /// Sales invoices.
    Invoices,
    /// Customer records.
    Customers,
    /// Supplier records.
    Suppliers,
    /// Reservations and appointments.
    Bookings,
    /// Prescriptions (pharmacy tenants).
    Prescriptions,
    /// Shipments (logistics tenants).
    Shipments,
    /// Payroll runs.
    Payroll,
    /// Staff accounts.
    Users,
    /// Tenant settings.
    Settings,
    /// The audit trail itself.
    AuditLogs,
}

impl ResourceKind {
    /// Every resource kind.
    pub const ALL: [Self; 12] = [
        Self::Products,
        Self::Inventory,
        Self::Invoices,
        Self::Customers,
        Self::Suppliers,
        Self::Bookings,
        Self::Prescriptions,
        Self::Shipments,
        Self::Payroll,
        Self::Users,
        Self::Settings,
        Self::AuditLogs,
    ];

    /// Snake-case name, also used as the module tag of deferred operations.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Inventory => "inventory",
            Self::Invoices => "invoices",
            Self::Customers => "customers",
            Self::Suppliers => "suppliers",
            Self::Bookings => "bookings",
            Self::Prescriptions => "prescriptions",
            Self::Shipments => "shipments",
            Self::Payroll => "payroll",
            Self::Users => "users",
            Self::Settings => "settings",
            Self::AuditLogs => "audit_logs",
        }
    }

    /// Collection path on the remote API, e.g. `/invoices`.
    #[must_use]
    pub const fn collection_path(self) -> &'static str {
        match self {
            Self::Products => "/products",
            Self::Inventory => "/inventory",
            Self::Invoices => "/invoices",
            Self::Customers => "/customers",
            Self::Suppliers => "/suppliers",
            Self::Bookings => "/bookings",
            Self::Prescriptions => "/prescriptions",
            Self::Shipments => "/shipments",
            Self::Payroll => "/payroll",
            Self::Users => "/users",
            Self::Settings => "/settings",
            Self::AuditLogs => "/audit-logs",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| CoreError::InvalidResource(s.to_string()))
    }
}
