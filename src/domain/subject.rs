//! Subject type discriminant carried by every snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    Payment,
    DelayedOrder,
    EolProduct,
    AbandonedCart,
    Pagespeed,
    ServiceHealth,
}

impl SubjectType {
    pub const ALL: [SubjectType; 6] = [
        SubjectType::Payment,
        SubjectType::DelayedOrder,
        SubjectType::EolProduct,
        SubjectType::AbandonedCart,
        SubjectType::Pagespeed,
        SubjectType::ServiceHealth,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SubjectType::Payment => "payment",
            SubjectType::DelayedOrder => "delayed_order",
            SubjectType::EolProduct => "eol_product",
            SubjectType::AbandonedCart => "abandoned_cart",
            SubjectType::Pagespeed => "pagespeed",
            SubjectType::ServiceHealth => "service_health",
        }
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown subject type: {0}")]
pub struct UnknownSubjectType(pub String);

impl FromStr for SubjectType {
    type Err = UnknownSubjectType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubjectType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| UnknownSubjectType(s.to_string()))
    }
}
