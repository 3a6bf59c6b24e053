use crate::payments::error::{PaymentError, PaymentResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Providers truncate metadata values beyond this length; we cut them
/// ourselves so the callback round-trips the exact strings we sent.
pub const METADATA_VALUE_MAX_LEN: usize = 500;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    Reservation,
    WalletTopup,
}

impl PaymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::Reservation => "reservation",
            PaymentKind::WalletTopup => "wallet_topup",
        }
    }
}

/// Typed metadata attached to a payment authorization. The provider
/// stores it as opaque string key/value pairs and returns it unmodified
/// in the success callback; this struct is the only place the string
/// representation is produced or consumed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentMetadata {
    pub kind: PaymentKind,
    pub user_id: String,
    pub user_email: String,
    pub user_name: Option<String>,
    pub toilet_id: Option<String>,
    pub establishment_id: Option<String>,
    pub establishment_name: Option<String>,
    pub establishment_address: Option<String>,
}

impl PaymentMetadata {
    pub fn for_reservation(
        user_id: impl Into<String>,
        user_email: impl Into<String>,
        user_name: Option<String>,
        toilet_id: impl Into<String>,
        establishment_id: impl Into<String>,
        establishment_name: impl Into<String>,
        establishment_address: impl Into<String>,
    ) -> Self {
        Self {
            kind: PaymentKind::Reservation,
            user_id: user_id.into(),
            user_email: user_email.into(),
            user_name,
            toilet_id: Some(toilet_id.into()),
            establishment_id: Some(establishment_id.into()),
            establishment_name: Some(establishment_name.into()),
            establishment_address: Some(establishment_address.into()),
        }
    }

    pub fn for_wallet_topup(
        user_id: impl Into<String>,
        user_email: impl Into<String>,
        user_name: Option<String>,
    ) -> Self {
        Self {
            kind: PaymentKind::WalletTopup,
            user_id: user_id.into(),
            user_email: user_email.into(),
            user_name,
            toilet_id: None,
            establishment_id: None,
            establishment_name: None,
            establishment_address: None,
        }
    }

    /// Serialize to the provider's string key/value representation,
    /// truncating each value to the provider's per-field limit.
    pub fn to_string_map(&self) -> BTreeMap<String, String> {
        fn clamp(value: &str) -> String {
            value.chars().take(METADATA_VALUE_MAX_LEN).collect()
        }

        let mut map = BTreeMap::new();
        map.insert("type".to_string(), self.kind.as_str().to_string());
        map.insert("userId".to_string(), clamp(&self.user_id));
        map.insert("userEmail".to_string(), clamp(&self.user_email));
        map.insert(
            "userName".to_string(),
            clamp(self.user_name.as_deref().unwrap_or("")),
        );
        if let Some(toilet_id) = &self.toilet_id {
            map.insert("toiletId".to_string(), clamp(toilet_id));
        }
        if let Some(id) = &self.establishment_id {
            map.insert("establishmentId".to_string(), clamp(id));
        }
        if let Some(name) = &self.establishment_name {
            map.insert("establishmentName".to_string(), clamp(name));
        }
        if let Some(address) = &self.establishment_address {
            map.insert("establishmentAddress".to_string(), clamp(address));
        }
        map
    }

    /// Reconstruct from the string map the provider echoes back.
    ///
    /// Authorizations created before the `type` tag existed carry no tag;
    /// those are treated as reservations when a toilet id is present.
    pub fn from_string_map(map: &BTreeMap<String, String>) -> PaymentResult<Self> {
        let get = |key: &str| map.get(key).map(|v| v.trim().to_string());
        let require = |key: &str| {
            get(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| PaymentError::MalformedPayload {
                    message: format!("metadata is missing required key '{}'", key),
                })
        };

        let kind = match get("type").as_deref() {
            Some("wallet_topup") => PaymentKind::WalletTopup,
            Some("reservation") | Some("") | None => {
                if map.contains_key("toiletId") {
                    PaymentKind::Reservation
                } else {
                    PaymentKind::WalletTopup
                }
            }
            Some(other) => {
                return Err(PaymentError::MalformedPayload {
                    message: format!("unknown payment type in metadata: {}", other),
                })
            }
        };

        let metadata = match kind {
            PaymentKind::Reservation => Self {
                kind,
                user_id: require("userId")?,
                user_email: require("userEmail")?,
                user_name: get("userName").filter(|v| !v.is_empty()),
                toilet_id: Some(require("toiletId")?),
                establishment_id: Some(require("establishmentId")?),
                establishment_name: Some(require("establishmentName")?),
                establishment_address: Some(require("establishmentAddress")?),
            },
            PaymentKind::WalletTopup => Self {
                kind,
                user_id: require("userId")?,
                user_email: get("userEmail").unwrap_or_default(),
                user_name: get("userName").filter(|v| !v.is_empty()),
                toilet_id: None,
                establishment_id: None,
                establishment_name: None,
                establishment_address: None,
            },
        };

        Ok(metadata)
    }
}

/// Request to create a payment authorization with the provider.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Amount in currency units (e.g. euros), two-place precision.
    pub amount: Decimal,
    pub metadata: PaymentMetadata,
}

/// Result of a successful authorization creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedAuthorization {
    pub authorization_id: String,
    pub client_secret: String,
}

/// A verified, parsed callback event from the payment provider.
#[derive(Debug, Clone)]
pub struct ProviderEvent {
    pub event_id: String,
    pub event_type: String,
    pub payment: Option<PaymentObject>,
}

impl ProviderEvent {
    pub fn is_payment_succeeded(&self) -> bool {
        self.event_type == "payment_intent.succeeded"
    }
}

/// The payment intent object embedded in a callback event.
#[derive(Debug, Clone)]
pub struct PaymentObject {
    pub authorization_id: String,
    /// Amount in the provider's minor units (cents).
    pub amount_minor: i64,
    pub currency: String,
    pub metadata: BTreeMap<String, String>,
}

impl PaymentObject {
    pub fn amount(&self) -> Decimal {
        Decimal::new(self.amount_minor, 2)
    }
}

/// Convert a currency-unit amount to the provider's minor-unit integer.
/// Ties round half-up (away from zero), matching the provider's own
/// arithmetic: 12.345 -> 1235, 12.344 -> 1234.
pub fn to_minor_units(amount: Decimal) -> PaymentResult<i64> {
    let minor = (amount * Decimal::from(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    minor.to_i64().ok_or_else(|| PaymentError::ValidationError {
        message: format!("amount {} does not fit in minor units", amount),
        field: Some("amount".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn minor_unit_conversion_rounds_ties_half_up() {
        assert_eq!(to_minor_units(d("12.345")).unwrap(), 1235);
        assert_eq!(to_minor_units(d("12.344")).unwrap(), 1234);
        assert_eq!(to_minor_units(d("2.5")).unwrap(), 250);
        assert_eq!(to_minor_units(d("0.015")).unwrap(), 2);
    }

    #[test]
    fn metadata_round_trips_through_string_map() {
        let metadata = PaymentMetadata::for_reservation(
            "user-1",
            "user@example.com",
            Some("Alex".to_string()),
            "T1",
            "E1",
            "Cafe Central",
            "1 Rue de la Paix, Paris",
        );

        let map = metadata.to_string_map();
        assert_eq!(map.get("type").map(String::as_str), Some("reservation"));
        assert_eq!(map.get("toiletId").map(String::as_str), Some("T1"));

        let parsed = PaymentMetadata::from_string_map(&map).unwrap();
        assert_eq!(parsed, metadata);
    }

    #[test]
    fn metadata_values_are_truncated_to_provider_limit() {
        let long_address = "x".repeat(METADATA_VALUE_MAX_LEN + 50);
        let metadata = PaymentMetadata::for_reservation(
            "user-1",
            "user@example.com",
            None,
            "T1",
            "E1",
            "Cafe",
            long_address,
        );
        let map = metadata.to_string_map();
        assert_eq!(
            map.get("establishmentAddress").unwrap().len(),
            METADATA_VALUE_MAX_LEN
        );
    }

    #[test]
    fn untagged_metadata_with_toilet_id_is_a_reservation() {
        let mut map = BTreeMap::new();
        map.insert("userId".to_string(), "user-1".to_string());
        map.insert("userEmail".to_string(), "user@example.com".to_string());
        map.insert("toiletId".to_string(), "T9".to_string());
        map.insert("establishmentId".to_string(), "E9".to_string());
        map.insert("establishmentName".to_string(), "Bar".to_string());
        map.insert("establishmentAddress".to_string(), "2 Main St".to_string());

        let parsed = PaymentMetadata::from_string_map(&map).unwrap();
        assert_eq!(parsed.kind, PaymentKind::Reservation);
    }

    #[test]
    fn reservation_metadata_missing_establishment_is_rejected() {
        let mut map = BTreeMap::new();
        map.insert("type".to_string(), "reservation".to_string());
        map.insert("userId".to_string(), "user-1".to_string());
        map.insert("userEmail".to_string(), "user@example.com".to_string());
        map.insert("toiletId".to_string(), "T9".to_string());

        assert!(PaymentMetadata::from_string_map(&map).is_err());
    }

    #[test]
    fn payment_object_amount_restores_two_place_precision() {
        let payment = PaymentObject {
            authorization_id: "pi_1".to_string(),
            amount_minor: 250,
            currency: "eur".to_string(),
            metadata: BTreeMap::new(),
        };
        assert_eq!(payment.amount(), d("2.50"));
    }
}
