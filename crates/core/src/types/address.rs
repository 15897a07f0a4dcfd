//! Checkout addresses and the country/region catalog.

use serde::{Deserialize, Serialize};

use crate::types::id::{AddressId, RegionId};

/// A shipping or billing address as entered in the checkout form.
///
/// The same shape is used before and after normalization: the
/// client-only bookkeeping fields (`id`, `save_in_address_book`,
/// `guest_email`) and the form's `country_id` are only populated on raw
/// input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Address {
    /// Saved address book entry this address was picked from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AddressId>,
    /// Form checkbox: store the address in the customer's address book.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_in_address_book: Option<bool>,
    /// Email typed by a guest on the address form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_email: Option<String>,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    /// Street lines in order. Entries may hold several lines separated by
    /// newlines until normalized.
    #[serde(default)]
    pub street: Vec<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postcode: String,
    #[serde(default)]
    pub telephone: String,
    /// Country as selected in the form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_id: Option<String>,
    /// Country as the gateway expects it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<RegionValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<RegionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vat_id: Option<String>,
}

impl Address {
    /// Country of the address, whichever label it currently carries.
    #[must_use]
    pub fn country(&self) -> Option<&str> {
        self.country_code
            .as_deref()
            .or(self.country_id.as_deref())
            .filter(|c| !c.is_empty())
    }

    /// Region name or code, if one is known.
    #[must_use]
    pub fn region_name(&self) -> Option<&str> {
        match self.region.as_ref()? {
            RegionValue::Name(name) => Some(name.as_str()),
            RegionValue::Detailed {
                region,
                region_code,
                ..
            } => region.as_deref().or(region_code.as_deref()),
        }
        .filter(|name| !name.is_empty())
    }

    /// Region id, from the address itself or from a region object.
    #[must_use]
    pub fn effective_region_id(&self) -> Option<RegionId> {
        self.region_id.or(match &self.region {
            Some(RegionValue::Detailed { region_id, .. }) => *region_id,
            _ => None,
        })
    }

    /// Shopper's full name.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
            .trim()
            .to_string()
    }
}

/// Region as found on an address: either a bare name/code or the object
/// shape returned by the customer address book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegionValue {
    Name(String),
    Detailed {
        #[serde(default)]
        region: Option<String>,
        #[serde(default)]
        region_code: Option<String>,
        #[serde(default)]
        region_id: Option<RegionId>,
    },
}

/// A country and the regions the store ships to in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    /// Two-letter country code.
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub available_regions: Vec<Region>,
}

/// A region (state, province) of a country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_region_value_accepts_both_shapes() {
        let named: Address = serde_json::from_str(r#"{"region": "Texas"}"#).unwrap();
        assert_eq!(named.region_name(), Some("Texas"));

        let detailed: Address = serde_json::from_str(
            r#"{"region": {"region": null, "region_code": null, "region_id": 57}}"#,
        )
        .unwrap();
        assert_eq!(detailed.region_name(), None);
        assert_eq!(detailed.effective_region_id(), Some(RegionId::new(57)));
    }

    #[test]
    fn test_country_prefers_gateway_label() {
        let address = Address {
            country_id: Some("US".to_string()),
            country_code: Some("CA".to_string()),
            ..Address::default()
        };
        assert_eq!(address.country(), Some("CA"));
    }

    #[test]
    fn test_full_name_trims() {
        let address = Address {
            firstname: "Ada".to_string(),
            ..Address::default()
        };
        assert_eq!(address.full_name(), "Ada");
    }
}
