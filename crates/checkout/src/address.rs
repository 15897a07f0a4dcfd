//! Address normalization for gateway submission.
//!
//! Everything here is pure and synchronous. Normalization is idempotent:
//! feeding a normalized address back in returns it unchanged.

use tillpoint_core::{Address, Country, RegionId, RegionValue};

use crate::gateway::BillingAddressInput;

/// Make an address gateway-ready.
///
/// - client-only fields (`id`, `save_in_address_book`, `guest_email`) are
///   dropped
/// - street lines are split on newlines, trimmed, and empty segments
///   removed, keeping their order
/// - the form's `country_id` becomes `country_code`
/// - a region object is flattened into a region name and `region_id`
/// - a `region_id` without a region name is resolved against the
///   country's available regions; when the lookup fails the region is left
///   as it was
#[must_use]
pub fn normalize_address(address: &Address, countries: &[Country]) -> Address {
    let country_code = address
        .country_id
        .clone()
        .filter(|c| !c.is_empty())
        .or_else(|| address.country_code.clone());
    let region_id = address.effective_region_id();

    let region = match address.region_name() {
        Some(name) => Some(RegionValue::Name(name.to_string())),
        None => region_id
            .and_then(|id| resolve_region(countries, country_code.as_deref(), id))
            .map(RegionValue::Name)
            .or_else(|| address.region.clone()),
    };

    Address {
        id: None,
        save_in_address_book: None,
        guest_email: None,
        street: normalize_street(&address.street),
        country_id: None,
        country_code,
        region,
        region_id,
        ..address.clone()
    }
}

/// Street lines as one ordered list of non-empty segments.
#[must_use]
pub fn normalize_street(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .flat_map(|line| line.split('\n'))
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

/// Region code (or name when the catalog has no code) for a region id.
///
/// Matches on the exact numeric id. Without a country the first catalog
/// entry holding the id wins.
#[must_use]
pub fn resolve_region(
    countries: &[Country],
    country_code: Option<&str>,
    region_id: RegionId,
) -> Option<String> {
    countries
        .iter()
        .filter(|country| country_code.is_none_or(|code| country.id.eq_ignore_ascii_case(code)))
        .flat_map(|country| country.available_regions.iter())
        .find(|region| region.id == region_id)
        .map(|region| {
            if region.code.is_empty() {
                region.name.clone()
            } else {
                region.code.clone()
            }
        })
        .filter(|label| !label.is_empty())
}

/// Billing payload for the gateway.
///
/// With `same_as_shipping` and a shipping address picked from the address
/// book only the book id is sent. Otherwise the submitted billing address
/// goes out in full, normalized; the form has already mirrored shipping
/// into it when the box is ticked.
#[must_use]
pub fn billing_address_input(
    billing: &Address,
    shipping: Option<&Address>,
    same_as_shipping: bool,
    countries: &[Country],
) -> BillingAddressInput {
    if same_as_shipping
        && let Some(customer_address_id) = shipping.and_then(|s| s.id)
    {
        return BillingAddressInput::Saved {
            customer_address_id,
            same_as_shipping: true,
        };
    }

    BillingAddressInput::New {
        address: normalize_address(billing, countries),
        same_as_shipping,
    }
}
