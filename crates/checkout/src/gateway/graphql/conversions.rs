//! Conversions between generated GraphQL types and gateway types.

use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use tillpoint_core::{Address, CurrencyCode, PaymentTotals};

use crate::gateway::GatewayError;
use crate::gateway::types::{
    AccountInput, BillingAddressInput, PaymentDetails, PaymentMethod, PaymentMethodInput,
    ShippingInformation, ShippingMethod,
};

use super::queries::{
    create_customer, estimate_shipping_costs, get_payment_methods, save_address_information,
    set_billing_address, set_payment_method,
};

/// Build a module's `AddressInput` from a normalized address.
///
/// Every operation module generates its own copy of the input type, so
/// the mapping is shared through a macro rather than a function.
macro_rules! address_input {
    ($module:ident, $address:expr) => {{
        let address: &Address = $address;
        $module::AddressInput {
            firstname: address.firstname.clone(),
            lastname: address.lastname.clone(),
            company: address.company.clone(),
            street: address.street.clone(),
            city: address.city.clone(),
            postcode: address.postcode.clone(),
            telephone: address.telephone.clone(),
            country_code: address.country().unwrap_or_default().to_string(),
            region: address.region_name().map(str::to_string),
            region_id: address.effective_region_id().map(|id| i64::from(id.get())),
            vat_id: address.vat_id.clone(),
        }
    }};
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, GatewayError> {
    Decimal::from_str(value)
        .map_err(|e| GatewayError::InvalidResponse(format!("{field} is not a decimal: {e}")))
}

// =============================================================================
// Requests
// =============================================================================

pub fn estimate_address(address: &Address) -> estimate_shipping_costs::EstimateShippingCostsAddress {
    estimate_shipping_costs::EstimateShippingCostsAddress {
        country_code: address.country().unwrap_or_default().to_string(),
        region: address.region_name().map(str::to_string),
        region_id: address.effective_region_id().map(|id| i64::from(id.get())),
        postcode: Some(address.postcode.clone()).filter(|p| !p.is_empty()),
        city: Some(address.city.clone()).filter(|c| !c.is_empty()),
        street: Some(address.street.clone()).filter(|s| !s.is_empty()),
    }
}

pub fn shipping_information_input(
    information: &ShippingInformation,
) -> save_address_information::ShippingInformationInput {
    save_address_information::ShippingInformationInput {
        shipping_address: address_input!(save_address_information, &information.shipping_address),
        billing_address: information
            .billing_address
            .as_ref()
            .map(|billing| address_input!(save_address_information, billing)),
        shipping_carrier_code: information.shipping_method.carrier_code.clone(),
        shipping_method_code: information.shipping_method.method_code.clone(),
    }
}

pub fn billing_address_input(
    cart_id: &str,
    billing: &BillingAddressInput,
) -> set_billing_address::SetBillingAddressOnCartInput {
    let billing_address = match billing {
        BillingAddressInput::Saved {
            customer_address_id,
            same_as_shipping,
        } => set_billing_address::BillingAddressInput {
            address: None,
            customer_address_id: Some(i64::from(customer_address_id.get())),
            same_as_shipping: Some(*same_as_shipping),
        },
        BillingAddressInput::New {
            address,
            same_as_shipping,
        } => set_billing_address::BillingAddressInput {
            address: Some(address_input!(set_billing_address, address)),
            customer_address_id: None,
            same_as_shipping: Some(*same_as_shipping),
        },
    };

    set_billing_address::SetBillingAddressOnCartInput {
        cart_id: cart_id.to_string(),
        billing_address,
    }
}

pub fn payment_method_input(
    cart_id: &str,
    method: &PaymentMethodInput,
) -> set_payment_method::SetPaymentMethodOnCartInput {
    let additional_data = (!method.additional_data.is_empty()).then(|| {
        method
            .additional_data
            .iter()
            .map(|(key, value)| set_payment_method::PaymentAdditionalData {
                key: key.clone(),
                value: value.clone(),
            })
            .collect()
    });

    set_payment_method::SetPaymentMethodOnCartInput {
        cart_id: cart_id.to_string(),
        payment_method: set_payment_method::PaymentMethodInput {
            code: method.code.clone(),
            additional_data,
        },
    }
}

pub fn create_customer_input(account: &AccountInput) -> create_customer::CreateCustomerInput {
    create_customer::CreateCustomerInput {
        email: account.email.as_str().to_string(),
        firstname: account.firstname.clone(),
        lastname: account.lastname.clone(),
        password: account.password.expose_secret().to_string(),
        is_subscribed: Some(account.is_subscribed),
    }
}

// =============================================================================
// Responses
// =============================================================================

pub fn convert_shipping_method(
    method: estimate_shipping_costs::EstimateShippingCostsEstimateShippingCosts,
) -> Result<ShippingMethod, GatewayError> {
    Ok(ShippingMethod {
        amount: parse_decimal("amount", &method.amount)?,
        carrier_code: method.carrier_code,
        method_code: method.method_code,
        carrier_title: method.carrier_title,
        method_title: method.method_title,
        available: method.available,
        error_message: method.error_message,
    })
}

pub fn convert_payment_methods(
    methods: Vec<get_payment_methods::GetPaymentMethodsGetPaymentMethods>,
) -> Vec<PaymentMethod> {
    methods
        .into_iter()
        .map(|m| PaymentMethod {
            code: m.code,
            title: m.title,
        })
        .collect()
}

pub fn convert_payment_details(
    details: save_address_information::SaveAddressInformationSaveAddressInformation,
) -> Result<PaymentDetails, GatewayError> {
    let totals = details.totals;
    let quote_currency_code = CurrencyCode::from_str(&totals.quote_currency_code)
        .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
    let items_qty = u32::try_from(totals.items_qty).map_err(|_| {
        GatewayError::InvalidResponse(format!("items_qty out of range: {}", totals.items_qty))
    })?;

    Ok(PaymentDetails {
        payment_methods: details
            .payment_methods
            .into_iter()
            .map(|m| PaymentMethod {
                code: m.code,
                title: m.title,
            })
            .collect(),
        totals: PaymentTotals {
            subtotal: parse_decimal("subtotal", &totals.subtotal)?,
            subtotal_incl_tax: parse_decimal("subtotal_incl_tax", &totals.subtotal_incl_tax)?,
            discount_amount: parse_decimal("discount_amount", &totals.discount_amount)?,
            shipping_amount: parse_decimal("shipping_amount", &totals.shipping_amount)?,
            shipping_incl_tax: parse_decimal("shipping_incl_tax", &totals.shipping_incl_tax)?,
            tax_amount: parse_decimal("tax_amount", &totals.tax_amount)?,
            grand_total: parse_decimal("grand_total", &totals.grand_total)?,
            items_qty,
            quote_currency_code,
        },
    })
}
