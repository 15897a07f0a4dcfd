//! GraphQL operation definitions for the commerce backend.

use graphql_client::GraphQLQuery;

// Scalar types must be declared in the module where GraphQLQuery is derived
// and must match the schema scalar names exactly.
type Decimal = String;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/schema.graphql",
    query_path = "graphql/queries/checkout.graphql",
    response_derives = "Debug, Clone"
)]
pub struct IsEmailAvailable;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/schema.graphql",
    query_path = "graphql/queries/checkout.graphql",
    response_derives = "Debug, Clone"
)]
pub struct GetPaymentMethods;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/schema.graphql",
    query_path = "graphql/queries/checkout.graphql",
    response_derives = "Debug, Clone"
)]
pub struct EstimateShippingCosts;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/schema.graphql",
    query_path = "graphql/queries/checkout.graphql",
    response_derives = "Debug, Clone"
)]
pub struct SaveAddressInformation;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/schema.graphql",
    query_path = "graphql/queries/checkout.graphql",
    response_derives = "Debug, Clone"
)]
pub struct SaveGuestEmail;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/schema.graphql",
    query_path = "graphql/queries/checkout.graphql",
    response_derives = "Debug, Clone"
)]
pub struct SetBillingAddress;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/schema.graphql",
    query_path = "graphql/queries/checkout.graphql",
    response_derives = "Debug, Clone"
)]
pub struct SetPaymentMethod;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/schema.graphql",
    query_path = "graphql/queries/checkout.graphql",
    response_derives = "Debug, Clone"
)]
pub struct PlaceOrder;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/schema.graphql",
    query_path = "graphql/queries/checkout.graphql",
    response_derives = "Debug, Clone"
)]
pub struct CreateCustomer;
