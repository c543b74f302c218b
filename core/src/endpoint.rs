//! Static catalog of the shop API's remote operations.
//!
//! Each `Endpoint` is pure data read by the executor. Adding an operation
//! means adding a row here and a forwarding method on `Session`.

use crate::http::HttpMethod;
use crate::http::HttpMethod::{Delete, Get, Post, Put};
use ResponseShape::{Enveloped, Raw, Unit};

/// How a successful response body is turned into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// Body is an `Envelope`; the payload lives under `data`.
    Enveloped,
    /// Body is the payload itself.
    Raw,
    /// Body is ignored.
    Unit,
}

/// Description of one remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub name: &'static str,
    pub method: HttpMethod,
    /// Path relative to the base URL. `{name}` segments are placeholders.
    pub path: &'static str,
    pub query: bool,
    pub body: bool,
    pub response: ResponseShape,
}

impl Endpoint {
    /// Placeholder names in template order.
    pub fn placeholders(&self) -> impl Iterator<Item = &'static str> {
        self.path.split('/').filter_map(placeholder_name)
    }
}

/// Name inside a `{name}` path segment.
pub(crate) fn placeholder_name(segment: &str) -> Option<&str> {
    segment.strip_prefix('{')?.strip_suffix('}')
}

const fn endpoint(
    name: &'static str,
    method: HttpMethod,
    path: &'static str,
    query: bool,
    body: bool,
    response: ResponseShape,
) -> Endpoint {
    Endpoint {
        name,
        method,
        path,
        query,
        body,
        response,
    }
}

pub const LOGIN: Endpoint = endpoint("login", Post, "auth/login", false, true, Raw);
pub const REGISTER: Endpoint = endpoint("register", Post, "auth/register", false, true, Enveloped);
pub const LOGOUT: Endpoint = endpoint("logout", Post, "auth/logout", false, false, Unit);

pub const GET_CURRENT_USER: Endpoint = endpoint("get_current_user", Get, "user/me", false, false, Enveloped);
pub const UPDATE_USER: Endpoint = endpoint("update_user", Put, "user/me", false, true, Enveloped);
pub const GET_ADDRESSES: Endpoint = endpoint("get_addresses", Get, "user/addresses", false, false, Enveloped);
pub const CREATE_ADDRESS: Endpoint = endpoint("create_address", Post, "user/addresses", false, true, Enveloped);

pub const GET_PRODUCTS: Endpoint = endpoint("get_products", Get, "products", true, false, Enveloped);
pub const GET_PRODUCT: Endpoint = endpoint("get_product", Get, "products/{id}", false, false, Enveloped);
pub const CREATE_PRODUCT: Endpoint = endpoint("create_product", Post, "products", false, true, Enveloped);
pub const UPDATE_PRODUCT: Endpoint = endpoint("update_product", Put, "products/{id}", false, true, Enveloped);
pub const DELETE_PRODUCT: Endpoint = endpoint("delete_product", Delete, "products/{id}", false, false, Unit);
pub const GET_CATEGORIES: Endpoint = endpoint("get_categories", Get, "categories", false, false, Enveloped);

pub const GET_ORDERS: Endpoint = endpoint("get_orders", Get, "orders", true, false, Enveloped);
pub const GET_ORDER: Endpoint = endpoint("get_order", Get, "orders/{id}", false, false, Enveloped);
pub const CREATE_ORDER: Endpoint = endpoint("create_order", Post, "orders", false, true, Enveloped);

pub const GET_STOCK: Endpoint = endpoint("get_stock", Get, "stock/{productId}", false, false, Enveloped);

pub const GET_WALLET: Endpoint = endpoint("get_wallet", Get, "ewallet", false, false, Enveloped);
pub const GET_TRANSACTIONS: Endpoint =
    endpoint("get_transactions", Get, "ewallet/transactions", true, false, Enveloped);

pub const HEALTH_CHECK: Endpoint = endpoint("health_check", Get, "health", false, false, Raw);

/// Every descriptor, in catalog order.
pub const ALL: &[Endpoint] = &[
    LOGIN,
    REGISTER,
    LOGOUT,
    GET_CURRENT_USER,
    UPDATE_USER,
    GET_ADDRESSES,
    CREATE_ADDRESS,
    GET_PRODUCTS,
    GET_PRODUCT,
    CREATE_PRODUCT,
    UPDATE_PRODUCT,
    DELETE_PRODUCT,
    GET_CATEGORIES,
    GET_ORDERS,
    GET_ORDER,
    CREATE_ORDER,
    GET_STOCK,
    GET_WALLET,
    GET_TRANSACTIONS,
    HEALTH_CHECK,
];
