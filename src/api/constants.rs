//! Upstream endpoints, header names and paging parameters

/// Dodo IS (sales, production and delivery statistics)
pub mod dodois {
    pub const TOKEN_URL: &str = "https://auth.dodois.com/connect/token";
    pub const BASE_URL: &str = "https://api.dodois.com/dodopizza/tr/";

    pub const SALES: &str = "finances/sales/units";
    pub const ORDERS_HANDOVER: &str = "production/orders-handover-statistics";
    pub const DELIVERY: &str = "delivery/statistics";
    pub const CLIENTS: &str = "orders/clients-statistics";

    pub const DEFAULT_PAGE_SIZE: u32 = 1000;
}

/// Trendyol Go meal integrator API
pub mod trendyol {
    pub const BASE_URL: &str = "https://api.tgoapis.com/integrator/";

    pub const AGENT_NAME_HEADER: &str = "x-agentname";
    pub const EXECUTOR_USER_HEADER: &str = "x-executor-user";

    pub const DEFAULT_PAGE_SIZE: u32 = 50;

    pub fn reviews_path(supplier_id: &str, store_id: &str) -> String {
        format!("review/meal/suppliers/{supplier_id}/stores/{store_id}/reviews/filter")
    }

    pub fn claims_path(supplier_id: &str) -> String {
        format!("claim/meal/suppliers/{supplier_id}/claims")
    }

    pub fn packages_path(supplier_id: &str) -> String {
        format!("order/meal/suppliers/{supplier_id}/packages")
    }
}

/// Yemeksepeti POS integration middleware
pub mod yemeksepeti {
    pub const LOGIN_URL: &str = "https://integration-middleware-tr.me.restaurant-partners.com/v2/login";
    pub const API_ROOT: &str = "https://integration-middleware-tr.me.restaurant-partners.com/v2/";

    pub const ORDER_IDS: &str = "orders/ids";

    /// Lifetime assumed when the login response carries none
    pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

    pub fn chain_base_url(chain_id: &str) -> String {
        format!("{API_ROOT}chains/{chain_id}/")
    }

    pub fn order_path(order_id: &str) -> String {
        format!("orders/{}", urlencoding::encode(order_id))
    }
}

/// Query parameter and field names used by the paging strategies
pub mod paging {
    pub const PAGE: &str = "page";
    pub const SIZE: &str = "size";
    pub const TOTAL_PAGES: &str = "totalPages";

    pub const SKIP: &str = "skip";
    pub const TAKE: &str = "take";
    pub const END_OF_LIST: &str = "isEndOfListReached";
}

/// Join a base URL and a relative path with exactly one slash between them
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
