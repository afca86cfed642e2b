//! Route paths.

pub const POST_EXCHANGE_ACCESS_TOKEN: &str = "/oauth2/exchange_access_token/{backend}";
pub const DOP_EXCHANGE_ACCESS_TOKEN: &str = "/oauth2/dop/exchange_access_token/{backend}";
pub const DOT_EXCHANGE_ACCESS_TOKEN: &str = "/oauth2/dot/exchange_access_token/{backend}";
pub const POST_ACCESS_TOKEN: &str = "/oauth2/access_token";
pub const POST_LOGIN: &str = "/oauth2/login";
