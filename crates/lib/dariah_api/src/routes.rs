//! Route paths.

pub const GET_API_HEALTH: &str = "/api/health";
pub const POST_AUTH_SIGN_IN: &str = "/auth/sign-in";
pub const POST_AUTH_SIGN_OUT: &str = "/auth/sign-out";
pub const POST_AUTH_SIGN_OUT_ALL: &str = "/auth/sign-out-all";
pub const GET_AUTH_ME: &str = "/auth/me";
