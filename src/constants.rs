pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3030";
pub const DEFAULT_POSTS_PER_PAGE: i64 = 10;
pub const DEFAULT_MAX_UPLOAD_LENGTH: usize = 1024 * 1024 * 10; // 10 megabytes
pub const DEFAULT_SESSION_MAX_AGE_SECS: i64 = 60 * 60 * 24 * 14;
pub const MENU_ITEMS: &[(&str, &str)] = &[("Home", "/")];
pub const SESSION_COOKIE: &str = "sessionid";
pub const LOGIN_URL: &str = "/auth/login/";
pub const LOGIN_REDIRECT_URL: &str = "/";
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const MEDIA_URL: &str = "/media";
