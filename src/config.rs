pub const MIN_GRADE: f64 = 1.0;
pub const MAX_GRADE: f64 = 6.0;
pub const PASSING_GRADE: f64 = 4.0;
pub const DISTRIBUTION_BUCKETS: usize = 20;

pub const DEFAULT_INSTITUTION: &str = "UZH";
pub const INSTITUTIONS: [&str; 2] = ["UZH", "ETH"];

pub const DEFAULT_MAX_OPT_OUTS: i64 = 5;

/// md5 of the empty string; clients send it when no user name is known.
pub const EMPTY_IDENTITY: &str = "d41d8cd98f00b204e9800998ecf8427e";
/// md5 of the public demo account, which may not write.
pub const DEMO_IDENTITY: &str = "f791a235e89700b87a69d26ac8f10d71";

pub fn default_institution() -> String {
    DEFAULT_INSTITUTION.to_string()
}

pub fn is_known_institution(institution: &str) -> bool {
    INSTITUTIONS.contains(&institution)
}
