//! Registration check against the remote authority
//!
//! `GET {base_url}/sensors/am_i_registered/{identity}`:
//! - `200` the device is authorized to report
//! - `204` the device is explicitly not authorized (factory reset)
//! - anything else is indeterminate

use crate::DeviceIdentity;

pub const REGISTRATION_PATH: &str = "/sensors/am_i_registered/";

pub const STATUS_REGISTERED: u16 = 200;
pub const STATUS_NOT_REGISTERED: u16 = 204;

pub fn registration_url(base_url: &str, identity: &DeviceIdentity) -> String {
    format!(
        "{}{REGISTRATION_PATH}{identity}",
        base_url.trim_end_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_has_single_slash() {
        let id = DeviceIdentity::parse("a4:cf:12:f3:b2:01").unwrap();
        let expected = "https://api.example.net/sensors/am_i_registered/A4CF12F3B201";
        assert_eq!(registration_url("https://api.example.net", &id), expected);
        assert_eq!(registration_url("https://api.example.net/", &id), expected);
    }
}
