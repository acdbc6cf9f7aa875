use crate::domain::telemetry::Info;
use crate::envoy::domain::info::InfoGet;
use thiserror::Error;

/// Firmware from this code on always requires a token, whatever `web-tokens` says.
const TOKEN_FIRMWARE: u32 = 700;

pub fn map_info(info: InfoGet) -> Result<Info, MapInfoError> {
    let firmware = firmware_code(&info.device.software)?;

    Ok(Info {
        serial_number: info.device.sn,
        model: info.device.pn,
        software: info.device.software,
        firmware,
        token_required: info.web_tokens.unwrap_or(false) || firmware >= TOKEN_FIRMWARE,
        imeter: info.device.imeter.unwrap_or(false),
        time: info.time,
    })
}

/// The first three digits of the software version, `D7.6.175` is `761`.
pub fn firmware_code(software: &str) -> Result<u32, MapInfoError> {
    let digits: String = software.chars().filter(char::is_ascii_digit).take(3).collect();
    digits.parse().map_err(|_| MapInfoError::InvalidSoftware(software.to_string()))
}

#[derive(Error, Debug)]
pub enum MapInfoError {
    #[error("software version '{0}' has no firmware code")]
    InvalidSoftware(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn maps_token_firmware() -> Result<(), MapInfoError> {
        let xml = include_str!("../../tests/resources/envoy/info.xml");
        let info: InfoGet = quick_xml::de::from_str(xml).unwrap();

        let info = map_info(info)?;

        assert_eq!(
            info,
            Info {
                serial_number: "122012345678".to_string(),
                model: "800-00555-r03".to_string(),
                software: "D7.6.175".to_string(),
                firmware: 761,
                token_required: true,
                imeter: true,
                time: Some(1_700_000_000),
            }
        );
        Ok(())
    }

    #[test]
    fn legacy_firmware_without_web_tokens_needs_no_token() -> Result<(), MapInfoError> {
        let xml = include_str!("../../tests/resources/envoy/info_legacy.xml");
        let info: InfoGet = quick_xml::de::from_str(xml).unwrap();

        let info = map_info(info)?;

        assert_eq!(info.firmware, 410);
        assert!(!info.token_required);
        assert!(!info.imeter);
        Ok(())
    }

    #[rstest]
    #[case("D7.0.88", 708)]
    #[case("D8.2.4264", 824)]
    #[case("R3.9.36", 393)]
    #[case("5.0.62", 506)]
    fn firmware_code_takes_the_first_three_digits(#[case] software: &str, #[case] expected: u32) {
        assert_eq!(firmware_code(software).unwrap(), expected);
    }

    #[test]
    fn firmware_code_requires_digits() {
        assert!(matches!(firmware_code("unknown"), Err(MapInfoError::InvalidSoftware(_))));
    }
}
