use crate::envoy::domain::settings::PlcLevelGet;
use crate::envoy::map_home::level_percent;
use std::collections::BTreeMap;

pub fn map_plc_levels(levels: PlcLevelGet) -> BTreeMap<String, u8> {
    levels
        .into_iter()
        .map(|(serial_number, level)| (serial_number, level_percent(level)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plc_levels_are_scaled_to_percent() {
        let levels: PlcLevelGet = serde_json::from_str(r#"{"482122001001": 5, "482122001002": 2}"#).unwrap();

        let levels = map_plc_levels(levels);

        assert_eq!(levels["482122001001"], 100);
        assert_eq!(levels["482122001002"], 40);
    }
}
