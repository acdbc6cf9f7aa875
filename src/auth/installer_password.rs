use md5::{Digest, Md5};

const USER: &str = "installer";
const REALM: &str = "enphaseenergy.com";

/// Derives the installer password of a gateway from its serial number. Pure and deterministic.
pub fn installer_password(serial_number: &str) -> String {
    let digest = hex::encode(Md5::digest(format!("[e]{USER}@{REALM}#{serial_number} EnPhAsE eNeRgY ").as_bytes()));

    let mut count_zero = digest.chars().filter(|c| *c == '0').count() as i32;
    let mut count_one = digest.chars().filter(|c| *c == '1').count() as i32;

    digest
        .chars()
        .rev()
        .take(8)
        .map(|c| {
            if matches!(count_zero, 3 | 6 | 9) {
                count_zero -= 1;
            }
            count_zero = count_zero.clamp(0, 20);

            if matches!(count_one, 9 | 15) {
                count_one -= 1;
            }
            count_one = count_one.clamp(0, 26);

            match c {
                '0' => {
                    let translated = char::from(b'f' + count_zero as u8);
                    count_zero -= 1;
                    translated
                }
                '1' => {
                    let translated = char::from(b'@' + count_one as u8);
                    count_one -= 1;
                    translated
                }
                other => other,
            }
        })
        .collect()
}
